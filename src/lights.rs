use glam::{Vec3, Vec4};
use log::debug;

use crate::shader::ShaderProgram;

/// Default spotlight cutoff; 180 degrees disables the cone.
pub const NO_SPOTLIGHT_CUTOFF: f32 = 180.0;

/// Snapshot of one light's parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub position: Vec4,
    pub ambient_color: Vec4,
    pub diffuse_color: Vec4,
    pub specular_color: Vec4,
    pub spotlight_direction: Vec3,
    pub spotlight_exponent: f32,
    pub spotlight_cutoff_angle: f32,
    pub attenuation_factors: Vec3,
    pub activated: bool,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            position: Vec4::new(0.0, 0.0, 1.0, 0.0),
            ambient_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            diffuse_color: Vec4::ONE,
            specular_color: Vec4::ONE,
            spotlight_direction: Vec3::NEG_Z,
            spotlight_exponent: 0.0,
            spotlight_cutoff_angle: NO_SPOTLIGHT_CUTOFF,
            attenuation_factors: Vec3::new(1.0, 0.0, 0.0),
            activated: true,
        }
    }
}

/// Indexed collection of lights with a global on/off switch.
///
/// Parameters live in parallel arrays that always share one length.
#[derive(Debug, Clone, PartialEq)]
pub struct LightSet {
    light_switch: bool,
    global_ambient: Vec4,
    positions: Vec<Vec4>,
    ambient_colors: Vec<Vec4>,
    diffuse_colors: Vec<Vec4>,
    specular_colors: Vec<Vec4>,
    spotlight_directions: Vec<Vec3>,
    spotlight_exponents: Vec<f32>,
    spotlight_cutoff_angles: Vec<f32>,
    attenuation_factors: Vec<Vec3>,
    activated: Vec<bool>,
}

impl Default for LightSet {
    fn default() -> Self {
        Self {
            light_switch: true,
            global_ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
            positions: Vec::new(),
            ambient_colors: Vec::new(),
            diffuse_colors: Vec::new(),
            specular_colors: Vec::new(),
            spotlight_directions: Vec::new(),
            spotlight_exponents: Vec::new(),
            spotlight_cutoff_angles: Vec::new(),
            attenuation_factors: Vec::new(),
            activated: Vec::new(),
        }
    }
}

impl LightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn light_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Appends an active point or directional light without a spotlight cone.
    pub fn add_light(
        &mut self,
        position: Vec4,
        ambient_color: Vec4,
        diffuse_color: Vec4,
        specular_color: Vec4,
    ) -> usize {
        let defaults = Light::default();
        self.add_spotlight(
            position,
            ambient_color,
            diffuse_color,
            specular_color,
            defaults.spotlight_direction,
            defaults.spotlight_exponent,
            defaults.spotlight_cutoff_angle,
            defaults.attenuation_factors,
        )
    }

    /// Appends an active light with every parameter given. Returns its index.
    #[allow(clippy::too_many_arguments)]
    pub fn add_spotlight(
        &mut self,
        position: Vec4,
        ambient_color: Vec4,
        diffuse_color: Vec4,
        specular_color: Vec4,
        spotlight_direction: Vec3,
        spotlight_exponent: f32,
        spotlight_cutoff_angle: f32,
        attenuation_factors: Vec3,
    ) -> usize {
        self.positions.push(position);
        self.ambient_colors.push(ambient_color);
        self.diffuse_colors.push(diffuse_color);
        self.specular_colors.push(specular_color);
        self.spotlight_directions.push(spotlight_direction);
        self.spotlight_exponents.push(spotlight_exponent);
        self.spotlight_cutoff_angles.push(spotlight_cutoff_angle);
        self.attenuation_factors.push(attenuation_factors);
        self.activated.push(true);
        self.positions.len() - 1
    }

    /// Parameters of light `index`.
    pub fn light(&self, index: usize) -> Option<Light> {
        Some(Light {
            position: *self.positions.get(index)?,
            ambient_color: self.ambient_colors[index],
            diffuse_color: self.diffuse_colors[index],
            specular_color: self.specular_colors[index],
            spotlight_direction: self.spotlight_directions[index],
            spotlight_exponent: self.spotlight_exponents[index],
            spotlight_cutoff_angle: self.spotlight_cutoff_angles[index],
            attenuation_factors: self.attenuation_factors[index],
            activated: self.activated[index],
        })
    }

    pub fn set_light_position(&mut self, index: usize, position: Vec4) -> bool {
        replace(&mut self.positions, index, position, "position")
    }

    pub fn set_ambient_light_color(&mut self, index: usize, color: Vec4) -> bool {
        replace(&mut self.ambient_colors, index, color, "ambient color")
    }

    pub fn set_diffuse_light_color(&mut self, index: usize, color: Vec4) -> bool {
        replace(&mut self.diffuse_colors, index, color, "diffuse color")
    }

    pub fn set_specular_light_color(&mut self, index: usize, color: Vec4) -> bool {
        replace(&mut self.specular_colors, index, color, "specular color")
    }

    pub fn set_spotlight_direction(&mut self, index: usize, direction: Vec3) -> bool {
        replace(&mut self.spotlight_directions, index, direction, "spotlight direction")
    }

    pub fn set_spotlight_exponent(&mut self, index: usize, exponent: f32) -> bool {
        replace(&mut self.spotlight_exponents, index, exponent, "spotlight exponent")
    }

    pub fn set_spotlight_cutoff_angle(&mut self, index: usize, degrees: f32) -> bool {
        replace(&mut self.spotlight_cutoff_angles, index, degrees, "spotlight cutoff")
    }

    pub fn set_attenuation_factors(&mut self, index: usize, factors: Vec3) -> bool {
        replace(&mut self.attenuation_factors, index, factors, "attenuation")
    }

    pub fn activate_light(&mut self, index: usize) -> bool {
        replace(&mut self.activated, index, true, "activation")
    }

    pub fn deactivate_light(&mut self, index: usize) -> bool {
        replace(&mut self.activated, index, false, "activation")
    }

    pub fn is_light_activated(&self, index: usize) -> bool {
        self.activated.get(index).copied().unwrap_or(false)
    }

    pub fn global_ambient(&self) -> Vec4 {
        self.global_ambient
    }

    pub fn set_global_ambient(&mut self, color: Vec4) {
        self.global_ambient = color;
    }

    /// Flips the global switch and returns the new state.
    pub fn toggle_light_switch(&mut self) -> bool {
        self.light_switch = !self.light_switch;
        self.light_switch
    }

    pub fn is_light_on(&self) -> bool {
        self.light_switch
    }

    /// Writes the switch, count, global ambient and every resolved light into `shader`.
    ///
    /// Lights beyond the count the program's locations were resolved for are skipped.
    pub fn transfer_uniforms_to_shader(&self, shader: &mut ShaderProgram) {
        let standard = shader.standard();
        let (use_light, light_num, global_ambient) =
            (standard.use_light, standard.light_num, standard.global_ambient);
        shader.set_i32(use_light, i32::from(self.light_switch));
        shader.set_i32(light_num, self.light_count() as i32);
        shader.set_vec4(global_ambient, self.global_ambient);

        for index in 0..self.light_count() {
            let Some(locations) = shader.standard().lights.get(index).copied() else {
                break;
            };
            shader.set_i32(locations.light_switch, i32::from(self.activated[index]));
            shader.set_vec4(locations.position, self.positions[index]);
            shader.set_vec4(locations.ambient_color, self.ambient_colors[index]);
            shader.set_vec4(locations.diffuse_color, self.diffuse_colors[index]);
            shader.set_vec4(locations.specular_color, self.specular_colors[index]);
            shader.set_vec3(locations.spotlight_direction, self.spotlight_directions[index]);
            shader.set_f32(locations.spotlight_exponent, self.spotlight_exponents[index]);
            shader.set_f32(
                locations.spotlight_cutoff_angle,
                self.spotlight_cutoff_angles[index],
            );
            shader.set_vec3(locations.attenuation_factors, self.attenuation_factors[index]);
        }
    }
}

fn replace<T>(values: &mut [T], index: usize, value: T, what: &str) -> bool {
    match values.get_mut(index) {
        Some(slot) => {
            *slot = value;
            true
        }
        None => {
            debug!(
                "ignoring {what} for light {index}; only {} lights exist",
                values.len()
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::shared::{FRAGMENT_SHADER, VERTEX_SHADER};

    fn projector_light() -> LightSet {
        let mut lights = LightSet::new();
        lights.add_light(
            Vec4::new(40.0, 30.0, 20.0, 1.0),
            Vec4::new(0.3, 0.3, 0.3, 1.0),
            Vec4::new(0.7, 0.7, 0.7, 1.0),
            Vec4::new(0.9, 0.9, 0.9, 1.0),
        );
        lights
    }

    fn program_for(lights: &LightSet) -> ShaderProgram {
        let mut program = ShaderProgram::new("lights");
        program.compile_and_link(VERTEX_SHADER, FRAGMENT_SHADER).unwrap();
        program.resolve_standard_locations(lights.light_count());
        program
    }

    #[test]
    fn add_light_appends_active_light_with_defaults() {
        let lights = projector_light();
        assert_eq!(lights.light_count(), 1);
        assert!(lights.is_light_on());
        let light = lights.light(0).unwrap();
        assert!(light.activated);
        assert_eq!(light.position, Vec4::new(40.0, 30.0, 20.0, 1.0));
        assert_eq!(light.spotlight_cutoff_angle, NO_SPOTLIGHT_CUTOFF);
        assert_eq!(light.attenuation_factors, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn single_light_at_origin_uses_default_global_ambient() {
        let mut lights = LightSet::new();
        let index = lights.add_light(
            Vec4::new(0.0, 0.0, 0.0, 1.0),
            Vec4::new(0.0, 0.0, 0.0, 1.0),
            Vec4::ONE,
            Vec4::ONE,
        );
        assert_eq!(index, 0);
        assert_eq!(lights.light_count(), 1);
        assert_eq!(lights.global_ambient(), Vec4::new(0.2, 0.2, 0.2, 1.0));
        assert!(lights.is_light_activated(0));
        assert!(lights.is_light_on());
    }

    #[test]
    fn out_of_range_setters_do_nothing() {
        let mut lights = projector_light();
        let before = lights.clone();
        assert!(!lights.set_diffuse_light_color(5, Vec4::ONE));
        assert!(!lights.deactivate_light(1));
        assert!(!lights.set_spotlight_exponent(usize::MAX, 2.0));
        assert_eq!(lights, before);
    }

    #[test]
    fn in_range_setters_update_one_light() {
        let mut lights = projector_light();
        lights.add_light(Vec4::W, Vec4::ZERO, Vec4::ONE, Vec4::ONE);
        assert!(lights.set_specular_light_color(1, Vec4::new(0.1, 0.2, 0.3, 1.0)));
        assert!(lights.deactivate_light(0));

        assert_eq!(
            lights.light(1).unwrap().specular_color,
            Vec4::new(0.1, 0.2, 0.3, 1.0)
        );
        assert_eq!(
            lights.light(0).unwrap().specular_color,
            Vec4::new(0.9, 0.9, 0.9, 1.0)
        );
        assert!(!lights.is_light_activated(0));
        assert!(lights.is_light_activated(1));
    }

    #[test]
    fn toggling_twice_restores_the_switch() {
        let mut lights = projector_light();
        assert!(!lights.toggle_light_switch());
        assert!(lights.toggle_light_switch());
    }

    #[test]
    fn transfer_writes_each_light_with_its_own_flag() {
        let mut lights = projector_light();
        lights.add_spotlight(
            Vec4::new(0.0, 10.0, 0.0, 1.0),
            Vec4::ZERO,
            Vec4::ONE,
            Vec4::ONE,
            Vec3::NEG_Y,
            4.0,
            25.0,
            Vec3::new(1.0, 0.1, 0.0),
        );
        lights.deactivate_light(1);
        let mut program = program_for(&lights);
        lights.transfer_uniforms_to_shader(&mut program);

        let standard = program.standard().clone();
        assert_eq!(program.read_i32(standard.use_light), Some(1));
        assert_eq!(program.read_i32(standard.light_num), Some(2));
        assert_eq!(
            program.read_vec4(standard.global_ambient),
            Some(Vec4::new(0.2, 0.2, 0.2, 1.0))
        );
        assert_eq!(program.read_i32(standard.lights[0].light_switch), Some(1));
        assert_eq!(program.read_i32(standard.lights[1].light_switch), Some(0));
        assert_eq!(
            program.read_vec3(standard.lights[1].spotlight_direction),
            Some(Vec3::NEG_Y)
        );
        assert_eq!(program.read_f32(standard.lights[1].spotlight_cutoff_angle), Some(25.0));
    }

    #[test]
    fn switch_off_is_reflected_in_use_light() {
        let mut lights = projector_light();
        let mut program = program_for(&lights);
        lights.toggle_light_switch();
        lights.transfer_uniforms_to_shader(&mut program);
        assert_eq!(program.read_i32(program.standard().use_light), Some(0));
    }

    #[test]
    fn lights_beyond_resolved_locations_are_skipped() {
        let mut lights = projector_light();
        let mut program = program_for(&lights);
        lights.add_light(Vec4::new(1.0, 2.0, 3.0, 1.0), Vec4::ZERO, Vec4::ONE, Vec4::ONE);
        lights.transfer_uniforms_to_shader(&mut program);

        let second = program.location("lights[1].position");
        assert_eq!(program.read_vec4(second), Some(Vec4::ZERO));

        program.resolve_standard_locations(lights.light_count());
        lights.transfer_uniforms_to_shader(&mut program);
        assert_eq!(program.read_vec4(second), Some(Vec4::new(1.0, 2.0, 3.0, 1.0)));
    }
}
