use std::collections::{BTreeMap, HashMap};

use bytemuck::bytes_of;
use glam::{Mat4, Vec3, Vec4};
use log::{debug, error, info, warn};
use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, ArraySize, Module, ScalarKind, TypeInner, VectorSize};

use crate::error::{ShaderError, ShaderStage};
use crate::render::TextureHandle;

/// Value type of one uniform field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Float,
    Int,
    Uint,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
    Other,
}

impl UniformKind {
    fn size(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::Uint => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Vec4 => 16,
            Self::Mat4 => 64,
            Self::Other => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct UniformSlot {
    offset: u32,
    kind: UniformKind,
}

/// Byte location of a uniform inside the program's block.
///
/// [`UniformLocation::INVALID`] marks a name the linked program does not expose. Writes through
/// it are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UniformLocation(Option<UniformSlot>);

impl UniformLocation {
    pub const INVALID: Self = Self(None);

    pub fn is_valid(self) -> bool {
        self.0.is_some()
    }

    pub fn offset(self) -> Option<u32> {
        self.0.map(|slot| slot.offset)
    }

    pub fn kind(self) -> Option<UniformKind> {
        self.0.map(|slot| slot.kind)
    }
}

/// Flattened view of the `var<uniform>` block shared by both stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlockLayout {
    pub group: u32,
    pub binding: u32,
    pub size: u32,
    fields: BTreeMap<String, UniformSlot>,
}

impl UniformBlockLayout {
    /// Locates a field by its flattened path such as `lights[0].position`.
    pub fn location(&self, name: &str) -> UniformLocation {
        UniformLocation(self.fields.get(name).copied())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// Locations of the material uniforms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialLocations {
    pub emission_color: UniformLocation,
    pub ambient_color: UniformLocation,
    pub diffuse_color: UniformLocation,
    pub specular_color: UniformLocation,
    pub specular_exponent: UniformLocation,
}

/// Locations of one entry in the light array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightLocations {
    pub light_switch: UniformLocation,
    pub position: UniformLocation,
    pub ambient_color: UniformLocation,
    pub diffuse_color: UniformLocation,
    pub specular_color: UniformLocation,
    pub spotlight_direction: UniformLocation,
    pub spotlight_exponent: UniformLocation,
    pub spotlight_cutoff_angle: UniformLocation,
    pub attenuation_factors: UniformLocation,
}

/// Locations every program built for the scene is expected to expose.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandardLocations {
    pub world_matrix: UniformLocation,
    pub view_matrix: UniformLocation,
    pub projection_matrix: UniformLocation,
    pub model_view_projection_matrix: UniformLocation,
    pub material: MaterialLocations,
    pub use_light: UniformLocation,
    pub light_num: UniformLocation,
    pub global_ambient: UniformLocation,
    pub lights: Vec<LightLocations>,
}

#[derive(Debug)]
struct LinkedProgram {
    vertex_source: String,
    fragment_source: String,
    layout: UniformBlockLayout,
    vertex_entry_points: Vec<String>,
    fragment_entry_points: Vec<String>,
}

/// WGSL vertex/fragment pair plus the CPU copy of its uniform block.
///
/// Uniform writes land in a byte block laid out exactly as the shaders expect. The block is
/// captured by every recorded draw, so values set before one draw do not leak into draws that
/// were already recorded.
#[derive(Debug)]
pub struct ShaderProgram {
    label: String,
    linked: Option<LinkedProgram>,
    standard: StandardLocations,
    custom: HashMap<String, UniformLocation>,
    block: Vec<u8>,
    texture_units: BTreeMap<u32, TextureHandle>,
    sampler_unit: u32,
}

impl ShaderProgram {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            linked: None,
            standard: StandardLocations::default(),
            custom: HashMap::new(),
            block: Vec::new(),
            texture_units: BTreeMap::new(),
            sampler_unit: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Compiles both stages and links them into a usable program.
    ///
    /// Diagnostics of failing stages are logged. On failure the program is left unlinked and
    /// every location resolves to [`UniformLocation::INVALID`].
    pub fn compile_and_link(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<(), ShaderError> {
        self.linked = None;
        self.standard = StandardLocations::default();
        self.block.clear();

        let vertex = compile_stage(ShaderStage::Vertex, vertex_source);
        let fragment = compile_stage(ShaderStage::Fragment, fragment_source);
        let (vertex, fragment) = match (vertex, fragment) {
            (Ok(vertex), Ok(fragment)) => (vertex, fragment),
            (Err(err), _) | (_, Err(err)) => return Err(err),
        };

        let vertex_entry_points = entry_points(&vertex, naga::ShaderStage::Vertex);
        if vertex_entry_points.is_empty() {
            return Err(ShaderError::MissingEntryPoint {
                stage: ShaderStage::Vertex,
            });
        }
        let fragment_entry_points = entry_points(&fragment, naga::ShaderStage::Fragment);
        if fragment_entry_points.is_empty() {
            return Err(ShaderError::MissingEntryPoint {
                stage: ShaderStage::Fragment,
            });
        }

        let layout = match (uniform_block(&vertex), uniform_block(&fragment)) {
            (Some(v), Some(f)) if v != f => {
                error!("{}: uniform blocks differ between stages", self.label);
                return Err(ShaderError::UniformMismatch);
            }
            (Some(layout), _) | (None, Some(layout)) => layout,
            (None, None) => return Err(ShaderError::MissingUniformBlock),
        };

        info!(
            "{}: linked program with {} byte uniform block ({} fields)",
            self.label,
            layout.size,
            layout.fields.len()
        );
        self.block = vec![0; layout.size as usize];
        for location in self.custom.values_mut() {
            *location = UniformLocation::INVALID;
        }
        let names: Vec<String> = self.custom.keys().cloned().collect();
        self.linked = Some(LinkedProgram {
            vertex_source: vertex_source.to_string(),
            fragment_source: fragment_source.to_string(),
            layout,
            vertex_entry_points,
            fragment_entry_points,
        });
        for name in names {
            self.register_custom_location(&name);
        }
        Ok(())
    }

    pub fn is_linked(&self) -> bool {
        self.linked.is_some()
    }

    pub fn vertex_source(&self) -> Option<&str> {
        self.linked.as_ref().map(|p| p.vertex_source.as_str())
    }

    pub fn fragment_source(&self) -> Option<&str> {
        self.linked.as_ref().map(|p| p.fragment_source.as_str())
    }

    pub fn uniform_layout(&self) -> Option<&UniformBlockLayout> {
        self.linked.as_ref().map(|p| &p.layout)
    }

    /// Whether the linked stage declares an entry point called `name`.
    pub fn has_entry_point(&self, stage: ShaderStage, name: &str) -> bool {
        let Some(program) = &self.linked else {
            return false;
        };
        let names = match stage {
            ShaderStage::Vertex => &program.vertex_entry_points,
            ShaderStage::Fragment => &program.fragment_entry_points,
        };
        names.iter().any(|entry| entry == name)
    }

    /// Looks up a flattened uniform name; unknown names give the sentinel.
    pub fn location(&self, name: &str) -> UniformLocation {
        self.uniform_layout()
            .map_or(UniformLocation::INVALID, |layout| layout.location(name))
    }

    /// Resolves the transform, material and light locations for `light_count` lights.
    pub fn resolve_standard_locations(&mut self, light_count: usize) {
        let material = MaterialLocations {
            emission_color: self.location("material.emission_color"),
            ambient_color: self.location("material.ambient_color"),
            diffuse_color: self.location("material.diffuse_color"),
            specular_color: self.location("material.specular_color"),
            specular_exponent: self.location("material.specular_exponent"),
        };
        let lights: Vec<LightLocations> = (0..light_count)
            .map(|index| self.light_locations(index))
            .collect();
        if let Some(missing) = lights.iter().position(|l| !l.position.is_valid()) {
            if self.is_linked() {
                warn!(
                    "{}: light {missing} and above are not exposed by the shader",
                    self.label
                );
            }
        }
        self.standard = StandardLocations {
            world_matrix: self.location("world_matrix"),
            view_matrix: self.location("view_matrix"),
            projection_matrix: self.location("projection_matrix"),
            model_view_projection_matrix: self.location("model_view_projection_matrix"),
            material,
            use_light: self.location("use_light"),
            light_num: self.location("light_num"),
            global_ambient: self.location("global_ambient"),
            lights,
        };
    }

    fn light_locations(&self, index: usize) -> LightLocations {
        let field = |name: &str| self.location(&format!("lights[{index}].{name}"));
        LightLocations {
            light_switch: field("light_switch"),
            position: field("position"),
            ambient_color: field("ambient_color"),
            diffuse_color: field("diffuse_color"),
            specular_color: field("specular_color"),
            spotlight_direction: field("spotlight_direction"),
            spotlight_exponent: field("spotlight_exponent"),
            spotlight_cutoff_angle: field("spotlight_cutoff_angle"),
            attenuation_factors: field("attenuation_factors"),
        }
    }

    pub fn standard(&self) -> &StandardLocations {
        &self.standard
    }

    /// Registers an application-specific uniform and returns its location.
    pub fn register_custom_location(&mut self, name: &str) -> UniformLocation {
        let location = self.location(name);
        if !location.is_valid() {
            debug!("{}: custom uniform `{name}` not found", self.label);
        }
        self.custom.insert(name.to_string(), location);
        location
    }

    /// Location of a previously registered custom uniform.
    pub fn custom_location(&self, name: &str) -> UniformLocation {
        self.custom
            .get(name)
            .copied()
            .unwrap_or(UniformLocation::INVALID)
    }

    pub fn set_mat4(&mut self, location: UniformLocation, value: &Mat4) {
        self.write(location, UniformKind::Mat4, bytes_of(&value.to_cols_array()));
    }

    pub fn set_vec4(&mut self, location: UniformLocation, value: Vec4) {
        self.write(location, UniformKind::Vec4, bytes_of(&value.to_array()));
    }

    pub fn set_vec3(&mut self, location: UniformLocation, value: Vec3) {
        self.write(location, UniformKind::Vec3, bytes_of(&value.to_array()));
    }

    pub fn set_f32(&mut self, location: UniformLocation, value: f32) {
        self.write(location, UniformKind::Float, bytes_of(&value));
    }

    pub fn set_i32(&mut self, location: UniformLocation, value: i32) {
        self.write(location, UniformKind::Int, bytes_of(&value));
    }

    fn write(&mut self, location: UniformLocation, kind: UniformKind, bytes: &[u8]) {
        let Some(slot) = location.0 else {
            return;
        };
        if slot.kind != kind {
            debug!(
                "{}: ignoring {kind:?} write to {:?} uniform at {}",
                self.label, slot.kind, slot.offset
            );
            return;
        }
        let start = slot.offset as usize;
        if let Some(target) = self.block.get_mut(start..start + bytes.len()) {
            target.copy_from_slice(bytes);
        }
    }

    fn read(&self, location: UniformLocation, kind: UniformKind) -> Option<&[u8]> {
        let slot = location.0.filter(|slot| slot.kind == kind)?;
        let start = slot.offset as usize;
        self.block.get(start..start + kind.size())
    }

    pub fn read_mat4(&self, location: UniformLocation) -> Option<Mat4> {
        let bytes = self.read(location, UniformKind::Mat4)?;
        let mut cols = [0.0f32; 16];
        bytemuck::cast_slice_mut::<f32, u8>(&mut cols).copy_from_slice(bytes);
        Some(Mat4::from_cols_array(&cols))
    }

    pub fn read_vec4(&self, location: UniformLocation) -> Option<Vec4> {
        let bytes = self.read(location, UniformKind::Vec4)?;
        let mut values = [0.0f32; 4];
        bytemuck::cast_slice_mut::<f32, u8>(&mut values).copy_from_slice(bytes);
        Some(Vec4::from_array(values))
    }

    pub fn read_vec3(&self, location: UniformLocation) -> Option<Vec3> {
        let bytes = self.read(location, UniformKind::Vec3)?;
        let mut values = [0.0f32; 3];
        bytemuck::cast_slice_mut::<f32, u8>(&mut values).copy_from_slice(bytes);
        Some(Vec3::from_array(values))
    }

    pub fn read_f32(&self, location: UniformLocation) -> Option<f32> {
        let bytes = self.read(location, UniformKind::Float)?;
        Some(f32::from_ne_bytes(bytes.try_into().ok()?))
    }

    pub fn read_i32(&self, location: UniformLocation) -> Option<i32> {
        let bytes = self.read(location, UniformKind::Int)?;
        Some(i32::from_ne_bytes(bytes.try_into().ok()?))
    }

    /// Current contents of the uniform block.
    pub fn uniform_bytes(&self) -> &[u8] {
        &self.block
    }

    /// Binds `texture` to `unit`; `None` clears the unit.
    pub fn bind_texture_unit(&mut self, unit: u32, texture: Option<TextureHandle>) {
        match texture {
            Some(texture) => {
                self.texture_units.insert(unit, texture);
            }
            None => {
                self.texture_units.remove(&unit);
            }
        }
    }

    pub fn bound_texture(&self, unit: u32) -> Option<TextureHandle> {
        self.texture_units.get(&unit).copied()
    }

    /// Selects the unit the fragment stage samples from.
    pub fn set_sampler_unit(&mut self, unit: u32) {
        self.sampler_unit = unit;
    }

    pub fn sampler_unit(&self) -> u32 {
        self.sampler_unit
    }

    /// Texture bound to the sampled unit.
    pub fn sampled_texture(&self) -> Option<TextureHandle> {
        self.bound_texture(self.sampler_unit)
    }
}

fn compile_stage(stage: ShaderStage, source: &str) -> Result<Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|err| {
        stage_failure(stage, err.emit_to_string(source))
    })?;
    Validator::new(ValidationFlags::all(), Capabilities::default())
        .validate(&module)
        .map_err(|err| stage_failure(stage, err.emit_to_string(source)))?;
    Ok(module)
}

fn stage_failure(stage: ShaderStage, log: String) -> ShaderError {
    error!(" === {stage} shader log ===\n{log}");
    ShaderError::Compile { stage, log }
}

fn entry_points(module: &Module, stage: naga::ShaderStage) -> Vec<String> {
    module
        .entry_points
        .iter()
        .filter(|entry| entry.stage == stage)
        .map(|entry| entry.name.clone())
        .collect()
}

fn uniform_block(module: &Module) -> Option<UniformBlockLayout> {
    let (_, global) = module
        .global_variables
        .iter()
        .find(|(_, global)| global.space == AddressSpace::Uniform)?;
    let binding = global.binding.as_ref()?;
    let inner = &module.types[global.ty].inner;
    let size = match inner {
        TypeInner::Struct { span, .. } => *span,
        other => other.size(module.to_ctx()),
    };
    let mut fields = BTreeMap::new();
    flatten(module, global.ty, String::new(), 0, &mut fields);
    Some(UniformBlockLayout {
        group: binding.group,
        binding: binding.binding,
        size,
        fields,
    })
}

fn flatten(
    module: &Module,
    ty: naga::Handle<naga::Type>,
    path: String,
    offset: u32,
    out: &mut BTreeMap<String, UniformSlot>,
) {
    match &module.types[ty].inner {
        TypeInner::Struct { members, .. } => {
            for member in members {
                let Some(name) = member.name.as_deref() else {
                    continue;
                };
                let member_path = if path.is_empty() {
                    name.to_string()
                } else {
                    format!("{path}.{name}")
                };
                flatten(module, member.ty, member_path, offset + member.offset, out);
            }
        }
        TypeInner::Array {
            base,
            size: ArraySize::Constant(count),
            stride,
        } => {
            for index in 0..count.get() {
                flatten(
                    module,
                    *base,
                    format!("{path}[{index}]"),
                    offset + index * stride,
                    out,
                );
            }
        }
        inner => {
            out.insert(
                path,
                UniformSlot {
                    offset,
                    kind: classify(inner),
                },
            );
        }
    }
}

fn classify(inner: &TypeInner) -> UniformKind {
    match inner {
        TypeInner::Scalar(scalar) => match scalar.kind {
            ScalarKind::Float if scalar.width == 4 => UniformKind::Float,
            ScalarKind::Sint => UniformKind::Int,
            ScalarKind::Uint => UniformKind::Uint,
            _ => UniformKind::Other,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => match size {
            VectorSize::Bi => UniformKind::Vec2,
            VectorSize::Tri => UniformKind::Vec3,
            VectorSize::Quad => UniformKind::Vec4,
        },
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            ..
        } => UniformKind::Mat4,
        _ => UniformKind::Other,
    }
}
