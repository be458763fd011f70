use std::fmt;
use std::path::{Path, PathBuf};

use glam::{Mat4, Vec2, Vec3, Vec4};
use log::{debug, info, warn};

use crate::camera::Camera;
use crate::config::{ProjectorConfig, SlideConfig, WallConfig};
use crate::error::{MediaError, SceneError};
use crate::geometry::{GeometryObject, PrimitiveKind, TextureUpdate, BASE_TEXTURE_UNIT};
use crate::input::{Command, InputEvent, InputState, KeyBindings, MouseButton};
use crate::lights::LightSet;
use crate::media::{open_slide_source, Slide, SlideSource};
use crate::render::shared::{FRAGMENT_SHADER, VERTEX_SHADER};
use crate::render::{DrawList, GpuBackend, TextureExtent};
use crate::shader::{ShaderProgram, UniformLocation};

/// Selects the fragment path for each object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SceneObject {
    Wall = 0,
    Screen = 1,
    Projector = 2,
}

/// Where the projected slide comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideMode {
    Image,
    Video,
}

impl SlideMode {
    fn toggled(self) -> Self {
        match self {
            Self::Image => Self::Video,
            Self::Video => Self::Image,
        }
    }
}

impl fmt::Display for SlideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Video => f.write_str("video"),
        }
    }
}

/// Whether the event loop should keep running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneControl {
    Continue,
    Exit,
}

/// Snapshot used for start-up and headless reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSummary {
    pub mode: SlideMode,
    pub slide_path: PathBuf,
    pub slide_extent: Option<TextureExtent>,
    /// Width and height of the projector's virtual screen in world units.
    pub screen_size: Vec2,
    pub light_count: usize,
    pub light_on: bool,
}

#[derive(Debug, Clone, Copy)]
struct ProjectorLocations {
    which_object: UniformLocation,
    projector_view: UniformLocation,
    projector_projection: UniformLocation,
}

/// A projector casting a slide onto a three-sided wall, seen by a free viewer.
pub struct SlideProjectorScene {
    viewer: Camera,
    projector: Camera,
    lights: LightSet,
    shader: ShaderProgram,
    wall: GeometryObject,
    screen: GeometryObject,
    frustum: GeometryObject,
    slides: SlideConfig,
    mode: SlideMode,
    source: Option<Box<dyn SlideSource>>,
    input: InputState,
    bindings: KeyBindings,
    locations: ProjectorLocations,
}

impl SlideProjectorScene {
    /// Builds the shader, lights, geometry and first slide.
    pub fn new(config: &ProjectorConfig, gpu: &mut dyn GpuBackend) -> Result<Self, SceneError> {
        let bindings = config.key_bindings()?;
        let mut shader = ShaderProgram::new("slide-projector");
        shader.compile_and_link(VERTEX_SHADER, FRAGMENT_SHADER)?;

        let mut viewer = config.viewer.build();
        viewer.update_window_size(config.window.width as f32, config.window.height as f32);
        let projector = config.projector.build();

        let mut lights = LightSet::new();
        let light = &config.light;
        lights.add_light(
            projector.position().extend(1.0),
            Vec3::splat(light.ambient).extend(1.0),
            Vec3::splat(light.diffuse).extend(1.0),
            Vec3::splat(light.specular).extend(1.0),
        );

        let mut frustum = GeometryObject::new("projector-frustum");
        frustum.set_diffuse_reflection_color(Vec4::new(1.0, 1.0, 0.0, 1.0));

        let locations = ProjectorLocations {
            which_object: shader.register_custom_location("which_object"),
            projector_view: shader.register_custom_location("projector_view_matrix"),
            projector_projection: shader.register_custom_location("projector_projection_matrix"),
        };
        shader.resolve_standard_locations(lights.light_count());

        let mode = if config.slides.start_with_video {
            SlideMode::Video
        } else {
            SlideMode::Image
        };
        let mut scene = Self {
            viewer,
            projector,
            lights,
            shader,
            wall: GeometryObject::new("wall"),
            screen: GeometryObject::new("screen"),
            frustum,
            slides: config.slides.clone(),
            mode,
            source: None,
            input: InputState::new(),
            bindings,
            locations,
        };
        scene.build_wall(gpu, &config.wall)?;
        scene.prepare_slide(gpu)?;
        Ok(scene)
    }

    fn build_wall(&mut self, gpu: &mut dyn GpuBackend, wall: &WallConfig) -> Result<(), SceneError> {
        let (vertices, normals) = wall_faces(wall.size);
        self.wall
            .set_geometry(gpu, PrimitiveKind::TriangleList, &vertices, Some(&normals), None)
            .map_err(|source| SceneError::Geometry {
                name: "wall",
                source,
            })?;
        self.wall.set_diffuse_reflection_color(wall.color);
        Ok(())
    }

    /// Opens the source for the current mode and shows its first frame.
    fn prepare_slide(&mut self, gpu: &mut dyn GpuBackend) -> Result<(), MediaError> {
        let path = self.slide_path().to_path_buf();
        let mut source = open_slide_source(&path)?;
        let first = source.next_frame().ok_or_else(|| MediaError::Empty { path: path.clone() })?;
        self.show_slide(gpu, &first);
        self.source = Some(source);
        info!(
            "showing {} slide {} ({}x{})",
            self.mode,
            path.display(),
            first.width(),
            first.height()
        );
        Ok(())
    }

    /// Resizes the projector to the slide and uploads it into fresh texture storage.
    fn show_slide(&mut self, gpu: &mut dyn GpuBackend, slide: &Slide) {
        let pixels_per_unit = self.slides.pixels_per_unit.max(f32::EPSILON);
        self.projector.update_window_size(
            slide.width() as f32 / pixels_per_unit,
            slide.height() as f32 / pixels_per_unit,
        );
        self.screen.reallocate_texture(gpu, slide, BASE_TEXTURE_UNIT);
        self.rebuild_projector_geometry(gpu);
    }

    fn rebuild_projector_geometry(&mut self, gpu: &mut dyn GpuBackend) {
        let near = self.projector.near();
        let (screen_vertices, screen_uvs) = screen_quad(self.projector.near_plane_half_extent(), near);
        if let Err(err) = self.screen.set_geometry(
            gpu,
            PrimitiveKind::TriangleList,
            &screen_vertices,
            None,
            Some(&screen_uvs),
        ) {
            warn!("screen geometry rejected: {err}");
        }
        let lines = frustum_lines(self.projector.far_plane_half_extent(), self.projector.far());
        if let Err(err) = self
            .frustum
            .set_geometry(gpu, PrimitiveKind::LineList, &lines, None, None)
        {
            warn!("projector frustum rejected: {err}");
        }
    }

    fn slide_path(&self) -> &Path {
        match self.mode {
            SlideMode::Image => &self.slides.image,
            SlideMode::Video => &self.slides.video,
        }
    }

    /// Uploads the next clip frame. At the end of the clip the last frame stays on screen.
    pub fn advance_frame(&mut self, gpu: &mut dyn GpuBackend) {
        if self.mode != SlideMode::Video {
            return;
        }
        let Some(source) = self.source.as_mut() else {
            return;
        };
        let Some(frame) = source.next_frame() else {
            info!("end of clip {}", source.path().display());
            self.source = None;
            return;
        };
        match self.screen.update_texture(gpu, &frame, BASE_TEXTURE_UNIT) {
            TextureUpdate::Updated => {}
            TextureUpdate::DimensionMismatch { .. } | TextureUpdate::MissingTexture => {
                self.show_slide(gpu, &frame);
            }
            outcome => debug!("clip frame skipped: {outcome:?}"),
        }
    }

    /// Records the wall, the screen and the projector wireframe, in that order.
    pub fn record_frame(&mut self, draws: &mut DrawList) {
        draws.clear();
        self.draw_wall(draws);
        self.draw_screen(draws);
        self.draw_projector(draws);
    }

    fn draw_wall(&mut self, draws: &mut DrawList) {
        self.transfer_transforms(Mat4::IDENTITY);
        let locations = self.locations;
        self.shader
            .set_mat4(locations.projector_view, &self.projector.view_matrix());
        self.shader
            .set_mat4(locations.projector_projection, &self.projector.projection_matrix());
        self.shader
            .set_i32(locations.which_object, SceneObject::Wall as i32);
        self.wall.transfer_uniforms_to_shader(&mut self.shader);
        self.lights.transfer_uniforms_to_shader(&mut self.shader);
        self.bind_slide();
        self.wall.draw(&self.shader, draws);
    }

    fn draw_screen(&mut self, draws: &mut DrawList) {
        self.transfer_transforms(self.projector.inverse_view_matrix());
        self.shader
            .set_i32(self.locations.which_object, SceneObject::Screen as i32);
        self.screen.transfer_uniforms_to_shader(&mut self.shader);
        self.bind_slide();
        self.screen.draw(&self.shader, draws);
    }

    fn draw_projector(&mut self, draws: &mut DrawList) {
        self.transfer_transforms(self.projector.inverse_view_matrix());
        self.shader
            .set_i32(self.locations.which_object, SceneObject::Projector as i32);
        self.frustum.transfer_uniforms_to_shader(&mut self.shader);
        self.frustum.draw(&self.shader, draws);
    }

    fn bind_slide(&mut self) {
        let texture = self.screen.texture(BASE_TEXTURE_UNIT).map(|bound| bound.handle);
        self.shader.bind_texture_unit(BASE_TEXTURE_UNIT, texture);
    }

    fn transfer_transforms(&mut self, world: Mat4) {
        let view = self.viewer.view_matrix();
        let projection = self.viewer.projection_matrix();
        let standard = self.shader.standard();
        let (world_location, view_location, projection_location, mvp_location) = (
            standard.world_matrix,
            standard.view_matrix,
            standard.projection_matrix,
            standard.model_view_projection_matrix,
        );
        self.shader.set_mat4(world_location, &world);
        self.shader.set_mat4(view_location, &view);
        self.shader.set_mat4(projection_location, &projection);
        self.shader
            .set_mat4(mvp_location, &(projection * view * world));
    }

    /// Applies one input event.
    pub fn handle_event(&mut self, gpu: &mut dyn GpuBackend, event: InputEvent) -> SceneControl {
        match event {
            InputEvent::KeyPressed(key) => {
                self.input.set_key_down(key);
                if let Some(command) = self.bindings.command_for(key) {
                    return self.execute(command, gpu);
                }
            }
            InputEvent::KeyReleased(key) => self.input.set_key_up(key),
            InputEvent::MousePressed(button) => {
                self.input.set_mouse_button_down(button);
                if button == MouseButton::LEFT {
                    let point = self.input.mouse_position();
                    self.input.set_clicked_point(point);
                    self.active_camera_mut().set_moving_state(true);
                }
            }
            InputEvent::MouseReleased(button) => {
                self.input.set_mouse_button_up(button);
                if button == MouseButton::LEFT {
                    self.viewer.set_moving_state(false);
                    self.projector.set_moving_state(false);
                }
            }
            InputEvent::CursorMoved(position) => {
                self.input.set_mouse_position(position);
                self.drag(position);
            }
            InputEvent::Scrolled(offset) => {
                if offset >= 0.0 {
                    self.viewer.zoom_in();
                } else {
                    self.viewer.zoom_out();
                }
            }
            InputEvent::Resized { width, height } => {
                self.viewer.update_window_size(width as f32, height as f32);
            }
        }
        SceneControl::Continue
    }

    /// Runs a bound command.
    pub fn execute(&mut self, command: Command, gpu: &mut dyn GpuBackend) -> SceneControl {
        match command {
            Command::MoveForward => self.viewer.move_forward(1.0),
            Command::MoveBackward => self.viewer.move_backward(1.0),
            Command::MoveLeft => self.viewer.move_left(1.0),
            Command::MoveRight => self.viewer.move_right(1.0),
            Command::MoveUp => self.viewer.move_up(1.0),
            Command::MoveDown => self.viewer.move_down(1.0),
            Command::ResetCameras => {
                self.viewer.reset_camera();
                self.projector.reset_camera();
            }
            Command::ReplayVideo => {
                if self.mode == SlideMode::Video {
                    self.reload_slide(gpu);
                } else {
                    debug!("replay ignored outside video mode");
                }
            }
            Command::ToggleLight => {
                let on = self.lights.toggle_light_switch();
                info!("light turned {}", if on { "on" } else { "off" });
            }
            Command::ToggleSlideMode => {
                self.mode = self.mode.toggled();
                self.reload_slide(gpu);
            }
            Command::Quit => return SceneControl::Exit,
        }
        SceneControl::Continue
    }

    fn reload_slide(&mut self, gpu: &mut dyn GpuBackend) {
        if let Err(err) = self.prepare_slide(gpu) {
            self.source = None;
            warn!("keeping the current slide: {err}");
        }
    }

    fn active_camera_mut(&mut self) -> &mut Camera {
        if self.input.is_ctrl_down() {
            &mut self.projector
        } else {
            &mut self.viewer
        }
    }

    fn drag(&mut self, position: Vec2) {
        let point = position.round();
        let delta = point - self.input.clicked_point();
        let pitching = self.input.is_mouse_button_down(MouseButton::RIGHT);
        let camera = self.active_camera_mut();
        if !camera.is_moving() {
            return;
        }
        camera.move_forward(-delta.y);
        camera.rotate_around_world_y(-delta.x);
        if pitching {
            camera.pitch(-delta.y);
        }
        self.input.set_clicked_point(point);
    }

    /// Resizes the viewer's projection to a new window size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewer.update_window_size(width as f32, height as f32);
    }

    /// Returns every GPU resource owned by the scene.
    pub fn release(&mut self, gpu: &mut dyn GpuBackend) {
        self.wall.release(gpu);
        self.screen.release(gpu);
        self.frustum.release(gpu);
        self.shader.bind_texture_unit(BASE_TEXTURE_UNIT, None);
        self.source = None;
    }

    pub fn summary(&self) -> SceneSummary {
        SceneSummary {
            mode: self.mode,
            slide_path: self.slide_path().to_path_buf(),
            slide_extent: self.screen.texture(BASE_TEXTURE_UNIT).map(|bound| bound.extent),
            screen_size: self.projector.near_plane_half_extent() * 2.0,
            light_count: self.lights.light_count(),
            light_on: self.lights.is_light_on(),
        }
    }

    pub fn viewer(&self) -> &Camera {
        &self.viewer
    }

    pub fn projector(&self) -> &Camera {
        &self.projector
    }

    pub fn lights(&self) -> &LightSet {
        &self.lights
    }

    pub fn shader(&self) -> &ShaderProgram {
        &self.shader
    }

    pub fn wall(&self) -> &GeometryObject {
        &self.wall
    }

    pub fn screen(&self) -> &GeometryObject {
        &self.screen
    }

    pub fn projector_frustum(&self) -> &GeometryObject {
        &self.frustum
    }

    pub fn mode(&self) -> SlideMode {
        self.mode
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }
}

/// Three square faces on the z=0, y=0 and x=0 planes meeting at the origin.
fn wall_faces(size: f32) -> (Vec<Vec3>, Vec<Vec3>) {
    let s = size;
    let vertices = vec![
        Vec3::new(s, 0.0, 0.0),
        Vec3::new(s, s, 0.0),
        Vec3::new(0.0, s, 0.0),
        Vec3::new(s, 0.0, 0.0),
        Vec3::new(0.0, s, 0.0),
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(s, 0.0, s),
        Vec3::new(s, 0.0, 0.0),
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(s, 0.0, s),
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(0.0, 0.0, s),
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(0.0, s, 0.0),
        Vec3::new(0.0, s, s),
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(0.0, s, s),
        Vec3::new(0.0, 0.0, s),
    ];
    let normals = [Vec3::Z, Vec3::Y, Vec3::X]
        .into_iter()
        .flat_map(|normal| std::iter::repeat(normal).take(6))
        .collect();
    (vertices, normals)
}

/// Quad on the projector's near plane, in projector space.
fn screen_quad(half: Vec2, near: f32) -> (Vec<Vec3>, Vec<Vec2>) {
    let z = -near;
    let vertices = vec![
        Vec3::new(half.x, -half.y, z),
        Vec3::new(half.x, half.y, z),
        Vec3::new(-half.x, half.y, z),
        Vec3::new(half.x, -half.y, z),
        Vec3::new(-half.x, half.y, z),
        Vec3::new(-half.x, -half.y, z),
    ];
    let uvs = vec![
        Vec2::new(1.0, 0.0),
        Vec2::new(1.0, 1.0),
        Vec2::new(0.0, 1.0),
        Vec2::new(1.0, 0.0),
        Vec2::new(0.0, 1.0),
        Vec2::new(0.0, 0.0),
    ];
    (vertices, uvs)
}

/// Apex-to-corner edges and the far rectangle of the projector frustum, as line pairs.
fn frustum_lines(half: Vec2, far: f32) -> Vec<Vec3> {
    let z = -far;
    let corners = [
        Vec3::new(half.x, half.y, z),
        Vec3::new(half.x, -half.y, z),
        Vec3::new(-half.x, -half.y, z),
        Vec3::new(-half.x, half.y, z),
    ];
    let mut lines = Vec::with_capacity(16);
    for corner in corners {
        lines.push(Vec3::ZERO);
        lines.push(corner);
    }
    for (index, corner) in corners.iter().enumerate() {
        lines.push(*corner);
        lines.push(corners[(index + 1) % corners.len()]);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use image::{codecs::gif::GifEncoder, Delay, Frame, Rgba, RgbaImage};
    use tempfile::TempDir;

    use crate::input::{KeyCode, NamedKey};
    use crate::render::{DrawCall, HeadlessGpu};

    struct Fixture {
        _dir: TempDir,
        gpu: HeadlessGpu,
        scene: SlideProjectorScene,
    }

    fn fixture(with_clip: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("slide.png");
        RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]))
            .save(&image)
            .unwrap();
        let video = dir.path().join("clip.gif");
        if with_clip {
            let mut encoder = GifEncoder::new(std::fs::File::create(&video).unwrap());
            for shade in [40u8, 120, 200] {
                let frame = RgbaImage::from_pixel(8, 2, Rgba([0, shade, 0, 255]));
                encoder
                    .encode_frame(Frame::from_parts(frame, 0, 0, Delay::from_numer_denom_ms(40, 1)))
                    .unwrap();
            }
        }

        let mut config = ProjectorConfig::default();
        config.slides.image = image;
        config.slides.video = video;
        let mut gpu = HeadlessGpu::new();
        let scene = SlideProjectorScene::new(&config, &mut gpu).unwrap();
        Fixture {
            _dir: dir,
            gpu,
            scene,
        }
    }

    fn press(fixture: &mut Fixture, key: KeyCode) -> SceneControl {
        let control = fixture
            .scene
            .handle_event(&mut fixture.gpu, InputEvent::KeyPressed(key));
        fixture
            .scene
            .handle_event(&mut fixture.gpu, InputEvent::KeyReleased(key));
        control
    }

    fn read_i32(call: &DrawCall, location: UniformLocation) -> i32 {
        let offset = location.offset().unwrap() as usize;
        i32::from_ne_bytes(call.uniforms[offset..offset + 4].try_into().unwrap())
    }

    fn frame(fixture: &mut Fixture) -> DrawList {
        let mut draws = DrawList::new();
        fixture.scene.record_frame(&mut draws);
        fixture.gpu.submit(&draws);
        draws
    }

    #[test]
    fn builds_the_projector_scene() {
        let fixture = fixture(false);
        let scene = &fixture.scene;
        assert_eq!(scene.wall().vertex_count(), 18);
        assert_eq!(scene.screen().vertex_count(), 6);
        assert_eq!(scene.projector_frustum().vertex_count(), 16);
        assert_eq!(scene.projector_frustum().primitive(), PrimitiveKind::LineList);

        let lights = scene.lights();
        assert_eq!(lights.light_count(), 1);
        assert!(lights.is_light_on());
        assert!(lights.is_light_activated(0));
        assert_eq!(lights.global_ambient(), Vec4::new(0.2, 0.2, 0.2, 1.0));
        assert_eq!(
            lights.light(0).unwrap().position,
            Vec4::new(40.0, 30.0, 20.0, 1.0)
        );

        let texture = scene.screen().texture(BASE_TEXTURE_UNIT).unwrap();
        assert_eq!(texture.extent, TextureExtent::new(4, 4));
        assert_eq!(fixture.gpu.live_textures(), 1);
    }

    #[test]
    fn frames_draw_wall_screen_then_projector() {
        let mut fixture = fixture(false);
        let draws = frame(&mut fixture);
        assert_eq!(
            fixture.gpu.last_frame(),
            &["wall", "screen", "projector-frustum"]
        );

        let scene = &fixture.scene;
        let which = scene.shader().custom_location("which_object");
        let calls = draws.calls();
        assert_eq!(read_i32(&calls[0], which), SceneObject::Wall as i32);
        assert_eq!(read_i32(&calls[1], which), SceneObject::Screen as i32);
        assert_eq!(read_i32(&calls[2], which), SceneObject::Projector as i32);

        let slide = scene.screen().texture(BASE_TEXTURE_UNIT).map(|t| t.handle);
        assert_eq!(calls[0].texture, slide);
        assert_eq!(calls[1].texture, slide);
        assert_eq!(calls[2].primitive, PrimitiveKind::LineList);
    }

    #[test]
    fn screen_fits_the_projector_frustum() {
        let fixture = fixture(false);
        let projector = fixture.scene.projector();
        assert_relative_eq!(projector.frustum().aspect(), 1.0);
        let summary = fixture.scene.summary();
        let expected = 2.0 * 10.0 * 15f32.to_radians().tan();
        assert_relative_eq!(summary.screen_size.x, expected, epsilon = 1e-4);
        assert_relative_eq!(summary.screen_size.y, expected, epsilon = 1e-4);
    }

    #[test]
    fn light_key_toggles_use_light() {
        let mut fixture = fixture(false);
        press(&mut fixture, KeyCode::Character('L'));
        assert!(!fixture.scene.lights().is_light_on());

        let draws = frame(&mut fixture);
        let use_light = fixture.scene.shader().standard().use_light;
        assert_eq!(read_i32(&draws.calls()[0], use_light), 0);

        press(&mut fixture, KeyCode::Character('L'));
        assert!(fixture.scene.lights().is_light_on());
    }

    #[test]
    fn arrow_keys_move_the_viewer_and_reset_restores_it() {
        let mut fixture = fixture(false);
        let start = fixture.scene.viewer().position();
        press(&mut fixture, KeyCode::Named(NamedKey::Up));
        press(&mut fixture, KeyCode::Character('W'));
        assert!(fixture.scene.viewer().position().distance(start) > 0.1);

        press(&mut fixture, KeyCode::Character('I'));
        assert_eq!(fixture.scene.viewer().position(), start);
    }

    #[test]
    fn ctrl_drag_moves_the_projector_only() {
        let mut fixture = fixture(false);
        let viewer = fixture.scene.viewer().clone();
        let projector = fixture.scene.projector().position();
        let gpu = &mut fixture.gpu;
        let scene = &mut fixture.scene;

        scene.handle_event(gpu, InputEvent::CursorMoved(Vec2::new(100.0, 100.0)));
        scene.handle_event(gpu, InputEvent::KeyPressed(KeyCode::Named(NamedKey::LeftCtrl)));
        scene.handle_event(gpu, InputEvent::MousePressed(MouseButton::LEFT));
        scene.handle_event(gpu, InputEvent::CursorMoved(Vec2::new(120.0, 80.0)));
        scene.handle_event(gpu, InputEvent::MouseReleased(MouseButton::LEFT));

        assert!(scene.projector().position().distance(projector) > 1.0);
        assert_eq!(scene.viewer().position(), viewer.position());
        assert!(!scene.projector().is_moving());
        assert_eq!(scene.input().clicked_point(), Vec2::new(120.0, 80.0));
    }

    #[test]
    fn drag_without_press_does_nothing() {
        let mut fixture = fixture(false);
        let viewer = fixture.scene.viewer().clone();
        fixture
            .scene
            .handle_event(&mut fixture.gpu, InputEvent::CursorMoved(Vec2::new(300.0, 10.0)));
        assert_eq!(fixture.scene.viewer(), &viewer);
    }

    #[test]
    fn wheel_zooms_the_viewer() {
        let mut fixture = fixture(false);
        fixture
            .scene
            .handle_event(&mut fixture.gpu, InputEvent::Scrolled(1.0));
        assert_relative_eq!(fixture.scene.viewer().fov_degrees(), 44.0);
        fixture
            .scene
            .handle_event(&mut fixture.gpu, InputEvent::Scrolled(-1.0));
        fixture
            .scene
            .handle_event(&mut fixture.gpu, InputEvent::Scrolled(-1.0));
        assert_relative_eq!(fixture.scene.viewer().fov_degrees(), 46.0);
    }

    #[test]
    fn quit_keys_exit() {
        let mut fixture = fixture(false);
        assert_eq!(
            press(&mut fixture, KeyCode::Character('Q')),
            SceneControl::Exit
        );
        assert_eq!(
            press(&mut fixture, KeyCode::Named(NamedKey::Escape)),
            SceneControl::Exit
        );
        assert_eq!(
            press(&mut fixture, KeyCode::Character('Z')),
            SceneControl::Continue
        );
    }

    #[test]
    fn missing_clip_keeps_the_current_slide() {
        let mut fixture = fixture(false);
        let texture = fixture.scene.screen().texture(BASE_TEXTURE_UNIT);
        press(&mut fixture, KeyCode::Named(NamedKey::Enter));

        assert_eq!(fixture.scene.mode(), SlideMode::Video);
        assert_eq!(fixture.scene.screen().texture(BASE_TEXTURE_UNIT), texture);
        fixture.scene.advance_frame(&mut fixture.gpu);
        assert_eq!(frame(&mut fixture).len(), 3);
    }

    #[test]
    fn clip_frames_stream_into_the_screen_texture() {
        let mut fixture = fixture(true);
        press(&mut fixture, KeyCode::Named(NamedKey::Enter));
        let texture = fixture.scene.screen().texture(BASE_TEXTURE_UNIT).unwrap();
        assert_eq!(texture.extent, TextureExtent::new(8, 2));
        assert_relative_eq!(fixture.scene.projector().frustum().aspect(), 4.0);
        assert_eq!(fixture.gpu.texture_writes(texture.handle), 1);
        let first_green = fixture.gpu.texture_pixels(texture.handle).unwrap()[1];

        for _ in 0..5 {
            fixture.scene.advance_frame(&mut fixture.gpu);
        }
        assert_eq!(fixture.gpu.texture_writes(texture.handle), 3);
        let last_green = fixture.gpu.texture_pixels(texture.handle).unwrap()[1];
        assert!(last_green > first_green);

        press(&mut fixture, KeyCode::Character('R'));
        let replayed = fixture.scene.screen().texture(BASE_TEXTURE_UNIT).unwrap();
        assert_eq!(fixture.gpu.texture_pixels(replayed.handle).unwrap()[1], first_green);

        press(&mut fixture, KeyCode::Named(NamedKey::Enter));
        assert_eq!(fixture.scene.mode(), SlideMode::Image);
        assert_eq!(
            fixture.scene.summary().slide_extent,
            Some(TextureExtent::new(4, 4))
        );
    }

    #[test]
    fn missing_initial_slide_is_fatal() {
        let mut config = ProjectorConfig::default();
        config.slides.image = PathBuf::from("no/such/slide.png");
        let mut gpu = HeadlessGpu::new();
        let err = SlideProjectorScene::new(&config, &mut gpu).err().unwrap();
        assert!(matches!(err, SceneError::Media(MediaError::Io { .. })));
    }

    #[test]
    fn release_frees_all_resources() {
        let mut fixture = fixture(false);
        fixture.scene.release(&mut fixture.gpu);
        assert_eq!(fixture.gpu.live_buffers(), 0);
        assert_eq!(fixture.gpu.live_textures(), 0);
    }

    #[test]
    fn wall_faces_share_the_origin_corner() {
        let (vertices, normals) = wall_faces(30.0);
        assert_eq!(vertices.len(), 18);
        assert_eq!(normals.len(), 18);
        assert_eq!(normals[0], Vec3::Z);
        assert_eq!(normals[17], Vec3::X);
        assert!(vertices.iter().all(|v| v.min_element() >= 0.0 && v.max_element() <= 30.0));
    }

    #[test]
    fn frustum_lines_close_the_far_rectangle() {
        let lines = frustum_lines(Vec2::new(2.0, 1.0), 60.0);
        assert_eq!(lines.len(), 16);
        assert_eq!(lines[0], Vec3::ZERO);
        assert_eq!(lines[15], lines[8]);
    }
}
