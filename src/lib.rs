//! A slide projector demo: a virtual projector casts an image or an animated
//! clip onto a three-sided wall while a free-flying viewer looks on.
//!
//! Scene state (geometry, lights, cameras and the shader's uniform block) is
//! kept on the CPU and recorded into a [`DrawList`] every frame. The wgpu
//! [`Renderer`] replays that list on a window; [`HeadlessGpu`] records it for
//! tests and for `--summary-only` runs.

pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod geometry;
pub mod input;
pub mod lights;
pub mod media;
pub mod render;
pub mod scene;
pub mod shader;

pub use camera::{Camera, Frustum, MotionSettings, ProjectionMode};
pub use config::ProjectorConfig;
pub use error::{ConfigError, GeometryError, MediaError, SceneError, ShaderError, ShaderStage};
pub use geometry::{GeometryObject, Material, PrimitiveKind, TextureUpdate, VertexLayout};
pub use input::{Command, InputEvent, InputState, KeyBindings, KeyCode, MouseButton, NamedKey};
pub use lights::{Light, LightSet};
pub use media::{open_slide_source, Slide, SlideSource};
pub use render::{DrawCall, DrawList, GpuBackend, HeadlessGpu, Renderer, TextureExtent};
pub use scene::{SceneControl, SceneObject, SceneSummary, SlideMode, SlideProjectorScene};
pub use shader::{ShaderProgram, UniformLocation};
