pub mod common;
pub mod headless;
pub mod native;
pub(crate) mod shared;

pub use common::{BufferHandle, DrawCall, DrawList, GpuBackend, TextureExtent, TextureHandle};
pub use headless::HeadlessGpu;
pub use native::Renderer;
