use slotmap::new_key_type;

use crate::geometry::{PrimitiveKind, VertexLayout};

new_key_type! {
    /// Vertex buffer owned by the active backend.
    pub struct BufferHandle;
    /// 2D RGBA texture owned by the active backend.
    pub struct TextureHandle;
}

/// Pixel dimensions of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureExtent {
    pub width: u32,
    pub height: u32,
}

impl TextureExtent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Resource operations the scene needs from a GPU.
///
/// Implemented by the wgpu [`crate::render::Renderer`] and by [`crate::render::HeadlessGpu`].
pub trait GpuBackend {
    /// Uploads interleaved vertex data into a new immutable buffer.
    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> BufferHandle;

    fn release_buffer(&mut self, buffer: BufferHandle);

    /// Allocates an RGBA8 texture without initialising its contents.
    fn create_texture(&mut self, label: &str, extent: TextureExtent) -> TextureHandle;

    /// Replaces the full contents of `texture`. `rgba` holds `extent` pixels bottom row first.
    fn write_texture(&mut self, texture: TextureHandle, extent: TextureExtent, rgba: &[u8]);

    fn release_texture(&mut self, texture: TextureHandle);
}

/// One recorded draw with the uniform block captured at record time.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub label: String,
    pub buffer: BufferHandle,
    pub layout: VertexLayout,
    pub primitive: PrimitiveKind,
    pub vertex_count: u32,
    pub texture: Option<TextureHandle>,
    pub uniforms: Vec<u8>,
}

/// Ordered draws for one frame.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    calls: Vec<DrawCall>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    pub fn push(&mut self, call: DrawCall) {
        self.calls.push(call);
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn calls(&self) -> &[DrawCall] {
        &self.calls
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DrawCall> {
        self.calls.iter()
    }
}

impl<'a> IntoIterator for &'a DrawList {
    type Item = &'a DrawCall;
    type IntoIter = std::slice::Iter<'a, DrawCall>;

    fn into_iter(self) -> Self::IntoIter {
        self.calls.iter()
    }
}
