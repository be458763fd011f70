use log::debug;
use slotmap::SlotMap;

use super::common::{BufferHandle, DrawList, GpuBackend, TextureExtent, TextureHandle};

/// CPU-only backend used by `--summary-only` runs and tests.
///
/// Keeps every uploaded byte so callers can inspect what a real GPU would have received.
#[derive(Debug, Default)]
pub struct HeadlessGpu {
    buffers: SlotMap<BufferHandle, HeadlessBuffer>,
    textures: SlotMap<TextureHandle, HeadlessTexture>,
    frames_submitted: usize,
    last_frame: Vec<String>,
}

#[derive(Debug)]
struct HeadlessBuffer {
    label: String,
    contents: Vec<u8>,
}

#[derive(Debug)]
struct HeadlessTexture {
    label: String,
    extent: TextureExtent,
    writes: usize,
    pixels: Vec<u8>,
}

impl HeadlessGpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts a finished frame. Only the draw labels are retained.
    pub fn submit(&mut self, draws: &DrawList) {
        self.frames_submitted += 1;
        self.last_frame = draws.iter().map(|call| call.label.clone()).collect();
        debug!(
            "headless frame {} with {} draws",
            self.frames_submitted,
            draws.len()
        );
    }

    pub fn frames_submitted(&self) -> usize {
        self.frames_submitted
    }

    /// Labels of the draws in the most recent frame, in submission order.
    pub fn last_frame(&self) -> &[String] {
        &self.last_frame
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(buffer).map(|b| b.contents.as_slice())
    }

    pub fn buffer_label(&self, buffer: BufferHandle) -> Option<&str> {
        self.buffers.get(buffer).map(|b| b.label.as_str())
    }

    pub fn texture_extent(&self, texture: TextureHandle) -> Option<TextureExtent> {
        self.textures.get(texture).map(|t| t.extent)
    }

    pub fn texture_label(&self, texture: TextureHandle) -> Option<&str> {
        self.textures.get(texture).map(|t| t.label.as_str())
    }

    /// Number of full uploads the texture has received.
    pub fn texture_writes(&self, texture: TextureHandle) -> usize {
        self.textures.get(texture).map_or(0, |t| t.writes)
    }

    /// Last uploaded pixels, bottom row first.
    pub fn texture_pixels(&self, texture: TextureHandle) -> Option<&[u8]> {
        self.textures.get(texture).map(|t| t.pixels.as_slice())
    }
}

impl GpuBackend for HeadlessGpu {
    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> BufferHandle {
        self.buffers.insert(HeadlessBuffer {
            label: label.to_string(),
            contents: contents.to_vec(),
        })
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(buffer);
    }

    fn create_texture(&mut self, label: &str, extent: TextureExtent) -> TextureHandle {
        self.textures.insert(HeadlessTexture {
            label: label.to_string(),
            extent,
            writes: 0,
            pixels: vec![0; extent.width as usize * extent.height as usize * 4],
        })
    }

    fn write_texture(&mut self, texture: TextureHandle, extent: TextureExtent, rgba: &[u8]) {
        let Some(entry) = self.textures.get_mut(texture) else {
            debug!("write to released texture ignored");
            return;
        };
        if entry.extent != extent || entry.pixels.len() != rgba.len() {
            debug!("write to {} with mismatched extent ignored", entry.label);
            return;
        }
        entry.pixels.copy_from_slice(rgba);
        entry.writes += 1;
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_handles_are_not_reused_as_live() {
        let mut gpu = HeadlessGpu::new();
        let first = gpu.create_texture("slide", TextureExtent::new(2, 2));
        gpu.release_texture(first);
        let second = gpu.create_texture("slide", TextureExtent::new(2, 2));

        assert_ne!(first, second);
        assert!(gpu.texture_extent(first).is_none());
        assert_eq!(gpu.live_textures(), 1);
    }

    #[test]
    fn mismatched_writes_are_ignored() {
        let mut gpu = HeadlessGpu::new();
        let texture = gpu.create_texture("slide", TextureExtent::new(1, 1));
        gpu.write_texture(texture, TextureExtent::new(2, 1), &[0; 8]);
        assert_eq!(gpu.texture_writes(texture), 0);

        gpu.write_texture(texture, TextureExtent::new(1, 1), &[9, 8, 7, 6]);
        assert_eq!(gpu.texture_writes(texture), 1);
        assert_eq!(gpu.texture_pixels(texture), Some(&[9, 8, 7, 6][..]));
    }
}
