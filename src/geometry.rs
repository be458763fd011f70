use std::collections::BTreeMap;

use bytemuck::cast_slice;
use glam::{Vec2, Vec3, Vec4};
use log::{debug, warn};

use crate::error::GeometryError;
use crate::media::Slide;
use crate::render::{BufferHandle, DrawCall, DrawList, GpuBackend, TextureExtent, TextureHandle};
use crate::shader::ShaderProgram;

pub const POSITION_LOCATION: u32 = 0;
pub const NORMAL_LOCATION: u32 = 1;
pub const TEXTURE_LOCATION: u32 = 2;

/// Texture unit sampled by the scene's fragment stage.
pub const BASE_TEXTURE_UNIT: u32 = 0;

/// How consecutive vertices are assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveKind {
    LineList,
    #[default]
    TriangleList,
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::LineList => "line-list",
            Self::TriangleList => "triangle-list",
        }
    }
}

/// Attribute streams interleaved in a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    Position,
    PositionNormal,
    PositionUv,
    PositionNormalUv,
}

impl VertexLayout {
    pub fn from_streams(has_normals: bool, has_uvs: bool) -> Self {
        match (has_normals, has_uvs) {
            (false, false) => Self::Position,
            (true, false) => Self::PositionNormal,
            (false, true) => Self::PositionUv,
            (true, true) => Self::PositionNormalUv,
        }
    }

    pub fn has_normals(self) -> bool {
        matches!(self, Self::PositionNormal | Self::PositionNormalUv)
    }

    pub fn has_uvs(self) -> bool {
        matches!(self, Self::PositionUv | Self::PositionNormalUv)
    }

    pub fn floats_per_vertex(self) -> usize {
        3 + 3 * usize::from(self.has_normals()) + 2 * usize::from(self.has_uvs())
    }

    /// Bytes between consecutive vertices.
    pub fn stride(self) -> u64 {
        (self.floats_per_vertex() * std::mem::size_of::<f32>()) as u64
    }

    pub fn normal_offset(self) -> Option<u64> {
        self.has_normals().then_some(12)
    }

    pub fn uv_offset(self) -> Option<u64> {
        self.has_uvs()
            .then_some(if self.has_normals() { 24 } else { 12 })
    }
}

/// Surface reflection properties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub emission_color: Vec4,
    pub ambient_color: Vec4,
    pub diffuse_color: Vec4,
    pub specular_color: Vec4,
    pub specular_exponent: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            emission_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            ambient_color: Vec4::new(0.2, 0.2, 0.2, 1.0),
            diffuse_color: Vec4::new(0.8, 0.8, 0.8, 1.0),
            specular_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            specular_exponent: 0.0,
        }
    }
}

/// Texture owned by a geometry object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundTexture {
    pub handle: TextureHandle,
    pub extent: TextureExtent,
}

/// Result of a texture operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureUpdate {
    /// Contents were replaced in place.
    Updated,
    /// A new texture was allocated for the unit.
    Reallocated,
    /// Nothing is bound to the unit yet.
    MissingTexture,
    /// The image size differs from the allocated texture.
    DimensionMismatch {
        allocated: TextureExtent,
        supplied: TextureExtent,
    },
    /// The image has no pixels.
    EmptyImage,
}

/// Renderable vertex buffer with its material and textures.
#[derive(Debug)]
pub struct GeometryObject {
    label: String,
    primitive: PrimitiveKind,
    layout: Option<VertexLayout>,
    buffer: Option<BufferHandle>,
    vertex_count: u32,
    textures: BTreeMap<u32, BoundTexture>,
    material: Material,
    scratch: Vec<u8>,
}

impl GeometryObject {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            primitive: PrimitiveKind::default(),
            layout: None,
            buffer: None,
            vertex_count: 0,
            textures: BTreeMap::new(),
            material: Material::default(),
            scratch: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn primitive(&self) -> PrimitiveKind {
        self.primitive
    }

    pub fn layout(&self) -> Option<VertexLayout> {
        self.layout
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn buffer(&self) -> Option<BufferHandle> {
        self.buffer
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Uploads interleaved vertex data, replacing any previous buffer.
    ///
    /// Every supplied stream must have one entry per vertex. Rejected input leaves the object
    /// unchanged.
    pub fn set_geometry(
        &mut self,
        gpu: &mut dyn GpuBackend,
        primitive: PrimitiveKind,
        vertices: &[Vec3],
        normals: Option<&[Vec3]>,
        uvs: Option<&[Vec2]>,
    ) -> Result<(), GeometryError> {
        let packed = pack_vertices(vertices, normals, uvs)?;
        let layout = VertexLayout::from_streams(normals.is_some(), uvs.is_some());
        if let Some(previous) = self.buffer.take() {
            gpu.release_buffer(previous);
        }
        self.buffer = Some(gpu.create_vertex_buffer(
            &format!("{}-vertices", self.label),
            cast_slice(&packed),
        ));
        self.primitive = primitive;
        self.layout = Some(layout);
        self.vertex_count = vertices.len() as u32;
        debug!(
            "{}: {} vertices as {:?} ({})",
            self.label,
            vertices.len(),
            layout,
            primitive.name()
        );
        Ok(())
    }

    /// Uploads geometry with texture coordinates and binds `image` to the base unit.
    pub fn set_textured_geometry(
        &mut self,
        gpu: &mut dyn GpuBackend,
        primitive: PrimitiveKind,
        vertices: &[Vec3],
        normals: Option<&[Vec3]>,
        uvs: &[Vec2],
        image: &Slide,
    ) -> Result<TextureUpdate, GeometryError> {
        self.set_geometry(gpu, primitive, vertices, normals, Some(uvs))?;
        Ok(self.reallocate_texture(gpu, image, BASE_TEXTURE_UNIT))
    }

    /// Drops the texture on `unit`, if any, and allocates one sized to `image`.
    pub fn reallocate_texture(
        &mut self,
        gpu: &mut dyn GpuBackend,
        image: &Slide,
        unit: u32,
    ) -> TextureUpdate {
        if image.is_empty() {
            warn!("{}: refusing to allocate an empty texture", self.label);
            return TextureUpdate::EmptyImage;
        }
        if let Some(previous) = self.textures.remove(&unit) {
            gpu.release_texture(previous.handle);
        }
        let extent = slide_extent(image);
        let handle = gpu.create_texture(&format!("{}-texture-{unit}", self.label), extent);
        image.write_flipped(&mut self.scratch);
        gpu.write_texture(handle, extent, &self.scratch);
        self.textures.insert(unit, BoundTexture { handle, extent });
        TextureUpdate::Reallocated
    }

    /// Overwrites the texture on `unit` with an image of the same size.
    pub fn update_texture(
        &mut self,
        gpu: &mut dyn GpuBackend,
        image: &Slide,
        unit: u32,
    ) -> TextureUpdate {
        let Some(bound) = self.textures.get(&unit).copied() else {
            debug!("{}: no texture on unit {unit}", self.label);
            return TextureUpdate::MissingTexture;
        };
        let supplied = slide_extent(image);
        if supplied != bound.extent {
            debug!(
                "{}: {}x{} frame does not fit {}x{} texture",
                self.label, supplied.width, supplied.height, bound.extent.width, bound.extent.height
            );
            return TextureUpdate::DimensionMismatch {
                allocated: bound.extent,
                supplied,
            };
        }
        image.write_flipped(&mut self.scratch);
        gpu.write_texture(bound.handle, bound.extent, &self.scratch);
        TextureUpdate::Updated
    }

    pub fn texture(&self, unit: u32) -> Option<BoundTexture> {
        self.textures.get(&unit).copied()
    }

    pub fn set_emission_color(&mut self, color: Vec4) {
        self.material.emission_color = color;
    }

    pub fn set_ambient_reflection_color(&mut self, color: Vec4) {
        self.material.ambient_color = color;
    }

    pub fn set_diffuse_reflection_color(&mut self, color: Vec4) {
        self.material.diffuse_color = color;
    }

    pub fn set_specular_reflection_color(&mut self, color: Vec4) {
        self.material.specular_color = color;
    }

    pub fn set_specular_reflection_exponent(&mut self, exponent: f32) {
        self.material.specular_exponent = exponent;
    }

    /// Writes the material and selects the base texture unit for sampling.
    pub fn transfer_uniforms_to_shader(&self, shader: &mut ShaderProgram) {
        let locations = shader.standard().material;
        shader.set_vec4(locations.emission_color, self.material.emission_color);
        shader.set_vec4(locations.ambient_color, self.material.ambient_color);
        shader.set_vec4(locations.diffuse_color, self.material.diffuse_color);
        shader.set_vec4(locations.specular_color, self.material.specular_color);
        shader.set_f32(locations.specular_exponent, self.material.specular_exponent);
        shader.set_sampler_unit(BASE_TEXTURE_UNIT);
    }

    /// Records a draw using the program's current uniform state.
    pub fn draw(&self, shader: &ShaderProgram, draws: &mut DrawList) {
        let (Some(buffer), Some(layout)) = (self.buffer, self.layout) else {
            debug!("{}: skipping draw without geometry", self.label);
            return;
        };
        if !shader.is_linked() {
            debug!("{}: skipping draw with unlinked program", self.label);
            return;
        }
        draws.push(DrawCall {
            label: self.label.clone(),
            buffer,
            layout,
            primitive: self.primitive,
            vertex_count: self.vertex_count,
            texture: shader.sampled_texture(),
            uniforms: shader.uniform_bytes().to_vec(),
        });
    }

    /// Returns the buffer and textures to the backend.
    pub fn release(&mut self, gpu: &mut dyn GpuBackend) {
        if let Some(buffer) = self.buffer.take() {
            gpu.release_buffer(buffer);
        }
        for (_, texture) in std::mem::take(&mut self.textures) {
            gpu.release_texture(texture.handle);
        }
        self.layout = None;
        self.vertex_count = 0;
    }
}

fn slide_extent(image: &Slide) -> TextureExtent {
    TextureExtent::new(image.width(), image.height())
}

/// Interleaves position, normal and uv streams into one float array.
pub fn pack_vertices(
    vertices: &[Vec3],
    normals: Option<&[Vec3]>,
    uvs: Option<&[Vec2]>,
) -> Result<Vec<f32>, GeometryError> {
    if vertices.is_empty() {
        return Err(GeometryError::NoVertices);
    }
    check_stream("normal", vertices.len(), normals.map(<[Vec3]>::len))?;
    check_stream("uv", vertices.len(), uvs.map(<[Vec2]>::len))?;

    let layout = VertexLayout::from_streams(normals.is_some(), uvs.is_some());
    let mut packed = Vec::with_capacity(vertices.len() * layout.floats_per_vertex());
    for (index, position) in vertices.iter().enumerate() {
        packed.extend_from_slice(&position.to_array());
        if let Some(normals) = normals {
            packed.extend_from_slice(&normals[index].to_array());
        }
        if let Some(uvs) = uvs {
            packed.extend_from_slice(&uvs[index].to_array());
        }
    }
    Ok(packed)
}

fn check_stream(
    stream: &'static str,
    expected: usize,
    actual: Option<usize>,
) -> Result<(), GeometryError> {
    match actual {
        Some(actual) if actual != expected => Err(GeometryError::LengthMismatch {
            stream,
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::shared::{FRAGMENT_SHADER, VERTEX_SHADER};
    use crate::render::HeadlessGpu;

    fn quad() -> (Vec<Vec3>, Vec<Vec2>) {
        let vertices = vec![
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(-1.0, -1.0, 0.0),
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

    fn linked_program() -> ShaderProgram {
        let mut program = ShaderProgram::new("test");
        program.compile_and_link(VERTEX_SHADER, FRAGMENT_SHADER).unwrap();
        program.resolve_standard_locations(0);
        program
    }

    #[test]
    fn layouts_match_stream_presence() {
        assert_eq!(VertexLayout::Position.stride(), 12);
        assert_eq!(VertexLayout::PositionNormal.stride(), 24);
        assert_eq!(VertexLayout::PositionUv.stride(), 20);
        assert_eq!(VertexLayout::PositionNormalUv.stride(), 32);
        assert_eq!(VertexLayout::PositionUv.uv_offset(), Some(12));
        assert_eq!(VertexLayout::PositionNormalUv.uv_offset(), Some(24));
        assert_eq!(VertexLayout::Position.normal_offset(), None);
    }

    #[test]
    fn packs_interleaved_streams() {
        let packed = pack_vertices(
            &[Vec3::new(1.0, 2.0, 3.0)],
            Some(&[Vec3::Z]),
            Some(&[Vec2::new(0.5, 0.25)]),
        )
        .unwrap();
        assert_eq!(packed, vec![1.0, 2.0, 3.0, 0.0, 0.0, 1.0, 0.5, 0.25]);
    }

    #[test]
    fn empty_geometry_is_rejected_without_side_effects() {
        let mut gpu = HeadlessGpu::new();
        let mut object = GeometryObject::new("empty");
        let err = object
            .set_geometry(&mut gpu, PrimitiveKind::TriangleList, &[], None, None)
            .unwrap_err();
        assert_eq!(err, GeometryError::NoVertices);
        assert_eq!(object.vertex_count(), 0);
        assert_eq!(gpu.live_buffers(), 0);
    }

    #[test]
    fn mismatched_streams_are_rejected() {
        let mut gpu = HeadlessGpu::new();
        let mut object = GeometryObject::new("mismatch");
        let err = object
            .set_geometry(
                &mut gpu,
                PrimitiveKind::TriangleList,
                &[Vec3::ZERO, Vec3::X, Vec3::Y],
                Some(&[Vec3::Z, Vec3::Z]),
                None,
            )
            .unwrap_err();
        assert_eq!(
            err,
            GeometryError::LengthMismatch {
                stream: "normal",
                expected: 3,
                actual: 2
            }
        );
        assert!(object.buffer().is_none());
    }

    #[test]
    fn replacing_geometry_releases_the_old_buffer() {
        let mut gpu = HeadlessGpu::new();
        let mut object = GeometryObject::new("lines");
        let vertices = [Vec3::ZERO, Vec3::X];
        object
            .set_geometry(&mut gpu, PrimitiveKind::LineList, &vertices, None, None)
            .unwrap();
        let first = object.buffer().unwrap();
        object
            .set_geometry(&mut gpu, PrimitiveKind::LineList, &vertices, None, None)
            .unwrap();

        assert_eq!(gpu.live_buffers(), 1);
        assert!(gpu.buffer_contents(first).is_none());
        assert_eq!(object.layout(), Some(VertexLayout::Position));
        assert_eq!(object.primitive(), PrimitiveKind::LineList);
    }

    #[test]
    fn textured_quad_uploads_flipped_pixels() {
        let mut gpu = HeadlessGpu::new();
        let (vertices, uvs) = quad();
        let mut pixels = vec![255, 0, 0, 255, 255, 0, 0, 255];
        pixels.extend_from_slice(&[0, 0, 255, 255, 0, 0, 255, 255]);
        let slide = Slide::from_rgba(2, 2, pixels).unwrap();

        let mut screen = GeometryObject::new("screen");
        let outcome = screen
            .set_textured_geometry(
                &mut gpu,
                PrimitiveKind::TriangleList,
                &vertices,
                None,
                &uvs,
                &slide,
            )
            .unwrap();

        assert_eq!(outcome, TextureUpdate::Reallocated);
        assert_eq!(screen.vertex_count(), 6);
        assert_eq!(screen.layout(), Some(VertexLayout::PositionUv));
        let texture = screen.texture(BASE_TEXTURE_UNIT).unwrap();
        assert_eq!(texture.extent, TextureExtent::new(2, 2));
        let uploaded = gpu.texture_pixels(texture.handle).unwrap();
        assert_eq!(&uploaded[0..4], &[0, 0, 255, 255]);
        assert_eq!(&uploaded[8..12], &[255, 0, 0, 255]);
    }

    #[test]
    fn update_texture_requires_matching_size() {
        let mut gpu = HeadlessGpu::new();
        let mut object = GeometryObject::new("screen");
        let small = Slide::solid(4, 4, [255, 0, 0, 255]);
        assert_eq!(
            object.update_texture(&mut gpu, &small, 0),
            TextureUpdate::MissingTexture
        );

        object.reallocate_texture(&mut gpu, &small, 0);
        let handle = object.texture(0).unwrap().handle;
        assert_eq!(
            object.update_texture(&mut gpu, &Slide::solid(4, 4, [0, 255, 0, 255]), 0),
            TextureUpdate::Updated
        );
        assert_eq!(object.texture(0).unwrap().handle, handle);
        assert_eq!(gpu.live_textures(), 1);
        assert_eq!(gpu.texture_writes(handle), 2);

        let outcome = object.update_texture(&mut gpu, &Slide::solid(8, 4, [0; 4]), 0);
        assert!(matches!(outcome, TextureUpdate::DimensionMismatch { .. }));
        assert_eq!(object.texture(0).unwrap().handle, handle);
        assert_eq!(gpu.texture_writes(handle), 2);
    }

    #[test]
    fn reallocation_replaces_texture_storage() {
        let mut gpu = HeadlessGpu::new();
        let mut object = GeometryObject::new("screen");
        object.reallocate_texture(&mut gpu, &Slide::solid(4, 4, [0; 4]), 0);
        let first = object.texture(0).unwrap().handle;
        object.reallocate_texture(&mut gpu, &Slide::solid(8, 2, [0; 4]), 0);

        assert_eq!(gpu.live_textures(), 1);
        assert!(gpu.texture_extent(first).is_none());
        assert_eq!(object.texture(0).unwrap().extent, TextureExtent::new(8, 2));
    }

    #[test]
    fn material_reaches_the_uniform_block() {
        let mut program = linked_program();
        let mut wall = GeometryObject::new("wall");
        wall.set_diffuse_reflection_color(Vec4::new(0.52, 0.12, 0.15, 1.0));
        wall.set_specular_reflection_exponent(12.0);
        wall.transfer_uniforms_to_shader(&mut program);

        let locations = program.standard().material;
        assert_eq!(
            program.read_vec4(locations.diffuse_color),
            Some(Vec4::new(0.52, 0.12, 0.15, 1.0))
        );
        assert_eq!(
            program.read_vec4(locations.ambient_color),
            Some(Vec4::new(0.2, 0.2, 0.2, 1.0))
        );
        assert_eq!(program.read_f32(locations.specular_exponent), Some(12.0));
    }

    #[test]
    fn draws_snapshot_uniform_state() {
        let mut gpu = HeadlessGpu::new();
        let mut program = linked_program();
        let mut object = GeometryObject::new("lines");
        object
            .set_geometry(&mut gpu, PrimitiveKind::LineList, &[Vec3::ZERO, Vec3::X], None, None)
            .unwrap();
        let which = program.register_custom_location("which_object");

        let mut draws = DrawList::new();
        program.set_i32(which, 1);
        object.draw(&program, &mut draws);
        program.set_i32(which, 2);
        object.draw(&program, &mut draws);

        let offset = which.offset().unwrap() as usize;
        let value = |call: &DrawCall| {
            i32::from_ne_bytes(call.uniforms[offset..offset + 4].try_into().unwrap())
        };
        assert_eq!(draws.len(), 2);
        assert_eq!(value(&draws.calls()[0]), 1);
        assert_eq!(value(&draws.calls()[1]), 2);
    }

    #[test]
    fn objects_without_geometry_record_nothing() {
        let program = linked_program();
        let mut draws = DrawList::new();
        GeometryObject::new("nothing").draw(&program, &mut draws);
        assert!(draws.is_empty());
    }

    #[test]
    fn release_returns_everything() {
        let mut gpu = HeadlessGpu::new();
        let (vertices, uvs) = quad();
        let mut screen = GeometryObject::new("screen");
        screen
            .set_textured_geometry(
                &mut gpu,
                PrimitiveKind::TriangleList,
                &vertices,
                None,
                &uvs,
                &Slide::solid(2, 2, [0; 4]),
            )
            .unwrap();
        screen.release(&mut gpu);
        assert_eq!(gpu.live_buffers(), 0);
        assert_eq!(gpu.live_textures(), 0);
        assert!(screen.texture(0).is_none());
    }
}
