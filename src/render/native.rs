use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use slotmap::SlotMap;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use super::common::{BufferHandle, DrawList, GpuBackend, TextureExtent, TextureHandle};
use super::shared::{
    vertex_entry_point, ALL_LAYOUTS, ALL_PRIMITIVES, CLEAR_COLOR, FRAGMENT_ENTRY_POINT,
};
use crate::error::ShaderStage;
use crate::geometry::{
    PrimitiveKind, VertexLayout, NORMAL_LOCATION, POSITION_LOCATION, TEXTURE_LOCATION,
};
use crate::shader::ShaderProgram;

/// GPU renderer backed by wgpu that replays recorded draw lists.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    depth: DepthBuffer,
    adapter_info: wgpu::AdapterInfo,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    fallback_texture: GpuTexture,
    program: Option<ProgramPipelines>,
    buffers: SlotMap<BufferHandle, wgpu::Buffer>,
    textures: SlotMap<TextureHandle, GpuTexture>,
}

impl Renderer {
    /// Initializes the GPU renderer for the provided window.
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("failed to create wgpu surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        let adapter_info = adapter.get_info();

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("renderer-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .context("surface reports no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("slide-texture-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("slide-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });

        let fallback_texture = GpuTexture::create(
            &device,
            &texture_layout,
            &sampler,
            "fallback-texture",
            TextureExtent::new(1, 1),
        );
        fallback_texture.write(&queue, &[255, 255, 255, 255]);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            depth,
            adapter_info,
            texture_layout,
            sampler,
            fallback_texture,
            program: None,
            buffers: SlotMap::with_key(),
            textures: SlotMap::with_key(),
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Adapter name and backend, for the start-up banner.
    pub fn adapter_summary(&self) -> String {
        format!(
            "{} ({:?}, {})",
            self.adapter_info.name, self.adapter_info.backend, self.adapter_info.driver
        )
    }

    /// Creates GPU pipelines for a linked program, one per vertex layout and primitive kind.
    pub fn load_program(&mut self, program: &ShaderProgram) -> Result<()> {
        let (Some(vertex_source), Some(fragment_source), Some(layout)) = (
            program.vertex_source(),
            program.fragment_source(),
            program.uniform_layout(),
        ) else {
            bail!("program {} is not linked", program.label());
        };
        if layout.group != 0 {
            bail!(
                "program {} keeps its uniforms in group {}; expected group 0",
                program.label(),
                layout.group
            );
        }
        let block_size = NonZeroU64::new(u64::from(layout.size))
            .with_context(|| format!("program {} has an empty uniform block", program.label()))?;

        let vertex_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("slide-projector-vertex"),
            source: wgpu::ShaderSource::Wgsl(vertex_source.into()),
        });
        let fragment_module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("slide-projector-fragment"),
            source: wgpu::ShaderSource::Wgsl(fragment_source.into()),
        });

        let uniform_layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("uniform-block-layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: layout.binding,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: Some(block_size),
                    },
                    count: None,
                }],
            });
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("slide-projector-pipeline-layout"),
                bind_group_layouts: &[&uniform_layout, &self.texture_layout],
                immediate_size: 0,
            });

        let mut pipelines = HashMap::new();
        for vertex_layout in ALL_LAYOUTS {
            let entry_point = vertex_entry_point(vertex_layout);
            if !program.has_entry_point(ShaderStage::Vertex, entry_point) {
                warn!("program {} lacks {entry_point}", program.label());
                continue;
            }
            for primitive in ALL_PRIMITIVES {
                let pipeline = self.create_pipeline(
                    &pipeline_layout,
                    &vertex_module,
                    &fragment_module,
                    vertex_layout,
                    primitive,
                );
                pipelines.insert((vertex_layout, primitive), pipeline);
            }
        }
        info!(
            "created {} pipelines for program {}",
            pipelines.len(),
            program.label()
        );

        let alignment = u64::from(self.device.limits().min_uniform_buffer_offset_alignment);
        let ring = UniformRing::new(
            &self.device,
            &uniform_layout,
            layout.binding,
            block_size,
            align_to(block_size.get(), alignment),
            4,
        );
        self.program = Some(ProgramPipelines {
            uniform_layout,
            binding: layout.binding,
            pipelines,
            ring,
        });
        Ok(())
    }

    fn create_pipeline(
        &self,
        pipeline_layout: &wgpu::PipelineLayout,
        vertex_module: &wgpu::ShaderModule,
        fragment_module: &wgpu::ShaderModule,
        vertex_layout: VertexLayout,
        primitive: PrimitiveKind,
    ) -> wgpu::RenderPipeline {
        let attributes = vertex_attributes(vertex_layout);
        let topology = match primitive {
            PrimitiveKind::LineList => wgpu::PrimitiveTopology::LineList,
            PrimitiveKind::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        };
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&format!("pipeline-{vertex_layout:?}-{}", primitive.name())),
                layout: Some(pipeline_layout),
                vertex: wgpu::VertexState {
                    module: vertex_module,
                    entry_point: Some(vertex_entry_point(vertex_layout)),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: vertex_layout.stride(),
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                },
                primitive: wgpu::PrimitiveState {
                    topology,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DepthBuffer::FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: fragment_module,
                    entry_point: Some(FRAGMENT_ENTRY_POINT),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview_mask: None,
                cache: None,
            })
    }

    /// Resizes the swap chain to match the new dimensions.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    /// Reconfigures the surface after it was lost or became outdated.
    pub fn reconfigure(&mut self) {
        self.resize(self.size);
    }

    /// Draws one recorded frame.
    pub fn render(&mut self, draws: &DrawList) -> Result<(), wgpu::SurfaceError> {
        if let Some(program) = self.program.as_mut() {
            program.upload(&self.device, &self.queue, draws);
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("renderer-encoder"),
            });

        let [r, g, b, a] = CLEAR_COLOR;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("main-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        if let Some(program) = &self.program {
            for (index, call) in draws.iter().enumerate() {
                let Some(pipeline) = program.pipelines.get(&(call.layout, call.primitive)) else {
                    debug!("no pipeline for {} ({:?})", call.label, call.layout);
                    continue;
                };
                let Some(buffer) = self.buffers.get(call.buffer) else {
                    debug!("{} refers to a released buffer", call.label);
                    continue;
                };
                let texture = call
                    .texture
                    .and_then(|handle| self.textures.get(handle))
                    .unwrap_or(&self.fallback_texture);
                let offset = (index as u64 * program.ring.stride) as u32;

                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, &program.ring.bind_group, &[offset]);
                pass.set_bind_group(1, &texture.bind_group, &[]);
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(0..call.vertex_count, 0..1);
            }
        }

        drop(pass);
        self.queue.submit(std::iter::once(encoder.finish()));
        self.window.pre_present_notify();
        output.present();
        Ok(())
    }
}

impl GpuBackend for Renderer {
    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> BufferHandle {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::VERTEX,
            });
        self.buffers.insert(buffer)
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        if let Some(buffer) = self.buffers.remove(buffer) {
            buffer.destroy();
        }
    }

    fn create_texture(&mut self, label: &str, extent: TextureExtent) -> TextureHandle {
        let texture = GpuTexture::create(
            &self.device,
            &self.texture_layout,
            &self.sampler,
            label,
            extent,
        );
        self.textures.insert(texture)
    }

    fn write_texture(&mut self, texture: TextureHandle, extent: TextureExtent, rgba: &[u8]) {
        let Some(target) = self.textures.get(texture) else {
            debug!("write to released texture ignored");
            return;
        };
        let expected = extent.width as usize * extent.height as usize * 4;
        if target.extent != extent || rgba.len() != expected {
            warn!(
                "ignoring {} byte upload into {}x{} texture",
                rgba.len(),
                target.extent.width,
                target.extent.height
            );
            return;
        }
        target.write(&self.queue, rgba);
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        if let Some(texture) = self.textures.remove(texture) {
            texture.texture.destroy();
        }
    }
}

fn vertex_attributes(layout: VertexLayout) -> Vec<wgpu::VertexAttribute> {
    let mut attributes = vec![wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x3,
        offset: 0,
        shader_location: POSITION_LOCATION,
    }];
    if let Some(offset) = layout.normal_offset() {
        attributes.push(wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x3,
            offset,
            shader_location: NORMAL_LOCATION,
        });
    }
    if let Some(offset) = layout.uv_offset() {
        attributes.push(wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset,
            shader_location: TEXTURE_LOCATION,
        });
    }
    attributes
}

fn align_to(value: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    value.div_ceil(alignment) * alignment
}

struct ProgramPipelines {
    uniform_layout: wgpu::BindGroupLayout,
    binding: u32,
    pipelines: HashMap<(VertexLayout, PrimitiveKind), wgpu::RenderPipeline>,
    ring: UniformRing,
}

impl ProgramPipelines {
    /// Copies every draw's uniform snapshot into its own slot of the ring.
    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, draws: &DrawList) {
        if draws.is_empty() {
            return;
        }
        let needed = draws.len() as u64;
        if needed > self.ring.capacity {
            self.ring = UniformRing::new(
                device,
                &self.uniform_layout,
                self.binding,
                self.ring.block_size,
                self.ring.stride,
                needed.next_power_of_two(),
            );
        }
        let stride = self.ring.stride as usize;
        let block = self.ring.block_size.get() as usize;
        let mut staging = vec![0u8; stride * draws.len()];
        for (slot, call) in staging.chunks_exact_mut(stride).zip(draws.iter()) {
            let len = call.uniforms.len().min(block);
            slot[..len].copy_from_slice(&call.uniforms[..len]);
        }
        queue.write_buffer(&self.ring.buffer, 0, &staging);
    }
}

/// Uniform buffer holding one block per draw, addressed with dynamic offsets.
struct UniformRing {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    block_size: NonZeroU64,
    stride: u64,
    capacity: u64,
}

impl UniformRing {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        binding: u32,
        block_size: NonZeroU64,
        stride: u64,
        capacity: u64,
    ) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform-ring"),
            size: stride * capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform-ring-bind-group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: Some(block_size),
                }),
            }],
        });
        Self {
            buffer,
            bind_group,
            block_size,
            stride,
            capacity,
        }
    }
}

struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    extent: TextureExtent,
}

impl GpuTexture {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    fn create(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        label: &str,
        extent: TextureExtent,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: extent.width.max(1),
                height: extent.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        Self {
            texture,
            bind_group,
            extent,
        }
    }

    fn write(&self, queue: &wgpu::Queue, rgba: &[u8]) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * self.extent.width),
                rows_per_image: Some(self.extent.height),
            },
            wgpu::Extent3d {
                width: self.extent.width,
                height: self.extent.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_stride_respects_alignment() {
        assert_eq!(align_to(1520, 256), 1536);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(96, 0), 96);
    }

    #[test]
    fn attributes_follow_layout_offsets() {
        let attributes = vertex_attributes(VertexLayout::PositionNormalUv);
        let locations: Vec<_> = attributes
            .iter()
            .map(|a| (a.shader_location, a.offset))
            .collect();
        assert_eq!(locations, vec![(0, 0), (1, 12), (2, 24)]);

        let attributes = vertex_attributes(VertexLayout::PositionUv);
        assert_eq!(attributes[1].shader_location, TEXTURE_LOCATION);
        assert_eq!(attributes[1].offset, 12);
        assert_eq!(attributes[1].format, wgpu::VertexFormat::Float32x2);
    }
}
