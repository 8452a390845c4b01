use std::collections::HashMap;
use std::sync::Arc;

use pixels::wgpu;
use pixels::wgpu::util::DeviceExt;
use pixels::{Pixels, SurfaceTexture};
use tracing::{debug, info};
use winit::window::Window;

use crate::app::camera::WorldUniform;

use super::backend::{
    BufferHandle, DrawCall, FragmentKind, GraphicsBackend, OffscreenDesc, ProgramDesc,
    ProgramHandle, RenderError, RenderTarget, TargetHandle, TextureArrayDesc, TextureBinding,
    TextureHandle,
};
use super::instance::InstanceRecord;

const SHADER_SOURCE: &str = include_str!("shaders/instanced_quad.wgsl");
const UNIT_QUAD: [[f32; 2]; 6] = [
    [0.0, 0.0],
    [1.0, 0.0],
    [0.0, 1.0],
    [0.0, 1.0],
    [1.0, 0.0],
    [1.0, 1.0],
];
const UNIT_QUAD_VERTEX_COUNT: u32 = UNIT_QUAD.len() as u32;
const WORLD_UNIFORM_BYTES: u64 = 16;
const MIN_BUFFER_BYTES: u64 = 64;

fn quad_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x2,
        }],
    }
}

fn instance_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<InstanceRecord>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &[
            // rect
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x4,
            },
            // uv rect
            wgpu::VertexAttribute {
                offset: 16,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x4,
            },
            // tint
            wgpu::VertexAttribute {
                offset: 32,
                shader_location: 3,
                format: wgpu::VertexFormat::Float32x4,
            },
            // layer, depth
            wgpu::VertexAttribute {
                offset: 48,
                shader_location: 4,
                format: wgpu::VertexFormat::Float32x4,
            },
        ],
    }
}

struct GpuBuffer {
    buffer: wgpu::Buffer,
    capacity_floats: usize,
}

struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

struct GpuTarget {
    texture: wgpu::Texture,
    attachment: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
}

struct RecordedPass {
    target: RenderTarget,
    clear: Option<[f32; 4]>,
    draws: Vec<DrawCall>,
}

/// Everything the pass encoder reads, split from `Pixels` so a screen pass can
/// borrow it inside `Pixels::render_with`.
struct GpuResources {
    world_buffer: wgpu::Buffer,
    world_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    quad: wgpu::Buffer,
    blank: GpuTexture,
    programs: HashMap<ProgramHandle, wgpu::RenderPipeline>,
    buffers: HashMap<BufferHandle, GpuBuffer>,
    textures: HashMap<TextureHandle, GpuTexture>,
    targets: HashMap<TargetHandle, GpuTarget>,
}

impl GpuResources {
    fn bind_group_for(&self, binding: TextureBinding) -> &wgpu::BindGroup {
        match binding {
            TextureBinding::None => &self.blank.bind_group,
            TextureBinding::Array(handle) => self
                .textures
                .get(&handle)
                .map_or(&self.blank.bind_group, |texture| &texture.bind_group),
            TextureBinding::Target(handle) => self
                .targets
                .get(&handle)
                .map_or(&self.blank.bind_group, |target| &target.bind_group),
        }
    }

    fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        pass: &RecordedPass,
    ) {
        let load = match pass.clear {
            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: a as f64,
            }),
            None => wgpu::LoadOp::Load,
        };
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("instanced_quad_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_bind_group(0, &self.world_bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.quad.slice(..));

        for call in &pass.draws {
            let (Some(pipeline), Some(instances)) = (
                self.programs.get(&call.program),
                self.buffers.get(&call.instances),
            ) else {
                continue;
            };
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(1, self.bind_group_for(call.texture), &[]);
            render_pass.set_vertex_buffer(1, instances.buffer.slice(..));
            render_pass.draw(0..UNIT_QUAD_VERTEX_COUNT, 0..call.instance_count);
        }
    }
}

/// Instanced renderer on the device and window surface owned by `pixels`.
pub struct WgpuBackend {
    pixels: Pixels<'static>,
    resources: GpuResources,
    format: wgpu::TextureFormat,
    next_id: u32,
    open_pass: Option<RecordedPass>,
}

impl WgpuBackend {
    pub fn new(window: Arc<Window>) -> Result<Self, RenderError> {
        let size = window.inner_size();
        let surface = SurfaceTexture::new(size.width.max(1), size.height.max(1), window);
        // The pixel frame itself is never drawn; only the device and surface are used.
        let pixels = Pixels::new(1, 1, surface).map_err(|error| RenderError::NoContext {
            reason: error.to_string(),
        })?;
        let format = pixels.surface_texture_format();
        let device = pixels.device();
        let queue = pixels.queue();

        let world_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("world_uniform_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("atlas_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2Array,
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
        let world_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("world_uniform"),
            size: WORLD_UNIFORM_BYTES,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let world_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("world_uniform_bind_group"),
            layout: &world_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: world_buffer.as_entire_binding(),
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("instanced_quad_layout"),
            bind_group_layouts: &[&world_layout, &texture_layout],
            push_constant_ranges: &[],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("unit_quad"),
            contents: bytemuck::cast_slice(&UNIT_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let blank = upload_texture_array(
            device,
            queue,
            &texture_layout,
            &sampler,
            &TextureArrayDesc {
                label: "blank",
                width: 1,
                height: 1,
                layers: 1,
                rgba: &[255, 255, 255, 255],
            },
        );

        info!(?format, "graphics_backend_ready");
        Ok(Self {
            resources: GpuResources {
                world_buffer,
                world_bind_group,
                texture_layout,
                pipeline_layout,
                sampler,
                quad,
                blank,
                programs: HashMap::new(),
                buffers: HashMap::new(),
                textures: HashMap::new(),
                targets: HashMap::new(),
            },
            pixels,
            format,
            next_id: 0,
            open_pass: None,
        })
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn execute(&mut self, pass: RecordedPass) -> Result<(), RenderError> {
        match pass.target {
            RenderTarget::Screen => {
                let resources = &self.resources;
                self.pixels
                    .render_with(|encoder, render_target, _context| {
                        resources.encode(encoder, render_target, &pass);
                        Ok(())
                    })
                    .map_err(|error| RenderError::Surface(error.to_string()))
            }
            RenderTarget::Offscreen(handle) => {
                let target = self
                    .resources
                    .targets
                    .get(&handle)
                    .ok_or(RenderError::UnknownHandle {
                        kind: "target",
                        id: handle.0,
                    })?;
                let mut encoder =
                    self.pixels
                        .device()
                        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                            label: Some("offscreen_pass"),
                        });
                self.resources.encode(&mut encoder, &target.attachment, &pass);
                self.pixels.queue().submit(Some(encoder.finish()));
                Ok(())
            }
        }
    }
}

fn upload_texture_array(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    desc: &TextureArrayDesc<'_>,
) -> GpuTexture {
    let size = wgpu::Extent3d {
        width: desc.width,
        height: desc.height,
        depth_or_array_layers: desc.layers,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(desc.label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        desc.rgba,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * desc.width),
            rows_per_image: Some(desc.height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some(desc.label),
        dimension: Some(wgpu::TextureViewDimension::D2Array),
        ..Default::default()
    });
    let bind_group = atlas_bind_group(device, layout, sampler, &view, desc.label);
    GpuTexture {
        texture,
        bind_group,
    }
}

fn atlas_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    view: &wgpu::TextureView,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

impl GraphicsBackend for WgpuBackend {
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramHandle, RenderError> {
        let device = self.pixels.device();

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
        });
        let compile_error = pollster::block_on(device.pop_error_scope());

        let fragment_entry = match desc.fragment {
            FragmentKind::Textured => "fs_textured",
            FragmentKind::Flat => "fs_flat",
        };
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&self.resources.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: "vs_main",
                buffers: &[quad_layout(), instance_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: fragment_entry,
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });
        let link_error = pollster::block_on(device.pop_error_scope());

        let log: Vec<String> = [compile_error, link_error]
            .into_iter()
            .flatten()
            .map(|error| error.to_string())
            .collect();
        if !log.is_empty() {
            return Err(RenderError::Program {
                label: desc.label.to_string(),
                log: log.join("\n"),
            });
        }

        let handle = ProgramHandle(self.next_id());
        self.resources.programs.insert(handle, pipeline);
        debug!(label = desc.label, "program_created");
        Ok(handle)
    }

    fn create_instance_buffer(
        &mut self,
        label: &str,
        capacity_floats: usize,
    ) -> Result<BufferHandle, RenderError> {
        let size = ((capacity_floats * std::mem::size_of::<f32>()) as u64).max(MIN_BUFFER_BYTES);
        let buffer = self.pixels.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let handle = BufferHandle(self.next_id());
        self.resources.buffers.insert(
            handle,
            GpuBuffer {
                buffer,
                capacity_floats,
            },
        );
        Ok(handle)
    }

    fn upload_instances(&mut self, buffer: BufferHandle, data: &[f32]) -> Result<(), RenderError> {
        let gpu = self
            .resources
            .buffers
            .get(&buffer)
            .ok_or(RenderError::UnknownHandle {
                kind: "buffer",
                id: buffer.0,
            })?;
        if data.len() > gpu.capacity_floats {
            return Err(RenderError::UploadOverflow {
                floats: data.len(),
                capacity: gpu.capacity_floats,
            });
        }
        if data.is_empty() {
            return Ok(());
        }
        self.pixels
            .queue()
            .write_buffer(&gpu.buffer, 0, bytemuck::cast_slice(data));
        Ok(())
    }

    fn create_texture_array(
        &mut self,
        desc: &TextureArrayDesc<'_>,
    ) -> Result<TextureHandle, RenderError> {
        if desc.layers == 0 || desc.rgba.len() != desc.expected_len() {
            return Err(RenderError::TextureData {
                label: desc.label.to_string(),
                expected: desc.expected_len(),
                actual: desc.rgba.len(),
            });
        }
        let texture = upload_texture_array(
            self.pixels.device(),
            self.pixels.queue(),
            &self.resources.texture_layout,
            &self.resources.sampler,
            desc,
        );
        let handle = TextureHandle(self.next_id());
        self.resources.textures.insert(handle, texture);
        Ok(handle)
    }

    fn create_offscreen_target(
        &mut self,
        desc: &OffscreenDesc<'_>,
    ) -> Result<TargetHandle, RenderError> {
        let device = self.pixels.device();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let attachment = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampled = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(desc.label),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            array_layer_count: Some(1),
            ..Default::default()
        });
        let bind_group = atlas_bind_group(
            device,
            &self.resources.texture_layout,
            &self.resources.sampler,
            &sampled,
            desc.label,
        );
        let handle = TargetHandle(self.next_id());
        self.resources.targets.insert(
            handle,
            GpuTarget {
                texture,
                attachment,
                bind_group,
            },
        );
        Ok(handle)
    }

    fn write_world_uniform(&mut self, uniform: WorldUniform) {
        let data = [uniform.inv_half_width, uniform.neg_inv_half_height, 0.0, 0.0];
        self.pixels
            .queue()
            .write_buffer(&self.resources.world_buffer, 0, bytemuck::cast_slice(&data));
    }

    fn begin_pass(
        &mut self,
        target: RenderTarget,
        clear: Option<[f32; 4]>,
    ) -> Result<(), RenderError> {
        if self.open_pass.is_some() {
            return Err(RenderError::PassState("pass already open"));
        }
        self.open_pass = Some(RecordedPass {
            target,
            clear,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn draw_instanced(&mut self, call: &DrawCall) -> Result<(), RenderError> {
        if !self.resources.programs.contains_key(&call.program) {
            return Err(RenderError::UnknownHandle {
                kind: "program",
                id: call.program.0,
            });
        }
        if !self.resources.buffers.contains_key(&call.instances) {
            return Err(RenderError::UnknownHandle {
                kind: "buffer",
                id: call.instances.0,
            });
        }
        let pass = self
            .open_pass
            .as_mut()
            .ok_or(RenderError::PassState("draw outside of a pass"))?;
        pass.draws.push(*call);
        Ok(())
    }

    fn end_pass(&mut self) -> Result<(), RenderError> {
        let pass = self
            .open_pass
            .take()
            .ok_or(RenderError::PassState("no pass to end"))?;
        self.execute(pass)
    }

    fn resize_surface(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels
            .resize_surface(width, height)
            .map_err(|error| RenderError::Surface(error.to_string()))
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.resources.programs.remove(&program);
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        if let Some(gpu) = self.resources.buffers.remove(&buffer) {
            gpu.buffer.destroy();
        }
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(gpu) = self.resources.textures.remove(&texture) {
            gpu.texture.destroy();
        }
    }

    fn destroy_target(&mut self, target: TargetHandle) {
        if let Some(gpu) = self.resources.targets.remove(&target) {
            gpu.texture.destroy();
        }
    }
}
