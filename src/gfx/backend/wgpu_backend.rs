//! wgpu implementation of the driver seam
//!
//! Maps the GL-shaped [`RenderBackend`] contract onto wgpu:
//! - shader compilation creates a `ShaderModule` inside a validation error scope
//! - linking creates the render pipeline, so the vertex layout, primitive topology
//!   and nearer-or-equal depth test are fixed at link time
//! - `Points` programs are drawn as instanced screen-space quads whose edge length
//!   comes from the `point_size` uniform, since wgpu has no adjustable point size
//! - draw calls are collected while a frame is open and encoded into a single
//!   render pass when the frame ends

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use super::{
    BufferHandle, BufferUsage, ClearState, DrawCall, Primitive, ProgramHandle,
    ProgramInterface, RenderBackend, ShaderHandle, ShaderStage,
};
use crate::gfx::{error::RenderError, resources::texture_resource::TextureResource};

/// Number of `f32` slots in each program's uniform block
///
/// Slots `0..USER_UNIFORM_SLOTS` hold program uniforms; the remaining two carry
/// the viewport size in pixels, filled in by the backend every frame.
const UNIFORM_SLOTS: usize = 4;
const USER_UNIFORM_SLOTS: u32 = 2;

/// Smallest allocation for a vertex buffer, so empty geometry still yields a valid buffer
const MIN_BUFFER_BYTES: u64 = 256;

/// Vertices emitted per instance when a point is expanded into a quad
const QUAD_VERTICES: u32 = 4;

struct ShaderSlot {
    stage: ShaderStage,
    module: Option<wgpu::ShaderModule>,
}

struct LinkedProgram {
    primitive: Primitive,
    attributes: Vec<(String, u32, u32)>,
    uniforms: Vec<(String, u32)>,
    pipeline: wgpu::RenderPipeline,
    uniform_block: [f32; UNIFORM_SLOTS],
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct ProgramSlot {
    label: String,
    linked: Option<LinkedProgram>,
}

struct BufferSlot {
    buffer: wgpu::Buffer,
    usage: BufferUsage,
    capacity: u64,
    floats: usize,
}

struct RecordedDraw {
    program: ProgramHandle,
    buffer: BufferHandle,
    primitive: Primitive,
    first: u32,
    count: u32,
}

struct PendingFrame {
    /// `None` when the surface could not provide an image and the frame is skipped.
    surface_texture: Option<wgpu::SurfaceTexture>,
    clear: ClearState,
    draws: Vec<RecordedDraw>,
}

/// wgpu-backed driver owning the surface, device and every GPU object
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth_texture: TextureResource,
    uniform_layout: wgpu::BindGroupLayout,
    next_id: u32,
    shaders: HashMap<ShaderHandle, ShaderSlot>,
    programs: HashMap<ProgramHandle, ProgramSlot>,
    buffers: HashMap<BufferHandle, BufferSlot>,
    frame: Option<PendingFrame>,
}

impl WgpuBackend {
    /// Creates a backend rendering into the given window
    ///
    /// # Arguments
    /// * `window` - Window surface target for rendering
    /// * `width` - Initial surface width in pixels
    /// * `height` - Initial surface height in pixels
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .map_err(|e| RenderError::Device(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::Device(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lifeview device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| RenderError::Device(e.to_string()))?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = capabilities
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| capabilities.formats.first().copied())
            .ok_or_else(|| RenderError::Device("surface reports no formats".into()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            // Presentation paced by the display refresh
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let depth_texture = TextureResource::create_depth_texture(&device, &config, "depth_texture");

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Program Uniform Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        log::info!(
            "wgpu backend ready: {:?} {}x{} ({:?})",
            adapter.get_info().backend,
            config.width,
            config.height,
            format
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            depth_texture,
            uniform_layout,
            next_id: 1,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            frame: None,
        })
    }

    /// Reconfigures the surface and depth buffer for a new window size
    ///
    /// Zero-sized requests (minimized windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }

        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);

        let old = std::mem::replace(
            &mut self.depth_texture,
            TextureResource::create_depth_texture(&self.device, &self.config, "depth_texture"),
        );
        old.destroy();
    }

    /// Returns current surface dimensions in pixels
    pub fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    fn build_pipeline(
        &self,
        label: &str,
        vertex: &wgpu::ShaderModule,
        fragment: &wgpu::ShaderModule,
        interface: &ProgramInterface,
    ) -> Result<wgpu::RenderPipeline, String> {
        let mut attributes = Vec::with_capacity(interface.attributes.len());
        let mut offset = 0u64;
        for attribute in interface.attributes {
            let format = match attribute.components {
                1 => wgpu::VertexFormat::Float32,
                2 => wgpu::VertexFormat::Float32x2,
                3 => wgpu::VertexFormat::Float32x3,
                4 => wgpu::VertexFormat::Float32x4,
                n => return Err(format!("attribute '{}' has {n} components", attribute.name)),
            };
            attributes.push(wgpu::VertexAttribute {
                offset,
                shader_location: attribute.location,
                format,
            });
            offset += format.size();
        }

        let (step_mode, topology) = match interface.primitive {
            Primitive::Lines => (wgpu::VertexStepMode::Vertex, wgpu::PrimitiveTopology::LineList),
            Primitive::Points => (
                wgpu::VertexStepMode::Instance,
                wgpu::PrimitiveTopology::TriangleStrip,
            ),
        };

        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{label} Layout")),
                bind_group_layouts: &[&self.uniform_layout],
                push_constant_ranges: &[],
            });

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: vertex,
                    entry_point: Some("vs_main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: offset,
                        step_mode,
                        attributes: &attributes,
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: fragment,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
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
                    format: TextureResource::DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(err.to_string()),
            None => Ok(pipeline),
        }
    }

    fn encode_frame(&mut self, frame: PendingFrame, surface_texture: wgpu::SurfaceTexture) {
        let viewport = [self.config.width as f32, self.config.height as f32];
        for draw in &frame.draws {
            if let Some(linked) = self
                .programs
                .get_mut(&draw.program)
                .and_then(|slot| slot.linked.as_mut())
            {
                linked.uniform_block[USER_UNIFORM_SLOTS as usize] = viewport[0];
                linked.uniform_block[USER_UNIFORM_SLOTS as usize + 1] = viewport[1];
                self.queue.write_buffer(
                    &linked.uniform_buffer,
                    0,
                    bytemuck::cast_slice(&linked.uniform_block),
                );
            }
        }

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let [r, g, b, a] = frame.clear.color;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(frame.clear.depth),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for draw in &frame.draws {
                let (Some(linked), Some(buffer)) = (
                    self.programs
                        .get(&draw.program)
                        .and_then(|slot| slot.linked.as_ref()),
                    self.buffers.get(&draw.buffer),
                ) else {
                    continue;
                };

                render_pass.set_pipeline(&linked.pipeline);
                render_pass.set_bind_group(0, &linked.bind_group, &[]);
                render_pass.set_vertex_buffer(0, buffer.buffer.slice(..));

                let range = draw.first..draw.first + draw.count;
                match draw.primitive {
                    Primitive::Lines => render_pass.draw(range, 0..1),
                    Primitive::Points => render_pass.draw(0..QUAD_VERTICES, range),
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        surface_texture.present();
    }
}

impl RenderBackend for WgpuBackend {
    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderHandle, RenderError> {
        let handle = ShaderHandle(self.allocate_id());
        self.shaders.insert(
            handle,
            ShaderSlot {
                stage,
                module: None,
            },
        );
        Ok(handle)
    }

    fn compile_shader(&mut self, shader: ShaderHandle, source: &str) -> Result<(), String> {
        let Some(slot) = self.shaders.get(&shader) else {
            return Err(format!("unknown shader handle {}", shader.0));
        };
        let label = format!("{} shader {}", slot.stage, shader.0);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        let scope_error = pollster::block_on(self.device.pop_error_scope());

        let info = pollster::block_on(module.get_compilation_info());
        let diagnostics: Vec<String> = info
            .messages
            .iter()
            .filter(|m| m.message_type == wgpu::CompilationMessageType::Error)
            .map(|m| match &m.location {
                Some(loc) => format!("{}:{}: {}", loc.line_number, loc.line_position, m.message),
                None => m.message.clone(),
            })
            .collect();

        if scope_error.is_some() || !diagnostics.is_empty() {
            let mut log = diagnostics.join("\n");
            if let Some(err) = scope_error {
                if !log.is_empty() {
                    log.push('\n');
                }
                log.push_str(&err.to_string());
            }
            return Err(log);
        }

        if let Some(slot) = self.shaders.get_mut(&shader) {
            slot.module = Some(module);
        }
        Ok(())
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader);
    }

    fn create_program(&mut self, label: &str) -> Result<ProgramHandle, RenderError> {
        let handle = ProgramHandle(self.allocate_id());
        self.programs.insert(
            handle,
            ProgramSlot {
                label: label.to_owned(),
                linked: None,
            },
        );
        Ok(handle)
    }

    fn link_program(
        &mut self,
        program: ProgramHandle,
        shaders: &[ShaderHandle],
        interface: &ProgramInterface,
    ) -> Result<(), String> {
        let label = self
            .programs
            .get(&program)
            .map(|slot| slot.label.clone())
            .ok_or_else(|| format!("unknown program handle {}", program.0))?;

        let module_for = |stage: ShaderStage| {
            shaders
                .iter()
                .filter_map(|handle| self.shaders.get(handle))
                .find(|slot| slot.stage == stage)
                .and_then(|slot| slot.module.as_ref())
        };
        let (Some(vertex), Some(fragment)) =
            (module_for(ShaderStage::Vertex), module_for(ShaderStage::Fragment))
        else {
            return Err("a program needs one compiled vertex and one compiled fragment shader".into());
        };

        if let Some(uniform) = interface
            .uniforms
            .iter()
            .find(|u| u.location >= USER_UNIFORM_SLOTS)
        {
            return Err(format!(
                "uniform '{}' uses location {}, only {USER_UNIFORM_SLOTS} are available",
                uniform.name, uniform.location
            ));
        }

        let pipeline = self.build_pipeline(&label, vertex, fragment, interface)?;

        let uniform_block = [0.0f32; UNIFORM_SLOTS];
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label} Uniforms")),
                contents: bytemuck::cast_slice(&uniform_block),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} Bind Group")),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let linked = LinkedProgram {
            primitive: interface.primitive,
            attributes: interface
                .attributes
                .iter()
                .map(|a| (a.name.to_owned(), a.location, a.components))
                .collect(),
            uniforms: interface
                .uniforms
                .iter()
                .map(|u| (u.name.to_owned(), u.location))
                .collect(),
            pipeline,
            uniform_block,
            uniform_buffer,
            bind_group,
        };
        if let Some(slot) = self.programs.get_mut(&program) {
            slot.linked = Some(linked);
        }
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if let Some(slot) = self.programs.remove(&program) {
            if let Some(linked) = slot.linked {
                linked.uniform_buffer.destroy();
            }
        }
    }

    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        let linked = self.programs.get(&program)?.linked.as_ref()?;
        linked
            .attributes
            .iter()
            .find(|(attribute, _, _)| attribute == name)
            .map(|(_, location, _)| *location)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        let linked = self.programs.get(&program)?.linked.as_ref()?;
        linked
            .uniforms
            .iter()
            .find(|(uniform, _)| uniform == name)
            .map(|(_, location)| *location)
    }

    fn create_buffer(
        &mut self,
        data: &[f32],
        usage: BufferUsage,
    ) -> Result<BufferHandle, RenderError> {
        let handle = BufferHandle(self.allocate_id());
        let bytes: &[u8] = bytemuck::cast_slice(data);

        let slot = match usage {
            BufferUsage::Static => {
                // Never respecified, so no COPY_DST
                let padding = [0u8; MIN_BUFFER_BYTES as usize];
                let contents = if bytes.is_empty() { &padding[..] } else { bytes };
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("Static Vertex Buffer"),
                        contents,
                        usage: wgpu::BufferUsages::VERTEX,
                    });
                BufferSlot {
                    buffer,
                    usage,
                    capacity: contents.len() as u64,
                    floats: data.len(),
                }
            }
            BufferUsage::Dynamic => {
                let capacity = (bytes.len() as u64).max(MIN_BUFFER_BYTES).next_power_of_two();
                let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Dynamic Vertex Buffer"),
                    size: capacity,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                if !bytes.is_empty() {
                    self.queue.write_buffer(&buffer, 0, bytes);
                }
                BufferSlot {
                    buffer,
                    usage,
                    capacity,
                    floats: data.len(),
                }
            }
        };

        self.buffers.insert(handle, slot);
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[f32]) -> Result<(), RenderError> {
        let slot = self
            .buffers
            .get_mut(&buffer)
            .ok_or(RenderError::UnknownHandle {
                kind: "buffer",
                id: buffer.0,
            })?;
        if slot.usage == BufferUsage::Static {
            return Err(RenderError::ImmutableBuffer { id: buffer.0 });
        }

        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() as u64 > slot.capacity {
            let capacity = (bytes.len() as u64).next_power_of_two();
            log::trace!(
                "growing dynamic buffer {} from {} to {} bytes",
                buffer.0,
                slot.capacity,
                capacity
            );
            let replacement = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Dynamic Vertex Buffer"),
                size: capacity,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            std::mem::replace(&mut slot.buffer, replacement).destroy();
            slot.capacity = capacity;
        }

        if !bytes.is_empty() {
            self.queue.write_buffer(&slot.buffer, 0, bytes);
        }
        slot.floats = data.len();
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if let Some(slot) = self.buffers.remove(&buffer) {
            slot.buffer.destroy();
        }
    }

    fn begin_frame(&mut self, clear: ClearState) -> Result<(), RenderError> {
        if self.frame.is_some() {
            return Err(RenderError::FrameState("begin_frame called twice"));
        }

        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => Some(texture),
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(RenderError::Surface("out of memory".into()));
            }
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                log::warn!("surface {err}, reconfiguring and skipping frame");
                self.surface.configure(&self.device, &self.config);
                None
            }
            Err(err) => {
                log::warn!("surface {err}, skipping frame");
                None
            }
        };

        self.frame = Some(PendingFrame {
            surface_texture,
            clear,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), RenderError> {
        if self.frame.is_none() {
            return Err(RenderError::FrameState("draw called outside a frame"));
        }

        let slot = self
            .programs
            .get_mut(&call.program)
            .ok_or(RenderError::UnknownHandle {
                kind: "program",
                id: call.program.0,
            })?;
        let program_label = slot.label.clone();
        let linked = slot.linked.as_mut().ok_or_else(|| RenderError::ProgramLink {
            label: program_label.clone(),
            log: "program used before a successful link".into(),
        })?;

        let layout_matches = linked
            .attributes
            .iter()
            .any(|(_, location, components)| {
                *location == call.layout.location && *components == call.layout.components
            })
            && call.layout.is_tightly_packed();
        if !layout_matches || linked.primitive != call.primitive {
            return Err(RenderError::VertexLayoutMismatch {
                program: program_label,
                details: format!("{:?} as {:?}", call.layout, call.primitive),
            });
        }

        for &(location, value) in call.uniforms {
            if !linked.uniforms.iter().any(|(_, l)| *l == location) {
                return Err(RenderError::MissingUniform {
                    program: program_label,
                    name: format!("#{location}"),
                });
            }
            linked.uniform_block[location as usize] = value;
        }

        let buffer = self
            .buffers
            .get(&call.buffer)
            .ok_or(RenderError::UnknownHandle {
                kind: "buffer",
                id: call.buffer.0,
            })?;
        let available = (buffer.floats / call.layout.components.max(1) as usize) as u64;
        let requested = call.first as u64 + call.count as u64;
        if requested > available {
            return Err(RenderError::VertexCountExceedsBuffer {
                requested,
                available,
            });
        }

        if call.count == 0 {
            return Ok(());
        }

        if let Some(frame) = self.frame.as_mut() {
            frame.draws.push(RecordedDraw {
                program: call.program,
                buffer: call.buffer,
                primitive: call.primitive,
                first: call.first,
                count: call.count,
            });
        }
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        let mut frame = self
            .frame
            .take()
            .ok_or(RenderError::FrameState("end_frame called without begin_frame"))?;

        match frame.surface_texture.take() {
            Some(surface_texture) => self.encode_frame(frame, surface_texture),
            None => log::trace!("frame skipped, {} draws dropped", frame.draws.len()),
        }
        Ok(())
    }
}
