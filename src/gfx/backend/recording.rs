//! In-memory backend that records every call, used by unit tests

use std::collections::HashMap;

use super::{
    BufferHandle, BufferUsage, ClearState, DrawCall, Primitive, ProgramHandle, ProgramInterface,
    RenderBackend, ShaderHandle, ShaderStage, VertexLayout,
};
use crate::gfx::error::RenderError;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub program: ProgramHandle,
    pub buffer: BufferHandle,
    pub layout: VertexLayout,
    pub uniforms: Vec<(u32, f32)>,
    pub primitive: Primitive,
    pub first: u32,
    pub count: u32,
    /// Contents of the bound buffer at the time of the draw.
    pub vertices: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub clear: ClearState,
    pub draws: Vec<RecordedDraw>,
}

#[derive(Debug, Clone)]
pub struct RecordedBuffer {
    pub usage: BufferUsage,
    pub data: Vec<f32>,
    pub uploads: usize,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u32,
    pub shaders: HashMap<ShaderHandle, ShaderStage>,
    pub programs: HashMap<ProgramHandle, (String, Option<ProgramInterface>)>,
    pub buffers: HashMap<BufferHandle, RecordedBuffer>,
    pub frames: Vec<RecordedFrame>,
    pub deleted_shaders: Vec<ShaderHandle>,
    pub deleted_programs: Vec<ProgramHandle>,
    pub deleted_buffers: Vec<BufferHandle>,
    /// Compilation of this stage fails with a canned log.
    pub fail_compile: Option<ShaderStage>,
    /// Linking a program with this label fails with a canned log.
    pub fail_link: Option<&'static str>,
    open_frame: Option<RecordedFrame>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    fn allocate(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn last_frame(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }

    /// True when nothing created through this backend is still alive.
    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty() && self.programs.is_empty() && self.buffers.is_empty()
    }
}

impl RenderBackend for RecordingBackend {
    fn create_shader(&mut self, stage: ShaderStage) -> Result<ShaderHandle, RenderError> {
        let handle = ShaderHandle(self.allocate());
        self.shaders.insert(handle, stage);
        Ok(handle)
    }

    fn compile_shader(&mut self, shader: ShaderHandle, source: &str) -> Result<(), String> {
        let stage = self
            .shaders
            .get(&shader)
            .copied()
            .ok_or_else(|| format!("unknown shader {}", shader.0))?;
        if source.trim().is_empty() {
            return Err("empty shader source".into());
        }
        if self.fail_compile == Some(stage) {
            return Err(format!("0:1: syntax error in {stage} stage"));
        }
        Ok(())
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        if self.shaders.remove(&shader).is_some() {
            self.deleted_shaders.push(shader);
        }
    }

    fn create_program(&mut self, label: &str) -> Result<ProgramHandle, RenderError> {
        let handle = ProgramHandle(self.allocate());
        self.programs.insert(handle, (label.to_owned(), None));
        Ok(handle)
    }

    fn link_program(
        &mut self,
        program: ProgramHandle,
        shaders: &[ShaderHandle],
        interface: &ProgramInterface,
    ) -> Result<(), String> {
        if shaders.iter().any(|s| !self.shaders.contains_key(s)) {
            return Err("attached shader does not exist".into());
        }
        let entry = self
            .programs
            .get_mut(&program)
            .ok_or_else(|| format!("unknown program {}", program.0))?;
        if self.fail_link == Some(interface.label) {
            return Err("varying mismatch between stages".into());
        }
        entry.1 = Some(*interface);
        Ok(())
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.programs.remove(&program).is_some() {
            self.deleted_programs.push(program);
        }
    }

    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        let interface = self.programs.get(&program)?.1.as_ref()?;
        interface
            .attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.location)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        let interface = self.programs.get(&program)?.1.as_ref()?;
        interface
            .uniforms
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.location)
    }

    fn create_buffer(
        &mut self,
        data: &[f32],
        usage: BufferUsage,
    ) -> Result<BufferHandle, RenderError> {
        let handle = BufferHandle(self.allocate());
        self.buffers.insert(
            handle,
            RecordedBuffer {
                usage,
                data: data.to_vec(),
                uploads: 1,
            },
        );
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, data: &[f32]) -> Result<(), RenderError> {
        let entry = self
            .buffers
            .get_mut(&buffer)
            .ok_or(RenderError::UnknownHandle {
                kind: "buffer",
                id: buffer.0,
            })?;
        if entry.usage == BufferUsage::Static {
            return Err(RenderError::ImmutableBuffer { id: buffer.0 });
        }
        entry.data = data.to_vec();
        entry.uploads += 1;
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if self.buffers.remove(&buffer).is_some() {
            self.deleted_buffers.push(buffer);
        }
    }

    fn begin_frame(&mut self, clear: ClearState) -> Result<(), RenderError> {
        if self.open_frame.is_some() {
            return Err(RenderError::FrameState("begin_frame called twice"));
        }
        self.open_frame = Some(RecordedFrame {
            clear,
            draws: Vec::new(),
        });
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_>) -> Result<(), RenderError> {
        let vertices = self
            .buffers
            .get(&call.buffer)
            .map(|b| b.data.clone())
            .ok_or(RenderError::UnknownHandle {
                kind: "buffer",
                id: call.buffer.0,
            })?;
        if !self.programs.contains_key(&call.program) {
            return Err(RenderError::UnknownHandle {
                kind: "program",
                id: call.program.0,
            });
        }
        let available = (vertices.len() / call.layout.components.max(1) as usize) as u64;
        let requested = call.first as u64 + call.count as u64;
        if requested > available {
            return Err(RenderError::VertexCountExceedsBuffer {
                requested,
                available,
            });
        }

        let frame = self
            .open_frame
            .as_mut()
            .ok_or(RenderError::FrameState("draw called outside a frame"))?;
        frame.draws.push(RecordedDraw {
            program: call.program,
            buffer: call.buffer,
            layout: call.layout,
            uniforms: call.uniforms.to_vec(),
            primitive: call.primitive,
            first: call.first,
            count: call.count,
            vertices,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        let frame = self
            .open_frame
            .take()
            .ok_or(RenderError::FrameState("end_frame called without begin_frame"))?;
        self.frames.push(frame);
        Ok(())
    }
}
