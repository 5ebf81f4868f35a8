//! Shader program management
//!
//! Compiles and links the two fixed programs once at startup and caches their
//! attribute and uniform locations for the lifetime of the renderer. Nothing here
//! runs per frame.

use std::collections::HashMap;

use crate::gfx::{
    backend::{ProgramHandle, RenderBackend, ShaderHandle, ShaderStage},
    error::RenderError,
};

use super::shaders::{ProgramSource, LINE_PROGRAM, POINT_PROGRAM};

/// Compiles a single shader stage
///
/// On failure the diagnostic log is reported at error level and the shader
/// object is released before returning, so a failed shader can never be
/// attached to a program.
pub fn compile_shader<B: RenderBackend>(
    backend: &mut B,
    source: &str,
    stage: ShaderStage,
) -> Result<ShaderHandle, RenderError> {
    let shader = backend.create_shader(stage)?;

    match backend.compile_shader(shader, source) {
        Ok(()) => Ok(shader),
        Err(log) => {
            log::error!("An error occurred compiling the {stage} shader: {log}");
            backend.delete_shader(shader);
            Err(RenderError::ShaderCompile { stage, log })
        }
    }
}

/// A linked program with its resolved attribute and uniform locations
#[derive(Debug)]
pub struct ShaderProgram {
    label: &'static str,
    handle: ProgramHandle,
    attributes: HashMap<&'static str, u32>,
    uniforms: HashMap<&'static str, u32>,
}

impl ShaderProgram {
    /// Compiles both stages, links them and resolves every declared location
    ///
    /// Any object created along the way is released on every error path; the
    /// stage shaders are also released after a successful link since the program
    /// no longer needs them.
    pub fn build<B: RenderBackend>(
        backend: &mut B,
        source: &ProgramSource,
    ) -> Result<Self, RenderError> {
        let label = source.interface.label;

        let vertex = compile_shader(backend, source.vertex, ShaderStage::Vertex)?;
        let fragment = match compile_shader(backend, source.fragment, ShaderStage::Fragment) {
            Ok(shader) => shader,
            Err(err) => {
                backend.delete_shader(vertex);
                return Err(err);
            }
        };
        let stages = [vertex, fragment];

        let handle = match backend.create_program(label) {
            Ok(handle) => handle,
            Err(err) => {
                stages.iter().for_each(|s| backend.delete_shader(*s));
                return Err(err);
            }
        };

        let linked = backend.link_program(handle, &stages, &source.interface);
        stages.iter().for_each(|s| backend.delete_shader(*s));

        if let Err(log) = linked {
            log::error!("Unable to initialize the shader program '{label}': {log}");
            backend.delete_program(handle);
            return Err(RenderError::ProgramLink {
                label: label.to_owned(),
                log,
            });
        }

        match Self::resolve_locations(backend, handle, source) {
            Ok((attributes, uniforms)) => {
                log::debug!(
                    "linked program '{label}' ({} attributes, {} uniforms)",
                    attributes.len(),
                    uniforms.len()
                );
                Ok(Self {
                    label,
                    handle,
                    attributes,
                    uniforms,
                })
            }
            Err(err) => {
                backend.delete_program(handle);
                Err(err)
            }
        }
    }

    fn resolve_locations<B: RenderBackend>(
        backend: &B,
        handle: ProgramHandle,
        source: &ProgramSource,
    ) -> Result<(HashMap<&'static str, u32>, HashMap<&'static str, u32>), RenderError> {
        let label = source.interface.label;

        let attributes = source
            .interface
            .attributes
            .iter()
            .map(|a| {
                backend
                    .attribute_location(handle, a.name)
                    .map(|location| (a.name, location))
                    .ok_or_else(|| RenderError::MissingAttribute {
                        program: label.to_owned(),
                        name: a.name.to_owned(),
                    })
            })
            .collect::<Result<_, _>>()?;

        let uniforms = source
            .interface
            .uniforms
            .iter()
            .map(|u| {
                backend
                    .uniform_location(handle, u.name)
                    .map(|location| (u.name, location))
                    .ok_or_else(|| RenderError::MissingUniform {
                        program: label.to_owned(),
                        name: u.name.to_owned(),
                    })
            })
            .collect::<Result<_, _>>()?;

        Ok((attributes, uniforms))
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    /// Cached location of an attribute declared by this program
    pub fn attribute(&self, name: &str) -> Result<u32, RenderError> {
        self.attributes
            .get(name)
            .copied()
            .ok_or_else(|| RenderError::MissingAttribute {
                program: self.label.to_owned(),
                name: name.to_owned(),
            })
    }

    /// Cached location of a uniform declared by this program
    pub fn uniform(&self, name: &str) -> Result<u32, RenderError> {
        self.uniforms
            .get(name)
            .copied()
            .ok_or_else(|| RenderError::MissingUniform {
                program: self.label.to_owned(),
                name: name.to_owned(),
            })
    }

    /// Releases the program object
    pub fn destroy<B: RenderBackend>(self, backend: &mut B) {
        log::debug!("destroying program '{}'", self.label);
        backend.delete_program(self.handle);
    }
}

/// The line and point programs, built together at startup
#[derive(Debug)]
pub struct ShaderPrograms {
    pub lines: ShaderProgram,
    pub cells: ShaderProgram,
}

impl ShaderPrograms {
    /// Builds both programs; a failure in either aborts startup
    pub fn new<B: RenderBackend>(backend: &mut B) -> Result<Self, RenderError> {
        let lines = ShaderProgram::build(backend, &LINE_PROGRAM)?;
        let cells = match ShaderProgram::build(backend, &POINT_PROGRAM) {
            Ok(program) => program,
            Err(err) => {
                lines.destroy(backend);
                return Err(err);
            }
        };

        Ok(Self { lines, cells })
    }

    pub fn destroy<B: RenderBackend>(self, backend: &mut B) {
        self.lines.destroy(backend);
        self.cells.destroy(backend);
    }
}
