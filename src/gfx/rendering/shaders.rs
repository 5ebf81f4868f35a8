//! WGSL sources and interfaces for the two fixed programs

use crate::gfx::backend::{AttributeDesc, Primitive, ProgramInterface, UniformDesc};

/// Stage sources plus the interface a program is linked against
#[derive(Debug, Clone, Copy)]
pub struct ProgramSource {
    pub vertex: &'static str,
    pub fragment: &'static str,
    pub interface: ProgramInterface,
}

pub const POSITION_ATTRIBUTE: &str = "position";
pub const POINT_SIZE_UNIFORM: &str = "point_size";

/// Grid lines: positions pass straight through to clip space, drawn light gray.
pub const LINE_PROGRAM: ProgramSource = ProgramSource {
    vertex: LINE_VERTEX_SHADER,
    fragment: LINE_FRAGMENT_SHADER,
    interface: ProgramInterface {
        label: "lines",
        primitive: Primitive::Lines,
        attributes: &[AttributeDesc {
            name: POSITION_ATTRIBUTE,
            location: 0,
            components: 2,
        }],
        uniforms: &[],
    },
};

/// Live cells: one black square of `point_size` pixels per vertex.
pub const POINT_PROGRAM: ProgramSource = ProgramSource {
    vertex: POINT_VERTEX_SHADER,
    fragment: POINT_FRAGMENT_SHADER,
    interface: ProgramInterface {
        label: "cells",
        primitive: Primitive::Points,
        attributes: &[AttributeDesc {
            name: POSITION_ATTRIBUTE,
            location: 0,
            components: 2,
        }],
        uniforms: &[UniformDesc {
            name: POINT_SIZE_UNIFORM,
            location: 0,
        }],
    },
};

const LINE_VERTEX_SHADER: &str = r#"
@vertex
fn vs_main(@location(0) position: vec2<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(position.x, position.y, 0.0, 1.0);
}
"#;

const LINE_FRAGMENT_SHADER: &str = r#"
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(0.8, 0.8, 0.8, 1.0);
}
"#;

// values.x = point_size in pixels, values.zw = viewport size in pixels
const POINT_VERTEX_SHADER: &str = r#"
struct Uniforms {
    values: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

@vertex
fn vs_main(
    @builtin(vertex_index) corner: u32,
    @location(0) position: vec2<f32>,
) -> @builtin(position) vec4<f32> {
    let point_size = uniforms.values.x;
    let viewport = max(uniforms.values.zw, vec2<f32>(1.0, 1.0));

    // Triangle strip over the four corners of a unit square centred on the point
    let quad = vec2<f32>(f32(corner & 1u), f32((corner >> 1u) & 1u)) - vec2<f32>(0.5, 0.5);
    let offset = quad * point_size * 2.0 / viewport;

    return vec4<f32>(position + offset, 1.0, 1.0);
}
"#;

const POINT_FRAGMENT_SHADER: &str = r#"
@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(0.0, 0.0, 0.0, 1.0);
}
"#;
