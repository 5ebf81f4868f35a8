// src/gfx/resources/mod.rs
//! GPU resource management
//!
//! Textures owned by the wgpu driver.

pub mod texture_resource;

pub use texture_resource::TextureResource;
