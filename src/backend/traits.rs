//! Renderer abstraction traits
//!
//! The view components never talk to a concrete engine. Everything they need from
//! the renderer (texture upload, material parameters, renderables, the scene camera
//! and the scene lights) goes through [`RenderBackend`], which is handed to each
//! component call explicitly.

use crate::backend::types::*;
use crate::tracking::Pose;
use glam::Mat4;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create material: {0}")]
    MaterialCreationFailed(String),
    #[error("Failed to create renderable: {0}")]
    RenderableCreationFailed(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Handle to a material instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u64);

/// Handle to a renderable entity in the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderableHandle(pub u64);

/// Renderer operations consumed by the AR view
pub trait RenderBackend {
    // Buffers

    /// Create a buffer with initial data
    fn create_buffer_init(&mut self, desc: &BufferDescriptor, data: &[u8])
        -> BackendResult<BufferHandle>;

    /// Write data to a buffer
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    /// Destroy a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    // Textures

    /// Create a texture
    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    /// Wrap a texture name that is written by the camera driver
    fn import_external_texture(
        &mut self,
        texture_id: u32,
        width: u32,
        height: u32,
    ) -> BackendResult<TextureHandle>;

    /// Write the base level of a 2D texture
    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32);

    /// Write the six faces of a cube texture, optionally generating prefiltered mips
    fn write_cube_texture(
        &mut self,
        texture: TextureHandle,
        data: &[u8],
        face_offsets: &[usize; 6],
        size: u32,
        prefilter: bool,
    );

    /// Destroy a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    // Materials

    /// Create a material instance from a template
    fn create_material(&mut self, kind: &MaterialKind) -> BackendResult<MaterialHandle>;

    /// Set a scalar/vector parameter
    fn set_material_parameter(
        &mut self,
        material: MaterialHandle,
        name: &str,
        value: MaterialParameter,
    );

    /// Bind a texture parameter
    fn set_material_texture(&mut self, material: MaterialHandle, name: &str, texture: TextureHandle);

    /// Destroy a material instance
    fn destroy_material(&mut self, material: MaterialHandle);

    // Renderables

    /// Create a renderable and add it to the scene
    fn create_renderable(&mut self, desc: &RenderableDescriptor) -> BackendResult<RenderableHandle>;

    /// Swap the material of the first primitive
    fn set_renderable_material(&mut self, renderable: RenderableHandle, material: MaterialHandle);

    /// Replace geometry (vertex/index counts may change)
    fn set_renderable_geometry(&mut self, renderable: RenderableHandle, geometry: &Geometry);

    /// Set the render priority (0 first, 7 last)
    fn set_renderable_priority(&mut self, renderable: RenderableHandle, priority: u8);

    /// Show/hide the renderable
    fn set_renderable_visible(&mut self, renderable: RenderableHandle, visible: bool);

    /// Control shadow casting and receiving
    fn set_renderable_shadows(&mut self, renderable: RenderableHandle, cast: bool, receive: bool);

    /// Remove from the scene and destroy
    fn destroy_renderable(&mut self, renderable: RenderableHandle);

    // Scene

    /// Update the scene camera from the tracked camera
    fn set_camera_pose(&mut self, pose: &Pose, projection: Mat4);

    /// Front-facing capture mirrors the image, so winding must be flipped
    fn set_front_face_winding_inverted(&mut self, inverted: bool);

    /// Set the directional main light
    fn set_main_light(&mut self, light: &MainLightParams);

    /// Set the image based ambient light
    fn set_indirect_light(&mut self, light: &IndirectLightParams);
}
