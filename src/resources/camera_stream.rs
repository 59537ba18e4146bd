//! Camera feed background and depth occlusion
//!
//! The camera image is drawn as a single full-screen triangle sampling the
//! driver's external texture. Width and height of that texture are only known
//! once the first snapshot's intrinsics arrive, so texture creation and
//! renderable creation are deferred until [`CameraStream::initialize_texture`].

use glam::Mat4;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::{DepthTexture, ExternalTexture};
use crate::tracking::{
    CameraIntrinsics, DepthCapability, DepthImage, SessionConfig, TrackingFrame, TrackingSession,
};

pub const MATERIAL_CAMERA_TEXTURE: &str = "cameraTexture";
pub const MATERIAL_DEPTH_TEXTURE: &str = "depthTexture";
pub const MATERIAL_UV_TRANSFORM: &str = "uvTransform";

/// Highest priority value, drawn after everything else to avoid overdraw
pub const RENDER_PRIORITY_LAST: u8 = 7;

const VERTEX_COUNT: usize = 3;

// Full-screen triangle, xyz per vertex.
const CAMERA_VERTICES: [f32; VERTEX_COUNT * 3] = [-1.0, 1.0, 1.0, -1.0, -3.0, 1.0, 3.0, 1.0, 1.0];
const CAMERA_UVS: [f32; VERTEX_COUNT * 2] = [0.0, 0.0, 0.0, 2.0, 2.0, 0.0];
const INDICES: [u16; VERTEX_COUNT] = [0, 1, 2];

/// Depth data the session is producing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthMode {
    #[default]
    NoDepth,
    Depth,
    RawDepth,
}

/// Whether virtual content is depth tested against the real world
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthOcclusionMode {
    Enabled,
    #[default]
    Disabled,
}

/// Intersection of what the session is configured for and what the device supports
pub fn select_depth_mode(
    requested: DepthCapability,
    is_supported: impl Fn(DepthCapability) -> bool,
) -> DepthMode {
    match requested {
        DepthCapability::Automatic if is_supported(DepthCapability::Automatic) => DepthMode::Depth,
        DepthCapability::RawDepthOnly if is_supported(DepthCapability::RawDepthOnly) => {
            DepthMode::RawDepth
        }
        _ => DepthMode::NoDepth,
    }
}

/// Material bound (or waiting to be bound) to the camera renderable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraMaterial {
    pub material: MaterialHandle,
    /// Binds the depth texture as well
    pub occlusion: bool,
    /// Set by the application rather than chosen from the occlusion mode
    pub custom: bool,
}

/// Owns the camera texture, the depth texture and the background renderable
#[derive(Debug)]
pub struct CameraStream {
    camera_texture_id: u32,
    index_buffer: BufferHandle,
    vertex_buffer: BufferHandle,
    uv_buffer: BufferHandle,
    transformed_uvs: [f32; VERTEX_COUNT * 2],
    camera_texture: Option<ExternalTexture>,
    depth_texture: Option<DepthTexture>,
    standard_material: MaterialHandle,
    occlusion_material: MaterialHandle,
    camera_material: Option<CameraMaterial>,
    renderable: Option<RenderableHandle>,
    render_priority: u8,
    depth_mode: DepthMode,
    depth_occlusion_mode: DepthOcclusionMode,
}

impl CameraStream {
    pub fn new<B: RenderBackend>(
        backend: &mut B,
        camera_texture_id: u32,
        render_priority: u8,
        depth_occlusion_mode: DepthOcclusionMode,
    ) -> BackendResult<Self> {
        let index_buffer = backend.create_buffer_init(
            &BufferDescriptor::index("camera indices", std::mem::size_of_val(&INDICES) as u64),
            bytemuck::cast_slice(&INDICES),
        )?;
        let vertex_buffer = backend.create_buffer_init(
            &BufferDescriptor::vertex(
                "camera positions",
                std::mem::size_of_val(&CAMERA_VERTICES) as u64,
            ),
            bytemuck::cast_slice(&CAMERA_VERTICES),
        )?;

        let mut transformed_uvs = CAMERA_UVS;
        flip_vertical(&mut transformed_uvs);
        let uv_buffer = backend.create_buffer_init(
            &BufferDescriptor::vertex("camera uvs", std::mem::size_of_val(&CAMERA_UVS) as u64),
            bytemuck::cast_slice(&transformed_uvs),
        )?;

        let standard_material = Self::create_camera_material(backend, MaterialKind::CameraStandard)?;
        let occlusion_material = Self::create_camera_material(backend, MaterialKind::CameraOcclusion)?;

        let mut stream = Self {
            camera_texture_id,
            index_buffer,
            vertex_buffer,
            uv_buffer,
            transformed_uvs,
            camera_texture: None,
            depth_texture: None,
            standard_material,
            occlusion_material,
            camera_material: None,
            renderable: None,
            render_priority: render_priority.min(RENDER_PRIORITY_LAST),
            depth_mode: DepthMode::NoDepth,
            depth_occlusion_mode,
        };
        stream.camera_material = Some(stream.default_material());
        Ok(stream)
    }

    fn create_camera_material<B: RenderBackend>(
        backend: &mut B,
        kind: MaterialKind,
    ) -> BackendResult<MaterialHandle> {
        let material = backend.create_material(&kind)?;
        backend.set_material_parameter(
            material,
            MATERIAL_UV_TRANSFORM,
            MaterialParameter::Mat4(Mat4::IDENTITY),
        );
        Ok(material)
    }

    /// Default binding for the current depth and occlusion modes
    fn default_material(&self) -> CameraMaterial {
        let occlusion = self.depth_occlusion_mode == DepthOcclusionMode::Enabled
            && self.depth_mode != DepthMode::NoDepth;
        CameraMaterial {
            material: if occlusion {
                self.occlusion_material
            } else {
                self.standard_material
            },
            occlusion,
            custom: false,
        }
    }

    pub fn is_texture_initialized(&self) -> bool {
        self.camera_texture.is_some()
    }

    /// Create the camera and depth textures. One-shot.
    pub fn initialize_texture<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        intrinsics: &CameraIntrinsics,
    ) -> BackendResult<()> {
        if self.is_texture_initialized() {
            return Ok(());
        }

        let (width, height) = intrinsics.image_dimensions;
        let camera_texture = ExternalTexture::import(backend, self.camera_texture_id, width, height)?;
        let depth_texture = match DepthTexture::create(
            backend,
            DepthTexture::DEFAULT_WIDTH,
            DepthTexture::DEFAULT_HEIGHT,
        ) {
            Ok(texture) => texture,
            Err(err) => {
                camera_texture.dispose(backend);
                return Err(err);
            }
        };
        self.camera_texture = Some(camera_texture);
        self.depth_texture = Some(depth_texture);
        log::info!("Camera stream texture initialized ({width}x{height})");

        // Finish any material binding requested before the texture existed.
        if let Some(binding) = self.camera_material {
            self.bind(backend, binding)?;
        }
        Ok(())
    }

    fn bind<B: RenderBackend>(&mut self, backend: &mut B, binding: CameraMaterial) -> BackendResult<()> {
        self.camera_material = Some(binding);

        let Some(camera_texture) = &self.camera_texture else {
            return Ok(());
        };
        backend.set_material_texture(binding.material, MATERIAL_CAMERA_TEXTURE, camera_texture.handle);
        if binding.occlusion {
            if let Some(depth_texture) = &self.depth_texture {
                backend.set_material_texture(binding.material, MATERIAL_DEPTH_TEXTURE, depth_texture.handle);
            }
        }

        match self.renderable {
            Some(renderable) => backend.set_renderable_material(renderable, binding.material),
            None => {
                let renderable = backend.create_renderable(&RenderableDescriptor {
                    label: Some("camera stream".to_string()),
                    geometry: self.geometry(),
                    material: binding.material,
                    priority: self.render_priority,
                    cast_shadows: false,
                    receive_shadows: false,
                    culling: false,
                })?;
                self.renderable = Some(renderable);
            }
        }
        Ok(())
    }

    fn geometry(&self) -> Geometry {
        Geometry {
            streams: vec![
                VertexStream {
                    semantic: VertexSemantic::Position,
                    format: VertexFormat::Float32x3,
                    buffer: self.vertex_buffer,
                },
                VertexStream {
                    semantic: VertexSemantic::Uv0,
                    format: VertexFormat::Float32x2,
                    buffer: self.uv_buffer,
                },
            ],
            index_buffer: self.index_buffer,
            index_count: INDICES.len() as u32,
        }
    }

    /// Pick the depth mode `config` requests and `session` supports, then rebind the default material.
    pub fn check_if_depth_is_enabled<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        session: &dyn TrackingSession,
        config: &SessionConfig,
    ) -> BackendResult<DepthMode> {
        let mode = select_depth_mode(config.depth_mode, |m| session.is_depth_mode_supported(m));
        if mode != self.depth_mode {
            log::info!("Camera stream depth mode {:?} -> {mode:?}", self.depth_mode);
        }
        self.depth_mode = mode;
        self.rebind_default(backend)?;
        Ok(mode)
    }

    pub fn depth_mode(&self) -> DepthMode {
        self.depth_mode
    }

    pub fn depth_occlusion_mode(&self) -> DepthOcclusionMode {
        self.depth_occlusion_mode
    }

    pub fn set_depth_occlusion_mode<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        mode: DepthOcclusionMode,
    ) -> BackendResult<()> {
        self.depth_occlusion_mode = mode;
        self.rebind_default(backend)
    }

    /// Occlusion is applied this tick
    pub fn is_occlusion_active(&self) -> bool {
        self.depth_occlusion_mode == DepthOcclusionMode::Enabled && self.depth_mode != DepthMode::NoDepth
    }

    fn rebind_default<B: RenderBackend>(&mut self, backend: &mut B) -> BackendResult<()> {
        if self.camera_material.is_some_and(|binding| binding.custom) {
            return Ok(());
        }
        let binding = self.default_material();
        if self.camera_material == Some(binding) {
            return Ok(());
        }
        self.bind(backend, binding)
    }

    /// Re-derive camera UVs for a new display rotation or aspect ratio.
    pub fn recalculate_camera_uvs<B: RenderBackend>(&mut self, backend: &mut B, frame: &dyn TrackingFrame) {
        let transformed = frame.transform_display_uv_coords(&CAMERA_UVS);
        if transformed.len() != CAMERA_UVS.len() {
            log::warn!(
                "Display UV transform returned {} coordinates, expected {}",
                transformed.len(),
                CAMERA_UVS.len()
            );
            return;
        }
        self.transformed_uvs.copy_from_slice(&transformed);
        flip_vertical(&mut self.transformed_uvs);
        backend.write_buffer(self.uv_buffer, 0, bytemuck::cast_slice(&self.transformed_uvs));
    }

    /// Upload a depth image into the occlusion texture. The image is released on return.
    pub fn recalculate_occlusion<B: RenderBackend>(&mut self, backend: &mut B, depth_image: DepthImage) {
        match &mut self.depth_texture {
            Some(depth_texture) => {
                depth_texture.update(backend, depth_image);
            }
            None => log::trace!("No depth texture yet; dropping depth image"),
        }
    }

    /// Application camera material without depth binding
    pub fn set_camera_material<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        material: MaterialHandle,
    ) -> BackendResult<()> {
        self.bind(
            backend,
            CameraMaterial {
                material,
                occlusion: false,
                custom: true,
            },
        )
    }

    /// Application camera material that also samples the depth texture
    pub fn set_occlusion_material<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        material: MaterialHandle,
    ) -> BackendResult<()> {
        self.bind(
            backend,
            CameraMaterial {
                material,
                occlusion: true,
                custom: true,
            },
        )
    }

    pub fn set_camera_material_to_default<B: RenderBackend>(&mut self, backend: &mut B) -> BackendResult<()> {
        let binding = self.default_material();
        self.bind(backend, binding)
    }

    pub fn camera_material(&self) -> Option<CameraMaterial> {
        self.camera_material
    }

    pub fn render_priority(&self) -> u8 {
        self.render_priority
    }

    /// 0 renders first, 7 last
    pub fn set_render_priority<B: RenderBackend>(&mut self, backend: &mut B, priority: u8) {
        self.render_priority = priority.min(RENDER_PRIORITY_LAST);
        if let Some(renderable) = self.renderable {
            backend.set_renderable_priority(renderable, self.render_priority);
        }
    }

    pub fn camera_texture(&self) -> Option<&ExternalTexture> {
        self.camera_texture.as_ref()
    }

    pub fn depth_texture(&self) -> Option<&DepthTexture> {
        self.depth_texture.as_ref()
    }

    pub fn renderable(&self) -> Option<RenderableHandle> {
        self.renderable
    }

    pub fn uv_buffer(&self) -> BufferHandle {
        self.uv_buffer
    }

    pub fn standard_material(&self) -> MaterialHandle {
        self.standard_material
    }

    pub fn occlusion_material(&self) -> MaterialHandle {
        self.occlusion_material
    }

    /// UVs as last uploaded
    pub fn transformed_uvs(&self) -> &[f32] {
        &self.transformed_uvs
    }

    /// Release every GPU resource owned by the stream
    pub fn dispose<B: RenderBackend>(self, backend: &mut B) {
        if let Some(renderable) = self.renderable {
            backend.destroy_renderable(renderable);
        }
        backend.destroy_buffer(self.index_buffer);
        backend.destroy_buffer(self.vertex_buffer);
        backend.destroy_buffer(self.uv_buffer);
        backend.destroy_material(self.standard_material);
        backend.destroy_material(self.occlusion_material);
        if let Some(texture) = self.camera_texture {
            texture.dispose(backend);
        }
        if let Some(texture) = self.depth_texture {
            texture.dispose(backend);
        }
        log::debug!("Camera stream disposed");
    }
}

/// Texture V runs top-down on the GPU
fn flip_vertical(uvs: &mut [f32]) {
    for v in uvs.iter_mut().skip(1).step_by(2) {
        *v = 1.0 - *v;
    }
}
