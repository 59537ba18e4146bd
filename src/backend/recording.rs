//! Headless recording backend.
//!
//! This backend doesn't touch a GPU. It keeps the state a real renderer would
//! hold (buffer/texture contents, material parameters, renderables, camera and
//! lights) and appends every call to a log, so the AR view can be driven and
//! inspected without a device.

use std::collections::HashMap;

use glam::Mat4;

use super::traits::*;
use super::types::*;
use crate::tracking::Pose;

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateBuffer { buffer: BufferHandle, size: usize },
    WriteBuffer { buffer: BufferHandle, len: usize },
    DestroyBuffer(BufferHandle),
    CreateTexture { texture: TextureHandle, width: u32, height: u32, format: TextureFormat },
    ImportExternalTexture { texture: TextureHandle, texture_id: u32 },
    WriteTexture { texture: TextureHandle, len: usize },
    WriteCubeTexture { texture: TextureHandle, len: usize, prefilter: bool },
    DestroyTexture(TextureHandle),
    CreateMaterial { material: MaterialHandle, kind: MaterialKind },
    SetMaterialParameter { material: MaterialHandle, name: String },
    SetMaterialTexture { material: MaterialHandle, name: String, texture: TextureHandle },
    DestroyMaterial(MaterialHandle),
    CreateRenderable { renderable: RenderableHandle, material: MaterialHandle },
    SetRenderableMaterial { renderable: RenderableHandle, material: MaterialHandle },
    SetRenderableGeometry(RenderableHandle),
    SetRenderablePriority { renderable: RenderableHandle, priority: u8 },
    SetRenderableVisible { renderable: RenderableHandle, visible: bool },
    SetRenderableShadows { renderable: RenderableHandle, cast: bool, receive: bool },
    DestroyRenderable(RenderableHandle),
    SetCameraPose,
    SetFrontFaceWindingInverted(bool),
    SetMainLight,
    SetIndirectLight,
}

impl BackendCall {
    /// Calls that move data to the GPU
    pub fn is_upload(&self) -> bool {
        matches!(
            self,
            BackendCall::WriteBuffer { .. }
                | BackendCall::WriteTexture { .. }
                | BackendCall::WriteCubeTexture { .. }
        )
    }
}

/// State of a renderable as last set
#[derive(Debug, Clone)]
pub struct RecordedRenderable {
    pub material: MaterialHandle,
    pub geometry: Geometry,
    pub priority: u8,
    pub visible: bool,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
}

/// Texture as last written
#[derive(Debug, Clone)]
pub struct RecordedTexture {
    pub descriptor: TextureDescriptor,
    pub external_id: Option<u32>,
    pub data: Vec<u8>,
    pub writes: usize,
}

/// Backend that records instead of rendering
#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u64,
    calls: Vec<BackendCall>,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    textures: HashMap<TextureHandle, RecordedTexture>,
    materials: HashMap<MaterialHandle, MaterialKind>,
    material_parameters: HashMap<(MaterialHandle, String), MaterialParameter>,
    material_textures: HashMap<(MaterialHandle, String), TextureHandle>,
    renderables: HashMap<RenderableHandle, RecordedRenderable>,
    camera: Option<(Pose, Mat4)>,
    front_face_winding_inverted: bool,
    main_light: Option<MainLightParams>,
    indirect_light: Option<IndirectLightParams>,
    /// When set, texture creation fails with this message
    pub fail_texture_creation: Option<String>,
}

impl RecordingBackend {
    /// Create a new recording backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Recording Backend"
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&mut self, call: BackendCall) {
        log::trace!("RecordingBackend: {call:?}");
        self.calls.push(call);
    }

    /// Every call since creation or the last [`clear_calls`](Self::clear_calls)
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of buffer/texture uploads in the call log
    pub fn upload_count(&self) -> usize {
        self.calls.iter().filter(|c| c.is_upload()).count()
    }

    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    pub fn texture(&self, texture: TextureHandle) -> Option<&RecordedTexture> {
        self.textures.get(&texture)
    }

    pub fn material_kind(&self, material: MaterialHandle) -> Option<&MaterialKind> {
        self.materials.get(&material)
    }

    pub fn material_parameter(&self, material: MaterialHandle, name: &str) -> Option<MaterialParameter> {
        self.material_parameters
            .get(&(material, name.to_string()))
            .copied()
    }

    pub fn material_texture(&self, material: MaterialHandle, name: &str) -> Option<TextureHandle> {
        self.material_textures.get(&(material, name.to_string())).copied()
    }

    pub fn renderable(&self, renderable: RenderableHandle) -> Option<&RecordedRenderable> {
        self.renderables.get(&renderable)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_renderables(&self) -> usize {
        self.renderables.len()
    }

    pub fn camera(&self) -> Option<&(Pose, Mat4)> {
        self.camera.as_ref()
    }

    pub fn is_front_face_winding_inverted(&self) -> bool {
        self.front_face_winding_inverted
    }

    pub fn main_light(&self) -> Option<&MainLightParams> {
        self.main_light.as_ref()
    }

    pub fn indirect_light(&self) -> Option<&IndirectLightParams> {
        self.indirect_light.as_ref()
    }
}

impl RenderBackend for RecordingBackend {
    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        if (data.len() as u64) > desc.size {
            return Err(BackendError::BufferCreationFailed(format!(
                "{:?}: {} bytes do not fit in {}",
                desc.label,
                data.len(),
                desc.size
            )));
        }
        let buffer = BufferHandle(self.next());
        let mut contents = vec![0u8; desc.size as usize];
        contents[..data.len()].copy_from_slice(data);
        self.buffers.insert(buffer, contents);
        self.record(BackendCall::CreateBuffer {
            buffer,
            size: desc.size as usize,
        });
        Ok(buffer)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(contents) = self.buffers.get_mut(&buffer) {
            let start = offset as usize;
            let end = start + data.len();
            if contents.len() < end {
                contents.resize(end, 0);
            }
            contents[start..end].copy_from_slice(data);
        } else {
            log::warn!("RecordingBackend: write to unknown buffer {buffer:?}");
        }
        self.record(BackendCall::WriteBuffer {
            buffer,
            len: data.len(),
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        self.record(BackendCall::DestroyBuffer(buffer));
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if let Some(reason) = &self.fail_texture_creation {
            return Err(BackendError::TextureCreationFailed(reason.clone()));
        }
        let texture = TextureHandle(self.next());
        self.textures.insert(
            texture,
            RecordedTexture {
                descriptor: desc.clone(),
                external_id: None,
                data: Vec::new(),
                writes: 0,
            },
        );
        self.record(BackendCall::CreateTexture {
            texture,
            width: desc.width,
            height: desc.height,
            format: desc.format,
        });
        Ok(texture)
    }

    fn import_external_texture(
        &mut self,
        texture_id: u32,
        width: u32,
        height: u32,
    ) -> BackendResult<TextureHandle> {
        if let Some(reason) = &self.fail_texture_creation {
            return Err(BackendError::TextureCreationFailed(reason.clone()));
        }
        let texture = TextureHandle(self.next());
        self.textures.insert(
            texture,
            RecordedTexture {
                descriptor: TextureDescriptor {
                    label: Some("camera".to_string()),
                    width,
                    height,
                    format: TextureFormat::External,
                    ..Default::default()
                },
                external_id: Some(texture_id),
                data: Vec::new(),
                writes: 0,
            },
        );
        self.record(BackendCall::ImportExternalTexture {
            texture,
            texture_id,
        });
        Ok(texture)
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], _width: u32, _height: u32) {
        if let Some(recorded) = self.textures.get_mut(&texture) {
            recorded.data = data.to_vec();
            recorded.writes += 1;
        }
        self.record(BackendCall::WriteTexture {
            texture,
            len: data.len(),
        });
    }

    fn write_cube_texture(
        &mut self,
        texture: TextureHandle,
        data: &[u8],
        _face_offsets: &[usize; 6],
        _size: u32,
        prefilter: bool,
    ) {
        if let Some(recorded) = self.textures.get_mut(&texture) {
            recorded.data = data.to_vec();
            recorded.writes += 1;
        }
        self.record(BackendCall::WriteCubeTexture {
            texture,
            len: data.len(),
            prefilter,
        });
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        self.record(BackendCall::DestroyTexture(texture));
    }

    fn create_material(&mut self, kind: &MaterialKind) -> BackendResult<MaterialHandle> {
        let material = MaterialHandle(self.next());
        self.materials.insert(material, kind.clone());
        self.record(BackendCall::CreateMaterial {
            material,
            kind: kind.clone(),
        });
        Ok(material)
    }

    fn set_material_parameter(
        &mut self,
        material: MaterialHandle,
        name: &str,
        value: MaterialParameter,
    ) {
        self.material_parameters
            .insert((material, name.to_string()), value);
        self.record(BackendCall::SetMaterialParameter {
            material,
            name: name.to_string(),
        });
    }

    fn set_material_texture(&mut self, material: MaterialHandle, name: &str, texture: TextureHandle) {
        self.material_textures
            .insert((material, name.to_string()), texture);
        self.record(BackendCall::SetMaterialTexture {
            material,
            name: name.to_string(),
            texture,
        });
    }

    fn destroy_material(&mut self, material: MaterialHandle) {
        self.materials.remove(&material);
        self.material_parameters.retain(|(m, _), _| *m != material);
        self.material_textures.retain(|(m, _), _| *m != material);
        self.record(BackendCall::DestroyMaterial(material));
    }

    fn create_renderable(&mut self, desc: &RenderableDescriptor) -> BackendResult<RenderableHandle> {
        if !self.materials.contains_key(&desc.material) {
            return Err(BackendError::RenderableCreationFailed(format!(
                "{:?}: unknown material {:?}",
                desc.label, desc.material
            )));
        }
        let renderable = RenderableHandle(self.next());
        self.renderables.insert(
            renderable,
            RecordedRenderable {
                material: desc.material,
                geometry: desc.geometry.clone(),
                priority: desc.priority,
                visible: true,
                cast_shadows: desc.cast_shadows,
                receive_shadows: desc.receive_shadows,
            },
        );
        self.record(BackendCall::CreateRenderable {
            renderable,
            material: desc.material,
        });
        Ok(renderable)
    }

    fn set_renderable_material(&mut self, renderable: RenderableHandle, material: MaterialHandle) {
        if let Some(r) = self.renderables.get_mut(&renderable) {
            r.material = material;
        }
        self.record(BackendCall::SetRenderableMaterial {
            renderable,
            material,
        });
    }

    fn set_renderable_geometry(&mut self, renderable: RenderableHandle, geometry: &Geometry) {
        if let Some(r) = self.renderables.get_mut(&renderable) {
            r.geometry = geometry.clone();
        }
        self.record(BackendCall::SetRenderableGeometry(renderable));
    }

    fn set_renderable_priority(&mut self, renderable: RenderableHandle, priority: u8) {
        if let Some(r) = self.renderables.get_mut(&renderable) {
            r.priority = priority;
        }
        self.record(BackendCall::SetRenderablePriority {
            renderable,
            priority,
        });
    }

    fn set_renderable_visible(&mut self, renderable: RenderableHandle, visible: bool) {
        if let Some(r) = self.renderables.get_mut(&renderable) {
            r.visible = visible;
        }
        self.record(BackendCall::SetRenderableVisible {
            renderable,
            visible,
        });
    }

    fn set_renderable_shadows(&mut self, renderable: RenderableHandle, cast: bool, receive: bool) {
        if let Some(r) = self.renderables.get_mut(&renderable) {
            r.cast_shadows = cast;
            r.receive_shadows = receive;
        }
        self.record(BackendCall::SetRenderableShadows {
            renderable,
            cast,
            receive,
        });
    }

    fn destroy_renderable(&mut self, renderable: RenderableHandle) {
        self.renderables.remove(&renderable);
        self.record(BackendCall::DestroyRenderable(renderable));
    }

    fn set_camera_pose(&mut self, pose: &Pose, projection: Mat4) {
        self.camera = Some((*pose, projection));
        self.record(BackendCall::SetCameraPose);
    }

    fn set_front_face_winding_inverted(&mut self, inverted: bool) {
        self.front_face_winding_inverted = inverted;
        self.record(BackendCall::SetFrontFaceWindingInverted(inverted));
    }

    fn set_main_light(&mut self, light: &MainLightParams) {
        self.main_light = Some(*light);
        self.record(BackendCall::SetMainLight);
    }

    fn set_indirect_light(&mut self, light: &IndirectLightParams) {
        self.indirect_light = Some(light.clone());
        self.record(BackendCall::SetIndirectLight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_create_and_write() {
        let mut backend = RecordingBackend::new();
        let buffer = backend
            .create_buffer_init(&BufferDescriptor::vertex("uvs", 8), &[1, 2, 3, 4])
            .unwrap();
        assert_eq!(backend.buffer_data(buffer), Some(&[1, 2, 3, 4, 0, 0, 0, 0][..]));

        backend.write_buffer(buffer, 4, &[9, 9]);
        assert_eq!(backend.buffer_data(buffer), Some(&[1, 2, 3, 4, 9, 9, 0, 0][..]));
        assert_eq!(backend.upload_count(), 1);
    }

    #[test]
    fn test_buffer_too_small() {
        let mut backend = RecordingBackend::new();
        let result = backend.create_buffer_init(&BufferDescriptor::index("idx", 2), &[0; 6]);
        assert!(matches!(result, Err(BackendError::BufferCreationFailed(_))));
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn test_renderable_requires_material() {
        let mut backend = RecordingBackend::new();
        let buffer = backend
            .create_buffer_init(&BufferDescriptor::index("idx", 6), &[0; 6])
            .unwrap();
        let desc = RenderableDescriptor {
            label: None,
            geometry: Geometry {
                streams: Vec::new(),
                index_buffer: buffer,
                index_count: 3,
            },
            material: MaterialHandle(999),
            priority: 4,
            cast_shadows: false,
            receive_shadows: false,
            culling: false,
        };
        assert!(backend.create_renderable(&desc).is_err());
    }

    #[test]
    fn test_destroy_material_drops_parameters() {
        let mut backend = RecordingBackend::new();
        let material = backend.create_material(&MaterialKind::Plane).unwrap();
        backend.set_material_parameter(material, "radius", MaterialParameter::Float(0.5));
        assert_eq!(
            backend.material_parameter(material, "radius"),
            Some(MaterialParameter::Float(0.5))
        );
        backend.destroy_material(material);
        assert_eq!(backend.material_parameter(material, "radius"), None);
    }
}
