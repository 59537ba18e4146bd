//! Renderable for one detected plane

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::tracking::Plane;

/// Texture coordinate as laid out in the uv vertex buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct PlaneUv {
    pub u: f32,
    pub v: f32,
}

/// Plane polygon as a triangle fan in world space
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaneMeshData {
    pub positions: Vec<Vec3>,
    /// Plane-local X/Z, tiled by the material's uv scale
    pub uvs: Vec<PlaneUv>,
    pub indices: Vec<u16>,
}

impl PlaneMeshData {
    pub fn from_plane(plane: &Plane) -> Self {
        if plane.polygon.len() < 3 || plane.polygon.len() > u16::MAX as usize {
            return Self::default();
        }
        let positions = plane
            .polygon
            .iter()
            .map(|p| plane.center_pose.transform_point(Vec3::new(p.x, 0.0, p.y)))
            .collect();
        let uvs = plane.polygon.iter().map(|p| PlaneUv { u: p.x, v: p.y }).collect();
        let indices = (1..plane.polygon.len() as u16 - 1)
            .flat_map(|i| [0, i, i + 1])
            .collect();
        Self {
            positions,
            uvs,
            indices,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[derive(Debug)]
struct PlaneMesh {
    positions: BufferHandle,
    uvs: BufferHandle,
    indices: BufferHandle,
    vertex_capacity: usize,
    index_capacity: usize,
    index_count: u32,
}

impl PlaneMesh {
    fn create<B: RenderBackend>(backend: &mut B, data: &PlaneMeshData) -> BackendResult<Self> {
        let vertex_capacity = data.positions.len().next_power_of_two();
        let index_capacity = data.indices.len().next_power_of_two();
        let positions = backend.create_buffer_init(
            &BufferDescriptor::vertex(
                "plane positions",
                vertex_capacity as u64 * VertexFormat::Float32x3.size(),
            ),
            bytemuck::cast_slice(&data.positions),
        )?;
        let uvs = backend.create_buffer_init(
            &BufferDescriptor::vertex("plane uvs", vertex_capacity as u64 * VertexFormat::Float32x2.size()),
            bytemuck::cast_slice(&data.uvs),
        )?;
        let indices = backend.create_buffer_init(
            &BufferDescriptor::index("plane indices", (index_capacity * std::mem::size_of::<u16>()) as u64),
            bytemuck::cast_slice(&data.indices),
        )?;
        Ok(Self {
            positions,
            uvs,
            indices,
            vertex_capacity,
            index_capacity,
            index_count: data.indices.len() as u32,
        })
    }

    fn fits(&self, data: &PlaneMeshData) -> bool {
        data.positions.len() <= self.vertex_capacity && data.indices.len() <= self.index_capacity
    }

    fn write<B: RenderBackend>(&mut self, backend: &mut B, data: &PlaneMeshData) {
        backend.write_buffer(self.positions, 0, bytemuck::cast_slice(&data.positions));
        backend.write_buffer(self.uvs, 0, bytemuck::cast_slice(&data.uvs));
        backend.write_buffer(self.indices, 0, bytemuck::cast_slice(&data.indices));
        self.index_count = data.indices.len() as u32;
    }

    fn geometry(&self) -> Geometry {
        Geometry {
            streams: vec![
                VertexStream {
                    semantic: VertexSemantic::Position,
                    format: VertexFormat::Float32x3,
                    buffer: self.positions,
                },
                VertexStream {
                    semantic: VertexSemantic::Uv0,
                    format: VertexFormat::Float32x2,
                    buffer: self.uvs,
                },
            ],
            index_buffer: self.indices,
            index_count: self.index_count,
        }
    }

    fn destroy<B: RenderBackend>(self, backend: &mut B) {
        backend.destroy_buffer(self.positions);
        backend.destroy_buffer(self.uvs);
        backend.destroy_buffer(self.indices);
    }
}

/// Grid and shadow-catcher renderables of a single plane
#[derive(Debug)]
pub struct PlaneVisualizer {
    plane: Plane,
    mesh: Option<PlaneMesh>,
    renderable: Option<RenderableHandle>,
    shadow_renderable: Option<RenderableHandle>,
    plane_material: Option<MaterialHandle>,
    shadow_material: Option<MaterialHandle>,
    enabled: bool,
    visible: bool,
    shadow_receiver: bool,
}

impl PlaneVisualizer {
    /// No GPU work happens until the first [`update_plane`](Self::update_plane).
    pub fn new(plane: Plane) -> Self {
        Self {
            plane,
            mesh: None,
            renderable: None,
            shadow_renderable: None,
            plane_material: None,
            shadow_material: None,
            enabled: true,
            visible: true,
            shadow_receiver: true,
        }
    }

    pub fn plane(&self) -> &Plane {
        &self.plane
    }

    /// Refresh the cached plane state without touching the GPU
    pub fn set_plane(&mut self, plane: &Plane) {
        self.plane.clone_from(plane);
    }

    /// Re-upload geometry from the latest plane state
    pub fn update_plane<B: RenderBackend>(&mut self, backend: &mut B, plane: &Plane) -> BackendResult<()> {
        self.set_plane(plane);
        let data = PlaneMeshData::from_plane(&self.plane);
        if data.is_empty() {
            log::trace!("Plane {:?} has a degenerate polygon", self.plane.id);
            return Ok(());
        }

        match &mut self.mesh {
            Some(mesh) if mesh.fits(&data) => mesh.write(backend, &data),
            _ => {
                if let Some(old) = self.mesh.take() {
                    old.destroy(backend);
                }
                self.mesh = Some(PlaneMesh::create(backend, &data)?);
            }
        }

        if let Some(geometry) = self.mesh.as_ref().map(PlaneMesh::geometry) {
            for renderable in [self.renderable, self.shadow_renderable].into_iter().flatten() {
                backend.set_renderable_geometry(renderable, &geometry);
            }
        }
        self.sync_renderables(backend)
    }

    fn sync_renderables<B: RenderBackend>(&mut self, backend: &mut B) -> BackendResult<()> {
        let Some(geometry) = self.mesh.as_ref().map(PlaneMesh::geometry) else {
            return Ok(());
        };

        if let (None, Some(material)) = (self.renderable, self.plane_material) {
            self.renderable = Some(backend.create_renderable(&RenderableDescriptor {
                label: Some(format!("plane {}", self.plane.id.0)),
                geometry: geometry.clone(),
                material,
                priority: 4,
                cast_shadows: false,
                receive_shadows: false,
                culling: true,
            })?);
        }
        if let (None, Some(material)) = (self.shadow_renderable, self.shadow_material) {
            self.shadow_renderable = Some(backend.create_renderable(&RenderableDescriptor {
                label: Some(format!("plane shadow {}", self.plane.id.0)),
                geometry,
                material,
                priority: 4,
                cast_shadows: false,
                receive_shadows: true,
                culling: true,
            })?);
        }

        if let Some(renderable) = self.renderable {
            backend.set_renderable_visible(renderable, self.enabled && self.visible);
        }
        if let Some(renderable) = self.shadow_renderable {
            backend.set_renderable_visible(renderable, self.enabled && self.shadow_receiver);
        }
        Ok(())
    }

    pub fn set_plane_material<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        material: MaterialHandle,
    ) -> BackendResult<()> {
        self.plane_material = Some(material);
        match self.renderable {
            Some(renderable) => {
                backend.set_renderable_material(renderable, material);
                Ok(())
            }
            None => self.sync_renderables(backend),
        }
    }

    pub fn plane_material(&self) -> Option<MaterialHandle> {
        self.plane_material
    }

    pub fn set_shadow_material<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        material: MaterialHandle,
    ) -> BackendResult<()> {
        self.shadow_material = Some(material);
        match self.shadow_renderable {
            Some(renderable) => {
                backend.set_renderable_material(renderable, material);
                Ok(())
            }
            None => self.sync_renderables(backend),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled<B: RenderBackend>(&mut self, backend: &mut B, enabled: bool) -> BackendResult<()> {
        self.enabled = enabled;
        self.sync_renderables(backend)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible<B: RenderBackend>(&mut self, backend: &mut B, visible: bool) -> BackendResult<()> {
        self.visible = visible;
        self.sync_renderables(backend)
    }

    pub fn is_shadow_receiver(&self) -> bool {
        self.shadow_receiver
    }

    pub fn set_shadow_receiver<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        shadow_receiver: bool,
    ) -> BackendResult<()> {
        self.shadow_receiver = shadow_receiver;
        self.sync_renderables(backend)
    }

    pub fn renderable(&self) -> Option<RenderableHandle> {
        self.renderable
    }

    pub fn shadow_renderable(&self) -> Option<RenderableHandle> {
        self.shadow_renderable
    }

    /// Destroy renderables and buffers
    pub fn release<B: RenderBackend>(self, backend: &mut B) {
        for renderable in [self.renderable, self.shadow_renderable].into_iter().flatten() {
            backend.destroy_renderable(renderable);
        }
        if let Some(mesh) = self.mesh {
            mesh.destroy(backend);
        }
    }
}
