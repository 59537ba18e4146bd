//! Detected-plane visualization
//!
//! Keeps one [`PlaneVisualizer`] per plane worth drawing and moves a spotlight
//! over the plane under the screen center. Planes are only drawn while the
//! center of the screen hits one of them.

use std::collections::{BTreeMap, HashMap};

use glam::{Vec2, Vec3};

use super::PlaneVisualizer;
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::tracking::{HitResult, Plane, TrackableId, TrackingFrame};

pub const MATERIAL_TEXTURE: &str = "texture";
pub const MATERIAL_UV_SCALE: &str = "uvScale";
pub const MATERIAL_COLOR: &str = "color";
pub const MATERIAL_SPOTLIGHT_RADIUS: &str = "radius";
pub const MATERIAL_SPOTLIGHT_FOCUS_POINT: &str = "focusPoint";

const BASE_UV_SCALE: f32 = 8.0;
const GRID_TEXTURE_WIDTH: f32 = 293.0;
const GRID_TEXTURE_HEIGHT: f32 = 513.0;
const GRID_TEXTURE_SIZE: u32 = 64;
const SPOTLIGHT_RADIUS: f32 = 0.5;
/// Focus distance used before the first hit
pub const DEFAULT_HIT_DISTANCE: f32 = 4.0;

/// Which planes get drawn while the screen center hits a plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaneRendererMode {
    /// Every plane updated this frame
    #[default]
    RenderAll,
    /// Only the plane under the screen center
    RenderTopMost,
}

/// Tile scale of the grid texture, corrected for its aspect ratio
pub fn grid_uv_scale() -> Vec2 {
    Vec2::new(
        BASE_UV_SCALE,
        BASE_UV_SCALE * GRID_TEXTURE_WIDTH / GRID_TEXTURE_HEIGHT,
    )
}

/// White dots on a transparent background
fn grid_texture_data(size: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let dx = (x % 16) as i32 - 8;
            let dy = (y % 16) as i32 - 8;
            let alpha = if dx * dx + dy * dy <= 4 { 255 } else { 0 };
            data.extend_from_slice(&[255, 255, 255, alpha]);
        }
    }
    data
}

/// Plane visualizers, their shared materials and the focus spotlight
#[derive(Debug)]
pub struct PlaneRenderer {
    visualizers: BTreeMap<TrackableId, PlaneVisualizer>,
    material_overrides: HashMap<TrackableId, MaterialHandle>,
    grid_texture: TextureHandle,
    plane_material: MaterialHandle,
    shadow_material: MaterialHandle,
    enabled: bool,
    visible: bool,
    shadow_receiver: bool,
    mode: PlaneRendererMode,
    last_hit_distance: f32,
    focus_point: Option<Vec3>,
}

impl PlaneRenderer {
    pub fn new<B: RenderBackend>(backend: &mut B) -> BackendResult<Self> {
        let grid_texture = backend.create_texture(&TextureDescriptor {
            label: Some("plane grid".to_string()),
            width: GRID_TEXTURE_SIZE,
            height: GRID_TEXTURE_SIZE,
            format: TextureFormat::Rgba8UnormSrgb,
            ..Default::default()
        })?;
        backend.write_texture(
            grid_texture,
            &grid_texture_data(GRID_TEXTURE_SIZE),
            GRID_TEXTURE_SIZE,
            GRID_TEXTURE_SIZE,
        );

        let plane_material = backend.create_material(&MaterialKind::Plane)?;
        backend.set_material_texture(plane_material, MATERIAL_TEXTURE, grid_texture);
        backend.set_material_parameter(plane_material, MATERIAL_COLOR, MaterialParameter::Float3(Vec3::ONE));
        backend.set_material_parameter(
            plane_material,
            MATERIAL_UV_SCALE,
            MaterialParameter::Float2(grid_uv_scale()),
        );
        let shadow_material = backend.create_material(&MaterialKind::PlaneShadow)?;

        Ok(Self {
            visualizers: BTreeMap::new(),
            material_overrides: HashMap::new(),
            grid_texture,
            plane_material,
            shadow_material,
            enabled: true,
            visible: true,
            shadow_receiver: true,
            mode: PlaneRendererMode::default(),
            last_hit_distance: DEFAULT_HIT_DISTANCE,
            focus_point: None,
        })
    }

    /// Move the spotlight, draw planes and drop visualizers of retired planes.
    ///
    /// `all_planes` is every plane the session knows about; a visualized plane
    /// that is retired there, or no longer listed, is released even if it was
    /// not updated this frame. `width` and `height` are the view size in
    /// pixels; the hit test ray goes through its center.
    pub fn update<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        frame: &dyn TrackingFrame,
        all_planes: &[Plane],
        updated_planes: &[Plane],
        width: u32,
        height: u32,
    ) -> BackendResult<()> {
        let hit = self.center_hit(frame, width, height);
        self.update_focus_point(backend, frame, hit.as_ref());

        for plane in all_planes.iter().chain(updated_planes) {
            if let Some(visualizer) = self.visualizers.get_mut(&plane.id) {
                visualizer.set_plane(plane);
            }
        }

        if let Some(hit) = &hit {
            match self.mode {
                PlaneRendererMode::RenderAll => {
                    for plane in updated_planes.iter().filter(|p| !p.is_retired()) {
                        self.render_plane(backend, plane)?;
                    }
                }
                PlaneRendererMode::RenderTopMost => {
                    if let Some(plane) = hit.trackable.as_plane() {
                        let latest = updated_planes.iter().find(|p| p.id == plane.id).unwrap_or(plane);
                        self.render_plane(backend, latest)?;
                    }
                }
            }
        }

        self.cleanup(backend, all_planes);
        Ok(())
    }

    /// First hit at the screen center that lands inside a plane's polygon
    fn center_hit(&self, frame: &dyn TrackingFrame, width: u32, height: u32) -> Option<HitResult> {
        frame
            .hit_test(width as f32 / 2.0, height as f32 / 2.0)
            .into_iter()
            .find(|hit| {
                hit.trackable
                    .as_plane()
                    .is_some_and(|plane| plane.is_pose_in_polygon(&hit.hit_pose))
            })
    }

    fn update_focus_point<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        frame: &dyn TrackingFrame,
        hit: Option<&HitResult>,
    ) {
        let focus_point = match hit {
            Some(hit) => {
                self.last_hit_distance = hit.distance;
                hit.position()
            }
            None => match frame.camera() {
                Some(camera) => {
                    camera.pose.position() + camera.pose.z_axis() * -self.last_hit_distance
                }
                None => return,
            },
        };
        self.focus_point = Some(focus_point);
        backend.set_material_parameter(
            self.plane_material,
            MATERIAL_SPOTLIGHT_FOCUS_POINT,
            MaterialParameter::Float3(focus_point),
        );
        backend.set_material_parameter(
            self.plane_material,
            MATERIAL_SPOTLIGHT_RADIUS,
            MaterialParameter::Float(SPOTLIGHT_RADIUS),
        );
    }

    fn render_plane<B: RenderBackend>(&mut self, backend: &mut B, plane: &Plane) -> BackendResult<()> {
        if !self.visualizers.contains_key(&plane.id) {
            let mut visualizer = PlaneVisualizer::new(plane.clone());
            let material = self
                .material_overrides
                .get(&plane.id)
                .copied()
                .unwrap_or(self.plane_material);
            visualizer.set_plane_material(backend, material)?;
            visualizer.set_shadow_material(backend, self.shadow_material)?;
            visualizer.set_enabled(backend, self.enabled)?;
            visualizer.set_visible(backend, self.visible)?;
            visualizer.set_shadow_receiver(backend, self.shadow_receiver)?;
            log::debug!("Visualizing plane {:?}", plane.id);
            self.visualizers.insert(plane.id, visualizer);
        }
        match self.visualizers.get_mut(&plane.id) {
            Some(visualizer) => visualizer.update_plane(backend, plane),
            None => Ok(()),
        }
    }

    fn cleanup<B: RenderBackend>(&mut self, backend: &mut B, all_planes: &[Plane]) {
        let retired: Vec<TrackableId> = self
            .visualizers
            .iter()
            .filter(|(id, v)| v.plane().is_retired() || !all_planes.iter().any(|p| p.id == **id))
            .map(|(id, _)| *id)
            .collect();
        for id in retired {
            if let Some(visualizer) = self.visualizers.remove(&id) {
                log::debug!("Releasing visualizer of retired plane {id:?}");
                visualizer.release(backend);
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled<B: RenderBackend>(&mut self, backend: &mut B, enabled: bool) -> BackendResult<()> {
        if self.enabled != enabled {
            self.enabled = enabled;
            for visualizer in self.visualizers.values_mut() {
                visualizer.set_enabled(backend, enabled)?;
            }
        }
        Ok(())
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible<B: RenderBackend>(&mut self, backend: &mut B, visible: bool) -> BackendResult<()> {
        if self.visible != visible {
            self.visible = visible;
            for visualizer in self.visualizers.values_mut() {
                visualizer.set_visible(backend, visible)?;
            }
        }
        Ok(())
    }

    pub fn is_shadow_receiver(&self) -> bool {
        self.shadow_receiver
    }

    pub fn set_shadow_receiver<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        shadow_receiver: bool,
    ) -> BackendResult<()> {
        if self.shadow_receiver != shadow_receiver {
            self.shadow_receiver = shadow_receiver;
            for visualizer in self.visualizers.values_mut() {
                visualizer.set_shadow_receiver(backend, shadow_receiver)?;
            }
        }
        Ok(())
    }

    pub fn mode(&self) -> PlaneRendererMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PlaneRendererMode) {
        self.mode = mode;
    }

    /// Draw `plane_id` with `material` instead of the shared grid material
    pub fn set_material_override<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        plane_id: TrackableId,
        material: MaterialHandle,
    ) -> BackendResult<()> {
        self.material_overrides.insert(plane_id, material);
        match self.visualizers.get_mut(&plane_id) {
            Some(visualizer) => visualizer.set_plane_material(backend, material),
            None => Ok(()),
        }
    }

    pub fn clear_material_override<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        plane_id: TrackableId,
    ) -> BackendResult<()> {
        if self.material_overrides.remove(&plane_id).is_none() {
            return Ok(());
        }
        match self.visualizers.get_mut(&plane_id) {
            Some(visualizer) => visualizer.set_plane_material(backend, self.plane_material),
            None => Ok(()),
        }
    }

    /// Shared grid material
    pub fn material(&self) -> MaterialHandle {
        self.plane_material
    }

    pub fn shadow_material(&self) -> MaterialHandle {
        self.shadow_material
    }

    pub fn grid_texture(&self) -> TextureHandle {
        self.grid_texture
    }

    /// Spotlight center as last set, `None` before the first update with a camera
    pub fn focus_point(&self) -> Option<Vec3> {
        self.focus_point
    }

    pub fn last_hit_distance(&self) -> f32 {
        self.last_hit_distance
    }

    pub fn visualizer(&self, plane_id: TrackableId) -> Option<&PlaneVisualizer> {
        self.visualizers.get(&plane_id)
    }

    pub fn has_visualizer(&self, plane_id: TrackableId) -> bool {
        self.visualizers.contains_key(&plane_id)
    }

    /// Planes that currently have a visualizer, in id order
    pub fn visualized_planes(&self) -> Vec<TrackableId> {
        self.visualizers.keys().copied().collect()
    }

    pub fn visualizer_count(&self) -> usize {
        self.visualizers.len()
    }

    pub fn dispose<B: RenderBackend>(self, backend: &mut B) {
        for (_, visualizer) in self.visualizers {
            visualizer.release(backend);
        }
        backend.destroy_material(self.plane_material);
        backend.destroy_material(self.shadow_material);
        backend.destroy_texture(self.grid_texture);
    }
}
