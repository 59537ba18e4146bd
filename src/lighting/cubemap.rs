//! Reflection cube map from the provider's HDR environment faces

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::tracking::{EnvironmentImage, ImageFormat};

const FACE_COUNT: usize = 6;
const RGBA_HALF_BYTES: usize = 8;
const RGB_HALF_BYTES: usize = 6;

/// Six square faces packed back to back as RGB half floats
#[derive(Debug, Clone, PartialEq)]
pub struct PackedCubeMap {
    pub size: u32,
    pub data: Vec<u8>,
    pub face_offsets: [usize; FACE_COUNT],
}

/// Drop the alpha channel of every face and pack them into one buffer.
///
/// The faces are released once packed, whether or not packing succeeded.
pub fn pack_cube_map(faces: Vec<EnvironmentImage>) -> Option<PackedCubeMap> {
    if faces.len() != FACE_COUNT {
        log::warn!("Expected {FACE_COUNT} cube map faces, got {}", faces.len());
        return None;
    }
    let size = faces[0].width();
    let face_pixels = (size * size) as usize;

    let mut data = Vec::with_capacity(face_pixels * FACE_COUNT * RGB_HALF_BYTES);
    let mut face_offsets = [0; FACE_COUNT];
    for (index, face) in faces.iter().enumerate() {
        if face.format() != ImageFormat::RgbaHalf || face.width() != size || face.height() != size {
            log::warn!(
                "Cube map face {index} is {:?} {}x{}, expected RgbaHalf {size}x{size}",
                face.format(),
                face.width(),
                face.height()
            );
            return None;
        }
        let Some(plane) = face.plane(0) else {
            return None;
        };
        if plane.data.len() < face_pixels * RGBA_HALF_BYTES {
            log::warn!("Cube map face {index} is truncated");
            return None;
        }

        face_offsets[index] = data.len();
        for pixel in plane.data.chunks_exact(RGBA_HALF_BYTES).take(face_pixels) {
            data.extend_from_slice(&pixel[..RGB_HALF_BYTES]);
        }
    }

    Some(PackedCubeMap {
        size,
        data,
        face_offsets,
    })
}

/// Cube texture reused across estimates of the same face size
#[derive(Debug)]
pub struct ReflectionsTexture {
    pub handle: TextureHandle,
    pub size: u32,
}

impl ReflectionsTexture {
    pub fn create<B: RenderBackend>(backend: &mut B, size: u32) -> BackendResult<Self> {
        let handle = backend.create_texture(&TextureDescriptor {
            label: Some("environment reflections".to_string()),
            width: size,
            height: size,
            mip_levels: mip_level_count(size),
            dimension: TextureDimension::Cube,
            format: TextureFormat::R11G11B10Float,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;
        log::debug!("Created {size}x{size} reflections cube map");
        Ok(Self { handle, size })
    }

    /// Write `packed` into `existing` when the face size matches, otherwise into a new texture.
    pub fn upload<B: RenderBackend>(
        existing: Option<Self>,
        backend: &mut B,
        packed: &PackedCubeMap,
        prefilter: bool,
    ) -> BackendResult<Self> {
        let texture = match existing {
            Some(texture) if texture.size == packed.size => texture,
            Some(texture) => {
                texture.dispose(backend);
                Self::create(backend, packed.size)?
            }
            None => Self::create(backend, packed.size)?,
        };
        backend.write_cube_texture(
            texture.handle,
            &packed.data,
            &packed.face_offsets,
            packed.size,
            prefilter,
        );
        Ok(texture)
    }

    pub fn dispose<B: RenderBackend>(self, backend: &mut B) {
        backend.destroy_texture(self.handle);
    }
}

fn mip_level_count(size: u32) -> u32 {
    u32::BITS - size.max(1).leading_zeros()
}
