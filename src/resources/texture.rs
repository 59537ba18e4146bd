//! GPU textures fed by the tracking provider

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::tracking::{DepthImage, ImageFormat};

/// Camera image texture, written by the camera driver and only sampled by us
#[derive(Debug)]
pub struct ExternalTexture {
    pub handle: TextureHandle,
    pub texture_id: u32,
    pub width: u32,
    pub height: u32,
}

impl ExternalTexture {
    /// Import the driver's texture name with the camera image size
    pub fn import<B: RenderBackend>(
        backend: &mut B,
        texture_id: u32,
        width: u32,
        height: u32,
    ) -> BackendResult<Self> {
        let handle = backend.import_external_texture(texture_id, width, height)?;
        log::debug!("Imported camera texture {texture_id} ({width}x{height})");
        Ok(Self {
            handle,
            texture_id,
            width,
            height,
        })
    }

    pub fn dispose<B: RenderBackend>(self, backend: &mut B) {
        backend.destroy_texture(self.handle);
    }
}

/// Real-world depth, 16-bit millimeters packed into two 8-bit channels
#[derive(Debug)]
pub struct DepthTexture {
    pub handle: TextureHandle,
    pub width: u32,
    pub height: u32,
    updates: usize,
}

impl DepthTexture {
    pub const DEFAULT_WIDTH: u32 = 160;
    pub const DEFAULT_HEIGHT: u32 = 90;

    pub fn create<B: RenderBackend>(backend: &mut B, width: u32, height: u32) -> BackendResult<Self> {
        let handle = backend.create_texture(&TextureDescriptor {
            label: Some("depth".to_string()),
            width,
            height,
            mip_levels: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rg8Unorm,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        })?;
        Ok(Self {
            handle,
            width,
            height,
            updates: 0,
        })
    }

    /// Upload the first plane of `image`. The image is released on return.
    pub fn update<B: RenderBackend>(&mut self, backend: &mut B, image: DepthImage) -> bool {
        if image.format() != ImageFormat::Depth16 {
            log::warn!("Ignoring depth image with format {:?}", image.format());
            return false;
        }
        let Some(plane) = image.plane(0) else {
            log::warn!("Ignoring depth image without planes");
            return false;
        };

        let expected = (self.width * self.height * TextureFormat::Rg8Unorm.bytes_per_pixel()) as usize;
        if plane.data.len() < expected {
            log::warn!(
                "Depth image {}x{} too small for {}x{} texture",
                image.width(),
                image.height(),
                self.width,
                self.height
            );
            return false;
        }

        backend.write_texture(self.handle, &plane.data[..expected], self.width, self.height);
        self.updates += 1;
        true
    }

    /// Number of successful uploads
    pub fn updates(&self) -> usize {
        self.updates
    }

    pub fn dispose<B: RenderBackend>(self, backend: &mut B) {
        backend.destroy_texture(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use crate::tracking::AcquiredImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_depth_update_releases_image() {
        let mut backend = RecordingBackend::new();
        let mut depth = DepthTexture::create(&mut backend, 2, 2).unwrap();
        let released = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&released);
        let image = AcquiredImage::new(2, 2, ImageFormat::Depth16, vec![7; 8])
            .with_release_hook(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        assert!(depth.update(&mut backend, image));
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(backend.texture(depth.handle).unwrap().data, vec![7; 8]);

        let counter = Arc::clone(&released);
        let short = AcquiredImage::new(1, 1, ImageFormat::Depth16, vec![0; 2])
            .with_release_hook(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        assert!(!depth.update(&mut backend, short));
        assert_eq!(released.load(Ordering::SeqCst), 2);
        assert_eq!(depth.updates(), 1);
    }

    #[test]
    fn test_external_texture_import() {
        let mut backend = RecordingBackend::new();
        let texture = ExternalTexture::import(&mut backend, 11, 640, 480).unwrap();
        let recorded = backend.texture(texture.handle).unwrap();
        assert_eq!(recorded.external_id, Some(11));
        assert_eq!(recorded.descriptor.width, 640);
        texture.dispose(&mut backend);
        assert_eq!(backend.live_textures(), 0);
    }
}
