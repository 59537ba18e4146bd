//! Provider images acquired for a single tick
//!
//! Depth images and environment cube-map faces are backed by native buffers that
//! the provider hands out in limited numbers. An [`AcquiredImage`] owns one of them
//! and gives it back exactly once, when it is dropped, so every exit path of the
//! consumer (including early returns on error) releases it.

use std::fmt;

/// Pixel layout of an acquired image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// 16-bit depth in millimeters, little endian
    Depth16,
    /// RGBA, 16-bit half floats per channel
    RgbaHalf,
}

impl ImageFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            ImageFormat::Depth16 => 2,
            ImageFormat::RgbaHalf => 8,
        }
    }
}

/// One plane of pixel data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePlane {
    pub data: Vec<u8>,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Image on loan from the provider until dropped
pub struct AcquiredImage {
    width: u32,
    height: u32,
    format: ImageFormat,
    planes: Vec<ImagePlane>,
    release: Option<ReleaseHook>,
}

pub type DepthImage = AcquiredImage;
pub type EnvironmentImage = AcquiredImage;

impl AcquiredImage {
    /// Single tightly packed plane
    pub fn new(width: u32, height: u32, format: ImageFormat, data: Vec<u8>) -> Self {
        let pixel_stride = format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            planes: vec![ImagePlane {
                data,
                row_stride: width as usize * pixel_stride,
                pixel_stride,
            }],
            release: None,
        }
    }

    /// Run `hook` when the image is given back
    pub fn with_release_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(hook));
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn planes(&self) -> &[ImagePlane] {
        &self.planes
    }

    pub fn plane(&self, index: usize) -> Option<&ImagePlane> {
        self.planes.get(index)
    }

    /// Give the image back now
    pub fn close(self) {}
}

impl Drop for AcquiredImage {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for AcquiredImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquiredImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("planes", &self.planes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_release_runs_once_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let image = AcquiredImage::new(2, 1, ImageFormat::Depth16, vec![0; 4])
            .with_release_hook(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        assert_eq!(image.plane(0).map(|p| p.row_stride), Some(4));
        image.close();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
