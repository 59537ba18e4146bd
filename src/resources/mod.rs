//! GPU resources owned by the AR view
//!
//! Every wrapper here is created against a [`RenderBackend`](crate::backend::RenderBackend)
//! and released with an explicit `dispose` by its owner.

mod camera_stream;
mod texture;

pub use camera_stream::*;
pub use texture::*;
