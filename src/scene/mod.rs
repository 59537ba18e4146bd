//! Detected-surface visualization

mod plane_renderer;
mod plane_visualizer;

pub use plane_renderer::*;
pub use plane_visualizer::*;
