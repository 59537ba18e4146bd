//! Renderer abstraction layer
//!
//! Provides the trait the AR view drives the renderer through, the shared
//! descriptor types, and a headless recording implementation.

pub mod recording;
pub mod traits;
pub mod types;

pub use recording::*;
pub use traits::*;
pub use types::*;
