//! Per-frame control: throttling, snapshot synchronization and lifecycle sequencing

pub mod scheduler;
pub mod sequencer;
pub mod synchronizer;

pub use scheduler::*;
pub use sequencer::*;
pub use synchronizer::*;
