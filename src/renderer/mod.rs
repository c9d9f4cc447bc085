// Renderer: frame queue, probe tap, and video blit pipeline.

pub mod blitter;
pub mod control;
pub mod device;
pub mod error;
pub mod mapped;
pub mod probe;
pub mod queue;
pub mod software;
pub mod types;
