//! Camera frame renderer.
//!
//! Buffers produced by a capture source travel through a bounded lock-free
//! queue to a presentation thread, which converts them onto a GPU target
//! with a cached video blit pipeline. An optional probe tap lets observers
//! read frames in flight without consuming them.

pub mod diagnostics;
pub mod renderer;
pub mod settings;

pub use renderer::control::RendererControl;
pub use renderer::error::{RendererError, Result};
pub use settings::types::RendererSettings;
