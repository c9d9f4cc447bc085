// Renderer settings: frame size and surface attachment, persisted as JSON.

pub mod store;
pub mod types;
