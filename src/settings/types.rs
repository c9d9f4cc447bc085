use serde::{Deserialize, Serialize};

use crate::renderer::types::Size;

/// Renderer settings: declared frame size and initial surface state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RendererSettings {
    /// Size reported for probed frames.
    pub frame_size: Size,
    /// Whether a presentation surface is attached when the renderer starts.
    pub surface_attached: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            frame_size: Size::new(640, 480),
            surface_attached: false,
        }
    }
}
