//! Rendering adapter: renderer-agnostic view of a composed scene.
//!
//! # Invariants
//! - Renderers never mutate the scene.
//! - Offscreen passes are drawn before the main pass that samples them.
//! - Instances of one template share a batch and are drawn with one call.

mod draw;
mod renderer;
mod summary;

pub use draw::{
    DirectionalLight, DrawBatch, DrawInstance, DrawList, DrawMaterial, DrawTexture, FramePlan,
    LightSet, PointLight, Shading, TargetPass,
};
pub use renderer::{DebugTextRenderer, RenderView, Renderer};
pub use summary::{LedState, SceneSummary, TargetSummary};

pub fn crate_info() -> &'static str {
    "oldcomputers-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
