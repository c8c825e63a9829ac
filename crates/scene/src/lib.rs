//! Scene composition for the old computers: a node graph built from the
//! shared instance templates, render-to-texture screens and the flickering
//! LED field.
//!
//! # Invariants
//! - The template set is built once per asset identity and never mutated.
//! - Every LED color is a pure function of its fixed position and the
//!   elapsed time.
//! - Composition validates every asset lookup before inserting a node; a
//!   failed composition leaves the scene as it was.
//! - One render target per screen, owned by the scene it was composed into.

pub mod camera;
pub mod computer;
pub mod frame;
pub mod graph;
pub mod instances;
pub mod leds;
pub mod scene;
pub mod screen;
pub mod spinning_box;
pub mod stage;

use oldcomputers_assets::{AssetError, FontError};
use oldcomputers_common::ColorError;

pub use camera::PerspectiveCamera;
pub use computer::{ComputerHandle, SingleComputer};
pub use frame::{FrameCallback, FrameClock, FrameState};
pub use graph::{
    InstanceNode, Light, Material, MeshNode, Node, NodeId, NodeKind, SceneGraph, Shadows,
    TextNode, TextureSource,
};
pub use instances::{InstanceContext, InstanceProvider, Instances, Template, TemplateSet};
pub use leds::{LED_POSITIONS, LedAnimator, LedField, led_color, led_level, led_seed};
pub use scene::{RenderTexture, RenderTextureId, Scene, SubScene};
pub use screen::{InteractiveScreen, Screen, ScreenHandle, TEXT_PLACEMENTS, TextPlacement, TextScreen};
pub use spinning_box::{BoxInteraction, SpinningBox};
pub use stage::{COMPUTERS_POSITION, COMPUTERS_SCALE, Stage, StageHandle};

/// Errors from scene composition.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("no instance template named {0:?}")]
    MissingTemplate(String),
    #[error("node {0:?} is not part of this graph")]
    UnknownNode(NodeId),
    #[error("render target {0:?} is not part of this scene")]
    UnknownRenderTexture(RenderTextureId),
    #[error(transparent)]
    Color(#[from] ColorError),
    #[error(transparent)]
    Font(#[from] FontError),
}

pub fn crate_info() -> &'static str {
    "oldcomputers-scene v0.1.0"
}
