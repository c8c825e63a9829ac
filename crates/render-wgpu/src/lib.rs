//! wgpu render backend for old computers scenes.
//!
//! Each frame every render target is drawn offscreen with its own camera and
//! lights, then the main graph is drawn to the surface sampling those
//! targets. The orbit camera belongs to the host.
//!
//! # Invariants
//! - Renderer never mutates the scene.
//! - A pass never samples the target it draws into.
//! - GPU caches are keyed by shared geometry and image identity, so shared
//!   template geometry is uploaded once.

mod camera;
mod gpu;
mod shaders;

pub use camera::OrbitCamera;
pub use gpu::{FrameStats, OFFSCREEN_FORMAT, WgpuRenderer};
