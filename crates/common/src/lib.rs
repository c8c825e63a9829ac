//! Shared types for the oldcomputers workspace.
//!
//! # Invariants
//! - `Color` always holds linear RGB. sRGB inputs (hex strings, CSS names)
//!   are converted on construction.

mod color;
mod types;

pub use color::{Color, ColorError};
pub use types::Transform;

pub fn crate_info() -> &'static str {
    "oldcomputers-common v0.1.0"
}
