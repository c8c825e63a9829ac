//! Scene assets: a pre-baked binary glTF scene and the font used by text
//! screens.
//!
//! Assets are identified by content hash. A scene asset is immutable after
//! load and shared behind `Arc` for the lifetime of the process; consumers
//! look parts up by node name, never by file offsets.
//!
//! # Layout
//! - [`SceneAsset`]: named nodes with their geometry and material.
//! - [`AssetCache`]: loads each path at most once.
//! - [`FontResource`]: TrueType/OpenType bytes plus text meshing.
//! - [`fixture`]: an in-memory stand-in for the real scene file.

mod cache;
pub mod fixture;
mod font;
mod mesh;
mod scene;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

pub use cache::AssetCache;
pub use font::{FontError, FontResource, TextMesh, TextStyle};
pub use mesh::{MaterialData, MeshData, TextureImage};
pub use scene::{AssetNode, SceneAsset};

/// Content-addressed asset ID computed from the asset bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub u64);

impl AssetId {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        Self(u64::from_le_bytes(head))
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("glTF parse error: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("asset requires unsupported glTF extension {0:?}")]
    UnsupportedExtension(String),
    #[error("image encoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("asset has no node named {0:?}")]
    MissingNode(String),
    #[error("node {0:?} carries no mesh")]
    NodeWithoutMesh(String),
    #[error("asset has no material named {0:?}")]
    MissingMaterial(String),
    #[error(transparent)]
    Font(#[from] FontError),
}

pub fn crate_info() -> &'static str {
    "oldcomputers-assets v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_id_is_content_addressed() {
        assert_eq!(AssetId::of_bytes(b"glTF"), AssetId::of_bytes(b"glTF"));
        assert_ne!(AssetId::of_bytes(b"glTF"), AssetId::of_bytes(b"glTf"));
    }

    #[test]
    fn asset_id_displays_as_hex() {
        assert_eq!(AssetId(0xab).to_string(), "00000000000000ab");
    }
}
