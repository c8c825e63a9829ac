use crate::font::FontResource;
use crate::scene::SceneAsset;
use crate::AssetError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Loads each asset path at most once per cache.
///
/// Repeated requests for the same path return the same `Arc`, so anything
/// memoized on asset identity (instance templates, GPU buffers) stays valid.
/// Failed loads are not cached; the next request tries again.
#[derive(Debug, Default)]
pub struct AssetCache {
    scenes: BTreeMap<PathBuf, Arc<SceneAsset>>,
    fonts: BTreeMap<PathBuf, Arc<FontResource>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scene(&mut self, path: impl AsRef<Path>) -> Result<Arc<SceneAsset>, AssetError> {
        let path = path.as_ref();
        if let Some(asset) = self.scenes.get(path) {
            tracing::debug!("scene cache hit: {}", path.display());
            return Ok(asset.clone());
        }
        let asset = Arc::new(SceneAsset::load(path)?);
        self.scenes.insert(path.to_path_buf(), asset.clone());
        Ok(asset)
    }

    pub fn font(&mut self, path: impl AsRef<Path>) -> Result<Arc<FontResource>, AssetError> {
        let path = path.as_ref();
        if let Some(font) = self.fonts.get(path) {
            tracing::debug!("font cache hit: {}", path.display());
            return Ok(font.clone());
        }
        let font = Arc::new(FontResource::load(path)?);
        self.fonts.insert(path.to_path_buf(), font.clone());
        Ok(font)
    }

    /// Register an already-built scene under a path, e.g. the synthetic
    /// fixture standing in for the real file.
    pub fn insert_scene(&mut self, path: impl Into<PathBuf>, asset: SceneAsset) -> Arc<SceneAsset> {
        let asset = Arc::new(asset);
        self.scenes.insert(path.into(), asset.clone());
        asset
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    pub fn font_count(&self) -> usize {
        self.fonts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;

    #[test]
    fn scene_is_loaded_once_per_path() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), fixture::computers_glb().unwrap()).unwrap();

        let mut cache = AssetCache::new();
        let first = cache.scene(tmp.path()).unwrap();
        // Replacing the file on disk does not trigger a reload.
        std::fs::write(tmp.path(), b"corrupted").unwrap();
        let second = cache.scene(tmp.path()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.scene_count(), 1);
    }

    #[test]
    fn failed_load_is_not_cached() {
        let mut cache = AssetCache::new();
        assert!(cache.scene("/nonexistent/computers.glb").is_err());
        assert_eq!(cache.scene_count(), 0);
        assert!(cache.font("/nonexistent/font.ttf").is_err());
        assert_eq!(cache.font_count(), 0);
    }

    #[test]
    fn inserted_scene_is_served_from_cache() {
        let mut cache = AssetCache::new();
        let inserted = cache.insert_scene("synthetic.glb", fixture::computers_scene().unwrap());
        let served = cache.scene("synthetic.glb").unwrap();
        assert!(Arc::ptr_eq(&inserted, &served));
    }
}
