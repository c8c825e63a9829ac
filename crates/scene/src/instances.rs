//! Shared instance templates.
//!
//! Repeated parts of the asset are drawn from one template each, so every
//! copy of a part shares a single geometry and material and the renderer can
//! batch them into one instanced draw. The template set is handed to
//! composers explicitly through [`Instances::provide`].

use crate::graph::{InstanceNode, Node, NodeKind, Shadows};
use crate::SceneError;
use oldcomputers_assets::{AssetId, MaterialData, MeshData, SceneAsset};
use oldcomputers_common::{Color, Transform};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Logical template name and the asset node it is taken from.
pub const TEMPLATE_NODES: &[(&str, &str)] = &[
    ("Object", "Object_4"),
    ("Object1", "Object_16"),
    ("Object3", "Object_52"),
    ("Object13", "Object_172"),
    ("Object14", "Object_174"),
    ("Object23", "Object_22"),
    ("Object24", "Object_26"),
    ("Object32", "Object_178"),
    ("Object36", "Object_28"),
    ("Object45", "Object_206"),
    ("Object46", "Object_207"),
    ("Object47", "Object_215"),
    ("Object48", "Object_216"),
    ("Sphere", "Sphere"),
];

/// Geometry and material shared by every instance of one part.
#[derive(Debug)]
pub struct Template {
    pub name: String,
    /// Asset node the geometry came from.
    pub node: String,
    pub geometry: Arc<MeshData>,
    pub material: Option<Arc<MaterialData>>,
}

/// Immutable name-to-template mapping for one asset.
#[derive(Debug)]
pub struct TemplateSet {
    asset: AssetId,
    templates: BTreeMap<String, Arc<Template>>,
}

impl TemplateSet {
    /// Resolve every entry of [`TEMPLATE_NODES`]. Fails on the first node
    /// that is missing or has no mesh.
    pub fn build(asset: &SceneAsset) -> Result<Self, SceneError> {
        let mut templates = BTreeMap::new();
        for (name, node) in TEMPLATE_NODES {
            let source = asset.node(node)?;
            let geometry = asset.geometry(node)?.clone();
            templates.insert(
                name.to_string(),
                Arc::new(Template {
                    name: name.to_string(),
                    node: node.to_string(),
                    geometry,
                    material: source.material.clone(),
                }),
            );
        }
        Ok(Self {
            asset: asset.id(),
            templates,
        })
    }

    pub fn asset_id(&self) -> AssetId {
        self.asset
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Template>> {
        self.templates.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Arc<Template>, SceneError> {
        self.get(name)
            .ok_or_else(|| SceneError::MissingTemplate(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Builds template sets, rebuilding only when the asset identity changes.
#[derive(Debug, Default)]
pub struct InstanceProvider {
    memo: Option<Arc<TemplateSet>>,
    builds: usize,
}

impl InstanceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Templates for `asset`, wrapped for handing to composers.
    pub fn instances(&mut self, asset: &Arc<SceneAsset>) -> Result<Instances, SceneError> {
        let templates = match &self.memo {
            Some(set) if set.asset_id() == asset.id() => {
                tracing::debug!("template set for asset {} reused", asset.id());
                set.clone()
            }
            _ => {
                let set = Arc::new(TemplateSet::build(asset)?);
                self.builds += 1;
                tracing::debug!(
                    "built {} templates for asset {}",
                    set.len(),
                    asset.id()
                );
                self.memo = Some(set.clone());
                set
            }
        };
        Ok(Instances {
            asset: asset.clone(),
            templates,
            shadows: Shadows::BOTH,
        })
    }

    /// How many template sets this provider has built.
    pub fn build_count(&self) -> usize {
        self.builds
    }
}

/// The resolved asset plus its templates, ready to be provided to composers.
#[derive(Debug, Clone)]
pub struct Instances {
    asset: Arc<SceneAsset>,
    templates: Arc<TemplateSet>,
    shadows: Shadows,
}

impl Instances {
    pub fn asset(&self) -> &Arc<SceneAsset> {
        &self.asset
    }

    pub fn templates(&self) -> &Arc<TemplateSet> {
        &self.templates
    }

    /// Run `consumer` with access to the shared templates.
    pub fn provide<R>(&self, consumer: impl FnOnce(&InstanceContext<'_>) -> R) -> R {
        let ctx = InstanceContext {
            asset: &self.asset,
            templates: &self.templates,
            shadows: self.shadows,
        };
        consumer(&ctx)
    }
}

/// What a composer sees inside [`Instances::provide`].
#[derive(Debug, Clone, Copy)]
pub struct InstanceContext<'a> {
    asset: &'a Arc<SceneAsset>,
    templates: &'a Arc<TemplateSet>,
    shadows: Shadows,
}

impl<'a> InstanceContext<'a> {
    pub fn asset(&self) -> &'a Arc<SceneAsset> {
        self.asset
    }

    pub fn templates(&self) -> &'a Arc<TemplateSet> {
        self.templates
    }

    pub fn template(&self, name: &str) -> Result<Arc<Template>, SceneError> {
        self.templates.require(name).cloned()
    }

    /// A node drawing one copy of the named template.
    pub fn instance(
        &self,
        name: &str,
        transform: Transform,
        color: Color,
    ) -> Result<Node, SceneError> {
        Ok(Node::new(NodeKind::Instance(InstanceNode {
            template: self.template(name)?,
            color,
            unlit: false,
            shadows: self.shadows,
        }))
        .with_transform(transform))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oldcomputers_assets::fixture;

    fn asset() -> Arc<SceneAsset> {
        Arc::new(fixture::computers_scene().unwrap())
    }

    #[test]
    fn builds_every_template() {
        let set = TemplateSet::build(&asset()).unwrap();
        assert_eq!(set.len(), TEMPLATE_NODES.len());
        assert_eq!(set.require("Object45").unwrap().node, "Object_206");
        assert_eq!(set.require("Sphere").unwrap().node, "Sphere");
        assert!(matches!(
            set.require("Object99"),
            Err(SceneError::MissingTemplate(_))
        ));
    }

    #[test]
    fn templates_share_asset_geometry() {
        let asset = asset();
        let set = TemplateSet::build(&asset).unwrap();
        let sphere = set.require("Sphere").unwrap();
        assert!(Arc::ptr_eq(&sphere.geometry, asset.geometry("Sphere").unwrap()));
    }

    #[test]
    fn provider_memoizes_on_asset_identity() {
        let asset = asset();
        let mut provider = InstanceProvider::new();
        let first = provider.instances(&asset).unwrap();
        let second = provider.instances(&asset).unwrap();
        assert!(Arc::ptr_eq(first.templates(), second.templates()));
        // A separately loaded copy of the same bytes has the same identity.
        let reloaded = Arc::new(fixture::computers_scene().unwrap());
        let third = provider.instances(&reloaded).unwrap();
        assert!(Arc::ptr_eq(first.templates(), third.templates()));
        assert_eq!(provider.build_count(), 1);
    }

    #[test]
    fn missing_node_fails_the_build() {
        let document = serde_json::json!({
            "asset": { "version": "2.0" },
            "scenes": [{ "nodes": [] }],
        });
        let bytes = fixture::encode_glb(&document, &[]).unwrap();
        let empty = Arc::new(SceneAsset::from_glb_bytes(&bytes).unwrap());
        let mut provider = InstanceProvider::new();
        let err = provider.instances(&empty).unwrap_err();
        assert!(matches!(err, SceneError::Asset(_)));
        assert_eq!(provider.build_count(), 0);
    }

    #[test]
    fn context_builds_shadowed_instances() {
        let instances = InstanceProvider::new().instances(&asset()).unwrap();
        let node = instances
            .provide(|ctx| ctx.instance("Object", Transform::default(), Color::WHITE))
            .unwrap();
        let NodeKind::Instance(instance) = &node.kind else {
            panic!("expected an instance node");
        };
        assert_eq!(instance.shadows, Shadows::BOTH);
        assert_eq!(instance.template.name, "Object");
    }
}
