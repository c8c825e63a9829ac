use crate::SceneError;
use glam::Mat4;
use oldcomputers_assets::{MaterialData, MeshData, TextureImage};
use oldcomputers_common::{Color, Transform};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::instances::Template;
use crate::scene::RenderTextureId;

/// Index of a node inside one [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Shadow participation flags. Carried for the host renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Shadows {
    pub cast: bool,
    pub receive: bool,
}

impl Shadows {
    pub const NONE: Self = Self {
        cast: false,
        receive: false,
    };
    pub const BOTH: Self = Self {
        cast: true,
        receive: true,
    };
}

/// Where a material's color map comes from.
#[derive(Debug, Clone)]
pub enum TextureSource {
    Image(Arc<TextureImage>),
    /// Output of an offscreen render target owned by the same scene.
    RenderTexture(RenderTextureId),
}

#[derive(Debug, Clone)]
pub enum Material {
    /// Lit and tone mapped. `source` is the asset material, if any.
    Standard {
        color: Color,
        source: Option<Arc<MaterialData>>,
    },
    /// Unlit.
    Basic {
        color: Color,
        map: Option<TextureSource>,
        tone_mapped: bool,
    },
}

impl Material {
    pub fn from_asset(material: Arc<MaterialData>) -> Self {
        Material::Standard {
            color: Color::WHITE,
            source: Some(material),
        }
    }

    pub fn standard(color: Color) -> Self {
        Material::Standard {
            color,
            source: None,
        }
    }

    pub fn is_unlit(&self) -> bool {
        matches!(self, Material::Basic { .. })
    }
}

#[derive(Debug, Clone)]
pub struct MeshNode {
    pub geometry: Arc<MeshData>,
    pub material: Material,
    pub shadows: Shadows,
}

/// One copy of a shared template. Only `color` changes after placement.
#[derive(Debug, Clone)]
pub struct InstanceNode {
    pub template: Arc<Template>,
    pub color: Color,
    /// Draw with an unlit, non-tone-mapped material instead of the
    /// template's own.
    pub unlit: bool,
    pub shadows: Shadows,
}

#[derive(Debug, Clone)]
pub struct TextNode {
    pub content: String,
    pub geometry: Arc<MeshData>,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Light {
    Ambient { color: Color, intensity: f32 },
    /// Positioned by the node transform.
    Point { color: Color, intensity: f32 },
    /// Shines from the node position towards the world origin.
    Directional { color: Color, intensity: f32 },
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Group,
    Mesh(MeshNode),
    Instance(InstanceNode),
    Text(TextNode),
    Light(Light),
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Group => "group",
            NodeKind::Mesh(_) => "mesh",
            NodeKind::Instance(_) => "instance",
            NodeKind::Text(_) => "text",
            NodeKind::Light(_) => "light",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: Option<String>,
    pub transform: Transform,
    pub kind: NodeKind,
    pub visible: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            name: None,
            transform: Transform::default(),
            kind,
            visible: true,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group() -> Self {
        Self::new(NodeKind::Group)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena-backed hierarchy of positioned nodes. Node 0 is the root group.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: Vec<Node>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::group().named("root")],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    /// Attach `node` under `parent` and return its id.
    pub fn add(&mut self, parent: NodeId, mut node: Node) -> Result<NodeId, SceneError> {
        if !self.contains(parent) {
            return Err(SceneError::UnknownNode(parent));
        }
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name.as_deref() == Some(name))
            .map(NodeId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Number of nodes matching `pred`.
    pub fn count(&self, pred: impl Fn(&Node) -> bool) -> usize {
        self.nodes.iter().filter(|n| pred(n)).count()
    }

    /// Local-to-world matrix of a node.
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.get(id)?;
        let mut matrix = node.transform.matrix();
        while let Some(parent) = node.parent {
            node = &self.nodes[parent.0];
            matrix = node.transform.matrix() * matrix;
        }
        Some(matrix)
    }

    /// Depth-first, parent-before-child walk over visible nodes with their
    /// world matrices. Hidden nodes prune their subtree.
    pub fn walk(&self) -> Vec<(NodeId, Mat4)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root(), Mat4::IDENTITY)];
        while let Some((id, parent_world)) = stack.pop() {
            let node = &self.nodes[id.0];
            if !node.visible {
                continue;
            }
            let world = parent_world * node.transform.matrix();
            out.push((id, world));
            for child in node.children.iter().rev() {
                stack.push((*child, world));
            }
        }
        out
    }

    /// Depth of a node below the root.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.get(id).and_then(|n| n.parent);
        while let Some(parent) = current {
            depth += 1;
            current = self.nodes[parent.0].parent;
        }
        depth
    }

    /// Drop every node added after the graph had `len` nodes.
    pub(crate) fn truncate(&mut self, len: usize) {
        let len = len.max(1);
        self.nodes.truncate(len);
        for node in &mut self.nodes {
            node.children.retain(|c| c.0 < len);
        }
    }
}
