use crate::frame::{FrameCallback, FrameState};
use crate::graph::{Material, MeshNode, Node, NodeId, NodeKind, SceneGraph, Shadows};
use crate::scene::{RenderTextureId, Scene};
use crate::SceneError;
use glam::{EulerRot, Quat, Vec3};
use oldcomputers_assets::MeshData;
use oldcomputers_common::{Color, Transform};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

pub const CLICKED_SCALE: f32 = 1.5;

/// Pointer state of a spinning box, shared with whatever drives input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoxInteraction {
    pub hovered: bool,
    pub clicked: bool,
}

/// A unit box turning about X and Y at one radian per second.
///
/// Red normally, pink while hovered, half again as large while clicked.
#[derive(Debug, Clone)]
pub struct SpinningBox {
    pub transform: Transform,
    state: Rc<Cell<BoxInteraction>>,
}

impl SpinningBox {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            state: Rc::default(),
        }
    }

    /// Shared handle to the pointer state.
    pub fn interaction(&self) -> Rc<Cell<BoxInteraction>> {
        self.state.clone()
    }

    pub fn set_hovered(&self, hovered: bool) {
        let mut state = self.state.get();
        state.hovered = hovered;
        self.state.set(state);
    }

    /// Flip the clicked state, returning the new value.
    pub fn toggle_clicked(&self) -> bool {
        let mut state = self.state.get();
        state.clicked = !state.clicked;
        self.state.set(state);
        state.clicked
    }

    pub fn color(state: BoxInteraction) -> Result<Color, SceneError> {
        Ok(Color::parse(if state.hovered {
            "hotpink"
        } else {
            "indianred"
        })?)
    }

    /// Add the box to a sub-scene graph. Returns the spinning mesh node.
    pub fn compose(&self, graph: &mut SceneGraph, parent: NodeId) -> Result<NodeId, SceneError> {
        let color = Self::color(self.state.get())?;
        let holder = graph.add(
            parent,
            Node::group()
                .named("spinning_box")
                .with_transform(self.transform),
        )?;
        let mesh = Node::new(NodeKind::Mesh(MeshNode {
            geometry: Arc::new(MeshData::cuboid("box", 1.0, 1.0, 1.0)),
            material: Material::standard(color),
            shadows: Shadows::NONE,
        }));
        Ok(graph.add(holder, mesh)?)
    }

    /// Frame callback animating a box composed into `target`.
    pub fn animator(&self, target: RenderTextureId, node: NodeId) -> SpinningBoxAnimator {
        SpinningBoxAnimator {
            target,
            node,
            state: self.state.clone(),
            angles: Vec3::ZERO,
        }
    }
}

/// Advances the rotation and applies hover and click state every frame.
#[derive(Debug)]
pub struct SpinningBoxAnimator {
    target: RenderTextureId,
    node: NodeId,
    state: Rc<Cell<BoxInteraction>>,
    angles: Vec3,
}

impl FrameCallback for SpinningBoxAnimator {
    fn on_frame(&mut self, frame: &FrameState, scene: &mut Scene) {
        self.angles.x += frame.delta;
        self.angles.y += frame.delta;
        let state = self.state.get();
        let Some(target) = scene.render_texture_mut(self.target) else {
            return;
        };
        let Some(node) = target.content.graph.get_mut(self.node) else {
            return;
        };
        node.transform.rotation = Quat::from_euler(EulerRot::XYZ, self.angles.x, self.angles.y, 0.0);
        node.transform.scale = Vec3::splat(if state.clicked { CLICKED_SCALE } else { 1.0 });
        if let NodeKind::Mesh(mesh) = &mut node.kind {
            if let Ok(color) = SpinningBox::color(state) {
                mesh.material = Material::standard(color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::PerspectiveCamera;
    use crate::scene::{RenderTexture, SubScene};

    fn boxed_scene(spinner: &SpinningBox) -> (Scene, RenderTextureId, NodeId) {
        let mut content = SubScene::new(PerspectiveCamera::default(), Color::BLACK);
        let root = content.graph.root();
        let node = spinner.compose(&mut content.graph, root).unwrap();
        let mut scene = Scene::new();
        let target = scene.add_render_texture(RenderTexture {
            width: 8,
            height: 8,
            anisotropy: 1,
            content,
        });
        scene.use_frame(spinner.animator(target, node));
        (scene, target, node)
    }

    fn step(scene: &mut Scene, delta: f32) {
        scene.advance(&FrameState {
            elapsed: 0.0,
            delta,
            frame: 0,
        });
    }

    fn box_node(scene: &Scene, target: RenderTextureId, node: NodeId) -> &Node {
        scene
            .render_texture(target)
            .unwrap()
            .content
            .graph
            .get(node)
            .unwrap()
    }

    #[test]
    fn rotation_accumulates_delta() {
        let spinner = SpinningBox::new(Transform::default());
        let (mut scene, target, node) = boxed_scene(&spinner);
        step(&mut scene, 0.25);
        step(&mut scene, 0.25);
        let (x, y, z) = box_node(&scene, target, node)
            .transform
            .rotation
            .to_euler(EulerRot::XYZ);
        assert!((x - 0.5).abs() < 1e-5 && (y - 0.5).abs() < 1e-5 && z.abs() < 1e-5);
    }

    #[test]
    fn click_scales_and_hover_recolors() {
        let spinner = SpinningBox::new(Transform::default());
        let (mut scene, target, node) = boxed_scene(&spinner);
        assert!(spinner.toggle_clicked());
        spinner.set_hovered(true);
        step(&mut scene, 0.0);
        let boxed = box_node(&scene, target, node);
        assert_eq!(boxed.transform.scale, Vec3::splat(CLICKED_SCALE));
        let NodeKind::Mesh(mesh) = &boxed.kind else {
            panic!("box is not a mesh");
        };
        let Material::Standard { color, .. } = &mesh.material else {
            panic!("box material is not lit");
        };
        assert_eq!(*color, Color::parse("hotpink").unwrap());

        assert!(!spinner.toggle_clicked());
        step(&mut scene, 0.0);
        assert_eq!(box_node(&scene, target, node).transform.scale, Vec3::ONE);
    }

    #[test]
    fn placement_lives_on_the_holder() {
        let spinner =
            SpinningBox::new(Transform::from_position(Vec3::new(-3.15, 0.75, 0.0)).with_uniform_scale(0.5));
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let node = spinner.compose(&mut graph, root).unwrap();
        let holder = graph.get(node).unwrap().parent().unwrap();
        assert_eq!(graph.get(holder).unwrap().transform.scale, Vec3::splat(0.5));
        let center = graph.world_matrix(node).unwrap().transform_point3(Vec3::ZERO);
        assert!((center - Vec3::new(-3.15, 0.75, 0.0)).length() < 1e-6);
    }
}
