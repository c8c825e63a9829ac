use crate::camera::PerspectiveCamera;
use crate::frame::{FrameCallback, FrameState};
use crate::graph::SceneGraph;
use crate::SceneError;
use oldcomputers_common::Color;
use serde::{Deserialize, Serialize};

/// Handle to an offscreen render target owned by a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RenderTextureId(pub(crate) usize);

impl RenderTextureId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// An independent scene with its own camera and background, rendered into a
/// texture rather than to the screen.
#[derive(Debug, Clone)]
pub struct SubScene {
    pub graph: SceneGraph,
    pub camera: PerspectiveCamera,
    pub background: Color,
}

impl SubScene {
    pub fn new(camera: PerspectiveCamera, background: Color) -> Self {
        Self {
            graph: SceneGraph::new(),
            camera,
            background,
        }
    }
}

/// Offscreen color buffer of fixed size plus the sub-scene drawn into it.
#[derive(Debug, Clone)]
pub struct RenderTexture {
    pub width: u32,
    pub height: u32,
    /// Maximum anisotropic filtering used when sampling the result.
    pub anisotropy: u16,
    pub content: SubScene,
}

/// The composed scene: root graph, offscreen targets it samples from, and
/// the per-frame callbacks animating both.
#[derive(Default)]
pub struct Scene {
    graph: SceneGraph,
    targets: Vec<RenderTexture>,
    callbacks: Vec<Box<dyn FrameCallback>>,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("nodes", &self.graph.len())
            .field("targets", &self.targets.len())
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

/// Sizes recorded before a composition step so it can be undone.
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    nodes: usize,
    targets: usize,
    callbacks: usize,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    /// Allocate a render target for the lifetime of this scene.
    pub fn add_render_texture(&mut self, target: RenderTexture) -> RenderTextureId {
        self.targets.push(target);
        RenderTextureId(self.targets.len() - 1)
    }

    pub fn render_texture(&self, id: RenderTextureId) -> Option<&RenderTexture> {
        self.targets.get(id.0)
    }

    pub fn render_texture_mut(&mut self, id: RenderTextureId) -> Option<&mut RenderTexture> {
        self.targets.get_mut(id.0)
    }

    pub fn render_textures(&self) -> impl Iterator<Item = (RenderTextureId, &RenderTexture)> {
        self.targets
            .iter()
            .enumerate()
            .map(|(i, t)| (RenderTextureId(i), t))
    }

    pub fn render_texture_count(&self) -> usize {
        self.targets.len()
    }

    /// Register work to run on every frame.
    pub fn use_frame(&mut self, callback: impl FrameCallback + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Run every frame callback once, in registration order.
    pub fn advance(&mut self, frame: &FrameState) {
        let mut callbacks = std::mem::take(&mut self.callbacks);
        for callback in &mut callbacks {
            callback.on_frame(frame, self);
        }
        // Callbacks registered while running are kept after the existing ones.
        callbacks.append(&mut self.callbacks);
        self.callbacks = callbacks;
    }

    /// Run `compose` and undo everything it added if it fails, so a failed
    /// composition never leaves part of a component in the scene.
    pub fn transaction<R>(
        &mut self,
        compose: impl FnOnce(&mut Scene) -> Result<R, SceneError>,
    ) -> Result<R, SceneError> {
        let checkpoint = self.checkpoint();
        match compose(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::debug!("composition failed, rolling back: {err}");
                self.rollback(checkpoint);
                Err(err)
            }
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            nodes: self.graph.len(),
            targets: self.targets.len(),
            callbacks: self.callbacks.len(),
        }
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        self.graph.truncate(checkpoint.nodes);
        self.targets.truncate(checkpoint.targets);
        self.callbacks.truncate(checkpoint.callbacks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;
    use std::cell::Cell;
    use std::rc::Rc;

    fn frame(elapsed: f64) -> FrameState {
        FrameState {
            elapsed,
            delta: 0.016,
            frame: 1,
        }
    }

    #[test]
    fn callbacks_run_in_order() {
        let log = Rc::new(Cell::new(0u32));
        let mut scene = Scene::new();
        let first = log.clone();
        scene.use_frame(move |_: &FrameState, _: &mut Scene| first.set(first.get() * 10 + 1));
        let second = log.clone();
        scene.use_frame(move |_: &FrameState, _: &mut Scene| second.set(second.get() * 10 + 2));
        scene.advance(&frame(0.0));
        assert_eq!(log.get(), 12);
        assert_eq!(scene.callback_count(), 2);
    }

    #[test]
    fn callbacks_can_mutate_the_graph() {
        let mut scene = Scene::new();
        let root = scene.graph().root();
        let id = scene.graph_mut().add(root, Node::group()).unwrap();
        scene.use_frame(move |f: &FrameState, s: &mut Scene| {
            if let Some(node) = s.graph_mut().get_mut(id) {
                node.transform.position.x = f.elapsed as f32;
            }
        });
        scene.advance(&frame(2.5));
        assert_eq!(scene.graph().get(id).unwrap().transform.position.x, 2.5);
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let mut scene = Scene::new();
        let root = scene.graph().root();
        let result: Result<(), SceneError> = scene.transaction(|s| {
            s.graph_mut().add(root, Node::group())?;
            s.add_render_texture(RenderTexture {
                width: 4,
                height: 4,
                anisotropy: 1,
                content: SubScene::new(PerspectiveCamera::default(), Color::BLACK),
            });
            s.use_frame(|_: &FrameState, _: &mut Scene| {});
            Err(SceneError::MissingTemplate("Nope".into()))
        });
        assert!(result.is_err());
        assert_eq!(scene.graph().len(), 1);
        assert_eq!(scene.render_texture_count(), 0);
        assert_eq!(scene.callback_count(), 0);
    }

    #[test]
    fn successful_transaction_keeps_changes() {
        let mut scene = Scene::new();
        let root = scene.graph().root();
        let id = scene
            .transaction(|s| s.graph_mut().add(root, Node::group().named("kept")))
            .unwrap();
        assert_eq!(scene.graph().find("kept"), Some(id));
    }
}
