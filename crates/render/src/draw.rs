//! Draw-list extraction.
//!
//! Flattens a scene graph into batches that share geometry and material so
//! a backend can issue one instanced draw per batch. Instances of the same
//! template always land in the same batch.

use glam::{Mat4, Vec3};
use oldcomputers_assets::{MaterialData, MeshData, TextureImage};
use oldcomputers_common::Color;
use oldcomputers_scene::{
    Light, Material, NodeKind, PerspectiveCamera, RenderTexture, RenderTextureId, Scene,
    SceneGraph, TextureSource,
};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Shading {
    Lit,
    Unlit,
}

/// Texture sampled by a batch.
#[derive(Debug, Clone)]
pub enum DrawTexture {
    Image(Arc<TextureImage>),
    Target(RenderTextureId),
}

impl DrawTexture {
    fn key(&self) -> TextureKey {
        match self {
            DrawTexture::Image(image) => TextureKey::Image(Arc::as_ptr(image) as usize),
            DrawTexture::Target(id) => TextureKey::Target(id.index()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum TextureKey {
    None,
    Image(usize),
    Target(usize),
}

/// Material state shared by every instance of a batch.
#[derive(Debug, Clone)]
pub struct DrawMaterial {
    pub shading: Shading,
    pub tone_mapped: bool,
    /// Linear base color factor, multiplied with each instance color.
    pub base_color: [f32; 4],
    pub texture: Option<DrawTexture>,
}

impl DrawMaterial {
    fn lit(source: Option<&Arc<MaterialData>>) -> Self {
        let base_color = source.map(|m| m.base_color).unwrap_or([1.0; 4]);
        Self {
            shading: Shading::Lit,
            tone_mapped: true,
            base_color,
            texture: source
                .and_then(|m| m.base_color_texture.clone())
                .map(DrawTexture::Image),
        }
    }

    fn unlit(tone_mapped: bool, texture: Option<DrawTexture>) -> Self {
        Self {
            shading: Shading::Unlit,
            tone_mapped,
            base_color: [1.0; 4],
            texture,
        }
    }
}

/// Per-instance data: model matrix and linear color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawInstance {
    pub model: Mat4,
    pub color: [f32; 4],
}

#[derive(Debug, Clone)]
pub struct DrawBatch {
    pub label: String,
    pub geometry: Arc<MeshData>,
    pub material: DrawMaterial,
    pub instances: Vec<DrawInstance>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// Direction the light travels in, normalized.
    pub direction: Vec3,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Color,
}

/// Lights of one pass with intensities folded into their colors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightSet {
    pub ambient: Color,
    pub directional: Vec<DirectionalLight>,
    pub point: Vec<PointLight>,
}

impl LightSet {
    pub fn len(&self) -> usize {
        usize::from(self.ambient != Color::BLACK) + self.directional.len() + self.point.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything needed to draw one graph once.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    pub lights: LightSet,
    pub batches: Vec<DrawBatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct BatchKey {
    geometry: usize,
    shading: Shading,
    tone_mapped: bool,
    material: usize,
    texture: TextureKey,
}

impl DrawList {
    /// Walk the visible part of `graph` and group drawables into batches.
    pub fn extract(graph: &SceneGraph) -> Self {
        let mut lights = LightSet::default();
        let mut order: Vec<BatchKey> = Vec::new();
        let mut batches: BTreeMap<BatchKey, DrawBatch> = BTreeMap::new();

        for (id, world) in graph.walk() {
            let Some(node) = graph.get(id) else {
                continue;
            };
            let (geometry, source, material, color, label) = match &node.kind {
                NodeKind::Group => continue,
                NodeKind::Light(light) => {
                    collect_light(&mut lights, light, world);
                    continue;
                }
                NodeKind::Mesh(mesh) => {
                    let (material, color, source) = match &mesh.material {
                        Material::Standard { color, source } => {
                            (DrawMaterial::lit(source.as_ref()), *color, source.clone())
                        }
                        Material::Basic {
                            color,
                            map,
                            tone_mapped,
                        } => (
                            DrawMaterial::unlit(*tone_mapped, map.as_ref().map(texture_of)),
                            *color,
                            None,
                        ),
                    };
                    let label = node.name.clone().unwrap_or_else(|| mesh.geometry.name.clone());
                    (mesh.geometry.clone(), source, material, color, label)
                }
                NodeKind::Instance(instance) => {
                    let template = &instance.template;
                    let (material, source) = if instance.unlit {
                        (DrawMaterial::unlit(false, None), None)
                    } else {
                        (
                            DrawMaterial::lit(template.material.as_ref()),
                            template.material.clone(),
                        )
                    };
                    (
                        template.geometry.clone(),
                        source,
                        material,
                        instance.color,
                        template.name.clone(),
                    )
                }
                NodeKind::Text(text) => (
                    text.geometry.clone(),
                    None,
                    DrawMaterial::unlit(true, None),
                    text.color,
                    "text".to_string(),
                ),
            };
            if geometry.is_empty() {
                continue;
            }

            let key = BatchKey {
                geometry: Arc::as_ptr(&geometry) as usize,
                shading: material.shading,
                tone_mapped: material.tone_mapped,
                material: source.as_ref().map_or(0, |m| Arc::as_ptr(m) as usize),
                texture: material.texture.as_ref().map_or(TextureKey::None, DrawTexture::key),
            };
            let instance = DrawInstance {
                model: world,
                color: color.to_rgba(1.0),
            };
            batches
                .entry(key)
                .or_insert_with(|| {
                    order.push(key);
                    DrawBatch {
                        label,
                        geometry,
                        material,
                        instances: Vec::new(),
                    }
                })
                .instances
                .push(instance);
        }

        // Keep batches in the order their first node was met.
        let batches = order
            .into_iter()
            .filter_map(|key| batches.remove(&key))
            .collect();
        Self { lights, batches }
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn instance_count(&self) -> usize {
        self.batches.iter().map(|b| b.instances.len()).sum()
    }

    pub fn batch(&self, label: &str) -> Option<&DrawBatch> {
        self.batches.iter().find(|b| b.label == label)
    }
}

fn texture_of(source: &TextureSource) -> DrawTexture {
    match source {
        TextureSource::Image(image) => DrawTexture::Image(image.clone()),
        TextureSource::RenderTexture(id) => DrawTexture::Target(*id),
    }
}

fn collect_light(lights: &mut LightSet, light: &Light, world: Mat4) {
    let position = world.transform_point3(Vec3::ZERO);
    match *light {
        Light::Ambient { color, intensity } => {
            let add = color.scaled(intensity);
            lights.ambient = Color::rgb(
                lights.ambient.r + add.r,
                lights.ambient.g + add.g,
                lights.ambient.b + add.b,
            );
        }
        Light::Directional { color, intensity } => {
            let direction = (-position).try_normalize().unwrap_or(Vec3::NEG_Y);
            lights.directional.push(DirectionalLight {
                direction,
                color: color.scaled(intensity),
            });
        }
        Light::Point { color, intensity } => lights.point.push(PointLight {
            position,
            color: color.scaled(intensity),
        }),
    }
}

/// One offscreen pass: a sub-scene drawn into its render target.
#[derive(Debug, Clone)]
pub struct TargetPass {
    pub target: RenderTextureId,
    pub width: u32,
    pub height: u32,
    pub anisotropy: u16,
    pub clear_color: Color,
    pub camera: PerspectiveCamera,
    pub draw: DrawList,
}

impl TargetPass {
    fn of(target: RenderTextureId, texture: &RenderTexture) -> Self {
        let content = &texture.content;
        Self {
            target,
            width: texture.width,
            height: texture.height,
            anisotropy: texture.anisotropy,
            clear_color: content.background,
            camera: content.camera,
            draw: DrawList::extract(&content.graph),
        }
    }
}

/// A whole frame: offscreen passes first, then the main graph.
#[derive(Debug, Clone, Default)]
pub struct FramePlan {
    pub targets: Vec<TargetPass>,
    pub main: DrawList,
}

impl FramePlan {
    pub fn build(scene: &Scene) -> Self {
        let targets = scene
            .render_textures()
            .map(|(id, texture)| TargetPass::of(id, texture))
            .collect();
        let plan = Self {
            targets,
            main: DrawList::extract(scene.graph()),
        };
        tracing::trace!(
            "frame plan: {} offscreen pass(es), {} draw calls",
            plan.targets.len(),
            plan.draw_calls()
        );
        plan
    }

    /// Instanced draws issued for the frame, offscreen passes included.
    pub fn draw_calls(&self) -> usize {
        let offscreen: usize = self.targets.iter().map(|t| t.draw.batch_count()).sum();
        self.main.batch_count() + offscreen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oldcomputers_assets::fixture;
    use oldcomputers_common::Transform;
    use oldcomputers_scene::{InstanceProvider, Node, SingleComputer};

    fn composed() -> Scene {
        let asset = Arc::new(fixture::computers_scene().unwrap());
        let instances = InstanceProvider::new().instances(&asset).unwrap();
        let mut scene = Scene::new();
        let root = scene.graph().root();
        instances
            .provide(|ctx| SingleComputer::default().compose(ctx, &mut scene, root))
            .unwrap();
        scene
    }

    #[test]
    fn leds_share_one_unlit_batch() {
        let plan = FramePlan::build(&composed());
        let leds = plan.main.batch("Sphere").unwrap();
        assert_eq!(leds.instances.len(), 10);
        assert_eq!(leds.material.shading, Shading::Unlit);
        assert!(!leds.material.tone_mapped);
        assert_eq!(leds.instances[0].color, [1.0, 2.0, 1.0, 1.0]);
    }

    #[test]
    fn panel_samples_its_target() {
        let plan = FramePlan::build(&composed());
        assert_eq!(plan.targets.len(), 1);
        let target = &plan.targets[0];
        let panel = plan.main.batch("Object_207").unwrap();
        assert!(matches!(
            panel.material.texture,
            Some(DrawTexture::Target(id)) if id == target.target
        ));
        assert!(!panel.material.tone_mapped);
        let frame = plan.main.batch("Object_206").unwrap();
        assert_eq!(frame.material.shading, Shading::Lit);
    }

    #[test]
    fn screen_pass_has_box_and_lights() {
        let plan = FramePlan::build(&composed());
        let pass = &plan.targets[0];
        assert_eq!((pass.width, pass.height), (512, 512));
        assert_eq!(pass.draw.batch_count(), 1);
        assert_eq!(pass.draw.lights.point.len(), 2);
        assert!((pass.draw.lights.ambient.r - 0.5).abs() < 1e-6);
        assert_eq!(plan.draw_calls(), plan.main.batch_count() + 1);
    }

    #[test]
    fn hidden_subtrees_are_skipped() {
        let mut scene = composed();
        let before = FramePlan::build(&scene).main.instance_count();
        let leds = scene.graph().find("leds").unwrap();
        scene.graph_mut().get_mut(leds).unwrap().visible = false;
        let after = FramePlan::build(&scene).main.instance_count();
        assert_eq!(before - after, 10);
    }

    #[test]
    fn directional_light_points_at_origin() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        graph
            .add(
                root,
                Node::new(NodeKind::Light(Light::Directional {
                    color: Color::WHITE,
                    intensity: 2.0,
                }))
                .with_transform(Transform::from_position(Vec3::new(0.0, 10.0, 0.0))),
            )
            .unwrap();
        let list = DrawList::extract(&graph);
        let light = list.lights.directional[0];
        assert!((light.direction - Vec3::NEG_Y).length() < 1e-6);
        assert_eq!(light.color, Color::rgb(2.0, 2.0, 2.0));
        assert_eq!(list.batch_count(), 0);
    }
}
