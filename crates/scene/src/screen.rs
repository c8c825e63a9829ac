//! Monitors showing a render-to-texture sub-scene.
//!
//! A screen is a frame mesh plus a panel mesh taken from the asset. The
//! panel samples an offscreen target into which the screen's own content
//! (camera, background, lights, objects) is drawn every frame.

use crate::camera::PerspectiveCamera;
use crate::graph::{
    Light, Material, MeshNode, Node, NodeId, NodeKind, SceneGraph, Shadows, TextNode,
    TextureSource,
};
use crate::instances::InstanceContext;
use crate::scene::{RenderTexture, RenderTextureId, Scene, SubScene};
use crate::spinning_box::SpinningBox;
use crate::SceneError;
use glam::Vec3;
use oldcomputers_assets::{FontResource, TextStyle};
use oldcomputers_common::{Color, Transform};
use std::f32::consts::PI;
use std::sync::Arc;

pub const SCREEN_TEXTURE_SIZE: u32 = 512;
pub const SCREEN_ANISOTROPY: u16 = 16;
/// Shared asset material used by every monitor frame.
pub const FRAME_MATERIAL: &str = "Texture";

/// Placement of a monitor and the asset nodes it is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub frame: String,
    pub panel: String,
    pub transform: Transform,
}

/// Nodes and target created for one composed screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenHandle {
    pub group: NodeId,
    pub frame: NodeId,
    pub panel: NodeId,
    pub target: RenderTextureId,
}

impl Screen {
    pub fn new(frame: impl Into<String>, panel: impl Into<String>, transform: Transform) -> Self {
        Self {
            frame: frame.into(),
            panel: panel.into(),
            transform,
        }
    }

    /// Check every asset lookup this screen needs without touching a scene.
    pub fn validate(&self, ctx: &InstanceContext<'_>) -> Result<(), SceneError> {
        let asset = ctx.asset();
        asset.geometry(&self.frame)?;
        asset.geometry(&self.panel)?;
        asset.material(FRAME_MATERIAL)?;
        Ok(())
    }

    /// Add the monitor under `parent`, with `content` rendered on its panel.
    pub fn compose(
        &self,
        ctx: &InstanceContext<'_>,
        scene: &mut Scene,
        parent: NodeId,
        content: SubScene,
    ) -> Result<ScreenHandle, SceneError> {
        let asset = ctx.asset();
        let frame_geometry = asset.geometry(&self.frame)?.clone();
        let panel_geometry = asset.geometry(&self.panel)?.clone();
        let frame_material = asset.material(FRAME_MATERIAL)?.clone();

        let group = scene.graph_mut().add(
            parent,
            Node::group()
                .named(format!("screen {}", self.frame))
                .with_transform(self.transform),
        )?;
        let frame = scene.graph_mut().add(
            group,
            Node::new(NodeKind::Mesh(MeshNode {
                geometry: frame_geometry,
                material: Material::from_asset(frame_material),
                shadows: Shadows::BOTH,
            }))
            .named(self.frame.clone()),
        )?;
        let target = scene.add_render_texture(RenderTexture {
            width: SCREEN_TEXTURE_SIZE,
            height: SCREEN_TEXTURE_SIZE,
            anisotropy: SCREEN_ANISOTROPY,
            content,
        });
        let panel = scene.graph_mut().add(
            group,
            Node::new(NodeKind::Mesh(MeshNode {
                geometry: panel_geometry,
                material: Material::Basic {
                    color: Color::WHITE,
                    map: Some(TextureSource::RenderTexture(target)),
                    tone_mapped: false,
                },
                shadows: Shadows::NONE,
            }))
            .named(self.panel.clone()),
        )?;
        tracing::debug!(
            "composed screen {}/{} into target {}",
            self.frame,
            self.panel,
            target.index()
        );
        Ok(ScreenHandle {
            group,
            frame,
            panel,
            target,
        })
    }
}

pub(crate) fn add_light(graph: &mut SceneGraph, position: Vec3, light: Light) -> Result<NodeId, SceneError> {
    let root = graph.root();
    graph.add(
        root,
        Node::new(NodeKind::Light(light)).with_transform(Transform::from_position(position)),
    )
}

/// Monitor showing the spinning box on an orange background.
#[derive(Debug, Clone)]
pub struct InteractiveScreen {
    pub screen: Screen,
    pub spinner: SpinningBox,
}

impl InteractiveScreen {
    pub fn new(frame: impl Into<String>, panel: impl Into<String>, transform: Transform) -> Self {
        Self {
            screen: Screen::new(frame, panel, transform),
            spinner: SpinningBox::new(
                Transform::from_position(Vec3::new(-3.15, 0.75, 0.0)).with_uniform_scale(0.5),
            ),
        }
    }

    pub fn validate(&self, ctx: &InstanceContext<'_>) -> Result<(), SceneError> {
        self.screen.validate(ctx)
    }

    fn content(&self) -> Result<(SubScene, NodeId), SceneError> {
        let mut content = SubScene::new(
            PerspectiveCamera::at(Vec3::new(0.0, 0.0, 10.0)).with_aspect(1.0),
            Color::parse("orange")?,
        );
        let graph = &mut content.graph;
        add_light(
            graph,
            Vec3::ZERO,
            Light::Ambient {
                color: Color::WHITE,
                intensity: 0.5,
            },
        )?;
        add_light(
            graph,
            Vec3::new(10.0, 10.0, 10.0),
            Light::Point {
                color: Color::WHITE,
                intensity: 0.75,
            },
        )?;
        add_light(
            graph,
            Vec3::new(-10.0, -10.0, -10.0),
            Light::Point {
                color: Color::WHITE,
                intensity: 1.0,
            },
        )?;
        let root = graph.root();
        let spinner = self.spinner.compose(graph, root)?;
        Ok((content, spinner))
    }

    pub fn compose(
        &self,
        ctx: &InstanceContext<'_>,
        scene: &mut Scene,
        parent: NodeId,
    ) -> Result<ScreenHandle, SceneError> {
        let (content, spinner) = self.content()?;
        let handle = self.screen.compose(ctx, scene, parent, content)?;
        scene.use_frame(self.spinner.animator(handle.target, spinner));
        Ok(handle)
    }
}

pub const SCREEN_TEXT: &str = "Upload Listen";
pub const TEXT_BACKGROUND: &str = "#35c19f";

/// Where a text monitor goes and how its text is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextPlacement {
    pub frame: &'static str,
    pub panel: &'static str,
    pub invert: bool,
    pub x: f32,
    pub y: f32,
    pub position: [f32; 3],
    pub rotation_y: f32,
    pub scale: f32,
}

impl TextPlacement {
    const fn new(
        frame: &'static str,
        panel: &'static str,
        invert: bool,
        position: [f32; 3],
        rotation_y: f32,
    ) -> Self {
        Self {
            frame,
            panel,
            invert,
            x: 0.0,
            y: 1.2,
            position,
            rotation_y,
            scale: 1.0,
        }
    }

    const fn text_at(mut self, x: f32, y: f32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    const fn scaled(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn transform(&self) -> Transform {
        Transform::from_position(Vec3::from_array(self.position))
            .with_euler(0.0, self.rotation_y, 0.0)
            .with_uniform_scale(self.scale)
    }
}

/// The text monitors around the room. Not part of the default composition.
pub const TEXT_PLACEMENTS: [TextPlacement; 7] = [
    TextPlacement::new("Object_212", "Object_213", true, [-2.73, 0.63, -0.52], 1.09)
        .text_at(-5.0, 5.0),
    TextPlacement::new("Object_215", "Object_216", true, [1.84, 0.38, -1.77], -PI / 9.0),
    TextPlacement::new("Object_218", "Object_219", true, [3.11, 2.15, -0.18], -0.79)
        .text_at(-5.0, 1.2)
        .scaled(0.81),
    TextPlacement::new("Object_221", "Object_222", false, [-3.42, 3.06, 1.3], 1.22)
        .text_at(0.0, 5.0)
        .scaled(0.9),
    TextPlacement::new("Object_224", "Object_225", true, [-3.9, 4.29, -2.64], 0.54),
    TextPlacement::new("Object_227", "Object_228", false, [0.96, 4.28, -4.2], -0.65),
    TextPlacement::new("Object_230", "Object_231", false, [4.68, 4.29, -1.56], -PI / 3.0),
];

/// Monitor showing a line of text on a flat background.
#[derive(Debug, Clone)]
pub struct TextScreen {
    pub screen: Screen,
    pub invert: bool,
    pub x: f32,
    pub y: f32,
    pub font: Arc<FontResource>,
}

impl TextScreen {
    pub fn new(placement: &TextPlacement, font: Arc<FontResource>) -> Self {
        Self {
            screen: Screen::new(placement.frame, placement.panel, placement.transform()),
            invert: placement.invert,
            x: placement.x,
            y: placement.y,
            font,
        }
    }

    pub fn style() -> TextStyle {
        TextStyle {
            font_size: 1.0,
            letter_spacing: -0.1,
            ..TextStyle::default()
        }
    }

    pub fn validate(&self, ctx: &InstanceContext<'_>) -> Result<(), SceneError> {
        self.screen.validate(ctx)
    }

    fn content(&self) -> Result<SubScene, SceneError> {
        let (background, ink) = if self.invert {
            (Color::BLACK, Color::parse(TEXT_BACKGROUND)?)
        } else {
            (Color::parse(TEXT_BACKGROUND)?, Color::BLACK)
        };
        let text = self.font.layout(SCREEN_TEXT, &Self::style())?;
        let mut content = SubScene::new(
            PerspectiveCamera::at(Vec3::new(0.0, 0.0, 15.0)).with_aspect(1.0),
            background,
        );
        let graph = &mut content.graph;
        add_light(
            graph,
            Vec3::ZERO,
            Light::Ambient {
                color: Color::WHITE,
                intensity: 0.2,
            },
        )?;
        add_light(
            graph,
            Vec3::new(10.0, 10.0, 5.0),
            Light::Directional {
                color: Color::WHITE,
                intensity: 1.0,
            },
        )?;
        let root = graph.root();
        graph.add(
            root,
            Node::new(NodeKind::Text(TextNode {
                content: SCREEN_TEXT.to_string(),
                geometry: Arc::new(text.mesh),
                color: ink,
            }))
            .named("text")
            .with_transform(Transform::from_position(Vec3::new(self.x, self.y, 0.0))),
        )?;
        Ok(content)
    }

    pub fn compose(
        &self,
        ctx: &InstanceContext<'_>,
        scene: &mut Scene,
        parent: NodeId,
    ) -> Result<ScreenHandle, SceneError> {
        let content = self.content()?;
        self.screen.compose(ctx, scene, parent, content)
    }
}
