use glam::{Mat4, Vec3};
use oldcomputers_scene::{Light, Material, NodeId, NodeKind, Scene, SceneGraph};
use std::fmt::Write as _;

/// Camera/view configuration for the main pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    /// Camera position in world space.
    pub eye: Vec3,
    /// Point the camera is looking at.
    pub target: Vec3,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub aspect: f32,
}

impl Default for RenderView {
    fn default() -> Self {
        Self {
            eye: Vec3::new(-1.5, 1.0, 5.5),
            target: Vec3::ZERO,
            fov_degrees: 45.0,
            aspect: 16.0 / 9.0,
        }
    }
}

impl RenderView {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, 0.1, 100.0)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Renderer-agnostic interface.
///
/// A renderer reads the scene and a view and produces output. It never
/// mutates the scene: animation happens in frame callbacks before drawing.
pub trait Renderer {
    type Output;

    fn render(&self, scene: &Scene, view: &RenderView) -> Self::Output;
}

/// Writes the scene as an indented tree, offscreen sub-scenes included.
#[derive(Debug, Default)]
pub struct DebugTextRenderer;

impl DebugTextRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for DebugTextRenderer {
    type Output = String;

    fn render(&self, scene: &Scene, view: &RenderView) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Scene ({} nodes, {} render targets, {} frame callbacks) ===",
            scene.graph().len(),
            scene.render_texture_count(),
            scene.callback_count()
        );
        let _ = writeln!(
            out,
            "Camera: eye=({:.1}, {:.1}, {:.1}) target=({:.1}, {:.1}, {:.1}) fov={:.0}",
            view.eye.x,
            view.eye.y,
            view.eye.z,
            view.target.x,
            view.target.y,
            view.target.z,
            view.fov_degrees
        );
        write_tree(&mut out, scene.graph(), scene.graph().root(), 0);

        for (id, target) in scene.render_textures() {
            let content = &target.content;
            let c = content.background;
            let p = content.camera.position;
            let _ = writeln!(
                out,
                "--- render target #{} {}x{} aniso={} background=({:.3}, {:.3}, {:.3}) camera=({:.1}, {:.1}, {:.1}) ---",
                id.index(),
                target.width,
                target.height,
                target.anisotropy,
                c.r,
                c.g,
                c.b,
                p.x,
                p.y,
                p.z
            );
            write_tree(&mut out, &content.graph, content.graph.root(), 0);
        }
        out
    }
}

fn write_tree(out: &mut String, graph: &SceneGraph, id: NodeId, depth: usize) {
    let Some(node) = graph.get(id) else {
        return;
    };
    let p = node.transform.position;
    let name = node.name.as_deref().unwrap_or("-");
    let _ = write!(
        out,
        "{:indent$}{} [{}] pos=({:.2}, {:.2}, {:.2})",
        "",
        name,
        node.kind.label(),
        p.x,
        p.y,
        p.z,
        indent = depth * 2
    );
    if node.transform.scale != Vec3::ONE {
        let s = node.transform.scale;
        let _ = write!(out, " scale=({:.3}, {:.3}, {:.3})", s.x, s.y, s.z);
    }
    match &node.kind {
        NodeKind::Mesh(mesh) => {
            let material = match &mesh.material {
                Material::Standard { source: Some(m), .. } => format!("standard {}", m.name),
                Material::Standard { .. } => "standard".to_string(),
                Material::Basic { map: Some(_), .. } => "basic textured".to_string(),
                Material::Basic { .. } => "basic".to_string(),
            };
            let _ = write!(out, " tris={} material={material}", mesh.geometry.triangle_count());
        }
        NodeKind::Instance(instance) => {
            let c = instance.color;
            let _ = write!(
                out,
                " template={} color=({:.2}, {:.2}, {:.2})",
                instance.template.name, c.r, c.g, c.b
            );
        }
        NodeKind::Text(text) => {
            let _ = write!(out, " text={:?}", text.content);
        }
        NodeKind::Light(light) => {
            let (kind, intensity) = match light {
                Light::Ambient { intensity, .. } => ("ambient", intensity),
                Light::Point { intensity, .. } => ("point", intensity),
                Light::Directional { intensity, .. } => ("directional", intensity),
            };
            let _ = write!(out, " {kind} intensity={intensity}");
        }
        NodeKind::Group => {}
    }
    if !node.visible {
        out.push_str(" hidden");
    }
    out.push('\n');
    for child in node.children() {
        write_tree(out, graph, *child, depth + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oldcomputers_assets::fixture;
    use oldcomputers_scene::{InstanceProvider, SingleComputer};
    use std::sync::Arc;

    #[test]
    fn empty_scene_renders_root_only() {
        let output = DebugTextRenderer::new().render(&Scene::new(), &RenderView::default());
        assert!(output.contains("1 nodes, 0 render targets"));
        assert!(output.contains("root [group]"));
    }

    #[test]
    fn composed_scene_lists_targets_and_leds() {
        let asset = Arc::new(fixture::computers_scene().unwrap());
        let instances = InstanceProvider::new().instances(&asset).unwrap();
        let mut scene = Scene::new();
        let root = scene.graph().root();
        instances
            .provide(|ctx| SingleComputer::default().compose(ctx, &mut scene, root))
            .unwrap();
        let output = DebugTextRenderer::new().render(&scene, &RenderView::default());
        assert!(output.contains("render target #0 512x512 aniso=16"));
        assert!(output.contains("led_9 [instance]"));
        assert!(output.contains("template=Sphere"));
        assert!(output.contains("spinning_box [group]"));
        assert!(output.contains("material=standard Texture"));
    }

    #[test]
    fn render_view_default() {
        let view = RenderView::default();
        assert_eq!(view.target, Vec3::ZERO);
        assert!(!view.view_projection().col(0).x.is_nan());
    }
}
