use crate::draw::FramePlan;
use oldcomputers_scene::{LedField, NodeKind, Scene, led_level};
use serde::Serialize;

/// Counts describing a composed scene, for overlays and `--json` output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SceneSummary {
    pub nodes: usize,
    pub meshes: usize,
    pub instances: usize,
    pub texts: usize,
    pub lights: usize,
    pub render_targets: usize,
    pub frame_callbacks: usize,
    /// Instanced draws per frame across all passes.
    pub draw_calls: usize,
    pub targets: Vec<TargetSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetSummary {
    pub id: usize,
    pub width: u32,
    pub height: u32,
    pub anisotropy: u16,
    pub nodes: usize,
}

impl SceneSummary {
    pub fn of(scene: &Scene) -> Self {
        let graph = scene.graph();
        let plan = FramePlan::build(scene);
        Self {
            nodes: graph.len(),
            meshes: graph.count(|n| matches!(n.kind, NodeKind::Mesh(_))),
            instances: graph.count(|n| matches!(n.kind, NodeKind::Instance(_))),
            texts: graph.count(|n| matches!(n.kind, NodeKind::Text(_))),
            lights: graph.count(|n| matches!(n.kind, NodeKind::Light(_))),
            render_targets: scene.render_texture_count(),
            frame_callbacks: scene.callback_count(),
            draw_calls: plan.draw_calls(),
            targets: scene
                .render_textures()
                .map(|(id, rt)| TargetSummary {
                    id: id.index(),
                    width: rt.width,
                    height: rt.height,
                    anisotropy: rt.anisotropy,
                    nodes: rt.content.graph.len(),
                })
                .collect(),
        }
    }
}

/// Current state of one LED.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedState {
    pub index: usize,
    pub position: [f64; 3],
    pub on: bool,
    pub color: [f32; 3],
}

impl LedState {
    /// Read the LED colors as they stand in `scene`.
    pub fn collect(scene: &Scene, field: &LedField) -> Vec<Self> {
        field
            .leds
            .iter()
            .enumerate()
            .filter_map(|(index, (id, position))| {
                let NodeKind::Instance(led) = &scene.graph().get(*id)?.kind else {
                    return None;
                };
                Some(Self {
                    index,
                    position: position.to_array(),
                    on: led.color.b > 0.0,
                    color: led.color.to_array(),
                })
            })
            .collect()
    }

    /// LED states at `elapsed` seconds, computed without a scene.
    pub fn at(field: &LedField, elapsed: f64) -> Vec<Self> {
        field
            .leds
            .iter()
            .enumerate()
            .map(|(index, (_, position))| {
                let t = led_level(*position, elapsed);
                Self {
                    index,
                    position: position.to_array(),
                    on: t > 0.0,
                    color: [0.0, (1.1 * t) as f32, t as f32],
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oldcomputers_assets::fixture;
    use oldcomputers_scene::{FrameState, InstanceProvider, SingleComputer};
    use std::sync::Arc;

    #[test]
    fn summary_counts_the_composition() {
        let asset = Arc::new(fixture::computers_scene().unwrap());
        let instances = InstanceProvider::new().instances(&asset).unwrap();
        let mut scene = Scene::new();
        let root = scene.graph().root();
        instances
            .provide(|ctx| SingleComputer::default().compose(ctx, &mut scene, root))
            .unwrap();
        let summary = SceneSummary::of(&scene);
        assert_eq!(summary.instances, 10);
        assert_eq!(summary.meshes, 2);
        assert_eq!(summary.render_targets, 1);
        assert_eq!(summary.frame_callbacks, 2);
        assert_eq!(summary.targets[0].width, 512);
        // frame, panel, LEDs and the spinning box
        assert_eq!(summary.draw_calls, 4);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["render_targets"], 1);
    }

    #[test]
    fn collected_states_match_computed_ones() {
        let asset = Arc::new(fixture::computers_scene().unwrap());
        let instances = InstanceProvider::new().instances(&asset).unwrap();
        let mut scene = Scene::new();
        let root = scene.graph().root();
        let handle = instances
            .provide(|ctx| SingleComputer::default().compose(ctx, &mut scene, root))
            .unwrap();
        scene.advance(&FrameState {
            elapsed: 7.5,
            delta: 0.016,
            frame: 1,
        });
        assert_eq!(
            LedState::collect(&scene, &handle.leds),
            LedState::at(&handle.leds, 7.5)
        );
    }
}
