//! Flickering status LEDs.
//!
//! Each LED is an unlit copy of the `Sphere` template. Once per frame its
//! color is recomputed from its position and the elapsed time, giving a hard
//! on/off flicker that differs per LED.

use crate::frame::{FrameCallback, FrameState};
use crate::graph::{Node, NodeId, NodeKind};
use crate::instances::InstanceContext;
use crate::scene::Scene;
use crate::SceneError;
use glam::DVec3;
use oldcomputers_common::{Color, Transform};

pub const LED_TEMPLATE: &str = "Sphere";

/// LED positions relative to the LED group.
pub const LED_POSITIONS: [DVec3; 10] = [
    DVec3::new(-0.41, 1.1, -2.21),
    DVec3::new(0.59, 1.32, -2.22),
    DVec3::new(1.77, 1.91, -1.17),
    DVec3::new(2.44, 1.1, -0.79),
    DVec3::new(4.87, 3.8, -0.1),
    DVec3::new(1.93, 3.8, -3.69),
    DVec3::new(-2.35, 3.8, -3.48),
    DVec3::new(-4.71, 4.59, -1.81),
    DVec3::new(-3.03, 2.85, 1.19),
    DVec3::new(-1.21, 1.73, -1.49),
];

pub const LED_SCALE: f32 = 0.005;

/// Color before the first frame runs. Deliberately above 1: the LED
/// material is not tone mapped.
pub const LED_INITIAL_COLOR: Color = Color::rgb(1.0, 2.0, 1.0);

/// Per-LED seed derived from its x coordinate. Never negative.
pub fn led_seed(position: DVec3) -> f64 {
    (2.0 + position.x).abs()
}

/// Brightness of the LED at `position` after `elapsed` seconds: exactly 0
/// or 1.
pub fn led_level(position: DVec3, elapsed: f64) -> f64 {
    let seed = led_seed(position);
    ((1.0 + (seed * 10000.0 + elapsed * seed).sin()) / 2.0).round()
}

pub fn led_color(position: DVec3, elapsed: f64) -> Color {
    let t = led_level(position, elapsed);
    Color::rgb(0.0, (1.1 * t) as f32, t as f32)
}

/// The composed LEDs: their group and, per LED, the node and fixed position.
#[derive(Debug, Clone)]
pub struct LedField {
    pub group: NodeId,
    pub leds: Vec<(NodeId, DVec3)>,
}

impl LedField {
    /// Add the LED group under `parent` and register its animator.
    pub fn compose(
        ctx: &InstanceContext<'_>,
        scene: &mut Scene,
        parent: NodeId,
    ) -> Result<Self, SceneError> {
        ctx.template(LED_TEMPLATE)?;
        let group = scene
            .graph_mut()
            .add(parent, Node::group().named("leds"))?;
        let mut leds = Vec::with_capacity(LED_POSITIONS.len());
        for (i, position) in LED_POSITIONS.iter().enumerate() {
            let transform =
                Transform::from_position(position.as_vec3()).with_uniform_scale(LED_SCALE);
            let mut node = ctx
                .instance(LED_TEMPLATE, transform, LED_INITIAL_COLOR)?
                .named(format!("led_{i}"));
            if let NodeKind::Instance(instance) = &mut node.kind {
                instance.unlit = true;
            }
            let id = scene.graph_mut().add(group, node)?;
            leds.push((id, *position));
        }
        let field = Self { group, leds };
        scene.use_frame(LedAnimator::new(&field));
        tracing::debug!("composed {} LEDs", field.leds.len());
        Ok(field)
    }

    pub fn len(&self) -> usize {
        self.leds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leds.is_empty()
    }
}

/// Frame callback recoloring every LED of one field.
#[derive(Debug, Clone)]
pub struct LedAnimator {
    leds: Vec<(NodeId, DVec3)>,
}

impl LedAnimator {
    pub fn new(field: &LedField) -> Self {
        Self {
            leds: field.leds.clone(),
        }
    }
}

impl FrameCallback for LedAnimator {
    fn on_frame(&mut self, frame: &FrameState, scene: &mut Scene) {
        for (id, position) in &self.leds {
            if let Some(NodeKind::Instance(instance)) =
                scene.graph_mut().get_mut(*id).map(|n| &mut n.kind)
            {
                instance.color = led_color(*position, frame.elapsed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instances::InstanceProvider;
    use oldcomputers_assets::fixture;
    use std::sync::Arc;

    const TIMES: [f64; 7] = [0.0, 0.016, 0.5, 1.0, 3.7, 60.0, 86_400.25];

    #[test]
    fn color_is_off_or_cyan() {
        for p in LED_POSITIONS {
            for t in TIMES {
                let c = led_color(p, t);
                assert_eq!(c.r, 0.0);
                assert!(c.b == 0.0 || c.b == 1.0, "b = {}", c.b);
                assert!(c.g == 0.0 || c.g == 1.1_f32, "g = {}", c.g);
                assert_eq!(c.g, 1.1 * c.b);
            }
        }
    }

    #[test]
    fn seed_is_never_negative() {
        for x in [-1e9, -2.0, -4.71, 0.0, 3.5, f64::MAX / 2.0] {
            assert!(led_seed(DVec3::new(x, 0.0, 0.0)) >= 0.0);
        }
    }

    #[test]
    fn level_at_time_zero_depends_on_seed_only() {
        for p in LED_POSITIONS {
            let seed = led_seed(p);
            let expected = ((1.0 + (seed * 10000.0).sin()) / 2.0).round();
            assert_eq!(led_level(p, 0.0), expected);
        }
    }

    #[test]
    fn flicker_is_deterministic() {
        for p in LED_POSITIONS {
            assert_eq!(led_color(p, 12.5), led_color(p, 12.5));
        }
    }

    #[test]
    fn leds_flicker_over_time() {
        // Over a few seconds every LED is seen both on and off.
        for p in LED_POSITIONS {
            let levels: Vec<f64> = (0..600).map(|i| led_level(p, i as f64 * 0.05)).collect();
            assert!(levels.contains(&0.0) && levels.contains(&1.0), "{p:?}");
        }
    }

    #[test]
    fn compose_places_ten_unlit_leds() {
        let asset = Arc::new(fixture::computers_scene().unwrap());
        let instances = InstanceProvider::new().instances(&asset).unwrap();
        let mut scene = Scene::new();
        let root = scene.graph().root();
        let field = instances
            .provide(|ctx| LedField::compose(ctx, &mut scene, root))
            .unwrap();
        assert_eq!(field.len(), 10);
        assert_eq!(scene.callback_count(), 1);
        for (id, position) in &field.leds {
            let node = scene.graph().get(*id).unwrap();
            assert_eq!(node.transform.position, position.as_vec3());
            assert_eq!(node.transform.scale.x, LED_SCALE);
            let NodeKind::Instance(led) = &node.kind else {
                panic!("LED is not an instance");
            };
            assert!(led.unlit);
            assert_eq!(led.color, LED_INITIAL_COLOR);
            assert_eq!(led.template.name, LED_TEMPLATE);
        }
    }

    #[test]
    fn animator_recolors_from_position_and_time() {
        let asset = Arc::new(fixture::computers_scene().unwrap());
        let instances = InstanceProvider::new().instances(&asset).unwrap();
        let mut scene = Scene::new();
        let root = scene.graph().root();
        let field = instances
            .provide(|ctx| LedField::compose(ctx, &mut scene, root))
            .unwrap();
        let frame = FrameState {
            elapsed: 2.0,
            delta: 0.016,
            frame: 120,
        };
        scene.advance(&frame);
        for (id, position) in &field.leds {
            let NodeKind::Instance(led) = &scene.graph().get(*id).unwrap().kind else {
                panic!("LED is not an instance");
            };
            assert_eq!(led.color, led_color(*position, 2.0));
        }
    }
}
