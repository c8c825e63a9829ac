use crate::computer::{ComputerHandle, SingleComputer};
use crate::graph::{Light, NodeId};
use crate::instances::Instances;
use crate::scene::Scene;
use crate::screen::add_light;
use crate::SceneError;
use glam::Vec3;
use oldcomputers_common::{Color, Transform};

/// Where hosts place the computers group.
pub const COMPUTERS_POSITION: Vec3 = Vec3::new(0.0, -0.5, 0.0);
pub const COMPUTERS_SCALE: f32 = 0.5;

/// The scene a host puts around the computers: a dark background, a dim
/// ambient fill and one key light.
#[derive(Debug, Clone)]
pub struct Stage {
    pub background: Color,
    pub ambient: f32,
    pub key_light: Vec3,
    pub key_intensity: f32,
    pub computers: SingleComputer,
}

#[derive(Debug, Clone)]
pub struct StageHandle {
    pub lights: Vec<NodeId>,
    pub computers: ComputerHandle,
}

impl Default for Stage {
    fn default() -> Self {
        Self {
            background: Color::BLACK,
            ambient: 0.15,
            key_light: Vec3::new(10.0, 20.0, 10.0),
            key_intensity: 1.0,
            computers: SingleComputer::new(
                Transform::from_position(COMPUTERS_POSITION).with_uniform_scale(COMPUTERS_SCALE),
            ),
        }
    }
}

impl Stage {
    pub fn with_computers(mut self, computers: SingleComputer) -> Self {
        self.computers = computers;
        self
    }

    /// Compose lights and computers into the main graph of `scene`.
    pub fn compose(
        &self,
        instances: &Instances,
        scene: &mut Scene,
    ) -> Result<StageHandle, SceneError> {
        instances.provide(|ctx| {
            self.computers.validate(ctx)?;
            scene.transaction(|scene| {
                let graph = scene.graph_mut();
                let lights = vec![
                    add_light(
                        graph,
                        Vec3::ZERO,
                        Light::Ambient {
                            color: Color::WHITE,
                            intensity: self.ambient,
                        },
                    )?,
                    add_light(
                        graph,
                        self.key_light,
                        Light::Directional {
                            color: Color::WHITE,
                            intensity: self.key_intensity,
                        },
                    )?,
                ];
                let root = scene.graph().root();
                let computers = self.computers.compose(ctx, scene, root)?;
                Ok(StageHandle { lights, computers })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;
    use crate::instances::InstanceProvider;
    use oldcomputers_assets::fixture;
    use std::sync::Arc;

    #[test]
    fn stage_adds_lights_and_computers() {
        let asset = Arc::new(fixture::computers_scene().unwrap());
        let instances = InstanceProvider::new().instances(&asset).unwrap();
        let mut scene = Scene::new();
        let handle = Stage::default().compose(&instances, &mut scene).unwrap();

        assert_eq!(handle.lights.len(), 2);
        assert_eq!(
            scene
                .graph()
                .count(|n| matches!(n.kind, NodeKind::Light(_))),
            2
        );
        let group = scene.graph().get(handle.computers.group).unwrap();
        assert_eq!(group.transform.scale, Vec3::splat(COMPUTERS_SCALE));
        assert_eq!(group.parent(), Some(scene.graph().root()));
    }

    #[test]
    fn failed_stage_adds_nothing() {
        let asset = Arc::new(fixture::computers_scene().unwrap());
        let instances = InstanceProvider::new().instances(&asset).unwrap();
        let mut computers = SingleComputer::default();
        computers.screen.screen.frame = "Object_000".into();
        let mut scene = Scene::new();
        let result = Stage::default()
            .with_computers(computers)
            .compose(&instances, &mut scene);
        assert!(result.is_err());
        assert_eq!(scene.graph().len(), 1);
        assert_eq!(scene.callback_count(), 0);
    }
}
