use crate::graph::{Node, NodeId};
use crate::instances::InstanceContext;
use crate::leds::{LED_TEMPLATE, LedField};
use crate::scene::Scene;
use crate::screen::{InteractiveScreen, ScreenHandle, TEXT_PLACEMENTS, TextScreen};
use crate::spinning_box::BoxInteraction;
use crate::SceneError;
use glam::Vec3;
use oldcomputers_assets::FontResource;
use oldcomputers_common::Transform;
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

pub const INTERACTIVE_FRAME: &str = "Object_206";
pub const INTERACTIVE_PANEL: &str = "Object_207";
pub const INTERACTIVE_POSITION: Vec3 = Vec3::new(0.27, 1.53, -2.61);

/// The computers group: one interactive monitor and the LED field, placed
/// by the caller. Text monitors are opt-in.
#[derive(Debug, Clone)]
pub struct SingleComputer {
    pub transform: Transform,
    pub screen: InteractiveScreen,
    pub text_screens: Vec<TextScreen>,
}

/// Everything [`SingleComputer::compose`] added to the scene.
#[derive(Debug, Clone)]
pub struct ComputerHandle {
    pub group: NodeId,
    pub screen: ScreenHandle,
    pub text_screens: Vec<ScreenHandle>,
    pub leds: LedField,
    /// Pointer state of the interactive monitor's spinning box.
    pub interaction: Rc<Cell<BoxInteraction>>,
}

impl SingleComputer {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            screen: InteractiveScreen::new(
                INTERACTIVE_FRAME,
                INTERACTIVE_PANEL,
                Transform::from_position(INTERACTIVE_POSITION),
            ),
            text_screens: Vec::new(),
        }
    }

    /// Also compose every text monitor, setting their text in `font`.
    pub fn with_text_screens(mut self, font: Arc<FontResource>) -> Self {
        self.text_screens = TEXT_PLACEMENTS
            .iter()
            .map(|placement| TextScreen::new(placement, font.clone()))
            .collect();
        self
    }

    /// Check every lookup the composition will make.
    pub fn validate(&self, ctx: &InstanceContext<'_>) -> Result<(), SceneError> {
        self.screen.validate(ctx)?;
        for text in &self.text_screens {
            text.validate(ctx)?;
        }
        ctx.template(LED_TEMPLATE)?;
        Ok(())
    }

    /// Add the computers group under `parent`. On error nothing is added.
    pub fn compose(
        &self,
        ctx: &InstanceContext<'_>,
        scene: &mut Scene,
        parent: NodeId,
    ) -> Result<ComputerHandle, SceneError> {
        self.validate(ctx)?;
        let handle = scene.transaction(|scene| {
            let group = scene.graph_mut().add(
                parent,
                Node::group()
                    .named("computers")
                    .with_transform(self.transform),
            )?;
            let screen = self.screen.compose(ctx, scene, group)?;
            let text_screens = self
                .text_screens
                .iter()
                .map(|text| text.compose(ctx, scene, group))
                .collect::<Result<Vec<_>, _>>()?;
            let leds = LedField::compose(ctx, scene, group)?;
            Ok(ComputerHandle {
                group,
                screen,
                text_screens,
                leds,
                interaction: self.screen.spinner.interaction(),
            })
        })?;
        tracing::info!(
            "composed computers: {} screen(s), {} LEDs",
            1 + handle.text_screens.len(),
            handle.leds.len()
        );
        Ok(handle)
    }
}

impl Default for SingleComputer {
    fn default() -> Self {
        Self::new(Transform::default())
    }
}
