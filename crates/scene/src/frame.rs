use crate::scene::Scene;

/// Timing of one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameState {
    /// Seconds since the clock started. Kept in f64 so long sessions do
    /// not lose precision in time-based animation.
    pub elapsed: f64,
    /// Seconds since the previous frame.
    pub delta: f32,
    pub frame: u64,
}

/// Accumulates frame deltas into elapsed time.
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    elapsed: f64,
    frame: u64,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `delta` seconds. Negative deltas are treated as zero.
    pub fn tick(&mut self, delta: f32) -> FrameState {
        let delta = delta.max(0.0);
        self.elapsed += f64::from(delta);
        self.frame += 1;
        FrameState {
            elapsed: self.elapsed,
            delta,
            frame: self.frame,
        }
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Work run once per rendered frame, before drawing.
///
/// Callbacks run in registration order on the render thread and may mutate
/// the scene they are registered on.
pub trait FrameCallback {
    fn on_frame(&mut self, frame: &FrameState, scene: &mut Scene);
}

impl<F> FrameCallback for F
where
    F: FnMut(&FrameState, &mut Scene),
{
    fn on_frame(&mut self, frame: &FrameState, scene: &mut Scene) {
        self(frame, scene)
    }
}
