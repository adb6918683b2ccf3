use crate::world::{TickReport, WindowOverlay, WorldSession};

use super::InputSnapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameCommand {
    /// The world advanced one tick.
    Continue(TickReport),
    Quit,
}

/// What the renderer needs to draw one frame.
#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    pub session: &'a WorldSession,
    pub windows: &'a dyn WindowOverlay,
}

/// Gameplay driven by the frame loop. `update` runs once per fixed tick and
/// advances the world session exactly once unless it quits.
pub trait Game {
    fn load(&mut self) {}
    fn update(&mut self, input: &InputSnapshot) -> GameCommand;
    fn frame(&self) -> FrameView<'_>;
    fn debug_title(&self) -> Option<String> {
        None
    }
    fn shutdown(&mut self) {}
}
