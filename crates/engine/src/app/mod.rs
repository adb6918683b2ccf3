mod game;
mod input;
mod loop_runner;
mod metrics;
mod rendering;

pub use game::{FrameView, Game, GameCommand};
pub use input::{InputAction, InputSnapshot};
pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig, SLOW_FRAME_ENV_VAR};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use rendering::{Renderer, SCREEN_HEIGHT_PX, SCREEN_WIDTH_PX};
