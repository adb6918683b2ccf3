mod renderer;

pub use renderer::{Renderer, SCREEN_HEIGHT_PX, SCREEN_WIDTH_PX};
