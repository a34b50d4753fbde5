// Drawing helpers for the 320x240 TFT: the display capability trait,
// region geometry and no-alloc text formatting.

mod screen;
pub mod stack_fmt;
mod widget;

pub use screen::Screen;
pub use stack_fmt::{StackFmt, stack_fmt};
pub use widget::{Region, wrap_next, wrap_prev};
