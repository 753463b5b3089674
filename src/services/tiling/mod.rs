mod cycle;
pub mod geometry;

pub use cycle::{CycleOutcome, DebounceClock, TilingController};
pub use geometry::{rects_close, target_rect, CycleAxis};
