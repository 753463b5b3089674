pub mod keyboard;
pub mod window;

pub use keyboard::{KeyCode, KeyCombo, KeyState, Modifiers};
pub use window::{Placement, Rect, WindowRef};
