pub mod actions;
pub mod engine;
pub mod fallback;
pub mod gesture;
pub mod keyboard_listener;
pub mod platform;
pub mod repeat_scheduler;
pub mod tiling;
pub mod virtual_device;

pub use engine::HotkeyEngine;
pub use keyboard_listener::create_keyboard_listener;
pub use platform::create_platform;
