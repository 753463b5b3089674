use crate::config::Config;
use crate::error::Result;
use crate::services::engine::HotkeyEngine;
use crate::services::platform::KeyInjector;
use std::sync::Arc;

/// Источник событий клавиатуры для HotkeyEngine
#[async_trait::async_trait]
pub trait KeyboardListenerTrait {
    /// Читает события до ошибки устройства или конца ввода
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Фабрика: evdev в обычном режиме, строки stdin в сухом
pub fn create_keyboard_listener(
    config: Arc<Config>,
    engine: Arc<HotkeyEngine>,
    passthrough: Arc<dyn KeyInjector>,
    dry_run: bool,
) -> Result<Box<dyn KeyboardListenerTrait + Send>> {
    if dry_run {
        Ok(Box::new(super::dry_keyboard_listener::DryRunKeyboardListener::new(
            config, engine,
        )))
    } else {
        Ok(Box::new(super::keyboard_listener::RealKeyboardListener::new(
            config,
            engine,
            passthrough,
        )?))
    }
}
