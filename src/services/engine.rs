use crate::config::Config;
use crate::services::actions::{Action, ActionDispatcher};
use crate::services::gesture::GestureTracker;
use crate::services::platform::Platform;
use crate::services::repeat_scheduler::RepeatScheduler;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};

/// Точка входа для источника событий клавиатуры.
///
/// `on_press`/`on_release` можно вызывать из любого потока; они не ждут ничего,
/// кроме завершения уже идущего тика повтора при отпускании.
pub struct HotkeyEngine {
    tracker: GestureTracker,
}

impl HotkeyEngine {
    pub fn new(config: &Config, platform: Platform, runtime: Handle) -> Self {
        let dispatcher = Arc::new(ActionDispatcher::new(config, platform));
        let tracker = GestureTracker::new(
            RepeatScheduler::new(runtime),
            dispatcher,
            config.gesture.max_hold(),
        );

        let bound = config.bound_actions();
        for action in Action::ALL {
            tracker.register(action.name(), action.gesture_kind(config));
            if !bound.contains(&action) {
                debug!("Действие {} ни к чему не привязано", action);
            }
        }

        info!(
            "HotkeyEngine готов: {} действий, {} привязок",
            Action::ALL.len(),
            config.bindings.len()
        );

        Self { tracker }
    }

    pub fn on_press(&self, action: &str) {
        self.tracker.press(action);
    }

    pub fn on_release(&self, action: &str) {
        self.tracker.release(action);
    }

    pub fn active_gestures(&self) -> usize {
        self.tracker.active_count()
    }

    /// Останавливает все таймеры удержания без генерации событий
    pub fn shutdown(&self) {
        info!("Остановка HotkeyEngine, активных жестов: {}", self.tracker.active_count());
        self.tracker.clear();
    }
}
