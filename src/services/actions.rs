//! Именованные действия и их исполнение по событиям жестов.

use crate::config::Config;
use crate::error::Result;
use crate::events::{KeyCombo, Modifiers};
use crate::services::fallback::FallbackChain;
use crate::services::gesture::{GestureEvent, GestureKind, GestureSink};
use crate::services::platform::{KeyInjector, Platform, VolumeDirection};
use crate::services::repeat_scheduler::RepeatTiming;
use crate::services::tiling::{CycleAxis, CycleOutcome, TilingController};
use evdev::KeyCode as Key;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    CycleLeft,
    CycleRight,
    CycleTop,
    CycleBottom,
    MaximizeToggle,
    Refresh,
    PrevTab,
    NextTab,
    BrowserBack,
    BrowserForward,
    ToggleDesktop,
    VolumeUp,
    VolumeDown,
}

impl Action {
    pub const ALL: [Action; 13] = [
        Action::CycleLeft,
        Action::CycleRight,
        Action::CycleTop,
        Action::CycleBottom,
        Action::MaximizeToggle,
        Action::Refresh,
        Action::PrevTab,
        Action::NextTab,
        Action::BrowserBack,
        Action::BrowserForward,
        Action::ToggleDesktop,
        Action::VolumeUp,
        Action::VolumeDown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Action::CycleLeft => "cycle_left",
            Action::CycleRight => "cycle_right",
            Action::CycleTop => "cycle_top",
            Action::CycleBottom => "cycle_bottom",
            Action::MaximizeToggle => "maximize_toggle",
            Action::Refresh => "refresh",
            Action::PrevTab => "prev_tab",
            Action::NextTab => "next_tab",
            Action::BrowserBack => "browser_back",
            Action::BrowserForward => "browser_forward",
            Action::ToggleDesktop => "toggle_desktop",
            Action::VolumeUp => "volume_up",
            Action::VolumeDown => "volume_down",
        }
    }

    pub fn from_name(name: &str) -> Option<Action> {
        Action::ALL.into_iter().find(|action| action.name() == name)
    }

    /// Как действие разбирает нажатия
    pub fn gesture_kind(&self, config: &Config) -> GestureKind {
        match self {
            Action::Refresh => GestureKind::TapHold {
                threshold: config.gesture.hold_threshold(),
            },
            Action::PrevTab | Action::NextTab => {
                GestureKind::Repeat(RepeatTiming::from(config.repeat.tab))
            }
            Action::VolumeUp | Action::VolumeDown => {
                GestureKind::Repeat(RepeatTiming::from(config.repeat.volume))
            }
            _ => GestureKind::Single,
        }
    }

    fn cycle_axis(&self) -> Option<CycleAxis> {
        match self {
            Action::CycleLeft => Some(CycleAxis::Left),
            Action::CycleRight => Some(CycleAxis::Right),
            Action::CycleTop => Some(CycleAxis::Top),
            Action::CycleBottom => Some(CycleAxis::Bottom),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn combo(modifiers: Modifiers, key: Key) -> KeyCombo {
    KeyCombo::new(modifiers, key)
}

/// Исполняет действия; любые ошибки платформы логируются и не выходят наружу
pub struct ActionDispatcher {
    tiling: TilingController,
    keys: Arc<dyn KeyInjector>,
    volume: FallbackChain<VolumeDirection>,
    desktop: FallbackChain<()>,
}

impl ActionDispatcher {
    pub fn new(config: &Config, platform: Platform) -> Self {
        Self {
            tiling: TilingController::new(&config.tiling, platform.windows),
            keys: platform.keys,
            volume: platform.volume,
            desktop: platform.desktop,
        }
    }

    fn perform(&self, action: Action, event: GestureEvent) -> Result<()> {
        let ctrl = Modifiers::new().with_ctrl(true);
        let alt = Modifiers::new().with_alt(true);

        if let (Some(axis), GestureEvent::Fire) = (action.cycle_axis(), event) {
            match self.tiling.cycle(axis)? {
                CycleOutcome::Moved { .. } | CycleOutcome::RestoredFromMaximized(_) => {}
                outcome => debug!("{}: {:?}", action, outcome),
            }
            return Ok(());
        }

        match (action, event) {
            (Action::MaximizeToggle, GestureEvent::Fire) => {
                self.tiling.toggle_maximize()?;
            }
            (Action::Refresh, GestureEvent::Tap) => {
                self.keys.send_combo(&KeyCombo::key(Key::KEY_F5))?;
            }
            (Action::Refresh, GestureEvent::HoldStart) => {
                self.keys.send_combo(&combo(ctrl, Key::KEY_F5))?;
            }
            (Action::PrevTab, GestureEvent::Fire | GestureEvent::HoldTick) => {
                self.keys.send_combo(&combo(ctrl.with_shift(true), Key::KEY_TAB))?;
            }
            (Action::NextTab, GestureEvent::Fire | GestureEvent::HoldTick) => {
                self.keys.send_combo(&combo(ctrl, Key::KEY_TAB))?;
            }
            (Action::BrowserBack, GestureEvent::Fire) => {
                self.keys.send_combo(&combo(alt, Key::KEY_LEFT))?;
            }
            (Action::BrowserForward, GestureEvent::Fire) => {
                self.keys.send_combo(&combo(alt, Key::KEY_RIGHT))?;
            }
            (Action::ToggleDesktop, GestureEvent::Fire) => {
                let backend = self.desktop.run(&())?;
                debug!("Рабочий стол переключён через {}", backend);
            }
            (Action::VolumeUp, GestureEvent::Fire | GestureEvent::HoldTick) => {
                self.volume.run(&VolumeDirection::Up)?;
            }
            (Action::VolumeDown, GestureEvent::Fire | GestureEvent::HoldTick) => {
                self.volume.run(&VolumeDirection::Down)?;
            }
            (action, event) => {
                trace!("{}: событие {:?} без эффекта", action, event);
            }
        }

        Ok(())
    }
}

impl GestureSink for ActionDispatcher {
    fn on_gesture(&self, action: &str, event: GestureEvent) {
        let Some(parsed) = Action::from_name(action) else {
            warn!("Неизвестное действие '{}'", action);
            return;
        };

        debug!("{} <- {:?}", parsed, event);
        if let Err(e) = self.perform(parsed, event) {
            warn!("Действие {} ({:?}) не выполнено: {}", parsed, event, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{KeyCode, KeyState, Rect};
    use crate::services::platform::audio::MediaKeyVolume;
    use crate::services::platform::dry_run::{DryRunInjector, DryRunWindowOps};
    use crate::services::platform::WindowOps;
    use std::time::Duration;

    fn dispatcher() -> (ActionDispatcher, Arc<DryRunWindowOps>, Arc<DryRunInjector>) {
        let config = Config::default();
        let windows = Arc::new(DryRunWindowOps::new(Rect::new(0, 0, 1920, 1040), vec![]));
        windows.open_window("firefox", Rect::new(100, 100, 900, 700));
        let keys = Arc::new(DryRunInjector::new());
        let platform = Platform::new(
            windows.clone(),
            keys.clone(),
            FallbackChain::new("volume").with(MediaKeyVolume::new(keys.clone())),
            FallbackChain::new("desktop"),
        );
        (ActionDispatcher::new(&config, platform), windows, keys)
    }

    fn pressed_keys(keys: &DryRunInjector) -> Vec<KeyCode> {
        keys.events()
            .into_iter()
            .filter(|(_, state)| *state == KeyState::Pressed)
            .map(|(key, _)| key)
            .collect()
    }

    #[test]
    fn test_names_round_trip() {
        for action in Action::ALL {
            assert_eq!(Action::from_name(action.name()), Some(action));
            assert_eq!(action.to_string(), action.name());
        }
        assert_eq!(Action::from_name("open_folder"), None);
    }

    #[test]
    fn test_gesture_kinds_follow_config() {
        let config = Config::default();
        assert_eq!(Action::CycleLeft.gesture_kind(&config), GestureKind::Single);
        assert_eq!(Action::ToggleDesktop.gesture_kind(&config), GestureKind::Single);
        assert_eq!(
            Action::Refresh.gesture_kind(&config),
            GestureKind::TapHold { threshold: Duration::from_millis(400) }
        );
        assert_eq!(
            Action::NextTab.gesture_kind(&config),
            GestureKind::Repeat(RepeatTiming::from_millis(350, 120))
        );
        assert_eq!(
            Action::VolumeDown.gesture_kind(&config),
            GestureKind::Repeat(RepeatTiming::from_millis(350, 30))
        );
    }

    #[test]
    fn test_refresh_tap_and_hold() {
        let (dispatcher, _, keys) = dispatcher();

        dispatcher.on_gesture("refresh", GestureEvent::Tap);
        assert_eq!(pressed_keys(&keys), vec![KeyCode::from(Key::KEY_F5)]);

        dispatcher.on_gesture("refresh", GestureEvent::HoldStart);
        dispatcher.on_gesture("refresh", GestureEvent::HoldEnd);
        assert_eq!(
            pressed_keys(&keys),
            vec![
                KeyCode::from(Key::KEY_F5),
                KeyCode::from(Key::KEY_LEFTCTRL),
                KeyCode::from(Key::KEY_F5),
            ]
        );
    }

    #[test]
    fn test_tab_navigation_combos() {
        let (dispatcher, _, keys) = dispatcher();

        dispatcher.on_gesture("prev_tab", GestureEvent::Fire);
        assert_eq!(
            pressed_keys(&keys),
            vec![
                KeyCode::from(Key::KEY_LEFTCTRL),
                KeyCode::from(Key::KEY_LEFTSHIFT),
                KeyCode::from(Key::KEY_TAB),
            ]
        );

        // Завершение удержания ничего не отправляет
        dispatcher.on_gesture("prev_tab", GestureEvent::HoldEnd);
        assert_eq!(pressed_keys(&keys).len(), 3);
    }

    #[test]
    fn test_cycle_and_maximize_use_active_window() {
        let (dispatcher, windows, _) = dispatcher();
        let window = windows.active_window().unwrap().unwrap();

        dispatcher.on_gesture("cycle_right", GestureEvent::Fire);
        assert_eq!(windows.rect_of(window), Some(Rect::new(952, 0, 1920, 1040)));

        dispatcher.on_gesture("maximize_toggle", GestureEvent::Fire);
        assert_eq!(windows.placement_of(window), Some(crate::events::Placement::Maximized));
    }

    #[test]
    fn test_failures_are_swallowed() {
        let (dispatcher, windows, keys) = dispatcher();

        // Пустая цепочка рабочего стола: ошибка логируется, паники нет
        dispatcher.on_gesture("toggle_desktop", GestureEvent::Fire);
        windows.activate(None);
        dispatcher.on_gesture("cycle_left", GestureEvent::Fire);
        dispatcher.on_gesture("no_such_action", GestureEvent::Fire);

        dispatcher.on_gesture("volume_up", GestureEvent::HoldTick);
        assert_eq!(pressed_keys(&keys), vec![KeyCode::from(Key::KEY_VOLUMEUP)]);
    }
}
