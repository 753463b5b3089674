//! Реализации платформы в памяти для сухого режима и тестов.

use super::{KeyInjector, WindowOps};
use crate::ahk_error;
use crate::error::Result;
use crate::events::{KeyCode, KeyState, Placement, Rect, WindowRef};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone)]
struct SimWindow {
    class: String,
    rect: Rect,
    placement: Placement,
    // Геометрия до разворачивания
    restore: Rect,
}

#[derive(Debug, Default)]
struct SimState {
    windows: HashMap<WindowRef, SimWindow>,
    active: Option<WindowRef>,
    next_id: u64,
}

/// Симулированный рабочий стол: один монитор, окна с классом и геометрией
pub struct DryRunWindowOps {
    work_area: Rect,
    restricted_classes: Vec<String>,
    state: Mutex<SimState>,
}

impl DryRunWindowOps {
    pub fn new(work_area: Rect, restricted_classes: Vec<String>) -> Self {
        Self {
            work_area,
            restricted_classes,
            state: Mutex::new(SimState {
                next_id: 0x0400_0001,
                ..SimState::default()
            }),
        }
    }

    /// Монитор 1920x1080 с панелью 40px снизу и одним активным окном
    pub fn simulated() -> Self {
        let ops = Self::new(
            Rect::new(0, 0, 1920, 1040),
            vec!["plasmashell".to_string()],
        );
        ops.open_window("simulated", Rect::new(320, 180, 1600, 900));
        ops
    }

    /// Создаёт окно и делает его активным
    pub fn open_window(&self, class: &str, rect: Rect) -> WindowRef {
        let mut state = self.state.lock();
        let window = WindowRef(state.next_id);
        state.next_id += 1;
        state.windows.insert(
            window,
            SimWindow {
                class: class.to_string(),
                rect,
                placement: Placement::Normal,
                restore: rect,
            },
        );
        state.active = Some(window);
        window
    }

    pub fn activate(&self, window: Option<WindowRef>) {
        self.state.lock().active = window;
    }

    pub fn rect_of(&self, window: WindowRef) -> Option<Rect> {
        self.state.lock().windows.get(&window).map(|w| w.rect)
    }

    pub fn placement_of(&self, window: WindowRef) -> Option<Placement> {
        self.state.lock().windows.get(&window).map(|w| w.placement)
    }

    fn with_window<T>(&self, window: WindowRef, f: impl FnOnce(&mut SimWindow) -> T) -> Result<T> {
        let mut state = self.state.lock();
        state
            .windows
            .get_mut(&window)
            .map(f)
            .ok_or_else(|| ahk_error!(internal, "окно {} не существует", window))
    }
}

impl WindowOps for DryRunWindowOps {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn active_window(&self) -> Result<Option<WindowRef>> {
        Ok(self.state.lock().active)
    }

    fn geometry(&self, window: WindowRef) -> Result<Rect> {
        self.with_window(window, |w| w.rect)
    }

    fn set_geometry(&self, window: WindowRef, rect: Rect) -> Result<()> {
        info!("[DRY RUN] Окно {} -> {}", window, rect);
        self.with_window(window, |w| w.rect = rect)
    }

    fn placement(&self, window: WindowRef) -> Result<Placement> {
        self.with_window(window, |w| w.placement)
    }

    fn set_placement(&self, window: WindowRef, placement: Placement) -> Result<()> {
        info!("[DRY RUN] Окно {} -> {:?}", window, placement);
        let work_area = self.work_area;
        self.with_window(window, |w| {
            match (w.placement, placement) {
                (Placement::Normal, Placement::Maximized) => {
                    w.restore = w.rect;
                    w.rect = work_area;
                }
                (Placement::Maximized, Placement::Normal) => w.rect = w.restore,
                _ => {}
            }
            w.placement = placement;
        })
    }

    fn work_area(&self, _window: WindowRef) -> Result<Rect> {
        Ok(self.work_area)
    }

    fn is_restricted(&self, window: WindowRef) -> Result<bool> {
        let restricted = &self.restricted_classes;
        self.with_window(window, |w| restricted.contains(&w.class))
    }
}

/// Записывает синтетические нажатия вместо отправки в uinput
#[derive(Default)]
pub struct DryRunInjector {
    events: Mutex<Vec<(KeyCode, KeyState)>>,
}

impl DryRunInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(KeyCode, KeyState)> {
        self.events.lock().clone()
    }
}

impl KeyInjector for DryRunInjector {
    fn send_key(&self, key: KeyCode, state: KeyState) -> Result<()> {
        info!("[DRY RUN] Клавиша {} {:?}", key, state);
        self.events.lock().push((key, state));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maximize_and_restore() {
        let ops = DryRunWindowOps::new(Rect::new(0, 0, 1920, 1040), vec![]);
        let window = ops.open_window("firefox", Rect::new(100, 100, 900, 700));

        ops.set_placement(window, Placement::Maximized).unwrap();
        assert_eq!(ops.geometry(window).unwrap(), Rect::new(0, 0, 1920, 1040));

        ops.set_placement(window, Placement::Normal).unwrap();
        assert_eq!(ops.geometry(window).unwrap(), Rect::new(100, 100, 900, 700));
    }

    #[test]
    fn test_restricted_class_and_missing_window() {
        let ops = DryRunWindowOps::new(Rect::new(0, 0, 800, 600), vec!["plasmashell".to_string()]);
        let shell = ops.open_window("plasmashell", Rect::new(0, 0, 800, 600));
        assert!(ops.is_restricted(shell).unwrap());

        assert!(ops.geometry(WindowRef(1)).is_err());
        ops.activate(None);
        assert_eq!(ops.active_window().unwrap(), None);
    }
}
