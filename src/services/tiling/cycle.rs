//! Циклическая раскладка активного окна.
//!
//! Позиция в цикле нигде не хранится: при каждом нажатии она заново
//! определяется по фактической геометрии окна. Поэтому горизонтальный и
//! вертикальный циклы независимы, а окно, сдвинутое пользователем вручную,
//! просто начинает цикл заново с первой доли.

use super::geometry::{candidates, rects_close, CycleAxis};
use crate::config::TilingConfig;
use crate::error::Result;
use crate::events::{Placement, Rect};
use crate::services::platform::WindowOps;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Общая для всех четырёх направлений отметка последнего принятого действия
#[derive(Debug)]
pub struct DebounceClock {
    window: Duration,
    last_accepted: Mutex<Option<Instant>>,
}

impl DebounceClock {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: Mutex::new(None),
        }
    }

    /// true, если вызов принят; отклонённый вызов отметку не сдвигает
    pub fn try_accept(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last_accepted.lock();
        match *last {
            Some(previous) if now.duration_since(previous) < self.window => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Debounced,
    NoTarget,
    Restricted,
    RestoredFromMaximized(Rect),
    Moved { index: usize, rect: Rect },
}

pub struct TilingController {
    windows: Arc<dyn WindowOps>,
    horizontal_ratios: Vec<f64>,
    vertical_ratios: Vec<f64>,
    tolerance: i32,
    debounce: DebounceClock,
}

impl TilingController {
    pub fn new(config: &TilingConfig, windows: Arc<dyn WindowOps>) -> Self {
        Self {
            windows,
            horizontal_ratios: config.horizontal_ratios.clone(),
            vertical_ratios: config.vertical_ratios.clone(),
            tolerance: config.tolerance_px,
            debounce: DebounceClock::new(Duration::from_millis(config.debounce_ms)),
        }
    }

    fn ratios(&self, axis: CycleAxis) -> &[f64] {
        if axis.is_horizontal() {
            &self.horizontal_ratios
        } else {
            &self.vertical_ratios
        }
    }

    pub fn cycle(&self, axis: CycleAxis) -> Result<CycleOutcome> {
        if !self.debounce.try_accept() {
            debug!("Цикл {:?} отклонён: слишком частые нажатия", axis);
            return Ok(CycleOutcome::Debounced);
        }

        let Some(window) = self.windows.active_window()? else {
            debug!("Цикл {:?}: нет активного окна", axis);
            return Ok(CycleOutcome::NoTarget);
        };

        if self.windows.is_restricted(window)? {
            debug!("Цикл {:?}: окно {} не двигается", axis, window);
            return Ok(CycleOutcome::Restricted);
        }

        let work_area = self.windows.work_area(window)?;
        let current = self.windows.geometry(window)?;
        let targets = candidates(&work_area, self.ratios(axis), axis, &current);
        let Some(first) = targets.first().copied() else {
            return Ok(CycleOutcome::NoTarget);
        };

        // Развёрнутое окно всегда вне цикла: восстанавливаем и ставим первую долю
        if self.windows.placement(window)? == Placement::Maximized {
            self.windows.set_placement(window, Placement::Normal)?;
            self.windows.set_geometry(window, first)?;
            info!("Окно {} восстановлено из развёрнутого: {:?} -> {}", window, axis, first);
            return Ok(CycleOutcome::RestoredFromMaximized(first));
        }

        let index = targets
            .iter()
            .position(|target| rects_close(&current, target, self.tolerance))
            .map(|i| (i + 1) % targets.len())
            .unwrap_or(0);
        let rect = targets[index];

        self.windows.set_geometry(window, rect)?;
        info!("Окно {}: {:?} #{} -> {}", window, axis, index, rect);

        Ok(CycleOutcome::Moved { index, rect })
    }

    /// Развернуть/восстановить активное окно; None если окна нет или оно запрещено
    pub fn toggle_maximize(&self) -> Result<Option<Placement>> {
        let Some(window) = self.windows.active_window()? else {
            return Ok(None);
        };
        if self.windows.is_restricted(window)? {
            return Ok(None);
        }

        let next = match self.windows.placement(window)? {
            Placement::Maximized => Placement::Normal,
            Placement::Normal | Placement::Minimized => Placement::Maximized,
        };
        self.windows.set_placement(window, next)?;
        info!("Окно {} -> {:?}", window, next);

        Ok(Some(next))
    }
}
