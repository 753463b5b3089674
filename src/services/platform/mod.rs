//! Внешние возможности, которыми пользуется движок горячих клавиш.
//!
//! Ядро (жесты, повторы, раскладка окон) знает только эти трейты.
//! Реальные реализации работают через утилиты X11, uinput, PipeWire/PulseAudio
//! и D-Bus; сухой режим подставляет реализации в памяти.

pub mod audio;
pub mod desktop;
pub mod dry_run;
pub mod x11;

use crate::config::Config;
use crate::error::Result;
use crate::events::{KeyCode, KeyCombo, KeyState, Placement, Rect, WindowRef};
use crate::services::fallback::FallbackChain;
use crate::services::virtual_device::VirtualDevice;
use std::sync::Arc;
use tracing::{info, warn};

pub use audio::VolumeDirection;

/// Операции с окнами. Все методы синхронные и должны возвращаться быстро.
pub trait WindowOps: Send + Sync {
    fn name(&self) -> &'static str;

    /// Активное окно; `None`, если фокуса нет
    fn active_window(&self) -> Result<Option<WindowRef>>;

    fn geometry(&self, window: WindowRef) -> Result<Rect>;

    /// Меняет положение и размер без изменения z-порядка и фокуса
    fn set_geometry(&self, window: WindowRef, rect: Rect) -> Result<()>;

    fn placement(&self, window: WindowRef) -> Result<Placement>;

    fn set_placement(&self, window: WindowRef, placement: Placement) -> Result<()>;

    /// Рабочая область монитора, на котором находится окно (без панелей)
    fn work_area(&self, window: WindowRef) -> Result<Rect>;

    /// Окна рабочего стола и панелей, которые нельзя двигать
    fn is_restricted(&self, window: WindowRef) -> Result<bool>;
}

/// Синтетический ввод в активное приложение
pub trait KeyInjector: Send + Sync {
    fn send_key(&self, key: KeyCode, state: KeyState) -> Result<()>;

    fn send_combo(&self, combo: &KeyCombo) -> Result<()> {
        for (key, state) in combo.event_sequence() {
            self.send_key(key, state)?;
        }
        Ok(())
    }
}

/// Набор внешних зависимостей движка
pub struct Platform {
    pub windows: Arc<dyn WindowOps>,
    pub keys: Arc<dyn KeyInjector>,
    pub volume: FallbackChain<VolumeDirection>,
    pub desktop: FallbackChain<()>,
}

impl Platform {
    pub fn new(
        windows: Arc<dyn WindowOps>,
        keys: Arc<dyn KeyInjector>,
        volume: FallbackChain<VolumeDirection>,
        desktop: FallbackChain<()>,
    ) -> Self {
        Self {
            windows,
            keys,
            volume,
            desktop,
        }
    }
}

/// Фабрика платформы в зависимости от флага dry_run
pub fn create_platform(config: &Config, dry_run: bool) -> Result<Platform> {
    if dry_run {
        info!("Платформа: сухой режим, окна и ввод симулируются");
        let keys: Arc<dyn KeyInjector> = Arc::new(dry_run::DryRunInjector::new());
        return Ok(Platform::new(
            Arc::new(dry_run::DryRunWindowOps::simulated()),
            keys.clone(),
            FallbackChain::new("volume").with(audio::MediaKeyVolume::new(keys.clone())),
            FallbackChain::new("desktop").with(desktop::SuperDChord::new(keys)),
        ));
    }

    let keys: Arc<dyn KeyInjector> = Arc::new(VirtualDevice::new("AHK-Tiler Virtual Device")?);

    let windows = x11::X11WindowOps::new(config.tiling.restricted_classes.clone());
    if let Err(e) = windows.probe() {
        warn!("Утилиты X11 недоступны, раскладка окон работать не будет: {}", e);
    }

    let volume = FallbackChain::new("volume")
        .with(audio::WpctlVolume::new(config.audio.step_percent))
        .with(audio::PactlVolume::new(config.audio.step_percent))
        .with(audio::MediaKeyVolume::new(keys.clone()));

    let desktop = FallbackChain::new("desktop")
        .with(desktop::KWinShowDesktop::new())
        .with(desktop::WmctrlShowDesktop::new())
        .with(desktop::SuperDChord::new(keys.clone()));

    info!(
        "Платформа: {}, громкость [{}], рабочий стол [{}]",
        windows.name(),
        volume.names().join(" -> "),
        desktop.names().join(" -> ")
    );

    Ok(Platform::new(Arc::new(windows), keys, volume, desktop))
}
