//! Громкость: PipeWire (wpctl), PulseAudio (pactl) и медиаклавиши как
//! последний вариант.

use super::KeyInjector;
use crate::error::Result;
use crate::events::{KeyCode, KeyCombo};
use crate::services::fallback::Strategy;
use crate::utils::command::run_tool;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeDirection {
    Up,
    Down,
}

impl VolumeDirection {
    fn sign(&self) -> char {
        match self {
            VolumeDirection::Up => '+',
            VolumeDirection::Down => '-',
        }
    }

    fn media_key(&self) -> KeyCode {
        match self {
            VolumeDirection::Up => evdev::KeyCode::KEY_VOLUMEUP.into(),
            VolumeDirection::Down => evdev::KeyCode::KEY_VOLUMEDOWN.into(),
        }
    }
}

impl fmt::Display for VolumeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeDirection::Up => write!(f, "up"),
            VolumeDirection::Down => write!(f, "down"),
        }
    }
}

/// `wpctl set-volume @DEFAULT_AUDIO_SINK@ 2%+`
pub struct WpctlVolume {
    step_percent: u8,
}

impl WpctlVolume {
    pub fn new(step_percent: u8) -> Self {
        Self { step_percent }
    }

    fn step_arg(&self, direction: VolumeDirection) -> String {
        format!("{}%{}", self.step_percent, direction.sign())
    }
}

impl Strategy<VolumeDirection> for WpctlVolume {
    fn name(&self) -> &'static str {
        "wpctl"
    }

    fn attempt(&self, direction: &VolumeDirection) -> Result<()> {
        let step = self.step_arg(*direction);
        // -l 1.0: не поднимать громкость выше 100%
        run_tool("wpctl", &["set-volume", "-l", "1.0", "@DEFAULT_AUDIO_SINK@", &step])?;
        Ok(())
    }
}

/// `pactl set-sink-volume @DEFAULT_SINK@ +2%`
pub struct PactlVolume {
    step_percent: u8,
}

impl PactlVolume {
    pub fn new(step_percent: u8) -> Self {
        Self { step_percent }
    }

    fn step_arg(&self, direction: VolumeDirection) -> String {
        format!("{}{}%", direction.sign(), self.step_percent)
    }
}

impl Strategy<VolumeDirection> for PactlVolume {
    fn name(&self) -> &'static str {
        "pactl"
    }

    fn attempt(&self, direction: &VolumeDirection) -> Result<()> {
        let step = self.step_arg(*direction);
        run_tool("pactl", &["set-sink-volume", "@DEFAULT_SINK@", &step])?;
        Ok(())
    }
}

/// Нажатие KEY_VOLUMEUP/KEY_VOLUMEDOWN через виртуальное устройство
pub struct MediaKeyVolume {
    keys: Arc<dyn KeyInjector>,
}

impl MediaKeyVolume {
    pub fn new(keys: Arc<dyn KeyInjector>) -> Self {
        Self { keys }
    }
}

impl Strategy<VolumeDirection> for MediaKeyVolume {
    fn name(&self) -> &'static str {
        "media_key"
    }

    fn attempt(&self, direction: &VolumeDirection) -> Result<()> {
        self.keys.send_combo(&KeyCombo::key(direction.media_key()))
    }
}
