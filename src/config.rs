use crate::events::Modifiers;
use crate::mappings;
use crate::services::actions::Action;
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub input: InputConfig,
    pub tiling: TilingConfig,
    pub repeat: RepeatConfig,
    pub gesture: GestureConfig,
    pub audio: AudioConfig,
    #[serde(default)]
    pub bindings: Vec<KeyBinding>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    pub device_path: String,
    /// Эксклюзивный захват устройства; несвязанные клавиши пробрасываются через uinput
    #[serde(default)]
    pub grab: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TilingConfig {
    /// Доли ширины рабочей области для циклов влево/вправо
    pub horizontal_ratios: Vec<f64>,
    /// Доли высоты рабочей области для циклов вверх/вниз
    pub vertical_ratios: Vec<f64>,
    pub tolerance_px: i32,
    pub debounce_ms: u64,
    /// Классы окон (WM_CLASS), которые никогда не двигаются
    pub restricted_classes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RepeatTimingConfig {
    pub initial_delay_ms: u64,
    pub interval_ms: u64,
}

impl RepeatTimingConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepeatConfig {
    pub tab: RepeatTimingConfig,
    pub volume: RepeatTimingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GestureConfig {
    pub hold_threshold_ms: u64,
    /// Через сколько жест без release считается «залипшим», 0 отключает проверку
    pub max_hold_ms: u64,
}

impl GestureConfig {
    pub fn hold_threshold(&self) -> Duration {
        Duration::from_millis(self.hold_threshold_ms)
    }

    pub fn max_hold(&self) -> Option<Duration> {
        (self.max_hold_ms > 0).then(|| Duration::from_millis(self.max_hold_ms))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AudioConfig {
    /// Шаг громкости в процентах для wpctl/pactl
    pub step_percent: u8,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KeyBinding {
    pub key: String,
    #[serde(default)]
    pub modifiers: Vec<String>,
    pub action: Action,
}

impl KeyBinding {
    pub fn new(key: &str, modifiers: &[&str], action: Action) -> Self {
        Self {
            key: key.to_string(),
            modifiers: modifiers.iter().map(|m| m.to_string()).collect(),
            action,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "compact".to_string(),
            },
            input: InputConfig {
                device_path: "auto".to_string(),
                grab: false,
            },
            tiling: TilingConfig {
                horizontal_ratios: vec![0.5040, 0.3372, 0.6707],
                vertical_ratios: vec![0.5, 0.3333, 0.6667],
                tolerance_px: 2,
                debounce_ms: 100,
                restricted_classes: vec![
                    "plasmashell".to_string(),
                    "xfdesktop".to_string(),
                    "xfce4-panel".to_string(),
                    "desktop_window".to_string(),
                    "nautilus-desktop".to_string(),
                ],
            },
            repeat: RepeatConfig {
                tab: RepeatTimingConfig {
                    initial_delay_ms: 350,
                    interval_ms: 120,
                },
                volume: RepeatTimingConfig {
                    initial_delay_ms: 350,
                    interval_ms: 30,
                },
            },
            gesture: GestureConfig {
                hold_threshold_ms: 400,
                max_hold_ms: 30_000,
            },
            audio: AudioConfig { step_percent: 2 },
            bindings: default_bindings(),
        }
    }
}

/// Раскладка по умолчанию: F13-F24 и Shift+F23/F24
pub fn default_bindings() -> Vec<KeyBinding> {
    vec![
        KeyBinding::new("f13", &[], Action::CycleLeft),
        KeyBinding::new("f14", &[], Action::MaximizeToggle),
        KeyBinding::new("f15", &[], Action::CycleRight),
        KeyBinding::new("f16", &[], Action::Refresh),
        KeyBinding::new("f17", &[], Action::PrevTab),
        KeyBinding::new("f18", &[], Action::NextTab),
        KeyBinding::new("f19", &[], Action::CycleTop),
        KeyBinding::new("f20", &[], Action::CycleBottom),
        KeyBinding::new("f22", &[], Action::ToggleDesktop),
        KeyBinding::new("f23", &[], Action::VolumeDown),
        KeyBinding::new("f24", &[], Action::VolumeUp),
        KeyBinding::new("f23", &["shift"], Action::BrowserBack),
        KeyBinding::new("f24", &["shift"], Action::BrowserForward),
    ]
}

impl Config {
    /// Слои: значения по умолчанию <- TOML файл (если есть) <- переменные AHK_*
    pub fn load<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("AHK_").split("__"));

        let config: Config = figment
            .extract()
            .with_context(|| format!("Не удалось загрузить конфигурацию из {:?}", config_path))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        // Валидация настроек логирования
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Неверный уровень логирования: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "compact" | "pretty" => {}
            _ => anyhow::bail!("Неверный формат логирования: {}", self.logging.format),
        }

        // Валидация настроек раскладки окон
        Self::validate_ratios("horizontal_ratios", &self.tiling.horizontal_ratios)?;
        Self::validate_ratios("vertical_ratios", &self.tiling.vertical_ratios)?;

        if self.tiling.tolerance_px < 0 {
            anyhow::bail!("tolerance_px не может быть отрицательным");
        }

        // Валидация таймингов
        for (name, timing) in [("tab", &self.repeat.tab), ("volume", &self.repeat.volume)] {
            if timing.interval_ms == 0 {
                anyhow::bail!("repeat.{}.interval_ms должно быть больше 0", name);
            }
        }

        if self.gesture.hold_threshold_ms == 0 {
            anyhow::bail!("hold_threshold_ms должно быть больше 0");
        }

        if self.gesture.max_hold_ms != 0
            && self.gesture.max_hold_ms <= self.gesture.hold_threshold_ms
        {
            anyhow::bail!("max_hold_ms должно быть больше hold_threshold_ms (или 0)");
        }

        if self.audio.step_percent == 0 || self.audio.step_percent > 100 {
            anyhow::bail!("audio.step_percent должно быть в диапазоне 1..=100");
        }

        // Валидация привязок
        let mut seen = HashSet::new();
        for (i, binding) in self.bindings.iter().enumerate() {
            let Some(code) = mappings::key_code(&binding.key) else {
                anyhow::bail!("Неизвестная клавиша '{}' в привязке #{}", binding.key, i + 1);
            };

            for modifier in &binding.modifiers {
                match modifier.as_str() {
                    "ctrl" | "alt" | "shift" | "super" => {}
                    _ => anyhow::bail!("Неверный модификатор '{}' в привязке #{}", modifier, i + 1),
                }
            }

            let modifiers = Modifiers::from_vec(&binding.modifiers);
            if !seen.insert((code, modifiers)) {
                anyhow::bail!(
                    "Повторная привязка {}+{} в привязке #{}",
                    modifiers,
                    binding.key,
                    i + 1
                );
            }
        }

        Ok(())
    }

    fn validate_ratios(name: &str, ratios: &[f64]) -> Result<()> {
        if ratios.is_empty() {
            anyhow::bail!("tiling.{} не может быть пустым", name);
        }
        for ratio in ratios {
            if !(*ratio > 0.0 && *ratio <= 1.0) {
                anyhow::bail!("tiling.{}: доля {} вне диапазона (0, 1]", name, ratio);
            }
        }
        Ok(())
    }

    /// Все действия, на которые есть хотя бы одна привязка
    pub fn bound_actions(&self) -> HashSet<Action> {
        self.bindings.iter().map(|binding| binding.action).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bound_actions().len(), Action::ALL.len());
    }

    #[test]
    fn test_rejects_bad_ratios() {
        let mut config = Config::default();
        config.tiling.horizontal_ratios = vec![];
        assert!(config.validate().is_err());

        config.tiling.horizontal_ratios = vec![0.5, 1.5];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_and_unknown_bindings() {
        let mut config = Config::default();
        config.bindings.push(KeyBinding::new("f13", &[], Action::CycleRight));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.bindings = vec![KeyBinding::new("f99", &[], Action::CycleRight)];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.bindings = vec![KeyBinding::new("f13", &["hyper"], Action::CycleRight)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_same_key_with_different_modifiers_is_allowed() {
        let mut config = Config::default();
        config.bindings = vec![
            KeyBinding::new("f23", &[], Action::VolumeDown),
            KeyBinding::new("f23", &["shift"], Action::BrowserBack),
        ];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_hold_must_exceed_threshold() {
        let mut config = Config::default();
        config.gesture.max_hold_ms = 300;
        assert!(config.validate().is_err());

        config.gesture.max_hold_ms = 0;
        assert!(config.validate().is_ok());
        assert_eq!(config.gesture.max_hold(), None);
    }

    #[test]
    fn test_load_merges_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "ahk.toml",
                r#"
                [tiling]
                horizontal_ratios = [0.5, 0.25]
                debounce_ms = 150

                [[bindings]]
                key = "f13"
                action = "cycle_left"

                [[bindings]]
                key = "f23"
                modifiers = ["shift"]
                action = "browser_back"
                "#,
            )?;
            jail.set_env("AHK_GESTURE__HOLD_THRESHOLD_MS", "500");

            let config = Config::load("ahk.toml").expect("конфигурация должна загрузиться");
            assert_eq!(config.tiling.horizontal_ratios, vec![0.5, 0.25]);
            assert_eq!(config.tiling.debounce_ms, 150);
            // Не заданные в файле поля берутся из значений по умолчанию
            assert_eq!(config.tiling.tolerance_px, 2);
            assert_eq!(config.gesture.hold_threshold_ms, 500);
            assert_eq!(config.bindings.len(), 2);
            assert_eq!(config.bindings[1].action, Action::BrowserBack);
            Ok(())
        });
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = Config::load("missing.toml").expect("значения по умолчанию");
            assert_eq!(config.bindings, default_bindings());
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_unknown_action() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "ahk.toml",
                r#"
                [[bindings]]
                key = "f13"
                action = "launch_rockets"
                "#,
            )?;
            assert!(Config::load("ahk.toml").is_err());
            Ok(())
        });
    }
}
