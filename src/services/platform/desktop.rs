//! Показ рабочего стола: ярлык KWin по D-Bus, затем `wmctrl -k`, затем
//! аккорд Super+D через виртуальную клавиатуру.

use super::KeyInjector;
use crate::ahk_error;
use crate::error::Result;
use crate::events::{KeyCode, KeyState};
use crate::services::fallback::Strategy;
use crate::utils::command::run_tool;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// `org.kde.kglobalaccel.Component.invokeShortcut("Show Desktop")`
pub struct KWinShowDesktop {
    connection: OnceCell<zbus::blocking::Connection>,
}

impl KWinShowDesktop {
    pub fn new() -> Self {
        Self {
            connection: OnceCell::new(),
        }
    }

    fn connection(&self) -> Result<&zbus::blocking::Connection> {
        self.connection.get_or_try_init(|| {
            debug!("Подключение к сессионной шине D-Bus");
            Ok(zbus::blocking::Connection::session()?)
        })
    }
}

impl Strategy<()> for KWinShowDesktop {
    fn name(&self) -> &'static str {
        "kwin"
    }

    fn attempt(&self, _: &()) -> Result<()> {
        let connection = self.connection()?;
        connection.call_method(
            Some("org.kde.kglobalaccel"),
            "/component/kwin",
            Some("org.kde.kglobalaccel.Component"),
            "invokeShortcut",
            &("Show Desktop",),
        )?;
        Ok(())
    }
}

/// `wmctrl -k on|off` по текущему значению `_NET_SHOWING_DESKTOP`
pub struct WmctrlShowDesktop;

impl WmctrlShowDesktop {
    pub fn new() -> Self {
        Self
    }
}

fn parse_showing_desktop(output: &str) -> Result<bool> {
    let value = output
        .lines()
        .find(|line| line.starts_with("_NET_SHOWING_DESKTOP"))
        .and_then(|line| line.split_once('='))
        .map(|(_, value)| value.trim())
        .ok_or_else(|| ahk_error!(parse, "_NET_SHOWING_DESKTOP не найден"))?;

    match value {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(ahk_error!(parse, "неожиданное значение _NET_SHOWING_DESKTOP: {}", other)),
    }
}

impl Strategy<()> for WmctrlShowDesktop {
    fn name(&self) -> &'static str {
        "wmctrl"
    }

    fn attempt(&self, _: &()) -> Result<()> {
        let output = run_tool("xprop", &["-root", "_NET_SHOWING_DESKTOP"])?;
        let showing = parse_showing_desktop(&output)?;
        let mode = if showing { "off" } else { "on" };
        run_tool("wmctrl", &["-k", mode])?;
        Ok(())
    }
}

/// Super+D с принудительными отпусканиями, чтобы Super не залипал
pub struct SuperDChord {
    keys: Arc<dyn KeyInjector>,
}

impl SuperDChord {
    pub fn new(keys: Arc<dyn KeyInjector>) -> Self {
        Self { keys }
    }
}

impl Strategy<()> for SuperDChord {
    fn name(&self) -> &'static str {
        "super_d"
    }

    fn attempt(&self, _: &()) -> Result<()> {
        let super_key: KeyCode = evdev::KeyCode::KEY_LEFTMETA.into();
        let d: KeyCode = evdev::KeyCode::KEY_D.into();

        self.keys.send_key(d, KeyState::Released)?;
        self.keys.send_key(super_key, KeyState::Released)?;
        thread::sleep(Duration::from_millis(5));
        self.keys.send_key(super_key, KeyState::Pressed)?;
        thread::sleep(Duration::from_millis(5));
        self.keys.send_key(d, KeyState::Pressed)?;
        thread::sleep(Duration::from_millis(15));
        self.keys.send_key(d, KeyState::Released)?;
        self.keys.send_key(super_key, KeyState::Released)?;
        // Повторное отпускание на случай потерянного события
        self.keys.send_key(super_key, KeyState::Released)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AhkError;
    use crate::services::platform::dry_run::DryRunInjector;

    #[test]
    fn test_parse_showing_desktop() {
        assert!(parse_showing_desktop("_NET_SHOWING_DESKTOP(CARDINAL) = 1\n").unwrap());
        assert!(!parse_showing_desktop("_NET_SHOWING_DESKTOP(CARDINAL) = 0\n").unwrap());
        assert!(matches!(
            parse_showing_desktop("_NET_SHOWING_DESKTOP:  not found.\n"),
            Err(AhkError::Parse(_))
        ));
    }

    #[test]
    fn test_super_d_chord_sequence() {
        let injector = Arc::new(DryRunInjector::new());
        SuperDChord::new(injector.clone()).attempt(&()).unwrap();

        let super_key: KeyCode = evdev::KeyCode::KEY_LEFTMETA.into();
        let d: KeyCode = evdev::KeyCode::KEY_D.into();
        assert_eq!(
            injector.events(),
            vec![
                (d, KeyState::Released),
                (super_key, KeyState::Released),
                (super_key, KeyState::Pressed),
                (d, KeyState::Pressed),
                (d, KeyState::Released),
                (super_key, KeyState::Released),
                (super_key, KeyState::Released),
            ]
        );
    }
}
