use crate::error::{AhkError, Result};
use crate::events::{KeyCode, KeyState};
use crate::services::platform::KeyInjector;
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::{debug, info, warn};

const EV_SYN: i32 = 0;
const EV_KEY: i32 = 1;

/// Виртуальная клавиатура uinput для синтетических комбинаций и проброса
/// несвязанных клавиш при эксклюзивном захвате
pub struct VirtualDevice {
    device: Mutex<uinput::Device>,
    device_name: String,
    // Нажатые через устройство клавиши, отпускаются при закрытии
    held: Mutex<HashSet<KeyCode>>,
}

impl VirtualDevice {
    pub fn new(device_name: &str) -> Result<Self> {
        info!("Создание виртуального устройства uinput '{}'", device_name);

        let device = uinput::default()?
            .name(device_name)?
            .event(uinput::event::Keyboard::All)?
            .create()
            .map_err(|e| {
                AhkError::Internal(format!(
                    "Не удалось создать виртуальное устройство '{}': {}",
                    device_name, e
                ))
            })?;

        info!("Виртуальное устройство '{}' создано", device_name);
        Ok(Self {
            device: Mutex::new(device),
            device_name: device_name.to_string(),
            held: Mutex::new(HashSet::new()),
        })
    }

    /// Отпускает всё, что осталось нажатым
    pub fn release_all_keys(&self) -> Result<()> {
        let held: Vec<KeyCode> = self.held.lock().drain().collect();
        if !held.is_empty() {
            debug!("Отпускаем {} клавиш на '{}'", held.len(), self.device_name);
        }
        for key in held {
            self.send_key(key, KeyState::Released)?;
        }
        Ok(())
    }
}

impl KeyInjector for VirtualDevice {
    fn send_key(&self, key: KeyCode, state: KeyState) -> Result<()> {
        {
            let mut device = self.device.lock();
            device.write(EV_KEY, i32::from(key.value()), state.evdev_value())?;
            device.write(EV_SYN, 0, 0)?;
        }

        let mut held = self.held.lock();
        match state {
            KeyState::Pressed => {
                held.insert(key);
            }
            KeyState::Released => {
                held.remove(&key);
            }
            KeyState::Repeat => {}
        }

        debug!("uinput: {} {:?}", key, state);
        Ok(())
    }
}

impl Drop for VirtualDevice {
    fn drop(&mut self) {
        if let Err(e) = self.release_all_keys() {
            warn!("Не удалось отпустить клавиши при закрытии '{}': {}", self.device_name, e);
        }
        info!("Закрытие виртуального устройства '{}'", self.device_name);
    }
}
