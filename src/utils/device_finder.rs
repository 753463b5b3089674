use crate::error::{AhkError, Result};
use crate::events::KeyCode;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct DeviceFinder;

/// Кандидат при автопоиске
#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    priority: u32,
}

impl DeviceFinder {
    /// Путь из конфигурации или автопоиск при значении "auto".
    ///
    /// При автопоиске выше ценятся устройства, которые умеют выдавать
    /// клавиши из `wanted` (F13-F24 обычно есть только у макропадов и
    /// программируемых клавиатур).
    pub fn find_keyboard_device(device_path: &str, wanted: &[KeyCode]) -> Result<PathBuf> {
        if device_path != "auto" {
            let path = PathBuf::from(device_path);
            return if path.exists() {
                info!("Используется указанное устройство: {:?}", path);
                Ok(path)
            } else {
                AhkError::device_not_found(format!("Указанное устройство не найдено: {:?}", path))
            };
        }

        info!("Автопоиск клавиатурного устройства...");
        let mut candidates = Self::by_id_candidates(wanted);
        if candidates.is_empty() {
            debug!("В /dev/input/by-id ничего не найдено, перебираем /dev/input/event*");
            candidates = Self::event_candidates(wanted)?;
        }

        candidates.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.path.cmp(&b.path)));
        match candidates.into_iter().next() {
            Some(best) => {
                info!("Выбрано устройство {:?} (приоритет {})", best.path, best.priority);
                Ok(best.path)
            }
            None => AhkError::device_not_found(
                "Не удалось найти подходящее клавиатурное устройство. \
                 Убедитесь, что пользователь добавлен в группу 'input'",
            ),
        }
    }

    fn by_id_candidates(wanted: &[KeyCode]) -> Vec<Candidate> {
        let Ok(entries) = fs::read_dir("/dev/input/by-id") else {
            debug!("Директория /dev/input/by-id недоступна");
            return Vec::new();
        };

        entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                let base = name_priority(&name)?;
                let bonus = Self::probe(&path, wanted)?;
                Some(Candidate {
                    path,
                    priority: base + bonus,
                })
            })
            .collect()
    }

    fn event_candidates(wanted: &[KeyCode]) -> Result<Vec<Candidate>> {
        let entries = fs::read_dir("/dev/input")
            .map_err(|e| AhkError::Permission(format!("Нет доступа к /dev/input: {}", e)))?;

        Ok(entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("event"))
            })
            .filter_map(|path| {
                let bonus = Self::probe(&path, wanted)?;
                Some(Candidate {
                    path,
                    priority: 10 + bonus,
                })
            })
            .collect())
    }

    /// Открывает устройство и проверяет, что это клавиатура.
    /// Возвращает бонус приоритета за поддержку нужных клавиш.
    fn probe(path: &Path, wanted: &[KeyCode]) -> Option<u32> {
        let device = match evdev::Device::open(path) {
            Ok(device) => device,
            Err(e) => {
                debug!("Не удалось открыть {:?}: {}", path, e);
                return None;
            }
        };

        let device_name = device.name().unwrap_or("Unknown").to_lowercase();
        if is_pointer_name(&device_name) {
            debug!("Пропускаем указательное устройство {:?} ({})", path, device_name);
            return None;
        }

        let keys = device.supported_keys()?;
        let is_keyboard = keys.contains(evdev::KeyCode::KEY_A)
            && keys.contains(evdev::KeyCode::KEY_SPACE)
            && keys.contains(evdev::KeyCode::KEY_ENTER)
            && keys.iter().count() > 20;
        if !is_keyboard {
            debug!("{:?} ({}) не похоже на клавиатуру", path, device_name);
            return None;
        }

        let supported = wanted
            .iter()
            .filter(|code| keys.contains(evdev::KeyCode::new(code.value())))
            .count();
        debug!(
            "Клавиатура {:?} ({}): поддерживает {}/{} привязанных клавиш",
            path,
            device_name,
            supported,
            wanted.len()
        );

        Some(if supported == wanted.len() && !wanted.is_empty() { 200 } else { 0 })
    }
}

fn is_pointer_name(name: &str) -> bool {
    let name = name.to_lowercase();
    ["mouse", "deathadder", "touchpad", "trackpoint"]
        .iter()
        .any(|marker| name.contains(marker))
}

/// Приоритет по имени ссылки в /dev/input/by-id; None если это не клавиатура
fn name_priority(name: &str) -> Option<u32> {
    let lower = name.to_lowercase();
    if !lower.contains("event") || is_pointer_name(&lower) {
        return None;
    }

    if lower.ends_with("event-kbd") {
        Some(100)
    } else if lower.contains("keyboard") || lower.contains("kbd") {
        Some(50)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_missing_path() {
        let result = DeviceFinder::find_keyboard_device("/non/existent/path", &[]);
        assert!(matches!(result, Err(AhkError::DeviceNotFound(_))));
    }

    #[test]
    fn test_name_priority() {
        assert_eq!(name_priority("usb-Logitech_USB_Keyboard-event-kbd"), Some(100));
        assert_eq!(name_priority("usb-Keychron_K8-if02-event-keyboard"), Some(50));
        assert_eq!(name_priority("usb-Razer_DeathAdder-event-kbd"), None);
        assert_eq!(name_priority("usb-Logitech_Mouse-event-mouse"), None);
        assert_eq!(name_priority("usb-Logitech_USB_Keyboard-kbd"), None);
    }
}
