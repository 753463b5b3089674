use crate::error::{AhkError, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::{info, warn};

/// Проверка доступа к /dev/input, /dev/uinput и X-дисплею перед запуском
pub fn check_permissions() -> Result<()> {
    info!("Проверка прав доступа...");

    check_input_devices_access(Path::new("/dev/input"))?;
    check_uinput_access(Path::new("/dev/uinput"))?;
    check_display();
    check_not_root();

    info!("Проверка прав доступа завершена успешно");
    Ok(())
}

fn check_input_devices_access(input_dir: &Path) -> Result<()> {
    if !input_dir.exists() {
        return Err(AhkError::Permission(format!(
            "Директория {} не существует",
            input_dir.display()
        )));
    }

    fs::read_dir(input_dir).map_err(|e| {
        AhkError::Permission(format!(
            "Нет доступа к {}: {}. Добавьте пользователя в группу 'input'",
            input_dir.display(),
            e
        ))
    })?;

    info!("Доступ к {} подтверждён", input_dir.display());
    Ok(())
}

/// Хоть какие-то права на чтение/запись у группы или остальных
fn mode_allows_access(mode: u32) -> bool {
    mode & 0o066 != 0
}

fn check_uinput_access(uinput: &Path) -> Result<()> {
    if !uinput.exists() {
        // Модуль может быть загружен позже, ошибка проявится при создании устройства
        warn!("{} не существует, выполните: sudo modprobe uinput", uinput.display());
        return Ok(());
    }

    let metadata = fs::metadata(uinput).map_err(|e| {
        AhkError::Permission(format!(
            "Не удалось проверить права доступа к {}: {}",
            uinput.display(),
            e
        ))
    })?;

    if !mode_allows_access(metadata.permissions().mode()) {
        return Err(AhkError::Permission(format!(
            "Нет прав доступа к {}. Добавьте пользователя в группу 'uinput' или 'input'",
            uinput.display()
        )));
    }

    info!("Доступ к {} подтверждён", uinput.display());
    Ok(())
}

fn check_display() {
    match std::env::var("DISPLAY") {
        Ok(disp) if !disp.is_empty() => info!("X-дисплей: {}", disp),
        _ => warn!("DISPLAY не задан: xdotool и wmctrl не смогут управлять окнами"),
    }
}

fn check_not_root() {
    match std::env::var("USER") {
        Ok(user) if user == "root" => {
            warn!("Приложение запущено от имени root");
            warn!("Утилиты X11 будут запускаться от имени SUDO_USER, если он задан");
            warn!("Рекомендуется: sudo usermod -a -G input,uinput $USER и перезайти в систему");
        }
        Ok(user) => info!("Приложение запущено от имени пользователя: {}", user),
        Err(_) => warn!("Не удалось определить пользователя"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_allows_access() {
        assert!(mode_allows_access(0o660));
        assert!(mode_allows_access(0o666));
        assert!(mode_allows_access(0o604));
        assert!(!mode_allows_access(0o600));
    }

    #[test]
    fn test_missing_input_dir_is_permission_error() {
        let result = check_input_devices_access(Path::new("/definitely/not/dev/input"));
        assert!(matches!(result, Err(AhkError::Permission(_))));
    }

    #[test]
    fn test_missing_uinput_is_not_fatal() {
        assert!(check_uinput_access(Path::new("/definitely/not/uinput")).is_ok());
    }
}
