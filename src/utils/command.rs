//! Запуск внешних утилит (xdotool, xprop, wmctrl, wpctl, pactl) от имени
//! пользователя сессии, даже если сам процесс запущен через sudo.

use crate::error::{AhkError, Result};
use std::collections::HashMap;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Сколько ждать утилиту, прежде чем убить её
pub const TOOL_TIMEOUT: Duration = Duration::from_millis(1000);

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Переменные окружения пользовательской сессии для запуска из-под sudo
pub fn build_env_overrides() -> HashMap<String, String> {
    let mut env_vars = HashMap::new();

    if std::env::var("USER").unwrap_or_default() == "root" {
        if let Ok(sudo_user) = std::env::var("SUDO_USER") {
            if let Some(uid) = user_id(&sudo_user) {
                let runtime_dir = format!("/run/user/{}", uid);
                debug!("Окружение сессии пользователя {}: uid={}", sudo_user, uid);
                env_vars.insert(
                    "DBUS_SESSION_BUS_ADDRESS".to_string(),
                    format!("unix:path={}/bus", runtime_dir),
                );
                env_vars.insert("XDG_RUNTIME_DIR".to_string(), runtime_dir);
                env_vars.insert("USER".to_string(), sudo_user);
            }
        }
    }

    for key in ["DISPLAY", "XAUTHORITY"] {
        if let Ok(value) = std::env::var(key) {
            env_vars.insert(key.to_string(), value);
        }
    }

    env_vars
}

fn user_id(user: &str) -> Option<String> {
    let output = Command::new("id").args(["-u", user]).output().ok()?;
    let uid = String::from_utf8(output.stdout).ok()?;
    let uid = uid.trim();
    (!uid.is_empty()).then(|| uid.to_string())
}

/// Команда утилиты; под sudo запускается через `sudo -E -u $SUDO_USER`
pub fn tool_command(tool: &str, args: &[&str]) -> Command {
    let mut cmd = match std::env::var("SUDO_USER") {
        Ok(sudo_user) => {
            let mut cmd = Command::new("sudo");
            cmd.args(["-E", "-u", &sudo_user, tool]);
            cmd
        }
        Err(_) => Command::new(tool),
    };
    cmd.args(args);

    for (key, value) in build_env_overrides() {
        cmd.env(key, value);
    }

    cmd
}

/// Выполняет утилиту и возвращает stdout; ненулевой код выхода это ошибка
pub fn run_tool(tool: &str, args: &[&str]) -> Result<String> {
    run_tool_with_timeout(tool, args, TOOL_TIMEOUT)
}

/// То же, что [`run_tool`], но зависшая утилита убивается через `timeout`
pub fn run_tool_with_timeout(tool: &str, args: &[&str], timeout: Duration) -> Result<String> {
    let mut child = tool_command(tool, args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AhkError::tool(tool, format!("не удалось запустить: {}", e)))?;

    // Вывод читается параллельно, иначе переполненный pipe подвесит утилиту
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                warn!("{} {:?} не ответил за {:?}, завершаем процесс", tool, args, timeout);
                if let Err(e) = child.kill() {
                    warn!("Не удалось завершить {}: {}", tool, e);
                }
                if let Err(e) = child.wait() {
                    debug!("Ожидание завершения {}: {}", tool, e);
                }
                return Err(AhkError::tool(tool, format!("таймаут {:?}", timeout)));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(AhkError::tool(tool, format!("ошибка ожидания: {}", e))),
        }
    };

    let stdout = collect(stdout);
    if !status.success() {
        let stderr = collect(stderr);
        let stderr = String::from_utf8_lossy(&stderr);
        debug!("{} {:?} вернул ошибку: {}", tool, args, stderr.trim());
        return Err(AhkError::tool(tool, format!("{}: {}", status, stderr.trim())));
    }

    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Err(e) = reader.read_to_end(&mut buffer) {
            debug!("Чтение вывода утилиты прервано: {}", e);
        }
        buffer
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Проверяет, что утилита есть в PATH
pub fn tool_available(tool: &str) -> bool {
    Command::new("which")
        .arg(tool)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
