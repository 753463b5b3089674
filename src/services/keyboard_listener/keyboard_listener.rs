use crate::config::Config;
use crate::error::{AhkError, Result};
use crate::events::{KeyCode, KeyState};
use crate::services::engine::HotkeyEngine;
use crate::services::platform::KeyInjector;
use crate::trace_if_enabled;
use crate::utils::DeviceFinder;
use evdev::{Device, EventType, InputEvent};
use std::io::Error;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::binding_resolver::{BindingResolver, Resolution};
use super::r#trait::KeyboardListenerTrait;

/// Подряд идущих ошибок чтения, после которых устройство считается потерянным
const MAX_READ_ERRORS: u32 = 50;

pub struct RealKeyboardListener {
    engine: Arc<HotkeyEngine>,
    passthrough: Arc<dyn KeyInjector>,
    device: Device,
    device_name: String,
    grabbed: bool,
    resolver: BindingResolver,
}

impl RealKeyboardListener {
    pub fn new(
        config: Arc<Config>,
        engine: Arc<HotkeyEngine>,
        passthrough: Arc<dyn KeyInjector>,
    ) -> Result<Self> {
        info!("Инициализация RealKeyboardListener");

        let resolver = BindingResolver::new(&config.bindings);
        info!("Загружено {} привязок клавиш", resolver.len());

        let device_path =
            DeviceFinder::find_keyboard_device(&config.input.device_path, &resolver.bound_keys())?;

        let mut device = Device::open(&device_path).map_err(|e| {
            AhkError::DeviceNotFound(format!(
                "Не удалось открыть устройство {:?}: {}",
                device_path, e
            ))
        })?;
        let device_name = device.name().unwrap_or("Unknown").to_string();

        let grabbed = if config.input.grab {
            match device.grab() {
                Ok(()) => {
                    info!("Устройство '{}' захвачено эксклюзивно, несвязанные клавиши пробрасываются", device_name);
                    true
                }
                Err(e) => {
                    Self::log_grab_error(&device_path, &e);
                    return Err(AhkError::Permission(format!(
                        "Не удалось захватить устройство эксклюзивно: {}",
                        e
                    )));
                }
            }
        } else {
            info!("Чтение '{}' без захвата: привязанные клавиши видны и системе", device_name);
            false
        };

        Ok(Self {
            engine,
            passthrough,
            device,
            device_name,
            grabbed,
            resolver,
        })
    }

    /// Блокирующий цикл чтения; выполняется в отдельном потоке
    fn read_loop(mut self) -> Result<()> {
        info!("Чтение событий с '{}'", self.device_name);
        let mut consecutive_errors = 0;

        loop {
            let events: Vec<InputEvent> = match self.device.fetch_events() {
                Ok(events) => events.collect(),
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= MAX_READ_ERRORS {
                        return Err(AhkError::DeviceNotFound(format!(
                            "Устройство '{}' перестало отвечать: {}",
                            self.device_name, e
                        )));
                    }
                    error!("Ошибка чтения событий: {}", e);
                    thread::sleep(Duration::from_millis(100));
                    continue;
                }
            };
            consecutive_errors = 0;

            for event in events {
                self.handle_event(event);
            }
        }
    }

    fn handle_event(&mut self, event: InputEvent) {
        if event.event_type() != EventType::KEY {
            return;
        }

        let key = KeyCode::new(event.code());
        let Some(state) = KeyState::from_evdev_value(event.value()) else {
            debug!("Неизвестное значение события: {}", event.value());
            return;
        };

        match self.resolver.resolve(key, state) {
            Resolution::Press(action) => {
                trace_if_enabled!("{} {:?} -> {}", key, state, action);
                self.engine.on_press(action.name());
            }
            Resolution::Release(action) => {
                trace_if_enabled!("{} {:?} -> {}", key, state, action);
                self.engine.on_release(action.name());
            }
            Resolution::Passthrough if self.grabbed => {
                if let Err(e) = self.passthrough.send_key(key, state) {
                    debug!("Не удалось пробросить {}: {}", key, e);
                }
            }
            Resolution::Passthrough => {}
        }
    }

    fn log_grab_error(device_path: &Path, e: &Error) {
        warn!(
            "Не удалось захватить устройство {}: {}",
            device_path.display(),
            e
        );
        warn!("Попробуйте:");
        warn!("1. Отключить input.grab в конфигурации");
        warn!("2. Добавить пользователя в группу input: sudo usermod -a -G input $USER");
        warn!("3. Перезайти в систему после добавления в группу");
    }
}

#[async_trait::async_trait]
impl KeyboardListenerTrait for RealKeyboardListener {
    async fn run(self: Box<Self>) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();

        // Обычный поток: рантайм не ждёт его при завершении процесса
        thread::Builder::new()
            .name("evdev-reader".to_string())
            .spawn(move || {
                let result = (*self).read_loop();
                let _ = done_tx.send(result);
            })?;

        done_rx
            .await
            .map_err(|_| AhkError::Internal("поток чтения evdev завершился аварийно".to_string()))?
    }
}

impl Drop for RealKeyboardListener {
    fn drop(&mut self) {
        if self.grabbed {
            info!("Освобождение захваченного устройства");
            if let Err(e) = self.device.ungrab() {
                error!("Не удалось освободить устройство: {}", e);
            }
        }
    }
}
