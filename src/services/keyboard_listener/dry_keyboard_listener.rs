use crate::config::Config;
use crate::error::Result;
use crate::events::{KeyCode, Modifiers};
use crate::mappings;
use crate::services::engine::HotkeyEngine;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use super::binding_resolver::BindingResolver;
use super::r#trait::KeyboardListenerTrait;

/// Команда из строки stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DryCommand {
    Press(KeyCode, Modifiers),
    Release(KeyCode),
    /// Без префикса: нажатие и сразу отпускание
    Tap(KeyCode, Modifiers),
}

/// `+f13` нажатие, `-f13` отпускание, `shift+f23` короткое нажатие
fn parse_line(line: &str) -> Option<DryCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (prefix, rest) = match line.as_bytes()[0] {
        b'+' => (Some(true), &line[1..]),
        b'-' => (Some(false), &line[1..]),
        _ => (None, line),
    };

    let mut parts: Vec<String> = rest.split('+').map(|part| part.trim().to_lowercase()).collect();
    let key_name = parts.pop()?;
    let key = mappings::key_code(&key_name)?;
    let modifiers = Modifiers::from_vec(&parts);

    Some(match prefix {
        Some(true) => DryCommand::Press(key, modifiers),
        Some(false) => DryCommand::Release(key),
        None => DryCommand::Tap(key, modifiers),
    })
}

pub struct DryRunKeyboardListener {
    engine: Arc<HotkeyEngine>,
    resolver: BindingResolver,
}

impl DryRunKeyboardListener {
    pub fn new(config: Arc<Config>, engine: Arc<HotkeyEngine>) -> Self {
        info!("Инициализация DryRunKeyboardListener");
        Self {
            engine,
            resolver: BindingResolver::new(&config.bindings),
        }
    }

    fn apply(&mut self, command: DryCommand) {
        match command {
            DryCommand::Press(key, modifiers) => match self.resolver.press(key, modifiers) {
                Some(action) => self.engine.on_press(action.name()),
                None => debug!("{}+{} ни к чему не привязана", modifiers, key),
            },
            DryCommand::Release(key) => {
                if let Some(action) = self.resolver.release(key) {
                    self.engine.on_release(action.name());
                }
            }
            DryCommand::Tap(key, modifiers) => {
                self.apply(DryCommand::Press(key, modifiers));
                self.apply(DryCommand::Release(key));
            }
        }
    }

    async fn run_impl(mut self) -> Result<()> {
        info!("Dry-run: вводите '+f13' (нажатие), '-f13' (отпускание) или 'shift+f23' (короткое нажатие)");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_line(&line) {
                Some(command) => self.apply(command),
                None if line.trim().is_empty() => {}
                None => warn!("Не удалось разобрать '{}'", line.trim()),
            }
        }

        info!("stdin закрыт, DryRunKeyboardListener завершён");
        Ok(())
    }
}

#[async_trait::async_trait]
impl KeyboardListenerTrait for DryRunKeyboardListener {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
