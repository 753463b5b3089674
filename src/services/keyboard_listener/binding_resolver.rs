use super::modifier_state::ModifierState;
use crate::config::KeyBinding;
use crate::events::{KeyCode, KeyState, Modifiers};
use crate::mappings;
use crate::services::actions::Action;
use std::collections::HashMap;
use tracing::warn;

/// Что делать с событием клавиши
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Press(Action),
    Release(Action),
    /// Клавиша ни к чему не привязана
    Passthrough,
}

/// Сопоставляет (клавиша, модификаторы) с действием.
///
/// Действие запоминается за кодом клавиши на время нажатия, поэтому
/// отпускание попадает в то же действие, даже если модификаторы уже отпущены.
pub struct BindingResolver {
    bindings: HashMap<(KeyCode, Modifiers), Action>,
    modifiers: ModifierState,
    held: HashMap<KeyCode, Action>,
}

impl BindingResolver {
    pub fn new(bindings: &[KeyBinding]) -> Self {
        let mut table = HashMap::new();
        for binding in bindings {
            let Some(code) = mappings::key_code(&binding.key) else {
                warn!("Привязка к неизвестной клавише '{}' пропущена", binding.key);
                continue;
            };
            let modifiers = Modifiers::from_vec(&binding.modifiers);
            table.insert((code, modifiers), binding.action);
        }

        Self {
            bindings: table,
            modifiers: ModifierState::new(),
            held: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Коды всех привязанных клавиш без повторов
    pub fn bound_keys(&self) -> Vec<KeyCode> {
        let mut keys: Vec<KeyCode> = self.bindings.keys().map(|(key, _)| *key).collect();
        keys.sort_by_key(KeyCode::value);
        keys.dedup();
        keys
    }

    pub fn lookup(&self, key: KeyCode, modifiers: Modifiers) -> Option<Action> {
        self.bindings.get(&(key, modifiers)).copied()
    }

    /// Нажатие с явным набором модификаторов
    pub fn press(&mut self, key: KeyCode, modifiers: Modifiers) -> Option<Action> {
        if let Some(action) = self.held.get(&key) {
            return Some(*action);
        }
        let action = self.lookup(key, modifiers)?;
        self.held.insert(key, action);
        Some(action)
    }

    pub fn release(&mut self, key: KeyCode) -> Option<Action> {
        self.held.remove(&key)
    }

    /// Событие физической клавиатуры; модификаторы отслеживаются самим резолвером
    pub fn resolve(&mut self, key: KeyCode, state: KeyState) -> Resolution {
        let evdev_key = evdev::KeyCode::new(key.value());
        if ModifierState::is_modifier(evdev_key) {
            if state != KeyState::Repeat {
                self.modifiers.update_key(evdev_key, state == KeyState::Pressed);
            }
            return Resolution::Passthrough;
        }

        let action = match state {
            // Автоповтор ядра передаётся как нажатие: его поглощает разбор жестов
            KeyState::Pressed | KeyState::Repeat => {
                let modifiers = self.modifiers.to_modifiers();
                self.press(key, modifiers).map(Resolution::Press)
            }
            KeyState::Released => self.release(key).map(Resolution::Release),
        };

        action.unwrap_or(Resolution::Passthrough)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_bindings;
    use evdev::KeyCode as Key;

    fn code(key: Key) -> KeyCode {
        KeyCode::from(key)
    }

    #[test]
    fn test_plain_and_shifted_bindings() {
        let mut resolver = BindingResolver::new(&default_bindings());
        assert_eq!(resolver.len(), 13);

        assert_eq!(
            resolver.resolve(code(Key::KEY_F23), KeyState::Pressed),
            Resolution::Press(Action::VolumeDown)
        );
        assert_eq!(
            resolver.resolve(code(Key::KEY_F23), KeyState::Released),
            Resolution::Release(Action::VolumeDown)
        );

        resolver.resolve(code(Key::KEY_LEFTSHIFT), KeyState::Pressed);
        assert_eq!(
            resolver.resolve(code(Key::KEY_F23), KeyState::Pressed),
            Resolution::Press(Action::BrowserBack)
        );
    }

    #[test]
    fn test_release_follows_press_after_modifier_change() {
        let mut resolver = BindingResolver::new(&default_bindings());

        resolver.resolve(code(Key::KEY_RIGHTSHIFT), KeyState::Pressed);
        assert_eq!(
            resolver.resolve(code(Key::KEY_F24), KeyState::Pressed),
            Resolution::Press(Action::BrowserForward)
        );
        resolver.resolve(code(Key::KEY_RIGHTSHIFT), KeyState::Released);

        // Автоповтор и отпускание идут в то же действие
        assert_eq!(
            resolver.resolve(code(Key::KEY_F24), KeyState::Repeat),
            Resolution::Press(Action::BrowserForward)
        );
        assert_eq!(
            resolver.resolve(code(Key::KEY_F24), KeyState::Released),
            Resolution::Release(Action::BrowserForward)
        );
    }

    #[test]
    fn test_unbound_keys_pass_through() {
        let mut resolver = BindingResolver::new(&default_bindings());

        assert_eq!(resolver.resolve(code(Key::KEY_A), KeyState::Pressed), Resolution::Passthrough);
        assert_eq!(resolver.resolve(code(Key::KEY_A), KeyState::Released), Resolution::Passthrough);
        assert_eq!(
            resolver.resolve(code(Key::KEY_LEFTCTRL), KeyState::Pressed),
            Resolution::Passthrough
        );
        // Ctrl+F13 не привязан
        assert_eq!(resolver.resolve(code(Key::KEY_F13), KeyState::Pressed), Resolution::Passthrough);
    }

    #[test]
    fn test_explicit_press_release() {
        let mut resolver = BindingResolver::new(&default_bindings());
        let shift = Modifiers::new().with_shift(true);

        assert_eq!(resolver.press(code(Key::KEY_F24), shift), Some(Action::BrowserForward));
        assert_eq!(resolver.release(code(Key::KEY_F24)), Some(Action::BrowserForward));
        assert_eq!(resolver.release(code(Key::KEY_F24)), None);
        assert_eq!(resolver.lookup(code(Key::KEY_F16), Modifiers::new()), Some(Action::Refresh));
        // f13-f20, f22-f24
        assert_eq!(resolver.bound_keys().len(), 11);
    }
}
