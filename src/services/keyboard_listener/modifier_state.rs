use crate::events::Modifiers;
use evdev::KeyCode as Key;

/// Текущее состояние модификаторов физической клавиатуры (левые и правые вместе)
#[derive(Debug, Default)]
pub struct ModifierState {
    ctrl: u8,
    alt: u8,
    shift: u8,
    super_key: u8,
}

impl ModifierState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_modifier(key: Key) -> bool {
        matches!(
            key,
            Key::KEY_LEFTCTRL
                | Key::KEY_RIGHTCTRL
                | Key::KEY_LEFTALT
                | Key::KEY_RIGHTALT
                | Key::KEY_LEFTSHIFT
                | Key::KEY_RIGHTSHIFT
                | Key::KEY_LEFTMETA
                | Key::KEY_RIGHTMETA
        )
    }

    pub fn to_modifiers(&self) -> Modifiers {
        Modifiers::new()
            .with_ctrl(self.ctrl > 0)
            .with_alt(self.alt > 0)
            .with_shift(self.shift > 0)
            .with_super(self.super_key > 0)
    }

    /// Обновляет счётчик модификатора; false для обычных клавиш
    pub fn update_key(&mut self, key: Key, pressed: bool) -> bool {
        let counter = match key {
            Key::KEY_LEFTCTRL | Key::KEY_RIGHTCTRL => &mut self.ctrl,
            Key::KEY_LEFTALT | Key::KEY_RIGHTALT => &mut self.alt,
            Key::KEY_LEFTSHIFT | Key::KEY_RIGHTSHIFT => &mut self.shift,
            Key::KEY_LEFTMETA | Key::KEY_RIGHTMETA => &mut self.super_key,
            _ => return false,
        };

        // Левый и правый модификатор держатся независимо
        *counter = if pressed {
            counter.saturating_add(1).min(2)
        } else {
            counter.saturating_sub(1)
        };
        true
    }
}
