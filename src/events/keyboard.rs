use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Состояние клавиши
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    Pressed,
    Released,
    Repeat,
}

impl KeyState {
    /// Значение evdev: 0 отпускание, 1 нажатие, 2 автоповтор
    pub fn from_evdev_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(KeyState::Released),
            1 => Some(KeyState::Pressed),
            2 => Some(KeyState::Repeat),
            _ => None,
        }
    }

    pub fn evdev_value(&self) -> i32 {
        match self {
            KeyState::Released => 0,
            KeyState::Pressed => 1,
            KeyState::Repeat => 2,
        }
    }
}

/// Код клавиши (evdev коды)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub fn new(code: u16) -> Self {
        Self(code)
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

impl From<evdev::KeyCode> for KeyCode {
    fn from(key: evdev::KeyCode) -> Self {
        Self(key.code())
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match crate::mappings::key_name(*self) {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "KEY_{}", self.0),
        }
    }
}

/// Модификаторы клавиш
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub super_key: bool,
}

impl Modifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ctrl(mut self, ctrl: bool) -> Self {
        self.ctrl = ctrl;
        self
    }

    pub fn with_alt(mut self, alt: bool) -> Self {
        self.alt = alt;
        self
    }

    pub fn with_shift(mut self, shift: bool) -> Self {
        self.shift = shift;
        self
    }

    pub fn with_super(mut self, super_key: bool) -> Self {
        self.super_key = super_key;
        self
    }

    pub fn is_empty(&self) -> bool {
        !self.ctrl && !self.alt && !self.shift && !self.super_key
    }

    pub fn to_vec(&self) -> Vec<String> {
        let mut result = Vec::new();
        if self.ctrl { result.push("ctrl".to_string()); }
        if self.alt { result.push("alt".to_string()); }
        if self.shift { result.push("shift".to_string()); }
        if self.super_key { result.push("super".to_string()); }
        result
    }

    /// Неизвестные имена игнорируются; валидация имён выполняется в Config::validate
    pub fn from_vec(modifiers: &[String]) -> Self {
        let mut result = Self::new();
        for modifier in modifiers {
            match modifier.as_str() {
                "ctrl" => result.ctrl = true,
                "alt" => result.alt = true,
                "shift" => result.shift = true,
                "super" => result.super_key = true,
                _ => {}
            }
        }
        result
    }

    /// Коды левых модификаторов в порядке нажатия: ctrl, shift, alt, super
    pub fn key_codes(&self) -> SmallVec<[KeyCode; 4]> {
        let mut codes = SmallVec::new();
        if self.ctrl { codes.push(evdev::KeyCode::KEY_LEFTCTRL.into()); }
        if self.shift { codes.push(evdev::KeyCode::KEY_LEFTSHIFT.into()); }
        if self.alt { codes.push(evdev::KeyCode::KEY_LEFTALT.into()); }
        if self.super_key { codes.push(evdev::KeyCode::KEY_LEFTMETA.into()); }
        codes
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let modifiers = self.to_vec();
        if modifiers.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", modifiers.join("+"))
        }
    }
}

/// Синтетическая комбинация: модификаторы + одна клавиша
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub modifiers: Modifiers,
    pub key: KeyCode,
}

impl KeyCombo {
    pub fn new(modifiers: Modifiers, key: impl Into<KeyCode>) -> Self {
        Self {
            modifiers,
            key: key.into(),
        }
    }

    pub fn key(key: impl Into<KeyCode>) -> Self {
        Self::new(Modifiers::new(), key)
    }

    /// Последовательность событий: модификаторы вниз, клавиша вниз/вверх,
    /// модификаторы вверх в обратном порядке
    pub fn event_sequence(&self) -> SmallVec<[(KeyCode, KeyState); 10]> {
        let mods = self.modifiers.key_codes();
        let mut sequence = SmallVec::new();
        for code in &mods {
            sequence.push((*code, KeyState::Pressed));
        }
        sequence.push((self.key, KeyState::Pressed));
        sequence.push((self.key, KeyState::Released));
        for code in mods.iter().rev() {
            sequence.push((*code, KeyState::Released));
        }
        sequence
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}+{}", self.modifiers, self.key)
        }
    }
}
