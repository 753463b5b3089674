use crate::events;
use evdev::KeyCode;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Таблица соответствия имён клавиш конфигурации и кодов evdev.
/// Первое имя для кода считается каноническим (используется при выводе).
static KEY_TABLE: &[(&str, KeyCode)] = &[
    // Буквенные клавиши
    ("a", KeyCode::KEY_A),
    ("b", KeyCode::KEY_B),
    ("c", KeyCode::KEY_C),
    ("d", KeyCode::KEY_D),
    ("e", KeyCode::KEY_E),
    ("f", KeyCode::KEY_F),
    ("g", KeyCode::KEY_G),
    ("h", KeyCode::KEY_H),
    ("i", KeyCode::KEY_I),
    ("j", KeyCode::KEY_J),
    ("k", KeyCode::KEY_K),
    ("l", KeyCode::KEY_L),
    ("m", KeyCode::KEY_M),
    ("n", KeyCode::KEY_N),
    ("o", KeyCode::KEY_O),
    ("p", KeyCode::KEY_P),
    ("q", KeyCode::KEY_Q),
    ("r", KeyCode::KEY_R),
    ("s", KeyCode::KEY_S),
    ("t", KeyCode::KEY_T),
    ("u", KeyCode::KEY_U),
    ("v", KeyCode::KEY_V),
    ("w", KeyCode::KEY_W),
    ("x", KeyCode::KEY_X),
    ("y", KeyCode::KEY_Y),
    ("z", KeyCode::KEY_Z),

    // Цифровые клавиши (верхний ряд)
    ("0", KeyCode::KEY_0),
    ("1", KeyCode::KEY_1),
    ("2", KeyCode::KEY_2),
    ("3", KeyCode::KEY_3),
    ("4", KeyCode::KEY_4),
    ("5", KeyCode::KEY_5),
    ("6", KeyCode::KEY_6),
    ("7", KeyCode::KEY_7),
    ("8", KeyCode::KEY_8),
    ("9", KeyCode::KEY_9),

    // Функциональные клавиши, включая F13-F24
    ("f1", KeyCode::KEY_F1),
    ("f2", KeyCode::KEY_F2),
    ("f3", KeyCode::KEY_F3),
    ("f4", KeyCode::KEY_F4),
    ("f5", KeyCode::KEY_F5),
    ("f6", KeyCode::KEY_F6),
    ("f7", KeyCode::KEY_F7),
    ("f8", KeyCode::KEY_F8),
    ("f9", KeyCode::KEY_F9),
    ("f10", KeyCode::KEY_F10),
    ("f11", KeyCode::KEY_F11),
    ("f12", KeyCode::KEY_F12),
    ("f13", KeyCode::KEY_F13),
    ("f14", KeyCode::KEY_F14),
    ("f15", KeyCode::KEY_F15),
    ("f16", KeyCode::KEY_F16),
    ("f17", KeyCode::KEY_F17),
    ("f18", KeyCode::KEY_F18),
    ("f19", KeyCode::KEY_F19),
    ("f20", KeyCode::KEY_F20),
    ("f21", KeyCode::KEY_F21),
    ("f22", KeyCode::KEY_F22),
    ("f23", KeyCode::KEY_F23),
    ("f24", KeyCode::KEY_F24),

    // Специальные клавиши и пунктуация
    ("space", KeyCode::KEY_SPACE),
    ("enter", KeyCode::KEY_ENTER),
    ("tab", KeyCode::KEY_TAB),
    ("esc", KeyCode::KEY_ESC),
    ("backspace", KeyCode::KEY_BACKSPACE),
    ("capslock", KeyCode::KEY_CAPSLOCK),
    ("minus", KeyCode::KEY_MINUS),
    ("equal", KeyCode::KEY_EQUAL),
    ("leftbrace", KeyCode::KEY_LEFTBRACE),
    ("rightbrace", KeyCode::KEY_RIGHTBRACE),
    ("semicolon", KeyCode::KEY_SEMICOLON),
    ("apostrophe", KeyCode::KEY_APOSTROPHE),
    ("grave", KeyCode::KEY_GRAVE),
    ("backslash", KeyCode::KEY_BACKSLASH),
    ("comma", KeyCode::KEY_COMMA),
    ("dot", KeyCode::KEY_DOT),
    ("slash", KeyCode::KEY_SLASH),

    // Навигация и системные клавиши
    ("up", KeyCode::KEY_UP),
    ("down", KeyCode::KEY_DOWN),
    ("left", KeyCode::KEY_LEFT),
    ("right", KeyCode::KEY_RIGHT),
    ("insert", KeyCode::KEY_INSERT),
    ("delete", KeyCode::KEY_DELETE),
    ("home", KeyCode::KEY_HOME),
    ("end", KeyCode::KEY_END),
    ("pageup", KeyCode::KEY_PAGEUP),
    ("pagedown", KeyCode::KEY_PAGEDOWN),
    ("printscreen", KeyCode::KEY_SYSRQ),
    ("scrolllock", KeyCode::KEY_SCROLLLOCK),
    ("pause", KeyCode::KEY_PAUSE),

    // Модификаторы
    ("leftctrl", KeyCode::KEY_LEFTCTRL),
    ("rightctrl", KeyCode::KEY_RIGHTCTRL),
    ("leftshift", KeyCode::KEY_LEFTSHIFT),
    ("rightshift", KeyCode::KEY_RIGHTSHIFT),
    ("leftalt", KeyCode::KEY_LEFTALT),
    ("rightalt", KeyCode::KEY_RIGHTALT),
    ("leftmeta", KeyCode::KEY_LEFTMETA),
    ("rightmeta", KeyCode::KEY_RIGHTMETA),

    // Мультимедиа и браузер
    ("volumeup", KeyCode::KEY_VOLUMEUP),
    ("volumedown", KeyCode::KEY_VOLUMEDOWN),
    ("mute", KeyCode::KEY_MUTE),
    ("playpause", KeyCode::KEY_PLAYPAUSE),
    ("nextsong", KeyCode::KEY_NEXTSONG),
    ("previoussong", KeyCode::KEY_PREVIOUSSONG),
    ("back", KeyCode::KEY_BACK),
    ("forward", KeyCode::KEY_FORWARD),
    ("refresh", KeyCode::KEY_REFRESH),
];

/// Псевдонимы, которые принимаются в конфигурации, но не выводятся
static KEY_ALIASES: &[(&str, &str)] = &[
    ("escape", "esc"),
    ("return", "enter"),
    ("period", "dot"),
    ("pgup", "pageup"),
    ("pgdn", "pagedown"),
    ("ctrl", "leftctrl"),
    ("shift", "leftshift"),
    ("alt", "leftalt"),
    ("super", "leftmeta"),
    ("meta", "leftmeta"),
];

static NAME_TO_CODE: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    let mut map: HashMap<&'static str, u16> = KEY_TABLE
        .iter()
        .map(|(name, key)| (*name, key.code()))
        .collect();
    for (alias, target) in KEY_ALIASES {
        if let Some(code) = map.get(target).copied() {
            map.insert(*alias, code);
        }
    }
    map
});

static CODE_TO_NAME: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (name, key) in KEY_TABLE {
        map.entry(key.code()).or_insert(*name);
    }
    map
});

/// Получить evdev код клавиши по её имени (регистронезависимо)
pub fn key_code(name: &str) -> Option<events::KeyCode> {
    let normalized = name.trim().to_lowercase();
    NAME_TO_CODE
        .get(normalized.as_str())
        .map(|code| events::KeyCode(*code))
}

/// Каноническое имя клавиши по коду evdev
pub fn key_name(code: events::KeyCode) -> Option<&'static str> {
    CODE_TO_NAME.get(&code.value()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_keys() {
        assert_eq!(key_code("f13"), Some(KeyCode::KEY_F13.into()));
        assert_eq!(key_code("F24"), Some(KeyCode::KEY_F24.into()));
        assert_eq!(key_name(KeyCode::KEY_F22.into()), Some("f22"));
    }

    #[test]
    fn test_aliases_resolve_but_are_not_canonical() {
        assert_eq!(key_code("escape"), key_code("esc"));
        assert_eq!(key_code("super"), Some(KeyCode::KEY_LEFTMETA.into()));
        assert_eq!(key_name(KeyCode::KEY_LEFTMETA.into()), Some("leftmeta"));
    }

    #[test]
    fn test_unknown_key() {
        assert_eq!(key_code("hyper"), None);
        assert_eq!(key_name(events::KeyCode(0x2ff)), None);
    }

    #[test]
    fn test_every_name_round_trips_to_itself() {
        for (name, key) in KEY_TABLE {
            assert_eq!(key_name((*key).into()), Some(*name), "клавиша {}", name);
        }
    }
}
