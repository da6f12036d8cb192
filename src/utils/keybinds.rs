//! Hotkey name parsing for the start and emergency-stop keys

use global_hotkey::hotkey::Code;

/// Convert a key name from the settings file to a global_hotkey `Code`.
/// Accepts single letters/digits, `F1`-`F12` and a few special names.
pub fn string_to_code(key: &str) -> Option<Code> {
    let key_upper = key.trim().to_uppercase();

    match key_upper.as_str() {
        "ESC" | "ESCAPE" => return Some(Code::Escape),
        "ENTER" | "RETURN" => return Some(Code::Enter),
        "SPACE" => return Some(Code::Space),
        "TAB" => return Some(Code::Tab),
        "BACKSPACE" => return Some(Code::Backspace),
        "UP" => return Some(Code::ArrowUp),
        "DOWN" => return Some(Code::ArrowDown),
        "LEFT" => return Some(Code::ArrowLeft),
        "RIGHT" => return Some(Code::ArrowRight),
        "MINUS" | "-" => return Some(Code::Minus),
        _ => {}
    }

    if let Some(n) = key_upper.strip_prefix('F').and_then(|n| n.parse::<u8>().ok()) {
        return match n {
            1 => Some(Code::F1),
            2 => Some(Code::F2),
            3 => Some(Code::F3),
            4 => Some(Code::F4),
            5 => Some(Code::F5),
            6 => Some(Code::F6),
            7 => Some(Code::F7),
            8 => Some(Code::F8),
            9 => Some(Code::F9),
            10 => Some(Code::F10),
            11 => Some(Code::F11),
            12 => Some(Code::F12),
            _ => None,
        };
    }

    if key_upper.len() == 1 {
        let c = key_upper.chars().next()?;
        return match c {
            'A' => Some(Code::KeyA),
            'B' => Some(Code::KeyB),
            'C' => Some(Code::KeyC),
            'D' => Some(Code::KeyD),
            'E' => Some(Code::KeyE),
            'F' => Some(Code::KeyF),
            'G' => Some(Code::KeyG),
            'H' => Some(Code::KeyH),
            'I' => Some(Code::KeyI),
            'J' => Some(Code::KeyJ),
            'K' => Some(Code::KeyK),
            'L' => Some(Code::KeyL),
            'M' => Some(Code::KeyM),
            'N' => Some(Code::KeyN),
            'O' => Some(Code::KeyO),
            'P' => Some(Code::KeyP),
            'Q' => Some(Code::KeyQ),
            'R' => Some(Code::KeyR),
            'S' => Some(Code::KeyS),
            'T' => Some(Code::KeyT),
            'U' => Some(Code::KeyU),
            'V' => Some(Code::KeyV),
            'W' => Some(Code::KeyW),
            'X' => Some(Code::KeyX),
            'Y' => Some(Code::KeyY),
            'Z' => Some(Code::KeyZ),
            '0' => Some(Code::Digit0),
            '1' => Some(Code::Digit1),
            '2' => Some(Code::Digit2),
            '3' => Some(Code::Digit3),
            '4' => Some(Code::Digit4),
            '5' => Some(Code::Digit5),
            '6' => Some(Code::Digit6),
            '7' => Some(Code::Digit7),
            '8' => Some(Code::Digit8),
            '9' => Some(Code::Digit9),
            _ => None,
        };
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_code() {
        assert_eq!(string_to_code("F9"), Some(Code::F9));
        assert_eq!(string_to_code("f10"), Some(Code::F10));
        assert_eq!(string_to_code("a"), Some(Code::KeyA));
        assert_eq!(string_to_code("-"), Some(Code::Minus));
        assert_eq!(string_to_code("esc"), Some(Code::Escape));
        assert_eq!(string_to_code("F13"), None);
        assert_eq!(string_to_code("not-a-key"), None);
    }
}
