//! Synthetic mouse input and the emergency-stop poll

use std::sync::Arc;

#[cfg(windows)]
use enigo::{Button, Direction, Enigo, Mouse, Settings};
#[cfg(windows)]
use once_cell::sync::Lazy;
#[cfg(windows)]
use parking_lot::Mutex;

use crate::utils::bot_state::SharedBotState;
use crate::utils::settings::MouseButton;

/// Boundary between the cycle controller and the outside world: issue
/// clicks and poll the emergency stop. Implemented by [`MouseActuator`] in
/// production and by scripted fakes in tests.
pub trait Actuator {
    fn click(&mut self, button: MouseButton);
    fn is_emergency_stop_pressed(&self) -> bool;
}

#[cfg(windows)]
/// Global mouse controller
static MOUSE: Lazy<Mutex<Enigo>> = Lazy::new(|| {
    Mutex::new(Enigo::new(&Settings::default()).expect("Failed to create Enigo for mouse"))
});

/// Click the given button at the current cursor position.
#[cfg(windows)]
pub fn click_button(button: MouseButton) {
    let enigo_button = match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
    };
    let mut mouse = MOUSE.lock();
    if let Err(e) = mouse.button(enigo_button, Direction::Click) {
        tracing::warn!("Failed to click {:?}: {:?}", button, e);
    }
}

#[cfg(not(windows))]
pub fn click_button(_button: MouseButton) {
    tracing::warn!("Click not implemented on this platform");
}

/// Production actuator: real clicks, emergency stop from the hotkey
/// listener via the shared state.
pub struct MouseActuator {
    state: Arc<SharedBotState>,
}

impl MouseActuator {
    pub fn new(state: Arc<SharedBotState>) -> Self {
        Self { state }
    }
}

impl Actuator for MouseActuator {
    fn click(&mut self, button: MouseButton) {
        click_button(button);
    }

    fn is_emergency_stop_pressed(&self) -> bool {
        self.state.is_emergency_stopped()
    }
}
