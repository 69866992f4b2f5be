//! Keyboard sampling for local movement

use log::debug;
use macroquad::prelude::*;
use shared::InputState;

/// Samples the movement keys once per frame
pub struct InputManager {
    previous: InputState,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            previous: InputState::default(),
        }
    }

    /// Reads WASD and the arrow keys.
    pub fn update(&mut self) -> InputState {
        let input = InputState {
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
            up: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            down: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
        };

        if input != self.previous {
            debug!("Input changed: {:?}", input);
            self.previous = input;
        }
        input
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}
