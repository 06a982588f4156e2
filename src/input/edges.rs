//! Per-tick button edge detection
//!
//! Each logical button carries two live outputs (`down`, `up`) and two sticky
//! latches (`down_reported`, `up_reported`). A raw level change produces an
//! edge on the first tick that samples it and on no later tick.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical buttons, uniform across every supported controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    A,
    B,
    Up,
    Down,
    Left,
    Right,
    Plus,
    Minus,
    Home,
    One,
    Two,
    Z,
    C,
}

impl Button {
    pub const ALL: [Button; 13] = [
        Button::A,
        Button::B,
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::Plus,
        Button::Minus,
        Button::Home,
        Button::One,
        Button::Two,
        Button::Z,
        Button::C,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Anything that can report the raw level of a logical button
pub trait ButtonSource {
    fn button(&self, button: Button) -> bool;
}

/// Where a button sits in the edge state machine after the last tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeState {
    ReleasedReported,
    PressedPending,
    PressedReported,
    ReleasedPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ButtonEdge {
    pressed: bool,
    down: bool,
    up: bool,
    down_reported: bool,
    up_reported: bool,
}

impl ButtonEdge {
    /// `Released-Reported`: a release is already reported, no press is pending
    const RELEASED: ButtonEdge = ButtonEdge {
        pressed: false,
        down: false,
        up: false,
        down_reported: false,
        up_reported: true,
    };

    fn sample(&mut self, pressed: bool) {
        self.pressed = pressed;
        if pressed {
            self.down = !self.down_reported;
            self.down_reported = true;
            self.up = false;
            self.up_reported = false;
        } else {
            self.up = !self.up_reported;
            self.up_reported = true;
            self.down = false;
            self.down_reported = false;
        }
    }

    fn state(&self) -> EdgeState {
        match (self.pressed, self.down, self.up) {
            (true, true, _) => EdgeState::PressedPending,
            (true, false, _) => EdgeState::PressedReported,
            (false, _, true) => EdgeState::ReleasedPending,
            (false, _, false) => EdgeState::ReleasedReported,
        }
    }
}

/// Edge state for every logical button of one controller
#[derive(Debug, Clone)]
pub struct ButtonEdgeTracker {
    buttons: [ButtonEdge; Button::ALL.len()],
}

impl Default for ButtonEdgeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ButtonEdgeTracker {
    pub fn new() -> Self {
        Self {
            buttons: [ButtonEdge::RELEASED; Button::ALL.len()],
        }
    }

    /// Sample every button once. `None` means no controller: every output
    /// clears and every latch returns to `Released-Reported`.
    pub fn tick(&mut self, source: Option<&dyn ButtonSource>) {
        match source {
            Some(source) => {
                for button in Button::ALL {
                    self.buttons[button.index()].sample(source.button(button));
                }
            }
            None => self.reset(),
        }
    }

    pub fn reset(&mut self) {
        self.buttons = [ButtonEdge::RELEASED; Button::ALL.len()];
    }

    /// Level sampled on the last tick
    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons[button.index()].pressed
    }

    /// Pressed on this tick
    pub fn is_down(&self, button: Button) -> bool {
        self.buttons[button.index()].down
    }

    /// Released on this tick
    pub fn is_up(&self, button: Button) -> bool {
        self.buttons[button.index()].up
    }

    pub fn state(&self, button: Button) -> EdgeState {
        self.buttons[button.index()].state()
    }
}
