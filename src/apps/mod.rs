// Screens driven by the firmware main loop, and the semantic input they
// consume. Apps match on Action, never on Button.

pub mod hexview;
pub mod launcher;

use crate::drivers::input::{Button, Event};

/// Navigation command handed to a scrolling view once per step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    None,
    Next,
    Prev,
}

/// What one view step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Scrolled,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// List / content forward
    Next,
    /// List / content backward
    Prev,
    Select,
    Back,
}

impl Action {
    // A: Prev, hold for Back. B: Select. C: Next, hold to run.
    pub fn from_event(ev: Event) -> Option<Self> {
        match ev {
            Event::Press(Button::A) => Some(Action::Prev),
            Event::LongPress(Button::A) => Some(Action::Back),
            Event::Press(Button::B) => Some(Action::Select),
            Event::Press(Button::C) | Event::LongPress(Button::C) | Event::Repeat(Button::C) => {
                Some(Action::Next)
            }
            _ => None,
        }
    }

    pub fn nav(self) -> Nav {
        match self {
            Action::Next => Nav::Next,
            Action::Prev => Nav::Prev,
            Action::Select | Action::Back => Nav::None,
        }
    }
}
