//! Button edge detection between two consecutive snapshots.

use serde::Serialize;

use crate::input::{Button, ButtonSet, InputSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonTransition {
    #[default]
    NoChange,
    Pressed,
    Released,
}

/// Per-button transitions from one snapshot to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonDelta([ButtonTransition; Button::COUNT]);

impl ButtonDelta {
    pub fn between(prev: &InputSnapshot, next: &InputSnapshot) -> Self {
        Self::between_sets(prev.buttons(), next.buttons())
    }

    pub fn between_sets(prev: ButtonSet, next: ButtonSet) -> Self {
        let mut transitions = [ButtonTransition::NoChange; Button::COUNT];
        for button in Button::ALL {
            transitions[button.index()] = match (prev.get(button), next.get(button)) {
                (false, true) => ButtonTransition::Pressed,
                (true, false) => ButtonTransition::Released,
                _ => ButtonTransition::NoChange,
            };
        }
        Self(transitions)
    }

    pub fn get(&self, button: Button) -> ButtonTransition {
        self.0[button.index()]
    }

    pub fn has_changes(&self) -> bool {
        self.0.iter().any(|&t| t != ButtonTransition::NoChange)
    }

    /// Buttons that changed, in [`Button::ALL`] order.
    pub fn changes(&self) -> impl Iterator<Item = (Button, ButtonTransition)> + '_ {
        Button::ALL
            .into_iter()
            .map(|b| (b, self.get(b)))
            .filter(|&(_, t)| t != ButtonTransition::NoChange)
    }

    pub fn pressed(&self) -> impl Iterator<Item = Button> + '_ {
        self.changes()
            .filter(|&(_, t)| t == ButtonTransition::Pressed)
            .map(|(b, _)| b)
    }

    pub fn released(&self) -> impl Iterator<Item = Button> + '_ {
        self.changes()
            .filter(|&(_, t)| t == ButtonTransition::Released)
            .map(|(b, _)| b)
    }

    pub fn was_pressed(&self, button: Button) -> bool {
        self.get(button) == ButtonTransition::Pressed
    }
}
