//! Confirmation prompt shown before a selection switch would discard edits.

use std::fmt;
use std::future::{Future, Ready, ready};

use trellis_types::SelectionAxis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfirmChoice {
    /// Persist pending edits, then switch.
    Apply,
    /// Drop pending edits, then switch.
    Discard,
    /// Keep edits and stay on the current selection.
    Cancel,
}

impl ConfirmChoice {
    /// Options in presentation order.
    pub const ALL: [Self; 3] = [Self::Apply, Self::Discard, Self::Cancel];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Apply => "Apply",
            Self::Discard => "Reset",
            Self::Cancel => "Go Back",
        }
    }

    /// Interpret a typed answer: a label, a common synonym, its first letter,
    /// or a 1-based option number.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim().to_ascii_lowercase();
        match input.as_str() {
            "1" | "a" | "apply" => Some(Self::Apply),
            "2" | "r" | "reset" | "d" | "discard" => Some(Self::Discard),
            "3" | "b" | "back" | "go back" | "c" | "cancel" => Some(Self::Cancel),
            _ => None,
        }
    }
}

impl fmt::Display for ConfirmChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What the user is asked when a switch would lose `changed` pending edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmPrompt {
    changed: usize,
}

impl ConfirmPrompt {
    #[must_use]
    pub const fn new(changed: usize) -> Self {
        Self { changed }
    }

    #[must_use]
    pub const fn changed(&self) -> usize {
        self.changed
    }

    #[must_use]
    pub fn message(&self) -> String {
        let noun = if self.changed == 1 { "setting" } else { "settings" };
        format!(
            "You have {} modified {noun}. What do you want to do?",
            self.changed
        )
    }

    #[must_use]
    pub const fn options(&self) -> [ConfirmChoice; 3] {
        ConfirmChoice::ALL
    }
}

/// A switch held back until the open prompt is answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSwitch {
    pub axis: SelectionAxis,
    pub target: String,
}

/// Something that can put a [`ConfirmPrompt`] in front of the user.
pub trait Prompter {
    fn confirm(&mut self, prompt: &ConfirmPrompt) -> impl Future<Output = ConfirmChoice>;
}

/// Synchronous prompters, e.g. a fixed answer in tests.
impl<F> Prompter for F
where
    F: FnMut(&ConfirmPrompt) -> ConfirmChoice,
{
    fn confirm(&mut self, prompt: &ConfirmPrompt) -> Ready<ConfirmChoice> {
        ready(self(prompt))
    }
}
