//! Visibility flags and their derived states.
//!
//! ```text
//!                 ┌──────────────┐
//!                 │   Visible    │  n
//!                 └──────┬───────┘
//!          hide source   │   hide output
//!        ┌───────────────┴───────────────┐
//!        ▼                               ▼
//! SourceOnlyHidden  s             OutputOnlyHidden  o
//!        │ hide output                   │ hide source
//!        └───────────────┬───────────────┘
//!                        ▼
//!                  FullyHidden  c
//! ```
//!
//! `SourceAndOutputHidden` (both flags set without `cell_hidden`) only appears
//! in legacy files. Transitions always collapse it to `FullyHidden`.
//!
//! Invariant: `cell_hidden ⇒ source_hidden ∧ output_hidden`.

use serde::{Deserialize, Serialize};
use strum::EnumString;

/// The three persisted visibility flags of a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Visibility {
    #[serde(default)]
    pub cell_hidden: bool,
    #[serde(default)]
    pub source_hidden: bool,
    #[serde(default)]
    pub output_hidden: bool,
}

impl Visibility {
    pub const VISIBLE: Visibility = Visibility {
        cell_hidden: false,
        source_hidden: false,
        output_hidden: false,
    };

    pub const HIDDEN: Visibility = Visibility {
        cell_hidden: true,
        source_hidden: true,
        output_hidden: true,
    };

    /// Restore the invariant: a hidden cell has both parts hidden.
    pub fn normalized(self) -> Self {
        if self.cell_hidden {
            Self::HIDDEN
        } else {
            self
        }
    }

    pub fn holds_invariant(&self) -> bool {
        !self.cell_hidden || (self.source_hidden && self.output_hidden)
    }

    pub fn state(&self) -> VisibilityState {
        match (self.cell_hidden, self.source_hidden, self.output_hidden) {
            (true, _, _) => VisibilityState::FullyHidden,
            (false, false, false) => VisibilityState::Visible,
            (false, true, false) => VisibilityState::SourceOnlyHidden,
            (false, false, true) => VisibilityState::OutputOnlyHidden,
            (false, true, true) => VisibilityState::SourceAndOutputHidden,
        }
    }

    /// Any part hidden.
    pub fn any_hidden(&self) -> bool {
        self.cell_hidden || self.source_hidden || self.output_hidden
    }
}

/// Derived display state of a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VisibilityState {
    Visible,
    SourceOnlyHidden,
    OutputOnlyHidden,
    SourceAndOutputHidden,
    FullyHidden,
}

/// Single-letter hide code recorded in notebook configurations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
pub enum HideState {
    /// Whole cell hidden.
    #[serde(rename = "c")]
    #[strum(serialize = "c")]
    Cell,
    /// Output hidden.
    #[serde(rename = "o")]
    #[strum(serialize = "o")]
    Output,
    /// Source hidden.
    #[serde(rename = "s")]
    #[strum(serialize = "s")]
    Source,
    /// Nothing hidden.
    #[default]
    #[serde(rename = "n")]
    #[strum(serialize = "n")]
    None,
}

impl HideState {
    pub fn as_char(&self) -> char {
        match self {
            HideState::Cell => 'c',
            HideState::Output => 'o',
            HideState::Source => 's',
            HideState::None => 'n',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'c' => Some(HideState::Cell),
            'o' => Some(HideState::Output),
            's' => Some(HideState::Source),
            'n' => Some(HideState::None),
            _ => None,
        }
    }

    pub fn shows_source(&self) -> bool {
        matches!(self, HideState::None | HideState::Output)
    }

    pub fn shows_output(&self) -> bool {
        matches!(self, HideState::None | HideState::Source)
    }
}

impl From<Visibility> for HideState {
    fn from(v: Visibility) -> Self {
        match v.state() {
            VisibilityState::FullyHidden | VisibilityState::SourceAndOutputHidden => HideState::Cell,
            VisibilityState::OutputOnlyHidden => HideState::Output,
            VisibilityState::SourceOnlyHidden => HideState::Source,
            VisibilityState::Visible => HideState::None,
        }
    }
}

impl From<HideState> for Visibility {
    fn from(h: HideState) -> Self {
        match h {
            HideState::Cell => Visibility::HIDDEN,
            HideState::Output => Visibility {
                output_hidden: true,
                ..Visibility::VISIBLE
            },
            HideState::Source => Visibility {
                source_hidden: true,
                ..Visibility::VISIBLE
            },
            HideState::None => Visibility::VISIBLE,
        }
    }
}

impl std::fmt::Display for HideState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}
