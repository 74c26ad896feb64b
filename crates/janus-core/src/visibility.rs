//! Visibility transitions.
//!
//! Three user operations drive the per-cell flag machine. The primary
//! selected cell decides the direction for the whole selection; each selected
//! cell then transitions independently according to its own flags and output
//! count.
//!
//! | operation       | direction from primary | reveal                          | hide                                  |
//! |-----------------|------------------------|---------------------------------|---------------------------------------|
//! | `toggle_cell`   | `cell_hidden`          | everything shown                | everything hidden                     |
//! | `toggle_source` | `source_hidden`        | source only if output hidden and outputs exist, else everything | whole cell if output hidden or no outputs, else source |
//! | `toggle_output` | `output_hidden`        | output only if source hidden, else everything | whole cell if source hidden, else output |
//!
//! `toggle_output` is a no-op for a cell without outputs. Every result is
//! normalized so that `cell_hidden ⇒ source_hidden ∧ output_hidden`.

use janus_types::Visibility;

/// Which toggle was invoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Toggle {
    Cell,
    Source,
    Output,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Reveal,
    Hide,
}

impl Toggle {
    /// Direction chosen by the primary selected cell's flags.
    pub fn direction(self, primary: Visibility) -> Direction {
        let hidden = match self {
            Toggle::Cell => primary.cell_hidden,
            Toggle::Source => primary.source_hidden,
            Toggle::Output => primary.output_hidden,
        };
        if hidden {
            Direction::Reveal
        } else {
            Direction::Hide
        }
    }

    /// Name of the log event emitted for this transition.
    pub fn log_name(self, direction: Direction) -> &'static str {
        match (self, direction) {
            (Toggle::Cell, Direction::Reveal) => "show-cells",
            (Toggle::Cell, Direction::Hide) => "hide-cells",
            (Toggle::Source, Direction::Reveal) => "show-source",
            (Toggle::Source, Direction::Hide) => "hide-source",
            (Toggle::Output, Direction::Reveal) => "show-output",
            (Toggle::Output, Direction::Hide) => "hide-output",
        }
    }

    /// Next flags for one cell.
    pub fn apply(self, direction: Direction, flags: Visibility, output_count: usize) -> Visibility {
        let next = match self {
            Toggle::Cell => match direction {
                Direction::Reveal => Visibility::VISIBLE,
                Direction::Hide => Visibility::HIDDEN,
            },
            Toggle::Source => toggle_source(direction, flags, output_count),
            Toggle::Output => toggle_output(direction, flags, output_count),
        };
        next.normalized()
    }
}

fn toggle_source(direction: Direction, flags: Visibility, output_count: usize) -> Visibility {
    match direction {
        Direction::Reveal if flags.output_hidden && output_count > 0 => Visibility {
            cell_hidden: false,
            source_hidden: false,
            output_hidden: true,
        },
        Direction::Reveal => Visibility::VISIBLE,
        Direction::Hide if flags.output_hidden || output_count == 0 => Visibility::HIDDEN,
        Direction::Hide => Visibility {
            source_hidden: true,
            ..flags
        },
    }
}

fn toggle_output(direction: Direction, flags: Visibility, output_count: usize) -> Visibility {
    if output_count == 0 {
        return flags;
    }
    match direction {
        Direction::Reveal if flags.source_hidden => Visibility {
            cell_hidden: false,
            source_hidden: true,
            output_hidden: false,
        },
        Direction::Reveal => Visibility::VISIBLE,
        Direction::Hide if flags.source_hidden => Visibility::HIDDEN,
        Direction::Hide => Visibility {
            output_hidden: true,
            ..flags
        },
    }
}

// ============================================================================
// Tests
// ============================================================================
