//! Shared cell, version, and configuration types for Janus.
//!
//! This is the leaf crate: typed ids, cell content, versions, notebook
//! configurations, the persisted `janus` metadata objects, and the wire
//! bodies of the persistence server. It has **no internal janus
//! dependencies**.
//!
//! # Relationships
//!
//! ```text
//! Notebook
//!     └── metadata.janus: NotebookMeta (track_history, filepaths, janus_markers)
//!     └── cells (ordered)
//!           └── metadata.janus: CellMeta (CellId + Visibility + version ledger)
//!                 └── versions: Version (VersionId + CellContent)
//!
//! Persistence server
//!     └── timeline: NotebookConfiguration (active VersionIds + HideStates)
//! ```
//!
//! # Key Types
//!
//! |-------------------------------|------------------------------------------|
//! | Type                          | Purpose                                  |
//! |-------------------------------|------------------------------------------|
//! | [`CellId`]                    | Stable cell identity                     |
//! | [`VersionId`]                 | Server-assigned version id (empty=draft) |
//! | [`PathHash`]                  | Hashed notebook path                     |
//! | [`CellContent`]               | Source + outputs, the versioned unit     |
//! | [`Version`]                   | Immutable snapshot of a cell             |
//! | [`Visibility`]                | The three persisted hide flags           |
//! | [`HideState`]                 | `c`/`o`/`s`/`n` code in configurations   |
//! | [`NotebookConfiguration`]     | One timeline row                         |
//! | [`CellMeta`] / [`NotebookMeta`] | Persisted `janus` metadata             |
//! |-------------------------------|------------------------------------------|

pub mod cell;
pub mod config;
pub mod ids;
pub mod metadata;
pub mod version;
pub mod visibility;
pub mod wire;

pub use cell::{CellContent, CellKind, Output};
pub use config::{NotebookConfiguration, RowError};
pub use ids::{CellId, PathHash, VersionId};
pub use metadata::{CellMeta, DEFAULT_GROUP_LABEL, MarkerLabel, NotebookMeta, PathEntry};
pub use version::Version;
pub use visibility::{HideState, Visibility, VisibilityState};
pub use wire::{
    CellHistoryResponse, Comment, CommentsResponse, ConfigsResponse, PostBody, PostKind,
    PostResponse, VersionsResponse,
};

/// Current time as Unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
