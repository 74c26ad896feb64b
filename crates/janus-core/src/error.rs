//! Error types for notebook bookkeeping operations.

use thiserror::Error;

use janus_types::CellId;

use crate::mirror::Surface;

/// Errors that can occur while tracking visibility and versions.
#[derive(Error, Debug)]
pub enum JanusError {
    /// Cell not found in the notebook.
    #[error("cell not found: {0:?}")]
    CellNotFound(CellId),

    /// The cell's version ledger is empty.
    #[error("no versions recorded for this cell")]
    NoVersions,

    /// A cell must keep at least one version once versioning starts.
    #[error("cannot delete the last remaining version")]
    LastVersion,

    /// Version index out of bounds.
    #[error("version index {index} out of bounds for ledger with {len} versions")]
    VersionOutOfRange { index: usize, len: usize },

    /// Revision index out of bounds for the loaded timeline.
    #[error("revision {index} out of bounds for timeline with {len} revisions")]
    RevisionOutOfRange { index: usize, len: usize },

    /// Group index out of bounds for the current document.
    #[error("group {index} out of bounds, document has {len} groups")]
    GroupOutOfRange { index: usize, len: usize },

    /// An edit arrived from the surface that does not hold focus.
    #[error("{surface:?} of cell {cell:?} is not the focused editing surface")]
    SurfaceNotEditable { cell: CellId, surface: Surface },

    /// History views are read-only.
    #[error("history views are read-only")]
    HistoryReadOnly,

    /// The notebook JSON does not have the expected shape.
    #[error("malformed notebook: {0}")]
    MalformedNotebook(String),

    /// The persistence collaborator failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for Janus operations.
pub type Result<T> = std::result::Result<T, JanusError>;
