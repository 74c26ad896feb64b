//! Janus core: cell visibility and version history for notebook documents.
//!
//! Everything here is synchronous and single-owner. The host integration
//! layer drives one [`NotebookSession`] per open document through explicit
//! lifecycle hooks; the only suspension points are calls into the
//! [`JanusBackend`] persistence seam.
//!
//! # Components
//!
//! |-------------------------|-----------------------------------------------|
//! | Component               | Responsibility                                |
//! |-------------------------|-----------------------------------------------|
//! | [`IdentityRegistry`]    | Stable, unique, never-copied cell ids         |
//! | [`Toggle`]              | Visibility transitions over the three flags   |
//! | [`MirrorPanel`]         | Out-of-line views of hidden cells             |
//! | [`VersionLedger`]       | Per-cell snapshots, naming, dedup, markers    |
//! | [`HistoryReconstructor`]| Past notebook states from the timeline        |
//! | [`ActionInterceptor`]   | Action reports with post-mutation snapshots   |
//! | [`DisplayIndex`]        | Derived display state, rebuilt after changes  |
//! | [`NotebookSession`]     | Owns all of the above for one document        |
//! |-------------------------|-----------------------------------------------|
//!
//! # Flow
//!
//! ```text
//! user action ─▶ session op ─▶ model mutation ─▶ DisplayIndex::build ─▶ changed ids
//!                                   │
//!                                   └─▶ outbox (PostBody) ─▶ reporter ─▶ JanusBackend
//! ```

mod backend;
mod display;
mod error;
mod groups;
mod history;
mod interceptor;
mod ledger;
mod mirror;
mod notebook;
mod registry;
mod session;
mod visibility;

pub use backend::{JanusBackend, load_cell_history, load_timeline};
pub use display::{CellDisplay, DisplayIndex, MirrorDisplay, document_groups};
pub use error::{JanusError, Result};
pub use groups::{Group, GroupMember, compute_groups, marker_labels, normalize_label};
pub use history::{
    GoToTicket, HistoryReconstructor, HistoryView, RenderedRevision, ScrollTarget, describe_age,
};
pub use interceptor::{
    ACTION_PREFIX, ActionInterceptor, ActionPlan, ActionRecord, ExecToken, PendingAction,
    TRACKED_ACTIONS, TokenIssuer, defers_until_executed, is_tracked, normalize_action,
};
pub use ledger::{
    CONDENSED_UNNAMED_MARKERS, ExtraMarker, MarkerPlan, RenderableVersion, RenderableVersions,
    VersionLedger,
};
pub use mirror::{Mirror, MirrorPanel, PanelChange, Surface};
pub use notebook::{Cell, Notebook, Selection};
pub use registry::IdentityRegistry;
pub use session::{Applied, NotebookSession, StructuralChange};
pub use visibility::{Direction, Toggle};
