//! Action tracking.
//!
//! The host calls [`ActionInterceptor::begin`] at its action dispatch point.
//! Allow-listed actions have their timestamp and selection captured before
//! the action runs; the notebook snapshot is taken afterwards, so a report
//! always reflects post-mutation state.
//!
//! ```text
//! begin(name) ──▶ Untracked                         (pass through)
//!             ──▶ Immediate(pending) ─ host acts ─▶ complete(pending) ─▶ record
//!             ──▶ AwaitExecution{token} ─ host runs ─▶ on_execution_complete(token) ─▶ record
//! ```
//!
//! Execution completion is matched by an explicit [`ExecToken`]. Unknown,
//! duplicate, and out-of-order completions are ignored; completions that
//! never arrive are dropped by [`ActionInterceptor::expire`].

use std::collections::HashMap;

use serde_json::Value;

use janus_types::{CellId, CellKind, PostBody};

use crate::notebook::{Notebook, Selection};

/// Prefix host action names may carry.
pub const ACTION_PREFIX: &str = "jupyter-notebook:";

/// Host actions that are reported.
pub const TRACKED_ACTIONS: &[&str] = &[
    "run-cell",
    "run-cell-and-select-next",
    "run-cell-and-insert-below",
    "run-all-cells",
    "run-all-cells-above",
    "run-all-cells-below",
    "confirm-restart-kernel-and-run-all-cells",
    "delete-cell",
    "undo-cell-deletion",
    "split-cell-at-cursor",
    "merge-cell-with-previous-cell",
    "merge-cell-with-next-cell",
    "merge-selected-cells",
    "merge-cells",
    "insert-cell-above",
    "insert-cell-below",
    "move-cell-down",
    "move-cell-up",
    "change-cell-to-markdown",
    "change-cell-to-code",
    "change-cell-to-raw",
    "clear-cell-output",
    "restart-kernel-and-clear-output",
    "confirm-restart-kernel-and-clear-output",
    "toggle-cell-output-collapsed",
    "toggle-cell-output-scrolled",
    "cut-cell",
    "copy-cell",
    "paste-cell-above",
    "paste-cell-below",
    "paste-cell-replace",
    "save-notebook",
];

/// Correlates an execution request with its completion event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecToken(u64);

impl ExecToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ExecToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exec#{}", self.0)
    }
}

/// Issues monotonically increasing tokens.
#[derive(Debug, Default)]
pub struct TokenIssuer {
    next: u64,
}

impl TokenIssuer {
    pub fn issue(&mut self) -> ExecToken {
        self.next += 1;
        ExecToken(self.next)
    }
}

/// An action captured at dispatch, waiting for its snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingAction {
    pub name: String,
    pub time: u64,
    pub selection: Selection,
}

/// What the host should do with an action.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionPlan {
    /// Not tracked; no bookkeeping.
    Untracked,
    /// Report once the host has performed the action.
    Immediate(PendingAction),
    /// Report when the execution identified by `token` completes.
    AwaitExecution { token: ExecToken },
}

/// A reportable action: `(timestamp, name, primary id, selection, snapshot)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionRecord {
    pub time: u64,
    pub name: String,
    pub index: Option<CellId>,
    pub indices: Vec<CellId>,
    pub model: Value,
}

impl From<ActionRecord> for PostBody {
    fn from(r: ActionRecord) -> Self {
        PostBody::action(r.time, r.name, r.index, r.indices, r.model)
    }
}

/// Strip the host prefix from an action name.
pub fn normalize_action(name: &str) -> &str {
    name.strip_prefix(ACTION_PREFIX).unwrap_or(name)
}

pub fn is_tracked(name: &str) -> bool {
    TRACKED_ACTIONS.contains(&normalize_action(name))
}

/// Whether reporting must wait for execution to finish.
pub fn defers_until_executed(name: &str, primary_kind: Option<CellKind>) -> bool {
    let name = normalize_action(name);
    name == "confirm-restart-kernel-and-run-all-cells"
        || (name.starts_with("run") && primary_kind == Some(CellKind::Code))
}

/// Wraps the host's action dispatch.
#[derive(Debug)]
pub struct ActionInterceptor {
    enabled: bool,
    awaiting: HashMap<ExecToken, PendingAction>,
}

impl Default for ActionInterceptor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ActionInterceptor {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            awaiting: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turning tracking off also forgets actions awaiting execution.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.awaiting.clear();
        }
    }

    pub fn pending_count(&self) -> usize {
        self.awaiting.len()
    }

    /// Capture an action at dispatch time.
    pub fn begin(
        &mut self,
        name: &str,
        selection: &Selection,
        primary_kind: Option<CellKind>,
        tokens: &mut TokenIssuer,
        now: u64,
    ) -> ActionPlan {
        if !self.enabled || !is_tracked(name) {
            return ActionPlan::Untracked;
        }
        let pending = PendingAction {
            name: normalize_action(name).to_string(),
            time: now,
            selection: selection.clone(),
        };
        if defers_until_executed(name, primary_kind) {
            let token = tokens.issue();
            tracing::debug!(action = %pending.name, %token, "deferring action report");
            self.awaiting.insert(token, pending);
            ActionPlan::AwaitExecution { token }
        } else {
            ActionPlan::Immediate(pending)
        }
    }

    /// Finish an immediate action after the host performed it.
    pub fn complete(&self, pending: PendingAction, notebook: &Notebook) -> Option<ActionRecord> {
        self.enabled.then(|| record(pending, notebook))
    }

    /// Finish a deferred action when its execution completes.
    pub fn on_execution_complete(
        &mut self,
        token: ExecToken,
        notebook: &Notebook,
    ) -> Option<ActionRecord> {
        match self.awaiting.remove(&token) {
            Some(pending) if self.enabled => Some(record(pending, notebook)),
            Some(_) => None,
            None => {
                tracing::debug!(%token, "completion for unknown token ignored");
                None
            }
        }
    }

    /// Record a lifecycle event outside the host's action system
    /// (`notebook-opened`, `notebook-closed`, `unselect-cell`).
    pub fn record_event(
        &self,
        name: &str,
        selection: &Selection,
        notebook: &Notebook,
        now: u64,
    ) -> Option<ActionRecord> {
        self.complete(
            PendingAction {
                name: name.to_string(),
                time: now,
                selection: selection.clone(),
            },
            notebook,
        )
    }

    /// Drop deferred actions whose completion never arrived.
    pub fn expire(&mut self, now: u64, max_age_ms: u64) -> usize {
        let before = self.awaiting.len();
        self.awaiting
            .retain(|_, p| now.saturating_sub(p.time) <= max_age_ms);
        let dropped = before - self.awaiting.len();
        if dropped > 0 {
            tracing::debug!(dropped, "expired deferred action reports");
        }
        dropped
    }
}

fn record(pending: PendingAction, notebook: &Notebook) -> ActionRecord {
    ActionRecord {
        time: pending.time,
        name: pending.name,
        index: pending.selection.primary,
        indices: pending.selection.ids,
        model: notebook.to_json(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::Cell;

    fn nb() -> Notebook {
        Notebook::new("x").with_cells(vec![Cell::code("1").with_id("a")])
    }

    fn sel() -> Selection {
        Selection::single("a".into())
    }

    #[test]
    fn test_prefix_stripped() {
        assert_eq!(normalize_action("jupyter-notebook:run-cell"), "run-cell");
        assert!(is_tracked("jupyter-notebook:move-cell-up"));
        assert!(!is_tracked("jupyter-notebook:scroll-notebook-down"));
    }

    #[test]
    fn test_untracked_passes_through() {
        let mut i = ActionInterceptor::default();
        let mut t = TokenIssuer::default();
        let plan = i.begin("enter-command-mode", &sel(), Some(CellKind::Code), &mut t, 1);
        assert_eq!(plan, ActionPlan::Untracked);
        assert_eq!(i.pending_count(), 0);
    }

    #[test]
    fn test_immediate_snapshot_after_action() {
        let mut i = ActionInterceptor::default();
        let mut t = TokenIssuer::default();
        let plan = i.begin("insert-cell-below", &sel(), Some(CellKind::Code), &mut t, 5);
        let ActionPlan::Immediate(pending) = plan else {
            panic!("expected immediate plan");
        };
        // Host performs the action, then completes.
        let mut notebook = nb();
        notebook.cells.push(Cell::code("").with_id("b"));
        let record = i.complete(pending, &notebook).unwrap();
        assert_eq!(record.time, 5);
        assert_eq!(record.name, "insert-cell-below");
        assert_eq!(record.index, Some("a".into()));
        assert_eq!(record.model["cells"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_run_on_code_defers() {
        let mut i = ActionInterceptor::default();
        let mut t = TokenIssuer::default();
        let plan = i.begin("run-cell", &sel(), Some(CellKind::Code), &mut t, 1);
        let ActionPlan::AwaitExecution { token } = plan else {
            panic!("expected deferred plan");
        };
        assert!(i.on_execution_complete(ExecToken(999), &nb()).is_none());
        let record = i.on_execution_complete(token, &nb()).unwrap();
        assert_eq!(record.name, "run-cell");
        // Duplicate completion is ignored.
        assert!(i.on_execution_complete(token, &nb()).is_none());
    }

    #[test]
    fn test_run_on_markdown_is_immediate() {
        let mut i = ActionInterceptor::default();
        let mut t = TokenIssuer::default();
        let plan = i.begin("run-cell", &sel(), Some(CellKind::Markdown), &mut t, 1);
        assert!(matches!(plan, ActionPlan::Immediate(_)));
        let plan = i.begin(
            "confirm-restart-kernel-and-run-all-cells",
            &sel(),
            Some(CellKind::Markdown),
            &mut t,
            1,
        );
        assert!(matches!(plan, ActionPlan::AwaitExecution { .. }));
    }

    #[test]
    fn test_out_of_order_completions() {
        let mut i = ActionInterceptor::default();
        let mut t = TokenIssuer::default();
        let ActionPlan::AwaitExecution { token: first } =
            i.begin("run-cell", &sel(), Some(CellKind::Code), &mut t, 1)
        else {
            panic!()
        };
        let ActionPlan::AwaitExecution { token: second } =
            i.begin("run-all-cells", &sel(), Some(CellKind::Code), &mut t, 2)
        else {
            panic!()
        };
        assert_eq!(i.on_execution_complete(second, &nb()).unwrap().name, "run-all-cells");
        assert_eq!(i.on_execution_complete(first, &nb()).unwrap().name, "run-cell");
    }

    #[test]
    fn test_disabled_performs_no_tracking() {
        let mut i = ActionInterceptor::new(false);
        let mut t = TokenIssuer::default();
        assert_eq!(
            i.begin("run-cell", &sel(), Some(CellKind::Code), &mut t, 1),
            ActionPlan::Untracked
        );
        assert!(i.record_event("notebook-opened", &sel(), &nb(), 1).is_none());
    }

    #[test]
    fn test_expire_missing_completions() {
        let mut i = ActionInterceptor::default();
        let mut t = TokenIssuer::default();
        i.begin("run-cell", &sel(), Some(CellKind::Code), &mut t, 1_000);
        i.begin("run-cell", &sel(), Some(CellKind::Code), &mut t, 9_000);
        assert_eq!(i.expire(10_000, 5_000), 1);
        assert_eq!(i.pending_count(), 1);
    }

    #[test]
    fn test_record_into_post_body() {
        let i = ActionInterceptor::default();
        let record = i.record_event("notebook-opened", &sel(), &nb(), 3).unwrap();
        let body: PostBody = record.into();
        assert_eq!(body.name.as_deref(), Some("notebook-opened"));
        assert_eq!(body.indices, Some(vec![CellId::from("a")]));
    }
}
