//! Time travel over the notebook configuration timeline.
//!
//! A [`HistoryReconstructor`] owns the merged timeline and a pool of
//! materialized cell views keyed by version id. Moving to a revision is a
//! two-phase operation:
//!
//! ```text
//! request(v) ──▶ GoToTicket { revision, seq, missing }
//!                     │  fetch `missing` from the backend
//!                     ▼
//! apply(ticket, fetched) ──▶ Some(RenderedRevision)   latest ticket
//!                       └──▶ None                     superseded ticket
//! ```
//!
//! Views whose version id persists across revisions are reused from the
//! pool, so only new ids are ever fetched. The reconstructor is read-only:
//! the rendered revision exposes no mutable views, and any attempted edit
//! fails with [`JanusError::HistoryReadOnly`].

use std::collections::{BTreeMap, HashMap, HashSet};

use janus_types::{
    CellContent, CellId, HideState, NotebookConfiguration, NotebookMeta, VersionId,
};

use crate::backend::JanusBackend;
use crate::error::{JanusError, Result};
use crate::groups::{Group, GroupMember, compute_groups};

/// Identifies one `go_to` request; only the latest one is applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GoToTicket {
    pub revision: usize,
    seq: u64,
    /// Version ids that must be fetched before the revision can render.
    pub missing: Vec<VersionId>,
}

/// One read-only cell of a rendered revision.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryView {
    pub version_id: VersionId,
    pub content: CellContent,
    pub hide: HideState,
    /// New since the previous revision.
    pub changed: bool,
}

impl HistoryView {
    /// Key used for grouping; history views are identified by version.
    pub fn key(&self) -> CellId {
        CellId::from_raw(self.version_id.as_str())
    }

    pub fn show_source(&self) -> bool {
        self.hide.shows_source()
    }

    pub fn show_output(&self) -> bool {
        self.hide.shows_output()
    }
}

/// Where the viewer should scroll after a revision renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollTarget {
    /// First changed view, by position.
    Cell(usize),
    /// First changed view is folded into this group.
    Group(usize),
    /// Nothing changed; keep the current offset.
    Preserve,
}

/// A fully derived past state of the notebook.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedRevision {
    pub revision: usize,
    pub timestamp: u64,
    pub views: Vec<HistoryView>,
    pub groups: Vec<Group>,
    pub scroll: ScrollTarget,
}

impl RenderedRevision {
    pub fn version_ids(&self) -> Vec<VersionId> {
        self.views.iter().map(|v| v.version_id.clone()).collect()
    }
}

/// Renders any revision of a notebook's timeline.
#[derive(Debug, Default)]
pub struct HistoryReconstructor {
    timeline: Vec<NotebookConfiguration>,
    pool: HashMap<VersionId, CellContent>,
    issued: u64,
    shown: Option<usize>,
}

impl HistoryReconstructor {
    /// `timeline` must already be merged and ordered.
    pub fn new(timeline: Vec<NotebookConfiguration>) -> Self {
        Self {
            timeline,
            ..Default::default()
        }
    }

    pub fn revision_count(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    pub fn latest(&self) -> Option<usize> {
        self.timeline.len().checked_sub(1)
    }

    pub fn shown(&self) -> Option<usize> {
        self.shown
    }

    pub fn configuration(&self, revision: usize) -> Option<&NotebookConfiguration> {
        self.timeline.get(revision)
    }

    /// Number of materialized views held for reuse.
    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// "3 of 10" for the given revision.
    pub fn caption(&self, revision: usize) -> String {
        format!("{} of {}", revision + 1, self.timeline.len())
    }

    // ── Navigation ───────────────────────────────────────────────────────

    /// Start moving to `revision`. Supersedes any outstanding ticket.
    pub fn request(&mut self, revision: usize) -> Result<GoToTicket> {
        let config = self
            .timeline
            .get(revision)
            .ok_or(JanusError::RevisionOutOfRange {
                index: revision,
                len: self.timeline.len(),
            })?;
        let mut seen = HashSet::new();
        let missing = config
            .active_version_ids
            .iter()
            .filter(|id| !self.pool.contains_key(*id) && seen.insert(*id))
            .cloned()
            .collect();
        self.issued += 1;
        Ok(GoToTicket {
            revision,
            seq: self.issued,
            missing,
        })
    }

    /// Finish a request with the fetched contents.
    ///
    /// Returns `None` when a newer request was issued in the meantime.
    pub fn apply(
        &mut self,
        ticket: &GoToTicket,
        fetched: BTreeMap<VersionId, CellContent>,
    ) -> Option<RenderedRevision> {
        if ticket.seq != self.issued {
            tracing::debug!(
                revision = ticket.revision,
                latest = self.issued,
                "ignoring superseded history request"
            );
            return None;
        }
        let config = self.timeline.get(ticket.revision)?.clone();

        let active: HashSet<&VersionId> = config.active_version_ids.iter().collect();
        for (id, content) in fetched {
            if active.contains(&id) {
                self.pool.entry(id).or_insert(content);
            }
        }
        self.pool.retain(|id, _| active.contains(id));

        let previous: Option<HashSet<&VersionId>> = ticket
            .revision
            .checked_sub(1)
            .and_then(|p| self.timeline.get(p))
            .map(|c| c.active_version_ids.iter().collect());

        let mut views = Vec::with_capacity(config.active_version_ids.len());
        for (i, id) in config.active_version_ids.iter().enumerate() {
            let Some(content) = self.pool.get(id) else {
                tracing::warn!(version = %id, revision = ticket.revision, "version content missing, skipping");
                continue;
            };
            views.push(HistoryView {
                version_id: id.clone(),
                content: content.clone(),
                hide: config.hide_state(i),
                changed: previous.as_ref().is_none_or(|p| !p.contains(id)),
            });
        }

        let keys: Vec<CellId> = views.iter().map(HistoryView::key).collect();
        let groups = compute_groups(
            views.iter().zip(&keys).map(|(v, key)| GroupMember {
                id: key,
                kind: v.content.cell_type,
                source: &v.content.source,
                hidden: v.hide == HideState::Cell,
                changed: v.changed,
            }),
            &NotebookMeta::default(),
        );

        let scroll = match views.iter().position(|v| v.changed) {
            None => ScrollTarget::Preserve,
            Some(i) => match groups.iter().position(|g| g.contains(&keys[i])) {
                Some(g) => ScrollTarget::Group(g),
                None => ScrollTarget::Cell(i),
            },
        };

        self.shown = Some(ticket.revision);
        Some(RenderedRevision {
            revision: ticket.revision,
            timestamp: config.timestamp,
            views,
            groups,
            scroll,
        })
    }

    /// Request, fetch and apply in one step.
    ///
    /// A failed fetch renders whatever the pool already holds.
    pub async fn go_to(
        &mut self,
        revision: usize,
        backend: &dyn JanusBackend,
        notebook_path: &str,
    ) -> Result<Option<RenderedRevision>> {
        let ticket = self.request(revision)?;
        let fetched = if ticket.missing.is_empty() {
            BTreeMap::new()
        } else {
            match backend.versions(notebook_path, &ticket.missing).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(revision, error = %e, "version fetch failed");
                    BTreeMap::new()
                }
            }
        };
        Ok(self.apply(&ticket, fetched))
    }

    // ── Read-only surface ────────────────────────────────────────────────

    pub fn edit_view(&mut self, _version: &VersionId, _source: &str) -> Result<()> {
        Err(JanusError::HistoryReadOnly)
    }

    pub fn delete_view(&mut self, _version: &VersionId) -> Result<()> {
        Err(JanusError::HistoryReadOnly)
    }
}

/// Human-readable age of a revision: "5 min ago", "2 hours ago", "3 days ago".
pub fn describe_age(timestamp: u64, now: u64) -> String {
    let secs = now.saturating_sub(timestamp) / 1000;
    if secs < 3600 {
        format!("{} min ago", secs / 60)
    } else if secs < 86_400 {
        format!("{} hours ago", secs / 3600)
    } else {
        format!("{} days ago", secs / 86_400)
    }
}

// ============================================================================
// Tests
// ============================================================================
