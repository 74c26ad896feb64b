//! Per-cell version ledger.
//!
//! The ledger is an ordered list of [`Version`] snapshots with a cursor
//! (`current`) pointing at the displayed version, plus the permanent set of
//! named versions. Versions are appended after every completed execution.
//!
//! ```text
//! versions:  [v0]──[v1]──[v2]──[v3]
//!                          ▲
//!                       current
//! named:     {v1 "baseline"}   ← retained even if v1 is pruned or replaced
//! ```
//!
//! Unnamed versions are ephemeral: [`VersionLedger::renderable`] collapses
//! any that match the live content into one "current" entry, and
//! [`VersionLedger::prune_duplicates`] removes superseded ones. Named
//! versions are never dropped by either. A ledger kept pruned after every
//! record has the same entries as its renderable list, so marker indices and
//! ledger indices agree.
//!
//! Unexecuted live content is not lost when navigating away from it:
//! [`VersionLedger::stash_live`] keeps it as a draft at the tail.

use janus_types::{CellContent, CellId, Version};

use crate::error::{JanusError, Result};

/// Unnamed markers shown before the list collapses behind an ellipsis.
pub const CONDENSED_UNNAMED_MARKERS: usize = 3;

/// Ordered version snapshots of one cell.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VersionLedger {
    versions: Vec<Version>,
    current: usize,
    named: Vec<Version>,
}

/// One entry of the display list built by [`VersionLedger::renderable`].
#[derive(Clone, Debug, PartialEq)]
pub struct RenderableVersion {
    pub version: Version,
    /// Synthesized stand-in for live content that matches no recorded version.
    pub placeholder: bool,
}

/// The display list plus the index of the entry matching live content.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderableVersions {
    pub entries: Vec<RenderableVersion>,
    pub current: usize,
}

impl RenderableVersions {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl VersionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from persisted metadata. An out-of-range cursor is clamped.
    pub fn from_parts(versions: Vec<Version>, current: usize, named: Vec<Version>) -> Self {
        let current = current.min(versions.len().saturating_sub(1));
        Self {
            versions,
            current,
            named,
        }
    }

    pub fn versions(&self) -> &[Version] {
        &self.versions
    }

    pub fn named(&self) -> &[Version] {
        &self.named
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&Version> {
        self.versions.get(self.current)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    // ── Recording ────────────────────────────────────────────────────────

    /// Append a draft snapshot and move the cursor to it. Returns its index.
    pub fn record(&mut self, cell_id: CellId, content: CellContent, timestamp: u64) -> usize {
        let seq = self.next_seq();
        self.versions.push(Version::draft(cell_id, content, timestamp).with_seq(seq));
        self.current = self.versions.len() - 1;
        self.current
    }

    /// Keep unexecuted `live` content as a draft at the tail, cursor on it.
    ///
    /// Returns false (and changes nothing) when the ledger is empty, `live` is
    /// blank, or some version already holds it.
    pub fn stash_live(&mut self, cell_id: &CellId, live: &CellContent) -> bool {
        let held = self
            .versions
            .iter()
            .chain(&self.named)
            .any(|v| v.content.matches(live));
        if self.versions.is_empty() || !live.has_content() || held {
            return false;
        }
        let timestamp = self.versions.iter().map(|v| v.timestamp).max().unwrap_or(0);
        let seq = self.next_seq();
        let draft = Version::draft(cell_id.clone(), live.clone(), timestamp).with_seq(seq);
        self.versions.push(draft);
        self.current = self.versions.len() - 1;
        true
    }

    fn next_seq(&self) -> u64 {
        self.versions
            .iter()
            .chain(&self.named)
            .map(|v| v.seq)
            .max()
            .map_or(1, |s| s + 1)
    }

    // ── Navigation ───────────────────────────────────────────────────────

    /// Step back one version. Returns false when already at the oldest.
    pub fn previous(&mut self) -> bool {
        if self.current == 0 || self.versions.is_empty() {
            return false;
        }
        self.current -= 1;
        true
    }

    /// Step forward one version. Returns false when already at the newest.
    pub fn next(&mut self) -> bool {
        if self.current + 1 >= self.versions.len() {
            return false;
        }
        self.current += 1;
        true
    }

    pub fn go_to(&mut self, index: usize) -> Result<&Version> {
        if index >= self.versions.len() {
            return Err(JanusError::VersionOutOfRange {
                index,
                len: self.versions.len(),
            });
        }
        self.current = index;
        Ok(&self.versions[index])
    }

    /// Delete the displayed version.
    ///
    /// Deleting the tail moves the cursor to the new tail; otherwise the
    /// cursor stays put and now points at the next newer version. A deleted
    /// named version also leaves the named set.
    pub fn delete_current(&mut self) -> Result<Version> {
        match self.versions.len() {
            0 => return Err(JanusError::NoVersions),
            1 => return Err(JanusError::LastVersion),
            _ => {}
        }
        let removed = self.versions.remove(self.current);
        if removed.is_named() {
            self.named.retain(|n| !n.same_snapshot(&removed));
        }
        if self.current >= self.versions.len() {
            self.current = self.versions.len() - 1;
        }
        Ok(removed)
    }

    // ── Naming ───────────────────────────────────────────────────────────

    /// Name (or, with an empty label, unname) the version at `index`.
    pub fn name(&mut self, index: usize, label: &str) -> Result<()> {
        let len = self.versions.len();
        let version = self
            .versions
            .get_mut(index)
            .ok_or(JanusError::VersionOutOfRange { index, len })?;
        version.name = label.to_string();
        let snapshot = version.clone();

        let existing = self.named.iter().position(|n| n.same_snapshot(&snapshot));
        match (label.is_empty(), existing) {
            (true, Some(i)) => {
                self.named.remove(i);
            }
            (true, None) => {}
            (false, Some(i)) => self.named[i] = snapshot,
            (false, None) => self.named.push(snapshot),
        }
        Ok(())
    }

    // ── Display list ─────────────────────────────────────────────────────

    /// Versions to show as markers, oldest first.
    ///
    /// Empty versions are excluded; named versions are always included.
    /// Unnamed versions matching `live` collapse into a single current entry,
    /// and disappear entirely when a named version already matches `live`.
    /// When nothing matches, a placeholder for `live` is appended as current.
    pub fn renderable(&self, live: &CellContent) -> RenderableVersions {
        let mut candidates: Vec<&Version> = self.versions.iter().collect();
        for named in &self.named {
            if !self.versions.iter().any(|v| v.same_snapshot(named)) {
                candidates.push(named);
            }
        }
        candidates.sort_by_key(|v| v.timestamp);

        let named_matches_live = candidates
            .iter()
            .any(|&v| self.is_named(v) && v.content.matches(live));

        let mut entries: Vec<RenderableVersion> = Vec::new();
        let mut current: Option<usize> = None;
        let mut live_slot: Option<usize> = None;

        for v in candidates {
            if self.is_named(v) {
                entries.push(RenderableVersion {
                    version: v.clone(),
                    placeholder: false,
                });
                if v.content.matches(live) {
                    current = Some(entries.len() - 1);
                }
                continue;
            }
            if !v.content.has_content() {
                continue;
            }
            if v.content.matches(live) {
                if named_matches_live {
                    continue;
                }
                // A newer match supersedes the older one.
                if let Some(slot) = live_slot.take() {
                    entries.remove(slot);
                }
                entries.push(RenderableVersion {
                    version: v.clone(),
                    placeholder: false,
                });
                live_slot = Some(entries.len() - 1);
                continue;
            }
            entries.push(RenderableVersion {
                version: v.clone(),
                placeholder: false,
            });
        }

        let current = match current.or(live_slot) {
            Some(i) => i,
            None => {
                let timestamp = entries.last().map(|e| e.version.timestamp).unwrap_or(0);
                let cell_id = self
                    .versions
                    .first()
                    .or(self.named.first())
                    .map(|v| v.cell_id.clone())
                    .unwrap_or_else(|| CellId::from_raw(""));
                entries.push(RenderableVersion {
                    version: Version::draft(cell_id, live.clone(), timestamp).with_seq(self.next_seq()),
                    placeholder: true,
                });
                entries.len() - 1
            }
        };

        RenderableVersions { entries, current }
    }

    fn is_named(&self, v: &Version) -> bool {
        v.is_named() || self.named.iter().any(|n| n.same_snapshot(v))
    }

    /// Replace the ledger with the display list built from fetched history.
    ///
    /// `fetched` is the cell's server-side history; named versions held by
    /// this ledger are kept. The cursor lands on the entry matching `live`.
    pub fn rebuild_from_history(&mut self, cell_id: &CellId, fetched: Vec<Version>, live: &CellContent) {
        let source = VersionLedger {
            versions: fetched,
            current: 0,
            named: self.named.clone(),
        };
        let rendered = source.renderable(live);
        self.versions = rendered
            .entries
            .into_iter()
            .map(|mut e| {
                if e.placeholder {
                    e.version.cell_id = cell_id.clone();
                }
                e.version
            })
            .collect();
        self.current = rendered.current;
    }

    /// Drop unnamed versions superseded by a later version or a named one,
    /// and blank unnamed versions other than the displayed one.
    ///
    /// Returns how many were removed. The cursor keeps pointing at the same
    /// snapshot when it survives, else at the survivor holding its content,
    /// else at the newest survivor before it.
    pub fn prune_duplicates(&mut self) -> usize {
        let before = self.versions.len();
        if before == 0 {
            return 0;
        }
        let mut keep: Vec<bool> = {
            let named: Vec<&CellContent> = self
                .named
                .iter()
                .chain(self.versions.iter().filter(|v| v.is_named()))
                .map(|v| &v.content)
                .collect();
            self.versions
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    if v.is_named() {
                        return true;
                    }
                    let blank = !v.content.has_content() && i != self.current;
                    let later = self.versions[i + 1..]
                        .iter()
                        .any(|l| l.content.matches(&v.content));
                    let by_named = named.iter().any(|c| c.matches(&v.content));
                    !(blank || later || by_named)
                })
                .collect()
        };

        // Keep at least the newest version.
        if !keep.iter().any(|k| *k) {
            keep[before - 1] = true;
        }

        let shown = self.versions.get(self.current).map(|v| v.content.clone());
        let shown_kept = keep.get(self.current).copied().unwrap_or(true);
        let mut fallback = 0;
        let mut survivors = Vec::with_capacity(before);
        for (i, v) in self.versions.drain(..).enumerate() {
            if keep[i] {
                if i <= self.current {
                    fallback = survivors.len();
                }
                survivors.push(v);
            }
        }
        self.current = if shown_kept {
            fallback
        } else {
            let holds_shown = |v: &Version| shown.as_ref().is_some_and(|c| v.content.matches(c));
            survivors
                .iter()
                .position(|v| v.is_named() && holds_shown(v))
                .or_else(|| survivors.iter().position(|v| holds_shown(v)))
                .unwrap_or(fallback)
        };
        self.versions = survivors;
        before - self.versions.len()
    }

    // ── Markers ──────────────────────────────────────────────────────────

    /// Which version markers are visible for a cell showing `live`.
    ///
    /// Indices point into [`VersionLedger::renderable`]`(live)`.
    pub fn marker_plan(&self, live: &CellContent, selected: bool, all_showing: bool) -> MarkerPlan {
        let rendered = self.renderable(live);
        let (named, unnamed): (Vec<usize>, Vec<usize>) =
            (0..rendered.len()).partition(|&i| rendered.entries[i].version.is_named());

        let mut plan = MarkerPlan::default();
        if !selected {
            if named.is_empty() {
                plan.summary = true;
            } else {
                plan.versions = named;
            }
            return plan;
        }

        if all_showing {
            plan.versions = named;
            if !unnamed.is_empty() {
                plan.versions.extend(unnamed);
                plan.extra = Some(ExtraMarker::Collapse);
            }
        } else if !named.is_empty() {
            plan.versions = named;
            if !unnamed.is_empty() {
                plan.extra = Some(ExtraMarker::Expand);
            }
        } else if unnamed.len() > CONDENSED_UNNAMED_MARKERS {
            plan.versions = unnamed[..CONDENSED_UNNAMED_MARKERS].to_vec();
            plan.extra = Some(ExtraMarker::Expand);
        } else {
            plan.versions = unnamed;
        }
        plan.versions.sort_unstable();
        plan
    }
}

/// The "more versions" marker: offers to expand or to collapse the list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtraMarker {
    Expand,
    Collapse,
}

/// Visible version markers for one cell view.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MarkerPlan {
    /// Single history icon when nothing better can be shown.
    pub summary: bool,
    /// Renderable-list indices whose markers are visible, ascending.
    pub versions: Vec<usize>,
    pub extra: Option<ExtraMarker>,
}

// ============================================================================
// Tests
// ============================================================================
