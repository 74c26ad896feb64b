//! Folded groups: contiguous runs of fully hidden cells behind one placeholder.
//!
//! Groups are derived, never stored. A single O(n) pass over the cells emits
//! a group whenever a visible cell follows a hidden run, or the document ends
//! inside one. Only labels persist, in `janus_markers`, matched to a later
//! group by any overlap of member ids.

use janus_types::{CellId, CellKind, DEFAULT_GROUP_LABEL, MarkerLabel, NotebookMeta};

/// Input to the scan: what the grouping needs to know about one cell.
#[derive(Clone, Copy, Debug)]
pub struct GroupMember<'a> {
    pub id: &'a CellId,
    pub kind: CellKind,
    pub source: &'a str,
    pub hidden: bool,
    /// Set by the history reconstructor for versions new since the previous revision.
    pub changed: bool,
}

/// A placeholder standing in for a run of hidden cells.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Group {
    pub cell_ids: Vec<CellId>,
    /// Position of the first member in the scanned sequence.
    pub first_index: usize,
    pub label: String,
    /// Source lines of the code cells in the group.
    pub line_count: usize,
    pub changed: bool,
}

impl Group {
    pub fn contains(&self, id: &CellId) -> bool {
        self.cell_ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.cell_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cell_ids.is_empty()
    }

    /// Display text of the line-count badge.
    pub fn caption(&self) -> String {
        format!("{} lines", self.line_count)
    }
}

/// Scan cells in order and collect groups, labelled from `meta`.
pub fn compute_groups<'a>(
    cells: impl IntoIterator<Item = GroupMember<'a>>,
    meta: &NotebookMeta,
) -> Vec<Group> {
    let mut groups = Vec::new();
    let mut run: Vec<CellId> = Vec::new();
    let mut first_index = 0;
    let mut lines = 0;
    let mut changed = false;

    let mut flush = |run: &mut Vec<CellId>, first_index: usize, lines: usize, changed: bool| {
        if run.is_empty() {
            return;
        }
        let cell_ids = std::mem::take(run);
        let label = normalize_label(meta.label_for(&cell_ids).unwrap_or(""));
        groups.push(Group {
            cell_ids,
            first_index,
            label,
            line_count: lines,
            changed,
        });
    };

    for (i, cell) in cells.into_iter().enumerate() {
        if cell.hidden {
            if run.is_empty() {
                first_index = i;
                lines = 0;
                changed = false;
            }
            run.push(cell.id.clone());
            if cell.kind == CellKind::Code {
                lines += cell.source.split('\n').count();
            }
            changed |= cell.changed;
        } else {
            flush(&mut run, first_index, lines, changed);
        }
    }
    flush(&mut run, first_index, lines, changed);
    groups
}

/// Empty labels and the default label are both stored as the default.
pub fn normalize_label(label: &str) -> String {
    if label.is_empty() {
        DEFAULT_GROUP_LABEL.to_string()
    } else {
        label.to_string()
    }
}

/// Labels for every current group, as persisted in `janus_markers`.
pub fn marker_labels(groups: &[Group]) -> Vec<MarkerLabel> {
    groups
        .iter()
        .map(|g| MarkerLabel {
            ids: g.cell_ids.clone(),
            marker_name: normalize_label(&g.label),
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Row {
        id: CellId,
        kind: CellKind,
        source: String,
        hidden: bool,
    }

    fn rows(layout: &[(&str, bool)]) -> Vec<Row> {
        layout.iter()
            .map(|(id, hidden)| Row {
                id: CellId::from(*id),
                kind: CellKind::Code,
                source: "a\nb".into(),
                hidden: *hidden,
            })
            .collect()
    }

    fn members(rows: &[Row]) -> impl Iterator<Item = GroupMember<'_>> {
        rows.iter().map(|r| GroupMember {
            id: &r.id,
            kind: r.kind,
            source: &r.source,
            hidden: r.hidden,
            changed: false,
        })
    }

    fn ids(g: &Group) -> Vec<&str> {
        g.cell_ids.iter().map(|c| c.as_str()).collect()
    }

    #[test]
    fn test_adjacent_hidden_runs_merge() {
        let r = rows(&[("a", false), ("b", true), ("c", true), ("d", false), ("e", true)]);
        let groups = compute_groups(members(&r), &NotebookMeta::default());
        assert_eq!(groups.len(), 2);
        assert_eq!(ids(&groups[0]), vec!["b", "c"]);
        assert_eq!(groups[0].first_index, 1);
        assert_eq!(groups[0].line_count, 4);
        // Trailing hidden run still gets a placeholder.
        assert_eq!(ids(&groups[1]), vec!["e"]);
        assert_eq!(groups[1].label, DEFAULT_GROUP_LABEL);
    }

    #[test]
    fn test_no_hidden_cells() {
        let r = rows(&[("a", false), ("b", false)]);
        assert!(compute_groups(members(&r), &NotebookMeta::default()).is_empty());
    }

    #[test]
    fn test_markdown_lines_not_counted() {
        let mut r = rows(&[("a", true), ("b", true)]);
        r[1].kind = CellKind::Markdown;
        let groups = compute_groups(members(&r), &NotebookMeta::default());
        assert_eq!(groups[0].line_count, 2);
        assert_eq!(groups[0].caption(), "2 lines");
    }

    #[test]
    fn test_label_by_overlap() {
        let meta = NotebookMeta {
            janus_markers: vec![MarkerLabel {
                ids: vec!["c".into(), "gone".into()],
                marker_name: "Imports".into(),
            }],
            ..Default::default()
        };
        let r = rows(&[("b", true), ("c", true), ("d", false)]);
        let groups = compute_groups(members(&r), &meta);
        assert_eq!(groups[0].label, "Imports");
        let saved = marker_labels(&groups);
        assert_eq!(saved[0].ids, vec![CellId::from("b"), CellId::from("c")]);
        assert_eq!(saved[0].marker_name, "Imports");
    }

    #[test]
    fn test_changed_propagates_to_group() {
        let r = rows(&[("a", true), ("b", true)]);
        let groups = compute_groups(
            r.iter().enumerate().map(|(i, row)| GroupMember {
                id: &row.id,
                kind: row.kind,
                source: &row.source,
                hidden: row.hidden,
                changed: i == 1,
            }),
            &NotebookMeta::default(),
        );
        assert!(groups[0].changed);
    }
}
