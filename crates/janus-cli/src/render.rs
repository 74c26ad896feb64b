//! Plain-text rendering for the `janus` commands.

use std::fmt::Write;

use janus_core::{Cell, Group, Notebook, RenderedRevision, describe_age};
use janus_types::{Comment, VisibilityState};

/// First line of a source, clipped for one-line listings.
pub fn headline(source: &str) -> String {
    const WIDTH: usize = 60;
    let line = source.lines().next().unwrap_or("");
    if line.chars().count() > WIDTH {
        let clipped: String = line.chars().take(WIDTH - 1).collect();
        format!("{clipped}…")
    } else {
        line.to_string()
    }
}

pub fn state_label(state: VisibilityState) -> &'static str {
    match state {
        VisibilityState::Visible => "visible",
        VisibilityState::SourceOnlyHidden => "source hidden",
        VisibilityState::OutputOnlyHidden => "output hidden",
        VisibilityState::SourceAndOutputHidden => "source+output hidden",
        VisibilityState::FullyHidden => "hidden",
    }
}

fn cell_line(index: usize, cell: &Cell) -> String {
    let versions = match cell.ledger.len() {
        0 => String::new(),
        n => format!(" v{}/{}", cell.ledger.current_index() + 1, n),
    };
    format!(
        "{index:>3}  {:<8}  {:<8}  {:<20}{versions}  {}",
        cell.id.short(),
        cell.kind().as_str(),
        state_label(cell.visibility.state()),
        headline(cell.source()),
    )
}

fn group_lines(out: &mut String, groups: &[Group]) {
    for (i, group) in groups.iter().enumerate() {
        let _ = writeln!(
            out,
            "  [{i}] {} ({} cells, {}){}",
            group.label,
            group.len(),
            group.caption(),
            if group.changed { " *" } else { "" },
        );
    }
}

/// Cell table plus folded groups.
pub fn notebook(nb: &Notebook, groups: &[Group]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({} cells)", nb.path, nb.len());
    for (i, cell) in nb.cells.iter().enumerate() {
        let _ = writeln!(out, "{}", cell_line(i, cell));
    }
    if !groups.is_empty() {
        let _ = writeln!(out, "groups:");
        group_lines(&mut out, groups);
    }
    if !nb.meta.filepaths.is_empty() {
        let _ = writeln!(out, "paths:");
        for entry in &nb.meta.filepaths {
            let _ = writeln!(out, "  {} {}..{}", entry.hash, entry.first_seen, entry.last_seen);
        }
    }
    out
}

/// One past revision. `*` marks views new since the previous revision.
pub fn revision(rendered: &RenderedRevision, caption: &str, now: u64) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "revision {caption} ({})",
        describe_age(rendered.timestamp, now)
    );
    for (i, view) in rendered.views.iter().enumerate() {
        let _ = writeln!(
            out,
            "{i:>3} {} {}  {:<8}  {:<8}  {}",
            if view.changed { "*" } else { " " },
            view.hide,
            view.version_id.short(),
            view.content.cell_type.as_str(),
            headline(&view.content.source),
        );
    }
    if !rendered.groups.is_empty() {
        let _ = writeln!(out, "groups:");
        group_lines(&mut out, &rendered.groups);
    }
    out
}

/// A cell's version ledger; `>` marks the current version.
pub fn versions(cell: &Cell, now: u64) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "cell {} ({} versions)", cell.id, cell.ledger.len());
    for (i, v) in cell.ledger.versions().iter().enumerate() {
        let marker = if i == cell.ledger.current_index() { ">" } else { " " };
        let id = if v.version_id.is_draft() { "draft" } else { v.version_id.short() };
        let name = if v.is_named() { format!(" \"{}\"", v.name) } else { String::new() };
        let _ = writeln!(
            out,
            "{marker}{i:>3}  {id:<8}  {:<14}{name}  {}",
            describe_age(v.timestamp, now),
            headline(&v.content.source),
        );
    }
    out
}

pub fn comments(comments: &[Comment], now: u64) -> String {
    if comments.is_empty() {
        return "no comments\n".to_string();
    }
    let mut out = String::new();
    for c in comments {
        let _ = writeln!(out, "{:<14}  {}", describe_age(c.time, now), c.text);
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
