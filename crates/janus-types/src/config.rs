//! Notebook configurations: one row of the notebook-level timeline.
//!
//! The persistence server returns configurations as positional rows:
//!
//! ```text
//! [timestamp, path, cell_order, version_ids, hide_states?]
//! ```
//!
//! List columns were historically written with Python's `str()`, so each of
//! them may arrive as a JSON array or as a Python list literal such as
//! `"['a1b2c3d4', 'e5f6a7b8']"`. Hide states may also arrive as a bare letter
//! string (`"ncso"`). A missing hide-state column means every cell is visible.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::{CellId, PathHash, VersionId};
use crate::visibility::HideState;

/// Snapshot of which cell versions were active, in order, at one time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotebookConfiguration {
    /// Unix millis.
    pub timestamp: u64,
    pub path: PathHash,
    #[serde(default)]
    pub cell_order: Vec<CellId>,
    pub active_version_ids: Vec<VersionId>,
    #[serde(default)]
    pub hide_states: Vec<HideState>,
}

/// Error parsing a configuration row.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    #[error("configuration row is not an array")]
    NotArray,
    #[error("configuration row is missing the {0} column")]
    MissingColumn(&'static str),
    #[error("invalid timestamp: {0}")]
    BadTimestamp(String),
    #[error("invalid list in {column} column: {raw}")]
    BadList { column: &'static str, raw: String },
    #[error("invalid hide state '{0}'")]
    BadHideState(String),
}

impl NotebookConfiguration {
    /// Hide state for position `index`, defaulting to visible.
    pub fn hide_state(&self, index: usize) -> HideState {
        self.hide_states.get(index).copied().unwrap_or_default()
    }

    /// Parse one positional row from the server.
    pub fn from_row(row: &Value) -> Result<Self, RowError> {
        let cols = row.as_array().ok_or(RowError::NotArray)?;
        let col = |i: usize, name: &'static str| cols.get(i).ok_or(RowError::MissingColumn(name));

        let timestamp = parse_timestamp(col(0, "timestamp")?)?;
        let path = match col(1, "path")? {
            Value::String(s) => PathHash::from(s.as_str()),
            other => PathHash::from(other.to_string()),
        };
        let cell_order = parse_list(col(2, "cell_order")?, "cell_order")?
            .into_iter()
            .map(CellId::from)
            .collect();
        let active_version_ids = parse_list(col(3, "version_ids")?, "version_ids")?
            .into_iter()
            .map(VersionId::from)
            .collect();
        let hide_states = match cols.get(4) {
            None | Some(Value::Null) => Vec::new(),
            Some(v) => parse_hide_states(v)?,
        };

        Ok(Self {
            timestamp,
            path,
            cell_order,
            active_version_ids,
            hide_states,
        })
    }
}

fn parse_timestamp(v: &Value) -> Result<u64, RowError> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| RowError::BadTimestamp(n.to_string())),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| *f >= 0.0)
            .map(|f| f as u64)
            .ok_or_else(|| RowError::BadTimestamp(s.clone())),
        other => Err(RowError::BadTimestamp(other.to_string())),
    }
}

/// Parse a JSON array of strings or a Python list literal of strings.
pub fn parse_list(v: &Value, column: &'static str) -> Result<Vec<String>, RowError> {
    let bad = || RowError::BadList {
        column,
        raw: v.to_string(),
    };
    match v {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(bad))
            .collect(),
        Value::String(s) => parse_list_literal(s).ok_or_else(bad),
        _ => Err(bad()),
    }
}

/// `"['a', \"b\"]"` → `["a", "b"]`. Also accepts a JSON array in string form.
fn parse_list_literal(raw: &str) -> Option<Vec<String>> {
    let inner = raw.trim().strip_prefix('[')?.strip_suffix(']')?.trim();
    if inner.is_empty() {
        return Some(Vec::new());
    }
    inner
        .split(',')
        .map(|item| {
            let item = item.trim();
            let unquoted = item
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .or_else(|| item.strip_prefix('"').and_then(|s| s.strip_suffix('"')))?;
            Some(unquoted.to_string())
        })
        .collect()
}

fn parse_hide_states(v: &Value) -> Result<Vec<HideState>, RowError> {
    let letters: Vec<String> = match v {
        Value::String(s) if !s.trim_start().starts_with('[') => {
            s.chars().map(|c| c.to_string()).collect()
        }
        other => parse_list(other, "hide_states")?,
    };
    letters
        .iter()
        .map(|l| {
            let mut chars = l.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => HideState::from_char(c),
                _ => None,
            }
            .ok_or_else(|| RowError::BadHideState(l.clone()))
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_row() {
        let row = json!([1700, "ab12cd34", ["c1", "c2"], ["v1", "v2"], ["n", "c"]]);
        let cfg = NotebookConfiguration::from_row(&row).unwrap();
        assert_eq!(cfg.timestamp, 1700);
        assert_eq!(cfg.path.as_str(), "ab12cd34");
        assert_eq!(cfg.cell_order, vec![CellId::from("c1"), CellId::from("c2")]);
        assert_eq!(cfg.active_version_ids.len(), 2);
        assert_eq!(cfg.hide_state(1), HideState::Cell);
    }

    #[test]
    fn test_from_python_literal_row() {
        let row = json!(["1700.0", "ab12cd34", "['c1', 'c2']", "['v1', 'v2']"]);
        let cfg = NotebookConfiguration::from_row(&row).unwrap();
        assert_eq!(cfg.timestamp, 1700);
        assert_eq!(
            cfg.active_version_ids,
            vec![VersionId::from("v1"), VersionId::from("v2")]
        );
        // Missing hide-state column: everything visible.
        assert_eq!(cfg.hide_state(0), HideState::None);
        assert_eq!(cfg.hide_state(9), HideState::None);
    }

    #[test]
    fn test_letter_string_hide_states() {
        let row = json!([1, "p", [], "[]", "ncso"]);
        let cfg = NotebookConfiguration::from_row(&row).unwrap();
        assert!(cfg.active_version_ids.is_empty());
        assert_eq!(
            cfg.hide_states,
            vec![HideState::None, HideState::Cell, HideState::Source, HideState::Output]
        );
    }

    #[test]
    fn test_malformed_rows() {
        assert_eq!(
            NotebookConfiguration::from_row(&json!({"a": 1})),
            Err(RowError::NotArray)
        );
        assert_eq!(
            NotebookConfiguration::from_row(&json!([1, "p", []])),
            Err(RowError::MissingColumn("version_ids"))
        );
        assert!(matches!(
            NotebookConfiguration::from_row(&json!([1, "p", [], "[v1, v2]"])),
            Err(RowError::BadList { .. })
        ));
        assert!(matches!(
            NotebookConfiguration::from_row(&json!([1, "p", [], [], ["x"]])),
            Err(RowError::BadHideState(_))
        ));
    }
}
