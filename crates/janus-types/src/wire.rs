//! Request and response bodies exchanged with the persistence server.
//!
//! ```text
//! POST /api/janus/<notebookPath>           body: PostBody → PostResponse
//! GET  ...?q=config&path&start&end                      → ConfigsResponse
//! GET  ...?q=versions&version_ids=<json array>          → VersionsResponse
//! GET  ...?q=cell_history&cell_id&path&start&end        → CellHistoryResponse
//! GET  ...?q=comment                                    → CommentsResponse
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cell::CellContent;
use crate::ids::{CellId, PathHash, VersionId};
use crate::version::Version;

/// Kind of a posted record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    /// A tracked host action with a notebook snapshot.
    Action,
    /// A free-text comment on the notebook.
    Comment,
    /// A visibility/version operation performed through Janus itself.
    Log,
}

/// Body of `POST /api/janus/<notebookPath>`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostBody {
    /// Unix millis.
    pub time: u64,
    #[serde(rename = "type")]
    pub kind: PostKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Primary selected cell id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<CellId>,
    /// All selected cell ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<Vec<CellId>>,
    /// Full notebook snapshot (nbformat JSON) after the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CellId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<CellId>>,
}

impl PostBody {
    fn empty(time: u64, kind: PostKind) -> Self {
        Self {
            time,
            kind,
            name: None,
            index: None,
            indices: None,
            model: None,
            comment: None,
            id: None,
            ids: None,
        }
    }

    pub fn action(
        time: u64,
        name: impl Into<String>,
        index: Option<CellId>,
        indices: Vec<CellId>,
        model: Value,
    ) -> Self {
        Self {
            name: Some(name.into()),
            index,
            indices: Some(indices),
            model: Some(model),
            ..Self::empty(time, PostKind::Action)
        }
    }

    pub fn log(time: u64, name: impl Into<String>, id: Option<CellId>, ids: Vec<CellId>) -> Self {
        Self {
            name: Some(name.into()),
            id,
            ids: Some(ids),
            ..Self::empty(time, PostKind::Log)
        }
    }

    pub fn comment(time: u64, text: impl Into<String>) -> Self {
        Self {
            comment: Some(text.into()),
            ..Self::empty(time, PostKind::Comment)
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PostResponse {
    #[serde(default)]
    pub hashed_nb_path: Option<PathHash>,
}

/// Raw configuration rows; parse each with `NotebookConfiguration::from_row`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigsResponse {
    #[serde(default)]
    pub nb_configs: Vec<Value>,
}

/// Materialized versions returned by `q=versions`, keyed by version id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionsResponse {
    #[serde(default)]
    pub cells: BTreeMap<VersionId, CellContent>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CellHistoryResponse {
    #[serde(default)]
    pub versions: Vec<Version>,
}

/// A stored comment: `[timestamp, text]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u64, String)", into = "(u64, String)")]
pub struct Comment {
    pub time: u64,
    pub text: String,
}

impl From<(u64, String)> for Comment {
    fn from((time, text): (u64, String)) -> Self {
        Self { time, text }
    }
}

impl From<Comment> for (u64, String) {
    fn from(c: Comment) -> Self {
        (c.time, c.text)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentsResponse {
    #[serde(default)]
    pub comments: Vec<Comment>,
}
