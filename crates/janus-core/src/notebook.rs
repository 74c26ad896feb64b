//! In-memory notebook document model.
//!
//! Cells are kept in document order. Each cell carries its content, the
//! persisted visibility flags, and its version ledger; everything Janus
//! persists lives under `metadata.janus` and round-trips through
//! [`Notebook::from_json`] / [`Notebook::to_json`]. Unknown metadata keys and
//! top-level notebook fields are preserved verbatim.

use serde_json::{Map, Value, json};

use janus_types::{CellContent, CellId, CellKind, CellMeta, NotebookMeta, Output, Visibility};

use crate::error::{JanusError, Result};
use crate::ledger::VersionLedger;

/// One cell of the document.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    /// Empty until the identity registry assigns one.
    pub id: CellId,
    pub content: CellContent,
    pub visibility: Visibility,
    pub ledger: VersionLedger,
    pub show_versions: bool,
    pub all_versions_showing: bool,
    pub execution_count: Option<u64>,
    /// Non-janus cell metadata, preserved as-is.
    pub extra_metadata: Map<String, Value>,
}

impl Cell {
    pub fn new(kind: CellKind, source: impl Into<String>) -> Self {
        Self {
            id: CellId::from_raw(""),
            content: CellContent::new(kind, source),
            visibility: Visibility::VISIBLE,
            ledger: VersionLedger::new(),
            show_versions: false,
            all_versions_showing: false,
            execution_count: None,
            extra_metadata: Map::new(),
        }
    }

    pub fn code(source: impl Into<String>) -> Self {
        Self::new(CellKind::Code, source)
    }

    pub fn markdown(source: impl Into<String>) -> Self {
        Self::new(CellKind::Markdown, source)
    }

    pub fn with_id(mut self, id: impl Into<CellId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<Output>) -> Self {
        self.content.outputs = outputs;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility.normalized();
        self
    }

    pub fn kind(&self) -> CellKind {
        self.content.cell_type
    }

    pub fn source(&self) -> &str {
        &self.content.source
    }

    pub fn output_count(&self) -> usize {
        self.content.outputs.len()
    }

    /// Show the ledger's current version as the cell's live content.
    pub(crate) fn display_current_version(&mut self) {
        if let Some(v) = self.ledger.current() {
            self.content.source = v.content.source.clone();
            self.content.outputs = v.content.outputs.clone();
        }
    }

    pub fn meta(&self) -> CellMeta {
        CellMeta {
            id: (!self.id.is_empty()).then(|| self.id.clone()),
            visibility: self.visibility,
            show_versions: self.show_versions,
            versions_showing: self.all_versions_showing,
            versions: self.ledger.versions().to_vec(),
            current_version: self.ledger.current_index(),
            named_versions: self.ledger.named().to_vec(),
        }
    }

    /// Parse one nbformat cell.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| JanusError::MalformedNotebook("cell is not an object".into()))?;
        let content: CellContent = serde_json::from_value(value.clone())?;
        let mut extra_metadata = obj
            .get("metadata")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let meta: CellMeta = match extra_metadata.remove("janus") {
            Some(v) => serde_json::from_value(v)?,
            None => CellMeta::default(),
        };
        Ok(Self {
            id: meta.id.unwrap_or_else(|| CellId::from_raw("")),
            content,
            visibility: meta.visibility.normalized(),
            ledger: VersionLedger::from_parts(meta.versions, meta.current_version, meta.named_versions),
            show_versions: meta.show_versions,
            all_versions_showing: meta.versions_showing,
            execution_count: obj.get("execution_count").and_then(Value::as_u64),
            extra_metadata,
        })
    }

    /// Serialize as an nbformat cell with `metadata.janus`.
    pub fn to_json(&self) -> Value {
        let mut metadata = self.extra_metadata.clone();
        metadata.insert(
            "janus".into(),
            serde_json::to_value(self.meta()).unwrap_or(Value::Null),
        );
        let mut cell = json!({
            "cell_type": self.kind().as_str(),
            "source": self.content.source,
            "metadata": metadata,
        });
        if self.kind() == CellKind::Code {
            cell["outputs"] = serde_json::to_value(&self.content.outputs).unwrap_or(Value::Null);
            cell["execution_count"] = self.execution_count.map(Value::from).unwrap_or(Value::Null);
        }
        cell
    }
}

/// An ordered collection of cells plus notebook-level Janus metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    pub meta: NotebookMeta,
    /// Notebook path relative to the server root.
    pub path: String,
    /// Non-janus notebook metadata.
    pub extra_metadata: Map<String, Value>,
    /// Remaining top-level fields (`nbformat`, `nbformat_minor`, ...).
    pub extra_fields: Map<String, Value>,
}

impl Notebook {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_cells(mut self, cells: Vec<Cell>) -> Self {
        self.cells = cells;
        self
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn position(&self, id: &CellId) -> Option<usize> {
        self.cells.iter().position(|c| &c.id == id)
    }

    pub fn cell(&self, id: &CellId) -> Result<&Cell> {
        self.cells
            .iter()
            .find(|c| &c.id == id)
            .ok_or_else(|| JanusError::CellNotFound(id.clone()))
    }

    pub fn cell_mut(&mut self, id: &CellId) -> Result<&mut Cell> {
        self.cells
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| JanusError::CellNotFound(id.clone()))
    }

    pub fn ids(&self) -> Vec<CellId> {
        self.cells.iter().map(|c| c.id.clone()).collect()
    }

    /// Parse an nbformat document.
    pub fn from_json(path: impl Into<String>, value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| JanusError::MalformedNotebook("notebook is not an object".into()))?;
        let cells = obj
            .get("cells")
            .and_then(Value::as_array)
            .ok_or_else(|| JanusError::MalformedNotebook("missing cells array".into()))?
            .iter()
            .map(Cell::from_json)
            .collect::<Result<Vec<_>>>()?;

        let metadata = obj.get("metadata").cloned().unwrap_or_else(|| json!({}));
        let meta = NotebookMeta::from_notebook_metadata(&metadata)?;
        let mut extra_metadata = metadata.as_object().cloned().unwrap_or_default();
        for key in ["janus", "track_history", "filepaths", "janus_markers"] {
            extra_metadata.remove(key);
        }

        let mut extra_fields = obj.clone();
        extra_fields.remove("cells");
        extra_fields.remove("metadata");

        Ok(Self {
            cells,
            meta,
            path: path.into(),
            extra_metadata,
            extra_fields,
        })
    }

    /// Full nbformat snapshot, as logged with each tracked action.
    pub fn to_json(&self) -> Value {
        let mut metadata = self.extra_metadata.clone();
        metadata.insert(
            "janus".into(),
            serde_json::to_value(&self.meta).unwrap_or(Value::Null),
        );
        let mut doc = self.extra_fields.clone();
        doc.insert(
            "cells".into(),
            Value::Array(self.cells.iter().map(Cell::to_json).collect()),
        );
        doc.insert("metadata".into(), Value::Object(metadata));
        doc.entry("nbformat").or_insert(json!(4));
        doc.entry("nbformat_minor").or_insert(json!(2));
        Value::Object(doc)
    }
}

/// The host's current selection: one primary cell plus any extension.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    pub primary: Option<CellId>,
    /// All selected cells in document order, including the primary.
    pub ids: Vec<CellId>,
}

impl Selection {
    pub fn single(id: CellId) -> Self {
        Self {
            primary: Some(id.clone()),
            ids: vec![id],
        }
    }

    pub fn contains(&self, id: &CellId) -> bool {
        self.ids.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
