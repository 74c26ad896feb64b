//! Cell content: kind, source text, and nbformat output records.
//!
//! `CellContent` is the unit that versions snapshot and that the history
//! reconstructor materializes. Equality for versioning purposes is
//! [`CellContent::matches`], which compares what a reader would see (source
//! and output payloads) and ignores ids, names, and execution counts.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use strum::EnumString;

/// What kind of cell this is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum CellKind {
    #[default]
    Code,
    Markdown,
    Raw,
}

impl CellKind {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CellKind::Code => "code",
            CellKind::Markdown => "markdown",
            CellKind::Raw => "raw",
        }
    }
}

impl std::fmt::Display for CellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One nbformat output record, tagged by `output_type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream {
        #[serde(default = "default_stream_name")]
        name: String,
        #[serde(deserialize_with = "multiline")]
        text: String,
    },
    DisplayData {
        #[serde(default)]
        data: serde_json::Map<String, serde_json::Value>,
        #[serde(default)]
        metadata: serde_json::Map<String, serde_json::Value>,
    },
    ExecuteResult {
        #[serde(default)]
        data: serde_json::Map<String, serde_json::Value>,
        #[serde(default)]
        metadata: serde_json::Map<String, serde_json::Value>,
        #[serde(default)]
        execution_count: Option<u64>,
    },
    Error {
        #[serde(default)]
        ename: String,
        #[serde(default)]
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

fn default_stream_name() -> String {
    "stdout".to_string()
}

impl Output {
    /// Convenience constructor for stdout text.
    pub fn stdout(text: impl Into<String>) -> Self {
        Output::Stream {
            name: default_stream_name(),
            text: text.into(),
        }
    }

    /// Convenience constructor for a `text/plain` execute result.
    pub fn text_result(text: impl Into<String>, execution_count: Option<u64>) -> Self {
        let mut data = serde_json::Map::new();
        data.insert("text/plain".into(), serde_json::Value::String(text.into()));
        Output::ExecuteResult {
            data,
            metadata: serde_json::Map::new(),
            execution_count,
        }
    }

    pub fn output_type(&self) -> &'static str {
        match self {
            Output::Stream { .. } => "stream",
            Output::DisplayData { .. } => "display_data",
            Output::ExecuteResult { .. } => "execute_result",
            Output::Error { .. } => "error",
        }
    }

    /// Payload equality: same output type, same visible payload.
    ///
    /// Execution counts and display metadata do not participate.
    pub fn same_payload(&self, other: &Output) -> bool {
        match (self, other) {
            (Output::Stream { text: a, .. }, Output::Stream { text: b, .. }) => a == b,
            (Output::DisplayData { data: a, .. }, Output::DisplayData { data: b, .. }) => a == b,
            (Output::ExecuteResult { data: a, .. }, Output::ExecuteResult { data: b, .. }) => {
                a == b
            }
            (
                Output::Error {
                    ename: an,
                    evalue: av,
                    ..
                },
                Output::Error {
                    ename: bn,
                    evalue: bv,
                    ..
                },
            ) => an == bn && av == bv,
            _ => false,
        }
    }
}

/// Source text plus outputs: the content a version snapshots.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct CellContent {
    #[serde(default)]
    pub cell_type: CellKind,
    #[serde(default, deserialize_with = "multiline")]
    pub source: String,
    #[serde(default)]
    pub outputs: Vec<Output>,
}

impl CellContent {
    pub fn new(cell_type: CellKind, source: impl Into<String>) -> Self {
        Self {
            cell_type,
            source: source.into(),
            outputs: Vec::new(),
        }
    }

    pub fn code(source: impl Into<String>) -> Self {
        Self::new(CellKind::Code, source)
    }

    pub fn with_outputs(mut self, outputs: Vec<Output>) -> Self {
        self.outputs = outputs;
        self
    }

    /// False iff empty source and zero outputs.
    pub fn has_content(&self) -> bool {
        !self.source.is_empty() || !self.outputs.is_empty()
    }

    /// Versioning equality: source, output count, and per-index payloads.
    pub fn matches(&self, other: &CellContent) -> bool {
        self.source == other.source
            && self.outputs.len() == other.outputs.len()
            && self
                .outputs
                .iter()
                .zip(&other.outputs)
                .all(|(a, b)| a.same_payload(b))
    }

    /// Number of source lines, as shown on a folded-group placeholder.
    pub fn line_count(&self) -> usize {
        self.source.split('\n').count()
    }
}

/// Accept an nbformat multiline string: either one string or a list of lines.
fn multiline<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Multiline {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Multiline::deserialize(deserializer)? {
        Multiline::One(s) => s,
        Multiline::Many(lines) => lines.concat(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_parse_and_display() {
        assert_eq!(CellKind::from_str("Markdown"), Some(CellKind::Markdown));
        assert_eq!(CellKind::from_str("nope"), None);
        assert_eq!(CellKind::Raw.to_string(), "raw");
    }

    #[test]
    fn test_has_content() {
        assert!(!CellContent::code("").has_content());
        assert!(CellContent::code("x").has_content());
        assert!(CellContent::code("").with_outputs(vec![Output::stdout("hi")]).has_content());
    }

    #[test]
    fn test_matches_compares_payloads() {
        let a = CellContent::code("print(1)").with_outputs(vec![Output::stdout("1\n")]);
        let b = CellContent::code("print(1)").with_outputs(vec![Output::stdout("1\n")]);
        let c = CellContent::code("print(1)").with_outputs(vec![Output::stdout("2\n")]);
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
    }

    #[test]
    fn test_matches_ignores_execution_count() {
        let a = CellContent::code("1").with_outputs(vec![Output::text_result("1", Some(1))]);
        let b = CellContent::code("1").with_outputs(vec![Output::text_result("1", Some(7))]);
        assert!(a.matches(&b));
    }

    #[test]
    fn test_matches_output_type_mismatch() {
        let a = CellContent::code("x").with_outputs(vec![Output::stdout("1")]);
        let b = CellContent::code("x").with_outputs(vec![Output::text_result("1", None)]);
        assert!(!a.matches(&b));
    }

    #[test]
    fn test_matches_output_count() {
        let a = CellContent::code("x").with_outputs(vec![Output::stdout("1")]);
        let b = CellContent::code("x");
        assert!(!a.matches(&b));
    }

    #[test]
    fn test_error_payload() {
        let err = |v: &str| Output::Error {
            ename: "ValueError".into(),
            evalue: v.into(),
            traceback: vec![],
        };
        assert!(err("bad").same_payload(&err("bad")));
        assert!(!err("bad").same_payload(&err("worse")));
    }

    #[test]
    fn test_deserialize_nbformat_multiline() {
        let content: CellContent = serde_json::from_value(json!({
            "cell_type": "code",
            "source": ["import os\n", "os.getcwd()"],
            "outputs": [
                {"output_type": "stream", "name": "stdout", "text": ["a\n", "b\n"]},
                {"output_type": "execute_result", "data": {"text/plain": "'/'"}, "metadata": {}, "execution_count": 3}
            ]
        }))
        .unwrap();
        assert_eq!(content.source, "import os\nos.getcwd()");
        assert_eq!(content.line_count(), 2);
        assert_eq!(content.outputs[0], Output::stdout("a\nb\n"));
        assert_eq!(content.outputs[1].output_type(), "execute_result");
    }
}
