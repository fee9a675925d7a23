use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One entry per JSON value, emitted in pre-order depth-first traversal
/// order. `id` doubles as the node's index into the table and is the only
/// stable addressing scheme the other components use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlatNode {
  pub id: usize,
  /// Enclosing container, `None` only for the document root (id 0).
  pub parent_id: Option<usize>,
  /// Property name / array index; `None` only for the root.
  pub key: Option<NodeKey>,
  /// Nesting level, root is 0.
  pub depth: usize,
  pub value_type: ValueType,
  /// Scalar payload; present iff the node is a primitive.
  pub value: Option<ScalarValue>,
  /// True iff the node is an object or array (even an empty one).
  pub expandable: bool,
  /// Direct members; 0 for primitives.
  pub child_count: usize,
  /// True for the final member of its container.
  pub last_child: bool,
}

impl FlatNode {
  /// String form of the key, the way a row renders it (`"0"`, `"name"`).
  pub fn key_string(&self) -> Option<String> {
    self.key.as_ref().map(|k| k.to_string())
  }
}

/// A member key: object property name or array index.
///
/// Untagged so the serialized payload is a plain string or number, the
/// same shape a host shell sends back when addressing a subtree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum NodeKey {
  Key(String),
  Index(usize),
}

impl fmt::Display for NodeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      NodeKey::Key(k) => f.write_str(k),
      NodeKey::Index(i) => write!(f, "{}", i),
    }
  }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
  String,
  Number,
  Boolean,
  Null,
  Object,
  Array,
}

/// Scalar payload of a primitive node. Numbers are native doubles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ScalarValue {
  Null,
  Boolean(bool),
  Number(f64),
  String(String),
}

impl ScalarValue {
  /// Display form shared by the renderer and the search engine. Integral
  /// doubles format without a trailing `.0`, so the primitive `2` renders
  /// and matches as `"2"`.
  pub fn display_string(&self) -> String {
    match self {
      ScalarValue::Null => "null".to_string(),
      ScalarValue::Boolean(b) => b.to_string(),
      ScalarValue::Number(n) => n.to_string(),
      ScalarValue::String(s) => s.clone(),
    }
  }
}

impl fmt::Display for ScalarValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.display_string())
  }
}

/// Syntax error with a 1-based position pointing at the first offending
/// character. Produced instead of a table; parsing is all-or-nothing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{message} at line {line} column {column}")]
pub struct ParseError {
  pub line: usize,
  pub column: usize,
  pub message: String,
}

fn default_max_depth() -> usize {
  512
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOptions {
  /// Pre-sizes the node table when the caller can estimate value count.
  #[serde(default)]
  pub size_hint: Option<usize>,
  /// Nesting cap; exceeding it is a normal `ParseError`, not a crash.
  #[serde(default = "default_max_depth")]
  pub max_depth: usize,
}

impl Default for ParseOptions {
  fn default() -> Self {
    Self {
      size_hint: None,
      max_depth: default_max_depth(),
    }
  }
}

/// Successful parse output: the flat table plus summary metadata.
///
/// Immutable once produced; a new parse replaces it wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedDocument {
  pub nodes: Vec<FlatNode>,
  /// Every node except the root.
  pub total_keys: usize,
  pub max_depth: usize,
}

/// Metadata for the currently loaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentInfo {
  pub doc_id: String,
  pub byte_size: usize,
  pub total_keys: usize,
  pub max_depth: usize,
  pub parsed_at_ms: i64,
}

/// Request handed to the parse worker. The serialized shape is the host
/// message contract: `{"type":"PARSE","raw":...,"options":{...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerRequest {
  #[serde(rename = "PARSE")]
  Parse {
    raw: String,
    #[serde(default)]
    options: ParseOptions,
  },
}

/// The worker's one-shot reply: the parsed table or the parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerResponse {
  Parsed(ParsedDocument),
  Failed(ParseError),
}

impl WorkerResponse {
  pub fn into_result(self) -> Result<ParsedDocument, ParseError> {
    match self {
      WorkerResponse::Parsed(doc) => Ok(doc),
      WorkerResponse::Failed(err) => Err(err),
    }
  }
}

impl From<Result<ParsedDocument, ParseError>> for WorkerResponse {
  fn from(result: Result<ParsedDocument, ParseError>) -> Self {
    match result {
      Ok(doc) => WorkerResponse::Parsed(doc),
      Err(err) => WorkerResponse::Failed(err),
    }
  }
}
