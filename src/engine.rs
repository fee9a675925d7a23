use std::{
  path::Path,
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
  },
  time::{SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  delegate::{should_delegate, ExecutionDelegate, JobStatus, ParseDispatch, ParseJob, DEFAULT_DELEGATE_THRESHOLD},
  models::{DocumentInfo, FlatNode, ParseError, ParseOptions, ParsedDocument, ValueType},
  parse,
  search::{self, MatchList, SearchQuery},
  store::{StateKey, Store, Subscription, ViewerState},
  visible::{self, ExpansionSet},
  window::{VirtualWindow, WindowRange},
};

#[derive(Debug, Error)]
pub enum ViewerError {
  #[error("no document loaded")]
  NoDocument,
  #[error("unknown node id: {0}")]
  UnknownNode(usize),
  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
  #[error("invalid argument: {0}")]
  InvalidArg(String),
}

#[derive(Debug, Clone)]
pub struct ViewerOptions {
  /// Payloads at or above this byte size parse in a worker thread.
  pub delegate_threshold_bytes: usize,
  /// Fixed row height in pixels.
  pub item_height: f64,
  /// Extra rows materialized beyond the viewport on each side.
  pub overscan: usize,
  /// Search hit cap (matches beyond it set `truncated`).
  pub max_hits: usize,
  /// Parser nesting cap.
  pub max_parse_depth: usize,
  /// Preview truncation width, in characters.
  pub preview_max_chars: usize,
}

impl Default for ViewerOptions {
  fn default() -> Self {
    Self {
      delegate_threshold_bytes: DEFAULT_DELEGATE_THRESHOLD,
      item_height: 24.0,
      overscan: 8,
      max_hits: 10_000,
      max_parse_depth: 512,
      preview_max_chars: 120,
    }
  }
}

/// Outcome of a load call, or of polling a delegated parse.
#[derive(Debug, Clone)]
pub enum ParseStatus {
  Ready(DocumentInfo),
  Failed(ParseError),
  /// Parsing was delegated; call `poll` until the response lands.
  Pending { request_id: String },
}

/// Cursor position within the current match list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
  pub total: usize,
  pub current: usize,
  pub truncated: bool,
}

struct PendingParse {
  generation: u64,
  request_id: String,
  byte_size: usize,
  job: ParseJob,
}

/// Facade over the viewer core: delegate → parser → store →
/// projection/search → window. All methods take `&self`; clones share the
/// same underlying state.
#[derive(Clone)]
pub struct ViewerEngine {
  options: ViewerOptions,
  store: Store,
  delegate: ExecutionDelegate,
  window: Arc<Mutex<VirtualWindow>>,
  pending: Arc<Mutex<Option<PendingParse>>>,
  generation: Arc<AtomicU64>,
}

impl ViewerEngine {
  pub fn new(options: ViewerOptions) -> Self {
    let window = VirtualWindow::new(options.item_height, options.overscan);
    Self {
      delegate: ExecutionDelegate::new(options.delegate_threshold_bytes),
      store: Store::new(),
      window: Arc::new(Mutex::new(window)),
      pending: Arc::new(Mutex::new(None)),
      generation: Arc::new(AtomicU64::new(0)),
      options,
    }
  }

  pub fn options(&self) -> &ViewerOptions {
    &self.options
  }

  /// Register a store listener (`None` watches every key).
  pub fn subscribe(
    &self,
    keys: Option<&[StateKey]>,
    listener: impl Fn(&ViewerState, &[StateKey]) + Send + Sync + 'static,
  ) -> Subscription {
    self.store.subscribe(keys, listener)
  }

  /// Load a JSON document from raw text. Small payloads parse in the
  /// caller's context; large ones are delegated and `Pending` comes back
  /// (see `poll`). The raw text is always retained so it stays displayable
  /// verbatim even when the parse fails.
  pub fn load_text(&self, raw: impl Into<String>) -> ParseStatus {
    let raw = Arc::new(raw.into());
    let byte_size = raw.len();
    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
    let options = self.parse_options(byte_size);

    self.store.update(&[StateKey::Raw], |state| {
      state.raw = Some(raw.clone());
    });

    tracing::debug!(
      byte_size,
      delegated = should_delegate(byte_size, self.delegate.threshold()),
      "load requested"
    );

    match self.delegate.dispatch(&raw, options) {
      ParseDispatch::Completed(result) => {
        // A synchronous load supersedes any in-flight delegated parse.
        *self.pending.lock() = None;
        self.apply_parse_result(byte_size, result)
      }
      ParseDispatch::Pending(job) => {
        let request_id = Uuid::new_v4().to_string();
        *self.pending.lock() = Some(PendingParse {
          generation,
          request_id: request_id.clone(),
          byte_size,
          job,
        });
        ParseStatus::Pending { request_id }
      }
    }
  }

  /// Convenience origin: read a UTF-8 JSON file and load it.
  pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ParseStatus, ViewerError> {
    let bytes = std::fs::read(path)?;
    let raw = String::from_utf8(bytes)
      .map_err(|e| ViewerError::InvalidArg(format!("file is not valid UTF-8: {e}")))?;
    Ok(self.load_text(raw))
  }

  /// Apply a completed delegated parse, if any. A stale response (a newer
  /// load has been issued since) is discarded, never applied.
  pub fn poll(&self) -> Option<ParseStatus> {
    let mut slot = self.pending.lock();
    let p = slot.take()?;
    let current = self.generation.load(Ordering::SeqCst);
    if p.generation != current {
      tracing::debug!(request_id = %p.request_id, "discarding stale parse response");
      return None;
    }
    match p.job.poll() {
      JobStatus::Pending => {
        *slot = Some(p);
        None
      }
      JobStatus::Done(result) => {
        drop(slot);
        Some(self.apply_parse_result(p.byte_size, result))
      }
      JobStatus::Closed => {
        // Worker died without responding: recover in-context from the
        // retained raw text.
        tracing::warn!(request_id = %p.request_id, "parse worker channel closed, parsing synchronously");
        drop(slot);
        let raw = self.store.read(|s| s.raw.clone())?;
        let options = self.parse_options(raw.len());
        Some(self.apply_parse_result(p.byte_size, parse::parse(&raw, &options)))
      }
    }
  }

  /// True while a delegated parse is in flight.
  pub fn parse_pending(&self) -> bool {
    self.pending.lock().is_some()
  }

  fn parse_options(&self, byte_size: usize) -> ParseOptions {
    ParseOptions {
      // Rough one-node-per-16-bytes guess keeps reallocation down.
      size_hint: Some(byte_size / 16),
      max_depth: self.options.max_parse_depth,
    }
  }

  fn apply_parse_result(
    &self,
    byte_size: usize,
    result: Result<ParsedDocument, ParseError>,
  ) -> ParseStatus {
    match result {
      Ok(doc) => {
        let info = DocumentInfo {
          doc_id: Uuid::new_v4().to_string(),
          byte_size,
          total_keys: doc.total_keys,
          max_depth: doc.max_depth,
          parsed_at_ms: now_ms(),
        };
        let doc = Arc::new(doc);
        // Replacing the table invalidates expansion and search state.
        self.store.update(
          &[StateKey::Document, StateKey::Expansion, StateKey::Search],
          |state| {
            state.document = Some(doc.clone());
            state.info = Some(info.clone());
            state.parse_error = None;
            state.expanded = ExpansionSet::new();
            state.query = None;
            state.matches = MatchList::default();
          },
        );
        self.refresh_window();
        ParseStatus::Ready(info)
      }
      Err(err) => {
        // Keep the previous document rendered; only record the failure.
        self.store.update(&[StateKey::Document], |state| {
          state.parse_error = Some(err.clone());
        });
        ParseStatus::Failed(err)
      }
    }
  }

  pub fn document(&self) -> Option<Arc<ParsedDocument>> {
    self.store.read(|s| s.document.clone())
  }

  pub fn info(&self) -> Option<DocumentInfo> {
    self.store.read(|s| s.info.clone())
  }

  pub fn parse_error(&self) -> Option<ParseError> {
    self.store.read(|s| s.parse_error.clone())
  }

  pub fn raw_text(&self) -> Option<Arc<String>> {
    self.store.read(|s| s.raw.clone())
  }

  fn require_document(&self) -> Result<Arc<ParsedDocument>, ViewerError> {
    self.document().ok_or(ViewerError::NoDocument)
  }

  /// Flip one node open/closed; returns the new state. Non-expandable ids
  /// are accepted and ignored (their membership is meaningless).
  pub fn toggle(&self, id: usize) -> Result<bool, ViewerError> {
    let doc = self.require_document()?;
    let node = doc.nodes.get(id).ok_or(ViewerError::UnknownNode(id))?;
    if !node.expandable {
      return Ok(false);
    }
    let mut now_open = false;
    self.store.update(&[StateKey::Expansion], |state| {
      now_open = state.expanded.toggle(id);
    });
    self.refresh_window();
    Ok(now_open)
  }

  pub fn expand_all(&self) -> Result<(), ViewerError> {
    let doc = self.require_document()?;
    let all = ExpansionSet::all_expandable(&doc.nodes);
    self.store.update(&[StateKey::Expansion], |state| {
      state.expanded = all;
    });
    self.refresh_window();
    Ok(())
  }

  pub fn collapse_all(&self) -> Result<(), ViewerError> {
    self.require_document()?;
    self.store.update(&[StateKey::Expansion], |state| {
      state.expanded.clear();
    });
    self.refresh_window();
    Ok(())
  }

  /// Open the ancestor chain of `id`, what a UI does before scrolling to
  /// a match hidden inside a collapsed subtree.
  pub fn expand_ancestors(&self, id: usize) -> Result<(), ViewerError> {
    let doc = self.require_document()?;
    if id >= doc.nodes.len() {
      return Err(ViewerError::UnknownNode(id));
    }
    self.store.update(&[StateKey::Expansion], |state| {
      state.expanded.expand_ancestors(&doc.nodes, id);
    });
    self.refresh_window();
    Ok(())
  }

  /// Recompute the visible row count and push it into the window; any
  /// cached range is invalidated because the rows behind it changed.
  fn refresh_window(&self) {
    let total = self.store.read(|state| match &state.document {
      Some(doc) => visible::visible_count(&doc.nodes, &state.expanded),
      None => 0,
    });
    let mut window = self.window.lock();
    window.set_total_visible(total);
    let range = window.range();
    drop(window);
    self.store.update(&[StateKey::Window], |state| {
      state.window = range;
    });
  }

  /// Feed a scroll tick. `None` means the window range is unchanged and
  /// the caller must skip re-rendering entirely.
  pub fn on_scroll(&self, scroll_offset: f64, viewport_height: f64) -> Option<WindowRange> {
    let changed = self.window.lock().on_scroll(scroll_offset, viewport_height);
    if let Some(range) = changed {
      self.store.update(&[StateKey::Window], |state| {
        state.window = Some(range);
      });
    }
    changed
  }

  /// Clone out the rows for the current window range: the materialized
  /// output, O(window) regardless of document size.
  pub fn window_rows(&self) -> Vec<FlatNode> {
    let Some(range) = self.window.lock().range() else {
      return Vec::new();
    };
    self.store.read(|state| {
      let Some(doc) = &state.document else {
        return Vec::new();
      };
      visible::visible(&doc.nodes, &state.expanded)
        .skip(range.first)
        .take(range.len())
        .cloned()
        .collect()
    })
  }

  pub fn content_height(&self) -> f64 {
    self.window.lock().content_height()
  }

  pub fn visible_count(&self) -> usize {
    self.window.lock().total_visible()
  }

  /// Pixel offset for a visible-sequence index (the scroll-to-line
  /// signal); the host performs the actual scroll.
  pub fn scroll_to_item(&self, index: usize) -> f64 {
    self.window.lock().scroll_to_item(index)
  }

  /// Position of a node in the visible sequence, `None` while any of its
  /// ancestors is collapsed.
  pub fn visible_index_of(&self, id: usize) -> Result<Option<usize>, ViewerError> {
    self.store.read(|state| match &state.document {
      None => Err(ViewerError::NoDocument),
      Some(doc) => Ok(visible::visible_index_of(&doc.nodes, &state.expanded, id)),
    })
  }

  /// Run the query over the full table (collapsed subtrees included) and
  /// reset the cursor to the first match.
  pub fn set_query(&self, text: impl Into<String>) -> Result<MatchSummary, ViewerError> {
    let doc = self.require_document()?;
    let query = SearchQuery {
      text: text.into(),
      case_sensitive: false,
      max_hits: self.options.max_hits,
    };
    let matches = search::search(&doc.nodes, &query);
    let summary = MatchSummary {
      total: matches.len(),
      current: matches.current_index(),
      truncated: matches.truncated(),
    };
    self.store.update(&[StateKey::Search], |state| {
      state.query = Some(query);
      state.matches = matches;
    });
    Ok(summary)
  }

  /// Clear the query: empty match list, cursor 0, expansion untouched.
  pub fn clear_query(&self) {
    self.store.update(&[StateKey::Search], |state| {
      state.query = None;
      state.matches = MatchList::default();
    });
  }

  /// Advance the match cursor (wraps). Returns the node id under the
  /// cursor, or `None` when there are no matches.
  pub fn next_match(&self) -> Option<usize> {
    if self.store.read(|s| s.matches.is_empty()) {
      return None;
    }
    let mut moved = None;
    self.store.update(&[StateKey::Search], |state| {
      moved = state.matches.next();
    });
    moved
  }

  /// Step the match cursor back (wraps); `None` when there are no matches.
  pub fn prev_match(&self) -> Option<usize> {
    if self.store.read(|s| s.matches.is_empty()) {
      return None;
    }
    let mut moved = None;
    self.store.update(&[StateKey::Search], |state| {
      moved = state.matches.previous();
    });
    moved
  }

  pub fn current_match(&self) -> Option<usize> {
    self.store.read(|s| s.matches.current())
  }

  pub fn match_summary(&self) -> MatchSummary {
    self.store.read(|s| MatchSummary {
      total: s.matches.len(),
      current: s.matches.current_index(),
      truncated: s.matches.truncated(),
    })
  }

  /// RFC 6901 JSON Pointer for a node (`""` for the root).
  pub fn pointer_of(&self, id: usize) -> Result<String, ViewerError> {
    let doc = self.require_document()?;
    parse::pointer_of(&doc.nodes, id).ok_or(ViewerError::UnknownNode(id))
  }

  /// Serialize the subtree rooted at `id` back to compact JSON text.
  pub fn node_value_json(&self, id: usize) -> Result<String, ViewerError> {
    let doc = self.require_document()?;
    let value = parse::subtree_value(&doc.nodes, id).ok_or(ViewerError::UnknownNode(id))?;
    serde_json::to_string(&value).map_err(|e| ViewerError::InvalidArg(e.to_string()))
  }

  /// Short display preview for a row, truncated to the configured width.
  pub fn preview_of(&self, id: usize) -> Result<String, ViewerError> {
    let doc = self.require_document()?;
    let node = doc.nodes.get(id).ok_or(ViewerError::UnknownNode(id))?;
    Ok(preview(node, self.options.preview_max_chars))
  }
}

fn preview(node: &FlatNode, max_chars: usize) -> String {
  match node.value_type {
    ValueType::Object => {
      if node.child_count == 0 {
        "{} 0 keys".to_string()
      } else {
        format!("{{…}} {} keys", node.child_count)
      }
    }
    ValueType::Array => {
      if node.child_count == 0 {
        "[] 0 items".to_string()
      } else {
        format!("[…] {} items", node.child_count)
      }
    }
    _ => match &node.value {
      Some(v) => truncate_chars(&v.display_string(), max_chars),
      None => String::new(),
    },
  }
}

fn truncate_chars(s: &str, max: usize) -> String {
  if max == 0 {
    return String::new();
  }
  let mut out = String::new();
  for (i, ch) in s.chars().enumerate() {
    if i >= max {
      out.push('…');
      break;
    }
    out.push(ch);
  }
  out
}

fn now_ms() -> i64 {
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as i64
}
