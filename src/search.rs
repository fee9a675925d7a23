use serde::{Deserialize, Serialize};

use crate::models::FlatNode;

fn default_max_hits() -> usize {
  10_000
}

/// Search input. Defaults give the viewer's standard behavior:
/// case-insensitive substring matching with a hit cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
  pub text: String,
  #[serde(default)]
  pub case_sensitive: bool,
  /// Ids kept in the match list; hits beyond the cap set `truncated`.
  #[serde(default = "default_max_hits")]
  pub max_hits: usize,
}

impl SearchQuery {
  pub fn new(text: impl Into<String>) -> Self {
    Self {
      text: text.into(),
      ..Default::default()
    }
  }
}

impl Default for SearchQuery {
  fn default() -> Self {
    Self {
      text: String::new(),
      case_sensitive: false,
      max_hits: default_max_hits(),
    }
  }
}

/// Query normalized once, up front, so the per-node test is a plain
/// substring check.
#[derive(Debug, Clone)]
struct PreparedQuery {
  needle: String,
  case_sensitive: bool,
}

impl PreparedQuery {
  fn new(query: &SearchQuery) -> Option<Self> {
    let text = query.text.trim();
    if text.is_empty() {
      return None;
    }
    let needle = if query.case_sensitive {
      text.to_string()
    } else {
      text.to_lowercase()
    };
    Some(Self {
      needle,
      case_sensitive: query.case_sensitive,
    })
  }

  fn matches(&self, hay: &str) -> bool {
    if self.case_sensitive {
      hay.contains(&self.needle)
    } else {
      hay.to_lowercase().contains(&self.needle)
    }
  }
}

/// Ordered match ids (ascending) plus the wrapping cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchList {
  ids: Vec<usize>,
  current: usize,
  truncated: bool,
}

impl MatchList {
  pub fn ids(&self) -> &[usize] {
    &self.ids
  }

  pub fn len(&self) -> usize {
    self.ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ids.is_empty()
  }

  /// True when the scan stopped at the hit cap.
  pub fn truncated(&self) -> bool {
    self.truncated
  }

  pub fn current_index(&self) -> usize {
    self.current
  }

  /// Node id under the cursor, if any matches exist.
  pub fn current(&self) -> Option<usize> {
    self.ids.get(self.current).copied()
  }

  /// Advance the cursor with wraparound; no-op on an empty list.
  pub fn next(&mut self) -> Option<usize> {
    if self.ids.is_empty() {
      return None;
    }
    self.current = (self.current + 1) % self.ids.len();
    Some(self.ids[self.current])
  }

  /// Step the cursor back with wraparound; no-op on an empty list.
  pub fn previous(&mut self) -> Option<usize> {
    if self.ids.is_empty() {
      return None;
    }
    self.current = (self.current + self.ids.len() - 1) % self.ids.len();
    Some(self.ids[self.current])
  }
}

/// Scan the full flat table; matches inside collapsed subtrees count.
///
/// A node is tested against its key first; a key hit short-circuits the
/// value test for that node only. Values are tested for non-expandable
/// nodes, using the same string form the renderer displays. Ids come out
/// ascending because the table is scanned in order; same inputs always
/// produce the same list.
pub fn search(nodes: &[FlatNode], query: &SearchQuery) -> MatchList {
  let Some(prepared) = PreparedQuery::new(query) else {
    return MatchList::default();
  };
  let mut list = MatchList::default();
  for node in nodes {
    if list.ids.len() >= query.max_hits {
      list.truncated = true;
      break;
    }
    if let Some(key) = node.key_string() {
      if prepared.matches(&key) {
        list.ids.push(node.id);
        continue;
      }
    }
    if !node.expandable {
      if let Some(value) = &node.value {
        if prepared.matches(&value.display_string()) {
          list.ids.push(node.id);
        }
      }
    }
  }
  list
}
