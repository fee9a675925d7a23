use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::models::{DocumentInfo, ParseError, ParsedDocument};
use crate::search::{MatchList, SearchQuery};
use crate::visible::ExpansionSet;
use crate::window::WindowRange;

/// Watched-key granularity for store subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKey {
  Raw,
  Document,
  Expansion,
  Search,
  Window,
}

/// Everything the viewer derives from the current document.
///
/// The flat table is immutable and replaced wholesale on a new parse; the
/// raw text is retained even when parsing fails so it stays displayable.
#[derive(Debug, Clone, Default)]
pub struct ViewerState {
  pub raw: Option<Arc<String>>,
  pub document: Option<Arc<ParsedDocument>>,
  pub info: Option<DocumentInfo>,
  pub parse_error: Option<ParseError>,
  pub expanded: ExpansionSet,
  /// `None` means "no query entered", distinct from a query with no hits.
  pub query: Option<SearchQuery>,
  pub matches: MatchList,
  pub window: Option<WindowRange>,
}

type Listener = Arc<dyn Fn(&ViewerState, &[StateKey]) + Send + Sync>;

struct Subscriber {
  id: u64,
  keys: Option<Vec<StateKey>>,
  listener: Listener,
}

struct StoreInner {
  state: ViewerState,
  subscribers: Vec<Subscriber>,
  next_id: u64,
}

/// Single mutation point for viewer state.
///
/// An update applies atomically: subscribers run synchronously after the
/// mutation, under the store lock, so they observe a total order of
/// states. Listeners receive the post-update state by reference and must
/// not call back into the store.
#[derive(Clone)]
pub struct Store {
  inner: Arc<Mutex<StoreInner>>,
}

impl Default for Store {
  fn default() -> Self {
    Self::new()
  }
}

impl Store {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(Mutex::new(StoreInner {
        state: ViewerState::default(),
        subscribers: Vec::new(),
        next_id: 0,
      })),
    }
  }

  /// Snapshot accessor. The closure runs under the store lock; keep it
  /// short.
  pub fn read<R>(&self, f: impl FnOnce(&ViewerState) -> R) -> R {
    f(&self.inner.lock().state)
  }

  /// `setState`: mutate, then notify every subscriber watching at least
  /// one of `changed` (or watching everything), exactly once.
  pub fn update(&self, changed: &[StateKey], f: impl FnOnce(&mut ViewerState)) {
    let mut inner = self.inner.lock();
    f(&mut inner.state);
    if changed.is_empty() {
      return;
    }
    let inner = &*inner;
    for sub in &inner.subscribers {
      let fire = match &sub.keys {
        None => true,
        Some(keys) => keys.iter().any(|k| changed.contains(k)),
      };
      if fire {
        (sub.listener)(&inner.state, changed);
      }
    }
  }

  /// Register a listener for the given keys (`None` watches everything).
  pub fn subscribe(
    &self,
    keys: Option<&[StateKey]>,
    listener: impl Fn(&ViewerState, &[StateKey]) + Send + Sync + 'static,
  ) -> Subscription {
    let mut inner = self.inner.lock();
    let id = inner.next_id;
    inner.next_id += 1;
    inner.subscribers.push(Subscriber {
      id,
      keys: keys.map(|k| k.to_vec()),
      listener: Arc::new(listener),
    });
    Subscription {
      id,
      inner: Arc::downgrade(&self.inner),
    }
  }
}

/// Handle returned by `subscribe`. Unsubscribing twice is a no-op, and a
/// handle outliving its store is harmless.
pub struct Subscription {
  id: u64,
  inner: Weak<Mutex<StoreInner>>,
}

impl Subscription {
  pub fn unsubscribe(&self) {
    if let Some(inner) = self.inner.upgrade() {
      inner.lock().subscribers.retain(|s| s.id != self.id);
    }
  }
}
