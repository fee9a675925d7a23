mod delegate;
mod engine;
mod models;
mod parse;
mod search;
mod store;
mod visible;
mod window;

pub use crate::delegate::{
  should_delegate, ExecutionDelegate, JobStatus, ParseDispatch, ParseJob,
  DEFAULT_DELEGATE_THRESHOLD,
};
pub use crate::engine::{MatchSummary, ParseStatus, ViewerEngine, ViewerError, ViewerOptions};
pub use crate::models::{
  DocumentInfo, FlatNode, NodeKey, ParseError, ParseOptions, ParsedDocument, ScalarValue,
  ValueType, WorkerRequest, WorkerResponse,
};
pub use crate::parse::{parse, pointer_of, subtree_value};
pub use crate::search::{search, MatchList, SearchQuery};
pub use crate::store::{StateKey, Store, Subscription, ViewerState};
pub use crate::visible::{
  nth_visible, visible, visible_count, visible_index_of, ExpansionSet, VisibleIter,
};
pub use crate::window::{compute_range, VirtualWindow, WindowRange};
