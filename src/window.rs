/// Half-open row range `[first, last)` over the visible sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRange {
  pub first: usize,
  pub last: usize,
}

impl WindowRange {
  pub fn len(&self) -> usize {
    self.last - self.first
  }

  pub fn is_empty(&self) -> bool {
    self.first == self.last
  }
}

/// Which visible-sequence indices must be materialized for the current
/// scroll position. Holds `first <= last <= total_visible` for all inputs.
pub fn compute_range(
  scroll_offset: f64,
  viewport_height: f64,
  item_height: f64,
  overscan: usize,
  total_visible: usize,
) -> WindowRange {
  if item_height <= 0.0 || total_visible == 0 {
    return WindowRange { first: 0, last: 0 };
  }
  let scroll = scroll_offset.max(0.0);
  let first_row = (scroll / item_height).floor() as usize;
  let first = first_row.saturating_sub(overscan);
  let last_row = ((scroll + viewport_height.max(0.0)) / item_height).ceil() as usize;
  let last = last_row.saturating_add(overscan).min(total_visible);
  WindowRange {
    first: first.min(last),
    last,
  }
}

/// Stateful window over the visible sequence.
///
/// Callers feed every scroll tick to `on_scroll`; a `None` means the
/// previously materialized rows are still exactly right and the tick must
/// be a complete no-op; that skip is the dominant cost-avoidance
/// mechanism of the whole renderer.
#[derive(Debug)]
pub struct VirtualWindow {
  item_height: f64,
  overscan: usize,
  total_visible: usize,
  last_range: Option<WindowRange>,
}

impl VirtualWindow {
  pub fn new(item_height: f64, overscan: usize) -> Self {
    Self {
      item_height,
      overscan,
      total_visible: 0,
      last_range: None,
    }
  }

  pub fn item_height(&self) -> f64 {
    self.item_height
  }

  pub fn total_visible(&self) -> usize {
    self.total_visible
  }

  /// Content height backing the scrollbar; depends only on the row count,
  /// not on whether a re-render happened.
  pub fn content_height(&self) -> f64 {
    self.total_visible as f64 * self.item_height
  }

  /// Update the row count after expand/collapse or a table replacement.
  /// Always invalidates the cached range: a numerically equal range now
  /// denotes different rows.
  pub fn set_total_visible(&mut self, total: usize) {
    self.total_visible = total;
    self.last_range = None;
  }

  /// Compute the range for a scroll tick; `None` when it is unchanged.
  pub fn on_scroll(&mut self, scroll_offset: f64, viewport_height: f64) -> Option<WindowRange> {
    let range = compute_range(
      scroll_offset,
      viewport_height,
      self.item_height,
      self.overscan,
      self.total_visible,
    );
    if self.last_range == Some(range) {
      return None;
    }
    self.last_range = Some(range);
    Some(range)
  }

  /// Range produced by the most recent scroll tick, if any.
  pub fn range(&self) -> Option<WindowRange> {
    self.last_range
  }

  /// Pixel offset the host should scroll to so the `index`-th visible row
  /// sits at the top of the viewport. The host owns the actual scroll
  /// (best-effort smooth, not synchronous).
  pub fn scroll_to_item(&self, index: usize) -> f64 {
    index as f64 * self.item_height
  }
}
