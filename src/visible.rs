use std::collections::HashSet;

use crate::models::FlatNode;

/// Set of node ids considered open. Absence means collapsed; membership
/// of non-expandable ids is meaningless and ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionSet {
  ids: HashSet<usize>,
}

impl ExpansionSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// The `expand-all` state: every expandable id, from a single filter
  /// pass over the flat table (no tree walk).
  pub fn all_expandable(nodes: &[FlatNode]) -> Self {
    Self {
      ids: nodes.iter().filter(|n| n.expandable).map(|n| n.id).collect(),
    }
  }

  pub fn contains(&self, id: usize) -> bool {
    self.ids.contains(&id)
  }

  /// Flip one id. Descendant visibility is derived, never stored, so a
  /// toggle touches exactly this membership. Returns the new state.
  pub fn toggle(&mut self, id: usize) -> bool {
    if self.ids.remove(&id) {
      false
    } else {
      self.ids.insert(id);
      true
    }
  }

  pub fn insert(&mut self, id: usize) -> bool {
    self.ids.insert(id)
  }

  pub fn remove(&mut self, id: usize) -> bool {
    self.ids.remove(&id)
  }

  pub fn clear(&mut self) {
    self.ids.clear();
  }

  pub fn len(&self) -> usize {
    self.ids.len()
  }

  pub fn is_empty(&self) -> bool {
    self.ids.is_empty()
  }

  /// Open every container on the parent chain of `id` (what a consumer
  /// does before scrolling to a node hidden in a collapsed subtree).
  pub fn expand_ancestors(&mut self, nodes: &[FlatNode], id: usize) {
    let mut current = nodes.get(id).and_then(|n| n.parent_id);
    while let Some(parent_id) = current {
      self.ids.insert(parent_id);
      current = nodes.get(parent_id).and_then(|n| n.parent_id);
    }
  }
}

/// Lazy walk of the currently visible rows: the root plus every node whose
/// ancestor chain is fully expanded. Pure recomputation on each call.
pub fn visible<'a, 'e>(nodes: &'a [FlatNode], expanded: &'e ExpansionSet) -> VisibleIter<'a, 'e> {
  VisibleIter {
    nodes,
    expanded,
    idx: 0,
  }
}

pub struct VisibleIter<'a, 'e> {
  nodes: &'a [FlatNode],
  expanded: &'e ExpansionSet,
  idx: usize,
}

impl<'a> Iterator for VisibleIter<'a, '_> {
  type Item = &'a FlatNode;

  fn next(&mut self) -> Option<&'a FlatNode> {
    let node = self.nodes.get(self.idx)?;
    self.idx += 1;
    // A collapsed container hides its whole contiguous subtree. The root
    // is implicitly expanded and never gates its children.
    if node.expandable && node.parent_id.is_some() && !self.expanded.contains(node.id) {
      while self.idx < self.nodes.len() && self.nodes[self.idx].depth > node.depth {
        self.idx += 1;
      }
    }
    Some(node)
  }
}

/// Row count of the visible sequence (the virtual window's total).
pub fn visible_count(nodes: &[FlatNode], expanded: &ExpansionSet) -> usize {
  visible(nodes, expanded).count()
}

/// Position of a node in the visible sequence, `None` while any ancestor
/// is collapsed.
pub fn visible_index_of(nodes: &[FlatNode], expanded: &ExpansionSet, id: usize) -> Option<usize> {
  visible(nodes, expanded).position(|n| n.id == id)
}

/// The `index`-th visible row.
pub fn nth_visible<'a>(
  nodes: &'a [FlatNode],
  expanded: &ExpansionSet,
  index: usize,
) -> Option<&'a FlatNode> {
  visible(nodes, expanded).nth(index)
}
