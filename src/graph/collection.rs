use crate::foundation::error::{StageError, StageResult};
use crate::graph::node::{Node, NodeId};

/// Ordered, identity-keyed container of graph nodes.
///
/// Positions form a dense zero-based ordering; insertion order is preserved
/// except through [`NodeCollection::swap`]. The collection owns its members.
#[derive(Debug, Default)]
pub struct NodeCollection<T: Node> {
    nodes: Vec<T>,
}

impl<T: Node> NodeCollection<T> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append `node` at the end.
    ///
    /// A node whose id is already present is rejected; duplicate identities
    /// would make position lookups ambiguous.
    pub fn add(&mut self, node: T) -> StageResult<()> {
        if self.index_of(node.id()).is_some() {
            return Err(StageError::validation(format!(
                "{} node {:?} is already in the collection",
                node.node_kind(),
                node.id()
            )));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Remove the node with `id`, returning it. Absent id is a no-op (`None`).
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        let index = self.index_of(id)?;
        Some(self.nodes.remove(index))
    }

    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id() == id)
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.nodes.iter_mut().find(|n| n.id() == id)
    }

    pub fn get_at(&self, index: usize) -> Option<&T> {
        self.nodes.get(index)
    }

    /// Move the node at `index` by `delta` positions, shifting the nodes in
    /// between (a rotate, not a pairwise exchange).
    ///
    /// The destination clamps to collection bounds; an out-of-range `index`
    /// is a no-op. Returns whether the ordering changed.
    pub fn swap(&mut self, index: usize, delta: isize) -> bool {
        if index >= self.nodes.len() {
            return false;
        }
        let max = self.nodes.len() as isize - 1;
        let target = (index as isize + delta).clamp(0, max) as usize;
        if target == index {
            return false;
        }
        let node = self.nodes.remove(index);
        self.nodes.insert(target, node);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.nodes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.nodes.iter_mut()
    }

    /// Ordered snapshot of member ids.
    ///
    /// Bulk-mutation paths iterate this snapshot and mutate through it, never
    /// the live collection they are walking.
    pub fn ids(&self) -> Vec<NodeId> {
        self.nodes.iter().map(|n| n.id()).collect()
    }
}
