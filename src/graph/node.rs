use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a graph node.
///
/// Identity is what collections key membership on; two nodes are "the same"
/// only when their ids are equal, regardless of property contents.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        Self(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Anything that participates in the scene graph: scenes, displays, effects.
pub trait Node {
    fn id(&self) -> NodeId;

    /// Human-readable node kind, used in logs and serialized snapshots.
    fn node_kind(&self) -> &str;
}

/// Ordered JSON property bag shared by scenes, displays, and effects.
///
/// Ordering is deterministic (BTreeMap) so serialized snapshots are stable.
pub type PropertyBag = BTreeMap<String, Value>;

/// Merge `updates` into `bag`, returning whether any value actually changed.
///
/// A key whose new value equals the stored one does not count as a change,
/// which lets callers skip redundant downstream refreshes.
pub fn merge_properties(bag: &mut PropertyBag, updates: &PropertyBag) -> bool {
    let mut changed = false;
    for (key, value) in updates {
        match bag.get(key) {
            Some(existing) if existing == value => {}
            _ => {
                bag.insert(key.clone(), value.clone());
                changed = true;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bag(pairs: &[(&str, Value)]) -> PropertyBag {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn ids_are_unique() {
        let a = NodeId::next();
        let b = NodeId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn merge_reports_real_changes_only() {
        let mut props = bag(&[("size", json!(10)), ("enabled", json!(true))]);

        assert!(!merge_properties(&mut props, &bag(&[("size", json!(10))])));
        assert!(merge_properties(&mut props, &bag(&[("size", json!(20))])));
        assert_eq!(props.get("size"), Some(&json!(20)));
    }

    #[test]
    fn merge_inserts_new_keys() {
        let mut props = PropertyBag::new();
        assert!(merge_properties(&mut props, &bag(&[("type", json!("square"))])));
        assert_eq!(props.get("type"), Some(&json!("square")));
    }
}
