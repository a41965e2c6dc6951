//! Cumulative routing state of the monitored mesh.
//!
//! Entries are created the first time a node is referenced and are never
//! removed; a reporter going offline does not erase what it reported.

use std::collections::{BTreeMap, BTreeSet};

use meshwatch_types::{IgnoreEdge, NodeId, Relay, TopologyEntry};

/// Node ranks, parents, and ignore edges.
#[derive(Debug, Default)]
pub struct Topology {
    nodes: BTreeMap<NodeId, TopologyEntry>,
    ignores: BTreeSet<IgnoreEdge>,
}

impl Topology {
    /// Create an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `node` exists, creating an empty entry if it is new.
    pub fn observe(&mut self, node: &NodeId) -> &mut TopologyEntry {
        self.nodes
            .entry(node.clone())
            .or_insert_with(|| TopologyEntry::new(node.clone()))
    }

    /// Set the rank of `node`.
    pub fn set_rank(&mut self, node: &NodeId, rank: u32) {
        self.observe(node).rank = Some(rank);
    }

    /// Set the parent of `child`. Both nodes become observed.
    pub fn set_parent(&mut self, child: &NodeId, parent: &NodeId) {
        self.observe(parent);
        self.observe(child).parent = Some(parent.clone());
    }

    /// Unset the parent of `child`.
    pub fn clear_parent(&mut self, child: &NodeId) {
        self.observe(child).parent = None;
    }

    /// Unset the parent of `child` only if it is currently `parent`.
    ///
    /// A node announcing that it dropped an old parent after already
    /// selecting a new one keeps the new one. Returns whether the parent
    /// was cleared.
    pub fn remove_parent(&mut self, child: &NodeId, parent: &NodeId) -> bool {
        self.observe(parent);
        let entry = self.observe(child);
        if entry.parent.as_ref() == Some(parent) {
            entry.parent = None;
            true
        } else {
            false
        }
    }

    /// Record that `from` ignores traffic from `to`.
    ///
    /// Returns `false` if the edge was already present.
    pub fn add_ignore(&mut self, from: &NodeId, to: &NodeId) -> bool {
        self.observe(from);
        self.observe(to);
        self.ignores.insert(IgnoreEdge {
            from: from.clone(),
            to: to.clone(),
        })
    }

    /// Whether `relay` crosses an edge its receiver ignores.
    pub fn is_suppressed(&self, relay: &Relay) -> bool {
        self.ignores.contains(&IgnoreEdge {
            from: relay.dst.clone(),
            to: relay.src.clone(),
        })
    }

    /// Look up one node.
    pub fn entry(&self, node: &NodeId) -> Option<&TopologyEntry> {
        self.nodes.get(node)
    }

    /// Every observed node, ordered by id.
    pub fn snapshot(&self) -> Vec<TopologyEntry> {
        self.nodes.values().cloned().collect()
    }

    /// Every ignore edge, ordered.
    pub fn ignores(&self) -> Vec<IgnoreEdge> {
        self.ignores.iter().cloned().collect()
    }

    /// Number of observed nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no node has been observed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> NodeId {
        NodeId::new(id)
    }

    fn relay(src: &str, dst: &str) -> Relay {
        Relay {
            src: node(src),
            dst: node(dst),
            kind: "DIO".to_owned(),
            payload: "#p".to_owned(),
            time: 0,
        }
    }

    #[test]
    fn entries_are_created_lazily() {
        let mut topology = Topology::new();
        assert!(topology.is_empty());
        topology.set_rank(&node("sn3"), 256);
        assert_eq!(topology.len(), 1);
        assert_eq!(topology.entry(&node("sn3")).and_then(|e| e.rank), Some(256));
    }

    #[test]
    fn parent_select_observes_both_nodes() {
        let mut topology = Topology::new();
        topology.set_parent(&node("sn4"), &node("sn7"));
        assert_eq!(topology.len(), 2);
        assert_eq!(
            topology.entry(&node("sn4")).and_then(|e| e.parent.clone()),
            Some(node("sn7"))
        );
    }

    #[test]
    fn clear_parent_keeps_entry() {
        let mut topology = Topology::new();
        topology.set_parent(&node("sn4"), &node("sn7"));
        topology.set_rank(&node("sn4"), 3);
        topology.clear_parent(&node("sn4"));
        let entry = topology.entry(&node("sn4"));
        assert!(entry.is_some_and(|e| e.parent.is_none() && e.rank == Some(3)));
    }

    #[test]
    fn remove_parent_only_clears_matching_parent() {
        let mut topology = Topology::new();
        topology.set_parent(&node("sn4"), &node("sn8"));
        assert!(!topology.remove_parent(&node("sn4"), &node("sn7")));
        assert_eq!(
            topology.entry(&node("sn4")).and_then(|e| e.parent.clone()),
            Some(node("sn8"))
        );
        assert!(topology.remove_parent(&node("sn4"), &node("sn8")));
    }

    #[test]
    fn ignore_suppresses_reverse_relays_only() {
        let mut topology = Topology::new();
        assert!(topology.add_ignore(&node("x"), &node("y")));
        assert!(!topology.add_ignore(&node("x"), &node("y")));

        assert!(topology.is_suppressed(&relay("y", "x")));
        assert!(!topology.is_suppressed(&relay("x", "y")));
        assert!(!topology.is_suppressed(&relay("y", "z")));
    }

    #[test]
    fn snapshot_is_ordered() {
        let mut topology = Topology::new();
        topology.set_rank(&node("sn9"), 1);
        topology.set_rank(&node("sn1"), 2);
        let ids: Vec<String> = topology.snapshot().into_iter().map(|e| e.id.into_inner()).collect();
        assert_eq!(ids, vec!["sn1", "sn9"]);
    }
}
