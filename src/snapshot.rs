//! Snapshot stack for speculative rule application.
//!
//! Before attempting a transformation that may fail, the rule engine
//! pushes a deep copy of the host graph; on failure (or backtracking) it
//! pops the copy back as the live graph. The stack is an owned value of
//! the rule-execution context, never a process-wide global, and is
//! strictly LIFO: there is no restore-to-an-earlier-snapshot that skips
//! intermediate entries.
//!
//! Copies preserve arena slot indices, so ids held by the caller remain
//! valid across a restore.

use tracing::debug;

use crate::graph::Graph;

/// LIFO stack of full graph copies.
#[derive(Debug, Clone, Default)]
pub struct SnapshotStack {
    stack: Vec<Graph>,
}

impl SnapshotStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a deep, fully independent copy of `graph`.
    ///
    /// O(live nodes + live edges). Later mutation of either the live
    /// graph or the snapshot never affects the other.
    pub fn snapshot(&mut self, graph: &Graph) {
        debug!(
            depth = self.stack.len() + 1,
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "snapshot pushed"
        );
        self.stack.push(graph.clone());
    }

    /// Pops the most recent snapshot as the new live graph.
    ///
    /// The caller replaces its live graph with the returned one, which
    /// discards the failed transformation.
    ///
    /// # Panics
    /// Panics when the stack is empty: restoring with nothing to restore
    /// to is a programming error, not a recoverable condition.
    pub fn restore(&mut self) -> Graph {
        let graph = self
            .stack
            .pop()
            .expect("restore on an empty snapshot stack");
        debug!(depth = self.stack.len(), "snapshot restored");
        graph
    }

    /// Drops the most recent snapshot without restoring it.
    ///
    /// Used on the accept path once a speculative transformation is
    /// known to have succeeded.
    ///
    /// # Panics
    /// Panics when the stack is empty, like [`SnapshotStack::restore`].
    pub fn discard(&mut self) {
        self.stack
            .pop()
            .expect("discard on an empty snapshot stack");
        debug!(depth = self.stack.len(), "snapshot discarded");
    }

    /// Number of snapshots currently held.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether no snapshot is held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;

    #[test]
    fn restore_undoes_mutation() {
        let mut graph = Graph::new();
        let a = graph.add_node(Label::blank(), false);
        let b = graph.add_node(Label::blank(), false);
        let e = graph.add_edge(Label::blank(), false, a, b).unwrap();

        let mut snapshots = SnapshotStack::new();
        snapshots.snapshot(&graph);

        graph.remove_edge(e).unwrap();
        graph.remove_node(b).unwrap();
        assert_eq!(graph.node_count(), 1);

        graph = snapshots.restore();
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(snapshots.is_empty());
    }

    #[test]
    fn nested_snapshots_restore_in_lifo_order() {
        let mut graph = Graph::new();
        graph.add_node(Label::blank(), false);

        let mut snapshots = SnapshotStack::new();
        snapshots.snapshot(&graph); // 1 node
        graph.add_node(Label::blank(), false);
        snapshots.snapshot(&graph); // 2 nodes
        graph.add_node(Label::blank(), false);
        assert_eq!(snapshots.depth(), 2);

        graph = snapshots.restore();
        assert_eq!(graph.node_count(), 2);
        graph = snapshots.restore();
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn snapshot_is_isolated_from_live_graph() {
        let mut graph = Graph::new();
        let a = graph.add_node(Label::blank(), true);

        let mut snapshots = SnapshotStack::new();
        snapshots.snapshot(&graph);
        graph.relabel_node(a, None, true).unwrap();

        let restored = snapshots.restore();
        assert_eq!(restored.root_nodes(), &[a]);
    }

    #[test]
    fn restore_without_mutation_is_identity() {
        let mut graph = Graph::new();
        let a = graph.add_node(Label::blank(), true);
        let b = graph.add_node(Label::blank(), false);
        graph.add_edge(Label::blank(), false, a, b).unwrap();

        let mut snapshots = SnapshotStack::new();
        snapshots.snapshot(&graph);
        let restored = snapshots.restore();
        assert_eq!(restored, graph);
    }

    #[test]
    fn discard_drops_without_restoring() {
        let mut graph = Graph::new();
        graph.add_node(Label::blank(), false);
        let mut snapshots = SnapshotStack::new();
        snapshots.snapshot(&graph);
        snapshots.discard();
        assert!(snapshots.is_empty());
    }

    #[test]
    #[should_panic(expected = "restore on an empty snapshot stack")]
    fn restore_on_empty_stack_panics() {
        SnapshotStack::new().restore();
    }
}
