//! Diagnostic invariant checker for the host graph.
//!
//! Verifies every structural and index consistency property the engine
//! promises, in one pass and without short-circuiting, so a corrupted
//! graph reports all of its violations at once. Intended for test
//! harnesses and debugging builds; never called on a hot path, and never
//! mutates the graph.

use std::fmt;
use tracing::warn;

use crate::graph::{Graph, NodeId};

/// Which invariant family a violation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// A dead arena or incidence slot is missing from its free list.
    FreeSlot,
    /// A live entity count disagrees with the arena contents.
    Count,
    /// A degree counter disagrees with the incidence list.
    Degree,
    /// An incidence entry does not resolve to the arena edge at that id.
    Identity,
    /// An edge is missing from its source's out-list or target's in-list,
    /// or an endpoint is not live.
    Consistency,
    /// The class index and the entity labels disagree.
    ClassIndex,
    /// The root list and the node root flags disagree.
    RootSet,
}

/// One violated invariant, with a human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    fn new(kind: ViolationKind, message: String) -> Self {
        Self { kind, message }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Checks all invariants and logs each violation at `warn` level.
///
/// Returns whether the graph is valid. An empty graph trivially
/// satisfies every invariant.
pub fn validate(graph: &Graph) -> bool {
    let violations = check_invariants(graph);
    for violation in &violations {
        warn!(kind = ?violation.kind, "{}", violation);
    }
    violations.is_empty()
}

/// Checks all invariants and returns every violation found.
///
/// Never stops at the first failure; the full list is the point.
pub fn check_invariants(graph: &Graph) -> Vec<Violation> {
    let mut violations = Vec::new();
    check_node_arena(graph, &mut violations);
    check_edge_arena(graph, &mut violations);
    check_class_index(graph, &mut violations);
    check_root_set(graph, &mut violations);
    violations
}

fn check_node_arena(graph: &Graph, violations: &mut Vec<Violation>) {
    let mut live = 0usize;
    for index in 0..graph.free_node_slots.next_index() {
        let node = match &graph.nodes[index as usize] {
            None => {
                // Invariant 1: dead slot must be a recorded hole.
                if !graph.free_node_slots.is_free(index) {
                    violations.push(Violation::new(
                        ViolationKind::FreeSlot,
                        format!(
                            "node slot {} is empty but not in the free node slot list",
                            index
                        ),
                    ));
                }
                continue;
            }
            Some(node) => node,
        };
        live += 1;

        if node.index().as_u32() != index {
            violations.push(Violation::new(
                ViolationKind::Identity,
                format!(
                    "node slot {} holds a node with mismatched id {}",
                    index,
                    node.index()
                ),
            ));
        }

        // Invariant 3: degree counters equal live incidence entries.
        check_incidence(
            graph,
            node.index(),
            "out",
            &node.out_edges,
            node.outdegree(),
            violations,
        );
        check_incidence(
            graph,
            node.index(),
            "in",
            &node.in_edges,
            node.indegree(),
            violations,
        );
    }

    // Invariant 2: the counter equals the live slots.
    if live != graph.node_count {
        violations.push(Violation::new(
            ViolationKind::Count,
            format!(
                "number of nodes {} does not equal the {} live slots in the node array",
                graph.node_count, live
            ),
        ));
    }
}

fn check_incidence(
    graph: &Graph,
    node: NodeId,
    direction: &str,
    list: &crate::graph::IncidenceList,
    degree: usize,
    violations: &mut Vec<Violation>,
) {
    let alloc = list.allocator();
    let mut live = 0usize;
    for index in 0..alloc.next_index() {
        match list.raw_slots()[index as usize] {
            None => {
                if !alloc.is_free(index) {
                    violations.push(Violation::new(
                        ViolationKind::FreeSlot,
                        format!(
                            "{}-edge slot {} of {} is empty but not in its free slot list",
                            direction, index, node
                        ),
                    ));
                }
            }
            Some(edge_id) => {
                live += 1;
                // Invariant 4: the entry resolves through the edge arena,
                // and that edge really is incident on this side.
                match graph.get_edge(edge_id).ok().flatten() {
                    None => violations.push(Violation::new(
                        ViolationKind::Identity,
                        format!(
                            "{}'s {}-edge {} is not a live edge in the edge array",
                            node, direction, edge_id
                        ),
                    )),
                    Some(edge) => {
                        let endpoint = if direction == "out" {
                            edge.source()
                        } else {
                            edge.target()
                        };
                        if endpoint != node {
                            violations.push(Violation::new(
                                ViolationKind::Identity,
                                format!(
                                    "{}'s {}-edge {} is anchored at {} in the edge array",
                                    node, direction, edge_id, endpoint
                                ),
                            ));
                        }
                    }
                }
            }
        }
    }
    if live != degree {
        violations.push(Violation::new(
            ViolationKind::Degree,
            format!(
                "{}'s {}degree {} does not equal the {} edges in its {}-edge list",
                node, direction, degree, live, direction
            ),
        ));
    }
}

fn check_edge_arena(graph: &Graph, violations: &mut Vec<Violation>) {
    let mut live = 0usize;
    for index in 0..graph.free_edge_slots.next_index() {
        let edge = match &graph.edges[index as usize] {
            None => {
                if !graph.free_edge_slots.is_free(index) {
                    violations.push(Violation::new(
                        ViolationKind::FreeSlot,
                        format!(
                            "edge slot {} is empty but not in the free edge slot list",
                            index
                        ),
                    ));
                }
                continue;
            }
            Some(edge) => edge,
        };
        live += 1;

        if edge.index().as_u32() != index {
            violations.push(Violation::new(
                ViolationKind::Identity,
                format!(
                    "edge slot {} holds an edge with mismatched id {}",
                    index,
                    edge.index()
                ),
            ));
        }

        // Invariant 5: the edge appears in its source's out-list and its
        // target's in-list, and both endpoints are live.
        match graph.get_node(edge.source()).ok().flatten() {
            None => violations.push(Violation::new(
                ViolationKind::Consistency,
                format!("{}'s source {} is not a live node", edge.index(), edge.source()),
            )),
            Some(source) => {
                if !source.out_edges().any(|id| id == edge.index()) {
                    violations.push(Violation::new(
                        ViolationKind::Consistency,
                        format!(
                            "{} does not occur in its source {}'s out-edge list",
                            edge.index(),
                            edge.source()
                        ),
                    ));
                }
            }
        }
        match graph.get_node(edge.target()).ok().flatten() {
            None => violations.push(Violation::new(
                ViolationKind::Consistency,
                format!("{}'s target {} is not a live node", edge.index(), edge.target()),
            )),
            Some(target) => {
                if !target.in_edges().any(|id| id == edge.index()) {
                    violations.push(Violation::new(
                        ViolationKind::Consistency,
                        format!(
                            "{} does not occur in its target {}'s in-edge list",
                            edge.index(),
                            edge.target()
                        ),
                    ));
                }
            }
        }
    }

    if live != graph.edge_count {
        violations.push(Violation::new(
            ViolationKind::Count,
            format!(
                "number of edges {} does not equal the {} live slots in the edge array",
                graph.edge_count, live
            ),
        ));
    }
}

/// Invariant 6: every entity is in exactly the bucket of its class.
fn check_class_index(graph: &Graph, violations: &mut Vec<Violation>) {
    for class in crate::label::LabelClass::ALL {
        let node_bucket = graph.nodes_by_class(class);
        for (position, id) in node_bucket.iter().enumerate() {
            match graph.get_node(*id).ok().flatten() {
                None => violations.push(Violation::new(
                    ViolationKind::ClassIndex,
                    format!("class {} node bucket holds dead id {}", class, id),
                )),
                Some(node) => {
                    if node.label_class() != class {
                        violations.push(Violation::new(
                            ViolationKind::ClassIndex,
                            format!(
                                "{} with class {} occurs in the {} node bucket",
                                id,
                                node.label_class(),
                                class
                            ),
                        ));
                    }
                }
            }
            if node_bucket[..position].contains(id) {
                violations.push(Violation::new(
                    ViolationKind::ClassIndex,
                    format!("{} occurs twice in the {} node bucket", id, class),
                ));
            }
        }

        let edge_bucket = graph.edges_by_class(class);
        for (position, id) in edge_bucket.iter().enumerate() {
            match graph.get_edge(*id).ok().flatten() {
                None => violations.push(Violation::new(
                    ViolationKind::ClassIndex,
                    format!("class {} edge bucket holds dead id {}", class, id),
                )),
                Some(edge) => {
                    if edge.label_class() != class {
                        violations.push(Violation::new(
                            ViolationKind::ClassIndex,
                            format!(
                                "{} with class {} occurs in the {} edge bucket",
                                id,
                                edge.label_class(),
                                class
                            ),
                        ));
                    }
                }
            }
            if edge_bucket[..position].contains(id) {
                violations.push(Violation::new(
                    ViolationKind::ClassIndex,
                    format!("{} occurs twice in the {} edge bucket", id, class),
                ));
            }
        }
    }

    // Membership direction: every live entity must be indexed.
    for node in graph.nodes() {
        if !graph
            .nodes_by_class(node.label_class())
            .contains(&node.index())
        {
            violations.push(Violation::new(
                ViolationKind::ClassIndex,
                format!(
                    "{} does not occur in the bucket of its label class {}",
                    node.index(),
                    node.label_class()
                ),
            ));
        }
    }
    for edge in graph.edges() {
        if !graph
            .edges_by_class(edge.label_class())
            .contains(&edge.index())
        {
            violations.push(Violation::new(
                ViolationKind::ClassIndex,
                format!(
                    "{} does not occur in the bucket of its label class {}",
                    edge.index(),
                    edge.label_class()
                ),
            ));
        }
    }
}

/// Invariant 7: the root list holds exactly the root-flagged nodes.
fn check_root_set(graph: &Graph, violations: &mut Vec<Violation>) {
    for (position, id) in graph.root_nodes().iter().enumerate() {
        match graph.get_node(*id).ok().flatten() {
            None => violations.push(Violation::new(
                ViolationKind::RootSet,
                format!("root list holds dead id {}", id),
            )),
            Some(node) => {
                if !node.is_root() {
                    violations.push(Violation::new(
                        ViolationKind::RootSet,
                        format!("root list holds {} whose root flag is unset", id),
                    ));
                }
            }
        }
        if graph.root_nodes()[..position].contains(id) {
            violations.push(Violation::new(
                ViolationKind::RootSet,
                format!("{} occurs twice in the root list", id),
            ));
        }
    }
    for node in graph.nodes() {
        if node.is_root() && !graph.root_nodes().contains(&node.index()) {
            violations.push(Violation::new(
                ViolationKind::RootSet,
                format!("root node {} is missing from the root list", node.index()),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeId;
    use crate::label::{Atom, Label, LabelClass, Mark};

    fn two_node_graph() -> (Graph, NodeId, NodeId, EdgeId) {
        let mut graph = Graph::new();
        let a = graph.add_node(Label::blank(), true);
        let b = graph.add_node(Label::new(Mark::None, vec![Atom::Integer(1)]), false);
        let e = graph.add_edge(Label::blank(), false, a, b).unwrap();
        (graph, a, b, e)
    }

    #[test]
    fn empty_graph_is_trivially_valid() {
        let graph = Graph::new();
        assert!(validate(&graph));
        assert!(check_invariants(&graph).is_empty());
    }

    #[test]
    fn valid_after_mixed_operations() {
        let (mut graph, a, b, e) = two_node_graph();
        assert!(validate(&graph));

        let c = graph.add_node(Label::blank(), false);
        graph.add_edge(Label::blank(), true, b, c).unwrap();
        graph
            .relabel_node(b, Some(Label::blank()), true)
            .unwrap();
        assert!(validate(&graph));

        graph.remove_edge(e).unwrap();
        graph.remove_node(a).unwrap();
        assert!(validate(&graph));
    }

    #[test]
    fn detects_count_drift() {
        let (mut graph, ..) = two_node_graph();
        graph.node_count += 1;
        let violations = check_invariants(&graph);
        assert!(violations
            .iter()
            .any(|v| v.kind == ViolationKind::Count));
    }

    #[test]
    fn detects_zeroed_counters_on_nonempty_graph() {
        let (mut graph, ..) = two_node_graph();
        graph.node_count = 0;
        graph.edge_count = 0;
        let violations = check_invariants(&graph);
        assert!(violations
            .iter()
            .filter(|v| v.kind == ViolationKind::Count)
            .count() >= 2);
    }

    #[test]
    fn detects_degree_drift() {
        let (mut graph, a, ..) = two_node_graph();
        graph.nodes[a.as_u32() as usize].as_mut().unwrap().outdegree = 5;
        let violations = check_invariants(&graph);
        assert!(violations
            .iter()
            .any(|v| v.kind == ViolationKind::Degree));
    }

    #[test]
    fn detects_unrecorded_hole() {
        let (mut graph, _, b, e) = two_node_graph();
        graph.remove_edge(e).unwrap();
        // Drop the node without going through remove_node.
        graph.nodes[b.as_u32() as usize] = None;
        graph.node_count -= 1;
        let violations = check_invariants(&graph);
        assert!(violations
            .iter()
            .any(|v| v.kind == ViolationKind::FreeSlot));
    }

    #[test]
    fn detects_stale_class_bucket() {
        let (mut graph, a, ..) = two_node_graph();
        // Change the stored class without reindexing.
        graph.nodes[a.as_u32() as usize].as_mut().unwrap().label_class = LabelClass::Int;
        let violations = check_invariants(&graph);
        assert!(violations
            .iter()
            .any(|v| v.kind == ViolationKind::ClassIndex));
        assert!(!validate(&graph));
    }

    #[test]
    fn detects_root_list_drift() {
        let (mut graph, a, ..) = two_node_graph();
        graph.nodes[a.as_u32() as usize].as_mut().unwrap().root = false;
        let violations = check_invariants(&graph);
        assert!(violations
            .iter()
            .any(|v| v.kind == ViolationKind::RootSet));
    }

    #[test]
    fn detects_dangling_incidence_entry() {
        let (mut graph, _, _, e) = two_node_graph();
        // Clear the edge slot without touching the incidence lists.
        graph.edges[e.as_u32() as usize] = None;
        graph.edge_count -= 1;
        let violations = check_invariants(&graph);
        assert!(violations
            .iter()
            .any(|v| v.kind == ViolationKind::Identity));
        // The dead edge slot is also an unrecorded hole.
        assert!(violations
            .iter()
            .any(|v| v.kind == ViolationKind::FreeSlot));
    }

    #[test]
    fn reports_multiple_violations_in_one_pass() {
        let (mut graph, a, ..) = two_node_graph();
        graph.node_count += 1;
        graph.nodes[a.as_u32() as usize].as_mut().unwrap().root = false;
        let violations = check_invariants(&graph);
        assert!(violations.len() >= 2);
    }
}
