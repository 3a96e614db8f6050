//! Host-graph storage engine.
//!
//! A `Graph` is a mutable labelled directed multigraph held in two dense
//! arenas (nodes, edges) with slot recycling, per-node incidence lists,
//! a label-class index for both entity kinds, and an explicit root-node
//! list. All cross-references are integer ids into the owning graph's
//! arenas; a lookup by id is the only way to reach another entity, so a
//! derived clone of the whole structure is a deep copy with identical
//! slot indices.
//!
//! # Invariants
//! - Every live arena slot holds exactly one entity; every dead slot
//!   below the allocator cursor is recorded in the free list.
//! - A node's degree counters equal the live entries of its incidence
//!   lists, and every incident edge id resolves to a live edge whose
//!   endpoints include the node.
//! - Every live entity appears in exactly the class-index bucket of its
//!   current label class; the root list holds exactly the root nodes.
//!
//! The checks themselves live in [`crate::validate`].
//!
//! # Citations
//! - Bak & Plump, "Rooted Graph Programs" (2012) - root-node tracking
//! - Ehrig et al., "Fundamentals of Algebraic Graph Transformation"
//!   (2006) - host graphs and the dangling condition

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::index::ClassIndex;
use crate::label::{Label, LabelClass};
use crate::slots::SlotAllocator;

/// Arena slot id of a node, stable for the node's lifetime.
///
/// Only meaningful relative to the graph that issued it. Displayed in
/// the dump spelling `n<index>`.
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Arena slot id of an edge. Displayed as `e<index>`.
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EdgeId(u32);

impl EdgeId {
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Errors reported by graph operations.
///
/// All of these are recoverable: the operation is refused and the graph
/// is left unchanged. Conditions the engine cannot continue from (empty
/// snapshot restore, allocation failure) are panics, not variants here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Node removal refused because incident edges remain.
    IncidentEdges {
        node: NodeId,
        indegree: usize,
        outdegree: usize,
    },
    /// Node id was never issued by this graph.
    NodeOutOfRange(NodeId),
    /// Edge id was never issued by this graph.
    EdgeOutOfRange(EdgeId),
    /// Node id was issued but the slot is currently free.
    NodeAbsent(NodeId),
    /// Edge id was issued but the slot is currently free.
    EdgeAbsent(EdgeId),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::IncidentEdges {
                node,
                indegree,
                outdegree,
            } => write!(
                f,
                "cannot remove {} with incident edges (indegree {}, outdegree {})",
                node, indegree, outdegree
            ),
            GraphError::NodeOutOfRange(id) => write!(f, "node id {} was never issued", id),
            GraphError::EdgeOutOfRange(id) => write!(f, "edge id {} was never issued", id),
            GraphError::NodeAbsent(id) => write!(f, "node {} has been removed", id),
            GraphError::EdgeAbsent(id) => write!(f, "edge {} has been removed", id),
        }
    }
}

impl std::error::Error for GraphError {}

/// Per-node list of incident edge ids with slot recycling.
///
/// Each list owns its own [`SlotAllocator`], so removal is O(list length)
/// for the position scan and insertion is O(1) amortized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidenceList {
    slots: Vec<Option<EdgeId>>,
    alloc: SlotAllocator,
}

impl IncidenceList {
    fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, edge: EdgeId) {
        let index = self.alloc.allocate() as usize;
        if index == self.slots.len() {
            self.slots.push(Some(edge));
        } else {
            debug_assert!(self.slots[index].is_none());
            self.slots[index] = Some(edge);
        }
    }

    /// Clears the slot holding `edge` and frees it. Returns whether the
    /// edge was present.
    fn remove(&mut self, edge: EdgeId) -> bool {
        let limit = self.alloc.next_index() as usize;
        for index in 0..limit {
            if self.slots[index] == Some(edge) {
                self.slots[index] = None;
                self.alloc.free(index as u32);
                return true;
            }
        }
        false
    }

    /// Live edge ids in slot order.
    pub fn iter(&self) -> impl Iterator<Item = EdgeId> + '_ {
        let limit = self.alloc.next_index() as usize;
        self.slots[..limit].iter().filter_map(|slot| *slot)
    }

    /// Whether `edge` is present.
    pub fn contains(&self, edge: EdgeId) -> bool {
        self.iter().any(|entry| entry == edge)
    }

    pub(crate) fn raw_slots(&self) -> &[Option<EdgeId>] {
        &self.slots
    }

    pub(crate) fn allocator(&self) -> &SlotAllocator {
        &self.alloc
    }
}

/// A node: root flag, label, derived class, degrees, incidence lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub(crate) index: NodeId,
    pub(crate) root: bool,
    pub(crate) label: Label,
    pub(crate) label_class: LabelClass,
    pub(crate) indegree: usize,
    pub(crate) outdegree: usize,
    pub(crate) out_edges: IncidenceList,
    pub(crate) in_edges: IncidenceList,
}

impl Node {
    #[inline]
    pub fn index(&self) -> NodeId {
        self.index
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.root
    }

    #[inline]
    pub fn label(&self) -> &Label {
        &self.label
    }

    #[inline]
    pub fn label_class(&self) -> LabelClass {
        self.label_class
    }

    #[inline]
    pub fn indegree(&self) -> usize {
        self.indegree
    }

    #[inline]
    pub fn outdegree(&self) -> usize {
        self.outdegree
    }

    /// Outgoing edge ids in slot order.
    pub fn out_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.out_edges.iter()
    }

    /// Incoming edge ids in slot order.
    pub fn in_edges(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.in_edges.iter()
    }
}

/// An edge: direction flag, label, derived class, endpoint ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub(crate) index: EdgeId,
    pub(crate) bidirectional: bool,
    pub(crate) label: Label,
    pub(crate) label_class: LabelClass,
    pub(crate) source: NodeId,
    pub(crate) target: NodeId,
}

impl Edge {
    #[inline]
    pub fn index(&self) -> EdgeId {
        self.index
    }

    #[inline]
    pub fn is_bidirectional(&self) -> bool {
        self.bidirectional
    }

    #[inline]
    pub fn label(&self) -> &Label {
        &self.label
    }

    #[inline]
    pub fn label_class(&self) -> LabelClass {
        self.label_class
    }

    #[inline]
    pub fn source(&self) -> NodeId {
        self.source
    }

    #[inline]
    pub fn target(&self) -> NodeId {
        self.target
    }
}

/// The host graph.
///
/// Owns both arenas, their allocators, the two class indexes, and the
/// root list. `Clone` yields a fully independent copy whose entities
/// keep their slot indices, which is what the snapshot stack relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    pub(crate) nodes: Vec<Option<Node>>,
    pub(crate) edges: Vec<Option<Edge>>,
    pub(crate) free_node_slots: SlotAllocator,
    pub(crate) free_edge_slots: SlotAllocator,
    pub(crate) node_count: usize,
    pub(crate) edge_count: usize,
    pub(crate) nodes_by_class: ClassIndex<NodeId>,
    pub(crate) edges_by_class: ClassIndex<EdgeId>,
    pub(crate) root_nodes: Vec<NodeId>,
}

impl Graph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of live edges.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Adds a node and returns its id.
    ///
    /// The node starts with empty incidence lists and is inserted into
    /// the class index and, when `root` is set, the root list.
    pub fn add_node(&mut self, label: Label, root: bool) -> NodeId {
        let class = label.class();
        let index = self.free_node_slots.allocate();
        let id = NodeId(index);
        let node = Node {
            index: id,
            root,
            label,
            label_class: class,
            indegree: 0,
            outdegree: 0,
            out_edges: IncidenceList::new(),
            in_edges: IncidenceList::new(),
        };
        let slot = index as usize;
        if slot == self.nodes.len() {
            self.nodes.push(Some(node));
        } else {
            debug_assert!(self.nodes[slot].is_none());
            self.nodes[slot] = Some(node);
        }
        self.nodes_by_class.insert(class, id);
        if root {
            self.root_nodes.push(id);
        }
        self.node_count += 1;
        id
    }

    /// Adds an edge from `source` to `target` and returns its id.
    ///
    /// Both endpoints must be live nodes of this graph; the edge is
    /// appended to the source's out-list and the target's in-list and
    /// both degree counters are bumped. Self-loops are permitted.
    pub fn add_edge(
        &mut self,
        label: Label,
        bidirectional: bool,
        source: NodeId,
        target: NodeId,
    ) -> Result<EdgeId, GraphError> {
        self.require_node(source)?;
        self.require_node(target)?;

        let class = label.class();
        let index = self.free_edge_slots.allocate();
        let id = EdgeId(index);
        let edge = Edge {
            index: id,
            bidirectional,
            label,
            label_class: class,
            source,
            target,
        };
        let slot = index as usize;
        if slot == self.edges.len() {
            self.edges.push(Some(edge));
        } else {
            debug_assert!(self.edges[slot].is_none());
            self.edges[slot] = Some(edge);
        }

        {
            let node = self.node_mut(source);
            node.out_edges.insert(id);
            node.outdegree += 1;
        }
        {
            let node = self.node_mut(target);
            node.in_edges.insert(id);
            node.indegree += 1;
        }

        self.edges_by_class.insert(class, id);
        self.edge_count += 1;
        Ok(id)
    }

    /// Removes a node with no incident edges.
    ///
    /// Refused with [`GraphError::IncidentEdges`] while any edge still
    /// touches the node; the graph is left unchanged in that case.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        let node = self.require_node(id)?;
        if node.indegree > 0 || node.outdegree > 0 {
            let (indegree, outdegree) = (node.indegree, node.outdegree);
            debug!(%id, indegree, outdegree, "node removal refused: incident edges");
            return Err(GraphError::IncidentEdges {
                node: id,
                indegree,
                outdegree,
            });
        }

        let slot = id.as_u32() as usize;
        let node = self.nodes[slot].take().expect("liveness checked above");
        self.nodes_by_class.remove(node.label_class, id);
        if node.root {
            self.drop_root(id);
        }
        self.free_node_slots.free(id.as_u32());
        self.node_count -= 1;
        Ok(())
    }

    /// Removes an edge, clearing its slots in both incidence lists and
    /// decrementing both endpoint degrees.
    pub fn remove_edge(&mut self, id: EdgeId) -> Result<(), GraphError> {
        let edge = self.require_edge(id)?;
        let (source, target, class) = (edge.source, edge.target, edge.label_class);

        let slot = id.as_u32() as usize;
        self.edges[slot] = None;

        {
            let node = self.node_mut(source);
            let removed = node.out_edges.remove(id);
            debug_assert!(removed, "edge missing from source out-list");
            node.outdegree -= 1;
        }
        {
            let node = self.node_mut(target);
            let removed = node.in_edges.remove(id);
            debug_assert!(removed, "edge missing from target in-list");
            node.indegree -= 1;
        }

        self.edges_by_class.remove(class, id);
        self.free_edge_slots.free(id.as_u32());
        self.edge_count -= 1;
        Ok(())
    }

    /// Replaces a node's label and/or toggles its root flag.
    ///
    /// `None` keeps the current label. When a new label lands in a
    /// different class the class index is updated; a same-class relabel
    /// leaves the index untouched. Toggling the root flag keeps the
    /// root list exact.
    pub fn relabel_node(
        &mut self,
        id: NodeId,
        new_label: Option<Label>,
        toggle_root: bool,
    ) -> Result<(), GraphError> {
        self.require_node(id)?;

        if toggle_root {
            let node = self.node_mut(id);
            node.root = !node.root;
            if node.root {
                self.root_nodes.push(id);
            } else {
                self.drop_root(id);
            }
        }

        if let Some(label) = new_label {
            let new_class = label.class();
            let old_class = {
                let node = self.node_mut(id);
                let old = node.label_class;
                node.label = label;
                node.label_class = new_class;
                old
            };
            self.nodes_by_class.reclassify(old_class, new_class, id);
        }
        Ok(())
    }

    /// Replaces an edge's label and/or toggles its direction flag.
    pub fn relabel_edge(
        &mut self,
        id: EdgeId,
        new_label: Option<Label>,
        toggle_bidirectional: bool,
    ) -> Result<(), GraphError> {
        self.require_edge(id)?;
        let slot = id.as_u32() as usize;
        let edge = self.edges[slot].as_mut().expect("liveness checked above");

        if toggle_bidirectional {
            edge.bidirectional = !edge.bidirectional;
        }

        if let Some(label) = new_label {
            let new_class = label.class();
            let old_class = edge.label_class;
            edge.label = label;
            edge.label_class = new_class;
            self.edges_by_class.reclassify(old_class, new_class, id);
        }
        Ok(())
    }

    /// Looks up a node by id.
    ///
    /// `Err` means the id was never issued; `Ok(None)` means the slot
    /// was issued but is currently free, so callers can distinguish
    /// "never existed" from "existed, now removed".
    pub fn get_node(&self, id: NodeId) -> Result<Option<&Node>, GraphError> {
        if id.as_u32() >= self.free_node_slots.next_index() {
            return Err(GraphError::NodeOutOfRange(id));
        }
        Ok(self.nodes[id.as_u32() as usize].as_ref())
    }

    /// Looks up an edge by id; same contract as [`Graph::get_node`].
    pub fn get_edge(&self, id: EdgeId) -> Result<Option<&Edge>, GraphError> {
        if id.as_u32() >= self.free_edge_slots.next_index() {
            return Err(GraphError::EdgeOutOfRange(id));
        }
        Ok(self.edges[id.as_u32() as usize].as_ref())
    }

    /// Live nodes in slot order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter_map(|slot| slot.as_ref())
    }

    /// Live edges in slot order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter_map(|slot| slot.as_ref())
    }

    /// Node ids currently classified under `class`, unordered.
    #[inline]
    pub fn nodes_by_class(&self, class: LabelClass) -> &[NodeId] {
        self.nodes_by_class.bucket(class)
    }

    /// Edge ids currently classified under `class`, unordered.
    #[inline]
    pub fn edges_by_class(&self, class: LabelClass) -> &[EdgeId] {
        self.edges_by_class.bucket(class)
    }

    /// The nodes currently flagged as root, unordered.
    #[inline]
    pub fn root_nodes(&self) -> &[NodeId] {
        &self.root_nodes
    }

    /// Outgoing edge ids of a live node, in slot order.
    pub fn out_edges(
        &self,
        id: NodeId,
    ) -> Result<impl Iterator<Item = EdgeId> + '_, GraphError> {
        Ok(self.require_node(id)?.out_edges())
    }

    /// Incoming edge ids of a live node, in slot order.
    pub fn in_edges(
        &self,
        id: NodeId,
    ) -> Result<impl Iterator<Item = EdgeId> + '_, GraphError> {
        Ok(self.require_node(id)?.in_edges())
    }

    /// In-degree of a live node.
    pub fn indegree(&self, id: NodeId) -> Result<usize, GraphError> {
        Ok(self.require_node(id)?.indegree())
    }

    /// Out-degree of a live node.
    pub fn outdegree(&self, id: NodeId) -> Result<usize, GraphError> {
        Ok(self.require_node(id)?.outdegree())
    }

    /// Multi-line diagnostic dump: one stanza per node and edge plus the
    /// root list. Debugging aid, not a machine format.
    pub fn dump_verbose(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        out.push_str("Nodes\n=====\n");
        for node in self.nodes() {
            let _ = write!(out, "Index: {}", node.index.as_u32());
            if node.root {
                out.push_str(" (Root)");
            }
            let _ = writeln!(
                out,
                "\nLabel Class: {}\nLabel: {}\nIndegree: {}. Outdegree: {}\n",
                node.label_class, node.label, node.indegree, node.outdegree
            );
        }
        out.push_str("Edges\n=====\n");
        for edge in self.edges() {
            let _ = write!(out, "Index: {}", edge.index.as_u32());
            if edge.bidirectional {
                out.push_str(" (Bidirectional)");
            }
            let _ = writeln!(
                out,
                "\nLabel Class: {}\nLabel: {}\nSource: {}. Target: {}\n",
                edge.label_class,
                edge.label,
                edge.source.as_u32(),
                edge.target.as_u32()
            );
        }
        out.push_str("Root Nodes:");
        for id in &self.root_nodes {
            let _ = write!(out, " {}", id);
        }
        out.push('\n');
        out
    }

    fn require_node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.get_node(id)?.ok_or(GraphError::NodeAbsent(id))
    }

    fn require_edge(&self, id: EdgeId) -> Result<&Edge, GraphError> {
        self.get_edge(id)?.ok_or(GraphError::EdgeAbsent(id))
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.as_u32() as usize]
            .as_mut()
            .expect("caller verified liveness")
    }

    fn drop_root(&mut self, id: NodeId) {
        if let Some(position) = self.root_nodes.iter().position(|root| *root == id) {
            self.root_nodes.swap_remove(position);
        }
    }
}

impl fmt::Display for Graph {
    /// Single-line host-graph dump:
    /// `[ (n0(R), empty) (n1, 1 # red) | (e0(B), n0, n1, empty) ]`.
    /// The empty graph prints as `[ | ]`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ ")?;
        for node in self.nodes() {
            if node.root {
                write!(f, "(n{}(R), {}) ", node.index.as_u32(), node.label)?;
            } else {
                write!(f, "(n{}, {}) ", node.index.as_u32(), node.label)?;
            }
        }
        write!(f, "| ")?;
        for edge in self.edges() {
            if edge.bidirectional {
                write!(f, "(e{}(B), ", edge.index.as_u32())?;
            } else {
                write!(f, "(e{}, ", edge.index.as_u32())?;
            }
            write!(f, "{}, {}, {}) ", edge.source, edge.target, edge.label)?;
        }
        write!(f, "]")
    }
}
