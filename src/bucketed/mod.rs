//! Signature-bucketed graph engine.
//!
//! An alternative host-graph representation for matching-heavy
//! workloads: every node is kept in one of a fixed, small number of
//! buckets chosen by a coarse structural signature of the node (loop
//! count, in-degree, out-degree, root flag). Buckets are intrusive
//! doubly-linked lists, so reindexing a node after a structural change
//! is O(1), and the matcher enumerates structurally plausible candidates
//! by walking a single bucket instead of the whole arena.
//!
//! Nodes and edges share one tagged pool with an intrusive free list
//! (see [`pool`]). Labels play no role in this engine; it is the
//! low-level execution substrate where the rule compiler has already
//! discharged label conditions.
//!
//! # Invariants
//! - Every live node is threaded into exactly the bucket its signature
//!   selects; the index is never left transiently inconsistent across a
//!   public operation (unindex before any degree mutation, reindex
//!   after all of them).
//! - Loops are counted on the node, not stored as edges.
//!
//! # Citations
//! - Dodds & Plump, "Graph Transformation in Constant Time" (2006) -
//!   degree-indexed candidate enumeration

pub mod pool;

use std::fmt;

use pool::Pool;

/// Number of signature buckets.
pub const BUCKET_COUNT: usize = 8;

/// Handle to a live node in a [`BucketedGraph`]'s pool.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeHandle(u32);

impl NodeHandle {
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Handle to a live edge in a [`BucketedGraph`]'s pool.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeHandle(u32);

impl EdgeHandle {
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EdgeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Bucket-selection policy.
///
/// The engine stores and maintains the structural counters; what they
/// mean for candidate grouping is the matcher's decision. The returned
/// bucket must be below [`BUCKET_COUNT`].
pub trait Signature {
    fn bucket(&self, loops: usize, indegree: usize, outdegree: usize, root: bool) -> usize;
}

/// Default coarsening: bit 0 = root, bit 1 = has predecessors,
/// bit 2 = has successors.
///
/// Eight buckets; loop count is ignored. Good enough for rule left-hand
/// sides that anchor on roots and direction of incident edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct DegreeSignature;

impl Signature for DegreeSignature {
    fn bucket(&self, _loops: usize, indegree: usize, outdegree: usize, root: bool) -> usize {
        (root as usize) | (((indegree > 0) as usize) << 1) | (((outdegree > 0) as usize) << 2)
    }
}

/// One signature bucket: head of an intrusive doubly-linked node list.
#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    head: Option<u32>,
    len: usize,
}

/// The signature-bucketed graph.
///
/// Structural mutations follow a fixed choreography: unindex the
/// affected nodes, mutate counters and chains, reindex. Between those
/// steps the node is in no bucket, but no public call returns in that
/// state.
#[derive(Debug, Clone)]
pub struct BucketedGraph<S: Signature = DegreeSignature> {
    pool: Pool,
    buckets: [Bucket; BUCKET_COUNT],
    signature: S,
    node_count: usize,
    edge_count: usize,
}

impl BucketedGraph<DegreeSignature> {
    /// Creates an empty graph with the default signature policy.
    pub fn new() -> Self {
        Self::with_signature(DegreeSignature)
    }
}

impl Default for BucketedGraph<DegreeSignature> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Signature> BucketedGraph<S> {
    /// Creates an empty graph with a caller-supplied signature policy.
    pub fn with_signature(signature: S) -> Self {
        Self {
            pool: Pool::new(),
            buckets: [Bucket::default(); BUCKET_COUNT],
            signature,
            node_count: 0,
            edge_count: 0,
        }
    }

    /// Number of live nodes.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of live edges (loops not included).
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Adds a node and threads it into its signature bucket.
    pub fn add_node(&mut self, root: bool) -> NodeHandle {
        let index = self.pool.alloc_node(root);
        self.index_node(index);
        self.node_count += 1;
        NodeHandle(index)
    }

    /// Adds an edge from `src` to `tgt`.
    ///
    /// Both endpoints are unindexed before their degrees change and
    /// reindexed afterwards. `src == tgt` is permitted and reindexes the
    /// node once.
    pub fn add_edge(&mut self, src: NodeHandle, tgt: NodeHandle) -> EdgeHandle {
        self.unindex_node(src.0);
        if tgt != src {
            self.unindex_node(tgt.0);
        }

        let edge = self.pool.alloc_edge(src.0, tgt.0);
        self.link_out(edge, src.0);
        self.link_in(edge, tgt.0);
        self.pool.node_mut(src.0).outdegree += 1;
        self.pool.node_mut(tgt.0).indegree += 1;

        self.index_node(src.0);
        if tgt != src {
            self.index_node(tgt.0);
        }
        self.edge_count += 1;
        EdgeHandle(edge)
    }

    /// Increments the loop count of `node`, reindexing it.
    pub fn add_loop(&mut self, node: NodeHandle) {
        self.unindex_node(node.0);
        self.pool.node_mut(node.0).loops += 1;
        self.index_node(node.0);
    }

    /// Decrements the loop count of `node`, reindexing it.
    ///
    /// # Panics
    /// Panics when the node has no loop to remove.
    pub fn remove_loop(&mut self, node: NodeHandle) {
        assert!(
            self.pool.node(node.0).loops > 0,
            "no loop to remove on {node}"
        );
        self.unindex_node(node.0);
        self.pool.node_mut(node.0).loops -= 1;
        self.index_node(node.0);
    }

    /// Sets the root flag of `node`, reindexing it when the flag
    /// changes.
    pub fn set_root(&mut self, node: NodeHandle, root: bool) {
        if self.pool.node(node.0).root == root {
            return;
        }
        self.unindex_node(node.0);
        self.pool.node_mut(node.0).root = root;
        self.index_node(node.0);
    }

    /// Deletes an edge, unlinking it from both endpoint chains.
    pub fn delete_edge(&mut self, edge: EdgeHandle) {
        let (src, tgt) = {
            let body = self.pool.edge(edge.0);
            (body.src, body.tgt)
        };
        self.unindex_node(src);
        if tgt != src {
            self.unindex_node(tgt);
        }

        self.unlink_out(edge.0);
        self.unlink_in(edge.0);
        self.pool.node_mut(src).outdegree -= 1;
        self.pool.node_mut(tgt).indegree -= 1;
        self.pool.free(edge.0);

        self.index_node(src);
        if tgt != src {
            self.index_node(tgt);
        }
        self.edge_count -= 1;
    }

    /// Deletes a node with no incident edges or loops.
    ///
    /// # Panics
    /// Panics when `indegree + outdegree + loops > 0`. The dangling
    /// condition is discharged upstream by the rule compiler, so hitting
    /// it here is unrecoverable.
    pub fn delete_node(&mut self, node: NodeHandle) {
        let body = self.pool.node(node.0);
        if body.indegree + body.outdegree + body.loops > 0 {
            panic!(
                "dangling condition violated: {} has indegree {}, outdegree {}, loops {}",
                node, body.indegree, body.outdegree, body.loops
            );
        }
        self.unindex_node(node.0);
        self.pool.free(node.0);
        self.node_count -= 1;
    }

    /// Whether `node` still addresses a live node.
    pub fn contains_node(&self, node: NodeHandle) -> bool {
        self.pool.is_node(node.0)
    }

    /// Whether `edge` still addresses a live edge.
    pub fn contains_edge(&self, edge: EdgeHandle) -> bool {
        self.pool.is_edge(edge.0)
    }

    /// Total pool slots ever allocated, live or free.
    pub fn slot_count(&self) -> usize {
        self.pool.slot_count()
    }

    /// Loop count of `node`.
    pub fn loops(&self, node: NodeHandle) -> usize {
        self.pool.node(node.0).loops
    }

    /// In-degree of `node` (loops not included).
    pub fn indegree(&self, node: NodeHandle) -> usize {
        self.pool.node(node.0).indegree
    }

    /// Out-degree of `node` (loops not included).
    pub fn outdegree(&self, node: NodeHandle) -> usize {
        self.pool.node(node.0).outdegree
    }

    /// Root flag of `node`.
    pub fn is_root(&self, node: NodeHandle) -> bool {
        self.pool.node(node.0).root
    }

    /// Bucket currently holding `node`.
    pub fn bucket_of(&self, node: NodeHandle) -> usize {
        self.pool
            .node(node.0)
            .bucket
            .expect("live node is always indexed")
    }

    /// Number of nodes in `bucket`.
    pub fn bucket_len(&self, bucket: usize) -> usize {
        self.buckets[bucket].len
    }

    /// Source node of `edge`.
    pub fn source(&self, edge: EdgeHandle) -> NodeHandle {
        NodeHandle(self.pool.edge(edge.0).src)
    }

    /// Target node of `edge`.
    pub fn target(&self, edge: EdgeHandle) -> NodeHandle {
        NodeHandle(self.pool.edge(edge.0).tgt)
    }

    /// Nodes currently in `bucket`, most recently indexed first.
    pub fn bucket_nodes(&self, bucket: usize) -> impl Iterator<Item = NodeHandle> + '_ {
        NodeChain {
            pool: &self.pool,
            current: self.buckets[bucket].head,
        }
    }

    /// All live nodes, walking buckets in ascending order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        (0..BUCKET_COUNT).flat_map(move |bucket| self.bucket_nodes(bucket))
    }

    /// Outgoing edges of `node`, most recently added first.
    pub fn out_edges(&self, node: NodeHandle) -> impl Iterator<Item = EdgeHandle> + '_ {
        EdgeChain {
            pool: &self.pool,
            current: self.pool.node(node.0).out_head,
            outgoing: true,
        }
    }

    /// Incoming edges of `node`, most recently added first.
    pub fn in_edges(&self, node: NodeHandle) -> impl Iterator<Item = EdgeHandle> + '_ {
        EdgeChain {
            pool: &self.pool,
            current: self.pool.node(node.0).in_head,
            outgoing: false,
        }
    }

    fn index_node(&mut self, index: u32) {
        let bucket = {
            let body = self.pool.node(index);
            let bucket = self
                .signature
                .bucket(body.loops, body.indegree, body.outdegree, body.root);
            assert!(
                bucket < BUCKET_COUNT,
                "signature policy returned bucket {bucket}, limit is {BUCKET_COUNT}"
            );
            bucket
        };

        let old_head = self.buckets[bucket].head;
        {
            let body = self.pool.node_mut(index);
            debug_assert!(body.bucket.is_none(), "node {index} indexed twice");
            body.bucket = Some(bucket);
            body.bucket_prev = None;
            body.bucket_next = old_head;
        }
        if let Some(head) = old_head {
            self.pool.node_mut(head).bucket_prev = Some(index);
        }
        self.buckets[bucket].head = Some(index);
        self.buckets[bucket].len += 1;
    }

    fn unindex_node(&mut self, index: u32) {
        let (bucket, prev, next) = {
            let body = self.pool.node_mut(index);
            let bucket = body.bucket.take().expect("unindexing an unindexed node");
            let prev = body.bucket_prev.take();
            let next = body.bucket_next.take();
            (bucket, prev, next)
        };
        match prev {
            Some(prev) => self.pool.node_mut(prev).bucket_next = next,
            None => self.buckets[bucket].head = next,
        }
        if let Some(next) = next {
            self.pool.node_mut(next).bucket_prev = prev;
        }
        self.buckets[bucket].len -= 1;
    }

    fn link_out(&mut self, edge: u32, src: u32) {
        let head = self.pool.node(src).out_head;
        {
            let body = self.pool.edge_mut(edge);
            body.out_prev = None;
            body.out_next = head;
        }
        if let Some(head) = head {
            self.pool.edge_mut(head).out_prev = Some(edge);
        }
        self.pool.node_mut(src).out_head = Some(edge);
    }

    fn link_in(&mut self, edge: u32, tgt: u32) {
        let head = self.pool.node(tgt).in_head;
        {
            let body = self.pool.edge_mut(edge);
            body.in_prev = None;
            body.in_next = head;
        }
        if let Some(head) = head {
            self.pool.edge_mut(head).in_prev = Some(edge);
        }
        self.pool.node_mut(tgt).in_head = Some(edge);
    }

    fn unlink_out(&mut self, edge: u32) {
        let (src, prev, next) = {
            let body = self.pool.edge(edge);
            (body.src, body.out_prev, body.out_next)
        };
        match prev {
            Some(prev) => self.pool.edge_mut(prev).out_next = next,
            None => self.pool.node_mut(src).out_head = next,
        }
        if let Some(next) = next {
            self.pool.edge_mut(next).out_prev = prev;
        }
    }

    fn unlink_in(&mut self, edge: u32) {
        let (tgt, prev, next) = {
            let body = self.pool.edge(edge);
            (body.tgt, body.in_prev, body.in_next)
        };
        match prev {
            Some(prev) => self.pool.edge_mut(prev).in_next = next,
            None => self.pool.node_mut(tgt).in_head = next,
        }
        if let Some(next) = next {
            self.pool.edge_mut(next).in_prev = prev;
        }
    }
}

struct NodeChain<'a> {
    pool: &'a Pool,
    current: Option<u32>,
}

impl Iterator for NodeChain<'_> {
    type Item = NodeHandle;

    fn next(&mut self) -> Option<NodeHandle> {
        let index = self.current?;
        self.current = self.pool.node(index).bucket_next;
        Some(NodeHandle(index))
    }
}

struct EdgeChain<'a> {
    pool: &'a Pool,
    current: Option<u32>,
    outgoing: bool,
}

impl Iterator for EdgeChain<'_> {
    type Item = EdgeHandle;

    fn next(&mut self) -> Option<EdgeHandle> {
        let index = self.current?;
        let body = self.pool.edge(index);
        self.current = if self.outgoing {
            body.out_next
        } else {
            body.in_next
        };
        Some(EdgeHandle(index))
    }
}

impl<S: Signature> fmt::Display for BucketedGraph<S> {
    /// Multi-line dump in the shared host-graph spelling; this engine
    /// carries no labels, so every entity prints as `empty`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[")?;
        for node in self.nodes() {
            if self.is_root(node) {
                writeln!(f, "  ({}(R), empty)", node)?;
            } else {
                writeln!(f, "  ({}, empty)", node)?;
            }
        }
        writeln!(f, "|")?;
        for node in self.nodes() {
            for edge in self.out_edges(node) {
                writeln!(
                    f,
                    "  ({}, {}, {}, empty)",
                    edge,
                    self.source(edge),
                    self.target(edge)
                )?;
            }
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_nodes_land_in_their_signature_bucket() {
        let mut graph = BucketedGraph::new();
        let plain = graph.add_node(false);
        let root = graph.add_node(true);
        assert_eq!(graph.bucket_of(plain), 0);
        assert_eq!(graph.bucket_of(root), 1);
        assert_eq!(graph.bucket_len(0), 1);
        assert_eq!(graph.bucket_len(1), 1);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn add_edge_migrates_both_endpoints() {
        let mut graph = BucketedGraph::new();
        let a = graph.add_node(false);
        let b = graph.add_node(false);
        let e = graph.add_edge(a, b);

        // a gained a successor (bit 2), b a predecessor (bit 1).
        assert_eq!(graph.bucket_of(a), 0b100);
        assert_eq!(graph.bucket_of(b), 0b010);
        assert_eq!(graph.outdegree(a), 1);
        assert_eq!(graph.indegree(b), 1);
        assert_eq!(graph.out_edges(a).collect::<Vec<_>>(), vec![e]);
        assert_eq!(graph.in_edges(b).collect::<Vec<_>>(), vec![e]);

        graph.delete_edge(e);
        assert_eq!(graph.bucket_of(a), 0);
        assert_eq!(graph.bucket_of(b), 0);
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.out_edges(a).count(), 0);
    }

    #[test]
    fn self_edge_reindexes_once() {
        let mut graph = BucketedGraph::new();
        let a = graph.add_node(false);
        let e = graph.add_edge(a, a);
        assert_eq!(graph.bucket_of(a), 0b110);
        assert_eq!(graph.indegree(a), 1);
        assert_eq!(graph.outdegree(a), 1);
        graph.delete_edge(e);
        assert_eq!(graph.bucket_of(a), 0);
    }

    #[test]
    fn bucket_removal_is_position_independent() {
        let mut graph = BucketedGraph::new();
        let nodes: Vec<_> = (0..4).map(|_| graph.add_node(false)).collect();
        assert_eq!(graph.bucket_len(0), 4);

        // Remove from the middle of the chain, then the head.
        graph.delete_node(nodes[1]);
        graph.delete_node(nodes[3]);
        let remaining: Vec<_> = graph.bucket_nodes(0).collect();
        assert_eq!(remaining, vec![nodes[2], nodes[0]]);
        assert_eq!(graph.bucket_len(0), 2);
    }

    #[test]
    fn loops_count_separately_from_edges() {
        let mut graph = BucketedGraph::new();
        let a = graph.add_node(false);
        graph.add_loop(a);
        graph.add_loop(a);
        assert_eq!(graph.loops(a), 2);
        assert_eq!(graph.edge_count(), 0);
        graph.remove_loop(a);
        assert_eq!(graph.loops(a), 1);
    }

    /// Policy that separates loopy nodes, exercising reindex-on-loop.
    struct LoopAware;

    impl Signature for LoopAware {
        fn bucket(&self, loops: usize, _: usize, _: usize, root: bool) -> usize {
            ((loops > 0) as usize) << 1 | (root as usize)
        }
    }

    #[test]
    fn loop_changes_reindex_under_loop_aware_policy() {
        let mut graph = BucketedGraph::with_signature(LoopAware);
        let a = graph.add_node(false);
        assert_eq!(graph.bucket_of(a), 0);
        graph.add_loop(a);
        assert_eq!(graph.bucket_of(a), 2);
        graph.remove_loop(a);
        assert_eq!(graph.bucket_of(a), 0);
    }

    #[test]
    fn pool_slots_are_shared_between_kinds() {
        let mut graph = BucketedGraph::new();
        let a = graph.add_node(false);
        let b = graph.add_node(false);
        let e = graph.add_edge(a, b);
        graph.delete_edge(e);
        assert!(!graph.contains_edge(e));
        // The freed edge slot is reused by the next node.
        let c = graph.add_node(false);
        assert_eq!(c.as_u32(), e.as_u32());
        assert!(graph.contains_node(c));
        assert_eq!(graph.slot_count(), 3);
    }

    #[test]
    #[should_panic(expected = "dangling condition violated")]
    fn delete_node_with_incident_edge_is_fatal() {
        let mut graph = BucketedGraph::new();
        let a = graph.add_node(false);
        let b = graph.add_node(false);
        graph.add_edge(a, b);
        graph.delete_node(a);
    }

    #[test]
    #[should_panic(expected = "dangling condition violated")]
    fn delete_node_with_loop_is_fatal() {
        let mut graph = BucketedGraph::new();
        let a = graph.add_node(false);
        graph.add_loop(a);
        graph.delete_node(a);
    }

    #[test]
    fn chains_survive_interior_deletion() {
        let mut graph = BucketedGraph::new();
        let a = graph.add_node(false);
        let b = graph.add_node(false);
        let e0 = graph.add_edge(a, b);
        let e1 = graph.add_edge(a, b);
        let e2 = graph.add_edge(a, b);
        assert_eq!(graph.out_edges(a).collect::<Vec<_>>(), vec![e2, e1, e0]);

        graph.delete_edge(e1);
        assert_eq!(graph.out_edges(a).collect::<Vec<_>>(), vec![e2, e0]);
        assert_eq!(graph.in_edges(b).collect::<Vec<_>>(), vec![e2, e0]);
        assert_eq!(graph.outdegree(a), 2);
    }

    #[test]
    fn dump_lists_nodes_then_edges() {
        let mut graph = BucketedGraph::new();
        let a = graph.add_node(true);
        let b = graph.add_node(false);
        graph.add_edge(a, b);
        let dump = graph.to_string();
        assert!(dump.starts_with("[\n"));
        assert!(dump.contains("(n0(R), empty)"));
        assert!(dump.contains("(n1, empty)"));
        assert!(dump.contains("(e2, n0, n1, empty)"));
        assert!(dump.ends_with("]"));
    }
}
