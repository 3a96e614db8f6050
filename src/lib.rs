//! hostgraph: the host-graph storage engine under a graph-transformation
//! rule engine.
//!
//! This crate implements the mutable state a rule engine operates on:
//! - A labelled directed multigraph with dense node/edge arenas, slot
//!   recycling, per-node incidence lists, a label-class index for
//!   candidate pruning, and explicit root-node tracking.
//! - A snapshot stack of deep graph copies, so a failed or backtracked
//!   rule application is undone by restoring the previous copy.
//! - A diagnostic invariant checker covering every structural and index
//!   consistency property.
//! - A second, signature-bucketed engine ([`bucketed`]) that groups
//!   nodes by a coarse structural signature in intrusive doubly-linked
//!   buckets, trading label indexing for O(1) reindexing and O(1)
//!   candidate enumeration.
//!
//! The matcher and rewriter that decide *which* nodes and edges to add,
//! remove, or relabel live outside this crate, as does label-expression
//! evaluation: a [`label::Label`] here is an opaque value the engine can
//! classify, deep-copy, and release.
//!
//! # Example
//!
//! ```
//! use hostgraph::prelude::*;
//!
//! let mut graph = Graph::new();
//! let a = graph.add_node(Label::blank(), true);
//! let b = graph.add_node(Label::blank(), false);
//! let e = graph.add_edge(Label::blank(), false, a, b).unwrap();
//!
//! let mut snapshots = SnapshotStack::new();
//! snapshots.snapshot(&graph);
//! graph.remove_edge(e).unwrap();
//! graph.remove_node(b).unwrap();
//!
//! // The speculative transformation failed; roll it back.
//! graph = snapshots.restore();
//! assert_eq!(graph.node_count(), 2);
//! assert_eq!(graph.edge_count(), 1);
//! assert!(hostgraph::validate::validate(&graph));
//! ```
//!
//! # Citations
//! - Plump, "The Graph Programming Language GP" (2009)
//! - Ehrig et al., "Fundamentals of Algebraic Graph Transformation"
//!   (2006)

pub mod bucketed;
pub mod graph;
pub mod index;
pub mod label;
pub mod slots;
pub mod snapshot;
pub mod validate;

pub use graph::{Edge, EdgeId, Graph, GraphError, Node, NodeId};
pub use label::{Atom, Label, LabelClass, Mark};
pub use snapshot::SnapshotStack;

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::bucketed::{BucketedGraph, DegreeSignature, Signature};
    pub use crate::graph::{Edge, EdgeId, Graph, GraphError, Node, NodeId};
    pub use crate::label::{Atom, Label, LabelClass, Mark};
    pub use crate::snapshot::SnapshotStack;
    pub use crate::validate::validate;
}
