//! Program assignment graph
//!
//! Nodes denote abstract locations (pointer values, memory objects, return
//! and variadic slots); typed edges denote the pointer-assignment relations
//! and their inter-procedural and concurrency variants. Downstream solvers
//! consume the finished graph read-only through the iteration surface.

pub mod domain;
pub mod infrastructure;

pub use domain::context::{Attribution, BuildContext};
pub use domain::edge::{EdgeKind, EdgeType, PagEdge};
pub use domain::node::{NodeKind, PagNode};
pub use infrastructure::dot::write_dot;
pub use infrastructure::graph::{Pag, PagStats};
