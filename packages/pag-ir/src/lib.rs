/*
 * pag-ir - Program Assignment Graph construction
 *
 * Feature-First Hexagonal Architecture:
 * - shared/      : Common models (ids, LocationSet, types, input IR)
 * - features/    : Vertical slices (symbols -> pag -> builder, externals)
 *
 * The PAG is the universal input of downstream pointer-analysis engines:
 * nodes are abstract locations, typed edges are the pointer-assignment
 * relations plus their inter-procedural and concurrency variants. The
 * builder walks a whole module once, deterministically, and hands back an
 * owned, effectively frozen graph.
 */

pub mod config;
pub mod errors;
pub mod features;
pub mod shared;

// Re-exports for the public API
pub use config::PagConfig;
pub use errors::{PagError, Result};
pub use features::builder::{
    add_indirect_resolution, add_join_resolution, build_pag, build_pag_with_stats, PagBuilder,
    PagBuilderFromFile,
};
pub use features::externals::{ExtApi, ExtEffect, ThreadApi, ThreadOpKind};
pub use features::pag::{
    write_dot, BuildContext, EdgeKind, EdgeType, NodeKind, Pag, PagEdge, PagNode, PagStats,
};
pub use features::symbols::{MemObj, ObjKind, SymbolTable};
pub use shared::models::{
    InstKind, LocationSet, Module, ModuleBuilder, NodeId, TypeArena, BLACKHOLE_NODE, NULLPTR_NODE,
};
