//! PAG construction
//!
//! The instruction dispatcher, the global-initializer walker, external-call
//! and thread-API handling, the build-phase state machine, and the
//! from-file debug builder.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::build_usecase::{build_pag, build_pag_with_stats};
pub use domain::phase::BuildPhase;
pub use infrastructure::builder::{
    add_complex_edges_for_ext, add_indirect_resolution, add_join_resolution, compute_gep_offset,
    PagBuilder,
};
pub use infrastructure::from_file::PagBuilderFromFile;
