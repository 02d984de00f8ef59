//! Symbol table and memory-object metadata
//!
//! Pre-registers one value node per SSA value, one object node per
//! address-taken location, and return/vararg slots per function, before any
//! instruction is walked. Also owns the flattened-layout queries the gep
//! algebra runs on.

pub mod domain;
pub mod infrastructure;

pub use domain::mem_obj::{MemObj, ObjKind};
pub use infrastructure::symbol_table::SymbolTable;
