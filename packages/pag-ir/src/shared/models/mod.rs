//! Common data model: ids, offset algebra, types, and the input IR

pub mod ids;
pub mod ir;
pub mod location_set;
pub mod types;

pub use ids::{
    CallSiteId, EdgeId, FuncId, InstId, NodeId, TypeId, ValueId, BLACKHOLE_NODE, FIRST_FREE_NODE,
    NULLPTR_NODE,
};
pub use ir::{ConstExpr, Function, GepIndex, InstKind, Instruction, Module, ModuleBuilder, Value, ValueKind};
pub use location_set::{LocationSet, Offset};
pub use types::{IrType, TypeArena};
