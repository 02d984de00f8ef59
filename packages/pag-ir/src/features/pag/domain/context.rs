//! Edge attribution context
//!
//! An explicit value threaded through the builder and passed to every edge
//! insertion, replacing the ambient current-instruction/current-block pair:
//! the builder stays re-entrant and helpers that must emit global edges just
//! pass `BuildContext::global()`.

use crate::shared::models::{FuncId, InstId};
use serde::{Deserialize, Serialize};

/// Where an edge is attributed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Attribution {
    /// Owned by one instruction
    Inst(InstId),
    /// Emitted for a function's entry block (formal-parameter wiring)
    FunctionEntry(FuncId),
    /// No owning instruction (globals, constant expressions)
    Global,
}

/// Current location of the walk: instruction and basic block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildContext {
    inst: Option<InstId>,
    /// Owning function and block index; block 0 is the entry block
    block: Option<(FuncId, u32)>,
}

impl BuildContext {
    /// Context with no owning instruction or block: edges become global
    #[inline]
    pub fn global() -> Self {
        Self::default()
    }

    /// Context of an instruction inside a block
    #[inline]
    pub fn at_inst(inst: InstId, func: FuncId, block: u32) -> Self {
        Self {
            inst: Some(inst),
            block: Some((func, block)),
        }
    }

    /// Context of a function's entry block with no instruction; used for
    /// synthetic formal-parameter edges
    #[inline]
    pub fn function_entry(func: FuncId) -> Self {
        Self {
            inst: None,
            block: Some((func, 0)),
        }
    }

    /// The same location with the instruction slot cleared; constant
    /// expressions reached from many sites must attribute globally
    #[inline]
    pub fn without_inst(&self) -> Self {
        Self {
            inst: None,
            block: None,
        }
    }

    #[inline]
    pub fn inst(&self) -> Option<InstId> {
        self.inst
    }

    /// Resolve where an edge emitted under this context belongs
    pub fn attribution(&self) -> Attribution {
        if let Some(inst) = self.inst {
            return Attribution::Inst(inst);
        }
        match self.block {
            Some((func, 0)) => Attribution::FunctionEntry(func),
            _ => Attribution::Global,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_wins() {
        let ctx = BuildContext::at_inst(7, 2, 0);
        assert_eq!(ctx.attribution(), Attribution::Inst(7));
    }

    #[test]
    fn test_entry_block_without_inst() {
        let ctx = BuildContext::function_entry(3);
        assert_eq!(ctx.attribution(), Attribution::FunctionEntry(3));
    }

    #[test]
    fn test_non_entry_block_is_global() {
        let ctx = BuildContext::at_inst(7, 2, 1).without_inst();
        assert_eq!(ctx.attribution(), Attribution::Global);
        assert_eq!(BuildContext::global().attribution(), Attribution::Global);
    }
}
