//! Typed SSA module model, the input stream consumed by the PAG builder
//!
//! A `Module` owns arenas of values, functions and instructions, all addressed
//! by dense ids so a re-walk of the same module is bit-identical. The
//! `ModuleBuilder` is the deterministic construction surface used by the
//! loader boundary, by tests and by demos; it appends into the last block of
//! the function being built.
//!
//! Only the instruction kinds the dispatcher cares about carry operands;
//! everything else is represented by its discriminant alone (those kinds emit
//! no pointer-assignment edges).

use super::ids::{FuncId, InstId, TypeId, ValueId};
use super::types::{IrType, TypeArena};
use serde::{Deserialize, Serialize};

/// A constant expression nested inside an operand or a global initializer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstExpr {
    /// Constant gep over `base` with all-constant indices
    Gep {
        base: ValueId,
        source_ty: TypeId,
        indices: Vec<i64>,
    },
    /// Pointer-to-pointer constant cast
    Cast(ValueId),
    /// Constant select between two pointer constants
    Select { tval: ValueId, fval: ValueId },
    /// Undefined integer-to-pointer conversion
    IntToPtr,
}

/// What a value is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    /// SSA result of an instruction
    Local,
    /// Formal parameter of a function
    Param { func: FuncId, index: u32 },
    /// Global variable, optionally with a constant initializer
    Global { init: Option<ValueId> },
    /// A function used as a value (always address-taken)
    Function(FuncId),
    /// The null pointer constant
    NullPtr,
    /// Undefined value
    Undef,
    /// Integer constant
    ConstInt(i64),
    /// Constant aggregate (struct/array initializer), element values in order
    ConstAggregate(Vec<ValueId>),
    /// Constant expression
    ConstExpr(ConstExpr),
}

/// A typed value in the module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    pub ty: TypeId,
    pub name: Option<String>,
    pub kind: ValueKind,
}

/// A gep index: constant or data-dependent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GepIndex {
    Const(i64),
    Var(ValueId),
}

/// Instruction payloads for the kinds the dispatcher handles.
/// The remaining kinds are listed without operands; they emit no edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstKind {
    Alloca { allocated_ty: TypeId },
    Phi { incoming: Vec<ValueId> },
    Store { value: ValueId, ptr: ValueId },
    Load { ptr: ValueId },
    Gep {
        base: ValueId,
        source_ty: TypeId,
        indices: Vec<GepIndex>,
    },
    Cast { src: ValueId },
    Select { tval: ValueId, fval: ValueId },
    IntToPtr,
    ExtractValue { agg: ValueId, indices: Vec<u64> },
    ExtractElement { vector: ValueId },
    Ret { value: Option<ValueId> },
    Call { callee: ValueId, args: Vec<ValueId> },
    // Kinds below deliberately contribute no pointer flow
    Binary,
    Cmp,
    PtrToInt,
    InsertValue,
    InsertElement,
    ShuffleVector,
    VaArg,
    Fence,
    AtomicRmw,
    AtomicCmpXchg,
    Branch,
    LandingPad,
    Resume,
    Unreachable,
}

/// An instruction with its owning function/block and optional SSA result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: InstId,
    pub func: FuncId,
    pub block: u32,
    pub result: Option<ValueId>,
    pub kind: InstKind,
}

/// A basic block: an ordered list of instruction ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub insts: Vec<InstId>,
}

/// A function definition or declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    /// The function-as-value (address-taken handle)
    pub value: ValueId,
    pub ret_ty: TypeId,
    pub params: Vec<ValueId>,
    pub blocks: Vec<Block>,
    pub is_decl: bool,
    pub is_vararg: bool,
}

impl Function {
    /// A declaration has no body to walk
    #[inline]
    pub fn is_declaration(&self) -> bool {
        self.is_decl
    }
}

/// A whole program module
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub types: TypeArena,
    values: Vec<Value>,
    functions: Vec<Function>,
    insts: Vec<Instruction>,
    globals: Vec<ValueId>,
}

impl Module {
    #[inline]
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id as usize]
    }

    #[inline]
    pub fn values(&self) -> impl Iterator<Item = (ValueId, &Value)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (i as ValueId, v))
    }

    #[inline]
    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id as usize]
    }

    #[inline]
    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (i as FuncId, f))
    }

    #[inline]
    pub fn inst(&self, id: InstId) -> &Instruction {
        &self.insts[id as usize]
    }

    /// Global variables in declaration order
    #[inline]
    pub fn globals(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.globals.iter().copied()
    }

    /// Whether the value has pointer type
    #[inline]
    pub fn is_pointer(&self, id: ValueId) -> bool {
        self.types.is_pointer(self.value(id).ty)
    }

    /// Strip constant pointer casts off a value
    pub fn strip_casts(&self, mut id: ValueId) -> ValueId {
        while let ValueKind::ConstExpr(ConstExpr::Cast(inner)) = &self.value(id).kind {
            id = *inner;
        }
        id
    }

    /// Resolve the callee of a call operand to a function, looking through
    /// constant casts. `None` means the call is indirect.
    pub fn resolve_callee(&self, callee: ValueId) -> Option<FuncId> {
        match &self.value(self.strip_casts(callee)).kind {
            ValueKind::Function(f) => Some(*f),
            _ => None,
        }
    }

    /// Display name of a value, falling back to its id
    pub fn value_name(&self, id: ValueId) -> String {
        match &self.value(id).name {
            Some(n) => n.clone(),
            None => format!("v{}", id),
        }
    }
}

/// Deterministic module construction surface.
///
/// Instructions append into the last block of the target function; `block`
/// opens a new one. Ids are assigned in call order, so the same build
/// sequence always produces the same module.
#[derive(Debug, Default)]
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            module: Module {
                name: name.into(),
                ..Default::default()
            },
        }
    }

    #[inline]
    pub fn types(&mut self) -> &mut TypeArena {
        &mut self.module.types
    }

    fn add_value(&mut self, ty: TypeId, name: Option<String>, kind: ValueKind) -> ValueId {
        let id = self.module.values.len() as ValueId;
        self.module.values.push(Value { ty, name, kind });
        id
    }

    // Constants

    pub fn null(&mut self, ty: TypeId) -> ValueId {
        self.add_value(ty, None, ValueKind::NullPtr)
    }

    pub fn undef(&mut self, ty: TypeId) -> ValueId {
        self.add_value(ty, None, ValueKind::Undef)
    }

    pub fn const_int(&mut self, ty: TypeId, v: i64) -> ValueId {
        self.add_value(ty, None, ValueKind::ConstInt(v))
    }

    pub fn const_aggregate(&mut self, ty: TypeId, elems: Vec<ValueId>) -> ValueId {
        self.add_value(ty, None, ValueKind::ConstAggregate(elems))
    }

    pub fn const_gep(
        &mut self,
        ty: TypeId,
        base: ValueId,
        source_ty: TypeId,
        indices: Vec<i64>,
    ) -> ValueId {
        self.add_value(
            ty,
            None,
            ValueKind::ConstExpr(ConstExpr::Gep {
                base,
                source_ty,
                indices,
            }),
        )
    }

    pub fn const_cast(&mut self, ty: TypeId, src: ValueId) -> ValueId {
        self.add_value(ty, None, ValueKind::ConstExpr(ConstExpr::Cast(src)))
    }

    pub fn const_int_to_ptr(&mut self, ty: TypeId) -> ValueId {
        self.add_value(ty, None, ValueKind::ConstExpr(ConstExpr::IntToPtr))
    }

    // Globals and functions

    /// Declare a global variable of pointee type `pointee_ty`; the global's
    /// own value has pointer type.
    pub fn global(
        &mut self,
        name: impl Into<String>,
        pointee_ty: TypeId,
        init: Option<ValueId>,
    ) -> ValueId {
        let ptr_ty = self.module.types.pointer(pointee_ty);
        self.add_value(ptr_ty, Some(name.into()), ValueKind::Global { init })
    }

    pub fn function(
        &mut self,
        name: impl Into<String>,
        ret_ty: TypeId,
        param_tys: &[TypeId],
        is_vararg: bool,
        is_decl: bool,
    ) -> FuncId {
        let name = name.into();
        let func = self.module.functions.len() as FuncId;
        let fn_ty = self
            .module
            .types
            .function(ret_ty, param_tys.to_vec(), is_vararg);
        let fn_ptr_ty = self.module.types.pointer(fn_ty);
        let value = self.add_value(fn_ptr_ty, Some(name.clone()), ValueKind::Function(func));
        let params = param_tys
            .iter()
            .enumerate()
            .map(|(i, ty)| {
                self.add_value(
                    *ty,
                    Some(format!("{}.arg{}", name, i)),
                    ValueKind::Param {
                        func,
                        index: i as u32,
                    },
                )
            })
            .collect();
        self.module.functions.push(Function {
            name,
            value,
            ret_ty,
            params,
            blocks: Vec::new(),
            is_decl,
            is_vararg,
        });
        func
    }

    /// Open a new basic block in `func`; returns its index
    pub fn block(&mut self, func: FuncId) -> u32 {
        let f = &mut self.module.functions[func as usize];
        f.blocks.push(Block::default());
        (f.blocks.len() - 1) as u32
    }

    fn add_inst(
        &mut self,
        func: FuncId,
        kind: InstKind,
        result: Option<(TypeId, Option<String>)>,
    ) -> (InstId, Option<ValueId>) {
        if self.module.functions[func as usize].blocks.is_empty() {
            self.block(func);
        }
        let id = self.module.insts.len() as InstId;
        let result = result.map(|(ty, name)| self.add_value(ty, name, ValueKind::Local));
        let f = &mut self.module.functions[func as usize];
        let block = (f.blocks.len() - 1) as u32;
        f.blocks[block as usize].insts.push(id);
        self.module.insts.push(Instruction {
            id,
            func,
            block,
            result,
            kind,
        });
        (id, result)
    }

    // Instructions (append into the last opened block of `func`)

    pub fn alloca(&mut self, func: FuncId, allocated_ty: TypeId, name: &str) -> ValueId {
        let ptr_ty = self.module.types.pointer(allocated_ty);
        self.add_inst(
            func,
            InstKind::Alloca { allocated_ty },
            Some((ptr_ty, Some(name.to_owned()))),
        )
        .1
        .unwrap()
    }

    pub fn store(&mut self, func: FuncId, value: ValueId, ptr: ValueId) -> InstId {
        self.add_inst(func, InstKind::Store { value, ptr }, None).0
    }

    pub fn load(&mut self, func: FuncId, ptr: ValueId, name: &str) -> ValueId {
        let ty = self
            .module
            .types
            .pointee(self.module.value(ptr).ty)
            .expect("load from a non-pointer");
        self.add_inst(func, InstKind::Load { ptr }, Some((ty, Some(name.to_owned()))))
            .1
            .unwrap()
    }

    pub fn gep(
        &mut self,
        func: FuncId,
        base: ValueId,
        source_ty: TypeId,
        indices: Vec<GepIndex>,
        result_ty: TypeId,
        name: &str,
    ) -> ValueId {
        self.add_inst(
            func,
            InstKind::Gep {
                base,
                source_ty,
                indices,
            },
            Some((result_ty, Some(name.to_owned()))),
        )
        .1
        .unwrap()
    }

    pub fn phi(&mut self, func: FuncId, incoming: Vec<ValueId>, ty: TypeId, name: &str) -> ValueId {
        self.add_inst(
            func,
            InstKind::Phi { incoming },
            Some((ty, Some(name.to_owned()))),
        )
        .1
        .unwrap()
    }

    pub fn cast(&mut self, func: FuncId, src: ValueId, ty: TypeId, name: &str) -> ValueId {
        self.add_inst(func, InstKind::Cast { src }, Some((ty, Some(name.to_owned()))))
            .1
            .unwrap()
    }

    pub fn select(
        &mut self,
        func: FuncId,
        tval: ValueId,
        fval: ValueId,
        ty: TypeId,
        name: &str,
    ) -> ValueId {
        self.add_inst(
            func,
            InstKind::Select { tval, fval },
            Some((ty, Some(name.to_owned()))),
        )
        .1
        .unwrap()
    }

    pub fn int_to_ptr(&mut self, func: FuncId, ty: TypeId, name: &str) -> ValueId {
        self.add_inst(func, InstKind::IntToPtr, Some((ty, Some(name.to_owned()))))
            .1
            .unwrap()
    }

    pub fn extract_value(
        &mut self,
        func: FuncId,
        agg: ValueId,
        indices: Vec<u64>,
        ty: TypeId,
        name: &str,
    ) -> ValueId {
        self.add_inst(
            func,
            InstKind::ExtractValue { agg, indices },
            Some((ty, Some(name.to_owned()))),
        )
        .1
        .unwrap()
    }

    pub fn extract_element(&mut self, func: FuncId, vector: ValueId, ty: TypeId, name: &str) -> ValueId {
        self.add_inst(
            func,
            InstKind::ExtractElement { vector },
            Some((ty, Some(name.to_owned()))),
        )
        .1
        .unwrap()
    }

    pub fn ret(&mut self, func: FuncId, value: Option<ValueId>) -> InstId {
        self.add_inst(func, InstKind::Ret { value }, None).0
    }

    /// A call; `result_ty` of `None` means the call result is unused or void
    pub fn call(
        &mut self,
        func: FuncId,
        callee: ValueId,
        args: Vec<ValueId>,
        result_ty: Option<TypeId>,
        name: &str,
    ) -> (InstId, Option<ValueId>) {
        self.add_inst(
            func,
            InstKind::Call { callee, args },
            result_ty.map(|ty| (ty, Some(name.to_owned()))),
        )
    }

    /// Append an opaque no-edge instruction (binary ops, fences, terminators)
    pub fn opaque(&mut self, func: FuncId, kind: InstKind) -> InstId {
        self.add_inst(func, kind, None).0
    }

    /// The function-as-value handle of `func`
    #[inline]
    pub fn func_value(&self, func: FuncId) -> ValueId {
        self.module.functions[func as usize].value
    }

    /// Formal parameter `index` of `func`
    #[inline]
    pub fn func_param(&self, func: FuncId, index: usize) -> ValueId {
        self.module.functions[func as usize].params[index]
    }

    /// Register the global in declaration order and hand back the module
    pub fn finish(mut self) -> Module {
        let mut globals: Vec<ValueId> = self
            .module
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| matches!(v.kind, ValueKind::Global { .. }))
            .map(|(i, _)| i as ValueId)
            .collect();
        globals.sort_unstable();
        self.module.globals = globals;
        self.module
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_function_shape() {
        let mut mb = ModuleBuilder::new("m");
        let i32t = mb.types().int(32);
        let p32 = mb.types().pointer(i32t);
        let void = mb.types().void();
        let f = mb.function("main", void, &[], false, false);
        let p = mb.alloca(f, p32, "p");
        let q = mb.load(f, p, "q");
        mb.ret(f, None);
        let m = mb.finish();

        let main = m.function(f);
        assert_eq!(main.blocks.len(), 1);
        assert_eq!(main.blocks[0].insts.len(), 3);
        assert!(m.is_pointer(p));
        assert!(m.is_pointer(q));
        assert_eq!(m.value_name(p), "p");
    }

    #[test]
    fn test_resolve_callee_through_cast() {
        let mut mb = ModuleBuilder::new("m");
        let void = mb.types().void();
        let i8t = mb.types().int(8);
        let p8 = mb.types().pointer(i8t);
        let callee = mb.function("worker", void, &[p8], false, false);
        let callee_val = mb.func_value(callee);
        let casted = mb.const_cast(p8, callee_val);
        let m = mb.finish();

        assert_eq!(m.resolve_callee(casted), Some(callee));
        assert_eq!(m.resolve_callee(callee_val), Some(callee));
    }

    #[test]
    fn test_indirect_callee_unresolved() {
        let mut mb = ModuleBuilder::new("m");
        let i8t = mb.types().int(8);
        let p8 = mb.types().pointer(i8t);
        let void = mb.types().void();
        let f = mb.function("caller", void, &[p8], false, false);
        let fnptr = mb.func_param(f, 0);
        let m = mb.finish();
        assert_eq!(m.resolve_callee(fnptr), None);
    }

    #[test]
    fn test_globals_in_declaration_order() {
        let mut mb = ModuleBuilder::new("m");
        let i32t = mb.types().int(32);
        let g1 = mb.global("a", i32t, None);
        let g2 = mb.global("b", i32t, None);
        let m = mb.finish();
        let globals: Vec<ValueId> = m.globals().collect();
        assert_eq!(globals, vec![g1, g2]);
    }
}
