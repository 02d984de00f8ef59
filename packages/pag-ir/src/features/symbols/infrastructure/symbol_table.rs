//! Symbol registration pass
//!
//! Assigns node ids before any instruction is walked, in one deterministic
//! sweep over the module: every build of the same module hands out the same
//! ids. Ids 0 and 1 are reserved for the blackhole object and the null
//! pointer constant.
//!
//! Lookups are fatal on a miss: a value the builder asks about but the pass
//! never registered is a walk bug, not an input condition.

use crate::config::PagConfig;
use crate::features::externals::ExtApi;
use crate::features::symbols::domain::mem_obj::{MemObj, ObjKind};
use crate::shared::models::{
    FuncId, InstKind, LocationSet, Module, NodeId, TypeArena, TypeId, ValueId, ValueKind,
    FIRST_FREE_NODE, NULLPTR_NODE,
};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Value/object/return/vararg symbol maps plus memory-object metadata
#[derive(Debug, Default)]
pub struct SymbolTable {
    next_id: NodeId,
    val_syms: FxHashMap<ValueId, NodeId>,
    obj_syms: FxHashMap<ValueId, NodeId>,
    ret_syms: FxHashMap<FuncId, NodeId>,
    vararg_syms: FxHashMap<FuncId, NodeId>,
    mem_objs: FxHashMap<NodeId, MemObj>,
    max_field_limit: u32,
}

impl SymbolTable {
    /// A table with only the reserved ids; used by the from-file debug
    /// builder, which creates dummy nodes instead of symbols
    pub fn empty() -> Self {
        Self {
            next_id: FIRST_FREE_NODE,
            max_field_limit: crate::config::DEFAULT_MAX_FIELD_LIMIT,
            ..Default::default()
        }
    }

    /// Run the registration sweep over `module`.
    ///
    /// Order: values in id order (globals, functions, params, locals and
    /// constants interleave exactly as the module records them), then
    /// address-taken objects, then per-function return/vararg slots.
    pub fn collect(module: &Module, config: &PagConfig, ext: &ExtApi) -> Self {
        let mut table = Self {
            next_id: FIRST_FREE_NODE,
            max_field_limit: config.max_field_limit.max(1),
            ..Default::default()
        };

        for (id, value) in module.values() {
            match &value.kind {
                ValueKind::NullPtr | ValueKind::Undef => {
                    // both route through the reserved null node
                    table.val_syms.insert(id, NULLPTR_NODE);
                }
                ValueKind::ConstInt(_) | ValueKind::ConstAggregate(_) => {
                    // no top-level pointer flow; aggregates are walked
                    // element-wise by the global initializer pass
                }
                _ => {
                    let sym = table.fresh_id();
                    table.val_syms.insert(id, sym);
                }
            }
        }

        for gvar in module.globals() {
            let alloc_ty = module.types.pointee(module.value(gvar).ty);
            table.register_obj(gvar, ObjKind::Global, alloc_ty, &module.types);
        }

        for (func, f) in module.functions() {
            table.register_obj(f.value, ObjKind::Function, None, &module.types);
            let ret = table.fresh_id();
            table.ret_syms.insert(func, ret);
            if f.is_vararg {
                let va = table.fresh_id();
                table.vararg_syms.insert(func, va);
            }
        }

        for (_, f) in module.functions() {
            for block in &f.blocks {
                for inst_id in &block.insts {
                    let inst = module.inst(*inst_id);
                    match &inst.kind {
                        InstKind::Alloca { allocated_ty } => {
                            let result = inst.result.expect("alloca without a result");
                            table.register_obj(
                                result,
                                ObjKind::Stack,
                                Some(*allocated_ty),
                                &module.types,
                            );
                        }
                        InstKind::Call { callee, .. } => {
                            // allocating external calls introduce heap objects
                            if let Some(result) = inst.result {
                                if let Some(target) = module.resolve_callee(*callee) {
                                    let callee_fn = module.function(target);
                                    if callee_fn.is_declaration() && ext.is_alloc(&callee_fn.name)
                                    {
                                        table.register_obj(
                                            result,
                                            ObjKind::Heap,
                                            None,
                                            &module.types,
                                        );
                                    }
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        debug!(
            total = table.next_id,
            values = table.val_syms.len(),
            objects = table.obj_syms.len(),
            "symbol registration finished"
        );
        table
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn register_obj(
        &mut self,
        ref_val: ValueId,
        kind: ObjKind,
        alloc_ty: Option<TypeId>,
        types: &TypeArena,
    ) {
        assert!(
            !self.obj_syms.contains_key(&ref_val),
            "object symbol registered twice for value {}",
            ref_val
        );
        let sym = self.fresh_id();
        self.obj_syms.insert(ref_val, sym);
        self.mem_objs.insert(
            sym,
            MemObj::new(kind, ref_val, alloc_ty, types, self.max_field_limit),
        );
    }

    /// Total pre-registered symbols; the PAG's node counter starts here
    #[inline]
    pub fn total_symbols(&self) -> NodeId {
        self.next_id
    }

    // Lookups (fatal on a miss)

    /// Value node of `v`
    pub fn value_id(&self, v: ValueId) -> NodeId {
        *self
            .val_syms
            .get(&v)
            .unwrap_or_else(|| panic!("no value symbol registered for value {}", v))
    }

    /// Object node of an address-taken `v`
    pub fn object_id(&self, v: ValueId) -> NodeId {
        *self
            .obj_syms
            .get(&v)
            .unwrap_or_else(|| panic!("no object symbol registered for value {}", v))
    }

    /// Whether `v` has an object symbol
    #[inline]
    pub fn has_object(&self, v: ValueId) -> bool {
        self.obj_syms.contains_key(&v)
    }

    /// Unique return slot of `f`
    pub fn return_id(&self, f: FuncId) -> NodeId {
        *self
            .ret_syms
            .get(&f)
            .unwrap_or_else(|| panic!("no return symbol registered for function {}", f))
    }

    /// Unique variadic slot of `f`
    pub fn vararg_id(&self, f: FuncId) -> NodeId {
        *self
            .vararg_syms
            .get(&f)
            .unwrap_or_else(|| panic!("no vararg symbol registered for function {}", f))
    }

    /// Memory object metadata of an object node
    pub fn memobj(&self, obj: NodeId) -> &MemObj {
        self.mem_objs
            .get(&obj)
            .unwrap_or_else(|| panic!("node {} is not a registered memory object", obj))
    }

    #[inline]
    pub fn has_memobj(&self, obj: NodeId) -> bool {
        self.mem_objs.contains_key(&obj)
    }

    /// Collapse an object's fields
    pub fn set_field_insensitive(&mut self, obj: NodeId) {
        self.mem_objs
            .get_mut(&obj)
            .unwrap_or_else(|| panic!("node {} is not a registered memory object", obj))
            .set_field_insensitive();
    }

    /// Clamp `ls` into the field space of `obj`
    #[inline]
    pub fn modulus_offset(&self, obj: NodeId, ls: LocationSet) -> LocationSet {
        self.memobj(obj).modulus_offset(ls)
    }

    /// Exclusive field-offset bound of `obj`
    #[inline]
    pub fn max_field_offset(&self, obj: NodeId) -> u32 {
        self.memobj(obj).max_field_offset()
    }

    /// Whether `obj` is modelled with a single field
    #[inline]
    pub fn is_field_insensitive(&self, obj: NodeId) -> bool {
        self.memobj(obj).is_field_insensitive()
    }

    /// Iterate registered value symbols in value order
    pub fn value_symbols(&self) -> Vec<(ValueId, NodeId)> {
        let mut out: Vec<_> = self.val_syms.iter().map(|(v, n)| (*v, *n)).collect();
        out.sort_unstable();
        out
    }

    /// Iterate registered object symbols in value order
    pub fn object_symbols(&self) -> Vec<(ValueId, NodeId)> {
        let mut out: Vec<_> = self.obj_syms.iter().map(|(v, n)| (*v, *n)).collect();
        out.sort_unstable();
        out
    }

    /// Iterate return symbols in function order
    pub fn return_symbols(&self) -> Vec<(FuncId, NodeId)> {
        let mut out: Vec<_> = self.ret_syms.iter().map(|(f, n)| (*f, *n)).collect();
        out.sort_unstable();
        out
    }

    /// Iterate vararg symbols in function order
    pub fn vararg_symbols(&self) -> Vec<(FuncId, NodeId)> {
        let mut out: Vec<_> = self.vararg_syms.iter().map(|(f, n)| (*f, *n)).collect();
        out.sort_unstable();
        out
    }
}
