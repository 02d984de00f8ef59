//! PAG builder
//!
//! Walks every instruction of the module and turns it into pointer-assignment
//! edges: explicit dispatch on the instruction kind, recursive constant-
//! expression handling at global scope, a policy table for external calls and
//! fork/join wiring for the thread API. The builder owns the graph while it
//! runs and hands it back from `build`; there is no process-wide state.

use crate::config::PagConfig;
use crate::features::builder::domain::phase::BuildPhase;
use crate::features::externals::{ExtApi, ExtEffect, ThreadApi, ThreadOpKind};
use crate::features::pag::{BuildContext, Pag};
use crate::features::symbols::SymbolTable;
use crate::shared::models::{
    ConstExpr, FuncId, GepIndex, InstId, InstKind, Instruction, IrType, LocationSet, Module,
    NodeId, Offset, TypeArena, TypeId, ValueId, ValueKind,
};
use tracing::{debug, info, warn};

/// One-shot PAG builder over a module
pub struct PagBuilder<'m> {
    module: &'m Module,
    pag: Pag,
    ext: ExtApi,
    thread: ThreadApi,
    phase: BuildPhase,
}

impl<'m> PagBuilder<'m> {
    /// Register symbols and materialize the initial node set
    pub fn new(module: &'m Module, config: PagConfig) -> Self {
        let ext = ExtApi::new();
        let symbols = SymbolTable::collect(module, &config, &ext);
        let pag = Pag::new(module, symbols, config);
        let mut phase = BuildPhase::Fresh;
        phase.advance(BuildPhase::Initialized);
        Self {
            module,
            pag,
            ext,
            thread: ThreadApi::new(),
            phase,
        }
    }

    /// Walk globals, then every instruction, then self-check; returns the
    /// finished graph, read-only from here on
    pub fn build(mut self) -> Pag {
        info!(module = %self.module.name, "building PAG");

        self.visit_globals();
        self.phase.advance(BuildPhase::GlobalsWalked);

        for (func, f) in self.module.functions() {
            if f.is_declaration() {
                continue;
            }
            for (block_idx, block) in f.blocks.iter().enumerate() {
                for inst_id in &block.insts {
                    let inst = self.module.inst(*inst_id);
                    let ctx = BuildContext::at_inst(inst.id, func, block_idx as u32);
                    self.visit(inst, &ctx);
                }
            }
        }
        self.phase.advance(BuildPhase::InstructionsWalked);

        self.pag.sanity_check();
        self.phase.advance(BuildPhase::SanityChecked);

        self.phase.advance(BuildPhase::Done);
        info!(
            nodes = self.pag.num_nodes(),
            edges = self.pag.num_edges(),
            "PAG build finished"
        );
        self.pag
    }

    /// Value node lookup; constant-expression operands are expanded first
    fn value_node_of(&mut self, v: ValueId) -> NodeId {
        process_const_expr(&mut self.pag, self.module, v);
        self.pag.value_node(v)
    }

    // Globals

    /// Address edges for globals and functions, then the recursive
    /// initializer walk. Everything here attributes globally.
    fn visit_globals(&mut self) {
        let ctx = BuildContext::global();
        for gvar in self.module.globals() {
            let obj = self.pag.object_node(gvar);
            let val = self.pag.value_node(gvar);
            self.pag.add_addr_edge(obj, val, &ctx);
            if let ValueKind::Global { init: Some(init) } = self.module.value(gvar).kind {
                self.initial_global(gvar, init, 0);
            }
        }
        for (_, f) in self.module.functions() {
            let obj = self.pag.object_node(f.value);
            let val = self.pag.value_node(f.value);
            self.pag.add_addr_edge(obj, val, &ctx);
        }
    }

    /// Recursive descent over a constant initializer, storing each referenced
    /// constant into the global's field at the accumulated offset
    fn initial_global(&mut self, gvar: ValueId, c: ValueId, offset: Offset) {
        let ctx = BuildContext::global();
        match &self.module.value(c).kind {
            ValueKind::Global { .. } | ValueKind::Function(_) => {
                let field = self.global_var_field(gvar, offset);
                let src = self.value_node_of(c);
                self.pag.add_store_edge(src, field, &ctx);
                // a function address reachable through a global can be
                // invoked by callers outside the module
                mark_function_escape(&mut self.pag, self.module, c);
            }
            ValueKind::ConstExpr(_) => {
                let src = self.value_node_of(c);
                let field = self.global_var_field(gvar, offset);
                self.pag.add_store_edge(src, field, &ctx);
                // a cast-wrapped function address escapes the same way
                mark_function_escape(&mut self.pag, self.module, c);
            }
            ValueKind::ConstAggregate(elems) => {
                let elems = elems.clone();
                match self.module.types.get(self.module.value(c).ty) {
                    IrType::Struct { .. } => {
                        let struct_ty = self.module.value(c).ty;
                        for (i, elem) in elems.iter().enumerate() {
                            let field_off = self
                                .module
                                .types
                                .flattened_field_offset(struct_ty, i as u64);
                            self.initial_global(gvar, *elem, offset + field_off);
                        }
                    }
                    IrType::Array { .. } | IrType::Vector { .. } => {
                        // array elements collapse onto the same field
                        for elem in elems {
                            self.initial_global(gvar, elem, offset);
                        }
                    }
                    other => panic!("aggregate initializer of scalar type {:?}", other),
                }
            }
            // null/undef/plain data contribute no pointer flow
            ValueKind::NullPtr | ValueKind::Undef | ValueKind::ConstInt(_) => {}
            other => panic!("unexpected initializer value kind {:?}", other),
        }
    }

    /// Field slot of a global at an initializer offset: aggregates get a
    /// field value node, scalars are the global's own value node
    fn global_var_field(&mut self, gvar: ValueId, offset: Offset) -> NodeId {
        let pointee = self
            .module
            .types
            .pointee(self.module.value(gvar).ty)
            .expect("global without pointer type");
        if self.module.types.is_aggregate(pointee) {
            self.pag
                .get_gep_val(self.module, gvar, LocationSet::new(offset))
        } else {
            self.pag.value_node(gvar)
        }
    }

    // Instruction dispatch

    fn visit(&mut self, inst: &Instruction, ctx: &BuildContext) {
        match &inst.kind {
            InstKind::Alloca { .. } => {
                let result = inst.result.expect("alloca without a result");
                let obj = self.pag.object_node(result);
                let val = self.pag.value_node(result);
                self.pag.add_addr_edge(obj, val, ctx);
            }
            InstKind::Phi { incoming } => {
                if let Some(result) = inst.result {
                    if self.module.is_pointer(result) {
                        let dst = self.pag.value_node(result);
                        for q in incoming.clone() {
                            let src = self.value_node_of(q);
                            self.pag.add_copy_edge(src, dst, ctx);
                        }
                    }
                }
            }
            InstKind::Store { value, ptr } => {
                if self.module.is_pointer(*value) {
                    let src = self.value_node_of(*value);
                    let dst = self.value_node_of(*ptr);
                    self.pag.add_store_edge(src, dst, ctx);
                    // a function address written through a pointer escapes
                    // the walk's tracking
                    mark_function_escape(&mut self.pag, self.module, *value);
                }
            }
            InstKind::Load { ptr } => {
                if let Some(result) = inst.result {
                    if self.module.is_pointer(result) {
                        let src = self.value_node_of(*ptr);
                        let dst = self.pag.value_node(result);
                        self.pag.add_load_edge(src, dst, ctx);
                    }
                }
            }
            InstKind::Gep {
                base,
                source_ty,
                indices,
            } => {
                let result = inst.result.expect("gep without a result");
                let src = self.value_node_of(*base);
                let dst = self.pag.value_node(result);
                match compute_gep_offset(&self.module.types, *source_ty, indices) {
                    Some(ls) => self.pag.add_gep_edge(src, dst, ls, ctx),
                    None => self.pag.add_variant_gep_edge(src, dst, ctx),
                };
            }
            InstKind::Cast { src } => {
                if let Some(result) = inst.result {
                    if self.module.is_pointer(result) {
                        let src = self.value_node_of(*src);
                        let dst = self.pag.value_node(result);
                        self.pag.add_copy_edge(src, dst, ctx);
                    }
                }
            }
            InstKind::Select { tval, fval } => {
                if let Some(result) = inst.result {
                    if self.module.is_pointer(result) {
                        let dst = self.pag.value_node(result);
                        let t = self.value_node_of(*tval);
                        self.pag.add_copy_edge(t, dst, ctx);
                        let f = self.value_node_of(*fval);
                        self.pag.add_copy_edge(f, dst, ctx);
                    }
                }
            }
            InstKind::IntToPtr => {
                let result = inst.result.expect("inttoptr without a result");
                let dst = self.pag.value_node(result);
                self.pag.add_blackhole_addr_edge(dst, ctx);
            }
            InstKind::ExtractValue { agg, indices } => {
                if let Some(result) = inst.result {
                    if self.module.is_pointer(result) {
                        let ls = aggregate_field_offset(
                            &self.module.types,
                            self.module.value(*agg).ty,
                            indices,
                        );
                        let field = self.pag.get_gep_val(self.module, *agg, ls);
                        let dst = self.pag.value_node(result);
                        self.pag.add_copy_edge(field, dst, ctx);
                    }
                }
            }
            InstKind::ExtractElement { vector } => {
                if let Some(result) = inst.result {
                    if self.module.is_pointer(result) {
                        let src = self.value_node_of(*vector);
                        let dst = self.pag.value_node(result);
                        self.pag.add_copy_edge(src, dst, ctx);
                    }
                }
            }
            InstKind::Ret { value } => {
                if let Some(v) = value {
                    if self.module.is_pointer(*v) {
                        let src = self.value_node_of(*v);
                        let ret = self.pag.return_node(inst.func);
                        self.pag.add_copy_edge(src, ret, ctx);
                    }
                }
            }
            InstKind::Call { callee, args } => {
                self.visit_call_site(inst, *callee, &args.clone(), ctx);
            }
            // Remaining kinds emit no edges; `inttoptr` anchors the
            // over-approximation for undefined pointer sources
            _ => {}
        }
    }

    // Calls

    fn visit_call_site(
        &mut self,
        inst: &Instruction,
        callee: ValueId,
        args: &[ValueId],
        ctx: &BuildContext,
    ) {
        match self.module.resolve_callee(callee) {
            Some(target) => {
                connect_callsite(
                    &mut self.pag,
                    self.module,
                    &self.ext,
                    &self.thread,
                    inst,
                    target,
                    args,
                    ctx,
                );
            }
            None => {
                debug!(cs = inst.id, "indirect callsite recorded");
                self.pag.register_indirect_callsite(inst.id);
            }
        }
    }
}

/// Wire a callsite to a known callee: thread fork/join, external models, or
/// ordinary parameter/return passing. Shared between the initial walk and
/// post-build indirect-call resolution.
#[allow(clippy::too_many_arguments)]
fn connect_callsite(
    pag: &mut Pag,
    module: &Module,
    ext: &ExtApi,
    thread: &ThreadApi,
    inst: &Instruction,
    target: FuncId,
    args: &[ValueId],
    ctx: &BuildContext,
) {
    let callee = module.function(target);
    match thread.classify(&callee.name) {
        ThreadOpKind::Fork => {
            handle_fork(pag, module, thread, inst, args, ctx);
            return;
        }
        ThreadOpKind::Join => {
            // the joined routine is a runtime value; leave the edge to the
            // solver via `add_join_resolution`
            pag.register_join_site(inst.id);
            return;
        }
        _ => {}
    }
    if callee.is_declaration() {
        handle_ext_call(pag, module, ext, inst, target, args, ctx);
    } else {
        connect_call(pag, module, inst, target, args, ctx);
    }
}

/// Ordinary direct call: actual-to-formal, vararg overflow, return slot
fn connect_call(
    pag: &mut Pag,
    module: &Module,
    inst: &Instruction,
    target: FuncId,
    args: &[ValueId],
    ctx: &BuildContext,
) {
    let cs = inst.id;
    let callee = module.function(target);

    let formals = callee.params.clone();
    for (actual, formal) in args.iter().zip(formals.iter()) {
        if module.is_pointer(*actual) && module.is_pointer(*formal) {
            let src = value_node_of(pag, module, *actual);
            let dst = pag.value_node(*formal);
            pag.add_call_edge(src, dst, cs, ctx);
        }
    }
    if callee.is_vararg {
        let vararg = pag.vararg_node(target);
        for actual in args.iter().skip(formals.len()) {
            if module.is_pointer(*actual) {
                let src = value_node_of(pag, module, *actual);
                pag.add_call_edge(src, vararg, cs, ctx);
            }
        }
    }
    if let Some(result) = inst.result {
        if module.is_pointer(result) && module.types.is_pointer(callee.ret_ty) {
            let ret = pag.return_node(target);
            let dst = pag.value_node(result);
            pag.add_ret_edge(ret, dst, cs, ctx);
        }
    }
}

/// Thread creation: the actual parameter at the fork site flows into the
/// first formal of the spawned routine
fn handle_fork(
    pag: &mut Pag,
    module: &Module,
    thread: &ThreadApi,
    inst: &Instruction,
    args: &[ValueId],
    ctx: &BuildContext,
) {
    let routine = thread
        .forked_routine_arg(module, args)
        .and_then(|r| module.resolve_callee(r));
    let spawnee = match routine {
        Some(f) => f,
        None => {
            // routine is a runtime function pointer
            debug!(cs = inst.id, "fork with unresolved routine recorded");
            pag.register_indirect_callsite(inst.id);
            return;
        }
    };
    let actual = match thread.forked_actual_arg(args) {
        Some(a) => a,
        None => return,
    };
    let formal = match module.function(spawnee).params.first() {
        Some(p) => *p,
        None => return,
    };
    if module.is_pointer(actual) && module.is_pointer(formal) {
        let src = value_node_of(pag, module, actual);
        let dst = pag.value_node(formal);
        pag.add_thread_fork_edge(src, dst, inst.id, ctx);
    }
}

/// External call: apply the effect summary from the policy table
fn handle_ext_call(
    pag: &mut Pag,
    module: &Module,
    ext: &ExtApi,
    inst: &Instruction,
    target: FuncId,
    args: &[ValueId],
    ctx: &BuildContext,
) {
    let callee = module.function(target);
    let effect = ext.classify(&callee.name).unwrap_or(ExtEffect::Unknown);
    let ptr_result = inst
        .result
        .filter(|r| module.is_pointer(*r));

    // a function handed to external code may be invoked from there with
    // arguments the walk never sees
    for arg in args {
        mark_function_escape(pag, module, *arg);
    }

    match effect {
        ExtEffect::Alloc => {
            if let Some(result) = ptr_result {
                let obj = pag.object_node(result);
                let val = pag.value_node(result);
                pag.add_addr_edge(obj, val, ctx);
            }
        }
        ExtEffect::Realloc => {
            if let Some(result) = ptr_result {
                let dst = pag.value_node(result);
                match args.first().filter(|a| module.is_pointer(**a)) {
                    Some(arg) => {
                        let src = value_node_of(pag, module, *arg);
                        pag.add_copy_edge(src, dst, ctx);
                    }
                    None => {
                        pag.add_blackhole_addr_edge(dst, ctx);
                    }
                }
            }
        }
        ExtEffect::NoEffect => {}
        ExtEffect::Memcpy => {
            if let (Some(dst), Some(src)) = (args.first(), args.get(1)) {
                let sz = args.get(2).map(|a| const_int_of(module, *a)).unwrap_or(0);
                add_complex_edges_for_ext(pag, module, *dst, *src, sz, ctx);
            }
        }
        ExtEffect::Memset => {
            if let Some(dst) = args.first().filter(|a| module.is_pointer(**a)) {
                // memset's value operand is an integer; the only
                // pointer-relevant fill is zero, modelled as null
                let src = match args.get(1).filter(|a| module.is_pointer(**a)) {
                    Some(v) => value_node_of(pag, module, *v),
                    None => pag.nullptr_node(),
                };
                let pointee = module.types.pointee(module.value(*dst).ty);
                let fields = match pointee {
                    Some(ty) => module.types.flattened_fields(ty),
                    None => vec![LocationSet::zero()],
                };
                for ls in fields {
                    let field = pag.get_gep_val(module, *dst, ls);
                    pag.add_store_edge(src, field, ctx);
                }
            }
        }
        ExtEffect::RetArg(k) => {
            if let Some(result) = ptr_result {
                let dst = pag.value_node(result);
                match args.get(k).filter(|a| module.is_pointer(**a)) {
                    Some(arg) => {
                        let src = value_node_of(pag, module, *arg);
                        pag.add_copy_edge(src, dst, ctx);
                    }
                    None => {
                        pag.add_blackhole_addr_edge(dst, ctx);
                    }
                }
            }
        }
        ExtEffect::Unknown => {
            if let Some(result) = ptr_result {
                warn!(callee = %callee.name, cs = inst.id, "unknown external, absorbing");
                let dst = pag.value_node(result);
                pag.add_blackhole_addr_edge(dst, ctx);
            }
        }
    }
}

/// Flattened per-field copy between two pointed-to aggregates: one synthetic
/// load/store pair per matching field, up to `sz` fields (0 = all)
pub fn add_complex_edges_for_ext(
    pag: &mut Pag,
    module: &Module,
    dst: ValueId,
    src: ValueId,
    sz: u64,
    ctx: &BuildContext,
) {
    let fields_of = |v: ValueId| -> Vec<LocationSet> {
        match module.types.pointee(module.value(v).ty) {
            Some(ty) => module.types.flattened_fields(ty),
            None => vec![LocationSet::zero()],
        }
    };
    let dst_fields = fields_of(dst);
    let src_fields = fields_of(src);
    let mut n = dst_fields.len().min(src_fields.len());
    if sz > 0 {
        n = n.min(sz as usize);
    }
    for i in 0..n {
        let src_field = pag.get_gep_val(module, src, src_fields[i]);
        let dst_field = pag.get_gep_val(module, dst, dst_fields[i]);
        let tmp = pag.add_dummy_val_node();
        pag.add_load_edge(src_field, tmp, ctx);
        pag.add_store_edge(tmp, dst_field, ctx);
    }
}

/// Value node lookup with constant-expression expansion (free-function form
/// shared by the builder and the post-build resolution entry points)
fn value_node_of(pag: &mut Pag, module: &Module, v: ValueId) -> NodeId {
    process_const_expr(pag, module, v);
    pag.value_node(v)
}

/// If `v` is a function address that escapes to callers the walk cannot see
/// (stored into a global or through a pointer, or passed to external code),
/// its pointer formals may be invoked with arbitrary arguments: route each
/// through the blackhole, attributed to the function's entry block.
fn mark_function_escape(pag: &mut Pag, module: &Module, v: ValueId) {
    let func = match module.resolve_callee(v) {
        Some(f) => f,
        None => return,
    };
    let formals = module.function(func).params.clone();
    for formal in formals {
        if module.is_pointer(formal) {
            let dst = pag.value_node(formal);
            pag.add_formal_param_blackhole_addr_edge(dst, func);
        }
    }
}

/// Recursively synthesize edges for a constant expression, as if it were
/// inlined as instructions. Every edge attributes globally: the expression
/// has no owning instruction and may be reached from many sites.
fn process_const_expr(pag: &mut Pag, module: &Module, v: ValueId) {
    let ctx = BuildContext::global();
    match &module.value(v).kind {
        ValueKind::ConstExpr(ConstExpr::Gep {
            base,
            source_ty,
            indices,
        }) => {
            process_const_expr(pag, module, *base);
            let const_indices: Vec<GepIndex> =
                indices.iter().map(|i| GepIndex::Const(*i)).collect();
            let ls = compute_gep_offset(&module.types, *source_ty, &const_indices)
                .expect("constant gep with a variant offset");
            let src = pag.value_node(*base);
            let dst = pag.value_node(v);
            pag.add_gep_edge(src, dst, ls, &ctx);
        }
        ValueKind::ConstExpr(ConstExpr::Cast(inner)) => {
            process_const_expr(pag, module, *inner);
            let src = pag.value_node(*inner);
            let dst = pag.value_node(v);
            pag.add_copy_edge(src, dst, &ctx);
        }
        ValueKind::ConstExpr(ConstExpr::Select { tval, fval }) => {
            process_const_expr(pag, module, *tval);
            process_const_expr(pag, module, *fval);
            let dst = pag.value_node(v);
            let t = pag.value_node(*tval);
            pag.add_copy_edge(t, dst, &ctx);
            let f = pag.value_node(*fval);
            pag.add_copy_edge(f, dst, &ctx);
        }
        ValueKind::ConstExpr(ConstExpr::IntToPtr) => {
            let dst = pag.value_node(v);
            pag.add_blackhole_addr_edge(dst, &ctx);
        }
        _ => {}
    }
}

/// Accumulate the flattened offset of a gep index list.
///
/// Struct dimensions demand constant indices (a data-dependent struct index
/// is malformed input); array and vector dimensions contribute nothing for a
/// constant index and make the whole access variant (`None`) otherwise. The
/// leading index steps over the source pointer and behaves like an array
/// dimension.
pub fn compute_gep_offset(
    types: &TypeArena,
    source_ty: TypeId,
    indices: &[GepIndex],
) -> Option<LocationSet> {
    let mut offset: Offset = 0;
    let mut cur = source_ty;
    for (pos, index) in indices.iter().enumerate() {
        if pos == 0 {
            // pointer dimension: constant steps collapse onto the base
            if matches!(index, GepIndex::Var(_)) {
                return None;
            }
            continue;
        }
        match types.get(cur) {
            IrType::Struct { .. } => match index {
                GepIndex::Const(c) => {
                    assert!(*c >= 0, "negative struct field index {}", c);
                    offset += types.flattened_field_offset(cur, *c as u64);
                    cur = types.struct_field(cur, *c as u64);
                }
                GepIndex::Var(_) => {
                    panic!("data-dependent index on a struct dimension")
                }
            },
            IrType::Array { elem, .. } | IrType::Vector { elem, .. } => match index {
                GepIndex::Const(_) => {
                    cur = *elem;
                }
                GepIndex::Var(_) => return None,
            },
            other => panic!("gep descends into non-aggregate type {:?}", other),
        }
    }
    Some(LocationSet::new(offset))
}

/// Flattened offset of an `extractvalue` index path (always constant)
fn aggregate_field_offset(types: &TypeArena, agg_ty: TypeId, indices: &[u64]) -> LocationSet {
    let mut offset: Offset = 0;
    let mut cur = agg_ty;
    for index in indices {
        match types.get(cur) {
            IrType::Struct { .. } => {
                offset += types.flattened_field_offset(cur, *index);
                cur = types.struct_field(cur, *index);
            }
            IrType::Array { elem, .. } | IrType::Vector { elem, .. } => {
                cur = *elem;
            }
            other => panic!("extractvalue descends into non-aggregate type {:?}", other),
        }
    }
    LocationSet::new(offset)
}

/// Constant integer operand, or zero when the operand is not a constant
fn const_int_of(module: &Module, v: ValueId) -> u64 {
    match module.value(v).kind {
        ValueKind::ConstInt(c) if c > 0 => c as u64,
        _ => 0,
    }
}

/// Replay the callsite rule for an indirect call resolved to `target`
/// (on-the-fly solver hook). Edges key on the callsite, so repeated
/// resolutions of the same pair are no-ops.
pub fn add_indirect_resolution(pag: &mut Pag, module: &Module, cs: InstId, target: FuncId) {
    let inst = module.inst(cs);
    let args = match &inst.kind {
        InstKind::Call { args, .. } => args.clone(),
        other => panic!("indirect resolution on a non-call instruction {:?}", other),
    };
    let ctx = BuildContext::at_inst(inst.id, inst.func, inst.block);
    connect_callsite(
        pag,
        module,
        &ExtApi::new(),
        &ThreadApi::new(),
        inst,
        target,
        &args,
        &ctx,
    );
}

/// Connect a join callsite to a resolved joined routine: the routine's return
/// slot flows into the join-site out-slot, keyed by the callsite
pub fn add_join_resolution(pag: &mut Pag, module: &Module, cs: InstId, routine: FuncId) {
    let inst = module.inst(cs);
    let args = match &inst.kind {
        InstKind::Call { args, .. } => args.clone(),
        other => panic!("join resolution on a non-call instruction {:?}", other),
    };
    let thread = ThreadApi::new();
    let out_slot = match thread.joined_ret_arg(&args) {
        Some(v) if module.is_pointer(v) => v,
        _ => return,
    };
    let ctx = BuildContext::at_inst(inst.id, inst.func, inst.block);
    let ret = pag.return_node(routine);
    let dst = value_node_of(pag, module, out_slot);
    pag.add_thread_join_edge(ret, dst, cs, &ctx);
}
