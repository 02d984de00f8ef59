//! End-to-end builder scenarios over literal IR fragments

use pag_ir::shared::models::GepIndex;
use pag_ir::{
    build_pag, EdgeKind, EdgeType, LocationSet, ModuleBuilder, Pag, PagConfig, BLACKHOLE_NODE,
    NULLPTR_NODE,
};
use pretty_assertions::assert_eq;

fn has_edge(pag: &Pag, src: u32, dst: u32, kind: EdgeKind) -> bool {
    pag.edges()
        .any(|e| e.src() == src && e.dst() == dst && e.kind() == kind)
}

/// ```text
/// %p = alloca i32*
/// %q = alloca i32
/// store i32* %q, i32** %p
/// %r = load i32** %p
/// ```
#[test]
fn store_load_roundtrip() {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let i32t = mb.types().int(32);
    let p32 = mb.types().pointer(i32t);
    let f = mb.function("main", void, &[], false, false);
    let p = mb.alloca(f, p32, "p");
    let q = mb.alloca(f, i32t, "q");
    mb.store(f, q, p);
    let r = mb.load(f, p, "r");
    mb.ret(f, None);
    let module = mb.finish();

    let pag = build_pag(&module, PagConfig::default());
    let (op, vp) = (pag.object_node(p), pag.value_node(p));
    let (oq, vq) = (pag.object_node(q), pag.value_node(q));
    let vr = pag.value_node(r);

    assert!(has_edge(&pag, op, vp, EdgeKind::Addr));
    assert!(has_edge(&pag, oq, vq, EdgeKind::Addr));
    assert!(has_edge(&pag, vq, vp, EdgeKind::Store));
    assert!(has_edge(&pag, vp, vr, EdgeKind::Load));

    // a second build of the same module yields the same graph
    let again = build_pag(&module, PagConfig::default());
    assert_eq!(pag.num_nodes(), again.num_nodes());
    assert_eq!(pag.num_edges(), again.num_edges());
}

/// Field-sensitive geps over `struct S { i32* a; i32* b; }`
#[test]
fn gep_field_sensitivity() {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let i32t = mb.types().int(32);
    let p32 = mb.types().pointer(i32t);
    let pp32 = mb.types().pointer(p32);
    let s_ty = mb.types().strukt(Some("S"), vec![p32, p32]);
    let f = mb.function("main", void, &[], false, false);
    let s = mb.alloca(f, s_ty, "s");
    let x = mb.alloca(f, i32t, "x");
    let pb = mb.gep(
        f,
        s,
        s_ty,
        vec![GepIndex::Const(0), GepIndex::Const(1)],
        pp32,
        "pb",
    );
    mb.store(f, x, pb);
    // a further gep off the derived pointer collapses onto the base
    let pc = mb.gep(f, pb, p32, vec![GepIndex::Const(0)], pp32, "pc");
    mb.ret(f, None);
    let module = mb.finish();

    let pag = build_pag(&module, PagConfig::default());
    let (vs, vpb, vpc) = (pag.value_node(s), pag.value_node(pb), pag.value_node(pc));
    let (os, vx) = (pag.object_node(s), pag.value_node(x));

    assert!(has_edge(&pag, os, vs, EdgeKind::Addr));
    assert!(has_edge(
        &pag,
        vs,
        vpb,
        EdgeKind::NormalGep(LocationSet::new(1))
    ));
    assert!(has_edge(&pag, vx, vpb, EdgeKind::Store));
    // offset algebra: base val(%s), offset 1 + 0 = 1
    assert!(has_edge(
        &pag,
        vs,
        vpc,
        EdgeKind::NormalGep(LocationSet::new(1))
    ));
    assert_eq!(pag.base_of(vpc), vs);
}

/// Variant gep: disabled degrades to copy, enabled stays variant
#[test]
fn variant_gep_flag() {
    let build = |vgep: bool| {
        let mut mb = ModuleBuilder::new("m");
        let void = mb.types().void();
        let i32t = mb.types().int(32);
        let p32 = mb.types().pointer(i32t);
        let pp32 = mb.types().pointer(p32);
        let arr_ty = mb.types().array(p32, 10);
        let f = mb.function("main", void, &[], false, false);
        let islot = mb.alloca(f, i32t, "islot");
        let i = mb.load(f, islot, "i");
        let arr = mb.alloca(f, arr_ty, "arr");
        let p = mb.gep(
            f,
            arr,
            arr_ty,
            vec![GepIndex::Const(0), GepIndex::Var(i)],
            pp32,
            "p",
        );
        mb.ret(f, None);
        let module = mb.finish();
        let cfg = PagConfig::default().with_variant_gep(vgep);
        let pag = build_pag(&module, cfg);
        let varr = pag.value_node(arr);
        let vp = pag.value_node(p);
        (pag, varr, vp)
    };

    let (pag, varr, vp) = build(false);
    assert!(has_edge(&pag, varr, vp, EdgeKind::Copy));
    assert_eq!(pag.edges_of(EdgeType::VariantGep).count(), 0);

    let (pag, varr, vp) = build(true);
    assert!(has_edge(&pag, varr, vp, EdgeKind::VariantGep));
}

/// External memcpy expands to per-field load/store pairs
#[test]
fn external_memcpy() {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let i32t = mb.types().int(32);
    let i64t = mb.types().int(64);
    let i8t = mb.types().int(8);
    let p8 = mb.types().pointer(i8t);
    let p32 = mb.types().pointer(i32t);
    let s_ty = mb.types().strukt(Some("S"), vec![p32, p32]);
    let memcpy = mb.function("memcpy", p8, &[p8, p8, i64t], false, true);
    let memcpy_val = mb.func_value(memcpy);
    let f = mb.function("main", void, &[], false, false);
    let d = mb.alloca(f, s_ty, "d");
    let s = mb.alloca(f, s_ty, "s");
    let sz = mb.const_int(i64t, 16);
    let (cs, _) = mb.call(f, memcpy_val, vec![d, s, sz], None, "");
    mb.ret(f, None);
    let module = mb.finish();

    let pag = build_pag(&module, PagConfig::default());
    // two pointer fields -> two synthetic load/store pairs
    assert_eq!(pag.edges_of(EdgeType::Load).count(), 2);
    assert_eq!(pag.edges_of(EdgeType::Store).count(), 2);
    assert_eq!(pag.inst_edges(cs).len(), 4);

    // loads read the source fields, stores hit the destination fields
    for edge in pag.edges_of(EdgeType::Load) {
        assert_eq!(pag.base_of(edge.src()), pag.value_node(s));
    }
    for edge in pag.edges_of(EdgeType::Store) {
        assert_eq!(pag.base_of(edge.dst()), pag.value_node(d));
    }
}

/// pthread_create wires the fork actual into the spawnee's formal,
/// once per callsite
#[test]
fn pthread_create_fork_edges() {
    let mut mb = ModuleBuilder::new("m");
    let void = mb.types().void();
    let i32t = mb.types().int(32);
    let i8t = mb.types().int(8);
    let p8 = mb.types().pointer(i8t);
    let worker = mb.function("worker", void, &[p8], false, false);
    mb.ret(worker, None);
    let worker_val = mb.func_value(worker);
    let pthread_create = mb.function("pthread_create", i32t, &[p8, p8, p8, p8], false, true);
    let pthread_create_val = mb.func_value(pthread_create);
    let f = mb.function("main", void, &[], false, false);
    let tid = mb.alloca(f, i8t, "tid");
    let attr = mb.null(p8);
    let arg = mb.alloca(f, i8t, "arg");
    let (cs1, _) = mb.call(f, pthread_create_val, vec![tid, attr, worker_val, arg], None, "");
    let (cs2, _) = mb.call(f, pthread_create_val, vec![tid, attr, worker_val, arg], None, "");
    mb.ret(f, None);
    let formal = mb.func_param(worker, 0);
    let module = mb.finish();

    let pag = build_pag(&module, PagConfig::default());
    let varg = pag.value_node(arg);
    let vformal = pag.value_node(formal);

    assert!(has_edge(&pag, varg, vformal, EdgeKind::ThreadFork(cs1)));
    assert!(has_edge(&pag, varg, vformal, EdgeKind::ThreadFork(cs2)));
    // inter edges key on the callsite: same endpoints, two distinct edges
    assert_eq!(pag.edges_of(EdgeType::ThreadFork).count(), 2);
    assert_eq!(pag.inst_edges(cs1).len(), 1);
    assert_eq!(pag.inst_edges(cs2).len(), 1);
}

/// Constant gep expression inside a global initializer
///
/// ```text
/// @s = global %S zeroinitializer
/// @g = global i32* getelementptr (%S, %S* @s, i32 0, i32 1)
/// ```
#[test]
fn constexpr_in_global_initializer() {
    let mut mb = ModuleBuilder::new("m");
    let i32t = mb.types().int(32);
    let p32 = mb.types().pointer(i32t);
    let s_ty = mb.types().strukt(Some("S"), vec![p32, p32]);
    let s = mb.global("s", s_ty, None);
    let cgep = mb.const_gep(p32, s, s_ty, vec![0, 1]);
    let g = mb.global("g", p32, Some(cgep));
    let module = mb.finish();

    let pag = build_pag(&module, PagConfig::default());
    let (os, vs) = (pag.object_node(s), pag.value_node(s));
    let (og, vg) = (pag.object_node(g), pag.value_node(g));
    let vgep = pag.value_node(cgep);

    assert!(has_edge(&pag, os, vs, EdgeKind::Addr));
    assert!(has_edge(&pag, og, vg, EdgeKind::Addr));
    assert!(has_edge(
        &pag,
        vs,
        vgep,
        EdgeKind::NormalGep(LocationSet::new(1))
    ));
    assert!(has_edge(&pag, vgep, vg, EdgeKind::Store));

    // every synthetic edge is a global edge with no owning instruction
    for id in pag.global_edges() {
        assert_eq!(pag.edge(*id).inst(), None);
    }
    let globals: Vec<_> = pag.global_edges().to_vec();
    assert!(!globals.is_empty());

    // rebuilding must not duplicate anything
    let again = build_pag(&module, PagConfig::default());
    assert_eq!(pag.num_edges(), again.num_edges());
}

/// inttoptr routes through null by default and through the blackhole
/// under `--blk`
#[test]
fn inttoptr_routing() {
    let build = |blk: bool| {
        let mut mb = ModuleBuilder::new("itp");
        let void = mb.types().void();
        let i32t = mb.types().int(32);
        let p32 = mb.types().pointer(i32t);
        let f = mb.function("main", void, &[], false, false);
        let p = mb.int_to_ptr(f, p32, "p");
        mb.ret(f, None);
        let module = mb.finish();
        let pag = build_pag(&module, PagConfig::default().with_blackhole(blk));
        let vp = pag.value_node(p);
        (pag, vp)
    };

    let (pag, vp) = build(false);
    assert!(has_edge(&pag, NULLPTR_NODE, vp, EdgeKind::Copy));

    let (pag, vp) = build(true);
    assert!(has_edge(&pag, BLACKHOLE_NODE, vp, EdgeKind::Addr));
}
