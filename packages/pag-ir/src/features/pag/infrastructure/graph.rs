//! The program assignment graph
//!
//! Owns every node and edge. Nodes live in an id-indexed arena; edges live in
//! an id-indexed arena with a per-kind insertion-ordered index and one
//! structural dedup set, so the canonical-edge invariant holds by
//! construction. Node adjacency stores edge ids only, mirroring the store.
//!
//! The graph is append-only while the builder runs and read-only afterwards;
//! the single post-build mutation path is indirect-call resolution, which
//! replays the builder's call rule.

use crate::config::PagConfig;
use crate::features::pag::domain::context::{Attribution, BuildContext};
use crate::features::pag::domain::edge::{EdgeKind, EdgeType, PagEdge};
use crate::features::pag::domain::node::{NodeKind, PagNode};
use crate::features::symbols::SymbolTable;
use crate::shared::models::{
    EdgeId, FuncId, InstId, LocationSet, Module, NodeId, ValueId, BLACKHOLE_NODE, NULLPTR_NODE,
};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use tracing::debug;

/// Node and edge totals, per edge kind
#[derive(Debug, Clone, Default, Serialize)]
pub struct PagStats {
    pub nodes: usize,
    pub edges: usize,
    pub edges_by_kind: BTreeMap<&'static str, usize>,
}

/// The program assignment graph
#[derive(Debug)]
pub struct Pag {
    config: PagConfig,
    symbols: SymbolTable,
    nodes: Vec<PagNode>,
    edges: Vec<PagEdge>,
    /// Structural dedup: one edge per `(src, dst, kind)` incl. payload
    edge_set: FxHashSet<(NodeId, NodeId, EdgeKind)>,
    /// Per-kind edge ids in insertion order
    kind_index: FxHashMap<EdgeType, Vec<EdgeId>>,
    /// `(base val, ls)` → unique GepVal node
    gep_val_cache: FxHashMap<(NodeId, LocationSet), NodeId>,
    /// `(base obj, normalized ls)` → unique GepObj node
    gep_obj_cache: FxHashMap<(NodeId, LocationSet), NodeId>,
    /// base obj → its unique FIObj collapse
    fi_obj_cache: FxHashMap<NodeId, NodeId>,
    /// base obj → every GepObj/FIObj derived from it
    mem_to_fields: FxHashMap<NodeId, Vec<NodeId>>,
    /// Attribution: instruction → edges emitted under it
    inst_edges: FxHashMap<InstId, Vec<EdgeId>>,
    /// Attribution: function → synthetic entry-block edges
    fun_entry_edges: FxHashMap<FuncId, Vec<EdgeId>>,
    /// Attribution: edges with no owning instruction
    global_edges: Vec<EdgeId>,
    /// Callsites awaiting on-the-fly resolution
    indirect_callsites: Vec<InstId>,
    /// Join callsites whose joined routine is unknown until solving
    join_sites: Vec<InstId>,
}

impl Pag {
    /// Materialize nodes for every pre-registered symbol.
    ///
    /// Ids 0/1 become the blackhole object and the null pointer; the rest
    /// mirror the symbol table, so node ids equal symbol ids.
    pub fn new(module: &Module, symbols: SymbolTable, config: PagConfig) -> Self {
        let total = symbols.total_symbols() as usize;
        let mut slots: Vec<Option<PagNode>> = vec![None; total];
        slots[BLACKHOLE_NODE as usize] =
            Some(PagNode::new(BLACKHOLE_NODE, NodeKind::DummyObj, false));
        slots[NULLPTR_NODE as usize] = Some(PagNode::new(NULLPTR_NODE, NodeKind::DummyVal, true));

        for (value, sym) in symbols.value_symbols() {
            if sym == NULLPTR_NODE {
                continue;
            }
            slots[sym as usize] = Some(PagNode::new(
                sym,
                NodeKind::Val { value },
                module.is_pointer(value),
            ));
        }
        for (value, sym) in symbols.object_symbols() {
            slots[sym as usize] = Some(PagNode::new(sym, NodeKind::Obj { value }, false));
        }
        for (func, sym) in symbols.return_symbols() {
            let is_ptr = module.types.is_pointer(module.function(func).ret_ty);
            slots[sym as usize] = Some(PagNode::new(sym, NodeKind::Ret { func }, is_ptr));
        }
        for (func, sym) in symbols.vararg_symbols() {
            slots[sym as usize] = Some(PagNode::new(sym, NodeKind::VarArg { func }, true));
        }

        let nodes: Vec<PagNode> = slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.unwrap_or_else(|| panic!("symbol id {} has no node", i)))
            .collect();

        Self {
            config,
            symbols,
            nodes,
            edges: Vec::new(),
            edge_set: FxHashSet::default(),
            kind_index: FxHashMap::default(),
            gep_val_cache: FxHashMap::default(),
            gep_obj_cache: FxHashMap::default(),
            fi_obj_cache: FxHashMap::default(),
            mem_to_fields: FxHashMap::default(),
            inst_edges: FxHashMap::default(),
            fun_entry_edges: FxHashMap::default(),
            global_edges: Vec::new(),
            indirect_callsites: Vec::new(),
            join_sites: Vec::new(),
        }
    }

    #[inline]
    pub fn config(&self) -> &PagConfig {
        &self.config
    }

    #[inline]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    // Node access

    /// Get a node. Fatal on an absent id.
    pub fn node(&self, id: NodeId) -> &PagNode {
        self.nodes
            .get(id as usize)
            .unwrap_or_else(|| panic!("no PAG node with id {}", id))
    }

    fn node_mut(&mut self, id: NodeId) -> &mut PagNode {
        self.nodes
            .get_mut(id as usize)
            .unwrap_or_else(|| panic!("no PAG node with id {}", id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &PagNode> {
        self.nodes.iter()
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Append a node and return its id
    pub fn add_node(&mut self, kind: NodeKind, is_pointer: bool) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(PagNode::new(id, kind, is_pointer));
        id
    }

    /// Anonymous placeholder value (synthetic temporaries)
    pub fn add_dummy_val_node(&mut self) -> NodeId {
        self.add_node(NodeKind::DummyVal, true)
    }

    /// Anonymous placeholder object
    pub fn add_dummy_obj_node(&mut self) -> NodeId {
        self.add_node(NodeKind::DummyObj, false)
    }

    #[inline]
    pub fn blackhole_node(&self) -> NodeId {
        BLACKHOLE_NODE
    }

    #[inline]
    pub fn nullptr_node(&self) -> NodeId {
        NULLPTR_NODE
    }

    // Symbol-backed lookups

    #[inline]
    pub fn value_node(&self, v: ValueId) -> NodeId {
        self.symbols.value_id(v)
    }

    #[inline]
    pub fn object_node(&self, v: ValueId) -> NodeId {
        self.symbols.object_id(v)
    }

    #[inline]
    pub fn return_node(&self, f: FuncId) -> NodeId {
        self.symbols.return_id(f)
    }

    #[inline]
    pub fn vararg_node(&self, f: FuncId) -> NodeId {
        self.symbols.vararg_id(f)
    }

    // Edge access

    /// Get an edge. Fatal on an absent id.
    pub fn edge(&self, id: EdgeId) -> &PagEdge {
        self.edges
            .get(id as usize)
            .unwrap_or_else(|| panic!("no PAG edge with id {}", id))
    }

    /// Edges of one kind in insertion order
    pub fn edges_of(&self, kind: EdgeType) -> impl Iterator<Item = &PagEdge> {
        self.kind_index
            .get(&kind)
            .into_iter()
            .flatten()
            .map(|id| &self.edges[*id as usize])
    }

    pub fn edges(&self) -> impl Iterator<Item = &PagEdge> {
        self.edges.iter()
    }

    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Incoming edges of `node` of one kind, in insertion order
    pub fn incoming(&self, node: NodeId, kind: EdgeType) -> impl Iterator<Item = &PagEdge> {
        self.node(node)
            .incoming(kind)
            .iter()
            .map(|id| &self.edges[*id as usize])
    }

    /// Outgoing edges of `node` of one kind, in insertion order
    pub fn outgoing(&self, node: NodeId, kind: EdgeType) -> impl Iterator<Item = &PagEdge> {
        self.node(node)
            .outgoing(kind)
            .iter()
            .map(|id| &self.edges[*id as usize])
    }

    /// Edges attributed to an instruction
    pub fn inst_edges(&self, inst: InstId) -> &[EdgeId] {
        self.inst_edges.get(&inst).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Synthetic edges attributed to a function's entry block
    pub fn function_entry_edges(&self, func: FuncId) -> &[EdgeId] {
        self.fun_entry_edges
            .get(&func)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Edges with no owning instruction
    #[inline]
    pub fn global_edges(&self) -> &[EdgeId] {
        &self.global_edges
    }

    // Edge insertion

    /// Insert an edge unless its structural key is already present.
    /// Returns whether it was inserted; a duplicate leaves all state as-is.
    fn add_edge(&mut self, src: NodeId, dst: NodeId, kind: EdgeKind, ctx: &BuildContext) -> bool {
        assert!((src as usize) < self.nodes.len(), "edge source {} unknown", src);
        assert!((dst as usize) < self.nodes.len(), "edge target {} unknown", dst);
        if !self.edge_set.insert((src, dst, kind)) {
            return false;
        }

        let id = self.edges.len() as EdgeId;
        let attribution = ctx.attribution();
        let inst = match attribution {
            Attribution::Inst(inst) => Some(inst),
            _ => None,
        };
        debug!(src, dst, kind = %kind.edge_type(), id, "add edge");

        self.edges.push(PagEdge::new(id, src, dst, kind, inst));
        let ty = kind.edge_type();
        self.kind_index.entry(ty).or_default().push(id);
        self.node_mut(src).add_out_edge(ty, id);
        self.node_mut(dst).add_in_edge(ty, id);
        match attribution {
            Attribution::Inst(inst) => self.inst_edges.entry(inst).or_default().push(id),
            Attribution::FunctionEntry(func) => {
                self.fun_entry_edges.entry(func).or_default().push(id)
            }
            Attribution::Global => self.global_edges.push(id),
        }
        true
    }

    /// Address-of edge: object into pointer
    pub fn add_addr_edge(&mut self, src: NodeId, dst: NodeId, ctx: &BuildContext) -> bool {
        self.add_edge(src, dst, EdgeKind::Addr, ctx)
    }

    pub fn add_copy_edge(&mut self, src: NodeId, dst: NodeId, ctx: &BuildContext) -> bool {
        self.add_edge(src, dst, EdgeKind::Copy, ctx)
    }

    pub fn add_load_edge(&mut self, src: NodeId, dst: NodeId, ctx: &BuildContext) -> bool {
        self.add_edge(src, dst, EdgeKind::Load, ctx)
    }

    pub fn add_store_edge(&mut self, src: NodeId, dst: NodeId, ctx: &BuildContext) -> bool {
        self.add_edge(src, dst, EdgeKind::Store, ctx)
    }

    pub fn add_call_edge(
        &mut self,
        src: NodeId,
        dst: NodeId,
        cs: InstId,
        ctx: &BuildContext,
    ) -> bool {
        self.add_edge(src, dst, EdgeKind::Call(cs), ctx)
    }

    pub fn add_ret_edge(
        &mut self,
        src: NodeId,
        dst: NodeId,
        cs: InstId,
        ctx: &BuildContext,
    ) -> bool {
        self.add_edge(src, dst, EdgeKind::Ret(cs), ctx)
    }

    /// Parameter passing from a spawner to its spawnee
    pub fn add_thread_fork_edge(
        &mut self,
        src: NodeId,
        dst: NodeId,
        cs: InstId,
        ctx: &BuildContext,
    ) -> bool {
        self.add_edge(src, dst, EdgeKind::ThreadFork(cs), ctx)
    }

    /// Return passing from a spawnee back to its joiner
    pub fn add_thread_join_edge(
        &mut self,
        src: NodeId,
        dst: NodeId,
        cs: InstId,
        ctx: &BuildContext,
    ) -> bool {
        self.add_edge(src, dst, EdgeKind::ThreadJoin(cs), ctx)
    }

    /// Undefined pointer source: blackhole address when enabled, otherwise a
    /// copy from the null pointer constant
    pub fn add_blackhole_addr_edge(&mut self, dst: NodeId, ctx: &BuildContext) -> bool {
        if self.config.handle_blackhole {
            self.add_addr_edge(BLACKHOLE_NODE, dst, ctx)
        } else {
            self.add_copy_edge(NULLPTR_NODE, dst, ctx)
        }
    }

    /// Blackhole edge for a pointer formal reachable from unknown callers,
    /// attributed to the function's entry block
    pub fn add_formal_param_blackhole_addr_edge(&mut self, dst: NodeId, func: FuncId) -> bool {
        self.add_blackhole_addr_edge(dst, &BuildContext::function_entry(func))
    }

    // Gep edges, canonicalized onto the base node of the destination

    /// Add a gep edge. If the source already hangs off a variant gep, the new
    /// edge is variant regardless of the supplied offset.
    pub fn add_gep_edge(
        &mut self,
        src: NodeId,
        dst: NodeId,
        ls: LocationSet,
        ctx: &BuildContext,
    ) -> bool {
        if self.node(src).has_incoming(EdgeType::VariantGep) {
            self.add_variant_gep_edge(src, dst, ctx)
        } else {
            self.add_normal_gep_edge(src, dst, ls, ctx)
        }
    }

    /// Fixed-offset gep edge; chained geps fold onto the base with summed
    /// offsets
    pub fn add_normal_gep_edge(
        &mut self,
        src: NodeId,
        dst: NodeId,
        ls: LocationSet,
        ctx: &BuildContext,
    ) -> bool {
        let base_ls = self.location_set_of_incoming_gep(src);
        let base = self.base_of(src);
        self.add_edge(base, dst, EdgeKind::NormalGep(ls + base_ls), ctx)
    }

    /// Data-dependent gep edge; degrades to a copy when variant handling is
    /// disabled
    pub fn add_variant_gep_edge(&mut self, src: NodeId, dst: NodeId, ctx: &BuildContext) -> bool {
        if !self.config.handle_variant_gep {
            return self.add_copy_edge(src, dst, ctx);
        }
        let base = self.base_of(src);
        self.add_edge(base, dst, EdgeKind::VariantGep, ctx)
    }

    /// Base pointer of a node: the source of its single incoming gep edge,
    /// or the node itself
    pub fn base_of(&self, id: NodeId) -> NodeId {
        let node = self.node(id);
        let ngeps = node.incoming(EdgeType::NormalGep);
        let vgeps = node.incoming(EdgeType::VariantGep);
        if ngeps.is_empty() && vgeps.is_empty() {
            return id;
        }
        assert!(
            ngeps.len() + vgeps.len() == 1,
            "node {} has more than one incoming gep edge",
            id
        );
        let edge = ngeps.first().or_else(|| vgeps.first()).unwrap();
        self.edge(*edge).src()
    }

    /// Offset between a node and its base: the location set of its single
    /// incoming normal gep edge, zero if it is itself a base
    pub fn location_set_of_incoming_gep(&self, id: NodeId) -> LocationSet {
        let geps = self.node(id).incoming(EdgeType::NormalGep);
        match geps {
            [] => LocationSet::zero(),
            [edge] => self.edge(*edge).kind().location_set().unwrap(),
            _ => panic!("node {} has more than one incoming normal gep edge", id),
        }
    }

    // Field-node caches

    /// Field value node for `(base of v, ls)`; created on first request with
    /// a normal gep edge from the base, attributed globally (a constant
    /// sub-expression may be reached from many sites)
    pub fn get_gep_val(&mut self, module: &Module, v: ValueId, ls: LocationSet) -> NodeId {
        let base = self.base_of(self.value_node(v));
        if let Some(found) = self.gep_val_cache.get(&(base, ls)) {
            return *found;
        }
        let stripped = module.strip_casts(v);
        let gep_node = self.add_node(
            NodeKind::GepVal {
                value: stripped,
                base,
                ls,
            },
            module.is_pointer(stripped),
        );
        self.gep_val_cache.insert((base, ls), gep_node);
        self.add_gep_edge(base, gep_node, ls, &BuildContext::global());
        gep_node
    }

    /// Field object node for an object at `ls`.
    ///
    /// Field-insensitive objects absorb every offset into their unique FIObj
    /// node; otherwise the offset is clamped into the object's field space
    /// and the `(base, ls)` cache keeps the node unique. Chained lookups on a
    /// derived node fold offsets onto the base object.
    pub fn get_gep_obj(&mut self, id: NodeId, ls: LocationSet) -> NodeId {
        match *self.node(id).kind() {
            NodeKind::Obj { .. } => self.get_gep_obj_of_base(id, ls),
            NodeKind::GepObj { base, ls: prev } => self.get_gep_obj_of_base(base, prev + ls),
            NodeKind::FIObj { base } => self.get_gep_obj_of_base(base, ls),
            ref other => panic!("gep over non-object node {} ({:?})", id, other),
        }
    }

    fn get_gep_obj_of_base(&mut self, obj: NodeId, ls: LocationSet) -> NodeId {
        if self.symbols.is_field_insensitive(obj) {
            return self.fi_obj_node(obj);
        }
        let normalized = self.symbols.modulus_offset(obj, ls);
        if let Some(found) = self.gep_obj_cache.get(&(obj, normalized)) {
            return *found;
        }
        let node = self.add_node(
            NodeKind::GepObj {
                base: obj,
                ls: normalized,
            },
            false,
        );
        self.gep_obj_cache.insert((obj, normalized), node);
        self.mem_to_fields.entry(obj).or_default().push(node);
        node
    }

    /// The unique field-insensitive collapse of an object
    pub fn fi_obj_node(&mut self, obj: NodeId) -> NodeId {
        if let Some(found) = self.fi_obj_cache.get(&obj) {
            return *found;
        }
        let node = self.add_node(NodeKind::FIObj { base: obj }, false);
        self.fi_obj_cache.insert(obj, node);
        self.mem_to_fields.entry(obj).or_default().push(node);
        node
    }

    /// Every field node derived from a base object
    pub fn all_fields_of(&self, obj: NodeId) -> &[NodeId] {
        self.mem_to_fields
            .get(&obj)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Fields of an object, respecting a collapse: a field-insensitive
    /// object exposes only its FIObj node
    pub fn fields_after_collapse(&mut self, id: NodeId) -> Vec<NodeId> {
        let base = match *self.node(id).kind() {
            NodeKind::Obj { .. } => id,
            NodeKind::GepObj { base, .. } | NodeKind::FIObj { base } => base,
            ref other => panic!("fields of non-object node {} ({:?})", id, other),
        };
        if self.symbols.is_field_insensitive(base) {
            vec![self.fi_obj_node(base)]
        } else {
            self.all_fields_of(base).to_vec()
        }
    }

    /// Dummy or fully disconnected nodes are not pointers; otherwise the
    /// node's pointer bit decides
    pub fn is_valid_pointer(&self, id: NodeId) -> bool {
        let node = self.node(id);
        if node.is_isolated() {
            return false;
        }
        node.is_pointer()
    }

    /// Collapse an object's fields; subsequent lookups land on its FIObj
    /// node (used by solvers that lose track of a layout)
    pub fn set_field_insensitive(&mut self, obj: NodeId) {
        self.symbols.set_field_insensitive(obj);
    }

    // Indirect calls

    /// Record a callsite whose targets are unknown until solving
    pub fn register_indirect_callsite(&mut self, cs: InstId) {
        self.indirect_callsites.push(cs);
    }

    #[inline]
    pub fn indirect_callsites(&self) -> &[InstId] {
        &self.indirect_callsites
    }

    /// Record a join callsite; the joined routine is resolved during solving
    pub fn register_join_site(&mut self, cs: InstId) {
        self.join_sites.push(cs);
    }

    #[inline]
    pub fn join_sites(&self) -> &[InstId] {
        &self.join_sites
    }

    // Diagnostics

    pub fn stats(&self) -> PagStats {
        let mut edges_by_kind = BTreeMap::new();
        for kind in EdgeType::ALL {
            let count = self.kind_index.get(&kind).map(Vec::len).unwrap_or(0);
            edges_by_kind.insert(kind.as_str(), count);
        }
        PagStats {
            nodes: self.nodes.len(),
            edges: self.edges.len(),
            edges_by_kind,
        }
    }

    /// Human-readable node/edge listing, skipping dummy nodes
    pub fn print_to(&self, w: &mut impl Write) -> io::Result<()> {
        for node in &self.nodes {
            if node.is_dummy() {
                continue;
            }
            writeln!(w, "node {} {:?}", node.id(), node.kind())?;
            write!(w, "\t InEdge: {{ ")?;
            for id in node.all_incoming() {
                let edge = self.edge(id);
                write!(w, "{} ", edge.src())?;
                match edge.kind() {
                    EdgeKind::NormalGep(ls) => write!(w, "offset={} ", ls.offset())?,
                    EdgeKind::VariantGep => write!(w, "offset=variant ")?,
                    _ => {}
                }
            }
            writeln!(w, "}}")?;
            write!(w, "\t OutEdge: {{ ")?;
            for id in node.all_outgoing() {
                let edge = self.edge(id);
                write!(w, "{} ", edge.dst())?;
                match edge.kind() {
                    EdgeKind::NormalGep(ls) => write!(w, "offset={} ", ls.offset())?,
                    EdgeKind::VariantGep => write!(w, "offset=variant ")?,
                    _ => {}
                }
            }
            writeln!(w, "}}")?;
        }
        Ok(())
    }

    /// Structural self-checks; violations are programming errors.
    ///
    /// Verifies the adjacency mirror, the single-incoming-gep bound and the
    /// gep endpoint canonicalization.
    pub fn sanity_check(&self) {
        for edge in &self.edges {
            let ty = edge.edge_type();
            assert!(
                self.node(edge.src()).outgoing(ty).contains(&edge.id()),
                "edge {} missing from source adjacency",
                edge.id()
            );
            assert!(
                self.node(edge.dst()).incoming(ty).contains(&edge.id()),
                "edge {} missing from target adjacency",
                edge.id()
            );
        }
        for node in &self.nodes {
            let geps =
                node.incoming(EdgeType::NormalGep).len() + node.incoming(EdgeType::VariantGep).len();
            assert!(
                geps <= 1,
                "node {} has {} incoming gep edges",
                node.id(),
                geps
            );
        }
        for kind in [EdgeType::NormalGep, EdgeType::VariantGep] {
            for edge in self.edges_of(kind) {
                assert_eq!(
                    edge.src(),
                    self.base_of(edge.dst()),
                    "gep edge {} does not originate at its destination's base",
                    edge.id()
                );
            }
        }
    }
}
