//! PAG nodes
//!
//! Tagged variants over one node struct. Top-level pointers (`Val`, `GepVal`,
//! `Ret`, `VarArg`, `DummyVal`) and address-taken objects (`Obj`, `GepObj`,
//! `FIObj`, `DummyObj`) partition the kinds; the bit is fixed at construction
//! from the source value's type.

use super::edge::EdgeType;
use crate::shared::models::{EdgeId, FuncId, LocationSet, NodeId, ValueId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// What a PAG node denotes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Top-level SSA value of the module
    Val { value: ValueId },
    /// Synthetic field-derived value, unique per `(base, ls)`
    GepVal {
        value: ValueId,
        base: NodeId,
        ls: LocationSet,
    },
    /// Abstract memory object (stack/global/heap/function)
    Obj { value: ValueId },
    /// Field of an object at a fixed offset, unique per `(base, ls)`
    GepObj { base: NodeId, ls: LocationSet },
    /// Field-insensitive collapse of an object, at most one per base
    FIObj { base: NodeId },
    /// Unique return slot of a function
    Ret { func: FuncId },
    /// Unique variadic-argument slot of a function
    VarArg { func: FuncId },
    /// Anonymous placeholder value (null pointer, synthetic temporaries)
    DummyVal,
    /// Anonymous placeholder object (blackhole, synthetic)
    DummyObj,
}

impl NodeKind {
    /// Address-taken object family
    #[inline]
    pub fn is_object(&self) -> bool {
        matches!(
            self,
            NodeKind::Obj { .. }
                | NodeKind::GepObj { .. }
                | NodeKind::FIObj { .. }
                | NodeKind::DummyObj
        )
    }
}

/// A node of the program assignment graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagNode {
    id: NodeId,
    kind: NodeKind,
    /// Top-level pointer bit; objects are never top-level
    is_tl_pointer: bool,
    in_edges: FxHashMap<EdgeType, Vec<EdgeId>>,
    out_edges: FxHashMap<EdgeType, Vec<EdgeId>>,
}

impl PagNode {
    /// `is_pointer` is the source value's pointer bit; ignored for object
    /// kinds and forced for vararg/dummy values, which over-approximate.
    pub fn new(id: NodeId, kind: NodeKind, is_pointer: bool) -> Self {
        let is_tl_pointer = match kind {
            NodeKind::Val { .. } | NodeKind::GepVal { .. } | NodeKind::Ret { .. } => is_pointer,
            NodeKind::VarArg { .. } | NodeKind::DummyVal => true,
            NodeKind::Obj { .. }
            | NodeKind::GepObj { .. }
            | NodeKind::FIObj { .. }
            | NodeKind::DummyObj => false,
        };
        Self {
            id,
            kind,
            is_tl_pointer,
            in_edges: FxHashMap::default(),
            out_edges: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Top-level pointer (participates in copy/load/store flow directly)
    #[inline]
    pub fn is_top_level_pointer(&self) -> bool {
        self.is_tl_pointer
    }

    /// Address-taken object
    #[inline]
    pub fn is_address_taken(&self) -> bool {
        self.kind.is_object()
    }

    /// Pointer in either role
    #[inline]
    pub fn is_pointer(&self) -> bool {
        self.is_tl_pointer || self.is_address_taken()
    }

    #[inline]
    pub fn is_dummy(&self) -> bool {
        matches!(self.kind, NodeKind::DummyVal | NodeKind::DummyObj)
    }

    /// Incoming edge ids of one kind, in insertion order
    #[inline]
    pub fn incoming(&self, kind: EdgeType) -> &[EdgeId] {
        self.in_edges.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Outgoing edge ids of one kind, in insertion order
    #[inline]
    pub fn outgoing(&self, kind: EdgeType) -> &[EdgeId] {
        self.out_edges.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    #[inline]
    pub fn has_incoming(&self, kind: EdgeType) -> bool {
        !self.incoming(kind).is_empty()
    }

    /// All incoming edge ids across kinds, in global insertion order
    pub fn all_incoming(&self) -> Vec<EdgeId> {
        let mut out: Vec<EdgeId> = EdgeType::ALL
            .iter()
            .flat_map(|k| self.incoming(*k).iter().copied())
            .collect();
        out.sort_unstable();
        out
    }

    /// All outgoing edge ids across kinds, in global insertion order
    pub fn all_outgoing(&self) -> Vec<EdgeId> {
        let mut out: Vec<EdgeId> = EdgeType::ALL
            .iter()
            .flat_map(|k| self.outgoing(*k).iter().copied())
            .collect();
        out.sort_unstable();
        out
    }

    /// True if the node touches no edge at all
    pub fn is_isolated(&self) -> bool {
        self.in_edges.values().all(Vec::is_empty) && self.out_edges.values().all(Vec::is_empty)
    }

    pub(crate) fn add_in_edge(&mut self, kind: EdgeType, edge: EdgeId) {
        self.in_edges.entry(kind).or_default().push(edge);
    }

    pub(crate) fn add_out_edge(&mut self, kind: EdgeType, edge: EdgeId) {
        self.out_edges.entry(kind).or_default().push(edge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pointer_bits_by_kind() {
        let val = PagNode::new(0, NodeKind::Val { value: 0 }, true);
        assert!(val.is_top_level_pointer());
        assert!(!val.is_address_taken());

        let nonptr = PagNode::new(1, NodeKind::Val { value: 1 }, false);
        assert!(!nonptr.is_pointer());

        let obj = PagNode::new(2, NodeKind::Obj { value: 0 }, false);
        assert!(obj.is_address_taken());
        assert!(!obj.is_top_level_pointer());
        assert!(obj.is_pointer());

        let vararg = PagNode::new(3, NodeKind::VarArg { func: 0 }, false);
        assert!(vararg.is_top_level_pointer());
    }

    #[test]
    fn test_adjacency_per_kind() {
        let mut node = PagNode::new(0, NodeKind::DummyVal, true);
        node.add_in_edge(EdgeType::Copy, 3);
        node.add_in_edge(EdgeType::Copy, 5);
        node.add_in_edge(EdgeType::Load, 4);
        assert_eq!(node.incoming(EdgeType::Copy), &[3, 5]);
        assert_eq!(node.incoming(EdgeType::Load), &[4]);
        assert!(node.incoming(EdgeType::Store).is_empty());
        assert_eq!(node.all_incoming(), vec![3, 4, 5]);
    }
}
