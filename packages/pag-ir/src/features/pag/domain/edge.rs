//! PAG edges
//!
//! One tagged variant per assignment relation. Structural identity is
//! `(src, dst, kind)` where the kind carries the gep location set and, for
//! inter-procedural kinds, the callsite; the edge store deduplicates on
//! exactly that key.

use crate::shared::models::{CallSiteId, EdgeId, InstId, LocationSet, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fieldless edge discriminant, used to index per-kind sets and adjacency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeType {
    Addr,
    Copy,
    Load,
    Store,
    NormalGep,
    VariantGep,
    Call,
    Ret,
    ThreadFork,
    ThreadJoin,
}

impl EdgeType {
    /// All discriminants in a fixed order (stats, DOT, sweeps)
    pub const ALL: [EdgeType; 10] = [
        EdgeType::Addr,
        EdgeType::Copy,
        EdgeType::Load,
        EdgeType::Store,
        EdgeType::NormalGep,
        EdgeType::VariantGep,
        EdgeType::Call,
        EdgeType::Ret,
        EdgeType::ThreadFork,
        EdgeType::ThreadJoin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Addr => "addr",
            EdgeType::Copy => "copy",
            EdgeType::Load => "load",
            EdgeType::Store => "store",
            EdgeType::NormalGep => "gep",
            EdgeType::VariantGep => "vgep",
            EdgeType::Call => "call",
            EdgeType::Ret => "ret",
            EdgeType::ThreadFork => "fork",
            EdgeType::ThreadJoin => "join",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge kind with its structural payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Address-of: object into pointer
    Addr,
    /// Direct assignment
    Copy,
    /// Dereferencing read
    Load,
    /// Dereferencing write
    Store,
    /// Field access at a fixed offset
    NormalGep(LocationSet),
    /// Field access at a data-dependent offset
    VariantGep,
    /// Actual-to-formal parameter passing at a callsite
    Call(CallSiteId),
    /// Callee-return to callsite-result passing
    Ret(CallSiteId),
    /// Spawner-to-spawnee parameter passing
    ThreadFork(CallSiteId),
    /// Spawnee-to-joiner return passing
    ThreadJoin(CallSiteId),
}

impl EdgeKind {
    /// The fieldless discriminant
    #[inline]
    pub fn edge_type(&self) -> EdgeType {
        match self {
            EdgeKind::Addr => EdgeType::Addr,
            EdgeKind::Copy => EdgeType::Copy,
            EdgeKind::Load => EdgeType::Load,
            EdgeKind::Store => EdgeType::Store,
            EdgeKind::NormalGep(_) => EdgeType::NormalGep,
            EdgeKind::VariantGep => EdgeType::VariantGep,
            EdgeKind::Call(_) => EdgeType::Call,
            EdgeKind::Ret(_) => EdgeType::Ret,
            EdgeKind::ThreadFork(_) => EdgeType::ThreadFork,
            EdgeKind::ThreadJoin(_) => EdgeType::ThreadJoin,
        }
    }

    /// Intra-procedural kinds key on `(src, dst, kind)` alone
    #[inline]
    pub fn is_intra(&self) -> bool {
        matches!(
            self,
            EdgeKind::Addr
                | EdgeKind::Copy
                | EdgeKind::Load
                | EdgeKind::Store
                | EdgeKind::NormalGep(_)
                | EdgeKind::VariantGep
        )
    }

    /// Gep family
    #[inline]
    pub fn is_gep(&self) -> bool {
        matches!(self, EdgeKind::NormalGep(_) | EdgeKind::VariantGep)
    }

    /// The disambiguating callsite of inter-procedural kinds
    #[inline]
    pub fn callsite(&self) -> Option<CallSiteId> {
        match self {
            EdgeKind::Call(cs)
            | EdgeKind::Ret(cs)
            | EdgeKind::ThreadFork(cs)
            | EdgeKind::ThreadJoin(cs) => Some(*cs),
            _ => None,
        }
    }

    /// The fixed offset of a normal gep edge
    #[inline]
    pub fn location_set(&self) -> Option<LocationSet> {
        match self {
            EdgeKind::NormalGep(ls) => Some(*ls),
            _ => None,
        }
    }
}

/// An edge of the program assignment graph, owned by the edge store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagEdge {
    id: EdgeId,
    src: NodeId,
    dst: NodeId,
    kind: EdgeKind,
    /// Attributing instruction, when the edge was emitted under one
    inst: Option<InstId>,
}

impl PagEdge {
    pub(crate) fn new(
        id: EdgeId,
        src: NodeId,
        dst: NodeId,
        kind: EdgeKind,
        inst: Option<InstId>,
    ) -> Self {
        Self {
            id,
            src,
            dst,
            kind,
            inst,
        }
    }

    #[inline]
    pub fn id(&self) -> EdgeId {
        self.id
    }

    #[inline]
    pub fn src(&self) -> NodeId {
        self.src
    }

    #[inline]
    pub fn dst(&self) -> NodeId {
        self.dst
    }

    #[inline]
    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    #[inline]
    pub fn edge_type(&self) -> EdgeType {
        self.kind.edge_type()
    }

    /// Instruction the edge is attributed to, if any
    #[inline]
    pub fn inst(&self) -> Option<InstId> {
        self.inst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_identity_includes_payload() {
        let a = EdgeKind::NormalGep(LocationSet::new(1));
        let b = EdgeKind::NormalGep(LocationSet::new(2));
        assert_ne!(a, b);
        assert_eq!(a.edge_type(), b.edge_type());

        let c1 = EdgeKind::Call(10);
        let c2 = EdgeKind::Call(11);
        assert_ne!(c1, c2);
    }

    #[test]
    fn test_intra_inter_partition() {
        assert!(EdgeKind::Addr.is_intra());
        assert!(EdgeKind::VariantGep.is_intra());
        assert!(!EdgeKind::Call(0).is_intra());
        assert!(!EdgeKind::ThreadJoin(0).is_intra());
    }

    #[test]
    fn test_join_keys_on_its_own_discriminant() {
        // a join edge is never confused with a return edge
        let join = EdgeKind::ThreadJoin(5);
        let ret = EdgeKind::Ret(5);
        assert_ne!(join, ret);
        assert_eq!(join.edge_type(), EdgeType::ThreadJoin);
        assert_eq!(join.callsite(), Some(5));
    }
}
