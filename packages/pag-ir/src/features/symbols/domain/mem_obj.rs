//! Abstract memory objects
//!
//! One `MemObj` per address-taken location: stack slot, global variable,
//! heap allocation site, or function. Carries the layout data that bounds
//! field sensitivity for the object.

use crate::shared::models::{LocationSet, TypeArena, TypeId, ValueId};
use serde::{Deserialize, Serialize};

/// Where the object was allocated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjKind {
    Stack,
    Global,
    Heap,
    Function,
}

/// Metadata of an abstract memory object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemObj {
    pub kind: ObjKind,
    /// The value this object abstracts (alloca result, global, function,
    /// or the result of an allocating call)
    pub ref_val: ValueId,
    /// Layout type of the allocation; `None` when the layout is unknown
    /// (heap objects, functions)
    pub alloc_ty: Option<TypeId>,
    /// Cap on distinct field offsets, `min(flattened size, configured limit)`
    field_cap: u32,
    field_insensitive: bool,
}

impl MemObj {
    /// Build object metadata from its allocation type.
    ///
    /// Objects without a layout, or whose flattened layout exceeds the
    /// configured limit, collapse to a single field-insensitive location.
    pub fn new(
        kind: ObjKind,
        ref_val: ValueId,
        alloc_ty: Option<TypeId>,
        types: &TypeArena,
        max_field_limit: u32,
    ) -> Self {
        let limit = max_field_limit.max(1);
        let (field_cap, field_insensitive) = match alloc_ty {
            Some(ty) => {
                let size = types.flattened_size(ty);
                (size.clamp(1, limit), size > limit)
            }
            None => (1, true),
        };
        Self {
            kind,
            ref_val,
            alloc_ty,
            field_cap,
            field_insensitive,
        }
    }

    /// Exclusive upper bound on field offsets of this object
    #[inline]
    pub fn max_field_offset(&self) -> u32 {
        self.field_cap
    }

    /// True if all fields of the object collapse to one location
    #[inline]
    pub fn is_field_insensitive(&self) -> bool {
        self.field_insensitive
    }

    /// Collapse the object's fields (used when a solver loses track of
    /// the layout)
    #[inline]
    pub fn set_field_insensitive(&mut self) {
        self.field_insensitive = true;
    }

    /// Clamp a location set into this object's field space
    #[inline]
    pub fn modulus_offset(&self, ls: LocationSet) -> LocationSet {
        ls.modulus(self.field_cap)
    }

    #[inline]
    pub fn is_heap(&self) -> bool {
        self.kind == ObjKind::Heap
    }

    #[inline]
    pub fn is_function(&self) -> bool {
        self.kind == ObjKind::Function
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::LocationSet;

    fn arena_with_pair() -> (TypeArena, TypeId) {
        let mut types = TypeArena::new();
        let i32t = types.int(32);
        let p = types.pointer(i32t);
        let s = types.strukt(Some("S"), vec![p, p]);
        (types, s)
    }

    #[test]
    fn test_sized_object_is_field_sensitive() {
        let (types, s) = arena_with_pair();
        let obj = MemObj::new(ObjKind::Stack, 0, Some(s), &types, 512);
        assert!(!obj.is_field_insensitive());
        assert_eq!(obj.max_field_offset(), 2);
    }

    #[test]
    fn test_unknown_layout_collapses() {
        let types = TypeArena::new();
        let obj = MemObj::new(ObjKind::Heap, 0, None, &types, 512);
        assert!(obj.is_field_insensitive());
        assert_eq!(obj.max_field_offset(), 1);
    }

    #[test]
    fn test_oversized_layout_collapses() {
        let mut types = TypeArena::new();
        let i32t = types.int(32);
        let wide = types.strukt(None, vec![i32t; 8]);
        let obj = MemObj::new(ObjKind::Global, 0, Some(wide), &types, 4);
        assert!(obj.is_field_insensitive());
        assert_eq!(obj.max_field_offset(), 4);
    }

    #[test]
    fn test_modulus_respects_cap() {
        let (types, s) = arena_with_pair();
        let obj = MemObj::new(ObjKind::Stack, 0, Some(s), &types, 512);
        assert_eq!(obj.modulus_offset(LocationSet::new(3)).offset(), 1);
    }
}
