//! IR type model and flattened field layouts
//!
//! Field sensitivity works over *flattened* layouts: every scalar leaf of an
//! aggregate occupies one flattened slot, nested structs are inlined, and all
//! elements of an array/vector collapse onto the element's slots. The arena
//! owns every type and hands out dense `TypeId`s, so layout queries are cheap
//! and deterministic.

use super::ids::TypeId;
use super::location_set::LocationSet;
use serde::{Deserialize, Serialize};

/// A type in the input IR
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrType {
    /// Integer with bit width
    Int(u32),
    /// Floating point
    Float,
    /// Void (function returns only)
    Void,
    /// Pointer to a pointee type
    Pointer(TypeId),
    /// Struct with ordered field types
    Struct {
        name: Option<String>,
        fields: Vec<TypeId>,
    },
    /// Fixed-length array; elements collapse to one flattened slot set
    Array { elem: TypeId, len: u64 },
    /// SIMD vector; treated like an array for field purposes
    Vector { elem: TypeId, len: u64 },
    /// Function signature
    Function {
        ret: TypeId,
        params: Vec<TypeId>,
        is_vararg: bool,
    },
}

/// Arena of IR types addressed by dense `TypeId`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeArena {
    types: Vec<IrType>,
}

impl TypeArena {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, ty: IrType) -> TypeId {
        let id = self.types.len() as TypeId;
        self.types.push(ty);
        id
    }

    /// Get a type by id. Fatal on an unknown id.
    #[inline]
    pub fn get(&self, id: TypeId) -> &IrType {
        &self.types[id as usize]
    }

    // Constructors

    pub fn int(&mut self, bits: u32) -> TypeId {
        self.push(IrType::Int(bits))
    }

    pub fn float(&mut self) -> TypeId {
        self.push(IrType::Float)
    }

    pub fn void(&mut self) -> TypeId {
        self.push(IrType::Void)
    }

    pub fn pointer(&mut self, pointee: TypeId) -> TypeId {
        self.push(IrType::Pointer(pointee))
    }

    pub fn strukt(&mut self, name: Option<&str>, fields: Vec<TypeId>) -> TypeId {
        self.push(IrType::Struct {
            name: name.map(str::to_owned),
            fields,
        })
    }

    pub fn array(&mut self, elem: TypeId, len: u64) -> TypeId {
        self.push(IrType::Array { elem, len })
    }

    pub fn vector(&mut self, elem: TypeId, len: u64) -> TypeId {
        self.push(IrType::Vector { elem, len })
    }

    pub fn function(&mut self, ret: TypeId, params: Vec<TypeId>, is_vararg: bool) -> TypeId {
        self.push(IrType::Function {
            ret,
            params,
            is_vararg,
        })
    }

    // Queries

    #[inline]
    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.get(id), IrType::Pointer(_))
    }

    /// Pointee of a pointer type
    #[inline]
    pub fn pointee(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            IrType::Pointer(p) => Some(*p),
            _ => None,
        }
    }

    #[inline]
    pub fn is_aggregate(&self, id: TypeId) -> bool {
        matches!(
            self.get(id),
            IrType::Struct { .. } | IrType::Array { .. } | IrType::Vector { .. }
        )
    }

    /// Number of flattened field slots of a type.
    ///
    /// Scalars, pointers and functions occupy one slot; struct fields are
    /// inlined; array/vector elements collapse onto the element layout.
    pub fn flattened_size(&self, id: TypeId) -> u32 {
        match self.get(id) {
            IrType::Struct { fields, .. } => {
                fields.iter().map(|f| self.flattened_size(*f)).sum()
            }
            IrType::Array { elem, .. } | IrType::Vector { elem, .. } => {
                self.flattened_size(*elem)
            }
            _ => 1,
        }
    }

    /// Flattened offset of field `idx` within a struct type.
    ///
    /// Fatal on a non-struct type or out-of-range index: a constant struct
    /// index outside the layout is a malformed input.
    pub fn flattened_field_offset(&self, struct_ty: TypeId, idx: u64) -> i64 {
        match self.get(struct_ty) {
            IrType::Struct { fields, .. } => {
                assert!(
                    (idx as usize) < fields.len(),
                    "struct field index {} out of range ({} fields)",
                    idx,
                    fields.len()
                );
                fields[..idx as usize]
                    .iter()
                    .map(|f| i64::from(self.flattened_size(*f)))
                    .sum()
            }
            other => panic!("flattened field offset on non-struct type {:?}", other),
        }
    }

    /// Field type of a struct at `idx`
    pub fn struct_field(&self, struct_ty: TypeId, idx: u64) -> TypeId {
        match self.get(struct_ty) {
            IrType::Struct { fields, .. } => fields[idx as usize],
            other => panic!("struct field on non-struct type {:?}", other),
        }
    }

    /// Element type of an array/vector
    pub fn elem_type(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id) {
            IrType::Array { elem, .. } | IrType::Vector { elem, .. } => Some(*elem),
            _ => None,
        }
    }

    /// All flattened leaf offsets of a type, in layout order.
    ///
    /// Used for the per-field expansion of memcpy/memset-like externals.
    pub fn flattened_fields(&self, id: TypeId) -> Vec<LocationSet> {
        let mut out = Vec::new();
        self.collect_fields(id, 0, &mut out);
        out
    }

    fn collect_fields(&self, id: TypeId, base: i64, out: &mut Vec<LocationSet>) {
        match self.get(id) {
            IrType::Struct { fields, .. } => {
                let mut off = base;
                for f in fields {
                    self.collect_fields(*f, off, out);
                    off += i64::from(self.flattened_size(*f));
                }
            }
            IrType::Array { elem, .. } | IrType::Vector { elem, .. } => {
                self.collect_fields(*elem, base, out);
            }
            _ => out.push(LocationSet::new(base)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pair_struct(arena: &mut TypeArena) -> TypeId {
        // struct S { i32* a; i32* b; }
        let i32t = arena.int(32);
        let p = arena.pointer(i32t);
        arena.strukt(Some("S"), vec![p, p])
    }

    #[test]
    fn test_scalar_flattens_to_one() {
        let mut arena = TypeArena::new();
        let i32t = arena.int(32);
        let p = arena.pointer(i32t);
        assert_eq!(arena.flattened_size(i32t), 1);
        assert_eq!(arena.flattened_size(p), 1);
    }

    #[test]
    fn test_struct_offsets() {
        let mut arena = TypeArena::new();
        let s = pair_struct(&mut arena);
        assert_eq!(arena.flattened_size(s), 2);
        assert_eq!(arena.flattened_field_offset(s, 0), 0);
        assert_eq!(arena.flattened_field_offset(s, 1), 1);
    }

    #[test]
    fn test_nested_struct_offsets() {
        let mut arena = TypeArena::new();
        let inner = pair_struct(&mut arena);
        let i64t = arena.int(64);
        // struct T { S s; i64 x; S t; }
        let outer = arena.strukt(Some("T"), vec![inner, i64t, inner]);
        assert_eq!(arena.flattened_size(outer), 5);
        assert_eq!(arena.flattened_field_offset(outer, 1), 2);
        assert_eq!(arena.flattened_field_offset(outer, 2), 3);
    }

    #[test]
    fn test_array_collapses() {
        let mut arena = TypeArena::new();
        let s = pair_struct(&mut arena);
        let arr = arena.array(s, 10);
        assert_eq!(arena.flattened_size(arr), 2);
        let fields = arena.flattened_fields(arr);
        assert_eq!(fields, vec![LocationSet::new(0), LocationSet::new(1)]);
    }

    #[test]
    fn test_flattened_fields_in_layout_order() {
        let mut arena = TypeArena::new();
        let inner = pair_struct(&mut arena);
        let i32t = arena.int(32);
        let outer = arena.strukt(None, vec![i32t, inner]);
        let fields: Vec<i64> = arena
            .flattened_fields(outer)
            .into_iter()
            .map(|ls| ls.offset())
            .collect();
        assert_eq!(fields, vec![0, 1, 2]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_bad_struct_index_is_fatal() {
        let mut arena = TypeArena::new();
        let s = pair_struct(&mut arena);
        arena.flattened_field_offset(s, 9);
    }
}
