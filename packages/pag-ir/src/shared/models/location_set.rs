//! Location sets: symbolic field offsets for the gep algebra
//!
//! A `LocationSet` is currently a single accumulated field index within the
//! flattened layout of the containing object. The type exists so the algebra
//! can later grow stride/index components without touching edge identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

/// Accumulated field index within an aggregate, in flattened-layout units
pub type Offset = i64;

/// Symbolic field offset element of the gep algebra
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationSet {
    offset: Offset,
}

impl LocationSet {
    /// Create a location set at the given flattened field offset
    #[inline]
    pub fn new(offset: Offset) -> Self {
        Self { offset }
    }

    /// The zero offset (base of an object)
    #[inline]
    pub fn zero() -> Self {
        Self { offset: 0 }
    }

    /// The accumulated flattened field offset
    #[inline]
    pub fn offset(&self) -> Offset {
        self.offset
    }

    /// Clamp the offset into `[0, field_cap)`.
    ///
    /// Keeps the per-object field node space finite: offsets beyond the cap
    /// wrap onto existing field nodes, a sound collapse.
    #[inline]
    pub fn modulus(&self, field_cap: u32) -> Self {
        let cap = Offset::from(field_cap.max(1));
        Self {
            offset: self.offset.rem_euclid(cap),
        }
    }
}

impl Add for LocationSet {
    type Output = LocationSet;

    /// Field-wise sum, used when collapsing chained geps onto their base
    #[inline]
    fn add(self, rhs: LocationSet) -> LocationSet {
        LocationSet {
            offset: self.offset + rhs.offset,
        }
    }
}

impl fmt::Display for LocationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_is_identity() {
        let ls = LocationSet::new(7);
        assert_eq!(ls + LocationSet::zero(), ls);
        assert_eq!(LocationSet::zero() + ls, ls);
    }

    #[test]
    fn test_add_accumulates() {
        assert_eq!(LocationSet::new(1) + LocationSet::new(2), LocationSet::new(3));
    }

    #[test]
    fn test_modulus_wraps_into_cap() {
        assert_eq!(LocationSet::new(5).modulus(4).offset(), 1);
        assert_eq!(LocationSet::new(3).modulus(4).offset(), 3);
        // negative offsets still land inside the cap
        assert_eq!(LocationSet::new(-1).modulus(4).offset(), 3);
    }

    #[test]
    fn test_modulus_zero_cap_is_clamped() {
        assert_eq!(LocationSet::new(9).modulus(0).offset(), 0);
    }

    proptest! {
        #[test]
        fn prop_modulus_in_bounds(offset in -1_000_000i64..1_000_000, cap in 1u32..4096) {
            let m = LocationSet::new(offset).modulus(cap).offset();
            prop_assert!(m >= 0);
            prop_assert!(m < i64::from(cap));
        }

        #[test]
        fn prop_add_associative(a in -10_000i64..10_000, b in -10_000i64..10_000, c in -10_000i64..10_000) {
            let (a, b, c) = (LocationSet::new(a), LocationSet::new(b), LocationSet::new(c));
            prop_assert_eq!((a + b) + c, a + (b + c));
        }
    }
}
