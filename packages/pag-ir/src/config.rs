//! Builder configuration
//!
//! The two switches mirror the original debug-driver flags:
//! - `handle_variant_gep` (`--vgep`): keep data-dependent field edges as
//!   `VariantGep`; when off they degrade to `Copy` (sound over-approximation).
//! - `handle_blackhole` (`--blk`): route undefined int-to-pointer flow through
//!   the blackhole absorber; when off it is routed through the null pointer.

use serde::{Deserialize, Serialize};

/// Default cap on the number of distinct field objects per memory object.
/// Objects whose flattened layout exceeds the cap collapse to a single
/// field-insensitive node.
pub const DEFAULT_MAX_FIELD_LIMIT: u32 = 512;

/// PAG builder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagConfig {
    /// Emit `VariantGep` edges for data-dependent offsets.
    /// When false a variant gep degrades to a `Copy` edge.
    pub handle_variant_gep: bool,

    /// Route undefined pointer sources through the blackhole node.
    /// When false they are routed through the null pointer constant.
    pub handle_blackhole: bool,

    /// Per-object cap on distinct field offsets (keeps the node space finite)
    pub max_field_limit: u32,
}

impl Default for PagConfig {
    fn default() -> Self {
        Self {
            handle_variant_gep: false,
            handle_blackhole: false,
            max_field_limit: DEFAULT_MAX_FIELD_LIMIT,
        }
    }
}

impl PagConfig {
    /// Enable variant gep edges
    #[inline]
    pub fn with_variant_gep(mut self, on: bool) -> Self {
        self.handle_variant_gep = on;
        self
    }

    /// Enable blackhole routing
    #[inline]
    pub fn with_blackhole(mut self, on: bool) -> Self {
        self.handle_blackhole = on;
        self
    }

    /// Override the per-object field cap
    #[inline]
    pub fn with_max_field_limit(mut self, limit: u32) -> Self {
        self.max_field_limit = limit.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags_off() {
        let cfg = PagConfig::default();
        assert!(!cfg.handle_variant_gep);
        assert!(!cfg.handle_blackhole);
        assert_eq!(cfg.max_field_limit, DEFAULT_MAX_FIELD_LIMIT);
    }

    #[test]
    fn test_builder_style() {
        let cfg = PagConfig::default()
            .with_variant_gep(true)
            .with_blackhole(true)
            .with_max_field_limit(0);
        assert!(cfg.handle_variant_gep);
        assert!(cfg.handle_blackhole);
        assert_eq!(cfg.max_field_limit, 1); // clamped to a usable cap
    }
}
