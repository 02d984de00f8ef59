//! Build entry point
//!
//! Thin use-case wrapper: construct the builder, run it, report totals.

use crate::config::PagConfig;
use crate::features::builder::infrastructure::builder::PagBuilder;
use crate::features::pag::{Pag, PagStats};
use crate::shared::models::Module;

/// Build the PAG of a module under the given configuration
pub fn build_pag(module: &Module, config: PagConfig) -> Pag {
    PagBuilder::new(module, config).build()
}

/// Build and return the graph together with its totals
pub fn build_pag_with_stats(module: &Module, config: PagConfig) -> (Pag, PagStats) {
    let pag = build_pag(module, config);
    let stats = pag.stats();
    (pag, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::models::ModuleBuilder;

    #[test]
    fn test_build_reports_totals() {
        let mut mb = ModuleBuilder::new("m");
        let void = mb.types().void();
        let i32t = mb.types().int(32);
        let p32 = mb.types().pointer(i32t);
        let f = mb.function("main", void, &[], false, false);
        mb.alloca(f, p32, "p");
        mb.ret(f, None);
        let module = mb.finish();

        let (pag, stats) = build_pag_with_stats(&module, PagConfig::default());
        assert_eq!(stats.nodes, pag.num_nodes());
        assert_eq!(stats.edges, pag.num_edges());
        assert_eq!(stats.edges_by_kind["addr"], 2); // alloca + function object
    }
}
