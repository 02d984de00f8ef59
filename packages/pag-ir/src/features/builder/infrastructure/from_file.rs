//! Debug builder over a serialized PAG
//!
//! Reads a pre-serialized graph from a text file: one edge per line,
//! `src dst offset kind` with `kind` in {addr, copy, load, store, gep, call,
//! ret}. Nodes are created on demand as placeholders; inter-procedural edges
//! share one synthetic callsite, so identical lines deduplicate.

use crate::config::PagConfig;
use crate::errors::{PagError, Result};
use crate::features::pag::{BuildContext, Pag};
use crate::features::symbols::SymbolTable;
use crate::shared::models::{CallSiteId, LocationSet, Module, NodeId};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Callsite stand-in for edges parsed from a file; the text format carries
/// no callsite identity
const FILE_CALLSITE: CallSiteId = CallSiteId::MAX;

/// Build a PAG from a user-specified file (debugging driver)
pub struct PagBuilderFromFile {
    path: PathBuf,
    config: PagConfig,
}

impl PagBuilderFromFile {
    pub fn new(path: impl Into<PathBuf>, config: PagConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }

    #[inline]
    pub fn file_name(&self) -> &Path {
        &self.path
    }

    /// Parse every line and assemble the graph
    pub fn build(&self) -> Result<Pag> {
        let text = fs::read_to_string(&self.path)?;
        let pag = self.build_from_str(&text)?;
        info!(
            file = %self.path.display(),
            nodes = pag.num_nodes(),
            edges = pag.num_edges(),
            "PAG built from file"
        );
        Ok(pag)
    }

    fn build_from_str(&self, text: &str) -> Result<Pag> {
        let module = Module::default();
        let mut pag = Pag::new(&module, SymbolTable::empty(), self.config);
        let ctx = BuildContext::global();

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let src = parse_id(parts.next(), lineno, "src")?;
            let dst = parse_id(parts.next(), lineno, "dst")?;
            let offset = parse_offset(parts.next(), lineno)?;
            let kind = parts
                .next()
                .ok_or_else(|| PagError::parse(format!("line {}: missing edge kind", lineno + 1)))?;

            ensure_node(&mut pag, src);
            ensure_node(&mut pag, dst);

            match kind {
                "addr" => pag.add_addr_edge(src, dst, &ctx),
                "copy" => pag.add_copy_edge(src, dst, &ctx),
                "load" => pag.add_load_edge(src, dst, &ctx),
                "store" => pag.add_store_edge(src, dst, &ctx),
                "gep" => pag.add_normal_gep_edge(src, dst, LocationSet::new(offset), &ctx),
                "call" => pag.add_call_edge(src, dst, FILE_CALLSITE, &ctx),
                "ret" => pag.add_ret_edge(src, dst, FILE_CALLSITE, &ctx),
                other => {
                    return Err(PagError::parse(format!(
                        "line {}: unknown edge kind '{}'",
                        lineno + 1,
                        other
                    )))
                }
            };
        }
        pag.sanity_check();
        Ok(pag)
    }
}

fn parse_id(field: Option<&str>, lineno: usize, what: &str) -> Result<NodeId> {
    field
        .ok_or_else(|| PagError::parse(format!("line {}: missing {}", lineno + 1, what)))?
        .parse::<NodeId>()
        .map_err(|e| PagError::parse(format!("line {}: bad {}: {}", lineno + 1, what, e)))
}

fn parse_offset(field: Option<&str>, lineno: usize) -> Result<i64> {
    field
        .ok_or_else(|| PagError::parse(format!("line {}: missing offset", lineno + 1)))?
        .parse::<i64>()
        .map_err(|e| PagError::parse(format!("line {}: bad offset: {}", lineno + 1, e)))
}

/// Grow the node arena with placeholders until `id` exists
fn ensure_node(pag: &mut Pag, id: NodeId) {
    while pag.num_nodes() <= id as usize {
        pag.add_dummy_val_node();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::pag::EdgeType;
    use pretty_assertions::assert_eq;

    fn build(text: &str) -> Result<Pag> {
        PagBuilderFromFile::new("unused", PagConfig::default()).build_from_str(text)
    }

    #[test]
    fn test_small_graph_round_trip() {
        let pag = build(
            "10 11 0 addr\n\
             12 13 0 addr\n\
             13 11 0 store\n\
             11 14 0 load\n",
        )
        .unwrap();
        assert_eq!(pag.edges_of(EdgeType::Addr).count(), 2);
        assert_eq!(pag.edges_of(EdgeType::Store).count(), 1);
        assert_eq!(pag.edges_of(EdgeType::Load).count(), 1);
        assert_eq!(pag.num_nodes(), 15);
    }

    #[test]
    fn test_gep_line_carries_offset() {
        let pag = build("5 6 3 gep\n").unwrap();
        let edge = pag.edges_of(EdgeType::NormalGep).next().unwrap();
        assert_eq!(edge.kind().location_set(), Some(LocationSet::new(3)));
    }

    #[test]
    fn test_duplicate_lines_deduplicate() {
        let pag = build(
            "3 4 0 copy\n\
             3 4 0 copy\n\
             3 4 0 call\n\
             3 4 0 call\n",
        )
        .unwrap();
        assert_eq!(pag.edges_of(EdgeType::Copy).count(), 1);
        assert_eq!(pag.edges_of(EdgeType::Call).count(), 1);
    }

    #[test]
    fn test_comments_and_blanks_skipped() {
        let pag = build("# header\n\n3 4 0 copy\n").unwrap();
        assert_eq!(pag.num_edges(), 1);
    }

    #[test]
    fn test_bad_kind_is_parse_error() {
        let err = build("1 2 0 jump\n").unwrap_err();
        assert!(matches!(err, PagError::Parse(_)));
    }

    #[test]
    fn test_bad_id_is_parse_error() {
        let err = build("x 2 0 copy\n").unwrap_err();
        assert!(matches!(err, PagError::Parse(_)));
    }
}
