//! DOT export
//!
//! One shape per node kind, one color per edge kind, matching the upstream
//! debugging conventions: Addr green, Copy black, Load red, Store blue, gep
//! purple, fork/join turquoise, Call dashed, Ret dotted.

use super::graph::Pag;
use crate::features::pag::domain::edge::EdgeKind;
use crate::features::pag::domain::node::NodeKind;
use std::io::{self, Write};

fn node_attributes(kind: &NodeKind) -> &'static str {
    match kind {
        NodeKind::Val { .. } => "shape=circle",
        NodeKind::GepVal { .. } => "shape=hexagon",
        NodeKind::DummyVal => "shape=diamond",
        NodeKind::Obj { .. } => "shape=doublecircle",
        NodeKind::GepObj { .. } => "shape=doubleoctagon",
        NodeKind::FIObj { .. } => "shape=septagon",
        NodeKind::DummyObj => "shape=Mcircle",
        NodeKind::Ret { .. } => "shape=Mrecord",
        NodeKind::VarArg { .. } => "shape=octagon",
    }
}

fn edge_attributes(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Addr => "color=green",
        EdgeKind::Copy => "color=black",
        EdgeKind::NormalGep(_) | EdgeKind::VariantGep => "color=purple",
        EdgeKind::Store => "color=blue",
        EdgeKind::Load => "color=red",
        EdgeKind::ThreadFork(_) | EdgeKind::ThreadJoin(_) => "color=turquoise",
        EdgeKind::Call(_) => "color=black,style=dashed",
        EdgeKind::Ret(_) => "color=black,style=dotted",
    }
}

fn edge_label(kind: EdgeKind) -> String {
    match kind {
        EdgeKind::NormalGep(ls) => format!("{}", ls.offset()),
        EdgeKind::VariantGep => "variant".to_owned(),
        EdgeKind::Call(cs) | EdgeKind::Ret(cs) | EdgeKind::ThreadFork(cs)
        | EdgeKind::ThreadJoin(cs) => format!("cs{}", cs),
        _ => String::new(),
    }
}

/// Write the whole graph in DOT format
pub fn write_dot(pag: &Pag, name: &str, w: &mut impl Write) -> io::Result<()> {
    writeln!(w, "digraph \"{}\" {{", name)?;
    writeln!(w, "\tlabel=\"{}\";", name)?;
    for node in pag.nodes() {
        writeln!(
            w,
            "\tNode{} [{},label=\"{}\"];",
            node.id(),
            node_attributes(node.kind()),
            node.id()
        )?;
    }
    for edge in pag.edges() {
        let label = edge_label(edge.kind());
        if label.is_empty() {
            writeln!(
                w,
                "\tNode{} -> Node{} [{}];",
                edge.src(),
                edge.dst(),
                edge_attributes(edge.kind())
            )?;
        } else {
            writeln!(
                w,
                "\tNode{} -> Node{} [{},label=\"{}\"];",
                edge.src(),
                edge.dst(),
                edge_attributes(edge.kind()),
                label
            )?;
        }
    }
    writeln!(w, "}}")
}
