//! PAG debug driver
//!
//! Reads a pre-serialized PAG (one `src dst offset kind` edge per line),
//! rebuilds the graph and dumps it as a listing, DOT, or JSON stats.
//!
//! ```bash
//! pag-dump graph.pag --dot graph.dot --stats
//! pag-dump graph.pag --vgep --blk --print
//! ```

use clap::Parser;
use pag_ir::{write_dot, PagBuilderFromFile, PagConfig};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "pag-dump")]
#[command(about = "Rebuild and inspect a serialized program assignment graph", long_about = None)]
struct Cli {
    /// Input file, one edge per line: `src dst offset kind`
    input: PathBuf,

    /// Handle variant gep edges (default: degrade to copy)
    #[arg(long = "vgep")]
    vgep: bool,

    /// Route undefined pointer sources through the blackhole (default: null)
    #[arg(long = "blk")]
    blk: bool,

    /// Write the graph in DOT format to this path
    #[arg(long)]
    dot: Option<PathBuf>,

    /// Print the node/edge listing to stdout
    #[arg(long)]
    print: bool,

    /// Print node/edge totals as JSON to stdout
    #[arg(long)]
    stats: bool,
}

fn run(cli: &Cli) -> pag_ir::Result<()> {
    let config = PagConfig::default()
        .with_variant_gep(cli.vgep)
        .with_blackhole(cli.blk);
    let pag = PagBuilderFromFile::new(&cli.input, config).build()?;

    if let Some(path) = &cli.dot {
        let name = cli
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pag".to_owned());
        let mut out = File::create(path)?;
        write_dot(&pag, &name, &mut out)?;
    }
    if cli.print {
        let stdout = io::stdout();
        pag.print_to(&mut stdout.lock())?;
    }
    if cli.stats {
        let json = serde_json::to_string_pretty(&pag.stats())
            .expect("stats serialization cannot fail");
        println!("{}", json);
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = writeln!(io::stderr(), "pag-dump: {}", e);
            ExitCode::FAILURE
        }
    }
}
