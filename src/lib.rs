//! Searchset: person-search dataset adapter.
//!
//! Searchset loads the CUHK-SYSU person-search benchmark from its MATLAB
//! annotation files and exposes it as uniform per-image detection records:
//! ground-truth boxes with person identity labels for training, plus probe
//! regions for search evaluation. Assembled roidbs are cached on disk per
//! split.
//!
//! # Modules
//!
//! - [`mat`]: Minimal Level 5 MAT-file reader and writer
//! - [`protocol`]: Typed loaders for the four annotation files
//! - [`dataset`]: The adapter producing roidb records and probes
//! - [`registry`]: Explicit dataset catalog for the training framework
//! - [`error`]: Error types for searchset operations

pub mod dataset;
pub mod error;
pub mod mat;
pub mod protocol;
pub mod registry;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use dataset::{PersonSearchDataset, Split};
pub use error::SearchsetError;

/// The searchset CLI application.
#[derive(Parser)]
#[command(name = "searchset")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Build (or load) a split's roidb and print a summary.
    Prepare(PrepareArgs),

    /// List the test-split probe regions.
    Probes(ProbesArgs),
}

/// Arguments for the prepare subcommand.
#[derive(clap::Args)]
struct PrepareArgs {
    /// Which split to prepare ('train' or 'test').
    split: String,

    /// Dataset root directory.
    #[arg(long, env = "SEARCHSET_ROOT")]
    root: PathBuf,
}

/// Arguments for the probes subcommand.
#[derive(clap::Args)]
struct ProbesArgs {
    /// Dataset root directory.
    #[arg(long, env = "SEARCHSET_ROOT")]
    root: PathBuf,
}

/// Run the searchset CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), SearchsetError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Prepare(args)) => run_prepare(args),
        Some(Commands::Probes(args)) => run_probes(args),
        None => {
            println!("searchset {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Person-search dataset adapter.");
            println!();
            println!("Run 'searchset --help' for usage information.");
            Ok(())
        }
    }
}

/// Execute the prepare subcommand.
fn run_prepare(args: PrepareArgs) -> Result<(), SearchsetError> {
    let split: Split = args.split.parse()?;
    let dataset = PersonSearchDataset::open(&args.root, split)?;

    let num_boxes: usize = dataset.roidb().iter().map(|record| record.boxes.len()).sum();
    let num_identities = dataset
        .roidb()
        .iter()
        .flat_map(|record| &record.pids)
        .filter(|pid| pid.is_labeled())
        .map(|pid| pid.as_i32())
        .max()
        .map(|max| max as usize + 1)
        .unwrap_or(0);

    println!("split:      {split}");
    println!("images:     {}", dataset.num_images());
    println!("boxes:      {num_boxes}");
    println!("identities: {num_identities}");
    if split == Split::Test {
        println!("probes:     {}", dataset.probes().len());
    }
    println!(
        "cache:      {}",
        PersonSearchDataset::cache_file(&args.root, split).display()
    );

    Ok(())
}

/// Execute the probes subcommand.
fn run_probes(args: ProbesArgs) -> Result<(), SearchsetError> {
    let probes = dataset::load_probes(&args.root)?;

    for (index, probe) in probes.iter().enumerate() {
        println!(
            "{index}\t{}\t({}, {}, {}, {})",
            probe.image.display(),
            probe.roi.x1,
            probe.roi.y1,
            probe.roi.x2,
            probe.roi.y2
        );
    }
    println!("{} probe(s)", probes.len());

    Ok(())
}
