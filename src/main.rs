use anyhow::{bail, Context};
use clap::Parser;
use clearing_price::benchmarks::{
    generate_bids, verify_treap, BidGenerator, PricingBenchmark, DEFAULT_BATCH_SIZE,
};
use clearing_price::{IndexedPricer, Price, PricingAlgorithm, ReferencePricer, Units};
use std::path::PathBuf;
use tracing::{info, Level};

// Builds a bid list, prices it with every algorithm and compares prices and timings.

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "clearing-bench")]
#[command(version, about = "Benchmark uniform clearing price algorithms", long_about = None)]
struct Cli {
    /// Number of bids to generate
    #[arg(short, long, default_value_t = 501)]
    bids: usize,

    #[arg(short, long, value_enum, default_value = "ladder")]
    generator: BidGenerator,

    /// Reserve price per unit
    #[arg(short, long, default_value_t = 100)]
    reserve: Price,

    /// Units on sale
    #[arg(short, long, default_value_t = 500)]
    units: Units,

    /// Seed for random bid generation
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Fixed seed for treap weights (OS entropy when absent)
    #[arg(long)]
    treap_seed: Option<u64>,

    /// Pricing calls per pricer
    #[arg(long, default_value_t = 80)]
    repetitions: usize,

    /// Calls timed together per sample
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch: usize,

    /// Skip the quadratic reference pricer
    #[arg(long)]
    skip_reference: bool,

    /// Check treap invariants after every insertion before benchmarking
    #[arg(long)]
    verify: bool,

    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

// ============================================================================
// MAIN
// ============================================================================

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let bids = generate_bids(cli.generator, cli.bids, cli.seed);
    info!(count = bids.len(), generator = ?cli.generator, "bids generated");

    if cli.verify {
        let distinct = verify_treap(&bids, cli.treap_seed.unwrap_or(cli.seed))
            .context("treap invariant broken")?;
        info!(distinct, "treap invariants hold");
    }

    let indexed = match cli.treap_seed {
        Some(seed) => IndexedPricer::seeded(seed),
        None => IndexedPricer::new(),
    };
    let mut pricers: Vec<&dyn PricingAlgorithm> = Vec::with_capacity(2);
    if !cli.skip_reference {
        pricers.push(&ReferencePricer);
    }
    pricers.push(&indexed);

    let report = PricingBenchmark::run(
        &pricers,
        &bids,
        cli.reserve,
        cli.units,
        cli.repetitions,
        cli.batch,
    );

    let output = match cli.format {
        OutputFormat::Text => PricingBenchmark::render_text(&report),
        OutputFormat::Json => serde_json::to_string_pretty(&report)?,
    };

    match cli.output {
        Some(path) => std::fs::write(&path, output)
            .with_context(|| format!("writing report to {}", path.display()))?,
        None => print!("{}", output),
    }

    if !report.agree {
        bail!("pricers returned different clearing prices");
    }
    Ok(())
}

// ============================================================================
// CORRECTNESS TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_match_the_ladder_demo() {
        let cli = Cli::parse_from(["clearing-bench"]);
        assert_eq!(cli.bids, 501);
        assert_eq!(cli.generator, BidGenerator::Ladder);
        assert_eq!(cli.reserve, 100);
        assert_eq!(cli.units, 500);
        assert_eq!(cli.treap_seed, None);
        assert_eq!(cli.batch, DEFAULT_BATCH_SIZE);
        assert!(!cli.verify);
    }

    #[test]
    fn cli_parses_overrides() {
        let cli = Cli::parse_from([
            "clearing-bench",
            "--bids",
            "10000",
            "--generator",
            "random",
            "--format",
            "json",
            "--skip-reference",
            "--verify",
            "--treap-seed",
            "7",
            "--batch",
            "32",
        ]);
        assert_eq!(cli.bids, 10_000);
        assert_eq!(cli.generator, BidGenerator::Random);
        assert!(matches!(cli.format, OutputFormat::Json));
        assert!(cli.skip_reference && cli.verify);
        assert_eq!(cli.treap_seed, Some(7));
        assert_eq!(cli.batch, 32);
        assert_eq!(cli.seed, 42);
    }
}
