use crate::interfaces::{Bid, Price, PricingAlgorithm, PricingError, Units};
use crate::treap::{AugmentedTreap, TreapViolation};
use colored::*;
use prettytable::{Cell, Row, Table};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::hint::black_box;
use std::time::Instant;
use tracing::{info, warn};

// Mesure en batch pour éviter la limite de résolution de `Instant` : un échantillon
// = durée de `batch` appels consécutifs divisée par `batch`.
pub const DEFAULT_BATCH_SIZE: usize = 8;

/// Lowest unit price of the default ladder
const LADDER_FLOOR: Price = 100;
const LADDER_TOP: Price = 600;

// ============================================================================
// INPUT SYNTHESIS
// ============================================================================

/// How the harness fabricates bids
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BidGenerator {
    /// Strictly descending prices one apart, one unit each: 600 down to 100
    /// for 501 bids. Longer ladders start higher so they still end at 100.
    Ladder,
    /// Uniform random prices and quantities
    Random,
}

/// Builds `count` bids sorted by descending unit price.
pub fn generate_bids(generator: BidGenerator, count: usize, seed: u64) -> Vec<Bid> {
    let mut bids: Vec<Bid> = match generator {
        BidGenerator::Ladder => {
            let steps = Price::try_from(count.saturating_sub(1)).unwrap_or(Price::MAX);
            let top = LADDER_TOP.max(LADDER_FLOOR.saturating_add(steps));
            (0..count)
                .map(|i| {
                    let step = Price::try_from(i).unwrap_or(Price::MAX);
                    Bid::new(top.saturating_sub(step), 1)
                })
                .collect()
        }
        BidGenerator::Random => {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..count)
                .map(|_| Bid::new(rng.gen_range(1..=10_000), rng.gen_range(1..=20)))
                .collect()
        }
    };
    bids.sort_by(|a, b| b.unit_price.cmp(&a.unit_price));
    bids
}

/// Fills a treap with `bids` and checks every invariant after each insertion.
/// Returns the number of distinct commitments.
pub fn verify_treap(bids: &[Bid], seed: u64) -> Result<usize, TreapViolation> {
    let mut treap = AugmentedTreap::with_rng(bids, StdRng::seed_from_u64(seed));
    for index in 0..bids.len() {
        treap.insert(index);
        treap.check_invariants()?;
    }
    Ok(treap.distinct_len())
}

// ============================================================================
// BENCHMARKING FRAMEWORK
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResult {
    pub name: String,
    pub price: Option<Price>,
    pub error: Option<String>,
    pub avg_ns: f64,
    pub p50_ns: f64,
    pub p95_ns: f64,
    pub max_ns: f64,
    pub repetitions: usize,
    pub batch: usize,
    pub samples: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub bids: usize,
    pub reserve_price: Price,
    pub total_units: Units,
    pub agree: bool,
    pub results: Vec<BenchmarkResult>,
}

pub struct PricingBenchmark;

impl PricingBenchmark {
    /// Runs every pricer `repetitions` times on the same input, timing
    /// `batch` calls per sample.
    pub fn run(
        pricers: &[&dyn PricingAlgorithm],
        bids: &[Bid],
        reserve_price: Price,
        total_units: Units,
        repetitions: usize,
        batch: usize,
    ) -> BenchmarkReport {
        let repetitions = repetitions.max(1);
        let batch = batch.max(1);
        let results: Vec<BenchmarkResult> = pricers
            .iter()
            .map(|pricer| {
                Self::run_one(*pricer, bids, reserve_price, total_units, repetitions, batch)
            })
            .collect();

        let agree = results
            .windows(2)
            .all(|pair| pair[0].price == pair[1].price && pair[0].error == pair[1].error);
        if agree {
            info!(pricers = results.len(), "all pricers agree");
        } else {
            warn!("pricers disagree");
        }

        BenchmarkReport {
            bids: bids.len(),
            reserve_price,
            total_units,
            agree,
            results,
        }
    }

    fn run_one(
        pricer: &dyn PricingAlgorithm,
        bids: &[Bid],
        reserve_price: Price,
        total_units: Units,
        repetitions: usize,
        batch: usize,
    ) -> BenchmarkResult {
        let mut timings = Vec::with_capacity((repetitions + batch - 1) / batch);
        let mut outcome: Result<Price, PricingError> = Ok(0);
        let mut i = 0;

        while i < repetitions {
            let end = (i + batch).min(repetitions);
            let count = end - i;
            let start = Instant::now();
            for _ in i..end {
                outcome = black_box(pricer.price(black_box(bids), reserve_price, total_units));
            }
            let elapsed = start.elapsed().as_nanos() as f64;
            timings.push(elapsed / count as f64);
            i = end;
        }

        let avg = Self::average(&timings);
        timings.sort_by(|a, b| a.total_cmp(b));
        info!(pricer = pricer.name(), avg_ns = avg, "pricer timed");

        BenchmarkResult {
            name: pricer.name().to_string(),
            price: outcome.as_ref().ok().copied(),
            error: outcome.err().map(|e| e.to_string()),
            avg_ns: avg,
            p50_ns: timings[timings.len() / 2],
            p95_ns: timings[timings.len() * 95 / 100],
            max_ns: timings[timings.len() - 1],
            repetitions,
            batch,
            samples: timings.len(),
        }
    }

    fn average(timings: &[f64]) -> f64 {
        timings.iter().sum::<f64>() / timings.len() as f64
    }

    /// Formatted results
    pub fn render_text(report: &BenchmarkReport) -> String {
        let mut out = String::new();
        out.push_str(&format!("\n{}\n", "=".repeat(60)));
        out.push_str("  CLEARING PRICE BENCHMARK\n");
        out.push_str(&format!("{}\n", "=".repeat(60)));
        out.push_str(&format!(
            "  Bids: {}  Reserve: {}  Units: {}\n\n",
            report.bids, report.reserve_price, report.total_units
        ));

        let mut table = Table::new();
        table.add_row(Row::new(vec![
            Cell::new("Pricer"),
            Cell::new("Price"),
            Cell::new("Avg (ns)"),
            Cell::new("P50 (ns)"),
            Cell::new("P95 (ns)"),
            Cell::new("Max (ns)"),
        ]));
        for result in &report.results {
            let price = match (&result.price, &result.error) {
                (Some(price), _) => price.to_string(),
                (None, Some(error)) => error.as_str().red().to_string(),
                (None, None) => "-".to_string(),
            };
            table.add_row(Row::new(vec![
                Cell::new(&result.name),
                Cell::new(&price),
                Cell::new(&format!("{:.0}", result.avg_ns)),
                Cell::new(&format!("{:.0}", result.p50_ns)),
                Cell::new(&format!("{:.0}", result.p95_ns)),
                Cell::new(&format!("{:.0}", result.max_ns)),
            ]));
        }
        out.push_str(&table.to_string());

        let status = if report.agree {
            "pricers agree".green().bold()
        } else {
            "PRICERS DISAGREE".red().bold()
        };
        out.push_str(&format!("\n  {}\n{}\n", status, "=".repeat(60)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IndexedPricer, ReferencePricer};

    #[test]
    fn generated_bids_are_sorted() {
        for generator in [BidGenerator::Ladder, BidGenerator::Random] {
            let bids = generate_bids(generator, 700, 5);
            assert_eq!(bids.len(), 700);
            assert!(bids.windows(2).all(|w| w[0].unit_price >= w[1].unit_price));
        }
    }

    #[test]
    fn ladder_keeps_descending_past_600_bids() {
        let short = generate_bids(BidGenerator::Ladder, 501, 0);
        assert_eq!(short[0].unit_price, 600);
        assert_eq!(short[500].unit_price, 100);

        let long = generate_bids(BidGenerator::Ladder, 1_000, 0);
        assert_eq!(long[0].unit_price, 1_099);
        assert_eq!(long[999].unit_price, 100);
        assert!(long.windows(2).all(|w| w[0].unit_price == w[1].unit_price + 1));
    }

    #[test]
    fn report_flags_agreement() {
        let bids = generate_bids(BidGenerator::Random, 400, 8);
        let indexed = IndexedPricer::seeded(8);
        let report = PricingBenchmark::run(&[&ReferencePricer, &indexed], &bids, 100, 300, 3, 1);
        assert!(report.agree);
        assert_eq!(report.results.len(), 2);
        assert!(report.results.iter().all(|r| r.repetitions == 3 && r.price.is_some()));
        assert!(PricingBenchmark::render_text(&report).contains("reference"));
    }

    #[test]
    fn errors_are_reported_not_raised() {
        let bids = generate_bids(BidGenerator::Ladder, 10, 0);
        let report = PricingBenchmark::run(&[&ReferencePricer], &bids, 1, 0, 1, 4);
        assert_eq!(report.results[0].price, None);
        assert!(report.results[0].error.is_some());
    }

    #[test]
    fn samples_cover_whole_batches() {
        let bids = generate_bids(BidGenerator::Random, 200, 3);
        let report = PricingBenchmark::run(&[&ReferencePricer], &bids, 50, 100, 10, 4);
        let result = &report.results[0];
        assert_eq!((result.repetitions, result.batch), (10, 4));
        // 10 calls in batches of 4, 4 and 2
        assert_eq!(result.samples, 3);
        assert!(result.p50_ns <= result.max_ns);
        assert_eq!(result.price, ReferencePricer.price(&bids, 50, 100).ok());
    }

    #[test]
    fn verify_counts_distinct_commitments() {
        let bids = generate_bids(BidGenerator::Ladder, 50, 0);
        assert_eq!(verify_treap(&bids, 1), Ok(50));
    }
}
