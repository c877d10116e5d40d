use crate::interfaces::{
    candidate_price, eligible_bids, Bid, Price, PricingAlgorithm, PricingError, RevenueTracker,
    Units,
};
use crate::treap::AugmentedTreap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument, trace};

/// Same sweep as [`crate::ReferencePricer`], but the active pool lives in an
/// [`AugmentedTreap`] so each demand query costs one walk over commitment
/// tiers instead of a rescan of the whole prefix.
#[derive(Debug, Default, Clone, Copy)]
pub struct IndexedPricer {
    seed: Option<u64>,
}

impl IndexedPricer {
    /// Balances treaps with OS entropy.
    pub fn new() -> Self {
        IndexedPricer::default()
    }

    /// Balances treaps with a fixed seed, for reproducible tree shapes.
    pub fn seeded(seed: u64) -> Self {
        IndexedPricer { seed: Some(seed) }
    }

    fn sweep<R: Rng>(
        bids: &[Bid],
        reserve_price: Price,
        total_units: Units,
        rng: R,
    ) -> RevenueTracker {
        let mut treap = AugmentedTreap::with_rng(bids, rng);
        let mut tracker = RevenueTracker::default();

        for index in 0..bids.len() {
            treap.insert(index);
            let candidate = candidate_price(bids, index, reserve_price);
            let demand = treap.demand_at_price(candidate, total_units);
            trace!(index, candidate, demand, "candidate evaluated");
            tracker.observe(candidate, demand);
            if demand == total_units {
                debug!(index, candidate, "supply cleared, stopping scan");
                break;
            }
        }
        tracker
    }
}

impl PricingAlgorithm for IndexedPricer {
    fn name(&self) -> &'static str {
        "indexed"
    }

    #[instrument(level = "debug", skip(self, bids), fields(bids = bids.len()))]
    fn price(
        &self,
        bids: &[Bid],
        reserve_price: Price,
        total_units: Units,
    ) -> Result<Price, PricingError> {
        let bids = eligible_bids(bids, reserve_price, total_units)?;
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let tracker = Self::sweep(bids, reserve_price, total_units, rng);

        debug!(
            price = tracker.best_price(),
            revenue = tracker.best_revenue(),
            "indexed price found"
        );
        Ok(tracker.best_price())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn degenerate_tree_shapes_price_the_same() {
        let bids = [
            Bid::new(90, 2),
            Bid::new(80, 3),
            Bid::new(80, 1),
            Bid::new(55, 4),
            Bid::new(40, 2),
            Bid::new(12, 9),
        ];
        let balanced = IndexedPricer::sweep(&bids, 10, 12, StdRng::seed_from_u64(1));
        let chain = IndexedPricer::sweep(&bids, 10, 12, StepRng::new(0, 0));
        let spine = IndexedPricer::sweep(&bids, 10, 12, StepRng::new(1, 1));
        assert_eq!(balanced, chain);
        assert_eq!(balanced, spine);
    }

    #[test]
    fn full_clearance_stops_after_first_candidate() {
        let bids = [Bid::new(100, 10), Bid::new(50, 1), Bid::new(1, 1000)];
        let tracker = IndexedPricer::sweep(&bids, 1, 10, StdRng::seed_from_u64(4));
        assert_eq!(tracker.evaluated(), 1);
        assert_eq!(tracker.best_price(), 50);
    }

    #[test]
    fn short_supply_scans_every_candidate() {
        let bids = [Bid::new(100, 1), Bid::new(50, 1), Bid::new(20, 1)];
        let tracker = IndexedPricer::sweep(&bids, 1, 1_000, StdRng::seed_from_u64(4));
        assert_eq!(tracker.evaluated(), 3);
    }

    #[test]
    fn seeded_pricer_is_repeatable() {
        let bids: Vec<Bid> = (0..300).map(|i| Bid::new(1_000 - i, (i % 7) as Units)).collect();
        let pricer = IndexedPricer::seeded(17);
        let first = pricer.price(&bids, 50, 400).unwrap();
        assert_eq!(first, pricer.price(&bids, 50, 400).unwrap());
        assert_eq!(first, IndexedPricer::new().price(&bids, 50, 400).unwrap());
    }
}
