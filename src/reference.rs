use crate::interfaces::{
    candidate_price, eligible_bids, units_at, Bid, Price, PricingAlgorithm, PricingError,
    RevenueTracker, Units,
};
use tracing::{debug, instrument, trace};

// Scan naïf : pour chaque prix candidat on re-somme toute la demande du préfixe.
// O(n^2), sert de référence pour l'implémentation indexée.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferencePricer;

impl ReferencePricer {
    /// Demand of `pool` at `price`, capped at `total_units`.
    fn demand(pool: &[Bid], price: Price, total_units: Units) -> Units {
        let cap = u64::from(total_units);
        let mut demand = 0u64;
        for bid in pool {
            demand = demand.saturating_add(units_at(bid.commitment(), price));
            if demand >= cap {
                return total_units;
            }
        }
        // demand < cap <= Units::MAX
        Units::try_from(demand).unwrap_or(total_units)
    }

    fn sweep(bids: &[Bid], reserve_price: Price, total_units: Units) -> RevenueTracker {
        let mut tracker = RevenueTracker::default();

        for index in 0..bids.len() {
            let candidate = candidate_price(bids, index, reserve_price);
            let demand = Self::demand(&bids[..=index], candidate, total_units);
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

impl PricingAlgorithm for ReferencePricer {
    fn name(&self) -> &'static str {
        "reference"
    }

    #[instrument(level = "debug", skip(self, bids), fields(bids = bids.len()))]
    fn price(
        &self,
        bids: &[Bid],
        reserve_price: Price,
        total_units: Units,
    ) -> Result<Price, PricingError> {
        let bids = eligible_bids(bids, reserve_price, total_units)?;
        let tracker = Self::sweep(bids, reserve_price, total_units);

        debug!(
            price = tracker.best_price(),
            revenue = tracker.best_revenue(),
            "reference price found"
        );
        Ok(tracker.best_price())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demand_stops_at_cap() {
        let pool = [Bid::new(50, 4), Bid::new(40, 4), Bid::new(30, 4)];
        assert_eq!(ReferencePricer::demand(&pool, 20, 100), 10 + 8 + 6);
        assert_eq!(ReferencePricer::demand(&pool, 20, 12), 12);
        assert_eq!(ReferencePricer::demand(&pool, 0, 7), 7);
    }

    #[test]
    fn full_clearance_stops_after_first_candidate() {
        // at 50 the top bid alone buys 20 units, more than the 10 on sale
        let bids = [Bid::new(100, 10), Bid::new(50, 1), Bid::new(1, 1000)];
        let tracker = ReferencePricer::sweep(&bids, 1, 10);
        assert_eq!(tracker.evaluated(), 1);
        assert_eq!(tracker.best_price(), 50);
    }

    #[test]
    fn short_supply_scans_every_candidate() {
        let bids = [Bid::new(100, 1), Bid::new(50, 1), Bid::new(20, 1)];
        let tracker = ReferencePricer::sweep(&bids, 1, 1_000);
        assert_eq!(tracker.evaluated(), 3);
    }

    #[test]
    fn ladder_of_single_unit_bids() {
        // 501 bids at 600, 599, ..., 100 for one unit each, 500 units on sale.
        let bids: Vec<Bid> = (0..=500).map(|i| Bid::new(600 - i, 1)).collect();
        let price = ReferencePricer.price(&bids, 100, 500).unwrap();
        // Below 300 the top bids buy two units each, pushing the optimum down to 234.
        assert_eq!(price, 234);
    }
}
