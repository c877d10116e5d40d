// ============================================================================
// CLEARING PRICE CONTRACT
// ============================================================================
// Every pricing algorithm implements `PricingAlgorithm` and must agree with
// every other one on the same input.

use serde::Serialize;
use thiserror::Error;

/// Price per unit, in the smallest currency unit
pub type Price = u32;

/// Quantity of auctioned units
pub type Units = u16;

/// Total spend a bid commits to: `unit_price * min_units`
pub type Commitment = u64;

/// A sealed bid: pay up to `unit_price` per unit, for no fewer than `min_units`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Bid {
    pub unit_price: Price,
    pub min_units: Units,
}

impl Bid {
    pub const fn new(unit_price: Price, min_units: Units) -> Self {
        Bid {
            unit_price,
            min_units,
        }
    }

    /// `u32 * u16` always fits in a `u64`, so this never overflows.
    #[inline(always)]
    pub fn commitment(&self) -> Commitment {
        Commitment::from(self.unit_price) * Commitment::from(self.min_units)
    }
}

/// Why a bid list was rejected before pricing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidInput {
    #[error("total units must be positive")]
    ZeroSupply,

    #[error("bid {index} has unit price {current}, above the previous bid's {previous}")]
    Unsorted {
        index: usize,
        previous: Price,
        current: Price,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PricingError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInput),
}

/// The contract shared by every clearing-price algorithm
pub trait PricingAlgorithm {
    /// Short name used by the benchmark report
    fn name(&self) -> &'static str;

    /// Revenue-maximizing uniform price for `bids`.
    ///
    /// `bids` must be sorted by descending `unit_price`. Bids priced below
    /// `reserve_price` never win and are ignored. Returns 0 when no price
    /// produces positive revenue.
    fn price(
        &self,
        bids: &[Bid],
        reserve_price: Price,
        total_units: Units,
    ) -> Result<Price, PricingError>;
}

/// Checks the preconditions and returns the prefix of bids that can win
/// at or above the reserve.
pub fn eligible_bids(
    bids: &[Bid],
    reserve_price: Price,
    total_units: Units,
) -> Result<&[Bid], InvalidInput> {
    if total_units == 0 {
        return Err(InvalidInput::ZeroSupply);
    }
    for (index, pair) in bids.windows(2).enumerate() {
        if pair[1].unit_price > pair[0].unit_price {
            return Err(InvalidInput::Unsorted {
                index: index + 1,
                previous: pair[0].unit_price,
                current: pair[1].unit_price,
            });
        }
    }
    // Sorted descending, so the losers form a suffix.
    let eligible = bids.partition_point(|bid| bid.unit_price >= reserve_price);
    Ok(&bids[..eligible])
}

/// Clearing price evaluated after bid `index` joins the pool: the next bid's
/// price, or the reserve once the list is exhausted.
#[inline(always)]
pub fn candidate_price(bids: &[Bid], index: usize, reserve_price: Price) -> Price {
    match bids.get(index + 1) {
        Some(next) => next.unit_price,
        None => reserve_price,
    }
}

/// Whole units a commitment buys at `price`. A free unit is unbounded demand
/// for any positive commitment.
#[inline(always)]
pub fn units_at(value: Commitment, price: Price) -> u64 {
    match price {
        0 if value > 0 => u64::MAX,
        0 => 0,
        p => value / u64::from(p),
    }
}

/// Best (revenue, price) seen so far during a descending price sweep.
/// Ties keep the earlier, higher price.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RevenueTracker {
    best_revenue: u64,
    best_price: Price,
    evaluated: usize,
}

impl RevenueTracker {
    #[inline(always)]
    pub fn observe(&mut self, price: Price, demand: Units) {
        self.evaluated += 1;
        let revenue = u64::from(price) * u64::from(demand);
        if revenue > self.best_revenue {
            self.best_revenue = revenue;
            self.best_price = price;
        }
    }

    pub fn best_price(&self) -> Price {
        self.best_price
    }

    pub fn best_revenue(&self) -> u64 {
        self.best_revenue
    }

    /// Candidate prices observed so far
    pub fn evaluated(&self) -> usize {
        self.evaluated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commitment_is_lossless_at_the_bounds() {
        let bid = Bid::new(Price::MAX, Units::MAX);
        assert_eq!(bid.commitment(), 4_294_967_295 * 65_535);
    }

    #[test]
    fn rejects_zero_supply() {
        let bids = [Bid::new(10, 1)];
        assert_eq!(eligible_bids(&bids, 1, 0), Err(InvalidInput::ZeroSupply));
    }

    #[test]
    fn rejects_ascending_step() {
        let bids = [Bid::new(10, 1), Bid::new(9, 1), Bid::new(12, 1)];
        assert_eq!(
            eligible_bids(&bids, 1, 5),
            Err(InvalidInput::Unsorted {
                index: 2,
                previous: 9,
                current: 12
            })
        );
    }

    #[test]
    fn accepts_equal_prices() {
        let bids = [Bid::new(10, 1), Bid::new(10, 2), Bid::new(7, 1)];
        assert_eq!(eligible_bids(&bids, 1, 5).unwrap().len(), 3);
    }

    #[test]
    fn drops_bids_below_reserve() {
        let bids = [Bid::new(30, 1), Bid::new(20, 1), Bid::new(19, 4), Bid::new(5, 9)];
        assert_eq!(eligible_bids(&bids, 20, 5).unwrap(), &bids[..2]);
        assert!(eligible_bids(&bids, 31, 5).unwrap().is_empty());
    }

    #[test]
    fn candidate_falls_back_to_reserve() {
        let bids = [Bid::new(30, 1), Bid::new(20, 1)];
        assert_eq!(candidate_price(&bids, 0, 7), 20);
        assert_eq!(candidate_price(&bids, 1, 7), 7);
    }

    #[test]
    fn units_at_zero_price() {
        assert_eq!(units_at(0, 0), 0);
        assert_eq!(units_at(1, 0), u64::MAX);
        assert_eq!(units_at(99, 10), 9);
    }

    #[test]
    fn tracker_keeps_first_maximum() {
        let mut tracker = RevenueTracker::default();
        tracker.observe(10, 6);
        tracker.observe(6, 10);
        tracker.observe(5, 11);
        assert_eq!(tracker.best_price(), 10);
        assert_eq!(tracker.best_revenue(), 60);
        assert_eq!(tracker.evaluated(), 3);
    }
}
