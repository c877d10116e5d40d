use crate::interfaces::{eligible_bids, units_at, Bid, Price, PricingAlgorithm, PricingError, Units};
use serde::Serialize;
use tracing::{debug, instrument};

/// Outcome of an auction once the clearing price is known
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settlement {
    pub price: Price,
    pub units_sold: Units,
    pub revenue: u64,
    /// Units awarded to each bid, in input order
    pub allocation: Vec<Units>,
}

/// Hands out `total_units` at `clearing_price` in bid order: each bid takes
/// what its commitment buys, the last winner takes whatever is left.
///
/// A clearing price of 0 means nothing was sold.
pub fn allocate_units(bids: &[Bid], clearing_price: Price, total_units: Units) -> Vec<Units> {
    let mut allocation = vec![0; bids.len()];
    if clearing_price == 0 {
        return allocation;
    }

    let mut remaining = total_units;
    for (slot, bid) in allocation.iter_mut().zip(bids) {
        if remaining == 0 {
            break;
        }
        let affordable = units_at(bid.commitment(), clearing_price);
        let awarded = Units::try_from(affordable).unwrap_or(Units::MAX).min(remaining);
        *slot = awarded;
        remaining -= awarded;
    }
    allocation
}

/// Prices the auction with `pricer` and allocates the supply at that price.
/// Bids below the reserve are not eligible and receive nothing.
#[instrument(level = "debug", skip_all, fields(pricer = pricer.name(), bids = bids.len()))]
pub fn settle<P: PricingAlgorithm + ?Sized>(
    pricer: &P,
    bids: &[Bid],
    reserve_price: Price,
    total_units: Units,
) -> Result<Settlement, PricingError> {
    let price = pricer.price(bids, reserve_price, total_units)?;
    let eligible = eligible_bids(bids, reserve_price, total_units)?;

    let mut allocation = allocate_units(eligible, price, total_units);
    allocation.resize(bids.len(), 0);

    let units_sold: Units = allocation.iter().sum();
    let revenue = u64::from(price) * u64::from(units_sold);
    debug!(price, units_sold, revenue, "auction settled");

    Ok(Settlement {
        price,
        units_sold,
        revenue,
        allocation,
    })
}
