//! Revenue-maximizing uniform clearing price for sealed-bid multi-unit auctions.
//!
//! Two interchangeable [`PricingAlgorithm`]s: [`ReferencePricer`] rescans the
//! pool for every candidate price, [`IndexedPricer`] keeps it in an
//! [`AugmentedTreap`]. They return the same price for every valid input.

pub mod allocation;
pub mod benchmarks;
pub mod indexed;
pub mod interfaces;
pub mod reference;
pub mod treap;

pub use allocation::{allocate_units, settle, Settlement};
pub use indexed::IndexedPricer;
pub use interfaces::{Bid, Commitment, InvalidInput, Price, PricingAlgorithm, PricingError, Units};
pub use reference::ReferencePricer;
pub use treap::{AugmentedTreap, NodeId, TreapViolation};
