//! Measured quantities (value objects).
//!
//! A [`Quantity`] is an amount expressed in a [`Metric`] and normalized by a
//! [`RoundingStrategy`]. Quantities are the currency of the inventory: stock
//! on hand and requested order amounts are both quantities, and all
//! arithmetic between them is metric-checked.

pub mod metric;
pub mod quantity;
pub mod rounding;

pub use metric::Metric;
pub use quantity::Quantity;
pub use rounding::{RoundingMode, RoundingStrategy};
