use core::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult, ValueObject};

use crate::metric::Metric;
use crate::rounding::RoundingStrategy;

/// An amount measured in a [`Metric`], normalized by a [`RoundingStrategy`].
///
/// Quantities are immutable; arithmetic returns a new value. Binary
/// operations require both sides to share the same metric and keep the left
/// operand's rounding strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quantity {
    amount: Decimal,
    metric: Metric,
    rounding: RoundingStrategy,
}

impl ValueObject for Quantity {}

impl Quantity {
    pub fn new(amount: Decimal, metric: Metric, rounding: RoundingStrategy) -> Self {
        Self {
            amount: rounding.round(amount),
            metric,
            rounding,
        }
    }

    /// Whole countable pieces.
    pub fn units(count: i64) -> Self {
        Self::new(
            Decimal::from(count),
            Metric::units(),
            RoundingStrategy::ROUND_ONE,
        )
    }

    /// A measured amount with three decimal places.
    pub fn measured(amount: Decimal, metric: Metric) -> Self {
        Self::new(amount, metric, RoundingStrategy::MEASURED)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    pub fn rounding(&self) -> RoundingStrategy {
        self.rounding
    }

    pub fn is_compatible_with(&self, other: &Quantity) -> bool {
        self.metric == other.metric
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    /// Zero in this quantity's metric and rounding.
    pub fn zero_like(&self) -> Quantity {
        self.with_amount(Decimal::ZERO)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(&self, other: &Quantity) -> DomainResult<Quantity> {
        self.ensure_compatible(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| DomainError::validation("quantity overflow"))?;
        Ok(self.with_amount(amount))
    }

    pub fn subtract(&self, other: &Quantity) -> DomainResult<Quantity> {
        self.ensure_compatible(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or_else(|| DomainError::validation("quantity overflow"))?;
        Ok(self.with_amount(amount))
    }

    pub fn negate(&self) -> Quantity {
        self.with_amount(-self.amount)
    }

    pub fn multiply_by(&self, factor: Decimal) -> DomainResult<Quantity> {
        let amount = self
            .amount
            .checked_mul(factor)
            .ok_or_else(|| DomainError::validation("quantity overflow"))?;
        Ok(self.with_amount(amount))
    }

    /// Metric-checked ordering.
    pub fn compare(&self, other: &Quantity) -> DomainResult<Ordering> {
        self.ensure_compatible(other)?;
        Ok(self.amount.cmp(&other.amount))
    }

    fn with_amount(&self, amount: Decimal) -> Quantity {
        Quantity::new(amount, self.metric.clone(), self.rounding)
    }

    fn ensure_compatible(&self, other: &Quantity) -> DomainResult<()> {
        if self.is_compatible_with(other) {
            Ok(())
        } else {
            Err(DomainError::incompatible_metric(
                self.metric.name(),
                other.metric.name(),
            ))
        }
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.amount, self.metric)
    }
}
