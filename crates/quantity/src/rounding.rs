use rust_decimal::Decimal;
use rust_decimal::RoundingStrategy as DecimalRounding;
use serde::{Deserialize, Serialize};

use storefront_core::ValueObject;

/// How an amount is rounded to the strategy's decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Round to nearest; ties away from zero.
    HalfUp,
    /// Round to nearest; ties to the even neighbour (banker's rounding).
    HalfEven,
    /// Towards zero.
    Down,
    /// Away from zero.
    Up,
    /// Towards negative infinity.
    Floor,
    /// Towards positive infinity.
    Ceiling,
}

impl RoundingMode {
    fn as_decimal_strategy(self) -> DecimalRounding {
        match self {
            RoundingMode::HalfUp => DecimalRounding::MidpointAwayFromZero,
            RoundingMode::HalfEven => DecimalRounding::MidpointNearestEven,
            RoundingMode::Down => DecimalRounding::ToZero,
            RoundingMode::Up => DecimalRounding::AwayFromZero,
            RoundingMode::Floor => DecimalRounding::ToNegativeInfinity,
            RoundingMode::Ceiling => DecimalRounding::ToPositiveInfinity,
        }
    }
}

/// Rounding policy attached to a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoundingStrategy {
    decimal_places: u32,
    mode: RoundingMode,
}

impl ValueObject for RoundingStrategy {}

impl RoundingStrategy {
    /// Whole numbers only, half-up.
    pub const ROUND_ONE: RoundingStrategy = RoundingStrategy::new(0, RoundingMode::HalfUp);

    /// Two decimal places, banker's rounding.
    pub const MONETARY: RoundingStrategy = RoundingStrategy::new(2, RoundingMode::HalfEven);

    /// Three decimal places, half-up (grams of a kilogram, millilitres of a litre).
    pub const MEASURED: RoundingStrategy = RoundingStrategy::new(3, RoundingMode::HalfUp);

    pub const fn new(decimal_places: u32, mode: RoundingMode) -> Self {
        Self {
            decimal_places,
            mode,
        }
    }

    pub fn decimal_places(&self) -> u32 {
        self.decimal_places
    }

    pub fn mode(&self) -> RoundingMode {
        self.mode
    }

    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.decimal_places, self.mode.as_decimal_strategy())
    }
}
