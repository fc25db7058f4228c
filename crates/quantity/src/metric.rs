use serde::{Deserialize, Serialize};

use storefront_core::ValueObject;

/// Unit of measure.
///
/// Two metrics are compatible only if they are equal in every field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metric {
    name: String,
    symbol: String,
    description: String,
}

impl ValueObject for Metric {}

impl Metric {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            description: description.into(),
        }
    }

    /// Countable pieces.
    pub fn units() -> Self {
        Self::new("Units", "pcs", "countable pieces")
    }

    pub fn kilogram() -> Self {
        Self::new("Kilogram", "kg", "SI unit of mass")
    }

    pub fn liter() -> Self {
        Self::new("Liter", "l", "metric unit of volume")
    }

    pub fn meter() -> Self {
        Self::new("Meter", "m", "SI unit of length")
    }

    pub fn square_meter() -> Self {
        Self::new("Square Meter", "m²", "SI unit of area")
    }

    pub fn cubic_meter() -> Self {
        Self::new("Cubic Meter", "m³", "SI unit of volume")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl core::fmt::Display for Metric {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.symbol)
    }
}
