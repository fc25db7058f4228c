use serde::{Deserialize, Serialize};

use storefront_core::{AggregateRoot, DomainResult, ProductId};
use storefront_quantity::Quantity;

/// Aggregate root: InventoryItem.
///
/// Holds the on-hand quantity of one product. The item itself never refuses
/// a decrement that leaves it negative; callers decide whether a negative
/// result is acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    product_id: ProductId,
    quantity: Quantity,
    version: u64,
}

impl InventoryItem {
    pub fn new(product_id: ProductId, quantity: Quantity) -> Self {
        Self {
            product_id,
            quantity,
            version: 0,
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    /// Current on-hand quantity.
    pub fn quantity(&self) -> &Quantity {
        &self.quantity
    }

    /// Subtract `quantity` from the on-hand amount and store the result.
    ///
    /// Fails only if the metrics differ; the stored value is unchanged then.
    pub fn decrease_quantity(&mut self, quantity: &Quantity) -> DomainResult<()> {
        self.quantity = self.quantity.subtract(quantity)?;
        self.version += 1;
        Ok(())
    }

    /// Add `quantity` to the on-hand amount (re-stocking).
    pub fn increase_quantity(&mut self, quantity: &Quantity) -> DomainResult<()> {
        self.quantity = self.quantity.add(quantity)?;
        self.version += 1;
        Ok(())
    }
}

impl AggregateRoot for InventoryItem {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.product_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
