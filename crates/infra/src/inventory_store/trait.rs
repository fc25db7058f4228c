use std::time::Duration;

use thiserror::Error;

use storefront_core::{DomainError, ProductId};
use storefront_inventory::InventoryItem;
use storefront_quantity::Quantity;

/// Inventory operation error.
///
/// These are **infrastructure errors** (missing records, contention, storage
/// faults) as opposed to business outcomes such as insufficient stock, which
/// the ledger never refuses on its own.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("no inventory item for product {0}")]
    NotFound(ProductId),

    #[error("inventory item for product {0} already exists")]
    AlreadyExists(ProductId),

    /// Another unit of work held the record for longer than the caller was
    /// willing to wait. Retrying may succeed.
    #[error("timed out after {waited:?} waiting for inventory item {product_id}")]
    LockTimeout {
        product_id: ProductId,
        waited: Duration,
    },

    #[error("product {0} is not claimed by this unit of work")]
    NotClaimed(ProductId),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("inventory storage unavailable: {0}")]
    Unavailable(String),
}

impl InventoryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, InventoryError::LockTimeout { .. })
    }
}

/// Keyed inventory ledger: product identifier → [`InventoryItem`].
///
/// ## Reads
///
/// `get` returns a snapshot of the last committed state. Reads are never
/// blocked by units of work and are not serialized with each other.
///
/// ## Writes
///
/// All mutation goes through a [`UnitOfWork`] obtained from `begin`, which
/// claims every requested record exclusively for its lifetime. Claims are
/// taken in product-identifier order so units with overlapping key sets
/// cannot deadlock, and waiting is bounded by the caller's timeout.
/// Units with disjoint key sets never wait on each other.
pub trait Inventory: Send + Sync {
    type UnitOfWork<'a>: UnitOfWork
    where
        Self: 'a;

    /// Committed snapshot of the item for `product_id`, if stocked.
    fn get(&self, product_id: &ProductId) -> Result<Option<InventoryItem>, InventoryError>;

    fn contains(&self, product_id: &ProductId) -> Result<bool, InventoryError> {
        Ok(self.get(product_id)?.is_some())
    }

    /// Stock a new item.
    fn add(&self, item: InventoryItem) -> Result<(), InventoryError>;

    /// Remove an item once no unit of work holds it.
    fn remove(
        &self,
        product_id: &ProductId,
        timeout: Duration,
    ) -> Result<InventoryItem, InventoryError>;

    /// Claim `keys` (any order, duplicates allowed) for exclusive mutation.
    ///
    /// Fails with `NotFound` if any key has no record and with `LockTimeout`
    /// if the claims could not all be taken within `timeout`; in both cases
    /// nothing stays claimed.
    fn begin(
        &self,
        keys: &[ProductId],
        timeout: Duration,
    ) -> Result<Self::UnitOfWork<'_>, InventoryError>;

    /// Add `quantity` to a stocked item in its own unit of work.
    fn restock(
        &self,
        product_id: &ProductId,
        quantity: &Quantity,
        timeout: Duration,
    ) -> Result<Quantity, InventoryError> {
        let mut unit = self.begin(core::slice::from_ref(product_id), timeout)?;
        let on_hand = unit.increase(product_id, quantity)?;
        unit.commit()?;
        Ok(on_hand)
    }
}

/// An atomic, isolated group of inventory writes.
///
/// Nothing written through a unit of work is visible to `Inventory::get`
/// until `commit`. Dropping a unit of work without committing rolls it back.
pub trait UnitOfWork {
    /// Claimed product identifiers, sorted and deduplicated.
    fn keys(&self) -> &[ProductId];

    /// On-hand quantity as seen inside this unit (including its own writes).
    fn on_hand(&self, product_id: &ProductId) -> Result<Quantity, InventoryError>;

    /// Subtract `quantity` and return the resulting on-hand quantity.
    ///
    /// No floor at zero: a negative result is stored and returned, and it is
    /// up to the caller to roll back.
    fn decrease(
        &mut self,
        product_id: &ProductId,
        quantity: &Quantity,
    ) -> Result<Quantity, InventoryError>;

    /// Add `quantity` and return the resulting on-hand quantity.
    fn increase(
        &mut self,
        product_id: &ProductId,
        quantity: &Quantity,
    ) -> Result<Quantity, InventoryError>;

    /// Publish every write and release the claims.
    fn commit(self) -> Result<(), InventoryError>;

    /// Discard every write and release the claims.
    fn rollback(self) -> Result<(), InventoryError>;
}
