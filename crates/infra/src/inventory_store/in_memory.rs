use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use storefront_core::ProductId;
use storefront_inventory::InventoryItem;
use storefront_quantity::Quantity;

use super::r#trait::{Inventory, InventoryError, UnitOfWork};

type UnitId = u64;

#[derive(Debug)]
struct SlotState {
    /// Last committed state; what readers see.
    committed: InventoryItem,
    /// Uncommitted state of the claiming unit, created on its first write.
    working: Option<InventoryItem>,
    holder: Option<UnitId>,
    removed: bool,
}

/// One inventory record plus its claim.
#[derive(Debug)]
struct Slot {
    state: Mutex<SlotState>,
    released: Condvar,
}

impl Slot {
    fn new(item: InventoryItem) -> Self {
        Self {
            state: Mutex::new(SlotState {
                committed: item,
                working: None,
                holder: None,
                removed: false,
            }),
            released: Condvar::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SlotState>, InventoryError> {
        self.state
            .lock()
            .map_err(|_| InventoryError::Unavailable("lock poisoned".to_string()))
    }

    /// Wait until the slot is free (or `deadline` passes) and claim it.
    fn claim(
        &self,
        product_id: ProductId,
        unit: UnitId,
        started: Instant,
        deadline: Option<Instant>,
    ) -> Result<(), InventoryError> {
        let guard = self.lock()?;
        let remaining = deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::MAX);
        let (mut state, _) = self
            .released
            .wait_timeout_while(guard, remaining, |s| s.holder.is_some() && !s.removed)
            .map_err(|_| InventoryError::Unavailable("lock poisoned".to_string()))?;

        if state.removed {
            return Err(InventoryError::NotFound(product_id));
        }
        if state.holder.is_some() {
            return Err(InventoryError::LockTimeout {
                product_id,
                waited: started.elapsed(),
            });
        }
        state.holder = Some(unit);
        Ok(())
    }

    /// Drop the claim of `unit`, publishing its writes if `publish` is set.
    ///
    /// Recovers from poisoning: a stranded claim would block every later unit.
    fn release(&self, unit: UnitId, publish: bool) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.holder != Some(unit) {
            return;
        }
        if let Some(working) = state.working.take() {
            if publish {
                state.committed = working;
            }
        }
        state.holder = None;
        drop(state);
        self.released.notify_all();
    }
}

/// In-memory inventory ledger.
///
/// Each product has its own slot (mutex + condition variable), so units of
/// work over disjoint products proceed in parallel while units sharing a
/// product queue up on that product's slot. The outer map lock is only held
/// to look slots up, never while waiting for a claim.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    slots: RwLock<HashMap<ProductId, Arc<Slot>>>,
    next_unit: AtomicU64,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from already stocked items.
    pub fn with_items(items: impl IntoIterator<Item = InventoryItem>) -> Result<Self, InventoryError> {
        let inventory = Self::new();
        for item in items {
            inventory.add(item)?;
        }
        Ok(inventory)
    }

    pub fn len(&self) -> usize {
        self.slots.read().map(|slots| slots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, product_id: &ProductId) -> Result<Option<Arc<Slot>>, InventoryError> {
        let slots = self
            .slots
            .read()
            .map_err(|_| InventoryError::Unavailable("lock poisoned".to_string()))?;
        Ok(slots.get(product_id).cloned())
    }
}

impl Inventory for InMemoryInventory {
    type UnitOfWork<'a> = InMemoryUnitOfWork<'a>;

    fn get(&self, product_id: &ProductId) -> Result<Option<InventoryItem>, InventoryError> {
        let Some(slot) = self.slot(product_id)? else {
            return Ok(None);
        };
        let state = slot.lock()?;
        if state.removed {
            return Ok(None);
        }
        Ok(Some(state.committed.clone()))
    }

    fn add(&self, item: InventoryItem) -> Result<(), InventoryError> {
        let product_id = item.product_id();
        let mut slots = self
            .slots
            .write()
            .map_err(|_| InventoryError::Unavailable("lock poisoned".to_string()))?;

        if slots.contains_key(&product_id) {
            return Err(InventoryError::AlreadyExists(product_id));
        }
        slots.insert(product_id, Arc::new(Slot::new(item)));
        tracing::debug!(%product_id, "inventory item stocked");
        Ok(())
    }

    fn remove(
        &self,
        product_id: &ProductId,
        timeout: Duration,
    ) -> Result<InventoryItem, InventoryError> {
        let unit = self.begin(core::slice::from_ref(product_id), timeout)?;
        let slot = unit.slot(product_id)?.clone();

        {
            let mut slots = self
                .slots
                .write()
                .map_err(|_| InventoryError::Unavailable("lock poisoned".to_string()))?;
            slots.remove(product_id);
        }

        let item = {
            let mut state = slot.lock()?;
            state.removed = true;
            state.committed.clone()
        };
        // Waiters wake up, see `removed` and report NotFound.
        unit.commit()?;
        tracing::debug!(%product_id, "inventory item removed");
        Ok(item)
    }

    fn begin(
        &self,
        keys: &[ProductId],
        timeout: Duration,
    ) -> Result<Self::UnitOfWork<'_>, InventoryError> {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let mut slots = Vec::with_capacity(keys.len());
        for product_id in &keys {
            let slot = self
                .slot(product_id)?
                .ok_or(InventoryError::NotFound(*product_id))?;
            slots.push(slot);
        }

        let unit = self.next_unit.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();
        let deadline = started.checked_add(timeout);

        // Claims in identifier order; on failure release what we hold.
        for (idx, (product_id, slot)) in keys.iter().zip(&slots).enumerate() {
            if let Err(err) = slot.claim(*product_id, unit, started, deadline) {
                for held in &slots[..idx] {
                    held.release(unit, false);
                }
                if err.is_retryable() {
                    tracing::warn!(%product_id, unit, ?timeout, "inventory claim timed out");
                }
                return Err(err);
            }
        }

        tracing::trace!(unit, keys = keys.len(), "unit of work started");
        Ok(InMemoryUnitOfWork {
            unit,
            keys,
            slots,
            finished: false,
            _inventory: PhantomData,
        })
    }
}

/// Unit of work over claimed [`InMemoryInventory`] slots.
///
/// Rolls back on drop unless committed.
#[derive(Debug)]
pub struct InMemoryUnitOfWork<'a> {
    unit: UnitId,
    keys: Vec<ProductId>,
    /// Parallel to `keys`.
    slots: Vec<Arc<Slot>>,
    finished: bool,
    _inventory: PhantomData<&'a InMemoryInventory>,
}

impl InMemoryUnitOfWork<'_> {
    fn slot(&self, product_id: &ProductId) -> Result<&Arc<Slot>, InventoryError> {
        self.keys
            .binary_search(product_id)
            .map(|idx| &self.slots[idx])
            .map_err(|_| InventoryError::NotClaimed(*product_id))
    }

    fn modify(
        &mut self,
        product_id: &ProductId,
        change: impl FnOnce(&mut InventoryItem) -> Result<(), InventoryError>,
    ) -> Result<Quantity, InventoryError> {
        let slot = self.slot(product_id)?;
        let mut state = slot.lock()?;
        if state.holder != Some(self.unit) {
            return Err(InventoryError::NotClaimed(*product_id));
        }

        let mut working = match state.working.take() {
            Some(item) => item,
            None => state.committed.clone(),
        };
        let outcome = change(&mut working);
        let on_hand = working.quantity().clone();
        state.working = Some(working);
        outcome.map(|()| on_hand)
    }

    fn finish(&mut self, publish: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        for slot in &self.slots {
            slot.release(self.unit, publish);
        }
        tracing::trace!(unit = self.unit, committed = publish, "unit of work finished");
    }
}

impl UnitOfWork for InMemoryUnitOfWork<'_> {
    fn keys(&self) -> &[ProductId] {
        &self.keys
    }

    fn on_hand(&self, product_id: &ProductId) -> Result<Quantity, InventoryError> {
        let slot = self.slot(product_id)?;
        let state = slot.lock()?;
        let item = state.working.as_ref().unwrap_or(&state.committed);
        Ok(item.quantity().clone())
    }

    fn decrease(
        &mut self,
        product_id: &ProductId,
        quantity: &Quantity,
    ) -> Result<Quantity, InventoryError> {
        self.modify(product_id, |item| Ok(item.decrease_quantity(quantity)?))
    }

    fn increase(
        &mut self,
        product_id: &ProductId,
        quantity: &Quantity,
    ) -> Result<Quantity, InventoryError> {
        self.modify(product_id, |item| Ok(item.increase_quantity(quantity)?))
    }

    fn commit(mut self) -> Result<(), InventoryError> {
        self.finish(true);
        Ok(())
    }

    fn rollback(mut self) -> Result<(), InventoryError> {
        self.finish(false);
        Ok(())
    }
}

impl Drop for InMemoryUnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(unit = self.unit, "unit of work dropped without commit; rolling back");
            self.finish(false);
        }
    }
}
