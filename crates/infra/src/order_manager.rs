//! Order completion workflow.
//!
//! `OrderManager` completes an order against the shared inventory ledger as
//! one atomic step: either every line is taken out of stock and the order is
//! stored as completed, or nothing observable changes.
//!
//! ## Completion flow
//!
//! ```text
//! Order
//!   ↓
//! 1. Preconditions (completable status, at least one line, positive quantities)
//!   ↓
//! 2. Validate every line against committed inventory snapshots (read-only)
//!   ↓  any shortfall → FAILED (Unsatisfiable), nothing touched
//! 3. Claim the order's products in a unit of work (bounded wait)
//!   ↓  timeout → FAILED (LockTimeout)
//! 4. Decrement each line, re-checking non-negativity
//!   ↓  negative → rollback → FAILED (Conflict)
//! 5. Store the completed order (insert, or versioned update), then commit the unit of work
//!   ↓
//! SUCCESSFUL
//! ```
//!
//! Business outcomes (shortfalls, conflicts, timeouts) are reported in the
//! returned [`CompletionResult`]. Only precondition violations and faults of
//! the collaborators surface as [`CompletionError`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{DateTime, Utc};
use thiserror::Error;

use storefront_core::{AggregateRoot, DomainError, ExpectedVersion, OrderId, ProductId, UserId};
use storefront_inventory::InventoryItem;
use storefront_orders::{
    CompletionResult, FailureReason, LineShortfall, Order, OrderLine, OrderStatus, ShortfallCause,
};
use storefront_quantity::Quantity;

use crate::config::CompletionConfig;
use crate::inventory_store::{Inventory, InventoryError, UnitOfWork};
use crate::order_store::{OrderStore, OrderStoreError};

#[derive(Debug, Error)]
pub enum CompletionError {
    /// The order is not in a shape that can be completed at all.
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Store(#[from] OrderStoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Completes orders against an [`Inventory`] and persists them in an
/// [`OrderStore`].
///
/// Holds no per-order state, so a single manager can be shared across threads
/// (e.g. behind an `Arc`) and used for many concurrent completions.
#[derive(Debug)]
pub struct OrderManager<I, S> {
    inventory: I,
    orders: S,
    config: CompletionConfig,
}

impl<I, S> OrderManager<I, S>
where
    I: Inventory,
    S: OrderStore,
{
    pub fn new(inventory: I, orders: S, config: CompletionConfig) -> Self {
        Self {
            inventory,
            orders,
            config,
        }
    }

    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    pub fn orders(&self) -> &S {
        &self.orders
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    pub fn into_parts(self) -> (I, S) {
        (self.inventory, self.orders)
    }

    pub fn add(&self, order: Order) -> Result<(), CompletionError> {
        Ok(self.orders.add(order)?)
    }

    pub fn add_all(&self, orders: Vec<Order>) -> Result<(), CompletionError> {
        Ok(self.orders.add_all(orders)?)
    }

    pub fn get(&self, order_id: &OrderId) -> Result<Option<Order>, CompletionError> {
        Ok(self.orders.get(order_id)?)
    }

    pub fn contains(&self, order_id: &OrderId) -> Result<bool, CompletionError> {
        Ok(self.orders.contains(order_id)?)
    }

    pub fn update(&self, order: &Order, expected: ExpectedVersion) -> Result<(), CompletionError> {
        Ok(self.orders.update(order, expected)?)
    }

    pub fn find_by_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>, CompletionError> {
        Ok(self.orders.find_by_period(from, to)?)
    }

    pub fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, CompletionError> {
        Ok(self.orders.find_by_status(status)?)
    }

    pub fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, CompletionError> {
        Ok(self.orders.find_by_user(user_id)?)
    }

    pub fn find_by_user_and_period(
        &self,
        user_id: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>, CompletionError> {
        Ok(self.orders.find_by_user_and_period(user_id, from, to)?)
    }

    /// Cancel an open or paid order and persist the change.
    ///
    /// Inventory is not touched; cancelled orders never took any stock.
    pub fn cancel_order(&self, order: &mut Order) -> Result<(), CompletionError> {
        let mut cancelled = order.clone();
        cancelled.cancel()?;
        self.orders
            .update(&cancelled, ExpectedVersion::Exact(order.version()))?;
        *order = cancelled;
        Ok(())
    }

    /// Classify every line of `order` against committed inventory without
    /// mutating anything. Returns the unsatisfiable lines in line order.
    pub fn validate(&self, order: &Order) -> Result<Vec<LineShortfall>, CompletionError> {
        check_preconditions(order)?;
        self.classify(order)
    }

    /// Complete `order`, taking its lines out of stock atomically.
    ///
    /// The order need not have been added to the store first: a stored order
    /// is updated against its version, an unknown one is inserted.
    ///
    /// On `SUCCESSFUL` the order has been stored as completed and `order` is
    /// updated in place. On `FAILED` (or an error) neither the inventory nor
    /// `order` has changed, with one exception: the completed order is stored
    /// before the inventory commit, so if that commit fails the store already
    /// holds the order as completed while no stock was taken. The error is
    /// returned as [`CompletionError::Inventory`].
    pub fn complete_order(&self, order: &mut Order) -> Result<CompletionResult, CompletionError> {
        let span = tracing::info_span!(
            "complete_order",
            order_id = %order.id_typed(),
            lines = order.number_of_line_items()
        );
        let _enter = span.enter();

        check_preconditions(order)?;

        let shortfalls = self.classify(order)?;
        if !shortfalls.is_empty() {
            for s in &shortfalls {
                tracing::debug!(
                    line_no = s.line_no,
                    product_id = %s.product_id,
                    cause = ?s.cause,
                    "line unsatisfiable"
                );
            }
            tracing::warn!(unsatisfiable = shortfalls.len(), "order not completed");
            return Ok(CompletionResult::failed(FailureReason::Unsatisfiable {
                lines: shortfalls,
            }));
        }

        let keys: Vec<ProductId> = order.lines().iter().map(OrderLine::product_id).collect();
        let mut unit = match self.inventory.begin(&keys, self.config.lock_timeout()) {
            Ok(unit) => unit,
            Err(InventoryError::LockTimeout { product_id, waited }) => {
                tracing::warn!(%product_id, ?waited, "inventory busy; order not completed");
                return Ok(CompletionResult::failed(FailureReason::LockTimeout));
            }
            Err(InventoryError::NotFound(product_id)) => {
                tracing::warn!(%product_id, "inventory record removed during completion");
                let lines = order
                    .lines()
                    .iter()
                    .filter(|line| line.product_id() == product_id)
                    .map(|line| shortfall(line, None, ShortfallCause::MissingInventory))
                    .collect();
                return Ok(CompletionResult::failed(FailureReason::Unsatisfiable { lines }));
            }
            Err(e) => return Err(e.into()),
        };

        for line in order.lines() {
            let product_id = line.product_id();
            let on_hand = match unit.decrease(&product_id, line.quantity()) {
                Ok(on_hand) => on_hand,
                Err(InventoryError::Domain(DomainError::IncompatibleMetric { .. })) => {
                    let on_hand = unit.on_hand(&product_id).ok();
                    abandon(unit);
                    tracing::warn!(%product_id, "inventory metric changed during completion");
                    return Ok(CompletionResult::failed(FailureReason::Unsatisfiable {
                        lines: vec![shortfall(line, on_hand, ShortfallCause::IncompatibleMetric)],
                    }));
                }
                Err(e) => {
                    abandon(unit);
                    return Err(e.into());
                }
            };

            if on_hand.is_negative() {
                abandon(unit);
                tracing::warn!(%product_id, "stock taken concurrently; rolled back");
                return Ok(CompletionResult::failed(FailureReason::Conflict { product_id }));
            }
        }

        let mut completed = order.clone();
        if let Err(e) = completed.complete() {
            abandon(unit);
            return Err(e.into());
        }
        // Merge: an order never stored before is inserted. The lookup runs
        // under the claims, and every copy of one order claims the same keys.
        let expected = match self.orders.contains(&order.id_typed()) {
            Ok(true) => ExpectedVersion::Exact(order.version()),
            Ok(false) => ExpectedVersion::Any,
            Err(e) => {
                abandon(unit);
                return Err(e.into());
            }
        };
        if let Err(e) = self.orders.update(&completed, expected) {
            abandon(unit);
            tracing::warn!(error = %e, "failed to store completed order; rolled back");
            return Err(e.into());
        }

        if let Err(e) = unit.commit() {
            // The order is already stored as completed; nothing left to undo here.
            tracing::error!(error = %e, "inventory commit failed after order was stored");
            return Err(e.into());
        }

        *order = completed;
        tracing::info!("order completed");
        Ok(CompletionResult::successful())
    }

    /// Validation pass: every line is classified, there is no early exit.
    ///
    /// Lines of the same product are checked against their summed demand;
    /// a line that does not fit adds nothing to that demand.
    fn classify(&self, order: &Order) -> Result<Vec<LineShortfall>, CompletionError> {
        let mut snapshots: HashMap<ProductId, Option<InventoryItem>> = HashMap::new();
        let mut demand: HashMap<ProductId, Quantity> = HashMap::new();
        let mut shortfalls = Vec::new();

        for line in order.lines() {
            let product_id = line.product_id();
            let snapshot = match snapshots.entry(product_id) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => e.insert(self.inventory.get(&product_id)?),
            };

            let Some(item) = snapshot else {
                shortfalls.push(shortfall(line, None, ShortfallCause::MissingInventory));
                continue;
            };
            let on_hand = item.quantity();

            if !line.quantity().is_compatible_with(on_hand) {
                shortfalls.push(shortfall(
                    line,
                    Some(on_hand.clone()),
                    ShortfallCause::IncompatibleMetric,
                ));
                continue;
            }

            let needed = match demand.get(&product_id) {
                Some(previous) => previous.add(line.quantity())?,
                None => line.quantity().clone(),
            };
            if needed.compare(on_hand)? == Ordering::Greater {
                shortfalls.push(shortfall(
                    line,
                    Some(on_hand.clone()),
                    ShortfallCause::InsufficientStock,
                ));
                continue;
            }
            demand.insert(product_id, needed);
        }

        Ok(shortfalls)
    }
}

fn check_preconditions(order: &Order) -> Result<(), CompletionError> {
    let order_id = order.id_typed();

    if !order.is_completable() {
        return Err(CompletionError::Precondition(format!(
            "order {order_id} is {:?} and cannot be completed",
            order.status()
        )));
    }
    if order.lines().is_empty() {
        return Err(CompletionError::Precondition(format!(
            "order {order_id} has no lines"
        )));
    }
    if let Some(line) = order.lines().iter().find(|l| !l.quantity().is_positive()) {
        return Err(CompletionError::Precondition(format!(
            "order {order_id} line {} requests non-positive quantity {}",
            line.line_no(),
            line.quantity()
        )));
    }
    Ok(())
}

fn shortfall(line: &OrderLine, on_hand: Option<Quantity>, cause: ShortfallCause) -> LineShortfall {
    LineShortfall {
        line_no: line.line_no(),
        product_id: line.product_id(),
        requested: line.quantity().clone(),
        on_hand,
        cause,
    }
}

fn abandon<U: UnitOfWork>(unit: U) {
    if let Err(e) = unit.rollback() {
        tracing::error!(error = %e, "inventory rollback failed");
    }
}
