use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use storefront_core::{ExpectedVersion, OrderId, UserId};
use storefront_orders::{Order, OrderStatus};

/// Order store error.
#[derive(Debug, Error)]
pub enum OrderStoreError {
    #[error("order {0} already exists")]
    AlreadyExists(OrderId),

    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("order storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for [`Order`] aggregates.
///
/// Query results are ordered by `created_at`, then by order id.
pub trait OrderStore: Send + Sync {
    /// Store a new order. Fails with `AlreadyExists` if the id is taken.
    fn add(&self, order: Order) -> Result<(), OrderStoreError>;

    fn add_all(&self, orders: Vec<Order>) -> Result<(), OrderStoreError> {
        for order in orders {
            self.add(order)?;
        }
        Ok(())
    }

    fn get(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError>;

    fn contains(&self, order_id: &OrderId) -> Result<bool, OrderStoreError> {
        Ok(self.get(order_id)?.is_some())
    }

    /// Replace the stored order.
    ///
    /// `expected` is checked against the version currently stored. With no
    /// stored record the order is inserted when `expected` is `Any` and
    /// rejected with `NotFound` otherwise.
    fn update(&self, order: &Order, expected: ExpectedVersion) -> Result<(), OrderStoreError>;

    /// Orders created within `[from, to]`.
    fn find_by_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>, OrderStoreError>;

    fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, OrderStoreError>;

    fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, OrderStoreError>;

    fn find_by_user_and_period(
        &self,
        user_id: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>, OrderStoreError>;
}

impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    fn add(&self, order: Order) -> Result<(), OrderStoreError> {
        (**self).add(order)
    }

    fn add_all(&self, orders: Vec<Order>) -> Result<(), OrderStoreError> {
        (**self).add_all(orders)
    }

    fn get(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        (**self).get(order_id)
    }

    fn contains(&self, order_id: &OrderId) -> Result<bool, OrderStoreError> {
        (**self).contains(order_id)
    }

    fn update(&self, order: &Order, expected: ExpectedVersion) -> Result<(), OrderStoreError> {
        (**self).update(order, expected)
    }

    fn find_by_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>, OrderStoreError> {
        (**self).find_by_period(from, to)
    }

    fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, OrderStoreError> {
        (**self).find_by_status(status)
    }

    fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, OrderStoreError> {
        (**self).find_by_user(user_id)
    }

    fn find_by_user_and_period(
        &self,
        user_id: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>, OrderStoreError> {
        (**self).find_by_user_and_period(user_id, from, to)
    }
}
