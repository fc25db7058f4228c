use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use storefront_core::{AggregateRoot, ExpectedVersion, OrderId, UserId};
use storefront_orders::{Order, OrderStatus};

use super::r#trait::{OrderStore, OrderStoreError};

/// In-memory order store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    inner: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<OrderId, Order>>, OrderStoreError> {
        self.inner
            .read()
            .map_err(|_| OrderStoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<OrderId, Order>>, OrderStoreError> {
        self.inner
            .write()
            .map_err(|_| OrderStoreError::Unavailable("lock poisoned".to_string()))
    }

    fn select(&self, keep: impl Fn(&Order) -> bool) -> Result<Vec<Order>, OrderStoreError> {
        let map = self.read()?;
        let mut out: Vec<Order> = map.values().filter(|o| keep(o)).cloned().collect();
        out.sort_by_key(|o| (o.created_at(), o.id_typed()));
        Ok(out)
    }
}

fn check_period(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<(), OrderStoreError> {
    if from > to {
        return Err(OrderStoreError::InvalidQuery(format!(
            "period start {from} is after its end {to}"
        )));
    }
    Ok(())
}

impl OrderStore for InMemoryOrderStore {
    fn add(&self, order: Order) -> Result<(), OrderStoreError> {
        let mut map = self.write()?;
        let id = order.id_typed();
        if map.contains_key(&id) {
            return Err(OrderStoreError::AlreadyExists(id));
        }
        map.insert(id, order);
        Ok(())
    }

    fn get(&self, order_id: &OrderId) -> Result<Option<Order>, OrderStoreError> {
        Ok(self.read()?.get(order_id).cloned())
    }

    fn update(&self, order: &Order, expected: ExpectedVersion) -> Result<(), OrderStoreError> {
        let mut map = self.write()?;
        let id = order.id_typed();

        match map.get(&id) {
            Some(stored) => {
                expected
                    .check(stored.version())
                    .map_err(|e| OrderStoreError::Concurrency(format!("order {id}: {e}")))?;
            }
            None if expected != ExpectedVersion::Any => {
                return Err(OrderStoreError::NotFound(id));
            }
            None => {}
        }

        map.insert(id, order.clone());
        Ok(())
    }

    fn find_by_period(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>, OrderStoreError> {
        check_period(from, to)?;
        self.select(|o| o.created_at() >= from && o.created_at() <= to)
    }

    fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, OrderStoreError> {
        self.select(|o| o.status() == status)
    }

    fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Order>, OrderStoreError> {
        self.select(|o| o.user_id() == *user_id)
    }

    fn find_by_user_and_period(
        &self,
        user_id: &UserId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>, OrderStoreError> {
        check_period(from, to)?;
        self.select(|o| {
            o.user_id() == *user_id && o.created_at() >= from && o.created_at() <= to
        })
    }
}
