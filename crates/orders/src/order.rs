use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{AggregateRoot, DomainError, DomainResult, OrderId, ProductId, UserId};
use storefront_quantity::Quantity;

/// Order status lifecycle.
///
/// `Open -> Paid`, `Open | Paid -> Completed`, `Open | Paid -> Cancelled`.
/// `Completed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Paid,
    Completed,
    Cancelled,
}

/// Order line: a product and the quantity requested of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    line_no: u32,
    product_id: ProductId,
    quantity: Quantity,
}

impl OrderLine {
    pub fn line_no(&self) -> u32 {
        self.line_no
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    /// Requested quantity.
    pub fn quantity(&self) -> &Quantity {
        &self.quantity
    }
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    version: u64,
}

impl Order {
    /// Create an open order with no lines.
    pub fn new(id: OrderId, user_id: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            created_at,
            status: OrderStatus::Open,
            lines: Vec::new(),
            version: 0,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn number_of_line_items(&self) -> usize {
        self.lines.len()
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, OrderStatus::Open)
    }

    /// Whether the order may still be completed against the inventory.
    pub fn is_completable(&self) -> bool {
        matches!(self.status, OrderStatus::Open | OrderStatus::Paid)
    }

    /// Append a line; returns its line number (1-based).
    pub fn add_line(&mut self, product_id: ProductId, quantity: Quantity) -> DomainResult<u32> {
        if !self.is_open() {
            return Err(DomainError::invariant(
                "cannot modify order once it is paid, completed or cancelled",
            ));
        }
        if !quantity.is_positive() {
            return Err(DomainError::validation("quantity must be positive"));
        }

        let line_no = match self.lines.last() {
            Some(last) => last
                .line_no
                .checked_add(1)
                .ok_or_else(|| DomainError::validation("too many order lines"))?,
            None => 1,
        };
        self.lines.push(OrderLine {
            line_no,
            product_id,
            quantity,
        });
        self.version += 1;
        Ok(line_no)
    }

    pub fn mark_paid(&mut self) -> DomainResult<()> {
        if !self.is_open() {
            return Err(DomainError::invariant("only open orders can be paid"));
        }
        self.transition(OrderStatus::Paid);
        Ok(())
    }

    /// Mark the order completed. Refused unless the order is open or paid, so
    /// completing twice is an error rather than a silent repeat.
    pub fn complete(&mut self) -> DomainResult<()> {
        if !self.is_completable() {
            return Err(DomainError::invariant(format!(
                "cannot complete order in status {:?}",
                self.status
            )));
        }
        self.transition(OrderStatus::Completed);
        Ok(())
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        if !self.is_completable() {
            return Err(DomainError::invariant(format!(
                "cannot cancel order in status {:?}",
                self.status
            )));
        }
        self.transition(OrderStatus::Cancelled);
        Ok(())
    }

    fn transition(&mut self, status: OrderStatus) {
        self.status = status;
        self.version += 1;
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
