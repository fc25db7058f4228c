//! Outcome of an order completion attempt.

use serde::{Deserialize, Serialize};

use storefront_core::ProductId;
use storefront_quantity::Quantity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Successful,
    Failed,
}

/// Why a single order line could not be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallCause {
    /// No inventory record exists for the product.
    MissingInventory,
    /// The on-hand quantity does not cover the requested quantity.
    InsufficientStock,
    /// The line and the inventory record measure in different metrics.
    IncompatibleMetric,
}

/// An unsatisfiable order line, as classified during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineShortfall {
    pub line_no: u32,
    pub product_id: ProductId,
    pub requested: Quantity,
    /// On-hand quantity at validation time; `None` when there is no record.
    pub on_hand: Option<Quantity>,
    pub cause: ShortfallCause,
}

/// Why a completion attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// At least one line was unsatisfiable; lists every such line in line order.
    Unsatisfiable { lines: Vec<LineShortfall> },
    /// A decrement drove the product negative during apply (concurrent consumer).
    Conflict { product_id: ProductId },
    /// The inventory records could not be claimed in time.
    LockTimeout,
}

/// Immutable outcome returned once per completion attempt.
///
/// Callers may discriminate on [`status`](Self::status) alone; the failure
/// reason is diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResult {
    status: CompletionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure: Option<FailureReason>,
}

impl CompletionResult {
    pub fn successful() -> Self {
        Self {
            status: CompletionStatus::Successful,
            failure: None,
        }
    }

    pub fn failed(reason: FailureReason) -> Self {
        Self {
            status: CompletionStatus::Failed,
            failure: Some(reason),
        }
    }

    pub fn status(&self) -> CompletionStatus {
        self.status
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    pub fn is_successful(&self) -> bool {
        self.status == CompletionStatus::Successful
    }

    /// Conflicts and lock timeouts may succeed if the caller tries again;
    /// unsatisfiable lines will not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.failure,
            Some(FailureReason::Conflict { .. } | FailureReason::LockTimeout)
        )
    }

    /// Shortfalls reported by validation; empty unless the order was unsatisfiable.
    pub fn shortfalls(&self) -> &[LineShortfall] {
        match &self.failure {
            Some(FailureReason::Unsatisfiable { lines }) => lines,
            _ => &[],
        }
    }
}
