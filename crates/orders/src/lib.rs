//! Orders domain module.
//!
//! This crate contains business rules for customer orders and the outcome
//! value of an order completion, implemented purely as deterministic domain
//! logic (no IO, no storage). The completion workflow itself lives in
//! `storefront-infra`.

pub mod completion;
pub mod order;

pub use completion::{
    CompletionResult, CompletionStatus, FailureReason, LineShortfall, ShortfallCause,
};
pub use order::{Order, OrderLine, OrderStatus};
