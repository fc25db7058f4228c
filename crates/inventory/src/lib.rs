//! Inventory domain module.
//!
//! This crate contains the stock-keeping entity, implemented purely as
//! deterministic domain logic (no IO, no locking, no storage). Shared access
//! to inventory items lives in `storefront-infra`.

pub mod item;

pub use item::InventoryItem;
