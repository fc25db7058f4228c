//! Shared inventory ledger boundary.
//!
//! Keyed access to inventory items plus an explicit unit of work that claims
//! a set of items, mutates them, and then commits or rolls back as a whole.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::{InMemoryInventory, InMemoryUnitOfWork};
pub use r#trait::{Inventory, InventoryError, UnitOfWork};
