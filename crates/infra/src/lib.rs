//! Infrastructure layer: shared inventory, order storage, configuration and
//! the order completion workflow that ties them together.

pub mod config;
pub mod inventory_store;
pub mod order_manager;
pub mod order_store;

mod integration_tests;

pub use config::CompletionConfig;
pub use inventory_store::{InMemoryInventory, Inventory, InventoryError, UnitOfWork};
pub use order_manager::{CompletionError, OrderManager};
pub use order_store::{InMemoryOrderStore, OrderStore, OrderStoreError};
