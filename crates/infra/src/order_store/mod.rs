//! Order persistence boundary.
//!
//! Keyed and range lookups over orders. The only coupling with order
//! completion is the single versioned `update` that stores the completed
//! order.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryOrderStore;
pub use r#trait::{OrderStore, OrderStoreError};
