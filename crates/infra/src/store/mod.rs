//! Product store: persistence port plus its backends.

pub mod in_memory;
pub mod postgres;
mod r#trait;

pub use in_memory::InMemoryProductStore;
pub use postgres::PostgresProductStore;
pub use r#trait::{ProductStore, StoreError};
