//! Persistence for carts and orders.
//!
//! Every cart operation loads from and writes back to a repository; nothing
//! is cached in process between requests. Two concurrent mutations of the
//! same cart are last-writer-wins.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::aggregates::{Cart, Order};
use crate::domain::value_objects::UserId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CartRepository: Send + Sync + 'static {
    async fn find_cart(&self, user_id: &UserId) -> Result<Option<Cart>, StoreError>;

    /// Inserts or replaces the user's cart document.
    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError>;

    /// Deletes the cart record. Returns whether one existed.
    async fn delete_cart(&self, user_id: &UserId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync + 'static {
    /// Resolves only once the order is durably written.
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Newest `created_at` first.
    async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError>;
}

pub trait Store: CartRepository + OrderRepository {
    fn backend_tag(&self) -> &'static str;
}
