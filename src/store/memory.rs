use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{CartRepository, OrderRepository, Store, StoreError};
use crate::domain::aggregates::{Cart, CartLineItem, Order};
use crate::domain::value_objects::UserId;

struct StoredCart {
    items: Vec<CartLineItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Process-local store for tests and `STORE_BACKEND=memory` runs.
///
/// Carts are stored as detached copies, so it behaves like a document store:
/// callers never share a live `Cart` between requests.
#[derive(Default)]
pub struct MemoryStore {
    carts: Mutex<HashMap<UserId, StoredCart>>,
    orders: Mutex<Vec<Order>>,
    pub fail_order_inserts: AtomicBool,
    pub fail_cart_deletes: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn cart_exists(&self, user_id: &UserId) -> bool {
        self.carts.lock().await.contains_key(user_id)
    }

    pub async fn order_count(&self) -> usize {
        self.orders.lock().await.len()
    }
}

#[async_trait]
impl CartRepository for MemoryStore {
    async fn find_cart(&self, user_id: &UserId) -> Result<Option<Cart>, StoreError> {
        Ok(self.carts.lock().await.get(user_id).map(|stored| {
            Cart::restore(user_id.clone(), stored.items.clone(), stored.created_at, stored.updated_at)
        }))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError> {
        let stored = StoredCart {
            items: cart.items().to_vec(),
            created_at: cart.created_at(),
            updated_at: cart.updated_at(),
        };
        self.carts.lock().await.insert(cart.user_id().clone(), stored);
        Ok(())
    }

    async fn delete_cart(&self, user_id: &UserId) -> Result<bool, StoreError> {
        if self.fail_cart_deletes.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("cart delete rejected".to_string()));
        }
        Ok(self.carts.lock().await.remove(user_id).is_some())
    }
}

#[async_trait]
impl OrderRepository for MemoryStore {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        if self.fail_order_inserts.load(Ordering::Relaxed) {
            return Err(StoreError::Unavailable("order insert rejected".to_string()));
        }
        self.orders.lock().await.push(Order::restore(order.parts().clone()));
        Ok(())
    }

    async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .orders
            .lock()
            .await
            .iter()
            .filter(|o| o.user_id() == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| b.id().cmp(&a.id())));
        Ok(orders)
    }
}

impl Store for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }
}
