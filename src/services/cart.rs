//! Cart store operations.
//!
//! Every operation is scoped to one user, normalizes incoming book ids, and
//! round-trips the cart through the repository.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use crate::domain::aggregates::{Cart, CartError, CartLineItem, CartSummary};
use crate::domain::value_objects::{BookId, UserId};
use crate::store::Store;
use crate::{BookstoreError, Result};

const MISSING_FIELDS: &str = "Missing required fields";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
    pub book_id: Option<String>,
    pub title: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantity {
    pub book_id: Option<String>,
    pub quantity: Option<i64>,
}

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Empty list when the user has no cart.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_cart(&self, user_id: &UserId) -> Result<Vec<CartLineItem>> {
        Ok(self
            .store
            .find_cart(user_id)
            .await?
            .map(|cart| cart.items().to_vec())
            .unwrap_or_default())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn summary(&self, user_id: &UserId) -> Result<CartSummary> {
        Ok(CartSummary::of(&self.get_cart(user_id).await?))
    }

    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn add_to_cart(&self, user_id: &UserId, input: AddToCart) -> Result<Vec<CartLineItem>> {
        let (Some(raw_id), Some(title), Some(price)) = (input.book_id, input.title, input.price) else {
            tracing::debug!("add to cart rejected: missing fields");
            return Err(BookstoreError::validation(MISSING_FIELDS));
        };
        if title.trim().is_empty() {
            return Err(BookstoreError::validation(MISSING_FIELDS));
        }
        if price < Decimal::ZERO {
            return Err(BookstoreError::validation("Price must not be negative"));
        }
        let book_id = BookId::parse(&raw_id).map_err(|_| BookstoreError::validation(MISSING_FIELDS))?;

        let mut cart = self
            .store
            .find_cart(user_id)
            .await?
            .unwrap_or_else(|| Cart::new(user_id.clone()));
        cart.add_item(book_id, title, price, input.image_url);
        self.persist(&mut cart).await
    }

    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn update_quantity(&self, user_id: &UserId, input: UpdateQuantity) -> Result<Vec<CartLineItem>> {
        let (Some(raw_id), Some(quantity)) = (input.book_id, input.quantity) else {
            return Err(BookstoreError::validation(MISSING_FIELDS));
        };
        let book_id = BookId::parse(&raw_id).map_err(|_| BookstoreError::validation(MISSING_FIELDS))?;
        if quantity <= 0 {
            return self.remove_item(user_id, book_id).await;
        }

        let mut cart = self.require_cart(user_id).await?;
        cart.set_quantity(&book_id, quantity).map_err(|e| match e {
            CartError::ItemNotFound => {
                tracing::debug!(%book_id, "update for book not in cart");
                BookstoreError::not_found(e.to_string())
            }
            CartError::QuantityTooLarge => BookstoreError::validation(e.to_string()),
        })?;
        self.persist(&mut cart).await
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn remove_from_cart(&self, user_id: &UserId, raw_id: &str) -> Result<Vec<CartLineItem>> {
        let book_id = BookId::parse(raw_id).map_err(|e| BookstoreError::validation(e.to_string()))?;
        self.remove_item(user_id, book_id).await
    }

    /// Idempotent; a user without a cart is left without one.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear_cart(&self, user_id: &UserId) -> Result<Vec<CartLineItem>> {
        match self.store.find_cart(user_id).await? {
            Some(mut cart) => {
                cart.clear();
                self.persist(&mut cart).await
            }
            None => Ok(vec![]),
        }
    }

    async fn remove_item(&self, user_id: &UserId, book_id: BookId) -> Result<Vec<CartLineItem>> {
        let mut cart = self.require_cart(user_id).await?;
        cart.remove_item(&book_id);
        self.persist(&mut cart).await
    }

    async fn require_cart(&self, user_id: &UserId) -> Result<Cart> {
        self.store
            .find_cart(user_id)
            .await?
            .ok_or_else(|| BookstoreError::not_found("Cart not found"))
    }

    async fn persist(&self, cart: &mut Cart) -> Result<Vec<CartLineItem>> {
        self.store.save_cart(cart).await?;
        for event in cart.take_events() {
            event.record();
        }
        Ok(cart.items().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> (CartService, UserId) {
        (CartService::new(Arc::new(MemoryStore::new())), UserId::new("u1"))
    }

    fn add(id: &str, price: Decimal) -> AddToCart {
        AddToCart { book_id: Some(id.into()), title: Some(format!("Title {id}")), price: Some(price), image_url: None }
    }

    #[tokio::test]
    async fn test_get_cart_without_cart_is_empty() {
        let (svc, user) = service();
        assert!(svc.get_cart(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_upserts_across_id_forms() {
        let (svc, user) = service();
        svc.add_to_cart(&user, add("/works/OL1W", Decimal::new(1000, 2))).await.unwrap();
        let items = svc.add_to_cart(&user, add("works/OL1W", Decimal::new(1100, 2))).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].price, Decimal::new(1100, 2));
        assert_eq!(items[0].book_id.as_str(), "works/OL1W");
    }

    #[tokio::test]
    async fn test_add_validation() {
        let (svc, user) = service();
        let missing_price = AddToCart { price: None, ..add("a", Decimal::ONE) };
        assert!(matches!(svc.add_to_cart(&user, missing_price).await, Err(BookstoreError::Validation(_))));
        let missing_title = AddToCart { title: None, ..add("a", Decimal::ONE) };
        assert!(matches!(svc.add_to_cart(&user, missing_title).await, Err(BookstoreError::Validation(_))));
        assert!(matches!(svc.add_to_cart(&user, add("", Decimal::ONE)).await, Err(BookstoreError::Validation(_))));
        assert!(matches!(svc.add_to_cart(&user, add("a", Decimal::NEGATIVE_ONE)).await, Err(BookstoreError::Validation(_))));
        // zero is a valid price
        svc.add_to_cart(&user, add("free", Decimal::ZERO)).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_quantity() {
        let (svc, user) = service();
        let update = |id: &str, q| UpdateQuantity { book_id: Some(id.into()), quantity: Some(q) };

        assert!(matches!(svc.update_quantity(&user, update("a", 2)).await, Err(BookstoreError::NotFound(_))));
        svc.add_to_cart(&user, add("a", Decimal::ONE)).await.unwrap();
        let items = svc.update_quantity(&user, update("/a", 7)).await.unwrap();
        assert_eq!(items[0].quantity, 7);
        assert!(matches!(svc.update_quantity(&user, update("zzz", 2)).await, Err(BookstoreError::NotFound(_))));
        assert!(matches!(
            svc.update_quantity(&user, UpdateQuantity { book_id: Some("a".into()), quantity: None }).await,
            Err(BookstoreError::Validation(_))
        ));

        let items = svc.update_quantity(&user, update("a", 0)).await.unwrap();
        assert!(items.is_empty());
        assert!(svc.get_cart(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent_once_cart_exists() {
        let (svc, user) = service();
        assert!(matches!(svc.remove_from_cart(&user, "a").await, Err(BookstoreError::NotFound(_))));
        svc.add_to_cart(&user, add("a", Decimal::ONE)).await.unwrap();
        let before = svc.add_to_cart(&user, add("b", Decimal::ONE)).await.unwrap();
        let after = svc.remove_from_cart(&user, "missing").await.unwrap();
        assert_eq!(before, after);
        let after = svc.remove_from_cart(&user, "/a").await.unwrap();
        assert_eq!(after.len(), 1);
        assert!(matches!(svc.remove_from_cart(&user, " ").await, Err(BookstoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_clear_and_summary() {
        let (svc, user) = service();
        assert!(svc.clear_cart(&user).await.unwrap().is_empty());
        svc.add_to_cart(&user, add("a", Decimal::new(1250, 2))).await.unwrap();
        svc.add_to_cart(&user, add("a", Decimal::new(1250, 2))).await.unwrap();
        svc.add_to_cart(&user, add("b", Decimal::new(500, 2))).await.unwrap();
        let summary = svc.summary(&user).await.unwrap();
        assert_eq!(summary.total, Decimal::new(3000, 2));
        assert_eq!(summary.item_count, 3);
        assert!(svc.clear_cart(&user).await.unwrap().is_empty());
        assert!(svc.clear_cart(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_carts_are_per_user() {
        let (svc, user) = service();
        svc.add_to_cart(&user, add("a", Decimal::ONE)).await.unwrap();
        assert!(svc.get_cart(&UserId::new("u2")).await.unwrap().is_empty());
    }
}
