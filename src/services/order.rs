//! Checkout and order history.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;

use crate::domain::aggregates::{CustomerContact, Order, OrderError, OrderLine, OrderView};
use crate::domain::value_objects::{BookId, PaymentInfo, PaymentInput, UserId};
use crate::store::Store;
use crate::{BookstoreError, Result};

const MISSING_FIELDS: &str = "Missing required order fields";

/// Checkout payload. Any client-side total is ignored.
#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub shipping_address: Option<String>,
    pub payment_info: Option<PaymentInput>,
    pub items: Option<Vec<CheckoutItem>>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub book_id: Option<String>,
    pub title: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    pub quantity: Option<i64>,
    pub image_url: Option<String>,
}

impl CheckoutItem {
    fn into_line(self) -> Result<OrderLine> {
        let book_id = self
            .book_id
            .as_deref()
            .map(BookId::parse)
            .transpose()
            .map_err(|e| BookstoreError::validation(e.to_string()))?
            .ok_or_else(|| BookstoreError::validation("Each item needs a bookId"))?;
        let price = self.price.ok_or_else(|| BookstoreError::validation("Each item needs a numeric price"))?;
        let quantity = self
            .quantity
            .and_then(|q| u32::try_from(q).ok())
            .filter(|q| *q >= 1)
            .ok_or_else(|| BookstoreError::validation("Each item needs an integer quantity of at least 1"))?;
        Ok(OrderLine {
            book_id,
            title: self.title.unwrap_or_default(),
            price,
            quantity,
            image_url: self.image_url.filter(|u| !u.trim().is_empty()),
        })
    }
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Places a paid order from the submitted lines, then deletes the cart.
    ///
    /// The order insert is awaited before the cart delete is issued, so a
    /// failure never loses cart contents without an order existing. A failed
    /// cart delete after a successful insert is logged and does not fail the
    /// checkout.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn create_order(&self, user_id: &UserId, request: CheckoutRequest) -> Result<OrderView> {
        let shipping_address = request
            .shipping_address
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| BookstoreError::validation(MISSING_FIELDS))?;
        let items = request
            .items
            .filter(|items| !items.is_empty())
            .ok_or_else(|| BookstoreError::validation(MISSING_FIELDS))?;
        let payment_input = request.payment_info.ok_or_else(|| BookstoreError::validation(MISSING_FIELDS))?;

        let lines = items.into_iter().map(CheckoutItem::into_line).collect::<Result<Vec<_>>>()?;
        let payment_info = PaymentInfo::from_input(payment_input).map_err(|e| BookstoreError::validation(e.to_string()))?;
        let customer = CustomerContact {
            first_name: request.first_name.unwrap_or_default(),
            last_name: request.last_name.unwrap_or_default(),
            email: request.email.unwrap_or_default(),
        };

        let mut order = Order::place(user_id.clone(), lines, shipping_address, payment_info, customer)
            .map_err(|e: OrderError| BookstoreError::validation(e.to_string()))?;

        self.store.insert_order(&order).await?;
        for event in order.take_events() {
            event.record();
        }

        match self.store.delete_cart(user_id).await {
            Ok(existed) => tracing::debug!(order_id = %order.id(), cart_existed = existed, "cart retired"),
            Err(e) => tracing::warn!(order_id = %order.id(), error = %e, "order placed but cart delete failed"),
        }

        Ok(order.view())
    }

    /// Newest first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn user_orders(&self, user_id: &UserId) -> Result<Vec<OrderView>> {
        let orders = self.store.orders_for_user(user_id).await?;
        Ok(orders.iter().map(Order::view).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cart::{AddToCart, CartService};
    use crate::store::MemoryStore;
    use std::sync::atomic::Ordering;

    fn item(id: &str, price: Decimal, quantity: i64) -> CheckoutItem {
        CheckoutItem { book_id: Some(id.into()), title: Some(id.into()), price: Some(price), quantity: Some(quantity), image_url: None }
    }

    fn checkout(items: Vec<CheckoutItem>) -> CheckoutRequest {
        CheckoutRequest {
            shipping_address: Some("1 Main St, Springfield".into()),
            payment_info: Some(PaymentInput {
                method: Some("Credit Card".into()),
                card_number: Some("4111111111111111".into()),
                cvv: Some("123".into()),
                ..Default::default()
            }),
            items: Some(items),
            first_name: Some("Ada".into()),
            ..Default::default()
        }
    }

    fn services() -> (Arc<MemoryStore>, CartService, OrderService, UserId) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), CartService::new(store.clone()), OrderService::new(store), UserId::new("u1"))
    }

    #[tokio::test]
    async fn test_total_is_server_computed() {
        let (_, _, orders, user) = services();
        let view = orders
            .create_order(&user, checkout(vec![item("a", Decimal::new(10, 0), 2), item("b", Decimal::new(5, 0), 1)]))
            .await
            .unwrap();
        assert_eq!(view.total_amount, Decimal::new(25, 0));
        assert_eq!(view.payment_method, "Credit Card");
        assert_eq!(view.payment_details.last4.as_deref(), Some("1111"));
        assert_eq!(view.customer.first_name, "Ada");
        assert!(view.is_paid);
    }

    #[tokio::test]
    async fn test_checkout_deletes_cart() {
        let (store, carts, orders, user) = services();
        carts
            .add_to_cart(&user, AddToCart { book_id: Some("a".into()), title: Some("A".into()), price: Some(Decimal::ONE), image_url: None })
            .await
            .unwrap();
        orders.create_order(&user, checkout(vec![item("a", Decimal::ONE, 1)])).await.unwrap();
        assert!(!store.cart_exists(&user).await);
        assert!(carts.get_cart(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_insert_keeps_cart() {
        let (store, carts, orders, user) = services();
        carts
            .add_to_cart(&user, AddToCart { book_id: Some("a".into()), title: Some("A".into()), price: Some(Decimal::ONE), image_url: None })
            .await
            .unwrap();
        store.fail_order_inserts.store(true, Ordering::Relaxed);
        let err = orders.create_order(&user, checkout(vec![item("a", Decimal::ONE, 1)])).await;
        assert!(matches!(err, Err(BookstoreError::Store(_))));
        assert_eq!(carts.get_cart(&user).await.unwrap().len(), 1);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_cart_delete_still_places_order() {
        let (store, _, orders, user) = services();
        store.fail_cart_deletes.store(true, Ordering::Relaxed);
        orders.create_order(&user, checkout(vec![item("a", Decimal::ONE, 1)])).await.unwrap();
        assert_eq!(orders.user_orders(&user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_validation() {
        let (_, _, orders, user) = services();
        let no_items = checkout(vec![]);
        assert!(matches!(orders.create_order(&user, no_items).await, Err(BookstoreError::Validation(_))));

        let mut no_address = checkout(vec![item("a", Decimal::ONE, 1)]);
        no_address.shipping_address = None;
        assert!(matches!(orders.create_order(&user, no_address).await, Err(BookstoreError::Validation(_))));

        let mut no_price = checkout(vec![item("a", Decimal::ONE, 1)]);
        no_price.items = Some(vec![CheckoutItem { price: None, ..item("a", Decimal::ONE, 1) }]);
        assert!(matches!(orders.create_order(&user, no_price).await, Err(BookstoreError::Validation(_))));

        let zero_qty = checkout(vec![item("a", Decimal::ONE, 0)]);
        assert!(matches!(orders.create_order(&user, zero_qty).await, Err(BookstoreError::Validation(_))));

        let mut no_payment = checkout(vec![item("a", Decimal::ONE, 1)]);
        no_payment.payment_info = None;
        assert!(matches!(orders.create_order(&user, no_payment).await, Err(BookstoreError::Validation(_))));

        assert!(orders.user_orders(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_orders_newest_first_and_scoped() {
        let (_, _, orders, user) = services();
        let first = orders.create_order(&user, checkout(vec![item("a", Decimal::ONE, 1)])).await.unwrap();
        let second = orders.create_order(&user, checkout(vec![item("b", Decimal::TWO, 1)])).await.unwrap();
        orders.create_order(&UserId::new("u2"), checkout(vec![item("c", Decimal::ONE, 1)])).await.unwrap();

        let listed = orders.user_orders(&user).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }
}
