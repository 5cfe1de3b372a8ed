//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::cart::CartLineItem;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{BookId, PaymentInfo, UserId};

/// Frozen copy of a line at checkout time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub book_id: BookId,
    #[serde(default)]
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<CartLineItem> for OrderLine {
    fn from(item: CartLineItem) -> Self {
        Self { book_id: item.book_id, title: item.title, price: item.price, quantity: item.quantity, image_url: item.image_url }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerContact {
    #[serde(default)] pub first_name: String,
    #[serde(default)] pub last_name: String,
    #[serde(default)] pub email: String,
}

/// Everything a persisted order is made of.
#[derive(Clone, Debug)]
pub struct OrderParts {
    pub id: Uuid,
    pub user_id: UserId,
    pub items: Vec<OrderLine>,
    pub shipping_address: String,
    pub payment_info: PaymentInfo,
    pub customer: CustomerContact,
    pub total_price: Decimal,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Immutable order record. There are no mutators: once placed, the line
/// snapshot and total never change.
#[derive(Clone, Debug)]
pub struct Order {
    parts: OrderParts,
    events: Vec<DomainEvent>,
}

impl Order {
    /// Builds a paid order. The total is always recomputed from the lines.
    pub fn place(
        user_id: UserId,
        items: Vec<OrderLine>,
        shipping_address: impl Into<String>,
        payment_info: PaymentInfo,
        customer: CustomerContact,
    ) -> Result<Self, OrderError> {
        let shipping_address = shipping_address.into();
        if shipping_address.trim().is_empty() { return Err(OrderError::MissingShippingAddress); }
        if items.is_empty() { return Err(OrderError::NoItems); }
        if items.iter().any(|i| i.quantity == 0) { return Err(OrderError::InvalidQuantity); }
        if items.iter().any(|i| i.price < Decimal::ZERO) { return Err(OrderError::InvalidPrice); }
        let total_price = order_total(&items).ok_or(OrderError::TotalOverflow)?;

        let now = Utc::now();
        let id = Uuid::now_v7();
        let mut order = Self {
            parts: OrderParts {
                id, user_id, items, shipping_address, payment_info, customer, total_price,
                is_paid: true, paid_at: Some(now), created_at: now,
            },
            events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: id.to_string(),
            user_id: order.parts.user_id.clone(),
            total: total_price,
            lines: order.parts.items.len(),
        }));
        Ok(order)
    }

    pub fn restore(parts: OrderParts) -> Self { Self { parts, events: vec![] } }
    pub fn parts(&self) -> &OrderParts { &self.parts }

    pub fn id(&self) -> Uuid { self.parts.id }
    pub fn user_id(&self) -> &UserId { &self.parts.user_id }
    pub fn items(&self) -> &[OrderLine] { &self.parts.items }
    pub fn shipping_address(&self) -> &str { &self.parts.shipping_address }
    pub fn payment_info(&self) -> &PaymentInfo { &self.parts.payment_info }
    pub fn customer(&self) -> &CustomerContact { &self.parts.customer }
    pub fn total_price(&self) -> Decimal { self.parts.total_price }
    pub fn is_paid(&self) -> bool { self.parts.is_paid }
    pub fn paid_at(&self) -> Option<DateTime<Utc>> { self.parts.paid_at }
    pub fn created_at(&self) -> DateTime<Utc> { self.parts.created_at }

    pub fn view(&self) -> OrderView {
        let p = &self.parts;
        OrderView {
            id: p.id,
            customer: CustomerView {
                first_name: p.customer.first_name.clone(),
                last_name: p.customer.last_name.clone(),
                email: p.customer.email.clone(),
                shipping_address: p.shipping_address.clone(),
            },
            items: p.items.clone(),
            total_amount: p.total_price,
            payment_method: p.payment_info.method.clone(),
            payment_details: p.payment_info.clone(),
            is_paid: p.is_paid,
            created_at: p.created_at,
            paid_at: p.paid_at,
        }
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

/// Σ(price × quantity); `None` on overflow.
pub fn order_total(items: &[OrderLine]) -> Option<Decimal> {
    items.iter().try_fold(Decimal::ZERO, |acc, i| {
        acc.checked_add(i.price.checked_mul(Decimal::from(i.quantity))?)
    })
}

/// Response shape for a placed order.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub customer: CustomerView,
    pub items: Vec<OrderLine>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub payment_method: String,
    pub payment_details: PaymentInfo,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerView {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub shipping_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum OrderError { NoItems, MissingShippingAddress, InvalidQuantity, InvalidPrice, TotalOverflow }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoItems => write!(f, "Order must contain at least one item"),
            Self::MissingShippingAddress => write!(f, "Shipping address is required"),
            Self::InvalidQuantity => write!(f, "Item quantity must be at least 1"),
            Self::InvalidPrice => write!(f, "Item price must not be negative"),
            Self::TotalOverflow => write!(f, "Order total is out of range"),
        }
    }
}
