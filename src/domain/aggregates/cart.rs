//! Cart Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{BookId, UserId};

/// One book in a cart, with its own price snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub book_id: BookId,
    pub title: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub quantity: u32,
}

impl CartLineItem {
    /// `None` when the line is malformed (negative price) or overflows.
    pub fn line_total(&self) -> Option<Decimal> {
        if self.price < Decimal::ZERO {
            return None;
        }
        self.price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Per-user cart. Line items are unique by canonical book id and always
/// carry a quantity of at least one.
#[derive(Clone, Debug)]
pub struct Cart {
    user_id: UserId,
    items: Vec<CartLineItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

impl Cart {
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self { user_id, items: vec![], created_at: now, updated_at: now, events: vec![] }
    }

    /// Rebuilds a cart from its persisted parts. Lines with a zero quantity
    /// and duplicate ids are dropped so the invariants hold after load.
    pub fn restore(user_id: UserId, items: Vec<CartLineItem>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        let mut cart = Self { user_id, items: Vec::with_capacity(items.len()), created_at, updated_at, events: vec![] };
        for item in items {
            if item.quantity == 0 || cart.position(&item.book_id).is_some() {
                continue;
            }
            cart.items.push(item);
        }
        cart
    }

    pub fn user_id(&self) -> &UserId { &self.user_id }
    pub fn items(&self) -> &[CartLineItem] { &self.items }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn summary(&self) -> CartSummary { CartSummary::of(&self.items) }

    /// Upsert: an existing line gains exactly one unit and takes the latest
    /// price; a new line starts at quantity one.
    pub fn add_item(&mut self, book_id: BookId, title: String, price: Decimal, image_url: Option<String>) {
        let image_url = image_url.filter(|u| !u.trim().is_empty());
        let quantity = match self.position(&book_id) {
            Some(idx) => {
                let existing = &mut self.items[idx];
                existing.quantity = existing.quantity.saturating_add(1);
                existing.price = price;
                if image_url.is_some() { existing.image_url = image_url; }
                existing.quantity
            }
            None => {
                self.items.push(CartLineItem { book_id: book_id.clone(), title, price, image_url, quantity: 1 });
                1
            }
        };
        self.touch();
        self.raise_event(DomainEvent::Cart(CartEvent::ItemAdded { user_id: self.user_id.clone(), book_id, quantity }));
    }

    /// Absolute set. Zero or less removes the line, which never fails.
    pub fn set_quantity(&mut self, book_id: &BookId, quantity: i64) -> Result<(), CartError> {
        if quantity <= 0 {
            self.remove_item(book_id);
            return Ok(());
        }
        let quantity = u32::try_from(quantity).map_err(|_| CartError::QuantityTooLarge)?;
        let idx = self.position(book_id).ok_or(CartError::ItemNotFound)?;
        self.items[idx].quantity = quantity;
        self.touch();
        self.raise_event(DomainEvent::Cart(CartEvent::QuantityChanged { user_id: self.user_id.clone(), book_id: book_id.clone(), quantity }));
        Ok(())
    }

    /// Removing an absent book is not an error.
    pub fn remove_item(&mut self, book_id: &BookId) {
        let before = self.items.len();
        self.items.retain(|i| !book_id.matches(i.book_id.as_str()));
        self.touch();
        let removed = before - self.items.len();
        self.raise_event(DomainEvent::Cart(CartEvent::ItemRemoved { user_id: self.user_id.clone(), book_id: book_id.clone(), removed }));
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.touch();
        self.raise_event(DomainEvent::Cart(CartEvent::Cleared { user_id: self.user_id.clone() }));
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }

    // Stored ids are canonical, but rows written by older clients may not be.
    fn position(&self, book_id: &BookId) -> Option<usize> {
        self.items.iter().position(|i| book_id.matches(i.book_id.as_str()))
    }

    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// Read-only totals over a list of line items.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSummary {
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub item_count: u64,
}

impl CartSummary {
    pub fn of(items: &[CartLineItem]) -> Self {
        Self { total: cart_total(items), item_count: item_count(items) }
    }
}

/// Σ(price × quantity), or zero if any line is malformed.
pub fn cart_total(items: &[CartLineItem]) -> Decimal {
    items
        .iter()
        .try_fold(Decimal::ZERO, |acc, i| acc.checked_add(i.line_total()?))
        .unwrap_or(Decimal::ZERO)
}

/// Σ(quantity), or zero on overflow.
pub fn item_count(items: &[CartLineItem]) -> u64 {
    items
        .iter()
        .try_fold(0u64, |acc, i| acc.checked_add(u64::from(i.quantity)))
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum CartError { ItemNotFound, QuantityTooLarge }
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ItemNotFound => write!(f, "Item not found in cart"),
            Self::QuantityTooLarge => write!(f, "Quantity too large"),
        }
    }
}
