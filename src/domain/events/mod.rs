//! Domain events
use crate::domain::value_objects::{BookId, UserId};
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq)]
pub enum DomainEvent {
    Cart(CartEvent),
    Order(OrderEvent),
}

#[derive(Clone, Debug, PartialEq)]
pub enum CartEvent {
    ItemAdded { user_id: UserId, book_id: BookId, quantity: u32 },
    QuantityChanged { user_id: UserId, book_id: BookId, quantity: u32 },
    ItemRemoved { user_id: UserId, book_id: BookId, removed: usize },
    Cleared { user_id: UserId },
}

#[derive(Clone, Debug, PartialEq)]
pub enum OrderEvent {
    Placed { order_id: String, user_id: UserId, total: Decimal, lines: usize },
}

impl DomainEvent {
    /// Emits the event as a structured log line.
    pub fn record(&self) {
        match self {
            Self::Cart(CartEvent::ItemAdded { user_id, book_id, quantity }) => {
                tracing::info!(%user_id, %book_id, quantity, "cart item added");
            }
            Self::Cart(CartEvent::QuantityChanged { user_id, book_id, quantity }) => {
                tracing::info!(%user_id, %book_id, quantity, "cart quantity changed");
            }
            Self::Cart(CartEvent::ItemRemoved { user_id, book_id, removed }) => {
                tracing::info!(%user_id, %book_id, removed, "cart item removed");
            }
            Self::Cart(CartEvent::Cleared { user_id }) => {
                tracing::info!(%user_id, "cart cleared");
            }
            Self::Order(OrderEvent::Placed { order_id, user_id, total, lines }) => {
                tracing::info!(%order_id, %user_id, %total, lines, "order placed");
            }
        }
    }
}
