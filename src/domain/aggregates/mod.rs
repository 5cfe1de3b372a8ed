//! Aggregates module
pub mod order;
pub mod cart;

pub use order::{CustomerContact, CustomerView, Order, OrderError, OrderLine, OrderParts, OrderView};
pub use cart::{Cart, CartError, CartLineItem, CartSummary};
