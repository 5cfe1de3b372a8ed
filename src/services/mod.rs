//! Cart store and order factory.
pub mod cart;
pub mod order;

pub use cart::{AddToCart, CartService, UpdateQuantity};
pub use order::{CheckoutItem, CheckoutRequest, OrderService};
