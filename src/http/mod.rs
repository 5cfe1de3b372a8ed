//! HTTP surface. Handlers are thin: extract identity and body, call a
//! service, serialize.

mod books;
mod cart;
pub mod error;
pub mod extract;
mod orders;

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{delete, get, put};
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::TokenVerifier;
use crate::catalog::CatalogGateway;
use crate::services::{CartService, OrderService};
use crate::store::Store;

pub use error::ApiError;
pub use extract::AuthUser;

#[derive(Clone)]
pub struct AppState {
    pub cart: CartService,
    pub orders: OrderService,
    pub catalog: CatalogGateway,
    pub verifier: TokenVerifier,
    pub expose_errors: bool,
    pub store_backend: &'static str,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, catalog: CatalogGateway, verifier: TokenVerifier, expose_errors: bool) -> Self {
        Self {
            store_backend: store.backend_tag(),
            cart: CartService::new(store.clone()),
            orders: OrderService::new(store),
            catalog,
            verifier,
            expose_errors,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/cart", get(cart::get_cart).post(cart::add_item).delete(cart::clear))
        .route("/api/cart/summary", get(cart::summary))
        .route("/api/cart/update", put(cart::update_quantity))
        .route("/api/cart/remove/*book_id", delete(cart::remove_item))
        .route("/api/orders", get(orders::list).post(orders::create))
        .route("/api/books", get(books::list))
        .route("/api/books/search", get(books::search))
        .route("/api/books/:id", get(books::detail))
        .route("/api/books/:kind/:id", get(books::detail_qualified))
        .layer(middleware::map_response_with_state(state.clone(), error::expose_error_detail))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "bookstore", "store": state.store_backend }))
}
