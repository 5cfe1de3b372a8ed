//! Bookstore service
//!
//! Online bookstore backend: a live catalog proxy over Open Library and
//! Google Books, a per-user shopping cart, and checkout into immutable orders.
//!
//! ## Features
//! - Canonical book identifiers across both catalog id formats
//! - Persisted per-user carts with upsert-on-add semantics
//! - Checkout with a server-computed total and card-data stripping
//! - Order history, newest first
//! - Catalog browsing that degrades instead of failing

pub mod auth;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod http;
pub mod services;
pub mod store;

pub use config::Config;
pub use http::{build_router, AppState};

use thiserror::Error;

use crate::auth::AuthError;
use crate::store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum BookstoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Upstream catalog error: {0}")]
    Upstream(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BookstoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

pub type Result<T> = std::result::Result<T, BookstoreError>;
