//! Public catalog routes. None of them need a token.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;

use crate::catalog::{BookView, ListQuery, Pagination, SearchQuery};
use crate::http::error::ApiError;
use crate::http::AppState;

#[derive(Serialize)]
pub struct BookListing {
    pub success: bool,
    pub data: Vec<BookView>,
    pub pagination: Pagination,
}

#[derive(Serialize)]
pub struct BookDetail {
    pub success: bool,
    pub data: BookView,
}

pub async fn list(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Json<BookListing> {
    let page = state.catalog.list_books(&query).await;
    Json(BookListing { success: true, data: page.books, pagination: page.pagination })
}

pub async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Result<Json<Vec<BookView>>, ApiError> {
    Ok(Json(state.catalog.search_books(&query).await?))
}

/// `GET /api/books/OL1W`
pub async fn detail(State(state): State<AppState>, Path(id): Path<String>) -> Json<BookDetail> {
    Json(BookDetail { success: true, data: state.catalog.get_book(&id).await })
}

/// `GET /api/books/works/OL1W` and `GET /api/books/books/OL2M`
pub async fn detail_qualified(State(state): State<AppState>, Path((kind, id)): Path<(String, String)>) -> Json<BookDetail> {
    Json(BookDetail { success: true, data: state.catalog.get_book(&format!("{kind}/{id}")).await })
}
