use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;

use crate::domain::aggregates::{CartLineItem, CartSummary};
use crate::http::error::ApiError;
use crate::http::extract::{json_body, AuthUser};
use crate::http::AppState;
use crate::services::{AddToCart, UpdateQuantity};

type Items = Result<Json<Vec<CartLineItem>>, ApiError>;

pub async fn get_cart(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> Items {
    Ok(Json(state.cart.get_cart(&user_id).await?))
}

pub async fn summary(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> Result<Json<CartSummary>, ApiError> {
    Ok(Json(state.cart.summary(&user_id).await?))
}

pub async fn add_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<AddToCart>, JsonRejection>,
) -> Items {
    let input = json_body(payload)?;
    Ok(Json(state.cart.add_to_cart(&user_id, input).await?))
}

pub async fn update_quantity(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<UpdateQuantity>, JsonRejection>,
) -> Items {
    let input = json_body(payload)?;
    Ok(Json(state.cart.update_quantity(&user_id, input).await?))
}

/// The wildcard keeps path-shaped ids like `works/OL1W` in one parameter.
pub async fn remove_item(State(state): State<AppState>, AuthUser(user_id): AuthUser, Path(book_id): Path<String>) -> Items {
    Ok(Json(state.cart.remove_from_cart(&user_id, &book_id).await?))
}

pub async fn clear(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> Items {
    Ok(Json(state.cart.clear_cart(&user_id).await?))
}
