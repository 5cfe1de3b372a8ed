use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::domain::aggregates::OrderView;
use crate::http::error::ApiError;
use crate::http::extract::{json_body, AuthUser};
use crate::http::AppState;
use crate::services::CheckoutRequest;

#[derive(Serialize)]
pub struct OrderList {
    pub success: bool,
    pub orders: Vec<OrderView>,
}

pub async fn create(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<OrderView>), ApiError> {
    let request = json_body(payload)?;
    let order = state.orders.create_order(&user_id, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list(State(state): State<AppState>, AuthUser(user_id): AuthUser) -> Result<Json<OrderList>, ApiError> {
    let orders = state.orders.user_orders(&user_id).await?;
    Ok(Json(OrderList { success: true, orders }))
}
