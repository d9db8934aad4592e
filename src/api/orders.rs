//! Order placement endpoint.
//!
//! The handler stays thin: cart validation, server-side pricing and the
//! transactional write all live in the order model. Authentication is
//! enforced by the `User` extractor before any storage work happens.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::db::{Order, OrderResponse, PlaceOrderRequest, User};
use crate::AppState;

use super::error::ApiError;

/// Place an order from the submitted cart
pub async fn place_order(
    State(state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = Order::place(&state.db, &user.id, &request.items).await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %order.user_id,
        total_cents = order.total_cents,
        "Order placed"
    );

    Ok((StatusCode::CREATED, Json(order.into())))
}
