//! Order engine: cart validation, server-side pricing, atomic persistence.
//!
//! Clients submit only `{book_id, quantity}` pairs. Unit prices are loaded
//! from the catalog in a single query and snapshotted onto the line items,
//! so later catalog price changes never alter a placed order.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::money::format_cents;

/// Upper bound on cart lines per order
pub const MAX_CART_LINES: usize = 100;
/// Upper bound on the quantity of a single line
pub const MAX_QUANTITY: i64 = 9_999;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Cart must contain at least one item")]
    EmptyCart,
    #[error("Cart has too many lines (max {MAX_CART_LINES})")]
    TooManyLines,
    #[error("Quantity must be a positive integer (max {MAX_QUANTITY})")]
    InvalidQuantity,
    #[error("Unknown book in cart: {0}")]
    UnknownBook(String),
    #[error("Order total is out of range")]
    TotalOutOfRange,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    pub book_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub total_cents: i64,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub book_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

/// A cart line with its server-side unit price attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub book_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub order_id: String,
    pub total_cents: i64,
    pub total: String,
    pub status: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            total: format_cents(order.total_cents),
            total_cents: order.total_cents,
            status: order.status,
        }
    }
}

/// Validate a submitted cart and merge repeated book ids into one line.
pub fn normalize_cart(items: &[CartItem]) -> Result<Vec<CartItem>, OrderError> {
    if items.is_empty() {
        return Err(OrderError::EmptyCart);
    }
    if items.len() > MAX_CART_LINES {
        return Err(OrderError::TooManyLines);
    }

    let mut merged: Vec<CartItem> = Vec::new();
    for item in items {
        if item.quantity < 1 || item.quantity > MAX_QUANTITY {
            return Err(OrderError::InvalidQuantity);
        }
        match merged.iter_mut().find(|line| line.book_id == item.book_id) {
            Some(line) => {
                line.quantity += item.quantity;
                if line.quantity > MAX_QUANTITY {
                    return Err(OrderError::InvalidQuantity);
                }
            }
            None => merged.push(item.clone()),
        }
    }
    Ok(merged)
}

impl Order {
    /// Attach the current catalog price to every cart line.
    ///
    /// Prices for all distinct book ids are loaded in one query. A line whose
    /// book id is missing from the result fails the whole order; a missing
    /// price must never reach the total computation.
    pub async fn price_cart(
        pool: &SqlitePool,
        items: &[CartItem],
    ) -> Result<Vec<PricedLine>, OrderError> {
        let placeholders = vec!["?"; items.len()].join(", ");
        let sql = format!("SELECT id, price_cents FROM books WHERE id IN ({placeholders})");

        let mut query = sqlx::query_as::<_, (String, i64)>(&sql);
        for item in items {
            query = query.bind(&item.book_id);
        }
        let prices: HashMap<String, i64> = query.fetch_all(pool).await?.into_iter().collect();

        items
            .iter()
            .map(|item| {
                let unit_price_cents = prices
                    .get(&item.book_id)
                    .copied()
                    .ok_or_else(|| OrderError::UnknownBook(item.book_id.clone()))?;
                Ok(PricedLine {
                    book_id: item.book_id.clone(),
                    quantity: item.quantity,
                    unit_price_cents,
                })
            })
            .collect()
    }

    /// Sum of unit price x quantity over all lines, in checked cent arithmetic.
    pub fn compute_total(lines: &[PricedLine]) -> Result<i64, OrderError> {
        let mut total: i64 = 0;
        for line in lines {
            let line_total = line
                .unit_price_cents
                .checked_mul(line.quantity)
                .ok_or(OrderError::TotalOutOfRange)?;
            total = total
                .checked_add(line_total)
                .ok_or(OrderError::TotalOutOfRange)?;
        }
        Ok(total)
    }

    /// Insert the order header and all line items in a single transaction.
    /// If any item insert fails, the header is rolled back with it.
    pub async fn persist(
        pool: &SqlitePool,
        user_id: &str,
        total_cents: i64,
        lines: &[PricedLine],
    ) -> Result<Order, OrderError> {
        let order = Order {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            total_cents,
            status: "completed".to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (id, user_id, total_cents, status, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&order.id)
        .bind(&order.user_id)
        .bind(order.total_cents)
        .bind(&order.status)
        .bind(&order.created_at)
        .execute(&mut *tx)
        .await?;

        for line in lines {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, book_id, quantity, unit_price_cents) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&order.id)
            .bind(&line.book_id)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(order)
    }

    /// The full order-placement workflow: validate, price, total, persist.
    pub async fn place(
        pool: &SqlitePool,
        user_id: &str,
        items: &[CartItem],
    ) -> Result<Order, OrderError> {
        let cart = normalize_cart(items)?;
        let lines = Self::price_cart(pool, &cart).await?;
        let total_cents = Self::compute_total(&lines)?;
        Self::persist(pool, user_id, total_cents, &lines).await
    }

    /// Line items of an order, in insertion order.
    pub async fn items(pool: &SqlitePool, order_id: &str) -> Result<Vec<OrderItem>, sqlx::Error> {
        sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = ? ORDER BY rowid",
        )
        .bind(order_id)
        .fetch_all(pool)
        .await
    }
}
