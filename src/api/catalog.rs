//! Catalog browsing endpoints.
//!
//! Read-only aggregation over books, authors, genres and review ratings.
//! When the request carries a valid session, each book also reports whether
//! the user has a completed order containing it, which the client uses to
//! offer the review action.

use axum::{
    extract::{Path, State},
    Json,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::db::{BookListingRow, BookSummary, Genre};
use crate::AppState;

use super::auth::MaybeUser;
use super::error::ApiError;

const LISTING_SELECT: &str = "SELECT b.id, b.title, \
    a.first_name || ' ' || a.last_name AS author, \
    b.price_cents, COALESCE(AVG(r.rating), 0.0) AS avg_rating \
    FROM books b \
    JOIN authors a ON b.author_id = a.id \
    LEFT JOIN reviews r ON b.id = r.book_id";

/// Book ids the user has a completed order for
async fn ordered_book_ids(
    pool: &sqlx::SqlitePool,
    user_id: &str,
) -> Result<HashSet<String>, sqlx::Error> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT oi.book_id FROM orders o \
         JOIN order_items oi ON o.id = oi.order_id \
         WHERE o.user_id = ? AND o.status = 'completed'",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Genre names keyed by book id
async fn genre_names_by_book(
    pool: &sqlx::SqlitePool,
) -> Result<HashMap<String, Vec<String>>, sqlx::Error> {
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT bg.book_id, g.name FROM book_genres bg \
         JOIN genres g ON bg.genre_id = g.genre_id \
         ORDER BY g.name",
    )
    .fetch_all(pool)
    .await?;

    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for (book_id, name) in rows {
        map.entry(book_id).or_default().push(name);
    }
    Ok(map)
}

/// List all books with author, rating aggregate and genres
pub async fn list_books(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
) -> Result<Json<Vec<BookSummary>>, ApiError> {
    let sql = format!("{LISTING_SELECT} GROUP BY b.id ORDER BY b.title");
    let rows = sqlx::query_as::<_, BookListingRow>(&sql)
        .fetch_all(&state.db)
        .await?;

    let mut genres = genre_names_by_book(&state.db).await?;

    let ordered = match &user {
        Some(user) => ordered_book_ids(&state.db, &user.id).await?,
        None => HashSet::new(),
    };

    let books = rows
        .into_iter()
        .map(|row| {
            let book_genres = genres.remove(&row.id).unwrap_or_default();
            let has_ordered = ordered.contains(&row.id);
            BookSummary::from_row(row, book_genres, has_ordered)
        })
        .collect();

    Ok(Json(books))
}

/// Fetch a single book by id
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    Path(id): Path<String>,
) -> Result<Json<BookSummary>, ApiError> {
    let sql = format!("{LISTING_SELECT} WHERE b.id = ? GROUP BY b.id");
    let row = sqlx::query_as::<_, BookListingRow>(&sql)
        .bind(&id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Book not found"))?;

    let genres: Vec<(String,)> = sqlx::query_as(
        "SELECT g.name FROM book_genres bg \
         JOIN genres g ON bg.genre_id = g.genre_id \
         WHERE bg.book_id = ? ORDER BY g.name",
    )
    .bind(&id)
    .fetch_all(&state.db)
    .await?;

    let has_ordered = match &user {
        Some(user) => ordered_book_ids(&state.db, &user.id).await?.contains(&id),
        None => false,
    };

    Ok(Json(BookSummary::from_row(
        row,
        genres.into_iter().map(|(name,)| name).collect(),
        has_ordered,
    )))
}

/// List all genres
pub async fn list_genres(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Genre>>, ApiError> {
    let genres = sqlx::query_as::<_, Genre>("SELECT * FROM genres ORDER BY name")
        .fetch_all(&state.db)
        .await?;
    Ok(Json(genres))
}
