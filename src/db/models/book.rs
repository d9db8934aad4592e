//! Catalog models: books, authors, genres.
//!
//! Catalog data is read-only from the API's perspective. Prices live here
//! and nowhere else; order placement snapshots them, never trusts a client.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::money::format_cents;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author_id: String,
    pub price_cents: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Book {
    pub async fn find(pool: &sqlx::SqlitePool, id: &str) -> Result<Option<Book>, sqlx::Error> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Author {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Genre {
    pub id: String,
    pub name: String,
}

/// One row of the aggregated book listing query
#[derive(Debug, Clone, FromRow)]
pub struct BookListingRow {
    pub id: String,
    pub title: String,
    pub author: String,
    pub price_cents: i64,
    pub avg_rating: f64,
}

/// A book as presented in the catalog listing
#[derive(Debug, Clone, Serialize)]
pub struct BookSummary {
    pub id: String,
    pub title: String,
    pub author: String,
    pub price_cents: i64,
    /// 2-decimal string rendering of the price
    pub price: String,
    /// Average review rating rounded to one decimal, 0.0 when unreviewed
    pub avg_rating: f64,
    pub genres: Vec<String>,
    /// Whether the requesting user has a completed order containing this book
    pub has_ordered: bool,
}

impl BookSummary {
    pub fn from_row(row: BookListingRow, genres: Vec<String>, has_ordered: bool) -> Self {
        Self {
            id: row.id,
            title: row.title,
            author: row.author,
            price: format_cents(row.price_cents),
            price_cents: row.price_cents,
            avg_rating: (row.avg_rating * 10.0).round() / 10.0,
            genres,
            has_ordered,
        }
    }
}
