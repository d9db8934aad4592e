//! Review gate: purchase-gated reviews, one per user per book.
//!
//! A (user, book) pair moves through three states: not purchased, purchased
//! but unreviewed, reviewed. Only the middle state permits submission, and
//! the transition to reviewed is terminal.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

/// Message shown when the user has no completed order containing the book
pub const MSG_NOT_PURCHASED: &str = "You must purchase this book before reviewing it";
/// Message shown for a second review attempt, whether caught by the
/// pre-check or by the UNIQUE constraint
pub const MSG_ALREADY_REVIEWED: &str = "You have already reviewed this book";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Review {
    pub id: String,
    pub book_id: String,
    pub user_id: String,
    pub rating: i64,
    pub review_text: String,
    pub posted_at: String,
}

/// A review joined with the reviewer's display name, for listings
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewWithReviewer {
    pub rating: i64,
    pub review_text: String,
    pub posted_at: String,
    pub reviewer: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitReviewRequest {
    pub rating: i64,
    #[serde(default)]
    pub review_text: String,
}

#[derive(Debug, Serialize)]
pub struct ReviewEligibility {
    pub can_review: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Review {
    /// Whether the user has at least one completed order containing the book.
    /// A pure existence check, independent of quantity or recency.
    pub async fn user_has_purchased(
        pool: &SqlitePool,
        user_id: &str,
        book_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM orders o \
             JOIN order_items oi ON o.id = oi.order_id \
             WHERE o.user_id = ? AND o.status = 'completed' AND oi.book_id = ?",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_one(pool)
        .await?;
        Ok(count.0 > 0)
    }

    /// Whether the user has already reviewed the book.
    pub async fn exists_for(
        pool: &SqlitePool,
        user_id: &str,
        book_id: &str,
    ) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM reviews WHERE user_id = ? AND book_id = ? LIMIT 1")
                .bind(user_id)
                .bind(book_id)
                .fetch_optional(pool)
                .await?;
        Ok(row.is_some())
    }

    /// Resolve the (user, book) state into an eligibility answer.
    pub async fn eligibility(
        pool: &SqlitePool,
        user_id: &str,
        book_id: &str,
    ) -> Result<ReviewEligibility, sqlx::Error> {
        if !Self::user_has_purchased(pool, user_id, book_id).await? {
            return Ok(ReviewEligibility {
                can_review: false,
                reason: Some(MSG_NOT_PURCHASED.to_string()),
            });
        }
        if Self::exists_for(pool, user_id, book_id).await? {
            return Ok(ReviewEligibility {
                can_review: false,
                reason: Some(MSG_ALREADY_REVIEWED.to_string()),
            });
        }
        Ok(ReviewEligibility {
            can_review: true,
            reason: None,
        })
    }

    /// Insert a review with a server-assigned timestamp.
    ///
    /// Callers must treat a UNIQUE-constraint failure as "already reviewed":
    /// two concurrent submissions can both pass the pre-check, and the loser
    /// of that race lands here.
    pub async fn create(
        pool: &SqlitePool,
        user_id: &str,
        book_id: &str,
        rating: i64,
        review_text: &str,
    ) -> Result<Review, sqlx::Error> {
        let review = Review {
            id: Uuid::new_v4().to_string(),
            book_id: book_id.to_string(),
            user_id: user_id.to_string(),
            rating,
            review_text: review_text.to_string(),
            posted_at: chrono::Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO reviews (id, book_id, user_id, rating, review_text, posted_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&review.id)
        .bind(&review.book_id)
        .bind(&review.user_id)
        .bind(review.rating)
        .bind(&review.review_text)
        .bind(&review.posted_at)
        .execute(pool)
        .await?;

        Ok(review)
    }

    /// Reviews for a book with reviewer display names, newest first.
    pub async fn list_for_book(
        pool: &SqlitePool,
        book_id: &str,
    ) -> Result<Vec<ReviewWithReviewer>, sqlx::Error> {
        sqlx::query_as::<_, ReviewWithReviewer>(
            "SELECT r.rating, r.review_text, r.posted_at, \
             u.first_name || ' ' || u.last_name AS reviewer \
             FROM reviews r \
             JOIN users u ON r.user_id = u.id \
             WHERE r.book_id = ? \
             ORDER BY r.posted_at DESC",
        )
        .bind(book_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{is_unique_violation, run_migrations};
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    /// In-memory SQLite pool with the full schema applied
    async fn test_pool() -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    async fn seed_book(pool: &SqlitePool, id: &str) {
        sqlx::query(
            "INSERT OR IGNORE INTO authors (id, first_name, last_name) VALUES ('a1', 'Test', 'Author')",
        )
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO books (id, title, author_id, price_cents) VALUES (?, ?, 'a1', 1000)",
        )
        .bind(id)
        .bind(format!("Book {id}"))
        .execute(pool)
        .await
        .unwrap();
    }

    async fn seed_user(pool: &SqlitePool, id: &str, first_name: &str, last_name: &str) {
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, password_hash) VALUES (?, ?, ?, ?, 'x')",
        )
        .bind(id)
        .bind(first_name)
        .bind(last_name)
        .bind(format!("{id}@example.com"))
        .execute(pool)
        .await
        .unwrap();
    }

    async fn seed_order(pool: &SqlitePool, user_id: &str, book_id: &str, status: &str) {
        let order_id = format!("o-{user_id}-{book_id}-{status}");
        sqlx::query(
            "INSERT INTO orders (id, user_id, total_cents, status) VALUES (?, ?, 1000, ?)",
        )
        .bind(&order_id)
        .bind(user_id)
        .bind(status)
        .execute(pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO order_items (id, order_id, book_id, quantity, unit_price_cents) \
             VALUES (?, ?, ?, 1, 1000)",
        )
        .bind(format!("{order_id}-item"))
        .bind(&order_id)
        .bind(book_id)
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_not_purchased_cannot_review() {
        let pool = test_pool().await;
        seed_user(&pool, "u1", "Avery", "Reader").await;
        seed_book(&pool, "b1").await;

        assert!(!Review::user_has_purchased(&pool, "u1", "b1").await.unwrap());

        let eligibility = Review::eligibility(&pool, "u1", "b1").await.unwrap();
        assert!(!eligibility.can_review);
        assert_eq!(eligibility.reason.as_deref(), Some(MSG_NOT_PURCHASED));
    }

    #[tokio::test]
    async fn test_completed_purchase_unlocks_review() {
        let pool = test_pool().await;
        seed_user(&pool, "u1", "Avery", "Reader").await;
        seed_book(&pool, "b1").await;
        seed_book(&pool, "b2").await;
        seed_order(&pool, "u1", "b1", "completed").await;

        let eligibility = Review::eligibility(&pool, "u1", "b1").await.unwrap();
        assert!(eligibility.can_review);
        assert!(eligibility.reason.is_none());

        // The purchase of b1 says nothing about b2
        let other = Review::eligibility(&pool, "u1", "b2").await.unwrap();
        assert!(!other.can_review);
    }

    #[tokio::test]
    async fn test_non_completed_order_does_not_unlock() {
        let pool = test_pool().await;
        seed_user(&pool, "u1", "Avery", "Reader").await;
        seed_book(&pool, "b1").await;
        seed_order(&pool, "u1", "b1", "cancelled").await;

        assert!(!Review::user_has_purchased(&pool, "u1", "b1").await.unwrap());
    }

    #[tokio::test]
    async fn test_single_review_per_user_per_book() {
        let pool = test_pool().await;
        seed_user(&pool, "u1", "Avery", "Reader").await;
        seed_book(&pool, "b1").await;
        seed_order(&pool, "u1", "b1", "completed").await;

        let review = Review::create(&pool, "u1", "b1", 4, "Loved it").await.unwrap();
        assert_eq!(review.rating, 4);
        assert!(Review::exists_for(&pool, "u1", "b1").await.unwrap());

        let eligibility = Review::eligibility(&pool, "u1", "b1").await.unwrap();
        assert!(!eligibility.can_review);
        assert_eq!(eligibility.reason.as_deref(), Some(MSG_ALREADY_REVIEWED));

        // The loser of a concurrent race skips the pre-check and must fail
        // cleanly on the UNIQUE constraint
        let duplicate = Review::create(&pool, "u1", "b1", 5, "Again").await;
        match duplicate {
            Err(err) => assert!(is_unique_violation(&err)),
            Ok(_) => panic!("duplicate review must not be inserted"),
        }

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reviews")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }

    #[tokio::test]
    async fn test_list_for_book_newest_first_with_reviewer() {
        let pool = test_pool().await;
        seed_user(&pool, "u1", "Avery", "Reader").await;
        seed_user(&pool, "u2", "Blake", "Bookworm").await;
        seed_book(&pool, "b1").await;

        sqlx::query(
            "INSERT INTO reviews (id, book_id, user_id, rating, review_text, posted_at) \
             VALUES ('r1', 'b1', 'u1', 3, 'Fine', '2026-01-01T10:00:00Z')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO reviews (id, book_id, user_id, rating, review_text, posted_at) \
             VALUES ('r2', 'b1', 'u2', 5, 'Superb', '2026-02-01T10:00:00Z')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let reviews = Review::list_for_book(&pool, "b1").await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].reviewer, "Blake Bookworm");
        assert_eq!(reviews[0].rating, 5);
        assert_eq!(reviews[1].reviewer, "Avery Reader");
    }
}
