//! Review endpoints: eligibility, submission, listing.
//!
//! Submission re-validates everything the eligibility endpoint reports, so a
//! client that skips the eligibility call gets the same answers here.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{
    is_unique_violation, Book, Review, ReviewEligibility, ReviewWithReviewer,
    SubmitReviewRequest, User, MSG_ALREADY_REVIEWED, MSG_NOT_PURCHASED,
};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_rating, validate_review_text};

async fn require_book(pool: &sqlx::SqlitePool, id: &str) -> Result<Book, ApiError> {
    Book::find(pool, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Book not found"))
}

/// Whether the current user may review this book, and if not, why not
pub async fn review_eligibility(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(book_id): Path<String>,
) -> Result<Json<ReviewEligibility>, ApiError> {
    let book = require_book(&state.db, &book_id).await?;
    Ok(Json(
        Review::eligibility(&state.db, &user.id, &book.id).await?,
    ))
}

/// Submit a review for a purchased book
pub async fn submit_review(
    State(state): State<Arc<AppState>>,
    user: User,
    Path(book_id): Path<String>,
    Json(request): Json<SubmitReviewRequest>,
) -> Result<(StatusCode, Json<Review>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_rating(request.rating) {
        // Echo the rejected value so the client can re-display the form
        errors.add("rating", format!("{} (got {})", e, request.rating));
    }
    if let Err(e) = validate_review_text(&request.review_text) {
        errors.add("review_text", e);
    }
    errors.finish()?;

    let book = require_book(&state.db, &book_id).await?;

    if !Review::user_has_purchased(&state.db, &user.id, &book.id).await? {
        return Err(ApiError::forbidden(MSG_NOT_PURCHASED));
    }
    if Review::exists_for(&state.db, &user.id, &book.id).await? {
        return Err(ApiError::conflict(MSG_ALREADY_REVIEWED));
    }

    let review = match Review::create(
        &state.db,
        &user.id,
        &book.id,
        request.rating,
        &request.review_text,
    )
    .await
    {
        Ok(review) => review,
        // A concurrent duplicate that slipped past the pre-check
        Err(err) if is_unique_violation(&err) => {
            return Err(ApiError::conflict(MSG_ALREADY_REVIEWED))
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(
        review_id = %review.id,
        book_id = %review.book_id,
        user_id = %review.user_id,
        "Review submitted"
    );

    Ok((StatusCode::CREATED, Json(review)))
}

/// Reviews for a book, newest first
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<String>,
) -> Result<Json<Vec<ReviewWithReviewer>>, ApiError> {
    let book = require_book(&state.db, &book_id).await?;
    Ok(Json(Review::list_for_book(&state.db, &book.id).await?))
}
