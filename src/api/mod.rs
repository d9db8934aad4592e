pub mod auth;
mod catalog;
mod error;
mod orders;
mod reviews;
mod validation;

pub use error::{ApiError, ErrorResponse};

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public; logout authenticates via the User extractor)
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout));

    let api_routes = Router::new()
        // Catalog (public; listing enriches per-user when a session is present)
        .route("/books", get(catalog::list_books))
        .route("/books/:id", get(catalog::get_book))
        .route("/genres", get(catalog::list_genres))
        // Reviews
        .route(
            "/books/:id/reviews",
            get(reviews::list_reviews).post(reviews::submit_review),
        )
        .route(
            "/books/:id/review-eligibility",
            get(reviews::review_eligibility),
        )
        // Orders
        .route("/orders", post(orders::place_order));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
