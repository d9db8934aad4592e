//! Database seeders for demo catalog data.
//!
//! The storefront is only browsable once there is something on the shelves,
//! so a fresh database gets a small catalog. Seeding is skipped entirely when
//! any book already exists.

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

/// Seed a demo catalog (authors, genres, books) into an empty database.
pub async fn seed_demo_catalog(pool: &SqlitePool) -> Result<()> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
        .fetch_one(pool)
        .await?;
    if count.0 > 0 {
        return Ok(());
    }

    info!("Seeding demo catalog...");

    // (first_name, last_name)
    let authors = [
        ("Ursula", "Le Guin"),
        ("Octavia", "Butler"),
        ("Italo", "Calvino"),
        ("Shirley", "Jackson"),
    ];

    let genres = ["Science Fiction", "Fantasy", "Horror", "Literary Fiction"];

    // (title, author index, price in cents, genre indices)
    let books: [(&str, usize, i64, &[usize]); 6] = [
        ("The Dispossessed", 0, 1250, &[0]),
        ("A Wizard of Earthsea", 0, 999, &[1]),
        ("Kindred", 1, 1450, &[0, 3]),
        ("Parable of the Sower", 1, 1399, &[0]),
        ("Invisible Cities", 2, 1150, &[3, 1]),
        ("The Haunting of Hill House", 3, 1099, &[2]),
    ];

    let mut author_ids = Vec::new();
    for (first_name, last_name) in authors {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO authors (id, first_name, last_name) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(first_name)
            .bind(last_name)
            .execute(pool)
            .await?;
        author_ids.push(id);
    }

    let mut genre_ids = Vec::new();
    for name in genres {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO genres (id, name) VALUES (?, ?)")
            .bind(&id)
            .bind(name)
            .execute(pool)
            .await?;
        genre_ids.push(id);
    }

    for (title, author_idx, price_cents, book_genres) in books {
        let id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO books (id, title, author_id, price_cents) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(title)
            .bind(&author_ids[author_idx])
            .bind(price_cents)
            .execute(pool)
            .await?;
        for genre_idx in book_genres {
            sqlx::query("INSERT INTO book_genres (book_id, genre_id) VALUES (?, ?)")
                .bind(&id)
                .bind(&genre_ids[*genre_idx])
                .execute(pool)
                .await?;
        }
    }

    info!(
        "Seeded {} authors, {} genres, {} books",
        authors.len(),
        genres.len(),
        books.len()
    );
    Ok(())
}
