use sqlx::{Pool, Postgres, postgres::PgPoolOptions};
use uuid::Uuid;

use crate::dtos::MovieSummaryDto;

mod movie;
pub use movie::{MovieExt, MovieFilter};

mod review;
pub use review::{ReviewExt, ReviewFilter, ReviewListRow, UserReviewStatRow};

mod user;
pub use user::UserExt;

mod watchlist;
pub use watchlist::{WatchlistExt, WatchlistFilter, WatchlistRow};

/// Explicitly constructed persistence handle. One `DBClient` wraps the
/// connection pool and is injected into every component through `AppState`;
/// nothing in the crate touches a process-wide connection.
#[derive(Debug, Clone)]
pub struct DBClient {
    pool: Pool<Postgres>,
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }

    /// Open a pool against `database_url` and wrap it.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(DBClient::new(pool))
    }

    /// One round-trip liveness probe, used at startup and by health checks.
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Drain and close the pool. Idempotent.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Movie columns aliased with a `movie_` prefix, flattened into the rows
/// that join reviews or watchlist items with their movie.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MovieSummaryRow {
    pub movie_title: String,
    pub movie_poster_url: String,
    pub movie_genre: Vec<String>,
    pub movie_release_year: i32,
    pub movie_director: String,
    pub movie_duration: i32,
    pub movie_average_rating: f64,
    pub movie_total_reviews: i32,
}

impl MovieSummaryRow {
    pub fn to_summary(&self, movie_id: Uuid) -> MovieSummaryDto {
        MovieSummaryDto {
            id: movie_id.to_string(),
            title: self.movie_title.to_owned(),
            poster_url: self.movie_poster_url.to_owned(),
            genre: self.movie_genre.to_owned(),
            release_year: self.movie_release_year,
            director: self.movie_director.to_owned(),
            duration: self.movie_duration,
            average_rating: self.movie_average_rating,
            total_reviews: self.movie_total_reviews,
        }
    }
}

/// SQL fragment selecting the `movie_` aliased columns for a joined movie
/// table aliased `m`.
pub(crate) const MOVIE_SUMMARY_COLUMNS: &str = "m.title AS movie_title, m.poster_url AS movie_poster_url, m.genre AS movie_genre, m.release_year AS movie_release_year, m.director AS movie_director, m.duration_minutes AS movie_duration, m.average_rating AS movie_average_rating, m.total_reviews AS movie_total_reviews";

pub(crate) fn sort_direction(sort_order: Option<&str>) -> &'static str {
    match sort_order {
        Some("asc") => "ASC",
        _ => "DESC",
    }
}
