use chrono::prelude::*;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// Fixed genre domain shared by `movies.genre` and `users.favorite_genres`.
/// Stored as TEXT[] in Postgres; membership is enforced at the validation
/// boundary, not by the database.
pub const GENRES: [&str; 17] = [
    "Action",
    "Adventure",
    "Comedy",
    "Crime",
    "Drama",
    "Fantasy",
    "Horror",
    "Mystery",
    "Romance",
    "Sci-Fi",
    "Thriller",
    "Western",
    "Animation",
    "Documentary",
    "Family",
    "Music",
    "War",
];

pub fn is_valid_genre(genre: &str) -> bool {
    GENRES.contains(&genre)
}

/// User role, stored as the PostgreSQL ENUM type "user_role".
/// Clients never see the role directly; it is serialized as the
/// `isAdmin` flag on profile DTOs.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    pub fn to_str(&self) -> &str {
        match self {
            UserRole::Admin => "admin",
            UserRole::User => "user",
        }
    }
}

/// Watchlist lifecycle state, stored as the PostgreSQL ENUM type
/// "watchlist_status". Wire format is snake_case (want_to_watch, ...).
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "watchlist_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WatchlistStatus {
    WantToWatch,
    Watching,
    Watched,
    OnHold,
    Dropped,
}

/// Watchlist priority, stored as the PostgreSQL ENUM type "watchlist_priority".
#[derive(Debug, Deserialize, Serialize, Clone, Copy, sqlx::Type, PartialEq)]
#[sqlx(type_name = "watchlist_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WatchlistPriority {
    Low,
    Medium,
    High,
}

/// A single cast credit, stored inside the movies.cast_members JSONB column.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CastMember {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// User model representing the users table.
///
/// `password` holds the Argon2id hash and is never serialized out through
/// DTOs. The total_reviews / average_rating / movies_watched columns are
/// denormalized stats refreshed by `UserExt::update_user_stats`.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
    pub bio: String,
    pub favorite_genres: Vec<String>,
    pub total_reviews: i32,
    pub average_rating: f64,
    pub movies_watched: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Movie model representing the movies table.
///
/// average_rating, total_reviews and the rating_dist_* columns are derived
/// from the set of active reviews and refreshed by
/// `MovieExt::update_movie_stats` after each review write. Soft delete is
/// the is_active flag; listings only ever see active movies.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub genre: Vec<String>,
    pub release_year: i32,
    pub director: String,
    pub cast_members: Json<Vec<CastMember>>,
    pub synopsis: String,
    pub poster_url: String,
    pub trailer_url: Option<String>,
    pub duration_minutes: i32,
    pub language: String,
    pub country: String,
    pub budget: Option<i64>,
    pub box_office: Option<i64>,
    pub imdb_rating: Option<f64>,
    pub rotten_tomatoes_rating: Option<f64>,
    pub average_rating: f64,
    pub total_reviews: i32,
    pub rating_dist_1: i32,
    pub rating_dist_2: i32,
    pub rating_dist_3: i32,
    pub rating_dist_4: i32,
    pub rating_dist_5: i32,
    pub is_active: bool,
    pub added_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Review model representing the reviews table.
///
/// A partial unique index on (user_id, movie_id) WHERE is_active enforces
/// the one-active-review-per-user-per-movie invariant at the store level.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub movie_id: Uuid,
    pub rating: i32,
    pub review_text: String,
    pub title: String,
    pub is_recommended: bool,
    pub helpful_votes: i32,
    pub total_votes: i32,
    pub is_edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub is_spoiler: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// Share of votes that found this review helpful, as a whole percentage.
    pub fn helpfulness_ratio(&self) -> i32 {
        if self.total_votes == 0 {
            return 0;
        }
        ((self.helpful_votes as f64 / self.total_votes as f64) * 100.0).round() as i32
    }
}

/// Watchlist entry representing the watchlist table.
///
/// Unique on (user_id, movie_id): a movie appears at most once per user.
#[derive(Debug, Deserialize, Serialize, sqlx::FromRow, Clone)]
pub struct WatchlistItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub movie_id: Uuid,
    pub date_added: DateTime<Utc>,
    pub status: WatchlistStatus,
    pub priority: WatchlistPriority,
    pub notes: String,
    pub watched_date: Option<DateTime<Utc>>,
    pub personal_rating: Option<i32>,
    pub is_private: bool,
    pub tags: Vec<String>,
    pub reminder_enabled: bool,
    pub reminder_date: Option<DateTime<Utc>>,
    pub reminder_notified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WatchlistItem {
    /// Resolve the watched_date that should be stored after moving this
    /// item to `new_status`: entering Watched stamps the current time
    /// (keeping an existing stamp), leaving Watched clears it.
    pub fn watched_date_after(&self, new_status: WatchlistStatus) -> Option<DateTime<Utc>> {
        match new_status {
            WatchlistStatus::Watched => self.watched_date.or_else(|| Some(Utc::now())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item_with(status: WatchlistStatus, watched_date: Option<DateTime<Utc>>) -> WatchlistItem {
        WatchlistItem {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            movie_id: Uuid::new_v4(),
            date_added: Utc::now(),
            status,
            priority: WatchlistPriority::Medium,
            notes: String::new(),
            watched_date,
            personal_rating: None,
            is_private: false,
            tags: vec![],
            reminder_enabled: false,
            reminder_date: None,
            reminder_notified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn entering_watched_stamps_current_time() {
        let item = item_with(WatchlistStatus::WantToWatch, None);
        let stamped = item.watched_date_after(WatchlistStatus::Watched);
        assert!(stamped.is_some());
    }

    #[test]
    fn entering_watched_keeps_existing_stamp() {
        let earlier = Utc::now() - Duration::days(3);
        let item = item_with(WatchlistStatus::OnHold, Some(earlier));
        assert_eq!(
            item.watched_date_after(WatchlistStatus::Watched),
            Some(earlier)
        );
    }

    #[test]
    fn leaving_watched_clears_stamp() {
        let item = item_with(WatchlistStatus::Watched, Some(Utc::now()));
        assert_eq!(item.watched_date_after(WatchlistStatus::Dropped), None);
        assert_eq!(item.watched_date_after(WatchlistStatus::Watching), None);
    }

    #[test]
    fn helpfulness_ratio_rounds_to_whole_percent() {
        let mut review = Review {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            movie_id: Uuid::new_v4(),
            rating: 4,
            review_text: String::new(),
            title: String::new(),
            is_recommended: true,
            helpful_votes: 2,
            total_votes: 3,
            is_edited: false,
            edited_at: None,
            is_spoiler: false,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(review.helpfulness_ratio(), 67);

        review.helpful_votes = 0;
        review.total_votes = 0;
        assert_eq!(review.helpfulness_ratio(), 0);
    }

    #[test]
    fn genre_domain_membership() {
        assert!(is_valid_genre("Sci-Fi"));
        assert!(is_valid_genre("War"));
        assert!(!is_valid_genre("sci-fi"));
        assert!(!is_valid_genre("Telenovela"));
    }
}
