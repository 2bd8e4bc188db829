use crate::error::HttpError;
use crate::models::{
    CastMember, Movie, Review, User, WatchlistItem, WatchlistPriority, WatchlistStatus,
    is_valid_genre,
};
use crate::utils::stats::{RatingDistribution, WatchlistStats};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::{Validate, ValidationError};

// DTOs define the JSON exchanged with clients, separate from the database
// models so the wire shape (camelCase, no password field, nested stats)
// is controlled in one place. Every success payload is wrapped in a
// { success: true, message?, data } envelope; errors use ErrorResponse.

// ============================================================================
// Extractors with enveloped rejections
// ============================================================================

/// `axum::Json` with its rejection converted into the JSON error envelope,
/// so malformed bodies never surface as bare text responses.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(HttpError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        HttpError::bad_request(rejection.body_text())
    }
}

/// `axum::extract::Query` with the same enveloped rejection treatment.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(HttpError))]
pub struct AppQuery<T>(pub T);

impl From<QueryRejection> for HttpError {
    fn from(rejection: QueryRejection) -> Self {
        HttpError::bad_request(rejection.body_text())
    }
}

// ============================================================================
// Shared validation helpers
// ============================================================================

fn validation_error(code: &'static str, message: &str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(message.to_string().into());
    error
}

fn validate_genre_list(genres: &Vec<String>) -> Result<(), ValidationError> {
    for genre in genres {
        if !is_valid_genre(genre) {
            return Err(validation_error("invalid_genre", "Invalid genre"));
        }
    }
    Ok(())
}

fn validate_genre_list_nonempty(genres: &Vec<String>) -> Result<(), ValidationError> {
    if genres.is_empty() {
        return Err(validation_error(
            "genre_required",
            "At least one genre is required",
        ));
    }
    validate_genre_list(genres)
}

fn validate_release_year(year: i32) -> Result<(), ValidationError> {
    let max_year = Utc::now().year() + 2;
    if year < 1888 || year > max_year {
        return Err(validation_error("invalid_release_year", "Invalid release year"));
    }
    Ok(())
}

const IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".webp", ".gif"];

fn validate_poster_url(url: &str) -> Result<(), ValidationError> {
    let lowered = url.to_lowercase();
    let is_http = lowered.starts_with("http://") || lowered.starts_with("https://");
    let is_image = IMAGE_EXTENSIONS.iter().any(|ext| lowered.ends_with(ext));
    if !is_http || !is_image {
        return Err(validation_error(
            "invalid_poster_url",
            "Poster URL must be a valid image URL",
        ));
    }
    Ok(())
}

fn validate_tag_list(tags: &Vec<String>) -> Result<(), ValidationError> {
    for tag in tags {
        if tag.is_empty() || tag.len() > 50 {
            return Err(validation_error(
                "invalid_tag",
                "Each tag must be between 1 and 50 characters",
            ));
        }
    }
    Ok(())
}

fn validate_cast_list(cast: &Vec<CastMember>) -> Result<(), ValidationError> {
    for member in cast {
        if member.name.trim().is_empty() {
            return Err(validation_error(
                "invalid_cast_member",
                "Cast member name is required",
            ));
        }
    }
    Ok(())
}

fn validate_sort_order(sort_order: &str) -> Result<(), ValidationError> {
    if sort_order == "asc" || sort_order == "desc" {
        Ok(())
    } else {
        Err(validation_error(
            "invalid_sort_order",
            "Sort order must be asc or desc",
        ))
    }
}

fn validate_movie_sort(sort_by: &str) -> Result<(), ValidationError> {
    match sort_by {
        "title" | "releaseYear" | "averageRating" | "totalReviews" | "createdAt" => Ok(()),
        _ => Err(validation_error("invalid_sort", "Invalid sort field")),
    }
}

fn validate_review_sort(sort_by: &str) -> Result<(), ValidationError> {
    match sort_by {
        "createdAt" | "rating" | "helpfulVotes" => Ok(()),
        _ => Err(validation_error("invalid_sort", "Invalid sort field")),
    }
}

fn validate_user_sort(sort_by: &str) -> Result<(), ValidationError> {
    match sort_by {
        "username" | "email" | "createdAt" => Ok(()),
        _ => Err(validation_error("invalid_sort", "Invalid sort field")),
    }
}

fn validate_watchlist_sort(sort_by: &str) -> Result<(), ValidationError> {
    match sort_by {
        "dateAdded" | "priority" | "status" | "createdAt" => Ok(()),
        _ => Err(validation_error("invalid_sort", "Invalid sort field")),
    }
}

/// Split a comma-separated query value into trimmed, non-empty tokens.
/// Filters that accept "exact or set" inputs (genre, rating, status) are
/// sent as a single comma-joined parameter.
pub fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn validate_genre_csv(raw: &str) -> Result<(), ValidationError> {
    let tokens = split_csv(raw);
    validate_genre_list_nonempty(&tokens)
}

fn validate_rating_csv(raw: &str) -> Result<(), ValidationError> {
    let tokens = split_csv(raw);
    if tokens.is_empty() {
        return Err(validation_error("invalid_rating", "Rating filter is empty"));
    }
    for token in tokens {
        match token.parse::<i32>() {
            Ok(rating) if (1..=5).contains(&rating) => {}
            _ => {
                return Err(validation_error(
                    "invalid_rating",
                    "Rating must be between 1 and 5",
                ));
            }
        }
    }
    Ok(())
}

fn validate_status_csv(raw: &str) -> Result<(), ValidationError> {
    const STATUSES: [&str; 5] = ["want_to_watch", "watching", "watched", "on_hold", "dropped"];
    let tokens = split_csv(raw);
    if tokens.is_empty() || tokens.iter().any(|t| !STATUSES.contains(&t.as_str())) {
        return Err(validation_error("invalid_status", "Invalid status"));
    }
    Ok(())
}

// ============================================================================
// Generic envelope DTOs
// ============================================================================

/// Bare success envelope for operations with no payload.
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    pub message: String,
}

/// Pagination block attached to every listing response.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current: i64,
    pub pages: i64,
    pub total: i64,
    pub limit: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let pages = if limit > 0 {
            (total + limit - 1) / limit
        } else {
            0
        };
        Pagination {
            current: page,
            pages,
            total,
            limit,
            has_next: page < pages,
            has_prev: page > 1,
        }
    }
}

// ============================================================================
// Auth DTOs
// ============================================================================

/// Registration request; passwords must match before anything is persisted.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct RegisterUserDto {
    #[validate(length(
        min = 3,
        max = 30,
        message = "Username must be between 3 and 30 characters"
    ))]
    pub username: String,

    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Please provide a valid email")
    )]
    pub email: String,

    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,

    #[validate(
        length(min = 1, message = "Confirm Password is required"),
        must_match(other = "password", message = "Passwords do not match")
    )]
    #[serde(rename = "confirmPassword")]
    pub password_confirm: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    #[validate(
        length(min = 1, message = "Email is required"),
        email(message = "Please provide a valid email")
    )]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Password change request for an authenticated user.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordDto {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 6, message = "New password must be at least 6 characters long"))]
    pub new_password: String,
}

/// Identity block returned by register/login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthUserDto {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthData {
    pub token: String,
    pub user: AuthUserDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponseDto {
    pub success: bool,
    pub message: String,
    pub data: AuthData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenData {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponseDto {
    pub success: bool,
    pub message: String,
    pub data: TokenData,
}

// ============================================================================
// User DTOs
// ============================================================================

/// Denormalized per-user stats as stored on the users table.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserStatsDto {
    pub total_reviews: i32,
    pub average_rating: f64,
    pub movies_watched: i32,
}

/// Full profile of the authenticated user (GET /api/auth/me).
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub id: String,
    pub username: String,
    pub email: String,
    pub bio: String,
    pub favorite_genres: Vec<String>,
    pub is_admin: bool,
    pub stats: UserStatsDto,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileDto {
    pub fn from_user(user: &User) -> Self {
        ProfileDto {
            id: user.id.to_string(),
            username: user.username.to_owned(),
            email: user.email.to_owned(),
            bio: user.bio.to_owned(),
            favorite_genres: user.favorite_genres.to_owned(),
            is_admin: user.role.is_admin(),
            stats: UserStatsDto {
                total_reviews: user.total_reviews,
                average_rating: user.average_rating,
                movies_watched: user.movies_watched,
            },
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileData {
    pub user: ProfileDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponseDto {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: ProfileData,
}

/// Profile update; every field optional, validated when present.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileDto {
    #[validate(length(
        min = 3,
        max = 30,
        message = "Username must be between 3 and 30 characters"
    ))]
    pub username: Option<String>,

    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,

    #[validate(length(max = 500, message = "Bio cannot exceed 500 characters"))]
    pub bio: Option<String>,

    #[validate(custom(function = "validate_genre_list"))]
    pub favorite_genres: Option<Vec<String>>,
}

/// Admin listing query (GET /api/users).
#[derive(Validate, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQueryDto {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,

    #[validate(length(min = 1))]
    pub search: Option<String>,

    #[validate(custom(function = "validate_user_sort"))]
    pub sort_by: Option<String>,

    #[validate(custom(function = "validate_sort_order"))]
    pub sort_order: Option<String>,
}

/// Public profile stats block: stored counters overlaid with the freshly
/// aggregated distribution.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicStatsDto {
    pub total_reviews: i64,
    pub average_rating: f64,
    pub movies_watched: i32,
    pub rating_distribution: RatingDistribution,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfileDto {
    pub id: String,
    pub username: String,
    pub bio: String,
    pub favorite_genres: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub stats: PublicStatsDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileData {
    pub user: PublicProfileDto,
    pub recent_reviews: Vec<ReviewDto>,
}

#[derive(Debug, Serialize)]
pub struct UserProfileResponseDto {
    pub success: bool,
    pub data: UserProfileData,
}

/// Admin-facing user row (includes email and the admin flag).
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserDto {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub stats: UserStatsDto,
    pub created_at: DateTime<Utc>,
}

impl AdminUserDto {
    pub fn from_user(user: &User) -> Self {
        AdminUserDto {
            id: user.id.to_string(),
            username: user.username.to_owned(),
            email: user.email.to_owned(),
            is_admin: user.role.is_admin(),
            stats: UserStatsDto {
                total_reviews: user.total_reviews,
                average_rating: user.average_rating,
                movies_watched: user.movies_watched,
            },
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserListData {
    pub users: Vec<AdminUserDto>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct UserListResponseDto {
    pub success: bool,
    pub data: UserListData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreCountDto {
    pub genre: String,
    pub count: i64,
}

/// Detailed statistics block (GET /api/users/:id/stats).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedUserStatsDto {
    pub total_reviews: i64,
    pub average_rating: f64,
    pub rating_distribution: RatingDistribution,
    pub favorite_genres: Vec<GenreCountDto>,
    pub reviews_by_decade: BTreeMap<String, i64>,
    pub helpfulness_ratio: i64,
    pub total_helpful_votes: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRefDto {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct UserStatsData {
    pub user: UserRefDto,
    pub stats: DetailedUserStatsDto,
}

#[derive(Debug, Serialize)]
pub struct UserStatsResponseDto {
    pub success: bool,
    pub data: UserStatsData,
}

#[derive(Debug, Serialize)]
pub struct UserReviewsData {
    pub reviews: Vec<ReviewDto>,
    pub user: UserRefDto,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct UserReviewsResponseDto {
    pub success: bool,
    pub data: UserReviewsData,
}

// ============================================================================
// Movie DTOs
// ============================================================================

/// External rating sources carried on the movie record.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRatingsDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imdb_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotten_tomatoes_rating: Option<f64>,
}

/// Movie creation payload (POST /api/movies, admin only).
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieCreateDto {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(custom(function = "validate_genre_list_nonempty"))]
    pub genre: Vec<String>,

    #[validate(custom(function = "validate_release_year"))]
    pub release_year: i32,

    #[validate(length(
        min = 1,
        max = 100,
        message = "Director must be between 1 and 100 characters"
    ))]
    pub director: String,

    #[validate(custom(function = "validate_cast_list"))]
    #[serde(default)]
    pub cast: Vec<CastMember>,

    #[validate(length(
        min = 1,
        max = 2000,
        message = "Synopsis must be between 1 and 2000 characters"
    ))]
    pub synopsis: String,

    #[validate(custom(function = "validate_poster_url"))]
    pub poster_url: String,

    #[validate(url(message = "Please provide a valid trailer URL"))]
    pub trailer_url: Option<String>,

    #[validate(range(min = 1, message = "Duration must be at least 1 minute"))]
    pub duration: i32,

    #[validate(length(min = 1, message = "Language is required"))]
    pub language: String,

    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,

    #[validate(range(min = 0, message = "Budget cannot be negative"))]
    pub budget: Option<i64>,

    #[validate(range(min = 0, message = "Box office cannot be negative"))]
    pub box_office: Option<i64>,

    #[validate(range(min = 0.0, max = 10.0, message = "IMDB rating must be between 0 and 10"))]
    pub imdb_rating: Option<f64>,

    #[validate(range(
        min = 0.0,
        max = 100.0,
        message = "Rotten Tomatoes rating must be between 0 and 100"
    ))]
    pub rotten_tomatoes_rating: Option<f64>,
}

/// Movie update payload (PUT /api/movies/:id, admin only). Partial: only
/// present fields are applied.
#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieUpdateDto {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,

    #[validate(custom(function = "validate_genre_list_nonempty"))]
    pub genre: Option<Vec<String>>,

    #[validate(custom(function = "validate_release_year"))]
    pub release_year: Option<i32>,

    #[validate(length(
        min = 1,
        max = 100,
        message = "Director must be between 1 and 100 characters"
    ))]
    pub director: Option<String>,

    #[validate(custom(function = "validate_cast_list"))]
    pub cast: Option<Vec<CastMember>>,

    #[validate(length(
        min = 1,
        max = 2000,
        message = "Synopsis must be between 1 and 2000 characters"
    ))]
    pub synopsis: Option<String>,

    #[validate(custom(function = "validate_poster_url"))]
    pub poster_url: Option<String>,

    #[validate(url(message = "Please provide a valid trailer URL"))]
    pub trailer_url: Option<String>,

    #[validate(range(min = 1, message = "Duration must be at least 1 minute"))]
    pub duration: Option<i32>,

    #[validate(length(min = 1, message = "Language is required"))]
    pub language: Option<String>,

    #[validate(length(min = 1, message = "Country is required"))]
    pub country: Option<String>,

    #[validate(range(min = 0, message = "Budget cannot be negative"))]
    pub budget: Option<i64>,

    #[validate(range(min = 0, message = "Box office cannot be negative"))]
    pub box_office: Option<i64>,

    #[validate(range(min = 0.0, max = 10.0, message = "IMDB rating must be between 0 and 10"))]
    pub imdb_rating: Option<f64>,

    #[validate(range(
        min = 0.0,
        max = 100.0,
        message = "Rotten Tomatoes rating must be between 0 and 100"
    ))]
    pub rotten_tomatoes_rating: Option<f64>,
}

/// Catalog listing query (GET /api/movies).
#[derive(Validate, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieQueryDto {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,

    /// Single genre or comma-separated set.
    #[validate(custom(function = "validate_genre_csv"))]
    pub genre: Option<String>,

    #[validate(custom(function = "validate_release_year"))]
    pub release_year: Option<i32>,

    #[validate(custom(function = "validate_release_year"))]
    pub year_min: Option<i32>,

    #[validate(custom(function = "validate_release_year"))]
    pub year_max: Option<i32>,

    #[validate(length(min = 1))]
    pub director: Option<String>,

    #[validate(range(min = 0.0, max = 5.0, message = "Min rating must be between 0 and 5"))]
    pub min_rating: Option<f64>,

    #[validate(range(min = 0.0, max = 5.0, message = "Max rating must be between 0 and 5"))]
    pub max_rating: Option<f64>,

    #[validate(length(min = 1))]
    pub search: Option<String>,

    #[validate(custom(function = "validate_movie_sort"))]
    pub sort_by: Option<String>,

    #[validate(custom(function = "validate_sort_order"))]
    pub sort_order: Option<String>,
}

/// Quick-search query (GET /api/movies/search).
#[derive(Validate, Debug, Deserialize)]
pub struct SearchQueryDto {
    #[validate(length(min = 1, message = "Search query is required"))]
    pub q: String,

    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<u32>,
}

/// Full movie representation.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieDto {
    pub id: String,
    pub title: String,
    pub genre: Vec<String>,
    pub release_year: i32,
    pub director: String,
    pub cast: Vec<CastMember>,
    pub synopsis: String,
    pub poster_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailer_url: Option<String>,
    pub duration: i32,
    pub language: String,
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub box_office: Option<i64>,
    pub external_ratings: ExternalRatingsDto,
    pub average_rating: f64,
    pub total_reviews: i32,
    pub rating_distribution: RatingDistribution,
    pub added_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Movie> for MovieDto {
    fn from(movie: Movie) -> Self {
        MovieDto {
            id: movie.id.to_string(),
            title: movie.title,
            genre: movie.genre,
            release_year: movie.release_year,
            director: movie.director,
            cast: movie.cast_members.0,
            synopsis: movie.synopsis,
            poster_url: movie.poster_url,
            trailer_url: movie.trailer_url,
            duration: movie.duration_minutes,
            language: movie.language,
            country: movie.country,
            budget: movie.budget,
            box_office: movie.box_office,
            external_ratings: ExternalRatingsDto {
                imdb_rating: movie.imdb_rating,
                rotten_tomatoes_rating: movie.rotten_tomatoes_rating,
            },
            average_rating: movie.average_rating,
            total_reviews: movie.total_reviews,
            rating_distribution: RatingDistribution::from_counts([
                movie.rating_dist_1 as i64,
                movie.rating_dist_2 as i64,
                movie.rating_dist_3 as i64,
                movie.rating_dist_4 as i64,
                movie.rating_dist_5 as i64,
            ]),
            added_by: movie.added_by.to_string(),
            created_at: movie.created_at,
            updated_at: movie.updated_at,
        }
    }
}

/// Compact movie block used in search results, stats lists and joins.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MovieSummaryDto {
    pub id: String,
    pub title: String,
    pub poster_url: String,
    pub genre: Vec<String>,
    pub release_year: i32,
    pub director: String,
    pub duration: i32,
    pub average_rating: f64,
    pub total_reviews: i32,
}

impl From<&Movie> for MovieSummaryDto {
    fn from(movie: &Movie) -> Self {
        MovieSummaryDto {
            id: movie.id.to_string(),
            title: movie.title.to_owned(),
            poster_url: movie.poster_url.to_owned(),
            genre: movie.genre.to_owned(),
            release_year: movie.release_year,
            director: movie.director.to_owned(),
            duration: movie.duration_minutes,
            average_rating: movie.average_rating,
            total_reviews: movie.total_reviews,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovieListData {
    pub movies: Vec<MovieDto>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct MovieListResponseDto {
    pub success: bool,
    pub data: MovieListData,
}

#[derive(Debug, Serialize)]
pub struct MovieData {
    pub movie: MovieDto,
}

#[derive(Debug, Serialize)]
pub struct SingleMovieResponseDto {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: MovieData,
}

/// Catalog-wide aggregate block (GET /api/movies/stats).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogOverviewDto {
    pub total_movies: i64,
    pub average_rating: f64,
    pub total_reviews: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStatsData {
    pub overview: CatalogOverviewDto,
    pub genre_distribution: BTreeMap<String, i64>,
    pub top_rated_movies: Vec<MovieSummaryDto>,
    pub most_reviewed_movies: Vec<MovieSummaryDto>,
    pub recent_movies: Vec<MovieSummaryDto>,
}

#[derive(Debug, Serialize)]
pub struct CatalogStatsResponseDto {
    pub success: bool,
    pub data: CatalogStatsData,
}

#[derive(Debug, Serialize)]
pub struct SearchData {
    pub movies: Vec<MovieSummaryDto>,
    pub query: String,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct SearchResponseDto {
    pub success: bool,
    pub data: SearchData,
}

// ============================================================================
// Review DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewCreateDto {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,

    #[validate(length(max = 1000, message = "Review text cannot exceed 1000 characters"))]
    pub review_text: Option<String>,

    #[validate(length(max = 100, message = "Review title cannot exceed 100 characters"))]
    pub title: Option<String>,

    pub is_spoiler: Option<bool>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewUpdateDto {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i32>,

    #[validate(length(max = 1000, message = "Review text cannot exceed 1000 characters"))]
    pub review_text: Option<String>,

    #[validate(length(max = 100, message = "Review title cannot exceed 100 characters"))]
    pub title: Option<String>,

    pub is_spoiler: Option<bool>,

    pub is_recommended: Option<bool>,
}

#[derive(Validate, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewQueryDto {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,

    /// Exact rating or comma-separated set.
    #[validate(custom(function = "validate_rating_csv"))]
    pub rating: Option<String>,

    #[validate(custom(function = "validate_review_sort"))]
    pub sort_by: Option<String>,

    #[validate(custom(function = "validate_sort_order"))]
    pub sort_order: Option<String>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpfulVoteDto {
    pub is_helpful: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAuthorDto {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDto {
    pub id: String,
    pub user: ReviewAuthorDto,
    pub movie_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie: Option<MovieSummaryDto>,
    pub rating: i32,
    pub review_text: String,
    pub title: String,
    pub is_recommended: bool,
    pub helpful_votes: i32,
    pub total_votes: i32,
    pub helpfulness_ratio: i32,
    pub is_edited: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
    pub is_spoiler: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewDto {
    pub fn from_parts(
        review: &Review,
        author: ReviewAuthorDto,
        movie: Option<MovieSummaryDto>,
    ) -> Self {
        ReviewDto {
            id: review.id.to_string(),
            user: author,
            movie_id: review.movie_id.to_string(),
            movie,
            rating: review.rating,
            review_text: review.review_text.to_owned(),
            title: review.title.to_owned(),
            is_recommended: review.is_recommended,
            helpful_votes: review.helpful_votes,
            total_votes: review.total_votes,
            helpfulness_ratio: review.helpfulness_ratio(),
            is_edited: review.is_edited,
            edited_at: review.edited_at,
            is_spoiler: review.is_spoiler,
            created_at: review.created_at,
            updated_at: review.updated_at,
        }
    }
}

/// Cached movie fields echoed alongside a review listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieInfoDto {
    pub id: String,
    pub title: String,
    pub poster_url: String,
    pub average_rating: f64,
    pub total_reviews: i32,
}

/// Fresh aggregate over the movie's active reviews; computed per request,
/// independent of the cached movie columns.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStatisticsDto {
    pub average_rating: f64,
    pub total_reviews: i64,
    pub rating_distribution: RatingDistribution,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewListData {
    pub reviews: Vec<ReviewDto>,
    pub movie_info: MovieInfoDto,
    pub statistics: ReviewStatisticsDto,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct ReviewListResponseDto {
    pub success: bool,
    pub data: ReviewListData,
}

#[derive(Debug, Serialize)]
pub struct ReviewData {
    pub review: ReviewDto,
}

#[derive(Debug, Serialize)]
pub struct SingleReviewResponseDto {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: ReviewData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpfulData {
    pub helpful_votes: i32,
    pub total_votes: i32,
    pub helpfulness_ratio: i32,
}

#[derive(Debug, Serialize)]
pub struct HelpfulResponseDto {
    pub success: bool,
    pub message: String,
    pub data: HelpfulData,
}

// ============================================================================
// Watchlist DTOs
// ============================================================================

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistAddDto {
    #[validate(length(min = 1, message = "Movie ID is required"))]
    pub movie_id: String,

    pub status: Option<WatchlistStatus>,

    pub priority: Option<WatchlistPriority>,

    #[validate(length(max = 500, message = "Notes cannot exceed 500 characters"))]
    pub notes: Option<String>,

    #[validate(custom(function = "validate_tag_list"))]
    pub tags: Option<Vec<String>>,
}

/// Reminder settings carried on a watchlist item update.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ReminderUpdateDto {
    pub enabled: bool,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistUpdateDto {
    pub status: Option<WatchlistStatus>,

    pub priority: Option<WatchlistPriority>,

    #[validate(length(max = 500, message = "Notes cannot exceed 500 characters"))]
    pub notes: Option<String>,

    #[validate(range(min = 1, max = 5, message = "Personal rating must be between 1 and 5"))]
    pub personal_rating: Option<i32>,

    pub is_private: Option<bool>,

    #[validate(custom(function = "validate_tag_list"))]
    pub tags: Option<Vec<String>>,

    pub reminder: Option<ReminderUpdateDto>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateItemDto {
    #[validate(length(min = 1, message = "Movie ID is required"))]
    pub movie_id: String,

    #[serde(flatten)]
    #[validate(nested)]
    pub changes: WatchlistUpdateDto,
}

#[derive(Validate, Debug, Deserialize)]
pub struct BulkUpdateDto {
    #[validate(length(min = 1, message = "Items array is required"), nested)]
    pub items: Vec<BulkUpdateItemDto>,
}

#[derive(Validate, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistQueryDto {
    #[validate(range(min = 1, message = "Page must be a positive integer"))]
    pub page: Option<u32>,

    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<u32>,

    /// Exact status or comma-separated set.
    #[validate(custom(function = "validate_status_csv"))]
    pub status: Option<String>,

    pub priority: Option<WatchlistPriority>,

    #[validate(custom(function = "validate_genre_csv"))]
    pub genre: Option<String>,

    #[validate(custom(function = "validate_watchlist_sort"))]
    pub sort_by: Option<String>,

    #[validate(custom(function = "validate_sort_order"))]
    pub sort_order: Option<String>,
}

#[derive(Validate, Debug, Default, Deserialize)]
pub struct RecommendationQueryDto {
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderDto {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    pub notified: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistItemDto {
    pub id: String,
    pub user_id: String,
    pub movie_id: String,
    pub date_added: DateTime<Utc>,
    pub status: WatchlistStatus,
    pub priority: WatchlistPriority,
    pub notes: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watched_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_rating: Option<i32>,
    pub is_private: bool,
    pub tags: Vec<String>,
    pub reminder: ReminderDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie: Option<MovieSummaryDto>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WatchlistItemDto {
    pub fn from_parts(item: &WatchlistItem, movie: Option<MovieSummaryDto>) -> Self {
        WatchlistItemDto {
            id: item.id.to_string(),
            user_id: item.user_id.to_string(),
            movie_id: item.movie_id.to_string(),
            date_added: item.date_added,
            status: item.status,
            priority: item.priority,
            notes: item.notes.to_owned(),
            watched_date: item.watched_date,
            personal_rating: item.personal_rating,
            is_private: item.is_private,
            tags: item.tags.to_owned(),
            reminder: ReminderDto {
                enabled: item.reminder_enabled,
                date: item.reminder_date,
                notified: item.reminder_notified,
            },
            movie,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WatchlistData {
    pub watchlist: Vec<WatchlistItemDto>,
    pub statistics: WatchlistStats,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct WatchlistResponseDto {
    pub success: bool,
    pub data: WatchlistData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistItemData {
    pub watchlist_item: WatchlistItemDto,
}

#[derive(Debug, Serialize)]
pub struct SingleWatchlistResponseDto {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: WatchlistItemData,
}

#[derive(Debug, Serialize)]
pub struct WatchlistStatsData {
    pub statistics: WatchlistStats,
}

#[derive(Debug, Serialize)]
pub struct WatchlistStatsResponseDto {
    pub success: bool,
    pub data: WatchlistStatsData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistCheckItemDto {
    pub status: WatchlistStatus,
    pub priority: WatchlistPriority,
    pub date_added: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistCheckData {
    pub in_watchlist: bool,
    pub item: Option<WatchlistCheckItemDto>,
}

#[derive(Debug, Serialize)]
pub struct WatchlistCheckResponseDto {
    pub success: bool,
    pub data: WatchlistCheckData,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateData {
    pub updated_count: usize,
    pub total_requested: usize,
}

#[derive(Debug, Serialize)]
pub struct BulkUpdateResponseDto {
    pub success: bool,
    pub message: String,
    pub data: BulkUpdateData,
}

/// Preference summary echoed with recommendations.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationBasisDto {
    pub favorite_genres: Vec<String>,
    pub favorite_directors: Vec<String>,
    pub average_rating_preference: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationsData {
    pub recommendations: Vec<MovieSummaryDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub based_on: Option<RecommendationBasisDto>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResponseDto {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: RecommendationsData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn register_dto_rejects_mismatched_passwords() {
        let dto = RegisterUserDto {
            username: "moviefan".to_string(),
            email: "fan@example.com".to_string(),
            password: "secret123".to_string(),
            password_confirm: "secret124".to_string(),
        };
        let err = dto.validate().unwrap_err();
        assert!(err.field_errors().contains_key("password_confirm"));
    }

    #[test]
    fn register_dto_enforces_username_bounds() {
        let mut dto = RegisterUserDto {
            username: "ab".to_string(),
            email: "fan@example.com".to_string(),
            password: "secret123".to_string(),
            password_confirm: "secret123".to_string(),
        };
        assert!(dto.validate().is_err());
        dto.username = "abc".to_string();
        assert!(dto.validate().is_ok());
    }

    fn valid_movie() -> MovieCreateDto {
        MovieCreateDto {
            title: "Test Film".to_string(),
            genre: vec!["Drama".to_string()],
            release_year: 1999,
            director: "Jane Doe".to_string(),
            cast: vec![],
            synopsis: "A film about testing.".to_string(),
            poster_url: "https://img.example.com/test.jpg".to_string(),
            trailer_url: None,
            duration: 120,
            language: "English".to_string(),
            country: "USA".to_string(),
            budget: None,
            box_office: None,
            imdb_rating: None,
            rotten_tomatoes_rating: None,
        }
    }

    #[test]
    fn movie_dto_accepts_valid_payload() {
        assert!(valid_movie().validate().is_ok());
    }

    #[test]
    fn movie_dto_rejects_unknown_genre() {
        let mut dto = valid_movie();
        dto.genre = vec!["Telenovela".to_string()];
        assert!(dto.validate().is_err());

        dto.genre = vec![];
        assert!(dto.validate().is_err());
    }

    #[test]
    fn movie_dto_rejects_out_of_range_year() {
        let mut dto = valid_movie();
        dto.release_year = 1800;
        assert!(dto.validate().is_err());

        dto.release_year = Utc::now().year() + 3;
        assert!(dto.validate().is_err());

        dto.release_year = Utc::now().year() + 2;
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn movie_dto_rejects_non_image_poster() {
        let mut dto = valid_movie();
        dto.poster_url = "https://img.example.com/test.pdf".to_string();
        assert!(dto.validate().is_err());

        dto.poster_url = "ftp://img.example.com/test.jpg".to_string();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn review_dto_bounds_rating() {
        let dto = ReviewCreateDto {
            rating: 6,
            ..Default::default()
        };
        assert!(dto.validate().is_err());

        let dto = ReviewCreateDto {
            rating: 5,
            ..Default::default()
        };
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn csv_filters_validate_each_token() {
        let query = ReviewQueryDto {
            rating: Some("4,5".to_string()),
            ..Default::default()
        };
        assert!(query.validate().is_ok());

        let query = ReviewQueryDto {
            rating: Some("4,9".to_string()),
            ..Default::default()
        };
        assert!(query.validate().is_err());

        let query = WatchlistQueryDto {
            status: Some("watched,on_hold".to_string()),
            ..Default::default()
        };
        assert!(query.validate().is_ok());

        let query = WatchlistQueryDto {
            status: Some("binged".to_string()),
            ..Default::default()
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn split_csv_trims_and_drops_empties() {
        assert_eq!(split_csv("a, b ,,c"), vec!["a", "b", "c"]);
        assert!(split_csv(" , ").is_empty());
    }

    #[test]
    fn pagination_math() {
        let p = Pagination::new(1, 10, 25);
        assert_eq!(p.pages, 3);
        assert!(p.has_next);
        assert!(!p.has_prev);

        let p = Pagination::new(3, 10, 25);
        assert!(!p.has_next);
        assert!(p.has_prev);

        let p = Pagination::new(1, 10, 0);
        assert_eq!(p.pages, 0);
        assert!(!p.has_next);
    }

    #[test]
    fn pagination_page_counts_are_exhaustive() {
        // Concatenating pages 1..pages at the given limit covers exactly
        // `total` items.
        for (total, limit) in [(0i64, 10i64), (9, 10), (10, 10), (11, 10), (101, 25)] {
            let pages = Pagination::new(1, limit, total).pages;
            let mut covered = 0;
            for page in 1..=pages {
                let offset = (page - 1) * limit;
                covered += limit.min(total - offset);
            }
            assert_eq!(covered, total, "total={total} limit={limit}");
        }
    }

    #[test]
    fn profile_dto_never_carries_password() {
        let user = User {
            id: Uuid::new_v4(),
            username: "fan".to_string(),
            email: "fan@example.com".to_string(),
            password: "$argon2id$secret".to_string(),
            role: crate::models::UserRole::User,
            bio: String::new(),
            favorite_genres: vec![],
            total_reviews: 0,
            average_rating: 0.0,
            movies_watched: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(ProfileDto::from_user(&user)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["isAdmin"], false);
    }

    #[test]
    fn bulk_update_requires_items() {
        let dto = BulkUpdateDto { items: vec![] };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn watchlist_update_flattens_into_bulk_item() {
        let raw = r#"{"movieId":"abc","status":"watched","priority":"high"}"#;
        let item: BulkUpdateItemDto = serde_json::from_str(raw).unwrap();
        assert_eq!(item.movie_id, "abc");
        assert_eq!(item.changes.status, Some(WatchlistStatus::Watched));
        assert_eq!(item.changes.priority, Some(WatchlistPriority::High));
    }
}
