use crate::{
    AppState,
    db::{MovieExt, ReviewExt, ReviewFilter, UserExt},
    dtos::{
        AdminUserDto, AppJson, AppQuery, DetailedUserStatsDto, GenreCountDto, Pagination,
        ProfileData, ProfileDto, ProfileResponseDto, PublicProfileDto, PublicStatsDto, Response,
        ReviewAuthorDto, ReviewDto, ReviewQueryDto, UpdateProfileDto, UserListData,
        UserListResponseDto, UserProfileData, UserProfileResponseDto, UserQueryDto, UserRefDto,
        UserReviewsData, UserReviewsResponseDto, UserStatsData, UserStatsResponseDto, split_csv,
    },
    error::{ErrorMessage, HttpError},
    handler::{parse_object_id, watchlist::watchlist_handler},
    middleware::{JWTAuthMiddleware, auth, require_owner_or_admin, role_check},
    models::UserRole,
    utils::stats,
};
use axum::{
    Extension, Json, Router, middleware,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, put},
};
use tracing::instrument;
use validator::Validate;

/// Router for user profiles. Public reads, owner-or-admin writes, an
/// admin-only listing, and the watchlist nested per user.
pub fn users_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(get_all_users)
                .route_layer(middleware::from_fn(|req, next| {
                    role_check(req, next, vec![UserRole::Admin])
                }))
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/{user_id}", get(get_user_profile))
        .route(
            "/{user_id}",
            put(update_user_profile)
                .delete(delete_user_account)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/{user_id}/reviews", get(get_user_reviews))
        .route("/{user_id}/stats", get(get_user_stats))
        .nest("/{user_id}/watchlist", watchlist_handler(app_state))
}

/// Public profile: user fields plus freshly aggregated review stats and
/// the five most recent reviews.
#[instrument(skip(app_state))]
pub async fn get_user_profile(
    Path(user_id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = parse_object_id(&user_id, "userId")?;

    let user = app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("User not found"))?;

    let recent_rows = app_state
        .db_client
        .recent_reviews_for_user(user_id, 5)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting recent reviews: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let stat_rows = app_state
        .db_client
        .user_review_stat_rows(user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, aggregating user stats: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let ratings: Vec<i32> = stat_rows.iter().map(|row| row.rating).collect();
    let summary = stats::rating_summary(&ratings);

    let recent_reviews = recent_rows
        .iter()
        .map(|row| {
            ReviewDto::from_parts(
                &row.review,
                ReviewAuthorDto {
                    id: row.review.user_id.to_string(),
                    username: row.author_username.to_owned(),
                },
                Some(row.movie.to_summary(row.review.movie_id)),
            )
        })
        .collect();

    Ok(Json(UserProfileResponseDto {
        success: true,
        data: UserProfileData {
            user: PublicProfileDto {
                id: user.id.to_string(),
                username: user.username,
                bio: user.bio,
                favorite_genres: user.favorite_genres,
                created_at: user.created_at,
                stats: PublicStatsDto {
                    total_reviews: summary.total_reviews,
                    average_rating: summary.average_rating,
                    movies_watched: user.movies_watched,
                    rating_distribution: summary.distribution,
                },
            },
            recent_reviews,
        },
    }))
}

/// Profile update (owner or admin); changed username/email must still be
/// unique.
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn update_user_profile(
    Path(user_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    AppJson(body): AppJson<UpdateProfileDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = parse_object_id(&user_id, "userId")?;
    require_owner_or_admin(&jwt.user, user_id)?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid update_user_profile input: {}", e);
        HttpError::from(e)
    })?;

    let user = app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("User not found"))?;

    if let Some(username) = &body.username {
        if username != &user.username {
            let existing = app_state
                .db_client
                .get_user(None, Some(username), None)
                .await
                .map_err(|e| {
                    tracing::error!("DB error, checking username: {}", e);
                    HttpError::server_error(ErrorMessage::ServerError.to_string())
                })?;
            if existing.is_some() {
                return Err(HttpError::unique_constraint_violation(
                    "Username is already taken",
                ));
            }
        }
    }

    if let Some(email) = &body.email {
        if !email.eq_ignore_ascii_case(&user.email) {
            let existing = app_state
                .db_client
                .get_user(None, None, Some(email))
                .await
                .map_err(|e| {
                    tracing::error!("DB error, checking email: {}", e);
                    HttpError::server_error(ErrorMessage::ServerError.to_string())
                })?;
            if existing.is_some() {
                return Err(HttpError::unique_constraint_violation(
                    "Email is already registered",
                ));
            }
        }
    }

    let updated = app_state
        .db_client
        .update_user_profile(
            user_id,
            body.username.as_deref(),
            body.email.as_deref(),
            body.bio.as_deref(),
            body.favorite_genres.clone(),
        )
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating user profile: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!(user_id = %updated.id, "update_user_profile successful");
    Ok(Json(ProfileResponseDto {
        success: true,
        message: Some("Profile updated successfully".to_string()),
        data: ProfileData {
            user: ProfileDto::from_user(&updated),
        },
    }))
}

/// Paginated public review history of a user.
#[instrument(skip(app_state))]
pub async fn get_user_reviews(
    Path(user_id): Path<String>,
    AppQuery(params): AppQuery<ReviewQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = parse_object_id(&user_id, "userId")?;

    params.validate().map_err(|e| {
        tracing::error!("Invalid get_user_reviews input: {}", e);
        HttpError::from(e)
    })?;

    let user = app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("User not found"))?;

    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(10);
    let filter = ReviewFilter {
        movie_id: None,
        user_id: Some(user_id),
        ratings: params
            .rating
            .as_deref()
            .map(split_csv)
            .unwrap_or_default()
            .iter()
            .filter_map(|token| token.parse::<i32>().ok())
            .collect(),
        sort_by: params.sort_by.clone(),
        sort_order: params.sort_order.clone(),
    };

    let rows = app_state
        .db_client
        .get_reviews_with_filters(&filter, page, limit)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user reviews: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total = app_state
        .db_client
        .count_reviews_with_filters(&filter)
        .await
        .map_err(|e| {
            tracing::error!("DB error, counting user reviews: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let reviews = rows
        .iter()
        .map(|row| {
            ReviewDto::from_parts(
                &row.review,
                ReviewAuthorDto {
                    id: row.review.user_id.to_string(),
                    username: row.author_username.to_owned(),
                },
                Some(row.movie.to_summary(row.review.movie_id)),
            )
        })
        .collect();

    Ok(Json(UserReviewsResponseDto {
        success: true,
        data: UserReviewsData {
            reviews,
            user: UserRefDto {
                id: user.id.to_string(),
                username: user.username,
            },
            pagination: Pagination::new(page as i64, limit as i64, total),
        },
    }))
}

/// Detailed statistics: rating distribution, favorite genres, reviews by
/// decade and the helpfulness ratio, all aggregated fresh.
#[instrument(skip(app_state))]
pub async fn get_user_stats(
    Path(user_id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = parse_object_id(&user_id, "userId")?;

    let user = app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("User not found"))?;

    let rows = app_state
        .db_client
        .user_review_stat_rows(user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, aggregating user stats: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let ratings: Vec<i32> = rows.iter().map(|row| row.rating).collect();
    let summary = stats::rating_summary(&ratings);

    let genre_tally = stats::tally(
        rows.iter()
            .flat_map(|row| row.genre.iter().map(String::as_str)),
    );
    let favorite_genres = genre_tally
        .iter()
        .take(5)
        .map(|(genre, count)| GenreCountDto {
            genre: genre.to_owned(),
            count: *count,
        })
        .collect();

    let reviews_by_decade = stats::tally_decades(rows.iter().map(|row| row.release_year));

    let total_helpful_votes: i64 = rows.iter().map(|row| row.helpful_votes as i64).sum();
    let total_votes: i64 = rows.iter().map(|row| row.total_votes as i64).sum();
    let helpfulness_ratio = if total_votes > 0 {
        ((total_helpful_votes as f64 / total_votes as f64) * 100.0).round() as i64
    } else {
        0
    };

    Ok(Json(UserStatsResponseDto {
        success: true,
        data: UserStatsData {
            user: UserRefDto {
                id: user.id.to_string(),
                username: user.username,
            },
            stats: DetailedUserStatsDto {
                total_reviews: summary.total_reviews,
                average_rating: summary.average_rating,
                rating_distribution: summary.distribution,
                favorite_genres,
                reviews_by_decade,
                helpfulness_ratio,
                total_helpful_votes,
            },
        },
    }))
}

/// Account deletion (owner or admin): soft-delete the user's reviews,
/// refresh the stats of every movie they had reviewed (best effort), then
/// remove the account.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_user_account(
    Path(user_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = parse_object_id(&user_id, "userId")?;
    require_owner_or_admin(&jwt.user, user_id)?;

    app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting user: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("User not found"))?;

    let mut affected_movies = app_state
        .db_client
        .deactivate_user_reviews(user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, deactivating user reviews: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    affected_movies.sort();
    affected_movies.dedup();
    for movie_id in affected_movies {
        if let Err(e) = app_state.db_client.update_movie_stats(movie_id).await {
            tracing::warn!(%movie_id, "failed to refresh movie stats after account deletion: {}", e);
        }
    }

    app_state
        .db_client
        .delete_user(user_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => HttpError::not_found("User not found"),
            e => {
                tracing::error!("DB error, deleting user: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    tracing::info!(%user_id, "delete_user_account successful");
    Ok(Json(Response {
        success: true,
        message: "Account deleted successfully".to_string(),
    }))
}

/// Admin listing with username/email search.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn get_all_users(
    AppQuery(params): AppQuery<UserQueryDto>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid get_all_users input: {}", e);
        HttpError::from(e)
    })?;

    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(20);

    let users = app_state
        .db_client
        .get_users(
            params.search.as_deref(),
            params.sort_by.as_deref(),
            params.sort_order.as_deref(),
            page,
            limit,
        )
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting users: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total = app_state
        .db_client
        .get_user_count(params.search.as_deref())
        .await
        .map_err(|e| {
            tracing::error!("DB error, counting users: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(UserListResponseDto {
        success: true,
        data: UserListData {
            users: users.iter().map(AdminUserDto::from_user).collect(),
            pagination: Pagination::new(page as i64, limit as i64, total),
        },
    }))
}
