use crate::{
    AppState,
    db::{MovieExt, UserExt, WatchlistExt, WatchlistFilter},
    dtos::{
        AppJson, AppQuery, BulkUpdateData, BulkUpdateDto, BulkUpdateResponseDto, MovieSummaryDto,
        Pagination, RecommendationBasisDto, RecommendationQueryDto, RecommendationsData,
        RecommendationsResponseDto, Response, SingleWatchlistResponseDto, WatchlistAddDto,
        WatchlistCheckData, WatchlistCheckItemDto, WatchlistCheckResponseDto, WatchlistData,
        WatchlistItemData, WatchlistItemDto, WatchlistQueryDto, WatchlistResponseDto,
        WatchlistStatsData, WatchlistStatsResponseDto, WatchlistUpdateDto, split_csv,
    },
    error::{ErrorMessage, HttpError},
    handler::parse_object_id,
    middleware::{JWTAuthMiddleware, auth, require_owner_or_admin},
    models::{WatchlistPriority, WatchlistStatus},
    utils::stats::{self, round1},
};
use axum::{
    Extension, Json, Router, middleware,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// Router for per-user watchlist endpoints, nested under
/// /users/{user_id}/watchlist. Every route is owner-or-admin: the auth
/// layer runs here, the ownership check in each handler.
pub fn watchlist_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_watchlist).post(add_to_watchlist))
        .route("/stats", get(get_watchlist_stats))
        .route("/recommendations", get(get_recommendations))
        .route("/bulk", patch(bulk_update_watchlist))
        .route("/check/{movie_id}", get(check_movie_in_watchlist))
        .route(
            "/{movie_id}",
            get(get_watchlist_item)
                .put(update_watchlist_item)
                .delete(remove_from_watchlist),
        )
        .layer(middleware::from_fn_with_state(app_state, auth))
}

fn row_to_dto(row: &crate::db::WatchlistRow) -> WatchlistItemDto {
    WatchlistItemDto::from_parts(&row.item, Some(row.movie.to_summary(row.item.movie_id)))
}

/// The user's watchlist page plus on-demand statistics.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn get_watchlist(
    Path(user_id): Path<String>,
    AppQuery(params): AppQuery<WatchlistQueryDto>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = parse_object_id(&user_id, "userId")?;
    require_owner_or_admin(&jwt.user, user_id)?;

    params.validate().map_err(|e| {
        tracing::error!("Invalid get_watchlist input: {}", e);
        HttpError::from(e)
    })?;

    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(20);
    let filter = WatchlistFilter {
        statuses: params.status.as_deref().map(split_csv).unwrap_or_default(),
        priority: params.priority,
        genres: params.genre.as_deref().map(split_csv).unwrap_or_default(),
        sort_by: params.sort_by.clone(),
        sort_order: params.sort_order.clone(),
    };

    let rows = app_state
        .db_client
        .get_watchlist(user_id, &filter, page, limit)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting watchlist: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total = app_state
        .db_client
        .count_watchlist(user_id, &filter)
        .await
        .map_err(|e| {
            tracing::error!("DB error, counting watchlist: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let snapshots = app_state
        .db_client
        .watchlist_snapshots(user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, watchlist snapshots: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let response = Json(WatchlistResponseDto {
        success: true,
        data: WatchlistData {
            watchlist: rows.iter().map(row_to_dto).collect(),
            statistics: stats::watchlist_stats(&snapshots),
            pagination: Pagination::new(page as i64, limit as i64, total),
        },
    });
    tracing::info!("get_watchlist successful");
    Ok(response)
}

/// Add an active movie to the list; one entry per (user, movie).
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn add_to_watchlist(
    Path(user_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    AppJson(body): AppJson<WatchlistAddDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = parse_object_id(&user_id, "userId")?;
    require_owner_or_admin(&jwt.user, user_id)?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid add_to_watchlist input: {}", e);
        HttpError::from(e)
    })?;

    let movie_id = parse_object_id(&body.movie_id, "movieId")?;

    let movie = app_state
        .db_client
        .get_movie(movie_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting movie: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Movie not found"))?;

    let status = body.status.unwrap_or(WatchlistStatus::WantToWatch);
    let result = app_state
        .db_client
        .add_watchlist_item(
            user_id,
            movie_id,
            status,
            body.priority.unwrap_or(WatchlistPriority::Medium),
            body.notes.as_deref().unwrap_or(""),
            body.tags.clone().unwrap_or_default(),
        )
        .await;

    let item = match result {
        Ok(item) => item,
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, adding watchlist item, unique violation: {}", db_err);
            return Err(HttpError::unique_constraint_violation(
                "Movie is already in your watchlist",
            ));
        }
        Err(e) => {
            tracing::error!("DB error, adding watchlist item: {}", e);
            return Err(HttpError::server_error(
                ErrorMessage::ServerError.to_string(),
            ));
        }
    };

    if status == WatchlistStatus::Watched {
        if let Err(e) = app_state.db_client.update_user_stats(user_id).await {
            tracing::warn!(%user_id, "failed to refresh user stats after watchlist add: {}", e);
        }
    }

    tracing::info!(item_id = %item.id, "add_to_watchlist successful");
    Ok((
        StatusCode::CREATED,
        Json(SingleWatchlistResponseDto {
            success: true,
            message: Some("Movie added to watchlist successfully".to_string()),
            data: WatchlistItemData {
                watchlist_item: WatchlistItemDto::from_parts(
                    &item,
                    Some(MovieSummaryDto::from(&movie)),
                ),
            },
        }),
    ))
}

/// Single item with movie details.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn get_watchlist_item(
    Path((user_id, movie_id)): Path<(String, String)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = parse_object_id(&user_id, "userId")?;
    require_owner_or_admin(&jwt.user, user_id)?;
    let movie_id = parse_object_id(&movie_id, "movieId")?;

    let row = app_state
        .db_client
        .get_watchlist_item(user_id, movie_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting watchlist item: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Movie not found in watchlist"))?;

    Ok(Json(SingleWatchlistResponseDto {
        success: true,
        message: None,
        data: WatchlistItemData {
            watchlist_item: row_to_dto(&row),
        },
    }))
}

/// Update one item, applying the watched-date transition rule.
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn update_watchlist_item(
    Path((user_id, movie_id)): Path<(String, String)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    AppJson(body): AppJson<WatchlistUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = parse_object_id(&user_id, "userId")?;
    require_owner_or_admin(&jwt.user, user_id)?;
    let movie_id = parse_object_id(&movie_id, "movieId")?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid update_watchlist_item input: {}", e);
        HttpError::from(e)
    })?;

    let updated = app_state
        .db_client
        .update_watchlist_item(user_id, movie_id, &body)
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating watchlist item: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Movie not found in watchlist"))?;

    // A status change can move the user's watched count.
    if body.status.is_some() {
        if let Err(e) = app_state.db_client.update_user_stats(user_id).await {
            tracing::warn!(%user_id, "failed to refresh user stats after watchlist update: {}", e);
        }
    }

    let row = app_state
        .db_client
        .get_watchlist_item(user_id, movie_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting watchlist item: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!(item_id = %updated.id, "update_watchlist_item successful");
    Ok(Json(SingleWatchlistResponseDto {
        success: true,
        message: Some("Watchlist item updated successfully".to_string()),
        data: WatchlistItemData {
            watchlist_item: match &row {
                Some(row) => row_to_dto(row),
                None => WatchlistItemDto::from_parts(&updated, None),
            },
        },
    }))
}

/// Remove one item.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn remove_from_watchlist(
    Path((user_id, movie_id)): Path<(String, String)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = parse_object_id(&user_id, "userId")?;
    require_owner_or_admin(&jwt.user, user_id)?;
    let movie_id = parse_object_id(&movie_id, "movieId")?;

    app_state
        .db_client
        .remove_watchlist_item(user_id, movie_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => HttpError::not_found("Movie not found in watchlist"),
            e => {
                tracing::error!("DB error, removing watchlist item: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    if let Err(e) = app_state.db_client.update_user_stats(user_id).await {
        tracing::warn!(%user_id, "failed to refresh user stats after watchlist removal: {}", e);
    }

    tracing::info!(%movie_id, "remove_from_watchlist successful");
    Ok(Json(Response {
        success: true,
        message: "Movie removed from watchlist successfully".to_string(),
    }))
}

/// On-demand watchlist statistics; never cached.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn get_watchlist_stats(
    Path(user_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = parse_object_id(&user_id, "userId")?;
    require_owner_or_admin(&jwt.user, user_id)?;

    let snapshots = app_state
        .db_client
        .watchlist_snapshots(user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, watchlist snapshots: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(WatchlistStatsResponseDto {
        success: true,
        data: WatchlistStatsData {
            statistics: stats::watchlist_stats(&snapshots),
        },
    }))
}

/// Membership probe used by the client before showing add/remove buttons.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn check_movie_in_watchlist(
    Path((user_id, movie_id)): Path<(String, String)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = parse_object_id(&user_id, "userId")?;
    require_owner_or_admin(&jwt.user, user_id)?;
    let movie_id = parse_object_id(&movie_id, "movieId")?;

    let row = app_state
        .db_client
        .get_watchlist_item(user_id, movie_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, checking watchlist: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    Ok(Json(WatchlistCheckResponseDto {
        success: true,
        data: WatchlistCheckData {
            in_watchlist: row.is_some(),
            item: row.map(|row| WatchlistCheckItemDto {
                status: row.item.status,
                priority: row.item.priority,
                date_added: row.item.date_added,
            }),
        },
    }))
}

/// Batch status/priority update. Items not on the list are skipped, not
/// errors; the response reports how many were applied.
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn bulk_update_watchlist(
    Path(user_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    AppJson(body): AppJson<BulkUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = parse_object_id(&user_id, "userId")?;
    require_owner_or_admin(&jwt.user, user_id)?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid bulk_update_watchlist input: {}", e);
        HttpError::from(e)
    })?;

    let total_requested = body.items.len();
    let mut updated_count = 0;
    let mut any_status_change = false;

    for item in &body.items {
        let Ok(movie_id) = Uuid::parse_str(&item.movie_id) else {
            continue;
        };

        let updated = app_state
            .db_client
            .update_watchlist_item(user_id, movie_id, &item.changes)
            .await
            .map_err(|e| {
                tracing::error!("DB error, bulk updating watchlist item: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            })?;

        if updated.is_some() {
            updated_count += 1;
            if item.changes.status.is_some() {
                any_status_change = true;
            }
        }
    }

    if any_status_change {
        if let Err(e) = app_state.db_client.update_user_stats(user_id).await {
            tracing::warn!(%user_id, "failed to refresh user stats after bulk update: {}", e);
        }
    }

    tracing::info!(updated_count, total_requested, "bulk_update_watchlist successful");
    Ok(Json(BulkUpdateResponseDto {
        success: true,
        message: format!("Successfully updated {} items", updated_count),
        data: BulkUpdateData {
            updated_count,
            total_requested,
        },
    }))
}

/// Content-based recommendations derived from the watchlist. An empty
/// watchlist yields guidance, not an error.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn get_recommendations(
    Path(user_id): Path<String>,
    AppQuery(params): AppQuery<RecommendationQueryDto>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let user_id = parse_object_id(&user_id, "userId")?;
    require_owner_or_admin(&jwt.user, user_id)?;

    params.validate().map_err(|e| {
        tracing::error!("Invalid get_recommendations input: {}", e);
        HttpError::from(e)
    })?;
    let limit = params.limit.unwrap_or(10);

    let taste = app_state
        .db_client
        .watchlist_taste(user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, loading watchlist taste: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let Some(profile) = stats::taste_profile(&taste) else {
        return Ok(Json(RecommendationsResponseDto {
            success: true,
            message: Some(
                "Add movies to your watchlist to get personalized recommendations".to_string(),
            ),
            data: RecommendationsData {
                recommendations: vec![],
                based_on: None,
            },
        }));
    };

    let exclude_ids = app_state
        .db_client
        .watchlist_movie_ids(user_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, loading watchlist movie ids: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let candidates = app_state
        .db_client
        .recommend_movies(
            &exclude_ids,
            &profile.top_genres,
            &profile.top_directors,
            profile.average_rating_preference - 0.5,
            limit as i64,
        )
        .await
        .map_err(|e| {
            tracing::error!("DB error, recommending movies: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!(count = candidates.len(), "get_recommendations successful");
    Ok(Json(RecommendationsResponseDto {
        success: true,
        message: None,
        data: RecommendationsData {
            recommendations: candidates.iter().map(MovieSummaryDto::from).collect(),
            based_on: Some(RecommendationBasisDto {
                favorite_genres: profile.top_genres,
                favorite_directors: profile.top_directors,
                average_rating_preference: round1(profile.average_rating_preference),
            }),
        },
    }))
}
