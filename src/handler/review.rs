use crate::{
    AppState,
    db::{MovieExt, ReviewExt, ReviewFilter, ReviewListRow, UserExt},
    dtos::{
        AppJson, AppQuery, HelpfulData, HelpfulResponseDto, MovieInfoDto, MovieSummaryDto,
        Pagination, Response, ReviewAuthorDto, ReviewCreateDto, ReviewData, ReviewDto,
        ReviewListData, ReviewListResponseDto, ReviewQueryDto, ReviewStatisticsDto,
        ReviewUpdateDto, SingleReviewResponseDto, split_csv,
    },
    error::{ErrorMessage, HttpError},
    handler::parse_object_id,
    middleware::{JWTAuthMiddleware, auth, require_owner_or_admin},
    models::Movie,
    utils::stats,
};
use axum::{
    Extension, Json, Router, middleware,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

/// Router for review endpoints nested under /movies/{movie_id}/reviews.
pub fn review_handler(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(get_movie_reviews))
        .route(
            "/",
            post(create_review)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/my-review",
            get(get_my_review)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/{review_id}", get(get_review))
        .route(
            "/{review_id}",
            axum::routing::put(update_review)
                .delete(delete_review)
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route(
            "/{review_id}/helpful",
            post(mark_review_helpful)
                .route_layer(middleware::from_fn_with_state(app_state, auth)),
        )
}

fn row_to_dto(row: &ReviewListRow, with_movie: bool) -> ReviewDto {
    let movie = with_movie.then(|| row.movie.to_summary(row.review.movie_id));
    ReviewDto::from_parts(
        &row.review,
        ReviewAuthorDto {
            id: row.review.user_id.to_string(),
            username: row.author_username.to_owned(),
        },
        movie,
    )
}

/// Refresh the movie's and the author's derived stats after a review
/// write. Failures are logged and swallowed: stats are a read-side
/// convenience and must never fail the triggering write.
async fn refresh_stats_after_review_write(app_state: &AppState, movie_id: Uuid, user_id: Uuid) {
    if let Err(e) = app_state.db_client.update_movie_stats(movie_id).await {
        tracing::warn!(%movie_id, "failed to refresh movie stats after review write: {}", e);
    }
    if let Err(e) = app_state.db_client.update_user_stats(user_id).await {
        tracing::warn!(%user_id, "failed to refresh user stats after review write: {}", e);
    }
}

async fn get_active_movie(app_state: &AppState, movie_id: Uuid) -> Result<Movie, HttpError> {
    let movie = app_state.db_client.get_movie(movie_id).await.map_err(|e| {
        tracing::error!("DB error, getting movie: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    movie.ok_or_else(|| HttpError::not_found("Movie not found"))
}

/// Paginated reviews of a movie, with the cached movie info block and a
/// statistics block recomputed fresh from the active review set. The two
/// may momentarily disagree; the cached fields are refreshed on write,
/// this one is per-request.
#[instrument(skip(app_state))]
pub async fn get_movie_reviews(
    Path(movie_id): Path<String>,
    AppQuery(params): AppQuery<ReviewQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let movie_id = parse_object_id(&movie_id, "movieId")?;

    params.validate().map_err(|e| {
        tracing::error!("Invalid get_movie_reviews input: {}", e);
        HttpError::from(e)
    })?;

    let movie = get_active_movie(&app_state, movie_id).await?;

    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(10);
    let filter = ReviewFilter {
        movie_id: Some(movie_id),
        user_id: None,
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
            tracing::error!("DB error, getting reviews: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total = app_state
        .db_client
        .count_reviews_with_filters(&filter)
        .await
        .map_err(|e| {
            tracing::error!("DB error, counting reviews: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    // Independent fresh aggregation over the full active review set.
    let ratings = app_state
        .db_client
        .active_ratings_for_movie(movie_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, aggregating review stats: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;
    let summary = stats::rating_summary(&ratings);

    let response = Json(ReviewListResponseDto {
        success: true,
        data: ReviewListData {
            reviews: rows.iter().map(|row| row_to_dto(row, false)).collect(),
            movie_info: MovieInfoDto {
                id: movie.id.to_string(),
                title: movie.title,
                poster_url: movie.poster_url,
                average_rating: movie.average_rating,
                total_reviews: movie.total_reviews,
            },
            statistics: ReviewStatisticsDto {
                average_rating: summary.average_rating,
                total_reviews: summary.total_reviews,
                rating_distribution: summary.distribution,
            },
            pagination: Pagination::new(page as i64, limit as i64, total),
        },
    });
    tracing::info!("get_movie_reviews successful");
    Ok(response)
}

/// Create the caller's review of a movie. The partial unique index is the
/// final arbiter for concurrent duplicates; after the insert the derived
/// stats are refreshed as explicit, non-fatal steps.
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn create_review(
    Path(movie_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    AppJson(body): AppJson<ReviewCreateDto>,
) -> Result<impl IntoResponse, HttpError> {
    let movie_id = parse_object_id(&movie_id, "movieId")?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid create_review input: {}", e);
        HttpError::from(e)
    })?;

    let movie = get_active_movie(&app_state, movie_id).await?;

    let is_recommended = body.rating >= 4;
    let result = app_state
        .db_client
        .create_review(
            jwt.user.id,
            movie_id,
            body.rating,
            body.review_text.as_deref().unwrap_or(""),
            body.title.as_deref().unwrap_or(""),
            body.is_spoiler.unwrap_or(false),
            is_recommended,
        )
        .await;

    let review = match result {
        Ok(review) => review,
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            tracing::error!("DB error, creating review, unique violation: {}", db_err);
            return Err(HttpError::unique_constraint_violation(
                "You have already reviewed this movie",
            ));
        }
        Err(e) => {
            tracing::error!("DB error, creating review: {}", e);
            return Err(HttpError::server_error(
                ErrorMessage::ServerError.to_string(),
            ));
        }
    };

    refresh_stats_after_review_write(&app_state, movie_id, jwt.user.id).await;

    tracing::info!(review_id = %review.id, "create_review successful");
    Ok((
        StatusCode::CREATED,
        Json(SingleReviewResponseDto {
            success: true,
            message: Some("Review created successfully".to_string()),
            data: ReviewData {
                review: ReviewDto::from_parts(
                    &review,
                    ReviewAuthorDto {
                        id: jwt.user.id.to_string(),
                        username: jwt.user.username.clone(),
                    },
                    Some(MovieSummaryDto::from(&movie)),
                ),
            },
        }),
    ))
}

/// Single review by id. Reviews stay addressable even after their movie is
/// soft-deleted.
#[instrument(skip(app_state))]
pub async fn get_review(
    Path((movie_id, review_id)): Path<(String, String)>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let movie_id = parse_object_id(&movie_id, "movieId")?;
    let review_id = parse_object_id(&review_id, "reviewId")?;

    let row = app_state
        .db_client
        .get_review(review_id, movie_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Review not found"))?;

    Ok(Json(SingleReviewResponseDto {
        success: true,
        message: None,
        data: ReviewData {
            review: row_to_dto(&row, true),
        },
    }))
}

/// Edit a review (owner or admin). Marks it edited and re-runs both stat
/// recomputes for the review's author.
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn update_review(
    Path((movie_id, review_id)): Path<(String, String)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    AppJson(body): AppJson<ReviewUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    let movie_id = parse_object_id(&movie_id, "movieId")?;
    let review_id = parse_object_id(&review_id, "reviewId")?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid update_review input: {}", e);
        HttpError::from(e)
    })?;

    let row = app_state
        .db_client
        .get_review(review_id, movie_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Review not found"))?;

    require_owner_or_admin(&jwt.user, row.review.user_id)?;

    let updated = app_state
        .db_client
        .update_review(
            review_id,
            body.rating,
            body.review_text.as_deref(),
            body.title.as_deref(),
            body.is_spoiler,
            body.is_recommended,
        )
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Review not found"))?;

    refresh_stats_after_review_write(&app_state, movie_id, row.review.user_id).await;

    tracing::info!(review_id = %updated.id, "update_review successful");
    Ok(Json(SingleReviewResponseDto {
        success: true,
        message: Some("Review updated successfully".to_string()),
        data: ReviewData {
            review: ReviewDto::from_parts(
                &updated,
                ReviewAuthorDto {
                    id: row.review.user_id.to_string(),
                    username: row.author_username.clone(),
                },
                Some(row.movie.to_summary(row.review.movie_id)),
            ),
        },
    }))
}

/// Soft-delete a review (owner or admin) and refresh the derived stats.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_review(
    Path((movie_id, review_id)): Path<(String, String)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let movie_id = parse_object_id(&movie_id, "movieId")?;
    let review_id = parse_object_id(&review_id, "reviewId")?;

    let row = app_state
        .db_client
        .get_review(review_id, movie_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Review not found"))?;

    require_owner_or_admin(&jwt.user, row.review.user_id)?;

    app_state
        .db_client
        .soft_delete_review(review_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => HttpError::not_found("Review not found"),
            e => {
                tracing::error!("DB error, deleting review: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    refresh_stats_after_review_write(&app_state, movie_id, row.review.user_id).await;

    tracing::info!(%review_id, "delete_review successful");
    Ok(Json(Response {
        success: true,
        message: "Review deleted successfully".to_string(),
    }))
}

/// Helpfulness vote. Authors cannot vote on their own reviews.
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn mark_review_helpful(
    Path((movie_id, review_id)): Path<(String, String)>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    AppJson(body): AppJson<crate::dtos::HelpfulVoteDto>,
) -> Result<impl IntoResponse, HttpError> {
    let movie_id = parse_object_id(&movie_id, "movieId")?;
    let review_id = parse_object_id(&review_id, "reviewId")?;

    let row = app_state
        .db_client
        .get_review(review_id, movie_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Review not found"))?;

    if row.review.user_id == jwt.user.id {
        return Err(HttpError::bad_request(
            "You cannot mark your own review as helpful",
        ));
    }

    let is_helpful = body.is_helpful.unwrap_or(true);
    let review = app_state
        .db_client
        .mark_review_helpful(review_id, is_helpful)
        .await
        .map_err(|e| {
            tracing::error!("DB error, marking review helpful: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Review not found"))?;

    tracing::info!(%review_id, is_helpful, "mark_review_helpful successful");
    Ok(Json(HelpfulResponseDto {
        success: true,
        message: format!(
            "Review marked as {}",
            if is_helpful { "helpful" } else { "not helpful" }
        ),
        data: HelpfulData {
            helpful_votes: review.helpful_votes,
            total_votes: review.total_votes,
            helpfulness_ratio: review.helpfulness_ratio(),
        },
    }))
}

/// The caller's own review of this movie.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn get_my_review(
    Path(movie_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let movie_id = parse_object_id(&movie_id, "movieId")?;

    let row = app_state
        .db_client
        .get_user_review_for_movie(jwt.user.id, movie_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting my review: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("You have not reviewed this movie"))?;

    Ok(Json(SingleReviewResponseDto {
        success: true,
        message: None,
        data: ReviewData {
            review: row_to_dto(&row, true),
        },
    }))
}
