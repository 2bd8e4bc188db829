use crate::{
    AppState,
    db::{MovieExt, MovieFilter},
    dtos::{
        AppJson, AppQuery, CatalogOverviewDto, CatalogStatsData, CatalogStatsResponseDto,
        MovieCreateDto, MovieData, MovieDto, MovieListData, MovieListResponseDto, MovieQueryDto,
        MovieSummaryDto, MovieUpdateDto, Pagination, Response, SearchData, SearchQueryDto,
        SearchResponseDto, SingleMovieResponseDto, split_csv,
    },
    error::{ErrorMessage, HttpError},
    handler::{parse_object_id, review::review_handler},
    middleware::{JWTAuthMiddleware, auth, role_check},
    models::UserRole,
    utils::stats::round1,
};
use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use std::collections::BTreeMap;
use tracing::instrument;
use validator::Validate;

/// Router for the movie catalog. Mutations are admin-gated; reads are
/// public. Reviews are nested under each movie.
pub fn movie_handler(app_state: AppState) -> Router<AppState> {
    // Admin gates stack two route layers; the auth layer is added last so
    // it runs first and role_check sees the authenticated user.
    Router::new()
        .route("/", get(get_movies))
        .route(
            "/",
            post(create_movie)
                .route_layer(middleware::from_fn(|req, next| {
                    role_check(req, next, vec![UserRole::Admin])
                }))
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .route("/stats", get(get_movie_stats))
        .route("/search", get(search_movies))
        .route("/{movie_id}", get(get_movie))
        .route(
            "/{movie_id}",
            put(update_movie)
                .delete(delete_movie)
                .route_layer(middleware::from_fn(|req, next| {
                    role_check(req, next, vec![UserRole::Admin])
                }))
                .route_layer(middleware::from_fn_with_state(app_state.clone(), auth)),
        )
        .nest("/{movie_id}/reviews", review_handler(app_state))
}

/// Catalog listing with filters and offset pagination. Only active movies
/// are visible; default order is newest first.
#[instrument(skip(app_state))]
pub async fn get_movies(
    AppQuery(params): AppQuery<MovieQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid get_movies input: {}", e);
        HttpError::from(e)
    })?;

    let page = params.page.unwrap_or(1);
    let limit = params.limit.unwrap_or(12);

    let filter = MovieFilter {
        genres: params.genre.as_deref().map(split_csv).unwrap_or_default(),
        release_year: params.release_year,
        year_min: params.year_min,
        year_max: params.year_max,
        director: params.director.clone(),
        min_rating: params.min_rating,
        max_rating: params.max_rating,
        search: params.search.clone(),
        sort_by: params.sort_by.clone(),
        sort_order: params.sort_order.clone(),
        include_inactive: false,
    };

    let movies = app_state
        .db_client
        .get_movies_with_filters(&filter, page, limit)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting movies: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total = app_state
        .db_client
        .count_movies_with_filters(&filter)
        .await
        .map_err(|e| {
            tracing::error!("DB error, counting movies: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let response = Json(MovieListResponseDto {
        success: true,
        data: MovieListData {
            movies: movies.into_iter().map(MovieDto::from).collect(),
            pagination: Pagination::new(page as i64, limit as i64, total),
        },
    });
    tracing::info!("get_movies successful");
    Ok(response)
}

/// Single movie by id; soft-deleted movies are indistinguishable from
/// missing ones.
#[instrument(skip(app_state))]
pub async fn get_movie(
    Path(movie_id): Path<String>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let movie_id = parse_object_id(&movie_id, "movieId")?;

    let movie = app_state.db_client.get_movie(movie_id).await.map_err(|e| {
        tracing::error!("DB error, getting movie: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let movie = movie.ok_or_else(|| HttpError::not_found("Movie not found"))?;

    Ok(Json(SingleMovieResponseDto {
        success: true,
        message: None,
        data: MovieData {
            movie: MovieDto::from(movie),
        },
    }))
}

/// Create a movie (admin). A same-title same-year active movie is a
/// conflict.
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username, title = %body.title))]
pub async fn create_movie(
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    AppJson(body): AppJson<MovieCreateDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate().map_err(|e| {
        tracing::error!("Invalid create_movie input: {}", e);
        HttpError::from(e)
    })?;

    let duplicate = app_state
        .db_client
        .find_duplicate_movie(&body.title, body.release_year, None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, checking duplicate movie: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    if duplicate {
        return Err(HttpError::unique_constraint_violation(
            "A movie with this title and release year already exists",
        ));
    }

    let movie = app_state
        .db_client
        .create_movie(&body, jwt.user.id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, creating movie: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    tracing::info!(movie_id = %movie.id, "create_movie successful");
    Ok((
        StatusCode::CREATED,
        Json(SingleMovieResponseDto {
            success: true,
            message: Some("Movie created successfully".to_string()),
            data: MovieData {
                movie: MovieDto::from(movie),
            },
        }),
    ))
}

/// Partial update (admin) with the same duplicate guard as creation.
#[instrument(skip(app_state, body, jwt), fields(username = %jwt.user.username))]
pub async fn update_movie(
    Path(movie_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
    AppJson(body): AppJson<MovieUpdateDto>,
) -> Result<impl IntoResponse, HttpError> {
    let movie_id = parse_object_id(&movie_id, "movieId")?;

    body.validate().map_err(|e| {
        tracing::error!("Invalid update_movie input: {}", e);
        HttpError::from(e)
    })?;

    let existing = app_state
        .db_client
        .get_movie(movie_id)
        .await
        .map_err(|e| {
            tracing::error!("DB error, getting movie: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Movie not found"))?;

    if body.title.is_some() || body.release_year.is_some() {
        let title = body.title.as_deref().unwrap_or(&existing.title);
        let release_year = body.release_year.unwrap_or(existing.release_year);

        let duplicate = app_state
            .db_client
            .find_duplicate_movie(title, release_year, Some(movie_id))
            .await
            .map_err(|e| {
                tracing::error!("DB error, checking duplicate movie: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            })?;

        if duplicate {
            return Err(HttpError::unique_constraint_violation(
                "A movie with this title and release year already exists",
            ));
        }
    }

    let movie = app_state
        .db_client
        .update_movie(movie_id, &body)
        .await
        .map_err(|e| {
            tracing::error!("DB error, updating movie: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .ok_or_else(|| HttpError::not_found("Movie not found"))?;

    tracing::info!(movie_id = %movie.id, "update_movie successful");
    Ok(Json(SingleMovieResponseDto {
        success: true,
        message: Some("Movie updated successfully".to_string()),
        data: MovieData {
            movie: MovieDto::from(movie),
        },
    }))
}

/// Soft delete (admin): the movie disappears from listings, search and
/// stats; its reviews remain addressable by id.
#[instrument(skip(app_state, jwt), fields(username = %jwt.user.username))]
pub async fn delete_movie(
    Path(movie_id): Path<String>,
    State(app_state): State<AppState>,
    Extension(jwt): Extension<JWTAuthMiddleware>,
) -> Result<impl IntoResponse, HttpError> {
    let movie_id = parse_object_id(&movie_id, "movieId")?;

    app_state
        .db_client
        .soft_delete_movie(movie_id)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => HttpError::not_found("Movie not found"),
            e => {
                tracing::error!("DB error, deleting movie: {}", e);
                HttpError::server_error(ErrorMessage::ServerError.to_string())
            }
        })?;

    tracing::info!(%movie_id, "delete_movie successful");
    Ok(Json(Response {
        success: true,
        message: "Movie deleted successfully".to_string(),
    }))
}

/// Catalog-wide statistics: overview, genre distribution and three
/// headline lists.
#[instrument(skip(app_state))]
pub async fn get_movie_stats(
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    let (total_movies, average_rating, total_reviews) =
        app_state.db_client.catalog_overview().await.map_err(|e| {
            tracing::error!("DB error, catalog overview: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let genre_distribution: BTreeMap<String, i64> = app_state
        .db_client
        .genre_distribution()
        .await
        .map_err(|e| {
            tracing::error!("DB error, genre distribution: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?
        .into_iter()
        .collect();

    let top_rated = app_state.db_client.top_rated_movies(5).await.map_err(|e| {
        tracing::error!("DB error, top rated movies: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let most_reviewed = app_state
        .db_client
        .most_reviewed_movies(5)
        .await
        .map_err(|e| {
            tracing::error!("DB error, most reviewed movies: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let recent = app_state.db_client.recent_movies(5).await.map_err(|e| {
        tracing::error!("DB error, recent movies: {}", e);
        HttpError::server_error(ErrorMessage::ServerError.to_string())
    })?;

    let response = Json(CatalogStatsResponseDto {
        success: true,
        data: CatalogStatsData {
            overview: CatalogOverviewDto {
                total_movies,
                average_rating: round1(average_rating.unwrap_or(0.0)),
                total_reviews: total_reviews.unwrap_or(0),
            },
            genre_distribution,
            top_rated_movies: top_rated.iter().map(MovieSummaryDto::from).collect(),
            most_reviewed_movies: most_reviewed.iter().map(MovieSummaryDto::from).collect(),
            recent_movies: recent.iter().map(MovieSummaryDto::from).collect(),
        },
    });
    tracing::info!("get_movie_stats successful");
    Ok(response)
}

/// Free-text quick search ranked by rating then review count.
#[instrument(skip(app_state))]
pub async fn search_movies(
    AppQuery(params): AppQuery<SearchQueryDto>,
    State(app_state): State<AppState>,
) -> Result<impl IntoResponse, HttpError> {
    params.validate().map_err(|e| {
        tracing::error!("Invalid search_movies input: {}", e);
        HttpError::from(e)
    })?;

    let query = params.q.trim().to_string();
    if query.is_empty() {
        return Err(HttpError::bad_request("Search query is required"));
    }
    let limit = params.limit.unwrap_or(10);

    let movies = app_state
        .db_client
        .search_movies(&query, limit as i64)
        .await
        .map_err(|e| {
            tracing::error!("DB error, searching movies: {}", e);
            HttpError::server_error(ErrorMessage::ServerError.to_string())
        })?;

    let total = movies.len() as i64;
    let response = Json(SearchResponseDto {
        success: true,
        data: SearchData {
            movies: movies.iter().map(MovieSummaryDto::from).collect(),
            query,
            total,
        },
    });
    tracing::info!("search_movies successful");
    Ok(response)
}
