use super::{DBClient, sort_direction};
use crate::dtos::{MovieCreateDto, MovieUpdateDto};
use crate::models::Movie;
use crate::utils::stats;
use sqlx::QueryBuilder;
use sqlx::types::Json;
use uuid::Uuid;

const MOVIE_COLUMNS: &str = "id, title, genre, release_year, director, cast_members, synopsis, poster_url, trailer_url, duration_minutes, language, country, budget, box_office, imdb_rating, rotten_tomatoes_rating, average_rating, total_reviews, rating_dist_1, rating_dist_2, rating_dist_3, rating_dist_4, rating_dist_5, is_active, added_by, created_at, updated_at";

fn movie_sort_column(sort_by: Option<&str>) -> &'static str {
    match sort_by {
        Some("title") => "title",
        Some("releaseYear") => "release_year",
        Some("averageRating") => "average_rating",
        Some("totalReviews") => "total_reviews",
        // Canonical listing default: newest first.
        _ => "created_at",
    }
}

/// Catalog filter set. `include_inactive` is the explicit override for the
/// active-only default; no public route sets it.
#[derive(Debug, Default, Clone)]
pub struct MovieFilter {
    pub genres: Vec<String>,
    pub release_year: Option<i32>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub director: Option<String>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub include_inactive: bool,
}

fn push_movie_filters(qb: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &MovieFilter) {
    if filter.include_inactive {
        qb.push(" WHERE TRUE");
    } else {
        qb.push(" WHERE is_active = TRUE");
    }

    if !filter.genres.is_empty() {
        qb.push(" AND genre && ");
        qb.push_bind(filter.genres.clone());
    }
    if let Some(year) = filter.release_year {
        qb.push(" AND release_year = ");
        qb.push_bind(year);
    }
    if let Some(year_min) = filter.year_min {
        qb.push(" AND release_year >= ");
        qb.push_bind(year_min);
    }
    if let Some(year_max) = filter.year_max {
        qb.push(" AND release_year <= ");
        qb.push_bind(year_max);
    }
    if let Some(director) = &filter.director {
        qb.push(" AND director ILIKE ");
        qb.push_bind(format!("%{}%", director));
    }
    if let Some(min_rating) = filter.min_rating {
        qb.push(" AND average_rating >= ");
        qb.push_bind(min_rating);
    }
    if let Some(max_rating) = filter.max_rating {
        qb.push(" AND average_rating <= ");
        qb.push_bind(max_rating);
    }
    if let Some(search) = &filter.search {
        // Free-text search ORs a substring match across title, director,
        // cast names and genre.
        let pattern = format!("%{}%", search);
        qb.push(" AND (title ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR director ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(
            " OR EXISTS (SELECT 1 FROM jsonb_array_elements(cast_members) AS c WHERE c->>'name' ILIKE ",
        );
        qb.push_bind(pattern.clone());
        qb.push(") OR EXISTS (SELECT 1 FROM unnest(genre) AS g WHERE g ILIKE ");
        qb.push_bind(pattern);
        qb.push("))");
    }
}

pub trait MovieExt {
    /// Active movie by id.
    async fn get_movie(&self, movie_id: Uuid) -> Result<Option<Movie>, sqlx::Error>;

    async fn get_movies_with_filters(
        &self,
        filter: &MovieFilter,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Movie>, sqlx::Error>;

    async fn count_movies_with_filters(&self, filter: &MovieFilter) -> Result<i64, sqlx::Error>;

    /// Case-insensitive (title, release_year) duplicate check among active
    /// movies, optionally excluding one id (for updates).
    async fn find_duplicate_movie(
        &self,
        title: &str,
        release_year: i32,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, sqlx::Error>;

    async fn create_movie(
        &self,
        data: &MovieCreateDto,
        added_by: Uuid,
    ) -> Result<Movie, sqlx::Error>;

    /// Partial update of an active movie; absent fields keep their value.
    async fn update_movie(
        &self,
        movie_id: Uuid,
        data: &MovieUpdateDto,
    ) -> Result<Option<Movie>, sqlx::Error>;

    /// Soft delete: flips is_active, leaves the row (and its reviews).
    async fn soft_delete_movie(&self, movie_id: Uuid) -> Result<(), sqlx::Error>;

    /// Recompute the derived rating fields from the active review set.
    /// Idempotent: a crash between a review write and this call leaves
    /// stats stale, never wrong after a re-run.
    async fn update_movie_stats(&self, movie_id: Uuid) -> Result<(), sqlx::Error>;

    async fn catalog_overview(&self) -> Result<(i64, Option<f64>, Option<i64>), sqlx::Error>;

    async fn genre_distribution(&self) -> Result<Vec<(String, i64)>, sqlx::Error>;

    async fn top_rated_movies(&self, limit: i64) -> Result<Vec<Movie>, sqlx::Error>;

    async fn most_reviewed_movies(&self, limit: i64) -> Result<Vec<Movie>, sqlx::Error>;

    async fn recent_movies(&self, limit: i64) -> Result<Vec<Movie>, sqlx::Error>;

    async fn search_movies(&self, query: &str, limit: i64) -> Result<Vec<Movie>, sqlx::Error>;

    /// Recommendation candidates: active movies outside the exclusion set
    /// matching any of the taste criteria, ranked by rating then review
    /// count.
    async fn recommend_movies(
        &self,
        exclude_ids: &[Uuid],
        genres: &[String],
        directors: &[String],
        min_average_rating: f64,
        limit: i64,
    ) -> Result<Vec<Movie>, sqlx::Error>;
}

impl MovieExt for DBClient {
    async fn get_movie(&self, movie_id: Uuid) -> Result<Option<Movie>, sqlx::Error> {
        sqlx::query_as::<_, Movie>(&format!(
            "SELECT {MOVIE_COLUMNS} FROM movies WHERE id = $1 AND is_active = TRUE"
        ))
        .bind(movie_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_movies_with_filters(
        &self,
        filter: &MovieFilter,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Movie>, sqlx::Error> {
        let offset = (page.saturating_sub(1)) * limit;

        let mut qb = QueryBuilder::new(format!("SELECT {MOVIE_COLUMNS} FROM movies"));
        push_movie_filters(&mut qb, filter);
        qb.push(" ORDER BY ");
        qb.push(movie_sort_column(filter.sort_by.as_deref()));
        qb.push(" ");
        qb.push(sort_direction(filter.sort_order.as_deref()));
        qb.push(" LIMIT ");
        qb.push_bind(limit as i64);
        qb.push(" OFFSET ");
        qb.push_bind(offset as i64);

        qb.build_query_as::<Movie>().fetch_all(&self.pool).await
    }

    async fn count_movies_with_filters(&self, filter: &MovieFilter) -> Result<i64, sqlx::Error> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM movies");
        push_movie_filters(&mut qb, filter);

        qb.build_query_scalar::<i64>().fetch_one(&self.pool).await
    }

    async fn find_duplicate_movie(
        &self,
        title: &str,
        release_year: i32,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM movies
                WHERE lower(title) = lower($1)
                  AND release_year = $2
                  AND is_active = TRUE
                  AND ($3::uuid IS NULL OR id != $3)
            )
            "#,
        )
        .bind(title)
        .bind(release_year)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create_movie(
        &self,
        data: &MovieCreateDto,
        added_by: Uuid,
    ) -> Result<Movie, sqlx::Error> {
        sqlx::query_as::<_, Movie>(&format!(
            r#"
            INSERT INTO movies (title, genre, release_year, director, cast_members, synopsis,
                                poster_url, trailer_url, duration_minutes, language, country,
                                budget, box_office, imdb_rating, rotten_tomatoes_rating, added_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {MOVIE_COLUMNS}
            "#
        ))
        .bind(&data.title)
        .bind(&data.genre)
        .bind(data.release_year)
        .bind(&data.director)
        .bind(Json(data.cast.clone()))
        .bind(&data.synopsis)
        .bind(&data.poster_url)
        .bind(&data.trailer_url)
        .bind(data.duration)
        .bind(&data.language)
        .bind(&data.country)
        .bind(data.budget)
        .bind(data.box_office)
        .bind(data.imdb_rating)
        .bind(data.rotten_tomatoes_rating)
        .bind(added_by)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_movie(
        &self,
        movie_id: Uuid,
        data: &MovieUpdateDto,
    ) -> Result<Option<Movie>, sqlx::Error> {
        sqlx::query_as::<_, Movie>(&format!(
            r#"
            UPDATE movies
            SET title = COALESCE($2, title),
                genre = COALESCE($3, genre),
                release_year = COALESCE($4, release_year),
                director = COALESCE($5, director),
                cast_members = COALESCE($6, cast_members),
                synopsis = COALESCE($7, synopsis),
                poster_url = COALESCE($8, poster_url),
                trailer_url = COALESCE($9, trailer_url),
                duration_minutes = COALESCE($10, duration_minutes),
                language = COALESCE($11, language),
                country = COALESCE($12, country),
                budget = COALESCE($13, budget),
                box_office = COALESCE($14, box_office),
                imdb_rating = COALESCE($15, imdb_rating),
                rotten_tomatoes_rating = COALESCE($16, rotten_tomatoes_rating),
                updated_at = Now()
            WHERE id = $1 AND is_active = TRUE
            RETURNING {MOVIE_COLUMNS}
            "#
        ))
        .bind(movie_id)
        .bind(&data.title)
        .bind(&data.genre)
        .bind(data.release_year)
        .bind(&data.director)
        .bind(data.cast.clone().map(Json))
        .bind(&data.synopsis)
        .bind(&data.poster_url)
        .bind(&data.trailer_url)
        .bind(data.duration)
        .bind(&data.language)
        .bind(&data.country)
        .bind(data.budget)
        .bind(data.box_office)
        .bind(data.imdb_rating)
        .bind(data.rotten_tomatoes_rating)
        .fetch_optional(&self.pool)
        .await
    }

    async fn soft_delete_movie(&self, movie_id: Uuid) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            "UPDATE movies SET is_active = FALSE, updated_at = Now() WHERE id = $1 AND is_active = TRUE",
        )
        .bind(movie_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn update_movie_stats(&self, movie_id: Uuid) -> Result<(), sqlx::Error> {
        // Aggregate first, assign second. Two round-trips, no transaction:
        // the recompute is idempotent.
        let ratings: Vec<i32> = sqlx::query_scalar(
            "SELECT rating FROM reviews WHERE movie_id = $1 AND is_active = TRUE",
        )
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await?;

        let summary = stats::rating_summary(&ratings);
        let counts = summary.distribution.as_counts();

        sqlx::query(
            r#"
            UPDATE movies
            SET average_rating = $2,
                total_reviews = $3,
                rating_dist_1 = $4,
                rating_dist_2 = $5,
                rating_dist_3 = $6,
                rating_dist_4 = $7,
                rating_dist_5 = $8,
                updated_at = Now()
            WHERE id = $1
            "#,
        )
        .bind(movie_id)
        .bind(summary.average_rating)
        .bind(summary.total_reviews as i32)
        .bind(counts[0] as i32)
        .bind(counts[1] as i32)
        .bind(counts[2] as i32)
        .bind(counts[3] as i32)
        .bind(counts[4] as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn catalog_overview(&self) -> Result<(i64, Option<f64>, Option<i64>), sqlx::Error> {
        sqlx::query_as::<_, (i64, Option<f64>, Option<i64>)>(
            "SELECT COUNT(*), AVG(average_rating), SUM(total_reviews) FROM movies WHERE is_active = TRUE",
        )
        .fetch_one(&self.pool)
        .await
    }

    async fn genre_distribution(&self) -> Result<Vec<(String, i64)>, sqlx::Error> {
        sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT g, COUNT(*)
            FROM movies m, unnest(m.genre) AS g
            WHERE m.is_active = TRUE
            GROUP BY g
            ORDER BY COUNT(*) DESC, g ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn top_rated_movies(&self, limit: i64) -> Result<Vec<Movie>, sqlx::Error> {
        sqlx::query_as::<_, Movie>(&format!(
            "SELECT {MOVIE_COLUMNS} FROM movies WHERE is_active = TRUE ORDER BY average_rating DESC, total_reviews DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn most_reviewed_movies(&self, limit: i64) -> Result<Vec<Movie>, sqlx::Error> {
        sqlx::query_as::<_, Movie>(&format!(
            "SELECT {MOVIE_COLUMNS} FROM movies WHERE is_active = TRUE ORDER BY total_reviews DESC, average_rating DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn recent_movies(&self, limit: i64) -> Result<Vec<Movie>, sqlx::Error> {
        sqlx::query_as::<_, Movie>(&format!(
            "SELECT {MOVIE_COLUMNS} FROM movies WHERE is_active = TRUE ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn search_movies(&self, query: &str, limit: i64) -> Result<Vec<Movie>, sqlx::Error> {
        let pattern = format!("%{}%", query);

        sqlx::query_as::<_, Movie>(&format!(
            r#"
            SELECT {MOVIE_COLUMNS} FROM movies
            WHERE is_active = TRUE
              AND (title ILIKE $1
                   OR director ILIKE $1
                   OR EXISTS (SELECT 1 FROM jsonb_array_elements(cast_members) AS c WHERE c->>'name' ILIKE $1)
                   OR EXISTS (SELECT 1 FROM unnest(genre) AS g WHERE g ILIKE $1))
            ORDER BY average_rating DESC, total_reviews DESC
            LIMIT $2
            "#
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn recommend_movies(
        &self,
        exclude_ids: &[Uuid],
        genres: &[String],
        directors: &[String],
        min_average_rating: f64,
        limit: i64,
    ) -> Result<Vec<Movie>, sqlx::Error> {
        sqlx::query_as::<_, Movie>(&format!(
            r#"
            SELECT {MOVIE_COLUMNS} FROM movies
            WHERE is_active = TRUE
              AND id != ALL($1)
              AND (genre && $2 OR director = ANY($3) OR average_rating >= $4)
            ORDER BY average_rating DESC, total_reviews DESC
            LIMIT $5
            "#
        ))
        .bind(exclude_ids.to_vec())
        .bind(genres.to_vec())
        .bind(directors.to_vec())
        .bind(min_average_rating)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_columns_map_to_whitelisted_names() {
        assert_eq!(movie_sort_column(Some("title")), "title");
        assert_eq!(movie_sort_column(Some("releaseYear")), "release_year");
        assert_eq!(movie_sort_column(Some("averageRating")), "average_rating");
        assert_eq!(movie_sort_column(Some("totalReviews")), "total_reviews");
        assert_eq!(movie_sort_column(None), "created_at");
        // Anything unexpected falls back to the default column.
        assert_eq!(movie_sort_column(Some("password")), "created_at");
    }

    #[test]
    fn filter_builds_expected_sql() {
        let filter = MovieFilter {
            genres: vec!["Action".to_string()],
            year_min: Some(1990),
            director: Some("nolan".to_string()),
            min_rating: Some(3.5),
            search: Some("matrix".to_string()),
            ..Default::default()
        };
        let mut qb = QueryBuilder::new("SELECT id FROM movies");
        push_movie_filters(&mut qb, &filter);
        let sql = qb.into_sql();

        assert!(sql.contains("is_active = TRUE"));
        assert!(sql.contains("genre && "));
        assert!(sql.contains("release_year >= "));
        assert!(sql.contains("director ILIKE "));
        assert!(sql.contains("average_rating >= "));
        assert!(sql.contains("c->>'name' ILIKE "));
    }

    #[test]
    fn include_inactive_drops_the_active_guard() {
        let filter = MovieFilter {
            include_inactive: true,
            ..Default::default()
        };
        let mut qb = QueryBuilder::new("SELECT id FROM movies");
        push_movie_filters(&mut qb, &filter);
        assert!(!qb.into_sql().contains("is_active"));
    }
}
