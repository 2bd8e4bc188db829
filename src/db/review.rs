use super::{DBClient, MOVIE_SUMMARY_COLUMNS, MovieSummaryRow, sort_direction};
use crate::models::Review;
use sqlx::QueryBuilder;
use uuid::Uuid;

const REVIEW_COLUMNS: &str = "id, user_id, movie_id, rating, review_text, title, is_recommended, helpful_votes, total_votes, is_edited, edited_at, is_spoiler, is_active, created_at, updated_at";

fn review_sort_column(sort_by: Option<&str>) -> &'static str {
    match sort_by {
        Some("rating") => "r.rating",
        Some("helpfulVotes") => "r.helpful_votes",
        _ => "r.created_at",
    }
}

/// Review row joined with its author and movie, as returned by every
/// listing query.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewListRow {
    #[sqlx(flatten)]
    pub review: Review,
    pub author_username: String,
    #[sqlx(flatten)]
    pub movie: MovieSummaryRow,
}

/// Per-review row joined with movie facts, input to the detailed user
/// statistics aggregation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserReviewStatRow {
    pub rating: i32,
    pub helpful_votes: i32,
    pub total_votes: i32,
    pub genre: Vec<String>,
    pub release_year: i32,
}

#[derive(Debug, Default, Clone)]
pub struct ReviewFilter {
    pub movie_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub ratings: Vec<i32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

fn joined_select() -> String {
    format!(
        "SELECT r.id, r.user_id, r.movie_id, r.rating, r.review_text, r.title, r.is_recommended, \
         r.helpful_votes, r.total_votes, r.is_edited, r.edited_at, r.is_spoiler, r.is_active, \
         r.created_at, r.updated_at, u.username AS author_username, {MOVIE_SUMMARY_COLUMNS} \
         FROM reviews r \
         JOIN users u ON u.id = r.user_id \
         JOIN movies m ON m.id = r.movie_id"
    )
}

fn push_review_filters(qb: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &ReviewFilter) {
    qb.push(" WHERE r.is_active = TRUE");
    if let Some(movie_id) = filter.movie_id {
        qb.push(" AND r.movie_id = ");
        qb.push_bind(movie_id);
    }
    if let Some(user_id) = filter.user_id {
        qb.push(" AND r.user_id = ");
        qb.push_bind(user_id);
    }
    if !filter.ratings.is_empty() {
        qb.push(" AND r.rating = ANY(");
        qb.push_bind(filter.ratings.clone());
        qb.push(")");
    }
}

pub trait ReviewExt {
    /// Active review by id, scoped to its movie.
    async fn get_review(
        &self,
        review_id: Uuid,
        movie_id: Uuid,
    ) -> Result<Option<ReviewListRow>, sqlx::Error>;

    async fn get_reviews_with_filters(
        &self,
        filter: &ReviewFilter,
        page: u32,
        limit: u32,
    ) -> Result<Vec<ReviewListRow>, sqlx::Error>;

    async fn count_reviews_with_filters(&self, filter: &ReviewFilter)
    -> Result<i64, sqlx::Error>;

    /// The caller's own active review of a movie, if any.
    async fn get_user_review_for_movie(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
    ) -> Result<Option<ReviewListRow>, sqlx::Error>;

    /// A user's most recent active reviews, for the public profile.
    async fn recent_reviews_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ReviewListRow>, sqlx::Error>;

    /// Insert a review. The partial unique index on (user_id, movie_id)
    /// WHERE is_active serializes concurrent duplicates; the violation
    /// surfaces as a database error for the handler to translate.
    #[allow(clippy::too_many_arguments)]
    async fn create_review(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
        rating: i32,
        review_text: &str,
        title: &str,
        is_spoiler: bool,
        is_recommended: bool,
    ) -> Result<Review, sqlx::Error>;

    /// Partial edit; marks the review edited and stamps edited_at.
    async fn update_review(
        &self,
        review_id: Uuid,
        rating: Option<i32>,
        review_text: Option<&str>,
        title: Option<&str>,
        is_spoiler: Option<bool>,
        is_recommended: Option<bool>,
    ) -> Result<Option<Review>, sqlx::Error>;

    async fn soft_delete_review(&self, review_id: Uuid) -> Result<(), sqlx::Error>;

    /// Register a helpfulness vote and return the updated counters.
    async fn mark_review_helpful(
        &self,
        review_id: Uuid,
        is_helpful: bool,
    ) -> Result<Option<Review>, sqlx::Error>;

    /// Ratings of a movie's active reviews; the fresh-statistics input.
    async fn active_ratings_for_movie(&self, movie_id: Uuid) -> Result<Vec<i32>, sqlx::Error>;

    /// Per-review stat rows for the detailed user statistics endpoint.
    async fn user_review_stat_rows(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserReviewStatRow>, sqlx::Error>;

    /// Batch soft-delete on account deletion. Returns the affected movie
    /// ids so the caller can refresh their stats.
    async fn deactivate_user_reviews(&self, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>;
}

impl ReviewExt for DBClient {
    async fn get_review(
        &self,
        review_id: Uuid,
        movie_id: Uuid,
    ) -> Result<Option<ReviewListRow>, sqlx::Error> {
        sqlx::query_as::<_, ReviewListRow>(&format!(
            "{} WHERE r.id = $1 AND r.movie_id = $2 AND r.is_active = TRUE",
            joined_select()
        ))
        .bind(review_id)
        .bind(movie_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_reviews_with_filters(
        &self,
        filter: &ReviewFilter,
        page: u32,
        limit: u32,
    ) -> Result<Vec<ReviewListRow>, sqlx::Error> {
        let offset = (page.saturating_sub(1)) * limit;

        let mut qb = QueryBuilder::new(joined_select());
        push_review_filters(&mut qb, filter);
        qb.push(" ORDER BY ");
        qb.push(review_sort_column(filter.sort_by.as_deref()));
        qb.push(" ");
        qb.push(sort_direction(filter.sort_order.as_deref()));
        qb.push(" LIMIT ");
        qb.push_bind(limit as i64);
        qb.push(" OFFSET ");
        qb.push_bind(offset as i64);

        qb.build_query_as::<ReviewListRow>()
            .fetch_all(&self.pool)
            .await
    }

    async fn count_reviews_with_filters(
        &self,
        filter: &ReviewFilter,
    ) -> Result<i64, sqlx::Error> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM reviews r");
        push_review_filters(&mut qb, filter);

        qb.build_query_scalar::<i64>().fetch_one(&self.pool).await
    }

    async fn get_user_review_for_movie(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
    ) -> Result<Option<ReviewListRow>, sqlx::Error> {
        sqlx::query_as::<_, ReviewListRow>(&format!(
            "{} WHERE r.user_id = $1 AND r.movie_id = $2 AND r.is_active = TRUE",
            joined_select()
        ))
        .bind(user_id)
        .bind(movie_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn recent_reviews_for_user(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ReviewListRow>, sqlx::Error> {
        sqlx::query_as::<_, ReviewListRow>(&format!(
            "{} WHERE r.user_id = $1 AND r.is_active = TRUE ORDER BY r.created_at DESC LIMIT $2",
            joined_select()
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    async fn create_review(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
        rating: i32,
        review_text: &str,
        title: &str,
        is_spoiler: bool,
        is_recommended: bool,
    ) -> Result<Review, sqlx::Error> {
        sqlx::query_as::<_, Review>(&format!(
            r#"
            INSERT INTO reviews (user_id, movie_id, rating, review_text, title, is_spoiler, is_recommended)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(movie_id)
        .bind(rating)
        .bind(review_text)
        .bind(title)
        .bind(is_spoiler)
        .bind(is_recommended)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_review(
        &self,
        review_id: Uuid,
        rating: Option<i32>,
        review_text: Option<&str>,
        title: Option<&str>,
        is_spoiler: Option<bool>,
        is_recommended: Option<bool>,
    ) -> Result<Option<Review>, sqlx::Error> {
        sqlx::query_as::<_, Review>(&format!(
            r#"
            UPDATE reviews
            SET rating = COALESCE($2, rating),
                review_text = COALESCE($3, review_text),
                title = COALESCE($4, title),
                is_spoiler = COALESCE($5, is_spoiler),
                is_recommended = COALESCE($6, is_recommended),
                is_edited = TRUE,
                edited_at = Now(),
                updated_at = Now()
            WHERE id = $1 AND is_active = TRUE
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(review_id)
        .bind(rating)
        .bind(review_text)
        .bind(title)
        .bind(is_spoiler)
        .bind(is_recommended)
        .fetch_optional(&self.pool)
        .await
    }

    async fn soft_delete_review(&self, review_id: Uuid) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            "UPDATE reviews SET is_active = FALSE, updated_at = Now() WHERE id = $1 AND is_active = TRUE",
        )
        .bind(review_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn mark_review_helpful(
        &self,
        review_id: Uuid,
        is_helpful: bool,
    ) -> Result<Option<Review>, sqlx::Error> {
        sqlx::query_as::<_, Review>(&format!(
            r#"
            UPDATE reviews
            SET helpful_votes = helpful_votes + CASE WHEN $2 THEN 1 ELSE 0 END,
                total_votes = total_votes + 1,
                updated_at = Now()
            WHERE id = $1 AND is_active = TRUE
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(review_id)
        .bind(is_helpful)
        .fetch_optional(&self.pool)
        .await
    }

    async fn active_ratings_for_movie(&self, movie_id: Uuid) -> Result<Vec<i32>, sqlx::Error> {
        sqlx::query_scalar("SELECT rating FROM reviews WHERE movie_id = $1 AND is_active = TRUE")
            .bind(movie_id)
            .fetch_all(&self.pool)
            .await
    }

    async fn user_review_stat_rows(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserReviewStatRow>, sqlx::Error> {
        sqlx::query_as::<_, UserReviewStatRow>(
            r#"
            SELECT r.rating, r.helpful_votes, r.total_votes, m.genre, m.release_year
            FROM reviews r
            JOIN movies m ON m.id = r.movie_id
            WHERE r.user_id = $1 AND r.is_active = TRUE
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn deactivate_user_reviews(&self, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            UPDATE reviews
            SET is_active = FALSE, updated_at = Now()
            WHERE user_id = $1 AND is_active = TRUE
            RETURNING movie_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_columns_are_whitelisted() {
        assert_eq!(review_sort_column(Some("rating")), "r.rating");
        assert_eq!(review_sort_column(Some("helpfulVotes")), "r.helpful_votes");
        assert_eq!(review_sort_column(None), "r.created_at");
        assert_eq!(review_sort_column(Some("; DROP TABLE")), "r.created_at");
    }

    #[test]
    fn filters_always_scope_to_active_reviews() {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM reviews r");
        push_review_filters(&mut qb, &ReviewFilter::default());
        assert!(qb.into_sql().contains("r.is_active = TRUE"));
    }

    #[test]
    fn rating_set_filter_binds_an_array() {
        let filter = ReviewFilter {
            ratings: vec![4, 5],
            ..Default::default()
        };
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM reviews r");
        push_review_filters(&mut qb, &filter);
        assert!(qb.into_sql().contains("r.rating = ANY("));
    }
}
