use super::{DBClient, MOVIE_SUMMARY_COLUMNS, MovieSummaryRow, sort_direction};
use crate::dtos::WatchlistUpdateDto;
use crate::models::{WatchlistItem, WatchlistPriority, WatchlistStatus};
use crate::utils::stats::{TasteInput, WatchlistSnapshot};
use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;
use uuid::Uuid;

const WATCHLIST_COLUMNS: &str = "id, user_id, movie_id, date_added, status, priority, notes, watched_date, personal_rating, is_private, tags, reminder_enabled, reminder_date, reminder_notified, created_at, updated_at";

fn watchlist_sort_column(sort_by: Option<&str>) -> &'static str {
    match sort_by {
        Some("priority") => "w.priority",
        Some("status") => "w.status",
        Some("createdAt") => "w.created_at",
        _ => "w.date_added",
    }
}

/// Watchlist row joined with its (still active) movie.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WatchlistRow {
    #[sqlx(flatten)]
    pub item: WatchlistItem,
    #[sqlx(flatten)]
    pub movie: MovieSummaryRow,
}

#[derive(Debug, Default, Clone)]
pub struct WatchlistFilter {
    /// Status names (already validated); exact-or-set semantics.
    pub statuses: Vec<String>,
    pub priority: Option<WatchlistPriority>,
    pub genres: Vec<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

fn joined_select() -> String {
    format!(
        "SELECT w.id, w.user_id, w.movie_id, w.date_added, w.status, w.priority, w.notes, \
         w.watched_date, w.personal_rating, w.is_private, w.tags, w.reminder_enabled, \
         w.reminder_date, w.reminder_notified, w.created_at, w.updated_at, {MOVIE_SUMMARY_COLUMNS} \
         FROM watchlist w \
         JOIN movies m ON m.id = w.movie_id"
    )
}

/// Listing filters; the caller has already joined `movies m` and scoped to
/// active movies where required.
fn push_watchlist_filters(
    qb: &mut QueryBuilder<'_, sqlx::Postgres>,
    user_id: Uuid,
    filter: &WatchlistFilter,
) {
    qb.push(" WHERE w.user_id = ");
    qb.push_bind(user_id);
    qb.push(" AND m.is_active = TRUE");
    if !filter.statuses.is_empty() {
        qb.push(" AND w.status::text = ANY(");
        qb.push_bind(filter.statuses.clone());
        qb.push(")");
    }
    if let Some(priority) = filter.priority {
        qb.push(" AND w.priority = ");
        qb.push_bind(priority);
    }
    if !filter.genres.is_empty() {
        qb.push(" AND m.genre && ");
        qb.push_bind(filter.genres.clone());
    }
}

pub trait WatchlistExt {
    /// A user's watchlist page, joined against active movies (items whose
    /// movie was soft-deleted are filtered out).
    async fn get_watchlist(
        &self,
        user_id: Uuid,
        filter: &WatchlistFilter,
        page: u32,
        limit: u32,
    ) -> Result<Vec<WatchlistRow>, sqlx::Error>;

    /// Total count under the same join and filters, for pagination.
    async fn count_watchlist(
        &self,
        user_id: Uuid,
        filter: &WatchlistFilter,
    ) -> Result<i64, sqlx::Error>;

    /// Single item with movie details; does not require the movie to still
    /// be active (the item itself stays addressable).
    async fn get_watchlist_item(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
    ) -> Result<Option<WatchlistRow>, sqlx::Error>;

    async fn add_watchlist_item(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
        status: WatchlistStatus,
        priority: WatchlistPriority,
        notes: &str,
        tags: Vec<String>,
    ) -> Result<WatchlistItem, sqlx::Error>;

    /// Apply a partial update, including the watched_date transition rule.
    /// Returns None when the (user, movie) pair is not on the list.
    async fn update_watchlist_item(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
        changes: &WatchlistUpdateDto,
    ) -> Result<Option<WatchlistItem>, sqlx::Error>;

    async fn remove_watchlist_item(&self, user_id: Uuid, movie_id: Uuid)
    -> Result<(), sqlx::Error>;

    /// Status/rating/genre/duration snapshots for the on-demand statistics
    /// block; active movies only.
    async fn watchlist_snapshots(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<WatchlistSnapshot>, sqlx::Error>;

    /// Genre/director/rating view of the watchlist for the recommendation
    /// heuristic; active movies only.
    async fn watchlist_taste(&self, user_id: Uuid) -> Result<Vec<TasteInput>, sqlx::Error>;

    /// Every movie id on the user's list, for candidate exclusion.
    async fn watchlist_movie_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error>;
}

impl WatchlistExt for DBClient {
    async fn get_watchlist(
        &self,
        user_id: Uuid,
        filter: &WatchlistFilter,
        page: u32,
        limit: u32,
    ) -> Result<Vec<WatchlistRow>, sqlx::Error> {
        let offset = (page.saturating_sub(1)) * limit;

        let mut qb = QueryBuilder::new(joined_select());
        push_watchlist_filters(&mut qb, user_id, filter);
        qb.push(" ORDER BY ");
        qb.push(watchlist_sort_column(filter.sort_by.as_deref()));
        qb.push(" ");
        qb.push(sort_direction(filter.sort_order.as_deref()));
        qb.push(" LIMIT ");
        qb.push_bind(limit as i64);
        qb.push(" OFFSET ");
        qb.push_bind(offset as i64);

        qb.build_query_as::<WatchlistRow>()
            .fetch_all(&self.pool)
            .await
    }

    async fn count_watchlist(
        &self,
        user_id: Uuid,
        filter: &WatchlistFilter,
    ) -> Result<i64, sqlx::Error> {
        let mut qb =
            QueryBuilder::new("SELECT COUNT(*) FROM watchlist w JOIN movies m ON m.id = w.movie_id");
        push_watchlist_filters(&mut qb, user_id, filter);

        qb.build_query_scalar::<i64>().fetch_one(&self.pool).await
    }

    async fn get_watchlist_item(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
    ) -> Result<Option<WatchlistRow>, sqlx::Error> {
        sqlx::query_as::<_, WatchlistRow>(&format!(
            "{} WHERE w.user_id = $1 AND w.movie_id = $2",
            joined_select()
        ))
        .bind(user_id)
        .bind(movie_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn add_watchlist_item(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
        status: WatchlistStatus,
        priority: WatchlistPriority,
        notes: &str,
        tags: Vec<String>,
    ) -> Result<WatchlistItem, sqlx::Error> {
        let watched_date: Option<DateTime<Utc>> = match status {
            WatchlistStatus::Watched => Some(Utc::now()),
            _ => None,
        };

        sqlx::query_as::<_, WatchlistItem>(&format!(
            r#"
            INSERT INTO watchlist (user_id, movie_id, status, priority, notes, tags, watched_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {WATCHLIST_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(movie_id)
        .bind(status)
        .bind(priority)
        .bind(notes)
        .bind(tags)
        .bind(watched_date)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_watchlist_item(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
        changes: &WatchlistUpdateDto,
    ) -> Result<Option<WatchlistItem>, sqlx::Error> {
        // Read-modify-write: the transition rule for watched_date depends
        // on the stored status, so fetch first.
        let existing = sqlx::query_as::<_, WatchlistItem>(&format!(
            "SELECT {WATCHLIST_COLUMNS} FROM watchlist WHERE user_id = $1 AND movie_id = $2"
        ))
        .bind(user_id)
        .bind(movie_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(existing) = existing else {
            return Ok(None);
        };

        let status = changes.status.unwrap_or(existing.status);
        let watched_date = if changes.status.is_some() {
            existing.watched_date_after(status)
        } else {
            existing.watched_date
        };
        let (reminder_enabled, reminder_date) = match &changes.reminder {
            Some(reminder) => (reminder.enabled, reminder.date.or(existing.reminder_date)),
            None => (existing.reminder_enabled, existing.reminder_date),
        };

        let updated = sqlx::query_as::<_, WatchlistItem>(&format!(
            r#"
            UPDATE watchlist
            SET status = $3,
                priority = $4,
                notes = $5,
                watched_date = $6,
                personal_rating = $7,
                is_private = $8,
                tags = $9,
                reminder_enabled = $10,
                reminder_date = $11,
                updated_at = Now()
            WHERE user_id = $1 AND movie_id = $2
            RETURNING {WATCHLIST_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(movie_id)
        .bind(status)
        .bind(changes.priority.unwrap_or(existing.priority))
        .bind(changes.notes.as_deref().unwrap_or(&existing.notes))
        .bind(watched_date)
        .bind(changes.personal_rating.or(existing.personal_rating))
        .bind(changes.is_private.unwrap_or(existing.is_private))
        .bind(changes.tags.clone().unwrap_or_else(|| existing.tags.clone()))
        .bind(reminder_enabled)
        .bind(reminder_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(updated))
    }

    async fn remove_watchlist_item(
        &self,
        user_id: Uuid,
        movie_id: Uuid,
    ) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM watchlist WHERE user_id = $1 AND movie_id = $2")
            .bind(user_id)
            .bind(movie_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }

    async fn watchlist_snapshots(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<WatchlistSnapshot>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (WatchlistStatus, Option<i32>, Vec<String>, i32)>(
            r#"
            SELECT w.status, w.personal_rating, m.genre, m.duration_minutes
            FROM watchlist w
            JOIN movies m ON m.id = w.movie_id AND m.is_active = TRUE
            WHERE w.user_id = $1
            ORDER BY w.date_added ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(status, personal_rating, genres, duration_minutes)| WatchlistSnapshot {
                    status,
                    personal_rating,
                    genres,
                    duration_minutes,
                },
            )
            .collect())
    }

    async fn watchlist_taste(&self, user_id: Uuid) -> Result<Vec<TasteInput>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (Vec<String>, String, f64)>(
            r#"
            SELECT m.genre, m.director, m.average_rating
            FROM watchlist w
            JOIN movies m ON m.id = w.movie_id AND m.is_active = TRUE
            WHERE w.user_id = $1
            ORDER BY w.date_added ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(genres, director, average_rating)| TasteInput {
                genres,
                director,
                average_rating,
            })
            .collect())
    }

    async fn watchlist_movie_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar("SELECT movie_id FROM watchlist WHERE user_id = $1")
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
        assert_eq!(watchlist_sort_column(Some("priority")), "w.priority");
        assert_eq!(watchlist_sort_column(Some("status")), "w.status");
        assert_eq!(watchlist_sort_column(None), "w.date_added");
        assert_eq!(watchlist_sort_column(Some("nope")), "w.date_added");
    }

    #[test]
    fn filters_join_out_inactive_movies() {
        let mut qb =
            QueryBuilder::new("SELECT COUNT(*) FROM watchlist w JOIN movies m ON m.id = w.movie_id");
        push_watchlist_filters(&mut qb, Uuid::new_v4(), &WatchlistFilter::default());
        let sql = qb.into_sql();
        assert!(sql.contains("m.is_active = TRUE"));
        assert!(sql.contains("w.user_id = "));
    }

    #[test]
    fn status_set_filter_compares_as_text() {
        let filter = WatchlistFilter {
            statuses: vec!["watched".to_string(), "on_hold".to_string()],
            ..Default::default()
        };
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM watchlist w JOIN movies m ON m.id = w.movie_id");
        push_watchlist_filters(&mut qb, Uuid::new_v4(), &filter);
        assert!(qb.into_sql().contains("w.status::text = ANY("));
    }
}
