use super::{DBClient, sort_direction};
use crate::models::User;
use crate::utils::stats;
use sqlx::QueryBuilder;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, email, password, role, bio, favorite_genres, total_reviews, average_rating, movies_watched, created_at, updated_at";

fn user_sort_column(sort_by: Option<&str>) -> &'static str {
    match sort_by {
        Some("username") => "username",
        Some("email") => "email",
        _ => "created_at",
    }
}

/// User database operations trait
pub trait UserExt {
    /// Get single user by ID, username, or email.
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error>;

    /// Admin listing: optional username/email substring search, sorted and
    /// paginated.
    async fn get_users(
        &self,
        search: Option<&str>,
        sort_by: Option<&str>,
        sort_order: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<Vec<User>, sqlx::Error>;

    /// Total count for the same search, for pagination metadata.
    async fn get_user_count(&self, search: Option<&str>) -> Result<i64, sqlx::Error>;

    /// Create new user; password must already be hashed.
    async fn save_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, sqlx::Error>;

    /// Partial profile update; absent fields keep their stored value.
    async fn update_user_profile(
        &self,
        user_id: Uuid,
        username: Option<&str>,
        email: Option<&str>,
        bio: Option<&str>,
        favorite_genres: Option<Vec<String>>,
    ) -> Result<User, sqlx::Error>;

    async fn update_user_password(&self, user_id: Uuid, new_password: String)
    -> Result<(), sqlx::Error>;

    /// Recompute the user's denormalized stats from the live data: review
    /// count and mean rating over active reviews, movies watched from the
    /// watchlist. Idempotent; safe to re-run after a crash.
    async fn update_user_stats(&self, user_id: Uuid) -> Result<(), sqlx::Error>;

    /// Hard delete (account deletion). The caller is responsible for
    /// soft-deleting the user's reviews first.
    async fn delete_user(&self, user_id: Uuid) -> Result<(), sqlx::Error>;
}

impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
            ))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(username) = username {
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
            ))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(email) = email {
            // Emails are stored lowercase; match case-insensitively.
            user = sqlx::query_as::<_, User>(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE email = lower($1)"
            ))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        }

        Ok(user)
    }

    async fn get_users(
        &self,
        search: Option<&str>,
        sort_by: Option<&str>,
        sort_order: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<Vec<User>, sqlx::Error> {
        let offset = (page.saturating_sub(1)) * limit;

        let mut qb = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
        if let Some(search) = search {
            let pattern = format!("%{}%", search);
            qb.push(" WHERE (username ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR email ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }
        qb.push(" ORDER BY ");
        qb.push(user_sort_column(sort_by));
        qb.push(" ");
        qb.push(sort_direction(sort_order));
        qb.push(" LIMIT ");
        qb.push_bind(limit as i64);
        qb.push(" OFFSET ");
        qb.push_bind(offset as i64);

        qb.build_query_as::<User>().fetch_all(&self.pool).await
    }

    async fn get_user_count(&self, search: Option<&str>) -> Result<i64, sqlx::Error> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM users");
        if let Some(search) = search {
            let pattern = format!("%{}%", search);
            qb.push(" WHERE (username ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR email ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }

        qb.build_query_scalar::<i64>().fetch_one(&self.pool).await
    }

    async fn save_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (username, email, password) VALUES ($1, lower($2), $3) RETURNING {USER_COLUMNS}"
        ))
        .bind(username)
        .bind(email)
        .bind(password)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        username: Option<&str>,
        email: Option<&str>,
        bio: Option<&str>,
        favorite_genres: Option<Vec<String>>,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE(lower($3), email),
                bio = COALESCE($4, bio),
                favorite_genres = COALESCE($5, favorite_genres),
                updated_at = Now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(username)
        .bind(email)
        .bind(bio)
        .bind(favorite_genres)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_user_password(
        &self,
        user_id: Uuid,
        new_password: String,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET password = $2, updated_at = Now() WHERE id = $1")
            .bind(user_id)
            .bind(new_password)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn update_user_stats(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        // Aggregate first, assign second. The fold itself lives in
        // utils::stats so it can be tested without a database.
        let ratings: Vec<i32> =
            sqlx::query_scalar("SELECT rating FROM reviews WHERE user_id = $1 AND is_active = TRUE")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        let watched: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM watchlist WHERE user_id = $1 AND status = 'watched'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let summary = stats::rating_summary(&ratings);

        sqlx::query(
            r#"
            UPDATE users
            SET total_reviews = $2,
                average_rating = $3,
                movies_watched = $4,
                updated_at = Now()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(summary.total_reviews as i32)
        .bind(summary.average_rating)
        .bind(watched as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_user(&self, user_id: Uuid) -> Result<(), sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }

        Ok(())
    }
}
