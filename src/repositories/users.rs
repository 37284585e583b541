// src/repositories/users.rs
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use super::contains_pattern;
use crate::types::{User, UserType};

const USER_COLUMNS: &str = "u.id, u.username, u.password_hash, u.first_name, u.last_name, \
     u.email, u.avatar, u.is_staff, u.active, u.date_joined";

/// Registration payload. The profile row is created together with the user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub is_staff: bool,
    pub phone_number: String,
    pub address: String,
    pub user_type: Option<UserType>,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let user_id = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, first_name, last_name, email, avatar,
                               is_staff, active, date_joined)
            VALUES (?, ?, ?, ?, ?, ?, ?, TRUE, ?)
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.password_hash)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.email)
        .bind(&new_user.avatar)
        .bind(new_user.is_staff)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, phone_number, address, user_type, active,
                                  created_date, updated_date)
            VALUES (?, ?, ?, ?, TRUE, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(&new_user.phone_number)
        .bind(&new_user.address)
        .bind(new_user.user_type)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to create profile")?;

        tx.commit().await?;
        info!("Created user {} (id {})", new_user.username, user_id);

        self.find_by_id(user_id)
            .await?
            .context("User vanished right after insert")
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users u WHERE u.id = ?",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users u WHERE u.username = ?",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(self.pool)
        .await?;
        Ok(user)
    }

    /// Users whose profile is active, optionally filtered by username substring.
    pub async fn list_with_active_profile(
        &self,
        q: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>> {
        let pattern = q.map(contains_pattern);
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {} FROM users u
            JOIN profiles p ON p.user_id = u.id
            WHERE p.active = TRUE
              AND (? IS NULL OR LOWER(u.username) LIKE ? ESCAPE '\')
            ORDER BY u.id
            LIMIT ? OFFSET ?
            "#,
            USER_COLUMNS
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        Ok(users)
    }

    pub async fn count_with_active_profile(&self, q: Option<&str>) -> Result<i64> {
        let pattern = q.map(contains_pattern);
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM users u
            JOIN profiles p ON p.user_id = u.id
            WHERE p.active = TRUE
              AND (? IS NULL OR LOWER(u.username) LIKE ? ESCAPE '\')
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    pub async fn update(&self, id: i64, changes: &UserChanges) -> Result<Option<User>> {
        sqlx::query(
            r#"
            UPDATE users SET
                first_name = COALESCE(?, first_name),
                last_name = COALESCE(?, last_name),
                email = COALESCE(?, email),
                avatar = COALESCE(?, avatar)
            WHERE id = ?
            "#,
        )
        .bind(&changes.first_name)
        .bind(&changes.last_name)
        .bind(&changes.email)
        .bind(&changes.avatar)
        .bind(id)
        .execute(self.pool)
        .await?;

        self.find_by_id(id).await
    }

    pub async fn set_password(&self, id: i64, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support;
    use crate::repositories::ProfileRepository;

    #[tokio::test]
    async fn test_create_user_also_creates_profile() {
        let db = test_support::db().await;
        let user = test_support::user(&db, "alice", Some(UserType::Candidate)).await;

        let profile = ProfileRepository::new(db.pool())
            .find_by_user(user.id)
            .await
            .unwrap()
            .unwrap();
        assert!(profile.is_candidate());
        assert!(user.active);
        assert!(!user.is_staff);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_unique_violation() {
        let db = test_support::db().await;
        test_support::user(&db, "bob", None).await;

        let err = UserRepository::new(db.pool())
            .create(&NewUser {
                username: "bob".to_string(),
                password_hash: "x".to_string(),
                first_name: String::new(),
                last_name: String::new(),
                email: String::new(),
                avatar: None,
                is_staff: false,
                phone_number: String::new(),
                address: String::new(),
                user_type: None,
            })
            .await
            .unwrap_err();

        let is_unique = matches!(
            err.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db_err)) if db_err.is_unique_violation()
        );
        assert!(is_unique);
    }

    #[tokio::test]
    async fn test_search_and_count_by_username() {
        let db = test_support::db().await;
        test_support::user(&db, "Johnny", None).await;
        test_support::user(&db, "joanna", None).await;
        test_support::user(&db, "mike", None).await;

        let repo = UserRepository::new(db.pool());
        let found = repo.list_with_active_profile(Some("jo"), 10, 0).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(repo.count_with_active_profile(Some("JO")).await.unwrap(), 2);
        assert_eq!(repo.count_with_active_profile(None).await.unwrap(), 3);

        let second_page = repo.list_with_active_profile(None, 2, 2).await.unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].username, "mike");
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let db = test_support::db().await;
        let user = test_support::user(&db, "carol", None).await;

        let repo = UserRepository::new(db.pool());
        let updated = repo
            .update(
                user.id,
                &UserChanges {
                    first_name: Some("Caroline".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.first_name, "Caroline");
        assert_eq!(updated.email, user.email);
    }
}
