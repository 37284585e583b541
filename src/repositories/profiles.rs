// src/repositories/profiles.rs
use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use super::contains_pattern;
use crate::types::{Profile, UserType};

const PROFILE_COLUMNS: &str =
    "id, user_id, phone_number, address, user_type, active, created_date, updated_date";

#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub user_type: Option<UserType>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.phone_number.is_none() && self.address.is_none() && self.user_type.is_none()
    }
}

pub struct ProfileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProfileRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_user(&self, user_id: i64) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(&format!(
            "SELECT {} FROM profiles WHERE user_id = ?",
            PROFILE_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(profile)
    }

    /// Active profiles, filtered by address substring and/or owner.
    pub async fn list(&self, q: Option<&str>, user_id: Option<i64>) -> Result<Vec<Profile>> {
        let pattern = q.map(contains_pattern);
        let profiles = sqlx::query_as::<_, Profile>(&format!(
            r#"
            SELECT {} FROM profiles
            WHERE active = TRUE
              AND (? IS NULL OR LOWER(address) LIKE ? ESCAPE '\')
              AND (? IS NULL OR user_id = ?)
            ORDER BY id
            "#,
            PROFILE_COLUMNS
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(user_id)
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(profiles)
    }

    pub async fn update(&self, user_id: i64, changes: &ProfileChanges) -> Result<Option<Profile>> {
        sqlx::query(
            r#"
            UPDATE profiles SET
                phone_number = COALESCE(?, phone_number),
                address = COALESCE(?, address),
                user_type = COALESCE(?, user_type),
                updated_date = ?
            WHERE user_id = ?
            "#,
        )
        .bind(&changes.phone_number)
        .bind(&changes.address)
        .bind(changes.user_type)
        .bind(Utc::now())
        .bind(user_id)
        .execute(self.pool)
        .await?;

        self.find_by_user(user_id).await
    }
}
