// src/repositories/saved_jobs.rs
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::types::SavedJob;

const SAVED_JOB_COLUMNS: &str = "id, job_id, user_id, active, created_date, updated_date";

pub struct SavedJobRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SavedJobRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, user_id: i64, job_id: i64) -> Result<Option<SavedJob>> {
        let saved = sqlx::query_as::<_, SavedJob>(&format!(
            "SELECT {} FROM saved_jobs WHERE user_id = ? AND job_id = ?",
            SAVED_JOB_COLUMNS
        ))
        .bind(user_id)
        .bind(job_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(saved)
    }

    /// First call saves the job; every later call flips the `active` flag.
    pub async fn toggle(&self, user_id: i64, job_id: i64) -> Result<SavedJob> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO saved_jobs (job_id, user_id, active, created_date, updated_date)
            VALUES (?, ?, TRUE, ?, ?)
            ON CONFLICT (user_id, job_id)
            DO UPDATE SET active = NOT saved_jobs.active, updated_date = excluded.updated_date
            "#,
        )
        .bind(job_id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?;

        self.find(user_id, job_id)
            .await?
            .context("Saved job vanished right after upsert")
    }

    pub async fn is_saved(&self, user_id: i64, job_id: i64) -> Result<bool> {
        Ok(self
            .find(user_id, job_id)
            .await?
            .map_or(false, |saved| saved.active))
    }

    pub async fn list_active_for_user(&self, user_id: i64) -> Result<Vec<SavedJob>> {
        let saved = sqlx::query_as::<_, SavedJob>(&format!(
            "SELECT {} FROM saved_jobs WHERE user_id = ? AND active = TRUE ORDER BY id",
            SAVED_JOB_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(saved)
    }
}
