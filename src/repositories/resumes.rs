// src/repositories/resumes.rs
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::types::{ProcessingStatus, Resume};

const RESUME_COLUMNS: &str = "id, candidate_id, title, file, is_default, extracted_text, \
     ai_analysis, processing_status, processing_error, active, created_date, updated_date";

#[derive(Debug, Clone)]
pub struct NewResume {
    pub candidate_id: i64,
    pub title: String,
    pub file: Option<String>,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ResumeChanges {
    pub title: Option<String>,
    /// A new file resets the ingestion state.
    pub file: Option<String>,
    pub is_default: Option<bool>,
}

pub struct ResumeRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ResumeRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    async fn clear_other_defaults(
        tx: &mut Transaction<'_, Sqlite>,
        candidate_id: i64,
        keep_id: i64,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE resumes SET is_default = FALSE, updated_date = ? \
             WHERE candidate_id = ? AND id != ? AND is_default = TRUE",
        )
        .bind(Utc::now())
        .bind(candidate_id)
        .bind(keep_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn create(&self, new_resume: &NewResume) -> Result<Resume> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            r#"
            INSERT INTO resumes (candidate_id, title, file, is_default, processing_status,
                                 active, created_date, updated_date)
            VALUES (?, ?, ?, ?, ?, TRUE, ?, ?)
            "#,
        )
        .bind(new_resume.candidate_id)
        .bind(&new_resume.title)
        .bind(&new_resume.file)
        .bind(new_resume.is_default)
        .bind(ProcessingStatus::Pending)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        if new_resume.is_default {
            Self::clear_other_defaults(&mut tx, new_resume.candidate_id, id).await?;
        }
        tx.commit().await?;

        self.find_by_id(id)
            .await?
            .context("Resume vanished right after insert")
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Resume>> {
        let resume = sqlx::query_as::<_, Resume>(&format!(
            "SELECT {} FROM resumes WHERE id = ?",
            RESUME_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(resume)
    }

    pub async fn find_active(&self, id: i64) -> Result<Option<Resume>> {
        Ok(self.find_by_id(id).await?.filter(|resume| resume.active))
    }

    pub async fn list_for_candidate(&self, candidate_id: i64) -> Result<Vec<Resume>> {
        let resumes = sqlx::query_as::<_, Resume>(&format!(
            "SELECT {} FROM resumes WHERE candidate_id = ? AND active = TRUE ORDER BY id",
            RESUME_COLUMNS
        ))
        .bind(candidate_id)
        .fetch_all(self.pool)
        .await?;
        Ok(resumes)
    }

    /// The candidate's default resume, falling back to the most recently created one.
    pub async fn preferred_for_candidate(&self, candidate_id: i64) -> Result<Option<Resume>> {
        let resume = sqlx::query_as::<_, Resume>(&format!(
            r#"
            SELECT {} FROM resumes
            WHERE candidate_id = ? AND active = TRUE
            ORDER BY is_default DESC, id DESC
            LIMIT 1
            "#,
            RESUME_COLUMNS
        ))
        .bind(candidate_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(resume)
    }

    pub async fn update(&self, id: i64, changes: &ResumeChanges) -> Result<Option<Resume>> {
        let Some(current) = self.find_by_id(id).await? else {
            return Ok(None);
        };
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE resumes SET
                title = COALESCE(?, title),
                is_default = COALESCE(?, is_default),
                updated_date = ?
            WHERE id = ?
            "#,
        )
        .bind(&changes.title)
        .bind(changes.is_default)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if let Some(file) = &changes.file {
            sqlx::query(
                r#"
                UPDATE resumes SET
                    file = ?, extracted_text = NULL, ai_analysis = NULL,
                    processing_status = ?, processing_error = NULL
                WHERE id = ?
                "#,
            )
            .bind(file)
            .bind(ProcessingStatus::Pending)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        if changes.is_default == Some(true) {
            Self::clear_other_defaults(&mut tx, current.candidate_id, id).await?;
        }
        tx.commit().await?;

        self.find_by_id(id).await
    }

    /// Hard delete. Fails with a foreign key violation while an application references it.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM resumes WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn is_referenced(&self, id: i64) -> Result<bool> {
        let references: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM applications WHERE resume_id = ?")
                .bind(id)
                .fetch_one(self.pool)
                .await?;
        Ok(references > 0)
    }

    // The processing writes below only apply while the row still points at
    // `file`; they return false once a newer upload has replaced it.

    pub async fn set_status(
        &self,
        id: i64,
        file: &str,
        status: ProcessingStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE resumes SET processing_status = ?, processing_error = ?, updated_date = ? \
             WHERE id = ? AND file = ?",
        )
        .bind(status)
        .bind(error)
        .bind(Utc::now())
        .bind(id)
        .bind(file)
        .execute(self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    pub async fn save_extracted_text(&self, id: i64, file: &str, text: &str) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE resumes SET extracted_text = ?, updated_date = ? WHERE id = ? AND file = ?",
        )
        .bind(text)
        .bind(Utc::now())
        .bind(id)
        .bind(file)
        .execute(self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    /// Stores the analysis and marks processing complete.
    pub async fn save_analysis(&self, id: i64, file: &str, analysis_json: &str) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE resumes SET ai_analysis = ?, processing_status = ?, processing_error = NULL, \
             updated_date = ? WHERE id = ? AND file = ?",
        )
        .bind(analysis_json)
        .bind(ProcessingStatus::Completed)
        .bind(Utc::now())
        .bind(id)
        .bind(file)
        .execute(self.pool)
        .await?
        .rows_affected();
        Ok(updated > 0)
    }

    /// Clears previous results so the pipeline starts from scratch.
    pub async fn reset_processing(&self, id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE resumes SET extracted_text = NULL, ai_analysis = NULL, processing_status = ?, \
             processing_error = NULL, updated_date = ? WHERE id = ?",
        )
        .bind(ProcessingStatus::Pending)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Ids of active resumes with a file whose processing never finished.
    pub async fn list_unfinished_ids(&self) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM resumes
            WHERE active = TRUE AND file IS NOT NULL
              AND processing_status IN ('pending', 'extracting', 'analyzing')
            ORDER BY id
            "#,
        )
        .fetch_all(self.pool)
        .await?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support;

    #[tokio::test]
    async fn test_only_one_default_per_candidate() {
        let db = test_support::db().await;
        let user = test_support::user(&db, "gina", None).await;
        let first = test_support::resume(&db, &user, "first", true).await;
        let second = test_support::resume(&db, &user, "second", true).await;

        let repo = ResumeRepository::new(db.pool());
        let first = repo.find_by_id(first.id).await.unwrap().unwrap();
        assert!(!first.is_default);
        assert!(second.is_default);

        repo.update(
            first.id,
            &ResumeChanges {
                is_default: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let defaults: Vec<_> = repo
            .list_for_candidate(user.id)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.is_default)
            .map(|r| r.id)
            .collect();
        assert_eq!(defaults, vec![first.id]);
    }

    #[tokio::test]
    async fn test_default_does_not_touch_other_candidates() {
        let db = test_support::db().await;
        let hank = test_support::user(&db, "hank", None).await;
        let ivy = test_support::user(&db, "ivy", None).await;
        let hanks = test_support::resume(&db, &hank, "hank-cv", true).await;
        test_support::resume(&db, &ivy, "ivy-cv", true).await;

        let repo = ResumeRepository::new(db.pool());
        assert!(repo.find_by_id(hanks.id).await.unwrap().unwrap().is_default);
    }

    #[tokio::test]
    async fn test_preferred_falls_back_to_most_recent() {
        let db = test_support::db().await;
        let user = test_support::user(&db, "jack", None).await;
        let repo = ResumeRepository::new(db.pool());

        assert!(repo.preferred_for_candidate(user.id).await.unwrap().is_none());

        test_support::resume(&db, &user, "old", false).await;
        let newest = test_support::resume(&db, &user, "new", false).await;
        assert_eq!(
            repo.preferred_for_candidate(user.id).await.unwrap().unwrap().id,
            newest.id
        );

        let default = test_support::resume(&db, &user, "default", true).await;
        test_support::resume(&db, &user, "newer", false).await;
        assert_eq!(
            repo.preferred_for_candidate(user.id).await.unwrap().unwrap().id,
            default.id
        );
    }

    #[tokio::test]
    async fn test_new_file_resets_processing() {
        let db = test_support::db().await;
        let user = test_support::user(&db, "kate", None).await;
        let resume = test_support::resume(&db, &user, "cv", false).await;
        let repo = ResumeRepository::new(db.pool());

        let file = resume.file.clone().unwrap();
        assert!(repo.save_extracted_text(resume.id, &file, "Rust developer").await.unwrap());
        assert!(repo.save_analysis(resume.id, &file, "{}").await.unwrap());
        let done = repo.find_by_id(resume.id).await.unwrap().unwrap();
        assert_eq!(done.processing_status, ProcessingStatus::Completed);

        let updated = repo
            .update(
                resume.id,
                &ResumeChanges {
                    file: Some("resumes/other.pdf".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.processing_status, ProcessingStatus::Pending);
        assert!(updated.extracted_text.is_none());
        assert!(updated.ai_analysis.is_none());
        assert_eq!(updated.file.as_deref(), Some("resumes/other.pdf"));

        // Writes for the replaced file no longer land.
        assert!(!repo.save_analysis(resume.id, &file, "{}").await.unwrap());
        assert!(!repo
            .set_status(resume.id, &file, ProcessingStatus::Failed, Some("gone"))
            .await
            .unwrap());
        let current = repo.find_by_id(resume.id).await.unwrap().unwrap();
        assert_eq!(current.processing_status, ProcessingStatus::Pending);
        assert!(current.ai_analysis.is_none());
    }

    #[tokio::test]
    async fn test_unfinished_ids() {
        let db = test_support::db().await;
        let user = test_support::user(&db, "liam", None).await;
        let pending = test_support::resume(&db, &user, "a", false).await;
        let analyzing = test_support::resume(&db, &user, "b", false).await;
        let failed = test_support::resume(&db, &user, "c", false).await;
        let repo = ResumeRepository::new(db.pool());

        repo.set_status(analyzing.id, "resumes/b.txt", ProcessingStatus::Analyzing, None)
            .await
            .unwrap();
        repo.set_status(failed.id, "resumes/c.txt", ProcessingStatus::Failed, Some("boom"))
            .await
            .unwrap();

        let ids = repo.list_unfinished_ids().await.unwrap();
        assert_eq!(ids, vec![pending.id, analyzing.id]);
    }
}
