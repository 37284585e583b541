// src/repositories/applications.rs
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::contains_pattern;
use crate::types::{Application, ApplicationStatus};

const APPLICATION_COLUMNS: &str =
    "a.id, a.job_id, a.candidate_id, a.resume_id, a.status, a.active, a.created_date, a.updated_date";

/// Listing filter. `candidate_id` and `job_owner_id` restrict visibility.
#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    /// Substring of the status.
    pub q: Option<String>,
    pub job_id: Option<i64>,
    pub candidate_id: Option<i64>,
    pub job_owner_id: Option<i64>,
}

pub struct ApplicationRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ApplicationRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, job_id: i64, candidate_id: i64, resume_id: i64) -> Result<Application> {
        let now = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO applications (job_id, candidate_id, resume_id, status, active,
                                      created_date, updated_date)
            VALUES (?, ?, ?, ?, TRUE, ?, ?)
            "#,
        )
        .bind(job_id)
        .bind(candidate_id)
        .bind(resume_id)
        .bind(ApplicationStatus::Pending)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?
        .last_insert_rowid();

        info!(
            "Candidate {} applied to job {} with resume {}",
            candidate_id, job_id, resume_id
        );
        self.find_by_id(id)
            .await?
            .context("Application vanished right after insert")
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Application>> {
        let application = sqlx::query_as::<_, Application>(&format!(
            "SELECT {} FROM applications a WHERE a.id = ?",
            APPLICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(application)
    }

    pub async fn find_active(&self, id: i64) -> Result<Option<Application>> {
        Ok(self.find_by_id(id).await?.filter(|application| application.active))
    }

    pub async fn exists_for(&self, job_id: i64, candidate_id: i64) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM applications WHERE job_id = ? AND candidate_id = ?",
        )
        .bind(job_id)
        .bind(candidate_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Active applications, newest first.
    pub async fn list(&self, filter: &ApplicationFilter) -> Result<Vec<Application>> {
        let pattern = filter.q.as_deref().map(contains_pattern);
        let applications = sqlx::query_as::<_, Application>(&format!(
            r#"
            SELECT {} FROM applications a
            JOIN jobs j ON j.id = a.job_id
            JOIN companies c ON c.id = j.company_id
            WHERE a.active = TRUE
              AND (? IS NULL OR LOWER(a.status) LIKE ? ESCAPE '\')
              AND (? IS NULL OR a.job_id = ?)
              AND (? IS NULL OR a.candidate_id = ?)
              AND (? IS NULL OR c.user_id = ?)
            ORDER BY a.id DESC
            "#,
            APPLICATION_COLUMNS
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(filter.job_id)
        .bind(filter.job_id)
        .bind(filter.candidate_id)
        .bind(filter.candidate_id)
        .bind(filter.job_owner_id)
        .bind(filter.job_owner_id)
        .fetch_all(self.pool)
        .await?;
        Ok(applications)
    }

    /// Move `id` from `from` to `to` in one conditional write.
    /// `None` when the stored status is no longer `from`.
    pub async fn set_status(
        &self,
        id: i64,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> Result<Option<Application>> {
        let updated = sqlx::query(
            "UPDATE applications SET status = ?, updated_date = ? WHERE id = ? AND status = ?",
        )
        .bind(to)
        .bind(Utc::now())
        .bind(id)
        .bind(from)
        .execute(self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            warn!("Application {} is no longer {}, not moving it to {}", id, from, to);
            return Ok(None);
        }

        info!("Application {} moved from {} to {}", id, from, to);
        self.find_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::repositories::{test_support, ResumeRepository};
    use crate::types::UserType;

    #[tokio::test]
    async fn test_one_application_per_job_and_candidate() {
        let db = test_support::db().await;
        let owner = test_support::user(&db, "wendy", Some(UserType::Employer)).await;
        let candidate = test_support::user(&db, "xavier", Some(UserType::Candidate)).await;
        let company = test_support::approved_company(&db, &owner, "Wendy Co").await;
        let job = test_support::job(&db, &company, "Barista", None).await;
        let resume = test_support::resume(&db, &candidate, "cv", true).await;
        let repo = ApplicationRepository::new(db.pool());

        let application = repo.create(job.id, candidate.id, resume.id).await.unwrap();
        assert_eq!(application.status, ApplicationStatus::Pending);
        assert!(repo.exists_for(job.id, candidate.id).await.unwrap());
        assert!(repo.create(job.id, candidate.id, resume.id).await.is_err());
    }

    #[tokio::test]
    async fn test_referenced_resume_cannot_be_deleted() {
        let db = test_support::db().await;
        let owner = test_support::user(&db, "yara", Some(UserType::Employer)).await;
        let candidate = test_support::user(&db, "zack", Some(UserType::Candidate)).await;
        let company = test_support::approved_company(&db, &owner, "Yara Co").await;
        let job = test_support::job(&db, &company, "Driver", None).await;
        let resume = test_support::resume(&db, &candidate, "cv", true).await;
        ApplicationRepository::new(db.pool())
            .create(job.id, candidate.id, resume.id)
            .await
            .unwrap();

        let resumes = ResumeRepository::new(db.pool());
        assert!(resumes.is_referenced(resume.id).await.unwrap());

        let err = resumes.delete(resume.id).await.unwrap_err();
        let is_fk = matches!(
            err.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation()
        );
        assert!(is_fk);
        assert!(matches!(ApiError::from(err), ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_scopes() {
        let db = test_support::db().await;
        let owner_a = test_support::user(&db, "amy", Some(UserType::Employer)).await;
        let owner_b = test_support::user(&db, "ben", Some(UserType::Employer)).await;
        let candidate = test_support::user(&db, "cleo", Some(UserType::Candidate)).await;
        let other = test_support::user(&db, "dan", Some(UserType::Candidate)).await;
        let company_a = test_support::approved_company(&db, &owner_a, "A").await;
        let company_b = test_support::approved_company(&db, &owner_b, "B").await;
        let job_a = test_support::job(&db, &company_a, "Job A", None).await;
        let job_b = test_support::job(&db, &company_b, "Job B", None).await;
        let cv = test_support::resume(&db, &candidate, "cv", true).await;
        let other_cv = test_support::resume(&db, &other, "cv", true).await;

        let repo = ApplicationRepository::new(db.pool());
        let first = repo.create(job_a.id, candidate.id, cv.id).await.unwrap();
        let second = repo.create(job_b.id, candidate.id, cv.id).await.unwrap();
        repo.create(job_a.id, other.id, other_cv.id).await.unwrap();
        repo.set_status(second.id, ApplicationStatus::Pending, ApplicationStatus::Reviewed)
            .await
            .unwrap()
            .unwrap();

        let mine = repo
            .list(&ApplicationFilter {
                candidate_id: Some(candidate.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(
            mine.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );

        let for_owner_a = repo
            .list(&ApplicationFilter {
                job_owner_id: Some(owner_a.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(for_owner_a.len(), 2);
        assert!(for_owner_a.iter().all(|a| a.job_id == job_a.id));

        let reviewed = repo
            .list(&ApplicationFilter {
                q: Some("review".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(reviewed.len(), 1);
        assert_eq!(reviewed[0].id, second.id);
    }

    #[tokio::test]
    async fn test_status_write_requires_expected_current_status() {
        let db = test_support::db().await;
        let owner = test_support::user(&db, "erik", Some(UserType::Employer)).await;
        let candidate = test_support::user(&db, "fay", Some(UserType::Candidate)).await;
        let company = test_support::approved_company(&db, &owner, "Erik Co").await;
        let job = test_support::job(&db, &company, "Welder", None).await;
        let resume = test_support::resume(&db, &candidate, "cv", true).await;
        let repo = ApplicationRepository::new(db.pool());

        let application = repo.create(job.id, candidate.id, resume.id).await.unwrap();
        let stale = application.clone();

        let accepted = repo
            .set_status(application.id, application.status, ApplicationStatus::Accepted)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(accepted.status, ApplicationStatus::Accepted);

        let withdrawn = repo
            .set_status(stale.id, stale.status, ApplicationStatus::Withdrawn)
            .await
            .unwrap();
        assert!(withdrawn.is_none());

        let stored = repo.find_by_id(application.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Accepted);
    }
}
