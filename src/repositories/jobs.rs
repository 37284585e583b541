// src/repositories/jobs.rs
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::info;

use super::contains_pattern;
use crate::types::{Job, JobType};

const JOB_COLUMNS: &str = "id, company_id, title, description, location, salary, job_type, \
     expiration_date, active, created_date, updated_date";

#[derive(Debug, Clone)]
pub struct NewJob {
    pub company_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub salary: i64,
    pub job_type: JobType,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct JobChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub salary: Option<i64>,
    pub job_type: Option<JobType>,
    pub expiration_date: Option<NaiveDate>,
}

/// Listing filter. Inactive jobs are never listed; expired ones only on request.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub q: Option<String>,
    pub company_id: Option<i64>,
    pub include_expired: bool,
}

pub struct JobRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> JobRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_job: &NewJob) -> Result<Job> {
        let now = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO jobs (company_id, title, description, location, salary, job_type,
                              expiration_date, active, created_date, updated_date)
            VALUES (?, ?, ?, ?, ?, ?, ?, TRUE, ?, ?)
            "#,
        )
        .bind(new_job.company_id)
        .bind(&new_job.title)
        .bind(&new_job.description)
        .bind(&new_job.location)
        .bind(new_job.salary)
        .bind(new_job.job_type)
        .bind(new_job.expiration_date)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?
        .last_insert_rowid();

        info!("Created job '{}' (id {})", new_job.title, id);
        self.find_by_id(id)
            .await?
            .context("Job vanished right after insert")
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(&format!(
            "SELECT {} FROM jobs WHERE id = ?",
            JOB_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(job)
    }

    pub async fn find_active(&self, id: i64) -> Result<Option<Job>> {
        Ok(self.find_by_id(id).await?.filter(|job| job.active))
    }

    pub async fn list(&self, filter: &JobFilter, limit: i64, offset: i64) -> Result<Vec<Job>> {
        let pattern = filter.q.as_deref().map(contains_pattern);
        let jobs = sqlx::query_as::<_, Job>(&format!(
            r#"
            SELECT {} FROM jobs
            WHERE active = TRUE
              AND (? IS NULL OR LOWER(title) LIKE ? ESCAPE '\')
              AND (? IS NULL OR company_id = ?)
              AND (? OR expiration_date IS NULL OR expiration_date >= ?)
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
            JOB_COLUMNS
        ))
        .bind(&pattern)
        .bind(&pattern)
        .bind(filter.company_id)
        .bind(filter.company_id)
        .bind(filter.include_expired)
        .bind(Utc::now().date_naive())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        Ok(jobs)
    }

    pub async fn count(&self, filter: &JobFilter) -> Result<i64> {
        let pattern = filter.q.as_deref().map(contains_pattern);
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM jobs
            WHERE active = TRUE
              AND (? IS NULL OR LOWER(title) LIKE ? ESCAPE '\')
              AND (? IS NULL OR company_id = ?)
              AND (? OR expiration_date IS NULL OR expiration_date >= ?)
            "#,
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(filter.company_id)
        .bind(filter.company_id)
        .bind(filter.include_expired)
        .bind(Utc::now().date_naive())
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    pub async fn list_for_company(&self, company_id: i64) -> Result<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(&format!(
            "SELECT {} FROM jobs WHERE company_id = ? AND active = TRUE ORDER BY id",
            JOB_COLUMNS
        ))
        .bind(company_id)
        .fetch_all(self.pool)
        .await?;
        Ok(jobs)
    }

    /// Every active job regardless of expiration, the input of the vector index.
    pub async fn list_active(&self) -> Result<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(&format!(
            "SELECT {} FROM jobs WHERE active = TRUE ORDER BY id",
            JOB_COLUMNS
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(jobs)
    }

    pub async fn count_active(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE active = TRUE")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    pub async fn update(&self, id: i64, changes: &JobChanges) -> Result<Option<Job>> {
        sqlx::query(
            r#"
            UPDATE jobs SET
                title = COALESCE(?, title),
                description = COALESCE(?, description),
                location = COALESCE(?, location),
                salary = COALESCE(?, salary),
                job_type = COALESCE(?, job_type),
                expiration_date = COALESCE(?, expiration_date),
                updated_date = ?
            WHERE id = ?
            "#,
        )
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(&changes.location)
        .bind(changes.salary)
        .bind(changes.job_type)
        .bind(changes.expiration_date)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await?;

        self.find_by_id(id).await
    }

    pub async fn deactivate(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE jobs SET active = FALSE, updated_date = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support;
    use chrono::Duration;

    #[tokio::test]
    async fn test_list_hides_expired_and_inactive() {
        let db = test_support::db().await;
        let owner = test_support::user(&db, "quinn", None).await;
        let company = test_support::approved_company(&db, &owner, "Quinn Ltd").await;
        let today = Utc::now().date_naive();

        let open = test_support::job(&db, &company, "Open", None).await;
        let last_day = test_support::job(&db, &company, "Last day", Some(today)).await;
        let expired =
            test_support::job(&db, &company, "Expired", Some(today - Duration::days(1))).await;
        let closed = test_support::job(&db, &company, "Closed", None).await;

        let repo = JobRepository::new(db.pool());
        repo.deactivate(closed.id).await.unwrap();

        let visible: Vec<i64> = repo
            .list(&JobFilter::default(), 10, 0)
            .await
            .unwrap()
            .iter()
            .map(|job| job.id)
            .collect();
        assert_eq!(visible, vec![open.id, last_day.id]);
        assert_eq!(repo.count(&JobFilter::default()).await.unwrap(), 2);

        let with_expired = JobFilter {
            include_expired: true,
            ..Default::default()
        };
        assert_eq!(repo.count(&with_expired).await.unwrap(), 3);
        assert!(repo
            .list(&with_expired, 10, 0)
            .await
            .unwrap()
            .iter()
            .any(|job| job.id == expired.id));
    }

    #[tokio::test]
    async fn test_title_and_company_filters() {
        let db = test_support::db().await;
        let owner = test_support::user(&db, "rita", None).await;
        let first = test_support::approved_company(&db, &owner, "First").await;
        let second = test_support::approved_company(&db, &owner, "Second").await;
        test_support::job(&db, &first, "Rust Developer", None).await;
        test_support::job(&db, &second, "Senior Rust Engineer", None).await;
        test_support::job(&db, &second, "Accountant", None).await;

        let repo = JobRepository::new(db.pool());
        let rust = JobFilter {
            q: Some("rust".to_string()),
            ..Default::default()
        };
        assert_eq!(repo.count(&rust).await.unwrap(), 2);

        let rust_at_second = JobFilter {
            q: Some("RUST".to_string()),
            company_id: Some(second.id),
            include_expired: false,
        };
        let jobs = repo.list(&rust_at_second, 10, 0).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].title, "Senior Rust Engineer");
    }

    #[tokio::test]
    async fn test_duplicate_title_within_company_rejected() {
        let db = test_support::db().await;
        let owner = test_support::user(&db, "sam", None).await;
        let company = test_support::approved_company(&db, &owner, "Sam Co").await;
        let other = test_support::approved_company(&db, &owner, "Sam Other").await;
        test_support::job(&db, &company, "Tester", None).await;
        test_support::job(&db, &other, "Tester", None).await;

        let result = JobRepository::new(db.pool())
            .create(&NewJob {
                company_id: company.id,
                title: "Tester".to_string(),
                description: None,
                location: String::new(),
                salary: 0,
                job_type: JobType::Remote,
                expiration_date: None,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_update_keeps_unset_fields() {
        let db = test_support::db().await;
        let owner = test_support::user(&db, "tina", None).await;
        let company = test_support::approved_company(&db, &owner, "Tina Co").await;
        let job = test_support::job(&db, &company, "Analyst", None).await;

        let updated = JobRepository::new(db.pool())
            .update(
                job.id,
                &JobChanges {
                    salary: Some(2500),
                    job_type: Some(JobType::PartTime),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.salary, 2500);
        assert_eq!(updated.job_type, JobType::PartTime);
        assert_eq!(updated.title, "Analyst");
        assert_eq!(updated.location, job.location);
    }
}
