// src/repositories/companies.rs
use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::types::{Company, CompanyStatus};

const COMPANY_COLUMNS: &str = "id, user_id, name, description, logo, website, address, status, \
     active, created_date, updated_date";

#[derive(Debug, Clone)]
pub struct NewCompany {
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub logo: Option<String>,
    pub website: String,
    pub address: String,
}

#[derive(Debug, Clone, Default)]
pub struct CompanyChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CompanyJobCount {
    pub id: i64,
    pub name: String,
    pub job_count: i64,
}

pub struct CompanyRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> CompanyRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// New companies always start out pending approval.
    pub async fn create(&self, new_company: &NewCompany) -> Result<Company> {
        let now = Utc::now();
        let id = sqlx::query(
            r#"
            INSERT INTO companies (user_id, name, description, logo, website, address, status,
                                   active, created_date, updated_date)
            VALUES (?, ?, ?, ?, ?, ?, ?, TRUE, ?, ?)
            "#,
        )
        .bind(new_company.user_id)
        .bind(&new_company.name)
        .bind(&new_company.description)
        .bind(&new_company.logo)
        .bind(&new_company.website)
        .bind(&new_company.address)
        .bind(CompanyStatus::Pending)
        .bind(now)
        .bind(now)
        .execute(self.pool)
        .await?
        .last_insert_rowid();

        info!("Created company '{}' (id {})", new_company.name, id);
        self.find_by_id(id)
            .await?
            .context("Company vanished right after insert")
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Company>> {
        let company = sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM companies WHERE id = ?",
            COMPANY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(company)
    }

    pub async fn find_active(&self, id: i64) -> Result<Option<Company>> {
        Ok(self.find_by_id(id).await?.filter(|company| company.active))
    }

    pub async fn list_active(&self) -> Result<Vec<Company>> {
        let companies = sqlx::query_as::<_, Company>(&format!(
            "SELECT {} FROM companies WHERE active = TRUE ORDER BY id",
            COMPANY_COLUMNS
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(companies)
    }

    pub async fn list_for_owner(
        &self,
        user_id: i64,
        status: Option<CompanyStatus>,
    ) -> Result<Vec<Company>> {
        let companies = sqlx::query_as::<_, Company>(&format!(
            r#"
            SELECT {} FROM companies
            WHERE user_id = ? AND active = TRUE AND (? IS NULL OR status = ?)
            ORDER BY id
            "#,
            COMPANY_COLUMNS
        ))
        .bind(user_id)
        .bind(status)
        .bind(status)
        .fetch_all(self.pool)
        .await?;
        Ok(companies)
    }

    pub async fn update(&self, id: i64, changes: &CompanyChanges) -> Result<Option<Company>> {
        sqlx::query(
            r#"
            UPDATE companies SET
                name = COALESCE(?, name),
                description = COALESCE(?, description),
                logo = COALESCE(?, logo),
                website = COALESCE(?, website),
                address = COALESCE(?, address),
                updated_date = ?
            WHERE id = ?
            "#,
        )
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(&changes.logo)
        .bind(&changes.website)
        .bind(&changes.address)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool)
        .await?;

        self.find_by_id(id).await
    }

    pub async fn set_status(&self, id: i64, status: CompanyStatus) -> Result<Option<Company>> {
        let result = sqlx::query("UPDATE companies SET status = ?, updated_date = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        info!("Company {} is now {}", id, status);
        self.find_by_id(id).await
    }

    /// Number of jobs per company, including companies without any.
    pub async fn job_counts(&self) -> Result<Vec<CompanyJobCount>> {
        let stats = sqlx::query_as::<_, CompanyJobCount>(
            r#"
            SELECT c.id, c.name, COUNT(j.id) AS job_count
            FROM companies c
            LEFT JOIN jobs j ON j.company_id = c.id
            GROUP BY c.id, c.name
            ORDER BY c.id
            "#,
        )
        .fetch_all(self.pool)
        .await?;
        Ok(stats)
    }
}
