// src/permissions.rs
//! Object-level permission checks

use crate::error::{ApiError, ApiResult};
use crate::types::{Application, Company, Job, Resume, User};

pub fn is_resume_owner(user: &User, resume: &Resume) -> bool {
    resume.candidate_id == user.id
}

pub fn is_company_owner(user: &User, company: &Company) -> bool {
    company.user_id == user.id
}

/// Only owners of approved companies may post jobs.
pub fn is_approved_company_owner(user: &User, company: &Company) -> bool {
    is_company_owner(user, company) && company.is_approved()
}

/// `company` must be the job's company.
pub fn is_job_owner(user: &User, company: &Company) -> bool {
    is_company_owner(user, company)
}

/// Expired jobs stay visible to their owner only.
pub fn can_view_job(user: Option<&User>, job: &Job, company: &Company) -> bool {
    !job.is_expired() || user.map_or(false, |user| is_job_owner(user, company))
}

pub fn is_application_owner(user: &User, application: &Application) -> bool {
    application.candidate_id == user.id
}

/// `job_company` must be the company of the application's job.
pub fn is_application_job_owner(user: &User, job_company: &Company) -> bool {
    is_company_owner(user, job_company)
}

pub fn require(allowed: bool) -> ApiResult<()> {
    if allowed {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "You do not have permission to perform this action".to_string(),
        ))
    }
}
