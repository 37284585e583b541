pub mod application_handlers;
pub mod auth_handlers;
pub mod company_handlers;
pub mod job_handlers;
pub mod profile_handlers;
pub mod recommendation_handlers;
pub mod resume_handlers;
pub mod system_handlers;
pub mod user_handlers;

use rocket::Route;
use std::str::FromStr;

use crate::error::{ApiError, ApiResult};
use crate::repositories::{CompanyRepository, JobRepository};
use crate::types::{Company, Job};
use crate::web::AppState;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth_handlers::routes());
    routes.extend(user_handlers::routes());
    routes.extend(profile_handlers::routes());
    routes.extend(resume_handlers::routes());
    routes.extend(company_handlers::routes());
    routes.extend(job_handlers::routes());
    routes.extend(application_handlers::routes());
    routes.extend(recommendation_handlers::routes());
    routes.extend(system_handlers::routes());
    routes
}

/// Parse an optional choice field; blank counts as absent.
pub(crate) fn parse_choice<T>(field: &str, raw: Option<&str>) -> ApiResult<Option<T>>
where
    T: FromStr<Err = anyhow::Error>,
{
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e: anyhow::Error| ApiError::validation(field, e.to_string())),
        None => Ok(None),
    }
}

pub(crate) fn required(field: &str, value: &str) -> ApiResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::validation(field, "This field may not be blank."));
    }
    Ok(value.to_string())
}

/// An active job together with its company.
pub(crate) async fn load_job(state: &AppState, job_id: i64) -> ApiResult<(Job, Company)> {
    let pool = state.db.pool();
    let job = JobRepository::new(pool)
        .find_active(job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job"))?;
    let company = CompanyRepository::new(pool)
        .find_by_id(job.company_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Company"))?;
    Ok((job, company))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserType;

    #[test]
    fn test_parse_choice() {
        assert_eq!(
            parse_choice::<UserType>("user_type", Some(" Employer ")).unwrap(),
            Some(UserType::Employer)
        );
        assert_eq!(parse_choice::<UserType>("user_type", Some("")).unwrap(), None);
        assert_eq!(parse_choice::<UserType>("user_type", None).unwrap(), None);
        assert!(parse_choice::<UserType>("user_type", Some("admin")).is_err());
    }

    #[test]
    fn test_required() {
        assert_eq!(required("title", "  Baker ").unwrap(), "Baker");
        assert!(required("title", "   ").is_err());
    }
}
