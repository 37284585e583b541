// src/web/handlers/application_handlers.rs
use rocket::serde::json::Json;
use rocket::{get, patch, post, routes, Route, State};
use tracing::info;

use super::parse_choice;
use crate::auth::{AuthenticatedUser, CandidateUser};
use crate::error::{ApiError, ApiResult};
use crate::permissions::{is_application_job_owner, is_application_owner, require};
use crate::repositories::{
    ApplicationFilter, ApplicationRepository, CompanyRepository, JobRepository,
};
use crate::types::{Application, ApplicationStatus, Company};
use crate::web::types::{ApplicationView, DataResponse, StatusRequest};
use crate::web::AppState;

pub fn routes() -> Vec<Route> {
    routes![
        list_applications,
        my_applications,
        get_application,
        review_application,
        set_application_status,
        withdraw_application
    ]
}

/// An active application with the company that posted its job.
async fn load_application(state: &AppState, id: i64) -> ApiResult<(Application, Company)> {
    let pool = state.db.pool();
    let application = ApplicationRepository::new(pool)
        .find_active(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Application"))?;
    let job = JobRepository::new(pool)
        .find_by_id(application.job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job"))?;
    let company = CompanyRepository::new(pool)
        .find_by_id(job.company_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Company"))?;
    Ok((application, company))
}

async fn move_to(
    state: &AppState,
    application: &Application,
    target: ApplicationStatus,
) -> ApiResult<Application> {
    let next = application.status.transition(target)?;
    ApplicationRepository::new(state.db.pool())
        .set_status(application.id, application.status, next)
        .await?
        .ok_or_else(|| {
            ApiError::validation(
                "status",
                format!(
                    "Application is no longer {}; reload it before moving it to {}",
                    application.status, next
                ),
            )
        })
}

/// Staff see every application, employers those on their jobs, candidates their own.
#[get("/applications?<q>&<job_id>")]
pub async fn list_applications(
    q: Option<String>,
    job_id: Option<i64>,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<Vec<ApplicationView>>>> {
    let mut filter = ApplicationFilter {
        q: q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
        job_id,
        ..Default::default()
    };
    if auth.is_employer() && !auth.is_staff() {
        filter.job_owner_id = Some(auth.id());
    } else if !auth.is_staff() {
        filter.candidate_id = Some(auth.id());
    }

    let applications = ApplicationRepository::new(state.db.pool())
        .list(&filter)
        .await?;
    Ok(Json(DataResponse::success(
        format!("{} applications", applications.len()),
        applications.iter().map(ApplicationView::from).collect(),
    )))
}

#[get("/applications/mine")]
pub async fn my_applications(
    auth: CandidateUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<Vec<ApplicationView>>>> {
    let applications = ApplicationRepository::new(state.db.pool())
        .list(&ApplicationFilter {
            candidate_id: Some(auth.id()),
            ..Default::default()
        })
        .await?;
    Ok(Json(DataResponse::success(
        format!("{} applications", applications.len()),
        applications.iter().map(ApplicationView::from).collect(),
    )))
}

#[get("/applications/<id>")]
pub async fn get_application(
    id: i64,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<ApplicationView>>> {
    let (application, company) = load_application(state, id).await?;
    require(
        is_application_owner(&auth.user, &application)
            || is_application_job_owner(&auth.user, &company)
            || auth.is_staff(),
    )?;
    Ok(Json(DataResponse::success(
        "Application",
        ApplicationView::from(&application),
    )))
}

#[post("/applications/<id>/review")]
pub async fn review_application(
    id: i64,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<ApplicationView>>> {
    let (application, company) = load_application(state, id).await?;
    require(is_application_job_owner(&auth.user, &company))?;

    let updated = move_to(state, &application, ApplicationStatus::Reviewed).await?;
    Ok(Json(DataResponse::success(
        "Application marked as reviewed",
        ApplicationView::from(&updated),
    )))
}

#[patch("/applications/<id>/status", data = "<request>")]
pub async fn set_application_status(
    id: i64,
    request: Json<StatusRequest>,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<ApplicationView>>> {
    let target = parse_choice::<ApplicationStatus>("status", Some(&request.status))?
        .ok_or_else(|| ApiError::validation("status", "This field may not be blank."))?;
    if !matches!(
        target,
        ApplicationStatus::Reviewed | ApplicationStatus::Accepted | ApplicationStatus::Rejected
    ) {
        return Err(ApiError::validation(
            "status",
            "Status must be one of: reviewed, accepted, rejected",
        ));
    }

    let (application, company) = load_application(state, id).await?;
    require(is_application_job_owner(&auth.user, &company))?;

    let updated = move_to(state, &application, target).await?;
    info!(
        "User {} moved application {} to {}",
        auth.user.username, id, updated.status
    );
    Ok(Json(DataResponse::success(
        format!("Application {}", updated.status),
        ApplicationView::from(&updated),
    )))
}

#[post("/applications/<id>/withdraw")]
pub async fn withdraw_application(
    id: i64,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<ApplicationView>>> {
    let (application, _) = load_application(state, id).await?;
    require(is_application_owner(&auth.user, &application))?;

    let updated = move_to(state, &application, ApplicationStatus::Withdrawn).await?;
    Ok(Json(DataResponse::success(
        "Application withdrawn",
        ApplicationView::from(&updated),
    )))
}
