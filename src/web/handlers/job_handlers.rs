// src/web/handlers/job_handlers.rs
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{delete, get, patch, post, routes, Route, State};
use std::collections::HashMap;
use tracing::{info, warn};

use super::{load_job, required};
use crate::analysis::FitAnalysis;
use crate::auth::{AuthenticatedUser, CandidateUser, EmployerUser, OptionalAuth};
use crate::error::{ApiError, ApiResult};
use crate::permissions::{
    can_view_job, is_approved_company_owner, is_company_owner, is_job_owner, is_resume_owner,
    require,
};
use crate::repositories::{
    ApplicationFilter, ApplicationRepository, CompanyRepository, JobChanges, JobFilter,
    JobRepository, NewJob, ResumeRepository, SavedJobRepository,
};
use crate::types::{Company, Job};
use crate::web::types::{
    page_window, ActionResponse, ApplicationView, ApplyRequest, DataResponse, JobDetail,
    JobRequest, JobUpdateRequest, Paginated,
};
use crate::web::AppState;

pub fn routes() -> Vec<Route> {
    routes![
        list_jobs,
        get_job,
        create_job,
        update_job,
        delete_job,
        toggle_saved_job,
        job_applications,
        apply_to_job,
        job_fit
    ]
}

fn validate_salary(salary: i64) -> ApiResult<()> {
    if salary < 0 {
        return Err(ApiError::validation(
            "salary",
            "Ensure this value is greater than or equal to 0.",
        ));
    }
    Ok(())
}

async fn is_saved_by(state: &AppState, auth: &OptionalAuth, job_id: i64) -> ApiResult<Option<bool>> {
    match &auth.user {
        Some(user) => Ok(Some(
            SavedJobRepository::new(state.db.pool())
                .is_saved(user.id(), job_id)
                .await?,
        )),
        None => Ok(None),
    }
}

/// A job its owner may modify.
async fn owned_job(state: &AppState, auth: &AuthenticatedUser, job_id: i64) -> ApiResult<(Job, Company)> {
    let (job, company) = load_job(state, job_id).await?;
    require(is_job_owner(&auth.user, &company))?;
    Ok((job, company))
}

#[get("/jobs?<q>&<company_id>&<page>")]
pub async fn list_jobs(
    q: Option<String>,
    company_id: Option<i64>,
    page: Option<i64>,
    auth: OptionalAuth,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<Paginated<JobDetail>>>> {
    let filter = JobFilter {
        q: q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
        company_id,
        include_expired: false,
    };
    let jobs = JobRepository::new(state.db.pool());
    let companies = CompanyRepository::new(state.db.pool());

    let count = jobs.count(&filter).await?;
    let window = page_window(page, count)?;
    let page_jobs = jobs.list(&filter, window.limit, window.offset).await?;

    let mut company_cache: HashMap<i64, Company> = HashMap::new();
    let mut results = Vec::with_capacity(page_jobs.len());
    for job in &page_jobs {
        if !company_cache.contains_key(&job.company_id) {
            match companies.find_by_id(job.company_id).await? {
                Some(company) => {
                    company_cache.insert(company.id, company);
                }
                None => {
                    warn!("Job {} points at missing company {}", job.id, job.company_id);
                    continue;
                }
            }
        }
        if let Some(company) = company_cache.get(&job.company_id) {
            let is_saved = is_saved_by(state, &auth, job.id).await?;
            results.push(JobDetail::new(job, company, is_saved));
        }
    }

    Ok(Json(DataResponse::success(
        format!("{} jobs", count),
        Paginated::new(count, window, results),
    )))
}

#[get("/jobs/<id>")]
pub async fn get_job(
    id: i64,
    auth: OptionalAuth,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<JobDetail>>> {
    let (job, company) = load_job(state, id).await?;
    let viewer = auth.user.as_ref().map(|user| &user.user);
    if !can_view_job(viewer, &job, &company) {
        return Err(ApiError::not_found("Job"));
    }

    let is_saved = is_saved_by(state, &auth, job.id).await?;
    Ok(Json(DataResponse::success(
        "Job",
        JobDetail::new(&job, &company, is_saved),
    )))
}

#[post("/jobs", data = "<request>")]
pub async fn create_job(
    request: Json<JobRequest>,
    auth: EmployerUser,
    state: &State<AppState>,
) -> ApiResult<(Status, Json<DataResponse<JobDetail>>)> {
    let company = CompanyRepository::new(state.db.pool())
        .find_active(request.company_id)
        .await?
        .ok_or_else(|| ApiError::validation("company_id", "Company does not exist."))?;
    require(is_company_owner(&auth.user, &company))?;
    if !is_approved_company_owner(&auth.user, &company) {
        return Err(ApiError::Forbidden(
            "Jobs can only be posted for an approved company".to_string(),
        ));
    }

    let title = required("title", &request.title)?;
    let location = required("location", &request.location)?;
    validate_salary(request.salary)?;

    let job = JobRepository::new(state.db.pool())
        .create(&NewJob {
            company_id: company.id,
            title,
            description: request.description.clone(),
            location,
            salary: request.salary,
            job_type: request.job_type,
            expiration_date: request.expiration_date,
        })
        .await?;

    info!("User {} posted job {} at {}", auth.user.username, job.id, company.name);
    Ok((
        Status::Created,
        Json(DataResponse::success(
            "Job created",
            JobDetail::new(&job, &company, Some(false)),
        )),
    ))
}

#[patch("/jobs/<id>", data = "<request>")]
pub async fn update_job(
    id: i64,
    request: Json<JobUpdateRequest>,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<JobDetail>>> {
    let (_, company) = owned_job(state, &auth, id).await?;

    let title = match request.title.as_deref() {
        Some(title) => Some(required("title", title)?),
        None => None,
    };
    let location = match request.location.as_deref() {
        Some(location) => Some(required("location", location)?),
        None => None,
    };
    if let Some(salary) = request.salary {
        validate_salary(salary)?;
    }

    let changes = JobChanges {
        title,
        description: request.description.clone(),
        location,
        salary: request.salary,
        job_type: request.job_type,
        expiration_date: request.expiration_date,
    };
    let job = JobRepository::new(state.db.pool())
        .update(id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Job"))?;

    let is_saved = SavedJobRepository::new(state.db.pool())
        .is_saved(auth.id(), job.id)
        .await?;
    Ok(Json(DataResponse::success(
        "Job updated",
        JobDetail::new(&job, &company, Some(is_saved)),
    )))
}

/// Soft delete; applications keep pointing at the job.
#[delete("/jobs/<id>")]
pub async fn delete_job(
    id: i64,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<ActionResponse>> {
    owned_job(state, &auth, id).await?;
    JobRepository::new(state.db.pool()).deactivate(id).await?;

    info!("User {} removed job {}", auth.user.username, id);
    Ok(Json(ActionResponse::success("Job deleted", "deleted")))
}

#[post("/jobs/<id>/save-job")]
pub async fn toggle_saved_job(
    id: i64,
    auth: CandidateUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<JobDetail>>> {
    let (job, company) = load_job(state, id).await?;
    if !can_view_job(Some(&auth.user), &job, &company) {
        return Err(ApiError::not_found("Job"));
    }

    let saved = SavedJobRepository::new(state.db.pool())
        .toggle(auth.id(), job.id)
        .await?;
    let message = if saved.active { "Job saved" } else { "Job removed from saved jobs" };

    Ok(Json(DataResponse::success(
        message,
        JobDetail::new(&job, &company, Some(saved.active)),
    )))
}

#[get("/jobs/<id>/applications")]
pub async fn job_applications(
    id: i64,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<Vec<ApplicationView>>>> {
    owned_job(state, &auth, id).await?;

    let applications = ApplicationRepository::new(state.db.pool())
        .list(&ApplicationFilter {
            job_id: Some(id),
            ..Default::default()
        })
        .await?;
    Ok(Json(DataResponse::success(
        format!("{} applications", applications.len()),
        applications.iter().map(ApplicationView::from).collect(),
    )))
}

#[post("/jobs/<id>/applications", data = "<request>")]
pub async fn apply_to_job(
    id: i64,
    request: Json<ApplyRequest>,
    auth: CandidateUser,
    state: &State<AppState>,
) -> ApiResult<(Status, Json<DataResponse<ApplicationView>>)> {
    let (job, _) = load_job(state, id).await?;
    if !job.is_open() {
        return Err(ApiError::BadRequest(
            "This job is no longer accepting applications.".to_string(),
        ));
    }

    let applications = ApplicationRepository::new(state.db.pool());
    if applications.exists_for(job.id, auth.id()).await? {
        return Err(ApiError::BadRequest(
            "You have already applied for this job.".to_string(),
        ));
    }

    let resume = ResumeRepository::new(state.db.pool())
        .find_active(request.resume)
        .await?
        .filter(|resume| is_resume_owner(&auth.user, resume))
        .ok_or_else(|| ApiError::validation("resume", "Resume does not belong to you."))?;

    let application = applications.create(job.id, auth.id(), resume.id).await?;
    info!(
        "User {} applied to job {} with resume {}",
        auth.user.username, job.id, resume.id
    );

    Ok((
        Status::Created,
        Json(DataResponse::success(
            "Application submitted",
            ApplicationView::from(&application),
        )),
    ))
}

/// How well the candidate's preferred resume fits this job.
#[get("/jobs/<id>/fit")]
pub async fn job_fit(
    id: i64,
    auth: CandidateUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<FitAnalysis>>> {
    let (job, company) = load_job(state, id).await?;
    if !can_view_job(Some(&auth.user), &job, &company) {
        return Err(ApiError::not_found("Job"));
    }

    let profile = state.recommender().candidate_profile(auth.id()).await?;
    let fit = state.analyzer.analyze_fit(&profile, &job).await.map_err(|e| {
        warn!("Fit analysis for job {} failed: {:#}", job.id, e);
        ApiError::ServiceUnavailable("Fit analysis is unavailable right now".to_string())
    })?;

    Ok(Json(DataResponse::success(
        format!("Fit score {}", fit.fit_score),
        fit,
    )))
}
