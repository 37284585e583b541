// src/web/handlers/recommendation_handlers.rs
use rocket::serde::json::Json;
use rocket::{get, post, routes, Route, State};
use tracing::{error, info};

use crate::auth::{AuthenticatedUser, CandidateUser, StaffUser};
use crate::error::{ApiError, ApiResult};
use crate::recommendation::IndexReport;
use crate::repositories::{CompanyRepository, SavedJobRepository};
use crate::web::types::{DataResponse, IndexStatusView, JobDetail, RecommendationView};
use crate::web::AppState;

const MAX_RECOMMENDATIONS: usize = 50;

pub fn routes() -> Vec<Route> {
    routes![recommend_jobs, rebuild_index, index_status]
}

#[get("/recommendations?<k>")]
pub async fn recommend_jobs(
    k: Option<usize>,
    auth: CandidateUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<Vec<RecommendationView>>>> {
    let k = k.unwrap_or(state.recommendation_k).clamp(1, MAX_RECOMMENDATIONS);
    let recommendations = state.recommender().recommend(auth.id(), k).await?;

    let companies = CompanyRepository::new(state.db.pool());
    let saved = SavedJobRepository::new(state.db.pool());
    let mut results = Vec::with_capacity(recommendations.len());
    for recommendation in recommendations {
        let Some(company) = companies.find_by_id(recommendation.job.company_id).await? else {
            continue;
        };
        let is_saved = saved.is_saved(auth.id(), recommendation.job.id).await?;
        results.push(RecommendationView {
            job: JobDetail::new(&recommendation.job, &company, Some(is_saved)),
            score: recommendation.score,
            fit_analysis: recommendation.fit_analysis,
        });
    }

    Ok(Json(DataResponse::success(
        format!("{} recommended jobs", results.len()),
        results,
    )))
}

#[post("/recommendations/rebuild")]
pub async fn rebuild_index(
    auth: StaffUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<Option<IndexReport>>>> {
    info!("Staff {} requested a job index rebuild", auth.user.username);

    let report = state.rebuild_index().await.map_err(|e| {
        error!("Job index rebuild failed: {:#}", e);
        ApiError::ServiceUnavailable("Job index rebuild failed".to_string())
    })?;

    let message = match &report {
        Some(report) => format!("Indexed {} jobs in {} chunks", report.jobs, report.chunks),
        None => "No active jobs to index".to_string(),
    };
    Ok(Json(DataResponse::success(message, report)))
}

#[get("/recommendations/status")]
pub async fn index_status(
    _auth: AuthenticatedUser,
    state: &State<AppState>,
) -> Json<DataResponse<IndexStatusView>> {
    let status = state.index_status().await;
    let message = if status.built {
        "Job index is available"
    } else {
        "Job index has not been built yet"
    };
    Json(DataResponse::success(message, status))
}
