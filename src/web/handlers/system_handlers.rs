// src/web/handlers/system_handlers.rs
use rocket::serde::json::Json;
use rocket::{get, routes, Route, State};
use tracing::{info, warn};

use crate::auth::{OptionalAuth, StaffUser};
use crate::error::ApiResult;
use crate::repositories::{CompanyJobCount, CompanyRepository};
use crate::web::types::{DataResponse, TextResponse};
use crate::web::AppState;

pub fn routes() -> Vec<Route> {
    routes![health, job_stats]
}

#[get("/health")]
pub async fn health(auth: OptionalAuth, state: &State<AppState>) -> Json<TextResponse> {
    if let Some(user) = auth.user {
        info!("Health check by authenticated user: {}", user.user.username);
    } else {
        info!("Health check by anonymous user");
    }
    if let Err(e) = state.db.health_check().await {
        warn!("Database unhealthy: {:#}", e);
    }
    Json(TextResponse::success("OK"))
}

#[get("/stats/jobs")]
pub async fn job_stats(
    _auth: StaffUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<Vec<CompanyJobCount>>>> {
    let stats = CompanyRepository::new(state.db.pool()).job_counts().await?;
    Ok(Json(DataResponse::success(
        format!("Job counts for {} companies", stats.len()),
        stats,
    )))
}
