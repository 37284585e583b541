// src/web/handlers/resume_handlers.rs
use rocket::form::Form;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{delete, get, patch, post, routes, Route, State};
use tracing::{error, info};

use super::required;
use crate::auth::{AuthenticatedUser, CandidateUser};
use crate::core::MediaCategory;
use crate::error::{ApiError, ApiResult};
use crate::permissions::{is_resume_owner, require};
use crate::repositories::{NewResume, ResumeChanges, ResumeRepository};
use crate::types::Resume;
use crate::web::file_handlers::{discard_media, store_upload};
use crate::web::types::{
    ActionResponse, DataResponse, ResumeAnalysisView, ResumeForm, ResumeUpdateForm, ResumeView,
};
use crate::web::AppState;

pub fn routes() -> Vec<Route> {
    routes![
        list_resumes,
        upload_resume,
        get_resume,
        update_resume,
        delete_resume,
        resume_analysis,
        reprocess_resume
    ]
}

async fn owned_resume(state: &AppState, auth: &AuthenticatedUser, id: i64) -> ApiResult<Resume> {
    let resume = ResumeRepository::new(state.db.pool())
        .find_active(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Resume"))?;
    require(is_resume_owner(&auth.user, &resume))?;
    Ok(resume)
}

/// Queue failures are logged; the resume is picked up again on restart.
async fn schedule_processing(state: &AppState, resume_id: i64) {
    if let Err(e) = state.pipeline.enqueue(resume_id).await {
        error!("Could not queue resume {}: {:#}", resume_id, e);
    }
}

#[get("/resumes")]
pub async fn list_resumes(
    auth: CandidateUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<Vec<ResumeView>>>> {
    let resumes = ResumeRepository::new(state.db.pool())
        .list_for_candidate(auth.id())
        .await?;
    Ok(Json(DataResponse::success(
        format!("{} resumes", resumes.len()),
        resumes.iter().map(ResumeView::from).collect(),
    )))
}

#[post("/resumes", data = "<form>")]
pub async fn upload_resume(
    mut form: Form<ResumeForm<'_>>,
    auth: CandidateUser,
    state: &State<AppState>,
) -> ApiResult<(Status, Json<DataResponse<ResumeView>>)> {
    let title = required("title", &form.title)?;
    let file = store_upload(&state.media, MediaCategory::Resumes, "file", &mut form.file).await?;

    let created = ResumeRepository::new(state.db.pool())
        .create(&NewResume {
            candidate_id: auth.id(),
            title,
            file: Some(file.clone()),
            is_default: form.is_default.unwrap_or(false),
        })
        .await;
    let resume = match created {
        Ok(resume) => resume,
        Err(e) => {
            discard_media(&state.media, Some(&file)).await;
            return Err(e.into());
        }
    };

    schedule_processing(state, resume.id).await;
    info!("User {} uploaded resume {}", auth.user.username, resume.id);

    Ok((
        Status::Created,
        Json(DataResponse::success(
            "Resume uploaded, processing started",
            ResumeView::from(&resume),
        )),
    ))
}

#[get("/resumes/<id>")]
pub async fn get_resume(
    id: i64,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<ResumeView>>> {
    let resume = owned_resume(state, &auth, id).await?;
    Ok(Json(DataResponse::success("Resume", ResumeView::from(&resume))))
}

#[patch("/resumes/<id>", data = "<form>")]
pub async fn update_resume(
    id: i64,
    mut form: Form<ResumeUpdateForm<'_>>,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<ResumeView>>> {
    let current = owned_resume(state, &auth, id).await?;

    let title = match form.title.as_deref() {
        Some(title) => Some(required("title", title)?),
        None => None,
    };
    let file = match form.file.as_mut() {
        Some(file) => Some(store_upload(&state.media, MediaCategory::Resumes, "file", file).await?),
        None => None,
    };

    let changes = ResumeChanges {
        title,
        file: file.clone(),
        is_default: form.is_default,
    };
    let resume = ResumeRepository::new(state.db.pool())
        .update(id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Resume"))?;

    if file.is_some() {
        discard_media(&state.media, current.file.as_deref()).await;
        schedule_processing(state, resume.id).await;
    }

    Ok(Json(DataResponse::success("Resume updated", ResumeView::from(&resume))))
}

#[delete("/resumes/<id>")]
pub async fn delete_resume(
    id: i64,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<ActionResponse>> {
    let resume = owned_resume(state, &auth, id).await?;
    let resumes = ResumeRepository::new(state.db.pool());

    if resumes.is_referenced(id).await? {
        return Err(ApiError::Conflict(
            "This resume was used in job applications and cannot be deleted".to_string(),
        ));
    }
    resumes.delete(id).await?;
    discard_media(&state.media, resume.file.as_deref()).await;

    info!("User {} deleted resume {}", auth.user.username, id);
    Ok(Json(ActionResponse::success("Resume deleted", "deleted")))
}

#[get("/resumes/<id>/analysis")]
pub async fn resume_analysis(
    id: i64,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<ResumeAnalysisView>>> {
    let resume = owned_resume(state, &auth, id).await?;
    Ok(Json(DataResponse::success(
        format!("Resume processing is {}", resume.processing_status),
        ResumeAnalysisView::from(&resume),
    )))
}

#[post("/resumes/<id>/reprocess")]
pub async fn reprocess_resume(
    id: i64,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<(Status, Json<ActionResponse>)> {
    let resume = owned_resume(state, &auth, id).await?;
    if resume.file.is_none() {
        return Err(ApiError::BadRequest(
            "This resume has no file to process".to_string(),
        ));
    }

    ResumeRepository::new(state.db.pool())
        .reset_processing(id)
        .await?;
    schedule_processing(state, id).await;

    Ok((
        Status::Accepted,
        Json(
            ActionResponse::success("Resume queued for processing", "reprocessing")
                .with_next_actions(vec![format!("GET /api/resumes/{}/analysis", id)]),
        ),
    ))
}
