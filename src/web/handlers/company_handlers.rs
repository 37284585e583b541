// src/web/handlers/company_handlers.rs
use rocket::form::Form;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, patch, post, routes, Route, State};
use tracing::info;

use super::{parse_choice, required};
use crate::auth::{AuthenticatedUser, EmployerUser, StaffUser};
use crate::core::MediaCategory;
use crate::error::{ApiError, ApiResult};
use crate::permissions::{is_company_owner, require};
use crate::repositories::{CompanyChanges, CompanyRepository, JobRepository, NewCompany};
use crate::types::{Company, CompanyStatus};
use crate::web::file_handlers::{discard_media, store_upload};
use crate::web::types::{
    CompanyForm, CompanyUpdateForm, CompanyView, DataResponse, JobSummary, StatusRequest,
};
use crate::web::AppState;

pub fn routes() -> Vec<Route> {
    routes![
        list_companies,
        my_companies,
        create_company,
        get_company,
        update_company,
        company_jobs,
        set_company_status
    ]
}

async fn active_company(state: &AppState, id: i64) -> ApiResult<Company> {
    CompanyRepository::new(state.db.pool())
        .find_active(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Company"))
}

#[get("/companies")]
pub async fn list_companies(
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<Vec<CompanyView>>>> {
    let companies = CompanyRepository::new(state.db.pool()).list_active().await?;
    Ok(Json(DataResponse::success(
        format!("{} companies", companies.len()),
        companies.iter().map(CompanyView::from).collect(),
    )))
}

#[get("/companies/mine?<status>")]
pub async fn my_companies(
    status: Option<String>,
    auth: EmployerUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<Vec<CompanyView>>>> {
    let status = parse_choice::<CompanyStatus>("status", status.as_deref())?;
    let companies = CompanyRepository::new(state.db.pool())
        .list_for_owner(auth.id(), status)
        .await?;
    Ok(Json(DataResponse::success(
        format!("{} companies", companies.len()),
        companies.iter().map(CompanyView::from).collect(),
    )))
}

#[post("/companies", data = "<form>")]
pub async fn create_company(
    mut form: Form<CompanyForm<'_>>,
    auth: EmployerUser,
    state: &State<AppState>,
) -> ApiResult<(Status, Json<DataResponse<CompanyView>>)> {
    let name = required("name", &form.name)?;
    let logo = match form.logo.as_mut() {
        Some(file) => Some(store_upload(&state.media, MediaCategory::Logos, "logo", file).await?),
        None => None,
    };

    let created = CompanyRepository::new(state.db.pool())
        .create(&NewCompany {
            user_id: auth.id(),
            name,
            description: form.description.trim().to_string(),
            logo: logo.clone(),
            website: form.website.trim().to_string(),
            address: form.address.trim().to_string(),
        })
        .await;
    let company = match created {
        Ok(company) => company,
        Err(e) => {
            discard_media(&state.media, logo.as_deref()).await;
            return Err(e.into());
        }
    };

    info!("User {} registered company {}", auth.user.username, company.id);
    Ok((
        Status::Created,
        Json(DataResponse::success(
            "Company created and pending approval",
            CompanyView::from(&company),
        )),
    ))
}

#[get("/companies/<id>")]
pub async fn get_company(
    id: i64,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<CompanyView>>> {
    let company = active_company(state, id).await?;
    Ok(Json(DataResponse::success("Company", CompanyView::from(&company))))
}

#[patch("/companies/<id>", data = "<form>")]
pub async fn update_company(
    id: i64,
    mut form: Form<CompanyUpdateForm<'_>>,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<CompanyView>>> {
    let current = active_company(state, id).await?;
    require(is_company_owner(&auth.user, &current))?;

    let name = match form.name.as_deref() {
        Some(name) => Some(required("name", name)?),
        None => None,
    };
    let logo = match form.logo.as_mut() {
        Some(file) => Some(store_upload(&state.media, MediaCategory::Logos, "logo", file).await?),
        None => None,
    };

    let changes = CompanyChanges {
        name,
        description: form.description.clone(),
        logo: logo.clone(),
        website: form.website.clone(),
        address: form.address.clone(),
    };
    let company = CompanyRepository::new(state.db.pool())
        .update(id, &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Company"))?;

    if logo.is_some() {
        discard_media(&state.media, current.logo.as_deref()).await;
    }

    Ok(Json(DataResponse::success("Company updated", CompanyView::from(&company))))
}

#[get("/companies/<id>/jobs")]
pub async fn company_jobs(
    id: i64,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<Vec<JobSummary>>>> {
    let company = active_company(state, id).await?;
    let jobs = JobRepository::new(state.db.pool())
        .list_for_company(company.id)
        .await?;
    Ok(Json(DataResponse::success(
        format!("{} jobs at {}", jobs.len(), company.name),
        jobs.iter().map(JobSummary::from).collect(),
    )))
}

/// Staff decision on a company registration.
#[post("/companies/<id>/status", data = "<request>")]
pub async fn set_company_status(
    id: i64,
    request: Json<StatusRequest>,
    auth: StaffUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<CompanyView>>> {
    let status = parse_choice::<CompanyStatus>("status", Some(&request.status))?
        .ok_or_else(|| ApiError::validation("status", "This field may not be blank."))?;
    if status == CompanyStatus::Pending {
        return Err(ApiError::validation(
            "status",
            "A company can only be approved or rejected",
        ));
    }

    let company = CompanyRepository::new(state.db.pool())
        .set_status(id, status)
        .await?
        .ok_or_else(|| ApiError::not_found("Company"))?;

    info!("Staff {} marked company {} as {}", auth.user.username, id, status);
    Ok(Json(DataResponse::success(
        format!("Company {}", status),
        CompanyView::from(&company),
    )))
}
