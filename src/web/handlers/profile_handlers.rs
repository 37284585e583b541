// src/web/handlers/profile_handlers.rs
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, post, routes, Route, State};
use tracing::info;

use super::parse_choice;
use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::repositories::{ProfileChanges, ProfileRepository};
use crate::types::UserType;
use crate::web::types::{DataResponse, ProfileDetail, ProfileRequest};
use crate::web::AppState;

pub fn routes() -> Vec<Route> {
    routes![list_profiles, save_profile]
}

#[get("/profiles?<q>&<user_id>")]
pub async fn list_profiles(
    q: Option<String>,
    user_id: Option<i64>,
    _auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<Vec<ProfileDetail>>>> {
    let q = q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let profiles = ProfileRepository::new(state.db.pool()).list(q, user_id).await?;

    Ok(Json(DataResponse::success(
        format!("{} profiles", profiles.len()),
        profiles.iter().map(ProfileDetail::from).collect(),
    )))
}

/// Every user owns exactly one profile, so posting one updates it.
#[post("/profiles", data = "<request>")]
pub async fn save_profile(
    request: Json<ProfileRequest>,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<(Status, Json<DataResponse<ProfileDetail>>)> {
    let changes = ProfileChanges {
        phone_number: request.phone_number.clone(),
        address: request.address.clone(),
        user_type: parse_choice::<UserType>("user_type", request.user_type.as_deref())?,
    };

    let profile = ProfileRepository::new(state.db.pool())
        .update(auth.id(), &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("Profile"))?;

    info!("User {} saved their profile", auth.user.username);
    Ok((
        Status::Created,
        Json(DataResponse::success("Profile saved", ProfileDetail::from(&profile))),
    ))
}
