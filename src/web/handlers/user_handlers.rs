// src/web/handlers/user_handlers.rs
use rocket::form::Form;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, patch, post, routes, Route, State};
use tracing::info;

use super::{parse_choice, required};
use crate::auth::{hash_password, validate_password, verify_password, AuthenticatedUser};
use crate::core::MediaCategory;
use crate::error::{ApiError, ApiResult};
use crate::repositories::{
    JobRepository, NewUser, ProfileChanges, ProfileRepository, ResumeRepository,
    SavedJobRepository, UserChanges, UserRepository,
};
use crate::types::UserType;
use crate::web::file_handlers::{discard_media, store_upload};
use crate::web::types::{
    page_window, ActionResponse, ChangePasswordRequest, CurrentUserForm, DataResponse, Paginated,
    RegisterForm, ResumeView, SavedJobView, UserDetail,
};
use crate::web::AppState;

const MAX_USERNAME_LENGTH: usize = 150;

pub fn routes() -> Vec<Route> {
    routes![
        register,
        list_users,
        current_user,
        update_current_user,
        change_password,
        user_resumes,
        saved_jobs
    ]
}

fn validate_username(username: &str) -> ApiResult<String> {
    let username = required("username", username)?;
    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ApiError::validation(
            "username",
            format!("Ensure this field has no more than {} characters.", MAX_USERNAME_LENGTH),
        ));
    }
    let valid = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if !valid {
        return Err(ApiError::validation(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(username)
}

#[post("/users", data = "<form>")]
pub async fn register(
    mut form: Form<RegisterForm<'_>>,
    state: &State<AppState>,
) -> ApiResult<(Status, Json<DataResponse<UserDetail>>)> {
    let username = validate_username(&form.username)?;
    validate_password(&form.password, &username)
        .map_err(|message| ApiError::validation("password", message))?;
    let user_type = parse_choice::<UserType>("user_type", form.user_type.as_deref())?;

    let users = UserRepository::new(state.db.pool());
    if users.find_by_username(&username).await?.is_some() {
        return Err(ApiError::Conflict(
            "A user with that username already exists.".to_string(),
        ));
    }

    let avatar = match form.avatar.as_mut() {
        Some(file) => Some(store_upload(&state.media, MediaCategory::Avatars, "avatar", file).await?),
        None => None,
    };

    let new_user = NewUser {
        username,
        password_hash: hash_password(&form.password)?,
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        email: form.email.trim().to_string(),
        avatar: avatar.clone(),
        is_staff: false,
        phone_number: form.phone_number.clone().unwrap_or_default(),
        address: form.address.clone().unwrap_or_default(),
        user_type,
    };

    let user = match users.create(&new_user).await {
        Ok(user) => user,
        Err(e) => {
            discard_media(&state.media, avatar.as_deref()).await;
            return Err(e.into());
        }
    };
    let profile = ProfileRepository::new(state.db.pool())
        .find_by_user(user.id)
        .await?;

    info!("Registered user {} ({})", user.username, user.id);
    Ok((
        Status::Created,
        Json(DataResponse::success(
            "User registered",
            UserDetail::new(&user, profile.as_ref()),
        )),
    ))
}

#[get("/users?<q>&<page>")]
pub async fn list_users(
    q: Option<String>,
    page: Option<i64>,
    _auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<Paginated<UserDetail>>>> {
    let q = q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let users = UserRepository::new(state.db.pool());
    let profiles = ProfileRepository::new(state.db.pool());

    let count = users.count_with_active_profile(q).await?;
    let window = page_window(page, count)?;
    let page_users = users
        .list_with_active_profile(q, window.limit, window.offset)
        .await?;

    let mut results = Vec::with_capacity(page_users.len());
    for user in &page_users {
        let profile = profiles.find_by_user(user.id).await?;
        results.push(UserDetail::new(user, profile.as_ref()));
    }

    Ok(Json(DataResponse::success(
        format!("{} users", count),
        Paginated::new(count, window, results),
    )))
}

#[get("/users/current-user")]
pub async fn current_user(auth: AuthenticatedUser) -> Json<DataResponse<UserDetail>> {
    Json(DataResponse::success(
        "Current user",
        UserDetail::new(&auth.user, auth.profile.as_ref()),
    ))
}

#[patch("/users/current-user", data = "<form>")]
pub async fn update_current_user(
    mut form: Form<CurrentUserForm<'_>>,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<UserDetail>>> {
    let user_type = parse_choice::<UserType>("user_type", form.user_type.as_deref())?;

    let avatar = match form.avatar.as_mut() {
        Some(file) => Some(store_upload(&state.media, MediaCategory::Avatars, "avatar", file).await?),
        None => None,
    };

    let changes = UserChanges {
        first_name: form.first_name.as_deref().map(|v| v.trim().to_string()),
        last_name: form.last_name.as_deref().map(|v| v.trim().to_string()),
        email: form.email.as_deref().map(|v| v.trim().to_string()),
        avatar: avatar.clone(),
    };
    let user = UserRepository::new(state.db.pool())
        .update(auth.id(), &changes)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;

    if avatar.is_some() {
        discard_media(&state.media, auth.user.avatar.as_deref()).await;
    }

    let profile_changes = ProfileChanges {
        phone_number: form.phone_number.clone(),
        address: form.address.clone(),
        user_type,
    };
    let profiles = ProfileRepository::new(state.db.pool());
    let profile = if profile_changes.is_empty() {
        profiles.find_by_user(user.id).await?
    } else {
        profiles.update(user.id, &profile_changes).await?
    };

    info!("User {} updated their account", user.username);
    Ok(Json(DataResponse::success(
        "User updated",
        UserDetail::new(&user, profile.as_ref()),
    )))
}

#[post("/users/change-password", data = "<request>")]
pub async fn change_password(
    request: Json<ChangePasswordRequest>,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<ActionResponse>> {
    if !verify_password(&request.old_password, &auth.user.password_hash) {
        return Err(ApiError::validation("old_password", "Wrong password."));
    }
    if request.new_password != request.confirm_new_password {
        return Err(ApiError::validation(
            "confirm_new_password",
            "The two password fields didn't match.",
        ));
    }
    validate_password(&request.new_password, &auth.user.username)
        .map_err(|message| ApiError::validation("new_password", message))?;

    UserRepository::new(state.db.pool())
        .set_password(auth.id(), &hash_password(&request.new_password)?)
        .await?;

    info!("User {} changed their password", auth.user.username);
    Ok(Json(ActionResponse::success(
        "Password updated successfully",
        "password_changed",
    )))
}

/// Visible to the user themselves, to staff and to employers reviewing applicants.
#[get("/users/<user_id>/resumes")]
pub async fn user_resumes(
    user_id: i64,
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<Vec<ResumeView>>>> {
    crate::permissions::require(auth.id() == user_id || auth.is_staff() || auth.is_employer())?;

    let resumes = ResumeRepository::new(state.db.pool())
        .list_for_candidate(user_id)
        .await?;
    Ok(Json(DataResponse::success(
        format!("{} resumes", resumes.len()),
        resumes.iter().map(ResumeView::from).collect(),
    )))
}

#[get("/users/saved-jobs")]
pub async fn saved_jobs(
    auth: AuthenticatedUser,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<Vec<SavedJobView>>>> {
    let saved = SavedJobRepository::new(state.db.pool())
        .list_active_for_user(auth.id())
        .await?;
    let jobs = JobRepository::new(state.db.pool());

    let mut results = Vec::with_capacity(saved.len());
    for entry in &saved {
        if let Some(job) = jobs.find_by_id(entry.job_id).await? {
            results.push(SavedJobView::new(entry, &job));
        }
    }

    Ok(Json(DataResponse::success(
        format!("{} saved jobs", results.len()),
        results,
    )))
}
