// src/web/handlers/auth_handlers.rs
use rocket::serde::json::Json;
use rocket::{post, routes, Route, State};
use tracing::{info, warn};

use crate::auth::{issue_token, verify_password, IssuedToken};
use crate::error::{ApiError, ApiResult};
use crate::repositories::UserRepository;
use crate::web::types::{DataResponse, TokenRequest};
use crate::web::AppState;

pub fn routes() -> Vec<Route> {
    routes![obtain_token]
}

#[post("/auth/token", data = "<request>")]
pub async fn obtain_token(
    request: Json<TokenRequest>,
    state: &State<AppState>,
) -> ApiResult<Json<DataResponse<IssuedToken>>> {
    let user = UserRepository::new(state.db.pool())
        .find_by_username(request.username.trim())
        .await?;

    let user = match user {
        Some(user) if user.active && verify_password(&request.password, &user.password_hash) => {
            user
        }
        _ => {
            warn!("Rejected credentials for {}", request.username);
            return Err(ApiError::Unauthorized(
                "No active account found with the given credentials".to_string(),
            ));
        }
    };

    let token = issue_token(user.id, &state.auth)?;
    info!("Issued token for user {} ({})", user.username, user.id);

    Ok(Json(DataResponse::success("Token issued", token)))
}
