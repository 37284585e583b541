// src/web/mod.rs

pub mod file_handlers;
pub mod handlers;
pub mod services;
pub mod types;

pub use services::{AppParts, AppState};
pub use types::*;

use anyhow::Result;
use rocket::data::{Limits, ToByteUnit};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::fs::{FileServer, Options};
use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::{catch, catchers, options, Build, Request, Response, Rocket};
use tracing::info;

use crate::auth::AuthFailure;
use crate::core::ConfigManager;
use crate::core::media_store::MEDIA_URL_PREFIX;
use crate::error::ApiError;
use crate::recommendation::RecommendationError;
use file_handlers::MAX_UPLOAD_SIZE;

/// Multipart slack on top of the file itself for the other form fields.
const FORM_OVERHEAD: u64 = 1024 * 1024;

// CORS Fairing
pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, PATCH, DELETE, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

impl From<RecommendationError> for ApiError {
    fn from(err: RecommendationError) -> Self {
        match err {
            RecommendationError::NoResume => ApiError::BadRequest(err.to_string()),
            RecommendationError::NoIndex => ApiError::ServiceUnavailable(err.to_string()),
            RecommendationError::Other(e) => ApiError::from(e),
        }
    }
}

#[options("/<_..>")]
pub async fn options() -> Status {
    Status::Ok
}

fn auth_failure_message(req: &Request<'_>) -> Option<&'static str> {
    req.local_cache(AuthFailure::default).0.map(|e| e.message())
}

// Error catchers
#[catch(400)]
pub fn bad_request() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Invalid request format".to_string(),
        "BAD_REQUEST".to_string(),
        vec![
            "Check your request body format".to_string(),
            "Verify all required fields are present".to_string(),
        ],
    ))
}

#[catch(401)]
pub fn unauthorized(req: &Request<'_>) -> Json<StandardErrorResponse> {
    let message =
        auth_failure_message(req).unwrap_or("Authentication credentials were not provided");
    Json(ApiError::Unauthorized(message.to_string()).to_body())
}

#[catch(403)]
pub fn forbidden(req: &Request<'_>) -> Json<StandardErrorResponse> {
    let message = auth_failure_message(req)
        .unwrap_or("You do not have permission to perform this action");
    Json(ApiError::Forbidden(message.to_string()).to_body())
}

#[catch(404)]
pub fn not_found(req: &Request<'_>) -> Json<StandardErrorResponse> {
    Json(ApiError::NotFound(format!("No resource at {}", req.uri().path())).to_body())
}

#[catch(409)]
pub fn conflict() -> Json<StandardErrorResponse> {
    Json(ApiError::Conflict("The request conflicts with existing data".to_string()).to_body())
}

#[catch(413)]
pub fn payload_too_large() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Uploaded file is too large".to_string(),
        "PAYLOAD_TOO_LARGE".to_string(),
        vec![format!(
            "Upload files of at most {} MB",
            MAX_UPLOAD_SIZE / (1024 * 1024)
        )],
    ))
}

#[catch(422)]
pub fn unprocessable() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Request body could not be parsed".to_string(),
        "VALIDATION_ERROR".to_string(),
        vec![
            "Check field names and value types".to_string(),
            "Dates use the YYYY-MM-DD format".to_string(),
        ],
    ))
}

#[catch(500)]
pub fn internal_error() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Internal server error".to_string(),
        "INTERNAL_ERROR".to_string(),
        vec![
            "Try again in a few moments".to_string(),
            "Contact support if the problem persists".to_string(),
        ],
    ))
}

/// Body limits large enough for the biggest accepted upload.
pub fn upload_limits() -> Limits {
    Limits::default()
        .limit("file", MAX_UPLOAD_SIZE.bytes())
        .limit("data-form", (MAX_UPLOAD_SIZE + FORM_OVERHEAD).bytes())
}

/// The full application, ready to launch or to drive from a local client.
pub fn build_rocket(state: AppState) -> Rocket<Build> {
    let media_root = state.media.root().to_path_buf();
    let figment = rocket::Config::figment().merge(("limits", upload_limits()));

    rocket::custom(figment)
        .attach(Cors)
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                forbidden,
                not_found,
                conflict,
                payload_too_large,
                unprocessable,
                internal_error
            ],
        )
        .mount("/api", handlers::routes())
        .mount("/api", rocket::routes![options])
        .mount(MEDIA_URL_PREFIX, FileServer::new(media_root, Options::Missing))
        .manage(state)
}

pub async fn start_web_server(config: ConfigManager) -> Result<()> {
    let state = AppState::from_config(&config).await?;

    info!("Starting job portal API server");
    info!("Environment: {}", config.environment_name);
    info!("Database: {}", config.environment.database_path.display());
    info!("Media: {}", config.environment.media_path.display());

    let rocket = build_rocket(state);
    let figment = rocket
        .figment()
        .clone()
        .merge(("port", config.service.port))
        .merge(("address", "0.0.0.0"));

    let _rocket = rocket
        .configure(figment)
        .launch()
        .await?;

    Ok(())
}
