// src/web/types.rs
//! Response envelopes, request payloads and the JSON representation of entities

use chrono::{DateTime, NaiveDate, Utc};
use rocket::form::FromForm;
use rocket::fs::TempFile;
use rocket::serde::{Deserialize, Serialize};

use crate::analysis::FitAnalysis;
use crate::core::MediaStore;
use crate::error::{ApiError, ApiResult};
use crate::types::{
    Application, ApplicationStatus, Company, CompanyStatus, Job, JobType, ProcessingStatus, Profile,
    Resume, SavedJob, User, UserType,
};

pub const PAGE_SIZE: i64 = 10;

#[derive(Serialize)]
#[serde(crate = "rocket::serde", rename_all = "lowercase")]
pub enum ResponseType {
    Text,
    Data,
    Action,
    Error,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct TextResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct DataResponse<T> {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub data: T,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ActionResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_actions: Option<Vec<String>>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct StandardErrorResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub suggestions: Vec<String>,
}

impl TextResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Text,
            success: true,
            message: message.into(),
        }
    }
}

impl<T> DataResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            response_type: ResponseType::Data,
            success: true,
            message: message.into(),
            data,
        }
    }
}

impl ActionResponse {
    pub fn success(message: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Action,
            success: true,
            message: message.into(),
            action: action.into(),
            next_actions: None,
        }
    }

    pub fn with_next_actions(mut self, next_actions: Vec<String>) -> Self {
        self.next_actions = Some(next_actions);
        self
    }
}

impl StandardErrorResponse {
    pub fn new(error: String, error_code: String, suggestions: Vec<String>) -> Self {
        Self {
            response_type: ResponseType::Error,
            success: false,
            error,
            error_code,
            suggestions,
        }
    }
}

// Pagination

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub limit: i64,
    pub offset: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
}

/// Resolve a 1-based page number against a total count. Page 1 always
/// exists, even when empty; any other page past the end is not found.
pub fn page_window(page: Option<i64>, count: i64) -> ApiResult<PageWindow> {
    let page = page.unwrap_or(1);
    if page < 1 {
        return Err(ApiError::NotFound("Invalid page.".to_string()));
    }

    let last_page = ((count + PAGE_SIZE - 1) / PAGE_SIZE).max(1);
    if page > last_page {
        return Err(ApiError::NotFound("Invalid page.".to_string()));
    }

    Ok(PageWindow {
        limit: PAGE_SIZE,
        offset: (page - 1) * PAGE_SIZE,
        next: (page < last_page).then_some(page + 1),
        previous: (page > 1).then_some(page - 1),
    })
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct Paginated<T> {
    pub count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new(count: i64, window: PageWindow, results: Vec<T>) -> Self {
        Self {
            count,
            next: window.next,
            previous: window.previous,
            results,
        }
    }
}

// Requests

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(FromForm)]
pub struct RegisterForm<'f> {
    pub username: String,
    pub password: String,
    #[field(default = String::new())]
    pub first_name: String,
    #[field(default = String::new())]
    pub last_name: String,
    #[field(default = String::new())]
    pub email: String,
    pub avatar: Option<TempFile<'f>>,
    pub user_type: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

#[derive(FromForm)]
pub struct CurrentUserForm<'f> {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<TempFile<'f>>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub user_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_new_password: String,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct ProfileRequest {
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub user_type: Option<String>,
}

#[derive(FromForm)]
pub struct ResumeForm<'f> {
    pub title: String,
    pub file: TempFile<'f>,
    pub is_default: Option<bool>,
}

#[derive(FromForm)]
pub struct ResumeUpdateForm<'f> {
    pub title: Option<String>,
    pub file: Option<TempFile<'f>>,
    pub is_default: Option<bool>,
}

#[derive(FromForm)]
pub struct CompanyForm<'f> {
    pub name: String,
    #[field(default = String::new())]
    pub description: String,
    pub logo: Option<TempFile<'f>>,
    #[field(default = String::new())]
    pub website: String,
    #[field(default = String::new())]
    pub address: String,
}

#[derive(FromForm)]
pub struct CompanyUpdateForm<'f> {
    pub name: Option<String>,
    pub description: Option<String>,
    pub logo: Option<TempFile<'f>>,
    pub website: Option<String>,
    pub address: Option<String>,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct JobRequest {
    pub company_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub salary: i64,
    pub job_type: JobType,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct JobUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub salary: Option<i64>,
    pub job_type: Option<JobType>,
    pub expiration_date: Option<NaiveDate>,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct ApplyRequest {
    pub resume: i64,
}

#[derive(Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct StatusRequest {
    pub status: String,
}

// Representations

fn media_url_or_empty(path: Option<&str>) -> String {
    path.map(MediaStore::url).unwrap_or_default()
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ProfileView {
    pub phone_number: String,
    pub address: String,
    pub user_type: Option<UserType>,
}

impl From<&Profile> for ProfileView {
    fn from(profile: &Profile) -> Self {
        Self {
            phone_number: profile.phone_number.clone(),
            address: profile.address.clone(),
            user_type: profile.user_type,
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ProfileDetail {
    pub id: i64,
    pub user_id: i64,
    #[serde(flatten)]
    pub profile: ProfileView,
}

impl From<&Profile> for ProfileDetail {
    fn from(profile: &Profile) -> Self {
        Self {
            id: profile.id,
            user_id: profile.user_id,
            profile: ProfileView::from(profile),
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct UserDetail {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub avatar: String,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
    pub profile: Option<ProfileView>,
}

impl UserDetail {
    pub fn new(user: &User, profile: Option<&Profile>) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            avatar: media_url_or_empty(user.avatar.as_deref()),
            is_staff: user.is_staff,
            date_joined: user.date_joined,
            profile: profile.map(ProfileView::from),
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ResumeView {
    pub id: i64,
    pub candidate_id: i64,
    pub title: String,
    pub file: Option<String>,
    pub is_default: bool,
    pub processing_status: ProcessingStatus,
    pub created_date: DateTime<Utc>,
}

impl From<&Resume> for ResumeView {
    fn from(resume: &Resume) -> Self {
        Self {
            id: resume.id,
            candidate_id: resume.candidate_id,
            title: resume.title.clone(),
            file: resume.file.as_deref().map(MediaStore::url),
            is_default: resume.is_default,
            processing_status: resume.processing_status,
            created_date: resume.created_date,
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ResumeAnalysisView {
    pub processing_status: ProcessingStatus,
    pub processing_error: Option<String>,
    pub extracted_text_length: usize,
    pub analysis: Option<serde_json::Value>,
}

impl From<&Resume> for ResumeAnalysisView {
    fn from(resume: &Resume) -> Self {
        Self {
            processing_status: resume.processing_status,
            processing_error: resume.processing_error.clone(),
            extracted_text_length: resume
                .extracted_text
                .as_deref()
                .map_or(0, |text| text.chars().count()),
            analysis: resume
                .ai_analysis
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok()),
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct CompanyView {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub logo: String,
    pub website: String,
    pub address: String,
    pub status: CompanyStatus,
    pub created_date: DateTime<Utc>,
}

impl From<&Company> for CompanyView {
    fn from(company: &Company) -> Self {
        Self {
            id: company.id,
            user_id: company.user_id,
            name: company.name.clone(),
            description: company.description.clone(),
            logo: media_url_or_empty(company.logo.as_deref()),
            website: company.website.clone(),
            address: company.address.clone(),
            status: company.status,
            created_date: company.created_date,
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct JobSummary {
    pub id: i64,
    pub company_id: i64,
    pub title: String,
    pub salary: i64,
    pub job_type: JobType,
    pub created_date: DateTime<Utc>,
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            company_id: job.company_id,
            title: job.title.clone(),
            salary: job.salary,
            job_type: job.job_type,
            created_date: job.created_date,
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct JobDetail {
    #[serde(flatten)]
    pub summary: JobSummary,
    pub job_type_display: &'static str,
    pub description: Option<String>,
    pub location: String,
    pub expiration_date: Option<NaiveDate>,
    pub is_expired: bool,
    pub company: CompanyView,
    /// Null for anonymous requests.
    pub is_saved: Option<bool>,
}

impl JobDetail {
    pub fn new(job: &Job, company: &Company, is_saved: Option<bool>) -> Self {
        Self {
            summary: JobSummary::from(job),
            job_type_display: job.job_type.display_name(),
            description: job.description.clone(),
            location: job.location.clone(),
            expiration_date: job.expiration_date,
            is_expired: job.is_expired(),
            company: CompanyView::from(company),
            is_saved,
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct ApplicationView {
    pub id: i64,
    pub job: i64,
    pub candidate: i64,
    pub resume: i64,
    pub status: ApplicationStatus,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

impl From<&Application> for ApplicationView {
    fn from(application: &Application) -> Self {
        Self {
            id: application.id,
            job: application.job_id,
            candidate: application.candidate_id,
            resume: application.resume_id,
            status: application.status,
            created_date: application.created_date,
            updated_date: application.updated_date,
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct SavedJobView {
    pub id: i64,
    pub job: JobSummary,
    pub created_date: DateTime<Utc>,
}

impl SavedJobView {
    pub fn new(saved: &SavedJob, job: &Job) -> Self {
        Self {
            id: saved.id,
            job: JobSummary::from(job),
            created_date: saved.created_date,
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct RecommendationView {
    pub job: JobDetail,
    pub score: f32,
    pub fit_analysis: Option<FitAnalysis>,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct IndexStatusView {
    pub built: bool,
    pub entries: usize,
    pub jobs: usize,
    pub model: Option<String>,
    pub dimensions: Option<usize>,
    pub built_at: Option<DateTime<Utc>>,
}
