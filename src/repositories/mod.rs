// src/repositories/mod.rs
//! Table-level data access. Each repository borrows the shared pool.

pub mod applications;
pub mod companies;
pub mod jobs;
pub mod profiles;
pub mod resumes;
pub mod saved_jobs;
pub mod users;

pub use applications::{ApplicationFilter, ApplicationRepository};
pub use companies::{CompanyChanges, CompanyJobCount, CompanyRepository, NewCompany};
pub use jobs::{JobChanges, JobFilter, JobRepository, NewJob};
pub use profiles::{ProfileChanges, ProfileRepository};
pub use resumes::{NewResume, ResumeChanges, ResumeRepository};
pub use saved_jobs::SavedJobRepository;
pub use users::{NewUser, UserChanges, UserRepository};

/// `LIKE` pattern for a case-insensitive substring match.
pub(crate) fn contains_pattern(q: &str) -> String {
    let escaped = q
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped.to_lowercase())
}
