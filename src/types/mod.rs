// src/types/mod.rs
//! Domain records shared by the repositories, the web layer and the pipelines

pub mod application;
pub mod company;
pub mod job;
pub mod resume;
pub mod user;

pub use application::{Application, ApplicationStatus, TransitionError};
pub use company::{Company, CompanyStatus};
pub use job::{Job, JobType, SavedJob};
pub use resume::{ProcessingStatus, Resume};
pub use user::{Profile, User, UserType};
