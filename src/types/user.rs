// src/types/user.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum UserType {
    Candidate,
    Employer,
}

impl UserType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Candidate => "candidate",
            UserType::Employer => "employer",
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "candidate" => Ok(UserType::Candidate),
            "employer" => Ok(UserType::Employer),
            other => anyhow::bail!("Unknown user type: {}. Use candidate or employer", other),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub is_staff: bool,
    pub active: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub phone_number: String,
    pub address: String,
    pub user_type: Option<UserType>,
    pub active: bool,
    pub created_date: DateTime<Utc>,
    pub updated_date: DateTime<Utc>,
}

impl Profile {
    pub fn is_candidate(&self) -> bool {
        self.user_type == Some(UserType::Candidate)
    }

    pub fn is_employer(&self) -> bool {
        self.user_type == Some(UserType::Employer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_type_parsing() {
        assert_eq!("candidate".parse::<UserType>().unwrap(), UserType::Candidate);
        assert_eq!(" Employer ".parse::<UserType>().unwrap(), UserType::Employer);
        assert!("recruiter".parse::<UserType>().is_err());
    }

    #[test]
    fn test_user_type_serializes_snake_case() {
        let json = serde_json::to_string(&UserType::Employer).unwrap();
        assert_eq!(json, "\"employer\"");
    }
}
