// src/auth.rs
use anyhow::{Context, Result};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::{Request, State};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use tracing::{debug, warn};

use crate::core::config_manager::AuthSettings;
use crate::repositories::{ProfileRepository, UserRepository};
use crate::types::{Profile, User};
use crate::web::AppState;

pub const MIN_PASSWORD_LENGTH: usize = 8;

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789", "1234567890", "qwerty123",
    "qwertyuiop", "iloveyou", "admin123", "letmein1", "welcome1", "abc12345", "football",
    "baseball", "sunshine", "princess", "starwars", "trustno1", "passw0rd", "11111111",
    "00000000", "monkey123", "dragon123", "master123", "whatever",
];

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

pub fn issue_token(user_id: i64, settings: &AuthSettings) -> Result<IssuedToken> {
    let now = Utc::now();
    let ttl = Duration::hours(settings.token_ttl_hours);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + ttl).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    let access_token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
    )
    .context("Failed to sign access token")?;

    Ok(IssuedToken {
        access_token,
        token_type: "Bearer",
        expires_in: ttl.num_seconds(),
    })
}

/// Returns the user id carried by a valid, unexpired token.
pub fn verify_token(token: &str, settings: &AuthSettings) -> Result<i64> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.jwt_secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )?;
    data.claims
        .sub
        .parse()
        .context("Token subject is not a user id")
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;
    Ok(hash.to_string())
}

/// False for a wrong password and for a malformed stored hash.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// Reject passwords that are short, numeric, close to the username or common.
pub fn validate_password(password: &str, username: &str) -> std::result::Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "This password is too short. It must contain at least {} characters.",
            MIN_PASSWORD_LENGTH
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err("This password is entirely numeric.".to_string());
    }

    let lowered = password.to_lowercase();
    let username = username.trim().to_lowercase();
    if !username.is_empty() && (lowered == username || lowered.contains(&username)) {
        return Err("The password is too similar to the username.".to_string());
    }
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return Err("This password is too common.".to_string());
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    TokenVerificationFailed,
    InactiveUser,
    NotAuthorized,
    DatabaseError,
}

impl AuthError {
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Authentication credentials were not provided",
            AuthError::InvalidToken => "Invalid authorization header format",
            AuthError::TokenVerificationFailed => "Token is invalid or expired",
            AuthError::InactiveUser => "User not found or inactive",
            AuthError::NotAuthorized => "You do not have permission to perform this action",
            AuthError::DatabaseError => "Database error occurred",
        }
    }
}

/// Why the first failing guard on this request failed, read back by the catchers.
/// `local_cache` keeps the first value stored, so later failures do not replace it.
#[derive(Debug, Default)]
pub struct AuthFailure(pub Option<AuthError>);

fn reject<T>(req: &Request<'_>, status: Status, error: AuthError) -> Outcome<T, AuthError> {
    req.local_cache(|| AuthFailure(Some(error)));
    Outcome::Error((status, error))
}

/// A request carrying a valid bearer token for an active user.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    pub profile: Option<Profile>,
}

impl AuthenticatedUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }

    pub fn is_candidate(&self) -> bool {
        self.profile.as_ref().map_or(false, Profile::is_candidate)
    }

    pub fn is_employer(&self) -> bool {
        self.profile.as_ref().map_or(false, Profile::is_employer)
    }

    pub fn is_staff(&self) -> bool {
        self.user.is_staff
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let state = match req.guard::<&State<AppState>>().await {
            Outcome::Success(state) => state,
            _ => return reject(req, Status::InternalServerError, AuthError::DatabaseError),
        };

        let token = match req.headers().get_one("Authorization") {
            Some(header) => match header.strip_prefix("Bearer ") {
                Some(token) => token.trim(),
                None => {
                    warn!("Invalid Authorization header format");
                    return reject(req, Status::Unauthorized, AuthError::InvalidToken);
                }
            },
            None => return reject(req, Status::Unauthorized, AuthError::MissingToken),
        };

        let user_id = match verify_token(token, &state.auth) {
            Ok(id) => id,
            Err(e) => {
                warn!("Token verification failed: {}", e);
                return reject(req, Status::Unauthorized, AuthError::TokenVerificationFailed);
            }
        };

        let pool = state.db.pool();
        let user = match UserRepository::new(pool).find_by_id(user_id).await {
            Ok(Some(user)) if user.active => user,
            Ok(_) => return reject(req, Status::Unauthorized, AuthError::InactiveUser),
            Err(e) => {
                warn!("Failed to load user {}: {:#}", user_id, e);
                return reject(req, Status::InternalServerError, AuthError::DatabaseError);
            }
        };
        let profile = match ProfileRepository::new(pool).find_by_user(user.id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("Failed to load profile of user {}: {:#}", user.id, e);
                return reject(req, Status::InternalServerError, AuthError::DatabaseError);
            }
        };

        debug!("Authenticated user {} ({})", user.username, user.id);
        Outcome::Success(AuthenticatedUser { user, profile })
    }
}

/// Authentication when present; anonymous requests still succeed.
pub struct OptionalAuth {
    pub user: Option<AuthenticatedUser>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for OptionalAuth {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match AuthenticatedUser::from_request(req).await {
            Outcome::Success(auth) => Outcome::Success(OptionalAuth { user: Some(auth) }),
            _ => Outcome::Success(OptionalAuth { user: None }),
        }
    }
}

macro_rules! role_guard {
    ($(#[$doc:meta])* $name:ident, $check:ident) => {
        $(#[$doc])*
        pub struct $name(pub AuthenticatedUser);

        impl Deref for $name {
            type Target = AuthenticatedUser;

            fn deref(&self) -> &AuthenticatedUser {
                &self.0
            }
        }

        #[rocket::async_trait]
        impl<'r> FromRequest<'r> for $name {
            type Error = AuthError;

            async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
                match AuthenticatedUser::from_request(req).await {
                    Outcome::Success(auth) if auth.$check() => Outcome::Success($name(auth)),
                    Outcome::Success(_) => reject(req, Status::Forbidden, AuthError::NotAuthorized),
                    Outcome::Error(e) => Outcome::Error(e),
                    Outcome::Forward(f) => Outcome::Forward(f),
                }
            }
        }
    };
}

role_guard!(
    /// Profile type `candidate`.
    CandidateUser,
    is_candidate
);
role_guard!(
    /// Profile type `employer`.
    EmployerUser,
    is_employer
);
role_guard!(StaffUser, is_staff);

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AuthSettings {
        AuthSettings {
            jwt_secret: "unit-test-secret".to_string(),
            token_ttl_hours: 1,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let token = issue_token(42, &settings()).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, 3600);
        assert_eq!(verify_token(&token.access_token, &settings()).unwrap(), 42);
    }

    #[test]
    fn test_token_rejected_with_other_secret_or_expired() {
        let token = issue_token(7, &settings()).unwrap();
        let other = AuthSettings {
            jwt_secret: "another-secret".to_string(),
            token_ttl_hours: 1,
        };
        assert!(verify_token(&token.access_token, &other).is_err());

        let stale = Claims {
            sub: "7".to_string(),
            exp: (Utc::now() - Duration::hours(2)).timestamp() as usize,
            iat: (Utc::now() - Duration::hours(3)).timestamp() as usize,
        };
        let expired = encode(
            &Header::new(Algorithm::HS256),
            &stale,
            &EncodingKey::from_secret(b"unit-test-secret"),
        )
        .unwrap();
        assert!(verify_token(&expired, &settings()).is_err());
        assert!(verify_token("not.a.token", &settings()).is_err());
    }

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("short1", "ana").is_err());
        assert!(validate_password("1234567890", "ana").is_err());
        assert!(validate_password("xxAnaSmithxx", "anasmith").is_err());
        assert!(validate_password("Password123", "ana").is_err());
        assert!(validate_password("blue-ocean-42", "ana").is_ok());
    }
}
