//! User accounts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the user intends to use the tracker, captured during onboarding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UseCase {
    Personal,
    Team,
    Organization,
}

impl UseCase {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "personal" => Some(Self::Personal),
            "team" => Some(Self::Team),
            "organization" => Some(Self::Organization),
            _ => None,
        }
    }
}

/// Stored user record
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    /// Always lowercase
    pub email: String,
    pub name: String,
    /// Argon2 PHC string
    pub password_hash: String,
    pub email_verified: bool,
    pub otp: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub use_case: Option<UseCase>,
    pub onboarding_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            onboarding_completed: self.onboarding_completed,
            use_case: self.use_case,
            email_verified: self.email_verified,
        }
    }
}

/// Fields needed to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub otp: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
}

/// User fields safe to return to clients (never the password hash or OTP)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub onboarding_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_case: Option<UseCase>,
    pub email_verified: bool,
}
