//! Account flows: signup, login, onboarding and email verification
//!
//! Emails are lowercased before every lookup. Login reports the same error
//! whether the email is unknown or the password is wrong.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::notifier::Notifier;
use crate::auth::{generate_otp, hash_password, verify_password, JwtValidator, TokenInput, OTP_TTL_MINUTES};
use crate::model::{NewUser, PublicUser, UseCase, User};
use crate::store::UserRepository;
use crate::types::CallistoError;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("{0}")]
    MissingFields(&'static str),

    #[error("Password must be at least 6 characters")]
    WeakPassword,

    #[error("User with this email already exists")]
    DuplicateEmail,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User not found")]
    NotFound,

    #[error("Email is already verified")]
    AlreadyVerified,

    #[error("Invalid OTP")]
    InvalidOtp,

    #[error("OTP has expired. Please request a new one.")]
    Expired,

    #[error("Valid use case is required (personal, team, or organization)")]
    InvalidUseCase,

    #[error("Failed to send OTP email")]
    DeliveryFailed(String),

    #[error(transparent)]
    Store(#[from] CallistoError),
}

impl From<AccountError> for CallistoError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Store(inner) => inner,
            AccountError::DuplicateEmail => CallistoError::Conflict(err.to_string()),
            AccountError::InvalidCredentials => CallistoError::Unauthorized(err.to_string()),
            AccountError::NotFound => CallistoError::NotFound(err.to_string()),
            AccountError::DeliveryFailed(_) => CallistoError::Upstream(err.to_string()),
            AccountError::MissingFields(_)
            | AccountError::WeakPassword
            | AccountError::AlreadyVerified
            | AccountError::InvalidOtp
            | AccountError::Expired
            | AccountError::InvalidUseCase => CallistoError::Validation(err.to_string()),
        }
    }
}

/// A freshly issued token with the user it identifies
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: PublicUser,
}

pub struct AccountService {
    users: Arc<dyn UserRepository>,
    jwt: JwtValidator,
    notifier: Arc<dyn Notifier>,
    /// Whether a real delivery channel is configured; failures only matter then
    delivery_required: bool,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        jwt: JwtValidator,
        notifier: Arc<dyn Notifier>,
        delivery_required: bool,
    ) -> Self {
        Self {
            users,
            jwt,
            notifier,
            delivery_required,
        }
    }

    pub fn notifier_kind(&self) -> &'static str {
        self.notifier.kind()
    }

    fn issue(&self, user: &User) -> Result<AuthSession, AccountError> {
        let token = self.jwt.generate_token(TokenInput {
            user_id: user.id.clone(),
            email: user.email.clone(),
        })?;
        Ok(AuthSession {
            token,
            user: user.to_public(),
        })
    }

    async fn find_by_email(&self, email: &str) -> Result<User, AccountError> {
        self.users
            .find_by_email(&normalize_email(email))
            .await?
            .ok_or(AccountError::NotFound)
    }

    async fn save(&self, user: &User) -> Result<User, AccountError> {
        self.users.update(user).await?.ok_or(AccountError::NotFound)
    }

    /// Create an unverified user and return a token for it. A verification
    /// code is minted and sent; a failed send is logged, not fatal.
    pub async fn signup(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<AuthSession, AccountError> {
        let email = normalize_email(email);
        let name = name.trim();
        if email.is_empty() || name.is_empty() || password.is_empty() {
            return Err(AccountError::MissingFields(
                "Email, name, and password are required",
            ));
        }
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(AccountError::WeakPassword);
        }
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AccountError::DuplicateEmail);
        }

        let otp = generate_otp();
        let user = self
            .users
            .create(NewUser {
                email: email.clone(),
                name: name.to_string(),
                password_hash: hash_password(password)?,
                otp: Some(otp.clone()),
                otp_expires_at: Some(Utc::now() + Duration::minutes(OTP_TTL_MINUTES)),
            })
            .await
            .map_err(|e| match e {
                CallistoError::Conflict(_) => AccountError::DuplicateEmail,
                other => AccountError::Store(other),
            })?;

        info!(user_id = %user.id, "User signed up");

        if let Err(e) = self.notifier.send_otp(&user.email, &user.name, &otp).await {
            warn!(user_id = %user.id, error = %e, "Could not send verification code at signup");
        }

        self.issue(&user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AccountError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AccountError::MissingFields("Email and password are required"));
        }

        let user = match self.users.find_by_email(&normalize_email(email)).await? {
            Some(user) => user,
            None => return Err(AccountError::InvalidCredentials),
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(AccountError::InvalidCredentials);
        }

        self.issue(&user)
    }

    /// Current profile for an authenticated user id
    pub async fn me(&self, user_id: &str) -> Result<PublicUser, AccountError> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(|u| u.to_public())
            .ok_or(AccountError::NotFound)
    }

    /// Record the use case and mark onboarding complete. Repeating it
    /// overwrites the use case.
    pub async fn complete_onboarding(
        &self,
        user_id: &str,
        use_case: &str,
    ) -> Result<PublicUser, AccountError> {
        let use_case = UseCase::parse(use_case).ok_or(AccountError::InvalidUseCase)?;

        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AccountError::NotFound)?;
        user.use_case = Some(use_case);
        user.onboarding_completed = true;

        Ok(self.save(&user).await?.to_public())
    }

    /// Mint, store and send a fresh verification code
    pub async fn resend_otp(&self, email: &str) -> Result<(), AccountError> {
        if email.trim().is_empty() {
            return Err(AccountError::MissingFields("Email is required"));
        }

        let mut user = self.find_by_email(email).await?;
        if user.email_verified {
            return Err(AccountError::AlreadyVerified);
        }

        let otp = generate_otp();
        user.otp = Some(otp.clone());
        user.otp_expires_at = Some(Utc::now() + Duration::minutes(OTP_TTL_MINUTES));
        let user = self.save(&user).await?;

        match self.notifier.send_otp(&user.email, &user.name, &otp).await {
            Ok(()) => Ok(()),
            Err(e) if self.delivery_required => {
                warn!(user_id = %user.id, error = %e, "Verification mail delivery failed");
                Err(AccountError::DeliveryFailed(e.to_string()))
            }
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Verification mail not delivered");
                Ok(())
            }
        }
    }

    /// Check a verification code. A matching code past its expiry is still
    /// rejected.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<AuthSession, AccountError> {
        if email.trim().is_empty() || code.trim().is_empty() {
            return Err(AccountError::MissingFields("Email and OTP are required"));
        }

        let mut user = self.find_by_email(email).await?;

        if user.otp.as_deref() != Some(code.trim()) {
            return Err(AccountError::InvalidOtp);
        }

        match user.otp_expires_at {
            Some(expires) if expires > Utc::now() => {}
            _ => return Err(AccountError::Expired),
        }

        user.email_verified = true;
        user.otp = None;
        user.otp_expires_at = None;
        let user = self.save(&user).await?;

        info!(user_id = %user.id, "Email verified");
        self.issue(&user)
    }
}
