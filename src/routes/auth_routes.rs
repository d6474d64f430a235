//! Account endpoints under `/auth/*`
//!
//! - POST /auth/signup      - create user, return token + user
//! - POST /auth/login       - authenticate, return token + user
//! - GET  /auth/me          - current profile (token required)
//! - POST /auth/onboarding  - record use case (token required)
//! - POST /auth/resend-otp  - mint and send a new verification code
//! - POST /auth/verify-otp  - confirm email, return token + user

use hyper::{Method, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::request::ApiRequest;
use super::response::{json_response, method_not_allowed, not_found_response, BoxBody};
use crate::model::PublicUser;
use crate::server::AppState;
use crate::services::AuthSession;
use crate::types::Result;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OnboardingRequest {
    pub use_case: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResendOtpRequest {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Serialize)]
struct SessionResponse {
    success: bool,
    message: &'static str,
    token: String,
    user: PublicUser,
}

impl SessionResponse {
    fn new(message: &'static str, session: AuthSession) -> Self {
        Self {
            success: true,
            message,
            token: session.token,
            user: session.user,
        }
    }
}

#[derive(Debug, Serialize)]
struct UserResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    user: PublicUser,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    success: bool,
    message: &'static str,
}

async fn handle_signup(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let body: SignupRequest = req.json()?;
    let session = state
        .accounts
        .signup(&body.email, &body.name, &body.password)
        .await?;
    Ok(json_response(
        StatusCode::OK,
        &SessionResponse::new("User created successfully", session),
    ))
}

async fn handle_login(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let body: LoginRequest = req.json()?;
    let session = state.accounts.login(&body.email, &body.password).await?;
    Ok(json_response(
        StatusCode::OK,
        &SessionResponse::new("Login successful", session),
    ))
}

async fn handle_me(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let user = state.accounts.me(&auth.user_id).await?;
    Ok(json_response(
        StatusCode::OK,
        &UserResponse {
            success: None,
            message: None,
            user,
        },
    ))
}

async fn handle_onboarding(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let auth = state.gate.authenticate(&req.headers)?;
    let body: OnboardingRequest = req.json()?;
    let user = state
        .accounts
        .complete_onboarding(&auth.user_id, &body.use_case)
        .await?;
    Ok(json_response(
        StatusCode::OK,
        &UserResponse {
            success: Some(true),
            message: Some("Onboarding completed successfully"),
            user,
        },
    ))
}

async fn handle_resend_otp(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let body: ResendOtpRequest = req.json()?;
    state.accounts.resend_otp(&body.email).await?;
    Ok(json_response(
        StatusCode::OK,
        &MessageResponse {
            success: true,
            message: "OTP has been resent to your email",
        },
    ))
}

async fn handle_verify_otp(state: &AppState, req: &ApiRequest) -> Result<Response<BoxBody>> {
    let body: VerifyOtpRequest = req.json()?;
    let session = state.accounts.verify_otp(&body.email, &body.otp).await?;
    Ok(json_response(
        StatusCode::OK,
        &SessionResponse::new("Email verified successfully", session),
    ))
}

/// Route `/auth/<action>`
pub async fn handle_auth_request(
    state: &AppState,
    req: &ApiRequest,
    action: &str,
) -> Result<Response<BoxBody>> {
    match (&req.method, action) {
        (&Method::POST, "signup") => handle_signup(state, req).await,
        (&Method::POST, "login") => handle_login(state, req).await,
        (&Method::GET, "me") => handle_me(state, req).await,
        (&Method::POST, "onboarding") => handle_onboarding(state, req).await,
        (&Method::POST, "resend-otp") => handle_resend_otp(state, req).await,
        (&Method::POST, "verify-otp") => handle_verify_otp(state, req).await,

        (_, "signup")
        | (_, "login")
        | (_, "me")
        | (_, "onboarding")
        | (_, "resend-otp")
        | (_, "verify-otp") => Ok(method_not_allowed()),

        _ => Ok(not_found_response(&req.path)),
    }
}
