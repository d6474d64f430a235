//! Auth gate
//!
//! Every protected operation calls [`AuthGate::authenticate`] before touching
//! the store. The returned [`AuthContext::user_id`] scopes every subsequent
//! query; there are no roles or ACLs beyond ownership.

use hyper::header::{HeaderMap, AUTHORIZATION};
use tracing::debug;

use super::jwt::{extract_token_from_header, JwtValidator};
use crate::types::CallistoError;

/// Why a request was rejected by the gate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("No token provided")]
    MissingToken,

    #[error("{0}")]
    InvalidToken(String),
}

impl From<AuthError> for CallistoError {
    fn from(err: AuthError) -> Self {
        CallistoError::Unauthorized(err.to_string())
    }
}

/// Identity resolved from a valid token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub email: String,
}

/// Resolves bearer tokens to identities
#[derive(Clone)]
pub struct AuthGate {
    jwt: JwtValidator,
}

impl AuthGate {
    pub fn new(jwt: JwtValidator) -> Self {
        Self { jwt }
    }

    pub fn jwt(&self) -> &JwtValidator {
        &self.jwt
    }

    /// Authenticate a request from its headers
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<AuthContext, AuthError> {
        let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        self.authenticate_header(header)
    }

    /// Authenticate from a raw `Authorization` header value
    pub fn authenticate_header(&self, header: Option<&str>) -> Result<AuthContext, AuthError> {
        let token = extract_token_from_header(header).ok_or(AuthError::MissingToken)?;

        let result = self.jwt.verify_token(token);
        match result.into_claims() {
            Some(claims) => Ok(AuthContext {
                user_id: claims.user_id,
                email: claims.email,
            }),
            None => {
                debug!("Rejected bearer token");
                Err(AuthError::InvalidToken("Invalid or expired token".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenInput;
    use hyper::header::HeaderValue;

    fn gate() -> AuthGate {
        AuthGate::new(JwtValidator::new_dev(3600))
    }

    #[test]
    fn test_missing_header() {
        let headers = HeaderMap::new();
        assert_eq!(gate().authenticate(&headers), Err(AuthError::MissingToken));
        assert_eq!(
            gate().authenticate_header(Some("Bearer ")),
            Err(AuthError::MissingToken)
        );
    }

    #[test]
    fn test_invalid_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer not-a-jwt"));
        assert!(matches!(
            gate().authenticate(&headers),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_valid_token_resolves_user() {
        let gate = gate();
        let token = gate
            .jwt()
            .generate_token(TokenInput {
                user_id: "user-42".into(),
                email: "grace@example.com".into(),
            })
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );

        let ctx = gate.authenticate(&headers).unwrap();
        assert_eq!(ctx.user_id, "user-42");
        assert_eq!(ctx.email, "grace@example.com");
    }

    #[test]
    fn test_auth_error_maps_to_unauthorized() {
        let err: CallistoError = AuthError::MissingToken.into();
        assert_eq!(err.status_code(), hyper::StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "No token provided");
    }
}
