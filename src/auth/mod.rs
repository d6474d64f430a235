//! Authentication for Callisto
//!
//! Provides:
//! - JWT token issuing and verification (the token service)
//! - The auth gate that resolves a request's bearer token to a user id
//! - Password hashing with Argon2
//! - One-time passcode minting for email verification

pub mod gate;
pub mod jwt;
pub mod otp;
pub mod password;

pub use gate::{AuthContext, AuthError, AuthGate};
pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenInput, TokenValidationResult};
pub use otp::{generate_otp, OTP_LENGTH, OTP_TTL_MINUTES};
pub use password::{hash_password, verify_password};
