//! Configuration for Callisto
//!
//! CLI arguments and environment variable handling using clap. Every flag
//! has an environment fallback; `.env` is loaded by `main` before parsing.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

use crate::auth::JwtValidator;
use crate::types::CallistoError;

/// Models tried in order by the roadmap generator
pub const DEFAULT_ROADMAP_MODELS: &str =
    "gemini-pro,gemini-1.5-pro,gemini-2.0-flash-001,gemini-2.0-flash-lite-001";

/// Seven days
pub const DEFAULT_JWT_EXPIRY_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Callisto - learning-goal tracker API
#[derive(Parser, Debug, Clone)]
#[command(name = "callisto")]
#[command(about = "Learning-goal tracker API: categories, goals, topics and AI roadmaps")]
pub struct Args {
    /// Unique identifier for this process, reported by /health
    #[arg(long, env = "INSTANCE_ID", default_value_t = Uuid::new_v4())]
    pub instance_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (default JWT secret, in-memory store fallback,
    /// diagnostic details in error bodies)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "callisto")]
    pub mongodb_db: String,

    /// Keep all data in process memory instead of MongoDB
    #[arg(long, env = "IN_MEMORY", default_value = "false")]
    pub in_memory: bool,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value_t = DEFAULT_JWT_EXPIRY_SECONDS)]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Gemini API key; roadmap generation is unavailable without it
    #[arg(long, env = "GEMINI_API_KEY")]
    pub gemini_api_key: Option<String>,

    /// Base URL of the Gemini REST API
    #[arg(
        long,
        env = "GEMINI_API_URL",
        default_value = "https://generativelanguage.googleapis.com"
    )]
    pub gemini_api_url: String,

    /// Comma-separated candidate models, tried in order
    #[arg(long, env = "ROADMAP_MODELS", default_value = DEFAULT_ROADMAP_MODELS)]
    pub roadmap_models: String,

    /// HTTP mail relay endpoint; OTP codes are logged when unset
    #[arg(long, env = "MAIL_API_URL")]
    pub mail_api_url: Option<String>,

    /// Bearer key for the mail relay
    #[arg(long, env = "MAIL_API_KEY")]
    pub mail_api_key: Option<String>,

    /// Sender address for verification mail
    #[arg(long, env = "MAIL_FROM", default_value = "Callisto <no-reply@callisto.local>")]
    pub mail_from: String,

    /// Deadline for handling one request, in milliseconds. Also bounds
    /// outbound mail relay calls.
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Timeout for a single roadmap model call, in milliseconds
    #[arg(long, env = "MODEL_TIMEOUT_MS", default_value = "30000")]
    pub model_timeout_ms: u64,

    /// Maximum accepted request body size in bytes
    #[arg(long, env = "MAX_BODY_BYTES", default_value = "1048576")]
    pub max_body_bytes: usize,
}

impl Args {
    /// Build the token service (uses a built-in secret in dev mode when unset)
    pub fn jwt_validator(&self) -> Result<JwtValidator, CallistoError> {
        match &self.jwt_secret {
            Some(secret) => JwtValidator::new(secret.clone(), self.jwt_expiry_seconds),
            None if self.dev_mode => Ok(JwtValidator::new_dev(self.jwt_expiry_seconds)),
            None => Err(CallistoError::Config(
                "JWT_SECRET is required in production mode".into(),
            )),
        }
    }

    /// Candidate models in configured order, blanks dropped
    pub fn roadmap_model_list(&self) -> Vec<String> {
        self.roadmap_models
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Whether both halves of the mail relay configuration are present
    pub fn mail_configured(&self) -> bool {
        self.mail_api_url.is_some() && self.mail_api_key.is_some()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_millis(self.model_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.jwt_secret {
                None => return Err("JWT_SECRET is required in production mode".to_string()),
                Some(secret) if secret.len() < 32 => {
                    return Err("JWT_SECRET must be at least 32 characters".to_string())
                }
                Some(_) => {}
            }
        }

        if self.jwt_expiry_seconds == 0 {
            return Err("JWT_EXPIRY_SECONDS must be positive".to_string());
        }

        if self.roadmap_model_list().is_empty() {
            return Err("ROADMAP_MODELS must name at least one model".to_string());
        }

        if self.mail_api_url.is_some() != self.mail_api_key.is_some() {
            return Err("MAIL_API_URL and MAIL_API_KEY must be set together".to_string());
        }

        if self.request_timeout_ms == 0 || self.model_timeout_ms == 0 {
            return Err("REQUEST_TIMEOUT_MS and MODEL_TIMEOUT_MS must be positive".to_string());
        }

        if self.max_body_bytes == 0 {
            return Err("MAX_BODY_BYTES must be positive".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["callisto"];
        argv.extend_from_slice(args);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--dev-mode"]);
        assert_eq!(args.mongodb_db, "callisto");
        assert_eq!(args.jwt_expiry_seconds, 604_800);
        assert_eq!(args.roadmap_model_list().len(), 4);
        assert_eq!(args.roadmap_model_list()[0], "gemini-pro");
        assert!(!args.mail_configured());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_production_requires_secret() {
        let args = parse(&[]);
        assert!(args.validate().is_err());

        let args = parse(&["--jwt-secret", "too-short"]);
        assert!(args.validate().is_err());

        let args = parse(&["--jwt-secret", "a-production-secret-of-32-chars-or-more"]);
        assert!(args.validate().is_ok());
        assert!(args.jwt_validator().is_ok());
    }

    #[test]
    fn test_dev_mode_falls_back_to_builtin_secret() {
        let args = parse(&["--dev-mode"]);
        assert!(args.jwt_validator().is_ok());
    }

    #[test]
    fn test_half_configured_mail_is_rejected() {
        let args = parse(&["--dev-mode", "--mail-api-url", "https://relay.example/send"]);
        assert!(args.validate().is_err());

        let args = parse(&[
            "--dev-mode",
            "--mail-api-url",
            "https://relay.example/send",
            "--mail-api-key",
            "k",
        ]);
        assert!(args.mail_configured());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_model_list_parsing() {
        let args = parse(&["--dev-mode", "--roadmap-models", " a , ,b "]);
        assert_eq!(args.roadmap_model_list(), vec!["a", "b"]);

        let args = parse(&["--dev-mode", "--roadmap-models", " , "]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_model_timeout_is_separate_from_request_deadline() {
        let args = parse(&[
            "--dev-mode",
            "--request-timeout-ms",
            "300",
            "--model-timeout-ms",
            "1200",
        ]);
        assert_eq!(args.request_timeout(), Duration::from_millis(300));
        assert_eq!(args.model_timeout(), Duration::from_millis(1200));

        let args = parse(&["--dev-mode", "--model-timeout-ms", "0"]);
        assert!(args.validate().is_err());
    }
}
