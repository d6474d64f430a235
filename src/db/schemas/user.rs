//! User document schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;
use crate::model::{NewUser, UseCase, User};

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Lowercased email, unique
    pub email: String,

    pub name: String,

    /// Argon2 PHC string
    pub password_hash: String,

    #[serde(default)]
    pub email_verified: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub otp_expires_at: Option<DateTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_case: Option<UseCase>,

    #[serde(default)]
    pub onboarding_completed: bool,
}

impl UserDoc {
    pub fn new(user: NewUser) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            email_verified: false,
            otp: user.otp,
            otp_expires_at: user.otp_expires_at.map(DateTime::from_chrono),
            use_case: None,
            onboarding_completed: false,
        }
    }

    pub fn into_model(self) -> User {
        User {
            id: self.id.map(|id| id.to_hex()).unwrap_or_default(),
            created_at: self.metadata.created(),
            email: self.email,
            name: self.name,
            password_hash: self.password_hash,
            email_verified: self.email_verified,
            otp: self.otp,
            otp_expires_at: self.otp_expires_at.map(|d| d.to_chrono()),
            use_case: self.use_case,
            onboarding_completed: self.onboarding_completed,
        }
    }

    /// `$set` document carrying every mutable field of `user`. Absent OTP
    /// fields are written as null so verification clears them.
    pub fn mutable_fields(user: &User) -> Result<Document, bson::ser::Error> {
        Ok(doc! {
            "name": &user.name,
            "password_hash": &user.password_hash,
            "email_verified": user.email_verified,
            "otp": user.otp.as_deref(),
            "otp_expires_at": user.otp_expires_at.map(DateTime::from_chrono),
            "use_case": bson::to_bson(&user.use_case)?,
            "onboarding_completed": user.onboarding_completed,
        })
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "email": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("email_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
