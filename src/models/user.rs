use crate::models::role::{Permissions, Role};
use crate::models::session::SessionResponse;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// A platform account. Only the Argon2 hash of the password is ever stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct CreateUserRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = "validate_password_strength"))]
    pub password: String,
    pub role: Role,
}

/// Login payload. The email is deliberately not validated for format here:
/// malformed addresses still get their attempt recorded under whatever string
/// the client sent.
#[derive(Deserialize, Debug, JsonSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct LoginResponse {
    pub user: UserResponse,
    pub permissions: Permissions,
    pub session: SessionResponse,
}

/// Bridge the password policy into `validator` so request DTOs collect the
/// violations alongside their other field errors.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let check = crate::security::password::validate_password(password);
    if check.is_valid {
        Ok(())
    } else {
        let mut error = ValidationError::new("password_strength");
        error.message = Some(Cow::Owned(
            check.errors.iter().map(|v| v.message()).collect::<Vec<_>>().join("; "),
        ));
        Err(error)
    }
}
