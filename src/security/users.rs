use crate::error::app_error::AppError;
use crate::models::role::Role;
use crate::models::user::User;
use crate::security::password;
use crate::storage::{KeyValueStore, keys};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

/// Account directory persisted through the same key-value port as the
/// security collections. Unlike attempt/event logging, registry mutations
/// surface storage failures to the caller: losing a freshly created account
/// is not something to swallow.
pub struct UserRegistry {
    storage: Arc<dyn KeyValueStore>,
    users: Mutex<Vec<User>>,
}

impl UserRegistry {
    pub async fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let users = match storage.get(keys::USERS).await {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(users) => users,
                Err(e) => {
                    warn!(error = %e, "undecodable user snapshot, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "failed to read user snapshot, starting empty");
                Vec::new()
            }
        };

        Self {
            storage,
            users: Mutex::new(users),
        }
    }

    /// Create an account. Email uniqueness is case-insensitive; the password
    /// arrives pre-validated by the request DTO and is stored as an Argon2
    /// hash only.
    pub async fn create_user(&self, name: &str, email: &str, plain_password: &str, role: Role) -> Result<User, AppError> {
        let password_hash = password::hash_password(plain_password)?;
        let mut users = self.users.lock().await;

        if users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(AppError::UserAlreadyExists(email.to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            role,
            disabled: false,
            created_at: Utc::now(),
        };

        users.push(user.clone());
        self.persist(&users).await?;
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Option<User> {
        let users = self.users.lock().await;
        users.iter().find(|u| u.email.eq_ignore_ascii_case(email)).cloned()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Option<User> {
        let users = self.users.lock().await;
        users.iter().find(|u| u.id == id).cloned()
    }

    /// Flip the disabled flag. Disabled accounts keep their sessions until
    /// those expire or are terminated; only new logins are refused.
    pub async fn set_disabled(&self, id: Uuid, disabled: bool) -> Result<User, AppError> {
        let mut users = self.users.lock().await;
        let user = users.iter_mut().find(|u| u.id == id).ok_or(AppError::UserNotFound)?;
        user.disabled = disabled;
        let updated = user.clone();
        self.persist(&users).await?;
        Ok(updated)
    }

    async fn persist(&self, users: &[User]) -> Result<(), AppError> {
        let payload = serde_json::to_string(users)?;
        self.storage.set(keys::USERS, payload).await
    }
}
