use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A locally tracked authentication session for one device.
///
/// Termination never deletes the record; it flips `is_active` so the audit
/// trail keeps the full session history until retention cleanup drops it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UserSession {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Stable per app install, supplied by the client.
    pub device_id: String,
    pub device_name: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub is_active: bool,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl UserSession {
    /// A session authenticates requests only while active and unexpired.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

/// Session view returned to clients.
#[derive(Debug, Serialize, JsonSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub device_id: String,
    pub device_name: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&UserSession> for SessionResponse {
    fn from(session: &UserSession) -> Self {
        Self {
            id: session.id,
            device_id: session.device_id.clone(),
            device_name: session.device_name.clone(),
            ip_address: session.ip_address.clone(),
            user_agent: session.user_agent.clone(),
            last_activity: session.last_activity,
            created_at: session.created_at,
            expires_at: session.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(is_active: bool, expires_in: Duration) -> UserSession {
        let now = Utc::now();
        UserSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            device_id: "device-1".to_string(),
            device_name: None,
            ip_address: None,
            user_agent: None,
            is_active,
            last_activity: now,
            created_at: now,
            expires_at: now + expires_in,
        }
    }

    #[test]
    fn usable_requires_active_and_unexpired() {
        let now = Utc::now();
        assert!(session(true, Duration::hours(1)).is_usable(now));
        assert!(!session(false, Duration::hours(1)).is_usable(now));
        assert!(!session(true, Duration::hours(-1)).is_usable(now));
    }
}
