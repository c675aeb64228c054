use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Event names for the security audit log
pub mod security_events {
    // Authentication events
    pub const USER_LOGIN: &str = "USER_LOGIN";
    pub const USER_LOGOUT: &str = "USER_LOGOUT";
    pub const USER_REGISTERED: &str = "USER_REGISTERED";
    pub const ACCOUNT_LOCKED: &str = "ACCOUNT_LOCKED";
    pub const ACCOUNT_DISABLED: &str = "ACCOUNT_DISABLED";
    pub const ACCOUNT_ENABLED: &str = "ACCOUNT_ENABLED";

    // Session lifecycle events
    pub const SESSION_CREATED: &str = "SESSION_CREATED";
    pub const SESSION_TERMINATED: &str = "SESSION_TERMINATED";

    // Housekeeping
    pub const DATA_CLEANUP: &str = "DATA_CLEANUP";
}

/// Subject areas referenced by audit entries
pub mod resources {
    pub const AUTHENTICATION: &str = "authentication";
    pub const SESSION: &str = "session";
    pub const ACCOUNT: &str = "account";
    pub const SECURITY: &str = "security";
}

/// One audit trail entry. `user_id` is absent for pre-authentication events
/// such as failed logins for unknown accounts.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SecurityLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub details: Option<JsonValue>,
    pub timestamp: DateTime<Utc>,
}
