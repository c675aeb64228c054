use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a login attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    UserNotFound,
    InvalidPassword,
    AccountDisabled,
    AccountLocked,
}

impl FailureReason {
    /// Whether this failure counts toward the lockout threshold. Attempts
    /// rejected by the lockout gate itself are recorded for the audit trail
    /// but must not keep extending the lockout window.
    pub fn counts_toward_lockout(self) -> bool {
        !matches!(self, FailureReason::AccountLocked)
    }
}

/// One recorded login attempt. Append-only; never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoginAttempt {
    pub id: Uuid,
    pub email: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub success: bool,
    pub failure_reason: Option<FailureReason>,
    pub timestamp: DateTime<Utc>,
}

impl LoginAttempt {
    /// Emails compare case-insensitively everywhere in the lockout logic.
    pub fn matches_email(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email)
    }

    pub fn counts_toward_lockout(&self) -> bool {
        !self.success && self.failure_reason.is_none_or(FailureReason::counts_toward_lockout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_comparison_ignores_case() {
        let attempt = LoginAttempt {
            id: Uuid::new_v4(),
            email: "Parent@School.example".to_string(),
            ip_address: None,
            user_agent: None,
            success: false,
            failure_reason: Some(FailureReason::InvalidPassword),
            timestamp: Utc::now(),
        };
        assert!(attempt.matches_email("parent@school.example"));
        assert!(attempt.matches_email("PARENT@SCHOOL.EXAMPLE"));
        assert!(!attempt.matches_email("other@school.example"));
    }

    #[test]
    fn locked_rejections_do_not_count_toward_lockout() {
        assert!(FailureReason::UserNotFound.counts_toward_lockout());
        assert!(FailureReason::InvalidPassword.counts_toward_lockout());
        assert!(FailureReason::AccountDisabled.counts_toward_lockout());
        assert!(!FailureReason::AccountLocked.counts_toward_lockout());
    }

    #[test]
    fn failure_reason_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&FailureReason::InvalidPassword).unwrap();
        assert_eq!(json, "\"INVALID_PASSWORD\"");
        let json = serde_json::to_string(&FailureReason::UserNotFound).unwrap();
        assert_eq!(json, "\"USER_NOT_FOUND\"");
    }
}
