use crate::clock::Clock;
use crate::config::SecurityConfig;
use crate::models::login_attempt::{FailureReason, LoginAttempt};
use crate::models::security_log::{SecurityLog, resources, security_events};
use crate::models::session::UserSession;
use crate::storage::{KeyValueStore, keys};
use chrono::Duration;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Best-effort client metadata attached to attempts, audit entries and
/// sessions. Both fields are diagnostic only.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Owns the three security collections: login attempts, the audit log and
/// the session registry. All mutations go through one mutex, so concurrent
/// callers serialize instead of losing updates to whole-snapshot
/// read-modify-write races. Each collection is mirrored to the key-value
/// store after every mutation; a failed write is logged and swallowed, and
/// the in-memory copy stays authoritative.
pub struct SecurityStore {
    config: SecurityConfig,
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<SecurityState>,
}

#[derive(Default)]
struct SecurityState {
    login_attempts: Vec<LoginAttempt>,
    security_log: Vec<SecurityLog>,
    sessions: Vec<UserSession>,
}

impl SecurityStore {
    /// Load persisted snapshots and prune anything past retention. A missing
    /// or undecodable blob starts that collection empty rather than failing
    /// startup.
    pub async fn load(config: SecurityConfig, storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        let login_attempts = read_snapshot(storage.as_ref(), keys::LOGIN_ATTEMPTS).await;
        let security_log = read_snapshot(storage.as_ref(), keys::SECURITY_LOG).await;
        let sessions = read_snapshot(storage.as_ref(), keys::SESSIONS).await;

        let store = Self {
            config,
            storage,
            clock,
            state: Mutex::new(SecurityState {
                login_attempts,
                security_log,
                sessions,
            }),
        };

        store.cleanup_old_data().await;
        store
    }

    fn lockout_duration(&self) -> Duration {
        Duration::minutes(self.config.lockout_duration_minutes)
    }

    fn session_timeout(&self) -> Duration {
        Duration::hours(self.config.session_timeout_hours)
    }

    fn retention(&self) -> Duration {
        Duration::days(self.config.retention_days)
    }

    /// Record a login attempt. Fire-and-forget: this never fails the caller,
    /// even when the durable write does.
    pub async fn log_login_attempt(&self, email: &str, success: bool, failure_reason: Option<FailureReason>, client: &ClientInfo) {
        let attempt = LoginAttempt {
            id: Uuid::new_v4(),
            email: email.to_string(),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            success,
            failure_reason,
            timestamp: self.clock.now(),
        };

        let mut state = self.state.lock().await;
        state.login_attempts.push(attempt);
        truncate_oldest(&mut state.login_attempts, self.config.login_attempt_cap);
        self.persist(keys::LOGIN_ATTEMPTS, &state.login_attempts).await;
    }

    /// An email is locked out once it has accumulated the threshold of
    /// counted failures inside the lockout window. Successes do not forgive
    /// earlier failures; the window simply ages out.
    pub async fn is_user_locked(&self, email: &str) -> bool {
        let window_start = self.clock.now() - self.lockout_duration();
        let state = self.state.lock().await;

        let failures = state
            .login_attempts
            .iter()
            .filter(|a| a.matches_email(email) && a.counts_toward_lockout() && a.timestamp > window_start)
            .count();

        failures >= self.config.max_login_attempts as usize
    }

    /// Time until the lockout for this email expires, measured from the most
    /// recent counted failure inside the window. Zero when not locked.
    pub async fn lockout_remaining(&self, email: &str) -> Duration {
        let now = self.clock.now();
        let window_start = now - self.lockout_duration();
        let state = self.state.lock().await;

        let mut windowed: Vec<_> = state
            .login_attempts
            .iter()
            .filter(|a| a.matches_email(email) && a.counts_toward_lockout() && a.timestamp > window_start)
            .collect();

        if windowed.len() < self.config.max_login_attempts as usize {
            return Duration::zero();
        }

        windowed.sort_by_key(|a| a.timestamp);
        let Some(most_recent) = windowed.last() else {
            return Duration::zero();
        };
        (most_recent.timestamp + self.lockout_duration() - now).max(Duration::zero())
    }

    /// Append an audit entry and mirror it to the log stream. Same
    /// fire-and-forget contract as login-attempt recording.
    pub async fn log_security_event(
        &self,
        action: &str,
        resource: &str,
        user_id: Option<Uuid>,
        success: bool,
        details: Option<JsonValue>,
        client: &ClientInfo,
    ) {
        let uid_str = user_id.map(|u| u.to_string());
        if success {
            info!(
                category = "audit",
                action = action,
                resource = resource,
                user_id = uid_str.as_deref().unwrap_or("-"),
                ip = client.ip_address.as_deref().unwrap_or("-"),
                "security event"
            );
        } else {
            warn!(
                category = "audit",
                action = action,
                resource = resource,
                user_id = uid_str.as_deref().unwrap_or("-"),
                ip = client.ip_address.as_deref().unwrap_or("-"),
                "security event (failure)"
            );
        }

        let entry = SecurityLog {
            id: Uuid::new_v4(),
            user_id,
            action: action.to_string(),
            resource: resource.to_string(),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            success,
            details,
            timestamp: self.clock.now(),
        };

        let mut state = self.state.lock().await;
        state.security_log.push(entry);
        truncate_oldest(&mut state.security_log, self.config.security_log_cap);
        self.persist(keys::SECURITY_LOG, &state.security_log).await;
    }

    /// Open a session for a user on a device. Multi-device is allowed by
    /// design: no uniqueness constraint exists across a user's sessions.
    pub async fn create_session(&self, user_id: Uuid, device_id: String, device_name: Option<String>, client: &ClientInfo) -> UserSession {
        let now = self.clock.now();
        let session = UserSession {
            id: Uuid::new_v4(),
            user_id,
            device_id,
            device_name,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            is_active: true,
            last_activity: now,
            created_at: now,
            expires_at: now + self.session_timeout(),
        };

        {
            let mut state = self.state.lock().await;
            state.sessions.push(session.clone());
            self.persist(keys::SESSIONS, &state.sessions).await;
        }

        self.log_security_event(
            security_events::SESSION_CREATED,
            resources::SESSION,
            Some(user_id),
            true,
            Some(serde_json::json!({
                "session_id": session.id,
                "device_id": session.device_id,
            })),
            client,
        )
        .await;

        session
    }

    /// Soft-delete a session. Unknown ids are a no-op, which makes the call
    /// idempotent by construction. When `user_id` is given the session must
    /// belong to that user; mismatches are treated as not found.
    pub async fn terminate_session(&self, session_id: Uuid, user_id: Option<Uuid>, client: &ClientInfo) {
        let terminated = {
            let mut state = self.state.lock().await;
            let found = state
                .sessions
                .iter()
                .position(|s| s.id == session_id && s.is_active && user_id.is_none_or(|uid| s.user_id == uid));

            match found {
                Some(idx) => {
                    state.sessions[idx].is_active = false;
                    let owner = state.sessions[idx].user_id;
                    self.persist(keys::SESSIONS, &state.sessions).await;
                    Some(owner)
                }
                None => None,
            }
        };

        if let Some(owner) = terminated {
            self.log_security_event(
                security_events::SESSION_TERMINATED,
                resources::SESSION,
                Some(owner),
                true,
                Some(serde_json::json!({ "session_id": session_id })),
                client,
            )
            .await;
        }
    }

    /// Resolve a session for request authentication. Only usable sessions
    /// (active and unexpired) are returned; resolving one refreshes its
    /// last-activity timestamp.
    pub async fn authenticate_session(&self, session_id: Uuid, user_id: Uuid) -> Option<UserSession> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let idx = state
            .sessions
            .iter()
            .position(|s| s.id == session_id && s.user_id == user_id && s.is_usable(now))?;

        state.sessions[idx].last_activity = now;
        let session = state.sessions[idx].clone();
        self.persist(keys::SESSIONS, &state.sessions).await;
        Some(session)
    }

    /// Drop attempts and audit entries past retention, and sessions that are
    /// no longer usable. Runs at load and on the manual refresh endpoint;
    /// never on a background schedule. Between invocations the write-time
    /// caps still bound memory.
    pub async fn cleanup_old_data(&self) {
        let now = self.clock.now();
        let cutoff = now - self.retention();
        let mut state = self.state.lock().await;

        let attempts_before = state.login_attempts.len();
        let log_before = state.security_log.len();
        let sessions_before = state.sessions.len();

        state.login_attempts.retain(|a| a.timestamp >= cutoff);
        state.security_log.retain(|e| e.timestamp >= cutoff);
        state.sessions.retain(|s| s.is_usable(now));

        self.persist(keys::LOGIN_ATTEMPTS, &state.login_attempts).await;
        self.persist(keys::SECURITY_LOG, &state.security_log).await;
        self.persist(keys::SESSIONS, &state.sessions).await;

        info!(
            dropped_attempts = attempts_before - state.login_attempts.len(),
            dropped_log_entries = log_before - state.security_log.len(),
            dropped_sessions = sessions_before - state.sessions.len(),
            "security data cleanup"
        );
    }

    /// Newest-first login attempts for the dashboard.
    pub async fn recent_login_attempts(&self, limit: usize) -> Vec<LoginAttempt> {
        let state = self.state.lock().await;
        let mut attempts: Vec<_> = state.login_attempts.clone();
        attempts.sort_by_key(|a| std::cmp::Reverse(a.timestamp));
        attempts.truncate(limit);
        attempts
    }

    /// Newest-first audit entries for the dashboard.
    pub async fn recent_security_events(&self, limit: usize) -> Vec<SecurityLog> {
        let state = self.state.lock().await;
        let mut events: Vec<_> = state.security_log.clone();
        events.sort_by_key(|e| std::cmp::Reverse(e.timestamp));
        events.truncate(limit);
        events
    }

    /// All currently usable sessions across users.
    pub async fn active_sessions(&self) -> Vec<UserSession> {
        let now = self.clock.now();
        let state = self.state.lock().await;
        state.sessions.iter().filter(|s| s.is_usable(now)).cloned().collect()
    }

    /// Usable sessions belonging to one user.
    pub async fn sessions_for_user(&self, user_id: Uuid) -> Vec<UserSession> {
        let now = self.clock.now();
        let state = self.state.lock().await;
        state
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id && s.is_usable(now))
            .cloned()
            .collect()
    }

    async fn persist<T: Serialize>(&self, key: &'static str, items: &[T]) {
        let payload = match serde_json::to_string(items) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key = key, error = %e, "failed to serialize security snapshot");
                return;
            }
        };

        if let Err(e) = self.storage.set(key, payload).await {
            warn!(key = key, error = %e, "failed to persist security snapshot, in-memory state kept");
        }
    }
}

/// Enforce the rolling write-time cap, dropping oldest entries first.
fn truncate_oldest<T>(items: &mut Vec<T>, cap: usize) {
    if items.len() > cap {
        let excess = items.len() - cap;
        items.drain(..excess);
    }
}

async fn read_snapshot<T: DeserializeOwned>(storage: &dyn KeyValueStore, key: &'static str) -> Vec<T> {
    match storage.get(key).await {
        Ok(Some(payload)) => match serde_json::from_str(&payload) {
            Ok(items) => items,
            Err(e) => {
                warn!(key = key, error = %e, "undecodable security snapshot, starting empty");
                Vec::new()
            }
        },
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!(key = key, error = %e, "failed to read security snapshot, starting empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryStore;
    use crate::test_utils::ManualClock;

    const EMAIL: &str = "a@b.com";

    fn client() -> ClientInfo {
        ClientInfo {
            ip_address: Some("10.1.2.3".to_string()),
            user_agent: Some("schoolgate-test".to_string()),
        }
    }

    async fn store_with(config: SecurityConfig) -> (SecurityStore, Arc<InMemoryStore>, Arc<ManualClock>) {
        let storage = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new());
        let store = SecurityStore::load(config, storage.clone(), clock.clone()).await;
        (store, storage, clock)
    }

    async fn default_store() -> (SecurityStore, Arc<InMemoryStore>, Arc<ManualClock>) {
        store_with(SecurityConfig::default()).await
    }

    async fn fail_login(store: &SecurityStore, n: usize) {
        for _ in 0..n {
            store
                .log_login_attempt(EMAIL, false, Some(FailureReason::InvalidPassword), &client())
                .await;
        }
    }

    #[tokio::test]
    async fn five_failures_lock_the_account() {
        let (store, _, _) = default_store().await;

        fail_login(&store, 4).await;
        assert!(!store.is_user_locked(EMAIL).await);

        fail_login(&store, 1).await;
        assert!(store.is_user_locked(EMAIL).await);

        let remaining = store.lockout_remaining(EMAIL).await;
        assert!(remaining > Duration::zero());
        assert!(remaining <= Duration::minutes(15));
    }

    #[tokio::test]
    async fn lockout_is_case_insensitive_and_per_email() {
        let (store, _, _) = default_store().await;

        fail_login(&store, 5).await;
        assert!(store.is_user_locked("A@B.COM").await);
        assert!(!store.is_user_locked("other@b.com").await);
    }

    #[tokio::test]
    async fn lockout_expires_after_window() {
        let (store, _, clock) = default_store().await;

        fail_login(&store, 5).await;
        assert!(store.is_user_locked(EMAIL).await);

        clock.advance(Duration::minutes(15) + Duration::seconds(1));
        assert!(!store.is_user_locked(EMAIL).await);
        assert_eq!(store.lockout_remaining(EMAIL).await, Duration::zero());
    }

    #[tokio::test]
    async fn success_does_not_forgive_prior_failures() {
        let (store, _, _) = default_store().await;

        fail_login(&store, 4).await;
        store.log_login_attempt(EMAIL, true, None, &client()).await;
        fail_login(&store, 1).await;

        // Four failures, one success, one more failure: the window holds
        // five counted failures.
        assert!(store.is_user_locked(EMAIL).await);
    }

    #[tokio::test]
    async fn locked_rejections_do_not_extend_the_lockout() {
        let (store, _, clock) = default_store().await;

        fail_login(&store, 5).await;
        let initial = store.lockout_remaining(EMAIL).await;

        clock.advance(Duration::minutes(10));
        store
            .log_login_attempt(EMAIL, false, Some(FailureReason::AccountLocked), &client())
            .await;

        let remaining = store.lockout_remaining(EMAIL).await;
        assert!(remaining < initial);
        assert!(remaining <= Duration::minutes(5));
    }

    #[tokio::test]
    async fn old_failures_outside_window_do_not_count() {
        let (store, _, clock) = default_store().await;

        fail_login(&store, 3).await;
        clock.advance(Duration::minutes(16));
        fail_login(&store, 2).await;

        assert!(!store.is_user_locked(EMAIL).await);
    }

    #[tokio::test]
    async fn attempt_cap_drops_oldest_first() {
        let (store, _, _) = default_store().await;

        store
            .log_login_attempt("first@b.com", false, Some(FailureReason::UserNotFound), &client())
            .await;
        for _ in 0..100 {
            store
                .log_login_attempt(EMAIL, false, Some(FailureReason::InvalidPassword), &client())
                .await;
        }

        let attempts = store.recent_login_attempts(200).await;
        assert_eq!(attempts.len(), 100);
        assert!(attempts.iter().all(|a| a.matches_email(EMAIL)));
    }

    #[tokio::test]
    async fn security_log_cap_is_enforced_at_append() {
        let config = SecurityConfig {
            security_log_cap: 3,
            ..SecurityConfig::default()
        };
        let (store, _, clock) = store_with(config).await;

        for i in 0..5 {
            clock.advance(Duration::seconds(1));
            store
                .log_security_event(
                    security_events::USER_LOGIN,
                    resources::AUTHENTICATION,
                    None,
                    true,
                    Some(serde_json::json!({ "n": i })),
                    &client(),
                )
                .await;
        }

        let events = store.recent_security_events(10).await;
        assert_eq!(events.len(), 3);
        // Oldest entries (n = 0, 1) were dropped
        let kept: Vec<i64> = events.iter().filter_map(|e| e.details.as_ref()?.get("n")?.as_i64()).collect();
        assert_eq!(kept, vec![4, 3, 2]);
    }

    #[tokio::test]
    async fn session_lifetime_is_exactly_the_configured_timeout() {
        let (store, _, _) = default_store().await;
        let user_id = Uuid::new_v4();

        let session = store.create_session(user_id, "device-1".to_string(), None, &client()).await;
        assert!(session.is_active);
        assert_eq!(session.expires_at - session.created_at, Duration::hours(24));
    }

    #[tokio::test]
    async fn create_session_emits_audit_entry() {
        let (store, _, _) = default_store().await;
        let user_id = Uuid::new_v4();

        store.create_session(user_id, "device-1".to_string(), None, &client()).await;

        let events = store.recent_security_events(10).await;
        assert!(events.iter().any(|e| e.action == security_events::SESSION_CREATED && e.user_id == Some(user_id)));
    }

    #[tokio::test]
    async fn multi_device_sessions_are_allowed() {
        let (store, _, _) = default_store().await;
        let user_id = Uuid::new_v4();

        store.create_session(user_id, "phone".to_string(), None, &client()).await;
        store.create_session(user_id, "tablet".to_string(), None, &client()).await;

        assert_eq!(store.sessions_for_user(user_id).await.len(), 2);
    }

    #[tokio::test]
    async fn terminate_session_is_idempotent() {
        let (store, _, _) = default_store().await;
        let user_id = Uuid::new_v4();
        let session = store.create_session(user_id, "device-1".to_string(), None, &client()).await;

        store.terminate_session(session.id, Some(user_id), &client()).await;
        let after_first: Vec<_> = store.recent_security_events(100).await;
        store.terminate_session(session.id, Some(user_id), &client()).await;
        let after_second: Vec<_> = store.recent_security_events(100).await;

        assert!(store.sessions_for_user(user_id).await.is_empty());
        // Second call is a no-op: no extra audit entry, same final state
        assert_eq!(after_first.len(), after_second.len());
    }

    #[tokio::test]
    async fn terminate_unknown_session_is_a_no_op() {
        let (store, _, _) = default_store().await;
        store.terminate_session(Uuid::new_v4(), None, &client()).await;
        assert!(store.active_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn terminate_scoped_to_wrong_user_leaves_session_active() {
        let (store, _, _) = default_store().await;
        let owner = Uuid::new_v4();
        let session = store.create_session(owner, "device-1".to_string(), None, &client()).await;

        store.terminate_session(session.id, Some(Uuid::new_v4()), &client()).await;
        assert_eq!(store.sessions_for_user(owner).await.len(), 1);
    }

    #[tokio::test]
    async fn authenticate_session_refreshes_activity_and_rejects_unusable() {
        let (store, _, clock) = default_store().await;
        let user_id = Uuid::new_v4();
        let session = store.create_session(user_id, "device-1".to_string(), None, &client()).await;

        clock.advance(Duration::hours(1));
        let resolved = store.authenticate_session(session.id, user_id).await.unwrap();
        assert_eq!(resolved.last_activity, clock.now());

        // Terminated sessions no longer authenticate
        store.terminate_session(session.id, Some(user_id), &client()).await;
        assert!(store.authenticate_session(session.id, user_id).await.is_none());
    }

    #[tokio::test]
    async fn expired_sessions_do_not_authenticate() {
        let (store, _, clock) = default_store().await;
        let user_id = Uuid::new_v4();
        let session = store.create_session(user_id, "device-1".to_string(), None, &client()).await;

        clock.advance(Duration::hours(24) + Duration::seconds(1));
        assert!(store.authenticate_session(session.id, user_id).await.is_none());
    }

    #[tokio::test]
    async fn cleanup_keeps_fresh_data_and_usable_sessions() {
        let (store, _, clock) = default_store().await;
        let user_id = Uuid::new_v4();

        fail_login(&store, 2).await;
        store.create_session(user_id, "old-device".to_string(), None, &client()).await;

        clock.advance(Duration::days(6));
        fail_login(&store, 1).await;
        let fresh_session = store.create_session(user_id, "new-device".to_string(), None, &client()).await;

        clock.advance(Duration::days(2));
        store.cleanup_old_data().await;

        // 8-day-old attempts are gone, the 2-day-old one stays
        let attempts = store.recent_login_attempts(100).await;
        assert_eq!(attempts.len(), 1);

        // Both sessions are expired by now, so none survive
        assert!(store.active_sessions().await.is_empty());
        assert!(store.authenticate_session(fresh_session.id, user_id).await.is_none());
    }

    #[tokio::test]
    async fn cleanup_never_removes_active_unexpired_sessions() {
        let (store, _, clock) = default_store().await;
        let user_id = Uuid::new_v4();
        store.create_session(user_id, "device-1".to_string(), None, &client()).await;

        clock.advance(Duration::hours(1));
        store.cleanup_old_data().await;

        assert_eq!(store.sessions_for_user(user_id).await.len(), 1);
    }

    #[tokio::test]
    async fn snapshots_survive_a_reload() {
        let (store, storage, clock) = default_store().await;
        let user_id = Uuid::new_v4();

        fail_login(&store, 5).await;
        store.create_session(user_id, "device-1".to_string(), None, &client()).await;

        // A fresh store over the same storage sees the same state
        let reloaded = SecurityStore::load(SecurityConfig::default(), storage, clock).await;
        assert!(reloaded.is_user_locked(EMAIL).await);
        assert_eq!(reloaded.sessions_for_user(user_id).await.len(), 1);
    }

    #[tokio::test]
    async fn undecodable_snapshot_starts_empty() {
        let storage = Arc::new(InMemoryStore::new());
        storage.seed(keys::LOGIN_ATTEMPTS, "not json".to_string()).await;

        let clock = Arc::new(ManualClock::new());
        let store = SecurityStore::load(SecurityConfig::default(), storage, clock).await;
        assert!(store.recent_login_attempts(10).await.is_empty());
    }

    #[tokio::test]
    async fn lockout_scenario_from_the_dashboard_report() {
        // Five rapid failures, then both lockout queries
        let (store, _, _) = default_store().await;
        fail_login(&store, 5).await;

        assert!(store.is_user_locked(EMAIL).await);
        let remaining = store.lockout_remaining(EMAIL).await;
        assert!(remaining.num_milliseconds() > 0);
        assert!(remaining.num_milliseconds() <= 900_000);
    }
}
