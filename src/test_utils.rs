use crate::clock::Clock;
use crate::{Config, build_rocket};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rocket::http::{ContentType, Status};
use rocket::local::asynchronous::Client;
use std::sync::Mutex;

/// Deterministic clock for lockout and expiry tests. Starts at a fixed
/// instant and only moves when advanced.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// A rocket wired to the in-memory backend with default security limits.
pub async fn test_client() -> Client {
    Client::tracked(build_rocket(Config::default())).await.expect("valid rocket instance")
}

pub async fn register(client: &Client, name: &str, email: &str, password: &str, role: &str) -> Status {
    client
        .post("/api/users")
        .header(ContentType::JSON)
        .body(
            serde_json::json!({
                "name": name,
                "email": email,
                "password": password,
                "role": role,
            })
            .to_string(),
        )
        .dispatch()
        .await
        .status()
}

pub async fn login(client: &Client, email: &str, password: &str) -> (Status, Option<serde_json::Value>) {
    let response = client
        .post("/api/users/login")
        .header(ContentType::JSON)
        .body(
            serde_json::json!({
                "email": email,
                "password": password,
                "device_id": "test-device",
            })
            .to_string(),
        )
        .dispatch()
        .await;

    let status = response.status();
    let body = response.into_json().await;
    (status, body)
}
