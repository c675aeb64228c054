use chrono::{DateTime, Utc};

/// Time source for lockout and session arithmetic. Injected so that tests can
/// drive the clock instead of sleeping through lockout windows.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
