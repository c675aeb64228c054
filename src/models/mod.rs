pub mod login_attempt;
pub mod role;
pub mod security_log;
pub mod session;
pub mod user;
