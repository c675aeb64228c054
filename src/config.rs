use rocket::figment::{Figment, providers::{Env, Format, Toml}};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub address: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Redis connection URL. Empty selects the in-memory backend, which
    /// loses all state on restart and is only meant for development/tests.
    pub url: String,
}

/// Tunables for the lockout, audit and session machinery.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SecurityConfig {
    pub max_login_attempts: u32,
    pub lockout_duration_minutes: i64,
    pub session_timeout_hours: i64,
    pub retention_days: i64,
    pub login_attempt_cap: usize,
    pub security_log_cap: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_path: String,
    pub enable_swagger: bool,
}

pub const DEFAULT_API_BASE_PATH: &str = "/api";

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            address: "127.0.0.1".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { url: String::new() }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_login_attempts: 5,
            lockout_duration_minutes: 15,
            session_timeout_hours: 24,
            retention_days: 7,
            login_attempt_cap: 100,
            security_log_cap: 500,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: false,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_API_BASE_PATH.to_string(),
            enable_swagger: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            security: SecurityConfig::default(),
            logging: LoggingConfig::default(),
            cors: CorsConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Schoolgate.toml (base configuration file)
    /// 2. Environment variables (prefixed with SCHOOLGATE_)
    /// 3. REDIS_URL environment variable (for backwards compatibility)
    pub fn load() -> Result<Self, figment::Error> {
        let figment = Figment::new()
            // Start with defaults
            .merge(Toml::string(&toml::to_string(&Config::default()).unwrap()).nested())
            // Layer on Schoolgate.toml if it exists
            .merge(Toml::file("Schoolgate.toml").nested())
            // Layer on environment variables (e.g., SCHOOLGATE_STORAGE_URL)
            .merge(Env::prefixed("SCHOOLGATE_").split("_"))
            // Special case: REDIS_URL for backwards compatibility
            .merge(Env::raw().only(&["REDIS_URL"]).map(|_| "storage.url".into()));

        figment.extract()
    }
}
