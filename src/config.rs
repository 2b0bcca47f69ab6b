//! Runtime configuration read from the environment

use std::path::PathBuf;

/// Application configuration shared by the server and the CLI
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub models_dir: PathBuf,
    /// Durable session tier; `None` keeps sessions process-local
    pub redis_url: Option<String>,
    pub allow_debug_sessions: bool,
    pub max_upload_size: usize,
    pub cors_origin: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            models_dir: std::env::var("MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("saved_models")),
            redis_url: std::env::var("REDIS_URL").ok().filter(|u| !u.trim().is_empty()),
            allow_debug_sessions: std::env::var("ALLOW_DEBUG_SESSIONS")
                .map(|v| v == "1")
                .unwrap_or(false),
            max_upload_size: std::env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100 * 1024 * 1024), // 100MB
            cors_origin: std::env::var("CORS_ORIGIN")
                .ok()
                .filter(|o| !o.trim().is_empty() && o != "*"),
        }
    }
}

impl AppConfig {
    /// Configuration for tests and embedded use: no env lookups, local tier only
    pub fn local(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            models_dir: models_dir.into(),
            redis_url: None,
            allow_debug_sessions: false,
            max_upload_size: 100 * 1024 * 1024,
            cors_origin: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_debug_sessions(mut self, enabled: bool) -> Self {
        self.allow_debug_sessions = enabled;
        self
    }
}
