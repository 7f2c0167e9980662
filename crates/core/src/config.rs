use std::env;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub postgres: PostgresConfig,
    pub queue: QueueConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `RUNQ_PROFILE`. When set (e.g. `PROD`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("RUNQ_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            queue: QueueConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
        tracing::info!("  queue:       backend={}, max_attempts={}, strict_transitions={}",
            self.queue.backend, self.queue.max_attempts, self.queue.strict_transitions);
        tracing::info!("  postgres:    host={}, db={}", self.postgres.host, self.postgres.database);
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "server": { "host": self.server.host, "port": self.server.port },
            "postgres": {
                "host": self.postgres.host,
                "port": self.postgres.port,
                "database": self.postgres.database,
                "configured": self.postgres.is_configured(),
            },
            "queue": {
                "backend": self.queue.backend,
                "max_attempts": self.queue.max_attempts,
                "retry_base_ms": self.queue.retry_base_ms,
                "strict_transitions": self.queue.strict_transitions,
            },
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_parse(p, "PORT", 3002),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_parse(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "runq"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "prefer"),
            max_connections: profiled_env_parse(p, "PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn database_url(&self) -> String {
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

// ── Queue ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// "memory" or "postgres"
    pub backend: String,
    /// Attempts before a failing job is marked `Failed`.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub retry_base_ms: u64,
    pub retry_multiplier: f64,
    /// Reject transitions out of terminal states instead of forwarding them.
    pub strict_transitions: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            max_attempts: 3,
            retry_base_ms: 1000,
            retry_multiplier: 2.0,
            strict_transitions: false,
        }
    }
}

impl QueueConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            backend: profiled_env_or(p, "QUEUE_BACKEND", &d.backend).to_lowercase(),
            max_attempts: profiled_env_parse(p, "QUEUE_MAX_ATTEMPTS", d.max_attempts).max(1),
            retry_base_ms: profiled_env_parse(p, "QUEUE_RETRY_BASE_MS", d.retry_base_ms),
            retry_multiplier: profiled_env_parse(p, "QUEUE_RETRY_MULTIPLIER", d.retry_multiplier),
            strict_transitions: profiled_env_bool(p, "QUEUE_STRICT_TRANSITIONS", d.strict_transitions),
        }
    }

    pub fn uses_postgres(&self) -> bool {
        self.backend == "postgres"
    }
}
