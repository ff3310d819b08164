//! Process configuration from the environment.
//!
//! Loaded once at boot; any missing/invalid required variable aborts startup
//! with a non-zero exit. Numeric worker knobs enforce their documented
//! floors instead of silently accepting nonsense.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid number in {var}: {reason}")]
    InvalidNumber {
        var: &'static str,
        reason: &'static str,
    },

    #[error("invalid format in {var}: {reason}")]
    InvalidFormat {
        var: &'static str,
        reason: &'static str,
    },
}

/// Everything the process reads from the environment, validated.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub queue_url: String,
    pub host_base_url: String,
    pub host_token: String,
    pub host_webhook_secret: String,
    pub public_url: Option<String>,
    pub default_tenant_slug: String,
    pub ai_enabled: bool,
    pub ai_api_key: Option<String>,
    pub worker_concurrency: u32,
    pub worker_lock_duration_ms: u64,
    pub worker_stalled_interval_ms: u64,
    pub worker_max_stalled_count: u32,
    pub bind_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host_base_url = must_env("HOST_BASE_URL")?;
        validate_http_endpoint("HOST_BASE_URL", &host_base_url)?;

        let cfg = Self {
            database_url: must_env("DATABASE_URL")?,
            queue_url: must_env("QUEUE_URL")?,
            host_base_url,
            host_token: must_env("HOST_TOKEN")?,
            host_webhook_secret: must_env("HOST_WEBHOOK_SECRET")?,
            public_url: opt_env("PUBLIC_URL"),
            default_tenant_slug: opt_env("DEFAULT_TENANT_SLUG")
                .unwrap_or_else(|| "default".to_string()),
            ai_enabled: opt_env("AI_ENABLED")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            ai_api_key: opt_env("AI_API_KEY"),
            worker_concurrency: env_u32_min("WORKER_CONCURRENCY", 1, 1)?,
            worker_lock_duration_ms: env_u64_min("WORKER_LOCK_DURATION_MS", 300_000, 1000)?,
            worker_stalled_interval_ms: env_u64_min("WORKER_STALLED_INTERVAL_MS", 30_000, 1000)?,
            worker_max_stalled_count: env_u32_min("WORKER_MAX_STALLED_COUNT", 1, 1)?,
            bind_addr: opt_env("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        if cfg.ai_enabled && cfg.ai_api_key.is_none() {
            return Err(ConfigError::MissingVar("AI_API_KEY"));
        }
        Ok(cfg)
    }
}

/// Fetches a required, non-empty environment variable.
pub fn must_env(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

fn opt_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_u32_min(name: &'static str, default: u32, floor: u32) -> Result<u32, ConfigError> {
    match opt_env(name) {
        None => Ok(default),
        Some(v) => {
            let n: u32 = v.parse().map_err(|_| ConfigError::InvalidNumber {
                var: name,
                reason: "expected u32",
            })?;
            Ok(n.max(floor))
        }
    }
}

fn env_u64_min(name: &'static str, default: u64, floor: u64) -> Result<u64, ConfigError> {
    match opt_env(name) {
        None => Ok(default),
        Some(v) => {
            let n: u64 = v.parse().map_err(|_| ConfigError::InvalidNumber {
                var: name,
                reason: "expected u64",
            })?;
            Ok(n.max(floor))
        }
    }
}

fn validate_http_endpoint(var: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn must_env_rejects_empty() {
        // Env manipulation is process-global; use names nothing else reads.
        unsafe { std::env::set_var("MRS_TEST_EMPTY", "  ") };
        assert!(matches!(
            must_env("MRS_TEST_EMPTY"),
            Err(ConfigError::MissingVar(_))
        ));
        unsafe { std::env::set_var("MRS_TEST_SET", "value") };
        assert_eq!(must_env("MRS_TEST_SET").unwrap(), "value");
    }

    #[test]
    fn numeric_floors_apply() {
        unsafe { std::env::set_var("MRS_TEST_LOCK", "10") };
        assert_eq!(env_u64_min("MRS_TEST_LOCK", 300_000, 1000).unwrap(), 1000);
        unsafe { std::env::set_var("MRS_TEST_LOCK", "5000") };
        assert_eq!(env_u64_min("MRS_TEST_LOCK", 300_000, 1000).unwrap(), 5000);
        assert_eq!(env_u64_min("MRS_TEST_UNSET_XYZ", 300_000, 1000).unwrap(), 300_000);
    }

    #[test]
    fn endpoint_validation() {
        assert!(validate_http_endpoint("X", "https://gitlab.com/api/v4").is_ok());
        assert!(validate_http_endpoint("X", "gitlab.com").is_err());
    }
}
