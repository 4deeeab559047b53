use std::time::Duration;

use clap::Parser;

/// Real-time presence and room fan-out hub
#[derive(Parser, Debug, Clone)]
#[command(name = "chat-hub", version, about = "Real-time presence and room fan-out hub")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "HUB_BIND", default_value = "0.0.0.0:3000")]
    pub bind: String,

    /// SQLite database holding users and chat/room membership
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://chat.db?mode=rwc")]
    pub database_url: String,

    /// HS256 secret used to verify bearer tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Shared key for the internal emit/notify endpoints (disabled when unset)
    #[arg(long, env = "HUB_INTERNAL_KEY", hide_env_values = true)]
    pub internal_key: Option<String>,

    /// Upper bound on a room membership lookup
    #[arg(long, env = "HUB_JOIN_TIMEOUT_MS", default_value_t = 5_000)]
    pub join_timeout_ms: u64,

    /// Interval between server pings on each socket
    #[arg(long, env = "HUB_PING_INTERVAL_SECS", default_value_t = 25)]
    pub ping_interval_secs: u64,

    /// How long a peer has to answer a ping before the socket is dropped
    #[arg(long, env = "HUB_PONG_TIMEOUT_SECS", default_value_t = 10)]
    pub pong_timeout_secs: u64,

    /// Max request body for the HTTP endpoints, in bytes
    #[arg(long, env = "HUB_BODY_LIMIT", default_value_t = 1024 * 1024)]
    pub body_limit: usize,

    /// Structured JSON logs
    #[arg(long, env = "HUB_JSON_LOGS")]
    pub json_logs: bool,

    /// Print a token for SUBJECT signed with the configured secret, then exit
    #[arg(long, value_name = "SUBJECT")]
    pub issue_token: Option<String>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::Invalid("JWT_SECRET", "must not be empty"));
        }
        if self.join_timeout_ms == 0 {
            return Err(ConfigError::Invalid("HUB_JOIN_TIMEOUT_MS", "must be positive"));
        }
        if self.ping_interval_secs == 0 {
            return Err(ConfigError::Invalid("HUB_PING_INTERVAL_SECS", "must be positive"));
        }
        if self.pong_timeout_secs == 0 {
            return Err(ConfigError::Invalid("HUB_PONG_TIMEOUT_SECS", "must be positive"));
        }
        if matches!(&self.internal_key, Some(k) if k.trim().is_empty()) {
            return Err(ConfigError::Invalid("HUB_INTERNAL_KEY", "must not be blank"));
        }
        Ok(())
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid setting {0}: {1}")]
    Invalid(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let cfg = Config::try_parse_from(["chat-hub", "--jwt-secret", "s3cret"]).unwrap();
        assert_eq!(cfg.bind, "0.0.0.0:3000");
        assert_eq!(cfg.join_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.ping_interval(), Duration::from_secs(25));
        assert_eq!(cfg.pong_timeout(), Duration::from_secs(10));
        assert!(cfg.internal_key.is_none());
        cfg.validate().unwrap();
    }

    #[test]
    fn zero_timeout_rejected() {
        let cfg = Config::try_parse_from([
            "chat-hub",
            "--jwt-secret",
            "s3cret",
            "--join-timeout-ms",
            "0",
        ])
        .unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_pong_timeout_rejected() {
        let cfg = Config::try_parse_from([
            "chat-hub",
            "--jwt-secret",
            "s3cret",
            "--pong-timeout-secs",
            "0",
        ])
        .unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid("HUB_PONG_TIMEOUT_SECS", _))));
    }

    #[test]
    fn blank_secret_rejected() {
        let cfg = Config::try_parse_from(["chat-hub", "--jwt-secret", "  "]).unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid("JWT_SECRET", _))));
    }
}
