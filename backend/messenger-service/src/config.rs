use crate::error::AppError;
use dotenvy::dotenv;
use std::env;

const DEV_SESSION_SECRET: &str = "dev-only-session-secret-do-not-deploy";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// HMAC key for session tokens
    pub secret: String,
    pub cookie_name: String,
    pub ttl_hours: i64,
    /// Secure cookies are sent with `SameSite=None`, insecure ones with `Lax`
    pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Capacity of each connection's outbound queue
    pub outbound_buffer: usize,
    pub heartbeat_interval_secs: u64,
    pub client_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub default_limit: i64,
    pub max_limit: i64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: String,
    pub port: u16,
    /// `None` runs the service on in-memory stores
    pub database_url: Option<String>,
    pub session: SessionConfig,
    pub cors_origins: Vec<String>,
    pub ws: WsConfig,
    pub presence_broadcast: bool,
    pub history: HistoryConfig,
    pub max_message_length: usize,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        _ => Ok(default),
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| {
            let v = v.trim();
            v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("yes")
        })
        .unwrap_or(default)
}

impl Config {
    fn parse_origins(value: &str) -> Vec<String> {
        value
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect()
    }

    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "production".into());
        let relaxed = matches!(app_env.as_str(), "development" | "testing");

        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let secret = match env::var("SESSION_SECRET").ok().filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None if relaxed => {
                tracing::warn!(%app_env, "SESSION_SECRET not set, using development secret");
                DEV_SESSION_SECRET.to_string()
            }
            None => {
                return Err(AppError::Config(
                    "SESSION_SECRET missing (required outside development)".into(),
                ))
            }
        };

        let session = SessionConfig {
            secret,
            cookie_name: env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "session".into()),
            ttl_hours: env_parse("SESSION_TTL_HOURS", 168)?,
            cookie_secure: env_flag("SESSION_COOKIE_SECURE", true),
        };

        let cors_origins = Self::parse_origins(
            &env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let ws = WsConfig {
            outbound_buffer: env_parse("WS_OUTBOUND_BUFFER", 64)?,
            heartbeat_interval_secs: env_parse("WS_HEARTBEAT_INTERVAL_SECS", 5)?,
            client_timeout_secs: env_parse("WS_CLIENT_TIMEOUT_SECS", 30)?,
        };

        let history = HistoryConfig {
            default_limit: env_parse("HISTORY_DEFAULT_LIMIT", 50)?,
            max_limit: env_parse("HISTORY_MAX_LIMIT", 200)?,
        };

        let config = Self {
            app_env,
            port: env_parse("PORT", 5000)?,
            database_url,
            session,
            cors_origins,
            ws,
            presence_broadcast: env_flag("PRESENCE_BROADCAST", true),
            history,
            max_message_length: env_parse("MAX_MESSAGE_LENGTH", 4000)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.ws.outbound_buffer == 0 {
            return Err(AppError::Config("WS_OUTBOUND_BUFFER must be at least 1".into()));
        }
        if self.ws.heartbeat_interval_secs == 0
            || self.ws.client_timeout_secs <= self.ws.heartbeat_interval_secs
        {
            return Err(AppError::Config(
                "WS_CLIENT_TIMEOUT_SECS must exceed WS_HEARTBEAT_INTERVAL_SECS (> 0)".into(),
            ));
        }
        if self.history.default_limit < 1 || self.history.max_limit < self.history.default_limit {
            return Err(AppError::Config(
                "HISTORY_DEFAULT_LIMIT must be >= 1 and <= HISTORY_MAX_LIMIT".into(),
            ));
        }
        if self.max_message_length == 0 {
            return Err(AppError::Config("MAX_MESSAGE_LENGTH must be at least 1".into()));
        }
        if self.session.ttl_hours < 1 {
            return Err(AppError::Config("SESSION_TTL_HOURS must be at least 1".into()));
        }
        Ok(())
    }

    /// In-memory configuration for tests; no environment access.
    pub fn test_defaults() -> Self {
        Self {
            app_env: "testing".into(),
            port: 0,
            database_url: None,
            session: SessionConfig {
                secret: "test-session-secret".into(),
                cookie_name: "session".into(),
                ttl_hours: 1,
                cookie_secure: false,
            },
            cors_origins: vec!["http://localhost:5173".into()],
            ws: WsConfig {
                outbound_buffer: 16,
                heartbeat_interval_secs: 5,
                client_timeout_secs: 30,
            },
            presence_broadcast: true,
            history: HistoryConfig {
                default_limit: 50,
                max_limit: 200,
            },
            max_message_length: 4000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "APP_ENV",
        "DATABASE_URL",
        "SESSION_SECRET",
        "SESSION_TTL_HOURS",
        "SESSION_COOKIE_SECURE",
        "CORS_ORIGINS",
        "WS_OUTBOUND_BUFFER",
        "WS_HEARTBEAT_INTERVAL_SECS",
        "WS_CLIENT_TIMEOUT_SECS",
        "PRESENCE_BROADCAST",
        "PORT",
    ];

    fn clear_env() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_production_requires_session_secret() {
        clear_env();
        env::set_var("APP_ENV", "production");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_development_defaults() {
        clear_env();
        env::set_var("APP_ENV", "development");

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.port, 5000);
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.session.secret, DEV_SESSION_SECRET);
        assert_eq!(cfg.session.cookie_name, "session");
        assert_eq!(cfg.session.ttl_hours, 168);
        assert!(cfg.session.cookie_secure);
        assert_eq!(cfg.cors_origins, vec!["http://localhost:5173".to_string()]);
        assert_eq!(cfg.ws.outbound_buffer, 64);
        assert!(cfg.presence_broadcast);
        assert_eq!(cfg.history.default_limit, 50);
        assert_eq!(cfg.max_message_length, 4000);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_overrides() {
        clear_env();
        env::set_var("SESSION_SECRET", "s3cret");
        env::set_var("CORS_ORIGINS", "https://a.example, https://b.example,");
        env::set_var("PRESENCE_BROADCAST", "false");
        env::set_var("SESSION_COOKIE_SECURE", "0");
        env::set_var("PORT", "8080");

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.cors_origins.len(), 2);
        assert!(!cfg.presence_broadcast);
        assert!(!cfg.session.cookie_secure);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_rejects_zero_outbound_buffer() {
        clear_env();
        env::set_var("APP_ENV", "testing");
        env::set_var("WS_OUTBOUND_BUFFER", "0");

        assert!(Config::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_rejects_unparseable_port() {
        clear_env();
        env::set_var("APP_ENV", "testing");
        env::set_var("PORT", "not-a-port");

        assert!(Config::from_env().is_err());
        clear_env();
    }
}
