/*
 * Responsibility
 * - 環境変数や設定の読み込み (PORT, DATABASE_URL, CORS 許可、Auth / Rate limit / Circuit breaker / Retry 設定)
 * - 設定値のバリデーション (不正なら起動失敗)
 * - Default は local 開発用 (認証なし・in-memory store)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Bearer token verification settings.
///
/// With neither `jwt_secret` nor `jwt_public_key_pem` set, bearer headers are ignored and
/// every request resolves to the local identity.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub jwt_secret: Option<String>,
    pub jwt_public_key_pem: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway_seconds: u64,
    pub required: bool,
    pub delete_user_role: Option<String>,
}

impl AuthConfig {
    pub fn is_enabled(&self) -> bool {
        self.jwt_secret.is_some() || self.jwt_public_key_pem.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub limit_for_period: u32,
    pub refresh_period: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit_for_period: 10,
            refresh_period: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub sliding_window_size: usize,
    pub minimum_number_of_calls: usize,
    /// Percent (1..=100) of failed calls in the window that opens the breaker.
    pub failure_rate_threshold: u8,
    pub wait_duration_in_open_state: Duration,
    pub permitted_calls_in_half_open_state: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: 10,
            minimum_number_of_calls: 5,
            failure_rate_threshold: 50,
            wait_duration_in_open_state: Duration::from_secs(10),
            permitted_calls_in_half_open_state: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Attempts including the first call.
    pub max_attempts: u32,
    pub wait_duration: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait_duration: Duration::from_millis(100),
            attempt_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub database_url: Option<String>,

    pub app_env: AppEnv,
    pub app_version: String,
    pub cors_allowed_origins: Vec<String>,

    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            app_env: AppEnv::Development,
            app_version: "1.0.0".to_string(),
            cors_allowed_origins: Vec::new(),
            auth: AuthConfig {
                leeway_seconds: 60,
                ..AuthConfig::default()
            },
            rate_limit: RateLimitConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Unset keeps the default; set-but-unparsable fails startup.
fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match var(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn millis_or(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    parse_or(key, default.as_millis() as u64).map(Duration::from_millis)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let port: u16 = parse_or("PORT", defaults.addr.port())?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let auth = AuthConfig {
            jwt_secret: var("AUTH_JWT_SECRET"),
            jwt_public_key_pem: var("AUTH_JWT_PUBLIC_KEY_PEM").map(|pem| pem.replace("\\n", "\n")),
            issuer: var("AUTH_ISSUER"),
            audience: var("AUTH_AUDIENCE"),
            leeway_seconds: parse_or("ACCESS_TOKEN_LEEWAY_SECONDS", defaults.auth.leeway_seconds)?,
            required: parse_or("AUTH_REQUIRED", app_env.is_production())?,
            delete_user_role: var("DELETE_USER_ROLE"),
        };
        if auth.required && !auth.is_enabled() {
            return Err(ConfigError::Missing("AUTH_JWT_SECRET"));
        }

        let rate_limit = RateLimitConfig {
            limit_for_period: parse_or(
                "RATE_LIMIT_LIMIT_FOR_PERIOD",
                defaults.rate_limit.limit_for_period,
            )?,
            refresh_period: millis_or(
                "RATE_LIMIT_REFRESH_PERIOD_MS",
                defaults.rate_limit.refresh_period,
            )?,
        };

        let cb = defaults.circuit_breaker;
        let circuit_breaker = CircuitBreakerConfig {
            sliding_window_size: parse_or("CB_SLIDING_WINDOW_SIZE", cb.sliding_window_size)?,
            minimum_number_of_calls: parse_or(
                "CB_MINIMUM_NUMBER_OF_CALLS",
                cb.minimum_number_of_calls,
            )?,
            failure_rate_threshold: parse_or(
                "CB_FAILURE_RATE_THRESHOLD",
                cb.failure_rate_threshold,
            )?,
            wait_duration_in_open_state: millis_or(
                "CB_WAIT_DURATION_IN_OPEN_STATE_MS",
                cb.wait_duration_in_open_state,
            )?,
            permitted_calls_in_half_open_state: parse_or(
                "CB_PERMITTED_CALLS_IN_HALF_OPEN_STATE",
                cb.permitted_calls_in_half_open_state,
            )?,
        };

        let retry = RetryConfig {
            max_attempts: parse_or("RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
            wait_duration: millis_or("RETRY_WAIT_DURATION_MS", defaults.retry.wait_duration)?,
            attempt_timeout: millis_or("RETRY_ATTEMPT_TIMEOUT_MS", defaults.retry.attempt_timeout)?,
        };

        let config = Self {
            addr,
            database_url: var("DATABASE_URL"),
            app_env,
            app_version: var("APP_VERSION").unwrap_or(defaults.app_version),
            cors_allowed_origins,
            auth,
            rate_limit,
            circuit_breaker,
            retry,
        };
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.limit_for_period == 0 {
            return Err(ConfigError::Invalid("RATE_LIMIT_LIMIT_FOR_PERIOD"));
        }
        if self.rate_limit.refresh_period.is_zero() {
            return Err(ConfigError::Invalid("RATE_LIMIT_REFRESH_PERIOD_MS"));
        }

        let cb = &self.circuit_breaker;
        if cb.sliding_window_size == 0 {
            return Err(ConfigError::Invalid("CB_SLIDING_WINDOW_SIZE"));
        }
        if cb.minimum_number_of_calls == 0 || cb.minimum_number_of_calls > cb.sliding_window_size
        {
            return Err(ConfigError::Invalid("CB_MINIMUM_NUMBER_OF_CALLS"));
        }
        if !(1..=100).contains(&cb.failure_rate_threshold) {
            return Err(ConfigError::Invalid("CB_FAILURE_RATE_THRESHOLD"));
        }
        if cb.permitted_calls_in_half_open_state == 0 {
            return Err(ConfigError::Invalid("CB_PERMITTED_CALLS_IN_HALF_OPEN_STATE"));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("RETRY_MAX_ATTEMPTS"));
        }

        Ok(())
    }
}
