/*
 * Responsibility
 * - Load environment configuration (PORT, DATABASE_URL, VALKEY_URL, TOKEN_AUTH_* ...)
 * - Validate values (invalid values fail startup)
 * - Build the process-wide token authentication Settings
 */
use std::collections::HashMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use std::{env, fmt};

use crate::services::token_auth::options::Fallback;
use crate::services::token_auth::settings::{HeaderNames, Settings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match env::var("APP_ENV")
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

#[derive(Debug, PartialEq, Eq)]
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

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    // Without these, the in-memory store / session cache are used.
    pub database_url: Option<String>,
    pub valkey_url: Option<String>,

    pub session_ttl: Duration,
    pub request_timeout: Duration,
    pub body_limit_bytes: usize,

    pub token_auth: Settings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = match env::var("PORT") {
            Ok(v) => v.parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            Err(_) => 3000,
        };
        let addr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let database_url = optional("DATABASE_URL");
        let valkey_url = optional("VALKEY_URL");

        let session_ttl = Duration::from_secs(seconds("SESSION_TTL_SECONDS", 60 * 60 * 24 * 14)?);
        let request_timeout = Duration::from_secs(seconds("REQUEST_TIMEOUT_SECONDS", 30)?);
        let body_limit_bytes = match optional("BODY_LIMIT_BYTES") {
            Some(v) => v
                .parse::<usize>()
                .map_err(|_| ConfigError::Invalid("BODY_LIMIT_BYTES"))?,
            None => 1024 * 1024,
        };

        let token_auth = token_auth_settings()?;

        Ok(Self {
            addr,
            app_env,
            database_url,
            valkey_url,
            session_ttl,
            request_timeout,
            body_limit_bytes,
            token_auth,
        })
    }
}

fn optional(key: &'static str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn seconds(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match optional(key) {
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn token_auth_settings() -> Result<Settings, ConfigError> {
    let mut settings = Settings::default();

    if let Some(v) = optional("TOKEN_AUTH_FALLBACK") {
        settings.fallback =
            Fallback::from_str(&v).map_err(|_| ConfigError::Invalid("TOKEN_AUTH_FALLBACK"))?;
    }
    if let Some(v) = optional("TOKEN_AUTH_SIGN_IN_TOKEN") {
        settings.sign_in_token = parse_bool("TOKEN_AUTH_SIGN_IN_TOKEN", &v)?;
    }
    if let Some(v) = optional("TOKEN_AUTH_SKIP_TRACKABLE") {
        settings.skip_trackable = parse_bool("TOKEN_AUTH_SKIP_TRACKABLE", &v)?;
    }
    if let Some(v) = optional("TOKEN_AUTH_IDENTIFIERS") {
        settings.identifiers = parse_identifiers(&v)?;
    }
    if let Some(v) = optional("TOKEN_AUTH_HEADER_NAMES") {
        settings.header_names = parse_header_names(&v)?;
    }
    if let Some(v) = optional("TOKEN_AUTH_CASE_INSENSITIVE_KEYS") {
        settings.case_insensitive_keys = parse_list(&v);
    }

    Ok(settings)
}

pub(crate) fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid(key)),
    }
}

pub(crate) fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn pairs(value: &str) -> impl Iterator<Item = Option<(&str, &str)>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let (k, v) = (k.trim(), v.trim());
            (!k.is_empty() && !v.is_empty()).then_some((k, v))
        })
}

/// `User=email,SuperAdmin=username`
pub(crate) fn parse_identifiers(value: &str) -> Result<HashMap<String, String>, ConfigError> {
    pairs(value)
        .map(|pair| {
            pair.map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or(ConfigError::Invalid("TOKEN_AUTH_IDENTIFIERS"))
        })
        .collect()
}

/// `user.token=X-Auth-Token,user.identifier=X-Auth-Email`
pub(crate) fn parse_header_names(
    value: &str,
) -> Result<HashMap<String, HeaderNames>, ConfigError> {
    const KEY: &str = "TOKEN_AUTH_HEADER_NAMES";
    let mut names: HashMap<String, HeaderNames> = HashMap::new();

    for pair in pairs(value) {
        let (target, header) = pair.ok_or(ConfigError::Invalid(KEY))?;
        let (entity, field) = target.split_once('.').ok_or(ConfigError::Invalid(KEY))?;
        let entry = names.entry(entity.to_string()).or_default();

        match field {
            "token" => entry.token = Some(header.to_string()),
            "identifier" => entry.identifier = Some(header.to_string()),
            _ => return Err(ConfigError::Invalid(KEY)),
        }
    }

    Ok(names)
}
