use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::str::FromStr;

// Dev fallback so a bare `cargo run` works; never deploy with this key.
const DEV_SESSION_KEY: &str = "eW91LXdpbGwtbmV2ZXItZ3Vlc3MteW91LXdpbGwtbmU=";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: String,
    pub schema_dir: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub session_key: [u8; 32],
    pub session_ttl_hours: u64,
    pub remember_ttl_days: u64,
    pub log_file: Option<String>,
    pub mail: Option<MailConfig>,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
    pub from: String,
    pub admins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        Ok(Self {
            http_addr,
            database_url: env_or_err("DATABASE_URL")?,
            schema_dir: env_or("SCHEMA_DIR", "migrations"),
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            session_key: env_key_32("SESSION_KEY", DEV_SESSION_KEY)?,
            session_ttl_hours: env_or_parse("SESSION_TTL_HOURS", "24")?,
            remember_ttl_days: env_or_parse("SESSION_REMEMBER_TTL_DAYS", "30")?,
            log_file: std::env::var("LOG_FILE").ok(),
            mail: mail_from_env()?,
        })
    }
}

fn mail_from_env() -> Result<Option<MailConfig>> {
    let server = match std::env::var("MAIL_SERVER") {
        Ok(server) if !server.trim().is_empty() => server,
        _ => return Ok(None),
    };

    let admins: Vec<String> = env_or("ADMINS", "")
        .split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect();
    if admins.is_empty() {
        return Ok(None);
    }

    let from = env_or("MAIL_FROM", &format!("no-reply@{}", server));

    Ok(Some(MailConfig {
        port: env_or_parse("MAIL_PORT", "25")?,
        username: std::env::var("MAIL_USERNAME").ok(),
        password: std::env::var("MAIL_PASSWORD").ok(),
        use_tls: env_or_parse("MAIL_USE_TLS", "false")?,
        server,
        from,
        admins,
    }))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

fn env_key_32(key: &str, default: &str) -> Result<[u8; 32]> {
    let value = env_or(key, default);
    let decoded = STANDARD
        .decode(value.as_bytes())
        .map_err(|err| anyhow!("invalid {}: {}", key, err))?;
    if decoded.len() != 32 {
        return Err(anyhow!("invalid {}: expected 32 bytes", key));
    }
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&decoded);
    Ok(key_bytes)
}
