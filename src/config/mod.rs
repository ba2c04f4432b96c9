use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

/// Which backing store the cache runs on. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDriver {
    Local,
    Redis,
}

impl FromStr for CacheDriver {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "memory" => Ok(CacheDriver::Local),
            "redis" => Ok(CacheDriver::Redis),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub cache_driver: CacheDriver,
    pub redis_url: String,
    pub local_cache_max_bytes: Option<usize>,
    /// Limiter threshold and decay rate, requests per minute.
    pub decrease_per_min: f64,
    pub webtoken_duration_h: u64,
    pub cloudflare_proxy: bool,
    /// Non-zero when session IPs are stored as bcrypt hashes.
    pub hash_ip_salts: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let cache_driver = match lookup("CacheDriver") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                var: "CacheDriver",
                value,
            })?,
            None => CacheDriver::Local,
        };

        let redis_url = lookup("REDIS_URL").unwrap_or_else(|| {
            format!(
                "redis://{}:{}@{}:{}/{}",
                lookup("Redis_User").unwrap_or_else(|| "default".into()),
                lookup("Redis_Password").unwrap_or_else(|| "default".into()),
                lookup("Redis_Host").unwrap_or_else(|| "127.0.0.1".into()),
                lookup("Redis_Port").unwrap_or_else(|| "6379".into()),
                lookup("Redis_DB").unwrap_or_else(|| "0".into()),
            )
        });

        let decrease_per_min: f64 = parse_or(&lookup, "DecreasePerMin", 60.0)?;
        if !decrease_per_min.is_finite() || decrease_per_min <= 0.0 {
            return Err(ConfigError::Invalid {
                var: "DecreasePerMin",
                value: decrease_per_min.to_string(),
            });
        }

        let local_cache_max_bytes = match lookup("LocalCacheMaxBytes") {
            Some(value) => Some(value.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "LocalCacheMaxBytes",
                value,
            })?),
            None => None,
        };

        Ok(Config {
            database_url,
            cache_driver,
            redis_url,
            local_cache_max_bytes,
            decrease_per_min,
            webtoken_duration_h: parse_or(&lookup, "WebTokenDurationH", 24)?,
            cloudflare_proxy: parse_or(&lookup, "CloudFlare_Proxy", false)?,
            hash_ip_salts: parse_or(&lookup, "HashIPSalts", 0)?,
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "::".into()),
            server_port: parse_or(&lookup, "SERVER_PORT", 3000)?,
            api_base_uri: lookup("API_BASE_URI").unwrap_or_else(|| "/api/v1".into()),
        })
    }

    pub fn webtoken_duration(&self) -> Duration {
        Duration::from_secs(self.webtoken_duration_h * 3600)
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}
