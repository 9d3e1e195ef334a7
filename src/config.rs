use std::env;
use std::time::Duration;

// --- CONFIG AGGREGATOR ---

#[derive(Debug, Clone, thiserror::Error)]
#[error("Config error: {key} must be valid (got '{value}')")]
pub struct ConfigError {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub queues: QueuesConfig,
    pub metrics: MetricsConfig,
    pub push: PushConfig,
}

impl Config {
    /// Reads `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Ok(Self {
            server: ServerConfig::load()?,
            store: StoreConfig::load()?,
            queues: QueuesConfig::load()?,
            metrics: MetricsConfig::load()?,
            push: PushConfig::load()?,
        })
    }
}

// --- MODULES ---

// SERVER
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl ServerConfig {
    fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            host:      get_env("SERVER_HOST", "0.0.0.0")?,
            port:      get_env("PORT", "3000")?,
            log_level: get_env("QLENS_LOG", "info")?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
        }
    }
}

// STORE
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u32,
    pub connect_timeout_ms: u64,
    pub scan_count: usize,
    pub channel_capacity: usize,
}

impl StoreConfig {
    fn load() -> Result<Self, ConfigError> {
        let password: String = get_env("REDIS_PASSWORD", "")?;
        Ok(Self {
            host:               get_env("REDIS_HOST", "127.0.0.1")?,
            port:               get_env("REDIS_PORT", "6379")?,
            password:           (!password.is_empty()).then_some(password),
            db:                 get_env("REDIS_DB", "0")?,
            connect_timeout_ms: get_env("STORE_CONNECT_TIMEOUT_MS", "2000")?,
            scan_count:         get_env("STORE_SCAN_COUNT", "1000")?,
            channel_capacity:   get_env("STORE_CHAN_CAP", "1024")?,
        })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            db: 0,
            connect_timeout_ms: 2000,
            scan_count: 1000,
            channel_capacity: 1024,
        }
    }
}

// QUEUES
#[derive(Debug, Clone)]
pub struct QueuesConfig {
    pub prefix: String,
    pub batch_pause_ms: u64,
    pub key_fetch_concurrency: usize,
}

impl QueuesConfig {
    fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            prefix:                get_env("QUEUE_PREFIX", "bull")?,
            batch_pause_ms:        get_env("STATS_BATCH_PAUSE_MS", "50")?,
            key_fetch_concurrency: get_env("KEY_FETCH_CONCURRENCY", "16")?,
        })
    }
}

impl Default for QueuesConfig {
    fn default() -> Self {
        Self {
            prefix: "bull".to_string(),
            batch_pause_ms: 50,
            key_fetch_concurrency: 16,
        }
    }
}

// METRICS
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub timeout_ms: u64,
    pub history_len: usize,
}

impl MetricsConfig {
    fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            timeout_ms:  get_env("METRICS_TIMEOUT_MS", "3000")?,
            history_len: get_env("METRICS_HISTORY_LEN", "20")?,
        })
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 3000,
            history_len: 20,
        }
    }
}

// PUSH
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// 0 disables periodic pushes (subscribers still get the initial snapshot)
    pub interval_ms: u64,
    pub channel_capacity: usize,
}

impl PushConfig {
    fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            interval_ms:      get_env("PUSH_INTERVAL_MS", "0")?,
            channel_capacity: get_env("PUSH_CHAN_CAP", "16")?,
        })
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            interval_ms: 0,
            channel_capacity: 16,
        }
    }
}

// --- PRIVATE HELPER ---

fn get_env<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError> {
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    parse_value(key, &value)
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError {
        key: key.to_string(),
        value: value.to_string(),
    })
}
