use std::{env, fs, net::SocketAddr, str::FromStr};

use serde::{Deserialize, Serialize};
use storage::StorageConfig;

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub log: Log,
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub buckets: Buckets,
    #[serde(default)]
    pub services: Services,
    #[serde(default)]
    pub recording: Recording,
    #[serde(default = "default_internal_api_key")]
    pub internal_api_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Http {
    #[serde(default = "default_http_listen")]
    pub listen: SocketAddr,
    #[serde(default)]
    pub cors: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Log {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Database {
    #[serde(default = "default_database_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Buckets {
    #[serde(default = "default_live_bucket")]
    pub live: String,
    #[serde(default = "default_recordings_bucket")]
    pub recordings: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Services {
    #[serde(default = "default_stream_service_url")]
    pub stream_service_url: String,
    #[serde(default = "default_vod_service_url")]
    pub vod_service_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Recording {
    /// Local working directory for downloads and concat output.
    #[serde(default = "default_recordings_path")]
    pub scratch_dir: String,
    /// Live-stream snapshot poll interval in seconds, the safety net for
    /// lost `stopped` webhooks.
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval: u64,
}

fn default_http_listen() -> SocketAddr {
    SocketAddr::from_str(&format!(
        "0.0.0.0:{}",
        env::var("PORT").unwrap_or(String::from("8083"))
    ))
    .expect("invalid listen address")
}

fn default_log_level() -> String {
    env::var("LOG_LEVEL").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "debug".to_string()
        } else {
            "info".to_string()
        }
    })
}

fn default_database_url() -> String {
    env::var("DATABASE_URL").unwrap_or_default()
}

fn default_live_bucket() -> String {
    env::var("MINIO_BUCKET_LIVE").unwrap_or_else(|_| "live-streams".to_string())
}

fn default_recordings_bucket() -> String {
    env::var("MINIO_BUCKET_RECORDINGS").unwrap_or_else(|_| "recordings".to_string())
}

fn default_stream_service_url() -> String {
    env::var("STREAM_SERVICE_URL").unwrap_or_else(|_| "http://streamd:8082".to_string())
}

fn default_vod_service_url() -> String {
    env::var("VOD_SERVICE_URL").unwrap_or_else(|_| "http://vodd:8084".to_string())
}

fn default_recordings_path() -> String {
    env::var("RECORDINGS_PATH").unwrap_or_else(|_| "/tmp/recordings".to_string())
}

fn default_monitor_interval() -> u64 {
    env::var("MONITOR_INTERVAL")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10)
}

fn default_internal_api_key() -> String {
    env::var("INTERNAL_API_KEY").unwrap_or_default()
}

impl Default for Http {
    fn default() -> Self {
        Self {
            listen: default_http_listen(),
            cors: Default::default(),
        }
    }
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

impl Default for Buckets {
    fn default() -> Self {
        Self {
            live: default_live_bucket(),
            recordings: default_recordings_bucket(),
        }
    }
}

impl Default for Services {
    fn default() -> Self {
        Self {
            stream_service_url: default_stream_service_url(),
            vod_service_url: default_vod_service_url(),
        }
    }
}

impl Default for Recording {
    fn default() -> Self {
        Self {
            scratch_dir: default_recordings_path(),
            monitor_interval: default_monitor_interval(),
        }
    }
}

impl Config {
    pub fn parse(path: Option<String>) -> Self {
        let result = fs::read_to_string(path.unwrap_or(String::from("recorderd.toml")))
            .or(fs::read_to_string("/etc/recorderd/recorderd.toml"))
            .unwrap_or("".to_string());
        toml::from_str(result.as_str()).expect("config parse error")
    }
}
