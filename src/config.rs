use std::{env, fs, net::SocketAddr, str::FromStr};

use serde::{Deserialize, Serialize};
use storage::StorageConfig;

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub http: Http,
    #[serde(default)]
    pub srt: Srt,
    #[serde(default)]
    pub auth: Auth,
    #[serde(default)]
    pub log: Log,
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub buckets: Buckets,
    #[serde(default)]
    pub transcode: Transcode,
    #[serde(default)]
    pub webhook: Webhook,
    /// Base URL viewers use to reach the object store (HLS playback).
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Http {
    #[serde(default = "default_http_listen")]
    pub listen: SocketAddr,
    #[serde(default)]
    pub cors: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Srt {
    #[serde(default = "default_srt_listen")]
    pub listen: SocketAddr,
    /// SRT receive latency in milliseconds.
    #[serde(default = "default_srt_latency")]
    pub latency: u64,
    /// Address advertised to broadcasters in `srt://` publish URLs.
    #[serde(default)]
    pub public_addr: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Auth {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_internal_api_key")]
    pub internal_api_key: String,
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
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Transcode {
    /// Local scratch directory for encoder output before upload.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Webhook {
    #[serde(default = "default_recording_service_url")]
    pub recording_service_url: String,
}

fn default_http_listen() -> SocketAddr {
    SocketAddr::from_str(&format!(
        "0.0.0.0:{}",
        env::var("PORT").unwrap_or(String::from("8082"))
    ))
    .expect("invalid listen address")
}

fn default_srt_listen() -> SocketAddr {
    SocketAddr::from_str(&format!(
        "0.0.0.0:{}",
        env::var("SRT_PORT").unwrap_or(String::from("6000"))
    ))
    .expect("invalid srt listen address")
}

fn default_srt_latency() -> u64 {
    env::var("SRT_LATENCY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(2000)
}

fn default_jwt_secret() -> String {
    env::var("JWT_SECRET").unwrap_or_default()
}

fn default_internal_api_key() -> String {
    env::var("INTERNAL_API_KEY").unwrap_or_default()
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

fn default_scratch_dir() -> String {
    env::var("SCRATCH_DIR").unwrap_or_else(|_| "/tmp/hls-output".to_string())
}

fn default_recording_service_url() -> String {
    env::var("RECORDING_SERVICE_URL").unwrap_or_else(|_| "http://recorderd:8083".to_string())
}

fn default_public_base_url() -> String {
    env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:9000".to_string())
}

impl Default for Http {
    fn default() -> Self {
        Self {
            listen: default_http_listen(),
            cors: Default::default(),
        }
    }
}

impl Default for Srt {
    fn default() -> Self {
        Self {
            listen: default_srt_listen(),
            latency: default_srt_latency(),
            public_addr: None,
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
        }
    }
}

impl Default for Transcode {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
        }
    }
}

impl Default for Webhook {
    fn default() -> Self {
        Self {
            recording_service_url: default_recording_service_url(),
        }
    }
}

impl Config {
    pub fn parse(path: Option<String>) -> Self {
        let result = fs::read_to_string(path.unwrap_or(String::from("streamd.toml")))
            .or(fs::read_to_string("/etc/streamd/streamd.toml"))
            .unwrap_or("".to_string());
        toml::from_str(result.as_str()).expect("config parse error")
    }

    /// Address broadcasters should point `srt://` URLs at.
    pub fn srt_public_addr(&self) -> String {
        self.srt
            .public_addr
            .clone()
            .unwrap_or_else(|| self.srt.listen.to_string())
    }
}
