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
    pub auth: Auth,
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
    #[serde(default = "default_recordings_bucket")]
    pub recordings: String,
    #[serde(default = "default_videos_bucket")]
    pub videos: String,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct Auth {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_internal_api_key")]
    pub internal_api_key: String,
}

fn default_http_listen() -> SocketAddr {
    SocketAddr::from_str(&format!(
        "0.0.0.0:{}",
        env::var("PORT").unwrap_or(String::from("8084"))
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

fn default_recordings_bucket() -> String {
    env::var("MINIO_BUCKET_RECORDINGS").unwrap_or_else(|_| "recordings".to_string())
}

fn default_videos_bucket() -> String {
    env::var("MINIO_BUCKET_VIDEOS").unwrap_or_else(|_| "vod-videos".to_string())
}

fn default_jwt_secret() -> String {
    env::var("JWT_SECRET").unwrap_or_default()
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
            recordings: default_recordings_bucket(),
            videos: default_videos_bucket(),
        }
    }
}

impl Config {
    pub fn parse(path: Option<String>) -> Self {
        let result = fs::read_to_string(path.unwrap_or(String::from("vodd.toml")))
            .or(fs::read_to_string("/etc/vodd/vodd.toml"))
            .unwrap_or("".to_string());
        toml::from_str(result.as_str()).expect("config parse error")
    }
}
