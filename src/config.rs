use crate::error::{BadEnvVarSnafu, ParseNumberSnafu, RosterResult};
use dotenvy::var;
use snafu::ResultExt;
use sqlx::sqlite::SqliteConnectOptions;
use std::{path::PathBuf, sync::Arc, time::Duration};

const DEFAULT_SERVER_IP: &str = "127.0.0.1:8080";
const DEFAULT_QR_CODE_DIR: &str = "static/qrcodes";
const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
//how long a writer queues behind another before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
pub struct RuntimeConfiguration {
    db_config: Arc<DbConfig>,
    storage_config: Arc<StorageConfig>,
    server_ip: String,
}

impl RuntimeConfiguration {
    pub fn new() -> RosterResult<Self> {
        Ok(Self {
            db_config: Arc::new(DbConfig::new()?),
            storage_config: Arc::new(StorageConfig::new()?),
            server_ip: optional_env_var("ROSTER_SERVER_IP")
                .unwrap_or_else(|| DEFAULT_SERVER_IP.to_string()),
        })
    }

    pub fn from_parts(db_config: DbConfig, storage_config: StorageConfig) -> Self {
        Self {
            db_config: Arc::new(db_config),
            storage_config: Arc::new(storage_config),
            server_ip: DEFAULT_SERVER_IP.to_string(),
        }
    }

    pub fn db_config(&self) -> Arc<DbConfig> {
        self.db_config.clone()
    }

    pub fn storage_config(&self) -> Arc<StorageConfig> {
        self.storage_config.clone()
    }

    pub fn server_ip(&self) -> &str {
        &self.server_ip
    }
}

#[derive(Debug)]
pub struct DbConfig {
    pub path: String,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn new() -> RosterResult<Self> {
        Ok(Self {
            path: var("DB_PATH").context(BadEnvVarSnafu { name: "DB_PATH" })?,
            max_connections: parse_env_var("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
        })
    }

    pub fn connect_options(&self) -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT)
    }
}

#[derive(Debug)]
pub struct StorageConfig {
    pub qr_code_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub max_upload_bytes: usize,
}

impl StorageConfig {
    pub fn new() -> RosterResult<Self> {
        Ok(Self {
            qr_code_dir: optional_env_var("QR_CODE_DIR")
                .unwrap_or_else(|| DEFAULT_QR_CODE_DIR.to_string())
                .into(),
            ffmpeg_path: optional_env_var("FFMPEG_PATH")
                .unwrap_or_else(|| DEFAULT_FFMPEG_PATH.to_string())
                .into(),
            max_upload_bytes: parse_env_var("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }
}

fn optional_env_var(name: &'static str) -> Option<String> {
    var(name).ok().filter(|value| !value.is_empty())
}

fn parse_env_var<T: std::str::FromStr<Err = std::num::ParseIntError>>(
    name: &'static str,
    default: T,
) -> RosterResult<T> {
    match optional_env_var(name) {
        Some(value) => value.trim().parse().context(ParseNumberSnafu { name }),
        None => Ok(default),
    }
}
