use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Header set by the authentication gateway with the numeric user id.
    pub user_id_header: String,
    pub cors_allow_any: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    S3,
    Memory,
}

impl FromStr for StorageBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" | "minio" => Ok(StorageBackendKind::S3),
            "memory" => Ok(StorageBackendKind::Memory),
            other => bail!("unknown storage backend: {}", other),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub backend: StorageBackendKind,
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
    pub operation_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_upload_bytes: 104_857_600, // 100MB
            user_id_header: "x-user-id".to_string(),
            cors_allow_any: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackendKind::S3,
            bucket: "user-files".to_string(),
            endpoint: None,
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            force_path_style: true,
            operation_timeout_secs: 30,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let config = Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or(defaults.server.host),
                port: parse_var("PORT", defaults.server.port)?,
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", defaults.server.max_upload_bytes)?,
                user_id_header: env::var("USER_ID_HEADER")
                    .map(|h| h.to_ascii_lowercase())
                    .unwrap_or(defaults.server.user_id_header),
                cors_allow_any: parse_var("CORS_ALLOW_ANY", defaults.server.cors_allow_any)?,
            },
            storage: StorageConfig {
                backend: parse_var("STORAGE_BACKEND", defaults.storage.backend)?,
                bucket: env::var("STORAGE_BUCKET").unwrap_or(defaults.storage.bucket),
                endpoint: optional_var("S3_ENDPOINT"),
                region: env::var("S3_REGION").unwrap_or(defaults.storage.region),
                access_key_id: optional_var("S3_ACCESS_KEY_ID"),
                secret_access_key: optional_var("S3_SECRET_ACCESS_KEY"),
                force_path_style: parse_var("S3_FORCE_PATH_STYLE", defaults.storage.force_path_style)?,
                operation_timeout_secs: parse_var(
                    "S3_OPERATION_TIMEOUT_SECS",
                    defaults.storage.operation_timeout_secs,
                )?,
            },
        };

        config.storage.validate()?;
        Ok(config)
    }
}

impl StorageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bucket.len() < 3 || self.bucket.len() > 63 {
            bail!("STORAGE_BUCKET must be 3-63 characters long");
        }

        match (&self.access_key_id, &self.secret_access_key) {
            (Some(_), None) => bail!("S3_SECRET_ACCESS_KEY is required when S3_ACCESS_KEY_ID is set"),
            (None, Some(_)) => bail!("S3_ACCESS_KEY_ID is required when S3_SECRET_ACCESS_KEY is set"),
            _ => {}
        }

        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                bail!("S3_ENDPOINT must start with http:// or https://");
            }
        }

        Ok(())
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("invalid value for {}: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, StorageBackendKind::S3);
        config.storage.validate().unwrap();
    }

    #[test]
    fn parses_backend_names() {
        assert_eq!("memory".parse::<StorageBackendKind>().unwrap(), StorageBackendKind::Memory);
        assert_eq!("MinIO".parse::<StorageBackendKind>().unwrap(), StorageBackendKind::S3);
        assert!("disk".parse::<StorageBackendKind>().is_err());
    }

    #[test]
    fn rejects_half_configured_credentials() {
        let storage = StorageConfig {
            access_key_id: Some("minioadmin".to_string()),
            ..StorageConfig::default()
        };
        assert!(storage.validate().is_err());
    }

    #[test]
    fn rejects_endpoint_without_scheme() {
        let storage = StorageConfig {
            endpoint: Some("localhost:9000".to_string()),
            ..StorageConfig::default()
        };
        assert!(storage.validate().is_err());
    }
}
