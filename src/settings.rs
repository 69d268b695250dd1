//! Runtime configuration, read from an optional TOML file and overridden by the environment.
use crate::error::Error;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_SAFE_PREFIX: &str = "stac";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub aws_profile: Option<String>,
    pub aws_region: String,
    pub minio_mode: bool,
    /// First key segment every written item must live under.
    pub safe_prefix: String,
    pub minio: MinioSettings,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct MinioSettings {
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            aws_profile: None,
            aws_region: DEFAULT_REGION.to_string(),
            minio_mode: false,
            safe_prefix: DEFAULT_SAFE_PREFIX.to_string(),
            minio: MinioSettings::default(),
        }
    }
}

impl Settings {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Unable to read settings file {path:?}"))?;
        let settings: Self = toml::from_str(&content)?;
        Ok(settings)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn from_template(table: &toml::Table) -> Result<Self> {
        let settings: Self = toml::from_str(&table.to_string())?;
        Ok(settings)
    }

    /// Settings file (if any), then process environment, then the `--minio` flag.
    pub fn load(path: Option<&Path>, minio_mode: bool) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::read(path)?,
            None => Self::default(),
        };
        settings.apply_env(|name| std::env::var(name).ok());
        settings.minio_mode |= minio_mode;
        Ok(settings)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(profile) = lookup("AWS_PROFILE") {
            self.aws_profile = Some(profile);
        }
        if let Some(region) = lookup("AWS_REGION") {
            self.aws_region = region;
        }
        if let Some(endpoint) = lookup("MINIO_S3_ENDPOINT") {
            self.minio.endpoint = Some(endpoint);
        }
        if let Some(key) = lookup("MINIO_ACCESS_KEY_ID") {
            self.minio.access_key_id = Some(key);
        }
        if let Some(secret) = lookup("MINIO_SECRET_ACCESS_KEY") {
            self.minio.secret_access_key = Some(secret);
        }
        if let Some(prefix) = lookup("RAS_STAC_SAFE_PREFIX") {
            self.safe_prefix = prefix;
        }
    }

    /// MinIO endpoint without a trailing slash.
    pub fn minio_endpoint(&self) -> Result<&str, Error> {
        self.minio
            .endpoint
            .as_deref()
            .map(|e| e.trim_end_matches('/'))
            .ok_or(Error::MinioSetting("MINIO_S3_ENDPOINT"))
    }

    pub fn minio_credentials(&self) -> Result<(&str, &str), Error> {
        let key = self
            .minio
            .access_key_id
            .as_deref()
            .ok_or(Error::MinioSetting("MINIO_ACCESS_KEY_ID"))?;
        let secret = self
            .minio
            .secret_access_key
            .as_deref()
            .ok_or(Error::MinioSetting("MINIO_SECRET_ACCESS_KEY"))?;
        Ok((key, secret))
    }
}
