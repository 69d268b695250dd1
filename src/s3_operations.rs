use crate::error::Error;
use crate::s3::S3ObjOps;
use crate::settings::Settings;
use anyhow::{anyhow, Context, Result};
use aws_sdk_s3::primitives::DateTimeFormat;
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

const AWS_PUBLIC_HOST: &str = "s3.amazonaws.com";
const DEFAULT_STORAGE_TIER: &str = "STANDARD";

lazy_static! {
    static ref AWS_PUBLIC_URL: Regex =
        Regex::new(r"^https://(?<bucket>[^/]+)\.s3\.amazonaws\.com/(?<key>.+)$")
            .expect("Regex pattern should always compile");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Uri {
    pub bucket: String,
    pub key: String,
}

impl S3Uri {
    /// Splits `s3://bucket/key`; a bucket with no key is rejected.
    pub fn parse(s3_path: &str) -> Result<Self, Error> {
        let rest = s3_path
            .strip_prefix("s3://")
            .ok_or_else(|| Error::NotS3Path(s3_path.to_string()))?;
        match rest.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok(Self {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            _ => Err(Error::MissingKey(s3_path.to_string())),
        }
    }

    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    pub fn public_url(&self, settings: &Settings) -> Result<String> {
        if settings.minio_mode {
            let endpoint = settings.minio_endpoint()?;
            debug!(uri = %self, "minio_mode | using minio endpoint for s3 url conversion");
            Ok(format!("{endpoint}/{}/{}", self.bucket, self.key))
        } else {
            Ok(format!("https://{}.{AWS_PUBLIC_HOST}/{}", self.bucket, self.key))
        }
    }

    /// Inverse of [`S3Uri::public_url`].
    pub fn from_public_url(url: &str, settings: &Settings) -> Result<Self> {
        if settings.minio_mode {
            let endpoint = settings.minio_endpoint()?;
            let path = url
                .strip_prefix(endpoint)
                .ok_or_else(|| Error::InvalidUrl(url.to_string()))?;
            return Ok(Self::parse(&format!("s3://{}", path.trim_start_matches('/')))?);
        }

        let captures = AWS_PUBLIC_URL
            .captures(url)
            .ok_or_else(|| Error::InvalidUrl(url.to_string()))?;
        let (_, [bucket, key]) = captures.extract();

        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

impl fmt::Display for S3Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Converts `s3://` to its public URL, or a public URL back to `s3://`.
pub fn s3_path_public_url_converter(url: &str, settings: &Settings) -> Result<String> {
    if url.starts_with("s3://") {
        S3Uri::parse(url)?.public_url(settings)
    } else if url.starts_with("http") {
        Ok(S3Uri::from_public_url(url, settings)?.to_string())
    } else {
        Err(Error::InvalidUrl(url.to_string()).into())
    }
}

/// Items may only be written under `s3://<bucket>/<safe_prefix>/...`.
pub fn verify_safe_prefix(uri: &S3Uri, safe_prefix: &str) -> Result<(), Error> {
    let first = uri.key.split('/').next().unwrap_or_default();
    debug!(key = %uri.key, first, "checking safe prefix");
    if first == safe_prefix {
        Ok(())
    } else {
        Err(Error::UnsafePrefix {
            expected: safe_prefix.to_string(),
            path: uri.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectMetadata {
    #[serde(rename = "file:size", skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(rename = "storage:platform", skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(rename = "storage:region", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(rename = "storage:tier", skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

impl ObjectMetadata {
    pub fn to_fields(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            other => Err(anyhow!("Object metadata serialized to {other}")),
        }
    }
}

pub async fn object_metadata(
    provider: &impl S3ObjOps,
    uri: &S3Uri,
    settings: &Settings,
) -> Result<ObjectMetadata> {
    let head = provider
        .head_object(&uri.bucket, &uri.key)
        .await
        .with_context(|| format!("Unable to access {uri}; check that the key exists and you have access"))?;

    let last_modified = head
        .last_modified()
        .map(|t| t.fmt(DateTimeFormat::DateTime))
        .transpose()?;
    let platform = if settings.minio_mode { "MinIO" } else { "AWS" };

    Ok(ObjectMetadata {
        size: head.content_length(),
        e_tag: head.e_tag().map(|tag| tag.trim_matches('"').to_string()),
        last_modified,
        platform: Some(platform.to_string()),
        region: Some(settings.aws_region.clone()),
        tier: Some(
            head.storage_class()
                .map_or(DEFAULT_STORAGE_TIER, |class| class.as_str())
                .to_string(),
        ),
    })
}

pub fn local_metadata(path: &Path) -> Result<ObjectMetadata> {
    let meta = std::fs::metadata(path).with_context(|| format!("Unable to stat {path:?}"))?;
    let last_modified = meta
        .modified()
        .ok()
        .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

    Ok(ObjectMetadata {
        size: Some(meta.len() as i64),
        last_modified,
        ..Default::default()
    })
}

/// Streams an object into a temporary file that keeps the object's file name as suffix,
/// so readers that sniff extensions still work.
pub async fn fetch_to_temp(provider: &impl S3ObjOps, uri: &S3Uri) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("ras-stac-")
        .suffix(&format!("-{}", uri.file_name()))
        .tempfile()?;

    let mut object = provider.get_object(&uri.bucket, &uri.key).await?;

    let mut byte_count = 0_usize;
    while let Some(bytes) = object.body.try_next().await? {
        file.write_all(&bytes)?;
        byte_count += bytes.len();
    }
    file.flush()?;

    info!(%uri, byte_count, "downloaded to temporary file");
    Ok(file)
}

pub async fn get_bytes(provider: &impl S3ObjOps, uri: &S3Uri) -> Result<Vec<u8>> {
    let object = provider.get_object(&uri.bucket, &uri.key).await?;
    let bytes = object.body.collect().await?.into_bytes();
    Ok(bytes.to_vec())
}

pub async fn put_json<T: Serialize>(provider: &impl S3ObjOps, uri: &S3Uri, value: &T) -> Result<()> {
    let body = serde_json::to_vec_pretty(value)?;
    provider
        .put_object(&uri.bucket, &uri.key, body, "application/json")
        .await
        .with_context(|| format!("Unable to write {uri}"))?;
    Ok(())
}

async fn list_filtered<F>(
    provider: &impl S3ObjOps,
    bucket: &str,
    prefix: &str,
    keep: F,
) -> Result<Vec<String>>
where
    F: Fn(&str) -> bool,
{
    let mut keys = vec![];
    let mut token = None;
    loop {
        let page = provider.list_objects(bucket, prefix, token).await?;
        keys.extend(
            page.contents()
                .iter()
                .filter_map(|obj| obj.key())
                .filter(|key| keep(key))
                .map(str::to_string),
        );
        match page.next_continuation_token() {
            Some(next) => token = Some(next.to_string()),
            None => break,
        }
    }
    Ok(keys)
}

pub async fn list_keys(
    provider: &impl S3ObjOps,
    bucket: &str,
    prefix: &str,
    suffix: &str,
) -> Result<Vec<String>> {
    list_filtered(provider, bucket, prefix, |key| key.ends_with(suffix)).await
}

/// Like [`list_keys`], with `*` in the prefix matching any run of characters.
pub async fn list_keys_regex(
    provider: &impl S3ObjOps,
    bucket: &str,
    prefix_includes: &str,
    suffix: &str,
) -> Result<Vec<String>> {
    let pattern = prefix_includes
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    let re = Regex::new(&format!("^{pattern}"))?;
    // The listing itself can only narrow on the literal part before the first wildcard.
    let literal = prefix_includes.split('*').next().unwrap_or_default();

    list_filtered(provider, bucket, literal, |key| {
        re.is_match(key) && key.ends_with(suffix)
    })
    .await
}

/// Files directly under `prefix`, skipping anything in deeper folders, as `s3://` URIs.
pub async fn list_model_files(
    provider: &impl S3ObjOps,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<String>> {
    let prefix = match prefix {
        "" => String::new(),
        p if p.ends_with('/') => p.to_string(),
        p => format!("{p}/"),
    };
    let keys = list_filtered(provider, bucket, &prefix, |key| {
        let rest = &key[prefix.len()..];
        !rest.is_empty() && !rest.contains('/')
    })
    .await?;
    Ok(keys.into_iter().map(|k| format!("s3://{bucket}/{k}")).collect())
}
