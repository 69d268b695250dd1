//! Where a source file comes from or a document goes to: local disk, S3, or plain HTTP.
use crate::error::Error;
use crate::s3::S3ObjOps;
use crate::s3_operations::{self, local_metadata, object_metadata, ObjectMetadata, S3Uri};
use crate::settings::Settings;
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use reqwest::StatusCode;
use tracing::info;
use url::Url;
use zip::ZipArchive;

#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Local(PathBuf),
    S3(S3Uri),
    Http(Url),
}

impl Location {
    pub fn parse(location: &str) -> Result<Self> {
        if location.starts_with("s3://") {
            Ok(Self::S3(S3Uri::parse(location)?))
        } else if location.starts_with("http://") || location.starts_with("https://") {
            let url = Url::parse(location).map_err(|_| Error::InvalidUrl(location.to_string()))?;
            Ok(Self::Http(url))
        } else {
            Ok(Self::Local(PathBuf::from(location)))
        }
    }

    pub fn file_name(&self) -> String {
        match self {
            Self::Local(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            Self::S3(uri) => uri.file_name().to_string(),
            Self::Http(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// The href other documents should use to point at this location.
    pub fn href(&self, settings: &Settings) -> Result<String> {
        match self {
            Self::Local(path) => Ok(path.to_string_lossy().to_string()),
            Self::S3(uri) => uri.public_url(settings),
            Self::Http(url) => Ok(url.to_string()),
        }
    }

    /// Items can only be written under the safe prefix; local paths are unrestricted.
    pub fn verify_writable(&self, settings: &Settings) -> Result<()> {
        match self {
            Self::Local(_) => Ok(()),
            Self::S3(uri) => Ok(s3_operations::verify_safe_prefix(uri, &settings.safe_prefix)?),
            Self::Http(url) => Err(Error::InvalidUrl(url.to_string()).into()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::S3(uri) => write!(f, "{uri}"),
            Self::Http(url) => write!(f, "{url}"),
        }
    }
}

/// A readable local copy of a source file. Remote files live in a temporary file that is
/// removed when this is dropped.
pub enum LocalFile {
    Path(PathBuf),
    Temp(NamedTempFile),
}

impl LocalFile {
    pub fn path(&self) -> &Path {
        match self {
            Self::Path(path) => path,
            Self::Temp(file) => file.path(),
        }
    }
}

pub async fn fetch(provider: &impl S3ObjOps, location: &Location) -> Result<LocalFile> {
    match location {
        Location::Local(path) => {
            if !path.exists() {
                anyhow::bail!("File not found: {path:?}");
            }
            Ok(LocalFile::Path(path.clone()))
        }
        Location::S3(uri) => Ok(LocalFile::Temp(s3_operations::fetch_to_temp(provider, uri).await?)),
        Location::Http(url) => {
            let bytes = reqwest::get(url.clone())
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            let mut file = tempfile::Builder::new()
                .prefix("ras-stac-")
                .suffix(&format!("-{}", location.file_name()))
                .tempfile()?;
            std::io::Write::write_all(&mut file, &bytes)?;
            Ok(LocalFile::Temp(file))
        }
    }
}

/// Extracts `member` from the zip archive at `archive` into a temporary file.
pub async fn fetch_from_zip(
    provider: &impl S3ObjOps,
    archive: &Location,
    member: &str,
) -> Result<LocalFile> {
    let zip_file = fetch(provider, archive).await?;
    let member = member.to_string();
    let description = format!("{member} not found in {archive}");

    let extracted = tokio::task::spawn_blocking(move || -> Result<NamedTempFile> {
        let reader = fs::File::open(zip_file.path())?;
        let mut zip = ZipArchive::new(reader)?;
        let mut entry = zip.by_name(&member)?;

        let file_name = member.rsplit('/').next().unwrap_or(&member);
        let mut file = tempfile::Builder::new()
            .prefix("ras-stac-")
            .suffix(&format!("-{file_name}"))
            .tempfile()?;
        let byte_count = std::io::copy(&mut entry, &mut file)?;
        info!(%member, byte_count, "extracted from zip archive");
        Ok(file)
    })
    .await?
    .context(description)?;
    Ok(LocalFile::Temp(extracted))
}

pub async fn read_json<T: DeserializeOwned>(
    provider: &impl S3ObjOps,
    location: &Location,
) -> Result<T> {
    let value = match location {
        Location::Local(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Unable to read {path:?}"))?;
            serde_json::from_str(&content)?
        }
        Location::S3(uri) => {
            let bytes = s3_operations::get_bytes(provider, uri)
                .await
                .with_context(|| format!("Unable to read {uri}"))?;
            serde_json::from_slice(&bytes)?
        }
        Location::Http(url) => reqwest::get(url.clone())
            .await?
            .error_for_status()?
            .json()
            .await?,
    };
    Ok(value)
}

pub async fn write_json<T: Serialize>(
    provider: &impl S3ObjOps,
    location: &Location,
    value: &T,
) -> Result<()> {
    match location {
        Location::Local(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string_pretty(value)?;
            fs::write(path, content).with_context(|| format!("Unable to write {path:?}"))?;
        }
        Location::S3(uri) => s3_operations::put_json(provider, uri, value).await?,
        Location::Http(url) => return Err(Error::InvalidUrl(url.to_string()).into()),
    }
    info!(%location, "wrote json");
    Ok(())
}

/// Whether a document already exists at the location.
///
/// Only a definite "not found" is `false`; access or network failures are errors.
pub async fn exists(provider: &impl S3ObjOps, location: &Location) -> Result<bool> {
    match location {
        Location::Local(path) => {
            Ok(path.try_exists().with_context(|| format!("Unable to check {path:?}"))?)
        }
        Location::S3(uri) => match provider.head_object(&uri.bucket, &uri.key).await {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.downcast_ref::<Error>(), Some(Error::NotFound(_))) => Ok(false),
            Err(e) => Err(e.context(format!("Unable to check whether {uri} exists"))),
        },
        Location::Http(url) => {
            let response = reqwest::Client::new().head(url.clone()).send().await?;
            match response.status() {
                status if status.is_success() => Ok(true),
                StatusCode::NOT_FOUND => Ok(false),
                status => Err(anyhow!("Unable to check whether {url} exists: {status}")),
            }
        }
    }
}

pub async fn metadata(
    provider: &impl S3ObjOps,
    location: &Location,
    settings: &Settings,
) -> Result<ObjectMetadata> {
    match location {
        Location::Local(path) => local_metadata(path),
        Location::S3(uri) => object_metadata(provider, uri, settings).await,
        Location::Http(_) => Ok(ObjectMetadata::default()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::s3::memory::MemoryStore;
    use serde_json::{json, Value};
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// A zip archive holding `entries` as `(name, contents)`.
    pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, contents) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_parse() {
        assert!(matches!(
            Location::parse("s3://bucket/stac/item.json").unwrap(),
            Location::S3(_)
        ));
        assert!(matches!(
            Location::parse("https://bucket.s3.amazonaws.com/stac/item.json").unwrap(),
            Location::Http(_)
        ));
        assert_eq!(
            Location::parse("/tmp/item.json").unwrap(),
            Location::Local(PathBuf::from("/tmp/item.json"))
        );
        assert!(Location::parse("s3://bucket").is_err());
    }

    #[test]
    fn test_file_name_and_href() {
        let settings = Settings::default();
        let s3 = Location::parse("s3://bucket/stac/Muncie.json").unwrap();
        assert_eq!(s3.file_name(), "Muncie.json");
        assert_eq!(
            s3.href(&settings).unwrap(),
            "https://bucket.s3.amazonaws.com/stac/Muncie.json"
        );

        let http = Location::parse("https://example.com/a/b/Muncie.json").unwrap();
        assert_eq!(http.file_name(), "Muncie.json");
        assert_eq!(http.href(&settings).unwrap(), "https://example.com/a/b/Muncie.json");
    }

    #[test]
    fn test_verify_writable() {
        let settings = Settings::default();
        assert!(Location::parse("out/item.json").unwrap().verify_writable(&settings).is_ok());
        assert!(Location::parse("s3://b/stac/item.json").unwrap().verify_writable(&settings).is_ok());
        assert!(Location::parse("s3://b/data/item.json").unwrap().verify_writable(&settings).is_err());
        assert!(Location::parse("https://x.org/item.json").unwrap().verify_writable(&settings).is_err());
    }

    #[tokio::test]
    async fn test_json_round_trip_local_and_s3() {
        let store = MemoryStore::default();
        let dir = tempfile::tempdir().unwrap();
        let doc = json!({"id": "Muncie", "links": []});

        let local = Location::Local(dir.path().join("nested/item.json"));
        assert!(!exists(&store, &local).await.unwrap());
        write_json(&store, &local, &doc).await.unwrap();
        assert!(exists(&store, &local).await.unwrap());
        let read: Value = read_json(&store, &local).await.unwrap();
        assert_eq!(read, doc);

        let remote = Location::parse("s3://bucket/stac/item.json").unwrap();
        assert!(!exists(&store, &remote).await.unwrap());
        write_json(&store, &remote, &doc).await.unwrap();
        assert!(exists(&store, &remote).await.unwrap());
        let read: Value = read_json(&store, &remote).await.unwrap();
        assert_eq!(read, doc);
    }

    #[tokio::test]
    async fn test_exists_propagates_access_errors() {
        let store = MemoryStore::default();
        store.insert("bucket", "stac/catalog.json", b"{}");
        store.make_unavailable("bucket", "stac/catalog.json");

        let location = Location::parse("s3://bucket/stac/catalog.json").unwrap();
        assert!(exists(&store, &location).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch() {
        let store = MemoryStore::default();
        store.insert("bucket", "model/Muncie.p04.hdf", b"plan");

        let remote = Location::parse("s3://bucket/model/Muncie.p04.hdf").unwrap();
        let file = fetch(&store, &remote).await.unwrap();
        assert_eq!(fs::read(file.path()).unwrap(), b"plan");

        let missing = Location::Local(PathBuf::from("/definitely/not/here.hdf"));
        assert!(fetch(&store, &missing).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_from_zip() {
        let store = MemoryStore::default();
        let archive = zip_bytes(&[
            ("Muncie.prj", b"Proj Title=Muncie".as_slice()),
            ("Muncie/Muncie.g05.hdf", b"geometry".as_slice()),
        ]);
        store.insert("bucket", "models/Muncie.zip", &archive);
        let location = Location::parse("s3://bucket/models/Muncie.zip").unwrap();

        let file = fetch_from_zip(&store, &location, "Muncie/Muncie.g05.hdf").await.unwrap();
        assert_eq!(fs::read(file.path()).unwrap(), b"geometry");
        assert!(file.path().to_string_lossy().ends_with("-Muncie.g05.hdf"));

        let err = fetch_from_zip(&store, &location, "Muncie.g01.hdf").await.unwrap_err();
        assert_eq!(err.to_string(), "Muncie.g01.hdf not found in s3://bucket/models/Muncie.zip");
    }
}
