use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("s3 path does not start with s3://: {0}")]
    NotS3Path(String),

    #[error("s3 path contains bucket only, no key: {0}")]
    MissingKey(String),

    #[error("prefix must begin with {expected}/, got {path}")]
    UnsafePrefix { expected: String, path: String },

    #[error("invalid url format: {0}")]
    InvalidUrl(String),

    #[error("RAS {kind} path does not match pattern {pattern}: {path}")]
    RasFileName {
        kind: &'static str,
        pattern: String,
        path: String,
    },

    #[error("asset kind must be one of: mannings, lulc, topo, other; got {0}")]
    AssetKind(String),

    #[error("unable to parse RAS datetime: {0}")]
    Datetime(String),

    #[error("unable to parse duration: {0}")]
    Duration(String),

    #[error("no datetime found for item {0}")]
    MissingDatetime(String),

    #[error("no geometry found for item {0}")]
    MissingGeometry(String),

    #[error("could not find properties while creating item {0}")]
    MissingProperties(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("minio mode requires {0} to be set")]
    MinioSetting(&'static str),
}
