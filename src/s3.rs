//! Utility functions for creating s3 clients and the object operations the pipeline needs
use crate::error::Error;
use crate::settings::Settings;
use anyhow::Result;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::operation::get_object::GetObjectOutput;
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
use aws_sdk_s3::operation::put_object::PutObjectOutput;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

pub async fn client_from_profile(profile_name: Option<&str>, region: &str) -> Client {
    let mut loader = aws_config::from_env();
    if let Some(profile_name) = profile_name {
        loader = loader.profile_name(profile_name);
    }
    let base_config = loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&base_config)
        .region(Region::new(region.to_string()))
        .build();

    Client::from_conf(s3_config)
}

/// Path-style client with static credentials against a MinIO endpoint.
pub async fn minio_client(settings: &Settings) -> Result<Client> {
    let endpoint = settings.minio_endpoint()?;
    let (key, secret) = settings.minio_credentials()?;
    info!(endpoint, "minio_mode | using minio endpoint");

    let base_config = aws_config::from_env().load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&base_config)
        .region(Region::new(settings.aws_region.clone()))
        .endpoint_url(endpoint)
        .credentials_provider(Credentials::new(key, secret, None, None, "minio"))
        .force_path_style(true)
        .build();

    Ok(Client::from_conf(s3_config))
}

pub async fn client_from_settings(settings: &Settings) -> Result<Client> {
    if settings.minio_mode {
        minio_client(settings).await
    } else {
        Ok(client_from_profile(settings.aws_profile.as_deref(), &settings.aws_region).await)
    }
}

pub trait S3ObjOps {
    async fn head_object(self: &Self, bucket: &str, key: &str) -> Result<HeadObjectOutput>;

    async fn get_object(self: &Self, bucket: &str, key: &str) -> Result<GetObjectOutput>;

    async fn put_object(
        self: &Self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<PutObjectOutput>;

    /// One page of a listing; pass the previous page's continuation token to get the next.
    async fn list_objects(
        self: &Self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ListObjectsV2Output>;
}

pub struct Storage {
    client: Client,
}

impl Storage {
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let client = client_from_settings(settings).await?;
        Ok(Self { client })
    }
}

impl S3ObjOps for Storage {
    /// A missing key comes back as [`Error::NotFound`]; any other failure is passed on.
    async fn head_object(self: &Self, bucket: &str, key: &str) -> Result<HeadObjectOutput> {
        let result = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;
        match result {
            Ok(head) => Ok(head),
            Err(e) => match e.into_service_error() {
                err if err.is_not_found() => {
                    Err(Error::NotFound(format!("s3://{bucket}/{key}")).into())
                }
                err => Err(err.into()),
            },
        }
    }

    async fn get_object(self: &Self, bucket: &str, key: &str) -> Result<GetObjectOutput> {
        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;
        Ok(object)
    }

    async fn put_object(
        self: &Self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<PutObjectOutput> {
        debug!(bucket, key, bytes = body.len(), "put object");
        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await?;
        Ok(output)
    }

    async fn list_objects(
        self: &Self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ListObjectsV2Output> {
        let page = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation_token)
            .send()
            .await?;
        Ok(page)
    }
}
