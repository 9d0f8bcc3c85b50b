use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;

use crate::config::Storage;
use crate::error::PublishError;
use crate::publisher::AssetHost;

/// S3-compatible asset host for item photos.
pub struct ObjectStorage {
    pub client: Client,
    bucket: String,
    service: String,
}

impl ObjectStorage {
    /// Returns `None` when the key pair or bucket is missing, which leaves
    /// image upload disabled rather than failing start-up.
    pub async fn from_storage(storage: &Storage) -> Option<Self> {
        if !storage.is_configured() {
            tracing::warn!("asset host credentials not configured, image upload disabled");
            return None;
        }
        Some(ObjectStorage::new(storage).await)
    }

    pub async fn new(storage: &Storage) -> Self {
        let credentials = Credentials::new(
            &storage.aws_access_key_id,
            &storage.aws_secret_access_key,
            None,
            None,
            "config",
        );

        let mut loader = aws_config::from_env().credentials_provider(credentials);
        if !storage.aws_region.is_empty() {
            loader = loader.region(aws_config::Region::new(storage.aws_region.clone()));
        }
        if !storage.aws_endpoint_url_s3.is_empty() {
            loader = loader.endpoint_url(&storage.aws_endpoint_url_s3);
        }
        let config = loader.load().await;

        Self {
            client: Client::new(&config),
            bucket: storage.bucket.clone(),
            service: storage.service.clone(),
        }
    }
}

#[async_trait]
impl AssetHost for ObjectStorage {
    async fn put_image(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, PublishError> {
        tracing::info!("uploading image for key: {}", key);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(bytes.into())
            .send()
            .await
            .map_err(|e| PublishError::S3Error(Box::new(e)))?;

        Ok(crate::get_s3_url(&self.service, &self.bucket, key))
    }
}
