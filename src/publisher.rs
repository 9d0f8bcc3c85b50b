//! Item photo publishing.
//!
//! Photos are stored on the asset host under `<folder>/<public id>.jpg`,
//! where the public id is the sanitized item id plus the upload time in epoch
//! milliseconds. The URL handed back to the client is composed from the
//! configured public prefix rather than taken from the host, so images can be
//! served through a CDN alias that differs from the upload endpoint. The
//! host's own URL is only used when that composition comes out empty.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use regex::Regex;

use crate::config::Storage;
use crate::error::PublishError;

const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

static REPEATED_SLASHES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([^:])//+").unwrap()
});

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AssetHost: Send + Sync {
    /// Stores `bytes` under `key` and returns the host's own URL for it.
    async fn put_image(
        &self,
        key: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, PublishError>;
}

#[derive(Clone)]
pub struct ImagePublisher {
    host: Option<Arc<dyn AssetHost>>,
    prefix: String,
    folder: String,
}

impl ImagePublisher {
    /// `host` is `None` when the asset host credentials are not configured;
    /// every publish then fails with [`PublishError::NotConfigured`].
    pub fn new(host: Option<Arc<dyn AssetHost>>, storage: &Storage) -> Self {
        Self {
            host,
            prefix: storage.prefix.clone(),
            folder: storage.folder.clone(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.host.is_some()
    }

    pub async fn publish(
        &self,
        org: &str,
        item_id: &str,
        image_data: &str,
    ) -> Result<String, PublishError> {
        let epoch_ms = chrono::Utc::now().timestamp_millis();
        self.publish_at(org, item_id, image_data, epoch_ms).await
    }

    pub async fn publish_at(
        &self,
        org: &str,
        item_id: &str,
        image_data: &str,
        epoch_ms: i64,
    ) -> Result<String, PublishError> {
        let host = self.host.as_ref().ok_or(PublishError::NotConfigured)?;

        let filename = format!("{}.jpg", public_id(item_id, epoch_ms));
        let key = object_key(&self.folder, &filename);
        let (content_type, bytes) = decode_image_data(image_data)?;

        tracing::info!(org, key = %key, bytes = bytes.len(), "publishing item image");
        let host_url = host.put_image(&key, &content_type, bytes).await?;

        let url = build_image_url(&self.prefix, &self.folder, &filename);
        if url.is_empty() {
            return Ok(host_url);
        }
        Ok(url)
    }
}

/// Replaces every character outside `[A-Za-z0-9_.-]` with `_`.
pub fn sanitize_public_id(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn public_id(item_id: &str, epoch_ms: i64) -> String {
    let base = sanitize_public_id(item_id.trim());
    let base = if base.is_empty() { "item" } else { base.as_str() };
    format!("{}_{}", base, epoch_ms)
}

pub fn object_key(folder: &str, filename: &str) -> String {
    let folder = folder.trim().trim_matches('/');
    if folder.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{}", folder, filename)
    }
}

/// Joins prefix, folder and filename, collapsing repeated slashes except
/// directly after a scheme's `:`.
pub fn build_image_url(prefix: &str, folder: &str, filename: &str) -> String {
    let filename = filename.trim().trim_start_matches('/');
    if filename.is_empty() {
        return String::new();
    }

    let parts: Vec<&str> = [
        prefix.trim().trim_end_matches('/'),
        folder.trim().trim_matches('/'),
        filename,
    ]
    .into_iter()
    .filter(|p| !p.is_empty())
    .collect();

    REPEATED_SLASHES
        .replace_all(&parts.join("/"), "$1/")
        .into_owned()
}

/// Accepts a `data:` URI or bare base64 (assumed JPEG).
pub fn decode_image_data(data: &str) -> Result<(String, Vec<u8>), PublishError> {
    let (content_type, payload) = match data.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').unwrap_or(("", rest));
            let media_type = header.split(';').next().unwrap_or_default().trim();
            let content_type = if media_type.is_empty() {
                DEFAULT_CONTENT_TYPE
            } else {
                media_type
            };
            (content_type.to_string(), payload)
        }
        None => (DEFAULT_CONTENT_TYPE.to_string(), data),
    };

    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64.decode(cleaned)?;
    Ok((content_type, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIXEL: &str = "/9j/4AAQSkZJRg==";

    fn storage(prefix: &str, folder: &str) -> Storage {
        Storage {
            prefix: prefix.to_string(),
            folder: folder.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_public_id_is_sanitized_and_unique() {
        let first = public_id("AB/12 99", 1_700_000_000_000);
        let second = public_id("AB/12 99", 1_700_000_000_001);

        assert_eq!(first, "AB_12_99_1700000000000");
        assert!(second.starts_with("AB_12_99_"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_public_id_falls_back_to_item() {
        assert_eq!(public_id("   ", 5), "item_5");
        assert_eq!(public_id("a.b-c_d", 5), "a.b-c_d_5");
        assert_eq!(sanitize_public_id("é#1"), "__1");
    }

    #[test]
    fn test_object_key() {
        assert_eq!(object_key("/items/", "a.jpg"), "items/a.jpg");
        assert_eq!(object_key("", "a.jpg"), "a.jpg");
    }

    #[test]
    fn test_build_image_url() {
        assert_eq!(
            build_image_url("https://cdn.example.com/", "/items/", "/a.jpg"),
            "https://cdn.example.com/items/a.jpg"
        );
        assert_eq!(
            build_image_url("https://cdn.example.com//img", "", "a.jpg"),
            "https://cdn.example.com/img/a.jpg"
        );
        assert_eq!(
            build_image_url("https://cdn.example.com", "a//b", "x.jpg"),
            "https://cdn.example.com/a/b/x.jpg"
        );
        assert_eq!(build_image_url("https://cdn.example.com", "items", "  "), "");
    }

    #[test]
    fn test_decode_image_data() {
        let (ct, bytes) = decode_image_data(&format!("data:image/png;base64,{}", PIXEL)).unwrap();
        assert_eq!(ct, "image/png");
        assert_eq!(bytes.first(), Some(&0xFF));

        let (ct, _) = decode_image_data(PIXEL).unwrap();
        assert_eq!(ct, "image/jpeg");

        assert!(matches!(
            decode_image_data("data:image/jpeg;base64,***"),
            Err(PublishError::InvalidImageData(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_without_host_is_not_configured() {
        let publisher = ImagePublisher::new(None, &storage("https://cdn.example.com", "items"));

        assert!(!publisher.is_configured());
        let result = publisher.publish("ACME", "A1", PIXEL).await;
        assert!(matches!(result, Err(PublishError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_publish_composes_url_from_prefix() {
        let mut host = MockAssetHost::new();
        host.expect_put_image()
            .once()
            .withf(|key, content_type, bytes| {
                key == "items/AB_12_99_42.jpg" && content_type == "image/jpeg" && !bytes.is_empty()
            })
            .return_once(|_, _, _| Ok("https://bucket.s3.amazonaws.com/items/AB_12_99_42.jpg".to_string()));

        let publisher = ImagePublisher::new(
            Some(Arc::new(host)),
            &storage("https://cdn.example.com/", "/items/"),
        );

        let url = publisher.publish_at("ACME", "AB/12 99", PIXEL, 42).await.unwrap();
        assert_eq!(url, "https://cdn.example.com/items/AB_12_99_42.jpg");
    }

    #[tokio::test]
    async fn test_publish_without_prefix_composes_folder_and_filename() {
        let mut host = MockAssetHost::new();
        host.expect_put_image()
            .once()
            .withf(|key, _, _| key == "items/A1_7.jpg")
            .return_once(|_, _, _| Ok("https://bucket.s3.amazonaws.com/items/A1_7.jpg".to_string()));

        let publisher = ImagePublisher::new(Some(Arc::new(host)), &storage("", "items"));

        let url = publisher.publish_at("ACME", "A1", PIXEL, 7).await.unwrap();
        assert_eq!(url, "items/A1_7.jpg");
    }

    #[tokio::test]
    async fn test_publish_rejects_bad_image_before_upload() {
        let mut host = MockAssetHost::new();
        host.expect_put_image().never();

        let publisher = ImagePublisher::new(Some(Arc::new(host)), &storage("", ""));

        let result = publisher.publish_at("ACME", "A1", "not base64!", 7).await;
        assert!(matches!(result, Err(PublishError::InvalidImageData(_))));
    }
}
