//! Blob store client.

use std::path::Path;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::content_type;
use crate::error::{StorageError, StorageResult};

/// Timeout for signed-URL downloads.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for the blob client.
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Bucket name
    pub bucket_name: String,
    /// Region
    pub region: String,
}

impl BlobConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("S3_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("S3_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("S3_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("S3_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("S3_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("S3_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("S3_BUCKET_NAME not set"))?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// One object placed by a directory upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Local file name
    pub original_name: String,
    /// Object key in the bucket
    pub s3_key: String,
    /// Public URL of the object
    pub url: String,
}

/// S3-compatible storage client.
///
/// Performs no internal retries; retry policy belongs to the job attempt.
#[derive(Clone)]
pub struct BlobClient {
    client: Client,
    http: reqwest::Client,
    bucket: String,
    endpoint_url: String,
}

impl BlobClient {
    /// Create a new client from configuration.
    pub fn new(config: BlobConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "mediaqueue",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        let http = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| StorageError::config_error(e.to_string()))?;

        Ok(Self {
            client: Client::from_conf(sdk_config),
            http,
            bucket: config.bucket_name,
            endpoint_url: config.endpoint_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::new(BlobConfig::from_env()?)
    }

    /// Canonical public URL for an object key.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.endpoint_url, key)
    }

    /// Generate a presigned GET URL.
    pub async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    /// Stream a URL's body to a local file, creating parent directories.
    pub async fn download_to_file(&self, url: &str, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Downloading {} to {}", url, path.display());

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| StorageError::transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::BadResponse {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StorageError::transient(e.to_string()))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        info!("Downloaded {} to {}", url, path.display());
        Ok(())
    }

    /// PUT a local file; returns its public URL.
    pub async fn upload_file(&self, path: impl AsRef<Path>, key: &str) -> StorageResult<String> {
        let path = path.as_ref();
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type::for_path(path))
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        Ok(self.public_url(key))
    }

    /// Upload every immediate file child of a directory under a key prefix.
    ///
    /// Children are uploaded in name order so the returned list is stable.
    pub async fn upload_dir(
        &self,
        dir: impl AsRef<Path>,
        dest_prefix: &str,
    ) -> StorageResult<Vec<UploadedFile>> {
        let dir = dir.as_ref();

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        let mut uploaded = Vec::with_capacity(names.len());
        for name in names {
            let key = format!("{}/{}", dest_prefix, name);
            let url = self.upload_file(dir.join(&name), &key).await?;
            uploaded.push(UploadedFile {
                original_name: name,
                s3_key: key,
                url,
            });
        }

        info!(
            "Uploaded {} files from {} to {}",
            uploaded.len(),
            dir.display(),
            dest_prefix
        );
        Ok(uploaded)
    }

    /// List object keys under a prefix.
    pub async fn list_objects(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| StorageError::ListFailed(e.to_string()))?;

            if let Some(contents) = &response.contents {
                keys.extend(contents.iter().filter_map(|o| o.key.clone()));
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(keys)
    }

    /// Delete a batch of objects.
    pub async fn delete_objects(&self, keys: &[String]) -> StorageResult<u32> {
        if keys.is_empty() {
            return Ok(0);
        }

        let objects: Vec<_> = keys
            .iter()
            .map(|k| {
                aws_sdk_s3::types::ObjectIdentifier::builder()
                    .key(k)
                    .build()
                    .map_err(|e| StorageError::DeleteFailed(e.to_string()))
            })
            .collect::<Result<_, _>>()?;

        let delete = aws_sdk_s3::types::Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;

        self.client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;

        info!("Deleted {} objects", keys.len());
        Ok(keys.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> BlobClient {
        BlobClient::new(BlobConfig {
            endpoint_url: "https://blobs.example.com/".to_string(),
            access_key_id: "key".to_string(),
            secret_access_key: "secret".to_string(),
            bucket_name: "media".to_string(),
            region: "auto".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_public_url_shape() {
        let client = test_client();
        assert_eq!(
            client.public_url("posts/p1/processed/a_master.m3u8"),
            "https://blobs.example.com/posts/p1/processed/a_master.m3u8"
        );
    }

    #[tokio::test]
    async fn test_download_refused_is_transient() {
        let client = test_client();
        let dir = tempfile::tempdir().unwrap();

        let result = client
            .download_to_file("http://127.0.0.1:9/nothing", dir.path().join("out"))
            .await;

        assert!(matches!(result, Err(StorageError::TransientIo(_))));
    }
}
