//! 檔案型 lake 的儲存層：本機路徑 (或 `file://`) 與 `s3://` / `s3a://`

use crate::config::AwsConfig;
use crate::utils::error::{EtlError, Result};
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// 解析後的物件位置
pub struct StorageLocation {
    store: Arc<dyn ObjectStore>,
    path: ObjectPath,
    location: String,
}

impl fmt::Debug for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageLocation")
            .field("location", &self.location)
            .field("path", &self.path)
            .finish()
    }
}

fn is_object_store_url(location: &str) -> bool {
    location.starts_with("s3://") || location.starts_with("s3a://")
}

impl StorageLocation {
    pub fn resolve(location: &str, aws: Option<&AwsConfig>) -> Result<Self> {
        if is_object_store_url(location) {
            Self::resolve_s3(location, aws)
        } else {
            Self::resolve_local(location)
        }
    }

    fn resolve_s3(location: &str, aws: Option<&AwsConfig>) -> Result<Self> {
        let url = Url::parse(location).map_err(|e| EtlError::InvalidConfigValueError {
            field: "url".to_string(),
            value: location.to_string(),
            reason: e.to_string(),
        })?;
        let bucket = url
            .host_str()
            .filter(|b| !b.is_empty())
            .ok_or_else(|| EtlError::InvalidConfigValueError {
                field: "url".to_string(),
                value: location.to_string(),
                reason: "object store URL has no bucket".to_string(),
            })?;

        // 憑證來自環境 (AWS_ACCESS_KEY_ID 等)
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(aws) = aws {
            builder = builder.with_region(&aws.region);
            if let Some(endpoint) = &aws.endpoint {
                builder = builder
                    .with_endpoint(endpoint)
                    .with_allow_http(endpoint.starts_with("http://"));
            }
        }

        Ok(Self {
            store: Arc::new(builder.build()?),
            path: ObjectPath::from(url.path().trim_start_matches('/')),
            location: location.to_string(),
        })
    }

    fn resolve_local(location: &str) -> Result<Self> {
        let raw = location.strip_prefix("file://").unwrap_or(location);
        let path = std::path::Path::new(raw);
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        Ok(Self {
            store: Arc::new(LocalFileSystem::new()),
            path: ObjectPath::from_absolute_path(&absolute)?,
            location: location.to_string(),
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub async fn get(&self) -> Result<Bytes> {
        let bytes = self.store.get(&self.path).await?.bytes().await?;
        tracing::debug!("Fetched {} bytes from {}", bytes.len(), self.location);
        Ok(bytes)
    }

    /// 本機寫入時會自動建立上層目錄
    pub async fn put(&self, data: Vec<u8>) -> Result<()> {
        let size = data.len();
        self.store.put(&self.path, PutPayload::from(data)).await?;
        tracing::debug!("Stored {} bytes at {}", size, self.location);
        Ok(())
    }
}
