//! S3 (and S3-compatible) object store.
//!
//! The AWS SDK is async; this store owns a small Tokio runtime and blocks on
//! each request so the rest of the pipeline stays synchronous.

use super::{ensure_parent, ObjectStore, StorageError};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use std::fs;
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Connection settings for [`S3Store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Settings {
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...).
    pub endpoint: Option<String>,
    pub force_path_style: bool,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            region: "eu-west-1".to_string(),
            endpoint: None,
            force_path_style: false,
        }
    }
}

pub struct S3Store {
    client: S3Client,
    runtime: Runtime,
}

impl S3Store {
    /// Build a client from the default credential chain and the given region.
    pub fn connect(settings: &S3Settings) -> Result<Self, StorageError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("s3-io")
            .enable_all()
            .build()
            .map_err(|e| StorageError::Client(format!("failed to start async runtime: {e}")))?;

        let client = runtime.block_on(async {
            let shared = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(settings.region.clone()))
                .load()
                .await;

            let mut builder = aws_sdk_s3::config::Builder::from(&shared);
            if let Some(endpoint) = &settings.endpoint {
                builder = builder
                    .endpoint_url(endpoint)
                    .force_path_style(settings.force_path_style);
            }
            S3Client::from_conf(builder.build())
        });

        info!(region = %settings.region, endpoint = ?settings.endpoint, "connected S3 client");
        Ok(Self { client, runtime })
    }
}

impl ObjectStore for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    fn download(&self, bucket: &str, key: &str, local_path: &Path) -> Result<(), StorageError> {
        let backend = |message: String| StorageError::Backend {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let bytes = self.runtime.block_on(async {
            let output = match self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
            {
                Ok(output) => output,
                Err(err) => {
                    let missing = err
                        .as_service_error()
                        .is_some_and(|e| e.is_no_such_key())
                        || err
                            .raw_response()
                            .is_some_and(|r| r.status().as_u16() == 404);
                    if missing {
                        return Err(StorageError::NotFound {
                            bucket: bucket.to_string(),
                            key: key.to_string(),
                        });
                    }
                    return Err(backend(DisplayErrorContext(&err).to_string()));
                }
            };

            output
                .body
                .collect()
                .await
                .map(|data| data.into_bytes())
                .map_err(|e| backend(format!("reading body: {e}")))
        })?;

        ensure_parent(local_path)?;
        fs::write(local_path, &bytes).map_err(|source| StorageError::Io {
            path: local_path.to_path_buf(),
            source,
        })?;
        debug!(bucket, key, bytes = bytes.len(), "downloaded object");
        Ok(())
    }

    fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.runtime.block_on(async {
            let body = ByteStream::from_path(local_path)
                .await
                .map_err(|e| StorageError::Io {
                    path: local_path.to_path_buf(),
                    source: std::io::Error::other(e.to_string()),
                })?;

            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .map_err(|err| StorageError::Backend {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    message: DisplayErrorContext(&err).to_string(),
                })?;
            Ok::<(), StorageError>(())
        })?;

        debug!(bucket, key, path = %local_path.display(), "uploaded object");
        Ok(())
    }
}
