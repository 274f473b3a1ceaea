use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("S3 upload failed: {0}")]
    Upload(String),
}

/// Keeps a copy of every uploaded CV document.
#[async_trait]
pub trait DocumentArchive: Send + Sync {
    /// Stores the PDF and returns its object key.
    async fn store_cv(&self, user_id: Uuid, document: Bytes) -> Result<String, ArchiveError>;
}

/// Each upload gets its own key; older documents are never overwritten.
pub fn cv_object_key(user_id: Uuid, object_id: Uuid) -> String {
    format!("cvs/{user_id}/{object_id}.pdf")
}

pub struct S3Archive {
    client: S3Client,
    bucket: String,
}

impl S3Archive {
    pub fn new(client: S3Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl DocumentArchive for S3Archive {
    async fn store_cv(&self, user_id: Uuid, document: Bytes) -> Result<String, ArchiveError> {
        let key = cv_object_key(user_id, Uuid::new_v4());
        let size = document.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(document))
            .content_type("application/pdf")
            .send()
            .await
            .map_err(|e| {
                error!("Failed to upload CV for user {user_id} to s3://{}/{key}: {e}", self.bucket);
                ArchiveError::Upload(e.to_string())
            })?;

        info!("Uploaded CV ({size} bytes) to s3://{}/{}", self.bucket, key);
        Ok(key)
    }
}
