//! Bucket creation and recursive upload with 502 retry.

use crate::error::{StorageError, StorageResult};
use crate::traits::{BucketClient, BucketState};
use bytes::Bytes;
use dshop_core::BucketDeployment;
use dshop_core::fs::{WalkedFile, guess_content_type, walk_dir};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

/// Upload one file, retrying on HTTP 502.
///
/// The first attempt is followed by up to `max_retries` retries with no
/// backoff. Any other failure, or a 502 on the last attempt, is returned.
pub async fn upload_file(
    client: &dyn BucketClient,
    bucket: &str,
    file: &WalkedFile,
    max_retries: u32,
) -> StorageResult<()> {
    let data = Bytes::from(tokio::fs::read(&file.path).await?);
    let content_type = guess_content_type(&file.key);
    upload_bytes(client, bucket, &file.key, data, &content_type, max_retries).await
}

/// Upload an in-memory object with the same retry policy as [`upload_file`].
pub async fn upload_bytes(
    client: &dyn BucketClient,
    bucket: &str,
    key: &str,
    data: Bytes,
    content_type: &str,
    max_retries: u32,
) -> StorageResult<()> {
    let mut attempt = 0;
    loop {
        match client
            .put_object(bucket, key, data.clone(), content_type)
            .await
        {
            Ok(()) => return Ok(()),
            Err(e) if e.is_bad_gateway() && attempt < max_retries => {
                attempt += 1;
                warn!(
                    backend = client.backend_name(),
                    bucket,
                    key,
                    attempt,
                    "Upload got 502, retrying"
                );
            }
            Err(e) => return Err(e),
        }
    }
}

/// Upload every file under `dir`, keyed by its path relative to `dir`.
///
/// Returns the uploaded keys in upload order.
pub async fn upload_dir(
    client: &dyn BucketClient,
    bucket: &str,
    dir: &Path,
    max_retries: u32,
) -> StorageResult<Vec<String>> {
    let files = walk_dir(dir).await?;
    let mut keys = Vec::with_capacity(files.len());
    for file in &files {
        upload_file(client, bucket, file, max_retries).await?;
        debug!(bucket, key = %file.key, "Uploaded object");
        keys.push(file.key.clone());
    }
    Ok(keys)
}

/// Find or create `bucket`, then upload `public_dir` into it.
#[instrument(skip(client, public_dir), fields(backend = client.backend_name()))]
pub async fn deploy_bucket(
    client: &dyn BucketClient,
    bucket: &str,
    public_dir: &Path,
    max_retries: u32,
) -> StorageResult<BucketDeployment> {
    match client.bucket_state(bucket).await? {
        BucketState::Exists => debug!("Bucket exists"),
        BucketState::Missing => {
            info!("Creating bucket");
            client.create_public_bucket(bucket).await?;
        }
        BucketState::Forbidden => {
            return Err(StorageError::BucketConflict {
                bucket: bucket.to_string(),
            });
        }
    }

    let keys = upload_dir(client, bucket, public_dir, max_retries).await?;
    info!(objects = keys.len(), "Uploaded build to bucket");

    Ok(BucketDeployment {
        bucket_name: bucket.to_string(),
        url: client.bucket_url(bucket),
        http_url: client.http_url(bucket),
    })
}
