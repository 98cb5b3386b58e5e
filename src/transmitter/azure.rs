//! Azure upload path.
//!
//! The SAS URL carries all authorization, so this module speaks the block-blob
//! REST surface directly: a HEAD probe for existence, Put Blob for payloads
//! that fit one block, and Put Block + Put Block List above that. The HTTP
//! client performs no retries of its own; the probe-then-upload loop here owns
//! the retry budget.

use std::future::Future;
use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use base64::prelude::{Engine, BASE64_STANDARD};
use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, error, info};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::config::Settings;
use crate::constants::{AZURE_BLOCK_CONCURRENCY, AZURE_BLOCK_SIZE, PART_PUT_TIMEOUT_SECS};
use crate::errors::TransmitterError;

/// Minimal view of a blob destination, so the retry loop can be exercised
/// without a live storage account.
pub(crate) trait BlobEndpoint: Sync {
    /// Whether the destination blob already exists.
    fn exists(&self) -> impl Future<Output = Result<bool>> + Send;

    /// Upload the whole file to the destination.
    fn upload(&self, path: &Path) -> impl Future<Output = Result<()>> + Send;
}

/// Upload `path` through a SAS URL, probing first so an already-present blob
/// is reported as [`TransmitterError::FileExists`] instead of overwritten.
pub async fn upload_to_azure(path: &Path, sas_url: &str, settings: &Settings) -> Result<()> {
    let file_size = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();

    if settings.debug {
        debug!(
            "Uploading file {} to {}, total {} bytes",
            path.display(),
            sas_url,
            file_size
        );
    } else {
        info!("Uploading file {}, total {} bytes", path.display(), file_size);
    }

    let client = BlockBlobClient::new(sas_url, settings)?;
    upload_with_retries(&client, path, settings.max_retries).await
}

/// Probe-then-upload loop. A present blob fails immediately; probe and upload
/// failures are logged and retried up to `max_retries` times.
pub(crate) async fn upload_with_retries<E: BlobEndpoint>(
    endpoint: &E,
    path: &Path,
    max_retries: usize,
) -> Result<()> {
    for attempt in 0..max_retries {
        debug!("Try {} of {}", attempt + 1, max_retries);
        match endpoint.exists().await {
            Ok(true) => return Err(TransmitterError::FileExists.into()),
            Ok(false) => match endpoint.upload(path).await {
                Ok(()) => {
                    debug!("Upload completed");
                    return Ok(());
                }
                Err(e) => error!(
                    "failed to upload file: {e:#}. Try {} of {}",
                    attempt + 1,
                    max_retries
                ),
            },
            Err(e) => error!("failed to get blob properties: {e:#}"),
        }
    }
    Err(TransmitterError::RetriesExhausted(max_retries).into())
}

/// Raw block-blob client bound to one SAS URL.
pub(crate) struct BlockBlobClient {
    http: reqwest::Client,
    sas_url: String,
}

impl BlockBlobClient {
    pub(crate) fn new(sas_url: &str, settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(PART_PUT_TIMEOUT_SECS))
            .danger_accept_invalid_certs(settings.allow_insecure_tls)
            .build()
            .context("Failed to build blob HTTP client")?;

        Ok(Self {
            http,
            sas_url: sas_url.to_string(),
        })
    }

    /// Upload the whole blob in one request. Used for payloads that fit a
    /// single block.
    async fn put_blob(&self, path: &Path) -> Result<()> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let response = self
            .http
            .put(&self.sas_url)
            .header("x-ms-blob-type", "BlockBlob")
            .body(data)
            .send()
            .await
            .context("blob PUT failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("blob PUT answered status {status}");
        }
        Ok(())
    }

    /// Stage one block of the blob. Block ids are fixed-width so every id in
    /// the list has the same encoded length, which the service requires.
    async fn put_block(&self, path: &Path, index: usize, file_size: u64) -> Result<String> {
        let offset = (index * AZURE_BLOCK_SIZE) as u64;
        let length = AZURE_BLOCK_SIZE.min((file_size - offset) as usize);

        let mut file = File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buffer = vec![0u8; length];
        file.read_exact(&mut buffer)
            .await
            .context("short read from source file")?;

        let block_id = block_id(index);
        let response = self
            .http
            .put(&self.sas_url)
            .query(&[("comp", "block"), ("blockid", &block_id)])
            .body(buffer)
            .send()
            .await
            .with_context(|| format!("block {index} PUT failed"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("block {index} PUT answered status {status}");
        }
        Ok(block_id)
    }

    /// Commit the staged blocks in order.
    async fn put_block_list(&self, block_ids: &[String]) -> Result<()> {
        let response = self
            .http
            .put(&self.sas_url)
            .query(&[("comp", "blocklist")])
            .body(block_list_xml(block_ids))
            .send()
            .await
            .context("block list PUT failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("block list PUT answered status {status}");
        }
        Ok(())
    }
}

impl BlobEndpoint for BlockBlobClient {
    async fn exists(&self) -> Result<bool> {
        let response = self
            .http
            .head(&self.sas_url)
            .send()
            .await
            .context("blob properties probe failed")?;

        let error_code = response
            .headers()
            .get("x-ms-error-code")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        classify_probe(response.status(), error_code.as_deref())
    }

    async fn upload(&self, path: &Path) -> Result<()> {
        let file_size = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();

        if file_size <= AZURE_BLOCK_SIZE as u64 {
            return self.put_blob(path).await;
        }

        let block_count = file_size.div_ceil(AZURE_BLOCK_SIZE as u64) as usize;
        debug!("Staging {} blocks of at most {} bytes", block_count, AZURE_BLOCK_SIZE);

        let block_ids: Vec<String> = stream::iter(0..block_count)
            .map(|index| self.put_block(path, index, file_size))
            .buffered(AZURE_BLOCK_CONCURRENCY)
            .try_collect()
            .await?;

        self.put_block_list(&block_ids).await
    }
}

/// Map a probe response to blob present / blob absent. Only an explicit
/// `BlobNotFound` error code licenses an upload; every other failure, a 404
/// with a missing or different error code included, is an error so the retry
/// loop fires instead of uploading against an unconfirmed destination.
fn classify_probe(status: reqwest::StatusCode, error_code: Option<&str>) -> Result<bool> {
    if status.is_success() {
        return Ok(true);
    }
    if status == reqwest::StatusCode::NOT_FOUND && error_code == Some("BlobNotFound") {
        return Ok(false);
    }
    Err(anyhow!(
        "blob probe answered status {status}, error code {}",
        error_code.unwrap_or("none")
    ))
}

fn block_id(index: usize) -> String {
    BASE64_STANDARD.encode(format!("{index:032}"))
}

fn block_list_xml(block_ids: &[String]) -> String {
    let mut body = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<BlockList>\n");
    for id in block_ids {
        body.push_str("\t<Uncommitted>");
        body.push_str(id);
        body.push_str("</Uncommitted>\n");
    }
    body.push_str("</BlockList>");
    body
}
