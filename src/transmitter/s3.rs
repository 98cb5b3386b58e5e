//! S3 multipart upload path.
//!
//! The orchestrator reads the source file one part at a time, fetches a fresh
//! pre-signed URL immediately before each part is enqueued, and feeds a fixed
//! pool of transmitter workers through a bounded channel whose capacity doubles
//! as the backpressure mechanism. Every enqueued chunk is answered with exactly
//! one message on the parts channel, either an `(ETag, PartNumber)` tuple or a
//! failure sentinel, so the accounting always drains. A chunk that
//! exhausts its retries raises the sticky halt flag and dooms the transfer:
//! commit and abort are mutually exclusive and happen at most once.

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use bytes::Bytes;
use log::{debug, error, info, warn};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, Mutex};

use crate::config::Settings;
use crate::constants::{
    PART_MAX_RETRY, PART_PUT_TIMEOUT_SECS, PART_SIZE, PART_WORKERS, S3_MAX_PARTS,
};
use crate::errors::TransmitterError;
use crate::transmitter::control::{ControlClient, SasResult, UploadedPart};

/// Control-plane surface one multipart transfer needs.
pub(crate) trait MultipartControl: Sync {
    /// Fetch the pre-signed PUT URL for `part_number`.
    fn signed_url(&self, part_number: i64) -> impl Future<Output = Result<String>> + Send;

    /// Commit the upload with the complete, sorted parts list.
    fn complete(&self, parts: &[UploadedPart]) -> impl Future<Output = Result<String>> + Send;

    /// Abort the upload, discarding all parts server-side.
    fn abort(&self) -> impl Future<Output = Result<String>> + Send;
}

/// Destination for part bodies; HTTP PUT in production, a double in tests.
pub(crate) trait PartSink: Send + Sync + 'static {
    /// PUT `chunk` to `signed_url` and return the response `ETag` verbatim,
    /// surrounding quotes included.
    fn transmit(&self, signed_url: &str, chunk: Bytes) -> impl Future<Output = Result<String>> + Send;
}

/// One chunk handed to the transmitter pool.
struct TransmitterPayload {
    signed_url: String,
    chunk: Bytes,
    part_number: i64,
    /// Bytes left to dispatch after this chunk, for transfer logs.
    remaining: u64,
}

/// Upload `path` as a multipart object using the identifiers in `sas`.
/// Returns the commit message from the ingestion service.
pub async fn upload_multipart(
    path: &Path,
    sas: &SasResult,
    control: &ControlClient,
    settings: &Settings,
) -> Result<String> {
    let control = S3Control {
        control,
        key: &sas.key,
        upload_id: &sas.upload_id,
    };
    let sink = Arc::new(HttpPartSink::new(settings)?);
    run_multipart(path, &control, sink, PART_SIZE).await
}

/// The orchestrator proper, generic over its network seams.
pub(crate) async fn run_multipart<C: MultipartControl, S: PartSink>(
    path: &Path,
    control: &C,
    sink: Arc<S>,
    part_size: usize,
) -> Result<String> {
    let mut file = File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let file_size = file
        .metadata()
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();
    if file_size == 0 {
        bail!("refusing to upload empty file {}", path.display());
    }

    info!("Uploading file {}, total {} bytes", path.display(), file_size);

    let halt = Arc::new(AtomicBool::new(false));
    let (chunk_tx, chunk_rx) = mpsc::channel::<TransmitterPayload>(PART_WORKERS);
    let (parts_tx, mut parts_rx) = mpsc::unbounded_channel::<Option<UploadedPart>>();

    let queue = Arc::new(Mutex::new(chunk_rx));
    let mut workers = Vec::with_capacity(PART_WORKERS);
    for _ in 0..PART_WORKERS {
        workers.push(tokio::spawn(parts_transmitter(
            Arc::clone(&queue),
            parts_tx.clone(),
            Arc::clone(&sink),
            Arc::clone(&halt),
        )));
    }
    // The workers hold the only remaining senders; the parts channel closes
    // when the last worker exits.
    drop(parts_tx);

    let collector = tokio::spawn(async move {
        let mut collected = Vec::new();
        while let Some(message) = parts_rx.recv().await {
            if let Some(part) = message {
                debug!("  ... transfer part {} completed", part.part_number);
                collected.push(part);
            }
        }
        collected
    });

    // Dispatch loop: one part per iteration. The signed URL is fetched right
    // before enqueue so its validity window starts as late as possible.
    let mut remaining = file_size;
    let mut part_number: i64 = 1;
    let mut issued = 0usize;
    let mut dispatch_err: Option<anyhow::Error> = None;
    while remaining > 0 {
        if halt.load(Ordering::SeqCst) {
            break;
        }
        if issued == S3_MAX_PARTS {
            halt.store(true, Ordering::SeqCst);
            dispatch_err = Some(anyhow!(
                "{} needs more than {} parts",
                path.display(),
                S3_MAX_PARTS
            ));
            break;
        }

        let this_size = remaining.min(part_size as u64) as usize;
        let chunk = match read_chunk(&mut file, this_size).await {
            Ok(chunk) => chunk,
            Err(e) => {
                halt.store(true, Ordering::SeqCst);
                dispatch_err = Some(e);
                break;
            }
        };
        let signed_url = match control.signed_url(part_number).await {
            Ok(url) => url,
            Err(e) => {
                halt.store(true, Ordering::SeqCst);
                dispatch_err = Some(e);
                break;
            }
        };

        remaining -= this_size as u64;
        issued += 1;
        let payload = TransmitterPayload {
            signed_url,
            chunk,
            part_number,
            remaining,
        };
        if chunk_tx.send(payload).await.is_err() {
            // All workers are gone; only a panic can cause that. The length
            // check below forces the abort path.
            break;
        }
        part_number += 1;
    }
    drop(chunk_tx);

    for worker in workers {
        let _ = worker.await;
    }
    let mut collected = collector.await.context("parts collector panicked")?;

    if halt.load(Ordering::SeqCst) || collected.len() != issued {
        let abort_message = control
            .abort()
            .await
            .context("failed to abort multipart upload")?;
        // The caller always sees the abort outcome; a dispatcher-side cause
        // stays inspectable further down the chain.
        let aborted = TransmitterError::UploadAborted(abort_message);
        return Err(match dispatch_err {
            Some(cause) => cause.context(aborted),
            None => aborted.into(),
        });
    }

    collected.sort_by_key(|part| part.part_number);
    control.complete(&collected).await
}

/// Worker loop for the transmitter pool.
///
/// Each chunk is attempted at most `PART_MAX_RETRY + 1` times; a non-success
/// status or missing ETag counts as a failed attempt. The final failure stores
/// the halt flag before the sentinel is sent, so the dispatcher observes halt
/// no later than the accounting. Once halted the loop keeps draining the
/// queue, answering every chunk with a sentinel.
async fn parts_transmitter<S: PartSink>(
    queue: Arc<Mutex<mpsc::Receiver<TransmitterPayload>>>,
    parts: mpsc::UnboundedSender<Option<UploadedPart>>,
    sink: Arc<S>,
    halt: Arc<AtomicBool>,
) {
    loop {
        let payload = { queue.lock().await.recv().await };
        let Some(part) = payload else {
            return;
        };

        let mut done = false;
        for attempt in 0..=PART_MAX_RETRY {
            if halt.load(Ordering::SeqCst) {
                break;
            }
            if attempt == 0 {
                debug!(
                    "  ... transfer part {} started, {} bytes remaining",
                    part.part_number, part.remaining
                );
            }
            match sink.transmit(&part.signed_url, part.chunk.clone()).await {
                Ok(etag) => {
                    let _ = parts.send(Some(UploadedPart {
                        etag,
                        part_number: part.part_number,
                    }));
                    done = true;
                    break;
                }
                Err(e) => {
                    if attempt == PART_MAX_RETRY {
                        error!(
                            "Aborting upload, max retries for part {} reached: {e:#}",
                            part.part_number
                        );
                        halt.store(true, Ordering::SeqCst);
                    } else {
                        warn!(
                            "  ... resending part {}, try {}: {e:#}",
                            part.part_number,
                            attempt + 1
                        );
                    }
                }
            }
        }
        if !done {
            // Halt is already visible; account for the chunk before moving on.
            let _ = parts.send(None);
        }
    }
}

async fn read_chunk(file: &mut File, length: usize) -> Result<Bytes> {
    let mut buffer = vec![0u8; length];
    file.read_exact(&mut buffer)
        .await
        .context("short read from source file")?;
    Ok(Bytes::from(buffer))
}

/// [`MultipartControl`] bound to one `(key, upload_id)` pair on the real
/// control plane.
struct S3Control<'a> {
    control: &'a ControlClient,
    key: &'a str,
    upload_id: &'a str,
}

impl MultipartControl for S3Control<'_> {
    async fn signed_url(&self, part_number: i64) -> Result<String> {
        self.control
            .get_signed_url(self.key, self.upload_id, part_number)
            .await
    }

    async fn complete(&self, parts: &[UploadedPart]) -> Result<String> {
        self.control
            .complete_upload(self.key, self.upload_id, parts)
            .await
    }

    async fn abort(&self) -> Result<String> {
        self.control.abort_upload(self.key, self.upload_id).await
    }
}

/// PUTs part bodies to their pre-signed URLs.
pub(crate) struct HttpPartSink {
    http: reqwest::Client,
}

impl HttpPartSink {
    pub(crate) fn new(settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(PART_PUT_TIMEOUT_SECS))
            .danger_accept_invalid_certs(settings.allow_insecure_tls)
            .build()
            .context("Failed to build part upload HTTP client")?;
        Ok(Self { http })
    }
}

impl PartSink for HttpPartSink {
    async fn transmit(&self, signed_url: &str, chunk: Bytes) -> Result<String> {
        let response = self
            .http
            .put(signed_url)
            .body(chunk)
            .send()
            .await
            .context("part PUT failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("part PUT answered status {status}");
        }
        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| anyhow!("part PUT response is missing an ETag header"))?
            .to_string();
        Ok(etag)
    }
}
