//! Error kinds surfaced by the transmitter.
//!
//! Orchestration code flows `anyhow::Result` with context; the kinds below are
//! inserted wherever a failure is part of the caller's contract and recovered
//! with `downcast_ref`.

use thiserror::Error;

/// Failures callers are expected to branch on.
#[derive(Debug, Error)]
pub enum TransmitterError {
    /// The ingestion service answered 415: the payload tag is not recognized.
    #[error("unknown payload")]
    UnknownPayload,

    /// The destination blob already exists; the upload was not attempted.
    #[error("file already exists")]
    FileExists,

    /// The ingestion service selected a storage backend this client does not implement.
    #[error("unknown result type: {0}")]
    UnknownResultType(String),

    /// Any non-200 answer from the control plane, status and body captured.
    #[error("status code: {status}, body: {body}")]
    ControlPlane { status: u16, body: String },

    /// An uploader gave up after exhausting its retry budget.
    #[error("failed to send payload after {0} retries")]
    RetriesExhausted(usize),

    /// The multipart transfer was halted and the server-side upload aborted.
    /// Carries the abort message returned by the ingestion service.
    #[error("upload aborted: {0}")]
    UploadAborted(String),

    /// Settings or credentials failed validation.
    #[error("{0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_plane_error_carries_status_and_body() {
        let err = TransmitterError::ControlPlane {
            status: 503,
            body: "maintenance".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("503"));
        assert!(rendered.contains("maintenance"));
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = TransmitterError::UnknownPayload.into();
        assert!(matches!(
            err.downcast_ref::<TransmitterError>(),
            Some(TransmitterError::UnknownPayload)
        ));
    }
}
