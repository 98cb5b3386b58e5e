//! Core data models for payload transmission.

use std::path::PathBuf;

/// One file to transmit, as described by the caller.
#[derive(Debug, Clone)]
pub struct FileDetails {
    /// Path of the local file to ship.
    pub source_filename: PathBuf,
    /// Name to store the payload under on the remote side; the server picks
    /// one when unset.
    pub destination_filename: Option<String>,
    /// Explicit suffix override; when unset the suffix is derived from the
    /// source filename's extension.
    pub file_suffix: Option<String>,
    /// Payload tag describing the kind of data (e.g. `syslog`, `pcap`). The
    /// server validates it.
    pub payload_type: String,
}

impl FileDetails {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(source: P, payload_type: S) -> Self {
        Self {
            source_filename: source.into(),
            destination_filename: None,
            file_suffix: None,
            payload_type: payload_type.into(),
        }
    }

    /// Suffix sent with the SAS request: the explicit override when set,
    /// otherwise the source extension stripped of its leading dot. `None`
    /// means the request must be rejected locally.
    pub fn effective_suffix(&self) -> Option<String> {
        if let Some(suffix) = &self.file_suffix {
            if !suffix.is_empty() {
                return Some(suffix.clone());
            }
        }
        self.source_filename
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .filter(|ext| !ext.is_empty())
    }
}
