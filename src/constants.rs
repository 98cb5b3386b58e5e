//! Global constants for the rs-transmitter application.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

// Multipart upload constants
/// Size of one S3 multipart chunk (100MB)
pub const PART_SIZE: usize = 100 * 1024 * 1024;

/// Number of concurrent part transmitter workers
pub const PART_WORKERS: usize = 3;

/// Per-part retry budget; one chunk is attempted at most `PART_MAX_RETRY + 1` times
pub const PART_MAX_RETRY: usize = 3;

/// S3 maximum parts per upload
pub const S3_MAX_PARTS: usize = 10000;

// Azure block blob constants
/// Size of one Azure block (100MB)
pub const AZURE_BLOCK_SIZE: usize = 100 * 1024 * 1024;

/// Number of concurrent Azure block uploads
pub const AZURE_BLOCK_CONCURRENCY: usize = 3;

// Timeout and retry constants
/// Control-plane request timeout in seconds
pub const CONTROL_TIMEOUT_SECS: u64 = 10;

/// Part and block PUT timeout in seconds
pub const PART_PUT_TIMEOUT_SECS: u64 = 600;

/// Default whole-upload retry budget when settings leave it unset
pub const DEFAULT_MAX_RETRIES: usize = 3;

// Control-plane protocol constants
/// Request path on the ingestion service
pub const PAYLOAD_ENDPOINT: &str = "/cts/payload";

/// Profile used when settings leave it unset
pub const DEFAULT_PROFILE: &str = "default";
