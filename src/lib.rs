//! # rs-transmitter
//!
//! A client-side payload transmitter: ships local files (security telemetry,
//! packet captures, log blobs) to a remote ingestion service that brokers
//! storage credentials, then drives the upload into cloud object storage.
//!
//! ## Overview
//!
//! The transmitter speaks a small JSON control protocol against a single
//! ingestion endpoint. The service answers with a SAS and a `profile_type`
//! selecting the storage backend: Azure destinations get a single-shot
//! block-blob upload with an existence pre-check, S3 destinations get a
//! concurrent multipart upload driven by a bounded worker pool with per-part
//! retry, cooperative halt, and a final commit or abort.
//!
//! ## Usage
//!
//! ```no_run
//! use rs_transmitter::config::{Credentials, Settings};
//! use rs_transmitter::models::FileDetails;
//! use rs_transmitter::transmitter::Client;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = Settings::from_yaml_file("config.yaml".as_ref())?;
//! let credentials = Credentials::from_yaml_file("credentials.yaml".as_ref())?;
//!
//! let client = Client::new(settings, credentials)?;
//! client
//!     .send_file(&FileDetails::new("/var/log/capture.pcap", "pcap"))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`config`]: Settings and credentials loading with validation
//! - [`models`]: Core data models
//! - [`transmitter`]: Control-plane client and the Azure / S3 upload paths
//! - [`alerts`]: Alert record builder for the detection pipeline
//! - [`constants`]: Application-wide constants
//! - [`errors`]: Error kinds callers branch on

/// Alert record builder for the detection pipeline
pub mod alerts;

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Settings and credentials management
pub mod config;

/// Application constants and protocol values
pub mod constants;

/// Error kinds surfaced by the transmitter
pub mod errors;

/// Core data models
pub mod models;

/// Control-plane client and upload orchestration
pub mod transmitter;
