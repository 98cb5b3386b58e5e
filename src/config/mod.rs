//! Configuration management for the transmitter.
//!
//! Two YAML documents drive a transfer: per-client `Settings` and the API
//! `Credentials` identifying the caller to the ingestion service. Loading is
//! plain deserialization plus the validation rules both types enforce.

mod credentials;
mod settings;

pub use credentials::Credentials;
pub use settings::Settings;
