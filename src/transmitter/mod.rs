//! Payload transmitter: control-plane negotiation plus the Azure and S3
//! upload paths.
//!
//! The entry point is [`Client::send_file`]. It asks the ingestion service for
//! a SAS, then drives whichever upload path the returned `profile_type`
//! selects: a single-shot block-blob upload for `"azure"`, or the concurrent
//! multipart engine for `"s3"`.

pub mod azure;
pub mod control;
pub mod s3;

use anyhow::Result;
use log::{debug, warn};

use crate::config::{Credentials, Settings};
use crate::errors::TransmitterError;
use crate::models::FileDetails;
use control::ControlClient;

/// Handle to the ingestion service for sending payload files.
#[derive(Debug)]
pub struct Client {
    settings: Settings,
    control: ControlClient,
}

impl Client {
    /// Build a client from settings and credentials.
    ///
    /// Settings are normalized first: an empty profile becomes `"default"` and
    /// a zero retry budget becomes 3. Credentials must pass validation.
    pub fn new(mut settings: Settings, credentials: Credentials) -> Result<Self> {
        settings.normalize();
        settings.validate()?;
        credentials.validate()?;

        let control = ControlClient::new(&credentials, &settings)?;
        Ok(Self { settings, control })
    }

    /// Transmit one file to whichever storage backend the ingestion service
    /// selects for its payload type.
    pub async fn send_file(&self, details: &FileDetails) -> Result<()> {
        let suffix = details.effective_suffix().ok_or_else(|| {
            TransmitterError::Config(format!(
                "filename {} does not have a file suffix, please set file_suffix",
                details.source_filename.display()
            ))
        })?;

        let result = match self
            .control
            .request_sas(
                &details.payload_type,
                &self.settings.profile,
                &suffix,
                details.destination_filename.as_deref(),
            )
            .await
        {
            Ok(result) => result,
            Err(e) => {
                if matches!(
                    e.downcast_ref::<TransmitterError>(),
                    Some(TransmitterError::UnknownPayload)
                ) {
                    warn!(
                        "Uploading file {} aborted since payload {} is not supported",
                        details.source_filename.display(),
                        details.payload_type
                    );
                    return Err(e);
                }
                return Err(e.context("could not generate SAS token"));
            }
        };

        match result.profile_type.as_str() {
            "azure" => {
                debug!("Got signed url for {}", details.source_filename.display());
                azure::upload_to_azure(&details.source_filename, &result.sas_url, &self.settings)
                    .await
            }
            "s3" => {
                debug!(
                    "Got upload key {} for {}",
                    result.key,
                    details.source_filename.display()
                );
                let message =
                    s3::upload_multipart(&details.source_filename, &result, &self.control, &self.settings)
                        .await?;
                debug!("{message}");
                Ok(())
            }
            other => Err(TransmitterError::UnknownResultType(other.to_string()).into()),
        }
    }
}
