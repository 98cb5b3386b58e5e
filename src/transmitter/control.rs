//! Control-plane client for the ingestion service.
//!
//! All four logical operations share a single `POST {url}/cts/payload`
//! endpoint and are distinguished by the request body. Wire field names are
//! part of the server contract and must stay bit-exact. Errors from this layer
//! are never retried here; retry policy belongs to the uploaders.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{Credentials, Settings};
use crate::constants::{CONTROL_TIMEOUT_SECS, PAYLOAD_ENDPOINT};
use crate::errors::TransmitterError;

const EVENT_GET_SIGNED_URL: &str = "GET_SIGNED_URL";
const EVENT_COMPLETE_MULTIPART_UPLOAD: &str = "COMPLETE_MULTIPART_UPLOAD";
const EVENT_ABORT_MULTIPART_UPLOAD: &str = "ABORT_MULTIPART_UPLOAD";

/// Answer to a request-SAS call. `profile_type` selects the upload branch;
/// `key` and `upload_id` are opaque and echoed back on every multipart call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SasResult {
    #[serde(default)]
    pub sas_url: String,
    #[serde(default)]
    pub profile_type: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub upload_id: String,
    #[serde(default)]
    pub blob_id: String,
}

/// A completed part as echoed back in the commit payload. The capitalized
/// field names are what the server expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedPart {
    #[serde(rename = "ETag")]
    pub etag: String,
    #[serde(rename = "PartNumber")]
    pub part_number: i64,
}

#[derive(Serialize)]
struct SasRequest<'a> {
    payload: &'a str,
    profile: &'a str,
    suffix: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<&'a str>,
}

#[derive(Serialize)]
struct SignedUrlRequest<'a> {
    event_type: &'static str,
    key: &'a str,
    upload_id: &'a str,
    part: i64,
}

#[derive(Debug, Deserialize)]
struct SignedUrlMessage {
    signed_url: String,
}

#[derive(Serialize)]
struct CompleteRequest<'a> {
    event_type: &'static str,
    key: &'a str,
    upload_id: &'a str,
    parts: &'a [UploadedPart],
}

#[derive(Serialize)]
struct AbortRequest<'a> {
    event_type: &'static str,
    key: &'a str,
    upload_id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct UploadMessage {
    #[serde(rename = "Message", default)]
    message: String,
}

/// JSON client for the ingestion control plane.
///
/// Owns its HTTP transport: the 10 s request timeout and the optional insecure
/// TLS mode apply to this client only.
#[derive(Debug)]
pub struct ControlClient {
    http: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
}

impl ControlClient {
    pub fn new(credentials: &Credentials, settings: &Settings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(CONTROL_TIMEOUT_SECS))
            .danger_accept_invalid_certs(settings.allow_insecure_tls)
            .build()
            .context("Failed to build control-plane HTTP client")?;

        Ok(Self {
            http,
            endpoint: format!("{}{}", credentials.url, PAYLOAD_ENDPOINT),
            headers: identity_headers(credentials)?,
        })
    }

    /// Request a SAS for `payload`. A 415 answer means the payload tag is
    /// unknown to the server and maps to [`TransmitterError::UnknownPayload`].
    pub async fn request_sas(
        &self,
        payload: &str,
        profile: &str,
        suffix: &str,
        filename: Option<&str>,
    ) -> Result<SasResult> {
        let (status, body) = self
            .send(&SasRequest {
                payload,
                profile,
                suffix,
                filename,
            })
            .await?;
        classify_sas_response(status, &body)
    }

    /// Fetch the pre-signed PUT URL for one part of an open multipart upload.
    pub async fn get_signed_url(&self, key: &str, upload_id: &str, part: i64) -> Result<String> {
        let message: SignedUrlMessage = self
            .send_expect_ok(&SignedUrlRequest {
                event_type: EVENT_GET_SIGNED_URL,
                key,
                upload_id,
                part,
            })
            .await?;
        Ok(message.signed_url)
    }

    /// Commit a multipart upload. `parts` must be the complete set, sorted
    /// ascending by part number.
    pub async fn complete_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> Result<String> {
        let message: UploadMessage = self
            .send_expect_ok(&CompleteRequest {
                event_type: EVENT_COMPLETE_MULTIPART_UPLOAD,
                key,
                upload_id,
                parts,
            })
            .await?;
        Ok(message.message)
    }

    /// Abort a multipart upload, discarding all parts on the server side.
    pub async fn abort_upload(&self, key: &str, upload_id: &str) -> Result<String> {
        let message: UploadMessage = self
            .send_expect_ok(&AbortRequest {
                event_type: EVENT_ABORT_MULTIPART_UPLOAD,
                key,
                upload_id,
            })
            .await?;
        Ok(message.message)
    }

    async fn send<B: Serialize>(&self, body: &B) -> Result<(u16, bytes::Bytes)> {
        let response = self
            .http
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await
            .context("control-plane request failed")?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .context("failed to read control-plane response")?;
        Ok((status, body))
    }

    async fn send_expect_ok<B: Serialize, T: DeserializeOwned>(&self, body: &B) -> Result<T> {
        let (status, body) = self.send(body).await?;
        classify_ok_response(status, &body)
    }
}

/// Identity headers sent with every control-plane call. Both the canonical and
/// the legacy spelling go out; the server has historically accepted either.
fn identity_headers(credentials: &Credentials) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        "x-api-key",
        HeaderValue::from_str(&credentials.api_key).context("api_key is not a valid header")?,
    );
    headers.insert(
        "passkey",
        HeaderValue::from_str(&credentials.passkey).context("passkey is not a valid header")?,
    );

    if !credentials.integration_id.is_empty() {
        let id = HeaderValue::from_str(&credentials.integration_id)
            .context("integration_id is not a valid header")?;
        headers.insert("integration_id", id.clone());
        headers.insert("integrationid", id);
    } else {
        let id = HeaderValue::from_str(&credentials.device_id)
            .context("device_id is not a valid header")?;
        headers.insert("device_id", id.clone());
        headers.insert("deviceid", id);
    }
    Ok(headers)
}

fn classify_sas_response(status: u16, body: &[u8]) -> Result<SasResult> {
    match status {
        200 => serde_json::from_slice(body).context("malformed SAS response"),
        415 => Err(TransmitterError::UnknownPayload.into()),
        _ => Err(TransmitterError::ControlPlane {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
        .into()),
    }
}

fn classify_ok_response<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T> {
    if status != 200 {
        return Err(TransmitterError::ControlPlane {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        }
        .into());
    }
    serde_json::from_slice(body).context("malformed control-plane response")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn credentials() -> Credentials {
        Credentials {
            url: "https://ingest.example.com".to_string(),
            api_key: "key".to_string(),
            passkey: "pass".to_string(),
            device_id: "dev-1".to_string(),
            integration_id: String::new(),
        }
    }

    #[test]
    fn test_sas_request_wire_shape() {
        let body = serde_json::to_value(SasRequest {
            payload: "pcap",
            profile: "default",
            suffix: "pcap",
            filename: None,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"payload": "pcap", "profile": "default", "suffix": "pcap"})
        );
    }

    #[test]
    fn test_sas_request_with_filename() {
        let body = serde_json::to_value(SasRequest {
            payload: "syslog",
            profile: "default",
            suffix: "log",
            filename: Some("renamed.log"),
        })
        .unwrap();
        assert_eq!(body["filename"], "renamed.log");
    }

    #[test]
    fn test_uploaded_part_wire_shape() {
        let body = serde_json::to_value(UploadedPart {
            etag: "\"abc\"".to_string(),
            part_number: 1,
        })
        .unwrap();
        assert_eq!(body, json!({"ETag": "\"abc\"", "PartNumber": 1}));
    }

    #[test]
    fn test_complete_request_wire_shape() {
        let parts = vec![UploadedPart {
            etag: "\"abc\"".to_string(),
            part_number: 1,
        }];
        let body = serde_json::to_value(CompleteRequest {
            event_type: EVENT_COMPLETE_MULTIPART_UPLOAD,
            key: "k1",
            upload_id: "u1",
            parts: &parts,
        })
        .unwrap();
        assert_eq!(body["event_type"], "COMPLETE_MULTIPART_UPLOAD");
        assert_eq!(body["key"], "k1");
        assert_eq!(body["upload_id"], "u1");
        assert_eq!(body["parts"][0]["PartNumber"], 1);
    }

    #[test]
    fn test_abort_request_wire_shape() {
        let body = serde_json::to_value(AbortRequest {
            event_type: EVENT_ABORT_MULTIPART_UPLOAD,
            key: "k1",
            upload_id: "u1",
        })
        .unwrap();
        assert_eq!(
            body,
            json!({"event_type": "ABORT_MULTIPART_UPLOAD", "key": "k1", "upload_id": "u1"})
        );
    }

    #[test]
    fn test_signed_url_request_wire_shape() {
        let body = serde_json::to_value(SignedUrlRequest {
            event_type: EVENT_GET_SIGNED_URL,
            key: "k1",
            upload_id: "u1",
            part: 7,
        })
        .unwrap();
        assert_eq!(body["event_type"], "GET_SIGNED_URL");
        assert_eq!(body["part"], 7);
    }

    #[test]
    fn test_sas_result_tolerates_missing_fields() {
        let result: SasResult =
            serde_json::from_str(r#"{"profile_type": "azure", "sas_url": "https://x/y?sig=z"}"#)
                .unwrap();
        assert_eq!(result.profile_type, "azure");
        assert!(result.key.is_empty());
        assert!(result.upload_id.is_empty());
    }

    #[test]
    fn test_classify_sas_415_is_unknown_payload() {
        let err = classify_sas_response(415, b"").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TransmitterError>(),
            Some(TransmitterError::UnknownPayload)
        ));
    }

    #[test]
    fn test_classify_sas_other_status_captures_body() {
        let err = classify_sas_response(500, b"boom").unwrap_err();
        match err.downcast_ref::<TransmitterError>() {
            Some(TransmitterError::ControlPlane { status, body }) => {
                assert_eq!(*status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_classify_ok_parses_message() {
        let message: UploadMessage =
            classify_ok_response(200, br#"{"Message": "upload complete"}"#).unwrap();
        assert_eq!(message.message, "upload complete");
    }

    #[test]
    fn test_device_identity_headers_sent_in_both_spellings() {
        let headers = identity_headers(&credentials()).unwrap();
        assert_eq!(headers.get("device_id").unwrap(), "dev-1");
        assert_eq!(headers.get("deviceid").unwrap(), "dev-1");
        assert!(headers.get("integration_id").is_none());
    }

    #[test]
    fn test_integration_identity_wins() {
        let mut credentials = credentials();
        credentials.integration_id = "int-9".to_string();
        let headers = identity_headers(&credentials).unwrap();
        assert_eq!(headers.get("integration_id").unwrap(), "int-9");
        assert_eq!(headers.get("integrationid").unwrap(), "int-9");
        assert!(headers.get("device_id").is_none());
    }

    #[test]
    fn test_endpoint_path() {
        let settings = Settings::default();
        let client = ControlClient::new(&credentials(), &settings).unwrap();
        assert_eq!(
            client.endpoint,
            "https://ingest.example.com/cts/payload"
        );
    }
}
