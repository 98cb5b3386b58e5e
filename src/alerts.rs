//! Alert record builder for the detection pipeline.
//!
//! Builds the domain event objects the backend consumes alongside transmitted
//! payloads. This module does no I/O; records are serialized and shipped
//! elsewhere. Field names follow the backend's JSON contract.

use std::collections::HashMap;

use anyhow::{bail, Result};
use base64::prelude::{Engine, BASE64_STANDARD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha1::{Digest, Sha1};

/// Rendering hints for an attached blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobMetadata {
    pub render: bool,
}

/// A base64-encoded data attachment on an alert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobData {
    pub data: String,
    pub ext: String,
    pub name: String,
    pub mime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BlobMetadata>,
}

/// A detection alert record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Alert {
    pub action: String,
    pub name: String,
    pub devicephysical: String,
    pub devicevirtual: String,
    pub dst: String,
    #[serde(rename = "dest_ip", skip_serializing_if = "String::is_empty")]
    pub dest_ip: String,
    #[serde(rename = "dstport", skip_serializing_if = "String::is_empty")]
    pub dst_port: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub dvc: String,
    pub platform: String,
    pub protocol: String,
    #[serde(rename = "src_ip")]
    pub src_ip: String,
    pub src: String,
    pub sha: String,
    #[serde(rename = "shortdesc")]
    pub short_desc: String,
    #[serde(rename = "srcport", skip_serializing_if = "String::is_empty")]
    pub src_port: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub vendor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blobs: Option<Vec<BlobData>>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, Value>,
    pub date: String,
    pub timestamp: f64,
    #[serde(rename = "longdesc_md", skip_serializing_if = "String::is_empty")]
    pub longdesc_md: String,
    pub safe_html_click_desc: bool,
    pub safe_html_click_evid: bool,
    pub safe_html_render_desc: bool,
    pub safe_html_render_evid: bool,
}

impl Alert {
    /// Base alert with the safe-HTML defaults set.
    pub fn base() -> Self {
        Alert {
            safe_html_render_desc: true,
            safe_html_render_evid: true,
            ..Alert::default()
        }
    }

    /// Fingerprint the record: SHA-1 over its serialized form, hex-encoded.
    /// Alerts carrying blobs also get the fingerprint as their `pcapid`
    /// context key.
    pub fn set_sha(&mut self) -> Result<()> {
        let serialized = serde_json::to_vec(self)?;
        let mut hasher = Sha1::new();
        hasher.update(&serialized);
        self.sha = hex::encode(hasher.finalize());

        if self.blobs.is_some() {
            self.context
                .insert("pcapid".to_string(), Value::String(self.sha.clone()));
        }
        Ok(())
    }

    /// Mark the alert as carrying packet data collected at `src`.
    pub fn set_blob_properties(&mut self, src: &str) {
        self.context
            .insert("src".to_string(), Value::String(src.to_string()));
        self.context
            .insert("haspacketdata".to_string(), Value::Bool(true));
    }

    /// Attach a JSON document as a base64-encoded blob.
    pub fn add_json_data(&mut self, json: &[u8], name: &str, render: bool) {
        self.blobs.get_or_insert_with(Vec::new).push(BlobData {
            data: BASE64_STANDARD.encode(json),
            ext: "json".to_string(),
            name: name.to_string(),
            mime: "application/json".to_string(),
            metadata: Some(BlobMetadata { render }),
        });
    }

    /// Set both time fields from one instant.
    pub fn add_timestamp_fields(&mut self, at: DateTime<Utc>) {
        self.timestamp = at.timestamp() as f64;
        self.date = at.format("%Y-%m-%dT%H:%M:%S").to_string();
    }

    /// Check the required-field contract before handing the alert on.
    pub fn validate(&self) -> Result<()> {
        if self.timestamp == 0.0 {
            bail!("required field timestamp not set");
        }

        let required = [
            ("action", &self.action),
            ("name", &self.name),
            ("devicephysical", &self.devicephysical),
            ("devicevirtual", &self.devicevirtual),
            ("src", &self.src),
            ("dst", &self.dst),
            ("date", &self.date),
            ("sha", &self.sha),
            ("type", &self.alert_type),
            ("vendor", &self.vendor),
            ("platform", &self.platform),
            ("shortdesc", &self.short_desc),
        ];
        for (field, value) in required {
            if value.is_empty() {
                bail!("required field '{field}' not set");
            }
        }

        if self.longdesc_md.is_empty() && self.blobs.is_none() {
            bail!("either longdesc_md or blobs must be set");
        }

        if self.blobs.is_some() {
            for key in ["src", "haspacketdata", "pcapid"] {
                if !self.context.contains_key(key) {
                    bail!("missing context key {key}");
                }
            }
        }

        if self.action != "ACCEPT" && self.action != "BLOCK" {
            bail!("invalid action: {}", self.action);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn populated() -> Alert {
        let mut alert = Alert::base();
        alert.action = "ACCEPT".to_string();
        alert.name = "suspicious-login".to_string();
        alert.devicephysical = "fw-01".to_string();
        alert.devicevirtual = "vsys1".to_string();
        alert.src = "10.0.0.5".to_string();
        alert.dst = "203.0.113.9".to_string();
        alert.alert_type = "auth".to_string();
        alert.vendor = "acme".to_string();
        alert.platform = "ngfw".to_string();
        alert.short_desc = "login from unusual network".to_string();
        alert.longdesc_md = "## details".to_string();
        alert.add_timestamp_fields(Utc.with_ymd_and_hms(2023, 6, 1, 12, 30, 0).unwrap());
        alert.set_sha().unwrap();
        alert
    }

    #[test]
    fn test_base_sets_safe_html_defaults() {
        let alert = Alert::base();
        assert!(!alert.safe_html_click_desc);
        assert!(!alert.safe_html_click_evid);
        assert!(alert.safe_html_render_desc);
        assert!(alert.safe_html_render_evid);
    }

    #[test]
    fn test_populated_alert_validates() {
        populated().validate().unwrap();
    }

    #[test]
    fn test_timestamp_fields_format() {
        let mut alert = Alert::base();
        alert.add_timestamp_fields(Utc.with_ymd_and_hms(2023, 6, 1, 12, 30, 0).unwrap());
        assert_eq!(alert.date, "2023-06-01T12:30:00");
        assert_eq!(alert.timestamp, 1685622600.0);
    }

    #[test]
    fn test_set_sha_is_hex_sha1() {
        let alert = populated();
        assert_eq!(alert.sha.len(), 40);
        assert!(alert.sha.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_blob_alert_gets_pcapid() {
        let mut alert = populated();
        alert.add_json_data(br#"{"k": 1}"#, "evidence", true);
        alert.set_blob_properties("sensor-3");
        alert.set_sha().unwrap();
        assert_eq!(
            alert.context["pcapid"],
            Value::String(alert.sha.clone())
        );
        alert.validate().unwrap();
    }

    #[test]
    fn test_blob_alert_without_context_is_rejected() {
        let mut alert = populated();
        alert.add_json_data(b"{}", "evidence", false);
        alert.set_sha().unwrap();
        let err = alert.validate().unwrap_err();
        assert!(err.to_string().contains("context key"));
    }

    #[test]
    fn test_add_json_data_round_trips() {
        let mut alert = Alert::base();
        alert.add_json_data(br#"{"k": 1}"#, "evidence", true);
        let blob = &alert.blobs.as_ref().unwrap()[0];
        assert_eq!(blob.ext, "json");
        assert_eq!(blob.mime, "application/json");
        let decoded = BASE64_STANDARD.decode(&blob.data).unwrap();
        assert_eq!(decoded, br#"{"k": 1}"#);
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let mut alert = populated();
        alert.vendor.clear();
        let err = alert.validate().unwrap_err();
        assert!(err.to_string().contains("vendor"));
    }

    #[test]
    fn test_invalid_action_is_rejected() {
        let mut alert = populated();
        alert.action = "DROP".to_string();
        assert!(alert.validate().is_err());
    }

    #[test]
    fn test_missing_timestamp_is_rejected() {
        let mut alert = populated();
        alert.timestamp = 0.0;
        assert!(alert.validate().is_err());
    }

    #[test]
    fn test_serialized_field_names() {
        let body = serde_json::to_value(populated()).unwrap();
        assert!(body.get("shortdesc").is_some());
        assert!(body.get("type").is_some());
        assert!(body.get("safe_html_render_desc").is_some());
        // omitempty fields stay off the wire when unset
        assert!(body.get("dstport").is_none());
        assert!(body.get("blobs").is_none());
    }
}
