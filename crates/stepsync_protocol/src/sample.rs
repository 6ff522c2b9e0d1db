//! The transferred sample record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One raw event in its wire representation.
///
/// Dates are RFC 3339 / ISO 8601 in UTC. `sourceDeviceName` is omitted from
/// the JSON when unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    /// Identifier of the source event, stable across re-fetches.
    pub uuid: String,
    /// Event start.
    pub start_date: DateTime<Utc>,
    /// Event end.
    pub end_date: DateTime<Utc>,
    /// Units counted by the event.
    pub count: u64,
    /// Identifier of the producing application.
    pub source_bundle_id: String,
    /// Name of the recording device, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_device_name: Option<String>,
}
