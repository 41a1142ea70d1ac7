//! Analysis report payload model.
//!
//! Only the fields the engine inspects are typed; everything else the
//! service returns is kept in the flattened `extra` maps so a saved report
//! is the full payload, not a projection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One resolved endpoint under assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(rename = "statusMessage", skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    /// Estimated seconds until this endpoint's assessment completes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Endpoint {
    /// The service marks a usable endpoint with this exact message.
    pub fn is_ready(&self) -> bool {
        self.status_message.as_deref() == Some("Ready")
    }
}

/// A parsed response from the analysis endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeReport {
    /// `READY`, `ERROR`, or an in-progress value such as `IN_PROGRESS`.
    pub status: String,
    #[serde(rename = "statusMessage", skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<Endpoint>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl AnalyzeReport {
    pub fn is_ready(&self) -> bool {
        self.status == "READY"
    }

    pub fn is_error(&self) -> bool {
        self.status == "ERROR"
    }

    /// Endpoints slice, empty when the field is absent.
    pub fn endpoints(&self) -> &[Endpoint] {
        self.endpoints.as_deref().unwrap_or_default()
    }
}
