//! Health Discovery REST API models

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope of every Health Discovery REST response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    /// Raw annotation records for `analyseText`/`analyseHtml`
    #[serde(default)]
    pub payload: Value,

    #[serde(default)]
    pub error_messages: Vec<String>,
}

impl AnalysisResponse {
    /// Payload as a list of records; anything but an array reads as empty
    pub fn into_records(self) -> Vec<Value> {
        match self.payload {
            Value::Array(records) => records,
            _ => Vec::new(),
        }
    }
}
