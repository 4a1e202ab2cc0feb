//! Wire formats: the relay message pair that crosses the privilege boundary
//! and the analysis service records carried inside it.
//!
//! ```text
//! request  {"type":"ANALYZE_URL","url":"https://..."}
//! success  {"success":true,"data":{"result":{"verdict":"Safe","risk_score":5,"reasons":[..]}}}
//! failure  {"success":false,"error":"..."}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, RelayErrorKind};
use crate::verdict::{Classification, Verdict};

/// Message tag for analysis requests.
pub const ANALYZE_URL: &str = "ANALYZE_URL";

/// Request sent from the unprivileged observer to the privileged relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayRequest {
    #[serde(rename = "ANALYZE_URL")]
    AnalyzeUrl { url: String },
}

impl RelayRequest {
    #[must_use]
    pub fn analyze(url: impl Into<String>) -> Self {
        Self::AnalyzeUrl { url: url.into() }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Reply from the privileged relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AnalysisEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Failure class on the privileged side; absent from older relays.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<RelayErrorKind>,
}

impl RelayResponse {
    #[must_use]
    pub fn ok(data: AnalysisEntry) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
        }
    }

    #[must_use]
    pub fn failure(err: &RelayError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a raw reply and collapse it into a verdict or a typed failure.
    pub fn decode(raw: &str) -> Result<Verdict, RelayError> {
        let response: Self =
            serde_json::from_str(raw).map_err(|e| RelayError::Malformed(e.to_string()))?;
        response.into_result()
    }

    pub fn into_result(self) -> Result<Verdict, RelayError> {
        if !self.success {
            return Err(RelayError::Remote {
                kind: self.error_kind.unwrap_or(RelayErrorKind::Transport),
                message: self
                    .error
                    .unwrap_or_else(|| "unspecified relay failure".to_string()),
            });
        }
        self.data
            .ok_or(RelayError::MissingField("data"))?
            .verdict()
    }
}

/// Body of `POST /analyze`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzeBody {
    pub url: String,
}

/// One record produced by the analysis service (also the `/history` element).
///
/// Every field tolerates absence; the service owns the schema.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub used_ai: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_error: Option<String>,
}

impl AnalysisEntry {
    /// Extract the verdict. A missing `result` or `verdict` is a protocol error.
    pub fn verdict(&self) -> Result<Verdict, RelayError> {
        let result = self
            .result
            .as_ref()
            .ok_or(RelayError::MissingField("result"))?;
        let label = result
            .verdict
            .as_deref()
            .ok_or(RelayError::MissingField("verdict"))?;
        Ok(Verdict::new(
            Classification::from_label(Some(label)),
            result.risk_score.unwrap_or(0.0),
            result.reasons.clone().unwrap_or_default(),
        ))
    }

    /// Classification for display, `Unknown` when absent.
    #[must_use]
    pub fn classification(&self) -> Classification {
        Classification::from_label(self.result.as_ref().and_then(|r| r.verdict.as_deref()))
    }
}

/// `result` object of an analysis record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasons: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}
