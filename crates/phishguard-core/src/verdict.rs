//! Verdict model shared by the relay, the session registry and the renderer.

use serde::{Deserialize, Serialize};

/// Upper bound of the risk scale.
pub const MAX_RISK_SCORE: u8 = 100;

/// Risk classification reported by the analysis service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Safe,
    Suspicious,
    Phishing,
    Unknown,
}

impl Classification {
    /// Map a service label onto a classification.
    ///
    /// Matching is exact; any other or absent label is `Unknown`.
    #[must_use]
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("Safe") => Self::Safe,
            Some("Suspicious") => Self::Suspicious,
            Some("Phishing") => Self::Phishing,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "Safe",
            Self::Suspicious => "Suspicious",
            Self::Phishing => "Phishing",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of analyzing one page address. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub classification: Classification,
    /// 0..=100
    pub risk_score: u8,
    pub reasons: Vec<String>,
}

impl Verdict {
    #[must_use]
    pub fn new(classification: Classification, risk_score: f64, reasons: Vec<String>) -> Self {
        Self {
            classification,
            risk_score: clamp_score(risk_score),
            reasons,
        }
    }

    /// Synthetic verdict used when no information could be obtained.
    #[must_use]
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self {
            classification: Classification::Unknown,
            risk_score: 0,
            reasons: vec![reason.into()],
        }
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.classification == Classification::Unknown
    }
}

fn clamp_score(score: f64) -> u8 {
    if score.is_nan() {
        return 0;
    }
    score.round().clamp(0.0, f64::from(MAX_RISK_SCORE)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_map_exactly() {
        assert_eq!(Classification::from_label(Some("Safe")), Classification::Safe);
        assert_eq!(
            Classification::from_label(Some("Suspicious")),
            Classification::Suspicious
        );
        assert_eq!(
            Classification::from_label(Some("Phishing")),
            Classification::Phishing
        );
        assert_eq!(Classification::from_label(Some("safe")), Classification::Unknown);
        assert_eq!(Classification::from_label(Some("Error")), Classification::Unknown);
        assert_eq!(Classification::from_label(None), Classification::Unknown);
    }

    #[test]
    fn scores_are_clamped_and_rounded() {
        assert_eq!(Verdict::new(Classification::Safe, -4.0, vec![]).risk_score, 0);
        assert_eq!(Verdict::new(Classification::Safe, 42.6, vec![]).risk_score, 43);
        assert_eq!(
            Verdict::new(Classification::Phishing, 250.0, vec![]).risk_score,
            MAX_RISK_SCORE
        );
        assert_eq!(Verdict::new(Classification::Safe, f64::NAN, vec![]).risk_score, 0);
    }

    #[test]
    fn unknown_verdict_carries_reason() {
        let verdict = Verdict::unknown("relay timed out");
        assert!(verdict.is_unknown());
        assert_eq!(verdict.risk_score, 0);
        assert_eq!(verdict.reasons, vec!["relay timed out".to_string()]);
    }
}
