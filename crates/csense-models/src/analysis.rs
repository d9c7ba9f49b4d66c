//! Chest X-ray analysis models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Label used when the classifier does not report a diagnosis.
pub const UNKNOWN_DIAGNOSIS: &str = "Unknown";

/// Classification produced by the remote analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Top label, e.g. "Pneumonia", "Normal", "COVID-19"
    pub label: String,
    /// Confidence of the top label (0.0 - 1.0)
    pub confidence: f64,
    /// Probability per class label
    #[serde(default)]
    pub class_scores: HashMap<String, f64>,
    /// Attention overlay image, when requested and computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heatmap_url: Option<String>,
}

/// Outcome of a single analysis submission.
///
/// Either a full diagnosis or a single failure message, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnalysisResult {
    Success(Diagnosis),
    Failure { message: String },
}

impl AnalysisResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisResult::Success(_))
    }

    pub fn diagnosis(&self) -> Option<&Diagnosis> {
        match self {
            AnalysisResult::Success(d) => Some(d),
            AnalysisResult::Failure { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            AnalysisResult::Success(_) => None,
            AnalysisResult::Failure { message } => Some(message),
        }
    }
}

/// Lifecycle of a persisted analysis record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Image uploaded, classification not finished
    #[default]
    Pending,
    Complete,
    Error,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Complete => "complete",
            AnalysisStatus::Error => "error",
        }
    }

    /// Parse a stored status. Unknown values are treated as `Pending`.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "complete" => AnalysisStatus::Complete,
            "error" => AnalysisStatus::Error,
            _ => AnalysisStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisStatus::Complete | AnalysisStatus::Error)
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Analysis record stored in the `analyses` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    /// Document ID (empty until saved)
    #[serde(default)]
    pub id: String,
    /// Owner
    pub user_id: String,
    /// Uploaded X-ray location
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heatmap_url: Option<String>,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub class_scores: HashMap<String, f64>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl AnalysisRecord {
    /// New pending record for an uploaded image.
    pub fn pending(user_id: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            user_id: user_id.into(),
            image_url: image_url.into(),
            heatmap_url: None,
            diagnosis: String::new(),
            confidence: 0.0,
            class_scores: HashMap::new(),
            created_at: Utc::now(),
            status: AnalysisStatus::Pending,
            error_message: None,
        }
    }

    /// Apply an analysis outcome, moving the record to a terminal status.
    pub fn apply_outcome(&mut self, result: &AnalysisResult) {
        let update = AnalysisRecordUpdate::from_outcome(result);
        self.apply_update(update);
    }

    /// Merge a partial update into this record.
    pub fn apply_update(&mut self, update: AnalysisRecordUpdate) {
        if let Some(diagnosis) = update.diagnosis {
            self.diagnosis = diagnosis;
        }
        if let Some(confidence) = update.confidence {
            self.confidence = confidence;
        }
        if let Some(scores) = update.class_scores {
            self.class_scores = scores;
        }
        if let Some(heatmap) = update.heatmap_url {
            self.heatmap_url = heatmap;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(message) = update.error_message {
            self.error_message = message;
        }
    }

    /// Created-at as milliseconds since the Unix epoch (stored form).
    pub fn created_at_millis(&self) -> i64 {
        self.created_at.timestamp_millis()
    }

    /// Class scores sorted by descending probability.
    pub fn ranked_scores(&self) -> Vec<(&str, f64)> {
        let mut scores: Vec<(&str, f64)> = self
            .class_scores
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
            .collect();
        scores.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        scores
    }
}

/// Partial update of an analysis record.
///
/// Outer `None` leaves the field untouched; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisRecordUpdate {
    pub diagnosis: Option<String>,
    pub confidence: Option<f64>,
    pub class_scores: Option<HashMap<String, f64>>,
    pub heatmap_url: Option<Option<String>>,
    pub status: Option<AnalysisStatus>,
    pub error_message: Option<Option<String>>,
}

impl AnalysisRecordUpdate {
    /// Update that records the outcome of an analysis.
    pub fn from_outcome(result: &AnalysisResult) -> Self {
        match result {
            AnalysisResult::Success(d) => Self {
                diagnosis: Some(d.label.clone()),
                confidence: Some(d.confidence),
                class_scores: Some(d.class_scores.clone()),
                heatmap_url: Some(d.heatmap_url.clone()),
                status: Some(AnalysisStatus::Complete),
                error_message: Some(None),
            },
            AnalysisResult::Failure { message } => Self {
                status: Some(AnalysisStatus::Error),
                error_message: Some(Some(message.clone())),
                ..Default::default()
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
