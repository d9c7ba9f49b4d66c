//! ML service request/response types.

use std::collections::HashMap;

use serde_json::Value;

use csense_models::{Diagnosis, UNKNOWN_DIAGNOSIS};

use crate::error::{MlError, MlResult};

/// Multipart field carrying the image bytes.
pub const FILE_FIELD: &str = "file";
/// Filename sent with the image part.
pub const FILE_NAME: &str = "xray.jpg";

/// Request for a single chest X-ray classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// Image bytes (JPEG)
    pub image: Vec<u8>,
    /// Where the same image is already stored
    pub image_url: String,
    /// Ask the service for an attention heatmap
    pub request_heatmap: bool,
}

impl AnalysisRequest {
    pub fn new(image: impl Into<Vec<u8>>, image_url: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            image_url: image_url.into(),
            request_heatmap: false,
        }
    }

    pub fn with_heatmap(mut self, request_heatmap: bool) -> Self {
        self.request_heatmap = request_heatmap;
        self
    }

    /// Wire form of the heatmap flag.
    pub fn heatmap_field(&self) -> &'static str {
        if self.request_heatmap {
            "true"
        } else {
            "false"
        }
    }
}

/// Extract a diagnosis from a successful `/analyze` response body.
///
/// The body must be a JSON object. Missing or mistyped fields fall back to
/// defaults: `"Unknown"` label, `0.0` confidence, no class scores, no heatmap.
/// Class score entries with non-numeric values are dropped.
pub fn parse_diagnosis(body: &Value) -> MlResult<Diagnosis> {
    let obj = body.as_object().ok_or_else(|| {
        MlError::InvalidResponse(format!("expected JSON object, got {}", json_kind(body)))
    })?;

    let label = obj
        .get("diagnosis")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_DIAGNOSIS)
        .to_string();

    let confidence = obj.get("confidence").and_then(Value::as_f64).unwrap_or(0.0);

    let class_scores: HashMap<String, f64> = obj
        .get("class_scores")
        .and_then(Value::as_object)
        .map(|scores| {
            scores
                .iter()
                .filter_map(|(k, v)| v.as_f64().map(|p| (k.clone(), p)))
                .collect()
        })
        .unwrap_or_default();

    let heatmap_url = obj
        .get("heatmap_url")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(Diagnosis {
        label,
        confidence,
        class_scores,
        heatmap_url,
    })
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_response() {
        let d = parse_diagnosis(&json!({
            "diagnosis": "Normal",
            "confidence": 0.81,
            "class_scores": {"Normal": 0.81, "Pneumonia": 0.19},
            "heatmap_url": "https://cdn/heat.png"
        }))
        .unwrap();

        assert_eq!(d.label, "Normal");
        assert_eq!(d.confidence, 0.81);
        assert_eq!(d.class_scores["Pneumonia"], 0.19);
        assert_eq!(d.heatmap_url.as_deref(), Some("https://cdn/heat.png"));
    }

    #[test]
    fn test_parse_empty_object_uses_defaults() {
        let d = parse_diagnosis(&json!({})).unwrap();
        assert_eq!(d.label, UNKNOWN_DIAGNOSIS);
        assert_eq!(d.confidence, 0.0);
        assert!(d.class_scores.is_empty());
        assert!(d.heatmap_url.is_none());
    }

    #[test]
    fn test_parse_wrong_types_use_defaults() {
        let d = parse_diagnosis(&json!({
            "diagnosis": 42,
            "confidence": "high",
            "class_scores": [0.1, 0.9],
            "heatmap_url": false
        }))
        .unwrap();

        assert_eq!(d.label, UNKNOWN_DIAGNOSIS);
        assert_eq!(d.confidence, 0.0);
        assert!(d.class_scores.is_empty());
        assert!(d.heatmap_url.is_none());
    }

    #[test]
    fn test_parse_integer_confidence() {
        let d = parse_diagnosis(&json!({"confidence": 1})).unwrap();
        assert_eq!(d.confidence, 1.0);
    }

    #[test]
    fn test_parse_drops_non_numeric_scores() {
        let d = parse_diagnosis(&json!({
            "class_scores": {"Normal": 0.7, "Pneumonia": "n/a", "COVID-19": null, "TB": 0}
        }))
        .unwrap();

        assert_eq!(d.class_scores.len(), 2);
        assert_eq!(d.class_scores["Normal"], 0.7);
        assert_eq!(d.class_scores["TB"], 0.0);
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let err = parse_diagnosis(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, MlError::InvalidResponse(_)));
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn test_heatmap_field() {
        let req = AnalysisRequest::new(vec![1], "u");
        assert_eq!(req.heatmap_field(), "false");
        assert_eq!(req.with_heatmap(true).heatmap_field(), "true");
    }
}
