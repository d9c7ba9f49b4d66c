//! Terminal output for analysis results and records.

use csense_models::{AnalysisRecord, AnalysisStatus};

/// One history line: time, status, outcome and record ID.
pub fn history_line(record: &AnalysisRecord) -> String {
    let when = record.created_at.format("%Y-%m-%d %H:%M");
    let outcome = match record.status {
        AnalysisStatus::Complete => format!(
            "{} ({:.1}%)",
            record.diagnosis,
            record.confidence * 100.0
        ),
        AnalysisStatus::Error => record
            .error_message
            .clone()
            .unwrap_or_else(|| "analysis failed".to_string()),
        AnalysisStatus::Pending => "awaiting result".to_string(),
    };
    format!("{}  {:<8}  {}  [{}]", when, record.status.as_str(), outcome, record.id)
}

/// Per-class scores, best first, one per line.
pub fn score_lines(record: &AnalysisRecord) -> Vec<String> {
    record
        .ranked_scores()
        .into_iter()
        .map(|(label, score)| format!("  {:<12} {:>5.1}%", label, score * 100.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use csense_models::{AnalysisResult, Diagnosis};
    use std::collections::HashMap;

    fn record() -> AnalysisRecord {
        let mut r = AnalysisRecord::pending("u1", "https://store/x.jpg");
        r.id = "rec1".to_string();
        r.created_at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        r
    }

    #[test]
    fn test_pending_line() {
        assert_eq!(
            history_line(&record()),
            "2023-11-14 22:13  pending   awaiting result  [rec1]"
        );
    }

    #[test]
    fn test_complete_line_and_scores() {
        let mut r = record();
        r.apply_outcome(&AnalysisResult::Success(Diagnosis {
            label: "Pneumonia".to_string(),
            confidence: 0.94,
            class_scores: HashMap::from([
                ("Normal".to_string(), 0.04),
                ("Pneumonia".to_string(), 0.94),
            ]),
            heatmap_url: None,
        }));

        assert!(history_line(&r).contains("complete  Pneumonia (94.0%)"));
        let lines = score_lines(&r);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Pneumonia"));
        assert!(lines[1].contains("4.0%"));
    }

    #[test]
    fn test_error_line_shows_message() {
        let mut r = record();
        r.apply_outcome(&AnalysisResult::failure("Server returned 500. Check your ML endpoint."));
        assert!(history_line(&r).contains("error     Server returned 500"));
    }
}
