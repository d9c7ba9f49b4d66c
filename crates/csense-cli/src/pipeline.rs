//! Upload-and-analyze flow for a single X-ray.

use std::time::Duration;

use tracing::{info, info_span, warn, Instrument};

use csense_firestore::{AnalysisRepository, AnalysisSubscription, FirestoreClient};
use csense_ml_client::MlClient;
use csense_models::{AnalysisRecord, AnalysisRecordUpdate, AnalysisResult, ImagePayload};
use csense_storage::StorageClient;

use crate::error::{PipelineError, PipelineResult};

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// Stored record, already reflecting the analysis outcome
    pub record: AnalysisRecord,
    pub result: AnalysisResult,
}

/// Uploads an X-ray, tracks it as an analysis record and classifies it.
#[derive(Clone)]
pub struct AnalysisPipeline {
    storage: StorageClient,
    analyses: AnalysisRepository,
    ml: MlClient,
}

impl AnalysisPipeline {
    pub fn new(storage: StorageClient, analyses: AnalysisRepository, ml: MlClient) -> Self {
        Self {
            storage,
            analyses,
            ml,
        }
    }

    /// Build every collaborator from environment variables.
    pub async fn from_env() -> PipelineResult<Self> {
        let storage = StorageClient::from_env()?;
        let analyses = AnalysisRepository::new(FirestoreClient::from_env().await?);
        let ml = MlClient::from_env().map_err(|e| PipelineError::ConfigError(e.to_string()))?;
        Ok(Self::new(storage, analyses, ml))
    }

    /// Run the full flow for one image.
    ///
    /// Storage and record-keeping failures abort the run. A failed analysis
    /// does not: the record is marked `error` and the failure is returned in
    /// the outcome.
    pub async fn run(
        &self,
        user_id: &str,
        payload: ImagePayload,
        request_heatmap: bool,
    ) -> PipelineResult<PipelineOutcome> {
        let span = info_span!("analysis_pipeline", user_id = %user_id);

        async {
            let image = payload.into_bytes().await?;

            let image_url = self
                .storage
                .upload_xray(user_id, ImagePayload::from_bytes(image.clone()), None)
                .await?;

            let mut record = AnalysisRecord::pending(user_id, image_url.clone());
            record.id = self.analyses.save(&record).await?;

            let result = self.ml.submit(image, image_url, request_heatmap).await;

            self.analyses
                .update(&record.id, &AnalysisRecordUpdate::from_outcome(&result))
                .await?;
            record.apply_outcome(&result);

            match &result {
                AnalysisResult::Success(d) => {
                    info!(analysis_id = %record.id, diagnosis = %d.label, confidence = d.confidence, "Analysis complete")
                }
                AnalysisResult::Failure { message } => {
                    warn!(analysis_id = %record.id, "Analysis failed: {}", message)
                }
            }

            Ok::<_, PipelineError>(PipelineOutcome { record, result })
        }
        .instrument(span)
        .await
    }

    /// A user's records, newest first.
    pub async fn history(&self, user_id: &str) -> PipelineResult<Vec<AnalysisRecord>> {
        Ok(self.analyses.list_for_user(user_id).await?)
    }

    /// Live feed of a user's records.
    pub fn watch(&self, user_id: &str, poll_interval: Duration) -> AnalysisSubscription {
        self.analyses.watch_user(user_id, poll_interval)
    }
}
