//! Repository for analysis records and the per-user subscription feed.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use csense_models::{AnalysisRecord, AnalysisRecordUpdate, AnalysisStatus};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_subscription_update;
use crate::types::{Document, StructuredQuery, ToFirestoreValue, Value};

const ANALYSES_COLLECTION: &str = "analyses";

/// Shortest poll period for [`AnalysisRepository::watch_user`].
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Repository for `analyses/{id}` documents.
#[derive(Clone)]
pub struct AnalysisRepository {
    client: FirestoreClient,
}

impl AnalysisRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    /// Store a new record under a generated ID and return that ID.
    pub async fn save(&self, record: &AnalysisRecord) -> FirestoreResult<String> {
        let doc = self
            .client
            .add_document(ANALYSES_COLLECTION, record_to_fields(record))
            .await?;

        let id = doc
            .id()
            .ok_or_else(|| FirestoreError::invalid_response("created analysis has no ID"))?
            .to_string();

        info!(analysis_id = %id, user_id = %record.user_id, status = %record.status, "Saved analysis record");
        Ok(id)
    }

    /// Merge the set fields of `update` into an existing record.
    pub async fn update(&self, id: &str, update: &AnalysisRecordUpdate) -> FirestoreResult<()> {
        if update.is_empty() {
            debug!(analysis_id = %id, "Empty analysis update, skipping");
            return Ok(());
        }

        let fields = update_to_fields(update);
        let mask: Vec<String> = fields.keys().cloned().collect();

        self.client
            .update_document(ANALYSES_COLLECTION, id, fields, mask)
            .await?;
        Ok(())
    }

    /// Load one record. Missing records are `Ok(None)`.
    pub async fn get(&self, id: &str) -> FirestoreResult<Option<AnalysisRecord>> {
        let doc = self.client.get_document(ANALYSES_COLLECTION, id).await?;
        Ok(doc.map(|d| document_to_record(id, &d)))
    }

    /// Remove a record. Removing a missing record succeeds.
    pub async fn delete(&self, id: &str) -> FirestoreResult<()> {
        self.client.delete_document(ANALYSES_COLLECTION, id).await
    }

    /// All records of a user, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> FirestoreResult<Vec<AnalysisRecord>> {
        let query = StructuredQuery::equal_ordered_desc(
            ANALYSES_COLLECTION,
            "userId",
            user_id.to_firestore_value(),
            "createdAt",
        );

        let docs = self.client.run_query(query).await?;

        Ok(docs
            .iter()
            .filter_map(|d| match d.id() {
                Some(id) => Some(document_to_record(id, d)),
                None => {
                    warn!(user_id = %user_id, "Skipping analysis document without name");
                    None
                }
            })
            .collect())
    }

    /// Follow a user's records, newest first.
    ///
    /// The query is re-run every `poll_interval`; subscribers are notified
    /// after the first successful poll and whenever the result set changes.
    /// Poll failures are logged and the previous value is kept. Periods
    /// below [`MIN_POLL_INTERVAL`] are raised to it.
    pub fn watch_user(&self, user_id: impl Into<String>, poll_interval: Duration) -> AnalysisSubscription {
        let user_id = user_id.into();
        let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        let repo = self.clone();
        let (tx, rx) = watch::channel(Vec::new());

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut published = false;

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = tx.closed() => break,
                }

                match repo.list_for_user(&user_id).await {
                    Ok(records) => {
                        let changed = tx.send_if_modified(|current| {
                            if published && *current == records {
                                return false;
                            }
                            *current = records;
                            true
                        });
                        if changed {
                            published = true;
                            record_subscription_update(ANALYSES_COLLECTION);
                            debug!(user_id = %user_id, "Analysis feed updated");
                        }
                    }
                    Err(e) => warn!(user_id = %user_id, "Analysis feed poll failed: {}", e),
                }
            }

            debug!(user_id = %user_id, "Analysis feed stopped");
        });

        AnalysisSubscription { rx, task }
    }
}

/// Live view of a user's analysis records. Dropping it stops polling.
pub struct AnalysisSubscription {
    rx: watch::Receiver<Vec<AnalysisRecord>>,
    task: JoinHandle<()>,
}

impl AnalysisSubscription {
    /// Wait for the next published list. `false` once the feed has stopped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Most recently published list.
    pub fn latest(&self) -> Vec<AnalysisRecord> {
        self.rx.borrow().clone()
    }
}

impl Drop for AnalysisSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(crate) fn record_to_fields(record: &AnalysisRecord) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("userId".to_string(), record.user_id.to_firestore_value());
    fields.insert("imageUrl".to_string(), record.image_url.to_firestore_value());
    fields.insert("heatmapUrl".to_string(), record.heatmap_url.to_firestore_value());
    fields.insert("diagnosis".to_string(), record.diagnosis.to_firestore_value());
    fields.insert("confidence".to_string(), record.confidence.to_firestore_value());
    fields.insert("classScores".to_string(), record.class_scores.to_firestore_value());
    fields.insert("createdAt".to_string(), record.created_at_millis().to_firestore_value());
    fields.insert("status".to_string(), record.status.as_str().to_firestore_value());
    fields.insert(
        "errorMessage".to_string(),
        record.error_message.to_firestore_value(),
    );
    fields
}

fn update_to_fields(update: &AnalysisRecordUpdate) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    if let Some(diagnosis) = &update.diagnosis {
        fields.insert("diagnosis".to_string(), diagnosis.to_firestore_value());
    }
    if let Some(confidence) = update.confidence {
        fields.insert("confidence".to_string(), confidence.to_firestore_value());
    }
    if let Some(scores) = &update.class_scores {
        fields.insert("classScores".to_string(), scores.to_firestore_value());
    }
    if let Some(heatmap) = &update.heatmap_url {
        fields.insert("heatmapUrl".to_string(), heatmap.to_firestore_value());
    }
    if let Some(status) = update.status {
        fields.insert("status".to_string(), status.as_str().to_firestore_value());
    }
    if let Some(message) = &update.error_message {
        fields.insert("errorMessage".to_string(), message.to_firestore_value());
    }
    fields
}

/// Missing fields default; a missing `createdAt` is read as now.
pub(crate) fn document_to_record(id: &str, doc: &Document) -> AnalysisRecord {
    AnalysisRecord {
        id: id.to_string(),
        user_id: doc.get_string_or_default("userId"),
        image_url: doc.get_string_or_default("imageUrl"),
        heatmap_url: doc.get("heatmapUrl"),
        diagnosis: doc.get_string_or_default("diagnosis"),
        confidence: doc.get("confidence").unwrap_or(0.0),
        class_scores: doc.get("classScores").unwrap_or_default(),
        created_at: doc.get::<DateTime<Utc>>("createdAt").unwrap_or_else(Utc::now),
        status: doc
            .get::<String>("status")
            .map(|s| AnalysisStatus::parse_lenient(&s))
            .unwrap_or_default(),
        error_message: doc.get("errorMessage"),
    }
}
