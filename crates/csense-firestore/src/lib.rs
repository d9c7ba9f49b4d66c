//! Firestore REST API client.
//!
//! This crate provides:
//! - Typed repositories for user profiles and analysis records
//! - A polling subscription feed of a user's analyses
//! - Service account authentication via gcp_auth (or the local emulator)
//! - Merge updates and retry logic

pub mod analyses;
pub mod client;
pub mod error;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;
pub mod users;

pub use analyses::{AnalysisRepository, AnalysisSubscription, MIN_POLL_INTERVAL};
pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
pub use users::UserRepository;
