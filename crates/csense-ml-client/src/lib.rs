//! Client for the chest X-ray classification service.
//!
//! The service receives the image bytes together with the storage URL the
//! image was already uploaded to, and answers with a diagnosis, per-class
//! scores and an optional heatmap overlay. Every outcome, including network
//! and protocol failures, is normalized into an [`AnalysisResult`].

pub mod client;
pub mod error;
pub mod types;

pub use client::{MlClient, MlClientConfig, UNREACHABLE_MESSAGE};
pub use csense_models::{AnalysisResult, Diagnosis};
pub use error::{MlError, MlResult};
pub use types::AnalysisRequest;

#[cfg(test)]
mod client_tests;
