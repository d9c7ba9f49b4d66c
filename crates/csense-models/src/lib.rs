//! Shared data models for ChestSense backend.
//!
//! This crate provides Serde-serializable types for:
//! - User profiles (doctors and patients)
//! - Chest X-ray analysis outcomes and persisted analysis records
//! - Image payloads handed to storage and the analysis client

pub mod analysis;
pub mod payload;
pub mod user;

// Re-export common types
pub use analysis::{
    AnalysisRecord, AnalysisRecordUpdate, AnalysisResult, AnalysisStatus, Diagnosis,
    UNKNOWN_DIAGNOSIS,
};
pub use payload::{ImagePayload, PayloadError};
pub use user::{AppUser, AppUserUpdate, UserRole};
