//! ChestSense command line support.
//!
//! The binary wires the storage, record store, identity and analysis clients
//! together; [`AnalysisPipeline`] holds the upload-and-analyze flow so it can
//! be tested without the CLI.

pub mod error;
pub mod logging;
pub mod pipeline;
pub mod render;

pub use error::{PipelineError, PipelineResult};
pub use pipeline::{AnalysisPipeline, PipelineOutcome};
