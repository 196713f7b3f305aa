//! Eisen Layout - Task placement engine for Eisenhower-matrix boards
//!
//! Eisen Layout keeps a project's tasks readable on the urgency × importance
//! matrix through a deterministic pipeline: sanitize → center → repulsion →
//! re-center and order check. Alongside it, a small learner tracks how each
//! user corrects AI-suggested placements.
//!
//! ## Modules
//!
//! - **Layout Normalizer**: Spread, center and clamp a batch of tasks
//! - **Preference Bias Learner**: Exponential moving average of user corrections

pub mod bias;
pub mod error;
pub mod geometry;
pub mod normalizer;
pub mod pipeline;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use bias::{
    BiasLearnerConfig, BiasStore, InMemoryBiasStore, JsonFileBiasStore, PreferenceBiasLearner,
};
pub use error::LayoutError;
pub use normalizer::{LayoutDiagnostics, LayoutNormalizer, LayoutOptions, LayoutResult};
pub use pipeline::{layout_tasks, normalize_tasks_json, normalize_tasks_json_with, LayoutOutcome};
pub use types::{
    AdjustmentSample, PlacedPoint, PlacedTask, PlacementObservation, PriorityPoint, TaskId,
    TaskRecord, UserBias,
};

/// Library version
pub const EISEN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "eisen-layout";
