//! Pipeline orchestration
//!
//! This module provides the record-level API for Eisen Layout. It takes the
//! task records handed over by the CRUD layer, runs the normalizer, and puts
//! the new integer coordinates back onto the records.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::normalizer::{LayoutDiagnostics, LayoutNormalizer, LayoutOptions};
use crate::types::{PlacedTask, PriorityPoint, TaskRecord};

/// Records with their normalized placement, ready for preview or commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutOutcome {
    pub tasks: Vec<PlacedTask>,
    pub violations: usize,
    pub diagnostics: LayoutDiagnostics,
}

impl LayoutOutcome {
    /// Whether the layout is safe to apply without asking the user.
    ///
    /// Anything above `max_violations` should go through the preview flow.
    pub fn should_auto_apply(&self, max_violations: usize) -> bool {
        self.violations <= max_violations
    }
}

/// Normalize a batch of task records.
///
/// # Arguments
/// * `records` - Current tasks of a project
/// * `options` - Layout tuning; validated before use
///
/// # Returns
/// The same records in the same order with updated urgency and importance
pub fn layout_tasks(records: &[TaskRecord], options: &LayoutOptions) -> Result<LayoutOutcome> {
    options.validate()?;

    let points: Vec<PriorityPoint> = records.iter().map(TaskRecord::point).collect();
    let result = LayoutNormalizer::normalize(&points, options);

    let tasks = records
        .iter()
        .zip(result.points)
        .map(|(record, placed)| PlacedTask {
            id: record.id,
            urgency: placed.urgency,
            importance: placed.importance,
            extra: record.extra.clone(),
        })
        .collect();

    Ok(LayoutOutcome {
        tasks,
        violations: result.violations,
        diagnostics: result.diagnostics,
    })
}

/// Normalize a JSON array of task records with default options.
///
/// # Example
/// ```
/// let out = eisen_layout::normalize_tasks_json(
///     r#"[{"id":1,"urgency":0,"importance":0},{"id":2,"urgency":100,"importance":100}]"#
///         .to_string(),
/// )
/// .unwrap();
/// let value: serde_json::Value = serde_json::from_str(&out).unwrap();
/// assert_eq!(value["violations"], 0);
/// ```
pub fn normalize_tasks_json(raw_json: String) -> Result<String> {
    normalize_tasks_json_with(raw_json, &LayoutOptions::default())
}

/// Normalize a JSON array of task records with explicit options.
///
/// Returns a JSON `LayoutOutcome`.
pub fn normalize_tasks_json_with(raw_json: String, options: &LayoutOptions) -> Result<String> {
    let records: Vec<TaskRecord> = serde_json::from_str(&raw_json)?;
    let outcome = layout_tasks(&records, options)?;
    Ok(serde_json::to_string(&outcome)?)
}
