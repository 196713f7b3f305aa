//! Core types for Eisen Layout
//!
//! This module defines the records that flow in and out of the engine: the
//! priority points the normalizer moves, the task records handed over by the
//! CRUD layer, and the per-user bias the learner maintains.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::{clamp_axis, Vec2};

/// Task identifier, opaque to the engine
pub type TaskId = i64;

/// A task placed in the urgency × importance matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityPoint {
    pub id: TaskId,
    /// Urgency axis (0-100 once sanitized)
    pub urgency: f64,
    /// Importance axis (0-100 once sanitized)
    pub importance: f64,
}

impl PriorityPoint {
    pub fn new(id: TaskId, urgency: f64, importance: f64) -> Self {
        Self {
            id,
            urgency,
            importance,
        }
    }

    /// Ordering key used for order-preservation checks; never stored
    pub fn priority_score(&self) -> f64 {
        self.urgency + self.importance
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.urgency, self.importance)
    }
}

/// Normalizer output: integer coordinates ready for storage and display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacedPoint {
    pub id: TaskId,
    pub urgency: u8,
    pub importance: u8,
}

impl PlacedPoint {
    /// Round a clamped position to whole matrix units
    pub(crate) fn from_position(id: TaskId, position: Vec2) -> Self {
        let p = position.clamp_to_matrix();
        Self {
            id,
            urgency: p.x.round() as u8,
            importance: p.y.round() as u8,
        }
    }
}

impl From<PlacedPoint> for PriorityPoint {
    fn from(p: PlacedPoint) -> Self {
        PriorityPoint::new(p.id, f64::from(p.urgency), f64::from(p.importance))
    }
}

/// Task record as supplied by the CRUD layer.
///
/// Fields other than `id`, `urgency` and `importance` are carried through
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub urgency: f64,
    pub importance: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TaskRecord {
    pub fn point(&self) -> PriorityPoint {
        PriorityPoint::new(self.id, self.urgency, self.importance)
    }
}

/// Task record with the normalized integer placement applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedTask {
    pub id: TaskId,
    pub urgency: u8,
    pub importance: u8,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One (actual - predicted) correction on both axes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AdjustmentSample {
    pub urgency_delta: f64,
    pub importance_delta: f64,
}

impl AdjustmentSample {
    pub fn new(urgency_delta: f64, importance_delta: f64) -> Self {
        Self {
            urgency_delta,
            importance_delta,
        }
    }
}

/// An AI-predicted placement next to where the user finally put the task
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementObservation {
    pub predicted_urgency: f64,
    pub predicted_importance: f64,
    pub final_urgency: f64,
    pub final_importance: f64,
}

impl PlacementObservation {
    pub fn delta(&self) -> AdjustmentSample {
        AdjustmentSample::new(
            self.final_urgency - self.predicted_urgency,
            self.final_importance - self.predicted_importance,
        )
    }

    /// True when the user moved the task by at least `threshold` on either axis
    pub fn is_meaningful(&self, threshold: f64) -> bool {
        let d = self.delta();
        d.urgency_delta.abs() >= threshold || d.importance_delta.abs() >= threshold
    }
}

/// Smoothed per-user placement bias
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBias {
    pub user_id: String,
    pub avg_urgency_bias: f64,
    pub avg_importance_bias: f64,
    /// Number of batches folded into the average
    #[serde(default)]
    pub samples_seen: u32,
    pub updated_at: DateTime<Utc>,
}

impl UserBias {
    /// Shift a predicted placement by this bias and clamp into the matrix
    pub fn apply_to(&self, predicted: PriorityPoint) -> PriorityPoint {
        PriorityPoint::new(
            predicted.id,
            clamp_axis(predicted.urgency + self.avg_urgency_bias),
            clamp_axis(predicted.importance + self.avg_importance_bias),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_task_record_passes_extra_fields_through() {
        let json = r#"{"id":7,"urgency":40,"importance":61.5,"description":"ship it","done":false}"#;
        let record: TaskRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.id, 7);
        assert_eq!(record.point(), PriorityPoint::new(7, 40.0, 61.5));
        assert_eq!(record.extra["description"], "ship it");
        assert_eq!(record.extra["done"], false);
    }

    #[test]
    fn test_placed_point_rounds_and_clamps() {
        let p = PlacedPoint::from_position(1, Vec2::new(41.5, 100.4));
        assert_eq!(p, PlacedPoint { id: 1, urgency: 42, importance: 100 });

        let p = PlacedPoint::from_position(2, Vec2::new(-3.0, 0.49));
        assert_eq!(p, PlacedPoint { id: 2, urgency: 0, importance: 0 });
    }

    #[test]
    fn test_observation_delta_and_threshold() {
        let obs = PlacementObservation {
            predicted_urgency: 60.0,
            predicted_importance: 40.0,
            final_urgency: 63.0,
            final_importance: 34.0,
        };
        assert_eq!(obs.delta(), AdjustmentSample::new(3.0, -6.0));
        assert!(obs.is_meaningful(5.0));
        assert!(!obs.is_meaningful(7.0));
    }

    #[test]
    fn test_bias_apply_clamps() {
        let bias = UserBias {
            user_id: "u1".to_string(),
            avg_urgency_bias: 12.0,
            avg_importance_bias: -30.0,
            samples_seen: 3,
            updated_at: Utc::now(),
        };
        let shifted = bias.apply_to(PriorityPoint::new(4, 95.0, 20.0));
        assert_eq!(shifted, PriorityPoint::new(4, 100.0, 0.0));
    }
}
