//! Layout normalization
//!
//! This module spreads a batch of tasks across the priority matrix:
//! - Coordinates clamped into [0, 100] (corrupted predictions included)
//! - Batch translated so its centroid sits on (50, 50)
//! - Overlapping tasks pushed apart by a fixed number of repulsion passes
//! - Centroid corrected once more, then priority order checked pair by pair
//!
//! The normalizer is a pure function of its input. It holds no state between
//! calls and uses no randomness, so equal input always yields equal output.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LayoutError, Result};
use crate::geometry::{centroid, translate_clamped, Vec2, MATRIX_CENTER};
use crate::types::{PlacedPoint, PriorityPoint, TaskId};

/// Default number of repulsion passes
pub const DEFAULT_ITERATIONS: u32 = 8;

/// Default minimum separation between two tasks (matrix units)
pub const DEFAULT_MIN_DISTANCE: f64 = 18.0;

/// Largest repulsion budget accepted by [`LayoutOptions::validate`]; keeps
/// the `O(iterations * n^2)` cost bounded for options coming from outside
pub const MAX_ITERATIONS: u32 = 1000;

/// Default fraction of the overlap applied as force on each side of a pair
pub const DEFAULT_REPULSION_STRENGTH: f64 = 0.7;

/// Default centroid drift tolerated before the corrective translation
pub const DEFAULT_RECENTER_TOLERANCE: f64 = 1.0;

/// Tuning knobs for a layout run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Repulsion passes. The budget is always spent in full: there is no
    /// convergence check and no early exit.
    pub iterations: u32,
    /// Pairs closer than this repel each other
    pub min_distance: f64,
    /// Force per unit of overlap
    pub repulsion_strength: f64,
    /// Centroid drift (per axis) that triggers the final re-centering
    pub recenter_tolerance: f64,
    /// Pairs whose original scores differ by no more than this are never
    /// counted as violations
    pub tie_epsilon: f64,
    /// Push exactly coincident tasks apart along a direction derived from
    /// their ids. When false, duplicates stay stacked.
    pub separate_coincident: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            min_distance: DEFAULT_MIN_DISTANCE,
            repulsion_strength: DEFAULT_REPULSION_STRENGTH,
            recenter_tolerance: DEFAULT_RECENTER_TOLERANCE,
            tie_epsilon: 0.0,
            separate_coincident: false,
        }
    }
}

impl LayoutOptions {
    /// Reject non-finite or negative tuning values and oversized budgets
    pub fn validate(&self) -> Result<()> {
        if self.iterations > MAX_ITERATIONS {
            return Err(LayoutError::InvalidOptions(format!(
                "iterations must be at most {MAX_ITERATIONS}, got {}",
                self.iterations
            )));
        }
        let fields = [
            ("min_distance", self.min_distance),
            ("repulsion_strength", self.repulsion_strength),
            ("recenter_tolerance", self.recenter_tolerance),
            ("tie_epsilon", self.tie_epsilon),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(LayoutError::InvalidOptions(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Load options from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }
}

/// Side information about a layout run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutDiagnostics {
    /// Final centroid before rounding
    pub centroid_urgency: f64,
    pub centroid_importance: f64,
    /// Whether the corrective translation after repulsion was applied
    pub recentered: bool,
    /// Pairs still closer than `min_distance` when the budget ran out
    pub residual_overlaps: usize,
}

/// Normalized layout plus the order-preservation diagnostic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub points: Vec<PlacedPoint>,
    /// Pairs whose priority-score order flipped
    pub violations: usize,
    pub diagnostics: LayoutDiagnostics,
}

impl LayoutResult {
    fn empty() -> Self {
        Self {
            points: Vec::new(),
            violations: 0,
            diagnostics: LayoutDiagnostics {
                centroid_urgency: MATRIX_CENTER.x,
                centroid_importance: MATRIX_CENTER.y,
                recentered: false,
                residual_overlaps: 0,
            },
        }
    }
}

/// Normalizer for spreading tasks across the matrix
pub struct LayoutNormalizer;

impl LayoutNormalizer {
    /// Normalize a batch of points.
    ///
    /// Options are used as given; callers accepting options from outside
    /// should run [`LayoutOptions::validate`] first.
    pub fn normalize(points: &[PriorityPoint], options: &LayoutOptions) -> LayoutResult {
        if points.is_empty() {
            return LayoutResult::empty();
        }

        let ids: Vec<TaskId> = points.iter().map(|p| p.id).collect();

        // Phase 1: sanitize, record baseline scores
        let mut positions: Vec<Vec2> = points
            .iter()
            .map(|p| p.position().clamp_to_matrix())
            .collect();
        let baseline_scores: Vec<f64> = positions.iter().map(|p| p.x + p.y).collect();

        // Phase 2: center on the matrix origin
        if let Some(c) = centroid(&positions) {
            translate_clamped(&mut positions, MATRIX_CENTER - c);
        }

        // Phase 3: repulsion
        resolve_overlaps(&mut positions, &ids, options);

        // Phase 4: re-center if repulsion (or clamping) moved the centroid
        let mut recentered = false;
        if let Some(c) = centroid(&positions) {
            let drift = MATRIX_CENTER - c;
            if drift.x.abs() > options.recenter_tolerance
                || drift.y.abs() > options.recenter_tolerance
            {
                translate_clamped(&mut positions, drift);
                recentered = true;
            }
        }

        let final_scores: Vec<f64> = positions.iter().map(|p| p.x + p.y).collect();
        let violations = count_violations(&baseline_scores, &final_scores, options.tie_epsilon);
        let residual_overlaps = count_overlaps(&positions, options.min_distance);
        let final_centroid = centroid(&positions).unwrap_or(MATRIX_CENTER);

        debug!(
            points = positions.len(),
            iterations = options.iterations,
            recentered,
            residual_overlaps,
            violations,
            "layout normalized"
        );
        if violations > 0 {
            warn!(violations, "layout changed relative priority order");
        }

        LayoutResult {
            points: ids
                .iter()
                .zip(&positions)
                .map(|(id, p)| PlacedPoint::from_position(*id, *p))
                .collect(),
            violations,
            diagnostics: LayoutDiagnostics {
                centroid_urgency: final_centroid.x,
                centroid_importance: final_centroid.y,
                recentered,
                residual_overlaps,
            },
        }
    }
}

/// Run the fixed-budget repulsion simulation in place.
///
/// Forces for one pass are accumulated over all pairs first and applied
/// together, followed by a clamp of every point.
fn resolve_overlaps(positions: &mut [Vec2], ids: &[TaskId], options: &LayoutOptions) {
    let n = positions.len();
    if n < 2 {
        return;
    }

    let min_distance = options.min_distance;
    let mut forces = vec![Vec2::ZERO; n];

    for _ in 0..options.iterations {
        forces.iter_mut().for_each(|f| *f = Vec2::ZERO);

        for i in 0..n {
            for j in (i + 1)..n {
                let delta = positions[j] - positions[i];
                let distance = delta.length();
                if distance >= min_distance {
                    continue;
                }

                let direction = if distance > 0.0 {
                    delta * (1.0 / distance)
                } else if options.separate_coincident {
                    coincident_direction(ids[i], ids[j])
                } else {
                    continue;
                };

                let push = direction * ((min_distance - distance) * options.repulsion_strength);
                forces[i] += push * -1.0;
                forces[j] += push;
            }
        }

        for (p, f) in positions.iter_mut().zip(&forces) {
            *p = (*p + *f).clamp_to_matrix();
        }
    }
}

/// Unit vector pointing from the task `from` to the coincident task `to`.
///
/// Derived only from the two ids, so the pair separates the same way on
/// every run and swapping the pair flips the direction.
fn coincident_direction(from: TaskId, to: TaskId) -> Vec2 {
    let (lo, hi) = if from <= to { (from, to) } else { (to, from) };
    let seed = lo.wrapping_mul(31).wrapping_add(hi).rem_euclid(360);
    let angle = (seed as f64).to_radians();
    let dir = Vec2::new(angle.cos(), angle.sin());
    if from <= to {
        dir
    } else {
        dir * -1.0
    }
}

/// Count strict pairwise inversions of the priority score
fn count_violations(before: &[f64], after: &[f64], tie_epsilon: f64) -> usize {
    let mut violations = 0;
    for i in 0..before.len() {
        for j in (i + 1)..before.len() {
            let old_diff = before[i] - before[j];
            if old_diff.abs() <= tie_epsilon {
                continue;
            }
            let new_diff = after[i] - after[j];
            if old_diff * new_diff < 0.0 {
                violations += 1;
            }
        }
    }
    violations
}

fn count_overlaps(positions: &[Vec2], min_distance: f64) -> usize {
    let mut overlaps = 0;
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            if positions[i].distance(positions[j]) < min_distance {
                overlaps += 1;
            }
        }
    }
    overlaps
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(points: &[PriorityPoint]) -> LayoutResult {
        LayoutNormalizer::normalize(points, &LayoutOptions::default())
    }

    fn distance(a: &PlacedPoint, b: &PlacedPoint) -> f64 {
        let du = f64::from(a.urgency) - f64::from(b.urgency);
        let di = f64::from(a.importance) - f64::from(b.importance);
        du.hypot(di)
    }

    #[test]
    fn test_empty_batch() {
        let result = run(&[]);
        assert!(result.points.is_empty());
        assert_eq!(result.violations, 0);
    }

    #[test]
    fn test_opposite_corners_unchanged() {
        let result = run(&[
            PriorityPoint::new(1, 0.0, 0.0),
            PriorityPoint::new(2, 100.0, 100.0),
        ]);

        assert_eq!(
            result.points,
            vec![
                PlacedPoint { id: 1, urgency: 0, importance: 0 },
                PlacedPoint { id: 2, urgency: 100, importance: 100 },
            ]
        );
        assert_eq!(result.violations, 0);
        assert!(!result.diagnostics.recentered);
    }

    #[test]
    fn test_close_pair_is_pushed_apart() {
        let input = [
            PriorityPoint::new(1, 50.0, 50.0),
            PriorityPoint::new(2, 52.0, 52.0),
        ];
        let before = input[0].position().distance(input[1].position());
        let result = run(&input);

        let after = distance(&result.points[0], &result.points[1]);
        assert!(after > before);
        assert!((after - 18.0).abs() < (before - 18.0).abs());
        // Translation then symmetric push: (41.49, 41.49) and (58.51, 58.51)
        assert_eq!(result.points[0], PlacedPoint { id: 1, urgency: 41, importance: 41 });
        assert_eq!(result.points[1], PlacedPoint { id: 2, urgency: 59, importance: 59 });
        assert_eq!(result.violations, 0);
        assert_eq!(result.diagnostics.residual_overlaps, 0);
    }

    #[test]
    fn test_single_malformed_point_lands_on_origin() {
        // Sanitized to (0, 100), then centered onto (50, 50)
        let result = run(&[PriorityPoint::new(1, -10.0, 120.0)]);
        assert_eq!(result.points, vec![PlacedPoint { id: 1, urgency: 50, importance: 50 }]);
    }

    #[test]
    fn test_single_iteration_increases_separation() {
        let options = LayoutOptions {
            iterations: 1,
            ..Default::default()
        };
        let result = LayoutNormalizer::normalize(
            &[PriorityPoint::new(1, 45.0, 50.0), PriorityPoint::new(2, 55.0, 50.0)],
            &options,
        );
        // 10 apart, overlap 8, each side moves 5.6
        assert_eq!(result.points[0], PlacedPoint { id: 1, urgency: 39, importance: 50 });
        assert_eq!(result.points[1], PlacedPoint { id: 2, urgency: 61, importance: 50 });
    }

    #[test]
    fn test_coincident_points_stay_stacked_by_default() {
        let result = run(&[
            PriorityPoint::new(1, 30.0, 30.0),
            PriorityPoint::new(2, 30.0, 30.0),
        ]);
        assert_eq!(result.points[0].urgency, 50);
        assert_eq!(result.points[0].importance, 50);
        assert_eq!(result.points[1].urgency, 50);
        assert_eq!(result.points[1].importance, 50);
        assert_eq!(result.diagnostics.residual_overlaps, 1);
    }

    #[test]
    fn test_coincident_points_separate_when_enabled() {
        let options = LayoutOptions {
            separate_coincident: true,
            ..Default::default()
        };
        let input = [
            PriorityPoint::new(1, 30.0, 30.0),
            PriorityPoint::new(2, 30.0, 30.0),
        ];
        let first = LayoutNormalizer::normalize(&input, &options);
        let second = LayoutNormalizer::normalize(&input, &options);

        assert!(distance(&first.points[0], &first.points[1]) >= 17.0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_coincident_direction_flips_with_pair_order() {
        let a = coincident_direction(3, 9);
        let b = coincident_direction(9, 3);
        assert!((a.x + b.x).abs() < 1e-12);
        assert!((a.y + b.y).abs() < 1e-12);
        assert!((a.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_centering_translates_off_center_batch() {
        let result = run(&[
            PriorityPoint::new(1, 10.0, 10.0),
            PriorityPoint::new(2, 40.0, 10.0),
            PriorityPoint::new(3, 10.0, 40.0),
            PriorityPoint::new(4, 40.0, 40.0),
        ]);
        assert_eq!(
            result.points,
            vec![
                PlacedPoint { id: 1, urgency: 35, importance: 35 },
                PlacedPoint { id: 2, urgency: 65, importance: 35 },
                PlacedPoint { id: 3, urgency: 35, importance: 65 },
                PlacedPoint { id: 4, urgency: 65, importance: 65 },
            ]
        );
        assert!((result.diagnostics.centroid_urgency - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_scattered_grid_has_no_violations() {
        let mut input = Vec::new();
        let xs = [10.0, 30.0, 50.0, 70.0, 90.0];
        for (k, x) in xs.iter().enumerate() {
            input.push(PriorityPoint::new(k as i64, *x, 30.0));
            input.push(PriorityPoint::new(10 + k as i64, *x, 70.0));
        }
        let result = run(&input);

        assert_eq!(result.violations, 0);
        assert!((result.diagnostics.centroid_urgency - 50.0).abs() <= 1.0);
        assert!((result.diagnostics.centroid_importance - 50.0).abs() <= 1.0);
        for (placed, original) in result.points.iter().zip(&input) {
            assert_eq!(f64::from(placed.urgency), original.urgency);
            assert_eq!(f64::from(placed.importance), original.importance);
        }
    }

    #[test]
    fn test_count_violations_strict_and_epsilon() {
        // Pair (0,1) flips, pair (0,2) goes from tie to ordered
        let before = [10.0, 20.0, 10.0];
        let after = [25.0, 20.0, 5.0];
        assert_eq!(count_violations(&before, &after, 0.0), 1);
        assert_eq!(count_violations(&before, &after, 10.0), 0);
    }

    #[test]
    fn test_options_validation() {
        assert!(LayoutOptions::default().validate().is_ok());

        let bad = LayoutOptions {
            min_distance: -1.0,
            ..Default::default()
        };
        assert!(matches!(bad.validate(), Err(LayoutError::InvalidOptions(_))));

        let huge = LayoutOptions::from_json(r#"{"iterations": 4294967295}"#);
        assert!(matches!(huge, Err(LayoutError::InvalidOptions(_))));
        let at_cap = LayoutOptions {
            iterations: MAX_ITERATIONS,
            ..Default::default()
        };
        assert!(at_cap.validate().is_ok());

        let partial = LayoutOptions::from_json(r#"{"iterations": 3}"#).unwrap();
        assert_eq!(partial.iterations, 3);
        assert_eq!(partial.min_distance, DEFAULT_MIN_DISTANCE);
    }
}
