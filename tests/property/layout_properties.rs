use eisen_layout::bias::{InMemoryBiasStore, PreferenceBiasLearner};
use eisen_layout::normalizer::{LayoutNormalizer, LayoutOptions};
use eisen_layout::types::{AdjustmentSample, PlacedPoint, PriorityPoint};
use proptest::prelude::*;

const LATTICE: [f64; 5] = [10.0, 30.0, 50.0, 70.0, 90.0];

fn points_from(coords: &[(f64, f64)]) -> Vec<PriorityPoint> {
    coords
        .iter()
        .enumerate()
        .map(|(k, (u, i))| PriorityPoint::new(k as i64, *u, *i))
        .collect()
}

fn placed_distance(a: &PlacedPoint, b: &PlacedPoint) -> f64 {
    let du = f64::from(a.urgency) - f64::from(b.urgency);
    let di = f64::from(a.importance) - f64::from(b.importance);
    du.hypot(di)
}

proptest! {
    #[test]
    fn output_stays_inside_matrix(
        coords in prop::collection::vec((-50.0f64..150.0, -50.0f64..150.0), 0..25)
    ) {
        let input = points_from(&coords);
        let result = LayoutNormalizer::normalize(&input, &LayoutOptions::default());

        prop_assert_eq!(result.points.len(), input.len());
        for (placed, original) in result.points.iter().zip(&input) {
            prop_assert_eq!(placed.id, original.id);
            prop_assert!(placed.urgency <= 100);
            prop_assert!(placed.importance <= 100);
        }
    }

    #[test]
    fn unclamped_batches_end_centered(
        coords in prop::collection::vec((30.0f64..70.0, 30.0f64..70.0), 1..6)
    ) {
        let input = points_from(&coords);
        let result = LayoutNormalizer::normalize(&input, &LayoutOptions::default());

        let touches_edge = result.points.iter().any(|p| {
            p.urgency == 0 || p.urgency == 100 || p.importance == 0 || p.importance == 100
        });
        prop_assume!(!touches_edge);

        prop_assert!((result.diagnostics.centroid_urgency - 50.0).abs() <= 1.0);
        prop_assert!((result.diagnostics.centroid_importance - 50.0).abs() <= 1.0);
    }

    #[test]
    fn separated_centered_batches_are_fixed_points(
        cells in prop::collection::btree_set((0usize..5, 0usize..5), 1..8)
    ) {
        // Every chosen lattice cell plus its mirror through (50, 50)
        let mut lattice_cells = std::collections::BTreeSet::new();
        for (a, b) in cells {
            lattice_cells.insert((a, b));
            lattice_cells.insert((4 - a, 4 - b));
        }
        let coords: Vec<(f64, f64)> = lattice_cells
            .iter()
            .map(|(a, b)| (LATTICE[*a], LATTICE[*b]))
            .collect();
        let input = points_from(&coords);

        let result = LayoutNormalizer::normalize(&input, &LayoutOptions::default());

        prop_assert_eq!(result.violations, 0);
        prop_assert!(!result.diagnostics.recentered);
        for (placed, original) in result.points.iter().zip(&input) {
            prop_assert_eq!(f64::from(placed.urgency), original.urgency);
            prop_assert_eq!(f64::from(placed.importance), original.importance);
        }

        let again: Vec<PriorityPoint> = result.points.iter().copied().map(Into::into).collect();
        let rerun = LayoutNormalizer::normalize(&again, &LayoutOptions::default());
        prop_assert_eq!(rerun.points, result.points);
    }

    #[test]
    fn one_pass_pushes_close_pair_apart(
        u in 40.0f64..60.0,
        i in 40.0f64..60.0,
        angle in 0.0f64..std::f64::consts::TAU,
        d in 0.5f64..15.0,
    ) {
        let a = PriorityPoint::new(1, u, i);
        let b = PriorityPoint::new(2, u + d * angle.cos(), i + d * angle.sin());
        let options = LayoutOptions { iterations: 1, ..Default::default() };

        let result = LayoutNormalizer::normalize(&[a, b], &options);
        let after = placed_distance(&result.points[0], &result.points[1]);
        prop_assert!(after > d, "distance {} did not grow past {}", after, d);
    }

    #[test]
    fn constant_delta_converges_without_overshoot(
        first in -100.0f64..100.0,
        target in -100.0f64..100.0,
    ) {
        let learner = PreferenceBiasLearner::new(InMemoryBiasStore::new());
        learner.record_adjustment("u", &[AdjustmentSample::new(first, -first)]).unwrap();

        let initial_gap = first - target;
        let mut previous_gap = initial_gap.abs();
        for _ in 0..80 {
            let bias = learner
                .record_adjustment("u", &[AdjustmentSample::new(target, -target)])
                .unwrap();
            let gap = bias.avg_urgency_bias - target;

            prop_assert!(gap * initial_gap >= -1e-9, "overshot target: gap {}", gap);
            prop_assert!(gap.abs() <= previous_gap + 1e-9);
            prop_assert!((bias.avg_importance_bias + bias.avg_urgency_bias).abs() < 1e-9);
            previous_gap = gap.abs();
        }
        prop_assert!(previous_gap < 1e-6);
    }

    #[test]
    fn first_record_equals_batch_mean(
        deltas in prop::collection::vec((-100.0f64..100.0, -100.0f64..100.0), 1..10)
    ) {
        let samples: Vec<AdjustmentSample> =
            deltas.iter().map(|(u, i)| AdjustmentSample::new(*u, *i)).collect();
        let n = samples.len() as f64;
        let mean_u: f64 = deltas.iter().map(|(u, _)| u).sum::<f64>() / n;
        let mean_i: f64 = deltas.iter().map(|(_, i)| i).sum::<f64>() / n;

        let learner = PreferenceBiasLearner::new(InMemoryBiasStore::new());
        let bias = learner.record_adjustment("fresh", &samples).unwrap();

        prop_assert!((bias.avg_urgency_bias - mean_u).abs() < 1e-9);
        prop_assert!((bias.avg_importance_bias - mean_i).abs() < 1e-9);
        prop_assert_eq!(bias.samples_seen, 1);
    }
}
