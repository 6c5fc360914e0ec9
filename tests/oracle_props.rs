//! Property tests for the oracles and action-space builders.

use std::collections::BTreeSet;

use proptest::prelude::*;
use slatesim::{
    rescale, write_records, ActionSpace, Context, ObservationRecord, ParametricConfig,
    ParametricOracle, RewardTable, SamplePolicy,
};

fn oracle() -> ParametricOracle {
    ParametricOracle::reference(ParametricConfig::default()).unwrap()
}

fn context() -> impl Strategy<Value = Context> {
    (0usize..8).prop_map(|i| Context::all()[i])
}

fn record() -> impl Strategy<Value = ObservationRecord> {
    (context(), 0u8..3, 0u8..3, 0u8..2, -5.0f64..5.0).prop_map(|(context, x, y, z, reward)| {
        ObservationRecord {
            context,
            actions: [x.to_string(), y.to_string(), z.to_string()],
            reward,
        }
    })
}

fn table_of(records: &[ObservationRecord]) -> RewardTable {
    let mut t = RewardTable::new();
    for r in records {
        t.insert(r.clone());
    }
    t
}

fn text_of(records: &[ObservationRecord]) -> String {
    let mut buf = Vec::new();
    write_records(records, &mut buf).unwrap();
    String::from_utf8(buf).unwrap()
}

fn sorted(samples: &[f64]) -> Vec<f64> {
    let mut v = samples.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

proptest! {
    /// Cost stays in [range_min, range_max] everywhere on the action box.
    #[test]
    fn parametric_cost_is_bounded_on_the_box(
        ctx in context(),
        x in 0.0f64..=4.0,
        y in 0.0f64..=3.0,
        z in 0.0f64..=2.0,
    ) {
        let o = oracle();
        let c = o.cost(&ctx, x, y, z);
        prop_assert!((-1e-12..=1.0 + 1e-12).contains(&c), "cost={c}");
        prop_assert_eq!(o.reward(&ctx, x, y, z), -c);
    }

    /// Every context maps the box maximum to exactly the top of the range.
    #[test]
    fn parametric_cost_hits_range_max_at_the_corner(
        ctx in context(),
        lo in -10.0f64..0.0,
        width in 0.1f64..10.0,
    ) {
        let cfg = ParametricConfig { range_min: lo, range_max: lo + width, ..ParametricConfig::default() };
        let o = ParametricOracle::reference(cfg).unwrap();
        let top = o.cost(&ctx, cfg.max_x, cfg.max_y, cfg.max_z);
        prop_assert!((top - cfg.range_max).abs() < 1e-9);
        prop_assert!((o.cost(&ctx, 0.0, 0.0, 0.0) - lo).abs() < 1e-12);
    }

    /// rescale is affine: endpoints map to the range ends.
    #[test]
    fn rescale_maps_endpoints(vmax in 0.01f64..100.0, lo in -5.0f64..5.0, w in 0.01f64..5.0) {
        prop_assert!((rescale(0.0, vmax, lo, lo + w) - lo).abs() < 1e-9);
        prop_assert!((rescale(vmax, vmax, lo, lo + w) - (lo + w)).abs() < 1e-9);
    }

    /// Cross products have product cardinality, unique members, and a stable order.
    #[test]
    fn cross_product_cardinality_and_stability(a in 1usize..5, b in 1usize..5, c in 1usize..5) {
        let dims: Vec<Vec<String>> = [a, b, c]
            .iter()
            .enumerate()
            .map(|(d, &n)| (0..n).map(|i| format!("d{d}v{i}")).collect())
            .collect();
        let s1 = ActionSpace::build_cross_product(dims.as_slice());
        let s2 = ActionSpace::build_cross_product(dims.as_slice());
        prop_assert_eq!(s1.len(), a * b * c);
        prop_assert_eq!(&s1, &s2);
        let unique: BTreeSet<String> = s1.iter().map(ToString::to_string).collect();
        prop_assert_eq!(unique.len(), a * b * c);
        // Last dimension varies fastest.
        if c > 1 {
            let first = s1.get(0).and_then(|x| x.combo()).unwrap();
            let second = s1.get(1).and_then(|x| x.combo()).unwrap();
            prop_assert_eq!(&first[..2], &second[..2]);
            prop_assert_ne!(&first[2], &second[2]);
        }
    }

    /// Grids have floor(max/step) points, all inside [0, max).
    #[test]
    fn grid_points_stay_below_max(max in 0.0f64..20.0, step in 0.05f64..3.0) {
        let g = ActionSpace::build_grid(max, step).unwrap();
        prop_assert_eq!(g.len(), (max / step).floor() as usize);
        for (i, a) in g.iter().enumerate() {
            let v = a.value().unwrap();
            prop_assert_eq!(v, i as f64 * step);
            prop_assert!(v < max + 1e-9);
        }
    }

    /// Merging sources in either order keeps every sample: per key, the sample multiset
    /// equals the single-pass union of all rows.
    #[test]
    fn merge_order_keeps_every_sample(
        left in proptest::collection::vec(record(), 0..30),
        right in proptest::collection::vec(record(), 0..30),
    ) {
        let mut ab = table_of(&left);
        ab.merge(table_of(&right));
        let mut ba = table_of(&right);
        ba.merge(table_of(&left));
        let union = table_of(&[left.clone(), right.clone()].concat());

        prop_assert_eq!(ab.len(), union.len());
        prop_assert_eq!(ba.len(), union.len());
        prop_assert_eq!(ab.sample_count(), left.len() + right.len());
        for (ctx, actions, samples) in union.iter() {
            let expected = sorted(samples);
            prop_assert_eq!(sorted(ab.samples(ctx, actions)), expected.clone());
            prop_assert_eq!(sorted(ba.samples(ctx, actions)), expected);
        }
    }

    /// The same holds when the sources arrive as record text through the loader.
    #[test]
    fn loaded_sources_keep_every_sample_in_either_order(
        left in proptest::collection::vec(record(), 0..20),
        right in proptest::collection::vec(record(), 0..20),
    ) {
        let (l, r) = (text_of(&left), text_of(&right));
        let mut ab = RewardTable::load_reader(l.as_bytes(), "left").unwrap();
        ab.merge(RewardTable::load_reader(r.as_bytes(), "right").unwrap());
        let mut ba = RewardTable::load_reader(r.as_bytes(), "right").unwrap();
        ba.merge(RewardTable::load_reader(l.as_bytes(), "left").unwrap());
        let union = table_of(&[left.clone(), right.clone()].concat());

        prop_assert_eq!(ab.len(), union.len());
        prop_assert_eq!(ba.sample_count(), union.sample_count());
        for (ctx, actions, samples) in union.iter() {
            let expected = sorted(samples);
            prop_assert_eq!(sorted(ab.samples(ctx, actions)), expected.clone());
            prop_assert_eq!(sorted(ba.samples(ctx, actions)), expected);
            let m1 = ab.lookup(ctx, actions, SamplePolicy::Mean);
            let m2 = ba.lookup(ctx, actions, SamplePolicy::Mean);
            prop_assert!((m1 - m2).abs() < 1e-9);
        }
    }

    /// Keys never inserted score 0.0 under both policies.
    #[test]
    fn unseen_keys_score_zero(records in proptest::collection::vec(record(), 0..20), ctx in context()) {
        let t = table_of(&records);
        let unseen = ["x".to_string(), "y".to_string(), "z".to_string()];
        prop_assert_eq!(t.lookup(&ctx, &unseen, SamplePolicy::First), 0.0);
        prop_assert_eq!(t.lookup(&ctx, &unseen, SamplePolicy::Mean), 0.0);
    }
}
