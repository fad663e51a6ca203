//! Property tests for the confidence update rule.

use maturity_core::{apply_delta, derive_status_for_display, Impact, ScoreConfig};
use proptest::prelude::*;

fn impact() -> impl Strategy<Value = Impact> {
    prop_oneof![Just(Impact::Low), Just(Impact::High)]
}

fn event() -> impl Strategy<Value = (bool, Impact)> {
    (any::<bool>(), impact())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn score_stays_in_unit_interval(
        start in 0.0f64..=1.0,
        events in prop::collection::vec(event(), 0..300),
    ) {
        let config = ScoreConfig::default();
        let mut score = start;
        for (positive, impact) in events {
            score = apply_delta(score, positive, impact, &config);
            prop_assert!((0.0..=1.0).contains(&score), "score escaped: {}", score);
        }
    }

    #[test]
    fn positive_runs_never_decrease(
        start in 0.0f64..=1.0,
        impacts in prop::collection::vec(impact(), 1..100),
    ) {
        let config = ScoreConfig::default();
        let mut score = start;
        for impact in impacts {
            let next = apply_delta(score, true, impact, &config);
            prop_assert!(next >= score);
            score = next;
        }
    }

    #[test]
    fn negative_runs_never_increase(
        start in 0.0f64..=1.0,
        impacts in prop::collection::vec(impact(), 1..100),
    ) {
        let config = ScoreConfig::default();
        let mut score = start;
        for impact in impacts {
            let next = apply_delta(score, false, impact, &config);
            prop_assert!(next <= score);
            score = next;
        }
    }

    #[test]
    fn bounds_are_plateaus(impacts in prop::collection::vec(impact(), 1..50)) {
        let config = ScoreConfig::default();
        for impact in impacts {
            prop_assert_eq!(apply_delta(1.0, true, impact, &config), 1.0);
            prop_assert_eq!(apply_delta(0.0, false, impact, &config), 0.0);
        }
    }

    #[test]
    fn out_of_range_input_is_clamped_first(
        start in -10.0f64..10.0,
        (positive, impact) in event(),
    ) {
        let config = ScoreConfig::default();
        let score = apply_delta(start, positive, impact, &config);
        prop_assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn display_status_is_monotone(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(derive_status_for_display(low) <= derive_status_for_display(high));
    }
}
