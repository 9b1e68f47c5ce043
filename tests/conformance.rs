use std::collections::HashMap;
use std::error::Error;

use approx::assert_relative_eq;
use taliro::expressions::{ConvexSet, Predicate, PredicateMap};
use taliro::monitor::Monitor;
use taliro::{evaluate, Formula, HybridDistance, Trace};

const EPSILON: f64 = 1.0e-10;

type TestResult = Result<(), Box<dyn Error>>;

fn upper_bound(bound: f64) -> Predicate {
    Predicate::new(ConvexSet::half_space(vec![1.0], bound).unwrap())
}

fn predicates() -> PredicateMap {
    HashMap::from([
        ("p".to_string(), upper_bound(5.0)),
        ("q".to_string(), upper_bound(2.0)),
    ])
}

fn sampled(values: &[f64]) -> Trace<Vec<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(sample, &value)| (sample as f64, vec![value]))
        .collect()
}

fn assert_distance(actual: HybridDistance, location: f64, spatial: f64) {
    assert_relative_eq!(actual.location, location, epsilon = EPSILON);
    assert_relative_eq!(actual.spatial, spatial, epsilon = EPSILON);
}

#[test]
fn always_violated_by_one() -> TestResult {
    // p: [4, 2, -1], running minimum from the end: -1
    let result = evaluate("[] p", &predicates(), &sampled(&[1.0, 3.0, 6.0]))?;

    assert_distance(result, 0.0, -1.0);
    Ok(())
}

#[test]
fn always_satisfied_by_two() -> TestResult {
    // p: [4, 3, 2], running minimum from the end: 2
    let result = evaluate("[] p", &predicates(), &sampled(&[1.0, 2.0, 3.0]))?;

    assert_distance(result, 0.0, 2.0);
    Ok(())
}

#[test]
fn eventually_satisfied_by_four() -> TestResult {
    // p: [-1, -1, 4], running maximum from the end: 4
    let result = evaluate("<> p", &predicates(), &sampled(&[6.0, 6.0, 1.0]))?;

    assert_distance(result, 0.0, 4.0);
    Ok(())
}

#[test]
fn builder_and_text_agree() -> TestResult {
    let text = evaluate("[] p", &predicates(), &sampled(&[1.0, 3.0, 6.0]))?;
    let built = taliro::monitor::eval_robustness(
        &Formula::predicate("p").always(),
        &predicates(),
        &sampled(&[1.0, 3.0, 6.0]),
    )?;

    assert_eq!(text, built);
    Ok(())
}

#[test]
fn until_and_release() -> TestResult {
    // p: [4, 1, 5], q: [1, -2, 2]
    let trace = sampled(&[1.0, 4.0, 0.0]);

    let until = evaluate("p U q", &predicates(), &trace)?;
    assert_distance(until, 0.0, 1.0);

    let release = evaluate("p R q", &predicates(), &trace)?;
    assert_distance(release, 0.0, 1.0);

    // the weak p at sample 1 caps the value before q can release the obligation
    let release = evaluate("q R p", &predicates(), &trace)?;
    assert_distance(release, 0.0, 1.0);
    Ok(())
}

#[test]
fn next_at_final_sample_is_falsified() -> TestResult {
    let map = predicates();

    let result = evaluate("X p", &map, &sampled(&[6.0, 1.0]))?;
    assert_distance(result, 0.0, 4.0);

    let result = evaluate("X p", &map, &sampled(&[1.0]))?;
    assert_distance(result, f64::NEG_INFINITY, f64::NEG_INFINITY);

    let result = evaluate("W p", &map, &sampled(&[1.0]))?;
    assert_distance(result, f64::INFINITY, f64::INFINITY);
    Ok(())
}

#[test]
fn double_negation_is_identity() -> TestResult {
    let map = predicates();

    for values in [&[1.0, 3.0, 6.0][..], &[6.0, 6.0, 1.0][..]] {
        let trace = sampled(values);
        let plain = evaluate("[] p", &map, &trace)?;
        let doubled = evaluate("! (! ([] p))", &map, &trace)?;

        assert_eq!(plain, doubled);
    }

    Ok(())
}

#[test]
fn boolean_identities() -> TestResult {
    let map = predicates();
    let trace = sampled(&[1.0, 3.0, 6.0]);

    let plain = evaluate("p", &map, &trace)?;

    assert_eq!(evaluate(r"p /\ true", &map, &trace)?, plain);
    assert_eq!(evaluate(r"p \/ false", &map, &trace)?, plain);

    let result = evaluate(r"p /\ false", &map, &trace)?;
    assert_distance(result, f64::NEG_INFINITY, f64::NEG_INFINITY);

    let result = evaluate(r"p \/ true", &map, &trace)?;
    assert_distance(result, f64::INFINITY, f64::INFINITY);
    Ok(())
}

#[test]
fn always_is_dual_to_eventually() -> TestResult {
    let map = predicates();

    for values in [&[1.0, 3.0, 6.0][..], &[6.0, 6.0, 1.0][..], &[2.0][..]] {
        let trace = sampled(values);
        let always = evaluate("[] p", &map, &trace)?;
        let dual = evaluate("<> (! (p))", &map, &trace)?;

        assert_eq!(always, -dual);
    }

    Ok(())
}

#[test]
fn bounded_always_ignores_late_samples() -> TestResult {
    // p: [4, 2, -1] at timestamps [0, 1, 2]; the violation at time 2 is outside the window
    let result = evaluate("[]{0,1} p", &predicates(), &sampled(&[1.0, 3.0, 6.0]))?;

    assert_distance(result, 0.0, 2.0);
    Ok(())
}

#[test]
fn bounded_eventually_misses_late_rescue() -> TestResult {
    // p: [-1, -1, 4] at timestamps [0, 1, 2]; the satisfying sample is outside the window
    let result = evaluate("<>{0,1} p", &predicates(), &sampled(&[6.0, 6.0, 1.0]))?;

    assert_distance(result, 0.0, -1.0);
    Ok(())
}

#[test]
fn explicit_freeze_matches_bounded_operator() -> TestResult {
    let map = predicates();
    let trace = sampled(&[6.0, 6.0, 1.0]);

    let explicit = evaluate(r"@ t (<> (({ t >= 0 } /\ { t <= 1 }) /\ p))", &map, &trace)?;
    let bounded = evaluate("<>{0,1} p", &map, &trace)?;

    assert_eq!(explicit, bounded);
    Ok(())
}

#[test]
fn reordered_conjunctions_share_canonical_forms() -> TestResult {
    let mut monitor = Monitor::new();
    let map = predicates();
    let trace = sampled(&[1.0, 4.0]);

    let first = monitor.robustness(
        &Formula::predicate("p").and(Formula::predicate("q")),
        &map,
        &trace,
    )?;
    let second = monitor.robustness(
        &Formula::predicate("q").and(Formula::predicate("p")),
        &map,
        &trace,
    )?;

    // the value of a non-temporal formula is read at the first sample: min(4, 1)
    assert_eq!(first, second);
    assert_distance(first, 0.0, 1.0);
    Ok(())
}

#[test]
fn parse_errors_carry_positions() {
    let result = evaluate(r"[] (p /\", &predicates(), &sampled(&[1.0]));

    match result {
        Err(taliro::EvaluationError::Parse(error)) => {
            assert!(error.position() <= r"[] (p /\".len());
            assert!(error.to_string().contains('^'));
        }
        other => panic!("expected a parse error, got {:?}", other.map(|d| (d.location, d.spatial))),
    }
}
