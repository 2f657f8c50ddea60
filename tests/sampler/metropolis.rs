use std::sync::Arc;
use std::sync::mpsc;

use explorer::oracle::{FnOracle, TrainingExample};
use explorer::sampler::metropolis::{MetropolisConfig, MetropolisSampler, acceptance_ratio};
use explorer::{Error, Prediction, SearchTask, StopFlag};

fn examples() -> Vec<TrainingExample> {
    vec![
        TrainingExample::new(vec![0.1, 0.2, 0.5], 1.0),
        TrainingExample::new(vec![0.9, 0.7, 0.5], 0.0),
    ]
}

fn peaked_oracle() -> Arc<FnOracle<impl Fn(&[f64]) -> Prediction + Send + Sync>> {
    Arc::new(FnOracle::new(examples(), |x: &[f64]| {
        let d2 = (x[0] - 0.5).powi(2) + (x[1] - 0.5).powi(2);
        Prediction::new((-4.0 * d2).exp(), 0.01)
    }))
}

fn zero_oracle() -> Arc<FnOracle<impl Fn(&[f64]) -> Prediction + Send + Sync>> {
    Arc::new(FnOracle::new(examples(), |_: &[f64]| Prediction::new(0.0, 0.0)))
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

#[test]
fn test_accepted_points_respect_epsilon() {
    let epsilon = 0.1;
    let config = MetropolisConfig::default()
        .n(10)
        .burn(20)
        .epsilon(epsilon)
        .q_min(0.5)
        .limit(50_000)
        .seed(42);
    let outcome = MetropolisSampler::new(peaked_oracle(), vec![0.5, 0.5, 0.5], config)
        .unwrap()
        .run(&StopFlag::new())
        .unwrap();

    assert_eq!(outcome.samples.len(), 10);
    for (i, a) in outcome.samples.iter().enumerate() {
        assert!(a.mean > 0.5);
        for b in &outcome.samples[i + 1..] {
            let d = distance(&a.x, &b.x);
            assert!(d >= epsilon, "points {i} are {d} apart");
        }
    }
}

#[test]
fn test_zero_score_always_moves() {
    assert_eq!(acceptance_ratio(0.0, 0.0), 1.0);
    assert_eq!(acceptance_ratio(0.0, 0.7), 1.0);

    let config = MetropolisConfig::default()
        .n(5)
        .burn(0)
        .epsilon(0.0)
        .q_min(-1.0)
        .seed(3);
    let outcome = MetropolisSampler::new(zero_oracle(), vec![0.5, 0.5, 0.5], config)
        .unwrap()
        .run(&StopFlag::new())
        .unwrap();

    assert_eq!(outcome.trace.len(), 5);
    assert!(outcome.trace.iter().all(|e| e.accepted && e.attempt_number == 0));
    let steps: Vec<usize> = outcome.samples.iter().map(|s| s.index).collect();
    assert_eq!(steps, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_burn_in_and_stride() {
    let config = MetropolisConfig::default()
        .n(3)
        .burn(10)
        .stride(3)
        .epsilon(0.0)
        .q_min(-1.0)
        .seed(8);
    let outcome = MetropolisSampler::new(zero_oracle(), vec![0.5, 0.5, 0.5], config)
        .unwrap()
        .run(&StopFlag::new())
        .unwrap();

    let steps: Vec<usize> = outcome.samples.iter().map(|s| s.index).collect();
    assert_eq!(steps, vec![12, 15, 18]);
    assert_eq!(outcome.trace.len(), 18);
    assert_eq!(outcome.trace.last().unwrap().cumulative_count, 18);
}

#[test]
fn test_only_filter_dimensions_move() {
    let config = MetropolisConfig::default()
        .n(5)
        .burn(0)
        .epsilon(0.0)
        .q_min(-1.0)
        .scale(0.5)
        .filter(vec![0])
        .seed(12);
    let outcome = MetropolisSampler::new(zero_oracle(), vec![0.5, 0.25, 0.75], config)
        .unwrap()
        .run(&StopFlag::new())
        .unwrap();

    for s in &outcome.samples {
        assert!((0.0..=1.0).contains(&s.x[0]));
        assert_eq!(s.x[1], 0.25);
        assert_eq!(s.x[2], 0.75);
    }
}

#[test]
fn test_limit_is_not_an_error() {
    let config = MetropolisConfig::default()
        .q_min(2.0)
        .burn(0)
        .limit(50)
        .seed(1);
    let outcome = MetropolisSampler::new(peaked_oracle(), vec![0.5, 0.5, 0.5], config)
        .unwrap()
        .run(&StopFlag::new())
        .unwrap();

    assert!(outcome.samples.is_empty());
    assert_eq!(outcome.trace.len(), 50);
    assert_eq!(outcome.shortfall(), 10);
    assert!(!outcome.stopped);
}

#[test]
fn test_stop_and_finalize_name() {
    let (tx, rx) = mpsc::channel();
    let config = MetropolisConfig::default()
        .name("walker")
        .q_min(2.0)
        .limit(usize::MAX)
        .seed(6);
    let handle = MetropolisSampler::new(peaked_oracle(), vec![0.5, 0.5, 0.5], config)
        .unwrap()
        .on_finalize(move |_, name| tx.send(name.to_owned()).unwrap())
        .start()
        .unwrap();

    assert_eq!(handle.name(), "walker");
    handle.stop();
    let outcome = handle.join().unwrap();
    assert!(outcome.stopped);
    assert_eq!(rx.recv().unwrap(), "walker");
}

#[test]
fn test_invalid_config() {
    assert!(matches!(
        MetropolisSampler::new(
            peaked_oracle(),
            vec![0.5; 3],
            MetropolisConfig::default().stride(0)
        ),
        Err(Error::InvalidParameter { name: "stride", .. })
    ));
    assert!(matches!(
        MetropolisSampler::new(
            peaked_oracle(),
            vec![0.5; 3],
            MetropolisConfig::default().scale(-0.1)
        ),
        Err(Error::InvalidParameter { name: "scale", .. })
    ));
}
