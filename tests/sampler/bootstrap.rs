use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use explorer::minimize::{LocalMinimizer, Minimum, Objective};
use explorer::oracle::{FnOracle, RetrainEffort, ScoreOracle, TrainingExample};
use explorer::sampler::bootstrap::{BootstrapConfig, BootstrapSampler, FrequencyTable};
use explorer::{Error, Prediction, SearchTask, StopFlag};

fn examples() -> Vec<TrainingExample> {
    vec![
        TrainingExample::new(vec![0.2, 0.4, 0.6, 0.5], 1.0),
        TrainingExample::with_affected(vec![0.3, 0.4, 0.9, 0.5], 0.5, vec![0, 2]),
        TrainingExample::with_affected(vec![0.2, 0.1, 0.6, 0.5], 0.0, vec![1]),
    ]
}

fn oracle() -> Arc<FnOracle<impl Fn(&[f64]) -> Prediction + Send + Sync>> {
    Arc::new(FnOracle::new(examples(), |x: &[f64]| {
        Prediction::new(x[0] * (1.0 - x[2]) + 0.5 * x[1], 0.02 + 0.05 * x[3])
    }))
}

/// Evaluates the center of the subspace and nothing else.
#[derive(Default)]
struct Midpoint {
    calls: AtomicUsize,
}

impl LocalMinimizer for Midpoint {
    fn minimize(
        &self,
        objective: &mut Objective<'_>,
        dim: usize,
        _restarts: usize,
        _rng: &mut fastrand::Rng,
    ) -> explorer::Result<Minimum> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let x = vec![0.5; dim];
        let value = objective(&x)?;
        Ok(Minimum { x, value })
    }
}

#[test]
fn test_frequency_table_counts_at_least_one() {
    let examples = examples();
    let table = FrequencyTable::from_examples(&examples, 4, &[0, 1, 2]);
    // Unannotated example counts for the default filter.
    assert_eq!(table.counts(), &[3, 3, 3, 1]);
    assert!(table.counts().iter().all(|&c| c >= 1));
    assert!(table.selection_probability(3) > 0.0);
    assert!(table.selection_probability(0) < 1.0);
}

#[test]
fn test_emits_n_proposals_default_filter_first() {
    let oracle = oracle();
    let x0 = vec![0.2, 0.4, 0.6, 0.5];
    let config = BootstrapConfig::default().n(6).restarts(2).seed(42);
    let samples = BootstrapSampler::new(oracle.clone(), x0.clone(), config)
        .unwrap()
        .run(&StopFlag::new())
        .unwrap();

    assert_eq!(samples.len(), 6);
    assert_eq!(samples[0].affected, oracle.default_filter());
    for (i, s) in samples.iter().enumerate() {
        assert_eq!(s.point.index, i);
        for (d, (&v, &base)) in s.point.x.iter().zip(&x0).enumerate() {
            assert!((0.0..=1.0).contains(&v));
            if !s.affected.contains(&d) {
                assert_eq!(v, base, "dimension {d} outside the subset moved");
            }
        }
    }
    // Retrained once on every dimension, filter left in place.
    assert_eq!(oracle.retrain_count(), 1);
    assert_eq!(oracle.active_filter(), vec![0, 1, 2, 3]);
}

#[test]
fn test_restore_filter() {
    let oracle = oracle();
    let config = BootstrapConfig::default()
        .n(2)
        .restarts(1)
        .restore_filter(true)
        .seed(1);
    BootstrapSampler::new(oracle.clone(), vec![0.2, 0.4, 0.6, 0.5], config)
        .unwrap()
        .run(&StopFlag::new())
        .unwrap();

    assert_eq!(oracle.retrain_count(), 2);
    assert_eq!(oracle.active_filter(), oracle.default_filter());
}

/// An oracle whose restore retrain always fails.
struct BrokenRestore {
    evaluate_fails: bool,
    restores: AtomicUsize,
}

impl ScoreOracle for BrokenRestore {
    fn evaluate(&self, x: &[f64]) -> explorer::Result<Prediction> {
        if self.evaluate_fails {
            Err(Error::Oracle("evaluate down".to_owned()))
        } else {
            Ok(Prediction::new(x[0], 0.1))
        }
    }

    fn active_filter(&self) -> Vec<usize> {
        vec![0, 1]
    }

    fn examples(&self) -> Vec<TrainingExample> {
        vec![
            TrainingExample::new(vec![0.2, 0.4], 1.0),
            TrainingExample::new(vec![0.6, 0.4], 0.0),
        ]
    }

    fn retrain(&self, filter: Option<&[usize]>, _effort: RetrainEffort) -> explorer::Result<()> {
        if filter.is_none() {
            self.restores.fetch_add(1, Ordering::SeqCst);
            return Err(Error::Oracle("restore down".to_owned()));
        }
        Ok(())
    }
}

#[test]
fn test_failed_restore_keeps_run_error() {
    let oracle = Arc::new(BrokenRestore {
        evaluate_fails: true,
        restores: AtomicUsize::new(0),
    });
    let config = BootstrapConfig::default().n(2).restore_filter(true).seed(1);
    let err = BootstrapSampler::new(oracle.clone(), vec![0.2, 0.4], config)
        .unwrap()
        .run(&StopFlag::new())
        .unwrap_err();

    assert!(matches!(err, Error::Oracle(ref msg) if msg == "evaluate down"));
    assert_eq!(oracle.restores.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_restore_keeps_samples() {
    let oracle = Arc::new(BrokenRestore {
        evaluate_fails: false,
        restores: AtomicUsize::new(0),
    });
    let config = BootstrapConfig::default()
        .n(3)
        .restarts(1)
        .restore_filter(true)
        .seed(1);
    let samples = BootstrapSampler::new(oracle.clone(), vec![0.2, 0.4], config)
        .unwrap()
        .run(&StopFlag::new())
        .unwrap();

    assert_eq!(samples.len(), 3);
    assert_eq!(oracle.restores.load(Ordering::SeqCst), 1);
}

#[test]
fn test_injected_minimizer() {
    let minimizer = Arc::new(Midpoint::default());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let x0 = vec![0.2, 0.4, 0.6, 0.5];
    let config = BootstrapConfig::default().n(4).seed(9);
    let samples = BootstrapSampler::new(oracle(), x0.clone(), config)
        .unwrap()
        .with_minimizer(minimizer.clone())
        .on_sample(move |s| sink.lock().unwrap().push(s.point.index))
        .start()
        .unwrap()
        .join()
        .unwrap();

    assert_eq!(minimizer.calls.load(Ordering::SeqCst), 4);
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
    for s in &samples {
        for (d, &v) in s.point.x.iter().enumerate() {
            let expected = if s.affected.contains(&d) { 0.5 } else { x0[d] };
            assert_eq!(v, expected);
        }
    }
}

#[test]
fn test_preset_stop_emits_nothing() {
    let stop = StopFlag::new();
    stop.request_stop();
    let x0 = vec![0.2, 0.4, 0.6, 0.5];
    let samples = BootstrapSampler::new(oracle(), x0, BootstrapConfig::default())
        .unwrap()
        .run(&stop)
        .unwrap();
    assert!(samples.is_empty());
}

#[test]
fn test_construction_errors() {
    let empty = Arc::new(FnOracle::new(Vec::new(), |_: &[f64]| Prediction::new(0.0, 1.0)));
    assert!(matches!(
        BootstrapSampler::new(empty, vec![0.5], BootstrapConfig::default()),
        Err(Error::EmptyTrainingSet)
    ));
    assert!(matches!(
        BootstrapSampler::new(oracle(), vec![0.5; 3], BootstrapConfig::default()),
        Err(Error::DimensionMismatch { expected: 3, got: 4 })
    ));
    assert!(matches!(
        BootstrapSampler::new(oracle(), vec![0.5; 4], BootstrapConfig::default().restarts(0)),
        Err(Error::InvalidParameter { name: "restarts", .. })
    ));
}
