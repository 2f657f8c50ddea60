use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use explorer::oracle::{FnOracle, RetrainEffort, ScoreOracle, TrainingExample};
use explorer::sampler::rejection::{GenericRejectionSampler, RejectionConfig, RejectionSampler};
use explorer::{AcceptanceLogEntry, Error, Prediction, SearchTask, StopFlag, Threshold};

fn linear_oracle() -> Arc<FnOracle<impl Fn(&[f64]) -> Prediction + Send + Sync>> {
    let examples = vec![
        TrainingExample::new(vec![0.9, 0.2, 0.5, 0.1], 1.0),
        TrainingExample::new(vec![0.3, 0.7, 0.5, 0.8], 0.5),
        TrainingExample::new(vec![0.1, 0.4, 0.5, 0.3], 0.0),
    ];
    Arc::new(FnOracle::new(examples, |x: &[f64]| {
        Prediction::new(x[0], 0.01)
    }))
}

/// An oracle that fails after a fixed number of evaluations.
struct FlakyOracle {
    calls: AtomicUsize,
    fail_after: usize,
}

impl ScoreOracle for FlakyOracle {
    fn evaluate(&self, _x: &[f64]) -> explorer::Result<Prediction> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.fail_after {
            Err(Error::Oracle("model unavailable".to_owned()))
        } else {
            Ok(Prediction::new(0.0, 0.0))
        }
    }

    fn active_filter(&self) -> Vec<usize> {
        vec![0, 1]
    }

    fn examples(&self) -> Vec<TrainingExample> {
        vec![TrainingExample::new(vec![0.5, 0.5], 1.0)]
    }

    fn retrain(&self, _filter: Option<&[usize]>, _effort: RetrainEffort) -> explorer::Result<()> {
        Ok(())
    }
}

#[test]
fn test_gt_only_appends_strictly_greater() {
    let config = RejectionConfig::default()
        .threshold(Threshold::above(0.6))
        .n(20)
        .seed(42);
    let outcome = RejectionSampler::new(linear_oracle(), vec![0.9, 0.2, 0.5, 0.1], config)
        .unwrap()
        .run(&StopFlag::new())
        .unwrap();

    assert_eq!(outcome.samples.len(), 20);
    for s in &outcome.samples {
        assert!(s.mean > 0.6, "sample mean {} should exceed 0.6", s.mean);
        assert!(s.x.iter().all(|v| (0.0..=1.0).contains(v)));
    }
    let accepted = outcome.trace.iter().filter(|e| e.accepted).count();
    assert_eq!(accepted, outcome.samples.len());
}

#[test]
fn test_abs_radius_window() {
    let threshold = Threshold::abs_radius(0.8, 0.05);
    assert!(!threshold.accepts(0.9));

    let config = RejectionConfig::default().threshold(threshold).n(10).seed(7);
    let outcome = RejectionSampler::new(linear_oracle(), vec![0.9, 0.2, 0.5, 0.1], config)
        .unwrap()
        .run(&StopFlag::new())
        .unwrap();

    assert!(!outcome.samples.is_empty());
    for s in &outcome.samples {
        assert!((s.mean - 0.8).abs() < 0.05, "mean {} outside window", s.mean);
    }
}

#[test]
fn test_abs_radius_rejects_constant_point_nine() {
    let config = RejectionConfig::default()
        .threshold(Threshold::abs_radius(0.8, 0.05))
        .n(1)
        .limit(Some(100))
        .seed(1);
    let outcome = GenericRejectionSampler::new(
        vec![0.5, 0.5],
        vec![vec![0.5, 0.5]],
        vec![0, 1],
        |_: &[f64]| Ok(Prediction::new(0.9, 0.0)),
        config,
    )
    .unwrap()
    .run(&StopFlag::new())
    .unwrap();

    assert!(outcome.samples.is_empty());
    assert_eq!(outcome.trace.len(), 100);
    assert!(outcome.trace.iter().all(|e| !e.accepted && e.score == 0.9));
    assert_eq!(outcome.shortfall(), 1);
    assert!((outcome.rejection_rate() - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_free_params_contract_then_expand() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let score = move |_: &[f64]| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Prediction::new(if n > 6 { 1.0 } else { 0.0 }, 0.0))
    };

    let config = RejectionConfig::default()
        .threshold(Threshold::above(0.5))
        .n(3)
        .free_params(3)
        .param_floor(1)
        .retries(2)
        .seed(5);
    let outcome = GenericRejectionSampler::new(
        vec![0.5; 3],
        vec![vec![0.5; 3]],
        vec![0, 1, 2],
        score,
        config,
    )
    .unwrap()
    .run(&StopFlag::new())
    .unwrap();

    let free: Vec<usize> = outcome.trace.iter().map(|e| e.free_param_count).collect();
    assert_eq!(free, vec![3, 3, 3, 2, 2, 2, 1, 2, 3]);
    let attempts: Vec<usize> = outcome.trace.iter().map(|e| e.attempt_number).collect();
    assert_eq!(attempts, vec![0, 1, 2, 0, 1, 2, 0, 0, 0]);
    let cumulative: Vec<usize> = outcome.trace.iter().map(|e| e.cumulative_count).collect();
    assert_eq!(cumulative, (1..=9).collect::<Vec<_>>());
    assert_eq!(calls.load(Ordering::SeqCst), 9);
}

#[test]
fn test_free_params_stay_within_bounds() {
    let oracle = Arc::new(FnOracle::new(
        vec![
            TrainingExample::new(vec![0.0; 6], 1.0),
            TrainingExample::new(vec![1.0; 6], 0.0),
        ],
        |x: &[f64]| Prediction::new(x.iter().sum::<f64>() / 6.0, 0.0),
    ));
    let config = RejectionConfig::default()
        .threshold(Threshold::above(0.7))
        .n(5)
        .free_params(4)
        .param_floor(2)
        .retries(3)
        .limit(Some(2_000))
        .seed(11);
    let outcome = RejectionSampler::new(oracle, vec![0.5; 6], config)
        .unwrap()
        .run(&StopFlag::new())
        .unwrap();

    assert_eq!(outcome.trace[0].free_param_count, 4);
    assert!(
        outcome
            .trace
            .iter()
            .all(|e| (2..=4).contains(&e.free_param_count))
    );
    assert!(outcome.trace.iter().any(|e| e.free_param_count == 2));
}

#[test]
fn test_ceiling_clamped_to_filter_size() {
    let config = RejectionConfig::default()
        .threshold(Threshold::below(2.0))
        .n(4)
        .seed(3);
    let sampler =
        RejectionSampler::new(linear_oracle(), vec![0.9, 0.2, 0.5, 0.1], config).unwrap();
    // Dimension 2 is constant across the examples.
    assert_eq!(sampler.filter(), &[0, 1, 3]);

    let outcome = sampler.run(&StopFlag::new()).unwrap();
    assert!(outcome.trace.iter().all(|e| e.free_param_count == 3));
    assert!(outcome.samples.iter().all(|s| s.x[2] == 0.5));
}

#[test]
fn test_empty_filter_is_a_valid_run() {
    let config = RejectionConfig::default()
        .threshold(Threshold::above(0.95))
        .filter(Vec::new())
        .limit(Some(50))
        .seed(2);
    let x0 = vec![0.4, 0.2, 0.5, 0.1];
    let outcome = RejectionSampler::new(linear_oracle(), x0, config)
        .unwrap()
        .run(&StopFlag::new())
        .unwrap();

    assert!(outcome.samples.is_empty());
    assert_eq!(outcome.trace.len(), 50);
    assert!(
        outcome
            .trace
            .iter()
            .all(|e| e.free_param_count == 0 && (e.score - 0.4).abs() < 1e-12)
    );
}

#[test]
fn test_seed_values_fill_fixed_dimensions() {
    let config = RejectionConfig::default()
        .threshold(Threshold::below(10.0))
        .n(20)
        .free_params(1)
        .param_floor(1)
        .seed(9);
    let outcome = GenericRejectionSampler::new(
        vec![0.9, 0.9, 0.9, 0.9],
        vec![vec![0.3, 0.3, 0.3, 0.3]],
        vec![0, 1, 2],
        |x: &[f64]| Ok(Prediction::new(x[0], 0.0)),
        config,
    )
    .unwrap()
    .run(&StopFlag::new())
    .unwrap();

    for s in &outcome.samples {
        // Outside the filter: untouched.
        assert_eq!(s.x[3], 0.9);
        // One free dimension, the other two copied from the seed.
        let seeded = s.x[..3].iter().filter(|&&v| v == 0.3).count();
        assert!(seeded >= 2, "{:?} should carry two seed values", s.x);
    }
}

#[test]
fn test_score_separation() {
    let delta = 0.05;
    let config = RejectionConfig::default()
        .threshold(Threshold::above(0.0))
        .n(8)
        .score_delta(delta)
        .seed(17);
    let outcome = RejectionSampler::new(linear_oracle(), vec![0.9, 0.2, 0.5, 0.1], config)
        .unwrap()
        .run(&StopFlag::new())
        .unwrap();

    assert_eq!(outcome.samples.len(), 8);
    for (i, a) in outcome.samples.iter().enumerate() {
        for b in &outcome.samples[i + 1..] {
            assert!((a.mean - b.mean).abs() >= delta);
        }
    }
}

#[test]
fn test_callbacks_in_order_before_finalize() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let on_sample_events = Arc::clone(&events);
    let on_finalize_events = Arc::clone(&events);

    let config = RejectionConfig::default()
        .name("ordered")
        .threshold(Threshold::above(0.5))
        .n(5)
        .seed(23);
    let outcome = RejectionSampler::new(linear_oracle(), vec![0.9, 0.2, 0.5, 0.1], config)
        .unwrap()
        .on_sample(move |p| on_sample_events.lock().unwrap().push(format!("sample {}", p.index)))
        .on_finalize(move |trace: &[AcceptanceLogEntry], name: &str| {
            on_finalize_events
                .lock()
                .unwrap()
                .push(format!("finalize {name} {}", trace.len()));
        })
        .start()
        .unwrap()
        .join()
        .unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 6);
    for (i, e) in events[..5].iter().enumerate() {
        assert_eq!(e, &format!("sample {i}"));
    }
    assert_eq!(events[5], format!("finalize ordered {}", outcome.trace.len()));
}

#[test]
fn test_oracle_failure_still_finalizes() {
    let oracle = Arc::new(FlakyOracle {
        calls: AtomicUsize::new(0),
        fail_after: 7,
    });
    let (tx, rx) = mpsc::channel();

    let err = RejectionSampler::new(oracle, vec![0.5, 0.5], RejectionConfig::default().seed(1))
        .unwrap()
        .on_finalize(move |trace, _| tx.send(trace.len()).unwrap())
        .start()
        .unwrap()
        .join()
        .unwrap_err();

    assert!(matches!(err, Error::Oracle(ref msg) if msg == "model unavailable"));
    assert_eq!(rx.recv().unwrap(), 7);
}

#[test]
fn test_stop_request_ends_unbounded_run() {
    let config = RejectionConfig::default()
        .threshold(Threshold::above(2.0))
        .limit(None)
        .seed(4);
    let handle = RejectionSampler::new(linear_oracle(), vec![0.9, 0.2, 0.5, 0.1], config)
        .unwrap()
        .start()
        .unwrap();

    handle.stop();
    let outcome = handle.join().unwrap();
    assert!(outcome.stopped);
    assert!(outcome.samples.is_empty());
}

#[test]
fn test_same_seed_same_outcome() {
    let run = || {
        let config = RejectionConfig::default()
            .threshold(Threshold::above(0.5))
            .n(5)
            .seed(99);
        RejectionSampler::new(linear_oracle(), vec![0.9, 0.2, 0.5, 0.1], config)
            .unwrap()
            .run(&StopFlag::new())
            .unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_construction_errors() {
    let empty = Arc::new(FnOracle::new(Vec::new(), |_: &[f64]| Prediction::new(0.0, 0.0)));
    assert!(matches!(
        RejectionSampler::new(empty, vec![0.5], RejectionConfig::default()),
        Err(Error::EmptyTrainingSet)
    ));

    assert!(matches!(
        RejectionSampler::new(linear_oracle(), vec![0.5; 3], RejectionConfig::default()),
        Err(Error::DimensionMismatch { expected: 3, got: 4 })
    ));

    assert!(matches!(
        RejectionSampler::new(
            linear_oracle(),
            vec![0.5; 4],
            RejectionConfig::default().filter(vec![0, 4])
        ),
        Err(Error::FilterIndexOutOfRange { index: 4, dim: 4 })
    ));

    let missing_target = Threshold {
        mode: explorer::ThresholdMode::Radius,
        value: 0.9,
        target: None,
    };
    assert!(matches!(
        RejectionSampler::new(
            linear_oracle(),
            vec![0.5; 4],
            RejectionConfig::default().threshold(missing_target)
        ),
        Err(Error::MissingThresholdTarget(explorer::ThresholdMode::Radius))
    ));

    assert!(matches!(
        GenericRejectionSampler::new(
            vec![0.5],
            Vec::new(),
            vec![0],
            |_: &[f64]| Ok(Prediction::new(0.0, 0.0)),
            RejectionConfig::default(),
        ),
        Err(Error::EmptySeedPool)
    ));
}
