use std::sync::mpsc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use ferrite_deep::autograd::{Graph, Var};
use ferrite_deep::data::synthetic::separable_blobs;
use ferrite_deep::data::Dataset;
use ferrite_deep::loss::{CrossEntropyLoss, LossType};
use ferrite_deep::models::{LogisticRegression, Mlp};
use ferrite_deep::network::{Model, ParamStore};
use ferrite_deep::optim::{Adam, OptimizerSpec, Sgd};
use ferrite_deep::{Device, Estimator, FitConfig, NnError, RemainderPolicy, Result, Tensor};

/// Scores every sample identically, whatever the input.
struct ConstantModel {
    store: ParamStore,
}

impl Model for ConstantModel {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn device(&self) -> Device {
        Device::Cpu
    }

    fn num_classes(&self) -> usize {
        2
    }

    fn params(&self) -> &ParamStore {
        &self.store
    }

    fn params_mut(&mut self) -> &mut ParamStore {
        &mut self.store
    }

    fn forward(&mut self, graph: &mut Graph, input: Var) -> Result<Var> {
        let n = graph.shape(input)[0];
        Ok(graph.input(Tensor::full(&[n, 2], 0.3)))
    }
}

fn blobs(seed: u64) -> Dataset {
    separable_blobs(100, 2, 2.5, &mut StdRng::seed_from_u64(seed)).unwrap()
}

fn logistic(seed: u64) -> Estimator<LogisticRegression> {
    let model = LogisticRegression::new(2, 2, Device::Cpu, &mut StdRng::seed_from_u64(seed)).unwrap();
    Estimator::new(model, Device::Cpu).unwrap()
}

#[test]
fn logistic_regression_separates_blobs() {
    let data = blobs(1);
    let mut clf = logistic(2);
    clf.compile(Box::new(Adam::new(0.05)), Box::new(CrossEntropyLoss));

    let history = clf.fit(&data.features, &data.labels, &FitConfig::new(30, 16).with_seed(3), None).unwrap();
    assert_eq!(history.len(), 30);
    assert!(history.last().unwrap().train_accuracy > 0.9);

    let predicted = clf.predict_classes(&data.features).unwrap();
    assert!(clf.accuracy(&predicted, &data.labels).unwrap() > 0.9);

    let (_, auc) = clf.evaluate(&data.features, &data.labels, 32).unwrap();
    assert!(auc > 0.95);
}

#[test]
fn same_seed_gives_identical_loss_trajectories() {
    let data = blobs(4);
    let run = || {
        let mut rng = StdRng::seed_from_u64(5);
        let model = Mlp::new(2, 6, 2, 0.5, Device::Cpu, &mut rng).unwrap();
        let mut clf = Estimator::new(model, Device::Cpu).unwrap();
        clf.compile(Box::new(Sgd::new(0.1).with_momentum(0.9)), Box::new(CrossEntropyLoss));
        clf.fit(&data.features, &data.labels, &FitConfig::new(3, 8).with_seed(9), None)
            .unwrap()
            .iter()
            .map(|s| (s.train_loss, s.train_accuracy))
            .collect::<Vec<_>>()
    };
    assert_eq!(run(), run());
}

#[test]
fn constant_scores_give_auc_of_one_half() {
    let data = blobs(6);
    let mut clf = Estimator::new(ConstantModel { store: ParamStore::new() }, Device::Cpu).unwrap();
    clf.compile(Box::new(Sgd::new(0.1)), Box::new(CrossEntropyLoss));
    let (loss, auc) = clf.evaluate(&data.features, &data.labels, 32).unwrap();
    assert_eq!(auc, 0.5);
    assert!((loss - 2f64.ln()).abs() < 1e-9);
}

#[test]
fn accuracy_counts_exact_matches() {
    let clf = logistic(0);
    let acc = clf.accuracy(&[1, 0, 1], &[1, 1, 1]).unwrap();
    assert!((acc - 2.0 / 3.0).abs() < 1e-12);
    assert!(matches!(clf.accuracy(&[], &[]), Err(NnError::EmptyInput(_))));
}

#[test]
fn fit_and_evaluate_require_compile() {
    let data = blobs(7);
    let mut clf = logistic(0);
    assert!(!clf.is_compiled());
    let fit = clf.fit(&data.features, &data.labels, &FitConfig::default(), None);
    assert!(matches!(fit, Err(NnError::NotCompiled)));
    assert!(matches!(clf.evaluate(&data.features, &data.labels, 32), Err(NnError::NotCompiled)));
}

#[test]
fn validation_metrics_are_reported_each_epoch() {
    let train = blobs(8);
    let val = blobs(9);
    let mut clf = logistic(1);
    clf.compile_with(&OptimizerSpec::Adam { learning_rate: 0.05, weight_decay: 0.0 }, LossType::CrossEntropy);

    let history = clf
        .fit(&train.features, &train.labels, &FitConfig::new(4, 32).with_seed(0), Some((&val.features, &val.labels)))
        .unwrap();
    for (i, stats) in history.iter().enumerate() {
        assert_eq!(stats.epoch, i + 1);
        assert_eq!(stats.total_epochs, 4);
        assert!(stats.val_loss.is_some());
        assert!(stats.val_auc.unwrap() >= 0.0);
    }
}

#[test]
fn progress_channel_receives_every_epoch() {
    let data = blobs(10);
    let mut clf = logistic(2);
    clf.compile(Box::new(Sgd::new(0.1)), Box::new(CrossEntropyLoss));

    let (tx, rx) = mpsc::channel();
    let history = clf.fit(&data.features, &data.labels, &FitConfig::new(3, 50).with_progress(tx), None).unwrap();
    let received: Vec<_> = rx.try_iter().collect();
    assert_eq!(received, history);
}

#[test]
fn dropped_progress_receiver_does_not_stop_training() {
    let data = blobs(11);
    let mut clf = logistic(2);
    clf.compile(Box::new(Sgd::new(0.1)), Box::new(CrossEntropyLoss));

    let (tx, rx) = mpsc::channel();
    drop(rx);
    let history = clf.fit(&data.features, &data.labels, &FitConfig::new(5, 50).with_progress(tx), None).unwrap();
    assert_eq!(history.len(), 5);
}

#[test]
fn fold_policy_and_mse_loss_train_end_to_end() {
    let data = blobs(12);
    let mut clf = logistic(3);
    clf.compile_with(&OptimizerSpec::Sgd { learning_rate: 0.02, momentum: 0.0, weight_decay: 0.0 }, LossType::Mse);
    let config = FitConfig::new(10, 30).with_seed(4).with_remainder(RemainderPolicy::Fold);
    let history = clf.fit(&data.features, &data.labels, &config, None).unwrap();
    assert!(history.iter().all(|s| s.train_loss.is_finite()));
    assert!(history.last().unwrap().train_loss < history[0].train_loss);
    assert!(history.last().unwrap().train_accuracy > 0.9);
}

#[test]
fn evaluate_needs_two_score_columns() {
    let data = blobs(13);
    let model = LogisticRegression::new(2, 3, Device::Cpu, &mut StdRng::seed_from_u64(0)).unwrap();
    let mut clf = Estimator::new(model, Device::Cpu).unwrap();
    clf.compile(Box::new(Sgd::new(0.1)), Box::new(CrossEntropyLoss));
    assert!(matches!(clf.evaluate(&data.features, &data.labels, 32), Err(NnError::InvalidArgument(_))));
}

#[test]
fn mismatched_inputs_are_rejected() {
    let mut clf = logistic(0);
    clf.compile(Box::new(Sgd::new(0.1)), Box::new(CrossEntropyLoss));
    let x = Tensor::zeros(&[4, 2]);
    let fit = clf.fit(&x, &[0, 1, 0], &FitConfig::default(), None);
    assert!(matches!(fit, Err(NnError::ShapeMismatch { .. })));
    let zero_batch = clf.fit(&x, &[0, 1, 0, 1], &FitConfig::new(1, 0), None);
    assert!(matches!(zero_batch, Err(NnError::InvalidArgument(_))));
}

#[test]
fn predict_proba_rows_are_distributions() {
    let data = blobs(14);
    let mut clf = logistic(5);
    let proba = clf.predict_proba(&data.features).unwrap();
    assert_eq!(proba.len(), data.len() * 2);
    assert!(proba.chunks(2).all(|p| (p[0] + p[1] - 1.0).abs() < 1e-12));
    assert_eq!(clf.predict(&data.features).unwrap().shape, vec![data.len(), 2]);
}
