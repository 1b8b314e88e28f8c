use rand::rngs::StdRng;
use rand::SeedableRng;

use ferrite_deep::autograd::Graph;
use ferrite_deep::loss::{CrossEntropyLoss, Loss};
use ferrite_deep::models::{CnnConfig, RecurrentConfig};
use ferrite_deep::network::{Model, ModelSpec, ParamStore, RunSpec};
use ferrite_deep::optim::{Adam, Optimizer, OptimizerSpec};
use ferrite_deep::{Device, Estimator, FitConfig, NnError, Tensor};

fn small_cnn(multi: bool) -> CnnConfig {
    let base = if multi { CnnConfig::multi(2, 4, 36) } else { CnnConfig::new(2, 4, 36) };
    CnnConfig { hidden_size: 8, ..base }
}

fn small_rnn() -> RecurrentConfig {
    RecurrentConfig { dropout: 0.2, ..RecurrentConfig::new(5, 6, 2) }
}

/// One small instance of every architecture with a matching input batch.
fn variants(rng: &mut StdRng) -> Vec<(ModelSpec, Tensor)> {
    let n = 4;
    vec![
        (ModelSpec::LogisticRegression { input_size: 7, num_classes: 2 }, Tensor::randn(&[n, 7], rng)),
        (ModelSpec::Mlp { input_dim: 7, hidden_size: 5, num_classes: 2, dropout: 0.5 }, Tensor::randn(&[n, 7], rng)),
        (ModelSpec::Cnn(small_cnn(false)), Tensor::randn(&[n, 4, 36], rng)),
        (ModelSpec::CnnMix(small_cnn(false)), Tensor::randn(&[n, 4, 36], rng)),
        (ModelSpec::CnnMulti(small_cnn(true)), Tensor::randn(&[n, 4, 36], rng)),
        (ModelSpec::Gru(small_rnn()), Tensor::randn(&[n, 3, 5], rng)),
        (ModelSpec::Rnn(small_rnn()), Tensor::randn(&[n, 3, 5], rng)),
        (ModelSpec::BiRnn(small_rnn()), Tensor::randn(&[n, 3, 5], rng)),
    ]
}

fn snapshot(store: &ParamStore) -> Vec<Vec<f64>> {
    store.iter().filter(|p| p.trainable).map(|p| p.value.data.clone()).collect()
}

#[test]
fn every_variant_scores_two_classes() {
    let mut rng = StdRng::seed_from_u64(11);
    for (spec, x) in variants(&mut rng) {
        let mut model = spec.build(Device::Cpu, &mut rng).unwrap();
        let scores = model.predict_scores(&x).unwrap();
        assert_eq!(scores.shape, vec![4, 2], "{}", model.name());

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), 8);
        for row in proba.chunks(2) {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-9, "{}", model.name());
        }
    }
}

#[test]
fn one_optimizer_step_changes_parameters() {
    let mut rng = StdRng::seed_from_u64(12);
    for (spec, x) in variants(&mut rng) {
        let mut model = spec.build(Device::Cpu, &mut rng).unwrap();
        let before = snapshot(model.params());

        let mut g = Graph::train(3);
        let input = g.input(x);
        let scores = model.forward(&mut g, input).unwrap();
        let loss = CrossEntropyLoss.forward(&mut g, scores, &[0, 1, 0, 1]).unwrap();
        g.backward(loss, model.params_mut()).unwrap();
        Adam::new(1e-2).step(model.params_mut()).unwrap();

        let after = snapshot(model.params());
        assert_ne!(before, after, "{} did not move", model.name());
    }
}

#[test]
fn batch_norm_running_stats_move_only_in_training() {
    let mut rng = StdRng::seed_from_u64(13);
    let mut model = ModelSpec::Cnn(small_cnn(false)).build(Device::Cpu, &mut rng).unwrap();
    let x = Tensor::randn(&[4, 4, 36], &mut rng);
    let buffers = |m: &dyn Model| -> Vec<Vec<f64>> {
        m.params().iter().filter(|p| !p.trainable).map(|p| p.value.data.clone()).collect()
    };

    let start = buffers(model.as_ref());
    model.predict_scores(&x).unwrap();
    assert_eq!(buffers(model.as_ref()), start);

    let mut g = Graph::train(0);
    let input = g.input(x);
    model.forward(&mut g, input).unwrap();
    assert_ne!(buffers(model.as_ref()), start);
}

#[test]
fn wrong_input_shape_is_an_error() {
    let mut rng = StdRng::seed_from_u64(14);
    let mut cnn = ModelSpec::Cnn(small_cnn(false)).build(Device::Cpu, &mut rng).unwrap();
    let err = cnn.predict_scores(&Tensor::zeros(&[2, 5, 36])).unwrap_err();
    assert!(matches!(err, NnError::ShapeMismatch { .. }));

    let mut gru = ModelSpec::Gru(small_rnn()).build(Device::Cpu, &mut rng).unwrap();
    assert!(gru.predict_scores(&Tensor::zeros(&[2, 3, 4])).is_err());
}

#[test]
fn collapsing_configuration_is_rejected() {
    let mut rng = StdRng::seed_from_u64(15);
    // Two 1×5 convolutions and two 1×3 pools need more than 12 columns.
    match ModelSpec::Cnn(CnnConfig::new(2, 4, 12)).build(Device::Cpu, &mut rng) {
        Err(NnError::InvalidArgument(_)) => {}
        Err(other) => panic!("unexpected error: {other}"),
        Ok(model) => panic!("{} built from a collapsing configuration", model.name()),
    }
}

#[test]
fn run_spec_round_trips_through_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    let path = path.to_str().unwrap();

    let mut run = RunSpec::new("birnn-demo", ModelSpec::BiRnn(small_rnn()));
    run.optimizer = OptimizerSpec::Sgd { learning_rate: 0.05, momentum: 0.9, weight_decay: 1e-4 };
    run.seed = Some(99);
    run.save_json(path).unwrap();

    assert_eq!(RunSpec::load_json(path).unwrap(), run);
}

#[test]
fn weights_reload_into_a_fresh_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("weights.json");
    let path = path.to_str().unwrap();

    let spec = ModelSpec::CnnMix(small_cnn(false));
    let mut rng = StdRng::seed_from_u64(16);
    let x = Tensor::randn(&[4, 4, 36], &mut rng);
    let y = vec![0, 1, 0, 1];

    let mut trained = Estimator::new(spec.build(Device::Cpu, &mut rng).unwrap(), Device::Cpu).unwrap();
    trained.compile_with(&OptimizerSpec::Adam { learning_rate: 1e-2, weight_decay: 0.0 }, Default::default());
    trained.fit(&x, &y, &FitConfig::new(2, 2).with_seed(1), None).unwrap();
    trained.save_weights(path).unwrap();

    let mut fresh = Estimator::new(spec.build(Device::Cpu, &mut rng).unwrap(), Device::Cpu).unwrap();
    assert_ne!(fresh.predict(&x).unwrap(), trained.predict(&x).unwrap());
    fresh.load_weights(path).unwrap();
    assert_eq!(fresh.predict(&x).unwrap(), trained.predict(&x).unwrap());
}

#[test]
fn loading_weights_of_another_architecture_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("weights.json");
    let path = path.to_str().unwrap();
    let mut rng = StdRng::seed_from_u64(17);

    let lr = ModelSpec::LogisticRegression { input_size: 3, num_classes: 2 }.build(Device::Cpu, &mut rng).unwrap();
    lr.params().save_json(path).unwrap();

    let mut gru = Estimator::new(ModelSpec::Gru(small_rnn()).build(Device::Cpu, &mut rng).unwrap(), Device::Cpu).unwrap();
    assert!(matches!(gru.load_weights(path), Err(NnError::ParamMismatch(_))));
}
