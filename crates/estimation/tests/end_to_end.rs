use mixall_components::{Component, MixtureComponent, ModelName};
use mixall_composer::{Composer, ComposerState};
use mixall_estimation::{AlgoConfig, AlgoKind, InitConfig, Strategy, StrategyConfig, StrategyKind};
use ndarray::Array2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal, Poisson};

/// Samples alternate between N(-3, 1) (even rows) and N(3, 1) (odd rows).
fn gaussian_mixture(n: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let left = Normal::new(-3.0, 1.0).unwrap();
    let right = Normal::new(3.0, 1.0).unwrap();
    Array2::from_shape_fn((n, 1), |(i, _)| {
        if i % 2 == 0 {
            left.sample(&mut rng)
        } else {
            right.sample(&mut rng)
        }
    })
}

fn accuracy(labels: &[usize]) -> f64 {
    let n = labels.len() as f64;
    let agree = labels.iter().enumerate().filter(|(i, z)| **z == i % 2).count() as f64;
    (agree / n).max(1.0 - agree / n)
}

fn em(n_iter_max: usize, epsilon: f64) -> AlgoConfig {
    AlgoConfig::new(AlgoKind::Em).with_n_iter_max(n_iter_max).with_epsilon(epsilon)
}

#[test]
fn full_strategy_recovers_two_gaussians() {
    let model: ModelName = "gaussian_sjk".parse().unwrap();
    let component = Component::new(model, gaussian_mixture(300, 7), 2).unwrap();
    let mut composer = Composer::new(vec![component], 2).unwrap();

    let config = StrategyConfig::new()
        .with_kind(StrategyKind::Full)
        .with_n_try(3)
        .with_n_short_run(2)
        .with_init(InitConfig::new().with_n_init_run(5))
        .with_short_algo(em(200, 1e-6))
        .with_long_algo(em(200, 1e-6));
    let strategy = Strategy::from_config(&config).unwrap();

    let mut rng = StdRng::seed_from_u64(2024);
    let report = strategy.run(&mut composer, &mut rng).unwrap();
    composer.imputation_step();
    composer.finalize_step();

    assert!(report.ln_likelihood.is_finite());
    assert_eq!(composer.state(), ComposerState::Estimated);
    for &p in composer.prop() {
        assert!((p - 0.5).abs() < 0.1, "proportion {p}");
    }
    let acc = accuracy(composer.zi());
    assert!(acc >= 0.95, "accuracy {acc}");
}

#[test]
fn em_likelihood_never_decreases() {
    let model: ModelName = "gaussian_sk".parse().unwrap();
    let component = Component::new(model, gaussian_mixture(200, 8), 3).unwrap();
    let mut composer = Composer::new(vec![component], 3).unwrap();

    let mut rng = StdRng::seed_from_u64(8);
    composer.initialize_step();
    composer.random_fuzzy_init(&mut rng).unwrap();

    let step = mixall_estimation::Algorithm::new(em(1, 0.0));
    let mut previous = composer.ln_likelihood();
    for _ in 0..50 {
        let out = step.run(&mut composer, &mut rng).unwrap();
        assert!(
            out.ln_likelihood >= previous - 1e-9 * previous.abs(),
            "{} < {previous}",
            out.ln_likelihood
        );
        previous = out.ln_likelihood;
    }
}

#[test]
fn heterogeneous_components_estimate_jointly() {
    let mut rng = StdRng::seed_from_u64(9);
    let low = Poisson::new(2.0).unwrap();
    let high = Poisson::new(15.0).unwrap();
    let counts = Array2::from_shape_fn((200, 2), |(i, _)| {
        if i % 2 == 0 {
            low.sample(&mut rng)
        } else {
            high.sample(&mut rng)
        }
    });
    let gauss = gaussian_mixture(200, 9);

    let n_cluster = 2;
    let components = vec![
        Component::new("gaussian_sk".parse().unwrap(), gauss, n_cluster).unwrap(),
        Component::new("poisson_ljk".parse().unwrap(), counts, n_cluster).unwrap(),
    ];
    let mut composer = Composer::new(components, n_cluster).unwrap();

    let config = StrategyConfig::new()
        .with_kind(StrategyKind::Xem)
        .with_n_try(2)
        .with_n_short_run(3)
        .with_long_algo(em(300, 1e-8));
    let mut rng = StdRng::seed_from_u64(10);
    Strategy::from_config(&config).unwrap().run(&mut composer, &mut rng).unwrap();
    composer.finalize_step();

    assert!(accuracy(composer.zi()) >= 0.95);
    for c in composer.components() {
        for block in c.parameters() {
            assert!(block.values.iter().flatten().all(|v| v.is_finite()), "{}", block.name);
        }
    }
}

#[test]
fn missing_values_are_imputed() {
    let mut data = gaussian_mixture(200, 11);
    for i in (0..200).step_by(17) {
        data[[i, 0]] = f64::NAN;
    }
    let model: ModelName = "gaussian_sk".parse().unwrap();
    let component = Component::new(model, data, 2).unwrap();
    let mut composer = Composer::new(vec![component], 2).unwrap();

    let config = StrategyConfig::new()
        .with_kind(StrategyKind::Simple)
        .with_n_try(2)
        .with_long_algo(AlgoConfig::new(AlgoKind::SemiSem).with_n_iter_max(100).with_epsilon(1e-3));
    let mut rng = StdRng::seed_from_u64(12);
    Strategy::from_config(&config).unwrap().run(&mut composer, &mut rng).unwrap();
    composer.imputation_step();
    composer.finalize_step();

    assert!(composer.ln_likelihood().is_finite());
    for i in 0..composer.n_sample() {
        assert!(composer.compute_ln_likelihood_at(i).is_finite(), "row {i}");
    }
}
