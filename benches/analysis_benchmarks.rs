use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tabular_uncertainty::metric::{Metric, NamedMetric};
use tabular_uncertainty::utils::{fast_sum, mean};
use tabular_uncertainty::{get_incremental_loss, Dataset, FitConfig, IncrementalConfig, MLPConfig, ResultContainer, MLP};

fn random_runs(rng: &mut StdRng, n_runs: usize, n_points: usize) -> (Vec<Vec<f64>>, ResultContainer) {
    let mut results = ResultContainer::new();
    let mut y = Vec::with_capacity(n_runs);
    for _ in 0..n_runs {
        let p: Vec<f64> = (0..n_points).map(|_| rng.gen::<f64>()).collect();
        y.push(p.iter().map(|v| if rng.gen::<f64>() < *v { 1.0 } else { 0.0 }).collect());
        let probs = Array2::from_shape_fn((n_points, 2), |(i, j)| if j == 0 { 1.0 - p[i] } else { p[i] });
        results.add_results(probs.view(), "random").unwrap();
    }
    (y, results)
}

fn random_dataset(rng: &mut StdRng, n_rows: usize, n_features: usize) -> Dataset {
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen_range(-1.0..1.0));
    let y = x.rows().into_iter().map(|r| if r.sum() > 0.0 { 1.0 } else { 0.0 }).collect();
    Dataset::new(x, y).unwrap()
}

pub fn analysis_benchmarks(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0);

    let v: Vec<f64> = vec![10.; 300000];
    c.bench_function("fast sum", |b| b.iter(|| fast_sum(black_box(&v))));
    c.bench_function("mean", |b| b.iter(|| mean(black_box(&v))));

    let (y, results) = random_runs(&mut rng, 5, 2000);
    let method = results.get("random").unwrap();
    let metrics: Vec<NamedMetric> = vec![Metric::Accuracy.into(), Metric::AUC.into(), Metric::LogLoss.into()];
    let config = IncrementalConfig::new(100, 50);
    c.bench_function("get_incremental_loss", |b| {
        b.iter(|| {
            get_incremental_loss(
                black_box(&y),
                black_box(&method.predictions),
                black_box(&method.uncertainties),
                black_box(&metrics),
                black_box(&config),
            )
            .unwrap()
        })
    });
    let parallel = config.set_parallel(true);
    c.bench_function("get_incremental_loss (parallel)", |b| {
        b.iter(|| {
            get_incremental_loss(
                black_box(&y),
                black_box(&method.predictions),
                black_box(&method.uncertainties),
                black_box(&metrics),
                black_box(&parallel),
            )
            .unwrap()
        })
    });

    let train = random_dataset(&mut rng, 5000, 20);
    let val = random_dataset(&mut rng, 1000, 20);
    let fit = FitConfig {
        n_epochs: 1,
        early_stopping: false,
        ..FitConfig::default()
    };
    let mut mlp_train = c.benchmark_group("train_mlp");
    mlp_train.warm_up_time(Duration::from_secs(5));
    mlp_train.sample_size(20);
    mlp_train.bench_function("train_mlp_one_epoch", |b| {
        b.iter(|| {
            let mut model = MLP::new(MLPConfig::new(vec![50, 50], 20, 0.5)).unwrap();
            model.train(black_box(&train), black_box(&val), black_box(&fit)).unwrap();
        })
    });
    mlp_train.bench_function("train_mlp_one_epoch_batch_norm", |b| {
        b.iter(|| {
            let mut model = MLP::new(MLPConfig::new(vec![50, 50], 20, 0.5).set_batch_norm(true)).unwrap();
            model.train(black_box(&train), black_box(&val), black_box(&fit)).unwrap();
        })
    });
    let model = MLP::new(MLPConfig::new(vec![50, 50], 20, 0.5)).unwrap();
    mlp_train.bench_function("predict_proba", |b| b.iter(|| model.predict_proba(black_box(val.x())).unwrap()));
    mlp_train.finish();
}

criterion_group!(benches, analysis_benchmarks);
criterion_main!(benches);
