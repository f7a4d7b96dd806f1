//! Simulation benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use glufire::circuit::{fit_promoter, synthetic, AndGate, FitMode, FitOptions, HillParameters};
use glufire::metabolism::EngineeredStrain;
use glufire::numerics::SolverSettings;
use glufire::pk::{default_pk_solver, NeurotoxScenario, ToxicityThresholds};
use glufire::therapy::{compare_default_conditions, TherapyModel};

fn bench_gate_scan(c: &mut Criterion) {
    let gate = AndGate::default();
    let o2: Vec<f64> = (0..50).map(|i| 0.5 + 0.4 * i as f64).collect();
    let temps: Vec<f64> = (0..50).map(|i| 33.0 + 0.25 * i as f64).collect();

    c.bench_function("gate_grid_50x50", |b| {
        b.iter(|| black_box(&gate).activity_grid(black_box(&o2), black_box(&temps)))
    });
}

fn bench_promoter_fit(c: &mut Criterion) {
    let truth = HillParameters::lr_heat();
    let data = synthetic::dose_response(&truth, &synthetic::TEMPERATURE_LEVELS, 3, 0.03, 7).unwrap();

    c.bench_function("promoter_fit_auto", |b| {
        b.iter(|| fit_promoter(black_box(&data), FitMode::Auto, &FitOptions::default()))
    });
}

fn bench_strain_heat_shock(c: &mut Criterion) {
    let strain = EngineeredStrain::engineered();

    let mut group = c.benchmark_group("strain");
    group.sample_size(10);
    group.bench_function("heat_shock_48h", |b| b.iter(|| black_box(&strain).simulate_heat_shock()));
    group.finish();
}

fn bench_therapy(c: &mut Criterion) {
    let model = TherapyModel::default();
    let settings = SolverSettings::default();

    let mut group = c.benchmark_group("therapy");
    group.sample_size(10);
    group.bench_function("therapy_vs_control_200h", |b| {
        b.iter(|| compare_default_conditions(black_box(&model), &settings))
    });
    group.finish();
}

fn bench_neurotox(c: &mut Criterion) {
    let scenario = NeurotoxScenario::worst_case();
    let thresholds = ToxicityThresholds::default();
    let settings = default_pk_solver();

    c.bench_function("neurotox_worst_case_48h", |b| {
        b.iter(|| black_box(&scenario).run(&thresholds, &settings))
    });
}

criterion_group!(
    benches,
    bench_gate_scan,
    bench_promoter_fit,
    bench_strain_heat_shock,
    bench_therapy,
    bench_neurotox
);
criterion_main!(benches);
