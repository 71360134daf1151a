use criterion::{criterion_group, criterion_main, Criterion};

use nalgebra::{SMatrix, SVector};

extern crate guided_policy_search;
use guided_policy_search::control::{
    backward_pass, forward_pass, LinearGaussianControl, LinearGaussianDynamics, QuadraticCost,
};
use guided_policy_search::utils::state::GaussianState;

const DX: usize = 6;
const DU: usize = 2;
const NB_STEPS: usize = 100;

fn setup() -> (
    QuadraticCost<DX, DU>,
    LinearGaussianDynamics<DX, DU>,
    GaussianState<DX>,
) {
    let mut cost = QuadraticCost::zeros(NB_STEPS);
    let mut dynamics = LinearGaussianDynamics::new(NB_STEPS);
    for t in 0..=NB_STEPS {
        cost.cxx[t] = SMatrix::identity();
        if t < NB_STEPS {
            cost.cuu[t] = SMatrix::identity() * 0.1;
        }
    }
    for t in 0..NB_STEPS {
        dynamics.a[t] = SMatrix::from_fn(|i, j| if i == j { 1.0 } else { 0.01 });
        dynamics.b[t] = SMatrix::from_fn(|i, j| 0.1 * ((i + j) as f64 + 1.0) / (DX + DU) as f64);
        dynamics.sigma[t] = SMatrix::identity() * 1e-6;
    }
    let init = GaussianState::new(SVector::repeat(0.5), SMatrix::identity() * 1e-2);
    (cost, dynamics, init)
}

fn backward(b: &mut Criterion) {
    let (cost, dynamics, _) = setup();
    b.bench_function("backward_pass", |b| {
        b.iter(|| backward_pass(&cost, &dynamics, -10.0).unwrap())
    });
}

fn forward(b: &mut Criterion) {
    let (cost, dynamics, init) = setup();
    let ctl = backward_pass(&cost, &dynamics, -10.0).unwrap().ctl;
    b.bench_function("forward_pass", |b| {
        b.iter(|| forward_pass(&init, &dynamics, &ctl))
    });
}

fn augment(b: &mut Criterion) {
    let (cost, _, _) = setup();
    let ctl = LinearGaussianControl::<DX, DU>::new(NB_STEPS, 1.0);
    b.bench_function("augment_cost", |b| b.iter(|| cost.augment(&ctl, -10.0)));
}

criterion_group!(benches, backward, forward, augment);
criterion_main!(benches);
