mod double_cartpole;
mod linear;
mod pendulum;

pub use double_cartpole::DoubleCartpole;
pub use linear::LinearQuadraticEnv;
pub use pendulum::Pendulum;

use nalgebra::{SMatrix, SVector};

use crate::utils::mvn::MultiVariateNormal;
use crate::utils::state::GaussianState;

/// Wrap an angle to [-pi, pi].
pub fn wrap_angle(x: f64) -> f64 {
    use std::f64::consts::PI;
    (x + PI).rem_euclid(2.0 * PI) - PI
}

/// Clamp each coordinate of `v` to the box `[-lim, lim]`.
pub fn clip<const D: usize>(v: &SVector<f64, D>, lim: &SVector<f64, D>) -> SVector<f64, D> {
    SVector::from_fn(|i, _| v[i].clamp(-lim[i], lim[i]))
}

/// Contract between the optimizer and a controlled system.
///
/// `DX`: state dimension, `DU`: action dimension. `reset` and `step` have
/// default implementations in terms of `init`, `dynamics` and `noise`; an
/// environment only overrides them when its stochasticity is not additive
/// Gaussian.
pub trait Environment<const DX: usize, const DU: usize> {
    /// Deterministic transition component.
    fn dynamics(&self, x: &SVector<f64, DX>, u: &SVector<f64, DU>) -> SVector<f64, DX>;

    /// Transition covariance at `(x, u)`.
    fn noise(&self, x: &SVector<f64, DX>, u: &SVector<f64, DU>) -> SMatrix<f64, DX, DX>;

    /// Instantaneous cost. `u_prev` supports slew-rate penalties; `weight`
    /// scales the goal-tracking term per the activation schedule.
    fn cost(
        &self,
        x: &SVector<f64, DX>,
        u: &SVector<f64, DU>,
        u_prev: &SVector<f64, DU>,
        weight: f64,
    ) -> f64;

    /// Prior over the initial state.
    fn init(&self) -> GaussianState<DX>;

    /// Action box limits.
    fn ulim(&self) -> SVector<f64, DU>;

    /// Current simulation state.
    fn state(&self) -> SVector<f64, DX>;

    fn set_state(&mut self, x: SVector<f64, DX>);

    /// Draw an initial state from the environment's own prior.
    fn reset(&mut self) -> SVector<f64, DX> {
        let prior = self.init();
        let mut rng = rand::thread_rng();
        let x = match MultiVariateNormal::new(&prior.x, &prior.cov) {
            Ok(mvn) => mvn.sample(&mut rng),
            // degenerate prior: start at the mean
            Err(_) => prior.x,
        };
        self.set_state(x);
        x
    }

    /// Apply one control and advance the internal state with
    /// `noise(x, u)`-distributed additive Gaussian noise.
    fn step(&mut self, u: &SVector<f64, DU>) -> SVector<f64, DX> {
        let x = self.state();
        let sigma = self.noise(&x, u);
        let xn = self.dynamics(&x, u);
        let mut rng = rand::thread_rng();
        let xn = match MultiVariateNormal::new(&xn, &sigma) {
            Ok(mvn) => mvn.sample(&mut rng),
            // zero or degenerate noise: deterministic transition
            Err(_) => xn,
        };
        self.set_state(xn);
        xn
    }
}

#[cfg(test)]
mod tests {
    use super::wrap_angle;
    use std::f64::consts::PI;

    #[test]
    fn wrap_angle_stays_in_range() {
        for k in -8..8 {
            let x = 0.3 + k as f64 * 2.0 * PI;
            assert!((wrap_angle(x) - 0.3).abs() < 1e-9);
        }
        assert!((wrap_angle(PI + 0.1) + PI - 0.1).abs() < 1e-9);
    }
}
