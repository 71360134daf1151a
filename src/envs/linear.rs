use nalgebra::{SMatrix, SVector};

use crate::envs::{clip, Environment};
use crate::utils::state::GaussianState;

/// Linear-Gaussian system with quadratic cost,
/// `x' = A x + B u + c + noise`. The reference problem for closed-form
/// checks: the optimizer should recover the finite-horizon LQR solution.
#[derive(Debug, Clone)]
pub struct LinearQuadraticEnv<const DX: usize, const DU: usize> {
    a: SMatrix<f64, DX, DX>,
    b: SMatrix<f64, DX, DU>,
    c: SVector<f64, DX>,
    sigma: SMatrix<f64, DX, DX>,
    /// goal state and diagonal goal weights
    g: SVector<f64, DX>,
    gw: SVector<f64, DX>,
    /// diagonal action weights
    uw: SVector<f64, DU>,
    umax: SVector<f64, DU>,
    x0: SVector<f64, DX>,
    sigma0: SMatrix<f64, DX, DX>,
    state: SVector<f64, DX>,
}

impl<const DX: usize, const DU: usize> LinearQuadraticEnv<DX, DU> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        a: SMatrix<f64, DX, DX>,
        b: SMatrix<f64, DX, DU>,
        c: SVector<f64, DX>,
        sigma: SMatrix<f64, DX, DX>,
        g: SVector<f64, DX>,
        gw: SVector<f64, DX>,
        uw: SVector<f64, DU>,
        umax: SVector<f64, DU>,
        x0: SVector<f64, DX>,
        sigma0: SMatrix<f64, DX, DX>,
    ) -> LinearQuadraticEnv<DX, DU> {
        LinearQuadraticEnv {
            a,
            b,
            c,
            sigma,
            g,
            gw,
            uw,
            umax,
            x0,
            sigma0,
            state: x0,
        }
    }
}

impl LinearQuadraticEnv<1, 1> {
    /// Scalar system `x' = x + u`, cost `x^2 + 0.1 u^2`, near-deterministic.
    pub fn scalar() -> LinearQuadraticEnv<1, 1> {
        LinearQuadraticEnv::new(
            SMatrix::<f64, 1, 1>::new(1.0),
            SMatrix::<f64, 1, 1>::new(1.0),
            SVector::<f64, 1>::zeros(),
            SMatrix::<f64, 1, 1>::new(1e-8),
            SVector::<f64, 1>::zeros(),
            SVector::<f64, 1>::new(1.0),
            SVector::<f64, 1>::new(1e-1),
            SVector::<f64, 1>::new(1e2),
            SVector::<f64, 1>::new(1.0),
            SMatrix::<f64, 1, 1>::new(1e-4),
        )
    }
}

impl<const DX: usize, const DU: usize> Environment<DX, DU> for LinearQuadraticEnv<DX, DU> {
    fn dynamics(&self, x: &SVector<f64, DX>, u: &SVector<f64, DU>) -> SVector<f64, DX> {
        let u = clip(u, &self.umax);
        self.a * x + self.b * u + self.c
    }

    fn noise(&self, _x: &SVector<f64, DX>, _u: &SVector<f64, DU>) -> SMatrix<f64, DX, DX> {
        self.sigma
    }

    fn cost(
        &self,
        x: &SVector<f64, DX>,
        u: &SVector<f64, DU>,
        _u_prev: &SVector<f64, DU>,
        weight: f64,
    ) -> f64 {
        let mut c = 0.0;
        for i in 0..DU {
            c += self.uw[i] * u[i] * u[i];
        }
        for i in 0..DX {
            let d = x[i] - self.g[i];
            c += weight * self.gw[i] * d * d;
        }
        c
    }

    fn init(&self) -> GaussianState<DX> {
        GaussianState::new(self.x0, self.sigma0)
    }

    fn ulim(&self) -> SVector<f64, DU> {
        self.umax
    }

    fn state(&self) -> SVector<f64, DX> {
        self.state
    }

    fn set_state(&mut self, x: SVector<f64, DX>) {
        self.state = x;
    }
}
