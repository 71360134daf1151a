use nalgebra::{DMatrix, SMatrix, SVector};

use crate::control::gps::Rollouts;
use crate::envs::Environment;
use crate::utils::{diff, symmetrized};

/// Ridge added to the regression normal equations and to the fitted
/// residual covariance.
const REG: f64 = 1e-8;

/// Time-varying affine transition model with Gaussian noise,
/// `x' = A_t x + B_t u + c_t + eps`, `eps ~ N(0, sigma_t)`.
#[derive(Debug, Clone)]
pub struct LinearGaussianDynamics<const DX: usize, const DU: usize> {
    pub a: Vec<SMatrix<f64, DX, DX>>,
    pub b: Vec<SMatrix<f64, DX, DU>>,
    pub c: Vec<SVector<f64, DX>>,
    pub sigma: Vec<SMatrix<f64, DX, DX>>,
}

impl<const DX: usize, const DU: usize> LinearGaussianDynamics<DX, DU> {
    pub fn new(nb_steps: usize) -> LinearGaussianDynamics<DX, DU> {
        LinearGaussianDynamics {
            a: vec![SMatrix::identity(); nb_steps],
            b: vec![SMatrix::zeros(); nb_steps],
            c: vec![SVector::zeros(); nb_steps],
            sigma: vec![SMatrix::identity() * REG; nb_steps],
        }
    }

    pub fn nb_steps(&self) -> usize {
        self.a.len()
    }

    /// Fit the model per timestep by least squares over the sampled
    /// `(x, u, x')` tuples, regressing `x'` on `[x; u; 1]`.
    ///
    /// Returns the number of timesteps whose normal equations were
    /// near-singular and answered only after ridge regularization.
    pub fn learn(&mut self, data: &Rollouts<DX, DU>) -> usize {
        let nb_steps = self.nb_steps();
        let nf = DX + DU + 1;
        let nb_episodes = data.episodes.len();
        let mut regularized = 0;

        for t in 0..nb_steps {
            let mut s_ff = DMatrix::<f64>::zeros(nf, nf);
            let mut s_fy = DMatrix::<f64>::zeros(nf, DX);
            for ep in &data.episodes {
                let mut feat = DMatrix::<f64>::zeros(nf, 1);
                for i in 0..DX {
                    feat[(i, 0)] = ep.x[t][i];
                }
                for i in 0..DU {
                    feat[(DX + i, 0)] = ep.u[t][i];
                }
                feat[(nf - 1, 0)] = 1.0;

                s_ff += &feat * feat.transpose();
                for j in 0..DX {
                    for i in 0..nf {
                        s_fy[(i, j)] += feat[(i, 0)] * ep.xn[t][j];
                    }
                }
            }

            if s_ff.clone().cholesky().is_none() {
                regularized += 1;
            }
            let mut ridge = REG;
            let chol = loop {
                let damped = &s_ff + DMatrix::<f64>::identity(nf, nf) * ridge;
                match damped.cholesky() {
                    Some(chol) => break chol,
                    None => ridge *= 10.0,
                }
            };
            // weights of the affine model, one column per output coordinate
            let w = chol.solve(&s_fy);

            self.a[t] = SMatrix::from_fn(|i, j| w[(j, i)]);
            self.b[t] = SMatrix::from_fn(|i, j| w[(DX + j, i)]);
            self.c[t] = SVector::from_fn(|i, _| w[(nf - 1, i)]);

            let mut res_cov = SMatrix::<f64, DX, DX>::zeros();
            for ep in &data.episodes {
                let r = ep.xn[t] - self.a[t] * ep.x[t] - self.b[t] * ep.u[t] - self.c[t];
                res_cov += r * r.transpose();
            }
            res_cov /= nb_episodes.max(1) as f64;
            self.sigma[t] = symmetrized(&res_cov) + SMatrix::identity() * REG;
        }
        regularized
    }

    /// Linearize the environment's deterministic dynamics along a reference
    /// trajectory by central differences, in place of regression when the
    /// model is known.
    pub fn linearize<E: Environment<DX, DU>>(
        &mut self,
        env: &E,
        xref: &[SVector<f64, DX>],
        uref: &[SVector<f64, DU>],
    ) {
        for t in 0..self.nb_steps() {
            let (x, u) = (&xref[t], &uref[t]);
            self.a[t] = diff::jacobian(|xi| env.dynamics(xi, u), x);
            self.b[t] = diff::jacobian(|ui| env.dynamics(x, ui), u);
            self.c[t] = env.dynamics(x, u) - self.a[t] * x - self.b[t] * u;
            self.sigma[t] = symmetrized(&env.noise(x, u)) + SMatrix::identity() * REG;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::gps::{Episode, Rollouts};
    use nalgebra::{Matrix2, Vector1, Vector2};

    #[test]
    fn regression_recovers_exact_linear_system() {
        let a = Matrix2::new(0.9, 0.1, -0.2, 1.05);
        let b = Vector2::new(0.0, 0.5);
        let c = Vector2::new(0.1, -0.3);
        let nb_steps = 3;

        // deterministic episodes from spread-out starting points; the action
        // schedule must not be collinear with the states
        let actions = [
            0.3, -1.2, 0.7, 2.1, -0.4, 1.5, -2.2, 0.9, -1.7, 0.2, 1.1, -0.6,
        ];
        let mut episodes = Vec::new();
        for (k, &u0) in actions.iter().enumerate() {
            let mut x = Vector2::new((k % 4) as f64 - 1.5, (k / 4) as f64 - 1.0);
            let mut ep = Episode::<2, 1>::new(nb_steps);
            for t in 0..nb_steps {
                let u = Vector1::new(u0 + 0.4 * t as f64);
                let xn = a * x + b * u[0] + c;
                ep.x.push(x);
                ep.u.push(u);
                ep.xn.push(xn);
                x = xn;
            }
            episodes.push(ep);
        }

        let mut dynamics = LinearGaussianDynamics::<2, 1>::new(nb_steps);
        let regularized = dynamics.learn(&Rollouts { episodes });
        assert_eq!(regularized, 0);
        for t in 0..nb_steps {
            assert!((dynamics.a[t] - a).norm() < 1e-5);
            assert!((dynamics.b[t] - b).norm() < 1e-5);
            assert!((dynamics.c[t] - c).norm() < 1e-5);
            // noiseless data: only the ridge survives in the covariance
            assert!(dynamics.sigma[t].norm() < 1e-6);
        }
    }

    #[test]
    fn linearization_of_linear_env_is_exact() {
        use crate::envs::LinearQuadraticEnv;

        let env = LinearQuadraticEnv::scalar();
        let mut dynamics = LinearGaussianDynamics::<1, 1>::new(4);
        let xref = vec![Vector1::new(0.5); 4];
        let uref = vec![Vector1::new(-0.2); 4];
        dynamics.linearize(&env, &xref, &uref);
        for t in 0..4 {
            assert!((dynamics.a[t][(0, 0)] - 1.0).abs() < 1e-6);
            assert!((dynamics.b[t][(0, 0)] - 1.0).abs() < 1e-6);
            assert!(dynamics.c[t][0].abs() < 1e-6);
        }
    }
}
