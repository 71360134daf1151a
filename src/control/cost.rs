use nalgebra::{SMatrix, SVector};
use serde::{Deserialize, Serialize};

use crate::control::policy::LinearGaussianControl;
use crate::envs::Environment;
use crate::utils::{diff, symmetrized};

/// Per-timestep weighting of the goal-tracking cost term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    /// Weight 1 everywhere.
    Uniform,
    /// Logistic ramp `1 / (1 + exp(-mult (t - shift)))`.
    Sigmoid { mult: f64, shift: f64 },
    /// Weight 1 on `start <= t < end`, 0 elsewhere.
    Window { start: usize, end: usize },
}

impl Activation {
    /// Weights for all `nb_steps + 1` cost slices.
    pub fn weights(&self, nb_steps: usize) -> Vec<f64> {
        (0..=nb_steps)
            .map(|t| match *self {
                Activation::Uniform => 1.0,
                Activation::Sigmoid { mult, shift } => {
                    1.0 / (1.0 + (-mult * (t as f64 - shift)).exp())
                }
                Activation::Window { start, end } => {
                    if t >= start && t < end {
                        1.0
                    } else {
                        0.0
                    }
                }
            })
            .collect()
    }
}

/// Per-timestep quadratic cost model
/// `c(x, u) = x' cxx x + u' cuu u + 2 x' cxu u + cx' x + cu' u + c0`.
///
/// All sequences have `nb_steps + 1` slices; the terminal slice carries only
/// the state blocks (its action blocks stay zero).
#[derive(Debug, Clone)]
pub struct QuadraticCost<const DX: usize, const DU: usize> {
    pub cxx: Vec<SMatrix<f64, DX, DX>>,
    pub cuu: Vec<SMatrix<f64, DU, DU>>,
    pub cxu: Vec<SMatrix<f64, DX, DU>>,
    pub cx: Vec<SVector<f64, DX>>,
    pub cu: Vec<SVector<f64, DU>>,
    pub c0: Vec<f64>,
}

impl<const DX: usize, const DU: usize> QuadraticCost<DX, DU> {
    pub fn zeros(nb_steps: usize) -> QuadraticCost<DX, DU> {
        QuadraticCost {
            cxx: vec![SMatrix::zeros(); nb_steps + 1],
            cuu: vec![SMatrix::zeros(); nb_steps + 1],
            cxu: vec![SMatrix::zeros(); nb_steps + 1],
            cx: vec![SVector::zeros(); nb_steps + 1],
            cu: vec![SVector::zeros(); nb_steps + 1],
            c0: vec![0.0; nb_steps + 1],
        }
    }

    pub fn nb_steps(&self) -> usize {
        self.cxx.len() - 1
    }

    /// Second-order Taylor expansion of the environment cost around the mean
    /// trajectory, one slice per timestep, scaled by the activation weights.
    /// The terminal slice is expanded at zero action.
    pub fn taylor_expansion<E: Environment<DX, DU>>(
        &mut self,
        env: &E,
        xmu: &[SVector<f64, DX>],
        umu: &[SVector<f64, DU>],
        weights: &[f64],
    ) {
        let nb_steps = self.nb_steps();
        for t in 0..=nb_steps {
            let x = xmu[t];
            let u = if t < nb_steps { umu[t] } else { SVector::zeros() };
            let u_prev = if t == 0 { SVector::zeros() } else { umu[t - 1] };
            let w = weights[t];
            let f = |x: &SVector<f64, DX>, u: &SVector<f64, DU>| env.cost(x, u, &u_prev, w);

            let f0 = f(&x, &u);
            let gx = diff::gradient(|xi| f(xi, &u), &x);
            let hxx = symmetrized(&diff::hessian(|xi| f(xi, &u), &x));

            self.cxx[t] = 0.5 * hxx;
            self.cx[t] = gx - hxx * x;
            self.c0[t] = f0 - gx.dot(&x) + 0.5 * x.dot(&(hxx * x));

            if t < nb_steps {
                let gu = diff::gradient(|ui| f(&x, ui), &u);
                let huu = symmetrized(&diff::hessian(|ui| f(&x, ui), &u));
                let hxu = diff::cross_hessian(&f, &x, &u);

                self.cuu[t] = 0.5 * huu;
                self.cxu[t] = 0.5 * hxu;
                self.cx[t] -= hxu * u;
                self.cu[t] = gu - huu * u - hxu.transpose() * x;
                self.c0[t] +=
                    -gu.dot(&u) + 0.5 * u.dot(&(huu * u)) + x.dot(&(hxu * u));
            } else {
                self.cuu[t] = SMatrix::zeros();
                self.cxu[t] = SMatrix::zeros();
                self.cu[t] = SVector::zeros();
            }
        }
    }

    /// Evaluate the quadratic model at `(x, u)`.
    pub fn evaluate(&self, t: usize, x: &SVector<f64, DX>, u: &SVector<f64, DU>) -> f64 {
        x.dot(&(self.cxx[t] * x))
            + u.dot(&(self.cuu[t] * u))
            + 2.0 * x.dot(&(self.cxu[t] * u))
            + self.cx[t].dot(x)
            + self.cu[t].dot(u)
            + self.c0[t]
    }

    /// Fold the KL trust-region surrogate into the cost: each non-terminal
    /// slice gains `(-1/alpha)` times the negative log-density of the
    /// reference control distribution, expressed in the quadratic
    /// coefficients. The constant term accumulates the Gaussian
    /// normalization, which the dual objective consumes later.
    pub fn augment(
        &self,
        ctl: &LinearGaussianControl<DX, DU>,
        alpha: f64,
    ) -> QuadraticCost<DX, DU> {
        debug_assert!(alpha < 0.0);
        let nb_steps = self.nb_steps();
        let lam = -1.0 / (2.0 * alpha);
        let two_pi = 2.0 * std::f64::consts::PI;

        let mut ag = self.clone();
        for t in 0..nb_steps {
            let chol = ctl.sigma[t]
                .cholesky()
                .expect("reference control covariance is not positive definite");
            let prec = chol.inverse();
            let logdet = (two_pi.powi(DU as i32) * chol.determinant()).ln();

            let k = &ctl.k[t];
            let kff = &ctl.kff[t];
            let kt_prec = k.transpose() * prec;

            ag.cxx[t] += lam * &kt_prec * k;
            ag.cuu[t] += lam * prec;
            ag.cxu[t] -= lam * &kt_prec;
            ag.cx[t] += 2.0 * lam * &kt_prec * kff;
            ag.cu[t] -= 2.0 * lam * prec * kff;
            ag.c0[t] += lam * (kff.dot(&(prec * kff)) + logdet);
        }
        ag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::LinearQuadraticEnv;
    use nalgebra::Vector1;

    #[test]
    fn sigmoid_weights_ramp_up() {
        let w = Activation::Sigmoid {
            mult: 1.0,
            shift: 5.0,
        }
        .weights(10);
        assert_eq!(w.len(), 11);
        assert!(w[0] < 0.01);
        assert!((w[5] - 0.5).abs() < 1e-12);
        assert!(w[10] > 0.99);
    }

    #[test]
    fn window_weights_select_range() {
        let w = Activation::Window { start: 3, end: 6 }.weights(8);
        assert_eq!(w, vec![0., 0., 0., 1., 1., 1., 0., 0., 0.]);
    }

    #[test]
    fn expansion_reproduces_quadratic_cost_exactly() {
        let env = LinearQuadraticEnv::scalar();
        let nb_steps = 4;
        let mut cost = QuadraticCost::<1, 1>::zeros(nb_steps);
        let xmu = vec![Vector1::new(0.7); nb_steps + 1];
        let umu = vec![Vector1::new(-0.4); nb_steps];
        cost.taylor_expansion(&env, &xmu, &umu, &Activation::Uniform.weights(nb_steps));

        // the model must match the true cost away from the expansion point
        for &xv in &[-1.0, 0.0, 2.0] {
            for &uv in &[-0.5, 0.0, 1.0] {
                let x = Vector1::new(xv);
                let u = Vector1::new(uv);
                let truth = env.cost(&x, &u, &Vector1::zeros(), 1.0);
                let model = cost.evaluate(1, &x, &u);
                assert!((truth - model).abs() < 1e-4, "{truth} vs {model}");
            }
        }
    }

    #[test]
    fn augmentation_pulls_toward_reference_mean() {
        let nb_steps = 1;
        let mut cost = QuadraticCost::<1, 1>::zeros(nb_steps);
        cost.cuu[0] = SMatrix::<f64, 1, 1>::new(1.0);
        let mut ctl = LinearGaussianControl::<1, 1>::new(nb_steps, 1.0);
        ctl.kff[0] = Vector1::new(2.0);

        // tight trust region: alpha close to zero from below
        let ag = cost.augment(&ctl, -1e-2);
        // curvature in u grows and the linear term points toward kff
        assert!(ag.cuu[0][(0, 0)] > cost.cuu[0][(0, 0)]);
        let ustar = -0.5 * ag.cu[0][0] / ag.cuu[0][(0, 0)];
        assert!((ustar - 2.0).abs() < 0.1);
    }

    #[test]
    fn relaxed_augmentation_is_identity_on_coefficients() {
        let nb_steps = 2;
        let mut cost = QuadraticCost::<1, 1>::zeros(nb_steps);
        for t in 0..=nb_steps {
            cost.cxx[t] = SMatrix::<f64, 1, 1>::new(1.0);
            cost.cuu[t] = SMatrix::<f64, 1, 1>::new(0.5);
        }
        let ctl = LinearGaussianControl::<1, 1>::new(nb_steps, 1.0);
        let ag = cost.augment(&ctl, -1e12);
        for t in 0..nb_steps {
            assert!((ag.cuu[t] - cost.cuu[t]).norm() < 1e-10);
            assert!((ag.cxx[t] - cost.cxx[t]).norm() < 1e-10);
        }
    }
}
