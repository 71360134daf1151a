use crate::control::dynamics::LinearGaussianDynamics;
use crate::control::policy::LinearGaussianControl;
use crate::utils::state::{GaussianState, JointSequence};
use crate::utils::symmetrized;

/// Propagate the initial state distribution through controller and
/// dynamics, producing the joint state-action Gaussian at every step.
///
/// At each step the action is the affine image of the state plus independent
/// control noise; the next state marginal combines state, action and
/// transition noise additively. The routine is unconditional: given valid
/// inputs it never branches on divergence.
pub fn forward_pass<const DX: usize, const DU: usize>(
    init: &GaussianState<DX>,
    dynamics: &LinearGaussianDynamics<DX, DU>,
    ctl: &LinearGaussianControl<DX, DU>,
) -> JointSequence<DX, DU> {
    let nb_steps = dynamics.nb_steps();
    let mut out = JointSequence::zeros(nb_steps);

    out.xdist.set(0, init.x, &init.cov);

    for t in 0..nb_steps {
        let mu_x = out.xdist.mu[t];
        let sigma_x = out.xdist.sigma[t];
        let k = &ctl.k[t];

        // action marginal under u = K x + kff + eps_u
        let mu_u = k * mu_x + ctl.kff[t];
        let sigma_xu = sigma_x * k.transpose();
        let sigma_u = k * sigma_x * k.transpose() + ctl.sigma[t];
        out.udist.set(t, mu_u, &sigma_u);
        out.cross[t] = sigma_xu;

        // next state marginal under x' = A x + B u + c + eps_x
        let a = &dynamics.a[t];
        let b = &dynamics.b[t];
        let mu_next = a * mu_x + b * mu_u + dynamics.c[t];
        let sigma_next = a * sigma_x * a.transpose()
            + a * sigma_xu * b.transpose()
            + b * sigma_xu.transpose() * a.transpose()
            + b * symmetrized(&sigma_u) * b.transpose()
            + dynamics.sigma[t];
        out.xdist.set(t + 1, mu_next, &sigma_next);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix2, SMatrix, Vector1, Vector2};

    fn scalar_problem(
        nb_steps: usize,
        noisy: bool,
    ) -> (LinearGaussianDynamics<1, 1>, LinearGaussianControl<1, 1>) {
        let mut dynamics = LinearGaussianDynamics::<1, 1>::new(nb_steps);
        let mut ctl = LinearGaussianControl::<1, 1>::new(nb_steps, 0.0);
        for t in 0..nb_steps {
            dynamics.a[t] = SMatrix::<f64, 1, 1>::new(0.9);
            dynamics.b[t] = SMatrix::<f64, 1, 1>::new(0.5);
            dynamics.c[t] = Vector1::new(0.1);
            dynamics.sigma[t] = SMatrix::<f64, 1, 1>::new(if noisy { 0.01 } else { 0.0 });
            ctl.k[t] = SMatrix::<f64, 1, 1>::new(-0.4);
            ctl.kff[t] = Vector1::new(0.2);
            ctl.sigma[t] = SMatrix::<f64, 1, 1>::new(if noisy { 0.05 } else { 0.0 });
        }
        (dynamics, ctl)
    }

    #[test]
    fn zero_noise_mean_equals_deterministic_rollout() {
        let nb_steps = 10;
        let (dynamics, ctl) = scalar_problem(nb_steps, false);
        let init = GaussianState::new(Vector1::new(2.0), SMatrix::<f64, 1, 1>::zeros());
        let prop = forward_pass(&init, &dynamics, &ctl);

        let mut x = 2.0;
        for t in 0..nb_steps {
            assert!((prop.xdist.mu[t][0] - x).abs() < 1e-12);
            let u = -0.4 * x + 0.2;
            assert!((prop.udist.mu[t][0] - u).abs() < 1e-12);
            x = 0.9 * x + 0.5 * u + 0.1;
        }
        assert!((prop.xdist.mu[nb_steps][0] - x).abs() < 1e-12);
        for t in 0..=nb_steps {
            assert!(prop.xdist.sigma[t][(0, 0)].abs() < 1e-12);
        }
    }

    #[test]
    fn covariances_stay_symmetric_and_psd() {
        let nb_steps = 25;
        let mut dynamics = LinearGaussianDynamics::<2, 1>::new(nb_steps);
        let mut ctl = LinearGaussianControl::<2, 1>::new(nb_steps, 0.3);
        for t in 0..nb_steps {
            dynamics.a[t] = Matrix2::new(1.0, 0.1, -0.3, 0.95);
            dynamics.b[t] = Vector2::new(0.0, 0.2);
            dynamics.sigma[t] = Matrix2::new(1e-3, 1e-4, 1e-4, 2e-3);
            ctl.k[t] = SMatrix::<f64, 1, 2>::new(0.5, -0.2);
        }
        let init = GaussianState::new(Vector2::new(1.0, 0.0), Matrix2::identity() * 0.1);
        let prop = forward_pass(&init, &dynamics, &ctl);

        for t in 0..=nb_steps {
            let s = prop.xdist.sigma[t];
            assert!((s - s.transpose()).norm() < 1e-12);
            for ev in s.symmetric_eigen().eigenvalues.iter() {
                assert!(*ev > -1e-10, "negative eigenvalue {ev} at step {t}");
            }
        }
        for t in 0..nb_steps {
            let s = prop.udist.sigma[t];
            assert!((s - s.transpose()).norm() < 1e-12);
            assert!(s[(0, 0)] > 0.0);
        }
    }
}
