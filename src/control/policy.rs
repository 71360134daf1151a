use nalgebra::allocator::Allocator;
use nalgebra::{Const, DefaultAllocator, DimMin, SMatrix, SVector};
use rand::Rng;

use crate::utils::mvn::MultiVariateNormal;
use crate::utils::state::GaussianSequence;

/// Time-varying linear-Gaussian feedback policy
/// `u_t ~ N(K_t x + kff_t, sigma_t)`.
#[derive(Debug, Clone)]
pub struct LinearGaussianControl<const DX: usize, const DU: usize> {
    pub k: Vec<SMatrix<f64, DU, DX>>,
    pub kff: Vec<SVector<f64, DU>>,
    pub sigma: Vec<SMatrix<f64, DU, DU>>,
}

impl<const DX: usize, const DU: usize> LinearGaussianControl<DX, DU> {
    /// Zero-gain controller with isotropic exploration covariance.
    pub fn new(nb_steps: usize, init_action_sigma: f64) -> LinearGaussianControl<DX, DU> {
        LinearGaussianControl {
            k: vec![SMatrix::zeros(); nb_steps],
            kff: vec![SVector::zeros(); nb_steps],
            sigma: vec![SMatrix::identity() * init_action_sigma; nb_steps],
        }
    }

    pub fn nb_steps(&self) -> usize {
        self.k.len()
    }

    /// Mean action at step `t`.
    pub fn mean(&self, x: &SVector<f64, DX>, t: usize) -> SVector<f64, DU> {
        self.k[t] * x + self.kff[t]
    }

    /// Sample an action; `stoch = false` returns the mean.
    pub fn sample<R: Rng>(
        &self,
        x: &SVector<f64, DX>,
        t: usize,
        stoch: bool,
        rng: &mut R,
    ) -> SVector<f64, DU> {
        let mean = self.mean(x, t);
        if !stoch {
            return mean;
        }
        match MultiVariateNormal::new(&mean, &self.sigma[t]) {
            Ok(mvn) => mvn.sample(rng),
            // degenerate exploration covariance: act deterministically
            Err(_) => mean,
        }
    }
}

/// Expected KL divergence `E_x[ KL(p(.|x) || q(.|x)) ]` between two
/// matched-horizon controllers, integrated against the given state
/// distribution and summed over control steps.
///
/// Closed form per step for Gaussians whose means are affine in `x`:
/// the usual trace/log-det terms plus the mean-difference quadratic form,
/// which integrates to a trace against the state covariance.
pub fn kl_divergence<const DX: usize, const DU: usize>(
    p: &LinearGaussianControl<DX, DU>,
    q: &LinearGaussianControl<DX, DU>,
    xdist: &GaussianSequence<DX>,
) -> f64
where
    Const<DU>: DimMin<Const<DU>, Output = Const<DU>>,
    DefaultAllocator: Allocator<(usize, usize), Const<DU>>,
{
    let nb_steps = p.nb_steps();
    let mut kl = 0.0;
    for t in 0..nb_steps {
        let chol_q = q.sigma[t]
            .cholesky()
            .expect("reference control covariance is not positive definite");
        let prec_q = chol_q.inverse();
        let logdet_q = chol_q.determinant().ln();
        let logdet_p = p.sigma[t]
            .determinant()
            .max(f64::MIN_POSITIVE)
            .ln();

        let dk = q.k[t] - p.k[t];
        let dm = dk * xdist.mu[t] + (q.kff[t] - p.kff[t]);

        kl += 0.5
            * (logdet_q - logdet_p - DU as f64
                + (prec_q * p.sigma[t]).trace()
                + dm.dot(&(prec_q * dm))
                + (dk.transpose() * prec_q * dk * xdist.sigma[t]).trace());
    }
    kl
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix2, Vector2};

    fn state_dist(nb_steps: usize) -> GaussianSequence<2> {
        let mut xdist = GaussianSequence::zeros(nb_steps + 1);
        for t in 0..=nb_steps {
            xdist.set(
                t,
                Vector2::new(0.5, -1.0),
                &Matrix2::new(0.4, 0.1, 0.1, 0.3),
            );
        }
        xdist
    }

    #[test]
    fn self_divergence_is_zero() {
        let nb_steps = 7;
        let mut ctl = LinearGaussianControl::<2, 2>::new(nb_steps, 0.7);
        for t in 0..nb_steps {
            ctl.k[t] = Matrix2::new(0.2, -0.1, 0.0, 0.3);
            ctl.kff[t] = Vector2::new(1.0, -2.0);
        }
        let kl = kl_divergence(&ctl, &ctl, &state_dist(nb_steps));
        assert!(kl.abs() < 1e-10, "kl = {kl}");
    }

    #[test]
    fn divergence_is_nonnegative() {
        let nb_steps = 5;
        let mut p = LinearGaussianControl::<2, 2>::new(nb_steps, 0.5);
        let mut q = LinearGaussianControl::<2, 2>::new(nb_steps, 1.5);
        for t in 0..nb_steps {
            p.k[t] = Matrix2::new(0.1, 0.0, -0.2, 0.4);
            p.kff[t] = Vector2::new(0.3, 0.0);
            q.k[t] = Matrix2::new(-0.3, 0.2, 0.1, 0.0);
            q.kff[t] = Vector2::new(-1.0, 0.5);
        }
        let xdist = state_dist(nb_steps);
        assert!(kl_divergence(&p, &q, &xdist) > 0.0);
        assert!(kl_divergence(&q, &p, &xdist) > 0.0);
    }

    #[test]
    fn divergence_grows_with_mean_offset() {
        let nb_steps = 3;
        let p = LinearGaussianControl::<2, 2>::new(nb_steps, 1.0);
        let mut near = LinearGaussianControl::<2, 2>::new(nb_steps, 1.0);
        let mut far = LinearGaussianControl::<2, 2>::new(nb_steps, 1.0);
        for t in 0..nb_steps {
            near.kff[t] = Vector2::new(0.1, 0.0);
            far.kff[t] = Vector2::new(1.0, 0.0);
        }
        let xdist = state_dist(nb_steps);
        assert!(
            kl_divergence(&near, &p, &xdist) < kl_divergence(&far, &p, &xdist)
        );
    }
}
