use crate::control::cost::QuadraticCost;
use crate::control::dynamics::LinearGaussianDynamics;
use crate::control::policy::LinearGaussianControl;
use crate::control::value::{QuadraticStateActionValue, QuadraticStateValue};
use crate::control::GpsError;
use crate::utils::symmetrized;

/// Everything one backward sweep produces.
#[derive(Debug, Clone)]
pub struct BackwardResult<const DX: usize, const DU: usize> {
    pub ctl: LinearGaussianControl<DX, DU>,
    pub xvalue: QuadraticStateValue<DX>,
    pub xuvalue: QuadraticStateActionValue<DX, DU>,
}

/// Riccati-style backward recursion over the (augmented) cost.
///
/// Starting from the terminal cost slice, each step forms the state-action
/// value by a one-step Bellman backup, reads the new feedback law off its
/// curvature, and back-substitutes to the state value. The curvature also
/// defines the stochastic policy: its precision is the curvature scaled by
/// the trust-region temperature `eta = -1/alpha`, which ties the penalty to
/// actual exploration noise. The `*_softmax` constants additionally carry
/// the Gaussian log-partition corrections the dual objective needs.
///
/// A non-positive-definite `Quu` means the recursion is ill-posed for this
/// `alpha`; the error is reported upward instead of continuing with an
/// invalid inverse.
pub fn backward_pass<const DX: usize, const DU: usize>(
    cost: &QuadraticCost<DX, DU>,
    dynamics: &LinearGaussianDynamics<DX, DU>,
    alpha: f64,
) -> Result<BackwardResult<DX, DU>, GpsError> {
    let nb_steps = dynamics.nb_steps();
    let eta = -1.0 / alpha;

    let mut ctl = LinearGaussianControl::new(nb_steps, 0.0);
    let mut xvalue = QuadraticStateValue::zeros(nb_steps);
    let mut xuvalue = QuadraticStateActionValue::zeros(nb_steps);

    xvalue.v_mat[nb_steps] = cost.cxx[nb_steps];
    xvalue.v_vec[nb_steps] = cost.cx[nb_steps];
    xvalue.v0[nb_steps] = cost.c0[nb_steps];
    xvalue.v0_softmax[nb_steps] = cost.c0[nb_steps];

    for t in (0..nb_steps).rev() {
        let a = &dynamics.a[t];
        let b = &dynamics.b[t];
        let c = &dynamics.c[t];
        let v_mat = xvalue.v_mat[t + 1];
        let v_vec = xvalue.v_vec[t + 1];

        let qxx = symmetrized(&(cost.cxx[t] + a.transpose() * v_mat * a));
        let quu = symmetrized(&(cost.cuu[t] + b.transpose() * v_mat * b));
        let qux = cost.cxu[t].transpose() + b.transpose() * v_mat * a;

        let vc = 2.0 * v_mat * c + v_vec;
        let qx = cost.cx[t] + a.transpose() * vc;
        let qu = cost.cu[t] + b.transpose() * vc;

        let pass_through = c.dot(&(v_mat * c))
            + v_vec.dot(c)
            + (v_mat * dynamics.sigma[t]).trace()
            + cost.c0[t];
        let q0 = pass_through + xvalue.v0[t + 1];
        let q0_softmax = pass_through + xvalue.v0_softmax[t + 1];

        let Some(chol) = quu.cholesky() else {
            return Err(GpsError::BackwardDivergence { step: t });
        };
        let quu_inv = chol.inverse();
        let logdet_quu = chol.determinant().ln();

        let k = -quu_inv * qux;
        let kff = -0.5 * quu_inv * qu;
        let sigma_ctl = symmetrized(&(0.5 * eta * quu_inv));

        xvalue.v_mat[t] = symmetrized(&(qxx + qux.transpose() * k));
        xvalue.v_vec[t] = qx + 2.0 * qux.transpose() * kff;
        let back_subst = qu.dot(&kff) + kff.dot(&(quu * kff));
        xvalue.v0[t] = q0 + back_subst;
        xvalue.v0_softmax[t] = q0_softmax + back_subst
            - 0.5 * eta * (DU as f64 * (std::f64::consts::PI * eta).ln() - logdet_quu);

        xuvalue.qxx[t] = qxx;
        xuvalue.quu[t] = quu;
        xuvalue.qux[t] = qux;
        xuvalue.qx[t] = qx;
        xuvalue.qu[t] = qu;
        xuvalue.q0[t] = q0;
        xuvalue.q0_softmax[t] = q0_softmax;

        ctl.k[t] = k;
        ctl.kff[t] = kff;
        ctl.sigma[t] = sigma_ctl;
    }

    Ok(BackwardResult {
        ctl,
        xvalue,
        xuvalue,
    })
}
