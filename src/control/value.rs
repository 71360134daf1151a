use nalgebra::{SMatrix, SVector};

/// Quadratic state value function per timestep,
/// `V(x) = x' v_mat x + v_vec' x + v0`. The `v0_softmax` channel carries the
/// additional Gaussian log-partition terms accumulated by the backward
/// recursion; the dual objective reads that channel.
#[derive(Debug, Clone)]
pub struct QuadraticStateValue<const DX: usize> {
    pub v_mat: Vec<SMatrix<f64, DX, DX>>,
    pub v_vec: Vec<SVector<f64, DX>>,
    pub v0: Vec<f64>,
    pub v0_softmax: Vec<f64>,
}

impl<const DX: usize> QuadraticStateValue<DX> {
    pub fn zeros(nb_steps: usize) -> QuadraticStateValue<DX> {
        QuadraticStateValue {
            v_mat: vec![SMatrix::zeros(); nb_steps + 1],
            v_vec: vec![SVector::zeros(); nb_steps + 1],
            v0: vec![0.0; nb_steps + 1],
            v0_softmax: vec![0.0; nb_steps + 1],
        }
    }
}

/// Quadratic state-action value function per control step,
/// `Q(x, u) = x' qxx x + u' quu u + 2 x' qux' u + qx' x + qu' u + q0`.
#[derive(Debug, Clone)]
pub struct QuadraticStateActionValue<const DX: usize, const DU: usize> {
    pub qxx: Vec<SMatrix<f64, DX, DX>>,
    pub quu: Vec<SMatrix<f64, DU, DU>>,
    pub qux: Vec<SMatrix<f64, DU, DX>>,
    pub qx: Vec<SVector<f64, DX>>,
    pub qu: Vec<SVector<f64, DU>>,
    pub q0: Vec<f64>,
    pub q0_softmax: Vec<f64>,
}

impl<const DX: usize, const DU: usize> QuadraticStateActionValue<DX, DU> {
    pub fn zeros(nb_steps: usize) -> QuadraticStateActionValue<DX, DU> {
        QuadraticStateActionValue {
            qxx: vec![SMatrix::zeros(); nb_steps],
            quu: vec![SMatrix::zeros(); nb_steps],
            qux: vec![SMatrix::zeros(); nb_steps],
            qx: vec![SVector::zeros(); nb_steps],
            qu: vec![SVector::zeros(); nb_steps],
            q0: vec![0.0; nb_steps],
            q0_softmax: vec![0.0; nb_steps],
        }
    }
}

/// Expectation of the quadratic `x' v_mat x + v_vec' x + v0` under
/// `x ~ N(mu, sigma)`.
pub fn quad_expectation<const D: usize>(
    mu: &SVector<f64, D>,
    sigma: &SMatrix<f64, D, D>,
    v_mat: &SMatrix<f64, D, D>,
    v_vec: &SVector<f64, D>,
    v0: f64,
) -> f64 {
    mu.dot(&(v_mat * mu)) + (v_mat * sigma).trace() + v_vec.dot(mu) + v0
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix2, Vector2};

    #[test]
    fn quad_expectation_matches_hand_computation() {
        let mu = Vector2::new(1.0, 2.0);
        let sigma = Matrix2::new(0.5, 0.1, 0.1, 0.2);
        let v_mat = Matrix2::new(2.0, 0.0, 0.0, 3.0);
        let v_vec = Vector2::new(-1.0, 1.0);
        // mu'Vmu = 2 + 12 = 14, tr(V sigma) = 1.0 + 0.6 = 1.6, v'mu = 1
        let e = quad_expectation(&mu, &sigma, &v_mat, &v_vec, 0.5);
        assert!((e - 17.1).abs() < 1e-12);
    }

    #[test]
    fn deterministic_state_drops_trace_term() {
        let mu = Vector2::new(-0.5, 0.3);
        let v_mat = Matrix2::new(1.0, 0.2, 0.2, 2.0);
        let v_vec = Vector2::new(0.7, -0.1);
        let direct = mu.dot(&(v_mat * mu)) + v_vec.dot(&mu);
        let e = quad_expectation(&mu, &Matrix2::zeros(), &v_mat, &v_vec, 0.0);
        assert!((e - direct).abs() < 1e-12);
    }
}
