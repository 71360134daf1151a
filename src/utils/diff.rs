//! Central finite-difference derivatives.
//!
//! Environments expose plain functions; the engine needs their Jacobians,
//! gradients and Hessians along a reference trajectory. Central differences
//! keep the environment contract free of any differentiation machinery.

use nalgebra::{SMatrix, SVector};

/// Step for first derivatives, ~cbrt(machine epsilon).
const STEP: f64 = 1e-5;
/// Step for second derivatives, ~(machine epsilon)^(1/4).
const HESS_STEP: f64 = 1e-4;

/// Jacobian of a vector-valued map at `x`.
pub fn jacobian<F, const N: usize, const M: usize>(f: F, x: &SVector<f64, N>) -> SMatrix<f64, M, N>
where
    F: Fn(&SVector<f64, N>) -> SVector<f64, M>,
{
    let mut jac = SMatrix::<f64, M, N>::zeros();
    for j in 0..N {
        let mut hi = *x;
        let mut lo = *x;
        hi[j] += STEP;
        lo[j] -= STEP;
        let col = (f(&hi) - f(&lo)) / (2.0 * STEP);
        jac.set_column(j, &col);
    }
    jac
}

/// Gradient of a scalar function at `x`.
pub fn gradient<F, const N: usize>(f: F, x: &SVector<f64, N>) -> SVector<f64, N>
where
    F: Fn(&SVector<f64, N>) -> f64,
{
    SVector::from_fn(|i, _| {
        let mut hi = *x;
        let mut lo = *x;
        hi[i] += STEP;
        lo[i] -= STEP;
        (f(&hi) - f(&lo)) / (2.0 * STEP)
    })
}

/// Hessian of a scalar function at `x`, symmetrized.
pub fn hessian<F, const N: usize>(f: F, x: &SVector<f64, N>) -> SMatrix<f64, N, N>
where
    F: Fn(&SVector<f64, N>) -> f64,
{
    let h = HESS_STEP;
    let f0 = f(x);
    let mut hess = SMatrix::<f64, N, N>::zeros();
    for i in 0..N {
        for j in i..N {
            let v = if i == j {
                let mut hi = *x;
                let mut lo = *x;
                hi[i] += h;
                lo[i] -= h;
                (f(&hi) - 2.0 * f0 + f(&lo)) / (h * h)
            } else {
                let mut pp = *x;
                let mut pm = *x;
                let mut mp = *x;
                let mut mm = *x;
                pp[i] += h;
                pp[j] += h;
                pm[i] += h;
                pm[j] -= h;
                mp[i] -= h;
                mp[j] += h;
                mm[i] -= h;
                mm[j] -= h;
                (f(&pp) - f(&pm) - f(&mp) + f(&mm)) / (4.0 * h * h)
            };
            hess[(i, j)] = v;
            hess[(j, i)] = v;
        }
    }
    hess
}

/// Mixed second derivative block d²f/(dx du) of a scalar function of two
/// vector arguments.
pub fn cross_hessian<F, const N: usize, const M: usize>(
    f: F,
    x: &SVector<f64, N>,
    u: &SVector<f64, M>,
) -> SMatrix<f64, N, M>
where
    F: Fn(&SVector<f64, N>, &SVector<f64, M>) -> f64,
{
    let h = HESS_STEP;
    SMatrix::from_fn(|i, j| {
        let mut xp = *x;
        let mut xm = *x;
        xp[i] += h;
        xm[i] -= h;
        let mut up = *u;
        let mut um = *u;
        up[j] += h;
        um[j] -= h;
        (f(&xp, &up) - f(&xp, &um) - f(&xm, &up) + f(&xm, &um)) / (4.0 * h * h)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix2, Matrix2x3, Vector2, Vector3};

    #[test]
    fn jacobian_of_affine_map_is_exact() {
        let a = Matrix2x3::new(1.0, -2.0, 0.5, 3.0, 0.0, -1.0);
        let b = Vector2::new(0.3, -0.7);
        let f = |x: &Vector3<f64>| a * x + b;
        let jac = jacobian(f, &Vector3::new(0.1, -0.2, 0.3));
        assert!((jac - a).norm() < 1e-8);
    }

    #[test]
    fn quadratic_gradient_and_hessian() {
        let q = Matrix2::new(2.0, 0.5, 0.5, 1.0);
        let f = |x: &Vector2<f64>| 0.5 * x.dot(&(q * x));
        let x0 = Vector2::new(1.0, -2.0);
        assert!((gradient(f, &x0) - q * x0).norm() < 1e-6);
        assert!((hessian(f, &x0) - q).norm() < 1e-4);
    }

    #[test]
    fn bilinear_cross_hessian() {
        let m = Matrix2::new(1.0, 2.0, -1.0, 0.5);
        let f = |x: &Vector2<f64>, u: &Vector2<f64>| x.dot(&(m * u));
        let h = cross_hessian(f, &Vector2::new(0.2, 0.4), &Vector2::new(-0.1, 0.3));
        assert!((h - m).norm() < 1e-5);
    }
}
