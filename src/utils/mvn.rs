use nalgebra::{SMatrix, SVector};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    CovarianceNotSemiDefinitePositive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    pub error_type: ErrorType,
}

/// Multivariate normal backed by a Cholesky factorization of the covariance.
pub struct MultiVariateNormal<const D: usize> {
    mean: SVector<f64, D>,
    /// Lower Cholesky factor of the covariance
    factor_l: SMatrix<f64, D, D>,
    precision: SMatrix<f64, D, D>,
    norm: f64,
}

impl<const D: usize> MultiVariateNormal<D> {
    pub fn new(mean: &SVector<f64, D>, covariance: &SMatrix<f64, D, D>) -> Result<Self, Error> {
        let Some(cholesky) = covariance.cholesky() else {
            return Err(Error {
                error_type: ErrorType::CovarianceNotSemiDefinitePositive,
            });
        };
        let det = cholesky.determinant();
        let norm = 1.0 / ((2.0 * std::f64::consts::PI).powi(D as i32) * det).sqrt();
        Ok(MultiVariateNormal {
            mean: *mean,
            factor_l: cholesky.l(),
            precision: cholesky.inverse(),
            norm,
        })
    }

    /// Draw one sample, `mean + L z` with `z` standard normal.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> SVector<f64, D> {
        let z = SVector::<f64, D>::from_fn(|_, _| StandardNormal.sample(rng));
        self.mean + self.factor_l * z
    }

    /// Probability density function
    pub fn pdf(&self, x: &SVector<f64, D>) -> f64 {
        let dx = x - self.mean;
        self.norm * (-0.5 * dx.dot(&(self.precision * dx))).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Matrix2, Vector2};

    #[test]
    fn rejects_indefinite_covariance() {
        let cov = Matrix2::new(1.0, 2.0, 2.0, 1.0);
        let res = MultiVariateNormal::new(&Vector2::zeros(), &cov);
        assert!(res.is_err());
    }

    #[test]
    fn standard_normal_pdf_at_mean() {
        let mvn = MultiVariateNormal::new(&Vector2::zeros(), &Matrix2::identity()).unwrap();
        let expected = 1.0 / (2.0 * std::f64::consts::PI);
        assert!((mvn.pdf(&Vector2::zeros()) - expected).abs() < 1e-12);
    }

    #[test]
    fn samples_follow_mean() {
        let mean = Vector2::new(3.0, -1.0);
        let mvn = MultiVariateNormal::new(&mean, &(Matrix2::identity() * 1e-6)).unwrap();
        let mut rng = rand::thread_rng();
        let s = mvn.sample(&mut rng);
        assert!((s - mean).norm() < 1e-1);
    }
}
