pub mod diff;
pub mod mvn;
pub mod plot;
pub mod state;

use nalgebra::SMatrix;

/// Average a matrix with its transpose. Covariances and quadratic-form
/// coefficients drift off symmetric under repeated products; every write
/// path goes through this.
pub fn symmetrized<const D: usize>(m: &SMatrix<f64, D, D>) -> SMatrix<f64, D, D> {
    (m + m.transpose()) * 0.5
}
