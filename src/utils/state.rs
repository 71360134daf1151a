use nalgebra::{SMatrix, SVector};

use crate::utils::symmetrized;

/// Gaussian over a `D`-dimensional variable.
#[derive(Debug, Clone, Copy)]
pub struct GaussianState<const D: usize> {
    /// Mean vector
    pub x: SVector<f64, D>,
    /// Covariance matrix
    pub cov: SMatrix<f64, D, D>,
}

impl<const D: usize> GaussianState<D> {
    pub fn new(x: SVector<f64, D>, cov: SMatrix<f64, D, D>) -> GaussianState<D> {
        GaussianState {
            x,
            cov: symmetrized(&cov),
        }
    }
}

/// Time-indexed sequence of Gaussian marginals over a fixed horizon.
#[derive(Debug, Clone)]
pub struct GaussianSequence<const D: usize> {
    pub mu: Vec<SVector<f64, D>>,
    pub sigma: Vec<SMatrix<f64, D, D>>,
}

impl<const D: usize> GaussianSequence<D> {
    /// All-zero sequence with `len` slots.
    pub fn zeros(len: usize) -> GaussianSequence<D> {
        GaussianSequence {
            mu: vec![SVector::zeros(); len],
            sigma: vec![SMatrix::zeros(); len],
        }
    }

    pub fn len(&self) -> usize {
        self.mu.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mu.is_empty()
    }

    /// Store a marginal at slot `t`, symmetrizing the covariance.
    pub fn set(&mut self, t: usize, mu: SVector<f64, D>, sigma: &SMatrix<f64, D, D>) {
        self.mu[t] = mu;
        self.sigma[t] = symmetrized(sigma);
    }
}

/// Joint state-action distribution over a horizon, stored blockwise:
/// state marginal (`T + 1` slots), action marginal (`T` slots) and the
/// per-step state-action cross covariance. Equivalent to one Gaussian over
/// the stacked `[x; u]` vector at each step.
#[derive(Debug, Clone)]
pub struct JointSequence<const DX: usize, const DU: usize> {
    pub xdist: GaussianSequence<DX>,
    pub udist: GaussianSequence<DU>,
    pub cross: Vec<SMatrix<f64, DX, DU>>,
}

impl<const DX: usize, const DU: usize> JointSequence<DX, DU> {
    pub fn zeros(nb_steps: usize) -> JointSequence<DX, DU> {
        JointSequence {
            xdist: GaussianSequence::zeros(nb_steps + 1),
            udist: GaussianSequence::zeros(nb_steps),
            cross: vec![SMatrix::zeros(); nb_steps],
        }
    }

    /// Number of control steps.
    pub fn nb_steps(&self) -> usize {
        self.udist.len()
    }
}
