pub mod backward_pass;
pub mod cost;
pub mod dual;
pub mod dynamics;
pub mod forward_pass;
pub mod gps;
pub mod policy;
pub mod value;

pub use backward_pass::backward_pass;
pub use cost::{Activation, QuadraticCost};
pub use dual::{DualFunction, DualSearch};
pub use dynamics::LinearGaussianDynamics;
pub use forward_pass::forward_pass;
pub use gps::{DynamicsFit, Episode, Gps, GpsConfig, Rollouts};
pub use policy::{kl_divergence, LinearGaussianControl};
pub use value::{quad_expectation, QuadraticStateActionValue, QuadraticStateValue};

use std::error::Error;
use std::fmt;

/// Recoverable conditions of the optimization loop. None of these abort the
/// outer iteration; each has a fallback policy and is surfaced as a
/// diagnostic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GpsError {
    /// Non-positive-definite curvature during the backward recursion; the
    /// trial dual variable is infeasible.
    BackwardDivergence { step: usize },
    /// The bounded dual search exhausted its budget without a feasible trial.
    DualSolverFailure { iterations: usize },
    /// An accepted-candidate KL check failed post hoc; the candidate is
    /// discarded.
    TrustRegionViolation { kl: f64, bound: f64 },
    /// Regression produced a near-singular covariance; a small identity
    /// multiple was added.
    IllConditionedDynamics { steps: usize },
}

impl fmt::Display for GpsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpsError::BackwardDivergence { step } => {
                write!(f, "backward recursion diverged at step {step}")
            }
            GpsError::DualSolverFailure { iterations } => {
                write!(f, "dual search failed after {iterations} trials")
            }
            GpsError::TrustRegionViolation { kl, bound } => {
                write!(f, "trust region violated: kl {kl:.4} exceeds bound {bound:.4}")
            }
            GpsError::IllConditionedDynamics { steps } => {
                write!(f, "dynamics regression regularized at {steps} timestep(s)")
            }
        }
    }
}

impl Error for GpsError {}
