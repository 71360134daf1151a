use crate::control::backward_pass::{backward_pass, BackwardResult};
use crate::control::cost::QuadraticCost;
use crate::control::dynamics::LinearGaussianDynamics;
use crate::control::forward_pass::forward_pass;
use crate::control::policy::{kl_divergence, LinearGaussianControl};
use crate::control::value::quad_expectation;
use crate::control::GpsError;
use crate::utils::state::{GaussianState, JointSequence};
use nalgebra::allocator::Allocator;
use nalgebra::{Const, DefaultAllocator, DimMin};

/// Result of evaluating the dual function at one trial `alpha`.
#[derive(Debug, Clone)]
pub struct DualEvaluation<const DX: usize, const DU: usize> {
    pub alpha: f64,
    /// Expected augmented value at the initial state plus `alpha * kl_bound`.
    pub dual: f64,
    /// Constraint slack, `kl_bound - kl`.
    pub gradient: f64,
    pub kl: f64,
    pub backward: BackwardResult<DX, DU>,
    /// Forward distribution under the candidate controller.
    pub prop: JointSequence<DX, DU>,
}

/// The dual function of one outer iteration: cost, dynamics, reference
/// controller, initial distribution and KL bound are fixed; `alpha` is the
/// only free variable. Each evaluation is self-contained; trials share no
/// mutable state.
pub struct DualFunction<'a, const DX: usize, const DU: usize> {
    pub cost: &'a QuadraticCost<DX, DU>,
    pub dynamics: &'a LinearGaussianDynamics<DX, DU>,
    pub ctl: &'a LinearGaussianControl<DX, DU>,
    pub init: &'a GaussianState<DX>,
    pub kl_bound: f64,
}

impl<'a, const DX: usize, const DU: usize> DualFunction<'a, DX, DU>
where
    Const<DU>: DimMin<Const<DU>, Output = Const<DU>>,
    DefaultAllocator: Allocator<(usize, usize), Const<DU>>,
{
    /// Augment the cost at `alpha`, run the backward recursion, propagate the
    /// candidate forward, and read off dual value, KL and constraint slack.
    pub fn eval(&self, alpha: f64) -> Result<DualEvaluation<DX, DU>, GpsError> {
        let augmented = self.cost.augment(self.ctl, alpha);
        let backward = backward_pass(&augmented, self.dynamics, alpha)?;
        let prop = forward_pass(self.init, self.dynamics, &backward.ctl);

        let dual = quad_expectation(
            &prop.xdist.mu[0],
            &prop.xdist.sigma[0],
            &backward.xvalue.v_mat[0],
            &backward.xvalue.v_vec[0],
            backward.xvalue.v0_softmax[0],
        ) + alpha * self.kl_bound;
        let kl = kl_divergence(&backward.ctl, self.ctl, &prop.xdist);

        Ok(DualEvaluation {
            alpha,
            dual,
            gradient: self.kl_bound - kl,
            kl,
            backward,
            prop,
        })
    }
}

/// Outcome of the bounded scalar search.
#[derive(Debug, Clone)]
pub struct DualSolution<const DX: usize, const DU: usize> {
    pub eval: DualEvaluation<DX, DU>,
    pub trials: usize,
    /// Best dual value seen after each trial; non-decreasing by
    /// construction, so the refined (negative) dual objective never worsens.
    pub dual_trace: Vec<f64>,
}

/// Gradient-aware bisection over `ln(-alpha)` on a strictly negative
/// interval. The slack `kl_bound - kl` is positive at the tight end
/// (`alpha -> 0⁻`, the candidate collapses onto the reference) and turns
/// negative once the trust region is overshot, so it brackets the root
/// `kl = kl_bound`. A diverged backward pass counts as an overshoot.
#[derive(Debug, Clone, Copy)]
pub struct DualSearch {
    pub alpha_min: f64,
    pub alpha_max: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl Default for DualSearch {
    fn default() -> DualSearch {
        DualSearch {
            alpha_min: -1e16,
            alpha_max: -1e-16,
            max_iter: 50,
            tol: 1e-6,
        }
    }
}

impl DualSearch {
    pub fn solve<const DX: usize, const DU: usize>(
        &self,
        f: &DualFunction<'_, DX, DU>,
    ) -> Result<DualSolution<DX, DU>, GpsError>
    where
        Const<DU>: DimMin<Const<DU>, Output = Const<DU>>,
        DefaultAllocator: Allocator<(usize, usize), Const<DU>>,
    {
        // bisect on s = ln(-alpha); larger s relaxes the trust region
        let s_min = (-self.alpha_max).ln();
        let s_max = (-self.alpha_min).ln();
        let slack_tol = self.tol * f.kl_bound.max(1.0);

        fn note<const DX: usize, const DU: usize>(
            eval: Option<&DualEvaluation<DX, DU>>,
            best: &mut f64,
            trace: &mut Vec<f64>,
        ) {
            if let Some(eval) = eval {
                if eval.dual > *best {
                    *best = eval.dual;
                }
            }
            trace.push(*best);
        }

        let mut trials = 0;
        let mut dual_trace: Vec<f64> = Vec::new();
        let mut best_dual = f64::NEG_INFINITY;

        // relaxed end first: if even the unconstrained update stays inside
        // the bound there is nothing to search for
        trials += 1;
        if let Ok(eval) = f.eval(-s_max.exp()) {
            note(Some(&eval), &mut best_dual, &mut dual_trace);
            if eval.gradient >= 0.0 {
                return Ok(DualSolution {
                    eval,
                    trials,
                    dual_trace,
                });
            }
        } else {
            note::<DX, DU>(None, &mut best_dual, &mut dual_trace);
        }

        // tight end must be feasible, otherwise no alpha in the interval is
        trials += 1;
        let tight = f.eval(-s_min.exp());
        if let Ok(eval) = &tight {
            note(Some(eval), &mut best_dual, &mut dual_trace);
        }
        let mut lo_eval = match tight {
            Ok(eval) if eval.gradient >= 0.0 => eval,
            _ => return Err(GpsError::DualSolverFailure { iterations: trials }),
        };

        let mut s_lo = s_min;
        let mut s_hi = s_max;
        while trials < self.max_iter {
            trials += 1;
            let s_mid = 0.5 * (s_lo + s_hi);
            match f.eval(-s_mid.exp()) {
                Ok(eval) => {
                    note(Some(&eval), &mut best_dual, &mut dual_trace);
                    if eval.gradient >= 0.0 {
                        let converged = eval.gradient <= slack_tol;
                        s_lo = s_mid;
                        lo_eval = eval;
                        if converged {
                            break;
                        }
                    } else {
                        s_hi = s_mid;
                    }
                }
                Err(GpsError::BackwardDivergence { .. }) => {
                    // ill-posed recursion: the trial was too relaxed
                    note::<DX, DU>(None, &mut best_dual, &mut dual_trace);
                    s_hi = s_mid;
                }
                Err(err) => return Err(err),
            }
            if s_hi - s_lo < 1e-10 {
                break;
            }
        }

        Ok(DualSolution {
            eval: lo_eval,
            trials,
            dual_trace,
        })
    }
}
