use nalgebra::allocator::Allocator;
use nalgebra::{Const, DefaultAllocator, DimMin, SVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::control::cost::{Activation, QuadraticCost};
use crate::control::dual::{DualEvaluation, DualFunction, DualSearch};
use crate::control::dynamics::LinearGaussianDynamics;
use crate::control::forward_pass::forward_pass;
use crate::control::policy::LinearGaussianControl;
use crate::control::value::{QuadraticStateActionValue, QuadraticStateValue};
use crate::control::GpsError;
use crate::envs::Environment;
use crate::utils::state::{GaussianState, JointSequence};

/// Dual variable installed when the scalar search fails or a candidate is
/// rejected: far out on the relaxed end, where the trust-region penalty is
/// effectively disabled.
const ALPHA_FALLBACK: f64 = -1e8;

/// How the transition model is obtained each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DynamicsFit {
    /// Per-timestep regression over the fresh rollout batch.
    Learned,
    /// Finite-difference linearization along the mean rollout of the known
    /// model.
    Analytical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpsConfig {
    /// Horizon length (number of control steps).
    pub nb_steps: usize,
    /// Rollouts per sampling phase.
    pub nb_episodes: usize,
    /// Outer iteration budget.
    pub nb_iter: usize,
    /// Trust-region radius: bound on the policy-change KL over the horizon.
    pub kl_bound: f64,
    /// Rescale the bound each accepted iteration from the ratio of expected
    /// to actual improvement.
    pub kl_adaptive: bool,
    /// Isotropic exploration covariance of the initial controller.
    pub init_action_sigma: f64,
    pub activation: Activation,
    pub fit: DynamicsFit,
    /// Acceptance tolerance: a candidate passes if
    /// `kl - kl_bound < accept_margin * kl_bound`.
    pub accept_margin: f64,
    pub kl_mult_min: f64,
    pub kl_mult_max: f64,
    /// Trial cap of the dual search.
    pub dual_max_iter: usize,
    /// Relative slack tolerance of the dual search.
    pub dual_tol: f64,
    pub verbose: bool,
}

impl Default for GpsConfig {
    fn default() -> GpsConfig {
        GpsConfig {
            nb_steps: 100,
            nb_episodes: 25,
            nb_iter: 10,
            kl_bound: 0.1,
            kl_adaptive: false,
            init_action_sigma: 1.0,
            activation: Activation::Uniform,
            fit: DynamicsFit::Learned,
            accept_margin: 0.25,
            kl_mult_min: 0.1,
            kl_mult_max: 5.0,
            dual_max_iter: 50,
            dual_tol: 1e-6,
            verbose: false,
        }
    }
}

/// One sampled trajectory: `nb_steps` transitions plus the terminal cost
/// slice evaluated at zero action.
#[derive(Debug, Clone)]
pub struct Episode<const DX: usize, const DU: usize> {
    pub x: Vec<SVector<f64, DX>>,
    pub u: Vec<SVector<f64, DU>>,
    pub xn: Vec<SVector<f64, DX>>,
    pub c: Vec<f64>,
}

impl<const DX: usize, const DU: usize> Episode<DX, DU> {
    pub fn new(nb_steps: usize) -> Episode<DX, DU> {
        Episode {
            x: Vec::with_capacity(nb_steps),
            u: Vec::with_capacity(nb_steps),
            xn: Vec::with_capacity(nb_steps),
            c: Vec::with_capacity(nb_steps + 1),
        }
    }

    /// Accumulated weighted cost over the episode.
    pub fn total_cost(&self) -> f64 {
        self.c.iter().sum()
    }
}

/// A batch of independently sampled episodes.
#[derive(Debug, Clone, Default)]
pub struct Rollouts<const DX: usize, const DU: usize> {
    pub episodes: Vec<Episode<DX, DU>>,
}

impl<const DX: usize, const DU: usize> Rollouts<DX, DU> {
    pub fn mean_return(&self) -> f64 {
        if self.episodes.is_empty() {
            return f64::INFINITY;
        }
        self.episodes.iter().map(Episode::total_cost).sum::<f64>() / self.episodes.len() as f64
    }
}

/// Outer optimization loop: sample the current controller, fit the
/// transition model, expand the cost, solve the dual trust-region problem
/// and accept or reject the candidate, for a fixed iteration budget.
///
/// All optimizer state (dynamics, cost, controller, value functions, KL
/// bookkeeping) lives here and changes only on acceptance; everything a
/// dual-function evaluation produces is transient.
pub struct Gps<E, const DX: usize, const DU: usize> {
    env: E,
    pub config: GpsConfig,
    weights: Vec<f64>,
    init: GaussianState<DX>,

    pub dynamics: LinearGaussianDynamics<DX, DU>,
    pub cost: QuadraticCost<DX, DU>,
    pub ctl: LinearGaussianControl<DX, DU>,
    pub xvalue: QuadraticStateValue<DX>,
    pub xuvalue: QuadraticStateActionValue<DX, DU>,
    /// Forward distributions under the current controller.
    pub prop: JointSequence<DX, DU>,

    pub alpha: f64,
    kl_base: f64,
    pub kl_bound: f64,
    kl_mult: f64,

    pub data: Rollouts<DX, DU>,
    pub last_return: f64,
    /// Recoverable conditions encountered per iteration.
    pub diagnostics: Vec<(usize, GpsError)>,
}

impl<E, const DX: usize, const DU: usize> Gps<E, DX, DU>
where
    E: Environment<DX, DU> + Clone + Send + Sync,
{
    pub fn new(env: E, config: GpsConfig) -> Gps<E, DX, DU> {
        let nb_steps = config.nb_steps;
        let weights = config.activation.weights(nb_steps);
        let init = env.init();
        Gps {
            env,
            weights,
            init,
            dynamics: LinearGaussianDynamics::new(nb_steps),
            cost: QuadraticCost::zeros(nb_steps),
            ctl: LinearGaussianControl::new(nb_steps, config.init_action_sigma),
            xvalue: QuadraticStateValue::zeros(nb_steps),
            xuvalue: QuadraticStateActionValue::zeros(nb_steps),
            prop: JointSequence::zeros(nb_steps),
            alpha: -1e4,
            kl_base: config.kl_bound,
            kl_bound: config.kl_bound,
            kl_mult: 1.0,
            data: Rollouts::default(),
            last_return: f64::INFINITY,
            diagnostics: Vec::new(),
            config,
        }
    }

    /// Roll out the current controller for `nb_episodes` episodes. Episodes
    /// are independent and run in parallel, each on its own clone of the
    /// environment; the batch is the plain concatenation of the results.
    pub fn sample(&self, nb_episodes: usize, stoch: bool) -> Rollouts<DX, DU> {
        let nb_steps = self.config.nb_steps;
        let episodes = (0..nb_episodes)
            .into_par_iter()
            .map(|_| {
                let mut env = self.env.clone();
                let mut rng = rand::thread_rng();
                let mut ep = Episode::new(nb_steps);

                let mut x = env.reset();
                let mut u_prev = SVector::<f64, DU>::zeros();
                for t in 0..nb_steps {
                    let u = self.ctl.sample(&x, t, stoch, &mut rng);
                    ep.c.push(env.cost(&x, &u, &u_prev, self.weights[t]));
                    ep.x.push(x);
                    ep.u.push(u);
                    x = env.step(&u);
                    ep.xn.push(x);
                    u_prev = u;
                }
                ep.c.push(env.cost(&x, &SVector::zeros(), &u_prev, self.weights[nb_steps]));
                ep
            })
            .collect();
        Rollouts { episodes }
    }

    /// Deterministic rollout of the current controller's mean from the
    /// initial mean; the reference trajectory for analytical linearization.
    fn mean_rollout(&self) -> (Vec<SVector<f64, DX>>, Vec<SVector<f64, DU>>) {
        let nb_steps = self.config.nb_steps;
        let mut xref = Vec::with_capacity(nb_steps + 1);
        let mut uref = Vec::with_capacity(nb_steps);
        let mut x = self.init.x;
        for t in 0..nb_steps {
            let u = self.ctl.mean(&x, t);
            xref.push(x);
            uref.push(u);
            x = self.env.dynamics(&x, &u);
        }
        xref.push(x);
        (xref, uref)
    }

    fn fit_dynamics(&mut self, iter: usize) {
        match self.config.fit {
            DynamicsFit::Learned => {
                let regularized = self.dynamics.learn(&self.data);
                if regularized > 0 {
                    self.diagnostics.push((
                        iter,
                        GpsError::IllConditionedDynamics {
                            steps: regularized,
                        },
                    ));
                }
            }
            DynamicsFit::Analytical => {
                let (xref, uref) = self.mean_rollout();
                self.dynamics.linearize(&self.env, &xref, &uref);
            }
        }
    }

    /// Re-propagate the current controller and re-expand the cost around the
    /// resulting mean trajectory.
    fn refresh(&mut self) {
        self.prop = forward_pass(&self.init, &self.dynamics, &self.ctl);
        self.cost.taylor_expansion(
            &self.env,
            &self.prop.xdist.mu,
            &self.prop.udist.mu,
            &self.weights,
        );
    }

    /// Expected return of a candidate: the true cost along its mean
    /// trajectory, with activation weighting.
    fn expected_return(&self, prop: &JointSequence<DX, DU>) -> f64 {
        let nb_steps = self.config.nb_steps;
        let mut total = 0.0;
        let mut u_prev = SVector::<f64, DU>::zeros();
        for t in 0..nb_steps {
            let u = prop.udist.mu[t];
            total += self.env.cost(&prop.xdist.mu[t], &u, &u_prev, self.weights[t]);
            u_prev = u;
        }
        total += self.env.cost(
            &prop.xdist.mu[nb_steps],
            &SVector::zeros(),
            &u_prev,
            self.weights[nb_steps],
        );
        total
    }

    /// Run the outer loop and return the per-iteration mean-return trace
    /// (`nb_iter + 1` entries; rejected iterations repeat the last accepted
    /// return).
    pub fn run(&mut self) -> Vec<f64>
    where
        Const<DU>: DimMin<Const<DU>, Output = Const<DU>>,
        DefaultAllocator: Allocator<(usize, usize), Const<DU>>,
    {
        let mut trace = Vec::with_capacity(self.config.nb_iter + 1);

        self.data = self.sample(self.config.nb_episodes, true);
        self.fit_dynamics(0);
        self.refresh();
        self.last_return = self.data.mean_return();
        trace.push(self.last_return);

        for iter in 0..self.config.nb_iter {
            let eval = {
                let dual_fn = DualFunction {
                    cost: &self.cost,
                    dynamics: &self.dynamics,
                    ctl: &self.ctl,
                    init: &self.init,
                    kl_bound: self.kl_bound,
                };
                let search = DualSearch {
                    max_iter: self.config.dual_max_iter,
                    tol: self.config.dual_tol,
                    ..DualSearch::default()
                };
                match search.solve(&dual_fn) {
                    Ok(solution) => Some(solution.eval),
                    Err(err) => {
                        self.diagnostics.push((iter, err));
                        // no feasible trust region: retry without one
                        dual_fn.eval(ALPHA_FALLBACK).ok()
                    }
                }
            };
            let Some(eval) = eval else {
                // even the unconstrained recursion diverged; stall
                trace.push(self.last_return);
                continue;
            };
            self.alpha = eval.alpha;

            let current_return = self.data.mean_return();
            let expected_return = self.expected_return(&eval.prop);
            let expected_imp = self.last_return - expected_return;
            let actual_imp = self.last_return - current_return;

            if self.config.kl_adaptive {
                // classic ratio rule: shrink when the local model
                // over-promised, grow when it under-promised
                let mult = expected_imp / (2.0 * (expected_imp - actual_imp).max(1e-4));
                let mult = mult.clamp(0.1, 5.0);
                self.kl_mult =
                    (mult * self.kl_mult).clamp(self.config.kl_mult_min, self.config.kl_mult_max);
            }

            let kl = eval.kl;
            let bound = self.kl_bound;
            if kl - bound < self.config.accept_margin * bound {
                self.accept(eval, iter, current_return);
                trace.push(current_return);
            } else {
                self.diagnostics
                    .push((iter, GpsError::TrustRegionViolation { kl, bound }));
                self.alpha = ALPHA_FALLBACK;
                trace.push(self.last_return);
            }

            if self.config.verbose {
                if iter == 0 {
                    println!("{:>6} {:>8}", "", "kl");
                    println!("{:>6} {:>6} {:>6} {:>12}", "iter", "req.", "act.", "return");
                }
                println!("{:6} {:6.2} {:6.2} {:12.2}", iter, bound, kl, current_return);
            }
        }
        trace
    }

    fn accept(&mut self, eval: DualEvaluation<DX, DU>, iter: usize, current_return: f64) {
        self.ctl = eval.backward.ctl;
        self.xvalue = eval.backward.xvalue;
        self.xuvalue = eval.backward.xuvalue;

        self.data = self.sample(self.config.nb_episodes, true);
        self.fit_dynamics(iter);
        self.refresh();
        self.last_return = current_return;

        if self.config.kl_adaptive {
            self.kl_bound = self.kl_base * self.kl_mult;
        }
    }
}
