use nalgebra::{Matrix3, SMatrix, Vector1, Vector3, Vector6};

use crate::envs::{clip, wrap_angle, Environment};
use crate::utils::state::GaussianState;

type State = Vector6<f64>;
type Action = Vector1<f64>;

/// Cart with two serial poles, state `[q, th1, th2, dq, dth1, dth2]`.
///
/// Manipulator equations `M(q) ddq = tau - C(q, dq) dq - G(q)` integrated
/// with classic RK4; both poles start hanging down (`th = pi`) and the goal
/// is the upright configuration at the origin.
#[derive(Debug, Clone)]
pub struct DoubleCartpole {
    dt: f64,
    sigma: SMatrix<f64, 6, 6>,

    g: State,
    gw: State,
    uw: Action,
    umax: Action,
    xmax: State,
    slew_rate: bool,
    periodic: bool,

    x0: State,
    sigma0: SMatrix<f64, 6, 6>,

    state: State,
}

impl DoubleCartpole {
    pub fn new() -> DoubleCartpole {
        let pi = std::f64::consts::PI;
        let x0 = Vector6::new(0.0, pi, pi, 0.0, 0.0, 0.0);
        DoubleCartpole {
            dt: 0.01,
            sigma: SMatrix::identity() * 1e-8,
            g: Vector6::zeros(),
            gw: Vector6::new(1e1, 1e4, 1e4, 1e0, 1e0, 1e0),
            uw: Vector1::new(1e-5),
            umax: Vector1::new(5.0),
            xmax: Vector6::new(
                10.0,
                f64::INFINITY,
                f64::INFINITY,
                f64::INFINITY,
                f64::INFINITY,
                f64::INFINITY,
            ),
            slew_rate: false,
            periodic: false,
            x0,
            sigma0: SMatrix::identity() * 1e-4,
            state: x0,
        }
    }

    /// Continuous-time derivative of the state.
    fn derivative(&self, x: &State, u: f64) -> State {
        let g = 9.81;
        let mc = 0.37;
        let mp1 = 0.127;
        let mp2 = 0.127;
        let mt = mc + mp1 + mp2;
        let l1 = 0.3365;
        let l2 = 0.3365;
        let lc1 = l1 / 2.0;
        let lc2 = l2 / 2.0;
        let j1 = mp1 * l1 / 12.0;
        let j2 = mp2 * l2 / 12.0;

        let th1 = x[1];
        let th2 = x[2];
        let dq = x[3];
        let dth1 = x[4];
        let dth2 = x[5];

        let s1 = th1.sin();
        let c1 = th1.cos();
        let s2 = th2.sin();
        let c2 = th2.cos();
        let sdth = (th1 - th2).sin();
        let cdth = (th1 - th2).cos();

        let l1_mp1_mp2 = mp1 * lc1 + mp2 * l2;
        let mp2_l2 = mp2 * lc2;
        let l1_l2_mp2 = l1 * lc2 * mp2;

        #[rustfmt::skip]
        let m = Matrix3::new(
            mt,               l1_mp1_mp2 * c1,                    mp2_l2 * c2,
            l1_mp1_mp2 * c1,  lc1 * lc1 * mp1 + l1 * l1 * mp2 + j1, l1_l2_mp2 * cdth,
            mp2_l2 * c2,      l1_l2_mp2 * cdth,                   lc2 * lc2 * mp2 + j2,
        );

        #[rustfmt::skip]
        let c = Matrix3::new(
            0.0, -l1_mp1_mp2 * dth1 * s1, -mp2_l2 * dth2 * s2,
            0.0, 0.0,                     l1_l2_mp2 * dth2 * sdth,
            0.0, -l1_l2_mp2 * dth1 * sdth, 0.0,
        );

        let grav = Vector3::new(
            0.0,
            -(mp1 * lc1 + mp2 * l1) * g * s1,
            -mp2 * lc2 * g * s2,
        );

        let tau = Vector3::new(u, 0.0, 0.0);
        let dqs = Vector3::new(dq, dth1, dth2);
        let rhs = tau - c * dqs - grav;
        let ddq = m.lu().solve(&rhs).expect("singular inertia matrix");

        Vector6::new(dq, dth1, dth2, ddq[0], ddq[1], ddq[2])
    }
}

impl Default for DoubleCartpole {
    fn default() -> Self {
        DoubleCartpole::new()
    }
}

impl Environment<6, 1> for DoubleCartpole {
    fn dynamics(&self, x: &State, u: &Action) -> State {
        let u = clip(u, &self.umax)[0];

        let k1 = self.derivative(x, u);
        let k2 = self.derivative(&(x + 0.5 * self.dt * k1), u);
        let k3 = self.derivative(&(x + 0.5 * self.dt * k2), u);
        let k4 = self.derivative(&(x + self.dt * k3), u);

        let xn = x + self.dt / 6.0 * (k1 + 2.0 * k2 + 2.0 * k3 + k4);
        clip(&xn, &self.xmax)
    }

    fn noise(&self, _x: &State, _u: &Action) -> SMatrix<f64, 6, 6> {
        self.sigma
    }

    fn cost(&self, x: &State, u: &Action, u_prev: &Action, weight: f64) -> f64 {
        let mut c = 0.0;

        if self.slew_rate {
            let du = u - u_prev;
            c += self.uw[0] * du[0] * du[0];
        } else {
            c += self.uw[0] * u[0] * u[0];
        }

        if weight != 0.0 {
            let y = if self.periodic {
                Vector6::new(x[0], wrap_angle(x[1]), wrap_angle(x[2]), x[3], x[4], x[5])
            } else {
                *x
            };
            let d = y - self.g;
            for i in 0..6 {
                c += weight * self.gw[i] * d[i] * d[i];
            }
        }
        c
    }

    fn init(&self) -> GaussianState<6> {
        GaussianState::new(self.x0, self.sigma0)
    }

    fn ulim(&self) -> Action {
        self.umax
    }

    fn state(&self) -> State {
        self.state
    }

    fn set_state(&mut self, x: State) {
        self.state = x;
    }
}
