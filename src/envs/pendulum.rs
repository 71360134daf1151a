use nalgebra::{Matrix2, Vector1, Vector2};

use crate::envs::{clip, wrap_angle, Environment};
use crate::utils::state::GaussianState;

/// Torque-limited pendulum swing-up.
///
/// State `[th, dth]` with `th = 0` upright; starts hanging down at
/// `th = pi`. Euler integration of `ddth = g/l sin(th) + (u - k dth)/(m l^2)`.
/// The cost tracks the angle continuously rather than modulo a full turn.
#[derive(Debug, Clone)]
pub struct Pendulum {
    dt: f64,
    mass: f64,
    length: f64,
    damping: f64,
    gravity: f64,

    g: Vector2<f64>,
    gw: Vector2<f64>,
    uw: Vector1<f64>,
    umax: Vector1<f64>,

    x0: Vector2<f64>,
    sigma0: Matrix2<f64>,
    sigma: Matrix2<f64>,
    periodic: bool,

    state: Vector2<f64>,
}

impl Pendulum {
    pub fn new() -> Pendulum {
        let x0 = Vector2::new(std::f64::consts::PI, 0.0);
        Pendulum {
            dt: 0.05,
            mass: 1.0,
            length: 1.0,
            damping: 1e-3,
            gravity: 9.81,
            g: Vector2::zeros(),
            gw: Vector2::new(1e1, 1e-1),
            uw: Vector1::new(1e-3),
            umax: Vector1::new(2.5),
            x0,
            sigma0: Matrix2::identity() * 1e-4,
            sigma: Matrix2::identity() * 1e-8,
            periodic: false,
            state: x0,
        }
    }
}

impl Default for Pendulum {
    fn default() -> Self {
        Pendulum::new()
    }
}

impl Environment<2, 1> for Pendulum {
    fn dynamics(&self, x: &Vector2<f64>, u: &Vector1<f64>) -> Vector2<f64> {
        let u = clip(u, &self.umax);
        let (th, dth) = (x[0], x[1]);
        let inertia = self.mass * self.length * self.length;
        let ddth =
            self.gravity / self.length * th.sin() + (u[0] - self.damping * dth) / inertia;
        Vector2::new(th + self.dt * dth, dth + self.dt * ddth)
    }

    fn noise(&self, _x: &Vector2<f64>, _u: &Vector1<f64>) -> Matrix2<f64> {
        self.sigma
    }

    fn cost(
        &self,
        x: &Vector2<f64>,
        u: &Vector1<f64>,
        _u_prev: &Vector1<f64>,
        weight: f64,
    ) -> f64 {
        let mut c = self.uw[0] * u[0] * u[0];
        if weight != 0.0 {
            let y = if self.periodic {
                Vector2::new(wrap_angle(x[0]), x[1])
            } else {
                *x
            };
            let d = y - self.g;
            c += weight * (self.gw[0] * d[0] * d[0] + self.gw[1] * d[1] * d[1]);
        }
        c
    }

    fn init(&self) -> GaussianState<2> {
        GaussianState::new(self.x0, self.sigma0)
    }

    fn ulim(&self) -> Vector1<f64> {
        self.umax
    }

    fn state(&self) -> Vector2<f64> {
        self.state
    }

    fn set_state(&mut self, x: Vector2<f64>) {
        self.state = x;
    }
}
