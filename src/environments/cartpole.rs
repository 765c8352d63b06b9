use crate::environment::{Environment, StepResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const GRAVITY: f32 = 9.8; // 重力加速度
const CART_MASS: f32 = 1.0; // 小车质量
const POLE_MASS: f32 = 0.1; // 杆质量
const HALF_POLE_LENGTH: f32 = 0.5;
const FORCE_MAG: f32 = 10.0;
const TAU: f32 = 0.02; // 时间步长
const X_LIMIT: f32 = 2.4;
const THETA_LIMIT_DEG: f32 = 12.0;

/// CartPole 环境，状态为 [x, x_dot, theta, theta_dot]，动作 0: 向左, 1: 向右
///
/// Reward is 1 for every step the pole stays up; the episode ends when the
/// cart leaves the track, the pole tips past 12 degrees, or `step_limit` is hit.
pub struct CartPole {
    pub state: [f32; 4],
    pub step_limit: usize,
    pub step_count: usize,
    rng: StdRng,
}

impl Default for CartPole {
    fn default() -> Self {
        Self::new()
    }
}

impl CartPole {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            state: [0.0; 4],
            step_limit: 200,
            step_count: 0,
            rng,
        }
    }

    fn is_done(&self) -> bool {
        let [x, _, theta, _] = self.state;
        x.abs() > X_LIMIT
            || theta.abs() > THETA_LIMIT_DEG.to_radians()
            || self.step_count >= self.step_limit
    }

    fn integrate(&mut self, push_right: bool) {
        let [x, x_dot, theta, theta_dot] = self.state;
        let force = if push_right { FORCE_MAG } else { -FORCE_MAG };
        let total_mass = CART_MASS + POLE_MASS;

        // 动力学方程
        let costheta = theta.cos();
        let sintheta = theta.sin();
        let temp =
            (force + POLE_MASS * HALF_POLE_LENGTH * theta_dot.powi(2) * sintheta) / total_mass;
        let theta_acc = (GRAVITY * sintheta - costheta * temp)
            / (HALF_POLE_LENGTH * (4.0 / 3.0 - POLE_MASS * costheta.powi(2) / total_mass));
        let x_acc = temp - POLE_MASS * HALF_POLE_LENGTH * theta_acc * costheta / total_mass;

        self.state = [
            x + TAU * x_dot,
            x_dot + TAU * x_acc,
            theta + TAU * theta_dot,
            theta_dot + TAU * theta_acc,
        ];
    }
}

impl Environment for CartPole {
    type State = [f32; 4];
    type Action = i64;
    type Reward = f32;

    fn reset(&mut self) -> Self::State {
        for v in self.state.iter_mut() {
            *v = self.rng.random_range(-0.05..0.05);
        }
        self.step_count = 0;
        self.state
    }

    fn step(&mut self, action: &Self::Action) -> StepResult<Self::State, Self::Reward> {
        self.integrate(*action == 1);
        self.step_count += 1;

        StepResult {
            next_state: self.state,
            reward: 1.0,
            done: self.is_done(),
        }
    }

    fn action_space(&self) -> usize {
        2
    }

    fn state_dim(&self) -> usize {
        4
    }
}
