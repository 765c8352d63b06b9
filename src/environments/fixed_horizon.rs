use crate::environment::{Environment, StepResult};

/// Deterministic environment for smoke tests: the observation never changes,
/// every step pays 1 and the episode ends after `horizon` steps.
pub struct FixedHorizon {
    state_dim: usize,
    n_actions: usize,
    horizon: usize,
    t: usize,
}

impl FixedHorizon {
    pub fn new(state_dim: usize, n_actions: usize, horizon: usize) -> Self {
        Self {
            state_dim,
            n_actions,
            horizon,
            t: 0,
        }
    }

    fn observation(&self) -> Vec<f32> {
        (0..self.state_dim).map(|i| 0.1 * i as f32).collect()
    }
}

impl Environment for FixedHorizon {
    type State = Vec<f32>;
    type Action = i64;
    type Reward = f32;

    fn reset(&mut self) -> Self::State {
        self.t = 0;
        self.observation()
    }

    fn step(&mut self, _action: &Self::Action) -> StepResult<Self::State, Self::Reward> {
        self.t += 1;
        StepResult {
            next_state: self.observation(),
            reward: 1.0,
            done: self.t >= self.horizon,
        }
    }

    fn action_space(&self) -> usize {
        self.n_actions
    }

    fn state_dim(&self) -> usize {
        self.state_dim
    }
}
