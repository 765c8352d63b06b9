//! Epsilon-greedy exploration with an exponentially decaying epsilon.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tch::Tensor;

use crate::networks::mlp::MLP;

/// Epsilon-greedy explorer.
///
/// `steps_done` is the exploration clock: it advances on every call to
/// [`EpsilonGreedy::select_action`], whichever branch is taken, and is never
/// reset during a run.
pub struct EpsilonGreedy {
    steps_done: u64,
    eps_start: f64,
    eps_end: f64,
    eps_decay: f64,
    n_actions: usize,
    rng: StdRng,
}

impl EpsilonGreedy {
    pub fn new(eps_start: f64, eps_end: f64, eps_decay: f64, n_actions: usize) -> Self {
        Self::with_rng(
            eps_start,
            eps_end,
            eps_decay,
            n_actions,
            StdRng::from_os_rng(),
        )
    }

    pub fn with_rng(
        eps_start: f64,
        eps_end: f64,
        eps_decay: f64,
        n_actions: usize,
        rng: StdRng,
    ) -> Self {
        Self {
            steps_done: 0,
            eps_start,
            eps_end,
            eps_decay,
            n_actions,
            rng,
        }
    }

    /// eps_end + (eps_start - eps_end) * exp(-steps / eps_decay)
    pub fn threshold_at(&self, steps: u64) -> f64 {
        self.eps_end + (self.eps_start - self.eps_end) * (-(steps as f64) / self.eps_decay).exp()
    }

    /// Epsilon the next call to `select_action` will use.
    pub fn threshold(&self) -> f64 {
        self.threshold_at(self.steps_done)
    }

    pub fn steps_done(&self) -> u64 {
        self.steps_done
    }

    pub fn n_actions(&self) -> usize {
        self.n_actions
    }

    /// Picks an action for a single `[1, obs_dim]` state.
    pub fn select_action(&mut self, state: &Tensor, policy_net: &MLP) -> i64 {
        let eps_threshold = self.threshold();
        let sample: f64 = self.rng.random();
        self.steps_done = self.steps_done.wrapping_add(1);

        if sample > eps_threshold {
            Self::greedy(state, policy_net)
        } else {
            self.rng.random_range(0..self.n_actions as i64)
        }
    }

    /// Index of the largest action value; ties go to the lowest index.
    pub fn greedy(state: &Tensor, policy_net: &MLP) -> i64 {
        tch::no_grad(|| {
            policy_net
                .evaluate(state)
                .argmax(1, false)
                .int64_value(&[0])
        })
    }
}
