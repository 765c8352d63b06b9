use std::marker::PhantomData;

use log::{debug, error, info};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tch::nn::OptimizerConfig;
use tch::{Device, Kind, Reduction, Tensor, nn};

use crate::agent::{Agent, EpisodeStats};
use crate::config::DqnConfig;
use crate::environment::Environment;
use crate::error::{DqnError, Result, check_dim};
use crate::networks::mlp::MLP;
use crate::policies::EpsilonGreedy;
use crate::policy::Policy;
use crate::replay_buffer::{NextState, ReplayMemory, Transition};
use crate::utils::{ToTensor, stack_rows, track};

/// Huber loss 在残差为 1.0 处由二次转为线性
const HUBER_BETA: f64 = 1.0;
/// 梯度逐元素裁剪到 [-100, 100]
const GRAD_CLIP_VALUE: f64 = 100.0;

/// DQN agent with experience replay and a soft-updated target network.
pub struct DqnAgent<E: Environment> {
    policy_net: MLP,
    target_net: MLP,
    memory: ReplayMemory,
    explorer: EpsilonGreedy,
    optimizer: nn::Optimizer,
    config: DqnConfig,
    state_dim: usize,
    action_dim: usize,
    device: Device,
    rng: StdRng,
    episodes_done: usize,
    n_opts: usize,
    _marker: PhantomData<E>,
}

impl<E: Environment> DqnAgent<E> {
    pub fn new(
        state_dim: usize,
        action_dim: usize,
        config: DqnConfig,
        device: Device,
    ) -> Result<Self> {
        config.validate()?;
        if state_dim == 0 || action_dim == 0 {
            return Err(DqnError::InvalidConfig(format!(
                "state_dim ({state_dim}) and action_dim ({action_dim}) must be positive"
            )));
        }

        let (explorer_rng, replay_rng) = match config.seed {
            Some(seed) => {
                tch::manual_seed(seed as i64);
                (
                    StdRng::seed_from_u64(seed),
                    StdRng::seed_from_u64(seed.wrapping_add(1)),
                )
            }
            None => (StdRng::from_os_rng(), StdRng::from_os_rng()),
        };

        let policy_net = MLP::new(nn::VarStore::new(device), state_dim, action_dim);
        let mut target_net = MLP::new(nn::VarStore::new(device), state_dim, action_dim);
        target_net.load_from(&policy_net)?;

        let optimizer = nn::AdamW {
            amsgrad: true,
            ..Default::default()
        }
        .build(policy_net.var_store(), config.lr)?;

        let explorer = EpsilonGreedy::with_rng(
            config.eps_start,
            config.eps_end,
            config.eps_decay,
            action_dim,
            explorer_rng,
        );

        Ok(DqnAgent {
            policy_net,
            target_net,
            memory: ReplayMemory::new(config.capacity),
            explorer,
            optimizer,
            config,
            state_dim,
            action_dim,
            device,
            rng: replay_rng,
            episodes_done: 0,
            n_opts: 0,
            _marker: PhantomData,
        })
    }

    /// Sizes the networks from the environment's `state_dim` and `action_space`.
    pub fn from_env(env: &E, config: DqnConfig, device: Device) -> Result<Self> {
        Self::new(env.state_dim(), env.action_space(), config, device)
    }

    /// Runs `config.episodes` episodes.
    pub fn run(&mut self, env: &mut E) -> Result<Vec<EpisodeStats>> {
        let episodes = self.config.episodes;
        self.train(env, episodes)
    }

    /// One gradient step on a sampled batch.
    ///
    /// Returns `Ok(None)` while the memory holds fewer than `batch_size`
    /// transitions.
    pub fn optimize_model(&mut self) -> Result<Option<f64>> {
        let Some(loss) = self.batch_loss() else {
            return Ok(None);
        };
        let loss_value = loss.double_value(&[]);
        if !loss_value.is_finite() {
            error!("loss became non-finite after {} optimizer steps", self.n_opts);
            return Err(DqnError::NumericInstability {
                what: "loss".into(),
                value: loss_value,
            });
        }

        self.backward_clipped(&loss)?;
        self.optimizer.step();

        self.n_opts += 1;
        debug!("opt {}: loss = {loss_value:.6}", self.n_opts);
        Ok(Some(loss_value))
    }

    /// Huber loss between Q(s, a) and the bootstrapped targets on a sampled
    /// batch, or `None` during warm-up.
    fn batch_loss(&mut self) -> Option<Tensor> {
        let batch_size = self.config.batch_size;
        if self.memory.len() < batch_size {
            return None;
        }

        let (state_action_values, expected_state_action_values) = {
            let transitions = self.memory.sample(&mut self.rng, batch_size);

            let state_batch =
                stack_rows(transitions.iter().map(|t| t.state.as_slice()), self.state_dim)
                    .to_device(self.device);
            let actions: Vec<i64> = transitions.iter().map(|t| t.action).collect();
            let action_batch = Tensor::from_slice(&actions)
                .to_device(self.device)
                .unsqueeze(1);

            // Q(s_t, a)
            let state_action_values = self
                .policy_net
                .evaluate(&state_batch)
                .gather(1, &action_batch, false)
                .squeeze_dim(1);

            (state_action_values, self.bootstrapped_targets(&transitions))
        };

        Some(state_action_values.smooth_l1_loss(
            &expected_state_action_values,
            Reduction::Mean,
            HUBER_BETA,
        ))
    }

    /// Fills the policy gradients from `loss`, rejects non-finite ones and
    /// clips the rest element-wise to `GRAD_CLIP_VALUE`.
    fn backward_clipped(&mut self, loss: &Tensor) -> Result<()> {
        self.optimizer.zero_grad();
        loss.backward();
        self.check_gradients()?;
        self.optimizer.clip_grad_value(GRAD_CLIP_VALUE);
        Ok(())
    }

    /// r + gamma * max_a Q_target(s', a), with the bootstrap term zero for
    /// terminal transitions. No gradient flows through the result.
    fn bootstrapped_targets(&self, transitions: &[&Transition]) -> Tensor {
        tch::no_grad(|| {
            let rewards: Vec<f32> = transitions.iter().map(|t| t.reward).collect();
            let reward_batch = Tensor::from_slice(&rewards).to_device(self.device);

            let non_final_mask: Vec<bool> = transitions
                .iter()
                .map(|t| !t.next_state.is_terminal())
                .collect();
            let non_final_next_states: Vec<&[f32]> = transitions
                .iter()
                .filter_map(|t| t.next_state.as_slice())
                .collect();

            let mut next_state_values =
                Tensor::zeros([transitions.len() as i64], (Kind::Float, self.device));
            if !non_final_next_states.is_empty() {
                let next_batch =
                    stack_rows(non_final_next_states, self.state_dim).to_device(self.device);
                let best = self.target_net.evaluate(&next_batch).max_dim(1, false).0;
                let mask = Tensor::from_slice(&non_final_mask).to_device(self.device);
                let _ = next_state_values.index_put_(&[Some(mask)], &best, false);
            }

            next_state_values * self.config.gamma + reward_batch
        })
    }

    fn check_gradients(&self) -> Result<()> {
        for (name, var) in self.policy_net.var_store().variables() {
            let grad = var.grad();
            if !grad.defined() {
                continue;
            }
            let finite = grad.isfinite().all().to_kind(Kind::Int64).int64_value(&[]) != 0;
            if !finite {
                error!(
                    "gradient of {name} became non-finite after {} optimizer steps",
                    self.n_opts
                );
                return Err(DqnError::NumericInstability {
                    what: format!("gradient of {name}"),
                    value: grad.abs().max().double_value(&[]),
                });
            }
        }
        Ok(())
    }

    /// Moves the target network toward the policy network by `tau`.
    pub fn soft_update(&mut self) -> Result<()> {
        track(&mut self.target_net, &self.policy_net, self.config.tau)
    }

    fn observe(&self, state: &E::State, what: &'static str) -> Result<Vec<f32>> {
        let state = state.as_ref();
        check_dim(what, self.state_dim, state.len())?;
        Ok(state.to_vec())
    }

    pub fn memory(&self) -> &ReplayMemory {
        &self.memory
    }

    pub fn explorer(&self) -> &EpsilonGreedy {
        &self.explorer
    }

    pub fn policy_net(&self) -> &MLP {
        &self.policy_net
    }

    pub fn target_net(&self) -> &MLP {
        &self.target_net
    }

    pub fn config(&self) -> &DqnConfig {
        &self.config
    }

    /// Number of optimizer steps actually applied.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    pub fn action_dim(&self) -> usize {
        self.action_dim
    }
}

impl<E: Environment> Policy<E::State, E::Action> for DqnAgent<E> {
    fn select_action(&mut self, state: &E::State) -> Result<E::Action> {
        let state = self.observe(state, "observation")?;
        let action = self
            .explorer
            .select_action(&state.to_tensor(), &self.policy_net);
        Ok(E::Action::from(action))
    }

    fn act(&self, state: &E::State) -> Result<E::Action> {
        let state = self.observe(state, "observation")?;
        let action = EpsilonGreedy::greedy(&state.to_tensor(), &self.policy_net);
        Ok(E::Action::from(action))
    }
}

impl<E: Environment> Agent<E> for DqnAgent<E> {
    fn train(&mut self, env: &mut E, num_episodes: usize) -> Result<Vec<EpisodeStats>> {
        let mut all_stats = Vec::with_capacity(num_episodes);
        for _ in 0..num_episodes {
            let stats = self.train_episode(env)?;
            info!(
                "Episode {}: total reward = {}, steps = {}, epsilon = {:.3}, memory = {}",
                stats.episode,
                stats.total_reward,
                stats.steps,
                stats.epsilon,
                self.memory.len()
            );
            all_stats.push(stats);
        }
        Ok(all_stats)
    }

    fn train_episode(&mut self, env: &mut E) -> Result<EpisodeStats> {
        check_dim("environment state_dim", self.state_dim, env.state_dim())?;
        check_dim("environment action_space", self.action_dim, env.action_space())?;

        let mut state = self.observe(&env.reset(), "reset observation")?;
        let mut total_reward = 0.0;
        let mut steps = 0;
        let mut losses = Vec::new();

        loop {
            // select action
            let action = self
                .explorer
                .select_action(&state.to_tensor(), &self.policy_net);

            // execute action
            let result = env.step(&E::Action::from(action));
            let reward: f32 = result.reward.into();
            total_reward += reward;
            steps += 1;

            let next_state = if result.done {
                NextState::Terminal
            } else {
                NextState::Present(self.observe(&result.next_state, "step observation")?)
            };

            // store memory
            self.memory.push(Transition {
                state,
                action,
                next_state: next_state.clone(),
                reward,
            });

            // update networks
            if let Some(loss) = self.optimize_model()? {
                losses.push(loss);
            }
            self.soft_update()?;

            match next_state {
                NextState::Present(s) => state = s,
                NextState::Terminal => break,
            }
        }

        let episode = self.episodes_done;
        self.episodes_done += 1;
        let mean_loss = if losses.is_empty() {
            None
        } else {
            Some(losses.iter().sum::<f64>() / losses.len() as f64)
        };

        Ok(EpisodeStats {
            episode,
            total_reward,
            steps,
            mean_loss,
            epsilon: self.explorer.threshold(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environments::{CartPole, FixedHorizon};

    fn config() -> DqnConfig {
        DqnConfig::default()
            .capacity(100)
            .batch_size(8)
            .seed(Some(42))
    }

    fn agent(config: DqnConfig) -> DqnAgent<FixedHorizon> {
        DqnAgent::new(4, 2, config, Device::Cpu).unwrap()
    }

    fn terminal(reward: f32) -> Transition {
        Transition {
            state: vec![0.5; 4],
            action: 1,
            next_state: NextState::Terminal,
            reward,
        }
    }

    #[test]
    fn terminal_targets_equal_reward() {
        for gamma in [0.0, 0.5, 0.99, 1.0] {
            let agent = agent(config().gamma(gamma));
            let batch = [terminal(1.0), terminal(-3.25), terminal(7.5)];
            let refs: Vec<&Transition> = batch.iter().collect();
            let targets = Vec::<f32>::try_from(agent.bootstrapped_targets(&refs)).unwrap();
            assert_eq!(targets, vec![1.0, -3.25, 7.5]);
        }
    }

    #[test]
    fn non_terminal_targets_bootstrap_from_target_net() {
        let agent = agent(config().gamma(0.5));
        let next = vec![0.1, 0.2, 0.3, 0.4];
        let batch = [
            terminal(2.0),
            Transition {
                state: vec![0.0; 4],
                action: 0,
                next_state: NextState::Present(next.clone()),
                reward: 1.0,
            },
        ];
        let refs: Vec<&Transition> = batch.iter().collect();
        let targets = agent.bootstrapped_targets(&refs);
        assert!(!targets.requires_grad());

        let best = agent
            .target_net
            .evaluate(&next.to_tensor())
            .max()
            .double_value(&[]);
        assert_eq!(targets.double_value(&[0]), 2.0);
        assert!((targets.double_value(&[1]) - (1.0 + 0.5 * best)).abs() < 1e-5);
    }

    #[test]
    fn optimize_is_noop_until_batch_available() {
        let mut agent = agent(config());
        for _ in 0..7 {
            agent.memory.push(terminal(1.0));
            assert_eq!(agent.optimize_model().unwrap(), None);
        }
        agent.memory.push(terminal(1.0));
        let loss = agent.optimize_model().unwrap().unwrap();
        assert!(loss.is_finite());
        assert_eq!(agent.n_opts(), 1);
    }

    #[test]
    fn optimize_leaves_target_untouched() {
        let mut agent = agent(config());
        for _ in 0..8 {
            agent.memory.push(terminal(10.0));
        }
        let xs = Tensor::ones([1, 4], (Kind::Float, Device::Cpu));
        let target_before = agent.target_net.evaluate(&xs);
        let policy_before = agent.policy_net.evaluate(&xs);

        agent.optimize_model().unwrap();

        assert!(agent.target_net.evaluate(&xs).equal(&target_before));
        assert!(!agent.policy_net.evaluate(&xs).equal(&policy_before));
    }

    #[test]
    fn target_starts_as_copy_of_policy() {
        let agent = agent(config());
        let xs = Tensor::randn([3, 4], (Kind::Float, Device::Cpu));
        assert!(agent.policy_net.evaluate(&xs).equal(&agent.target_net.evaluate(&xs)));
    }

    #[test]
    fn wrong_observation_size_is_fatal() {
        let mut env = FixedHorizon::new(3, 2, 5);
        let mut agent = agent(config());
        let err = agent.train_episode(&mut env).unwrap_err();
        assert!(matches!(
            err,
            DqnError::DimensionMismatch {
                expected: 4,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn wrong_action_space_is_fatal() {
        let mut env = FixedHorizon::new(4, 3, 5);
        let mut agent = agent(config());
        let err = agent.train_episode(&mut env).unwrap_err();
        assert!(matches!(
            err,
            DqnError::DimensionMismatch {
                expected: 2,
                actual: 3,
                ..
            }
        ));
        assert_eq!(agent.explorer().steps_done(), 0);
        assert!(agent.memory().is_empty());
    }

    fn snapshot(net: &MLP) -> Vec<(String, Tensor)> {
        let mut params: Vec<_> = net
            .var_store()
            .variables()
            .into_iter()
            .map(|(k, t)| (k, t.detach().copy()))
            .collect();
        params.sort_by(|a, b| a.0.cmp(&b.0));
        params
    }

    #[test]
    fn non_finite_loss_aborts_without_update() {
        for reward in [f32::NAN, f32::INFINITY] {
            let mut agent = agent(config());
            for _ in 0..8 {
                agent.memory.push(terminal(reward));
            }
            let before = snapshot(&agent.policy_net);

            let err = agent.optimize_model().unwrap_err();
            assert!(matches!(err, DqnError::NumericInstability { .. }));
            assert_eq!(agent.n_opts(), 0);
            for ((k1, t1), (k2, t2)) in before.iter().zip(snapshot(&agent.policy_net).iter()) {
                assert_eq!(k1, k2);
                assert!(t1.equal(t2));
            }
        }
    }

    #[test]
    fn gradients_are_clipped_elementwise() {
        let mut agent = agent(config());
        for _ in 0..8 {
            agent.memory.push(Transition {
                state: vec![1e5; 4],
                action: 0,
                next_state: NextState::Terminal,
                reward: 1e6,
            });
        }
        let loss = agent.batch_loss().unwrap();
        assert!(loss.double_value(&[]).is_finite());
        agent.backward_clipped(&loss).unwrap();

        let mut largest = 0.0f64;
        for (name, var) in agent.policy_net.var_store().variables() {
            let max = var.grad().abs().max().double_value(&[]);
            assert!(max <= GRAD_CLIP_VALUE, "{name}: {max}");
            largest = largest.max(max);
        }
        // inputs of 1e5 push the output-layer gradient well past the bound
        assert_eq!(largest, GRAD_CLIP_VALUE);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = DqnAgent::<CartPole>::new(4, 2, config().tau(2.0), Device::Cpu);
        assert!(matches!(result, Err(DqnError::InvalidConfig(_))));
    }

    #[test]
    fn episode_ends_with_terminal_transition() {
        let mut env = FixedHorizon::new(4, 2, 6);
        let mut agent = agent(config());
        let stats = agent.train_episode(&mut env).unwrap();

        assert_eq!(stats.steps, 6);
        assert_eq!(stats.total_reward, 6.0);
        assert_eq!(agent.memory().len(), 6);
        let terminals: Vec<bool> = agent
            .memory()
            .iter()
            .map(|t| t.next_state.is_terminal())
            .collect();
        assert_eq!(terminals, vec![false, false, false, false, false, true]);
    }
}
