//! Configuration of the DQN agent.
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

use crate::error::{DqnError, Result};

/// Hyperparameters of a training run.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DqnConfig {
    /// 初始 epsilon
    pub eps_start: f64,
    /// 最终 epsilon
    pub eps_end: f64,
    /// epsilon 衰减速率（步数）
    pub eps_decay: f64,
    pub episodes: usize,
    /// 折扣因子
    pub gamma: f64,
    /// Replay memory capacity (`N`).
    #[serde(alias = "N")]
    pub capacity: usize,
    /// Soft update coefficient of the target network.
    pub tau: f64,
    pub batch_size: usize,
    pub lr: f64,
    pub seed: Option<u64>,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            eps_start: 0.9,
            eps_end: 0.05,
            eps_decay: 1000.0,
            episodes: 10000,
            gamma: 0.99,
            capacity: 10000,
            tau: 0.005,
            batch_size: 128,
            lr: 1e-4,
            seed: None,
        }
    }
}

impl DqnConfig {
    pub fn eps_start(mut self, v: f64) -> Self {
        self.eps_start = v;
        self
    }

    pub fn eps_end(mut self, v: f64) -> Self {
        self.eps_end = v;
        self
    }

    pub fn eps_decay(mut self, v: f64) -> Self {
        self.eps_decay = v;
        self
    }

    /// Number of episodes run by `Agent::train` through the binary.
    pub fn episodes(mut self, v: usize) -> Self {
        self.episodes = v;
        self
    }

    /// Discount factor.
    pub fn gamma(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Replay memory capacity.
    pub fn capacity(mut self, v: usize) -> Self {
        self.capacity = v;
        self
    }

    /// Soft update coefficient.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Learning rate of AdamW.
    pub fn lr(mut self, v: f64) -> Self {
        self.lr = v;
        self
    }

    pub fn seed(mut self, v: Option<u64>) -> Self {
        self.seed = v;
        self
    }

    /// Rejects hyperparameters the training loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        let err = |msg: String| Err(DqnError::InvalidConfig(msg));

        if self.capacity == 0 {
            return err("capacity must be positive".into());
        }
        if self.batch_size == 0 {
            return err("batch_size must be positive".into());
        }
        if self.batch_size > self.capacity {
            return err(format!(
                "batch_size ({}) exceeds capacity ({})",
                self.batch_size, self.capacity
            ));
        }
        if !unit.contains(&self.gamma) {
            return err(format!("gamma must lie in [0, 1], got {}", self.gamma));
        }
        if !unit.contains(&self.tau) {
            return err(format!("tau must lie in [0, 1], got {}", self.tau));
        }
        if !unit.contains(&self.eps_start) || !unit.contains(&self.eps_end) {
            return err(format!(
                "eps_start/eps_end must lie in [0, 1], got {}/{}",
                self.eps_start, self.eps_end
            ));
        }
        if !(self.eps_decay > 0.0) {
            return err(format!("eps_decay must be positive, got {}", self.eps_decay));
        }
        if !(self.lr > 0.0) {
            return err(format!("lr must be positive, got {}", self.lr));
        }
        Ok(())
    }

    /// Loads [DqnConfig] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let rdr = BufReader::new(File::open(path)?);
        let config: Self = serde_yaml::from_reader(rdr)?;
        info!("Load config of DQN agent from {}", path.display());
        Ok(config)
    }

    /// Saves [DqnConfig] as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(self)?.as_bytes())?;
        info!("Save config of DQN agent into {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(DqnConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let bad = [
            DqnConfig::default().capacity(0),
            DqnConfig::default().batch_size(0),
            DqnConfig::default().capacity(10).batch_size(11),
            DqnConfig::default().gamma(1.5),
            DqnConfig::default().tau(-0.1),
            DqnConfig::default().eps_start(2.0),
            DqnConfig::default().eps_decay(0.0),
            DqnConfig::default().lr(f64::NAN),
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(DqnError::InvalidConfig(_))),
                "{config:?}"
            );
        }
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let config: DqnConfig = serde_yaml::from_str("N: 100\nbatch_size: 8\ntau: 0.01\n").unwrap();
        assert_eq!(config.capacity, 100);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.tau, 0.01);
        assert_eq!(config.gamma, 0.99);
        assert_eq!(config.seed, None);
    }
}
