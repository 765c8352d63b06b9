use crate::environment::Environment;
use crate::error::Result;

/// Summary of one finished training episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeStats {
    pub episode: usize,
    pub total_reward: f32,
    pub steps: usize,
    /// 本回合所有优化步的平均损失；预热阶段为 None
    pub mean_loss: Option<f64>,
    pub epsilon: f64,
}

pub trait Agent<E: Environment> {
    fn train(&mut self, env: &mut E, num_episodes: usize) -> Result<Vec<EpisodeStats>>;

    // 训练一个episode
    fn train_episode(&mut self, env: &mut E) -> Result<EpisodeStats>;
}
