pub struct StepResult<S, R> {
    pub next_state: S,
    pub reward: R,
    pub done: bool,
}

/// 环境接口：`done == true` 时 `next_state` 不再被使用
pub trait Environment {
    type State: AsRef<[f32]>;
    type Action: From<i64>;
    type Reward: Copy + Into<f32>;

    fn reset(&mut self) -> Self::State;
    // (next_state, reward, if_done)
    fn step(&mut self, action: &Self::Action) -> StepResult<Self::State, Self::Reward>;

    /// 动作空间维度
    fn action_space(&self) -> usize;

    /// 状态空间维度
    fn state_dim(&self) -> usize;
}
