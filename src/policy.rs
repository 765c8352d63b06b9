use crate::error::Result;

pub trait Policy<S, A> {
    // 根据状态选择动作（探索时钟随之前进）
    fn select_action(&mut self, state: &S) -> Result<A>;

    /// 纯贪心动作，不探索
    fn act(&self, state: &S) -> Result<A>;
}
