use std::collections::VecDeque;

use rand::Rng;
use rand::seq::index;

/// 后继状态：回合结束时为 `Terminal`
#[derive(Debug, Clone, PartialEq)]
pub enum NextState {
    Present(Vec<f32>),
    Terminal,
}

impl NextState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NextState::Terminal)
    }

    pub fn as_slice(&self) -> Option<&[f32]> {
        match self {
            NextState::Present(s) => Some(s),
            NextState::Terminal => None,
        }
    }
}

/// One environment step as stored in the replay memory.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Vec<f32>,
    pub action: i64,
    pub next_state: NextState,
    pub reward: f32,
}

/// Fixed-capacity FIFO store of transitions with uniform sampling.
///
/// Pushing into a full memory evicts the oldest transition, so the memory
/// always holds the most recent `capacity` transitions in insertion order.
#[derive(Debug)]
pub struct ReplayMemory {
    memory: VecDeque<Transition>,
    capacity: usize,
}

impl ReplayMemory {
    pub fn new(capacity: usize) -> Self {
        ReplayMemory {
            memory: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, transition: Transition) {
        if self.memory.len() >= self.capacity {
            self.memory.pop_front();
        }
        self.memory.push_back(transition);
    }

    /// Draws `batch_size` distinct transitions uniformly at random.
    ///
    /// Callers must make sure `batch_size <= self.len()`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R, batch_size: usize) -> Vec<&Transition> {
        debug_assert!(batch_size <= self.memory.len());
        index::sample(rng, self.memory.len(), batch_size)
            .into_iter()
            .map(|i| &self.memory[i])
            .collect()
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.memory.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn transition(i: usize) -> Transition {
        Transition {
            state: vec![i as f32],
            action: (i % 2) as i64,
            next_state: NextState::Present(vec![i as f32 + 1.0]),
            reward: i as f32,
        }
    }

    #[test]
    fn keeps_most_recent_transitions_in_order() {
        let mut memory = ReplayMemory::new(5);
        for i in 0..8 {
            memory.push(transition(i));
        }

        assert_eq!(memory.len(), 5);
        let rewards: Vec<f32> = memory.iter().map(|t| t.reward).collect();
        assert_eq!(rewards, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn sample_returns_distinct_held_transitions() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut memory = ReplayMemory::new(10);
        for i in 0..15 {
            memory.push(transition(i));
        }

        for k in [1, 4, 10] {
            let batch = memory.sample(&mut rng, k);
            assert_eq!(batch.len(), k);

            let mut rewards: Vec<f32> = batch.iter().map(|t| t.reward).collect();
            assert!(rewards.iter().all(|r| *r >= 5.0 && *r < 15.0));
            rewards.sort_by(f32::total_cmp);
            rewards.dedup();
            assert_eq!(rewards.len(), k);
        }
    }

    #[test]
    fn terminal_next_state_has_no_slice() {
        let next = NextState::Terminal;
        assert!(next.is_terminal());
        assert!(next.as_slice().is_none());
        assert_eq!(NextState::Present(vec![1.0]).as_slice(), Some(&[1.0][..]));
    }
}
