//! Deep Q-Network agent built on tch-rs: experience replay, epsilon-greedy
//! exploration, Huber-loss updates and a Polyak-averaged target network.

// detailed implementation
pub mod algorithms;
pub mod config;
pub mod environments;
pub mod error;
pub mod networks;
pub mod policies;
pub mod replay_buffer;
pub mod utils;

// Traits
pub mod agent;
pub mod environment;
pub mod policy;

pub use algorithms::dqn::DqnAgent;
pub use config::DqnConfig;
pub use error::{DqnError, Result};
