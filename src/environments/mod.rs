pub mod cartpole;
pub mod fixed_horizon;

pub use cartpole::CartPole;
pub use fixed_horizon::FixedHorizon;
