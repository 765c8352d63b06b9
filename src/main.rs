use anyhow::Result;
use clap::Parser;
use deepq::agent::Agent;
use deepq::environments::CartPole;
use deepq::{DqnAgent, DqnConfig};
use log::info;
use std::path::PathBuf;

/// Train a DQN agent on CartPole.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML config; defaults are used for missing keys
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the number of episodes in the config
    #[arg(long)]
    episodes: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Writes the effective config to this file before training
    #[arg(long)]
    dump_config: Option<PathBuf>,

    /// Renders the episode reward curve to a PNG file
    #[cfg(feature = "plot")]
    #[arg(long)]
    plot: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DqnConfig::load(path)?,
        None => DqnConfig::default(),
    };
    if let Some(episodes) = args.episodes {
        config = config.episodes(episodes);
    }
    if args.seed.is_some() {
        config = config.seed(args.seed);
    }
    if let Some(path) = &args.dump_config {
        config.save(path)?;
    }

    let mut env = match config.seed {
        Some(seed) => CartPole::seeded(seed),
        None => CartPole::new(),
    };
    let device = tch::Device::cuda_if_available();
    info!("Training on {:?} with {:?}", device, config);

    let mut agent = DqnAgent::from_env(&env, config, device)?;
    let stats = agent.run(&mut env)?;

    let n = stats.len().max(1) as f32;
    let mean_reward = stats.iter().map(|s| s.total_reward).sum::<f32>() / n;
    info!(
        "Finished {} episodes, mean reward = {:.2}, optimizer steps = {}",
        stats.len(),
        mean_reward,
        agent.n_opts()
    );

    #[cfg(feature = "plot")]
    if let Some(path) = &args.plot {
        let rewards: Vec<f32> = stats.iter().map(|s| s.total_reward).collect();
        deepq::utils::plot_rewards(&rewards, &path.to_string_lossy(), "Training Reward")?;
    }

    Ok(())
}
