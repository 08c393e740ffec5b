use anyhow::{Context, Result};
use clap::Parser;
use mooncake_simulator::{Config, Jobs, Simulator, ValidatedConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the activity YAML file.
    #[arg(short, long)]
    config: PathBuf,

    /// Number of simulated players (overrides the file).
    #[arg(long)]
    players: Option<usize>,

    /// Plays each player attempts (overrides the file).
    #[arg(long)]
    rounds: Option<u32>,

    /// Seed for dice and payout failures (random when omitted).
    #[arg(long)]
    seed: Option<u64>,

    /// Probability in 0..=1 that a payout fails.
    #[arg(long)]
    failure_rate: Option<f64>,

    /// Run the reward reissue job after all players finish.
    #[arg(long, default_value_t = false)]
    reissue: bool,

    /// Retry failed points orders after all players finish.
    #[arg(long, default_value_t = false)]
    retry_failed: bool,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn jobs(&self) -> Jobs {
        Jobs {
            reissue: self.reissue,
            retry_failed: self.retry_failed,
        }
    }
}

fn build_config(args: &Args) -> Result<ValidatedConfig> {
    let mut config = Config::load(&args.config)?;
    if let Some(players) = args.players {
        config.players = players;
    }
    if let Some(rounds) = args.rounds {
        config.rounds = rounds;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(failure_rate) = args.failure_rate {
        config.failure_rate = failure_rate;
    }
    if let Some(log_level) = &args.log_level {
        config.log_level = log_level.clone();
    }
    config.validate().context("Invalid configuration")
}

fn init_tracing(level: Level) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = build_config(&args)?;
    init_tracing(config.log_level);
    info!(
        config = %args.config.display(),
        players = config.players.get(),
        rounds = config.rounds.get(),
        "loaded config"
    );

    let summary = Simulator::new(config).run(args.jobs()).await?;
    let output = serde_json::to_string_pretty(&summary).context("Could not encode summary")?;
    println!("{output}");
    Ok(())
}
