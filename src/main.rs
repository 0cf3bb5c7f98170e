//! Command-line entry point: train the offloading agent, evaluate a single
//! strategy, or compare all strategies on identical workloads.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use edgesim::agent::DqnAgent;
use edgesim::config::SimConfig;
use edgesim::metrics::MetricsReport;
use edgesim::sim::Simulation;
use edgesim::strategy::{AgentPolicy, BaselineKind};

#[derive(Parser)]
#[command(name = "edgesim", about = "Edge computing task-offloading simulator")]
struct Cli {
    /// Path to a JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the base random seed.
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train the DQN agent and save the resulting model.
    Train {
        /// Where to write the trained model.
        #[arg(long, default_value = "model.json")]
        model: PathBuf,

        /// Directory for periodic checkpoints.
        #[arg(long)]
        checkpoint_dir: Option<PathBuf>,

        /// Override the number of training episodes.
        #[arg(long)]
        episodes: Option<usize>,

        /// Where to write the per-episode training report as JSON.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Evaluate one strategy on the configured workload.
    Evaluate {
        /// Baseline strategy to run; omit to run a trained model.
        #[arg(long, value_enum)]
        strategy: Option<BaselineKind>,

        /// Trained model to run when no baseline is chosen.
        #[arg(long)]
        model: Option<PathBuf>,

        /// Where to write the metrics report as JSON.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run every baseline, and a trained model when given, on identical
    /// workloads.
    Compare {
        /// Trained model to include in the comparison.
        #[arg(long)]
        model: Option<PathBuf>,

        /// Where to write the comparison as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Where to write the comparison as JSON.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    print_config(&config);

    match cli.command {
        Command::Train {
            model,
            checkpoint_dir,
            episodes,
            report,
        } => {
            if let Some(episodes) = episodes {
                config.learning.training_episodes = episodes;
            }
            if let Some(dir) = &checkpoint_dir {
                fs::create_dir_all(dir)
                    .with_context(|| format!("creating checkpoint dir {}", dir.display()))?;
            }
            let mut agent = DqnAgent::new(
                config.state_space(),
                config.action_space(),
                config.learning.clone(),
                config.seed,
            );
            let mut sim = Simulation::new(config);
            let training = sim.train(&mut agent, checkpoint_dir.as_deref())?;
            agent.save(&model)?;
            if let Some((early, late)) = training.reward_trend() {
                println!("Avg reward, first quarter:  {early:.3}");
                println!("Avg reward, last quarter:   {late:.3}");
            }
            if let Some(path) = report {
                fs::write(&path, serde_json::to_string_pretty(&training)?)?;
                info!(path = %path.display(), "training report written");
            }
        }
        Command::Evaluate {
            strategy,
            model,
            output,
        } => {
            let mut sim = Simulation::new(config.clone());
            let (name, metrics) = match (strategy, model) {
                (Some(kind), _) => {
                    let mut policy = kind.build(config.seed);
                    let name = policy.name().to_string();
                    (name, sim.evaluate(policy.as_mut()))
                }
                (None, Some(path)) => {
                    let agent = DqnAgent::load(
                        &path,
                        config.state_space(),
                        config.action_space(),
                        config.learning.clone(),
                        config.seed,
                    )?;
                    let mut policy = AgentPolicy::new(&agent);
                    ("dqn".to_string(), sim.evaluate(&mut policy))
                }
                (None, None) => {
                    anyhow::bail!("pass either --strategy or --model");
                }
            };
            print!("{}", metrics.render(&name));
            if let Some(path) = output {
                fs::write(&path, serde_json::to_string_pretty(&metrics)?)?;
            }
        }
        Command::Compare { model, csv, output } => {
            let agent = match model {
                Some(path) => Some(DqnAgent::load(
                    &path,
                    config.state_space(),
                    config.action_space(),
                    config.learning.clone(),
                    config.seed,
                )?),
                None => None,
            };
            let mut sim = Simulation::new(config);
            let results = sim.compare(agent.as_ref());
            for (name, metrics) in &results {
                print!("{}", metrics.render(name));
            }
            if let Some(path) = csv {
                fs::write(&path, comparison_csv(&results))?;
                info!(path = %path.display(), "comparison CSV written");
            }
            if let Some(path) = output {
                let map: serde_json::Map<String, serde_json::Value> = results
                    .iter()
                    .map(|(name, metrics)| {
                        Ok::<_, serde_json::Error>((
                            name.clone(),
                            serde_json::to_value(metrics)?,
                        ))
                    })
                    .collect::<Result<_, _>>()?;
                fs::write(&path, serde_json::to_string_pretty(&map)?)?;
            }
        }
    }
    Ok(())
}

fn comparison_csv(results: &[(String, MetricsReport)]) -> String {
    let mut out = String::from(MetricsReport::csv_header());
    out.push('\n');
    for (name, metrics) in results {
        out.push_str(&metrics.csv_row(name));
        out.push('\n');
    }
    out
}

fn print_config(config: &SimConfig) {
    println!("Simulation configuration:");
    println!("  seed:           {}", config.seed);
    println!(
        "  devices:        {} @ {} MIPS",
        config.devices.count, config.devices.mips
    );
    println!(
        "  edge servers:   {} @ {}x{} MIPS, coverage {} m",
        config.edge.count, config.edge.pes, config.edge.mips, config.edge.coverage_radius_m
    );
    println!(
        "  arrivals:       {:?} at {}/s",
        config.tasks.arrival_pattern, config.tasks.arrival_rate
    );
    println!(
        "  mobility:       {:?} over {}x{} m",
        config.mobility.pattern, config.mobility.area_width_m, config.mobility.area_height_m
    );
    println!(
        "  horizon/quota:  {} s / {} tasks",
        config.run.horizon_s, config.run.tasks_per_episode
    );
}
