use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "hcp-sched",
    about = "HCP scheduler: rank candidate clusters for a pod",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a pod against a cluster snapshot and print the ranking.
    ///
    /// Without --priority every priority enabled in the config is used.
    /// With --replicas the replica placements are printed as well.
    Score {
        /// Scheduler policy (TOML). Defaults apply when omitted.
        #[arg(short, long)]
        config: Option<String>,
        /// Cluster snapshot: a JSON array of {cluster, nodes[{node, pods}]}
        #[arg(short, long)]
        snapshot: String,
        /// Pod descriptor (JSON)
        #[arg(short, long)]
        pod: String,
        /// Score with this single priority function
        #[arg(long)]
        priority: Option<String>,
        /// Number of replicas to place
        #[arg(short, long)]
        replicas: Option<u32>,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hcp_scheduler=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Score {
            config,
            snapshot,
            pod,
            priority,
            replicas,
            format,
        } => commands::score::score(&commands::score::ScoreArgs {
            config: config.as_deref(),
            snapshot: &snapshot,
            pod: &pod,
            priority: priority.as_deref(),
            replicas,
            format: &format,
        }),
    }
}
