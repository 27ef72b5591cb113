//! Command-line probe for audio nodes.
//!
//! Connects every node listed in a TOML config and runs one command
//! against them: health and stats, a search, a track decode, or a short
//! dry run of queue ordering over search results.
//!
//! Usage:
//!   tl-probe --config tunelink.toml nodes
//!   tl-probe search "never gonna give you up" --source soundcloud
//!   tl-probe decode QAAAjQIAJVJpY2sg...
//!
//! Env vars:
//!   RUST_LOG          tracing filter (default: "info")
//!   TUNELINK_CONFIG   config path when `--config` is not given

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tl_client::{
    ClientConfig, LoadResult, NodeAlgorithm, NodePool, NoopVoiceGateway, SearchOptions,
    SearchType, Track,
};
use tl_queue::{LoopMode, Queue};
use tracing_subscriber::EnvFilter;

/// tunelink probe: inspect and exercise audio nodes.
#[derive(Debug, Parser)]
#[command(name = "tl-probe", version, about)]
struct Cli {
    /// Path to the client config.
    #[arg(long, env = "TUNELINK_CONFIG", default_value = "tunelink.toml")]
    config: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse the config file and report any errors.
    Validate,
    /// Connect every node and print version, session, latency and stats.
    Nodes,
    /// Search on the best node.
    Search {
        query: String,
        #[arg(long, value_enum, default_value_t = Source::Youtube)]
        source: Source,
        /// Restrict to one node.
        #[arg(long)]
        node: Option<String>,
    },
    /// Decode a base64 track.
    Decode { encoded: String },
    /// Search, queue the results, and print the play order.
    Queue {
        query: String,
        #[arg(long)]
        shuffle: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Source {
    Youtube,
    YoutubeMusic,
    Soundcloud,
}

impl From<Source> for SearchType {
    fn from(s: Source) -> Self {
        match s {
            Source::Youtube => SearchType::YouTube,
            Source::YoutubeMusic => SearchType::YouTubeMusic,
            Source::Soundcloud => SearchType::SoundCloud,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config))?;

    if let Command::Validate = cli.command {
        println!("{}: {} node(s), config OK", cli.config, config.nodes.len());
        return Ok(());
    }

    let pool = NodePool::new(config, Arc::new(NoopVoiceGateway))?;
    let nodes = pool
        .connect_configured()
        .await
        .context("connecting configured nodes")?;
    tracing::info!(count = nodes.len(), "nodes connected");

    let result = run(&pool, cli.command).await;
    pool.disconnect_all().await;
    result
}

async fn run(pool: &NodePool, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Validate => Ok(()),
        Command::Nodes => {
            for node in pool.nodes() {
                let latency = node.latency().await;
                let stats = node.rest().stats().await.ok();
                println!(
                    "{:<16} v{:<8} session={:<20} latency={:<8} players={}",
                    node.identifier(),
                    node.version().map(|v| v.to_string()).unwrap_or_default(),
                    node.session_id().unwrap_or_default(),
                    latency
                        .map(|d| format!("{}ms", d.as_millis()))
                        .unwrap_or_else(|| "-".into()),
                    stats.map(|s| s.players).unwrap_or_default(),
                );
            }
            Ok(())
        }
        Command::Search {
            query,
            source,
            node,
        } => {
            let node = match node {
                Some(id) => pool.get_node(Some(&id))?,
                None => pool.get_best_node(NodeAlgorithm::ByPing).await?,
            };
            let opts = SearchOptions {
                search_type: source.into(),
                ..Default::default()
            };
            let result = node.rest().search(&query, &opts).await?;
            print_result(&result);
            Ok(())
        }
        Command::Decode { encoded } => {
            let node = pool.get_node(None)?;
            let track = node.rest().decode_track(&encoded).await?;
            println!("{}", serde_json::to_string_pretty(&track)?);
            Ok(())
        }
        Command::Queue { query, shuffle } => {
            let node = pool.get_best_node(NodeAlgorithm::ByPlayers).await?;
            let result = node.rest().search(&query, &SearchOptions::default()).await?;

            let mut queue = Queue::default();
            queue.extend_tracks(result.tracks().iter().cloned(), false)?;
            queue.set_loop_mode(LoopMode::Off);
            if shuffle {
                queue.shuffle();
            }
            let mut position = 1;
            while let Some(track) = queue.get()? {
                println!("{position:>3}. {}", describe(&track));
                position += 1;
            }
            Ok(())
        }
    }
}

fn print_result(result: &LoadResult) {
    match result {
        LoadResult::Empty => println!("no matches"),
        LoadResult::Playlist(p) => {
            println!("playlist: {} ({} tracks)", p.name(), p.tracks.len());
            for t in &p.tracks {
                println!("  {}", describe(t));
            }
        }
        other => {
            for t in other.tracks() {
                println!("{}", describe(t));
            }
        }
    }
}

fn describe(t: &Track) -> String {
    let length = Duration::from_millis(t.length());
    format!(
        "{} - {} [{}:{:02}]",
        t.info.author,
        t.title(),
        length.as_secs() / 60,
        length.as_secs() % 60
    )
}
