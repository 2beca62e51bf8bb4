//! CLI entry point for the tessera-snapshot engine.
//!
//! Reads a JSON request from stdin (or builds one from flags), writes the
//! JSON snapshot to stdout. Logs go to stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use tessera_core::{EntityId, TesseraConfig};
use tessera_graph::{GraphClient, GraphFixture, GraphStore, MemoryStore};
use tessera_snapshot::{SnapshotEngine, SnapshotRequest};

#[derive(Parser)]
#[command(name = "tessera-snapshot")]
#[command(about = "Bounded snapshot views of the Tessera property graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: tessera).
    #[arg(short, long, default_value = "tessera", global = true)]
    config: String,

    /// Serve from a JSON graph fixture instead of Neo4j.
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Build a snapshot from a JSON request read from stdin.
    Snapshot,
    /// Build a neighborhood snapshot around one entity.
    Neighborhood {
        /// Root entity ID.
        #[arg(long)]
        root: EntityId,
        /// Number of hops to expand.
        #[arg(long, default_value_t = 1)]
        depth: u32,
        /// Only follow relationships of this type.
        #[arg(long)]
        relationship_type: Option<String>,
        /// Leave metadata out of nodes and edges.
        #[arg(long)]
        no_metadata: bool,
        #[arg(long)]
        limit_nodes: Option<usize>,
        #[arg(long)]
        limit_edges: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = TesseraConfig::load(&cli.config)?;
    let request = build_request(&cli.command)?;
    let allow_self = config.graph.allow_self_relationships;

    match &cli.fixture {
        Some(path) => {
            let fixture = GraphFixture::from_path(path)?;
            let store = MemoryStore::from_fixture(fixture, allow_self).await?;
            run(store, config, request).await
        }
        None => {
            let client = GraphClient::connect(&config.neo4j)
                .await?
                .with_self_relationships(allow_self);
            run(client, config, request).await
        }
    }
}

fn build_request(command: &Command) -> anyhow::Result<SnapshotRequest> {
    match command {
        Command::Snapshot => {
            let input = std::io::read_to_string(std::io::stdin())?;
            Ok(serde_json::from_str(&input)?)
        }
        Command::Neighborhood {
            root,
            depth,
            relationship_type,
            no_metadata,
            limit_nodes,
            limit_edges,
        } => Ok(SnapshotRequest {
            relationship_type: relationship_type.clone(),
            include_metadata: !no_metadata,
            limit_nodes: *limit_nodes,
            limit_edges: *limit_edges,
            ..SnapshotRequest::neighborhood(*root, *depth)
        }),
    }
}

async fn run<S: GraphStore>(
    store: S,
    config: TesseraConfig,
    request: SnapshotRequest,
) -> anyhow::Result<()> {
    let engine = SnapshotEngine::new(store, config.graph);
    let snapshot = engine.snapshot(request).await?;
    println!("{}", serde_json::to_string(&snapshot)?);
    Ok(())
}
