//! curator CLI: feed perception batches into the knowledge graph.
//!
//! Usage:
//!   curator process <batch.json> [--oracle-cmd <program> [args...]]
//!   curator suggest <batch.json>
//!   curator merge-features <entity> <features.json>
//!   curator relations <add|list>
//!   curator triples
//!
//! Every command accepts `--db <path>` and `--config <file.yaml>`.

use clap::{Parser, Subcommand};
use graph_curator::{
    CommandOracle, CuratorConfig, CuratorEngine, FeatureMap, NoopOracle, OpenStore,
    PerceptionResult, RelationOracle, SqliteStore, TripleStore,
};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "curator",
    version,
    about = "Perception-driven knowledge graph curator"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to a YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a perception batch to the graph and print the update stats
    Process {
        /// JSON file holding a perception result
        file: PathBuf,
        /// External relation oracle command and its arguments
        #[arg(long, num_args = 1.., value_name = "PROGRAM")]
        oracle_cmd: Option<Vec<String>>,
    },
    /// Print update suggestions for a perception batch
    Suggest {
        /// JSON file holding a perception result
        file: PathBuf,
    },
    /// Merge a JSON feature object into an entity's stored features
    MergeFeatures {
        /// Entity name
        entity: String,
        /// JSON file holding a feature object
        file: PathBuf,
    },
    /// Manage the set of relation labels inference may use
    Relations {
        #[command(subcommand)]
        action: RelationAction,
    },
    /// List stored triples
    Triples,
}

#[derive(Subcommand)]
enum RelationAction {
    /// Add a valid relation label
    Add {
        /// Relation label
        label: String,
    },
    /// List valid relation labels
    List,
}

/// Get the default database path (~/.local/share/curator/curator.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("curator").join("curator.db")
}

fn open_store(db: Option<PathBuf>) -> Result<Arc<SqliteStore>, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    let store = SqliteStore::open(&db_path)
        .map_err(|e| format!("Failed to open database {}: {}", db_path.display(), e))?;
    Ok(Arc::new(store))
}

fn load_config(path: Option<&Path>) -> Result<CuratorConfig, String> {
    match path {
        Some(path) => CuratorConfig::load(path)
            .map_err(|e| format!("Failed to load config {}: {}", path.display(), e)),
        None => Ok(CuratorConfig::default()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read '{}': {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid JSON in '{}': {}", path.display(), e))
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_process(engine: &CuratorEngine, file: &Path) -> i32 {
    let batch: PerceptionResult = match read_json(file) {
        Ok(batch) => batch,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match engine.process_batch(&batch).await {
        Ok(stats) => print_json(&stats),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_suggest(engine: &CuratorEngine, file: &Path) -> i32 {
    match read_json::<PerceptionResult>(file) {
        Ok(batch) => print_json(&engine.suggestions(&batch.detected_entities)),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_merge_features(engine: &CuratorEngine, entity: &str, file: &Path) -> i32 {
    let features: FeatureMap = match read_json(file) {
        Ok(features) => features,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if engine.merge_entity_features(entity, &features).await {
        println!("Merged {} feature(s) into '{}'", features.len(), entity);
        0
    } else {
        eprintln!("Error: feature merge for '{}' failed, nothing was written", entity);
        1
    }
}

fn cmd_relations_add(store: &SqliteStore, label: &str) -> i32 {
    match store.add_valid_relation(label) {
        Ok(true) => {
            println!("Added relation '{}'", label);
            0
        }
        Ok(false) => {
            println!("Relation '{}' already exists", label);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_relations_list(store: &SqliteStore) -> i32 {
    match store.valid_relations() {
        Ok(labels) if labels.is_empty() => {
            println!("No relations defined.");
            0
        }
        Ok(labels) => {
            for label in labels {
                println!("{}", label);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_triples(store: &SqliteStore) -> i32 {
    match store.triples() {
        Ok(triples) if triples.is_empty() => {
            println!("No triples stored.");
            0
        }
        Ok(triples) => {
            for triple in triples {
                println!("{}", triple);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn build_oracle(oracle_cmd: Option<Vec<String>>) -> Arc<dyn RelationOracle> {
    match oracle_cmd {
        Some(mut parts) if !parts.is_empty() => {
            let program = parts.remove(0);
            Arc::new(CommandOracle::new(program).with_args(parts))
        }
        _ => Arc::new(NoopOracle),
    }
}

fn open_engine(
    store: Arc<SqliteStore>,
    config: Option<&Path>,
    oracle: Arc<dyn RelationOracle>,
) -> Result<CuratorEngine, String> {
    let config = load_config(config)?;
    CuratorEngine::new(config, store, oracle).map_err(|e| e.to_string())
}

async fn run(cli: Cli) -> i32 {
    let store = match open_store(cli.db) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let oracle: Arc<dyn RelationOracle> = match &cli.command {
        Commands::Process { oracle_cmd, .. } => build_oracle(oracle_cmd.clone()),
        _ => Arc::new(NoopOracle),
    };

    match cli.command {
        Commands::Relations { action } => match action {
            RelationAction::Add { label } => cmd_relations_add(&store, &label),
            RelationAction::List => cmd_relations_list(&store),
        },
        Commands::Triples => cmd_triples(&store),
        command => {
            let engine = match open_engine(store, cli.config.as_deref(), oracle) {
                Ok(engine) => engine,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return 1;
                }
            };
            match command {
                Commands::Process { file, .. } => cmd_process(&engine, &file).await,
                Commands::Suggest { file } => cmd_suggest(&engine, &file),
                Commands::MergeFeatures { entity, file } => {
                    cmd_merge_features(&engine, &entity, &file).await
                }
                Commands::Relations { .. } | Commands::Triples => 0,
            }
        }
    }
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so JSON output on stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = run(cli).await;
    std::process::exit(code);
}
