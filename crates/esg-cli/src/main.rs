//! Exploded supergraph CLI.
//!
//! Provides the `esg` binary for working with a supergraph database offline:
//! `import` writes an analysis bundle, `list` shows stored graphs, and `show`
//! prints the reconstructed subgraph of one method.
//!
//! Uses the same `esg_storage::reconstruct` functions as the HTTP server, so
//! `show` prints exactly what the viewer would receive.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use esg_core::{BaseMethodGraph, GraphId, MethodId, NodeKind};
use esg_storage::{reconstruct, AnalysisBundle, RecordStore, SqliteStore, StorageError};

/// Exploded supergraph tools.
#[derive(Parser)]
#[command(name = "esg", about = "Exploded supergraph storage and inspection tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Import an analysis bundle (JSON) as a new graph.
    Import {
        /// Path to the database file.
        #[arg(short, long)]
        db: String,

        /// Path to the bundle JSON file.
        #[arg(short, long)]
        bundle: PathBuf,

        /// Override the graph name stored in the bundle.
        #[arg(short, long)]
        name: Option<String>,
    },
    /// List stored graphs.
    List {
        /// Path to the database file.
        #[arg(short, long)]
        db: String,
    },
    /// Print the reconstructed subgraph of one method.
    Show {
        /// Path to the database file.
        #[arg(short, long)]
        db: String,

        /// Graph ID.
        #[arg(short, long)]
        graph: String,

        /// Method ID (default: the `main` method).
        #[arg(short, long)]
        method: Option<i64>,

        /// Mark callee placeholders as expanded.
        #[arg(long)]
        all_callees: bool,

        /// Print the raw JSON payload instead of an outline.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Import { db, bundle, name } => run_import(&db, &bundle, name),
        Commands::List { db } => run_list(&db),
        Commands::Show {
            db,
            graph,
            method,
            all_callees,
            json,
        } => run_show(&db, GraphId(graph), method.map(MethodId), all_callees, json),
    };
    process::exit(exit_code);
}

/// Exit code for a storage failure: 2 for missing or corrupt records,
/// 3 for everything else (I/O, SQLite).
fn storage_exit_code(err: &StorageError) -> i32 {
    match err {
        e if e.is_not_found() => 2,
        StorageError::DataCorruption { .. } | StorageError::InvalidBundle { .. } => 2,
        _ => 3,
    }
}

fn open_store(db_path: &str) -> Result<SqliteStore, i32> {
    SqliteStore::new(db_path).map_err(|e| {
        eprintln!("Error: failed to open database '{}': {}", db_path, e);
        3
    })
}

/// Execute the import subcommand.
///
/// Returns exit code: 0 = success, 1 = unreadable bundle,
/// 2 = invalid bundle, 3 = I/O error.
fn run_import(db_path: &str, bundle_path: &Path, name: Option<String>) -> i32 {
    let raw = match std::fs::read_to_string(bundle_path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error: failed to read '{}': {}", bundle_path.display(), e);
            return 1;
        }
    };
    let mut bundle: AnalysisBundle = match serde_json::from_str(&raw) {
        Ok(bundle) => bundle,
        Err(e) => {
            eprintln!("Error: '{}' is not a valid bundle: {}", bundle_path.display(), e);
            return 1;
        }
    };
    if let Some(name) = name {
        bundle.name = name;
    }

    let mut store = match open_store(db_path) {
        Ok(store) => store,
        Err(code) => return code,
    };
    match store.insert_bundle(&bundle) {
        Ok(id) => {
            println!("{}", id);
            eprintln!(
                "Imported '{}': {} methods, {} statements, {} facts",
                bundle.name,
                bundle.methods.len(),
                bundle.statements.len(),
                bundle.facts.len()
            );
            0
        }
        Err(e) => {
            eprintln!("Error: import failed: {}", e);
            storage_exit_code(&e)
        }
    }
}

/// Execute the list subcommand.
fn run_list(db_path: &str) -> i32 {
    let store = match open_store(db_path) {
        Ok(store) => store,
        Err(code) => return code,
    };
    match store.list_graphs() {
        Ok(graphs) => {
            for graph in graphs {
                println!("{}\t{}\t{} methods", graph.id, graph.name, graph.method_count);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            storage_exit_code(&e)
        }
    }
}

/// Execute the show subcommand.
///
/// Returns exit code: 0 = success, 2 = not found or corrupt records,
/// 3 = I/O error.
fn run_show(
    db_path: &str,
    graph: GraphId,
    method: Option<MethodId>,
    all_callees: bool,
    json: bool,
) -> i32 {
    let store = match open_store(db_path) {
        Ok(store) => store,
        Err(code) => return code,
    };
    let base = match reconstruct::base_method(&store, &graph, method, all_callees) {
        Ok(base) => base,
        Err(e) => {
            eprintln!("Error: {}", e);
            return storage_exit_code(&e);
        }
    };

    if json {
        match serde_json::to_string_pretty(&base) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: failed to serialize: {}", e);
                return 3;
            }
        }
    } else {
        print!("{}", outline(&base));
    }
    0
}

/// Indented tree of the subgraph followed by its edges.
///
/// Statement rows and data-flow compounds are not printed; their children
/// are indented one level below the nearest printed ancestor.
fn outline(base: &BaseMethodGraph) -> String {
    let mut depth: HashMap<&str, usize> = HashMap::new();
    let mut out = format!("method {}\n", base.method_name);
    for node in &base.nodes {
        let parent_level = node
            .parent
            .as_ref()
            .and_then(|p| depth.get(p.as_str()))
            .copied();
        let label = match &node.kind {
            NodeKind::GraphWrapper => format!("graph {}", node.id),
            NodeKind::Method { visibility, .. } => {
                format!("method {} [{:?}]", node.name, visibility)
            }
            NodeKind::Statement { statement_id, .. } => {
                format!("{}: {}", statement_id, node.name)
            }
            NodeKind::DataflowFact { .. } => format!("fact {}", node.name),
            NodeKind::StatementRow | NodeKind::DataflowCompound { .. } => {
                if let Some(level) = parent_level {
                    depth.insert(node.id.as_str(), level);
                }
                continue;
            }
        };
        let level = parent_level.map_or(0, |d| d + 1);
        depth.insert(node.id.as_str(), level);
        out.push_str(&format!("{}{}\n", "  ".repeat(level), label));
    }
    for edge in &base.edges {
        out.push_str(&format!("edge {} -> {}\n", edge.source, edge.target));
    }
    out
}
