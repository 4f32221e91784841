//! Thin `clap` façade over the core crates (spec §1: "CLI wrappers" are
//! explicitly out of scope as a product surface — this binary exists to
//! exercise the core from a terminal, not to replace a host integration).
//!
//! Every invocation wires a fresh in-memory `Store` and a deterministic
//! `EmbedClient`, so state does not persist across process runs; a real
//! deployment wires `memoria-store`'s `Store` trait to a live backend and
//! `memoria-graph`'s `EmbedClient` to a live embedding provider instead.

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use memoria_blob::{BlobStore, LocalFsBackend};
use memoria_config::MemoriaConfig;
use memoria_graph::embed::DeterministicEmbedClient;
use memoria_graph::schema::DecisionStatus;
use memoria_graph::{decision, project, thread};
use memoria_gravity::{gravity_recall, LensSelection};
use memoria_store::InMemoryStore;
use memoria_sync::{compile_project_documents, dispatch_sync, ObsidianVaultTarget, SyncTarget};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "memoria", version, about = "Semantic memory & knowledge-graph substrate")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Upsert a decision (spec §4.6).
    Decision {
        #[arg(long)]
        project: String,
        #[arg(long)]
        local_id: String,
        #[arg(long)]
        text: String,
        #[arg(long, default_value_t = false)]
        insert_new_conversation: bool,
        #[arg(long)]
        tier: Option<f32>,
        #[arg(long, default_value = "active")]
        status: String,
    },
    /// Upsert a thread (spec §4.7).
    Thread {
        #[arg(long)]
        project: String,
        #[arg(long)]
        local_id: String,
        #[arg(long)]
        title: String,
    },
    /// Attention-weighted recall over one project (spec §4.13).
    Recall {
        #[arg(long)]
        project: Uuid,
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = memoria_attention::DEFAULT_BUDGET)]
        budget: usize,
    },
    /// Multi-lens gravity recall across every role-assigned project (spec §4.14).
    Gravity {
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = 6000)]
        budget: usize,
    },
    /// Run an entanglement scan across every project (spec §4.12).
    Scan,
    /// Compile and push one project's registry state to a local Obsidian-style vault.
    Sync {
        #[arg(long)]
        project: Uuid,
        #[arg(long)]
        root: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = MemoriaConfig::load_from("memoria.toml")?;
    let store = InMemoryStore::new();
    let embed = DeterministicEmbedClient;
    let blob_backend = Arc::new(LocalFsBackend::new(config.blob.blob_local_path.as_str()));
    let blob = BlobStore::new(blob_backend, config.blob.blob_enabled);

    match Cli::parse().command {
        Commands::Decision {
            project: project_name,
            local_id,
            text,
            insert_new_conversation: _,
            tier,
            status,
        } => {
            let project_uuid = project::ensure_project(&store, &project_name).await?;
            let status = parse_decision_status(&status)?;
            let result = decision::upsert_decision(
                &store,
                &embed,
                None,
                &[],
                &[],
                Some(&blob),
                config.blob.inline_threshold_chars,
                decision::UpsertDecisionInput {
                    local_id: &local_id,
                    text: &text,
                    project_name: &project_name,
                    project_uuid,
                    originated_conversation: Uuid::new_v4(),
                    tier,
                    status,
                    dependencies: Vec::new(),
                    rationale: None,
                },
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&result.decision)?);
        }
        Commands::Thread {
            project: project_name,
            local_id,
            title,
        } => {
            let project_uuid = project::ensure_project(&store, &project_name).await?;
            let (_, thread) = thread::upsert_thread(
                &store,
                &embed,
                None,
                thread::UpsertThreadInput {
                    local_id: &local_id,
                    title: &title,
                    project_uuid,
                    first_seen_conversation: Uuid::new_v4(),
                    status: memoria_graph::schema::ThreadStatus::Open,
                    priority: memoria_graph::schema::ThreadPriority::Medium,
                    blocked_by: Vec::new(),
                },
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&thread)?);
        }
        Commands::Recall { project, query, budget } => {
            let result = memoria_attention::recall(&store, &embed, &query, Some(project), budget, memoria_attention::DEFAULT_MIN_SCORE).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Gravity { query, budget } => {
            let result = gravity_recall(&store, &embed, &query, LensSelection::Default, budget).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Scan => {
            let result =
                memoria_entanglement::run_scan(&store, Some(&blob), config.blob.inline_threshold_chars, &embed).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Sync { project, root } => {
            let documents = compile_project_documents(&store, project).await?;
            let targets: Vec<Box<dyn SyncTarget>> = vec![Box::new(ObsidianVaultTarget::new(root))];
            let courtesy_delay = std::time::Duration::from_secs(config.sync.courtesy_delay_secs);
            let report = dispatch_sync(&targets, &documents, courtesy_delay, &|| false).await;
            println!("{}", serde_json::to_string_pretty(&report.outcomes.iter().map(|o| o.target_name.clone()).collect::<Vec<_>>())?);
        }
    }

    Ok(())
}

fn parse_decision_status(raw: &str) -> Result<DecisionStatus> {
    match raw {
        "active" => Ok(DecisionStatus::Active),
        "superseded" => Ok(DecisionStatus::Superseded),
        "deprecated" => Ok(DecisionStatus::Deprecated),
        other => bail!("unknown decision status '{other}' (expected active, superseded, or deprecated)"),
    }
}
