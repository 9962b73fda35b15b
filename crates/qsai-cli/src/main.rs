//! QSAI - Hybrid Decision Engine CLI
//!
//! The `qsai` command runs decision cycles and inspects the audit chain.
//!
//! ## Commands
//!
//! - `decide`: Run one decision cycle for a context snapshot
//! - `audit verify`: Recompute and check the hash chain
//! - `audit show`: Print audit entries

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

use qsai_core::{
    spawn_feedback_sink, Agent, AgentError, AgentKind, AgentProposal, AgentRegistry, AuditSink,
    ContextVector, ControllerConfig, DecisionEngine, MemoryOutcomeStore, MetaController,
    SafetyPolicy, SurrealAuditSink,
};

#[derive(Parser)]
#[command(name = "qsai")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "QSAI hybrid decision engine", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one decision cycle for a context snapshot
    Decide {
        /// Path to the context snapshot (JSON ContextVector)
        #[arg(short, long)]
        context: PathBuf,

        /// Path to the safety policy (JSON); permissive when omitted
        #[arg(short, long)]
        policy: Option<PathBuf>,
    },

    /// Inspect the audit chain
    #[command(subcommand)]
    Audit(AuditCommands),
}

#[derive(Subcommand)]
enum AuditCommands {
    /// Recompute content hashes and chain links over a range
    Verify {
        /// First sequence number (default: 1)
        #[arg(long, default_value_t = 1)]
        from: u64,

        /// Last sequence number (default: chain head)
        #[arg(long)]
        to: Option<u64>,
    },

    /// Print audit entries
    Show {
        /// Show a single entry by sequence number
        #[arg(long, conflicts_with = "latest")]
        seq: Option<u64>,

        /// Show the latest N entries
        #[arg(long, default_value_t = 5)]
        latest: u64,
    },
}

// ---------------------------------------------------------------------
// Demo agents
// ---------------------------------------------------------------------

/// Proposes an offer scaled by the subject's engagement score.
struct DemoOfferAgent;

#[async_trait]
impl Agent for DemoOfferAgent {
    fn id(&self) -> &str {
        "demo-offer"
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Offer
    }

    async fn propose(&self, context: &ContextVector) -> Result<Vec<AgentProposal>, AgentError> {
        let engagement = context.numeric_signal("engagement.score").unwrap_or(0.5);
        Ok(vec![
            AgentProposal::new(self.id(), "offer-standard", 2.0 + engagement, 0.7, 0.5)
                .with_slot("offer"),
            AgentProposal::new(self.id(), "offer-premium", 4.0 * engagement, 0.6, 1.5)
                .with_slot("offer"),
        ])
    }
}

/// Proposes a contact channel unless the subject has opted out.
struct DemoChannelAgent;

#[async_trait]
impl Agent for DemoChannelAgent {
    fn id(&self) -> &str {
        "demo-channel"
    }

    fn kind(&self) -> AgentKind {
        AgentKind::Channel
    }

    async fn propose(&self, context: &ContextVector) -> Result<Vec<AgentProposal>, AgentError> {
        if context.has_flag("channel-optout") {
            return Ok(Vec::new());
        }
        Ok(vec![
            AgentProposal::new(self.id(), "channel-email", 1.0, 0.8, 0.1).with_slot("channel"),
        ])
    }
}

// ---------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    qsai_core::init_tracing(cli.json, level);

    let sink = Arc::new(SurrealAuditSink::from_env().await?);

    match cli.command {
        Commands::Decide { context, policy } => cmd_decide(sink, &context, policy.as_deref()).await,
        Commands::Audit(AuditCommands::Verify { from, to }) => cmd_verify(sink, from, to).await,
        Commands::Audit(AuditCommands::Show { seq, latest }) => cmd_show(sink, seq, latest).await,
    }
}

async fn cmd_decide(
    sink: Arc<SurrealAuditSink>,
    context_path: &std::path::Path,
    policy_path: Option<&std::path::Path>,
) -> Result<()> {
    let raw = std::fs::read_to_string(context_path)
        .with_context(|| format!("reading context from {}", context_path.display()))?;
    let context: ContextVector = serde_json::from_str(&raw).context("parsing context JSON")?;

    let policy = match policy_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading policy from {}", path.display()))?;
            serde_json::from_str(&raw).context("parsing policy JSON")?
        }
        None => SafetyPolicy::permissive("permissive"),
    };

    let mut registry = AgentRegistry::new();
    registry.register(Arc::new(DemoOfferAgent))?;
    registry.register(Arc::new(DemoChannelAgent))?;

    let (feedback, _task) = spawn_feedback_sink(Arc::new(MemoryOutcomeStore::new()));
    let engine = DecisionEngine::new(
        registry,
        policy,
        MetaController::new(ControllerConfig::default()),
        sink,
        feedback,
    );

    let decision = engine.decide(context).await?;
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

async fn cmd_verify(sink: Arc<SurrealAuditSink>, from: u64, to: Option<u64>) -> Result<()> {
    let Some(head) = sink.latest_seq().await? else {
        info!("audit chain is empty, nothing to verify");
        return Ok(());
    };
    let to = to.unwrap_or(head);

    sink.verify_chain(from, to).await?;
    info!(from = from, to = to, "audit chain verified");
    println!("ok: entries {from}..={to} verified");
    Ok(())
}

async fn cmd_show(sink: Arc<SurrealAuditSink>, seq: Option<u64>, latest: u64) -> Result<()> {
    let entries = match seq {
        Some(seq) => vec![sink.entry(seq).await?],
        None => {
            let Some(head) = sink.latest_seq().await? else {
                info!("audit chain is empty");
                return Ok(());
            };
            let from = head.saturating_sub(latest.saturating_sub(1)).max(1);
            sink.entries(from, head).await?
        }
    };

    for entry in entries {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    }
    Ok(())
}
