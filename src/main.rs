use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "maestro")]
#[command(version, about = "Plan orchestrator - schedule parallel phases through a dependency DAG")]
pub struct Cli {
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Path to the plan file. Required only when more than one plan is initialized.
    #[arg(long, global = true)]
    pub plan: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a plan document and initialize (or reconcile) the status store
    Parse {
        /// Path to the plan markdown file
        plan_file: PathBuf,

        /// Base point the phase branches start from
        #[arg(long, default_value = "main")]
        base: String,
    },
    /// List phases ready to dispatch and groups ready to integrate
    Next,
    /// Check whether a group has passed the integration gate
    CheckGroup { group: String },
    /// Record a status transition for a phase
    Update {
        id: String,
        status: String,

        /// Review identifier to attach (PR number, review URL, ...)
        #[arg(long)]
        review_ref: Option<String>,
    },
    /// Apply the outcome of an external merge + verification run for a group
    Integrate {
        group: String,

        /// merged, build-failed, or conflict
        #[arg(long)]
        outcome: String,

        /// What failed (required with --outcome build-failed)
        #[arg(long)]
        reason: Option<String>,
    },
    /// Inject a synthetic fix phase depending on a whole group
    AddPhase {
        #[arg(long)]
        group: String,

        #[arg(long)]
        reason: String,
    },
    /// Force a phase to ESCALATED for human attention
    Escalate { id: String },
    /// Show the full phase table
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let plan = cli.plan.as_deref();

    match &cli.command {
        Commands::Parse { plan_file, base } => {
            cmd::cmd_parse(&project_dir, plan_file, base)?;
        }
        Commands::Next => cmd::cmd_next(&project_dir, plan)?,
        Commands::CheckGroup { group } => cmd::cmd_check_group(&project_dir, plan, group)?,
        Commands::Update {
            id,
            status,
            review_ref,
        } => {
            cmd::cmd_update(&project_dir, plan, id, status, review_ref.as_deref())?;
        }
        Commands::Integrate {
            group,
            outcome,
            reason,
        } => {
            cmd::cmd_integrate(&project_dir, plan, group, outcome, reason.as_deref())?;
        }
        Commands::AddPhase { group, reason } => {
            cmd::cmd_add_phase(&project_dir, plan, group, reason)?;
        }
        Commands::Escalate { id } => cmd::cmd_escalate(&project_dir, plan, id)?,
        Commands::Status => cmd::cmd_status(&project_dir, plan)?,
    }

    Ok(())
}
