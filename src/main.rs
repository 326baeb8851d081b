mod agents;
mod config;
mod exec;
mod memory;
mod permission;
mod pipeline;
mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use tracing_subscriber::EnvFilter;

use config::EngineConfig;
use permission::{AllowAll, DenyAll, PermissionGate};
use pipeline::engine::{Orchestrator, RequestCtx, RunOutcome};
use types::{PipelineEvent, PipelineObserver};

/// Prints pipeline progress to the terminal. Purely a sink: the engine
/// behaves identically without it.
struct CliRenderer;

impl PipelineObserver for CliRenderer {
    fn on_event(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::StageCompleted { stage, detail } => {
                eprintln!("  {} {}", format!("[{stage}]").grey(), detail.as_str().grey());
            }
            PipelineEvent::WaveStarted {
                wave,
                total_waves,
                tasks,
            } => {
                eprintln!(
                    "  {}",
                    format!("wave {}/{total_waves}: dispatching {tasks} task(s)", wave + 1)
                        .dark_yellow()
                );
            }
            PipelineEvent::TaskSettled {
                task_id,
                status,
                duration_ms,
                ..
            } => {
                let line = format!("    {} {} ({duration_ms} ms)", status.as_str(), task_id);
                match status {
                    types::TaskStatus::Failed => eprintln!("{}", line.red()),
                    types::TaskStatus::Skipped => eprintln!("{}", line.grey()),
                    _ => eprintln!("{}", line.green()),
                }
            }
            PipelineEvent::WaveCompleted { .. } => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // Create ~/.hivebot/.env from template if it doesn't exist yet.
    ensure_dot_env();
    let _ = dotenvy::from_path(config::hivebot_home_dir().join(".env"));

    let (cli_prompt, cli_yes) = parse_cli_args();
    let request = cli_prompt
        .or_else(|| std::env::var("HIVEBOT_TASK").ok())
        .context("no request given; use -p/--prompt \"<request>\"")?;

    let engine_config = EngineConfig::load();
    let mut orchestrator = Orchestrator::new(&engine_config);
    if let Err(e) = orchestrator.memory_mut().load() {
        tracing::warn!("memory snapshot not loaded: {e:#}");
    }

    // -y / --yes 放行所有受控动作；默认一律拒绝（无人值守场景下的保守缺省）
    let gate: Arc<dyn PermissionGate> = if cli_yes {
        Arc::new(AllowAll)
    } else {
        Arc::new(DenyAll)
    };
    let ctx = RequestCtx {
        session: "cli".to_string(),
        gate,
        observer: Some(Arc::new(CliRenderer)),
    };

    let outcome = orchestrator.execute(&request, &ctx).await;
    match &outcome {
        RunOutcome::Success {
            output, metrics, ..
        } => {
            println!("{output}");
            eprintln!(
                "{}",
                format!(
                    "  done in {} ms — {} agent(s), {} completed, {} failed",
                    metrics.duration_ms,
                    metrics.agents_used,
                    metrics.tasks_completed,
                    metrics.tasks_failed
                )
                .grey()
            );
        }
        RunOutcome::Failure { error, .. } => {
            eprintln!("{} {error}", "error:".red());
        }
    }

    if let Err(e) = orchestrator.memory().save() {
        tracing::warn!("memory snapshot not saved: {e:#}");
    }

    match outcome {
        RunOutcome::Success { .. } => Ok(()),
        RunOutcome::Failure { error, .. } => Err(error.into()),
    }
}

/// Parse CLI arguments, returning (prompt, auto_accept).
/// Supported flags:
///   -p / --prompt <text>   Request to run.
///   -y / --yes             Approve all gated side-effect actions.
fn parse_cli_args() -> (Option<String>, bool) {
    let args: Vec<String> = std::env::args().collect();
    let mut prompt = None;
    let mut yes = false;
    let mut i = 1;
    while i < args.len() {
        if (args[i] == "-p" || args[i] == "--prompt") && i + 1 < args.len() {
            prompt = Some(args[i + 1].clone());
            i += 2;
        } else if args[i] == "-y" || args[i] == "--yes" {
            yes = true;
            i += 1;
        } else {
            i += 1;
        }
    }
    (prompt, yes)
}

/// If `~/.hivebot/.env` doesn't exist, create it from the bundled template.
fn ensure_dot_env() {
    let home = config::hivebot_home_dir();
    let env_path = home.join(".env");
    if env_path.exists() {
        return;
    }
    let _ = std::fs::create_dir_all(&home);
    let _ = std::fs::write(&env_path, include_str!("../.env.example"));
}
