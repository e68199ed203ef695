use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tiergate::blueprint::{Blueprint, discover_blueprints, normalize_blueprint_path};
use tiergate::config::{self, Config, Environment};
use tiergate::dependency::DependencyChecker;
use tiergate::pipeline::{CancelToken, GenerationEvent, ValidationDrivenOrchestrator, spawn_generation};

/// Run a blueprint through dependency preflight, the four validation tiers and finalization.
#[derive(Parser, Debug)]
#[command(name = "tiergate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Print the dependency report as JSON and exit
    #[arg(long)]
    check: bool,

    /// Blueprint YAML (defaults to the configured or discovered blueprint)
    blueprint: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tiergate=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run() -> Result<ExitCode> {
    let args = Args::parse();

    let cwd = std::env::current_dir().context("failed to read the working directory")?;
    let cfg = config::load(&cwd)?;
    let path = resolve_blueprint_path(&cwd, &cfg, args.blueprint.as_deref())?;
    let blueprint = Blueprint::load(&path)?;
    let env = Environment::from_process();

    if args.check {
        let checker = DependencyChecker::from_config(&cfg.dependencies, env)
            .context("failed to set up dependency checks")?;
        let report = checker.report(&blueprint).await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    let orchestrator =
        ValidationDrivenOrchestrator::from_config(&cfg, env).context("cannot start generation")?;

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let events = spawn_generation(&orchestrator, blueprint, cancel);
    let result = tokio::task::spawn_blocking(move || {
        let mut completed = None;
        for event in events {
            match event {
                GenerationEvent::Completed(result) => completed = Some(*result),
                other => print_event(&other),
            }
        }
        completed
    })
    .await
    .context("event loop stopped unexpectedly")?;
    let Some(result) = result else {
        bail!("generation ended without a result");
    };

    let report_path = cwd.join(&cfg.report_path);
    let json = serde_json::to_string_pretty(&result)?;
    std::fs::write(&report_path, json)
        .with_context(|| format!("failed to write {}", report_path.display()))?;
    info!(path = %report_path.display(), "report written");

    if result.successful {
        if let Some(system) = &result.generated_system {
            eprintln!(
                "generated {} ({} files) in {}",
                system.name,
                system.files.len(),
                system.output_dir.display()
            );
        }
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!(
            "generation failed: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        );
        Ok(ExitCode::FAILURE)
    }
}

/// Blueprint to use: command line, then config, then auto-discovery.
fn resolve_blueprint_path(cwd: &Path, cfg: &Config, cli: Option<&Path>) -> Result<PathBuf> {
    if let Some(arg) = cli {
        return normalize_blueprint_path(cwd, &arg.to_string_lossy());
    }
    if let Some(configured) = &cfg.blueprint {
        return normalize_blueprint_path(cwd, configured)
            .with_context(|| format!("blueprint from {}", config::CONFIG_FILE));
    }
    let found = discover_blueprints(cwd, cfg.search_depth)?;
    match found.first() {
        Some(first) => Ok(cwd.join(first)),
        None => bail!(
            "no blueprint found under {} (searched {} levels)",
            cwd.display(),
            cfg.search_depth
        ),
    }
}

fn print_event(event: &GenerationEvent) {
    match event {
        GenerationEvent::PreflightStarted => eprintln!("==> checking dependencies"),
        GenerationEvent::PreflightFinished { available, missing } => {
            eprintln!("    {available} available, {missing} missing")
        }
        GenerationEvent::TierStarted(level) => eprintln!("==> {level}"),
        GenerationEvent::TierFinished { level, passed } => {
            let status = if *passed { "pass" } else { "fail" };
            eprintln!("    {level}: {status}");
        }
        GenerationEvent::HealingStarted { target, .. } => eprintln!("    healing {target}"),
        GenerationEvent::HealingFinished {
            target, successful, ..
        } => {
            let status = if *successful { "healed" } else { "not healed" };
            eprintln!("    {target}: {status}");
        }
        GenerationEvent::Finalizing => eprintln!("==> finalizing"),
        GenerationEvent::Completed(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_check_flag_and_positional_blueprint() {
        let parsed = Args::try_parse_from(["tiergate", "--check", "bp.yaml"]).unwrap();
        assert!(parsed.check);
        assert_eq!(parsed.blueprint.as_deref(), Some(Path::new("bp.yaml")));

        let bare = Args::try_parse_from(["tiergate"]).unwrap();
        assert!(!bare.check);
        assert!(bare.blueprint.is_none());
    }

    #[test]
    fn rejects_unknown_flags_and_extra_blueprints() {
        assert!(Args::try_parse_from(["tiergate", "--lenient"]).is_err());
        assert!(Args::try_parse_from(["tiergate", "a.yaml", "b.yaml"]).is_err());
    }

    #[test]
    fn resolves_configured_then_discovered_blueprint() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blueprint.yaml"), "name: x\ncomponents: []\n").unwrap();
        let found = resolve_blueprint_path(dir.path(), &Config::default(), None).unwrap();
        assert!(found.ends_with("blueprint.yaml"));

        let empty = tempfile::tempdir().unwrap();
        assert!(resolve_blueprint_path(empty.path(), &Config::default(), None).is_err());
    }
}
