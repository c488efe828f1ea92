//! SessionPilot - developer-session pipeline
//!
//! CLI entry point: session start/end, directives, handoff and corpus tools.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info};

use sessionpilot::approval::TerminalApprover;
use sessionpilot::cli::{Cli, Command, CorpusCommand, SessionCommand, get_log_path};
use sessionpilot::config::Config;
use sessionpilot::corpus::{CorpusBuilder, Status, short_hash, validate};
use sessionpilot::domain::SessionPlan;
use sessionpilot::escalation::{EscalationGate, EscalationOutcome};
use sessionpilot::extract::decode;
use sessionpilot::llm::Capability;
use sessionpilot::stages::{Analyst, DirectiveWriter, Journalist, PipelineContext, Planner, StageRun};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level).map(str::to_uppercase).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref(), &cli.root);

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref(), &cli.root).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let root = cli.root.clone();
    info!(root = %root.display(), "SessionPilot starting");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Session { command } => match command {
            SessionCommand::Start { export_plan, directive } => {
                cmd_session_start(root, config, export_plan.as_deref(), directive).await
            }
            SessionCommand::End => cmd_session_end(root, config).await,
        },
        Command::Directive { plan } => cmd_directive(root, config, &plan).await,
        Command::Handoff => cmd_handoff(&root, &config),
        Command::Corpus { command } => match command {
            CorpusCommand::Validate => cmd_corpus_validate(&root, &config),
            CorpusCommand::Hash => cmd_corpus_hash(&root, &config),
        },
        Command::Models => cmd_models(root, config).await,
        Command::Escalate { task, reason, prompt } => cmd_escalate(&root, config, &task, &reason, &prompt).await,
    }
}

async fn connect(root: PathBuf, config: Config) -> Result<Arc<PipelineContext>> {
    let ctx = PipelineContext::connect(root, config)
        .await
        .context("Failed to set up the model connection")?;
    match &ctx.resolution.capability {
        Capability::Available => println!("{} {}", "Model:".bold(), ctx.resolution.model.green()),
        Capability::Unavailable(reason) => println!(
            "{} {} {}",
            "Model:".bold(),
            ctx.resolution.model.yellow(),
            format!("(unavailable: {}; stages will use fallbacks)", reason).dimmed()
        ),
    }
    Ok(Arc::new(ctx))
}

/// Print a stage header, the degraded notice if any, then the artifact
fn print_stage<T>(stage: &str, run: &StageRun<T>, body: &str) {
    println!("\n{}", format!("== {} ==", stage.to_uppercase()).cyan().bold());
    if let Some(reason) = run.reason() {
        println!("{} {}", "Degraded:".yellow().bold(), reason.yellow());
    }
    println!("{}", body);
    if let Some(path) = run.saved() {
        println!("{} {}", "Saved:".dimmed(), path.display().to_string().dimmed());
    }
}

async fn cmd_session_start(
    root: PathBuf,
    config: Config,
    export_plan: Option<&Path>,
    with_directive: bool,
) -> Result<()> {
    debug!(?export_plan, %with_directive, "cmd_session_start: called");
    let ctx = connect(root, config).await?;

    let report = Analyst::new(ctx.clone()).run().await;
    print_stage("analyst", &report, &report.artifact().to_markdown());

    let plan = Planner::new(ctx.clone()).run(report.artifact()).await;
    print_stage("planner", &plan, &plan.artifact().to_markdown());

    if let Some(path) = export_plan {
        let json = serde_json::to_string_pretty(plan.artifact()).context("Failed to serialise session plan")?;
        fs::write(path, json).context(format!("Failed to write {}", path.display()))?;
        println!("{} {}", "Plan exported:".green(), path.display());
    }

    if with_directive {
        let directive = DirectiveWriter::new(ctx.clone()).run(plan.artifact()).await;
        print_stage("directive", &directive, &directive.artifact().to_markdown());
    }
    Ok(())
}

async fn cmd_session_end(root: PathBuf, config: Config) -> Result<()> {
    debug!("cmd_session_end: called");
    let ctx = connect(root, config).await?;
    let journalist = Journalist::new(ctx.clone());

    let draft = journalist.draft().await;
    print_stage("journalist", &draft, &draft.artifact().to_markdown());

    match draft.into_artifact().approve(&TerminalApprover::new()) {
        Ok(approved) => {
            let summary = journalist.write(&approved).context("Failed to write journal entry")?;
            println!(
                "{} {} written; {} task(s) marked DONE",
                "Journal:".green().bold(),
                summary.session_id,
                summary.tasks_marked_done.len()
            );
        }
        Err(draft) => {
            println!(
                "{} {} was not written. The draft is kept in the session logs.",
                "Journal:".yellow().bold(),
                draft.session_id
            );
        }
    }
    Ok(())
}

async fn cmd_directive(root: PathBuf, config: Config, plan_path: &Path) -> Result<()> {
    debug!(?plan_path, "cmd_directive: called");
    let raw = fs::read_to_string(plan_path).context(format!("Failed to read {}", plan_path.display()))?;
    let plan: SessionPlan = decode(&raw).context(format!("{} is not a valid session plan", plan_path.display()))?;

    let ctx = connect(root, config).await?;
    let directive = DirectiveWriter::new(ctx.clone()).run(&plan).await;
    print_stage("directive", &directive, &directive.artifact().to_markdown());
    Ok(())
}

fn cmd_handoff(root: &Path, config: &Config) -> Result<()> {
    debug!(?root, "cmd_handoff: called");
    let corpus = CorpusBuilder::new(root, &config.paths).build();

    println!("{}", "== HANDOFF ==".cyan().bold());
    match corpus.latest_journal() {
        Some(entry) => {
            let floor = entry.test_floor.map(|f| format!(" (test floor {})", f)).unwrap_or_default();
            println!("{} {}{}", "Last session:".bold(), entry.id.green(), floor);
            println!("{}", entry.summary.trim());
        }
        None => println!("{} none", "Last session:".bold()),
    }

    println!("\n{}", "Active tasks:".bold());
    let mut any = false;
    for task in corpus.active_tasks() {
        println!("  {} {}", task.id.yellow(), task.title);
        any = true;
    }
    if !any {
        println!("  none");
    }

    let queued = corpus.tasks.iter().filter(|t| t.status == Status::Queued).count();
    println!("\n{} {} queued", "Backlog:".bold(), queued);
    println!("{} {}", "Next session:".bold(), corpus.next_session_id());
    println!("{} {}", "Corpus hash:".bold(), short_hash(&corpus.corpus_hash));

    for issue in &corpus.load_issues {
        println!("{} {}", "Load issue:".yellow(), issue);
    }
    Ok(())
}

fn cmd_corpus_validate(root: &Path, config: &Config) -> Result<()> {
    debug!(?root, "cmd_corpus_validate: called");
    let corpus = CorpusBuilder::new(root, &config.paths).build();
    let report = validate(&corpus, &config.rules);

    for issue in &corpus.load_issues {
        println!("{} {}", "Load issue:".yellow(), issue);
    }
    if report.is_clean() {
        println!("{} no rule violations", "OK:".green().bold());
        return Ok(());
    }
    for flag in report.flags() {
        println!("{}", flag.red());
    }
    Err(eyre::eyre!("{} rule violation(s)", report.count))
}

fn cmd_corpus_hash(root: &Path, config: &Config) -> Result<()> {
    debug!(?root, "cmd_corpus_hash: called");
    let corpus = CorpusBuilder::new(root, &config.paths).build();
    println!("{}", corpus.corpus_hash);
    Ok(())
}

async fn cmd_models(root: PathBuf, config: Config) -> Result<()> {
    debug!("cmd_models: called");
    println!("{} {}", "Service:".bold(), config.llm.base_url);
    println!("{} {}", "Ladder:".bold(), config.llm.ladder.join(" > "));
    let ctx = connect(root, config).await?;
    debug!(model = %ctx.resolution.model, "cmd_models: resolved");
    Ok(())
}

async fn cmd_escalate(root: &Path, config: Config, task: &str, reason: &str, prompt: &str) -> Result<()> {
    debug!(%task, "cmd_escalate: called");
    let ledger = root.join(&config.paths.ledger_path);
    let gate = EscalationGate::new(config.escalation.clone(), ledger, Box::new(TerminalApprover::new()));

    match gate.escalate(task, reason, prompt).await? {
        EscalationOutcome::Disabled => {
            println!(
                "{} escalation is off or no access key is set ({})",
                "Disabled:".yellow().bold(),
                config.escalation.api_key_env
            );
        }
        EscalationOutcome::Denied => println!("{} nothing was sent", "Denied:".yellow().bold()),
        EscalationOutcome::Completed { text, usage } => {
            println!("{}", text);
            println!(
                "\n{} {} in / {} out, ${:.4}",
                "Usage:".dimmed(),
                usage.tokens_in,
                usage.tokens_out,
                usage.estimated_cost_usd
            );
        }
    }
    Ok(())
}
