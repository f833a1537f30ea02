use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tnuke::config::{Config, GlobalFilters, RulesConfig};
use tnuke::engine::{Orchestrator, RunReport};
use tnuke::resource::{get_registry, NukerRegistry, ResourceConfig, RestResource, Scope};
use tnuke::rest::RestClient;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Inventory and bulk-delete cloud resources
#[derive(Parser, Debug)]
#[command(name = "tnuke", version, about, long_about = None)]
struct Args {
    /// Project to clean up
    #[arg(short, long)]
    project: Option<String>,

    /// Zone or region to clean up (repeatable)
    #[arg(short, long = "scope")]
    scopes: Vec<String>,

    /// Filter rules file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Additional resource definitions (JSON or YAML)
    #[arg(long)]
    resources: Option<PathBuf>,

    /// Only process these resource types (repeatable)
    #[arg(long = "resource-type")]
    resource_types: Vec<String>,

    /// Skip these resource types (repeatable)
    #[arg(long = "exclude-resource-type")]
    exclude_resource_types: Vec<String>,

    /// Only nuke resources older than this (e.g. 24h, 7d)
    #[arg(long, value_parser = humantime::parse_duration)]
    older_than: Option<Duration>,

    /// Only nuke resources newer than this (e.g. 1h)
    #[arg(long, value_parser = humantime::parse_duration)]
    newer_than: Option<Duration>,

    /// List what would be nuked without deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(long)]
    force: bool,

    /// Print the known resource types and exit
    #[arg(long)]
    list_resource_types: bool,

    /// Send every API call to this base URL (emulators)
    #[arg(long, hide = true)]
    endpoint: Option<String>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(
    level: LogLevel,
    log_file: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let (writer, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(io::stderr()),
    };

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.to_string().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .with_target(false)
        .init();

    Ok(Some(guard))
}

fn load_definitions(args: &Args, settings: &Config) -> Result<ResourceConfig> {
    match args.resources.as_ref().or(settings.resources_file.as_ref()) {
        Some(path) => ResourceConfig::with_file(path),
        None => Ok(get_registry().clone()),
    }
}

fn build_registry(definitions: &ResourceConfig, client: &RestClient) -> Result<NukerRegistry> {
    let mut registry = NukerRegistry::new();
    for (key, def) in &definitions.resources {
        registry.register(Arc::new(RestResource::new(key, def.clone(), client.clone())))?;
    }
    Ok(registry)
}

fn confirm() -> Result<bool> {
    print!("Are you sure you want to nuke all listed resources? Enter 'nuke' to confirm: ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim() == "nuke")
}

fn print_selected(report: &RunReport) {
    for r in report.reports().filter(|r| !r.selected.is_empty()) {
        println!("{} [{}]:", r.resource_type, r.scope);
        for identifier in &r.selected {
            println!("  - {}", identifier);
        }
    }
}

fn print_listing_errors(report: &RunReport) {
    for outcome in &report.outcomes {
        if let Err(e) = &outcome.result {
            eprintln!("{} [{}]: {}", outcome.resource_type, outcome.scope, e);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level, args.log_file.as_deref())?;

    let settings = Config::load();
    let definitions = load_definitions(&args, &settings)?;

    if args.list_resource_types {
        for key in definitions.keys() {
            let def = &definitions.resources[key];
            let kind = if def.is_global { "global" } else { "regional" };
            println!("{:<24} {:<28} {}", key, def.display_name, kind);
        }
        return Ok(());
    }

    let project = args
        .project
        .clone()
        .or_else(|| settings.effective_project())
        .context("No project configured. Set GOOGLE_CLOUD_PROJECT or use --project")?;

    let scopes: Vec<Scope> = if args.scopes.is_empty() {
        settings.effective_scopes()
    } else {
        args.scopes.clone()
    }
    .into_iter()
    .map(Scope::new)
    .collect();

    let globals = GlobalFilters::from_durations(args.older_than, args.newer_than, Utc::now())?;
    let rules = match args.config.clone().or_else(|| settings.effective_rules_file()) {
        Some(path) => RulesConfig::load(&path)?,
        None => RulesConfig::default(),
    }
    .with_globals(globals);

    let mut client = RestClient::from_env(&project).await?;
    if let Some(endpoint) = &args.endpoint {
        client = client.with_endpoint(endpoint.clone());
    }

    let registry = build_registry(&definitions, &client)?
        .select(&args.resource_types, &args.exclude_resource_types)?;

    for name in rules.resource_types() {
        if registry.get(name).is_none() {
            tracing::warn!("Rules configured for unknown or unselected resource type {}", name);
        }
    }
    if scopes.is_empty() && registry.iter().any(|n| !n.is_global()) {
        tracing::warn!("No scope configured; only global resource types will be processed");
    }

    tracing::info!(
        "Using project {} with scopes {:?} ({} resource types)",
        project,
        scopes.iter().map(Scope::as_str).collect::<Vec<_>>(),
        registry.len()
    );

    let orchestrator = Orchestrator::new(registry, rules);

    if !args.force || args.dry_run {
        let preview = orchestrator.with_dry_run(true);
        let report = preview.run(&scopes).await;
        print_selected(&report);
        print_listing_errors(&report);
        println!("{} resources selected", report.total_selected());

        if args.dry_run || report.total_selected() == 0 {
            return report.into_result().map_err(anyhow::Error::new);
        }
        if !confirm()? {
            return Ok(());
        }
        // Delete what was shown, not what a new listing would return
        let report = preview.with_dry_run(false).nuke_selected(report).await;
        return finish(report);
    }

    let report = orchestrator.run(&scopes).await;
    finish(report)
}

fn finish(report: RunReport) -> Result<()> {
    println!(
        "Nuked {} resources ({} failed)",
        report.total_deleted(),
        report.total_failed()
    );
    report.into_result().map_err(anyhow::Error::new)
}
