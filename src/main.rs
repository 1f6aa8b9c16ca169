use anyhow::{bail, Context, Result};
use cerberus_filter::config::{FilterConfig, MAX_EXECUTION_UNITS};
use cerberus_filter::hooks::{FallbackHook, FastPathHook, FilterCore};
use cerberus_filter::replay::replay_file;
use cerberus_filter::report::TrafficReport;
use cerberus_filter::simulate::{run_simulation, SimulationPlan, TrafficKind};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cerberus-filter")]
#[command(author = "Cerberus Team")]
#[command(version)]
#[command(about = "Cerberus per-source admission filter", long_about = None)]
struct Cli {
    /// TOML configuration file (defaults are compiled in)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Entry adapter to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HookPath {
    /// Driver-level XDP adapter
    Fast,
    /// TC ingress adapter
    Fallback,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as TOML
    Config,

    /// Drive synthetic traffic through an adapter on a virtual clock
    Simulate {
        /// Traffic shape
        #[arg(short, long, value_enum, default_value = "tcp")]
        kind: TrafficKind,

        /// Packets per second sent by each source
        #[arg(long, default_value = "6000")]
        pps: u64,

        /// Simulated seconds
        #[arg(short, long, default_value = "2")]
        duration: u64,

        /// Number of distinct sources
        #[arg(short, long, default_value = "8")]
        sources: u32,

        /// Worker threads (one execution unit each)
        #[arg(short, long, default_value = "4")]
        workers: usize,

        #[arg(short, long, value_enum, default_value = "fast")]
        path: HookPath,

        /// Print the report as JSON
        #[arg(long, conflicts_with = "prometheus")]
        json: bool,

        /// Print metrics in Prometheus exposition format
        #[arg(long)]
        prometheus: bool,
    },

    /// Replay an Ethernet pcap capture through an adapter
    Replay {
        /// Capture file
        file: PathBuf,

        #[arg(short, long, value_enum, default_value = "fast")]
        path: HookPath,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
        Commands::Simulate {
            kind,
            pps,
            duration,
            sources,
            workers,
            path,
            json,
            prometheus,
        } => {
            let plan = SimulationPlan {
                kind,
                pps,
                duration_secs: duration,
                sources,
                workers,
            };
            simulate(config, plan, path, json, prometheus)?;
        }
        Commands::Replay { file, path, json } => {
            replay(&config, &file, path, json)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<FilterConfig> {
    match path {
        Some(path) => FilterConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(FilterConfig::default()),
    }
}

fn build_core(config: &FilterConfig) -> Result<Arc<FilterCore>> {
    let core = FilterCore::new(config).context("Invalid filter configuration")?;
    Ok(Arc::new(core))
}

fn simulate(
    mut config: FilterConfig,
    plan: SimulationPlan,
    path: HookPath,
    json: bool,
    prometheus: bool,
) -> Result<()> {
    if plan.pps == 0 || plan.duration_secs == 0 || plan.sources == 0 {
        bail!("pps, duration and sources must all be greater than zero");
    }
    if plan.workers == 0 || plan.workers > MAX_EXECUTION_UNITS {
        bail!("workers must be between 1 and {}", MAX_EXECUTION_UNITS);
    }

    // one metric shard per worker
    config.execution_units = Some(plan.workers);
    let core = build_core(&config)?;

    if !json && !prometheus {
        print_banner("Traffic Simulation");
        println!("  Traffic: {:?}", plan.kind);
        println!(
            "  Rate: {} pps x {} sources for {}s",
            plan.pps.to_string().bright_yellow(),
            plan.sources,
            plan.duration_secs
        );
        println!(
            "  Budget: {} pps per source",
            config.rate_budget.to_string().bright_green()
        );
        println!("  Frames: {}", plan.total_frames());
        println!();
    }

    let report = match path {
        HookPath::Fast => run_simulation(&FastPathHook::new(core), &plan),
        HookPath::Fallback => run_simulation(&FallbackHook::new(core), &plan),
    }
    .context("Simulation aborted")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if prometheus {
        print!("{}", report.metrics.to_prometheus_format());
    } else {
        print_report(&report);
    }

    Ok(())
}

fn replay(config: &FilterConfig, file: &Path, path: HookPath, json: bool) -> Result<()> {
    let core = build_core(config)?;

    let report = match path {
        HookPath::Fast => replay_file(&FastPathHook::new(core), file),
        HookPath::Fallback => replay_file(&FallbackHook::new(core), file),
    }
    .with_context(|| format!("Replay of {} failed", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_banner("Capture Replay");
        println!("  Capture: {}", file.display().to_string().bright_white());
        println!();
        print_report(&report);
    }

    Ok(())
}

fn print_banner(title: &str) {
    println!(
        "{}",
        "═══════════════════════════════════════════════════".bright_cyan()
    );
    println!("{}", format!("        Cerberus {}", title).bright_cyan().bold());
    println!(
        "{}",
        "═══════════════════════════════════════════════════".bright_cyan()
    );
    println!();
}

fn print_report(report: &TrafficReport) {
    println!("{}", format!("Adapter: {}", report.path).bright_white().bold());
    println!("  Frames:  {}", report.frames);
    println!("  Passed:  {}", report.passed.to_string().bright_green());
    println!(
        "  Dropped: {} ({:.2}%)",
        report.dropped.to_string().bright_red(),
        report.drop_rate()
    );
    println!();

    println!("{}", "Decisions:".bright_cyan());
    for (label, count) in &report.decisions {
        println!("  {:<18} {}", label, count);
    }
    println!();

    println!("{}", "Return codes:".bright_cyan());
    for (code, count) in &report.codes {
        let value = report.code_values.get(code).copied().unwrap_or_default();
        println!("  {:<18} {:>3}  {}", code, value, count);
    }
    println!();

    println!("{}", "Metrics:".bright_cyan());
    println!("  passed:        {}", report.metrics.passed);
    println!("  dropped_rate:  {}", report.metrics.dropped_rate);
    println!("  dropped_block: {}", report.metrics.dropped_block);
    println!();

    println!(
        "  Blocked sources: {}  Tracked sources: {}",
        report.blocked_sources.to_string().bright_yellow(),
        report.tracked_sources
    );
}
