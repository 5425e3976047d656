use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::error;
use orchestrate::{
    HealthPoller, OperationReport, OrchestrationEngine, Outcome, ProcessManager, Scope,
    ServiceRegistry, StatusRow, SystemConfig, UnixSupervisor,
};

#[derive(Parser)]
#[command(name = "orchestrate")]
#[command(about = "Service process orchestrator for the trading stack")]
struct Cli {
    /// Operation to perform
    #[arg(value_enum)]
    action: Action,

    /// "all" or a registered service name
    scope: String,

    /// Emit status output as JSON (status action only)
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Action {
    Start,
    Stop,
    Restart,
    Status,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("ORCHESTRATE_LOG", "info"))
        .init();

    // Usage problems (unknown action, missing scope) exit 1, not clap's
    // default 2.
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        let _ = e.print();
        std::process::exit(1);
    });

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

/// Returns whether every service in scope ended up where the action wanted
/// it; anything else maps to a non-zero exit.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = SystemConfig::from_env();
    let registry = ServiceRegistry::standard().context("building service registry")?;

    let scope = match Scope::parse(&cli.scope, &registry) {
        Ok(scope) => scope,
        Err(e) => {
            eprintln!("{}", e);
            eprintln!("Usage: orchestrate <start|stop|restart|status> <all|SERVICE>");
            return Ok(false);
        }
    };

    let manager = ProcessManager::new(UnixSupervisor, &config);
    let poller = HealthPoller::new().context("building health client")?;
    let engine = OrchestrationEngine::new(registry, manager, poller, &config);

    match cli.action {
        Action::Start => {
            let report = engine.start(&scope).await?;
            print_report(&report);
            Ok(!report.has_failures())
        }
        Action::Stop => {
            let report = engine.stop(&scope).await?;
            print_report(&report);
            Ok(!report.has_failures())
        }
        Action::Restart => {
            let report = engine.restart(&scope).await?;
            print_report(&report);
            Ok(!report.has_failures())
        }
        Action::Status => {
            let rows = engine.status(&scope).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print_status(&rows);
            }
            Ok(true)
        }
    }
}

fn print_report(report: &OperationReport) {
    for (service, outcome) in &report.entries {
        let label = match outcome {
            Outcome::Started => "started".to_string(),
            Outcome::AlreadySatisfied => "already running".to_string(),
            Outcome::Stopped => "stopped".to_string(),
            Outcome::AlreadyStopped => "not running".to_string(),
            Outcome::Failed(reason) => format!("FAILED: {}", reason),
        };
        println!("{:<18} | {}", service, label);
    }
}

fn print_status(rows: &[StatusRow]) {
    println!(
        "{:<18} | {:<10} | {:<8} | {:<8} | {:<10}",
        "SERVICE", "STATE", "PID", "HEALTH", "UPTIME"
    );
    println!(
        "{:-<18}-+-{:-<10}-+-{:-<8}-+-{:-<8}-+-{:-<10}",
        "", "", "", "", ""
    );
    for row in rows {
        let pid = row
            .pid
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        let uptime = row
            .uptime_secs
            .map(|s| format!("{}s", s))
            .unwrap_or_else(|| "-".to_string());
        let health = if row.healthy { "ok" } else { "down" };
        println!(
            "{:<18} | {:<10} | {:<8} | {:<8} | {:<10}",
            row.service, row.state, pid, health, uptime
        );
    }
}
