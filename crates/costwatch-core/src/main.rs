//! CostWatch CLI
//!
//! Command-line interface for the CostWatch cost alerting service.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use costwatch::alerting::{AlertMonitor, AlertStore, CycleReport, PgAlertStore, PgCostSource};
use costwatch::api::{AppState, HttpServer};
use costwatch::db::Database;
use costwatch::models::{AlertInput, AlertType, CostSnapshot, ServiceScope};
use costwatch::Config;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// CostWatch - Cost alerting for AWS spend
#[derive(Parser)]
#[command(name = "costwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "COSTWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API and the periodic alert monitor
    Serve {
        /// HTTP API port (overrides server.http_port)
        #[arg(long, env = "COSTWATCH_HTTP_PORT")]
        http_port: Option<u16>,
    },

    /// Run one evaluation cycle against a cost snapshot file
    Check {
        /// JSON snapshot: a list of {service, cost} or a service -> cost map
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// Manage cost alerts
    Alerts {
        #[command(subcommand)]
        command: AlertsCommands,
    },

    /// Database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Subcommand)]
enum AlertsCommands {
    /// List all alerts
    List,

    /// Create a new alert
    Create {
        /// Alert name
        #[arg(long)]
        name: String,

        /// Spend ceiling; the alert fires when spend exceeds it
        #[arg(long)]
        threshold: f64,

        /// Service to watch (all services if not specified)
        #[arg(long)]
        service: Option<String>,

        /// Alert type
        #[arg(long = "type", value_enum, default_value = "absolute")]
        alert_type: AlertKind,
    },

    /// Enable an alert
    Enable {
        /// Alert ID
        id: i64,
    },

    /// Disable an alert
    Disable {
        /// Alert ID
        id: i64,
    },
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum AlertKind {
    Absolute,
    PercentageChange,
}

impl From<AlertKind> for AlertType {
    fn from(kind: AlertKind) -> Self {
        match kind {
            AlertKind::Absolute => AlertType::Absolute,
            AlertKind::PercentageChange => AlertType::PercentageChange,
        }
    }
}

#[derive(Subcommand)]
enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    // Execute command
    let result = match cli.command {
        Commands::Serve { http_port } => run_serve(config, http_port).await,
        Commands::Check { snapshot } => run_check(config, &snapshot, cli.format).await,
        Commands::Alerts { command } => run_alerts(config, command, cli.format).await,
        Commands::Db { command } => run_db(config, command).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins over `--verbose`, which wins over `logging.level`
fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if config.logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn connect(config: &Config) -> anyhow::Result<Database> {
    Database::new(config)
        .await
        .context("failed to connect to PostgreSQL")
}

async fn run_serve(mut config: Config, http_port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = http_port {
        config.server.http_port = port;
    }

    let db = connect(&config).await?;
    db.migrate().await.context("failed to run migrations")?;

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;

    let store: Arc<dyn AlertStore> = Arc::new(PgAlertStore::new(&db.postgres));
    let monitor = AlertMonitor::from_config(&config, store.clone())?;
    let source = PgCostSource::new(&db.postgres);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown = |mut rx: watch::Receiver<bool>| async move {
        let _ = rx.changed().await;
    };

    let addr = format!("{}:{}", config.server.host, config.server.http_port);
    let server = HttpServer::new(AppState {
        store,
        metrics: Some(metrics),
    });

    info!(
        addr = %addr,
        monitor = config.alerting.enabled,
        notifications = monitor.notifications_enabled(),
        "Starting CostWatch"
    );

    let monitor_loop = async {
        if config.alerting.enabled {
            monitor
                .run(&source, config.alerting.check_interval, shutdown(shutdown_rx.clone()))
                .await;
        } else {
            warn!("Alert monitor disabled; only the API is running");
        }
    };

    let signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Shutting down");
        let _ = shutdown_tx.send(true);
    };

    let (served, (), ()) = tokio::join!(
        server.serve(&addr, shutdown(shutdown_rx.clone())),
        monitor_loop,
        signal,
    );

    served?;
    Ok(())
}

async fn run_check(config: Config, snapshot: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(snapshot)
        .await
        .with_context(|| format!("failed to read {}", snapshot.display()))?;
    let snapshot: CostSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid cost snapshot", snapshot.display()))?;

    let db = connect(&config).await?;
    let store: Arc<dyn AlertStore> = Arc::new(PgAlertStore::new(&db.postgres));
    let monitor = AlertMonitor::from_config(&config, store)?;

    let report = monitor.check_thresholds(&snapshot).await?;
    print_report(&report, format)?;

    Ok(())
}

fn print_report(report: &CycleReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            println!("Alerts evaluated:      {}", report.alerts_evaluated);
            println!("Breaches:              {}", report.breaches);
            println!("Recorded:              {:?}", report.recorded);
            println!("Notified:              {}", report.notified);
            println!("Notification failures: {}", report.notification_failures);
            println!("Write failures:        {}", report.write_failures);
        }
    }
    Ok(())
}

async fn run_alerts(
    config: Config,
    command: AlertsCommands,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let db = connect(&config).await?;
    let store = PgAlertStore::new(&db.postgres);

    match command {
        AlertsCommands::List => {
            let alerts = store.list_alerts().await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&alerts)?),
                OutputFormat::Text => {
                    if alerts.is_empty() {
                        println!("No alerts configured");
                    }
                    for alert in alerts {
                        println!(
                            "{:>5}  {:<8}  {:<30}  {:<24}  {:>12.2}  {}",
                            alert.id,
                            if alert.is_active { "active" } else { "disabled" },
                            alert.name,
                            alert.service_name.as_str(),
                            alert.threshold_amount,
                            alert.alert_type.as_str(),
                        );
                    }
                }
            }
        }
        AlertsCommands::Create {
            name,
            threshold,
            service,
            alert_type,
        } => {
            let id = store
                .create_alert(AlertInput {
                    name,
                    threshold_amount: threshold,
                    service_name: ServiceScope::parse(service.as_deref()),
                    alert_type: alert_type.into(),
                })
                .await?;
            println!("Created alert {id}");
        }
        AlertsCommands::Enable { id } => set_active(&store, id, true).await?,
        AlertsCommands::Disable { id } => set_active(&store, id, false).await?,
    }

    Ok(())
}

async fn set_active(store: &PgAlertStore, id: i64, is_active: bool) -> anyhow::Result<()> {
    if !store.set_alert_active(id, is_active).await? {
        anyhow::bail!("alert {id} not found");
    }

    let state = if is_active { "enabled" } else { "disabled" };
    println!("Alert {id} {state}");
    Ok(())
}

async fn run_db(config: Config, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Migrate => {
            let db = connect(&config).await?;
            db.migrate().await.context("failed to run migrations")?;
            println!("Migrations applied");
        }
    }
    Ok(())
}
