use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use clap::Parser;
use pantry_adapters::backend::AnyBackend;
use pantry_core::config::{default_config_dir, log_dir, ConfigError, DashboardConfig, Preset};
use pantry_core::dashboard::Dashboard;
use tracing_appender::non_blocking::WorkerGuard;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, Parser)]
#[command(name = "pantry-app")]
#[command(about = "Terminal dashboard for the food wastage database", version)]
struct Cli {
    /// Dashboard config file; defaults to <config dir>/pantry/dashboard.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Preset used when the config file is missing or blank
    #[arg(short, long, default_value = "named_instance")]
    preset: Preset,

    /// Database file, connection URL, or database name replacing the configured one
    #[arg(short, long)]
    database: Option<String>,

    /// Directory that receives CSV and JSON exports
    #[arg(long, default_value = ".")]
    export_dir: PathBuf,
}

impl Cli {
    fn load_config(&self) -> Result<DashboardConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => DashboardConfig::load_from_path(path, self.preset)?,
            None => DashboardConfig::load_default(self.preset)?,
        };
        if let Some(location) = &self.database {
            config.override_location(location);
        }
        config.validate()?;
        Ok(config)
    }

    fn log_root(&self) -> Option<PathBuf> {
        match &self.config {
            Some(path) => path.parent().map(Path::to_path_buf),
            None => default_config_dir().ok(),
        }
    }
}

fn init_tracing(root: &Path) -> Result<(), Box<dyn Error>> {
    let log_dir = log_dir(root);
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "pantry.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string().into())
}

fn run_app(
    cli: Cli,
    run_tui: impl FnOnce(Dashboard<AnyBackend>, PathBuf) -> Result<(), pantry_tui::TuiError>,
) -> Result<(), Box<dyn Error>> {
    let config = cli.load_config()?;
    tracing::info!(
        target_name = %config.connection.name,
        target = %config.connection.describe(),
        "dashboard starting"
    );
    let backend = AnyBackend::for_config(&config.connection);
    let dashboard = Dashboard::new(config, backend)?;
    run_tui(dashboard, cli.export_dir)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    if let Some(root) = cli.log_root() {
        if let Err(error) = init_tracing(&root) {
            eprintln!("file logging disabled: {error}");
        }
    }
    run_app(cli, pantry_tui::run)
}
