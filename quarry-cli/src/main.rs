use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

use quarry_cli::config::{load_file_config, Overrides, Settings};
use quarry_cli::error::CliResult;
use quarry_cli::gui::{run_gui, GuiArgs};
use quarry_core::client::{ExplorerApi, HttpExplorerClient};

#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(about = "Desktop explorer for earnings datasets, graphs and sample calls", long_about = None)]
struct Cli {
    /// Base URL of the explorer API
    #[arg(long, env = "QUARRY_API_URL")]
    api_url: Option<String>,
    #[arg(long, env = "QUARRY_PAGE_SIZE")]
    page_size: Option<u32>,
    #[arg(long, env = "QUARRY_GRAPH_LIMIT")]
    graph_limit: Option<u32>,
    #[arg(long, env = "QUARRY_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
    /// TOML file with defaults for the options above
    #[arg(long, env = "QUARRY_CONFIG")]
    config: Option<PathBuf>,
    /// Dataset to open once the list has loaded
    #[arg(long)]
    dataset: Option<String>,
}

fn main() -> CliResult<()> {
    init_logging()?;

    let cli = Cli::parse();
    let file = load_file_config(cli.config.as_deref())?;
    let settings = Settings::resolve(
        Overrides {
            api_url: cli.api_url,
            page_size: cli.page_size,
            graph_limit: cli.graph_limit,
            timeout_secs: cli.timeout_secs,
        },
        file,
    )?;
    tracing::info!("Using explorer API at {}", settings.api_url);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let api: Arc<dyn ExplorerApi> =
        Arc::new(HttpExplorerClient::try_new(&settings.api_url, settings.timeout)?);

    let result = run_gui(GuiArgs {
        runtime_handle: runtime.handle().clone(),
        api,
        settings,
        initial_dataset: cli.dataset,
    });
    if let Err(err) = &result {
        tracing::error!("GUI exited with error: {err}");
    }
    result
}

/// Where `QUARRY_LOG` points: `stderr`, `stdout`, a file path, or unset for
/// the default log file. Falls back to stderr when that file can't be opened.
fn log_writer(target: Option<&str>) -> CliResult<(BoxMakeWriter, bool)> {
    let writer = match target {
        Some("stderr") => (BoxMakeWriter::new(std::io::stderr), true),
        Some("stdout") => (BoxMakeWriter::new(std::io::stdout), true),
        Some(path) => (BoxMakeWriter::new(open_log_file(Path::new(path))?), false),
        None => match default_log_path().and_then(|path| open_log_file(&path).ok()) {
            Some(file) => (BoxMakeWriter::new(file), false),
            None => (BoxMakeWriter::new(std::io::stderr), true),
        },
    };
    Ok(writer)
}

fn init_logging() -> CliResult<()> {
    let target = std::env::var("QUARRY_LOG").ok();
    let (writer, ansi) = log_writer(target.as_deref())?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .init();
    Ok(())
}

fn default_log_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(path).join("quarry").join("quarry.log"));
    }
    let home = std::env::var("HOME").ok()?;
    if cfg!(target_os = "macos") {
        Some(PathBuf::from(home).join("Library/Logs/quarry.log"))
    } else {
        Some(
            PathBuf::from(home)
                .join(".local/state")
                .join("quarry")
                .join("quarry.log"),
        )
    }
}

fn open_log_file(path: &Path) -> CliResult<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_target_picks_writer_and_colour() {
        let (_, ansi) = log_writer(Some("stderr")).unwrap();
        assert!(ansi);
        let (_, ansi) = log_writer(Some("stdout")).unwrap();
        assert!(ansi);

        let path = std::env::temp_dir()
            .join(format!("quarry-log-{}", std::process::id()))
            .join("nested")
            .join("quarry.log");
        let (_, ansi) = log_writer(path.to_str()).unwrap();
        assert!(!ansi);
        assert!(path.exists());
    }
}
