use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use quarry_core::pagination::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use quarry_core::query::{clamp_graph_limit, DEFAULT_GRAPH_LIMIT};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::CliResult;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Optional `quarry.toml`. Every key may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub page_size: Option<u32>,
    pub graph_limit: Option<u32>,
    pub timeout_secs: Option<u64>,
}

/// Values given on the command line or through the environment. These win
/// over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub page_size: Option<u32>,
    pub graph_limit: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub page_size: u32,
    pub graph_limit: u32,
    pub timeout: Duration,
}

impl Settings {
    pub fn resolve(overrides: Overrides, file: FileConfig) -> CliResult<Self> {
        let api_url = overrides
            .api_url
            .or(file.api_url)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let page_size = overrides
            .page_size
            .or(file.page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(
                format!("page size must be between 1 and {MAX_PAGE_SIZE}, got {page_size}").into(),
            );
        }

        let requested_limit = overrides
            .graph_limit
            .or(file.graph_limit)
            .unwrap_or(DEFAULT_GRAPH_LIMIT);
        let graph_limit = clamp_graph_limit(requested_limit);
        if graph_limit != requested_limit {
            warn!("Graph limit {requested_limit} is out of range, using {graph_limit}");
        }

        let timeout_secs = overrides
            .timeout_secs
            .or(file.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err("timeout must be at least one second".into());
        }

        Ok(Self {
            api_url,
            page_size,
            graph_limit,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            graph_limit: DEFAULT_GRAPH_LIMIT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

pub fn parse_file_config(contents: &str) -> CliResult<FileConfig> {
    Ok(toml::from_str(contents)?)
}

/// An explicitly named file must exist and parse. Without one, the first
/// default location that exists is used, and problems there only warn.
pub fn load_file_config(explicit: Option<&Path>) -> CliResult<FileConfig> {
    if let Some(path) = explicit {
        let contents = std::fs::read_to_string(path)
            .map_err(|err| format!("Failed to read config at {}: {err}", path.display()))?;
        info!("Loaded config from {}", path.display());
        return parse_file_config(&contents)
            .map_err(|err| format!("Failed to parse config at {}: {err}", path.display()).into());
    }

    let Some(path) = default_config_paths().into_iter().find(|path| path.exists()) else {
        return Ok(FileConfig::default());
    };
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) => {
            warn!("Failed to read config at {}: {err}", path.display());
            return Ok(FileConfig::default());
        }
    };
    match parse_file_config(&contents) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        Err(err) => {
            warn!("Failed to parse config at {}: {err}", path.display());
            Ok(FileConfig::default())
        }
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        candidates.push(cwd.join("quarry.toml"));
    }
    if let Ok(path) = env::var("XDG_CONFIG_HOME") {
        candidates.push(PathBuf::from(path).join("quarry").join("config.toml"));
    } else if let Ok(home) = env::var("HOME") {
        candidates.push(
            PathBuf::from(home)
                .join(".config")
                .join("quarry")
                .join("config.toml"),
        );
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let settings = Settings::resolve(Overrides::default(), FileConfig::default()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.api_url, "http://127.0.0.1:8000");
        assert_eq!(settings.page_size, 25);
        assert_eq!(settings.graph_limit, 50);
        assert_eq!(settings.timeout, Duration::from_secs(30));
    }

    #[test]
    fn overrides_beat_file_values() {
        let file = parse_file_config(
            r#"
api_url = "http://explorer.internal:9000"
page_size = 100
graph_limit = 80
"#,
        )
        .unwrap();
        let overrides = Overrides {
            page_size: Some(10),
            ..Overrides::default()
        };
        let settings = Settings::resolve(overrides, file).unwrap();
        assert_eq!(settings.api_url, "http://explorer.internal:9000");
        assert_eq!(settings.page_size, 10);
        assert_eq!(settings.graph_limit, 80);
    }

    #[test]
    fn invalid_values_are_rejected_or_clamped() {
        let zero_page = Overrides {
            page_size: Some(0),
            ..Overrides::default()
        };
        assert!(Settings::resolve(zero_page, FileConfig::default()).is_err());

        let zero_timeout = FileConfig {
            timeout_secs: Some(0),
            ..FileConfig::default()
        };
        assert!(Settings::resolve(Overrides::default(), zero_timeout).is_err());

        let huge_limit = Overrides {
            graph_limit: Some(10_000),
            ..Overrides::default()
        };
        let settings = Settings::resolve(huge_limit, FileConfig::default()).unwrap();
        assert_eq!(settings.graph_limit, 500);
    }

    #[test]
    fn unknown_keys_are_a_parse_error() {
        assert!(parse_file_config("page_sise = 10").is_err());
        assert_eq!(parse_file_config("").unwrap(), FileConfig::default());
    }
}
