use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// HTTP parameters for the curl fetcher (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    /// Optional User-Agent header; libcurl's default is used when missing.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 15,
            timeout_secs: 60,
            user_agent: None,
        }
    }
}

/// Where checkpoints are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackendKind {
    /// SQLite database under the XDG state dir.
    #[default]
    Sqlite,
    /// One JSON file per job under the XDG state dir.
    Json,
}

/// Deliverable produced when a job finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One concatenated text file.
    #[default]
    Text,
    /// Deflate-compressed ZIP with one entry per item.
    Zip,
}

/// Global configuration loaded from `~/.config/ndl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NdlConfig {
    /// Default spacing between successive item fetches, in milliseconds.
    pub delay_ms: u64,
    /// Smallest delay accepted for novel jobs (gallery jobs may use 0).
    pub min_delay_ms: u64,
    /// Persist a checkpoint every N completed items.
    pub checkpoint_every: usize,
    /// Number of recent per-item durations used for the ETA moving average.
    pub progress_window: usize,
    /// Episode URLs must start with this prefix; anything else is skipped.
    pub source_prefix: String,
    /// Treat transport/HTTP failures like "no content" (human-assisted retry).
    /// When false they fail the item immediately.
    pub fetch_errors_are_challenges: bool,
    /// Checkpoint persistence backend.
    #[serde(default)]
    pub checkpoint_backend: CheckpointBackendKind,
    /// Default output format for novel jobs (galleries always use zip).
    #[serde(default)]
    pub output_format: OutputFormat,
    /// Optional HTTP tuning; if missing, built-in defaults are used.
    #[serde(default)]
    pub http: Option<HttpConfig>,
}

impl Default for NdlConfig {
    fn default() -> Self {
        Self {
            delay_ms: 5000,
            min_delay_ms: 1000,
            checkpoint_every: 5,
            progress_window: 5,
            source_prefix: "https://booktoki".to_string(),
            fetch_errors_are_challenges: true,
            checkpoint_backend: CheckpointBackendKind::Sqlite,
            output_format: OutputFormat::Text,
            http: None,
        }
    }
}

impl NdlConfig {
    /// HTTP settings with defaults filled in.
    pub fn http(&self) -> HttpConfig {
        self.http.clone().unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("ndl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// State directory (`~/.local/state/ndl`) for logs, checkpoints, staged records and the control socket.
pub fn state_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("ndl")?;
    Ok(xdg_dirs.get_state_home())
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<NdlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = NdlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: NdlConfig = toml::from_str(&data)?;
    Ok(cfg)
}
