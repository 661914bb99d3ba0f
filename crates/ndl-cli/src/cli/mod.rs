//! CLI for ndl, the resumable serial downloader.

mod commands;
mod control_socket;
mod terminal;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use ndl_core::checkpoint::{CheckpointStore, JsonFileBackend, SqliteBackend};
use ndl_core::config::{self, CheckpointBackendKind, NdlConfig, OutputFormat};
use std::path::PathBuf;
use std::sync::Arc;

use commands::{
    run_clear, run_completions, run_control, run_gallery, run_man, run_novel, run_status,
    ControlVerb,
};

/// Top-level CLI for ndl.
#[derive(Debug, Parser)]
#[command(name = "ndl")]
#[command(about = "ndl: resumable, rate-limited serial downloader for web novels and galleries", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Options shared by the download commands.
#[derive(Debug, Clone, Args)]
pub struct JobArgs {
    /// First item to download (1-based).
    #[arg(long, value_name = "N")]
    pub start: Option<usize>,

    /// Last item to download (inclusive). Defaults to the last item.
    #[arg(long, value_name = "N")]
    pub end: Option<usize>,

    /// Milliseconds between item fetches. Defaults to `delay_ms` from the config.
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Override the job title (checkpoint key and output file name).
    #[arg(long)]
    pub title: Option<String>,

    /// Directory for the finished file. Defaults to the current directory.
    #[arg(long, short, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Answer every prompt automatically: resume checkpoints, retry challenges.
    #[arg(long, short)]
    pub yes: bool,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a web novel's episodes from its list page.
    Novel {
        /// URL of the series' episode list.
        url: String,

        /// Number of list pages to scan for episode links.
        #[arg(long, default_value = "1", value_name = "N")]
        pages: usize,

        /// Output format. Defaults to `output_format` from the config.
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Download every image of a gallery page into a ZIP archive.
    Gallery {
        /// URL of the gallery page.
        url: String,

        /// CSS selector matching the gallery's <img> elements.
        #[arg(long, default_value = "img")]
        selector: String,

        #[command(flatten)]
        job: JobArgs,
    },

    /// List saved checkpoints (interrupted jobs).
    Status,

    /// Pause a running job by title.
    Pause {
        /// Job title as shown by `ndl status`.
        title: String,
    },

    /// Resume a paused job by title.
    Resume {
        /// Job title as shown by `ndl status`.
        title: String,
    },

    /// Abort a running job by title; its checkpoint is kept.
    Abort {
        /// Job title as shown by `ndl status`.
        title: String,
    },

    /// Delete the checkpoint and staged items for a title.
    Clear {
        /// Job title as shown by `ndl status`.
        title: String,
    },

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print the man page to stdout.
    Man,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FormatArg {
    Text,
    Zip,
}

impl From<FormatArg> for OutputFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Zip => OutputFormat::Zip,
        }
    }
}

/// Open the checkpoint store selected in the config.
async fn open_store(cfg: &NdlConfig) -> Result<CheckpointStore> {
    Ok(match cfg.checkpoint_backend {
        CheckpointBackendKind::Sqlite => {
            CheckpointStore::new(Arc::new(SqliteBackend::open_default().await?))
        }
        CheckpointBackendKind::Json => {
            CheckpointStore::new(Arc::new(JsonFileBackend::new(JsonFileBackend::default_dir()?)))
        }
    })
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Completions { shell } => return run_completions(shell),
            CliCommand::Man => return run_man(),
            CliCommand::Pause { title } => return run_control(ControlVerb::Pause, &title).await,
            CliCommand::Resume { title } => return run_control(ControlVerb::Resume, &title).await,
            CliCommand::Abort { title } => return run_control(ControlVerb::Abort, &title).await,
            _ => {}
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let store = open_store(&cfg).await?;

        match cli.command {
            CliCommand::Novel {
                url,
                pages,
                format,
                job,
            } => {
                let format = format.map(OutputFormat::from).unwrap_or(cfg.output_format);
                run_novel(&cfg, &store, &url, pages, format, &job).await?
            }
            CliCommand::Gallery { url, selector, job } => {
                run_gallery(&cfg, &store, &url, &selector, &job).await?
            }
            CliCommand::Status => run_status(&store).await?,
            CliCommand::Clear { title } => run_clear(&store, &title).await?,
            CliCommand::Completions { .. }
            | CliCommand::Man
            | CliCommand::Pause { .. }
            | CliCommand::Resume { .. }
            | CliCommand::Abort { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
