//! Archive writers: accumulate named records, then produce one deliverable file.
//!
//! [`StagedArchive`] keeps each record as its own file in a per-job staging
//! directory until [`ArchiveWriter::finalize`], so a process restarted from a
//! checkpoint still assembles the items fetched before the interruption.
//! Record names sort in reading order, which is the assembly order.

mod digest;
mod staged;

pub use digest::HashingWriter;
pub use staged::StagedArchive;

use anyhow::Result;
use std::path::PathBuf;

use crate::config::OutputFormat;
use crate::naming::sanitize_filename;

/// Finalized deliverable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub format: OutputFormat,
    /// Number of records assembled into the artifact.
    pub records: usize,
    pub bytes: u64,
    /// Lowercase hex SHA-256 of the artifact file.
    pub sha256: String,
}

pub trait ArchiveWriter: Send {
    /// Store one record. Writing a name twice replaces the earlier bytes.
    fn add_record(&mut self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Assemble every stored record into the deliverable.
    fn finalize(&mut self) -> Result<Artifact>;
}

/// Output file name for a concatenated text archive: `Title(3~10).txt`.
pub fn text_file_name(title: &str, range_start: usize, range_end: usize) -> String {
    format!("{}({}~{}).txt", sanitize_filename(title), range_start, range_end)
}

/// Output file name for a ZIP archive: `Title.zip`.
pub fn zip_file_name(title: &str) -> String {
    format!("{}.zip", sanitize_filename(title))
}

/// Where and how a [`StagedArchive`] writes its deliverable.
#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub dir: PathBuf,
    pub file_name: String,
    pub format: OutputFormat,
    /// Text written before the first record (text format only).
    pub header: Option<String>,
}

impl OutputSpec {
    /// Text output named after the title and range, with the title as header.
    pub fn text(dir: impl Into<PathBuf>, title: &str, range_start: usize, range_end: usize) -> Self {
        Self {
            dir: dir.into(),
            file_name: text_file_name(title, range_start, range_end),
            format: OutputFormat::Text,
            header: Some(format!("{}\n\nDownloaded with ndl\n\n", title)),
        }
    }

    pub fn zip(dir: impl Into<PathBuf>, title: &str) -> Self {
        Self {
            dir: dir.into(),
            file_name: zip_file_name(title),
            format: OutputFormat::Zip,
            header: None,
        }
    }
}
