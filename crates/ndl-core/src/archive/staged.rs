//! Disk-staged archive writer (text or ZIP output).

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::digest::HashingWriter;
use super::{ArchiveWriter, Artifact, OutputSpec};
use crate::config::OutputFormat;
use crate::naming::sanitize_filename;

/// Deflate level used for ZIP entries.
const ZIP_LEVEL: i32 = 6;

pub struct StagedArchive {
    staging: PathBuf,
    spec: OutputSpec,
    keep_staging: bool,
}

impl StagedArchive {
    /// Open (or reopen) the staging directory for `title` under `staging_root`.
    /// Records staged by an earlier, interrupted process are kept.
    pub fn open(staging_root: &Path, title: &str, spec: OutputSpec) -> Result<Self> {
        let staging = staging_root.join(sanitize_filename(title));
        fs::create_dir_all(&staging)
            .with_context(|| format!("create staging dir: {}", staging.display()))?;
        Ok(Self {
            staging,
            spec,
            keep_staging: false,
        })
    }

    /// Remove the staging directory for `title`, if any.
    pub fn discard_for(staging_root: &Path, title: &str) -> Result<()> {
        let dir = staging_root.join(sanitize_filename(title));
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", dir.display())),
        }
    }

    /// Keep staged records after [`ArchiveWriter::finalize`]. Used for a
    /// partial artifact of an aborted job that may still be resumed.
    pub fn keep_staging(&mut self, keep: bool) {
        self.keep_staging = keep;
    }

    /// Default staging root: `~/.local/state/ndl/staging/`.
    pub fn default_root() -> Result<PathBuf> {
        Ok(crate::config::state_dir()?.join("staging"))
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    /// Discard every staged record (used when the user starts over).
    pub fn discard(&self) -> Result<()> {
        match fs::remove_dir_all(&self.staging) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("remove {}", self.staging.display())),
        }
        fs::create_dir_all(&self.staging)
            .with_context(|| format!("create staging dir: {}", self.staging.display()))?;
        Ok(())
    }

    /// Names of staged records, sorted (= assembly order).
    pub fn staged_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.staging)
            .with_context(|| format!("read staging dir: {}", self.staging.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                // Leftover temp files from an interrupted write start with '.'.
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn write_text(&self, names: &[String], out: &mut dyn Write) -> Result<()> {
        if let Some(ref header) = self.spec.header {
            out.write_all(header.as_bytes())?;
        }
        for name in names {
            let path = self.staging.join(name);
            let mut f = File::open(&path).with_context(|| format!("open {}", path.display()))?;
            io::copy(&mut f, out).with_context(|| format!("append {}", path.display()))?;
        }
        Ok(())
    }

    fn write_zip(&self, names: &[String], out: &mut File) -> Result<()> {
        let mut zip = zip::ZipWriter::new(out);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .compression_level(Some(ZIP_LEVEL));
        for name in names {
            let path = self.staging.join(name);
            let mut f = File::open(&path).with_context(|| format!("open {}", path.display()))?;
            zip.start_file(name.as_str(), options)
                .with_context(|| format!("zip entry {}", name))?;
            io::copy(&mut f, &mut zip).with_context(|| format!("compress {}", path.display()))?;
        }
        zip.finish().context("finish zip")?;
        Ok(())
    }
}

impl ArchiveWriter for StagedArchive {
    fn add_record(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let name = sanitize_filename(name);
        let final_path = self.staging.join(&name);
        let mut tmp = tempfile::Builder::new()
            .prefix(".rec-")
            .tempfile_in(&self.staging)
            .with_context(|| format!("temp file in {}", self.staging.display()))?;
        tmp.write_all(bytes)?;
        tmp.persist(&final_path)
            .map_err(|e| e.error)
            .with_context(|| format!("stage record {}", final_path.display()))?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<Artifact> {
        let names = self.staged_names()?;
        fs::create_dir_all(&self.spec.dir)
            .with_context(|| format!("create output dir: {}", self.spec.dir.display()))?;
        let final_path = self.spec.dir.join(&self.spec.file_name);

        let mut tmp = tempfile::Builder::new()
            .prefix(".ndl-")
            .tempfile_in(&self.spec.dir)
            .with_context(|| format!("temp file in {}", self.spec.dir.display()))?;
        match self.spec.format {
            OutputFormat::Text => {
                let mut out = BufWriter::new(tmp.as_file_mut());
                self.write_text(&names, &mut out)?;
                out.flush()?;
            }
            OutputFormat::Zip => self.write_zip(&names, tmp.as_file_mut())?,
        }
        tmp.as_file().sync_all()?;

        tmp.persist(&final_path)
            .map_err(|e| e.error)
            .with_context(|| format!("write artifact {}", final_path.display()))?;
        let mut file = File::open(&final_path)?;
        let mut hashing = HashingWriter::new(io::sink());
        io::copy(&mut file, &mut hashing)?;
        let (_, sha256, bytes) = hashing.finish();

        if !self.keep_staging {
            if let Err(e) = fs::remove_dir_all(&self.staging) {
                tracing::warn!(dir = %self.staging.display(), "could not remove staging dir: {}", e);
            }
        }

        tracing::info!(
            path = %final_path.display(),
            records = names.len(),
            bytes,
            "artifact written"
        );
        Ok(Artifact {
            path: final_path,
            format: self.spec.format,
            records: names.len(),
            bytes,
            sha256,
        })
    }
}
