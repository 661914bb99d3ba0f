//! `ndl novel <url>` – download a web novel's episodes.

use anyhow::{bail, Result};
use ndl_core::archive::OutputSpec;
use ndl_core::checkpoint::CheckpointStore;
use ndl_core::config::{NdlConfig, OutputFormat};
use ndl_core::extract::NovelExtractor;
use ndl_core::fetch::CurlFetcher;
use ndl_core::listing;
use ndl_core::orchestrator::{Job, Numbering};
use ndl_core::policy::SourcePattern;

use super::job::{apply_args, output_dir, run_job};
use crate::cli::JobArgs;

/// Reject delays below the configured floor for novel jobs.
pub(crate) fn check_delay(delay_ms: u64, min_delay_ms: u64) -> Result<()> {
    if delay_ms < min_delay_ms {
        bail!(
            "delay of {} ms is below the minimum of {} ms for novel downloads",
            delay_ms,
            min_delay_ms
        );
    }
    Ok(())
}

pub async fn run_novel(
    cfg: &NdlConfig,
    store: &CheckpointStore,
    url: &str,
    pages: usize,
    format: OutputFormat,
    args: &JobArgs,
) -> Result<()> {
    check_delay(args.delay_ms.unwrap_or(cfg.delay_ms), cfg.min_delay_ms)?;
    let fetcher = CurlFetcher::new(cfg.http());

    let list = listing::collect_item_refs(&fetcher, url, pages.max(1)).await?;
    if list.refs.is_empty() {
        bail!("no episode links found at {}", url);
    }
    println!("Found {} episodes", list.refs.len());

    let title = list.series_title.unwrap_or_else(|| "novel".to_string());
    let job = Job::new(title, list.refs)
        .with_numbering(Numbering::NewestFirst)
        .with_source(SourcePattern::Prefix(cfg.source_prefix.clone()));
    let job = apply_args(job, args, cfg.delay_ms);

    let dir = output_dir(args)?;
    let extractor = NovelExtractor::new()?;
    run_job(cfg, store, &fetcher, &extractor, job, args.yes, |job| match format {
        OutputFormat::Text => OutputSpec::text(dir.clone(), &job.title, job.range_start, job.range_end),
        OutputFormat::Zip => OutputSpec::zip(dir.clone(), &job.title),
    })
    .await
}
