//! `ndl gallery <url>` – download a gallery page's images into a ZIP archive.

use anyhow::{bail, Context, Result};
use ndl_core::archive::OutputSpec;
use ndl_core::checkpoint::CheckpointStore;
use ndl_core::config::NdlConfig;
use ndl_core::extract::ImageExtractor;
use ndl_core::fetch::{CurlFetcher, Fetcher};
use ndl_core::listing;
use ndl_core::orchestrator::{Job, Numbering};
use ndl_core::policy::SourcePattern;

use super::job::{apply_args, output_dir, run_job};
use crate::cli::JobArgs;

pub async fn run_gallery(
    cfg: &NdlConfig,
    store: &CheckpointStore,
    url: &str,
    selector: &str,
    args: &JobArgs,
) -> Result<()> {
    let fetcher = CurlFetcher::new(cfg.http());
    let page = fetcher
        .fetch(url)
        .await
        .with_context(|| format!("fetch gallery page {}", url))?;
    let refs = listing::collect_image_refs(&page, selector)?;
    if refs.is_empty() {
        bail!("no images matched {:?} at {}", selector, url);
    }
    println!("Found {} images", refs.len());

    let title = listing::page_title(&page)?.unwrap_or_else(|| "gallery".to_string());
    let job = Job::new(title, refs)
        .with_numbering(Numbering::OldestFirst)
        .with_source(SourcePattern::AnyHttp);
    // Gallery jobs have no delay floor.
    let job = apply_args(job, args, cfg.delay_ms);

    let dir = output_dir(args)?;
    run_job(cfg, store, &fetcher, &ImageExtractor, job, args.yes, |job| {
        OutputSpec::zip(dir.clone(), &job.title)
    })
    .await
}
