//! Shared runner for `ndl novel` and `ndl gallery`: resume prompt, staging,
//! control socket, Ctrl-C, orchestrator run and final assembly.

use anyhow::{bail, Context, Result};
use ndl_core::archive::{ArchiveWriter, OutputSpec, StagedArchive};
use ndl_core::checkpoint::CheckpointStore;
use ndl_core::config::NdlConfig;
use ndl_core::control::JobControl;
use ndl_core::extract::Extractor;
use ndl_core::fetch::Fetcher;
use ndl_core::interaction::{AutoInteraction, Interaction};
use ndl_core::orchestrator::{resolve_checkpoint, Job, Orchestrator, Outcome, ResumeDecision};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::terminal::TerminalInteraction;
use crate::cli::{control_socket, JobArgs};

/// Apply `--start/--end/--delay-ms/--title` to a freshly listed job.
pub(crate) fn apply_args(mut job: Job, args: &JobArgs, default_delay_ms: u64) -> Job {
    if let Some(title) = args.title.as_ref().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        job.title = title.to_string();
    }
    let len = job.item_refs.len();
    let start = args.start.unwrap_or(1);
    let end = args.end.unwrap_or(len);
    job.with_range(start, end)
        .with_delay(Duration::from_millis(args.delay_ms.unwrap_or(default_delay_ms)))
}

pub(crate) fn output_dir(args: &JobArgs) -> Result<PathBuf> {
    match args.output {
        Some(ref dir) => Ok(dir.clone()),
        None => std::env::current_dir().context("current directory"),
    }
}

/// Run `job` end to end. `output` builds the deliverable's spec once the
/// final range is known (a resumed job adopts its checkpoint's range).
pub(crate) async fn run_job(
    cfg: &NdlConfig,
    store: &CheckpointStore,
    fetcher: &dyn Fetcher,
    extractor: &dyn Extractor,
    mut job: Job,
    assume_yes: bool,
    output: impl Fn(&Job) -> OutputSpec,
) -> Result<()> {
    job.validate()?;
    let interaction: Box<dyn Interaction> = if assume_yes {
        Box::new(AutoInteraction {
            resume: true,
            retry_challenges: true,
        })
    } else {
        Box::new(TerminalInteraction)
    };

    let socket_path = ndl_core::control::control_socket_path(&job.title)?;
    if control_socket::is_live(&socket_path) {
        bail!("{} is already being downloaded by another ndl process", job.title);
    }

    let decision = resolve_checkpoint(store, interaction.as_ref(), &mut job).await;
    let staging_root = StagedArchive::default_root()?;
    let mut archive = StagedArchive::open(&staging_root, &job.title, output(&job))?;
    let checkpoint = match decision {
        ResumeDecision::Resumed(cp) => Some(cp),
        ResumeDecision::Fresh | ResumeDecision::Discarded => {
            // Records staged without a checkpoint belong to an abandoned run.
            archive.discard()?;
            None
        }
    };

    let job_control = Arc::new(JobControl::new());
    let (handle, signal) = job_control.register(&job.title);
    let listener = match control_socket::spawn_control_listener(Arc::clone(&job_control), &socket_path) {
        Ok(l) => {
            tracing::debug!(path = %l.path().display(), "control socket listening");
            Some(l)
        }
        Err(e) => {
            tracing::warn!("control socket unavailable: {:#}", e);
            None
        }
    };
    let ctrl_c = {
        let handle = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\nInterrupted; saving checkpoint...");
                handle.abort();
            }
        })
    };

    println!(
        "{}: items {}~{} of {}, {} ms between fetches",
        job.title,
        job.range_start,
        job.range_end,
        job.item_refs.len(),
        job.delay.as_millis()
    );
    let report = Orchestrator::new(fetcher, extractor, store, interaction.as_ref(), signal)
        .checkpoint_every(cfg.checkpoint_every)
        .progress_window(cfg.progress_window)
        .fetch_errors_are_challenges(cfg.fetch_errors_are_challenges)
        .run(&job, checkpoint, &mut archive)
        .await;
    ctrl_c.abort();
    drop(listener);
    job_control.unregister(&job.title);
    let report = report?;

    if report.outcome == Outcome::Aborted {
        archive.keep_staging(true);
    }
    let artifact = archive.finalize()?;
    match report.outcome {
        Outcome::Completed => println!(
            "Done: {} downloaded, {} failed, {} challenges -> {}",
            report.completed,
            report.failed,
            report.challenges,
            artifact.path.display()
        ),
        Outcome::Aborted => println!(
            "Aborted after {} of {} items; partial file {}. Run the same command again to resume.",
            report.completed,
            report.total,
            artifact.path.display()
        ),
    }
    println!("  {} records, {} bytes, sha256 {}", artifact.records, artifact.bytes, artifact.sha256);
    Ok(())
}
