//! Integration test: local HTML site, curl fetcher, novel extractor, SQLite
//! checkpoints and a staged text archive, including an abort and a resume in
//! a second "process".

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::site_server::{self, Route, SiteServer};
use ndl_core::archive::{ArchiveWriter, OutputSpec, StagedArchive};
use ndl_core::checkpoint::{CheckpointStore, CheckpointSummary, SqliteBackend};
use ndl_core::config::HttpConfig;
use ndl_core::control::{self, JobHandle};
use ndl_core::extract::NovelExtractor;
use ndl_core::fetch::CurlFetcher;
use ndl_core::interaction::{AutoInteraction, Interaction, ProgressReport};
use ndl_core::listing;
use ndl_core::orchestrator::{resolve_checkpoint, Job, Numbering, Orchestrator, Outcome};
use ndl_core::policy::SourcePattern;
use tempfile::tempdir;

fn episode(n: usize) -> String {
    format!(
        r#"<html><body>
        <div class="toon-title" title="Episode {n}">Episode {n}</div>
        <div id="novel_content"><p>Episode {n}</p><p>Body of episode {n}.</p></div>
        </body></html>"#
    )
}

/// Three episodes listed newest first; episode 2 is behind one interstitial.
fn site() -> SiteServer {
    let mut routes = HashMap::new();
    routes.insert(
        "/novel/9?spage=1".to_string(),
        Route::html(
            r#"<div id="content_wrapper"><div><span>Test Series</span></div></div>
               <a class="item-subject" href="/novel/9/3">3</a>
               <a class="item-subject" href="/novel/9/2">2</a>
               <a class="item-subject" href="/novel/9/1">1</a>"#,
        ),
    );
    routes.insert("/novel/9/1".to_string(), Route::html(episode(1)));
    routes.insert("/novel/9/2".to_string(), Route::html(episode(2)).challenged(1));
    routes.insert("/novel/9/3".to_string(), Route::html(episode(3)));
    site_server::start(routes)
}

async fn novel_job(server: &SiteServer, fetcher: &CurlFetcher) -> Job {
    let list_url = server.url("/novel/9");
    let list = listing::collect_item_refs(fetcher, &list_url, 1).await.unwrap();
    assert_eq!(list.refs.len(), 3);
    let title = list.series_title.expect("series title on the first list page");
    Job::new(title, list.refs)
        .with_numbering(Numbering::NewestFirst)
        .with_source(SourcePattern::Prefix(server.base().to_string()))
}

#[tokio::test]
async fn novel_download_completes_with_challenge_retry() {
    let server = site();
    let fetcher = CurlFetcher::new(HttpConfig::default());
    let job = novel_job(&server, &fetcher).await;
    assert_eq!(job.title, "Test Series");

    let state = tempdir().unwrap();
    let out = tempdir().unwrap();
    let store = CheckpointStore::new(Arc::new(
        SqliteBackend::open_at(state.path().join("checkpoints.db")).await.unwrap(),
    ));
    let extractor = NovelExtractor::new().unwrap();
    let interaction = AutoInteraction {
        resume: true,
        retry_challenges: true,
    };
    let spec = OutputSpec::text(out.path(), &job.title, job.range_start, job.range_end);
    let mut archive = StagedArchive::open(&state.path().join("staging"), &job.title, spec).unwrap();
    let (_handle, signal) = control::channel();

    let report = Orchestrator::new(&fetcher, &extractor, &store, &interaction, signal)
        .run(&job, None, &mut archive)
        .await
        .unwrap();
    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!((report.completed, report.failed, report.challenges), (3, 0, 1));
    assert_eq!(server.hits("/novel/9/2"), 2);
    assert_eq!(server.hits("/novel/9?spage=1"), 1);

    let artifact = archive.finalize().unwrap();
    assert_eq!(artifact.path, out.path().join("Test Series(1~3).txt"));
    let text = std::fs::read_to_string(&artifact.path).unwrap();
    assert_eq!(
        text,
        "Test Series\n\nDownloaded with ndl\n\n\
         Episode 1\n\nBody of episode 1.\n\n\
         Episode 2\n\nBody of episode 2.\n\n\
         Episode 3\n\nBody of episode 3.\n\n"
    );
    assert!(store.load("Test Series").await.is_none());
}

/// Retries challenges and aborts the job once `abort_at` items are done.
struct AbortAfter {
    handle: JobHandle,
    abort_at: usize,
}

#[async_trait]
impl Interaction for AbortAfter {
    fn report_progress(&self, report: &ProgressReport) {
        if report.completed >= self.abort_at {
            self.handle.abort();
        }
    }
    async fn confirm_challenge(&self, _item_ref: &str) -> bool {
        true
    }
    async fn confirm_resume(&self, _summary: &CheckpointSummary) -> bool {
        true
    }
}

#[tokio::test]
async fn aborted_novel_resumes_in_a_new_process() {
    let server = site();
    let fetcher = CurlFetcher::new(HttpConfig::default());
    let state = tempdir().unwrap();
    let out = tempdir().unwrap();
    let db_path = state.path().join("checkpoints.db");
    let staging = state.path().join("staging");
    let extractor = NovelExtractor::new().unwrap();

    {
        let job = novel_job(&server, &fetcher).await;
        let store = CheckpointStore::new(Arc::new(SqliteBackend::open_at(&db_path).await.unwrap()));
        let spec = OutputSpec::text(out.path(), &job.title, 1, 3);
        let mut archive = StagedArchive::open(&staging, &job.title, spec).unwrap();
        let (handle, signal) = control::channel();
        let interaction = AbortAfter { handle, abort_at: 2 };
        let report = Orchestrator::new(&fetcher, &extractor, &store, &interaction, signal)
            .run(&job, None, &mut archive)
            .await
            .unwrap();
        assert_eq!(report.outcome, Outcome::Aborted);
        assert_eq!(report.completed, 2);
    }

    let mut job = novel_job(&server, &fetcher).await;
    let store = CheckpointStore::new(Arc::new(SqliteBackend::open_at(&db_path).await.unwrap()));
    let interaction = AutoInteraction::default();
    let checkpoint = resolve_checkpoint(&store, &interaction, &mut job)
        .await
        .into_checkpoint()
        .expect("checkpoint persisted across processes");
    assert_eq!(checkpoint.completed_count, 2);

    let spec = OutputSpec::text(out.path(), &job.title, job.range_start, job.range_end);
    let mut archive = StagedArchive::open(&staging, &job.title, spec).unwrap();
    let (_handle, signal) = control::channel();
    let report = Orchestrator::new(&fetcher, &extractor, &store, &interaction, signal)
        .run(&job, Some(checkpoint), &mut archive)
        .await
        .unwrap();
    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.completed, 3);
    assert_eq!(server.hits("/novel/9/1"), 1);
    assert_eq!(server.hits("/novel/9/2"), 2);
    assert_eq!(server.hits("/novel/9/3"), 1);

    let artifact = archive.finalize().unwrap();
    assert_eq!(artifact.records, 3);
    let text = std::fs::read_to_string(&artifact.path).unwrap();
    assert!(text.contains("Body of episode 1."));
    assert!(text.contains("Body of episode 3."));
}
