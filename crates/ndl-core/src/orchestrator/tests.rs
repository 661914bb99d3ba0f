//! Orchestrator scenarios with in-process fakes for every collaborator.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::time::Instant;

use super::*;
use crate::archive::{ArchiveWriter, Artifact};
use crate::checkpoint::{Checkpoint, CheckpointBackend, CheckpointStore, CheckpointSummary, MemoryBackend};
use crate::config::OutputFormat;
use crate::control::{self, JobHandle};
use crate::extract::{Extracted, Extractor};
use crate::fetch::{FetchError, Fetcher, RawDocument};
use crate::interaction::{Interaction, ProgressReport};
use crate::policy::SourcePattern;

const BASE: &str = "https://booktoki1.com/novel/";

fn refs(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("{}{}", BASE, i)).collect()
}

/// Scripted answer for one fetch of a given reference.
#[derive(Clone)]
enum Reply {
    Page,
    Empty,
    Error(FetchError),
}

/// Serves `<p>` pages for every ref unless a script says otherwise. Scripts are
/// consumed in order per ref; once exhausted the ref serves a page.
#[derive(Default)]
struct FakeFetcher {
    scripts: Mutex<HashMap<String, Vec<Reply>>>,
    log: Mutex<Vec<(String, Instant)>>,
    /// Pause this handle right after the n-th fetch (1-based).
    pause_after: Mutex<Option<(usize, JobHandle)>>,
    abort_after: Mutex<Option<(usize, JobHandle)>>,
    /// Time each fetch takes before answering.
    latency: Duration,
    ends: Mutex<Vec<Instant>>,
}

impl FakeFetcher {
    fn script(self, item_ref: &str, replies: Vec<Reply>) -> Self {
        self.scripts.lock().unwrap().insert(item_ref.to_string(), replies);
        self
    }

    fn fetched(&self) -> Vec<String> {
        self.log.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
    }

    fn starts(&self) -> Vec<Instant> {
        self.log.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }

    fn ends(&self) -> Vec<Instant> {
        self.ends.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, item_ref: &str) -> Result<RawDocument, FetchError> {
        let n = {
            let mut log = self.log.lock().unwrap();
            log.push((item_ref.to_string(), Instant::now()));
            log.len()
        };
        if let Some((at, h)) = self.pause_after.lock().unwrap().as_ref() {
            if *at == n {
                h.pause();
            }
        }
        if let Some((at, h)) = self.abort_after.lock().unwrap().as_ref() {
            if *at == n {
                h.abort();
            }
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.ends.lock().unwrap().push(Instant::now());
        let reply = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(item_ref) {
                Some(s) if !s.is_empty() => s.remove(0),
                _ => Reply::Page,
            }
        };
        match reply {
            Reply::Page => Ok(RawDocument {
                url: item_ref.to_string(),
                content_type: Some("text/html".into()),
                body: format!("<p>{}</p>", item_ref).into_bytes(),
            }),
            Reply::Empty => Ok(RawDocument {
                url: item_ref.to_string(),
                content_type: Some("text/html".into()),
                body: b"<html>checking your browser</html>".to_vec(),
            }),
            Reply::Error(e) => Err(e),
        }
    }
}

/// Finds content only in `<p>` pages.
struct PExtractor;

impl Extractor for PExtractor {
    fn extract(&self, doc: &RawDocument) -> Option<Extracted> {
        let text = doc.text();
        let inner = text.strip_prefix("<p>")?.strip_suffix("</p>")?;
        Some(Extracted {
            title: inner.rsplit('/').next().unwrap_or_default().to_string(),
            body: format!("{}\n", inner).into_bytes(),
        })
    }
}

#[derive(Default)]
struct MemArchive {
    records: BTreeMap<String, Vec<u8>>,
    fail_on: Option<String>,
}

impl ArchiveWriter for MemArchive {
    fn add_record(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        if self.fail_on.as_deref() == Some(name) {
            return Err(anyhow!("disk full"));
        }
        self.records.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn finalize(&mut self) -> Result<Artifact> {
        Ok(Artifact {
            path: "mem".into(),
            format: OutputFormat::Text,
            records: self.records.len(),
            bytes: self.records.values().map(|b| b.len() as u64).sum(),
            sha256: String::new(),
        })
    }
}

struct Answers {
    challenges: Mutex<Vec<bool>>,
    resume: bool,
    reports: Mutex<Vec<ProgressReport>>,
    asked: AtomicUsize,
}

impl Answers {
    fn new(challenges: Vec<bool>) -> Self {
        Self {
            challenges: Mutex::new(challenges),
            resume: true,
            reports: Mutex::new(Vec::new()),
            asked: AtomicUsize::new(0),
        }
    }

    fn phases(&self) -> Vec<RunPhase> {
        self.reports.lock().unwrap().iter().map(|r| r.phase).collect()
    }
}

#[async_trait]
impl Interaction for Answers {
    fn report_progress(&self, report: &ProgressReport) {
        self.reports.lock().unwrap().push(report.clone());
    }

    async fn confirm_challenge(&self, _item_ref: &str) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        let mut c = self.challenges.lock().unwrap();
        if c.is_empty() {
            false
        } else {
            c.remove(0)
        }
    }

    async fn confirm_resume(&self, _summary: &CheckpointSummary) -> bool {
        self.resume
    }
}

/// Counts successful puts on top of an in-memory backend.
#[derive(Default)]
struct CountingBackend {
    inner: MemoryBackend,
    puts: AtomicUsize,
}

#[async_trait]
impl CheckpointBackend for CountingBackend {
    async fn put(&self, key: &str, cp: &Checkpoint) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(key, cp).await
    }
    async fn get(&self, key: &str) -> Result<Option<Checkpoint>> {
        self.inner.get(key).await
    }
    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }
    async fn list(&self) -> Result<Vec<Checkpoint>> {
        self.inner.list().await
    }
}

fn novel_job(n: usize, start: usize, end: usize) -> Job {
    Job::new("Test Novel", refs(n))
        .with_range(start, end)
        .with_numbering(Numbering::NewestFirst)
        .with_source(SourcePattern::Prefix("https://booktoki".into()))
}

#[tokio::test]
async fn completes_range_and_clears_checkpoint() {
    let fetcher = FakeFetcher::default();
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![]);
    let (_h, signal) = control::channel();
    let mut archive = MemArchive::default();

    let job = novel_job(20, 1, 10);
    let mut orch = Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal);
    let report = orch.run(&job, None, &mut archive).await.unwrap();

    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!((report.completed, report.failed, report.challenges), (10, 0, 0));
    assert_eq!(report.total, 10);
    // Episode 1 is the last list entry; indexes 19..=10 are fetched in order.
    let expected: Vec<String> = (10..20).rev().map(|i| format!("{}{}", BASE, i)).collect();
    assert_eq!(fetcher.fetched(), expected);
    assert_eq!(report.done_indexes.len(), 10);
    assert_eq!(archive.records.len(), 10);
    assert_eq!(report.records.first().map(String::as_str), Some("01.txt"));
    assert!(store.load("Test Novel").await.is_none());
    assert_eq!(answers.phases().last(), Some(&RunPhase::Completed));
}

#[tokio::test]
async fn challenge_then_success_counts_once() {
    let job = novel_job(20, 1, 10);
    let fifth = job.item_refs[job.numbering.index_of(5, 20)].clone();
    let fetcher = FakeFetcher::default().script(&fifth, vec![Reply::Empty]);
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![true]);
    let (_h, signal) = control::channel();
    let mut archive = MemArchive::default();

    let report = Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal)
        .run(&job, None, &mut archive)
        .await
        .unwrap();

    assert_eq!((report.completed, report.failed, report.challenges), (10, 0, 1));
    assert_eq!(fetcher.fetched().iter().filter(|r| **r == fifth).count(), 2);
    assert_eq!(answers.asked.load(Ordering::SeqCst), 1);
    let phases = answers.phases();
    assert!(phases.contains(&RunPhase::AwaitingHuman));
    assert!(phases.contains(&RunPhase::Retrying));
}

#[tokio::test]
async fn challenge_retried_only_once() {
    let job = novel_job(5, 1, 5);
    let second = job.item_refs[job.numbering.index_of(2, 5)].clone();
    let fetcher = FakeFetcher::default().script(&second, vec![Reply::Empty, Reply::Empty, Reply::Empty]);
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![true, true]);
    let (_h, signal) = control::channel();

    let report = Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal)
        .run(&job, None, &mut MemArchive::default())
        .await
        .unwrap();

    assert_eq!((report.completed, report.failed, report.challenges), (4, 1, 1));
    assert_eq!(fetcher.fetched().iter().filter(|r| **r == second).count(), 2);
    assert_eq!(answers.asked.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn declined_challenge_fails_item_without_retry() {
    let job = novel_job(3, 1, 3);
    let first = job.item_refs[job.numbering.index_of(1, 3)].clone();
    let fetcher = FakeFetcher::default().script(&first, vec![Reply::Error(FetchError::Http(503))]);
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![false]);
    let (_h, signal) = control::channel();

    let report = Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal)
        .run(&job, None, &mut MemArchive::default())
        .await
        .unwrap();

    assert_eq!((report.completed, report.failed, report.challenges), (2, 1, 1));
    assert_eq!(fetcher.fetched().len(), 3);
    assert!(!report.done_indexes.contains(&job.numbering.index_of(1, 3)));
}

#[tokio::test]
async fn hard_fetch_errors_skip_when_not_conflated() {
    let job = novel_job(3, 1, 3);
    let first = job.item_refs[job.numbering.index_of(1, 3)].clone();
    let fetcher = FakeFetcher::default().script(&first, vec![Reply::Error(FetchError::Http(404))]);
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![true]);
    let (_h, signal) = control::channel();

    let report = Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal)
        .fetch_errors_are_challenges(false)
        .run(&job, None, &mut MemArchive::default())
        .await
        .unwrap();

    assert_eq!((report.completed, report.failed, report.challenges), (2, 1, 0));
    assert_eq!(answers.asked.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn mismatched_reference_is_never_fetched() {
    let mut items = refs(4);
    items[1] = "https://elsewhere.example/ep".into();
    let job = Job::new("Mixed", items)
        .with_source(SourcePattern::Prefix("https://booktoki".into()));
    let fetcher = FakeFetcher::default();
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![true]);
    let (_h, signal) = control::channel();

    let report = Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal)
        .run(&job, None, &mut MemArchive::default())
        .await
        .unwrap();

    assert_eq!((report.completed, report.failed, report.challenges), (3, 1, 0));
    assert!(!fetcher.fetched().iter().any(|r| r.contains("elsewhere")));
    assert_eq!(answers.asked.load(Ordering::SeqCst), 0);
}

/// Same pages as [`PExtractor`], but every episode comes back under one title.
struct Retitled(&'static str);

impl Extractor for Retitled {
    fn extract(&self, doc: &RawDocument) -> Option<Extracted> {
        PExtractor.extract(doc).map(|e| Extracted {
            title: self.0.to_string(),
            ..e
        })
    }
}

#[tokio::test]
async fn refetch_after_lost_progress_replaces_the_same_record() {
    let job = Job::new("Crashy", refs(3));
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![]);
    let mut archive = MemArchive::default();

    let fetcher = FakeFetcher::default();
    let (_h, signal) = control::channel();
    Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal)
        .run(&job, None, &mut archive)
        .await
        .unwrap();

    // Only the first item made it into a checkpoint before the process died.
    let cp = Checkpoint {
        title: "Crashy".into(),
        range_start: 1,
        range_end: 3,
        completed_count: 1,
        failed_count: 0,
        challenge_count: 0,
        done_indexes: [0].into_iter().collect(),
        saved_at: 0,
    };
    let fetcher = FakeFetcher::default();
    let (_h, signal) = control::channel();
    let report = Orchestrator::new(&fetcher, &Retitled("Untitled episode"), &store, &answers, signal)
        .run(&job, Some(cp), &mut archive)
        .await
        .unwrap();

    assert_eq!(report.records, vec!["2.txt", "3.txt"]);
    assert_eq!(
        archive.records.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["1.txt", "2.txt", "3.txt"]
    );
}

#[tokio::test]
async fn archive_failure_counts_as_failed() {
    let job = Job::new("Gallery", refs(3));
    let fetcher = FakeFetcher::default();
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![]);
    let (_h, signal) = control::channel();
    let mut archive = MemArchive {
        fail_on: Some("2.txt".into()),
        ..Default::default()
    };

    let report = Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal)
        .run(&job, None, &mut archive)
        .await
        .unwrap();

    assert_eq!((report.completed, report.failed), (2, 1));
    assert!(!report.done_indexes.contains(&1));
}

#[tokio::test]
async fn invalid_job_fails_before_fetching() {
    let fetcher = FakeFetcher::default();
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![]);
    let (_h, signal) = control::channel();
    let mut orch = Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal);

    let err = orch
        .run(&Job::new("t", refs(5)).with_range(4, 9), None, &mut MemArchive::default())
        .await
        .unwrap_err();
    assert_eq!(err, JobError::InvalidRange { start: 4, end: 9, len: 5 });
    let err = orch
        .run(&Job::new("t", vec![]), None, &mut MemArchive::default())
        .await
        .unwrap_err();
    assert_eq!(err, JobError::EmptySource);
    assert!(fetcher.fetched().is_empty());
}

#[tokio::test]
async fn periodic_checkpoints_every_k_completions() {
    let backend = Arc::new(CountingBackend::default());
    let store = CheckpointStore::new(backend.clone());
    let fetcher = FakeFetcher::default();
    let answers = Answers::new(vec![]);
    let (_h, signal) = control::channel();

    Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal)
        .checkpoint_every(3)
        .run(&Job::new("K", refs(10)), None, &mut MemArchive::default())
        .await
        .unwrap();

    // After items 3, 6 and 9; cleared on completion.
    assert_eq!(backend.puts.load(Ordering::SeqCst), 3);
    assert!(store.load("K").await.is_none());
}

#[tokio::test]
async fn pause_persists_then_resume_continues_in_process() {
    let job = novel_job(20, 1, 10);
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![]);
    let (handle, signal) = control::channel();
    let fetcher = FakeFetcher::default();
    *fetcher.pause_after.lock().unwrap() = Some((3, handle.clone()));
    let mut archive = MemArchive::default();

    let mut orch = Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal);
    let (report, _) = tokio::join!(orch.run(&job, None, &mut archive), async {
        loop {
            if let Some(cp) = store.load("Test Novel").await {
                assert_eq!(cp.completed_count, 3);
                assert_eq!(cp.done_indexes.len(), 3);
                assert_eq!(fetcher.fetched().len(), 3, "no fetch while paused");
                handle.resume();
                break;
            }
            tokio::task::yield_now().await;
        }
    });

    let report = report.unwrap();
    assert_eq!(report.outcome, Outcome::Completed);
    assert_eq!(report.completed, 10);
    assert_eq!(fetcher.fetched().len(), 10);
    assert!(answers.phases().contains(&RunPhase::Paused));
}

#[tokio::test]
async fn paused_job_resumes_in_new_run_from_checkpoint() {
    let job = novel_job(20, 1, 10);
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![]);

    // First process: pause after item 3, then abort while paused.
    let (handle, signal) = control::channel();
    let first = FakeFetcher::default();
    *first.pause_after.lock().unwrap() = Some((3, handle.clone()));
    let mut archive = MemArchive::default();
    let mut orch = Orchestrator::new(&first, &PExtractor, &store, &answers, signal);
    let (report, _) = tokio::join!(orch.run(&job, None, &mut archive), async {
        while store.load("Test Novel").await.is_none() {
            tokio::task::yield_now().await;
        }
        handle.abort();
    });
    let report = report.unwrap();
    assert_eq!(report.outcome, Outcome::Aborted);
    assert_eq!(report.completed, 3);

    // Second process: resolve and resume.
    let mut job2 = novel_job(20, 1, 20);
    let decision = resolve_checkpoint(&store, &answers, &mut job2).await;
    assert_eq!((job2.range_start, job2.range_end), (1, 10));
    let cp = decision.into_checkpoint().expect("resumed");

    let second = FakeFetcher::default();
    let (_h, signal) = control::channel();
    let report = Orchestrator::new(&second, &PExtractor, &store, &answers, signal)
        .run(&job2, Some(cp), &mut archive)
        .await
        .unwrap();

    let expected: Vec<String> = (10..=16).rev().map(|i| format!("{}{}", BASE, i)).collect();
    assert_eq!(second.fetched(), expected, "only episodes 4..=10 fetched");
    assert_eq!(report.completed, 10);
    assert_eq!(archive.records.len(), 10);
    assert!(store.load("Test Novel").await.is_none());
}

#[tokio::test]
async fn resume_with_everything_done_fetches_nothing() {
    let job = Job::new("Done", refs(4));
    let cp = Checkpoint {
        title: "Done".into(),
        range_start: 1,
        range_end: 4,
        completed_count: 4,
        failed_count: 0,
        challenge_count: 2,
        done_indexes: (0..4).collect(),
        saved_at: 0,
    };
    let fetcher = FakeFetcher::default();
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![]);
    let (_h, signal) = control::channel();

    let report = Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal)
        .run(&job, Some(cp), &mut MemArchive::default())
        .await
        .unwrap();
    assert!(fetcher.fetched().is_empty());
    assert_eq!((report.completed, report.challenges), (4, 2));
}

#[tokio::test]
async fn resumed_done_set_is_filtered_to_range() {
    let job = Job::new("Range", refs(10)).with_range(3, 5);
    let cp = Checkpoint {
        title: "Range".into(),
        range_start: 3,
        range_end: 5,
        completed_count: 3,
        failed_count: 1,
        challenge_count: 0,
        done_indexes: [2, 7, 9].into_iter().collect(),
        saved_at: 0,
    };
    let fetcher = FakeFetcher::default();
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![]);
    let (_h, signal) = control::channel();

    let report = Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal)
        .run(&job, Some(cp), &mut MemArchive::default())
        .await
        .unwrap();
    assert_eq!(fetcher.fetched(), vec![format!("{}3", BASE), format!("{}4", BASE)]);
    assert_eq!((report.completed, report.failed), (3, 0));
}

#[tokio::test]
async fn counts_never_exceed_total() {
    let job = novel_job(8, 1, 8);
    let mut fetcher = FakeFetcher::default();
    for n in [2, 5, 7] {
        let r = job.item_refs[job.numbering.index_of(n, 8)].clone();
        fetcher = fetcher.script(&r, vec![Reply::Empty, Reply::Empty]);
    }
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![true, false, true]);
    let (_h, signal) = control::channel();

    let report = Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal)
        .run(&job, None, &mut MemArchive::default())
        .await
        .unwrap();

    let reports = answers.reports.lock().unwrap();
    let mut last = (0, 0);
    for r in reports.iter() {
        assert!(r.completed + r.failed <= r.total);
        assert!(r.completed >= last.0 && r.failed >= last.1, "counts are monotonic");
        last = (r.completed, r.failed);
    }
    assert_eq!((report.completed, report.failed, report.challenges), (5, 3, 3));
}

#[tokio::test(start_paused = true)]
async fn fetch_starts_respect_delay() {
    let delay = Duration::from_millis(300);
    let mut items = refs(6);
    items[2] = "https://elsewhere.example/x".into();
    let job = Job::new("Slow", items)
        .with_delay(delay)
        .with_source(SourcePattern::Prefix("https://booktoki".into()));
    let fetcher = FakeFetcher::default().script(&format!("{}3", BASE), vec![Reply::Empty]);
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![true]);
    let (_h, signal) = control::channel();

    let begun = Instant::now();
    let report = Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal)
        .run(&job, None, &mut MemArchive::default())
        .await
        .unwrap();
    assert_eq!((report.completed, report.failed, report.challenges), (5, 1, 1));

    let starts = fetcher.starts();
    assert_eq!(starts[0], begun, "no delay before the first item");
    for pair in starts.windows(2) {
        assert!(pair[1] - pair[0] >= delay, "fetch starts too close: {:?}", pair[1] - pair[0]);
    }
}

#[tokio::test(start_paused = true)]
async fn slow_fetches_still_idle_for_full_delay() {
    let delay = Duration::from_secs(1);
    let job = Job::new("Sluggish", refs(4)).with_delay(delay);
    let fetcher = FakeFetcher {
        latency: Duration::from_secs(3),
        ..Default::default()
    }
    .script(&format!("{}2", BASE), vec![Reply::Empty]);
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![true]);
    let (_h, signal) = control::channel();

    let report = Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal)
        .run(&job, None, &mut MemArchive::default())
        .await
        .unwrap();
    assert_eq!((report.completed, report.challenges), (4, 1));

    let (starts, ends) = (fetcher.starts(), fetcher.ends());
    assert_eq!(starts.len(), 5, "four items plus one retry");
    for i in 1..starts.len() {
        let idle = starts[i] - ends[i - 1];
        assert!(idle >= delay, "fetch {} started {:?} after the previous one ended", i, idle);
    }
}

#[tokio::test(start_paused = true)]
async fn pause_during_delay_keeps_floor() {
    let delay = Duration::from_secs(2);
    let job = Job::new("Floor", refs(3)).with_delay(delay);
    let store = CheckpointStore::in_memory();
    let answers = Answers::new(vec![]);
    let (handle, signal) = control::channel();
    let fetcher = FakeFetcher::default();

    let mut archive = MemArchive::default();
    let mut orch = Orchestrator::new(&fetcher, &PExtractor, &store, &answers, signal);
    let (report, _) = tokio::join!(orch.run(&job, None, &mut archive), async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.pause();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.load("Floor").await.is_some(), "pause saves immediately");
        handle.resume();
    });

    assert_eq!(report.unwrap().completed, 3);
    let starts = fetcher.starts();
    assert_eq!(starts.len(), 3);
    assert!(starts[1] - starts[0] >= delay);
    assert!(starts[2] - starts[1] >= delay);
}

#[tokio::test]
async fn abort_during_challenge_prompt_saves_checkpoint() {
    struct Stuck;

    #[async_trait]
    impl Interaction for Stuck {
        fn report_progress(&self, _report: &ProgressReport) {}
        async fn confirm_challenge(&self, _item_ref: &str) -> bool {
            std::future::pending().await
        }
        async fn confirm_resume(&self, _summary: &CheckpointSummary) -> bool {
            true
        }
    }

    let job = Job::new("Stuck", refs(4));
    let fetcher = FakeFetcher::default().script(&format!("{}1", BASE), vec![Reply::Empty]);
    let store = CheckpointStore::in_memory();
    let (handle, signal) = control::channel();

    let mut archive = MemArchive::default();
    let mut orch = Orchestrator::new(&fetcher, &PExtractor, &store, &Stuck, signal);
    let (report, _) = tokio::join!(orch.run(&job, None, &mut archive), async {
        while fetcher.fetched().len() < 2 {
            tokio::task::yield_now().await;
        }
        handle.abort();
    });

    let report = report.unwrap();
    assert_eq!(report.outcome, Outcome::Aborted);
    assert_eq!((report.completed, report.challenges), (1, 1));
    let cp = store.load("Stuck").await.expect("checkpoint kept on abort");
    assert_eq!(cp.done_indexes.into_iter().collect::<Vec<_>>(), vec![0]);
}

#[tokio::test]
async fn declining_resume_clears_checkpoint() {
    let store = CheckpointStore::in_memory();
    let cp = Checkpoint {
        title: "Again".into(),
        range_start: 2,
        range_end: 3,
        completed_count: 1,
        failed_count: 0,
        challenge_count: 0,
        done_indexes: [1].into_iter().collect(),
        saved_at: 0,
    };
    assert!(store.save("Again", &cp).await);

    let mut answers = Answers::new(vec![]);
    answers.resume = false;
    let mut job = Job::new("Again", refs(5));
    assert_eq!(resolve_checkpoint(&store, &answers, &mut job).await, ResumeDecision::Discarded);
    assert_eq!((job.range_start, job.range_end), (1, 5));
    assert!(store.load("Again").await.is_none());

    let mut job = Job::new("Again", refs(5));
    assert_eq!(resolve_checkpoint(&store, &answers, &mut job).await, ResumeDecision::Fresh);
}

#[tokio::test]
async fn checkpoint_range_that_no_longer_fits_is_discarded() {
    let store = CheckpointStore::in_memory();
    let cp = Checkpoint {
        title: "Shrunk".into(),
        range_start: 1,
        range_end: 30,
        completed_count: 0,
        failed_count: 0,
        challenge_count: 0,
        done_indexes: Default::default(),
        saved_at: 0,
    };
    assert!(store.save("Shrunk", &cp).await);
    let answers = Answers::new(vec![]);
    let mut job = Job::new("Shrunk", refs(10));
    assert_eq!(resolve_checkpoint(&store, &answers, &mut job).await, ResumeDecision::Discarded);
    assert_eq!(job.range_end, 10);
}
