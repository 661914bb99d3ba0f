//! Interactive terminal: progress lines on stdout, y/n prompts on stdin.

use async_trait::async_trait;
use ndl_core::checkpoint::CheckpointSummary;
use ndl_core::interaction::{Interaction, ProgressReport};
use ndl_core::progress::format_duration;
use std::io::{self, BufRead, Write};
use tokio::sync::oneshot;

pub struct TerminalInteraction;

/// Ask on stdout and read one line from stdin. Reading happens on a plain
/// thread so an abandoned prompt (job aborted meanwhile) does not keep the
/// runtime from shutting down.
async fn ask(question: String) -> Option<String> {
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        print!("{}", question);
        let _ = io::stdout().flush();
        let mut line = String::new();
        let answer = match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        };
        let _ = tx.send(answer);
    });
    rx.await.ok().flatten()
}

/// Interpret a y/n answer; empty input picks `default`.
pub(crate) fn parse_yes_no(answer: &str, default: bool) -> bool {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}

pub(crate) fn progress_line(r: &ProgressReport) -> String {
    let done = r.completed + r.failed;
    let mut line = format!("  [{}/{}] {}", done, r.total, r.status_text);
    if let Some(ref stats) = r.stats {
        line.push_str(&format!("  {:.1}%", stats.percent));
        if let Some(eta) = stats.estimated_remaining {
            line.push_str(&format!("  ETA {}", format_duration(eta)));
        }
    }
    if r.failed > 0 || r.challenges > 0 {
        line.push_str(&format!("  (failed {}, challenges {})", r.failed, r.challenges));
    }
    line
}

#[async_trait]
impl Interaction for TerminalInteraction {
    fn report_progress(&self, report: &ProgressReport) {
        println!("{}", progress_line(report));
    }

    async fn confirm_challenge(&self, item_ref: &str) -> bool {
        let question = format!(
            "\nNo content at {}.\nOpen it in a browser and pass the check, then press Enter to retry (n = skip): ",
            item_ref
        );
        match ask(question).await {
            Some(answer) => parse_yes_no(&answer, true),
            None => false,
        }
    }

    async fn confirm_resume(&self, s: &CheckpointSummary) -> bool {
        let question = format!(
            "Found a checkpoint for \"{}\": {} done, {} failed (range {}~{}). Resume? [Y/n] ",
            s.title, s.completed_count, s.failed_count, s.range_start, s.range_end
        );
        match ask(question).await {
            Some(answer) => parse_yes_no(&answer, true),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndl_core::orchestrator::RunPhase;
    use ndl_core::progress::ProgressStats;
    use std::time::Duration;

    #[test]
    fn yes_no_answers() {
        assert!(parse_yes_no("\n", true));
        assert!(!parse_yes_no("", false));
        assert!(parse_yes_no("Y\n", false));
        assert!(!parse_yes_no(" no ", true));
        assert!(parse_yes_no("maybe", true));
    }

    #[test]
    fn progress_line_includes_eta_and_failures() {
        let r = ProgressReport {
            status_text: "Downloaded #4 (4/10)".into(),
            phase: RunPhase::Running,
            completed: 3,
            failed: 1,
            challenges: 2,
            total: 10,
            stats: Some(ProgressStats {
                percent: 30.0,
                elapsed: Duration::from_secs(20),
                estimated_remaining: Some(Duration::from_secs(42)),
                items_per_sec: 0.15,
            }),
        };
        let line = progress_line(&r);
        assert!(line.contains("[4/10]"));
        assert!(line.contains("30.0%"));
        assert!(line.contains("ETA 42s"));
        assert!(line.contains("failed 1, challenges 2"));
    }
}
