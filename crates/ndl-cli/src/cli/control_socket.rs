//! Control socket: server (while `ndl novel`/`ndl gallery` runs) and client
//! (for `ndl pause|resume|abort`). Each job listens on its own socket.
//! Protocol: one line per command, "<verb> <title>"; the server answers each
//! with "ok" or "unknown".

use anyhow::{bail, Result};
use ndl_core::control::JobControl;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use super::commands::ControlVerb;

/// Split a protocol line into verb and title. Titles may contain spaces.
pub fn parse_line(line: &str) -> Option<(ControlVerb, &str)> {
    let (verb, title) = line.trim().split_once(' ')?;
    let title = title.trim();
    if title.is_empty() {
        return None;
    }
    Some((ControlVerb::parse(verb)?, title))
}

fn apply(control: &JobControl, verb: ControlVerb, title: &str) -> bool {
    match verb {
        ControlVerb::Pause => control.request_pause(title),
        ControlVerb::Resume => control.request_resume(title),
        ControlVerb::Abort => control.request_abort(title),
    }
}

/// True if some process accepts connections on `path`.
pub fn is_live(path: &Path) -> bool {
    std::os::unix::net::UnixStream::connect(path).is_ok()
}

/// Running listener. Dropping it stops the task and removes the socket file.
pub struct ControlListener {
    path: PathBuf,
    task: tokio::task::JoinHandle<()>,
}

impl ControlListener {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ControlListener {
    fn drop(&mut self) {
        self.task.abort();
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Spawns a task that listens on `path` and routes each command line to
/// `job_control`. Malformed lines are answered with "unknown".
///
/// A stale socket file is replaced; one with a live listener is an error.
pub fn spawn_control_listener(
    job_control: Arc<JobControl>,
    path: impl AsRef<Path>,
) -> Result<ControlListener> {
    let path = path.as_ref().to_path_buf();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if path.exists() {
        if is_live(&path) {
            bail!("control socket {} is in use by another ndl process", path.display());
        }
        std::fs::remove_file(&path)?;
    }
    let listener = UnixListener::bind(&path)?;
    let task = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let control = Arc::clone(&job_control);
                    tokio::spawn(async move {
                        let (read, mut write) = stream.into_split();
                        let mut lines = BufReader::new(read).lines();
                        while let Ok(Some(line)) = lines.next_line().await {
                            let delivered = match parse_line(&line) {
                                Some((verb, title)) => {
                                    tracing::info!(verb = verb.as_str(), title, "control command");
                                    apply(&control, verb, title)
                                }
                                None => false,
                            };
                            let reply: &[u8] = if delivered { b"ok\n" } else { b"unknown\n" };
                            if write.write_all(reply).await.is_err() {
                                break;
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(ControlListener { path, task })
}

/// Sends "<verb> <title>\n" to the control socket. Returns false if no `ndl`
/// process is listening or it has no job with this title.
pub async fn send(socket_path: &Path, verb: ControlVerb, title: &str) -> Result<bool> {
    if !socket_path.exists() {
        return Ok(false);
    }
    let stream = match UnixStream::connect(socket_path).await {
        Ok(s) => s,
        // Stale socket file left by a process that exited.
        Err(_) => return Ok(false),
    };
    let (read, mut write) = stream.into_split();
    let msg = format!("{} {}\n", verb.as_str(), title);
    write.write_all(msg.as_bytes()).await?;
    let mut reply = String::new();
    BufReader::new(read).read_line(&mut reply).await?;
    Ok(reply.trim() == "ok")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_verb_and_title_with_spaces() {
        assert_eq!(parse_line("pause My Novel\n"), Some((ControlVerb::Pause, "My Novel")));
        assert_eq!(parse_line("abort  x "), Some((ControlVerb::Abort, "x")));
        assert_eq!(parse_line("resume"), None);
        assert_eq!(parse_line("cancel x"), None);
        assert_eq!(parse_line("pause   "), None);
    }

    #[tokio::test]
    async fn socket_routes_commands_to_registered_job() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let control = Arc::new(JobControl::new());
        let (_handle, signal) = control.register("My Novel");
        let _listener = spawn_control_listener(Arc::clone(&control), &path).unwrap();

        assert!(send(&path, ControlVerb::Pause, "My Novel").await.unwrap());
        assert!(signal.is_paused());
        assert!(!send(&path, ControlVerb::Pause, "Other").await.unwrap());
        assert!(send(&path, ControlVerb::Resume, "My Novel").await.unwrap());
        assert!(!signal.is_paused());
        assert!(send(&path, ControlVerb::Abort, "My Novel").await.unwrap());
        assert!(signal.is_aborted());
    }

    #[tokio::test]
    async fn second_listener_cannot_take_over_live_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let first = Arc::new(JobControl::new());
        let (_a, signal_a) = first.register("Novel A");
        let _listener = spawn_control_listener(Arc::clone(&first), &path).unwrap();

        let second = Arc::new(JobControl::new());
        let (_b, _signal_b) = second.register("Novel B");
        assert!(spawn_control_listener(Arc::clone(&second), &path).is_err());

        assert!(send(&path, ControlVerb::Pause, "Novel A").await.unwrap());
        assert!(signal_a.is_paused());
    }

    #[tokio::test]
    async fn stale_socket_is_replaced_and_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(path.exists() && !is_live(&path));

        let control = Arc::new(JobControl::new());
        let (_h, signal) = control.register("Novel A");
        let listener = spawn_control_listener(Arc::clone(&control), &path).unwrap();
        assert!(send(&path, ControlVerb::Abort, "Novel A").await.unwrap());
        assert!(signal.is_aborted());

        drop(listener);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn missing_socket_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.sock");
        assert!(!send(&path, ControlVerb::Abort, "x").await.unwrap());
    }
}
