//! `ndl pause|resume|abort <title>` – signal a job running in another `ndl` process.

use anyhow::Result;

use crate::cli::control_socket;

/// Control-socket verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlVerb {
    Pause,
    Resume,
    Abort,
}

impl ControlVerb {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlVerb::Pause => "pause",
            ControlVerb::Resume => "resume",
            ControlVerb::Abort => "abort",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pause" => Some(ControlVerb::Pause),
            "resume" => Some(ControlVerb::Resume),
            "abort" => Some(ControlVerb::Abort),
            _ => None,
        }
    }
}

pub async fn run_control(verb: ControlVerb, title: &str) -> Result<()> {
    let path = ndl_core::control::control_socket_path(title)?;
    if control_socket::send(&path, verb, title).await? {
        println!("Sent {} to {}", verb.as_str(), title);
    } else {
        println!("No running ndl job to {}", verb.as_str());
    }
    Ok(())
}
