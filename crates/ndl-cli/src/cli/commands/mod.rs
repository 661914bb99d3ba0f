//! CLI command handlers. Each command is in its own file.

mod clear;
mod control;
mod docs;
mod gallery;
mod job;
mod novel;
mod status;

pub use clear::run_clear;
pub use control::{run_control, ControlVerb};
pub use docs::{run_completions, run_man};
pub use gallery::run_gallery;
pub use novel::run_novel;
pub use status::run_status;
