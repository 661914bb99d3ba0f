pub mod config;
pub mod logging;

pub mod archive;
pub mod checkpoint;
pub mod control;
pub mod extract;
pub mod fetch;
pub mod interaction;
pub mod listing;
pub mod naming;
pub mod orchestrator;
pub mod policy;
pub mod progress;
