//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function. Stage commands
//! hold the instance lock and write to the activity log for their whole run.

pub mod assemble;
pub mod clean;
pub mod config;
pub mod history;
pub mod intake;
pub mod load;
pub mod merge;
pub mod normalize;
pub mod stage;
pub mod strip;
pub mod trailer;
