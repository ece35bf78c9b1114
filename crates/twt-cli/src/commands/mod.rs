//! CLI subcommand implementations.

pub mod events;
pub mod report;
pub mod tasks;
pub mod track;
pub mod util;
