//! Command handlers: bridge CLI args -> core subscription -> output formatting.

pub mod config_cmd;
pub mod snapshot;
pub mod watch;
