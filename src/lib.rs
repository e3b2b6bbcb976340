// Module declarations for the library crate.

pub mod broker;
pub mod cli;
pub mod command;
pub mod commandfile;
pub mod config;
pub mod core;
pub mod downtime;
pub mod events;
pub mod flapping;
pub mod kvvec;
pub mod notifications;
pub mod objects;
pub mod telemetry;
pub mod util;
pub mod workers;

// Re-export the pieces tests and embedders reach for most.
pub use crate::command::handlers::process_external_command;
pub use crate::command::parse_mode;
pub use crate::core::Core;
