//! External command subsystem: typed catalog, line parser and handler
//! dispatch.

pub mod catalog;
pub mod handlers;
pub mod parser;

use thiserror::Error;

/// Parse-mode bitmask. Both modes may be enabled; the parser tries them in
/// a defined order (positional first) and stops at the first that matches.
pub mod parse_mode {
    pub const POSITIONAL: u32 = 1 << 0;
    pub const KV: u32 = 1 << 1;
    pub const ANY: u32 = POSITIONAL | KV;
}

/// The fixed command-error table. `CustomCommand` is a signal, not a
/// failure: the parse succeeded but dispatch must be skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("command failed")]
    Failure,
    #[error("internal error: {0}")]
    Internal(String),
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("malformed command: {0}")]
    Malformed(String),
    #[error("no value for argument {0} provided, and no default found")]
    MissingArg(String),
    #[error("too many arguments to command - expected {expected}")]
    ExcessArg { expected: usize },
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    #[error("unsupported argument type '{0}'")]
    UnsupportedArgType(String),
    #[error("failed validation of {0}")]
    ValidationFailure(String),
    #[error("unsupported parse mode {0:#x}")]
    UnsupportedParseMode(u32),
    #[error("custom commands are not handled by the core")]
    CustomCommand,
}
