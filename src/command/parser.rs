//! External command parsing: positional `[ts] NAME;arg;…` lines and
//! key=value bodies, bound and validated against the catalog.

use super::catalog::{ArgKind, ArgValue, BoundArg, BoundCommand, CommandRegistry};
use super::{parse_mode, CommandError};
use crate::kvvec::KvVec;
use crate::objects::{ObjectStore, Timestamp};

/// Outcome of a successful parse. Custom commands (names starting with
/// `_`) bind but must never reach a built-in handler; they are handed to
/// observers only.
#[derive(Debug, Clone)]
pub enum Parsed {
    Builtin(BoundCommand),
    Custom(BoundCommand),
}

impl Parsed {
    pub fn is_custom(&self) -> bool {
        matches!(self, Parsed::Custom(_))
    }

    pub fn command(&self) -> &BoundCommand {
        match self {
            Parsed::Builtin(c) | Parsed::Custom(c) => c,
        }
    }

    pub fn into_command(self) -> BoundCommand {
        match self {
            Parsed::Builtin(c) | Parsed::Custom(c) => c,
        }
    }
}

// --- strict numeric parsing --------------------------------------------
//
// Mirrors the C strto* wrappers: empty input, trailing garbage and
// overflow all fail. Rust's str::parse has exactly those semantics.

pub fn parse_int(s: &str) -> Result<i32, CommandError> {
    s.parse::<i32>()
        .map_err(|e| CommandError::TypeMismatch(format!("'{e}' while parsing integer '{s}'")))
}

pub fn parse_ulong(s: &str) -> Result<u64, CommandError> {
    s.parse::<u64>()
        .map_err(|e| CommandError::TypeMismatch(format!("'{e}' while parsing ulong '{s}'")))
}

pub fn parse_double(s: &str) -> Result<f64, CommandError> {
    s.parse::<f64>()
        .map_err(|e| CommandError::TypeMismatch(format!("'{e}' while parsing double '{s}'")))
}

/// Timestamps parse as unsigned long, then cast.
pub fn parse_timestamp(s: &str) -> Result<Timestamp, CommandError> {
    parse_ulong(s).map(|v| v as Timestamp)
}

/// Parses a raw command in the modes enabled by `mode`, trying positional
/// first. The first mode that matches without error wins; when every
/// enabled mode fails, the last error is surfaced.
pub fn parse(
    registry: &CommandRegistry,
    store: &ObjectStore,
    line: &str,
    mode: u32,
    now: Timestamp,
) -> Result<Parsed, CommandError> {
    if mode & parse_mode::ANY == 0 {
        return Err(CommandError::UnsupportedParseMode(mode));
    }
    let line = line.trim_end_matches(['\r', '\n']);
    let mut last_err = None;
    if mode & parse_mode::POSITIONAL != 0 {
        match parse_positional(registry, store, line) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => last_err = Some(e),
        }
    }
    if mode & parse_mode::KV != 0 {
        match parse_kv(registry, store, line, now) {
            Ok(parsed) => return Ok(parsed),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err
        .unwrap_or_else(|| CommandError::Internal("no parser produced a result".to_string())))
}

// --- positional syntax --------------------------------------------------

fn parse_positional(
    registry: &CommandRegistry,
    store: &ObjectStore,
    line: &str,
) -> Result<Parsed, CommandError> {
    let rest = line.strip_prefix('[').ok_or_else(|| {
        CommandError::Malformed("commands must begin with a timestamp inside square brackets".into())
    })?;
    let (ts_str, rest) = rest.split_once(']').ok_or_else(|| {
        CommandError::Malformed("commands must begin with a timestamp inside square brackets".into())
    })?;
    let entry_time = parse_ulong(ts_str.trim())
        .map_err(|e| CommandError::Malformed(format!("failed to parse command timestamp: {e}")))?
        as Timestamp;

    let body = rest.trim_start();
    let (name, raw_args) = match body.split_once(';') {
        Some((n, a)) => (n, a),
        None => (body, ""),
    };
    if name.is_empty() {
        return Err(CommandError::Malformed(
            "couldn't find command name in command string".into(),
        ));
    }

    if name.starts_with('_') {
        // custom command: bound, logged, but never dispatched internally
        return Ok(Parsed::Custom(BoundCommand {
            name: name.to_string(),
            id: -1,
            entry_time,
            raw_arguments: raw_args.to_string(),
            handler: None,
            args: Vec::new(),
        }));
    }

    let desc = registry
        .by_name(name)
        .ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;
    let mut bound = BoundCommand::from_descriptor(desc, entry_time);
    bound.raw_arguments = raw_args.to_string();
    bind_positional_arguments(raw_args, &mut bound.args, store)?;
    Ok(Parsed::Builtin(bound))
}

/// Splits `raw` on `;` into the argument slots, honoring the grammar's
/// special cases: a `service` argument consumes two tokens, and the last
/// argument of kind `str` swallows any remaining separators.
fn bind_positional_arguments(
    raw: &str,
    args: &mut [BoundArg],
    store: &ObjectStore,
) -> Result<(), CommandError> {
    let argc = args.len();
    let mut i = 0usize;
    let mut rest: Option<&str> = Some(raw);

    while let Some(cur) = rest {
        let (mut token, mut next) = match cur.split_once(';') {
            Some((t, r)) => (t, Some(r)),
            None => (cur, None),
        };
        // the last string argument keeps unescaped semicolons
        if i + 1 == argc && args[i].kind == ArgKind::Str && next.is_some() {
            token = cur;
            next = None;
        }

        if i >= argc {
            if argc > 0 {
                return Err(CommandError::ExcessArg { expected: argc });
            }
            // zero declared arguments: remaining text is ignored
            break;
        }

        if token.is_empty() {
            if args[i].value.is_none() {
                return Err(CommandError::MissingArg(args[i].name.clone()));
            }
            // keep the default
            i += 1;
            rest = next;
            continue;
        }

        let value = match args[i].kind {
            ArgKind::Service => {
                // look-ahead: the description is the following token
                let lookahead = next.ok_or_else(|| {
                    CommandError::TypeMismatch(format!(
                        "no service description provided at argument {}",
                        i + 1
                    ))
                })?;
                let (desc, after) = match lookahead.split_once(';') {
                    Some((d, r)) => (d, Some(r)),
                    None => (lookahead, None),
                };
                next = after;
                ArgValue::Str(format!("{token};{desc}"))
            }
            ArgKind::Str
            | ArgKind::Host
            | ArgKind::Hostgroup
            | ArgKind::Servicegroup
            | ArgKind::Contact
            | ArgKind::Contactgroup
            | ArgKind::Timeperiod => ArgValue::Str(token.to_string()),
            ArgKind::Bool => ArgValue::Bool(wrap_arg_err(parse_int(token), &args[i].name)?),
            ArgKind::Int => ArgValue::Int(wrap_arg_err(parse_int(token), &args[i].name)?),
            ArgKind::Ulong => ArgValue::Ulong(wrap_arg_err(parse_ulong(token), &args[i].name)?),
            ArgKind::Timestamp => {
                ArgValue::Timestamp(wrap_arg_err(parse_timestamp(token), &args[i].name)?)
            }
            ArgKind::Double => ArgValue::Double(wrap_arg_err(parse_double(token), &args[i].name)?),
        };

        if !(args[i].validator)(store, &value) {
            return Err(CommandError::ValidationFailure(format!(
                "{} as type {} (argument {})",
                args[i].name,
                args[i].kind.token(),
                i
            )));
        }
        args[i].value = Some(value);
        i += 1;
        rest = next;
    }

    // trailing arguments may still be satisfied by defaults
    while i < argc && args[i].value.is_some() {
        i += 1;
    }
    if i < argc {
        return Err(CommandError::MissingArg(args[i].name.clone()));
    }
    Ok(())
}

fn wrap_arg_err<T>(res: Result<T, CommandError>, arg: &str) -> Result<T, CommandError> {
    res.map_err(|e| match e {
        CommandError::TypeMismatch(msg) => {
            CommandError::TypeMismatch(format!("couldn't parse argument {arg}: {msg}"))
        }
        other => other,
    })
}

// --- key=value syntax ---------------------------------------------------

fn parse_kv(
    registry: &CommandRegistry,
    store: &ObjectStore,
    line: &str,
    now: Timestamp,
) -> Result<Parsed, CommandError> {
    let mut kvv = KvVec::new();
    if kvv.decode(line.as_bytes(), b'=', b';') == 0 {
        return Err(CommandError::Malformed(format!(
            "command string is not a valid key/value vector: '{line}'"
        )));
    }
    kvv.sort();

    let cmd_name = kvv
        .fetch_str("command")
        .ok_or_else(|| {
            CommandError::UnknownCommand("no command name found - expected key 'command'".into())
        })?
        .to_string();
    let desc = registry
        .by_name(&cmd_name)
        .ok_or_else(|| CommandError::UnknownCommand(cmd_name.clone()))?;

    let mut bound = BoundCommand::from_descriptor(desc, now);
    let mut raw_args = Vec::with_capacity(bound.args.len());
    for arg in &mut bound.args {
        let Some(text) = kvv.fetch_str(&arg.name) else {
            if arg.value.is_some() {
                // descriptor default stands in for the missing key
                continue;
            }
            return Err(CommandError::MissingArg(arg.name.clone()));
        };
        let value = match arg.kind {
            ArgKind::Str
            | ArgKind::Service
            | ArgKind::Host
            | ArgKind::Hostgroup
            | ArgKind::Servicegroup
            | ArgKind::Contact
            | ArgKind::Contactgroup
            | ArgKind::Timeperiod => ArgValue::Str(text.to_string()),
            ArgKind::Bool => ArgValue::Bool(wrap_arg_err(parse_int(text), &arg.name)?),
            ArgKind::Int => ArgValue::Int(wrap_arg_err(parse_int(text), &arg.name)?),
            ArgKind::Ulong => ArgValue::Ulong(wrap_arg_err(parse_ulong(text), &arg.name)?),
            ArgKind::Timestamp => {
                ArgValue::Timestamp(wrap_arg_err(parse_timestamp(text), &arg.name)?)
            }
            ArgKind::Double => ArgValue::Double(wrap_arg_err(parse_double(text), &arg.name)?),
        };
        if !(arg.validator)(store, &value) {
            return Err(CommandError::ValidationFailure(format!(
                "{} as type {}",
                arg.name,
                arg.kind.token()
            )));
        }
        arg.value = Some(value);
        raw_args.push(text.to_string());
    }
    bound.raw_arguments = raw_args.join(";");
    Ok(Parsed::Builtin(bound))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_numerics_reject_trailing_garbage() {
        assert!(parse_int("12abc").is_err());
        assert!(parse_int("").is_err());
        assert!(parse_int("12").is_ok());
        assert!(parse_ulong("-3").is_err());
        assert!(parse_ulong("99999999999999999999999").is_err());
        assert!(parse_double("3.5x").is_err());
        assert!(parse_double("3.5").is_ok());
    }
}
