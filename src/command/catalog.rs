//! The command catalog: registrable descriptors with typed argument specs
//! and validators, indexed by name and by id.

use phf::phf_map;

use super::CommandError;
use crate::core::Core;
use crate::objects::{ObjectStore, ServiceKey, Timestamp};

/// A handler invoked with the core and a fully bound command.
pub type HandlerFn = fn(&mut Core, &BoundCommand) -> Result<(), CommandError>;

/// Argument validator: runs after value binding, against the live store.
pub type ValidatorFn = fn(&ObjectStore, &ArgValue) -> bool;

/// Typed argument slots. Object kinds carry their target's name(s) and
/// resolve lazily against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Bool,
    Int,
    Ulong,
    Timestamp,
    Double,
    Str,
    Host,
    Hostgroup,
    Service,
    Servicegroup,
    Contact,
    Contactgroup,
    Timeperiod,
}

/// Tokens recognized in an argspec, e.g. `host=host_name;bool=persistent`.
static ARG_TYPE_TOKENS: phf::Map<&'static str, ArgKind> = phf_map! {
    "timeperiod" => ArgKind::Timeperiod,
    "host" => ArgKind::Host,
    "hostgroup" => ArgKind::Hostgroup,
    "service" => ArgKind::Service,
    "servicegroup" => ArgKind::Servicegroup,
    "contact" => ArgKind::Contact,
    "contactgroup" => ArgKind::Contactgroup,
    "str" => ArgKind::Str,
    "bool" => ArgKind::Bool,
    "int" => ArgKind::Int,
    "ulong" => ArgKind::Ulong,
    "timestamp" => ArgKind::Timestamp,
    "double" => ArgKind::Double,
};

impl ArgKind {
    pub fn from_token(token: &str) -> Option<ArgKind> {
        ARG_TYPE_TOKENS.get(token).copied()
    }

    pub fn is_object(self) -> bool {
        matches!(
            self,
            ArgKind::Host
                | ArgKind::Hostgroup
                | ArgKind::Service
                | ArgKind::Servicegroup
                | ArgKind::Contact
                | ArgKind::Contactgroup
                | ArgKind::Timeperiod
        )
    }

    pub fn is_stringy(self) -> bool {
        self == ArgKind::Str || self.is_object()
    }

    pub fn token(self) -> &'static str {
        match self {
            ArgKind::Bool => "bool",
            ArgKind::Int => "int",
            ArgKind::Ulong => "ulong",
            ArgKind::Timestamp => "timestamp",
            ArgKind::Double => "double",
            ArgKind::Str => "str",
            ArgKind::Host => "host",
            ArgKind::Hostgroup => "hostgroup",
            ArgKind::Service => "service",
            ArgKind::Servicegroup => "servicegroup",
            ArgKind::Contact => "contact",
            ArgKind::Contactgroup => "contactgroup",
            ArgKind::Timeperiod => "timeperiod",
        }
    }
}

/// A concrete argument value. Bools carry the raw parsed integer so the
/// 0/1 range check is the validator's call, like everything else.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Bool(i32),
    Int(i32),
    Ulong(u64),
    Timestamp(Timestamp),
    Double(f64),
    Str(String),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

// --- default validators -------------------------------------------------

fn noop_validator(_store: &ObjectStore, _v: &ArgValue) -> bool {
    true
}

fn validate_bool(_store: &ObjectStore, v: &ArgValue) -> bool {
    matches!(v, ArgValue::Bool(b) if (0..=1).contains(b))
}

fn validate_host(store: &ObjectStore, v: &ArgValue) -> bool {
    v.as_str().map_or(false, |s| store.host(s).is_some())
}

fn validate_hostgroup(store: &ObjectStore, v: &ArgValue) -> bool {
    v.as_str().map_or(false, |s| store.hostgroups.contains_key(s))
}

fn validate_service(store: &ObjectStore, v: &ArgValue) -> bool {
    v.as_str()
        .and_then(ServiceKey::from_joined)
        .map_or(false, |key| store.service_by_key(&key).is_some())
}

fn validate_servicegroup(store: &ObjectStore, v: &ArgValue) -> bool {
    v.as_str()
        .map_or(false, |s| store.servicegroups.contains_key(s))
}

fn validate_contact(store: &ObjectStore, v: &ArgValue) -> bool {
    v.as_str().map_or(false, |s| store.contact(s).is_some())
}

fn validate_contactgroup(store: &ObjectStore, v: &ArgValue) -> bool {
    v.as_str()
        .map_or(false, |s| store.contactgroups.contains_key(s))
}

fn validate_timeperiod(store: &ObjectStore, v: &ArgValue) -> bool {
    v.as_str().map_or(false, |s| store.timeperiod(s).is_some())
}

pub fn default_validator(kind: ArgKind) -> ValidatorFn {
    match kind {
        ArgKind::Bool => validate_bool,
        ArgKind::Host => validate_host,
        ArgKind::Hostgroup => validate_hostgroup,
        ArgKind::Service => validate_service,
        ArgKind::Servicegroup => validate_servicegroup,
        ArgKind::Contact => validate_contact,
        ArgKind::Contactgroup => validate_contactgroup,
        ArgKind::Timeperiod => validate_timeperiod,
        _ => noop_validator,
    }
}

// --- descriptors --------------------------------------------------------

#[derive(Clone)]
pub struct ArgDescriptor {
    pub name: String,
    pub kind: ArgKind,
    pub default: Option<ArgValue>,
    pub validator: ValidatorFn,
}

impl std::fmt::Debug for ArgDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .finish()
    }
}

#[derive(Clone)]
pub struct CommandDescriptor {
    pub name: String,
    pub id: i32,
    pub handler: Option<HandlerFn>,
    pub args: Vec<ArgDescriptor>,
    pub description: String,
}

impl std::fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("args", &self.args)
            .finish()
    }
}

impl CommandDescriptor {
    /// Creates a descriptor, parsing `argspec` (a `;`-separated list of
    /// `TYPE=NAME` tokens) into argument descriptors.
    pub fn new(
        name: &str,
        handler: Option<HandlerFn>,
        description: &str,
        argspec: Option<&str>,
    ) -> Result<Self, CommandError> {
        let mut desc = CommandDescriptor {
            name: name.to_string(),
            id: -1,
            handler,
            args: Vec::new(),
            description: description.to_string(),
        };
        if let Some(spec) = argspec {
            for token in spec.split(';').filter(|t| !t.is_empty()) {
                let (type_str, arg_name) = token.split_once('=').ok_or_else(|| {
                    CommandError::Internal(format!("malformed argspec token '{token}'"))
                })?;
                let kind = ArgKind::from_token(type_str)
                    .ok_or_else(|| CommandError::UnsupportedArgType(type_str.to_string()))?;
                desc.add_arg(arg_name, kind, None, None)?;
            }
        }
        Ok(desc)
    }

    /// Adds a single argument descriptor, optionally with a default value
    /// and a validator override. Duplicate names and defaults that fail
    /// their own validator are refused.
    pub fn add_arg(
        &mut self,
        name: &str,
        kind: ArgKind,
        default: Option<ArgValue>,
        validator: Option<ValidatorFn>,
    ) -> Result<(), CommandError> {
        if self.args.iter().any(|a| a.name == name) {
            return Err(CommandError::Internal(format!(
                "refusing to add already defined argument {name} for command {}",
                self.name
            )));
        }
        let validator = validator.unwrap_or_else(|| default_validator(kind));
        self.args.push(ArgDescriptor {
            name: name.to_string(),
            kind,
            default,
            validator,
        });
        Ok(())
    }

    /// Argspec rendering for catalog listings.
    pub fn argspec(&self) -> String {
        self.args
            .iter()
            .map(|a| format!("{}={}", a.kind.token(), a.name))
            .collect::<Vec<_>>()
            .join(";")
    }
}

// --- bound commands -----------------------------------------------------

#[derive(Debug, Clone)]
pub struct BoundArg {
    pub name: String,
    pub kind: ArgKind,
    pub value: Option<ArgValue>,
    pub(crate) validator: ValidatorFn,
}

/// A descriptor bound to concrete values: what the dispatcher consumes.
#[derive(Debug, Clone)]
pub struct BoundCommand {
    pub name: String,
    pub id: i32,
    pub entry_time: Timestamp,
    pub raw_arguments: String,
    pub handler: Option<HandlerFn>,
    pub args: Vec<BoundArg>,
}

impl BoundCommand {
    pub fn from_descriptor(desc: &CommandDescriptor, entry_time: Timestamp) -> Self {
        BoundCommand {
            name: desc.name.clone(),
            id: desc.id,
            entry_time,
            raw_arguments: String::new(),
            handler: desc.handler,
            args: desc
                .args
                .iter()
                .map(|a| BoundArg {
                    name: a.name.clone(),
                    kind: a.kind,
                    value: a.default.clone(),
                    validator: a.validator,
                })
                .collect(),
        }
    }

    fn value(&self, name: &str) -> Result<&ArgValue, CommandError> {
        self.args
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.value.as_ref())
            .ok_or_else(|| CommandError::Internal(format!("argument {name} has no bound value")))
    }

    pub fn bool_arg(&self, name: &str) -> Result<bool, CommandError> {
        match self.value(name)? {
            ArgValue::Bool(b) => Ok(*b > 0),
            other => Err(CommandError::Internal(format!(
                "argument {name} is not a bool: {other:?}"
            ))),
        }
    }

    pub fn int_arg(&self, name: &str) -> Result<i32, CommandError> {
        match self.value(name)? {
            ArgValue::Int(v) | ArgValue::Bool(v) => Ok(*v),
            other => Err(CommandError::Internal(format!(
                "argument {name} is not an int: {other:?}"
            ))),
        }
    }

    pub fn ulong_arg(&self, name: &str) -> Result<u64, CommandError> {
        match self.value(name)? {
            ArgValue::Ulong(v) => Ok(*v),
            other => Err(CommandError::Internal(format!(
                "argument {name} is not a ulong: {other:?}"
            ))),
        }
    }

    pub fn timestamp_arg(&self, name: &str) -> Result<Timestamp, CommandError> {
        match self.value(name)? {
            ArgValue::Timestamp(v) => Ok(*v),
            other => Err(CommandError::Internal(format!(
                "argument {name} is not a timestamp: {other:?}"
            ))),
        }
    }

    pub fn double_arg(&self, name: &str) -> Result<f64, CommandError> {
        match self.value(name)? {
            ArgValue::Double(v) => Ok(*v),
            other => Err(CommandError::Internal(format!(
                "argument {name} is not a double: {other:?}"
            ))),
        }
    }

    pub fn str_arg(&self, name: &str) -> Result<&str, CommandError> {
        match self.value(name)? {
            ArgValue::Str(s) => Ok(s),
            other => Err(CommandError::Internal(format!(
                "argument {name} is not a string: {other:?}"
            ))),
        }
    }

    /// `service` arguments bind as `host;description`; this splits them.
    pub fn service_key_arg(&self, name: &str) -> Result<ServiceKey, CommandError> {
        let joined = self.str_arg(name)?;
        ServiceKey::from_joined(joined).ok_or_else(|| {
            CommandError::Internal(format!("argument {name} is not a service reference"))
        })
    }
}

// --- the registry -------------------------------------------------------

#[derive(Debug, Default)]
pub struct CommandRegistry {
    slots: Vec<Option<CommandDescriptor>>,
    count: usize,
}

impl CommandRegistry {
    #[must_use]
    pub fn with_capacity(initial: usize) -> Self {
        CommandRegistry {
            slots: vec![None; initial.max(1)],
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Registers a descriptor. `id < 0` asks for the smallest free slot
    /// (the table doubles when full); `id >= 0` installs at that slot and
    /// fails if it is occupied. Duplicate names are refused.
    pub fn register(
        &mut self,
        mut desc: CommandDescriptor,
        id: i32,
    ) -> Result<i32, CommandError> {
        if self.by_name(&desc.name).is_some() {
            return Err(CommandError::Internal(format!(
                "refusing to re-register command {}",
                desc.name
            )));
        }
        let slot = if id >= 0 {
            let idx = id as usize;
            if idx >= self.slots.len() {
                self.slots.resize(idx + 1, None);
            }
            if self.slots[idx].is_some() {
                return Err(CommandError::Internal(format!(
                    "refusing to re-register command ID {id}"
                )));
            }
            idx
        } else if let Some(idx) = self.slots.iter().position(Option::is_none) {
            idx
        } else {
            // no space available, get some
            let old = self.slots.len();
            self.slots.resize(old * 2, None);
            old
        };
        desc.id = slot as i32;
        self.slots[slot] = Some(desc);
        self.count += 1;
        Ok(slot as i32)
    }

    /// Name lookups scan linearly; catalogs are small.
    pub fn by_name(&self, name: &str) -> Option<&CommandDescriptor> {
        self.slots
            .iter()
            .flatten()
            .find(|d| d.name == name)
    }

    pub fn by_id(&self, id: i32) -> Option<&CommandDescriptor> {
        if id < 0 {
            return None;
        }
        self.slots.get(id as usize).and_then(Option::as_ref)
    }

    pub fn unregister(&mut self, id: i32) -> Option<CommandDescriptor> {
        if id < 0 {
            return None;
        }
        let removed = self.slots.get_mut(id as usize).and_then(Option::take);
        if removed.is_some() {
            self.count -= 1;
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.slots.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str) -> CommandDescriptor {
        CommandDescriptor::new(name, None, "test command", Some("host=host_name;bool=flag"))
            .expect("valid argspec")
    }

    #[test]
    fn argspec_parses_types_and_names() {
        let desc = descriptor("TEST");
        assert_eq!(desc.args.len(), 2);
        assert_eq!(desc.args[0].kind, ArgKind::Host);
        assert_eq!(desc.args[0].name, "host_name");
        assert_eq!(desc.argspec(), "host=host_name;bool=flag");
    }

    #[test]
    fn unknown_type_token_is_refused() {
        let err = CommandDescriptor::new("X", None, "d", Some("gizmo=whatever")).unwrap_err();
        assert!(matches!(err, CommandError::UnsupportedArgType(_)));
    }

    #[test]
    fn register_assigns_smallest_free_slot() {
        let mut reg = CommandRegistry::with_capacity(4);
        reg.register(descriptor("A"), 2).unwrap();
        let id_b = reg.register(descriptor("B"), -1).unwrap();
        assert_eq!(id_b, 0);
        let id_c = reg.register(descriptor("C"), -1).unwrap();
        assert_eq!(id_c, 1);
        let id_d = reg.register(descriptor("D"), -1).unwrap();
        assert_eq!(id_d, 3);
        // table is full now, next registration doubles it
        let id_e = reg.register(descriptor("E"), -1).unwrap();
        assert_eq!(id_e, 4);
        assert_eq!(reg.len(), 5);
    }

    #[test]
    fn occupied_id_and_duplicate_name_are_refused() {
        let mut reg = CommandRegistry::with_capacity(4);
        reg.register(descriptor("A"), 1).unwrap();
        assert!(reg.register(descriptor("B"), 1).is_err());
        assert!(reg.register(descriptor("A"), -1).is_err());
        assert_eq!(reg.by_id(1).unwrap().name, "A");
        assert!(reg.by_name("B").is_none());
    }
}
