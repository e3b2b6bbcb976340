//! The monitored object graph: hosts, services, contacts, groups,
//! timeperiods, dependencies and comments, plus the program-wide runtime
//! flags.
//!
//! Configuration loading proper is out of scope for the control plane; the
//! store is built from an already-parsed [`ObjectConfig`] (JSON in the
//! shipped daemon, constructed directly in tests). Relationships are kept
//! as names, never as shared pointers; lookups go through the store.

use std::collections::BTreeMap;

use chrono::{Datelike, Local, TimeZone, Timelike};
use serde::Deserialize;
use thiserror::Error;

pub type Timestamp = i64;

// --- state codes ------------------------------------------------------

pub const STATE_OK: i32 = 0;
pub const STATE_WARNING: i32 = 1;
pub const STATE_CRITICAL: i32 = 2;
pub const STATE_UNKNOWN: i32 = 3;

pub const STATE_UP: i32 = 0;
pub const STATE_DOWN: i32 = 1;
pub const STATE_UNREACHABLE: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateType {
    Soft,
    Hard,
}

impl Default for StateType {
    fn default() -> Self {
        StateType::Hard
    }
}

// --- notification / flap option bits ----------------------------------

/// Option bitmasks shared by `notification_options`, contact options and
/// `notified_on`. Problem-state bits are `1 << state`.
pub mod opts {
    pub const RECOVERY: u32 = 1 << 0; // STATE_OK / STATE_UP
    pub const WARNING: u32 = 1 << 1; // also DOWN
    pub const DOWN: u32 = 1 << 1;
    pub const CRITICAL: u32 = 1 << 2; // also UNREACHABLE
    pub const UNREACHABLE: u32 = 1 << 2;
    pub const UNKNOWN: u32 = 1 << 3;
    pub const FLAPPING: u32 = 1 << 4;
    pub const DOWNTIME: u32 = 1 << 5;
    pub const ALL: u32 = RECOVERY | WARNING | CRITICAL | UNKNOWN | FLAPPING | DOWNTIME;

    pub fn state_bit(state: i32) -> u32 {
        1 << (state as u32)
    }
}

// --- modified-attribute bits (retention semantics) ---------------------

pub mod modattr {
    pub const NONE: u32 = 0;
    pub const NOTIFICATIONS_ENABLED: u32 = 1 << 0;
    pub const ACTIVE_CHECKS_ENABLED: u32 = 1 << 1;
    pub const PASSIVE_CHECKS_ENABLED: u32 = 1 << 2;
    pub const EVENT_HANDLER_ENABLED: u32 = 1 << 3;
    pub const FLAP_DETECTION_ENABLED: u32 = 1 << 4;
    pub const PERFORMANCE_DATA_ENABLED: u32 = 1 << 6;
    pub const OBSESSIVE_HANDLER_ENABLED: u32 = 1 << 7;
    pub const NORMAL_CHECK_INTERVAL: u32 = 1 << 10;
    pub const RETRY_CHECK_INTERVAL: u32 = 1 << 11;
    pub const MAX_CHECK_ATTEMPTS: u32 = 1 << 12;
    pub const FRESHNESS_CHECKS_ENABLED: u32 = 1 << 13;
    pub const CHECK_TIMEPERIOD: u32 = 1 << 14;
    pub const CUSTOM_VARIABLE: u32 = 1 << 15;
    pub const NOTIFICATION_TIMEPERIOD: u32 = 1 << 16;
}

/// Number of entries in the per-object state history ring.
pub const MAX_STATE_HISTORY_ENTRIES: usize = 21;

// --- small shared pieces -----------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CustomVar {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub has_been_modified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckType {
    None,
    Normal,
    Sticky,
}

impl Default for AckType {
    fn default() -> Self {
        AckType::None
    }
}

/// An escalation rule attached to a host or service. `last_notification`
/// of zero means unbounded; a negative `notification_interval` means the
/// escalation does not influence re-notification timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Escalation {
    pub first_notification: i32,
    pub last_notification: i32,
    pub notification_interval: f64,
    pub escalation_period: Option<String>,
    pub escalation_options: u32,
    pub contacts: Vec<String>,
    pub contact_groups: Vec<String>,
}

impl Default for Escalation {
    fn default() -> Self {
        Escalation {
            first_notification: 1,
            last_notification: 0,
            notification_interval: -1.0,
            escalation_period: None,
            escalation_options: opts::ALL,
            contacts: Vec::new(),
            contact_groups: Vec::new(),
        }
    }
}

/// Flap-detection state carried by every host and service.
#[derive(Debug, Clone)]
pub struct FlapState {
    pub history: [i32; MAX_STATE_HISTORY_ENTRIES],
    pub index: usize,
    pub is_flapping: bool,
    pub percent_state_change: f64,
    pub last_history_update: Timestamp,
    pub check_recovery_notification: bool,
    pub comment_id: u64,
}

impl Default for FlapState {
    fn default() -> Self {
        FlapState {
            history: [0; MAX_STATE_HISTORY_ENTRIES],
            index: 0,
            is_flapping: false,
            percent_state_change: 0.0,
            last_history_update: 0,
            check_recovery_notification: false,
            comment_id: 0,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_interval() -> f64 {
    5.0
}

fn default_max_attempts() -> i32 {
    3
}

// --- host --------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Host {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub contacts: Vec<String>,
    #[serde(default)]
    pub contact_groups: Vec<String>,
    #[serde(default)]
    pub notification_period: Option<String>,
    #[serde(default)]
    pub check_period: Option<String>,
    #[serde(default = "default_interval")]
    pub check_interval: f64,
    #[serde(default = "default_interval")]
    pub retry_interval: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    #[serde(default)]
    pub notification_interval: f64,
    #[serde(default)]
    pub first_notification_delay: f64,
    #[serde(default = "all_options")]
    pub notification_options: u32,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub checks_enabled: bool,
    #[serde(default = "default_true")]
    pub accept_passive_checks: bool,
    #[serde(default = "default_true")]
    pub event_handler_enabled: bool,
    #[serde(default = "default_true")]
    pub obsess: bool,
    #[serde(default = "default_true")]
    pub flap_detection_enabled: bool,
    #[serde(default = "all_options")]
    pub flap_detection_options: u32,
    #[serde(default)]
    pub low_flap_threshold: f64,
    #[serde(default)]
    pub high_flap_threshold: f64,
    #[serde(default)]
    pub hourly_value: u32,
    #[serde(default)]
    pub custom_variables: Vec<CustomVar>,
    #[serde(default)]
    pub escalations: Vec<Escalation>,

    // runtime state below; fixtures may preload it
    #[serde(default)]
    pub current_state: i32,
    #[serde(default)]
    pub state_type: StateType,
    #[serde(default)]
    pub current_attempt: i32,
    #[serde(default)]
    pub plugin_output: String,
    #[serde(default)]
    pub last_state_change: Timestamp,
    #[serde(default)]
    pub last_hard_state_change: Timestamp,
    #[serde(default)]
    pub last_check: Timestamp,
    #[serde(default)]
    pub next_check: Timestamp,
    #[serde(default)]
    pub check_options: u32,
    #[serde(default)]
    pub problem_has_been_acknowledged: bool,
    #[serde(default)]
    pub acknowledgement_type: AckType,
    #[serde(default)]
    pub scheduled_downtime_depth: i32,
    #[serde(default)]
    pub current_notification_number: i32,
    #[serde(default)]
    pub current_notification_id: u64,
    #[serde(default)]
    pub last_notification: Timestamp,
    #[serde(default)]
    pub next_notification: Timestamp,
    #[serde(default)]
    pub no_more_notifications: bool,
    #[serde(default)]
    pub notified_on: u32,
    #[serde(default)]
    pub modified_attributes: u32,

    #[serde(skip)]
    pub id: u32,
    #[serde(skip)]
    pub child_hosts: Vec<String>,
    #[serde(skip)]
    pub services: Vec<String>,
    #[serde(skip)]
    pub flap: FlapState,
}

fn all_options() -> u32 {
    opts::ALL
}

// --- service -----------------------------------------------------------

/// Key of a service in the store: host name plus service description.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub struct ServiceKey {
    pub host: String,
    pub description: String,
}

impl ServiceKey {
    pub fn new(host: impl Into<String>, description: impl Into<String>) -> Self {
        ServiceKey {
            host: host.into(),
            description: description.into(),
        }
    }

    /// Parses the positional `host;description` form used by the command
    /// parser for `service` arguments.
    pub fn from_joined(joined: &str) -> Option<Self> {
        let (host, desc) = joined.split_once(';')?;
        Some(ServiceKey::new(host, desc))
    }
}

impl std::fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{};{}", self.host, self.description)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
    pub host_name: String,
    pub description: String,
    #[serde(default)]
    pub parents: Vec<ServiceKey>,
    #[serde(default)]
    pub contacts: Vec<String>,
    #[serde(default)]
    pub contact_groups: Vec<String>,
    #[serde(default)]
    pub notification_period: Option<String>,
    #[serde(default)]
    pub check_period: Option<String>,
    #[serde(default = "default_interval")]
    pub check_interval: f64,
    #[serde(default = "default_interval")]
    pub retry_interval: f64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    #[serde(default)]
    pub notification_interval: f64,
    #[serde(default)]
    pub first_notification_delay: f64,
    #[serde(default = "all_options")]
    pub notification_options: u32,
    #[serde(default = "default_true")]
    pub notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub checks_enabled: bool,
    #[serde(default = "default_true")]
    pub accept_passive_checks: bool,
    #[serde(default = "default_true")]
    pub event_handler_enabled: bool,
    #[serde(default = "default_true")]
    pub obsess: bool,
    #[serde(default = "default_true")]
    pub flap_detection_enabled: bool,
    #[serde(default = "all_options")]
    pub flap_detection_options: u32,
    #[serde(default)]
    pub low_flap_threshold: f64,
    #[serde(default)]
    pub high_flap_threshold: f64,
    #[serde(default)]
    pub is_volatile: bool,
    #[serde(default)]
    pub hourly_value: u32,
    #[serde(default)]
    pub custom_variables: Vec<CustomVar>,
    #[serde(default)]
    pub escalations: Vec<Escalation>,

    #[serde(default)]
    pub current_state: i32,
    #[serde(default)]
    pub state_type: StateType,
    #[serde(default)]
    pub current_attempt: i32,
    #[serde(default)]
    pub plugin_output: String,
    #[serde(default)]
    pub last_state_change: Timestamp,
    #[serde(default)]
    pub last_hard_state_change: Timestamp,
    #[serde(default)]
    pub last_check: Timestamp,
    #[serde(default)]
    pub next_check: Timestamp,
    #[serde(default)]
    pub check_options: u32,
    #[serde(default)]
    pub problem_has_been_acknowledged: bool,
    #[serde(default)]
    pub acknowledgement_type: AckType,
    #[serde(default)]
    pub scheduled_downtime_depth: i32,
    #[serde(default)]
    pub current_notification_number: i32,
    #[serde(default)]
    pub current_notification_id: u64,
    #[serde(default)]
    pub last_notification: Timestamp,
    #[serde(default)]
    pub next_notification: Timestamp,
    #[serde(default)]
    pub no_more_notifications: bool,
    #[serde(default)]
    pub notified_on: u32,
    #[serde(default)]
    pub modified_attributes: u32,

    #[serde(skip)]
    pub id: u32,
    #[serde(skip)]
    pub flap: FlapState,
}

impl Service {
    pub fn key(&self) -> ServiceKey {
        ServiceKey::new(self.host_name.clone(), self.description.clone())
    }
}

// --- contact -----------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Contact {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_true")]
    pub host_notifications_enabled: bool,
    #[serde(default = "default_true")]
    pub service_notifications_enabled: bool,
    #[serde(default = "all_options")]
    pub host_notification_options: u32,
    #[serde(default = "all_options")]
    pub service_notification_options: u32,
    #[serde(default)]
    pub host_notification_period: Option<String>,
    #[serde(default)]
    pub service_notification_period: Option<String>,
    /// Notification command lines with `$MACRO$` placeholders.
    #[serde(default)]
    pub host_notification_commands: Vec<String>,
    #[serde(default)]
    pub service_notification_commands: Vec<String>,
    #[serde(default)]
    pub minimum_value: u32,
    #[serde(default)]
    pub custom_variables: Vec<CustomVar>,
    #[serde(default)]
    pub last_host_notification: Timestamp,
    #[serde(default)]
    pub last_service_notification: Timestamp,
    #[serde(default)]
    pub modified_attributes: u32,
    #[serde(default)]
    pub modified_host_attributes: u32,
    #[serde(default)]
    pub modified_service_attributes: u32,

    #[serde(skip)]
    pub id: u32,
}

// --- groups ------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct HostGroup {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceGroup {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub members: Vec<ServiceKey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactGroup {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub members: Vec<String>,
}

// --- timeperiods -------------------------------------------------------

/// A weekly timeperiod: per-weekday lists of `[start, end)` second-of-day
/// ranges, Sunday first. An object with no period is unrestricted.
#[derive(Debug, Clone, Deserialize)]
pub struct TimePeriod {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub days: Vec<Vec<(u32, u32)>>,
}

impl TimePeriod {
    /// A 24x7 period.
    pub fn always(name: &str) -> Self {
        TimePeriod {
            name: name.to_string(),
            alias: String::new(),
            days: vec![vec![(0, 86_400)]; 7],
        }
    }

    /// A period with no valid ranges at all.
    pub fn never(name: &str) -> Self {
        TimePeriod {
            name: name.to_string(),
            alias: String::new(),
            days: vec![Vec::new(); 7],
        }
    }

    fn ranges_for(&self, weekday: usize) -> &[(u32, u32)] {
        self.days.get(weekday).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Is `t` inside the period?
    pub fn contains(&self, t: Timestamp) -> bool {
        let Some(local) = Local.timestamp_opt(t, 0).single() else {
            return false;
        };
        let weekday = local.weekday().num_days_from_sunday() as usize;
        let second = local.num_seconds_from_midnight();
        self.ranges_for(weekday)
            .iter()
            .any(|&(start, end)| second >= start && second < end)
    }

    /// Earliest valid time at or after `t`, scanning at most eight days
    /// ahead. `None` when the period has no usable range in that window.
    pub fn next_valid_time(&self, t: Timestamp) -> Option<Timestamp> {
        if self.contains(t) {
            return Some(t);
        }
        let local = Local.timestamp_opt(t, 0).single()?;
        let midnight = t - local.num_seconds_from_midnight() as i64;
        for day in 0..8 {
            let day_start = midnight + day * 86_400;
            let weekday =
                (local.weekday().num_days_from_sunday() as i64 + day).rem_euclid(7) as usize;
            let floor = if day == 0 {
                local.num_seconds_from_midnight()
            } else {
                0
            };
            let mut best: Option<Timestamp> = None;
            for &(start, end) in self.ranges_for(weekday) {
                if end <= floor {
                    continue;
                }
                let candidate = day_start + start.max(floor) as i64;
                if best.map_or(true, |b| candidate < b) {
                    best = Some(candidate);
                }
            }
            if best.is_some() {
                return best;
            }
        }
        None
    }
}

/// A missing period never blocks.
pub fn check_time_against_period(period: Option<&TimePeriod>, t: Timestamp) -> bool {
    period.map_or(true, |p| p.contains(t))
}

// --- dependencies ------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct HostDependency {
    pub dependent_host: String,
    pub master_host: String,
    /// Master states (as `opts` bits) that fail the dependency.
    pub failure_options: u32,
    #[serde(default)]
    pub dependency_period: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDependency {
    pub dependent: ServiceKey,
    pub master: ServiceKey,
    pub failure_options: u32,
    #[serde(default)]
    pub dependency_period: Option<String>,
}

// --- comments ----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentEntryType {
    User,
    Downtime,
    Flapping,
    Acknowledgement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentSource {
    Internal,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentTarget {
    Host(String),
    Service(ServiceKey),
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: u64,
    pub target: CommentTarget,
    pub entry_type: CommentEntryType,
    pub entry_time: Timestamp,
    pub author: String,
    pub text: String,
    pub persistent: bool,
    pub source: CommentSource,
}

#[derive(Debug, Default)]
pub struct CommentStore {
    next_id: u64,
    by_id: BTreeMap<u64, Comment>,
}

impl CommentStore {
    pub fn add(
        &mut self,
        target: CommentTarget,
        entry_type: CommentEntryType,
        entry_time: Timestamp,
        author: &str,
        text: &str,
        persistent: bool,
        source: CommentSource,
    ) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.by_id.insert(
            id,
            Comment {
                id,
                target,
                entry_type,
                entry_time,
                author: author.to_string(),
                text: text.to_string(),
                persistent,
                source,
            },
        );
        id
    }

    pub fn delete(&mut self, id: u64) -> bool {
        self.by_id.remove(&id).is_some()
    }

    pub fn get(&self, id: u64) -> Option<&Comment> {
        self.by_id.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Comment> {
        self.by_id.values()
    }

    pub fn delete_for_host(&mut self, host: &str) -> usize {
        let doomed: Vec<u64> = self
            .by_id
            .values()
            .filter(|c| matches!(&c.target, CommentTarget::Host(h) if h == host))
            .map(|c| c.id)
            .collect();
        for id in &doomed {
            self.by_id.remove(id);
        }
        doomed.len()
    }

    pub fn delete_for_service(&mut self, key: &ServiceKey) -> usize {
        let doomed: Vec<u64> = self
            .by_id
            .values()
            .filter(|c| matches!(&c.target, CommentTarget::Service(k) if k == key))
            .map(|c| c.id)
            .collect();
        for id in &doomed {
            self.by_id.remove(id);
        }
        doomed.len()
    }
}

// --- program-wide runtime flags ----------------------------------------

/// The process-wide toggles external commands can flip, with the
/// `modified_*_process_attributes` bitmasks retention needs.
#[derive(Debug, Clone)]
pub struct ProgramStatus {
    pub program_start: Timestamp,
    pub enable_notifications: bool,
    pub execute_service_checks: bool,
    pub accept_passive_service_checks: bool,
    pub execute_host_checks: bool,
    pub accept_passive_host_checks: bool,
    pub enable_event_handlers: bool,
    pub enable_flap_detection: bool,
    pub obsess_over_services: bool,
    pub obsess_over_hosts: bool,
    pub check_service_freshness: bool,
    pub check_host_freshness: bool,
    pub process_performance_data: bool,
    pub modified_host_process_attributes: u32,
    pub modified_service_process_attributes: u32,
    pub sigshutdown: bool,
    pub sigrestart: bool,
}

impl Default for ProgramStatus {
    fn default() -> Self {
        ProgramStatus {
            program_start: 0,
            enable_notifications: true,
            execute_service_checks: true,
            accept_passive_service_checks: true,
            execute_host_checks: true,
            accept_passive_host_checks: true,
            enable_event_handlers: true,
            enable_flap_detection: true,
            obsess_over_services: false,
            obsess_over_hosts: false,
            check_service_freshness: true,
            check_host_freshness: false,
            process_performance_data: false,
            modified_host_process_attributes: modattr::NONE,
            modified_service_process_attributes: modattr::NONE,
            sigshutdown: false,
            sigrestart: false,
        }
    }
}

// --- the store ---------------------------------------------------------

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("host '{0}' not found")]
    HostNotFound(String),
    #[error("service '{0}' not found")]
    ServiceNotFound(ServiceKey),
    #[error("duplicate object '{0}'")]
    Duplicate(String),
}

/// Raw deserialized configuration, before cross-linking.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ObjectConfig {
    pub hosts: Vec<Host>,
    pub services: Vec<Service>,
    pub contacts: Vec<Contact>,
    pub hostgroups: Vec<HostGroup>,
    pub servicegroups: Vec<ServiceGroup>,
    pub contactgroups: Vec<ContactGroup>,
    pub timeperiods: Vec<TimePeriod>,
    pub host_dependencies: Vec<HostDependency>,
    pub service_dependencies: Vec<ServiceDependency>,
}

#[derive(Debug, Default)]
pub struct ObjectStore {
    pub hosts: BTreeMap<String, Host>,
    pub services: BTreeMap<ServiceKey, Service>,
    pub contacts: BTreeMap<String, Contact>,
    pub hostgroups: BTreeMap<String, HostGroup>,
    pub servicegroups: BTreeMap<String, ServiceGroup>,
    pub contactgroups: BTreeMap<String, ContactGroup>,
    pub timeperiods: BTreeMap<String, TimePeriod>,
    pub host_dependencies: Vec<HostDependency>,
    pub service_dependencies: Vec<ServiceDependency>,
}

impl ObjectStore {
    /// Builds the store: indexes objects, assigns numeric ids, and derives
    /// the child-host and host-service back-links.
    pub fn from_config(cfg: ObjectConfig) -> Result<Self, ObjectError> {
        let mut store = ObjectStore::default();

        for (i, mut h) in cfg.hosts.into_iter().enumerate() {
            h.id = i as u32;
            if store.hosts.contains_key(&h.name) {
                return Err(ObjectError::Duplicate(h.name));
            }
            store.hosts.insert(h.name.clone(), h);
        }
        for (i, mut s) in cfg.services.into_iter().enumerate() {
            s.id = i as u32;
            let key = s.key();
            if !store.hosts.contains_key(&s.host_name) {
                return Err(ObjectError::HostNotFound(s.host_name));
            }
            if store.services.contains_key(&key) {
                return Err(ObjectError::Duplicate(key.to_string()));
            }
            store.services.insert(key, s);
        }
        for (i, mut c) in cfg.contacts.into_iter().enumerate() {
            c.id = i as u32;
            store.contacts.insert(c.name.clone(), c);
        }
        for g in cfg.hostgroups {
            store.hostgroups.insert(g.name.clone(), g);
        }
        for g in cfg.servicegroups {
            store.servicegroups.insert(g.name.clone(), g);
        }
        for g in cfg.contactgroups {
            store.contactgroups.insert(g.name.clone(), g);
        }
        for tp in cfg.timeperiods {
            store.timeperiods.insert(tp.name.clone(), tp);
        }
        store.host_dependencies = cfg.host_dependencies;
        store.service_dependencies = cfg.service_dependencies;

        // derive child links and host-service membership
        let parent_edges: Vec<(String, String)> = store
            .hosts
            .values()
            .flat_map(|h| h.parents.iter().map(move |p| (p.clone(), h.name.clone())))
            .collect();
        for (parent, child) in parent_edges {
            if let Some(p) = store.hosts.get_mut(&parent) {
                p.child_hosts.push(child);
            }
        }
        let service_edges: Vec<(String, String)> = store
            .services
            .values()
            .map(|s| (s.host_name.clone(), s.description.clone()))
            .collect();
        for (host, desc) in service_edges {
            if let Some(h) = store.hosts.get_mut(&host) {
                h.services.push(desc);
            }
        }
        Ok(store)
    }

    pub fn host(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    pub fn host_mut(&mut self, name: &str) -> Option<&mut Host> {
        self.hosts.get_mut(name)
    }

    pub fn service(&self, host: &str, description: &str) -> Option<&Service> {
        self.services
            .get(&ServiceKey::new(host, description))
    }

    pub fn service_by_key(&self, key: &ServiceKey) -> Option<&Service> {
        self.services.get(key)
    }

    pub fn service_mut(&mut self, key: &ServiceKey) -> Option<&mut Service> {
        self.services.get_mut(key)
    }

    pub fn contact(&self, name: &str) -> Option<&Contact> {
        self.contacts.get(name)
    }

    pub fn contact_mut(&mut self, name: &str) -> Option<&mut Contact> {
        self.contacts.get_mut(name)
    }

    pub fn timeperiod(&self, name: &str) -> Option<&TimePeriod> {
        self.timeperiods.get(name)
    }

    /// Timeperiod lookup through an optional name edge.
    pub fn period_of(&self, name: Option<&String>) -> Option<&TimePeriod> {
        name.and_then(|n| self.timeperiods.get(n))
    }

    /// Service keys of every service attached to a host, in description
    /// order.
    pub fn services_of_host(&self, host: &str) -> Vec<ServiceKey> {
        self.hosts
            .get(host)
            .map(|h| {
                h.services
                    .iter()
                    .map(|d| ServiceKey::new(host, d.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn hosts_in_group(&self, group: &str) -> Vec<String> {
        self.hostgroups
            .get(group)
            .map(|g| g.members.clone())
            .unwrap_or_default()
    }

    pub fn services_in_group(&self, group: &str) -> Vec<ServiceKey> {
        self.servicegroups
            .get(group)
            .map(|g| g.members.clone())
            .unwrap_or_default()
    }

    pub fn contacts_in_group(&self, group: &str) -> Vec<String> {
        self.contactgroups
            .get(group)
            .map(|g| g.members.clone())
            .unwrap_or_default()
    }

    /// Summed hourly value of a host's services, used by the contact
    /// importance filter.
    pub fn host_services_value(&self, host: &str) -> u32 {
        self.services_of_host(host)
            .iter()
            .filter_map(|k| self.services.get(k))
            .map(|s| s.hourly_value)
            .sum()
    }

    /// Notification dependency check for a host: failed when any master
    /// host of a dependency is in one of the fail states.
    pub fn host_dependencies_failed(&self, host: &str, now: Timestamp) -> bool {
        self.host_dependencies.iter().any(|dep| {
            dep.dependent_host == host
                && check_time_against_period(self.period_of(dep.dependency_period.as_ref()), now)
                && self
                    .hosts
                    .get(&dep.master_host)
                    .map(|m| dep.failure_options & opts::state_bit(m.current_state) != 0)
                    .unwrap_or(false)
        })
    }

    pub fn service_dependencies_failed(&self, key: &ServiceKey, now: Timestamp) -> bool {
        self.service_dependencies.iter().any(|dep| {
            dep.dependent == *key
                && check_time_against_period(self.period_of(dep.dependency_period.as_ref()), now)
                && self
                    .services
                    .get(&dep.master)
                    .map(|m| dep.failure_options & opts::state_bit(m.current_state) != 0)
                    .unwrap_or(false)
        })
    }
}

/// Readable name for a host state code.
pub fn host_state_name(state: i32) -> &'static str {
    match state {
        STATE_UP => "UP",
        STATE_DOWN => "DOWN",
        STATE_UNREACHABLE => "UNREACHABLE",
        _ => "UNKNOWN",
    }
}

/// Readable name for a service state code.
pub fn service_state_name(state: i32) -> &'static str {
    match state {
        STATE_OK => "OK",
        STATE_WARNING => "WARNING",
        STATE_CRITICAL => "CRITICAL",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_period_contains_any_time() {
        let tp = TimePeriod::always("24x7");
        assert!(tp.contains(0));
        assert!(tp.contains(1_700_000_000));
        assert_eq!(tp.next_valid_time(1_700_000_000), Some(1_700_000_000));
    }

    #[test]
    fn never_period_has_no_next_valid_time() {
        let tp = TimePeriod::never("none");
        assert!(!tp.contains(1_700_000_000));
        assert_eq!(tp.next_valid_time(1_700_000_000), None);
    }

    #[test]
    fn missing_period_never_blocks() {
        assert!(check_time_against_period(None, 123));
    }

    #[test]
    fn store_derives_child_links() {
        let cfg: ObjectConfig = serde_json::from_value(serde_json::json!({
            "hosts": [
                {"name": "gw"},
                {"name": "web1", "parents": ["gw"]}
            ]
        }))
        .unwrap();
        let store = ObjectStore::from_config(cfg).unwrap();
        assert_eq!(store.host("gw").unwrap().child_hosts, vec!["web1"]);
        assert!(store.host("web1").unwrap().notifications_enabled);
    }
}
