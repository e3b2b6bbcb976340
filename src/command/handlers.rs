//! Command handlers, grouped by target kind, plus the catalog of every
//! built-in command and the top-level `process_external_command` entry
//! point.

use std::fs;

use tracing::{debug, info, warn};

use super::catalog::{ArgKind, ArgValue, BoundCommand, CommandDescriptor, CommandRegistry};
use super::parser::{self, Parsed};
use super::{parse_mode, CommandError};
use crate::broker::BrokerEvent;
use crate::core::Core;
use crate::downtime::{self, DowntimeTarget};
use crate::events::EventAction;
use crate::flapping;
use crate::notifications::{self, NotificationReason};
use crate::objects::{
    modattr, AckType, CommentEntryType, CommentSource, CommentTarget, Host, Service, ServiceKey,
    StateType, Timestamp, STATE_OK, STATE_UP,
};

pub const CHECK_OPTION_NONE: u32 = 0;
pub const CHECK_OPTION_FORCE_EXECUTION: u32 = 1;

/// Sticky acknowledgements survive state changes until recovery.
const ACKNOWLEDGEMENT_STICKY: i32 = 2;

/// Stable command ids. Grouped in ranges per target kind; the registry
/// grows to fit.
pub mod ids {
    // process-wide
    pub const ENABLE_NOTIFICATIONS: i32 = 0;
    pub const DISABLE_NOTIFICATIONS: i32 = 1;
    pub const SHUTDOWN_PROCESS: i32 = 2;
    pub const RESTART_PROCESS: i32 = 3;
    pub const START_EXECUTING_SVC_CHECKS: i32 = 4;
    pub const STOP_EXECUTING_SVC_CHECKS: i32 = 5;
    pub const START_ACCEPTING_PASSIVE_SVC_CHECKS: i32 = 6;
    pub const STOP_ACCEPTING_PASSIVE_SVC_CHECKS: i32 = 7;
    pub const START_EXECUTING_HOST_CHECKS: i32 = 8;
    pub const STOP_EXECUTING_HOST_CHECKS: i32 = 9;
    pub const START_ACCEPTING_PASSIVE_HOST_CHECKS: i32 = 10;
    pub const STOP_ACCEPTING_PASSIVE_HOST_CHECKS: i32 = 11;
    pub const ENABLE_EVENT_HANDLERS: i32 = 12;
    pub const DISABLE_EVENT_HANDLERS: i32 = 13;
    pub const ENABLE_FLAP_DETECTION: i32 = 14;
    pub const DISABLE_FLAP_DETECTION: i32 = 15;
    pub const ENABLE_PERFORMANCE_DATA: i32 = 16;
    pub const DISABLE_PERFORMANCE_DATA: i32 = 17;
    pub const START_OBSESSING_OVER_SVC_CHECKS: i32 = 18;
    pub const STOP_OBSESSING_OVER_SVC_CHECKS: i32 = 19;
    pub const START_OBSESSING_OVER_HOST_CHECKS: i32 = 20;
    pub const STOP_OBSESSING_OVER_HOST_CHECKS: i32 = 21;
    pub const ENABLE_SERVICE_FRESHNESS_CHECKS: i32 = 22;
    pub const DISABLE_SERVICE_FRESHNESS_CHECKS: i32 = 23;
    pub const ENABLE_HOST_FRESHNESS_CHECKS: i32 = 24;
    pub const DISABLE_HOST_FRESHNESS_CHECKS: i32 = 25;
    pub const SAVE_STATE_INFORMATION: i32 = 26;
    pub const READ_STATE_INFORMATION: i32 = 27;
    pub const PROCESS_FILE: i32 = 28;

    // hosts
    pub const ADD_HOST_COMMENT: i32 = 40;
    pub const DEL_HOST_COMMENT: i32 = 41;
    pub const DEL_ALL_HOST_COMMENTS: i32 = 42;
    pub const DELAY_HOST_NOTIFICATION: i32 = 43;
    pub const ENABLE_HOST_NOTIFICATIONS: i32 = 44;
    pub const DISABLE_HOST_NOTIFICATIONS: i32 = 45;
    pub const ENABLE_HOST_SVC_NOTIFICATIONS: i32 = 46;
    pub const DISABLE_HOST_SVC_NOTIFICATIONS: i32 = 47;
    pub const ENABLE_ALL_NOTIFICATIONS_BEYOND_HOST: i32 = 48;
    pub const DISABLE_ALL_NOTIFICATIONS_BEYOND_HOST: i32 = 49;
    pub const ENABLE_HOST_AND_CHILD_NOTIFICATIONS: i32 = 50;
    pub const DISABLE_HOST_AND_CHILD_NOTIFICATIONS: i32 = 51;
    pub const ENABLE_HOST_SVC_CHECKS: i32 = 52;
    pub const DISABLE_HOST_SVC_CHECKS: i32 = 53;
    pub const SCHEDULE_HOST_SVC_CHECKS: i32 = 54;
    pub const SCHEDULE_FORCED_HOST_SVC_CHECKS: i32 = 55;
    pub const ACKNOWLEDGE_HOST_PROBLEM: i32 = 56;
    pub const REMOVE_HOST_ACKNOWLEDGEMENT: i32 = 57;
    pub const ENABLE_HOST_EVENT_HANDLER: i32 = 58;
    pub const DISABLE_HOST_EVENT_HANDLER: i32 = 59;
    pub const ENABLE_HOST_CHECK: i32 = 60;
    pub const DISABLE_HOST_CHECK: i32 = 61;
    pub const SCHEDULE_HOST_CHECK: i32 = 62;
    pub const SCHEDULE_FORCED_HOST_CHECK: i32 = 63;
    pub const SCHEDULE_HOST_DOWNTIME: i32 = 64;
    pub const SCHEDULE_HOST_SVC_DOWNTIME: i32 = 65;
    pub const SCHEDULE_AND_PROPAGATE_HOST_DOWNTIME: i32 = 66;
    pub const SCHEDULE_AND_PROPAGATE_TRIGGERED_HOST_DOWNTIME: i32 = 67;
    pub const DEL_HOST_DOWNTIME: i32 = 68;
    pub const ENABLE_HOST_FLAP_DETECTION: i32 = 69;
    pub const DISABLE_HOST_FLAP_DETECTION: i32 = 70;
    pub const ENABLE_PASSIVE_HOST_CHECKS: i32 = 71;
    pub const DISABLE_PASSIVE_HOST_CHECKS: i32 = 72;
    pub const PROCESS_HOST_CHECK_RESULT: i32 = 73;
    pub const SEND_CUSTOM_HOST_NOTIFICATION: i32 = 74;
    pub const CHANGE_HOST_NOTIFICATION_TIMEPERIOD: i32 = 75;
    pub const CHANGE_HOST_CHECK_TIMEPERIOD: i32 = 76;
    pub const CHANGE_HOST_MODATTR: i32 = 77;
    pub const CHANGE_NORMAL_HOST_CHECK_INTERVAL: i32 = 78;
    pub const CHANGE_RETRY_HOST_CHECK_INTERVAL: i32 = 79;
    pub const CHANGE_MAX_HOST_CHECK_ATTEMPTS: i32 = 80;
    pub const SET_HOST_NOTIFICATION_NUMBER: i32 = 81;
    pub const START_OBSESSING_OVER_HOST: i32 = 82;
    pub const STOP_OBSESSING_OVER_HOST: i32 = 83;

    // services
    pub const ADD_SVC_COMMENT: i32 = 100;
    pub const DEL_SVC_COMMENT: i32 = 101;
    pub const DEL_ALL_SVC_COMMENTS: i32 = 102;
    pub const DELAY_SVC_NOTIFICATION: i32 = 103;
    pub const ENABLE_SVC_NOTIFICATIONS: i32 = 104;
    pub const DISABLE_SVC_NOTIFICATIONS: i32 = 105;
    pub const ENABLE_SVC_CHECK: i32 = 106;
    pub const DISABLE_SVC_CHECK: i32 = 107;
    pub const SCHEDULE_SVC_CHECK: i32 = 108;
    pub const SCHEDULE_FORCED_SVC_CHECK: i32 = 109;
    pub const ACKNOWLEDGE_SVC_PROBLEM: i32 = 110;
    pub const REMOVE_SVC_ACKNOWLEDGEMENT: i32 = 111;
    pub const ENABLE_SVC_EVENT_HANDLER: i32 = 112;
    pub const DISABLE_SVC_EVENT_HANDLER: i32 = 113;
    pub const ENABLE_PASSIVE_SVC_CHECKS: i32 = 114;
    pub const DISABLE_PASSIVE_SVC_CHECKS: i32 = 115;
    pub const SCHEDULE_SVC_DOWNTIME: i32 = 116;
    pub const DEL_SVC_DOWNTIME: i32 = 117;
    pub const ENABLE_SVC_FLAP_DETECTION: i32 = 118;
    pub const DISABLE_SVC_FLAP_DETECTION: i32 = 119;
    pub const PROCESS_SERVICE_CHECK_RESULT: i32 = 120;
    pub const SEND_CUSTOM_SVC_NOTIFICATION: i32 = 121;
    pub const CHANGE_SVC_NOTIFICATION_TIMEPERIOD: i32 = 122;
    pub const CHANGE_SVC_CHECK_TIMEPERIOD: i32 = 123;
    pub const CHANGE_SVC_MODATTR: i32 = 124;
    pub const CHANGE_NORMAL_SVC_CHECK_INTERVAL: i32 = 125;
    pub const CHANGE_RETRY_SVC_CHECK_INTERVAL: i32 = 126;
    pub const CHANGE_MAX_SVC_CHECK_ATTEMPTS: i32 = 127;
    pub const SET_SVC_NOTIFICATION_NUMBER: i32 = 128;
    pub const START_OBSESSING_OVER_SVC: i32 = 129;
    pub const STOP_OBSESSING_OVER_SVC: i32 = 130;

    // hostgroups
    pub const ENABLE_HOSTGROUP_HOST_NOTIFICATIONS: i32 = 140;
    pub const DISABLE_HOSTGROUP_HOST_NOTIFICATIONS: i32 = 141;
    pub const ENABLE_HOSTGROUP_SVC_NOTIFICATIONS: i32 = 142;
    pub const DISABLE_HOSTGROUP_SVC_NOTIFICATIONS: i32 = 143;
    pub const ENABLE_HOSTGROUP_HOST_CHECKS: i32 = 144;
    pub const DISABLE_HOSTGROUP_HOST_CHECKS: i32 = 145;
    pub const ENABLE_HOSTGROUP_SVC_CHECKS: i32 = 146;
    pub const DISABLE_HOSTGROUP_SVC_CHECKS: i32 = 147;
    pub const ENABLE_HOSTGROUP_PASSIVE_HOST_CHECKS: i32 = 148;
    pub const DISABLE_HOSTGROUP_PASSIVE_HOST_CHECKS: i32 = 149;
    pub const ENABLE_HOSTGROUP_PASSIVE_SVC_CHECKS: i32 = 150;
    pub const DISABLE_HOSTGROUP_PASSIVE_SVC_CHECKS: i32 = 151;
    pub const SCHEDULE_HOSTGROUP_HOST_DOWNTIME: i32 = 152;
    pub const SCHEDULE_HOSTGROUP_SVC_DOWNTIME: i32 = 153;

    // servicegroups
    pub const ENABLE_SERVICEGROUP_SVC_NOTIFICATIONS: i32 = 160;
    pub const DISABLE_SERVICEGROUP_SVC_NOTIFICATIONS: i32 = 161;
    pub const ENABLE_SERVICEGROUP_HOST_NOTIFICATIONS: i32 = 162;
    pub const DISABLE_SERVICEGROUP_HOST_NOTIFICATIONS: i32 = 163;
    pub const ENABLE_SERVICEGROUP_SVC_CHECKS: i32 = 164;
    pub const DISABLE_SERVICEGROUP_SVC_CHECKS: i32 = 165;
    pub const ENABLE_SERVICEGROUP_PASSIVE_SVC_CHECKS: i32 = 166;
    pub const DISABLE_SERVICEGROUP_PASSIVE_SVC_CHECKS: i32 = 167;
    pub const SCHEDULE_SERVICEGROUP_HOST_DOWNTIME: i32 = 168;
    pub const SCHEDULE_SERVICEGROUP_SVC_DOWNTIME: i32 = 169;

    // contacts and contactgroups
    pub const ENABLE_CONTACT_HOST_NOTIFICATIONS: i32 = 180;
    pub const DISABLE_CONTACT_HOST_NOTIFICATIONS: i32 = 181;
    pub const ENABLE_CONTACT_SVC_NOTIFICATIONS: i32 = 182;
    pub const DISABLE_CONTACT_SVC_NOTIFICATIONS: i32 = 183;
    pub const CHANGE_CONTACT_HOST_NOTIFICATION_TIMEPERIOD: i32 = 184;
    pub const CHANGE_CONTACT_SVC_NOTIFICATION_TIMEPERIOD: i32 = 185;
    pub const CHANGE_CONTACT_MODATTR: i32 = 186;
    pub const CHANGE_CONTACT_MODHATTR: i32 = 187;
    pub const CHANGE_CONTACT_MODSATTR: i32 = 188;
    pub const ENABLE_CONTACTGROUP_HOST_NOTIFICATIONS: i32 = 189;
    pub const DISABLE_CONTACTGROUP_HOST_NOTIFICATIONS: i32 = 190;
    pub const ENABLE_CONTACTGROUP_SVC_NOTIFICATIONS: i32 = 191;
    pub const DISABLE_CONTACTGROUP_SVC_NOTIFICATIONS: i32 = 192;

    // custom variables
    pub const CHANGE_CUSTOM_HOST_VAR: i32 = 200;
    pub const CHANGE_CUSTOM_SVC_VAR: i32 = 201;
    pub const CHANGE_CUSTOM_CONTACT_VAR: i32 = 202;

    // downtime deletion by filter
    pub const DEL_DOWNTIME_BY_HOST_NAME: i32 = 210;
    pub const DEL_DOWNTIME_BY_HOSTGROUP_NAME: i32 = 211;
    pub const DEL_DOWNTIME_BY_START_TIME_COMMENT: i32 = 212;
}

// --- top-level processing ----------------------------------------------

/// Parses and executes one raw external command line. Parse failures log
/// and drop the line; custom commands are logged and surfaced to
/// observers without reaching any built-in handler.
pub fn process_external_command(
    core: &mut Core,
    line: &str,
    mode: u32,
) -> Result<(), CommandError> {
    let line = line.trim_end_matches(['\r', '\n']);
    debug!(raw = line, "raw command entry");

    let parsed = match parser::parse(&core.registry, &core.objects, line, mode, core.now) {
        Ok(p) => p,
        Err(e) => {
            warn!("External command parse error {line} ({e})");
            core.counters.commands_failed += 1;
            return Err(e);
        }
    };
    let custom = parsed.is_custom();
    let cmd = match parsed {
        Parsed::Builtin(c) | Parsed::Custom(c) => c,
    };
    core.counters.commands_processed += 1;
    if custom {
        core.counters.custom_commands += 1;
    }

    let passive_result = cmd.id == ids::PROCESS_SERVICE_CHECK_RESULT
        || cmd.id == ids::PROCESS_HOST_CHECK_RESULT;
    if passive_result {
        // passive checks get their own log switch; they can be noisy
        if core.config.log_passive_checks {
            info!("EXTERNAL COMMAND: {};{}", cmd.name, cmd.raw_arguments);
        }
    } else if core.config.log_external_commands {
        info!("EXTERNAL COMMAND: {};{}", cmd.name, cmd.raw_arguments);
    }

    core.broadcast(BrokerEvent::ExternalCommandStart {
        command_id: cmd.id,
        entry_time: cmd.entry_time,
        name: cmd.name.clone(),
        args: cmd.raw_arguments.clone(),
    });

    if !custom {
        if let Some(handler) = cmd.handler {
            if let Err(e) = handler(core, &cmd) {
                warn!(
                    "Error: External command failed -> {};{} ({e})",
                    cmd.name, cmd.raw_arguments
                );
                core.counters.commands_failed += 1;
            }
        }
    }

    core.broadcast(BrokerEvent::ExternalCommandEnd {
        command_id: cmd.id,
        name: cmd.name.clone(),
    });
    Ok(())
}

/// Runs every command line found in `path` (the PROCESS_FILE command).
pub fn process_external_commands_from_file(
    core: &mut Core,
    path: &str,
    delete_after: bool,
) -> Result<(), CommandError> {
    debug!(path, delete_after, "processing commands from file");
    let contents = fs::read_to_string(path)
        .map_err(|e| CommandError::Internal(format!("cannot open command file {path}: {e}")))?;
    for raw in contents.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let _ = process_external_command(core, trimmed, parse_mode::POSITIONAL);
    }
    if delete_after {
        if let Err(e) = fs::remove_file(path) {
            warn!(path, error = %e, "failed to delete processed command file");
        }
    }
    Ok(())
}

// --- small shared helpers ----------------------------------------------

fn host_arg<'c>(core: &'c Core, cmd: &BoundCommand) -> Result<&'c Host, CommandError> {
    let name = cmd.str_arg("host_name")?;
    core.objects
        .host(name)
        .ok_or_else(|| CommandError::ValidationFailure(format!("host '{name}' not found")))
}

fn service_arg<'c>(core: &'c Core, cmd: &BoundCommand) -> Result<&'c Service, CommandError> {
    let key = cmd.service_key_arg("service")?;
    core.objects
        .service_by_key(&key)
        .ok_or_else(|| CommandError::ValidationFailure(format!("service '{key}' not found")))
}

fn downtime_window(cmd: &BoundCommand) -> Result<(Timestamp, Timestamp, bool, u64, i64), CommandError> {
    let start_time = cmd.timestamp_arg("start_time")?;
    let end_time = cmd.timestamp_arg("end_time")?;
    let fixed = cmd.bool_arg("fixed")?;
    let trigger_id = cmd.ulong_arg("trigger_id")?;
    // fixed downtime lasts its whole window
    let duration = if fixed {
        end_time - start_time
    } else {
        cmd.ulong_arg("duration")? as i64
    };
    Ok((start_time, end_time, fixed, trigger_id, duration))
}

/// Flips one boolean host attribute with its modified-attribute bit,
/// adaptive event and status update. No-op when already at `value`.
fn set_host_flag(
    core: &mut Core,
    host: &str,
    attr: u32,
    value: bool,
    access: fn(&mut Host) -> &mut bool,
) {
    let modified = {
        let Some(h) = core.objects.host_mut(host) else {
            return;
        };
        if *access(h) == value {
            return;
        }
        *access(h) = value;
        h.modified_attributes |= attr;
        h.modified_attributes
    };
    core.broadcast(BrokerEvent::AdaptiveHost {
        host: host.to_string(),
        command_id: -1,
        attr,
        modified_attributes: modified,
    });
    core.update_host_status(host);
}

/// Service counterpart of [`set_host_flag`].
fn set_service_flag(
    core: &mut Core,
    key: &ServiceKey,
    attr: u32,
    value: bool,
    access: fn(&mut Service) -> &mut bool,
) {
    let modified = {
        let Some(s) = core.objects.service_mut(key) else {
            return;
        };
        if *access(s) == value {
            return;
        }
        *access(s) = value;
        s.modified_attributes |= attr;
        s.modified_attributes
    };
    core.broadcast(BrokerEvent::AdaptiveService {
        service: key.clone(),
        command_id: -1,
        attr,
        modified_attributes: modified,
    });
    core.update_service_status(key);
}

/// Flips one program-wide flag; the caller already checked for a real
/// change. Marks the given modified-attribute bits and tells observers.
fn adaptive_program_update(core: &mut Core, host_attr: u32, service_attr: u32) {
    core.program.modified_host_process_attributes |= host_attr;
    core.program.modified_service_process_attributes |= service_attr;
    core.broadcast(BrokerEvent::AdaptiveProgram {
        command_id: -1,
        modified_host_attribute: host_attr,
        modified_host_attributes: core.program.modified_host_process_attributes,
        modified_service_attribute: service_attr,
        modified_service_attributes: core.program.modified_service_process_attributes,
    });
    core.update_program_status();
}

fn enable_host_notifications(core: &mut Core, host: &str) {
    set_host_flag(core, host, modattr::NOTIFICATIONS_ENABLED, true, |h| {
        &mut h.notifications_enabled
    });
}

fn disable_host_notifications(core: &mut Core, host: &str) {
    set_host_flag(core, host, modattr::NOTIFICATIONS_ENABLED, false, |h| {
        &mut h.notifications_enabled
    });
}

fn enable_service_notifications(core: &mut Core, key: &ServiceKey) {
    set_service_flag(core, key, modattr::NOTIFICATIONS_ENABLED, true, |s| {
        &mut s.notifications_enabled
    });
}

fn disable_service_notifications(core: &mut Core, key: &ServiceKey) {
    set_service_flag(core, key, modattr::NOTIFICATIONS_ENABLED, false, |s| {
        &mut s.notifications_enabled
    });
}

fn enable_host_checks(core: &mut Core, host: &str) {
    set_host_flag(core, host, modattr::ACTIVE_CHECKS_ENABLED, true, |h| {
        &mut h.checks_enabled
    });
}

fn disable_host_checks(core: &mut Core, host: &str) {
    set_host_flag(core, host, modattr::ACTIVE_CHECKS_ENABLED, false, |h| {
        &mut h.checks_enabled
    });
}

fn enable_service_checks(core: &mut Core, key: &ServiceKey) {
    set_service_flag(core, key, modattr::ACTIVE_CHECKS_ENABLED, true, |s| {
        &mut s.checks_enabled
    });
}

fn disable_service_checks(core: &mut Core, key: &ServiceKey) {
    set_service_flag(core, key, modattr::ACTIVE_CHECKS_ENABLED, false, |s| {
        &mut s.checks_enabled
    });
}

fn enable_passive_host_checks(core: &mut Core, host: &str) {
    set_host_flag(core, host, modattr::PASSIVE_CHECKS_ENABLED, true, |h| {
        &mut h.accept_passive_checks
    });
}

fn disable_passive_host_checks(core: &mut Core, host: &str) {
    set_host_flag(core, host, modattr::PASSIVE_CHECKS_ENABLED, false, |h| {
        &mut h.accept_passive_checks
    });
}

fn enable_passive_service_checks(core: &mut Core, key: &ServiceKey) {
    set_service_flag(core, key, modattr::PASSIVE_CHECKS_ENABLED, true, |s| {
        &mut s.accept_passive_checks
    });
}

fn disable_passive_service_checks(core: &mut Core, key: &ServiceKey) {
    set_service_flag(core, key, modattr::PASSIVE_CHECKS_ENABLED, false, |s| {
        &mut s.accept_passive_checks
    });
}

fn enable_host_event_handler(core: &mut Core, host: &str) {
    set_host_flag(core, host, modattr::EVENT_HANDLER_ENABLED, true, |h| {
        &mut h.event_handler_enabled
    });
}

fn disable_host_event_handler(core: &mut Core, host: &str) {
    set_host_flag(core, host, modattr::EVENT_HANDLER_ENABLED, false, |h| {
        &mut h.event_handler_enabled
    });
}

fn enable_service_event_handler(core: &mut Core, key: &ServiceKey) {
    set_service_flag(core, key, modattr::EVENT_HANDLER_ENABLED, true, |s| {
        &mut s.event_handler_enabled
    });
}

fn disable_service_event_handler(core: &mut Core, key: &ServiceKey) {
    set_service_flag(core, key, modattr::EVENT_HANDLER_ENABLED, false, |s| {
        &mut s.event_handler_enabled
    });
}

fn start_obsessing_over_host(core: &mut Core, host: &str) {
    set_host_flag(core, host, modattr::OBSESSIVE_HANDLER_ENABLED, true, |h| {
        &mut h.obsess
    });
}

fn stop_obsessing_over_host(core: &mut Core, host: &str) {
    set_host_flag(core, host, modattr::OBSESSIVE_HANDLER_ENABLED, false, |h| {
        &mut h.obsess
    });
}

fn start_obsessing_over_service(core: &mut Core, key: &ServiceKey) {
    set_service_flag(core, key, modattr::OBSESSIVE_HANDLER_ENABLED, true, |s| {
        &mut s.obsess
    });
}

fn stop_obsessing_over_service(core: &mut Core, key: &ServiceKey) {
    set_service_flag(core, key, modattr::OBSESSIVE_HANDLER_ENABLED, false, |s| {
        &mut s.obsess
    });
}

// --- checks -------------------------------------------------------------

/// Schedules the next active host check. The check engine proper is an
/// external collaborator; the core records the request and surfaces the
/// due event.
fn schedule_host_check(core: &mut Core, host: &str, check_time: Timestamp, options: u32) {
    let Some(h) = core.objects.host_mut(host) else {
        return;
    };
    let force = options & CHECK_OPTION_FORCE_EXECUTION != 0;
    if !force && h.next_check != 0 && h.next_check <= check_time {
        // an earlier check is already on the books
        return;
    }
    h.next_check = check_time;
    h.check_options |= options;
    core.events
        .schedule(check_time, EventAction::HostCheck(host.to_string()));
    core.update_host_status(host);
}

fn schedule_service_check(core: &mut Core, key: &ServiceKey, check_time: Timestamp, options: u32) {
    let Some(s) = core.objects.service_mut(key) else {
        return;
    };
    let force = options & CHECK_OPTION_FORCE_EXECUTION != 0;
    if !force && s.next_check != 0 && s.next_check <= check_time {
        return;
    }
    s.next_check = check_time;
    s.check_options |= options;
    core.events
        .schedule(check_time, EventAction::ServiceCheck(key.clone()));
    core.update_service_status(key);
}

// --- acknowledgements ---------------------------------------------------

fn acknowledge_host_problem(
    core: &mut Core,
    host: &str,
    author: &str,
    comment: &str,
    sticky: i32,
    notify: bool,
    persistent: bool,
) {
    if core
        .objects
        .host(host)
        .map(|h| h.current_state == STATE_UP)
        .unwrap_or(true)
    {
        return;
    }
    if notify {
        let _ = notifications::host_notification(
            core,
            host,
            NotificationReason::Acknowledgement,
            Some(author),
            Some(comment),
            notifications::options::NONE,
        );
    }
    if let Some(h) = core.objects.host_mut(host) {
        h.problem_has_been_acknowledged = true;
        h.acknowledgement_type = if sticky == ACKNOWLEDGEMENT_STICKY {
            AckType::Sticky
        } else {
            AckType::Normal
        };
    }
    let entry_time = core.now;
    core.comments.add(
        CommentTarget::Host(host.to_string()),
        CommentEntryType::Acknowledgement,
        entry_time,
        author,
        comment,
        persistent,
        CommentSource::External,
    );
    core.update_host_status(host);
}

fn acknowledge_service_problem(
    core: &mut Core,
    key: &ServiceKey,
    author: &str,
    comment: &str,
    sticky: i32,
    notify: bool,
    persistent: bool,
) {
    if core
        .objects
        .service_by_key(key)
        .map(|s| s.current_state == STATE_OK)
        .unwrap_or(true)
    {
        return;
    }
    if notify {
        let _ = notifications::service_notification(
            core,
            key,
            NotificationReason::Acknowledgement,
            Some(author),
            Some(comment),
            notifications::options::NONE,
        );
    }
    if let Some(s) = core.objects.service_mut(key) {
        s.problem_has_been_acknowledged = true;
        s.acknowledgement_type = if sticky == ACKNOWLEDGEMENT_STICKY {
            AckType::Sticky
        } else {
            AckType::Normal
        };
    }
    let entry_time = core.now;
    core.comments.add(
        CommentTarget::Service(key.clone()),
        CommentEntryType::Acknowledgement,
        entry_time,
        author,
        comment,
        persistent,
        CommentSource::External,
    );
    core.update_service_status(key);
}

fn remove_host_acknowledgement(core: &mut Core, host: &str) {
    if let Some(h) = core.objects.host_mut(host) {
        h.problem_has_been_acknowledged = false;
        h.acknowledgement_type = AckType::None;
    }
    delete_ack_comments(core, &CommentTarget::Host(host.to_string()));
    core.update_host_status(host);
}

fn remove_service_acknowledgement(core: &mut Core, key: &ServiceKey) {
    if let Some(s) = core.objects.service_mut(key) {
        s.problem_has_been_acknowledged = false;
        s.acknowledgement_type = AckType::None;
    }
    delete_ack_comments(core, &CommentTarget::Service(key.clone()));
    core.update_service_status(key);
}

fn delete_ack_comments(core: &mut Core, target: &CommentTarget) {
    let doomed: Vec<u64> = core
        .comments
        .iter()
        .filter(|c| c.entry_type == CommentEntryType::Acknowledgement && &c.target == target)
        .map(|c| c.id)
        .collect();
    for id in doomed {
        core.comments.delete(id);
    }
}

// --- notification propagation over the host tree ------------------------

struct PropagationParams {
    affect_top_host: bool,
    affect_hosts: bool,
    affect_services: bool,
    enable: bool,
}

fn propagate_notifications(core: &mut Core, host: &str, params: &PropagationParams) {
    if params.affect_top_host {
        if params.enable {
            enable_host_notifications(core, host);
        } else {
            disable_host_notifications(core, host);
        }
    }
    propagate_notifications_to_children(core, host, params);
}

fn propagate_notifications_to_children(core: &mut Core, host: &str, params: &PropagationParams) {
    let children = core
        .objects
        .host(host)
        .map(|h| h.child_hosts.clone())
        .unwrap_or_default();
    for child in children {
        if params.affect_hosts {
            if params.enable {
                enable_host_notifications(core, &child);
            } else {
                disable_host_notifications(core, &child);
            }
        }
        if params.affect_services {
            for key in core.objects.services_of_host(&child) {
                if params.enable {
                    enable_service_notifications(core, &key);
                } else {
                    disable_service_notifications(core, &key);
                }
            }
        }
        propagate_notifications_to_children(core, &child, params);
    }
}

struct DowntimeParams {
    entry_time: Timestamp,
    author: String,
    comment: String,
    start_time: Timestamp,
    end_time: Timestamp,
    fixed: bool,
    triggered_by: u64,
    duration: i64,
}

/// Schedules matching downtime on every child host, recursively.
fn schedule_and_propagate_downtime(core: &mut Core, host: &str, params: &DowntimeParams) {
    let children = core
        .objects
        .host(host)
        .map(|h| h.child_hosts.clone())
        .unwrap_or_default();
    for child in children {
        let _ = downtime::schedule_downtime(
            core,
            DowntimeTarget::Host(child.clone()),
            params.entry_time,
            &params.author,
            &params.comment,
            params.start_time,
            params.end_time,
            params.fixed,
            params.triggered_by,
            params.duration,
        );
        schedule_and_propagate_downtime(core, &child, params);
    }
}

// --- passive check results ---------------------------------------------

/// Applies a passive service check result and drives the downstream
/// engines. Results are applied as hard states; soft-retry escalation
/// belongs to the check engine.
fn process_passive_service_check(
    core: &mut Core,
    check_time: Timestamp,
    key: &ServiceKey,
    return_code: i32,
    output: &str,
) -> Result<(), CommandError> {
    if !core.program.accept_passive_service_checks {
        return Err(CommandError::Failure);
    }
    let accepts = {
        let Some(svc) = core.objects.service_by_key(key) else {
            warn!(
                "Warning: Passive check result was received for service '{}' on host '{}', \
                 but the service could not be found!",
                key.description, key.host
            );
            return Err(CommandError::Failure);
        };
        svc.accept_passive_checks
    };
    if !accepts {
        return Err(CommandError::Failure);
    }

    let new_state = return_code.clamp(STATE_OK, 3);
    if core.config.log_passive_checks {
        info!(
            "PASSIVE SERVICE CHECK: {};{};{new_state};{output}",
            key.host, key.description
        );
    }

    let changed = {
        let Some(svc) = core.objects.service_mut(key) else {
            return Err(CommandError::Failure);
        };
        let changed = svc.current_state != new_state;
        svc.last_check = check_time;
        svc.current_state = new_state;
        svc.plugin_output = output.to_string();
        svc.state_type = StateType::Hard;
        if changed {
            svc.last_state_change = check_time;
            svc.last_hard_state_change = check_time;
            // non-sticky acks die on any state change, all acks on recovery
            if svc.problem_has_been_acknowledged
                && (svc.acknowledgement_type != AckType::Sticky || new_state == STATE_OK)
            {
                svc.problem_has_been_acknowledged = false;
                svc.acknowledgement_type = AckType::None;
            }
        }
        changed
    };

    if changed {
        core.broadcast(BrokerEvent::StateChange {
            host: key.host.clone(),
            service: Some(key.description.clone()),
            state: new_state,
            hard: true,
        });
    }

    if new_state != STATE_OK {
        downtime::check_pending_flex_service_downtime(core, key);
    }
    flapping::check_for_service_flapping(core, key, true);

    if new_state != STATE_OK {
        // problem (new or continuing): the viability filters throttle
        let _ = notifications::service_notification(
            core,
            key,
            NotificationReason::Normal,
            None,
            None,
            notifications::options::NONE,
        );
    } else if changed {
        let _ = notifications::service_notification(
            core,
            key,
            NotificationReason::Normal,
            None,
            None,
            notifications::options::NONE,
        );
        if let Some(svc) = core.objects.service_mut(key) {
            svc.current_notification_number = 0;
            svc.notified_on = 0;
            svc.no_more_notifications = false;
        }
    }
    core.update_service_status(key);
    Ok(())
}

/// Host counterpart of [`process_passive_service_check`].
fn process_passive_host_check(
    core: &mut Core,
    check_time: Timestamp,
    host: &str,
    return_code: i32,
    output: &str,
) -> Result<(), CommandError> {
    if !core.program.accept_passive_host_checks {
        return Err(CommandError::Failure);
    }
    let accepts = match core.objects.host(host) {
        Some(h) => h.accept_passive_checks,
        None => {
            warn!(
                "Warning: Passive check result was received for host '{host}', \
                 but the host could not be found!"
            );
            return Err(CommandError::Failure);
        }
    };
    if !accepts {
        return Err(CommandError::Failure);
    }

    let new_state = return_code.clamp(0, 2);
    if core.config.log_passive_checks {
        info!("PASSIVE HOST CHECK: {host};{new_state};{output}");
    }

    let changed = {
        let Some(h) = core.objects.host_mut(host) else {
            return Err(CommandError::Failure);
        };
        let changed = h.current_state != new_state;
        h.last_check = check_time;
        h.current_state = new_state;
        h.plugin_output = output.to_string();
        h.state_type = StateType::Hard;
        if changed {
            h.last_state_change = check_time;
            h.last_hard_state_change = check_time;
            if h.problem_has_been_acknowledged
                && (h.acknowledgement_type != AckType::Sticky || new_state == STATE_UP)
            {
                h.problem_has_been_acknowledged = false;
                h.acknowledgement_type = AckType::None;
            }
        }
        changed
    };

    if changed {
        core.broadcast(BrokerEvent::StateChange {
            host: host.to_string(),
            service: None,
            state: new_state,
            hard: true,
        });
    }

    if new_state != STATE_UP {
        downtime::check_pending_flex_host_downtime(core, host);
    }
    flapping::check_for_host_flapping(core, host, true, true);

    if new_state != STATE_UP {
        let _ = notifications::host_notification(
            core,
            host,
            NotificationReason::Normal,
            None,
            None,
            notifications::options::NONE,
        );
    } else if changed {
        let _ = notifications::host_notification(
            core,
            host,
            NotificationReason::Normal,
            None,
            None,
            notifications::options::NONE,
        );
        if let Some(h) = core.objects.host_mut(host) {
            h.current_notification_number = 0;
            h.notified_on = 0;
            h.no_more_notifications = false;
        }
    }
    core.update_host_status(host);
    Ok(())
}

// --- global commands ----------------------------------------------------

fn global_command_handler(core: &mut Core, cmd: &BoundCommand) -> Result<(), CommandError> {
    match cmd.id {
        ids::ENABLE_NOTIFICATIONS => {
            if !core.program.enable_notifications {
                core.program.enable_notifications = true;
                adaptive_program_update(
                    core,
                    modattr::NOTIFICATIONS_ENABLED,
                    modattr::NOTIFICATIONS_ENABLED,
                );
            }
            Ok(())
        }
        ids::DISABLE_NOTIFICATIONS => {
            if core.program.enable_notifications {
                core.program.enable_notifications = false;
                adaptive_program_update(
                    core,
                    modattr::NOTIFICATIONS_ENABLED,
                    modattr::NOTIFICATIONS_ENABLED,
                );
            }
            Ok(())
        }
        ids::START_EXECUTING_SVC_CHECKS => {
            if !core.program.execute_service_checks {
                core.program.execute_service_checks = true;
                adaptive_program_update(core, 0, modattr::ACTIVE_CHECKS_ENABLED);
            }
            Ok(())
        }
        ids::STOP_EXECUTING_SVC_CHECKS => {
            if core.program.execute_service_checks {
                core.program.execute_service_checks = false;
                adaptive_program_update(core, 0, modattr::ACTIVE_CHECKS_ENABLED);
            }
            Ok(())
        }
        ids::START_ACCEPTING_PASSIVE_SVC_CHECKS => {
            if !core.program.accept_passive_service_checks {
                core.program.accept_passive_service_checks = true;
                adaptive_program_update(core, 0, modattr::PASSIVE_CHECKS_ENABLED);
            }
            Ok(())
        }
        ids::STOP_ACCEPTING_PASSIVE_SVC_CHECKS => {
            if core.program.accept_passive_service_checks {
                core.program.accept_passive_service_checks = false;
                adaptive_program_update(core, 0, modattr::PASSIVE_CHECKS_ENABLED);
            }
            Ok(())
        }
        ids::START_EXECUTING_HOST_CHECKS => {
            if !core.program.execute_host_checks {
                core.program.execute_host_checks = true;
                adaptive_program_update(core, modattr::ACTIVE_CHECKS_ENABLED, 0);
            }
            Ok(())
        }
        ids::STOP_EXECUTING_HOST_CHECKS => {
            if core.program.execute_host_checks {
                core.program.execute_host_checks = false;
                adaptive_program_update(core, modattr::ACTIVE_CHECKS_ENABLED, 0);
            }
            Ok(())
        }
        ids::START_ACCEPTING_PASSIVE_HOST_CHECKS => {
            if !core.program.accept_passive_host_checks {
                core.program.accept_passive_host_checks = true;
                adaptive_program_update(core, modattr::PASSIVE_CHECKS_ENABLED, 0);
            }
            Ok(())
        }
        ids::STOP_ACCEPTING_PASSIVE_HOST_CHECKS => {
            if core.program.accept_passive_host_checks {
                core.program.accept_passive_host_checks = false;
                adaptive_program_update(core, modattr::PASSIVE_CHECKS_ENABLED, 0);
            }
            Ok(())
        }
        ids::ENABLE_EVENT_HANDLERS => {
            if !core.program.enable_event_handlers {
                core.program.enable_event_handlers = true;
                adaptive_program_update(
                    core,
                    modattr::EVENT_HANDLER_ENABLED,
                    modattr::EVENT_HANDLER_ENABLED,
                );
            }
            Ok(())
        }
        ids::DISABLE_EVENT_HANDLERS => {
            if core.program.enable_event_handlers {
                core.program.enable_event_handlers = false;
                adaptive_program_update(
                    core,
                    modattr::EVENT_HANDLER_ENABLED,
                    modattr::EVENT_HANDLER_ENABLED,
                );
            }
            Ok(())
        }
        ids::ENABLE_FLAP_DETECTION => {
            flapping::enable_flap_detection_routines(core);
            Ok(())
        }
        ids::DISABLE_FLAP_DETECTION => {
            flapping::disable_flap_detection_routines(core);
            Ok(())
        }
        ids::ENABLE_PERFORMANCE_DATA => {
            if !core.program.process_performance_data {
                core.program.process_performance_data = true;
                adaptive_program_update(
                    core,
                    modattr::PERFORMANCE_DATA_ENABLED,
                    modattr::PERFORMANCE_DATA_ENABLED,
                );
            }
            Ok(())
        }
        ids::DISABLE_PERFORMANCE_DATA => {
            if core.program.process_performance_data {
                core.program.process_performance_data = false;
                adaptive_program_update(
                    core,
                    modattr::PERFORMANCE_DATA_ENABLED,
                    modattr::PERFORMANCE_DATA_ENABLED,
                );
            }
            Ok(())
        }
        ids::START_OBSESSING_OVER_SVC_CHECKS => {
            if !core.program.obsess_over_services {
                core.program.obsess_over_services = true;
                adaptive_program_update(core, 0, modattr::OBSESSIVE_HANDLER_ENABLED);
            }
            Ok(())
        }
        ids::STOP_OBSESSING_OVER_SVC_CHECKS => {
            if core.program.obsess_over_services {
                core.program.obsess_over_services = false;
                adaptive_program_update(core, 0, modattr::OBSESSIVE_HANDLER_ENABLED);
            }
            Ok(())
        }
        ids::START_OBSESSING_OVER_HOST_CHECKS => {
            if !core.program.obsess_over_hosts {
                core.program.obsess_over_hosts = true;
                adaptive_program_update(core, modattr::OBSESSIVE_HANDLER_ENABLED, 0);
            }
            Ok(())
        }
        ids::STOP_OBSESSING_OVER_HOST_CHECKS => {
            if core.program.obsess_over_hosts {
                core.program.obsess_over_hosts = false;
                adaptive_program_update(core, modattr::OBSESSIVE_HANDLER_ENABLED, 0);
            }
            Ok(())
        }
        ids::ENABLE_SERVICE_FRESHNESS_CHECKS => {
            if !core.program.check_service_freshness {
                core.program.check_service_freshness = true;
                adaptive_program_update(core, 0, modattr::FRESHNESS_CHECKS_ENABLED);
            }
            Ok(())
        }
        ids::DISABLE_SERVICE_FRESHNESS_CHECKS => {
            if core.program.check_service_freshness {
                core.program.check_service_freshness = false;
                adaptive_program_update(core, 0, modattr::FRESHNESS_CHECKS_ENABLED);
            }
            Ok(())
        }
        ids::ENABLE_HOST_FRESHNESS_CHECKS => {
            if !core.program.check_host_freshness {
                core.program.check_host_freshness = true;
                adaptive_program_update(core, modattr::FRESHNESS_CHECKS_ENABLED, 0);
            }
            Ok(())
        }
        ids::DISABLE_HOST_FRESHNESS_CHECKS => {
            if core.program.check_host_freshness {
                core.program.check_host_freshness = false;
                adaptive_program_update(core, modattr::FRESHNESS_CHECKS_ENABLED, 0);
            }
            Ok(())
        }
        ids::SAVE_STATE_INFORMATION => {
            info!("saving state information through the observer surface");
            core.update_program_status();
            Ok(())
        }
        ids::READ_STATE_INFORMATION => {
            info!("reloading state information through the observer surface");
            core.update_program_status();
            Ok(())
        }
        ids::PROCESS_FILE => {
            let file_name = cmd.str_arg("file_name")?.to_string();
            let delete = cmd.bool_arg("delete")?;
            process_external_commands_from_file(core, &file_name, delete)
        }
        other => Err(CommandError::Internal(format!(
            "unknown global command ID {other}"
        ))),
    }
}

fn shutdown_handler(core: &mut Core, _cmd: &BoundCommand) -> Result<(), CommandError> {
    core.events.schedule(core.now, EventAction::Shutdown);
    Ok(())
}

fn restart_handler(core: &mut Core, _cmd: &BoundCommand) -> Result<(), CommandError> {
    core.events.schedule(core.now, EventAction::Restart);
    Ok(())
}

// --- host commands ------------------------------------------------------

fn host_command_handler(core: &mut Core, cmd: &BoundCommand) -> Result<(), CommandError> {
    let entry_time = cmd.entry_time;
    // every host command except comment deletion targets a named host
    let host = if cmd.id == ids::DEL_HOST_COMMENT {
        String::new()
    } else {
        host_arg(core, cmd)?.name.clone()
    };

    match cmd.id {
        ids::ADD_HOST_COMMENT => {
            core.comments.add(
                CommentTarget::Host(host),
                CommentEntryType::User,
                entry_time,
                cmd.str_arg("author")?,
                cmd.str_arg("comment")?,
                cmd.bool_arg("persistent")?,
                CommentSource::External,
            );
            Ok(())
        }
        ids::DEL_HOST_COMMENT => {
            if core.comments.delete(cmd.ulong_arg("comment_id")?) {
                Ok(())
            } else {
                Err(CommandError::Failure)
            }
        }
        ids::DEL_ALL_HOST_COMMENTS => {
            core.comments.delete_for_host(&host);
            Ok(())
        }
        ids::DELAY_HOST_NOTIFICATION => {
            let when = cmd.timestamp_arg("notification_time")?;
            if let Some(h) = core.objects.host_mut(&host) {
                h.next_notification = when;
            }
            Ok(())
        }
        ids::ENABLE_HOST_NOTIFICATIONS => {
            enable_host_notifications(core, &host);
            Ok(())
        }
        ids::DISABLE_HOST_NOTIFICATIONS => {
            disable_host_notifications(core, &host);
            Ok(())
        }
        ids::ENABLE_HOST_SVC_NOTIFICATIONS => {
            for key in core.objects.services_of_host(&host) {
                enable_service_notifications(core, &key);
            }
            Ok(())
        }
        ids::DISABLE_HOST_SVC_NOTIFICATIONS => {
            for key in core.objects.services_of_host(&host) {
                disable_service_notifications(core, &key);
            }
            Ok(())
        }
        ids::ENABLE_ALL_NOTIFICATIONS_BEYOND_HOST => {
            propagate_notifications(
                core,
                &host,
                &PropagationParams {
                    affect_top_host: false,
                    affect_hosts: true,
                    affect_services: true,
                    enable: true,
                },
            );
            Ok(())
        }
        ids::DISABLE_ALL_NOTIFICATIONS_BEYOND_HOST => {
            propagate_notifications(
                core,
                &host,
                &PropagationParams {
                    affect_top_host: false,
                    affect_hosts: true,
                    affect_services: true,
                    enable: false,
                },
            );
            Ok(())
        }
        ids::ENABLE_HOST_AND_CHILD_NOTIFICATIONS => {
            propagate_notifications(
                core,
                &host,
                &PropagationParams {
                    affect_top_host: true,
                    affect_hosts: true,
                    affect_services: false,
                    enable: true,
                },
            );
            Ok(())
        }
        ids::DISABLE_HOST_AND_CHILD_NOTIFICATIONS => {
            propagate_notifications(
                core,
                &host,
                &PropagationParams {
                    affect_top_host: true,
                    affect_hosts: true,
                    affect_services: false,
                    enable: false,
                },
            );
            Ok(())
        }
        ids::ENABLE_HOST_SVC_CHECKS => {
            for key in core.objects.services_of_host(&host) {
                enable_service_checks(core, &key);
            }
            Ok(())
        }
        ids::DISABLE_HOST_SVC_CHECKS => {
            for key in core.objects.services_of_host(&host) {
                disable_service_checks(core, &key);
            }
            Ok(())
        }
        ids::SCHEDULE_HOST_SVC_CHECKS | ids::SCHEDULE_FORCED_HOST_SVC_CHECKS => {
            let check_time = cmd.timestamp_arg("check_time")?;
            let options = if cmd.id == ids::SCHEDULE_FORCED_HOST_SVC_CHECKS {
                CHECK_OPTION_FORCE_EXECUTION
            } else {
                CHECK_OPTION_NONE
            };
            for key in core.objects.services_of_host(&host) {
                schedule_service_check(core, &key, check_time, options);
            }
            Ok(())
        }
        ids::ACKNOWLEDGE_HOST_PROBLEM => {
            let author = cmd.str_arg("author")?.to_string();
            let comment = cmd.str_arg("comment")?.to_string();
            let sticky = cmd.int_arg("sticky")?;
            let notify = cmd.bool_arg("notify")?;
            let persistent = cmd.bool_arg("persistent")?;
            acknowledge_host_problem(core, &host, &author, &comment, sticky, notify, persistent);
            Ok(())
        }
        ids::REMOVE_HOST_ACKNOWLEDGEMENT => {
            remove_host_acknowledgement(core, &host);
            Ok(())
        }
        ids::ENABLE_HOST_EVENT_HANDLER => {
            enable_host_event_handler(core, &host);
            Ok(())
        }
        ids::DISABLE_HOST_EVENT_HANDLER => {
            disable_host_event_handler(core, &host);
            Ok(())
        }
        ids::ENABLE_HOST_CHECK => {
            enable_host_checks(core, &host);
            Ok(())
        }
        ids::DISABLE_HOST_CHECK => {
            disable_host_checks(core, &host);
            Ok(())
        }
        ids::SCHEDULE_HOST_CHECK => {
            schedule_host_check(core, &host, cmd.timestamp_arg("check_time")?, CHECK_OPTION_NONE);
            Ok(())
        }
        ids::SCHEDULE_FORCED_HOST_CHECK => {
            schedule_host_check(
                core,
                &host,
                cmd.timestamp_arg("check_time")?,
                CHECK_OPTION_FORCE_EXECUTION,
            );
            Ok(())
        }
        ids::SCHEDULE_HOST_DOWNTIME => {
            let (start, end, fixed, trigger, duration) = downtime_window(cmd)?;
            downtime::schedule_downtime(
                core,
                DowntimeTarget::Host(host),
                entry_time,
                cmd.str_arg("author")?,
                cmd.str_arg("comment")?,
                start,
                end,
                fixed,
                trigger,
                duration,
            )
            .map(|_| ())
            .map_err(|_| CommandError::Failure)
        }
        ids::SCHEDULE_HOST_SVC_DOWNTIME => {
            let (start, end, fixed, trigger, duration) = downtime_window(cmd)?;
            for key in core.objects.services_of_host(&host) {
                let _ = downtime::schedule_downtime(
                    core,
                    DowntimeTarget::Service(key),
                    entry_time,
                    cmd.str_arg("author")?,
                    cmd.str_arg("comment")?,
                    start,
                    end,
                    fixed,
                    trigger,
                    duration,
                );
            }
            Ok(())
        }
        ids::SCHEDULE_AND_PROPAGATE_HOST_DOWNTIME
        | ids::SCHEDULE_AND_PROPAGATE_TRIGGERED_HOST_DOWNTIME => {
            let (start, end, fixed, trigger, duration) = downtime_window(cmd)?;
            let author = cmd.str_arg("author")?.to_string();
            let comment = cmd.str_arg("comment")?.to_string();
            let parent_id = downtime::schedule_downtime(
                core,
                DowntimeTarget::Host(host.clone()),
                entry_time,
                &author,
                &comment,
                start,
                end,
                fixed,
                trigger,
                duration,
            )
            .map_err(|_| CommandError::Failure)?;
            // triggered propagation chains children to the parent entry
            let triggered_by = if cmd.id == ids::SCHEDULE_AND_PROPAGATE_TRIGGERED_HOST_DOWNTIME {
                parent_id
            } else {
                0
            };
            schedule_and_propagate_downtime(
                core,
                &host,
                &DowntimeParams {
                    entry_time,
                    author,
                    comment,
                    start_time: start,
                    end_time: end,
                    fixed,
                    triggered_by,
                    duration,
                },
            );
            Ok(())
        }
        ids::DEL_HOST_DOWNTIME => downtime::unschedule_downtime(core, cmd.ulong_arg("downtime_id")?)
            .map_err(|_| CommandError::Failure),
        ids::ENABLE_HOST_FLAP_DETECTION => {
            flapping::enable_host_flap_detection(core, &host);
            Ok(())
        }
        ids::DISABLE_HOST_FLAP_DETECTION => {
            flapping::disable_host_flap_detection(core, &host);
            Ok(())
        }
        ids::ENABLE_PASSIVE_HOST_CHECKS => {
            enable_passive_host_checks(core, &host);
            Ok(())
        }
        ids::DISABLE_PASSIVE_HOST_CHECKS => {
            disable_passive_host_checks(core, &host);
            Ok(())
        }
        ids::PROCESS_HOST_CHECK_RESULT => process_passive_host_check(
            core,
            entry_time,
            &host,
            cmd.int_arg("status_code")?,
            cmd.str_arg("plugin_output")?,
        ),
        ids::SEND_CUSTOM_HOST_NOTIFICATION => {
            let options = cmd.int_arg("options")? as u32;
            notifications::host_notification(
                core,
                &host,
                NotificationReason::Custom,
                Some(cmd.str_arg("author")?),
                Some(cmd.str_arg("comment")?),
                options,
            )
            .map_err(|_| CommandError::Failure)
        }
        ids::CHANGE_HOST_NOTIFICATION_TIMEPERIOD => {
            let period = cmd.str_arg("notification_timeperiod")?.to_string();
            let modified = {
                let Some(h) = core.objects.host_mut(&host) else {
                    return Err(CommandError::Failure);
                };
                h.notification_period = Some(period);
                h.modified_attributes |= modattr::NOTIFICATION_TIMEPERIOD;
                h.modified_attributes
            };
            core.broadcast(BrokerEvent::AdaptiveHost {
                host: host.clone(),
                command_id: cmd.id,
                attr: modattr::NOTIFICATION_TIMEPERIOD,
                modified_attributes: modified,
            });
            core.update_host_status(&host);
            Ok(())
        }
        ids::CHANGE_HOST_CHECK_TIMEPERIOD => {
            let period = cmd.str_arg("check_timeperiod")?.to_string();
            let modified = {
                let Some(h) = core.objects.host_mut(&host) else {
                    return Err(CommandError::Failure);
                };
                h.check_period = Some(period);
                h.modified_attributes |= modattr::CHECK_TIMEPERIOD;
                h.modified_attributes
            };
            core.broadcast(BrokerEvent::AdaptiveHost {
                host: host.clone(),
                command_id: cmd.id,
                attr: modattr::CHECK_TIMEPERIOD,
                modified_attributes: modified,
            });
            core.update_host_status(&host);
            Ok(())
        }
        ids::CHANGE_HOST_MODATTR => {
            let value = cmd.ulong_arg("value")? as u32;
            if let Some(h) = core.objects.host_mut(&host) {
                h.modified_attributes = value;
            }
            core.broadcast(BrokerEvent::AdaptiveHost {
                host: host.clone(),
                command_id: cmd.id,
                attr: value,
                modified_attributes: value,
            });
            core.update_host_status(&host);
            Ok(())
        }
        ids::CHANGE_NORMAL_HOST_CHECK_INTERVAL => {
            let new_interval = cmd.timestamp_arg("check_interval")? as f64;
            let interval_length = core.config.interval_length;
            let now = core.now;
            let reschedule = {
                let Some(h) = core.objects.host_mut(&host) else {
                    return Err(CommandError::Failure);
                };
                let old = h.check_interval;
                h.check_interval = new_interval;
                if (h.check_interval - old).abs() < f64::EPSILON {
                    return Ok(());
                }
                h.modified_attributes |= modattr::NORMAL_CHECK_INTERVAL;
                h.check_interval > 0.0
            };
            if reschedule {
                let window = now + (new_interval * interval_length as f64) as Timestamp;
                schedule_host_check(core, &host, window, CHECK_OPTION_NONE);
            }
            Ok(())
        }
        ids::CHANGE_RETRY_HOST_CHECK_INTERVAL => {
            let new_interval = cmd.timestamp_arg("check_interval")? as f64;
            let modified = {
                let Some(h) = core.objects.host_mut(&host) else {
                    return Err(CommandError::Failure);
                };
                h.retry_interval = new_interval;
                h.modified_attributes |= modattr::RETRY_CHECK_INTERVAL;
                h.modified_attributes
            };
            core.broadcast(BrokerEvent::AdaptiveHost {
                host: host.clone(),
                command_id: cmd.id,
                attr: modattr::RETRY_CHECK_INTERVAL,
                modified_attributes: modified,
            });
            core.update_host_status(&host);
            Ok(())
        }
        ids::CHANGE_MAX_HOST_CHECK_ATTEMPTS => {
            let attempts = cmd.int_arg("check_attempts")?;
            if let Some(h) = core.objects.host_mut(&host) {
                h.max_attempts = attempts;
                h.modified_attributes |= modattr::MAX_CHECK_ATTEMPTS;
                if h.state_type == StateType::Hard
                    && h.current_state != STATE_UP
                    && h.current_attempt > 1
                {
                    h.current_attempt = h.max_attempts;
                }
            }
            core.update_host_status(&host);
            Ok(())
        }
        ids::SET_HOST_NOTIFICATION_NUMBER => {
            let number = cmd.int_arg("notification_number")?;
            if let Some(h) = core.objects.host_mut(&host) {
                h.current_notification_number = number;
            }
            core.update_host_status(&host);
            Ok(())
        }
        ids::START_OBSESSING_OVER_HOST => {
            start_obsessing_over_host(core, &host);
            Ok(())
        }
        ids::STOP_OBSESSING_OVER_HOST => {
            stop_obsessing_over_host(core, &host);
            Ok(())
        }
        other => Err(CommandError::Internal(format!(
            "unknown host command ID {other}"
        ))),
    }
}

// --- service commands ---------------------------------------------------

fn service_command_handler(core: &mut Core, cmd: &BoundCommand) -> Result<(), CommandError> {
    let entry_time = cmd.entry_time;
    let key = if cmd.id == ids::DEL_SVC_COMMENT {
        ServiceKey::new("", "")
    } else {
        service_arg(core, cmd)?.key()
    };

    match cmd.id {
        ids::ADD_SVC_COMMENT => {
            core.comments.add(
                CommentTarget::Service(key),
                CommentEntryType::User,
                entry_time,
                cmd.str_arg("author")?,
                cmd.str_arg("comment")?,
                cmd.bool_arg("persistent")?,
                CommentSource::External,
            );
            Ok(())
        }
        ids::DEL_SVC_COMMENT => {
            if core.comments.delete(cmd.ulong_arg("comment_id")?) {
                Ok(())
            } else {
                Err(CommandError::Failure)
            }
        }
        ids::DEL_ALL_SVC_COMMENTS => {
            core.comments.delete_for_service(&key);
            Ok(())
        }
        ids::DELAY_SVC_NOTIFICATION => {
            let when = cmd.timestamp_arg("notification_time")?;
            if let Some(s) = core.objects.service_mut(&key) {
                s.next_notification = when;
            }
            Ok(())
        }
        ids::ENABLE_SVC_NOTIFICATIONS => {
            enable_service_notifications(core, &key);
            Ok(())
        }
        ids::DISABLE_SVC_NOTIFICATIONS => {
            disable_service_notifications(core, &key);
            Ok(())
        }
        ids::ENABLE_SVC_CHECK => {
            enable_service_checks(core, &key);
            Ok(())
        }
        ids::DISABLE_SVC_CHECK => {
            disable_service_checks(core, &key);
            Ok(())
        }
        ids::SCHEDULE_SVC_CHECK => {
            schedule_service_check(core, &key, cmd.timestamp_arg("check_time")?, CHECK_OPTION_NONE);
            Ok(())
        }
        ids::SCHEDULE_FORCED_SVC_CHECK => {
            schedule_service_check(
                core,
                &key,
                cmd.timestamp_arg("check_time")?,
                CHECK_OPTION_FORCE_EXECUTION,
            );
            Ok(())
        }
        ids::ACKNOWLEDGE_SVC_PROBLEM => {
            let author = cmd.str_arg("author")?.to_string();
            let comment = cmd.str_arg("comment")?.to_string();
            let sticky = cmd.int_arg("sticky")?;
            let notify = cmd.bool_arg("notify")?;
            let persistent = cmd.bool_arg("persistent")?;
            acknowledge_service_problem(core, &key, &author, &comment, sticky, notify, persistent);
            Ok(())
        }
        ids::REMOVE_SVC_ACKNOWLEDGEMENT => {
            remove_service_acknowledgement(core, &key);
            Ok(())
        }
        ids::ENABLE_SVC_EVENT_HANDLER => {
            enable_service_event_handler(core, &key);
            Ok(())
        }
        ids::DISABLE_SVC_EVENT_HANDLER => {
            disable_service_event_handler(core, &key);
            Ok(())
        }
        ids::ENABLE_PASSIVE_SVC_CHECKS => {
            enable_passive_service_checks(core, &key);
            Ok(())
        }
        ids::DISABLE_PASSIVE_SVC_CHECKS => {
            disable_passive_service_checks(core, &key);
            Ok(())
        }
        ids::SCHEDULE_SVC_DOWNTIME => {
            let (start, end, fixed, trigger, duration) = downtime_window(cmd)?;
            downtime::schedule_downtime(
                core,
                DowntimeTarget::Service(key),
                entry_time,
                cmd.str_arg("author")?,
                cmd.str_arg("comment")?,
                start,
                end,
                fixed,
                trigger,
                duration,
            )
            .map(|_| ())
            .map_err(|_| CommandError::Failure)
        }
        ids::DEL_SVC_DOWNTIME => downtime::unschedule_downtime(core, cmd.ulong_arg("downtime_id")?)
            .map_err(|_| CommandError::Failure),
        ids::ENABLE_SVC_FLAP_DETECTION => {
            flapping::enable_service_flap_detection(core, &key);
            Ok(())
        }
        ids::DISABLE_SVC_FLAP_DETECTION => {
            flapping::disable_service_flap_detection(core, &key);
            Ok(())
        }
        ids::PROCESS_SERVICE_CHECK_RESULT => process_passive_service_check(
            core,
            entry_time,
            &key,
            cmd.int_arg("status_code")?,
            cmd.str_arg("plugin_output")?,
        ),
        ids::SEND_CUSTOM_SVC_NOTIFICATION => {
            let options = cmd.int_arg("options")? as u32;
            notifications::service_notification(
                core,
                &key,
                NotificationReason::Custom,
                Some(cmd.str_arg("author")?),
                Some(cmd.str_arg("comment")?),
                options,
            )
            .map_err(|_| CommandError::Failure)
        }
        ids::CHANGE_SVC_NOTIFICATION_TIMEPERIOD => {
            let period = cmd.str_arg("notification_timeperiod")?.to_string();
            let modified = {
                let Some(s) = core.objects.service_mut(&key) else {
                    return Err(CommandError::Failure);
                };
                s.notification_period = Some(period);
                s.modified_attributes |= modattr::NOTIFICATION_TIMEPERIOD;
                s.modified_attributes
            };
            core.broadcast(BrokerEvent::AdaptiveService {
                service: key.clone(),
                command_id: cmd.id,
                attr: modattr::NOTIFICATION_TIMEPERIOD,
                modified_attributes: modified,
            });
            core.update_service_status(&key);
            Ok(())
        }
        ids::CHANGE_SVC_CHECK_TIMEPERIOD => {
            let period = cmd.str_arg("check_timeperiod")?.to_string();
            let modified = {
                let Some(s) = core.objects.service_mut(&key) else {
                    return Err(CommandError::Failure);
                };
                s.check_period = Some(period);
                s.modified_attributes |= modattr::CHECK_TIMEPERIOD;
                s.modified_attributes
            };
            core.broadcast(BrokerEvent::AdaptiveService {
                service: key.clone(),
                command_id: cmd.id,
                attr: modattr::CHECK_TIMEPERIOD,
                modified_attributes: modified,
            });
            core.update_service_status(&key);
            Ok(())
        }
        ids::CHANGE_SVC_MODATTR => {
            let value = cmd.ulong_arg("value")? as u32;
            if let Some(s) = core.objects.service_mut(&key) {
                s.modified_attributes = value;
            }
            core.broadcast(BrokerEvent::AdaptiveService {
                service: key.clone(),
                command_id: cmd.id,
                attr: value,
                modified_attributes: value,
            });
            core.update_service_status(&key);
            Ok(())
        }
        ids::CHANGE_NORMAL_SVC_CHECK_INTERVAL => {
            let new_interval = cmd.timestamp_arg("check_interval")? as f64;
            let interval_length = core.config.interval_length;
            let now = core.now;
            let reschedule = {
                let Some(s) = core.objects.service_mut(&key) else {
                    return Err(CommandError::Failure);
                };
                let old = s.check_interval;
                s.check_interval = new_interval;
                if (s.check_interval - old).abs() < f64::EPSILON {
                    return Ok(());
                }
                s.modified_attributes |= modattr::NORMAL_CHECK_INTERVAL;
                s.check_interval > 0.0
            };
            if reschedule {
                let window = now + (new_interval * interval_length as f64) as Timestamp;
                schedule_service_check(core, &key, window, CHECK_OPTION_NONE);
            }
            Ok(())
        }
        ids::CHANGE_RETRY_SVC_CHECK_INTERVAL => {
            let new_interval = cmd.timestamp_arg("check_interval")? as f64;
            let modified = {
                let Some(s) = core.objects.service_mut(&key) else {
                    return Err(CommandError::Failure);
                };
                s.retry_interval = new_interval;
                s.modified_attributes |= modattr::RETRY_CHECK_INTERVAL;
                s.modified_attributes
            };
            core.broadcast(BrokerEvent::AdaptiveService {
                service: key.clone(),
                command_id: cmd.id,
                attr: modattr::RETRY_CHECK_INTERVAL,
                modified_attributes: modified,
            });
            core.update_service_status(&key);
            Ok(())
        }
        ids::CHANGE_MAX_SVC_CHECK_ATTEMPTS => {
            let attempts = cmd.int_arg("check_attempts")?;
            if let Some(s) = core.objects.service_mut(&key) {
                s.max_attempts = attempts;
                s.modified_attributes |= modattr::MAX_CHECK_ATTEMPTS;
                if s.state_type == StateType::Hard
                    && s.current_state != STATE_OK
                    && s.current_attempt > 1
                {
                    s.current_attempt = s.max_attempts;
                }
            }
            core.update_service_status(&key);
            Ok(())
        }
        ids::SET_SVC_NOTIFICATION_NUMBER => {
            let number = cmd.int_arg("notification_number")?;
            if let Some(s) = core.objects.service_mut(&key) {
                s.current_notification_number = number;
            }
            core.update_service_status(&key);
            Ok(())
        }
        ids::START_OBSESSING_OVER_SVC => {
            start_obsessing_over_service(core, &key);
            Ok(())
        }
        ids::STOP_OBSESSING_OVER_SVC => {
            stop_obsessing_over_service(core, &key);
            Ok(())
        }
        other => Err(CommandError::Internal(format!(
            "unknown service command ID {other}"
        ))),
    }
}

// --- hostgroup commands -------------------------------------------------

fn hostgroup_command_handler(core: &mut Core, cmd: &BoundCommand) -> Result<(), CommandError> {
    let group = cmd.str_arg("hostgroup_name")?.to_string();
    if !core.objects.hostgroups.contains_key(&group) {
        return Err(CommandError::ValidationFailure(format!(
            "hostgroup '{group}' not found"
        )));
    }
    let members = core.objects.hosts_in_group(&group);

    match cmd.id {
        ids::ENABLE_HOSTGROUP_HOST_NOTIFICATIONS => {
            for host in &members {
                enable_host_notifications(core, host);
            }
            Ok(())
        }
        ids::DISABLE_HOSTGROUP_HOST_NOTIFICATIONS => {
            for host in &members {
                disable_host_notifications(core, host);
            }
            Ok(())
        }
        ids::ENABLE_HOSTGROUP_SVC_NOTIFICATIONS => {
            for host in &members {
                for key in core.objects.services_of_host(host) {
                    enable_service_notifications(core, &key);
                }
            }
            Ok(())
        }
        ids::DISABLE_HOSTGROUP_SVC_NOTIFICATIONS => {
            for host in &members {
                for key in core.objects.services_of_host(host) {
                    disable_service_notifications(core, &key);
                }
            }
            Ok(())
        }
        ids::ENABLE_HOSTGROUP_HOST_CHECKS => {
            for host in &members {
                enable_host_checks(core, host);
            }
            Ok(())
        }
        ids::DISABLE_HOSTGROUP_HOST_CHECKS => {
            for host in &members {
                disable_host_checks(core, host);
            }
            Ok(())
        }
        ids::ENABLE_HOSTGROUP_SVC_CHECKS => {
            for host in &members {
                for key in core.objects.services_of_host(host) {
                    enable_service_checks(core, &key);
                }
            }
            Ok(())
        }
        ids::DISABLE_HOSTGROUP_SVC_CHECKS => {
            for host in &members {
                for key in core.objects.services_of_host(host) {
                    disable_service_checks(core, &key);
                }
            }
            Ok(())
        }
        ids::ENABLE_HOSTGROUP_PASSIVE_HOST_CHECKS => {
            for host in &members {
                enable_passive_host_checks(core, host);
            }
            Ok(())
        }
        ids::DISABLE_HOSTGROUP_PASSIVE_HOST_CHECKS => {
            for host in &members {
                disable_passive_host_checks(core, host);
            }
            Ok(())
        }
        ids::ENABLE_HOSTGROUP_PASSIVE_SVC_CHECKS => {
            for host in &members {
                for key in core.objects.services_of_host(host) {
                    enable_passive_service_checks(core, &key);
                }
            }
            Ok(())
        }
        ids::DISABLE_HOSTGROUP_PASSIVE_SVC_CHECKS => {
            for host in &members {
                for key in core.objects.services_of_host(host) {
                    disable_passive_service_checks(core, &key);
                }
            }
            Ok(())
        }
        ids::SCHEDULE_HOSTGROUP_HOST_DOWNTIME => {
            let (start, end, fixed, trigger, duration) = downtime_window(cmd)?;
            let mut result = Err(CommandError::Failure);
            for host in &members {
                result = downtime::schedule_downtime(
                    core,
                    DowntimeTarget::Host(host.clone()),
                    cmd.entry_time,
                    cmd.str_arg("author")?,
                    cmd.str_arg("comment")?,
                    start,
                    end,
                    fixed,
                    trigger,
                    duration,
                )
                .map(|_| ())
                .map_err(|_| CommandError::Failure);
                if result.is_err() {
                    break;
                }
            }
            result
        }
        ids::SCHEDULE_HOSTGROUP_SVC_DOWNTIME => {
            let (start, end, fixed, trigger, duration) = downtime_window(cmd)?;
            let mut result = Err(CommandError::Failure);
            'outer: for host in &members {
                for key in core.objects.services_of_host(host) {
                    result = downtime::schedule_downtime(
                        core,
                        DowntimeTarget::Service(key),
                        cmd.entry_time,
                        cmd.str_arg("author")?,
                        cmd.str_arg("comment")?,
                        start,
                        end,
                        fixed,
                        trigger,
                        duration,
                    )
                    .map(|_| ())
                    .map_err(|_| CommandError::Failure);
                    if result.is_err() {
                        break 'outer;
                    }
                }
            }
            result
        }
        other => Err(CommandError::Internal(format!(
            "unknown hostgroup command ID {other}"
        ))),
    }
}

// --- servicegroup commands ----------------------------------------------

fn servicegroup_command_handler(core: &mut Core, cmd: &BoundCommand) -> Result<(), CommandError> {
    let group = cmd.str_arg("servicegroup_name")?.to_string();
    if !core.objects.servicegroups.contains_key(&group) {
        return Err(CommandError::ValidationFailure(format!(
            "servicegroup '{group}' not found"
        )));
    }
    let members = core.objects.services_in_group(&group);

    match cmd.id {
        ids::ENABLE_SERVICEGROUP_SVC_NOTIFICATIONS => {
            for key in &members {
                enable_service_notifications(core, key);
            }
            Ok(())
        }
        ids::DISABLE_SERVICEGROUP_SVC_NOTIFICATIONS => {
            for key in &members {
                disable_service_notifications(core, key);
            }
            Ok(())
        }
        ids::ENABLE_SERVICEGROUP_HOST_NOTIFICATIONS => {
            let mut last_host: Option<&str> = None;
            for key in &members {
                if last_host == Some(key.host.as_str()) {
                    continue;
                }
                enable_host_notifications(core, &key.host);
                last_host = Some(key.host.as_str());
            }
            Ok(())
        }
        ids::DISABLE_SERVICEGROUP_HOST_NOTIFICATIONS => {
            let mut last_host: Option<&str> = None;
            for key in &members {
                if last_host == Some(key.host.as_str()) {
                    continue;
                }
                disable_host_notifications(core, &key.host);
                last_host = Some(key.host.as_str());
            }
            Ok(())
        }
        ids::ENABLE_SERVICEGROUP_SVC_CHECKS => {
            for key in &members {
                enable_service_checks(core, key);
            }
            Ok(())
        }
        ids::DISABLE_SERVICEGROUP_SVC_CHECKS => {
            for key in &members {
                disable_service_checks(core, key);
            }
            Ok(())
        }
        ids::ENABLE_SERVICEGROUP_PASSIVE_SVC_CHECKS => {
            for key in &members {
                enable_passive_service_checks(core, key);
            }
            Ok(())
        }
        ids::DISABLE_SERVICEGROUP_PASSIVE_SVC_CHECKS => {
            for key in &members {
                disable_passive_service_checks(core, key);
            }
            Ok(())
        }
        ids::SCHEDULE_SERVICEGROUP_HOST_DOWNTIME => {
            let (start, end, fixed, trigger, duration) = downtime_window(cmd)?;
            // guard against scheduling the same host twice while walking
            // a servicegroup's members
            let mut last_host: Option<String> = None;
            for key in &members {
                if last_host.as_deref() == Some(key.host.as_str()) {
                    continue;
                }
                let _ = downtime::schedule_downtime(
                    core,
                    DowntimeTarget::Host(key.host.clone()),
                    cmd.entry_time,
                    cmd.str_arg("author")?,
                    cmd.str_arg("comment")?,
                    start,
                    end,
                    fixed,
                    trigger,
                    duration,
                );
                last_host = Some(key.host.clone());
            }
            Ok(())
        }
        ids::SCHEDULE_SERVICEGROUP_SVC_DOWNTIME => {
            let (start, end, fixed, trigger, duration) = downtime_window(cmd)?;
            for key in &members {
                let _ = downtime::schedule_downtime(
                    core,
                    DowntimeTarget::Service(key.clone()),
                    cmd.entry_time,
                    cmd.str_arg("author")?,
                    cmd.str_arg("comment")?,
                    start,
                    end,
                    fixed,
                    trigger,
                    duration,
                );
            }
            Ok(())
        }
        other => Err(CommandError::Internal(format!(
            "unknown servicegroup command ID {other}"
        ))),
    }
}

// --- contact / contactgroup commands ------------------------------------

fn set_contact_notifications(core: &mut Core, name: &str, host_side: bool, value: bool) {
    let attr = modattr::NOTIFICATIONS_ENABLED;
    let modified = {
        let Some(c) = core.objects.contact_mut(name) else {
            return;
        };
        let flag = if host_side {
            &mut c.host_notifications_enabled
        } else {
            &mut c.service_notifications_enabled
        };
        if *flag == value {
            return;
        }
        *flag = value;
        if host_side {
            c.modified_host_attributes |= attr;
        } else {
            c.modified_service_attributes |= attr;
        }
        c.modified_attributes
    };
    core.broadcast(BrokerEvent::AdaptiveContact {
        contact: name.to_string(),
        command_id: -1,
        attr,
        modified_attributes: modified,
    });
    core.update_contact_status(name);
}

fn contact_command_handler(core: &mut Core, cmd: &BoundCommand) -> Result<(), CommandError> {
    let name = cmd.str_arg("contact_name")?.to_string();
    if core.objects.contact(&name).is_none() {
        return Err(CommandError::ValidationFailure(format!(
            "contact '{name}' not found"
        )));
    }

    match cmd.id {
        ids::ENABLE_CONTACT_HOST_NOTIFICATIONS => {
            set_contact_notifications(core, &name, true, true);
            Ok(())
        }
        ids::DISABLE_CONTACT_HOST_NOTIFICATIONS => {
            set_contact_notifications(core, &name, true, false);
            Ok(())
        }
        ids::ENABLE_CONTACT_SVC_NOTIFICATIONS => {
            set_contact_notifications(core, &name, false, true);
            Ok(())
        }
        ids::DISABLE_CONTACT_SVC_NOTIFICATIONS => {
            set_contact_notifications(core, &name, false, false);
            Ok(())
        }
        ids::CHANGE_CONTACT_HOST_NOTIFICATION_TIMEPERIOD => {
            let period = cmd.str_arg("notification_timeperiod")?.to_string();
            if let Some(c) = core.objects.contact_mut(&name) {
                c.host_notification_period = Some(period);
                c.modified_host_attributes |= modattr::NOTIFICATION_TIMEPERIOD;
            }
            core.update_contact_status(&name);
            Ok(())
        }
        ids::CHANGE_CONTACT_SVC_NOTIFICATION_TIMEPERIOD => {
            let period = cmd.str_arg("notification_timeperiod")?.to_string();
            if let Some(c) = core.objects.contact_mut(&name) {
                c.service_notification_period = Some(period);
                c.modified_service_attributes |= modattr::NOTIFICATION_TIMEPERIOD;
            }
            core.update_contact_status(&name);
            Ok(())
        }
        ids::CHANGE_CONTACT_MODATTR => {
            let value = cmd.ulong_arg("value")? as u32;
            if let Some(c) = core.objects.contact_mut(&name) {
                c.modified_attributes = value;
            }
            core.update_contact_status(&name);
            Ok(())
        }
        ids::CHANGE_CONTACT_MODHATTR => {
            let value = cmd.ulong_arg("value")? as u32;
            if let Some(c) = core.objects.contact_mut(&name) {
                c.modified_host_attributes = value;
            }
            core.update_contact_status(&name);
            Ok(())
        }
        ids::CHANGE_CONTACT_MODSATTR => {
            let value = cmd.ulong_arg("value")? as u32;
            if let Some(c) = core.objects.contact_mut(&name) {
                c.modified_service_attributes = value;
            }
            core.update_contact_status(&name);
            Ok(())
        }
        other => Err(CommandError::Internal(format!(
            "unknown contact command ID {other}"
        ))),
    }
}

fn contactgroup_command_handler(core: &mut Core, cmd: &BoundCommand) -> Result<(), CommandError> {
    let group = cmd.str_arg("contactgroup_name")?.to_string();
    if !core.objects.contactgroups.contains_key(&group) {
        return Err(CommandError::ValidationFailure(format!(
            "contactgroup '{group}' not found"
        )));
    }
    let members = core.objects.contacts_in_group(&group);

    match cmd.id {
        ids::ENABLE_CONTACTGROUP_HOST_NOTIFICATIONS => {
            for name in &members {
                set_contact_notifications(core, name, true, true);
            }
            Ok(())
        }
        ids::DISABLE_CONTACTGROUP_HOST_NOTIFICATIONS => {
            for name in &members {
                set_contact_notifications(core, name, true, false);
            }
            Ok(())
        }
        ids::ENABLE_CONTACTGROUP_SVC_NOTIFICATIONS => {
            for name in &members {
                set_contact_notifications(core, name, false, true);
            }
            Ok(())
        }
        ids::DISABLE_CONTACTGROUP_SVC_NOTIFICATIONS => {
            for name in &members {
                set_contact_notifications(core, name, false, false);
            }
            Ok(())
        }
        other => Err(CommandError::Internal(format!(
            "unknown contactgroup command ID {other}"
        ))),
    }
}

// --- custom variables ---------------------------------------------------

fn change_custom_var_handler(core: &mut Core, cmd: &BoundCommand) -> Result<(), CommandError> {
    let varname = cmd.str_arg("varname")?.to_uppercase();
    let varvalue = cmd.str_arg("varvalue")?.to_string();

    fn update(vars: &mut [crate::objects::CustomVar], name: &str, value: &str) -> bool {
        for var in vars {
            if var.name.eq_ignore_ascii_case(name) {
                var.value = value.to_string();
                var.has_been_modified = true;
                return true;
            }
        }
        false
    }

    match cmd.id {
        ids::CHANGE_CUSTOM_HOST_VAR => {
            let host = cmd.str_arg("host_name")?.to_string();
            let Some(h) = core.objects.host_mut(&host) else {
                return Err(CommandError::Failure);
            };
            update(&mut h.custom_variables, &varname, &varvalue);
            h.modified_attributes |= modattr::CUSTOM_VARIABLE;
            core.update_host_status(&host);
            Ok(())
        }
        ids::CHANGE_CUSTOM_SVC_VAR => {
            let key = cmd.service_key_arg("service")?;
            let Some(s) = core.objects.service_mut(&key) else {
                return Err(CommandError::Failure);
            };
            update(&mut s.custom_variables, &varname, &varvalue);
            s.modified_attributes |= modattr::CUSTOM_VARIABLE;
            core.update_service_status(&key);
            Ok(())
        }
        ids::CHANGE_CUSTOM_CONTACT_VAR => {
            let name = cmd.str_arg("contact_name")?.to_string();
            let Some(c) = core.objects.contact_mut(&name) else {
                return Err(CommandError::Failure);
            };
            update(&mut c.custom_variables, &varname, &varvalue);
            c.modified_attributes |= modattr::CUSTOM_VARIABLE;
            core.update_contact_status(&name);
            Ok(())
        }
        other => Err(CommandError::Internal(format!(
            "unknown custom variable command ID {other}"
        ))),
    }
}

// --- downtime deletion by filter ----------------------------------------

fn opt_filter(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn del_downtime_by_filter_handler(core: &mut Core, cmd: &BoundCommand) -> Result<(), CommandError> {
    match cmd.id {
        ids::DEL_DOWNTIME_BY_HOST_NAME => {
            let hostname = cmd.str_arg("hostname")?.to_string();
            let service = cmd.str_arg("service_description")?.to_string();
            let start_time = cmd.timestamp_arg("downtime_start_time")?;
            let comment = cmd.str_arg("comment")?.to_string();
            let deleted = downtime::delete_downtime_by_filter(
                core,
                opt_filter(&hostname),
                opt_filter(&service),
                start_time,
                opt_filter(&comment),
            );
            if deleted == 0 {
                return Err(CommandError::Failure);
            }
            Ok(())
        }
        ids::DEL_DOWNTIME_BY_HOSTGROUP_NAME => {
            let group = cmd.str_arg("hostgroup_name")?.to_string();
            let hostname = cmd.str_arg("hostname")?.to_string();
            let service = cmd.str_arg("service_description")?.to_string();
            let start_time = cmd.timestamp_arg("downtime_start_time")?;
            let comment = cmd.str_arg("comment")?.to_string();
            // counter starts at zero even when no member matches
            let mut deleted = 0usize;
            for member in core.objects.hosts_in_group(&group) {
                if opt_filter(&hostname).is_some_and(|want| member != want) {
                    continue;
                }
                deleted += downtime::delete_downtime_by_filter(
                    core,
                    Some(&member),
                    opt_filter(&service),
                    start_time,
                    opt_filter(&comment),
                );
            }
            if deleted == 0 {
                return Err(CommandError::Failure);
            }
            Ok(())
        }
        ids::DEL_DOWNTIME_BY_START_TIME_COMMENT => {
            let start_time = cmd.timestamp_arg("downtime_start_time")?;
            let comment = cmd.str_arg("comment")?.to_string();
            // refuse to delete everything
            if start_time == 0 && comment.is_empty() {
                return Err(CommandError::Failure);
            }
            let deleted = downtime::delete_downtime_by_filter(
                core,
                None,
                None,
                start_time,
                opt_filter(&comment),
            );
            if deleted == 0 {
                return Err(CommandError::Failure);
            }
            Ok(())
        }
        other => Err(CommandError::Internal(format!(
            "unknown downtime filter deletion command ID {other}"
        ))),
    }
}

// --- registration -------------------------------------------------------

fn reg(
    registry: &mut CommandRegistry,
    name: &str,
    handler: fn(&mut Core, &BoundCommand) -> Result<(), CommandError>,
    description: &str,
    argspec: Option<&str>,
    id: i32,
) {
    match CommandDescriptor::new(name, Some(handler), description, argspec) {
        Ok(desc) => {
            if let Err(e) = registry.register(desc, id) {
                warn!(command = name, error = %e, "failed to register command");
            }
        }
        Err(e) => warn!(command = name, error = %e, "failed to create command"),
    }
}

/// Registers the complete built-in catalog.
pub fn register_core_commands(registry: &mut CommandRegistry) {
    use ids::*;

    const DOWNTIME_ARGS: &str =
        "timestamp=start_time;timestamp=end_time;bool=fixed;ulong=trigger_id;ulong=duration;str=author;str=comment";

    // process-wide toggles
    reg(registry, "ENABLE_NOTIFICATIONS", global_command_handler,
        "Enables host and service notifications on a program-wide basis.", None, ENABLE_NOTIFICATIONS);
    reg(registry, "DISABLE_NOTIFICATIONS", global_command_handler,
        "Disables host and service notifications on a program-wide basis.", None, DISABLE_NOTIFICATIONS);
    reg(registry, "SHUTDOWN_PROCESS", shutdown_handler,
        "Shuts down the monitoring process.", None, SHUTDOWN_PROCESS);
    reg(registry, "RESTART_PROCESS", restart_handler,
        "Restarts the monitoring process.", None, RESTART_PROCESS);
    reg(registry, "START_EXECUTING_SVC_CHECKS", global_command_handler,
        "Enables active checks of services on a program-wide basis.", None, START_EXECUTING_SVC_CHECKS);
    reg(registry, "STOP_EXECUTING_SVC_CHECKS", global_command_handler,
        "Disables active checks of services on a program-wide basis.", None, STOP_EXECUTING_SVC_CHECKS);
    reg(registry, "START_ACCEPTING_PASSIVE_SVC_CHECKS", global_command_handler,
        "Enables passive service checks on a program-wide basis.", None, START_ACCEPTING_PASSIVE_SVC_CHECKS);
    reg(registry, "STOP_ACCEPTING_PASSIVE_SVC_CHECKS", global_command_handler,
        "Disables passive service checks on a program-wide basis.", None, STOP_ACCEPTING_PASSIVE_SVC_CHECKS);
    reg(registry, "START_EXECUTING_HOST_CHECKS", global_command_handler,
        "Enables active host checks on a program-wide basis.", None, START_EXECUTING_HOST_CHECKS);
    reg(registry, "STOP_EXECUTING_HOST_CHECKS", global_command_handler,
        "Disables active host checks on a program-wide basis.", None, STOP_EXECUTING_HOST_CHECKS);
    reg(registry, "START_ACCEPTING_PASSIVE_HOST_CHECKS", global_command_handler,
        "Enables acceptance and processing of passive host checks on a program-wide basis.", None, START_ACCEPTING_PASSIVE_HOST_CHECKS);
    reg(registry, "STOP_ACCEPTING_PASSIVE_HOST_CHECKS", global_command_handler,
        "Disables acceptance and processing of passive host checks on a program-wide basis.", None, STOP_ACCEPTING_PASSIVE_HOST_CHECKS);
    reg(registry, "ENABLE_EVENT_HANDLERS", global_command_handler,
        "Enables host and service event handlers on a program-wide basis.", None, ENABLE_EVENT_HANDLERS);
    reg(registry, "DISABLE_EVENT_HANDLERS", global_command_handler,
        "Disables host and service event handlers on a program-wide basis.", None, DISABLE_EVENT_HANDLERS);
    reg(registry, "ENABLE_FLAP_DETECTION", global_command_handler,
        "Enables host and service flap detection on a program-wide basis.", None, ENABLE_FLAP_DETECTION);
    reg(registry, "DISABLE_FLAP_DETECTION", global_command_handler,
        "Disables host and service flap detection on a program-wide basis.", None, DISABLE_FLAP_DETECTION);
    reg(registry, "ENABLE_PERFORMANCE_DATA", global_command_handler,
        "Enables the processing of host and service performance data on a program-wide basis.", None, ENABLE_PERFORMANCE_DATA);
    reg(registry, "DISABLE_PERFORMANCE_DATA", global_command_handler,
        "Disables the processing of host and service performance data on a program-wide basis.", None, DISABLE_PERFORMANCE_DATA);
    reg(registry, "START_OBSESSING_OVER_SVC_CHECKS", global_command_handler,
        "Enables processing of service checks via the OCSP command on a program-wide basis.", None, START_OBSESSING_OVER_SVC_CHECKS);
    reg(registry, "STOP_OBSESSING_OVER_SVC_CHECKS", global_command_handler,
        "Disables processing of service checks via the OCSP command on a program-wide basis.", None, STOP_OBSESSING_OVER_SVC_CHECKS);
    reg(registry, "START_OBSESSING_OVER_HOST_CHECKS", global_command_handler,
        "Enables processing of host checks via the OCHP command on a program-wide basis.", None, START_OBSESSING_OVER_HOST_CHECKS);
    reg(registry, "STOP_OBSESSING_OVER_HOST_CHECKS", global_command_handler,
        "Disables processing of host checks via the OCHP command on a program-wide basis.", None, STOP_OBSESSING_OVER_HOST_CHECKS);
    reg(registry, "ENABLE_SERVICE_FRESHNESS_CHECKS", global_command_handler,
        "Enables service freshness checking on a program-wide basis.", None, ENABLE_SERVICE_FRESHNESS_CHECKS);
    reg(registry, "DISABLE_SERVICE_FRESHNESS_CHECKS", global_command_handler,
        "Disables service freshness checking on a program-wide basis.", None, DISABLE_SERVICE_FRESHNESS_CHECKS);
    reg(registry, "ENABLE_HOST_FRESHNESS_CHECKS", global_command_handler,
        "Enables host freshness checking on a program-wide basis.", None, ENABLE_HOST_FRESHNESS_CHECKS);
    reg(registry, "DISABLE_HOST_FRESHNESS_CHECKS", global_command_handler,
        "Disables host freshness checking on a program-wide basis.", None, DISABLE_HOST_FRESHNESS_CHECKS);
    reg(registry, "SAVE_STATE_INFORMATION", global_command_handler,
        "Forces an immediate flush of monitoring state to the retention observers.", None, SAVE_STATE_INFORMATION);
    reg(registry, "READ_STATE_INFORMATION", global_command_handler,
        "Reloads monitoring state from the retention observers.", None, READ_STATE_INFORMATION);
    reg(registry, "PROCESS_FILE", global_command_handler,
        "Directs the daemon to process the external commands found in the specified file, optionally deleting it afterwards.",
        Some("str=file_name;bool=delete"), PROCESS_FILE);

    // host commands
    reg(registry, "ADD_HOST_COMMENT", host_command_handler,
        "Adds a comment to the specified host. Non-persistent comments are deleted at the next restart.",
        Some("host=host_name;bool=persistent;str=author;str=comment"), ADD_HOST_COMMENT);
    reg(registry, "DEL_HOST_COMMENT", host_command_handler,
        "Deletes a specific host comment.", Some("ulong=comment_id"), DEL_HOST_COMMENT);
    reg(registry, "DEL_ALL_HOST_COMMENTS", host_command_handler,
        "Deletes all comments associated with a particular host.", Some("host=host_name"), DEL_ALL_HOST_COMMENTS);
    reg(registry, "DELAY_HOST_NOTIFICATION", host_command_handler,
        "Delays the next notification for a particular host until 'notification_time'.",
        Some("host=host_name;timestamp=notification_time"), DELAY_HOST_NOTIFICATION);
    reg(registry, "ENABLE_HOST_NOTIFICATIONS", host_command_handler,
        "Enables notifications for a particular host.", Some("host=host_name"), ENABLE_HOST_NOTIFICATIONS);
    reg(registry, "DISABLE_HOST_NOTIFICATIONS", host_command_handler,
        "Disables notifications for a particular host.", Some("host=host_name"), DISABLE_HOST_NOTIFICATIONS);
    reg(registry, "ENABLE_HOST_SVC_NOTIFICATIONS", host_command_handler,
        "Enables notifications for all services on the specified host.", Some("host=host_name"), ENABLE_HOST_SVC_NOTIFICATIONS);
    reg(registry, "DISABLE_HOST_SVC_NOTIFICATIONS", host_command_handler,
        "Disables notifications for all services on the specified host.", Some("host=host_name"), DISABLE_HOST_SVC_NOTIFICATIONS);
    reg(registry, "ENABLE_ALL_NOTIFICATIONS_BEYOND_HOST", host_command_handler,
        "Enables notifications for all hosts and services beyond the specified host.", Some("host=host_name"), ENABLE_ALL_NOTIFICATIONS_BEYOND_HOST);
    reg(registry, "DISABLE_ALL_NOTIFICATIONS_BEYOND_HOST", host_command_handler,
        "Disables notifications for all hosts and services beyond the specified host.", Some("host=host_name"), DISABLE_ALL_NOTIFICATIONS_BEYOND_HOST);
    reg(registry, "ENABLE_HOST_AND_CHILD_NOTIFICATIONS", host_command_handler,
        "Enables notifications for the specified host and its child hosts.", Some("host=host_name"), ENABLE_HOST_AND_CHILD_NOTIFICATIONS);
    reg(registry, "DISABLE_HOST_AND_CHILD_NOTIFICATIONS", host_command_handler,
        "Disables notifications for the specified host and its child hosts.", Some("host=host_name"), DISABLE_HOST_AND_CHILD_NOTIFICATIONS);
    reg(registry, "ENABLE_HOST_SVC_CHECKS", host_command_handler,
        "Enables active checks of all services on the specified host.", Some("host=host_name"), ENABLE_HOST_SVC_CHECKS);
    reg(registry, "DISABLE_HOST_SVC_CHECKS", host_command_handler,
        "Disables active checks of all services on the specified host.", Some("host=host_name"), DISABLE_HOST_SVC_CHECKS);
    reg(registry, "SCHEDULE_HOST_SVC_CHECKS", host_command_handler,
        "Schedules the next active check of all services on a particular host.",
        Some("host=host_name;timestamp=check_time"), SCHEDULE_HOST_SVC_CHECKS);
    reg(registry, "SCHEDULE_FORCED_HOST_SVC_CHECKS", host_command_handler,
        "Schedules a forced active check of all services associated with a particular host.",
        Some("host=host_name;timestamp=check_time"), SCHEDULE_FORCED_HOST_SVC_CHECKS);
    reg(registry, "ACKNOWLEDGE_HOST_PROBLEM", host_command_handler,
        "Acknowledges the current problem for the specified host, suppressing further notifications for the same state.",
        Some("host=host_name;int=sticky;bool=notify;bool=persistent;str=author;str=comment"), ACKNOWLEDGE_HOST_PROBLEM);
    reg(registry, "REMOVE_HOST_ACKNOWLEDGEMENT", host_command_handler,
        "Removes the problem acknowledgement for a particular host.", Some("host=host_name"), REMOVE_HOST_ACKNOWLEDGEMENT);
    reg(registry, "ENABLE_HOST_EVENT_HANDLER", host_command_handler,
        "Enables the event handler for the specified host.", Some("host=host_name"), ENABLE_HOST_EVENT_HANDLER);
    reg(registry, "DISABLE_HOST_EVENT_HANDLER", host_command_handler,
        "Disables the event handler for the specified host.", Some("host=host_name"), DISABLE_HOST_EVENT_HANDLER);
    reg(registry, "ENABLE_HOST_CHECK", host_command_handler,
        "Enables active checks of the specified host.", Some("host=host_name"), ENABLE_HOST_CHECK);
    reg(registry, "DISABLE_HOST_CHECK", host_command_handler,
        "Disables active checks of the specified host.", Some("host=host_name"), DISABLE_HOST_CHECK);
    reg(registry, "SCHEDULE_HOST_CHECK", host_command_handler,
        "Schedules the next active check of a particular host.", Some("host=host_name;timestamp=check_time"), SCHEDULE_HOST_CHECK);
    reg(registry, "SCHEDULE_FORCED_HOST_CHECK", host_command_handler,
        "Schedules a forced active check of a particular host.", Some("host=host_name;timestamp=check_time"), SCHEDULE_FORCED_HOST_CHECK);
    reg(registry, "SCHEDULE_HOST_DOWNTIME", host_command_handler,
        "Schedules downtime for a specified host. Fixed downtime covers start to end; flexible downtime begins inside the window and lasts 'duration' seconds, optionally triggered by another downtime entry.",
        Some(format!("host=host_name;{DOWNTIME_ARGS}").as_str()), SCHEDULE_HOST_DOWNTIME);
    reg(registry, "SCHEDULE_HOST_SVC_DOWNTIME", host_command_handler,
        "Schedules downtime for all services associated with a particular host.",
        Some(format!("host=host_name;{DOWNTIME_ARGS}").as_str()), SCHEDULE_HOST_SVC_DOWNTIME);
    reg(registry, "SCHEDULE_AND_PROPAGATE_HOST_DOWNTIME", host_command_handler,
        "Schedules downtime for a specified host and all of its children.",
        Some(format!("host=host_name;{DOWNTIME_ARGS}").as_str()), SCHEDULE_AND_PROPAGATE_HOST_DOWNTIME);
    reg(registry, "SCHEDULE_AND_PROPAGATE_TRIGGERED_HOST_DOWNTIME", host_command_handler,
        "Schedules downtime for a specified host and triggered downtime for all of its children.",
        Some(format!("host=host_name;{DOWNTIME_ARGS}").as_str()), SCHEDULE_AND_PROPAGATE_TRIGGERED_HOST_DOWNTIME);
    reg(registry, "DEL_HOST_DOWNTIME", host_command_handler,
        "Deletes the host downtime entry with the matching id, ending it if currently in effect.",
        Some("ulong=downtime_id"), DEL_HOST_DOWNTIME);
    reg(registry, "ENABLE_HOST_FLAP_DETECTION", host_command_handler,
        "Enables flap detection for the specified host.", Some("host=host_name"), ENABLE_HOST_FLAP_DETECTION);
    reg(registry, "DISABLE_HOST_FLAP_DETECTION", host_command_handler,
        "Disables flap detection for the specified host.", Some("host=host_name"), DISABLE_HOST_FLAP_DETECTION);
    reg(registry, "ENABLE_PASSIVE_HOST_CHECKS", host_command_handler,
        "Enables acceptance and processing of passive host checks for the specified host.", Some("host=host_name"), ENABLE_PASSIVE_HOST_CHECKS);
    reg(registry, "DISABLE_PASSIVE_HOST_CHECKS", host_command_handler,
        "Disables acceptance and processing of passive host checks for the specified host.", Some("host=host_name"), DISABLE_PASSIVE_HOST_CHECKS);
    reg(registry, "PROCESS_HOST_CHECK_RESULT", host_command_handler,
        "Submits a passive check result for a particular host (0=UP, 1=DOWN, 2=UNREACHABLE).",
        Some("host=host_name;int=status_code;str=plugin_output"), PROCESS_HOST_CHECK_RESULT);
    reg(registry, "SEND_CUSTOM_HOST_NOTIFICATION", host_command_handler,
        "Sends a custom host notification. Options: 1 = broadcast, 2 = forced, 4 = increment notification number.",
        Some("host=host_name;int=options;str=author;str=comment"), SEND_CUSTOM_HOST_NOTIFICATION);
    reg(registry, "CHANGE_HOST_NOTIFICATION_TIMEPERIOD", host_command_handler,
        "Changes the host notification timeperiod to the named, already configured timeperiod.",
        Some("host=host_name;timeperiod=notification_timeperiod"), CHANGE_HOST_NOTIFICATION_TIMEPERIOD);
    reg(registry, "CHANGE_HOST_CHECK_TIMEPERIOD", host_command_handler,
        "Changes the host check timeperiod to the named, already configured timeperiod.",
        Some("host=host_name;timeperiod=check_timeperiod"), CHANGE_HOST_CHECK_TIMEPERIOD);
    reg(registry, "CHANGE_HOST_MODATTR", host_command_handler,
        "Changes the modified attributes value for the specified host; this drives data retention.",
        Some("host=host_name;ulong=value"), CHANGE_HOST_MODATTR);
    reg(registry, "CHANGE_NORMAL_HOST_CHECK_INTERVAL", host_command_handler,
        "Changes the normal check interval for a particular host, rescheduling the next check when it becomes non-zero.",
        Some("host=host_name;timestamp=check_interval"), CHANGE_NORMAL_HOST_CHECK_INTERVAL);
    reg(registry, "CHANGE_RETRY_HOST_CHECK_INTERVAL", host_command_handler,
        "Changes the retry check interval for a particular host.",
        Some("host=host_name;timestamp=check_interval"), CHANGE_RETRY_HOST_CHECK_INTERVAL);
    reg(registry, "CHANGE_MAX_HOST_CHECK_ATTEMPTS", host_command_handler,
        "Changes the maximum number of check attempts for a particular host.",
        Some("host=host_name;int=check_attempts"), CHANGE_MAX_HOST_CHECK_ATTEMPTS);
    reg(registry, "SET_HOST_NOTIFICATION_NUMBER", host_command_handler,
        "Sets the current notification number for a particular host.",
        Some("host=host_name;int=notification_number"), SET_HOST_NOTIFICATION_NUMBER);
    reg(registry, "START_OBSESSING_OVER_HOST", host_command_handler,
        "Starts obsessing over check results for the specified host.", Some("host=host_name"), START_OBSESSING_OVER_HOST);
    reg(registry, "STOP_OBSESSING_OVER_HOST", host_command_handler,
        "Stops obsessing over check results for the specified host.", Some("host=host_name"), STOP_OBSESSING_OVER_HOST);

    // service commands
    reg(registry, "ADD_SVC_COMMENT", service_command_handler,
        "Adds a comment to the specified service. Non-persistent comments are deleted at the next restart.",
        Some("service=service;bool=persistent;str=author;str=comment"), ADD_SVC_COMMENT);
    reg(registry, "DEL_SVC_COMMENT", service_command_handler,
        "Deletes a specific service comment.", Some("ulong=comment_id"), DEL_SVC_COMMENT);
    reg(registry, "DEL_ALL_SVC_COMMENTS", service_command_handler,
        "Deletes all comments associated with a particular service.", Some("service=service"), DEL_ALL_SVC_COMMENTS);
    reg(registry, "DELAY_SVC_NOTIFICATION", service_command_handler,
        "Delays the next notification for a particular service until 'notification_time'.",
        Some("service=service;timestamp=notification_time"), DELAY_SVC_NOTIFICATION);
    reg(registry, "ENABLE_SVC_NOTIFICATIONS", service_command_handler,
        "Enables notifications for a particular service.", Some("service=service"), ENABLE_SVC_NOTIFICATIONS);
    reg(registry, "DISABLE_SVC_NOTIFICATIONS", service_command_handler,
        "Disables notifications for a particular service.", Some("service=service"), DISABLE_SVC_NOTIFICATIONS);
    reg(registry, "ENABLE_SVC_CHECK", service_command_handler,
        "Enables active checks of a service.", Some("service=service"), ENABLE_SVC_CHECK);
    reg(registry, "DISABLE_SVC_CHECK", service_command_handler,
        "Disables active checks of a service.", Some("service=service"), DISABLE_SVC_CHECK);
    reg(registry, "SCHEDULE_SVC_CHECK", service_command_handler,
        "Schedules the next active check of a specified service at 'check_time'.",
        Some("service=service;timestamp=check_time"), SCHEDULE_SVC_CHECK);
    reg(registry, "SCHEDULE_FORCED_SVC_CHECK", service_command_handler,
        "Schedules a forced active check of a particular service at 'check_time'.",
        Some("service=service;timestamp=check_time"), SCHEDULE_FORCED_SVC_CHECK);
    reg(registry, "ACKNOWLEDGE_SVC_PROBLEM", service_command_handler,
        "Acknowledges the current problem for the specified service, suppressing further notifications for the same state.",
        Some("service=service;int=sticky;bool=notify;bool=persistent;str=author;str=comment"), ACKNOWLEDGE_SVC_PROBLEM);
    reg(registry, "REMOVE_SVC_ACKNOWLEDGEMENT", service_command_handler,
        "Removes the problem acknowledgement for a particular service.", Some("service=service"), REMOVE_SVC_ACKNOWLEDGEMENT);
    reg(registry, "ENABLE_SVC_EVENT_HANDLER", service_command_handler,
        "Enables the event handler for the specified service.", Some("service=service"), ENABLE_SVC_EVENT_HANDLER);
    reg(registry, "DISABLE_SVC_EVENT_HANDLER", service_command_handler,
        "Disables the event handler for the specified service.", Some("service=service"), DISABLE_SVC_EVENT_HANDLER);
    reg(registry, "ENABLE_PASSIVE_SVC_CHECKS", service_command_handler,
        "Enables passive checks for the specified service.", Some("service=service"), ENABLE_PASSIVE_SVC_CHECKS);
    reg(registry, "DISABLE_PASSIVE_SVC_CHECKS", service_command_handler,
        "Disables passive checks for the specified service.", Some("service=service"), DISABLE_PASSIVE_SVC_CHECKS);
    reg(registry, "SCHEDULE_SVC_DOWNTIME", service_command_handler,
        "Schedules downtime for a specified service.",
        Some(format!("service=service;{DOWNTIME_ARGS}").as_str()), SCHEDULE_SVC_DOWNTIME);
    reg(registry, "DEL_SVC_DOWNTIME", service_command_handler,
        "Deletes the service downtime entry with the matching id, ending it if currently in effect.",
        Some("ulong=downtime_id"), DEL_SVC_DOWNTIME);
    reg(registry, "ENABLE_SVC_FLAP_DETECTION", service_command_handler,
        "Enables flap detection for the specified service.", Some("service=service"), ENABLE_SVC_FLAP_DETECTION);
    reg(registry, "DISABLE_SVC_FLAP_DETECTION", service_command_handler,
        "Disables flap detection for the specified service.", Some("service=service"), DISABLE_SVC_FLAP_DETECTION);
    reg(registry, "PROCESS_SERVICE_CHECK_RESULT", service_command_handler,
        "Submits a passive check result for a particular service (0=OK, 1=WARNING, 2=CRITICAL, 3=UNKNOWN).",
        Some("service=service;int=status_code;str=plugin_output"), PROCESS_SERVICE_CHECK_RESULT);
    reg(registry, "SEND_CUSTOM_SVC_NOTIFICATION", service_command_handler,
        "Sends a custom service notification. Options: 1 = broadcast, 2 = forced, 4 = increment notification number.",
        Some("service=service;int=options;str=author;str=comment"), SEND_CUSTOM_SVC_NOTIFICATION);
    reg(registry, "CHANGE_SVC_NOTIFICATION_TIMEPERIOD", service_command_handler,
        "Changes the service notification timeperiod to the named, already configured timeperiod.",
        Some("service=service;timeperiod=notification_timeperiod"), CHANGE_SVC_NOTIFICATION_TIMEPERIOD);
    reg(registry, "CHANGE_SVC_CHECK_TIMEPERIOD", service_command_handler,
        "Changes the service check timeperiod to the named, already configured timeperiod.",
        Some("service=service;timeperiod=check_timeperiod"), CHANGE_SVC_CHECK_TIMEPERIOD);
    reg(registry, "CHANGE_SVC_MODATTR", service_command_handler,
        "Changes the modified attributes value for the specified service; this drives data retention.",
        Some("service=service;ulong=value"), CHANGE_SVC_MODATTR);
    reg(registry, "CHANGE_NORMAL_SVC_CHECK_INTERVAL", service_command_handler,
        "Changes the normal check interval for a particular service, rescheduling the next check when it becomes non-zero.",
        Some("service=service;timestamp=check_interval"), CHANGE_NORMAL_SVC_CHECK_INTERVAL);
    reg(registry, "CHANGE_RETRY_SVC_CHECK_INTERVAL", service_command_handler,
        "Changes the retry check interval for a particular service.",
        Some("service=service;timestamp=check_interval"), CHANGE_RETRY_SVC_CHECK_INTERVAL);
    reg(registry, "CHANGE_MAX_SVC_CHECK_ATTEMPTS", service_command_handler,
        "Changes the maximum number of check attempts for a particular service.",
        Some("service=service;int=check_attempts"), CHANGE_MAX_SVC_CHECK_ATTEMPTS);
    reg(registry, "SET_SVC_NOTIFICATION_NUMBER", service_command_handler,
        "Sets the current notification number for a particular service.",
        Some("service=service;int=notification_number"), SET_SVC_NOTIFICATION_NUMBER);
    reg(registry, "START_OBSESSING_OVER_SVC", service_command_handler,
        "Starts obsessing over check results for the specified service.", Some("service=service"), START_OBSESSING_OVER_SVC);
    reg(registry, "STOP_OBSESSING_OVER_SVC", service_command_handler,
        "Stops obsessing over check results for the specified service.", Some("service=service"), STOP_OBSESSING_OVER_SVC);

    // hostgroup commands
    reg(registry, "ENABLE_HOSTGROUP_HOST_NOTIFICATIONS", hostgroup_command_handler,
        "Enables notifications for all hosts in a particular hostgroup.", Some("hostgroup=hostgroup_name"), ENABLE_HOSTGROUP_HOST_NOTIFICATIONS);
    reg(registry, "DISABLE_HOSTGROUP_HOST_NOTIFICATIONS", hostgroup_command_handler,
        "Disables notifications for all hosts in a particular hostgroup.", Some("hostgroup=hostgroup_name"), DISABLE_HOSTGROUP_HOST_NOTIFICATIONS);
    reg(registry, "ENABLE_HOSTGROUP_SVC_NOTIFICATIONS", hostgroup_command_handler,
        "Enables notifications for all services associated with hosts in a particular hostgroup.", Some("hostgroup=hostgroup_name"), ENABLE_HOSTGROUP_SVC_NOTIFICATIONS);
    reg(registry, "DISABLE_HOSTGROUP_SVC_NOTIFICATIONS", hostgroup_command_handler,
        "Disables notifications for all services associated with hosts in a particular hostgroup.", Some("hostgroup=hostgroup_name"), DISABLE_HOSTGROUP_SVC_NOTIFICATIONS);
    reg(registry, "ENABLE_HOSTGROUP_HOST_CHECKS", hostgroup_command_handler,
        "Enables active checks for all hosts in a particular hostgroup.", Some("hostgroup=hostgroup_name"), ENABLE_HOSTGROUP_HOST_CHECKS);
    reg(registry, "DISABLE_HOSTGROUP_HOST_CHECKS", hostgroup_command_handler,
        "Disables active checks for all hosts in a particular hostgroup.", Some("hostgroup=hostgroup_name"), DISABLE_HOSTGROUP_HOST_CHECKS);
    reg(registry, "ENABLE_HOSTGROUP_SVC_CHECKS", hostgroup_command_handler,
        "Enables active checks for all services associated with hosts in a particular hostgroup.", Some("hostgroup=hostgroup_name"), ENABLE_HOSTGROUP_SVC_CHECKS);
    reg(registry, "DISABLE_HOSTGROUP_SVC_CHECKS", hostgroup_command_handler,
        "Disables active checks for all services associated with hosts in a particular hostgroup.", Some("hostgroup=hostgroup_name"), DISABLE_HOSTGROUP_SVC_CHECKS);
    reg(registry, "ENABLE_HOSTGROUP_PASSIVE_HOST_CHECKS", hostgroup_command_handler,
        "Enables passive checks for all hosts in a particular hostgroup.", Some("hostgroup=hostgroup_name"), ENABLE_HOSTGROUP_PASSIVE_HOST_CHECKS);
    reg(registry, "DISABLE_HOSTGROUP_PASSIVE_HOST_CHECKS", hostgroup_command_handler,
        "Disables passive checks for all hosts in a particular hostgroup.", Some("hostgroup=hostgroup_name"), DISABLE_HOSTGROUP_PASSIVE_HOST_CHECKS);
    reg(registry, "ENABLE_HOSTGROUP_PASSIVE_SVC_CHECKS", hostgroup_command_handler,
        "Enables passive checks for all services associated with hosts in a particular hostgroup.", Some("hostgroup=hostgroup_name"), ENABLE_HOSTGROUP_PASSIVE_SVC_CHECKS);
    reg(registry, "DISABLE_HOSTGROUP_PASSIVE_SVC_CHECKS", hostgroup_command_handler,
        "Disables passive checks for all services associated with hosts in a particular hostgroup.", Some("hostgroup=hostgroup_name"), DISABLE_HOSTGROUP_PASSIVE_SVC_CHECKS);
    reg(registry, "SCHEDULE_HOSTGROUP_HOST_DOWNTIME", hostgroup_command_handler,
        "Schedules downtime for all hosts in a specified hostgroup.",
        Some(format!("hostgroup=hostgroup_name;{DOWNTIME_ARGS}").as_str()), SCHEDULE_HOSTGROUP_HOST_DOWNTIME);
    reg(registry, "SCHEDULE_HOSTGROUP_SVC_DOWNTIME", hostgroup_command_handler,
        "Schedules downtime for all services associated with hosts in a specified hostgroup.",
        Some(format!("hostgroup=hostgroup_name;{DOWNTIME_ARGS}").as_str()), SCHEDULE_HOSTGROUP_SVC_DOWNTIME);

    // servicegroup commands
    reg(registry, "ENABLE_SERVICEGROUP_SVC_NOTIFICATIONS", servicegroup_command_handler,
        "Enables notifications for all services in a particular servicegroup.", Some("servicegroup=servicegroup_name"), ENABLE_SERVICEGROUP_SVC_NOTIFICATIONS);
    reg(registry, "DISABLE_SERVICEGROUP_SVC_NOTIFICATIONS", servicegroup_command_handler,
        "Disables notifications for all services in a particular servicegroup.", Some("servicegroup=servicegroup_name"), DISABLE_SERVICEGROUP_SVC_NOTIFICATIONS);
    reg(registry, "ENABLE_SERVICEGROUP_HOST_NOTIFICATIONS", servicegroup_command_handler,
        "Enables notifications for all hosts with services in a particular servicegroup.", Some("servicegroup=servicegroup_name"), ENABLE_SERVICEGROUP_HOST_NOTIFICATIONS);
    reg(registry, "DISABLE_SERVICEGROUP_HOST_NOTIFICATIONS", servicegroup_command_handler,
        "Disables notifications for all hosts with services in a particular servicegroup.", Some("servicegroup=servicegroup_name"), DISABLE_SERVICEGROUP_HOST_NOTIFICATIONS);
    reg(registry, "ENABLE_SERVICEGROUP_SVC_CHECKS", servicegroup_command_handler,
        "Enables active checks for all services in a particular servicegroup.", Some("servicegroup=servicegroup_name"), ENABLE_SERVICEGROUP_SVC_CHECKS);
    reg(registry, "DISABLE_SERVICEGROUP_SVC_CHECKS", servicegroup_command_handler,
        "Disables active checks for all services in a particular servicegroup.", Some("servicegroup=servicegroup_name"), DISABLE_SERVICEGROUP_SVC_CHECKS);
    reg(registry, "ENABLE_SERVICEGROUP_PASSIVE_SVC_CHECKS", servicegroup_command_handler,
        "Enables passive checks for all services in a particular servicegroup.", Some("servicegroup=servicegroup_name"), ENABLE_SERVICEGROUP_PASSIVE_SVC_CHECKS);
    reg(registry, "DISABLE_SERVICEGROUP_PASSIVE_SVC_CHECKS", servicegroup_command_handler,
        "Disables passive checks for all services in a particular servicegroup.", Some("servicegroup=servicegroup_name"), DISABLE_SERVICEGROUP_PASSIVE_SVC_CHECKS);
    reg(registry, "SCHEDULE_SERVICEGROUP_HOST_DOWNTIME", servicegroup_command_handler,
        "Schedules downtime for all hosts with services in a specified servicegroup.",
        Some(format!("servicegroup=servicegroup_name;{DOWNTIME_ARGS}").as_str()), SCHEDULE_SERVICEGROUP_HOST_DOWNTIME);
    reg(registry, "SCHEDULE_SERVICEGROUP_SVC_DOWNTIME", servicegroup_command_handler,
        "Schedules downtime for all services in a specified servicegroup.",
        Some(format!("servicegroup=servicegroup_name;{DOWNTIME_ARGS}").as_str()), SCHEDULE_SERVICEGROUP_SVC_DOWNTIME);

    // contact and contactgroup commands
    reg(registry, "ENABLE_CONTACT_HOST_NOTIFICATIONS", contact_command_handler,
        "Enables host notifications for a particular contact.", Some("contact=contact_name"), ENABLE_CONTACT_HOST_NOTIFICATIONS);
    reg(registry, "DISABLE_CONTACT_HOST_NOTIFICATIONS", contact_command_handler,
        "Disables host notifications for a particular contact.", Some("contact=contact_name"), DISABLE_CONTACT_HOST_NOTIFICATIONS);
    reg(registry, "ENABLE_CONTACT_SVC_NOTIFICATIONS", contact_command_handler,
        "Enables service notifications for a particular contact.", Some("contact=contact_name"), ENABLE_CONTACT_SVC_NOTIFICATIONS);
    reg(registry, "DISABLE_CONTACT_SVC_NOTIFICATIONS", contact_command_handler,
        "Disables service notifications for a particular contact.", Some("contact=contact_name"), DISABLE_CONTACT_SVC_NOTIFICATIONS);
    reg(registry, "CHANGE_CONTACT_HOST_NOTIFICATION_TIMEPERIOD", contact_command_handler,
        "Changes a contact's host notification timeperiod.",
        Some("contact=contact_name;timeperiod=notification_timeperiod"), CHANGE_CONTACT_HOST_NOTIFICATION_TIMEPERIOD);
    reg(registry, "CHANGE_CONTACT_SVC_NOTIFICATION_TIMEPERIOD", contact_command_handler,
        "Changes a contact's service notification timeperiod.",
        Some("contact=contact_name;timeperiod=notification_timeperiod"), CHANGE_CONTACT_SVC_NOTIFICATION_TIMEPERIOD);
    reg(registry, "CHANGE_CONTACT_MODATTR", contact_command_handler,
        "Changes the modified attributes value for the specified contact.",
        Some("contact=contact_name;ulong=value"), CHANGE_CONTACT_MODATTR);
    reg(registry, "CHANGE_CONTACT_MODHATTR", contact_command_handler,
        "Changes the modified host attributes value for the specified contact.",
        Some("contact=contact_name;ulong=value"), CHANGE_CONTACT_MODHATTR);
    reg(registry, "CHANGE_CONTACT_MODSATTR", contact_command_handler,
        "Changes the modified service attributes value for the specified contact.",
        Some("contact=contact_name;ulong=value"), CHANGE_CONTACT_MODSATTR);
    reg(registry, "ENABLE_CONTACTGROUP_HOST_NOTIFICATIONS", contactgroup_command_handler,
        "Enables host notifications for all contacts in a particular contactgroup.", Some("contactgroup=contactgroup_name"), ENABLE_CONTACTGROUP_HOST_NOTIFICATIONS);
    reg(registry, "DISABLE_CONTACTGROUP_HOST_NOTIFICATIONS", contactgroup_command_handler,
        "Disables host notifications for all contacts in a particular contactgroup.", Some("contactgroup=contactgroup_name"), DISABLE_CONTACTGROUP_HOST_NOTIFICATIONS);
    reg(registry, "ENABLE_CONTACTGROUP_SVC_NOTIFICATIONS", contactgroup_command_handler,
        "Enables service notifications for all contacts in a particular contactgroup.", Some("contactgroup=contactgroup_name"), ENABLE_CONTACTGROUP_SVC_NOTIFICATIONS);
    reg(registry, "DISABLE_CONTACTGROUP_SVC_NOTIFICATIONS", contactgroup_command_handler,
        "Disables service notifications for all contacts in a particular contactgroup.", Some("contactgroup=contactgroup_name"), DISABLE_CONTACTGROUP_SVC_NOTIFICATIONS);

    // custom variables
    reg(registry, "CHANGE_CUSTOM_HOST_VAR", change_custom_var_handler,
        "Changes the value of a custom host variable.",
        Some("host=host_name;str=varname;str=varvalue"), CHANGE_CUSTOM_HOST_VAR);
    reg(registry, "CHANGE_CUSTOM_SVC_VAR", change_custom_var_handler,
        "Changes the value of a custom service variable.",
        Some("service=service;str=varname;str=varvalue"), CHANGE_CUSTOM_SVC_VAR);
    reg(registry, "CHANGE_CUSTOM_CONTACT_VAR", change_custom_var_handler,
        "Changes the value of a custom contact variable.",
        Some("contact=contact_name;str=varname;str=varvalue"), CHANGE_CUSTOM_CONTACT_VAR);

    // downtime deletion by filter; every filter argument has a default
    // so any subset may be supplied
    if let Ok(mut desc) = CommandDescriptor::new(
        "DEL_DOWNTIME_BY_HOST_NAME",
        Some(del_downtime_by_filter_handler),
        "Deletes all downtimes matching the specified host/service/start-time/comment filters.",
        None,
    ) {
        let _ = desc.add_arg("hostname", ArgKind::Str, Some(ArgValue::Str(String::new())), None);
        let _ = desc.add_arg("service_description", ArgKind::Str, Some(ArgValue::Str(String::new())), None);
        let _ = desc.add_arg("downtime_start_time", ArgKind::Timestamp, Some(ArgValue::Timestamp(0)), None);
        let _ = desc.add_arg("comment", ArgKind::Str, Some(ArgValue::Str(String::new())), None);
        let _ = registry.register(desc, DEL_DOWNTIME_BY_HOST_NAME);
    }
    if let Ok(mut desc) = CommandDescriptor::new(
        "DEL_DOWNTIME_BY_HOSTGROUP_NAME",
        Some(del_downtime_by_filter_handler),
        "Deletes all downtimes for a hostgroup's members, optionally narrowed by the remaining filters.",
        None,
    ) {
        let _ = desc.add_arg("hostgroup_name", ArgKind::Hostgroup, None, None);
        let _ = desc.add_arg("hostname", ArgKind::Str, Some(ArgValue::Str(String::new())), None);
        let _ = desc.add_arg("service_description", ArgKind::Str, Some(ArgValue::Str(String::new())), None);
        let _ = desc.add_arg("downtime_start_time", ArgKind::Timestamp, Some(ArgValue::Timestamp(0)), None);
        let _ = desc.add_arg("comment", ArgKind::Str, Some(ArgValue::Str(String::new())), None);
        let _ = registry.register(desc, DEL_DOWNTIME_BY_HOSTGROUP_NAME);
    }
    if let Ok(mut desc) = CommandDescriptor::new(
        "DEL_DOWNTIME_BY_START_TIME_COMMENT",
        Some(del_downtime_by_filter_handler),
        "Deletes all downtimes with the given start time and/or comment.",
        None,
    ) {
        let _ = desc.add_arg("downtime_start_time", ArgKind::Timestamp, Some(ArgValue::Timestamp(0)), None);
        let _ = desc.add_arg("comment", ArgKind::Str, Some(ArgValue::Str(String::new())), None);
        let _ = registry.register(desc, DEL_DOWNTIME_BY_START_TIME_COMMENT);
    }

    // legacy aliases; registered last so free-slot allocation cannot
    // collide with an explicit id
    reg(registry, "SHUTDOWN_PROGRAM", shutdown_handler,
        "Shuts down the monitoring process.", None, -1);
    reg(registry, "RESTART_PROGRAM", restart_handler,
        "Restarts the monitoring process.", None, -1);
}
