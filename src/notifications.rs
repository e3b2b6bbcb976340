//! Notification engine: viability filtering, escalation-aware recipient
//! selection, renotification accounting, and dispatch of the actual
//! notification commands to the worker pool.

pub mod viability;

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::broker::BrokerEvent;
use crate::core::Core;
use crate::objects::{
    host_state_name, modattr, opts, service_state_name, Escalation, ServiceKey, Timestamp,
    STATE_OK,
};

/// Why a notification is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationReason {
    Normal,
    Acknowledgement,
    FlappingStart,
    FlappingStop,
    FlappingDisabled,
    DowntimeStart,
    DowntimeEnd,
    DowntimeCancelled,
    Custom,
}

impl NotificationReason {
    pub fn name(self) -> &'static str {
        match self {
            NotificationReason::Normal => "NORMAL",
            NotificationReason::Acknowledgement => "ACKNOWLEDGEMENT",
            NotificationReason::FlappingStart => "FLAPPINGSTART",
            NotificationReason::FlappingStop => "FLAPPINGSTOP",
            NotificationReason::FlappingDisabled => "FLAPPINGDISABLED",
            NotificationReason::DowntimeStart => "DOWNTIMESTART",
            NotificationReason::DowntimeEnd => "DOWNTIMEEND",
            NotificationReason::DowntimeCancelled => "DOWNTIMECANCELLED",
            NotificationReason::Custom => "CUSTOM",
        }
    }
}

/// Per-notification option bits (the custom-notification `options` field).
pub mod options {
    pub const NONE: u32 = 0;
    /// Send to escalated and normal contacts alike.
    pub const BROADCAST: u32 = 1 << 0;
    /// Bypass every viability filter.
    pub const FORCED: u32 = 1 << 1;
    /// Bump the notification number even for non-NORMAL notifications.
    pub const INCREMENT: u32 = 1 << 2;
}

/// The closed set of filter outcomes, surfaced in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuppressionReason {
    Ok,
    Disabled,
    TimeperiodBlocked,
    DisabledObject,
    NoContacts,
    CustomSchedDowntime,
    AckObjectOk,
    NoFlapping,
    SchedDowntimeFlapping,
    NoDowntime,
    SchedDowntimeDowntime,
    SoftState,
    Acknowledged,
    DependencyFailure,
    StateDisabled,
    NoRecovery,
    RecoveryUnnotifiedProblem,
    Delay,
    IsFlapping,
    IsScheduledDowntime,
    ReNoMore,
    ReNotYet,
    NebBlocked,
    BadParents,
    ServiceHostDownUnreachable,
    ServiceHostScheduledDowntime,
    InsuffImportance,
}

impl SuppressionReason {
    /// Log message for this reason. `externally_disabled` selects the
    /// wording for `DisabledObject` (config vs external command).
    fn message(self, externally_disabled: bool) -> &'static str {
        match self {
            SuppressionReason::Ok => "",
            SuppressionReason::Disabled => "Notifications are disabled globally.",
            SuppressionReason::TimeperiodBlocked => {
                "Notification blocked by timeperiod; notifications should not be sent out at this time."
            }
            SuppressionReason::DisabledObject => {
                if externally_disabled {
                    "Notifications are temporarily disabled for this object by an external command."
                } else {
                    "Notifications are disabled for this object by its configuration."
                }
            }
            SuppressionReason::NoContacts => {
                "No notification sent, because no contacts were found for notification purposes."
            }
            SuppressionReason::CustomSchedDowntime => {
                "Custom notifications blocked during scheduled downtime."
            }
            SuppressionReason::AckObjectOk => {
                "Acknowledgement notification blocked for UP/OK object."
            }
            SuppressionReason::NoFlapping => {
                "Notifications about FLAPPING events blocked for this object."
            }
            SuppressionReason::SchedDowntimeFlapping => {
                "Notifications about FLAPPING events blocked during scheduled downtime."
            }
            SuppressionReason::NoDowntime => {
                "Notifications about SCHEDULED DOWNTIME events blocked for this object."
            }
            SuppressionReason::SchedDowntimeDowntime => {
                "Notifications about SCHEDULED DOWNTIME events blocked during scheduled downtime."
            }
            SuppressionReason::SoftState => "Notifications blocked for object in a soft state.",
            SuppressionReason::Acknowledged => {
                "Notification for problem blocked because it has already been acknowledged."
            }
            SuppressionReason::DependencyFailure => {
                "Notification blocked due to dependency of another object."
            }
            SuppressionReason::StateDisabled => {
                "Notifications disabled for current object state."
            }
            SuppressionReason::NoRecovery => {
                "Notifications about RECOVERY events blocked for this object."
            }
            SuppressionReason::RecoveryUnnotifiedProblem => {
                "Notification blocked for RECOVERY because no notification was sent out for the original problem."
            }
            SuppressionReason::Delay => {
                "Notification blocked because first_notification_delay is configured and not enough time has elapsed since the object changed to a non-UP/non-OK state (or since program start)."
            }
            SuppressionReason::IsFlapping => {
                "Notification blocked because the object is currently flapping."
            }
            SuppressionReason::IsScheduledDowntime => {
                "Notification blocked for object currently in a scheduled downtime."
            }
            SuppressionReason::ReNoMore => "Re-notification blocked for this problem.",
            SuppressionReason::ReNotYet => {
                "Re-notification blocked for this problem because not enough time has passed since last notification."
            }
            SuppressionReason::NebBlocked => "Notification was blocked by a broker module.",
            SuppressionReason::BadParents => {
                "Notification blocked because this object is unreachable - its parents are down."
            }
            SuppressionReason::ServiceHostDownUnreachable => {
                "Notification blocked for service because its associated host is either down or unreachable."
            }
            SuppressionReason::ServiceHostScheduledDowntime => {
                "Notification blocked for service because its associated host is currently in a scheduled downtime."
            }
            SuppressionReason::InsuffImportance => {
                "Notification blocked for contact because it is not important enough (according to minimum_value)."
            }
        }
    }
}

/// Which object a suppression record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuppressionKind {
    Host,
    Service,
    HostContact,
    ServiceContact,
}

impl SuppressionKind {
    fn type_name(self) -> &'static str {
        match self {
            SuppressionKind::Host => "HOST",
            SuppressionKind::Service => "SERVICE",
            SuppressionKind::HostContact => "HOST CONTACT",
            SuppressionKind::ServiceContact => "SERVICE CONTACT",
        }
    }
}

/// Last reported suppression reason per (kind, object id): repeated
/// identical suppressions log once until the reason changes.
#[derive(Debug, Default)]
pub struct SuppressionLedger {
    last: HashMap<(SuppressionKind, u32), SuppressionReason>,
}

impl SuppressionLedger {
    /// Records `reason`; true when it differs from the previous record.
    pub fn update(&mut self, kind: SuppressionKind, obj_id: u32, reason: SuppressionReason) -> bool {
        self.last.insert((kind, obj_id), reason) != Some(reason)
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("host '{0}' not found")]
    HostNotFound(String),
    #[error("service '{0}' not found")]
    ServiceNotFound(ServiceKey),
}

/// Logs one suppression, deduplicated through the ledger, and mirrors it
/// to the observer surface when it is fresh.
fn log_suppression(
    core: &mut Core,
    kind: SuppressionKind,
    obj_id: u32,
    objname: &str,
    reason: SuppressionReason,
    externally_disabled: bool,
) {
    if reason == SuppressionReason::Ok || !core.config.log_suppression_reasons {
        return;
    }
    let message = reason.message(externally_disabled);
    if core.suppressions.update(kind, obj_id, reason) {
        warn!(
            "{} NOTIFICATION SUPPRESSED: {};{}",
            kind.type_name(),
            objname,
            message
        );
        core.broadcast(BrokerEvent::NotificationSuppressed {
            kind,
            object: objname.to_string(),
            reason,
        });
    } else {
        debug!(
            "{} NOTIFICATION SUPPRESSED: {};{}",
            kind.type_name(),
            objname,
            message
        );
    }
}

// --- escalation handling -----------------------------------------------

/// An escalation applies when the notification number falls inside its
/// window (`last == 0` meaning unbounded), the current state is in its
/// options, and its period (if any) permits now.
fn escalation_valid(
    core: &Core,
    esc: &Escalation,
    current_state: i32,
    notification_number: i32,
    opts_bits: u32,
) -> bool {
    if opts_bits & options::BROADCAST != 0 {
        return true;
    }
    if esc.first_notification > notification_number {
        return false;
    }
    if esc.last_notification != 0 && esc.last_notification < notification_number {
        return false;
    }
    if esc.escalation_options & opts::state_bit(current_state) == 0 {
        return false;
    }
    if let Some(period_name) = &esc.escalation_period {
        if let Some(period) = core.objects.timeperiod(period_name) {
            if !period.contains(core.now) {
                return false;
            }
        }
    }
    true
}

/// Recoveries escalate based on who was notified about the problem, so
/// the effective number steps back one.
fn effective_notification_number(current_state: i32, ok_state: i32, number: i32) -> i32 {
    if current_state == ok_state {
        number - 1
    } else {
        number
    }
}

// --- recipient list construction ---------------------------------------

struct RecipientList {
    contacts: Vec<String>,
    escalated: bool,
    /// Contact-level rejections to log once the list phase is over.
    rejections: Vec<(u32, String, SuppressionReason)>,
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|c| c == name) {
        list.push(name.to_string());
    }
}

fn build_recipients(
    core: &Core,
    direct_contacts: &[String],
    direct_groups: &[String],
    escalations: &[Escalation],
    current_state: i32,
    ok_state: i32,
    notification_number: i32,
    opts_bits: u32,
    mut admit: impl FnMut(&Core, &str) -> Result<(), SuppressionReason>,
    reject_name: impl Fn(&str) -> String,
    contact_id: impl Fn(&Core, &str) -> u32,
) -> RecipientList {
    let number = effective_notification_number(current_state, ok_state, notification_number);
    let escalated = escalations
        .iter()
        .any(|esc| escalation_valid(core, esc, current_state, number, options::NONE));

    let mut contacts = Vec::new();
    let mut rejections = Vec::new();
    let mut consider = |core: &Core,
                        name: &str,
                        contacts: &mut Vec<String>,
                        rejections: &mut Vec<(u32, String, SuppressionReason)>,
                        admit: &mut dyn FnMut(&Core, &str) -> Result<(), SuppressionReason>| {
        if core.objects.contact(name).is_none() {
            return;
        }
        match admit(core, name) {
            Ok(()) => push_unique(contacts, name),
            Err(reason) => {
                debug!(contact = name, "not adding contact to notification list");
                rejections.push((contact_id(core, name), reject_name(name), reason));
            }
        }
    };

    if escalated || opts_bits & options::BROADCAST != 0 {
        debug!("adding contacts from escalation(s) to notification list");
        for esc in escalations {
            if !escalation_valid(core, esc, current_state, number, opts_bits) {
                continue;
            }
            for name in &esc.contacts {
                consider(core, name, &mut contacts, &mut rejections, &mut admit);
            }
            for group in &esc.contact_groups {
                for name in core.objects.contacts_in_group(group) {
                    consider(core, &name, &mut contacts, &mut rejections, &mut admit);
                }
            }
        }
    }
    if !escalated || opts_bits & options::BROADCAST != 0 {
        debug!("adding normal contacts to notification list");
        for name in direct_contacts {
            consider(core, name, &mut contacts, &mut rejections, &mut admit);
        }
        for group in direct_groups {
            for name in core.objects.contacts_in_group(group) {
                consider(core, &name, &mut contacts, &mut rejections, &mut admit);
            }
        }
    }

    RecipientList {
        contacts,
        escalated,
        rejections,
    }
}

// --- renotification timing ---------------------------------------------

/// Next permitted NORMAL notification time for a service: `now` plus the
/// shortest valid escalation interval (or the service default). Interval
/// zero stops further notifications unless the service is volatile.
pub fn get_next_service_notification_time(
    core: &mut Core,
    key: &ServiceKey,
    offset: Timestamp,
) -> Timestamp {
    let Some(svc) = core.objects.service_by_key(key) else {
        return offset;
    };
    let number =
        effective_notification_number(svc.current_state, STATE_OK, svc.current_notification_number);
    let mut interval = svc.notification_interval;
    let mut have_escalated = false;
    for esc in &svc.escalations {
        // interval < 0 means this escalation doesn't affect timing
        if esc.notification_interval < 0.0 {
            continue;
        }
        if !escalation_valid(core, esc, svc.current_state, number, options::NONE) {
            continue;
        }
        if !have_escalated || esc.notification_interval < interval {
            have_escalated = true;
            interval = esc.notification_interval;
        }
    }
    let no_more = interval == 0.0 && !svc.is_volatile;
    let next = offset + (interval * core.config.interval_length as f64) as Timestamp;
    if let Some(svc) = core.objects.service_mut(key) {
        svc.no_more_notifications = no_more;
    }
    debug!(service = %key, interval, next, "next valid notification time");
    next
}

/// Host counterpart of [`get_next_service_notification_time`].
pub fn get_next_host_notification_time(
    core: &mut Core,
    host: &str,
    offset: Timestamp,
) -> Timestamp {
    let Some(h) = core.objects.host(host) else {
        return offset;
    };
    let number = effective_notification_number(
        h.current_state,
        crate::objects::STATE_UP,
        h.current_notification_number,
    );
    let mut interval = h.notification_interval;
    let mut have_escalated = false;
    for esc in &h.escalations {
        if esc.notification_interval < 0.0 {
            continue;
        }
        if !escalation_valid(core, esc, h.current_state, number, options::NONE) {
            continue;
        }
        if !have_escalated || esc.notification_interval < interval {
            have_escalated = true;
            interval = esc.notification_interval;
        }
    }
    let no_more = interval == 0.0;
    let next = offset + (interval * core.config.interval_length as f64) as Timestamp;
    if let Some(h) = core.objects.host_mut(host) {
        h.no_more_notifications = no_more;
    }
    debug!(host, interval, next, "next valid notification time");
    next
}

// --- macro expansion ----------------------------------------------------

/// Replaces `$NAME$` placeholders from the map; `$$` escapes a dollar.
/// Unknown macros pass through untouched.
pub fn expand_macros(template: &str, macros: &HashMap<&'static str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('$') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        if let Some(stripped) = after.strip_prefix('$') {
            out.push('$');
            rest = stripped;
            continue;
        }
        match after.find('$') {
            Some(end) => {
                let name = &after[..end];
                match macros.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push('$');
                        out.push_str(name);
                        out.push('$');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn base_macros(
    reason: NotificationReason,
    recovered: bool,
    number: i32,
    notification_id: u64,
    recipients: &str,
    escalated: bool,
    author: Option<&str>,
    comment: Option<&str>,
) -> HashMap<&'static str, String> {
    let mut m = HashMap::new();
    let type_name = if reason != NotificationReason::Normal {
        reason.name().to_string()
    } else if recovered {
        "RECOVERY".to_string()
    } else {
        "PROBLEM".to_string()
    };
    m.insert("NOTIFICATIONTYPE", type_name);
    m.insert("NOTIFICATIONNUMBER", number.to_string());
    m.insert("NOTIFICATIONID", notification_id.to_string());
    m.insert("NOTIFICATIONRECIPIENTS", recipients.to_string());
    m.insert(
        "NOTIFICATIONISESCALATED",
        (if escalated { "1" } else { "0" }).to_string(),
    );
    m.insert(
        "NOTIFICATIONAUTHOR",
        author.unwrap_or_default().to_string(),
    );
    m.insert(
        "NOTIFICATIONCOMMENT",
        comment.unwrap_or_default().to_string(),
    );
    m
}

// --- dispatch -----------------------------------------------------------

fn first_word(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or(command)
}

/// Runs every notification command a contact has for the object, logging
/// the `… NOTIFICATION:` line and handing the expanded command to the
/// worker pool. The completion callback reports timeouts and non-zero
/// exits.
#[allow(clippy::too_many_arguments)]
fn dispatch_contact_commands(
    core: &mut Core,
    contact_name: &str,
    commands: Vec<String>,
    macros: &HashMap<&'static str, String>,
    host: String,
    service: Option<String>,
    reason: NotificationReason,
) {
    let timeout = core.config.notification_timeout;
    for raw in commands {
        let expanded = expand_macros(&raw, macros);
        let command_name = first_word(&raw).to_string();

        if core.config.log_notifications {
            let state = macros
                .get(if service.is_some() {
                    "SERVICESTATE"
                } else {
                    "HOSTSTATE"
                })
                .cloned()
                .unwrap_or_default();
            let output = macros
                .get(if service.is_some() {
                    "SERVICEOUTPUT"
                } else {
                    "HOSTOUTPUT"
                })
                .cloned()
                .unwrap_or_default();
            let state_field = if reason != NotificationReason::Normal {
                format!("{} ({state})", reason.name())
            } else {
                state
            };
            match &service {
                Some(desc) => info!(
                    "SERVICE NOTIFICATION: {contact_name};{host};{desc};{state_field};{command_name};{output}"
                ),
                None => info!(
                    "HOST NOTIFICATION: {contact_name};{host};{state_field};{command_name};{output}"
                ),
            }
        }

        core.broadcast(BrokerEvent::ContactNotification {
            contact: contact_name.to_string(),
            host: host.clone(),
            service: service.clone(),
            reason,
            command: command_name,
        });

        let cb_contact = contact_name.to_string();
        let cb_host = host.clone();
        let cb_service = service.clone();
        let submitted = core.submit_job(
            &expanded,
            timeout,
            Box::new(move |_core, result| {
                if result.early_timeout {
                    match &cb_service {
                        Some(desc) => warn!(
                            "Warning: Timeout while notifying contact '{cb_contact}' of service \
                             '{desc}' on host '{cb_host}' by command '{}'",
                            result.command
                        ),
                        None => warn!(
                            "Warning: Timeout while notifying contact '{cb_contact}' of host \
                             '{cb_host}' by command '{}'",
                            result.command
                        ),
                    }
                } else if !result.exited_ok || result.exit_code() != 0 {
                    let (objecttype, objectname) = match &cb_service {
                        Some(desc) => ("service", format!("{cb_host};{desc}")),
                        None => ("host", cb_host.clone()),
                    };
                    let (verb, code) = if result.exited_ok {
                        ("exited with exit code", result.exit_code())
                    } else {
                        ("was killed by signal", result.wait_status)
                    };
                    warn!(
                        "Warning: Notification command for contact '{cb_contact}' about \
                         {objecttype} '{objectname}' {verb} {code}. stdout: '{}', stderr: '{}'",
                        if result.outstd.is_empty() { "(empty)" } else { result.outstd.as_str() },
                        if result.outerr.is_empty() { "(empty)" } else { result.outerr.as_str() },
                    );
                }
            }),
        );
        if let Err(e) = submitted {
            warn!(error = %e, "unable to send notification command to worker");
        }
    }
}

// --- service notifications ---------------------------------------------

/// Applies a service-level suppression: bookkeeping side effects plus the
/// deduplicated log line.
fn apply_service_suppression(
    core: &mut Core,
    key: &ServiceKey,
    reason: NotificationReason,
    suppression: SuppressionReason,
) {
    if suppression == SuppressionReason::TimeperiodBlocked
        && reason == NotificationReason::Normal
    {
        // push next_notification to the period's next window, or a year
        // out when the period has none
        let now = core.now;
        let next = {
            let svc = core.objects.service_by_key(key);
            let period = svc.and_then(|s| {
                core.objects
                    .period_of(s.notification_period.as_ref())
                    .or_else(|| {
                        core.objects.host(&s.host_name).and_then(|h| {
                            core.objects.period_of(h.notification_period.as_ref())
                        })
                    })
            });
            period
                .and_then(|p| p.next_valid_time(now))
                .unwrap_or(now + 60 * 60 * 24 * 365)
        };
        if let Some(svc) = core.objects.service_mut(key) {
            svc.next_notification = next;
        }
    }
    let (obj_id, externally_disabled) = core
        .objects
        .service_by_key(key)
        .map(|s| {
            (
                s.id,
                s.modified_attributes & modattr::NOTIFICATIONS_ENABLED != 0,
            )
        })
        .unwrap_or((0, false));
    let objname = format!("{};{}", key.host, key.description);
    log_suppression(
        core,
        SuppressionKind::Service,
        obj_id,
        &objname,
        suppression,
        externally_disabled,
    );
}

/// Notifies all eligible contacts about a service problem, recovery or
/// special event.
pub fn service_notification(
    core: &mut Core,
    key: &ServiceKey,
    reason: NotificationReason,
    author: Option<&str>,
    comment: Option<&str>,
    opts_bits: u32,
) -> Result<(), NotifyError> {
    let now = core.now;
    if core.objects.service_by_key(key).is_none() {
        return Err(NotifyError::ServiceNotFound(key.clone()));
    }
    debug!(
        service = %key,
        reason = reason.name(),
        options = opts_bits,
        "service notification attempt"
    );

    if let Err(suppression) = viability::service_viability(core, key, reason, opts_bits) {
        debug!(service = %key, "notification viability test failed");
        apply_service_suppression(core, key, reason, suppression);
        return Ok(());
    }

    core.broadcast(BrokerEvent::NotificationStart {
        host: key.host.clone(),
        service: Some(key.description.clone()),
        reason,
    });

    let increment =
        reason == NotificationReason::Normal || opts_bits & options::INCREMENT != 0;
    let notification_id = core.next_notification_id();
    let (number, current_state, output, escalations, direct_contacts, direct_groups, host_name) = {
        let Some(svc) = core.objects.service_mut(key) else {
            return Err(NotifyError::ServiceNotFound(key.clone()));
        };
        if increment {
            svc.current_notification_number += 1;
        }
        svc.current_notification_id = notification_id;
        (
            svc.current_notification_number,
            svc.current_state,
            svc.plugin_output.clone(),
            svc.escalations.clone(),
            svc.contacts.clone(),
            svc.contact_groups.clone(),
            svc.host_name.clone(),
        )
    };
    debug!(number, incremented = increment, "current notification number");

    let list = build_recipients(
        core,
        &direct_contacts,
        &direct_groups,
        &escalations,
        current_state,
        STATE_OK,
        number,
        opts_bits,
        |core, name| {
            let contact = core
                .objects
                .contact(name)
                .ok_or(SuppressionReason::NoContacts)?;
            let svc = core
                .objects
                .service_by_key(key)
                .ok_or(SuppressionReason::NoContacts)?;
            viability::contact_service_viability(core, contact, svc, reason, opts_bits)
        },
        |name| format!("{name};{};{}", key.host, key.description),
        |core, name| core.objects.contact(name).map(|c| c.id).unwrap_or(0),
    );
    for (obj_id, objname, suppression) in &list.rejections {
        let externally_disabled = core
            .objects
            .service_by_key(key)
            .map(|s| s.modified_attributes & modattr::NOTIFICATIONS_ENABLED != 0)
            .unwrap_or(false);
        log_suppression(
            core,
            SuppressionKind::ServiceContact,
            *obj_id,
            objname,
            *suppression,
            externally_disabled,
        );
    }

    let mut contacts_notified = 0u32;
    if !list.contacts.is_empty() {
        let host_state = core
            .objects
            .host(&host_name)
            .map(|h| host_state_name(h.current_state).to_string())
            .unwrap_or_default();
        let mut macros = base_macros(
            reason,
            current_state == STATE_OK,
            number,
            notification_id,
            &list.contacts.join(","),
            list.escalated,
            author,
            comment,
        );
        macros.insert("HOSTNAME", key.host.clone());
        macros.insert("HOSTSTATE", host_state);
        macros.insert("SERVICEDESC", key.description.clone());
        macros.insert(
            "SERVICESTATE",
            service_state_name(current_state).to_string(),
        );
        macros.insert("SERVICEOUTPUT", output);

        for contact_name in &list.contacts {
            let Some(contact) = core.objects.contact(contact_name) else {
                continue;
            };
            debug!(contact = %contact_name, "notifying contact");
            let commands = contact.service_notification_commands.clone();
            let alias = contact.alias.clone();
            let email = contact.email.clone();
            let mut contact_macros = macros.clone();
            contact_macros.insert("CONTACTNAME", contact_name.clone());
            contact_macros.insert("CONTACTALIAS", alias);
            contact_macros.insert("CONTACTEMAIL", email);
            dispatch_contact_commands(
                core,
                contact_name,
                commands,
                &contact_macros,
                key.host.clone(),
                Some(key.description.clone()),
                reason,
            );
            if let Some(c) = core.objects.contact_mut(contact_name) {
                c.last_service_notification = now;
            }
            contacts_notified += 1;
        }

        if reason == NotificationReason::Normal {
            if contacts_notified > 0 {
                let next = get_next_service_notification_time(core, key, now);
                if let Some(svc) = core.objects.service_mut(key) {
                    svc.next_notification = next;
                    svc.last_notification = now;
                    svc.notified_on |= opts::state_bit(svc.current_state);
                }
            } else if increment {
                if let Some(svc) = core.objects.service_mut(key) {
                    svc.current_notification_number -= 1;
                }
            }
        }
        debug!(contacts_notified, "contacts were notified");
    } else {
        // nobody to notify: undo the pre-increment and say why
        if increment {
            if let Some(svc) = core.objects.service_mut(key) {
                svc.current_notification_number -= 1;
            }
        }
        apply_service_suppression(core, key, reason, SuppressionReason::NoContacts);
    }

    core.counters.notifications_sent += u64::from(contacts_notified);
    core.broadcast(BrokerEvent::NotificationEnd {
        host: key.host.clone(),
        service: Some(key.description.clone()),
        reason,
        contacts_notified,
    });
    core.update_service_status(key);
    Ok(())
}

// --- host notifications -------------------------------------------------

fn apply_host_suppression(
    core: &mut Core,
    host: &str,
    reason: NotificationReason,
    suppression: SuppressionReason,
) {
    if suppression == SuppressionReason::TimeperiodBlocked
        && reason == NotificationReason::Normal
    {
        let now = core.now;
        let next = core
            .objects
            .host(host)
            .and_then(|h| core.objects.period_of(h.notification_period.as_ref()))
            .and_then(|p| p.next_valid_time(now))
            .unwrap_or(now + 60 * 60 * 24 * 365);
        if let Some(h) = core.objects.host_mut(host) {
            h.next_notification = next;
        }
    }
    let (obj_id, externally_disabled) = core
        .objects
        .host(host)
        .map(|h| {
            (
                h.id,
                h.modified_attributes & modattr::NOTIFICATIONS_ENABLED != 0,
            )
        })
        .unwrap_or((0, false));
    log_suppression(
        core,
        SuppressionKind::Host,
        obj_id,
        host,
        suppression,
        externally_disabled,
    );
}

/// Notifies all eligible contacts about a host problem, recovery or
/// special event.
pub fn host_notification(
    core: &mut Core,
    host: &str,
    reason: NotificationReason,
    author: Option<&str>,
    comment: Option<&str>,
    opts_bits: u32,
) -> Result<(), NotifyError> {
    let now = core.now;
    debug!(host, reason = reason.name(), options = opts_bits, "host notification attempt");

    {
        let Some(h) = core.objects.host(host) else {
            return Err(NotifyError::HostNotFound(host.to_string()));
        };
        if let Err(suppression) = viability::host_viability(core, h, reason, opts_bits) {
            debug!(host, "notification viability test failed");
            apply_host_suppression(core, host, reason, suppression);
            return Ok(());
        }
    }

    core.broadcast(BrokerEvent::NotificationStart {
        host: host.to_string(),
        service: None,
        reason,
    });

    let increment =
        reason == NotificationReason::Normal || opts_bits & options::INCREMENT != 0;
    let notification_id = core.next_notification_id();
    let (number, current_state, output, escalations, direct_contacts, direct_groups, address) = {
        let Some(h) = core.objects.host_mut(host) else {
            return Err(NotifyError::HostNotFound(host.to_string()));
        };
        if increment {
            h.current_notification_number += 1;
        }
        h.current_notification_id = notification_id;
        (
            h.current_notification_number,
            h.current_state,
            h.plugin_output.clone(),
            h.escalations.clone(),
            h.contacts.clone(),
            h.contact_groups.clone(),
            h.address.clone(),
        )
    };

    let list = build_recipients(
        core,
        &direct_contacts,
        &direct_groups,
        &escalations,
        current_state,
        crate::objects::STATE_UP,
        number,
        opts_bits,
        |core, name| {
            let contact = core
                .objects
                .contact(name)
                .ok_or(SuppressionReason::NoContacts)?;
            let h = core.objects.host(host).ok_or(SuppressionReason::NoContacts)?;
            viability::contact_host_viability(core, contact, h, reason, opts_bits)
        },
        |name| format!("{name};{host}"),
        |core, name| core.objects.contact(name).map(|c| c.id).unwrap_or(0),
    );
    for (obj_id, objname, suppression) in &list.rejections {
        let externally_disabled = core
            .objects
            .host(host)
            .map(|h| h.modified_attributes & modattr::NOTIFICATIONS_ENABLED != 0)
            .unwrap_or(false);
        log_suppression(
            core,
            SuppressionKind::HostContact,
            *obj_id,
            objname,
            *suppression,
            externally_disabled,
        );
    }

    let mut contacts_notified = 0u32;
    if !list.contacts.is_empty() {
        let mut macros = base_macros(
            reason,
            current_state == crate::objects::STATE_UP,
            number,
            notification_id,
            &list.contacts.join(","),
            list.escalated,
            author,
            comment,
        );
        macros.insert("HOSTNAME", host.to_string());
        macros.insert("HOSTADDRESS", address);
        macros.insert("HOSTSTATE", host_state_name(current_state).to_string());
        macros.insert("HOSTOUTPUT", output);

        for contact_name in &list.contacts {
            let Some(contact) = core.objects.contact(contact_name) else {
                continue;
            };
            debug!(contact = %contact_name, "notifying contact");
            let commands = contact.host_notification_commands.clone();
            let alias = contact.alias.clone();
            let email = contact.email.clone();
            let mut contact_macros = macros.clone();
            contact_macros.insert("CONTACTNAME", contact_name.clone());
            contact_macros.insert("CONTACTALIAS", alias);
            contact_macros.insert("CONTACTEMAIL", email);
            dispatch_contact_commands(
                core,
                contact_name,
                commands,
                &contact_macros,
                host.to_string(),
                None,
                reason,
            );
            if let Some(c) = core.objects.contact_mut(contact_name) {
                c.last_host_notification = now;
            }
            contacts_notified += 1;
        }

        if reason == NotificationReason::Normal {
            if contacts_notified > 0 {
                let next = get_next_host_notification_time(core, host, now);
                if let Some(h) = core.objects.host_mut(host) {
                    h.next_notification = next;
                    h.last_notification = now;
                    h.notified_on |= opts::state_bit(h.current_state);
                }
            } else if increment {
                if let Some(h) = core.objects.host_mut(host) {
                    h.current_notification_number -= 1;
                }
            }
        }
        debug!(contacts_notified, "contacts were notified");
    } else {
        if increment {
            if let Some(h) = core.objects.host_mut(host) {
                h.current_notification_number -= 1;
            }
        }
        apply_host_suppression(core, host, reason, SuppressionReason::NoContacts);
    }

    core.counters.notifications_sent += u64::from(contacts_notified);
    core.broadcast(BrokerEvent::NotificationEnd {
        host: host.to_string(),
        service: None,
        reason,
        contacts_notified,
    });
    core.update_host_status(host);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macro_expansion_replaces_known_and_keeps_unknown() {
        let mut m = HashMap::new();
        m.insert("HOSTNAME", "srv1".to_string());
        m.insert("HOSTSTATE", "DOWN".to_string());
        assert_eq!(
            expand_macros("notify $HOSTNAME$ is $HOSTSTATE$ ($NOPE$) $$5", &m),
            "notify srv1 is DOWN ($NOPE$) $5"
        );
    }

    #[test]
    fn suppression_ledger_dedups_until_reason_changes() {
        let mut ledger = SuppressionLedger::default();
        assert!(ledger.update(SuppressionKind::Host, 1, SuppressionReason::Disabled));
        assert!(!ledger.update(SuppressionKind::Host, 1, SuppressionReason::Disabled));
        assert!(ledger.update(SuppressionKind::Host, 1, SuppressionReason::SoftState));
        assert!(ledger.update(SuppressionKind::Host, 1, SuppressionReason::Disabled));
        // distinct objects track independently
        assert!(ledger.update(SuppressionKind::Host, 2, SuppressionReason::Disabled));
    }
}
