//! Scheduled downtime engine: the catalog, the start/stop/expire event
//! choreography, triggered-downtime propagation and cancellation.
//!
//! Lifecycle of an entry: Pending -> Active -> Completed, with
//! Active -> Cancelled from outside and Pending -> Expired when a flexible
//! window closes without ever activating.

use std::collections::HashMap;

use chrono::{Local, TimeZone};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::broker::BrokerEvent;
use crate::core::Core;
use crate::events::{EventAction, EventHandle};
use crate::notifications::{self, options, NotificationReason};
use crate::objects::{
    CommentEntryType, CommentSource, CommentTarget, ServiceKey, Timestamp, STATE_OK, STATE_UP,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DowntimeError {
    #[error("null parameter")]
    Null,
    #[error("no hostname, or host not found")]
    HostNotFound,
    #[error("no service_description, or service not found")]
    ServiceNotFound,
    #[error("invalid downtime type, or type/data mismatch")]
    TypeMismatch,
    #[error("triggering downtime not found")]
    TriggerNotFound,
    #[error("bad time spec")]
    BadTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DowntimeTarget {
    Host(String),
    Service(ServiceKey),
}

impl DowntimeTarget {
    pub fn host_name(&self) -> &str {
        match self {
            DowntimeTarget::Host(h) => h,
            DowntimeTarget::Service(key) => &key.host,
        }
    }

    pub fn service_description(&self) -> Option<&str> {
        match self {
            DowntimeTarget::Host(_) => None,
            DowntimeTarget::Service(key) => Some(&key.description),
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(self, DowntimeTarget::Service(_))
    }
}

#[derive(Debug, Clone)]
pub struct Downtime {
    pub id: u64,
    pub target: DowntimeTarget,
    pub entry_time: Timestamp,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub fixed: bool,
    /// Seconds a flexible downtime lasts once it activates.
    pub duration: i64,
    /// Id of the downtime that triggers this one; 0 means none.
    pub triggered_by: u64,
    pub is_in_effect: bool,
    /// When a flexible downtime actually activated (0 until then).
    pub flex_downtime_start: Timestamp,
    pub author: String,
    pub comment: String,
    pub comment_id: u64,
    pub start_event: Option<EventHandle>,
    pub stop_event: Option<EventHandle>,
    pub start_notification_sent: bool,
}

/// Ordering for the downtime list: earlier start first; on a tie a
/// non-triggered downtime precedes any downtime it triggers, so entries
/// are persisted in an order that reloads cleanly.
fn downtime_precedes(a: &Downtime, b: &Downtime) -> bool {
    if a.start_time == b.start_time {
        return a.triggered_by == 0 && b.triggered_by != 0;
    }
    a.start_time < b.start_time
}

/// The catalog: by-id map plus the (start_time, triggered-ness) ordering.
/// Sorting may be deferred during bulk loads and re-established with
/// [`DowntimeCatalog::sort`].
#[derive(Debug, Default)]
pub struct DowntimeCatalog {
    by_id: HashMap<u64, Downtime>,
    order: Vec<u64>,
    pub defer_sorting: bool,
    next_id: u64,
}

impl DowntimeCatalog {
    pub fn get(&self, id: u64) -> Option<&Downtime> {
        self.by_id.get(&id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Downtime> {
        self.by_id.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Snapshot of ids in list order; safe to iterate while mutating.
    pub fn ids_in_order(&self) -> Vec<u64> {
        self.order.clone()
    }

    pub fn iter_in_order(&self) -> impl Iterator<Item = &Downtime> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    /// Ids are monotonic; an explicit id only bumps the counter past any
    /// higher id seen during load.
    fn allocate_id(&mut self) -> u64 {
        loop {
            self.next_id += 1;
            if !self.by_id.contains_key(&self.next_id) {
                return self.next_id;
            }
        }
    }

    fn note_loaded_id(&mut self, id: u64) {
        if id > self.next_id {
            self.next_id = id;
        }
    }

    fn insert(&mut self, dt: Downtime) {
        let id = dt.id;
        if self.defer_sorting {
            self.order.push(id);
        } else {
            let pos = self
                .order
                .iter()
                .filter_map(|other| self.by_id.get(other))
                .position(|other| downtime_precedes(&dt, other));
            match pos {
                Some(p) => self.order.insert(p, id),
                None => self.order.push(id),
            }
        }
        self.by_id.insert(id, dt);
    }

    fn remove(&mut self, id: u64) -> Option<Downtime> {
        self.order.retain(|&other| other != id);
        self.by_id.remove(&id)
    }

    /// Re-establishes list order after a deferred bulk load. Stable, so
    /// equal entries keep their insertion order.
    pub fn sort(&mut self) {
        let mut order = std::mem::take(&mut self.order);
        let by_id = &self.by_id;
        order.sort_by(|&a, &b| {
            let (da, db) = (&by_id[&a], &by_id[&b]);
            if downtime_precedes(da, db) {
                std::cmp::Ordering::Less
            } else if downtime_precedes(db, da) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });
        self.order = order;
        self.defer_sorting = false;
    }

    /// First downtime (in list order) triggered by `parent`, if any.
    fn first_triggered_by(&self, parent: u64) -> Option<u64> {
        self.order
            .iter()
            .copied()
            .find(|id| self.by_id.get(id).is_some_and(|dt| dt.triggered_by == parent))
    }
}

fn format_time(t: Timestamp) -> String {
    Local
        .timestamp_opt(t, 0)
        .single()
        .map(|dt| dt.format("%m-%d-%Y %H:%M:%S").to_string())
        .unwrap_or_else(|| t.to_string())
}

// --- add / schedule -----------------------------------------------------

/// Validates and inserts a downtime entry. `explicit_id` is used by the
/// retention-load path; fresh entries allocate monotonically.
#[allow(clippy::too_many_arguments)]
pub fn add_downtime(
    core: &mut Core,
    target: DowntimeTarget,
    entry_time: Timestamp,
    author: &str,
    comment: &str,
    start_time: Timestamp,
    flex_downtime_start: Timestamp,
    end_time: Timestamp,
    fixed: bool,
    triggered_by: u64,
    duration: i64,
    explicit_id: Option<u64>,
    is_in_effect: bool,
    start_notification_sent: bool,
) -> Result<u64, DowntimeError> {
    debug!(
        target = %target.host_name(),
        service = ?target.service_description(),
        start_time,
        end_time,
        fixed,
        triggered_by,
        "adding downtime"
    );

    match &target {
        DowntimeTarget::Host(h) => {
            if core.objects.host(h).is_none() {
                warn!("ignoring request to add downtime for non-existing host '{h}'");
                return Err(DowntimeError::HostNotFound);
            }
        }
        DowntimeTarget::Service(key) => {
            if core.objects.service_by_key(key).is_none() {
                warn!(
                    "ignoring request to add downtime to non-existing service '{}' on host '{}'",
                    key.description, key.host
                );
                return Err(DowntimeError::ServiceNotFound);
            }
        }
    }
    if triggered_by != 0 && core.downtimes.get(triggered_by).is_none() {
        return Err(DowntimeError::TriggerNotFound);
    }
    if triggered_by == 0 && start_time >= end_time {
        return Err(DowntimeError::BadTime);
    }
    if !fixed && duration == 0 {
        return Err(DowntimeError::BadTime);
    }

    let id = match explicit_id {
        Some(id) if id != 0 => {
            core.downtimes.note_loaded_id(id);
            id
        }
        _ => core.downtimes.allocate_id(),
    };

    let dt = Downtime {
        id,
        target: target.clone(),
        entry_time,
        start_time,
        end_time,
        fixed,
        duration,
        triggered_by,
        is_in_effect,
        flex_downtime_start,
        author: author.to_string(),
        comment: comment.to_string(),
        comment_id: 0,
        start_event: None,
        stop_event: None,
        start_notification_sent,
    };
    core.downtimes.insert(dt);
    core.broadcast(BrokerEvent::DowntimeAdd {
        downtime_id: id,
        host: target.host_name().to_string(),
        service: target.service_description().map(str::to_string),
        start_time,
        end_time,
        fixed,
        triggered_by,
        duration,
    });
    Ok(id)
}

/// Schedules a host or service downtime: validates the time window, adds
/// the entry and registers its events.
#[allow(clippy::too_many_arguments)]
pub fn schedule_downtime(
    core: &mut Core,
    target: DowntimeTarget,
    entry_time: Timestamp,
    author: &str,
    comment: &str,
    start_time: Timestamp,
    end_time: Timestamp,
    fixed: bool,
    triggered_by: u64,
    duration: i64,
) -> Result<u64, DowntimeError> {
    // don't add old or invalid downtimes
    if start_time >= end_time || end_time <= core.now {
        debug!(start_time, end_time, "invalid downtime start/end times");
        return Err(DowntimeError::BadTime);
    }
    let id = add_downtime(
        core,
        target,
        entry_time,
        author,
        comment,
        start_time,
        0,
        end_time,
        fixed,
        triggered_by,
        duration,
        None,
        false,
        false,
    )?;
    register_downtime(core, id)?;
    Ok(id)
}

/// Registers an added downtime: attaches the descriptive comment and
/// schedules whichever start/stop/expiry events its shape calls for.
pub fn register_downtime(core: &mut Core, id: u64) -> Result<(), DowntimeError> {
    let dt = core
        .downtimes
        .get(id)
        .cloned()
        .ok_or(DowntimeError::Null)?;
    let type_string = if dt.target.is_service() {
        "service"
    } else {
        "host"
    };

    let hours = dt.duration / 3600;
    let minutes = (dt.duration - hours * 3600) / 60;
    let text = if dt.fixed {
        format!(
            "This {type_string} has been scheduled for fixed downtime from {} to {}.  \
             Notifications for the {type_string} will not be sent out during that time period.",
            format_time(dt.start_time),
            format_time(dt.end_time)
        )
    } else {
        format!(
            "This {type_string} has been scheduled for flexible downtime starting between {} and {} \
             and lasting for a period of {hours} hours and {minutes} minutes.  \
             Notifications for the {type_string} will not be sent out during that time period.",
            format_time(dt.start_time),
            format_time(dt.end_time)
        )
    };

    debug!(
        id,
        host = %dt.target.host_name(),
        service = ?dt.target.service_description(),
        fixed = dt.fixed,
        start = %format_time(dt.start_time),
        end = %format_time(dt.end_time),
        trigger = dt.triggered_by,
        "scheduled downtime details"
    );

    if dt.comment_id == 0 || core.comments.get(dt.comment_id).is_none() {
        let comment_target = match &dt.target {
            DowntimeTarget::Host(h) => CommentTarget::Host(h.clone()),
            DowntimeTarget::Service(key) => CommentTarget::Service(key.clone()),
        };
        let author = if dt.author.is_empty() {
            "(vigild process)"
        } else {
            &dt.author
        };
        let comment_id = core.comments.add(
            comment_target,
            CommentEntryType::Downtime,
            core.now,
            author,
            &text,
            false,
            CommentSource::Internal,
        );
        if let Some(entry) = core.downtimes.get_mut(id) {
            entry.comment_id = comment_id;
        }
    }

    if dt.is_in_effect {
        // already active (loaded from retention): only the stop remains
        let event_time = if dt.fixed {
            dt.end_time
        } else {
            dt.flex_downtime_start + dt.duration
        };
        let handle = core
            .events
            .schedule(event_time, EventAction::DowntimeStop(id));
        if let Some(entry) = core.downtimes.get_mut(id) {
            entry.stop_event = Some(handle);
        }
    } else if !dt.fixed {
        // A flexible downtime may never start, so always schedule an
        // expiry event. The expiry sweep never cancels an in-effect
        // downtime; that is the stop event's job.
        debug!(id, "scheduling expire event in case flexible downtime never triggers");
        let expire = core
            .events
            .schedule(dt.end_time + 1, EventAction::ExpireDowntimes);
        if let Some(entry) = core.downtimes.get_mut(id) {
            entry.stop_event = Some(expire);
        }
        if dt.flex_downtime_start > 0 {
            let handle = core
                .events
                .schedule(dt.flex_downtime_start, EventAction::DowntimeStart(id));
            if let Some(entry) = core.downtimes.get_mut(id) {
                entry.start_event = Some(handle);
            }
        }
    } else if dt.triggered_by == 0 {
        // triggered downtimes need no start event; the trigger fires them
        let handle = core
            .events
            .schedule(dt.start_time, EventAction::DowntimeStart(id));
        if let Some(entry) = core.downtimes.get_mut(id) {
            entry.start_event = Some(handle);
        }
    }
    Ok(())
}

// --- start / stop -------------------------------------------------------

/// Timer-queue entry point for start events.
pub fn handle_downtime_start_event(core: &mut Core, id: u64) {
    let Some(entry) = core.downtimes.get_mut(id) else {
        debug!(id, "unable to find downtime for start event");
        return;
    };
    // the event fired; its handle is dead
    entry.start_event = None;
    handle_scheduled_downtime_start(core, id);
}

/// Timer-queue entry point for stop events.
pub fn handle_downtime_stop_event(core: &mut Core, id: u64) {
    let Some(entry) = core.downtimes.get_mut(id) else {
        debug!(id, "unable to find downtime for stop event");
        return;
    };
    entry.stop_event = None;
    handle_scheduled_downtime_stop(core, id);
}

/// Starts or stops a downtime depending on whether it is in effect.
pub fn handle_scheduled_downtime(core: &mut Core, id: u64) {
    let Some(dt) = core.downtimes.get(id) else {
        return;
    };
    if dt.is_in_effect {
        handle_scheduled_downtime_stop(core, id);
    } else {
        handle_scheduled_downtime_start(core, id);
    }
}

fn handle_scheduled_downtime_start(core: &mut Core, id: u64) {
    let Some(dt) = core.downtimes.get(id).cloned() else {
        return;
    };

    core.broadcast(BrokerEvent::DowntimeStart {
        downtime_id: id,
        host: dt.target.host_name().to_string(),
        service: dt.target.service_description().map(str::to_string),
    });

    let depth = match &dt.target {
        DowntimeTarget::Host(h) => match core.objects.host(h) {
            Some(host) => host.scheduled_downtime_depth,
            None => {
                debug!(id, host = %h, "unable to find host for downtime");
                return;
            }
        },
        DowntimeTarget::Service(key) => match core.objects.service_by_key(key) {
            Some(svc) => svc.scheduled_downtime_depth,
            None => {
                debug!(id, service = %key, "unable to find service for downtime");
                return;
            }
        },
    };

    if depth == 0 {
        match &dt.target {
            DowntimeTarget::Host(h) => {
                info!(
                    "HOST DOWNTIME ALERT: {h};STARTED; Host has entered a period of scheduled downtime"
                );
                if !dt.start_notification_sent {
                    let _ = notifications::host_notification(
                        core,
                        h,
                        NotificationReason::DowntimeStart,
                        Some(&dt.author),
                        Some(&dt.comment),
                        options::NONE,
                    );
                    if let Some(entry) = core.downtimes.get_mut(id) {
                        entry.start_notification_sent = true;
                    }
                }
            }
            DowntimeTarget::Service(key) => {
                info!(
                    "SERVICE DOWNTIME ALERT: {};{};STARTED; Service has entered a period of scheduled downtime",
                    key.host, key.description
                );
                if !dt.start_notification_sent {
                    let _ = notifications::service_notification(
                        core,
                        key,
                        NotificationReason::DowntimeStart,
                        Some(&dt.author),
                        Some(&dt.comment),
                        options::NONE,
                    );
                    if let Some(entry) = core.downtimes.get_mut(id) {
                        entry.start_notification_sent = true;
                    }
                }
            }
        }
    }

    match &dt.target {
        DowntimeTarget::Host(h) => {
            if let Some(host) = core.objects.host_mut(h) {
                host.scheduled_downtime_depth += 1;
            }
            core.update_host_status(h);
        }
        DowntimeTarget::Service(key) => {
            if let Some(svc) = core.objects.service_mut(key) {
                svc.scheduled_downtime_depth += 1;
            }
            core.update_service_status(key);
        }
    }
    if let Some(entry) = core.downtimes.get_mut(id) {
        entry.is_in_effect = true;
    }

    let event_time = if dt.fixed {
        dt.end_time
    } else {
        dt.flex_downtime_start + dt.duration
    };
    let handle = core
        .events
        .schedule(event_time, EventAction::DowntimeStop(id));
    if let Some(entry) = core.downtimes.get_mut(id) {
        entry.stop_event = Some(handle);
    }

    // fire downtimes triggered by this one, inheriting our activation time
    let children: Vec<u64> = core
        .downtimes
        .ids_in_order()
        .into_iter()
        .filter(|&child| {
            core.downtimes
                .get(child)
                .is_some_and(|c| c.triggered_by == id)
        })
        .collect();
    for child in children {
        if let Some(entry) = core.downtimes.get_mut(child) {
            entry.flex_downtime_start = dt.flex_downtime_start;
        }
        handle_scheduled_downtime(core, child);
    }
}

fn handle_scheduled_downtime_stop(core: &mut Core, id: u64) {
    let Some(dt) = core.downtimes.get(id).cloned() else {
        return;
    };

    core.broadcast(BrokerEvent::DowntimeStop {
        downtime_id: id,
        host: dt.target.host_name().to_string(),
        service: dt.target.service_description().map(str::to_string),
        cancelled: false,
    });

    match &dt.target {
        DowntimeTarget::Host(h) => {
            let Some(host) = core.objects.host_mut(h) else {
                debug!(id, host = %h, "unable to find host for downtime");
                return;
            };
            if host.scheduled_downtime_depth > 0 {
                host.scheduled_downtime_depth -= 1;
            } else {
                debug!(
                    "host '{h}' tried to exit from a period of scheduled downtime (id={id}), \
                     but was already out of downtime"
                );
            }
            let depth = host.scheduled_downtime_depth;
            if depth == 0 {
                info!(
                    "HOST DOWNTIME ALERT: {h};STOPPED; Host has exited from a period of scheduled downtime"
                );
                let _ = notifications::host_notification(
                    core,
                    h,
                    NotificationReason::DowntimeEnd,
                    Some(&dt.author),
                    Some(&dt.comment),
                    options::NONE,
                );
            }
            core.update_host_status(h);
        }
        DowntimeTarget::Service(key) => {
            let Some(svc) = core.objects.service_mut(key) else {
                debug!(id, service = %key, "unable to find service for downtime");
                return;
            };
            if svc.scheduled_downtime_depth > 0 {
                svc.scheduled_downtime_depth -= 1;
            } else {
                debug!(
                    "service '{}' on host '{}' tried to exit from a period of scheduled \
                     downtime (id={id}), but was already out of downtime",
                    key.description, key.host
                );
            }
            let depth = svc.scheduled_downtime_depth;
            if depth == 0 {
                info!(
                    "SERVICE DOWNTIME ALERT: {};{};STOPPED; Service has exited from a period of scheduled downtime",
                    key.host, key.description
                );
                let _ = notifications::service_notification(
                    core,
                    key,
                    NotificationReason::DowntimeEnd,
                    Some(&dt.author),
                    Some(&dt.comment),
                    options::NONE,
                );
            }
            core.update_service_status(key);
        }
    }

    // stop (or start-then-stop) anything triggered by this entry; the
    // recursion deletes entries, so re-scan after every call
    while let Some(child) = core.downtimes.first_triggered_by(id) {
        handle_scheduled_downtime(core, child);
    }

    if let Some(entry) = core.downtimes.get_mut(id) {
        entry.is_in_effect = false;
    }
    delete_downtime(core, id);
}

// --- cancellation / deletion -------------------------------------------

/// Cancels a downtime by id, cascading through anything it triggered.
pub fn unschedule_downtime(core: &mut Core, id: u64) -> Result<(), DowntimeError> {
    let Some(dt) = core.downtimes.get(id).cloned() else {
        return Err(DowntimeError::Null);
    };
    debug!(
        id,
        kind = if dt.target.is_service() { "service" } else { "host" },
        "cancelling downtime"
    );

    if dt.is_in_effect {
        core.broadcast(BrokerEvent::DowntimeStop {
            downtime_id: id,
            host: dt.target.host_name().to_string(),
            service: dt.target.service_description().map(str::to_string),
            cancelled: true,
        });
        match &dt.target {
            DowntimeTarget::Host(h) => {
                let Some(host) = core.objects.host_mut(h) else {
                    return Err(DowntimeError::HostNotFound);
                };
                if host.scheduled_downtime_depth > 0 {
                    host.scheduled_downtime_depth -= 1;
                }
                let depth = host.scheduled_downtime_depth;
                core.update_host_status(h);
                if depth == 0 {
                    info!(
                        "HOST DOWNTIME ALERT: {h};CANCELLED; Scheduled downtime for host has been cancelled."
                    );
                    let _ = notifications::host_notification(
                        core,
                        h,
                        NotificationReason::DowntimeCancelled,
                        None,
                        None,
                        options::NONE,
                    );
                }
            }
            DowntimeTarget::Service(key) => {
                let Some(svc) = core.objects.service_mut(key) else {
                    return Err(DowntimeError::ServiceNotFound);
                };
                if svc.scheduled_downtime_depth > 0 {
                    svc.scheduled_downtime_depth -= 1;
                }
                let depth = svc.scheduled_downtime_depth;
                core.update_service_status(key);
                if depth == 0 {
                    info!(
                        "SERVICE DOWNTIME ALERT: {};{};CANCELLED; Scheduled downtime for service has been cancelled.",
                        key.host, key.description
                    );
                    let _ = notifications::service_notification(
                        core,
                        key,
                        NotificationReason::DowntimeCancelled,
                        None,
                        None,
                        options::NONE,
                    );
                }
            }
        }
    }

    if let Some(handle) = dt.start_event {
        core.events.cancel(handle);
    }
    if let Some(handle) = dt.stop_event {
        core.events.cancel(handle);
    }
    if let Some(entry) = core.downtimes.get_mut(id) {
        entry.is_in_effect = false;
        entry.start_event = None;
        entry.stop_event = None;
    }
    delete_downtime(core, id);

    // cancel everything this downtime triggered
    while let Some(child) = core.downtimes.first_triggered_by(id) {
        let _ = unschedule_downtime(core, child);
    }
    Ok(())
}

/// Removes an entry and its descriptive comment from the catalog.
pub fn delete_downtime(core: &mut Core, id: u64) -> bool {
    let Some(dt) = core.downtimes.remove(id) else {
        return false;
    };
    if dt.comment_id != 0 {
        core.comments.delete(dt.comment_id);
    }
    core.broadcast(BrokerEvent::DowntimeDelete { downtime_id: id });
    true
}

/// Deletes downtimes matching any subset of {host, service, start time,
/// comment}. Refuses to delete everything: at least one filter must be
/// set. Returns the number deleted.
pub fn delete_downtime_by_filter(
    core: &mut Core,
    hostname: Option<&str>,
    service_description: Option<&str>,
    start_time: Timestamp,
    comment: Option<&str>,
) -> usize {
    if hostname.is_none() && service_description.is_none() && start_time == 0 && comment.is_none() {
        return 0;
    }
    let matches: Vec<u64> = core
        .downtimes
        .iter_in_order()
        .filter(|dt| {
            if start_time != 0 && dt.start_time != start_time {
                return false;
            }
            if comment.is_some_and(|c| dt.comment != c) {
                return false;
            }
            match &dt.target {
                DowntimeTarget::Host(h) => {
                    // a service filter never matches host downtime
                    if service_description.is_some() {
                        return false;
                    }
                    hostname.map_or(true, |want| h == want)
                }
                DowntimeTarget::Service(key) => {
                    hostname.map_or(true, |want| key.host == want)
                        && service_description.map_or(true, |want| key.description == want)
                }
            }
        })
        .map(|dt| dt.id)
        .collect();
    let deleted = matches.len();
    for id in matches {
        let _ = unschedule_downtime(core, id);
    }
    deleted
}

// --- flexible activation / expiry --------------------------------------

/// Starts any flexible host downtime whose window covers `now`, fired
/// when the host reports a problem state. Returns how many started.
pub fn check_pending_flex_host_downtime(core: &mut Core, host: &str) -> usize {
    let Some(h) = core.objects.host(host) else {
        return 0;
    };
    if h.current_state == STATE_UP {
        return 0;
    }
    start_pending_flex(core, |dt| {
        matches!(&dt.target, DowntimeTarget::Host(name) if name == host)
    })
}

/// Service counterpart of [`check_pending_flex_host_downtime`].
pub fn check_pending_flex_service_downtime(core: &mut Core, key: &ServiceKey) -> usize {
    let Some(svc) = core.objects.service_by_key(key) else {
        return 0;
    };
    if svc.current_state == STATE_OK {
        return 0;
    }
    start_pending_flex(core, |dt| {
        matches!(&dt.target, DowntimeTarget::Service(k) if k == key)
    })
}

fn start_pending_flex(core: &mut Core, matches: impl Fn(&Downtime) -> bool) -> usize {
    let now = core.now;
    let due: Vec<u64> = core
        .downtimes
        .iter_in_order()
        .filter(|dt| {
            !dt.fixed
                && !dt.is_in_effect
                && dt.triggered_by == 0
                && matches(dt)
                && dt.start_time <= now
                && now <= dt.end_time
        })
        .map(|dt| dt.id)
        .collect();
    let count = due.len();
    for id in due {
        debug!(id, "flexible downtime starting now");
        let handle = core.events.schedule(now, EventAction::DowntimeStart(id));
        if let Some(entry) = core.downtimes.get_mut(id) {
            entry.flex_downtime_start = now;
            entry.start_event = Some(handle);
        }
    }
    count
}

/// Removes downtimes that never activated and whose window has closed.
/// Never touches an in-effect downtime; its stop event handles that.
pub fn check_for_expired_downtime(core: &mut Core) {
    let now = core.now;
    let expired: Vec<u64> = core
        .downtimes
        .iter_in_order()
        .filter(|dt| !dt.is_in_effect && dt.end_time <= now)
        .map(|dt| dt.id)
        .collect();
    for id in expired {
        let Some(dt) = core.downtimes.get(id).cloned() else {
            continue;
        };
        debug!(
            id,
            kind = if dt.target.is_service() { "service" } else { "host" },
            "expiring downtime"
        );
        match &dt.target {
            DowntimeTarget::Host(h) => {
                let _ = notifications::host_notification(
                    core,
                    h,
                    NotificationReason::DowntimeEnd,
                    Some(&dt.author),
                    Some(&dt.comment),
                    options::NONE,
                );
            }
            DowntimeTarget::Service(key) => {
                let _ = notifications::service_notification(
                    core,
                    key,
                    NotificationReason::DowntimeEnd,
                    Some(&dt.author),
                    Some(&dt.comment),
                    options::NONE,
                );
            }
        }
        delete_downtime(core, id);
    }
}
