//! Flap detection: a rolling state-history ring per object, a curved
//! percent-state-change metric, and hysteresis-guarded transitions with
//! their notification and comment side effects.

use tracing::{debug, info, warn};

use crate::broker::BrokerEvent;
use crate::core::Core;
use crate::notifications::{self, options, NotificationReason};
use crate::objects::{
    modattr, opts, CommentEntryType, CommentSource, CommentTarget, ServiceKey, StateType,
    MAX_STATE_HISTORY_ENTRIES, STATE_OK, STATE_UP,
};

const LOW_CURVE_VALUE: f64 = 0.75;
const HIGH_CURVE_VALUE: f64 = 1.25;

/// Curved percent state change over the history ring: later transitions
/// weigh more than earlier ones. `idx` is the oldest slot (the next write
/// position), so the walk runs in time order across all N-1 adjacent
/// pairs.
pub fn flapping_pct(history: &[i32; MAX_STATE_HISTORY_ENTRIES], idx: usize) -> f64 {
    let len = MAX_STATE_HISTORY_ENTRIES;
    let mut last = history[idx % len];
    let mut y = (idx + 1) % len;
    let mut curved_changes = 0.0;
    for x in 1..len {
        let cur = history[y];
        if cur != last {
            curved_changes +=
                ((x - 1) as f64 * (HIGH_CURVE_VALUE - LOW_CURVE_VALUE)) / ((len - 2) as f64)
                    + LOW_CURVE_VALUE;
        }
        last = cur;
        y = (y + 1) % len;
    }
    curved_changes * 100.0 / (len - 1) as f64
}

fn should_flap_detect(flap_detection_options: u32, current_state: i32) -> bool {
    flap_detection_options & opts::state_bit(current_state) != 0
}

// --- detection ----------------------------------------------------------

/// Runs service flap detection for one state observation. `update` is
/// false when the caller only wants transitions re-evaluated without
/// rewriting history.
pub fn check_for_service_flapping(core: &mut Core, key: &ServiceKey, update: bool) {
    let Some(svc) = core.objects.service_by_key(key) else {
        return;
    };
    if !should_flap_detect(svc.flap_detection_options, svc.current_state) {
        return;
    }
    debug!(service = %key, "checking service for flapping");

    // only hard states and soft recoveries get recorded
    if svc.state_type == StateType::Soft && svc.current_state != STATE_OK {
        return;
    }
    // without a history update the flapping state can't change
    if !update {
        return;
    }

    let low_threshold = if svc.low_flap_threshold <= 0.0 {
        core.config.low_service_flap_threshold
    } else {
        svc.low_flap_threshold
    };
    let high_threshold = if svc.high_flap_threshold <= 0.0 {
        core.config.high_service_flap_threshold
    } else {
        svc.high_flap_threshold
    };

    let (pct, was_flapping, detection_enabled) = {
        let Some(svc) = core.objects.service_mut(key) else {
            return;
        };
        let idx = svc.flap.index;
        svc.flap.history[idx] = svc.current_state;
        svc.flap.index = (idx + 1) % MAX_STATE_HISTORY_ENTRIES;
        let pct = flapping_pct(&svc.flap.history, svc.flap.index);
        svc.flap.percent_state_change = pct;
        (pct, svc.flap.is_flapping, svc.flap_detection_enabled)
    };

    debug!(
        service = %key,
        low_threshold,
        high_threshold,
        percent_state_change = pct,
        "flap metrics"
    );

    if !core.program.enable_flap_detection || !detection_enabled {
        return;
    }
    // undecided inside the hysteresis band
    if pct > low_threshold && pct < high_threshold {
        return;
    }
    let is_flapping = pct >= high_threshold;

    if is_flapping && !was_flapping {
        set_service_flap(core, key, pct, high_threshold, low_threshold);
    } else if !is_flapping && was_flapping {
        clear_service_flap(core, key, pct, high_threshold, low_threshold);
    }
}

/// Host flap detection. Hosts additionally gate history rewrites on
/// elapsed time so a stable host polled often doesn't flush its ring;
/// `actual_check` forces the update.
pub fn check_for_host_flapping(core: &mut Core, host: &str, update: bool, actual_check: bool) {
    let Some(h) = core.objects.host(host) else {
        return;
    };
    if !should_flap_detect(h.flap_detection_options, h.current_state) {
        return;
    }
    debug!(host, "checking host for flapping");

    let wait_threshold = (h.notification_interval * core.config.interval_length as f64) as i64;
    let mut update = update;
    if core.now - h.flap.last_history_update > wait_threshold {
        update = true;
    }
    if actual_check {
        update = true;
    }
    if !update {
        return;
    }

    let low_threshold = if h.low_flap_threshold <= 0.0 {
        core.config.low_host_flap_threshold
    } else {
        h.low_flap_threshold
    };
    let high_threshold = if h.high_flap_threshold <= 0.0 {
        core.config.high_host_flap_threshold
    } else {
        h.high_flap_threshold
    };

    let now = core.now;
    let (pct, was_flapping, detection_enabled) = {
        let Some(h) = core.objects.host_mut(host) else {
            return;
        };
        h.flap.last_history_update = now;
        let idx = h.flap.index;
        h.flap.history[idx] = h.current_state;
        h.flap.index = (idx + 1) % MAX_STATE_HISTORY_ENTRIES;
        let pct = flapping_pct(&h.flap.history, h.flap.index);
        h.flap.percent_state_change = pct;
        (pct, h.flap.is_flapping, h.flap_detection_enabled)
    };

    debug!(host, low_threshold, high_threshold, percent_state_change = pct, "flap metrics");

    if !core.program.enable_flap_detection || !detection_enabled {
        return;
    }
    if pct > low_threshold && pct < high_threshold {
        return;
    }
    let is_flapping = pct >= high_threshold;

    if is_flapping && !was_flapping {
        set_host_flap(core, host, pct, high_threshold, low_threshold);
    } else if !is_flapping && was_flapping {
        clear_host_flap(core, host, pct, high_threshold, low_threshold);
    }
}

// --- transitions --------------------------------------------------------

fn set_service_flap(
    core: &mut Core,
    key: &ServiceKey,
    percent_change: f64,
    high_threshold: f64,
    low_threshold: f64,
) {
    debug!(service = %key, "service started flapping");
    warn!(
        "SERVICE FLAPPING ALERT: {};{};STARTED; Service appears to have started flapping \
         ({percent_change:2.1}% change >= {high_threshold:2.1}% threshold)",
        key.host, key.description
    );

    let text = format!(
        "Notifications for this service are being suppressed because it was detected as having \
         been flapping between different states ({percent_change:2.1}% change >= \
         {high_threshold:2.1}% threshold).  When the service state stabilizes and the flapping \
         stops, notifications will be re-enabled."
    );
    let comment_id = core.comments.add(
        CommentTarget::Service(key.clone()),
        CommentEntryType::Flapping,
        core.now,
        "(vigild process)",
        &text,
        false,
        CommentSource::Internal,
    );

    {
        let Some(svc) = core.objects.service_mut(key) else {
            return;
        };
        svc.flap.comment_id = comment_id;
        svc.flap.is_flapping = true;
        svc.flap.check_recovery_notification =
            svc.current_state != STATE_OK && svc.current_notification_number > 0;
    }

    core.broadcast(BrokerEvent::FlappingStart {
        host: key.host.clone(),
        service: Some(key.description.clone()),
        percent_change,
        high_threshold,
        low_threshold,
    });
    let _ = notifications::service_notification(
        core,
        key,
        NotificationReason::FlappingStart,
        None,
        None,
        options::NONE,
    );
}

fn clear_service_flap(
    core: &mut Core,
    key: &ServiceKey,
    percent_change: f64,
    _high_threshold: f64,
    low_threshold: f64,
) {
    debug!(service = %key, "service stopped flapping");
    info!(
        "SERVICE FLAPPING ALERT: {};{};STOPPED; Service appears to have stopped flapping \
         ({percent_change:2.1}% change < {low_threshold:2.1}% threshold)",
        key.host, key.description
    );

    let (comment_id, current_state, check_recovery) = {
        let Some(svc) = core.objects.service_mut(key) else {
            return;
        };
        let comment_id = svc.flap.comment_id;
        svc.flap.comment_id = 0;
        svc.flap.is_flapping = false;
        (comment_id, svc.current_state, svc.flap.check_recovery_notification)
    };
    if comment_id != 0 {
        core.comments.delete(comment_id);
    }

    core.broadcast(BrokerEvent::FlappingStop {
        host: key.host.clone(),
        service: Some(key.description.clone()),
        percent_change,
        disabled: false,
    });
    let _ = notifications::service_notification(
        core,
        key,
        NotificationReason::FlappingStop,
        None,
        None,
        options::NONE,
    );
    if check_recovery && current_state == STATE_OK {
        let _ = notifications::service_notification(
            core,
            key,
            NotificationReason::Normal,
            None,
            None,
            options::NONE,
        );
    }
    if let Some(svc) = core.objects.service_mut(key) {
        svc.flap.check_recovery_notification = false;
    }
}

fn set_host_flap(
    core: &mut Core,
    host: &str,
    percent_change: f64,
    high_threshold: f64,
    low_threshold: f64,
) {
    debug!(host, "host started flapping");
    warn!(
        "HOST FLAPPING ALERT: {host};STARTED; Host appears to have started flapping \
         ({percent_change:2.1}% change > {high_threshold:2.1}% threshold)"
    );

    let text = format!(
        "Notifications for this host are being suppressed because it was detected as having \
         been flapping between different states ({percent_change:2.1}% change > \
         {high_threshold:2.1}% threshold).  When the host state stabilizes and the flapping \
         stops, notifications will be re-enabled."
    );
    let comment_id = core.comments.add(
        CommentTarget::Host(host.to_string()),
        CommentEntryType::Flapping,
        core.now,
        "(vigild process)",
        &text,
        false,
        CommentSource::Internal,
    );

    {
        let Some(h) = core.objects.host_mut(host) else {
            return;
        };
        h.flap.comment_id = comment_id;
        h.flap.is_flapping = true;
        h.flap.check_recovery_notification =
            h.current_state != STATE_UP && h.current_notification_number > 0;
    }

    core.broadcast(BrokerEvent::FlappingStart {
        host: host.to_string(),
        service: None,
        percent_change,
        high_threshold,
        low_threshold,
    });
    let _ = notifications::host_notification(
        core,
        host,
        NotificationReason::FlappingStart,
        None,
        None,
        options::NONE,
    );
}

fn clear_host_flap(
    core: &mut Core,
    host: &str,
    percent_change: f64,
    _high_threshold: f64,
    low_threshold: f64,
) {
    debug!(host, "host stopped flapping");
    info!(
        "HOST FLAPPING ALERT: {host};STOPPED; Host appears to have stopped flapping \
         ({percent_change:2.1}% change < {low_threshold:2.1}% threshold)"
    );

    let (comment_id, current_state, check_recovery) = {
        let Some(h) = core.objects.host_mut(host) else {
            return;
        };
        let comment_id = h.flap.comment_id;
        h.flap.comment_id = 0;
        h.flap.is_flapping = false;
        (comment_id, h.current_state, h.flap.check_recovery_notification)
    };
    if comment_id != 0 {
        core.comments.delete(comment_id);
    }

    core.broadcast(BrokerEvent::FlappingStop {
        host: host.to_string(),
        service: None,
        percent_change,
        disabled: false,
    });
    let _ = notifications::host_notification(
        core,
        host,
        NotificationReason::FlappingStop,
        None,
        None,
        options::NONE,
    );
    if check_recovery && current_state == STATE_UP {
        let _ = notifications::host_notification(
            core,
            host,
            NotificationReason::Normal,
            None,
            None,
            options::NONE,
        );
    }
    if let Some(h) = core.objects.host_mut(host) {
        h.flap.check_recovery_notification = false;
    }
}

// --- enable/disable routines -------------------------------------------

/// Enables flap detection program-wide and re-evaluates every object.
pub fn enable_flap_detection_routines(core: &mut Core) {
    if core.program.enable_flap_detection {
        return;
    }
    let attr = modattr::FLAP_DETECTION_ENABLED;
    core.program.modified_host_process_attributes |= attr;
    core.program.modified_service_process_attributes |= attr;
    core.program.enable_flap_detection = true;

    core.broadcast(BrokerEvent::AdaptiveProgram {
        command_id: -1,
        modified_host_attribute: attr,
        modified_host_attributes: core.program.modified_host_process_attributes,
        modified_service_attribute: attr,
        modified_service_attributes: core.program.modified_service_process_attributes,
    });
    core.update_program_status();

    let hosts: Vec<String> = core.objects.hosts.keys().cloned().collect();
    for host in hosts {
        check_for_host_flapping(core, &host, false, false);
    }
    let services: Vec<ServiceKey> = core.objects.services.keys().cloned().collect();
    for key in services {
        check_for_service_flapping(core, &key, false);
    }
}

/// Disables flap detection program-wide, clearing any flapping objects.
pub fn disable_flap_detection_routines(core: &mut Core) {
    if !core.program.enable_flap_detection {
        return;
    }
    let attr = modattr::FLAP_DETECTION_ENABLED;
    core.program.modified_host_process_attributes |= attr;
    core.program.modified_service_process_attributes |= attr;
    core.program.enable_flap_detection = false;

    core.broadcast(BrokerEvent::AdaptiveProgram {
        command_id: -1,
        modified_host_attribute: attr,
        modified_host_attributes: core.program.modified_host_process_attributes,
        modified_service_attribute: attr,
        modified_service_attributes: core.program.modified_service_process_attributes,
    });
    core.update_program_status();

    let hosts: Vec<String> = core.objects.hosts.keys().cloned().collect();
    for host in hosts {
        handle_host_flap_detection_disabled(core, &host);
    }
    let services: Vec<ServiceKey> = core.objects.services.keys().cloned().collect();
    for key in services {
        handle_service_flap_detection_disabled(core, &key);
    }
}

pub fn enable_host_flap_detection(core: &mut Core, host: &str) {
    debug!(host, "enabling flap detection for host");
    let attr = modattr::FLAP_DETECTION_ENABLED;
    let modified = {
        let Some(h) = core.objects.host_mut(host) else {
            return;
        };
        if h.flap_detection_enabled {
            return;
        }
        h.modified_attributes |= attr;
        h.flap_detection_enabled = true;
        h.modified_attributes
    };
    core.broadcast(BrokerEvent::AdaptiveHost {
        host: host.to_string(),
        command_id: -1,
        attr,
        modified_attributes: modified,
    });
    check_for_host_flapping(core, host, false, false);
    core.update_host_status(host);
}

pub fn disable_host_flap_detection(core: &mut Core, host: &str) {
    debug!(host, "disabling flap detection for host");
    let attr = modattr::FLAP_DETECTION_ENABLED;
    let modified = {
        let Some(h) = core.objects.host_mut(host) else {
            return;
        };
        if !h.flap_detection_enabled {
            return;
        }
        h.modified_attributes |= attr;
        h.flap_detection_enabled = false;
        h.modified_attributes
    };
    core.broadcast(BrokerEvent::AdaptiveHost {
        host: host.to_string(),
        command_id: -1,
        attr,
        modified_attributes: modified,
    });
    handle_host_flap_detection_disabled(core, host);
}

/// Clears the flapping indicator of a host whose flap detection was just
/// disabled (globally or per host), with the DISABLED notification path.
pub fn handle_host_flap_detection_disabled(core: &mut Core, host: &str) {
    let flapping = core
        .objects
        .host(host)
        .map(|h| h.flap.is_flapping)
        .unwrap_or(false);
    if flapping {
        let (comment_id, percent_change, current_state, check_recovery) = {
            let Some(h) = core.objects.host_mut(host) else {
                return;
            };
            h.flap.is_flapping = false;
            let comment_id = h.flap.comment_id;
            h.flap.comment_id = 0;
            (
                comment_id,
                h.flap.percent_state_change,
                h.current_state,
                h.flap.check_recovery_notification,
            )
        };
        if comment_id != 0 {
            core.comments.delete(comment_id);
        }
        info!("HOST FLAPPING ALERT: {host};DISABLED; Flap detection has been disabled");
        core.broadcast(BrokerEvent::FlappingStop {
            host: host.to_string(),
            service: None,
            percent_change,
            disabled: true,
        });
        let _ = notifications::host_notification(
            core,
            host,
            NotificationReason::FlappingDisabled,
            None,
            None,
            options::NONE,
        );
        if check_recovery && current_state == STATE_UP {
            let _ = notifications::host_notification(
                core,
                host,
                NotificationReason::Normal,
                None,
                None,
                options::NONE,
            );
        }
        if let Some(h) = core.objects.host_mut(host) {
            h.flap.check_recovery_notification = false;
        }
    }
    core.update_host_status(host);
}

pub fn enable_service_flap_detection(core: &mut Core, key: &ServiceKey) {
    debug!(service = %key, "enabling flap detection for service");
    let attr = modattr::FLAP_DETECTION_ENABLED;
    let modified = {
        let Some(svc) = core.objects.service_mut(key) else {
            return;
        };
        if svc.flap_detection_enabled {
            return;
        }
        svc.modified_attributes |= attr;
        svc.flap_detection_enabled = true;
        svc.modified_attributes
    };
    core.broadcast(BrokerEvent::AdaptiveService {
        service: key.clone(),
        command_id: -1,
        attr,
        modified_attributes: modified,
    });
    check_for_service_flapping(core, key, false);
    core.update_service_status(key);
}

pub fn disable_service_flap_detection(core: &mut Core, key: &ServiceKey) {
    debug!(service = %key, "disabling flap detection for service");
    let attr = modattr::FLAP_DETECTION_ENABLED;
    let modified = {
        let Some(svc) = core.objects.service_mut(key) else {
            return;
        };
        if !svc.flap_detection_enabled {
            return;
        }
        svc.modified_attributes |= attr;
        svc.flap_detection_enabled = false;
        svc.modified_attributes
    };
    core.broadcast(BrokerEvent::AdaptiveService {
        service: key.clone(),
        command_id: -1,
        attr,
        modified_attributes: modified,
    });
    handle_service_flap_detection_disabled(core, key);
}

/// Service counterpart of [`handle_host_flap_detection_disabled`].
pub fn handle_service_flap_detection_disabled(core: &mut Core, key: &ServiceKey) {
    let flapping = core
        .objects
        .service_by_key(key)
        .map(|s| s.flap.is_flapping)
        .unwrap_or(false);
    if flapping {
        let (comment_id, percent_change, current_state, check_recovery) = {
            let Some(svc) = core.objects.service_mut(key) else {
                return;
            };
            svc.flap.is_flapping = false;
            let comment_id = svc.flap.comment_id;
            svc.flap.comment_id = 0;
            (
                comment_id,
                svc.flap.percent_state_change,
                svc.current_state,
                svc.flap.check_recovery_notification,
            )
        };
        if comment_id != 0 {
            core.comments.delete(comment_id);
        }
        info!(
            "SERVICE FLAPPING ALERT: {};{};DISABLED; Flap detection has been disabled",
            key.host, key.description
        );
        core.broadcast(BrokerEvent::FlappingStop {
            host: key.host.clone(),
            service: Some(key.description.clone()),
            percent_change,
            disabled: true,
        });
        let _ = notifications::service_notification(
            core,
            key,
            NotificationReason::FlappingDisabled,
            None,
            None,
            options::NONE,
        );
        if check_recovery && current_state == STATE_OK {
            let _ = notifications::service_notification(
                core,
                key,
                NotificationReason::Normal,
                None,
                None,
                options::NONE,
            );
        }
        if let Some(svc) = core.objects.service_mut(key) {
            svc.flap.check_recovery_notification = false;
        }
    }
    core.update_service_status(key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::STATE_CRITICAL;

    #[test]
    fn identical_history_has_zero_change() {
        let history = [STATE_OK; MAX_STATE_HISTORY_ENTRIES];
        assert_eq!(flapping_pct(&history, 0), 0.0);
    }

    #[test]
    fn alternating_history_is_full_change() {
        let mut history = [0; MAX_STATE_HISTORY_ENTRIES];
        for (i, slot) in history.iter_mut().enumerate() {
            *slot = (i % 2) as i32;
        }
        let pct = flapping_pct(&history, 0);
        assert!((pct - 100.0).abs() < 1e-9, "alternating states flap fully, got {pct}");
    }

    #[test]
    fn single_transition_changes_little() {
        let mut history = [STATE_OK; MAX_STATE_HISTORY_ENTRIES];
        history[MAX_STATE_HISTORY_ENTRIES - 1] = STATE_CRITICAL;
        let pct = flapping_pct(&history, 0);
        assert!(pct > 0.0 && pct < 20.0, "one transition is not a flap, got {pct}");
    }

    #[test]
    fn newest_transition_weighs_more_than_oldest() {
        let mut newest = [STATE_OK; MAX_STATE_HISTORY_ENTRIES];
        newest[MAX_STATE_HISTORY_ENTRIES - 1] = STATE_CRITICAL;
        let mut oldest = [STATE_OK; MAX_STATE_HISTORY_ENTRIES];
        oldest[0] = STATE_CRITICAL;
        assert!(flapping_pct(&newest, 0) > flapping_pct(&oldest, 0));
    }
}
