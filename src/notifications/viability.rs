//! Notification viability filters: the ordered checks deciding whether an
//! object- or contact-level notification may go out, each failure mapped
//! to one suppression reason.

use super::{options, NotificationReason, SuppressionReason};
use crate::core::Core;
use crate::objects::{
    check_time_against_period, opts, Contact, Host, Service, ServiceKey, StateType, STATE_OK,
    STATE_UP,
};

fn is_flapping_family(reason: NotificationReason) -> bool {
    matches!(
        reason,
        NotificationReason::FlappingStart
            | NotificationReason::FlappingStop
            | NotificationReason::FlappingDisabled
    )
}

fn is_downtime_family(reason: NotificationReason) -> bool {
    matches!(
        reason,
        NotificationReason::DowntimeStart
            | NotificationReason::DowntimeEnd
            | NotificationReason::DowntimeCancelled
    )
}

/// Object-level viability for a service notification. Short-circuits on
/// the first failing filter.
pub(super) fn service_viability(
    core: &Core,
    key: &ServiceKey,
    reason: NotificationReason,
    opts_bits: u32,
) -> Result<(), SuppressionReason> {
    // forced notifications bust through everything
    if opts_bits & options::FORCED != 0 {
        return Ok(());
    }
    let now = core.now;
    let Some(svc) = core.objects.service_by_key(key) else {
        return Err(SuppressionReason::Ok);
    };
    let Some(host) = core.objects.host(&svc.host_name) else {
        return Err(SuppressionReason::Ok);
    };

    if !core.program.enable_notifications {
        return Err(SuppressionReason::Disabled);
    }

    // the service inherits the host's notification period when unset
    let period = core
        .objects
        .period_of(svc.notification_period.as_ref())
        .or_else(|| core.objects.period_of(host.notification_period.as_ref()));
    if !check_time_against_period(period, now) {
        return Err(SuppressionReason::TimeperiodBlocked);
    }

    if !svc.notifications_enabled {
        return Err(SuppressionReason::DisabledObject);
    }

    if reason == NotificationReason::Custom {
        if svc.scheduled_downtime_depth > 0 || host.scheduled_downtime_depth > 0 {
            return Err(SuppressionReason::CustomSchedDowntime);
        }
        return Ok(());
    }

    if reason == NotificationReason::Acknowledgement {
        if svc.current_state == STATE_OK {
            return Err(SuppressionReason::AckObjectOk);
        }
        return Ok(());
    }

    if is_flapping_family(reason) {
        if svc.notification_options & opts::FLAPPING == 0 {
            return Err(SuppressionReason::NoFlapping);
        }
        if svc.scheduled_downtime_depth > 0 || host.scheduled_downtime_depth > 0 {
            return Err(SuppressionReason::SchedDowntimeFlapping);
        }
        return Ok(());
    }

    if is_downtime_family(reason) {
        if svc.notification_options & opts::DOWNTIME == 0 {
            return Err(SuppressionReason::NoDowntime);
        }
        // only the service's own downtime blocks these, not the host's
        if svc.scheduled_downtime_depth > 0 {
            return Err(SuppressionReason::SchedDowntimeDowntime);
        }
        return Ok(());
    }

    // if every service parent is in trouble, the problem is upstream;
    // recoveries still go out
    if !svc.parents.is_empty() && svc.current_state != STATE_OK {
        let any_ok_parent = svc.parents.iter().any(|p| {
            core.objects
                .service_by_key(p)
                .map(|parent| parent.current_state == STATE_OK)
                .unwrap_or(false)
        });
        if !any_ok_parent {
            return Err(SuppressionReason::BadParents);
        }
    }

    if svc.state_type == StateType::Soft {
        return Err(SuppressionReason::SoftState);
    }
    if svc.problem_has_been_acknowledged {
        return Err(SuppressionReason::Acknowledged);
    }
    if core.objects.service_dependencies_failed(key, now)
        || core.objects.host_dependencies_failed(&svc.host_name, now)
    {
        return Err(SuppressionReason::DependencyFailure);
    }
    if svc.notification_options & opts::state_bit(svc.current_state) == 0 {
        return Err(SuppressionReason::StateDisabled);
    }
    if svc.current_state == STATE_OK && svc.notified_on == 0 {
        return Err(SuppressionReason::RecoveryUnnotifiedProblem);
    }

    // first-notification delay, counted from the last hard change (or
    // program start if the service was never up)
    if reason == NotificationReason::Normal
        && svc.current_notification_number == 0
        && svc.first_notification_delay > 0.0
        && svc.current_state != STATE_OK
    {
        let first_problem_time = if svc.last_hard_state_change > 0 {
            svc.last_hard_state_change
        } else {
            core.program.program_start
        };
        let delay = (svc.first_notification_delay * core.config.interval_length as f64) as i64;
        if now < first_problem_time + delay {
            return Err(SuppressionReason::Delay);
        }
    }

    if core.program.enable_flap_detection
        && svc.flap_detection_enabled
        && svc.flap.is_flapping
    {
        return Err(SuppressionReason::IsFlapping);
    }

    // recovery notifications are good to go at this point
    if svc.current_state == STATE_OK {
        return Ok(());
    }

    if svc.no_more_notifications {
        return Err(SuppressionReason::ReNoMore);
    }
    if host.current_state != STATE_UP {
        return Err(SuppressionReason::ServiceHostDownUnreachable);
    }
    if now < svc.next_notification && !svc.is_volatile {
        return Err(SuppressionReason::ReNotYet);
    }
    if svc.scheduled_downtime_depth > 0 {
        return Err(SuppressionReason::IsScheduledDowntime);
    }
    if host.scheduled_downtime_depth > 0 {
        return Err(SuppressionReason::ServiceHostScheduledDowntime);
    }

    Ok(())
}

/// Object-level viability for a host notification.
pub(super) fn host_viability(
    core: &Core,
    host: &Host,
    reason: NotificationReason,
    opts_bits: u32,
) -> Result<(), SuppressionReason> {
    if opts_bits & options::FORCED != 0 {
        return Ok(());
    }
    let now = core.now;

    if !core.program.enable_notifications {
        return Err(SuppressionReason::Disabled);
    }
    let period = core.objects.period_of(host.notification_period.as_ref());
    if !check_time_against_period(period, now) {
        return Err(SuppressionReason::TimeperiodBlocked);
    }
    if !host.notifications_enabled {
        return Err(SuppressionReason::DisabledObject);
    }

    if reason == NotificationReason::Custom {
        if host.scheduled_downtime_depth > 0 {
            return Err(SuppressionReason::CustomSchedDowntime);
        }
        return Ok(());
    }

    if reason == NotificationReason::Acknowledgement {
        if host.current_state == STATE_UP {
            return Err(SuppressionReason::AckObjectOk);
        }
        return Ok(());
    }

    if is_flapping_family(reason) {
        if host.notification_options & opts::FLAPPING == 0 {
            return Err(SuppressionReason::NoFlapping);
        }
        if host.scheduled_downtime_depth > 0 {
            return Err(SuppressionReason::SchedDowntimeFlapping);
        }
        return Ok(());
    }

    if is_downtime_family(reason) {
        if host.notification_options & opts::DOWNTIME == 0 {
            return Err(SuppressionReason::NoDowntime);
        }
        if host.scheduled_downtime_depth > 0 {
            return Err(SuppressionReason::SchedDowntimeDowntime);
        }
        return Ok(());
    }

    if host.state_type == StateType::Soft {
        return Err(SuppressionReason::SoftState);
    }
    if host.problem_has_been_acknowledged {
        return Err(SuppressionReason::Acknowledged);
    }
    if core.objects.host_dependencies_failed(&host.name, now) {
        return Err(SuppressionReason::DependencyFailure);
    }
    if host.notification_options & opts::state_bit(host.current_state) == 0 {
        return Err(SuppressionReason::StateDisabled);
    }
    if host.current_state == STATE_UP {
        if host.notification_options & opts::RECOVERY == 0 {
            return Err(SuppressionReason::NoRecovery);
        }
        if host.notified_on == 0 {
            return Err(SuppressionReason::RecoveryUnnotifiedProblem);
        }
    }

    if reason == NotificationReason::Normal
        && host.current_notification_number == 0
        && host.first_notification_delay > 0.0
        && host.current_state != STATE_UP
    {
        let first_problem_time = if host.last_hard_state_change > 0 {
            host.last_hard_state_change
        } else {
            core.program.program_start
        };
        let delay = (host.first_notification_delay * core.config.interval_length as f64) as i64;
        if now < first_problem_time + delay {
            return Err(SuppressionReason::Delay);
        }
    }

    if core.program.enable_flap_detection
        && host.flap_detection_enabled
        && host.flap.is_flapping
    {
        return Err(SuppressionReason::IsFlapping);
    }

    if host.current_state == STATE_UP {
        return Ok(());
    }

    if host.scheduled_downtime_depth > 0 {
        return Err(SuppressionReason::IsScheduledDowntime);
    }
    if host.no_more_notifications {
        return Err(SuppressionReason::ReNoMore);
    }
    if now < host.next_notification {
        return Err(SuppressionReason::ReNotYet);
    }

    Ok(())
}

/// Contact-level viability for a service notification.
pub(super) fn contact_service_viability(
    core: &Core,
    contact: &Contact,
    svc: &Service,
    reason: NotificationReason,
    opts_bits: u32,
) -> Result<(), SuppressionReason> {
    if opts_bits & options::FORCED != 0 {
        return Ok(());
    }

    if contact.minimum_value > svc.hourly_value {
        return Err(SuppressionReason::InsuffImportance);
    }
    if !contact.service_notifications_enabled {
        return Err(SuppressionReason::DisabledObject);
    }
    let period = core
        .objects
        .period_of(contact.service_notification_period.as_ref());
    if !check_time_against_period(period, core.now) {
        return Err(SuppressionReason::TimeperiodBlocked);
    }

    if reason == NotificationReason::Custom {
        return Ok(());
    }
    if is_flapping_family(reason) {
        if contact.service_notification_options & opts::FLAPPING == 0 {
            return Err(SuppressionReason::NoFlapping);
        }
        return Ok(());
    }
    if is_downtime_family(reason) {
        if contact.service_notification_options & opts::DOWNTIME == 0 {
            return Err(SuppressionReason::NoDowntime);
        }
        return Ok(());
    }

    if contact.service_notification_options & opts::state_bit(svc.current_state) == 0 {
        return Err(SuppressionReason::StateDisabled);
    }
    if svc.current_state == STATE_OK {
        if contact.service_notification_options & opts::RECOVERY == 0 {
            return Err(SuppressionReason::NoRecovery);
        }
        if svc.notified_on & contact.service_notification_options == 0 {
            return Err(SuppressionReason::RecoveryUnnotifiedProblem);
        }
    }

    Ok(())
}

/// Contact-level viability for a host notification.
pub(super) fn contact_host_viability(
    core: &Core,
    contact: &Contact,
    host: &Host,
    reason: NotificationReason,
    opts_bits: u32,
) -> Result<(), SuppressionReason> {
    if opts_bits & options::FORCED != 0 {
        return Ok(());
    }

    if !contact.host_notifications_enabled {
        return Err(SuppressionReason::DisabledObject);
    }
    // a host can ride on the importance of the services it carries
    if contact.minimum_value > host.hourly_value
        && contact.minimum_value
            > host.hourly_value + core.objects.host_services_value(&host.name)
    {
        return Err(SuppressionReason::InsuffImportance);
    }
    let period = core
        .objects
        .period_of(contact.host_notification_period.as_ref());
    if !check_time_against_period(period, core.now) {
        return Err(SuppressionReason::TimeperiodBlocked);
    }

    if reason == NotificationReason::Custom {
        return Ok(());
    }
    if is_flapping_family(reason) {
        if contact.host_notification_options & opts::FLAPPING == 0 {
            return Err(SuppressionReason::NoFlapping);
        }
        return Ok(());
    }
    if is_downtime_family(reason) {
        if contact.host_notification_options & opts::DOWNTIME == 0 {
            return Err(SuppressionReason::NoDowntime);
        }
        return Ok(());
    }

    if contact.host_notification_options & opts::state_bit(host.current_state) == 0 {
        return Err(SuppressionReason::StateDisabled);
    }
    if host.current_state == STATE_UP {
        if contact.host_notification_options & opts::RECOVERY == 0 {
            return Err(SuppressionReason::NoRecovery);
        }
        if host.notified_on & contact.host_notification_options == 0 {
            return Err(SuppressionReason::RecoveryUnnotifiedProblem);
        }
    }

    Ok(())
}
