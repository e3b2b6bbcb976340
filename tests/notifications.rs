//! Notification engine tests: recovery bookkeeping, escalation timing,
//! forced notifications, suppression dedup and the end-to-end passive
//! check pipeline.

use test_helpers::{count_matching, fixture_core, http_key, T0};
use vigild::broker::BrokerEvent;
use vigild::notifications::{
    self, options, NotificationReason, SuppressionReason,
};
use vigild::objects::{opts, Escalation, StateType, STATE_CRITICAL, STATE_OK};
use vigild::workers::WorkerResult;
use vigild::{parse_mode, process_external_command};

fn feed(core: &mut vigild::core::Core, body: &str) {
    process_external_command(core, &format!("[{T0}] {body}"), parse_mode::POSITIONAL)
        .expect("command accepted");
}

fn sent_count(log: &std::rc::Rc<std::cell::RefCell<Vec<BrokerEvent>>>) -> usize {
    count_matching(log, |e| {
        matches!(e, BrokerEvent::NotificationEnd { contacts_notified, .. } if *contacts_notified > 0)
    })
}

#[test]
fn recovery_is_sent_once_and_resets_bookkeeping() {
    // a full problem lifecycle: CRIT, CRIT, CRIT, OK, OK yields one
    // problem notification, one recovery, nothing afterwards
    let (mut core, log) = fixture_core();
    let key = http_key();

    feed(&mut core, "PROCESS_SERVICE_CHECK_RESULT;h1;http;2;it broke");
    assert_eq!(sent_count(&log), 1);
    {
        let svc = core.objects.service_by_key(&key).unwrap();
        assert_eq!(svc.current_notification_number, 1);
        assert_ne!(svc.notified_on & opts::state_bit(STATE_CRITICAL), 0);
        assert_eq!(svc.next_notification, T0 + 60);
        assert_eq!(svc.last_notification, T0);
    }

    // repeats inside the renotification window are throttled, and the
    // repeated suppression logs only once
    feed(&mut core, "PROCESS_SERVICE_CHECK_RESULT;h1;http;2;still broke");
    feed(&mut core, "PROCESS_SERVICE_CHECK_RESULT;h1;http;2;still broke");
    assert_eq!(sent_count(&log), 1);
    assert_eq!(
        count_matching(&log, |e| matches!(
            e,
            BrokerEvent::NotificationSuppressed { reason: SuppressionReason::ReNotYet, .. }
        )),
        1
    );

    // recovery goes out because the problem was notified, then the
    // bookkeeping resets
    feed(&mut core, "PROCESS_SERVICE_CHECK_RESULT;h1;http;0;all good");
    assert_eq!(sent_count(&log), 2);
    {
        let svc = core.objects.service_by_key(&key).unwrap();
        assert_eq!(svc.notified_on, 0);
        assert_eq!(svc.current_notification_number, 0);
    }

    // a spurious OK -> OK "transition" notifies nobody
    feed(&mut core, "PROCESS_SERVICE_CHECK_RESULT;h1;http;0;all good");
    assert_eq!(sent_count(&log), 2);
}

#[test]
fn recovery_for_an_unnotified_problem_is_suppressed() {
    let (mut core, log) = fixture_core();
    let key = http_key();
    {
        let svc = core.objects.service_mut(&key).unwrap();
        svc.current_state = STATE_OK;
        svc.state_type = StateType::Hard;
        svc.notified_on = 0;
    }
    notifications::service_notification(
        &mut core,
        &key,
        NotificationReason::Normal,
        None,
        None,
        options::NONE,
    )
    .unwrap();
    assert_eq!(sent_count(&log), 0);
    assert_eq!(
        count_matching(&log, |e| matches!(
            e,
            BrokerEvent::NotificationSuppressed {
                reason: SuppressionReason::RecoveryUnnotifiedProblem,
                ..
            }
        )),
        1
    );
}

#[test]
fn escalation_interval_drives_next_notification_time() {
    let (mut core, log) = fixture_core();
    let key = http_key();
    {
        let svc = core.objects.service_mut(&key).unwrap();
        svc.current_state = STATE_CRITICAL;
        svc.state_type = StateType::Hard;
        svc.escalations.push(Escalation {
            first_notification: 1,
            last_notification: 0,
            notification_interval: 0.5,
            escalation_period: None,
            escalation_options: opts::ALL,
            contacts: vec!["bob".to_string()],
            contact_groups: vec![],
        });
    }
    notifications::service_notification(
        &mut core,
        &key,
        NotificationReason::Normal,
        None,
        None,
        options::NONE,
    )
    .unwrap();

    // the escalation matched: bob got it, and its (shorter) interval
    // governs the renotification window
    assert_eq!(sent_count(&log), 1);
    assert_eq!(
        count_matching(&log, |e| matches!(
            e,
            BrokerEvent::ContactNotification { contact, .. } if contact == "bob"
        )),
        1
    );
    let svc = core.objects.service_by_key(&key).unwrap();
    assert_eq!(svc.next_notification, T0 + 30);
    assert_eq!(svc.last_notification, T0);
}

#[test]
fn escalation_window_is_bounded_by_notification_number() {
    let (mut core, log) = fixture_core();
    let key = http_key();
    {
        let svc = core.objects.service_mut(&key).unwrap();
        svc.current_state = STATE_CRITICAL;
        svc.state_type = StateType::Hard;
        // only fires from the third notification on
        svc.escalations.push(Escalation {
            first_notification: 3,
            contacts: vec!["bob".to_string()],
            ..Escalation::default()
        });
    }
    notifications::service_notification(
        &mut core,
        &key,
        NotificationReason::Normal,
        None,
        None,
        options::NONE,
    )
    .unwrap();
    // number 1: the escalation is not yet valid, alice gets the page
    assert_eq!(
        count_matching(&log, |e| matches!(
            e,
            BrokerEvent::ContactNotification { contact, .. } if contact == "alice"
        )),
        1
    );
    assert_eq!(
        count_matching(&log, |e| matches!(
            e,
            BrokerEvent::ContactNotification { contact, .. } if contact == "bob"
        )),
        0
    );
}

#[test]
fn forced_notifications_bypass_every_filter() {
    let (mut core, log) = fixture_core();
    let key = http_key();
    core.program.enable_notifications = false;
    core.objects
        .contact_mut("alice")
        .unwrap()
        .service_notifications_enabled = false;
    {
        let svc = core.objects.service_mut(&key).unwrap();
        svc.current_state = STATE_CRITICAL;
        svc.state_type = StateType::Soft; // even a soft state goes out
    }
    notifications::service_notification(
        &mut core,
        &key,
        NotificationReason::Normal,
        None,
        None,
        options::FORCED,
    )
    .unwrap();
    assert_eq!(sent_count(&log), 1);
    assert_eq!(
        core.objects
            .service_by_key(&key)
            .unwrap()
            .current_notification_number,
        1
    );
}

#[test]
fn suppression_reasons_are_deduplicated_until_they_change() {
    let (mut core, log) = fixture_core();
    let key = http_key();
    {
        let svc = core.objects.service_mut(&key).unwrap();
        svc.current_state = STATE_CRITICAL;
        svc.state_type = StateType::Hard;
    }
    core.program.enable_notifications = false;

    notifications::service_notification(
        &mut core, &key, NotificationReason::Normal, None, None, options::NONE,
    )
    .unwrap();
    notifications::service_notification(
        &mut core, &key, NotificationReason::Normal, None, None, options::NONE,
    )
    .unwrap();
    assert_eq!(
        count_matching(&log, |e| matches!(e, BrokerEvent::NotificationSuppressed { .. })),
        1
    );

    // a different reason breaks the dedup
    core.program.enable_notifications = true;
    core.objects.service_mut(&key).unwrap().notifications_enabled = false;
    notifications::service_notification(
        &mut core, &key, NotificationReason::Normal, None, None, options::NONE,
    )
    .unwrap();
    assert_eq!(
        count_matching(&log, |e| matches!(e, BrokerEvent::NotificationSuppressed { .. })),
        2
    );
}

#[test]
fn duplicate_recipients_collapse_across_groups() {
    let (mut core, log) = fixture_core();
    let key = http_key();
    {
        let svc = core.objects.service_mut(&key).unwrap();
        svc.current_state = STATE_CRITICAL;
        svc.state_type = StateType::Hard;
        // alice is both a direct contact and an admins member
        svc.contact_groups = vec!["admins".to_string()];
    }
    notifications::service_notification(
        &mut core, &key, NotificationReason::Normal, None, None, options::NONE,
    )
    .unwrap();
    assert_eq!(
        count_matching(&log, |e| matches!(
            e,
            BrokerEvent::NotificationEnd { contacts_notified: 1, .. }
        )),
        1
    );
}

#[test]
fn global_toggle_commands_are_idempotent() {
    // the second DISABLE_NOTIFICATIONS is a no-op
    let (mut core, log) = fixture_core();
    feed(&mut core, "DISABLE_NOTIFICATIONS");
    assert!(!core.program.enable_notifications);
    feed(&mut core, "DISABLE_NOTIFICATIONS");
    assert_eq!(
        count_matching(&log, |e| matches!(e, BrokerEvent::AdaptiveProgram { .. })),
        1
    );
    assert_eq!(
        count_matching(&log, |e| matches!(e, BrokerEvent::ProgramStatus)),
        1
    );
    // the modified-attribute bit sticks for retention
    assert_ne!(core.program.modified_host_process_attributes, 0);
}

#[test]
fn notification_dispatch_registers_worker_jobs() {
    let (mut core, _log) = fixture_core();
    let key = http_key();
    {
        let svc = core.objects.service_mut(&key).unwrap();
        svc.current_state = STATE_CRITICAL;
        svc.state_type = StateType::Hard;
    }
    notifications::service_notification(
        &mut core, &key, NotificationReason::Normal, None, None, options::NONE,
    )
    .unwrap();
    // alice has one notification command; its job awaits a result
    assert_eq!(core.jobs.pending_count(), 1);

    // reaping the (failed) result routes to the callback exactly once
    let result = WorkerResult {
        job_id: 1,
        command: "notify-svc-by-email alice h1 http CRITICAL".to_string(),
        wait_status: 2 << 8,
        early_timeout: false,
        exited_ok: true,
        error_code: 0,
        outstd: String::new(),
        outerr: "smtp down".to_string(),
        runtime: 0.1,
    };
    core.complete_job(&result);
    assert_eq!(core.jobs.pending_count(), 0);
    assert_eq!(core.counters.jobs_completed, 1);
    // a second identical frame is dropped on the floor
    core.complete_job(&result);
    assert_eq!(core.counters.jobs_completed, 1);
}

#[test]
fn acknowledged_problems_stay_quiet_until_recovery() {
    let (mut core, log) = fixture_core();
    let key = http_key();
    feed(&mut core, "PROCESS_SERVICE_CHECK_RESULT;h1;http;2;down");
    assert_eq!(sent_count(&log), 1);

    feed(&mut core, "ACKNOWLEDGE_SVC_PROBLEM;h1;http;2;1;1;alice;on it");
    // the acknowledgement itself notifies
    assert_eq!(
        count_matching(&log, |e| matches!(
            e,
            BrokerEvent::NotificationEnd { reason: NotificationReason::Acknowledgement, contacts_notified, .. }
                if *contacts_notified > 0
        )),
        1
    );
    assert!(core.objects.service_by_key(&key).unwrap().problem_has_been_acknowledged);

    // further problem results are blocked by the acknowledgement, even
    // past the renotification window
    core.now = T0 + 600;
    feed(&mut core, "PROCESS_SERVICE_CHECK_RESULT;h1;http;2;still down");
    assert_eq!(
        count_matching(&log, |e| matches!(
            e,
            BrokerEvent::NotificationSuppressed { reason: SuppressionReason::Acknowledged, .. }
        )),
        1
    );

    // recovery clears the ack
    feed(&mut core, "PROCESS_SERVICE_CHECK_RESULT;h1;http;0;back");
    assert!(!core.objects.service_by_key(&key).unwrap().problem_has_been_acknowledged);
}
