//! Downtime engine tests: scheduling, triggered propagation,
//! cancellation cascades, flexible activation and expiry.

use test_helpers::{count_matching, fixture_core, http_key, T0};
use vigild::broker::BrokerEvent;
use vigild::downtime::{self, DowntimeError, DowntimeTarget};
use vigild::notifications::NotificationReason;
use vigild::objects::STATE_DOWN;
use vigild::{parse_mode, process_external_command};

fn host_target(name: &str) -> DowntimeTarget {
    DowntimeTarget::Host(name.to_string())
}

#[test]
fn propagated_triggered_downtime_cancels_with_its_parent() {
    // h1 has two children (c1, c2): propagation creates three entries
    let (mut core, _log) = fixture_core();
    process_external_command(
        &mut core,
        &format!(
            "[{T0}] SCHEDULE_AND_PROPAGATE_TRIGGERED_HOST_DOWNTIME;h1;{};{};1;0;0;ops;maint",
            T0 + 10,
            T0 + 3600
        ),
        parse_mode::POSITIONAL,
    )
    .expect("propagation command");

    assert_eq!(core.downtimes.len(), 3);
    let parent_id = core
        .downtimes
        .iter_in_order()
        .find(|dt| dt.target == host_target("h1"))
        .map(|dt| dt.id)
        .expect("parent downtime exists");
    let children: Vec<_> = core
        .downtimes
        .iter_in_order()
        .filter(|dt| dt.target != host_target("h1"))
        .collect();
    assert_eq!(children.len(), 2);
    for child in &children {
        assert_eq!(child.triggered_by, parent_id);
    }

    // cancelling the parent cascades through the triggered children
    downtime::unschedule_downtime(&mut core, parent_id).expect("cancel parent");
    assert_eq!(core.downtimes.len(), 0);
}

#[test]
fn flexible_downtime_with_past_end_time_is_rejected() {
    let (mut core, _log) = fixture_core();
    let err = downtime::schedule_downtime(
        &mut core,
        host_target("h1"),
        T0,
        "ops",
        "too late",
        T0 - 600,
        T0 - 10,
        false,
        0,
        120,
    )
    .unwrap_err();
    assert_eq!(err, DowntimeError::BadTime);

    // a flexible downtime also needs a duration
    let err = downtime::schedule_downtime(
        &mut core,
        host_target("h1"),
        T0,
        "ops",
        "no duration",
        T0 + 10,
        T0 + 100,
        false,
        0,
        0,
    )
    .unwrap_err();
    assert_eq!(err, DowntimeError::BadTime);
}

#[test]
fn triggered_child_inherits_flex_downtime_start() {
    let (mut core, _log) = fixture_core();
    // flexible parent on h1, triggered fixed child on c1
    let parent = downtime::schedule_downtime(
        &mut core,
        host_target("h1"),
        T0,
        "ops",
        "flex window",
        T0 + 5,
        T0 + 500,
        false,
        0,
        120,
    )
    .expect("flexible parent");
    let child = downtime::schedule_downtime(
        &mut core,
        host_target("c1"),
        T0,
        "ops",
        "rides along",
        T0 + 5,
        T0 + 500,
        true,
        parent,
        0,
    )
    .expect("triggered child");

    // the parent activates when the host goes down inside the window
    core.run_events_until(T0 + 40);
    core.objects.host_mut("h1").unwrap().current_state = STATE_DOWN;
    let started = downtime::check_pending_flex_host_downtime(&mut core, "h1");
    assert_eq!(started, 1);
    core.run_events_until(T0 + 40);

    let parent_dt = core.downtimes.get(parent).expect("parent active");
    assert!(parent_dt.is_in_effect);
    assert_eq!(parent_dt.flex_downtime_start, T0 + 40);
    let child_dt = core.downtimes.get(child).expect("child active");
    assert!(child_dt.is_in_effect);
    assert_eq!(child_dt.flex_downtime_start, T0 + 40);
}

#[test]
fn expiry_only_removes_downtime_that_never_activated() {
    let (mut core, _log) = fixture_core();
    // this one activates at T0+10 and must survive the sweep
    let active = downtime::schedule_downtime(
        &mut core,
        host_target("h1"),
        T0,
        "ops",
        "in effect",
        T0 + 10,
        T0 + 100,
        true,
        0,
        0,
    )
    .unwrap();
    // this flexible one never triggers and expires at end_time + 1
    let stale = downtime::schedule_downtime(
        &mut core,
        host_target("h2"),
        T0,
        "ops",
        "never happened",
        T0 + 10,
        T0 + 50,
        false,
        0,
        60,
    )
    .unwrap();

    core.run_events_until(T0 + 20);
    assert!(core.downtimes.get(active).unwrap().is_in_effect);

    // drive the clock past the flexible window; the expiry event fires
    // but leaves the in-effect entry alone
    core.run_events_until(T0 + 60);
    assert!(core.downtimes.get(stale).is_none());
    assert!(core.downtimes.get(active).is_some());
}

#[test]
fn fixed_downtime_start_and_cancel_lifecycle() {
    // fixed downtime: started, then cancelled mid-window
    let (mut core, log) = fixture_core();
    let id = downtime::schedule_downtime(
        &mut core,
        host_target("h1"),
        T0,
        "ops",
        "planned work",
        T0 + 10,
        T0 + 3610,
        true,
        0,
        0,
    )
    .unwrap();

    core.run_events_until(T0 + 10);
    assert_eq!(
        core.objects.host("h1").unwrap().scheduled_downtime_depth,
        1
    );
    assert_eq!(
        count_matching(&log, |e| matches!(
            e,
            BrokerEvent::DowntimeStart { host, .. } if host == "h1"
        )),
        1
    );
    // the start notification went out exactly once
    assert_eq!(
        count_matching(&log, |e| matches!(
            e,
            BrokerEvent::NotificationEnd { reason: NotificationReason::DowntimeStart, contacts_notified, .. }
                if *contacts_notified > 0
        )),
        1
    );

    core.run_events_until(T0 + 110);
    downtime::unschedule_downtime(&mut core, id).expect("cancel");
    assert_eq!(
        core.objects.host("h1").unwrap().scheduled_downtime_depth,
        0
    );
    assert_eq!(
        count_matching(&log, |e| matches!(
            e,
            BrokerEvent::DowntimeStop { cancelled: true, .. }
        )),
        1
    );
    assert_eq!(
        count_matching(&log, |e| matches!(
            e,
            BrokerEvent::NotificationEnd { reason: NotificationReason::DowntimeCancelled, contacts_notified, .. }
                if *contacts_notified > 0
        )),
        1
    );
    assert!(core.downtimes.is_empty());
    // the descriptive comment died with the entry
    assert!(core.comments.is_empty());
}

#[test]
fn hostgroup_downtime_covers_every_member() {
    // one fixed downtime per member host
    let (mut core, _log) = fixture_core();
    process_external_command(
        &mut core,
        &format!(
            "[{T0}] SCHEDULE_HOSTGROUP_HOST_DOWNTIME;webservers;{};{};1;0;60;nobody;rolling",
            T0 + 10,
            T0 + 70
        ),
        parse_mode::POSITIONAL,
    )
    .expect("hostgroup downtime");

    let entries: Vec<_> = core.downtimes.iter_in_order().collect();
    assert_eq!(entries.len(), 3);
    let mut hosts: Vec<&str> = entries
        .iter()
        .map(|dt| dt.target.host_name())
        .collect();
    hosts.sort_unstable();
    assert_eq!(hosts, vec!["h1", "h2", "h3"]);
    for dt in &entries {
        assert!(dt.fixed);
        assert_eq!(dt.start_time, T0 + 10);
        assert_eq!(dt.comment, "rolling");
    }
    // distinct, monotonically assigned ids
    let mut dt_ids: Vec<u64> = entries.iter().map(|dt| dt.id).collect();
    dt_ids.sort_unstable();
    dt_ids.dedup();
    assert_eq!(dt_ids.len(), 3);
}

#[test]
fn filter_deletion_refuses_empty_filters() {
    let (mut core, _log) = fixture_core();
    downtime::schedule_downtime(
        &mut core,
        DowntimeTarget::Service(http_key()),
        T0,
        "ops",
        "svc window",
        T0 + 10,
        T0 + 100,
        true,
        0,
        0,
    )
    .unwrap();
    downtime::schedule_downtime(
        &mut core,
        host_target("h1"),
        T0,
        "ops",
        "host window",
        T0 + 10,
        T0 + 100,
        true,
        0,
        0,
    )
    .unwrap();

    assert_eq!(downtime::delete_downtime_by_filter(&mut core, None, None, 0, None), 0);
    assert_eq!(core.downtimes.len(), 2);

    // a service filter never matches host downtime
    let deleted =
        downtime::delete_downtime_by_filter(&mut core, Some("h1"), Some("http"), 0, None);
    assert_eq!(deleted, 1);
    assert_eq!(core.downtimes.len(), 1);

    let deleted = downtime::delete_downtime_by_filter(&mut core, Some("h1"), None, 0, None);
    assert_eq!(deleted, 1);
    assert!(core.downtimes.is_empty());
}

#[test]
fn list_order_puts_triggering_before_triggered_on_ties() {
    let (mut core, _log) = fixture_core();
    let parent = downtime::schedule_downtime(
        &mut core,
        host_target("h1"),
        T0,
        "ops",
        "parent",
        T0 + 100,
        T0 + 200,
        true,
        0,
        0,
    )
    .unwrap();
    let child = downtime::schedule_downtime(
        &mut core,
        host_target("c1"),
        T0,
        "ops",
        "child",
        T0 + 100,
        T0 + 200,
        true,
        parent,
        0,
    )
    .unwrap();
    // same start time: non-triggered first
    let order: Vec<u64> = core.downtimes.iter_in_order().map(|dt| dt.id).collect();
    assert_eq!(order, vec![parent, child]);
}
