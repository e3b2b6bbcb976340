//! Flap-detection engine tests: the curved metric over the ring,
//! hysteresis transitions and the disable path.

use test_helpers::{count_matching, fixture_core, http_key, T0};
use vigild::broker::BrokerEvent;
use vigild::flapping;
use vigild::notifications::NotificationReason;
use vigild::objects::{ServiceKey, StateType, MAX_STATE_HISTORY_ENTRIES, STATE_CRITICAL, STATE_OK};

fn observe(core: &mut vigild::core::Core, key: &ServiceKey, state: i32) {
    {
        let svc = core.objects.service_mut(key).unwrap();
        svc.current_state = state;
        svc.state_type = StateType::Hard;
    }
    flapping::check_for_service_flapping(core, key, true);
}

#[test]
fn stable_service_never_flaps() {
    let (mut core, log) = fixture_core();
    let key = http_key();
    for _ in 0..(2 * MAX_STATE_HISTORY_ENTRIES) {
        observe(&mut core, &key, STATE_OK);
    }
    let svc = core.objects.service_by_key(&key).unwrap();
    assert_eq!(svc.flap.percent_state_change, 0.0);
    assert!(!svc.flap.is_flapping);
    assert_eq!(
        count_matching(&log, |e| matches!(e, BrokerEvent::FlappingStart { .. })),
        0
    );
}

#[test]
fn alternating_states_cross_the_high_threshold_once() {
    let (mut core, log) = fixture_core();
    let key = http_key();

    // one ring fill of alternating states is enough to cross 30%
    for i in 0..MAX_STATE_HISTORY_ENTRIES {
        let state = if i % 2 == 0 { STATE_OK } else { STATE_CRITICAL };
        observe(&mut core, &key, state);
    }
    {
        let svc = core.objects.service_by_key(&key).unwrap();
        assert!(svc.flap.is_flapping, "alternating states must flap");
        assert!(svc.flap.percent_state_change >= core.config.high_service_flap_threshold);
        assert_ne!(svc.flap.comment_id, 0);
    }
    assert_eq!(
        count_matching(&log, |e| matches!(e, BrokerEvent::FlappingStart { .. })),
        1
    );
    // a FLAPPINGSTART notification went with it
    assert_eq!(
        count_matching(&log, |e| matches!(
            e,
            BrokerEvent::NotificationStart { reason: NotificationReason::FlappingStart, .. }
        )),
        1
    );

    // hysteresis: the flag may only clear once the metric falls to the
    // low threshold, never inside the band
    for _ in 0..(3 * MAX_STATE_HISTORY_ENTRIES) {
        observe(&mut core, &key, STATE_OK);
        let svc = core.objects.service_by_key(&key).unwrap();
        let pct = svc.flap.percent_state_change;
        if !svc.flap.is_flapping {
            assert!(pct <= core.config.low_service_flap_threshold);
            break;
        }
    }
    let svc = core.objects.service_by_key(&key).unwrap();
    assert!(!svc.flap.is_flapping, "stable states must clear the flag");
    assert_eq!(svc.flap.comment_id, 0);
    assert_eq!(
        count_matching(&log, |e| matches!(
            e,
            BrokerEvent::FlappingStop { disabled: false, .. }
        )),
        1
    );
}

#[test]
fn disabling_flap_detection_clears_a_flapping_service() {
    let (mut core, log) = fixture_core();
    let key = http_key();
    for i in 0..MAX_STATE_HISTORY_ENTRIES {
        let state = if i % 2 == 0 { STATE_OK } else { STATE_CRITICAL };
        observe(&mut core, &key, state);
    }
    assert!(core.objects.service_by_key(&key).unwrap().flap.is_flapping);

    flapping::disable_service_flap_detection(&mut core, &key);

    let svc = core.objects.service_by_key(&key).unwrap();
    assert!(!svc.flap.is_flapping);
    assert!(!svc.flap_detection_enabled);
    assert_eq!(
        count_matching(&log, |e| matches!(
            e,
            BrokerEvent::FlappingStop { disabled: true, .. }
        )),
        1
    );
    assert_eq!(
        count_matching(&log, |e| matches!(
            e,
            BrokerEvent::NotificationStart { reason: NotificationReason::FlappingDisabled, .. }
        )),
        1
    );
    // flipping it back on is tracked as a modified attribute
    flapping::enable_service_flap_detection(&mut core, &key);
    assert!(core.objects.service_by_key(&key).unwrap().flap_detection_enabled);
}

#[test]
fn soft_problem_states_are_not_recorded() {
    let (mut core, _log) = fixture_core();
    let key = http_key();
    let before = core.objects.service_by_key(&key).unwrap().flap.index;
    {
        let svc = core.objects.service_mut(&key).unwrap();
        svc.current_state = STATE_CRITICAL;
        svc.state_type = StateType::Soft;
    }
    flapping::check_for_service_flapping(&mut core, &key, true);
    let after = core.objects.service_by_key(&key).unwrap().flap.index;
    assert_eq!(before, after, "soft non-recovery states skip the ring");
}

#[test]
fn host_ring_updates_are_time_gated() {
    let (mut core, _log) = fixture_core();
    {
        let h = core.objects.host_mut("h1").unwrap();
        h.flap.last_history_update = T0;
    }
    // without an actual check and inside the wait threshold, nothing moves
    let before = core.objects.host("h1").unwrap().flap.index;
    flapping::check_for_host_flapping(&mut core, "h1", false, false);
    assert_eq!(core.objects.host("h1").unwrap().flap.index, before);

    // an actual check always records
    flapping::check_for_host_flapping(&mut core, "h1", false, true);
    assert_eq!(
        core.objects.host("h1").unwrap().flap.index,
        (before + 1) % MAX_STATE_HISTORY_ENTRIES
    );
}
