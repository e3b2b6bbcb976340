//! Command-parser tests: positional and key=value syntax, strict
//! numerics, defaults and the custom-command signal.

use test_helpers::{fixture_core, T0};
use vigild::broker::BrokerEvent;
use vigild::command::parser::{parse, Parsed};
use vigild::command::CommandError;
use vigild::objects::{CommentEntryType, CommentTarget};
use vigild::{parse_mode, process_external_command};

fn line(body: &str) -> String {
    format!("[{T0}] {body}")
}

#[test]
fn positional_command_binds_typed_arguments() {
    // a comment lands on the host with every field bound
    let (mut core, _log) = fixture_core();
    process_external_command(
        &mut core,
        &line("ADD_HOST_COMMENT;h1;1;alice;box is on fire"),
        parse_mode::POSITIONAL,
    )
    .expect("well-formed command");

    let comment = core
        .comments
        .iter()
        .find(|c| c.target == CommentTarget::Host("h1".to_string()))
        .expect("comment attached to h1");
    assert_eq!(comment.author, "alice");
    assert_eq!(comment.text, "box is on fire");
    assert!(comment.persistent);
    assert_eq!(comment.entry_time, T0);
    assert_eq!(comment.entry_type, CommentEntryType::User);
}

#[test]
fn missing_argument_without_default_fails() {
    let (core, _log) = fixture_core();
    let err = parse(
        &core.registry,
        &core.objects,
        &line("ADD_HOST_COMMENT;h1;1;alice"),
        parse_mode::POSITIONAL,
        T0,
    )
    .unwrap_err();
    assert!(matches!(err, CommandError::MissingArg(arg) if arg == "comment"));
}

#[test]
fn last_string_argument_swallows_semicolons() {
    let (mut core, _log) = fixture_core();
    process_external_command(
        &mut core,
        &line("ADD_HOST_COMMENT;h1;0;alice;semi;colons;everywhere"),
        parse_mode::POSITIONAL,
    )
    .expect("trailing semicolons belong to the comment");
    let comment = core.comments.iter().next().unwrap();
    assert_eq!(comment.text, "semi;colons;everywhere");
}

#[test]
fn excess_arguments_fail_for_non_string_tails() {
    let (core, _log) = fixture_core();
    let err = parse(
        &core.registry,
        &core.objects,
        &line("DEL_HOST_COMMENT;5;junk"),
        parse_mode::POSITIONAL,
        T0,
    )
    .unwrap_err();
    assert!(matches!(err, CommandError::ExcessArg { expected: 1 }));
}

#[test]
fn zero_argument_commands_ignore_trailing_text() {
    let (core, _log) = fixture_core();
    let parsed = parse(
        &core.registry,
        &core.objects,
        &line("DISABLE_NOTIFICATIONS;whatever;extra"),
        parse_mode::POSITIONAL,
        T0,
    )
    .expect("legacy: excess text after a zero-arg command is ignored");
    assert!(!parsed.is_custom());
}

#[test]
fn custom_commands_never_reach_a_handler() {
    let (mut core, log) = fixture_core();
    let parsed = parse(
        &core.registry,
        &core.objects,
        &line("_SNMP_TRAP_FORWARD;h1;cold-start"),
        parse_mode::POSITIONAL,
        T0,
    )
    .expect("custom commands parse");
    assert!(parsed.is_custom());
    assert_eq!(parsed.command().raw_arguments, "h1;cold-start");

    process_external_command(
        &mut core,
        &line("_SNMP_TRAP_FORWARD;h1;cold-start"),
        parse_mode::POSITIONAL,
    )
    .expect("custom commands are accepted");
    // observers see it, the core does nothing with it
    assert!(log.borrow().iter().any(|e| matches!(
        e,
        BrokerEvent::ExternalCommandStart { name, .. } if name == "_SNMP_TRAP_FORWARD"
    )));
    assert!(core.comments.is_empty());
    assert_eq!(core.counters.custom_commands, 1);
}

#[test]
fn numeric_parse_rejects_trailing_garbage() {
    let (core, _log) = fixture_core();
    let err = parse(
        &core.registry,
        &core.objects,
        &line("DEL_HOST_COMMENT;12abc"),
        parse_mode::POSITIONAL,
        T0,
    )
    .unwrap_err();
    assert!(matches!(err, CommandError::TypeMismatch(_)));
}

#[test]
fn unknown_and_malformed_commands_are_distinct() {
    let (core, _log) = fixture_core();
    let unknown = parse(
        &core.registry,
        &core.objects,
        &line("NO_SUCH_COMMAND;x"),
        parse_mode::POSITIONAL,
        T0,
    )
    .unwrap_err();
    assert!(matches!(unknown, CommandError::UnknownCommand(_)));

    let malformed = parse(
        &core.registry,
        &core.objects,
        "DISABLE_NOTIFICATIONS",
        parse_mode::POSITIONAL,
        T0,
    )
    .unwrap_err();
    assert!(matches!(malformed, CommandError::Malformed(_)));
}

#[test]
fn service_argument_consumes_two_tokens() {
    let (core, _log) = fixture_core();
    let parsed = parse(
        &core.registry,
        &core.objects,
        &line("PROCESS_SERVICE_CHECK_RESULT;h1;http;2;it broke"),
        parse_mode::POSITIONAL,
        T0,
    )
    .expect("service plus description bind as one argument");
    let cmd = parsed.command();
    assert_eq!(cmd.str_arg("service").unwrap(), "h1;http");
    assert_eq!(cmd.int_arg("status_code").unwrap(), 2);
    assert_eq!(cmd.str_arg("plugin_output").unwrap(), "it broke");
}

#[test]
fn object_validation_runs_against_the_live_store() {
    let (core, _log) = fixture_core();
    let err = parse(
        &core.registry,
        &core.objects,
        &line("ADD_HOST_COMMENT;no-such-host;1;alice;hello"),
        parse_mode::POSITIONAL,
        T0,
    )
    .unwrap_err();
    assert!(matches!(err, CommandError::ValidationFailure(_)));
}

#[test]
fn kv_syntax_binds_by_argument_name() {
    // the same comment command, fed through the key=value syntax
    let (mut core, _log) = fixture_core();
    process_external_command(
        &mut core,
        "command=ADD_HOST_COMMENT;host_name=h1;persistent=0;author=bob;comment=hi",
        parse_mode::KV,
    )
    .expect("kv command");
    let comment = core.comments.iter().next().unwrap();
    assert_eq!(comment.author, "bob");
    assert_eq!(comment.text, "hi");
    assert!(!comment.persistent);
}

#[test]
fn kv_syntax_requires_the_command_key() {
    let (core, _log) = fixture_core();
    let err = parse(
        &core.registry,
        &core.objects,
        "host_name=h1;persistent=0",
        parse_mode::KV,
        T0,
    )
    .unwrap_err();
    assert!(matches!(err, CommandError::UnknownCommand(_)));
}

#[test]
fn both_modes_fall_through_in_order() {
    // positional first, then kv
    let (core, _log) = fixture_core();
    let parsed = parse(
        &core.registry,
        &core.objects,
        "command=DISABLE_NOTIFICATIONS",
        parse_mode::ANY,
        T0,
    )
    .expect("kv fallback when positional fails");
    assert_eq!(parsed.command().name, "DISABLE_NOTIFICATIONS");

    let err = parse(&core.registry, &core.objects, "gibberish", 0, T0).unwrap_err();
    assert!(matches!(err, CommandError::UnsupportedParseMode(0)));
}

#[test]
fn bool_arguments_validate_their_range() {
    let (core, _log) = fixture_core();
    let err = parse(
        &core.registry,
        &core.objects,
        &line("ADD_HOST_COMMENT;h1;7;alice;hello"),
        parse_mode::POSITIONAL,
        T0,
    )
    .unwrap_err();
    assert!(matches!(err, CommandError::ValidationFailure(_)));
}

#[test]
fn filter_deletion_arguments_fall_back_to_defaults() {
    let (core, _log) = fixture_core();
    let parsed = parse(
        &core.registry,
        &core.objects,
        &line("DEL_DOWNTIME_BY_HOST_NAME;h1"),
        parse_mode::POSITIONAL,
        T0,
    )
    .expect("trailing filters default");
    match parsed {
        Parsed::Builtin(cmd) => {
            assert_eq!(cmd.str_arg("hostname").unwrap(), "h1");
            assert_eq!(cmd.str_arg("service_description").unwrap(), "");
            assert_eq!(cmd.timestamp_arg("downtime_start_time").unwrap(), 0);
        }
        Parsed::Custom(_) => panic!("not a custom command"),
    }
}
