//! Unit tests for notification parsing.

use rstest::rstest;

use super::*;

fn state(raw: &[u8]) -> StateEvent {
    match upgrade(raw) {
        Event::State(event) => event,
        other => panic!("expected a state event, got {other:?}"),
    }
}

fn byte_count(raw: &[u8]) -> ByteCountEvent {
    match upgrade(raw) {
        Event::ByteCount(event) => event,
        other => panic!("expected a byte count event, got {other:?}"),
    }
}

#[rstest]
#[case::empty(b"")]
#[case::bare_word(b"HOLD")]
#[case::spaces(b"not an openvpn line")]
#[case::comma_only(b"STATE,1,CONNECTED")]
fn payloads_without_separator_are_malformed(#[case] raw: &[u8]) {
    let event = upgrade(raw);
    let Event::Malformed(malformed) = &event else {
        panic!("expected a malformed event, got {event:?}");
    };
    assert_eq!(malformed.raw(), raw);
    let rendered = event.to_string();
    let original = std::str::from_utf8(raw).expect("test input is utf8");
    assert!(
        rendered.contains(original),
        "rendering {rendered:?} should contain {original:?}"
    );
    assert_eq!(event.keyword(), None);
}

#[rstest]
#[case::info(b"INFO:OpenVPN Management Interface Version 3", "INFO", "OpenVPN Management Interface Version 3")]
#[case::client(b"CLIENT:CONNECT,0,1", "CLIENT", "CONNECT,0,1")]
#[case::empty_body(b"NEED-OK:", "NEED-OK", "")]
#[case::lowercase_known(b"state:1,CONNECTED", "state", "1,CONNECTED")]
fn unknown_keywords_preserve_keyword_and_body(
    #[case] raw: &[u8],
    #[case] keyword: &str,
    #[case] body: &str,
) {
    let event = upgrade(raw);
    let Event::Unknown(unknown) = &event else {
        panic!("expected an unknown event, got {event:?}");
    };
    assert_eq!(unknown.keyword(), keyword);
    assert_eq!(unknown.body(), body);
    assert_eq!(event.to_string(), format!("{keyword}: {body}"));
}

#[rstest]
fn connected_state_exposes_remote_address() {
    let event = state(b"STATE:1,CONNECTED,,10.8.0.1,203.0.113.5");
    assert_eq!(event.raw_timestamp(), "1");
    assert_eq!(event.new_state(), "CONNECTED");
    assert_eq!(event.description(), "");
    assert_eq!(event.local_tunnel_addr(), "10.8.0.1");
    assert_eq!(event.remote_addr(), "203.0.113.5");
    assert_eq!(event.to_string(), "CONNECTED: 203.0.113.5");
}

#[rstest]
fn extended_state_reads_local_address_from_ninth_field() {
    let event = state(b"STATE:1618000000,CONNECTED,SUCCESS,10.8.0.6,198.51.100.7,1194,,,fd00::6");
    assert_eq!(event.local_tunnel_addr(), "fd00::6");
    assert_eq!(event.remote_addr(), "198.51.100.7");
}

#[rstest]
fn assign_ip_state_renders_local_address() {
    let event = state(b"STATE:1618000000,ASSIGN_IP,,10.8.0.6,,,,");
    assert_eq!(event.local_tunnel_addr(), "10.8.0.6");
    assert_eq!(event.to_string(), "ASSIGN_IP: 10.8.0.6");
}

#[rstest]
#[case::with_description(b"STATE:1,RECONNECTING,ping-restart,,", "RECONNECTING: ping-restart")]
#[case::without_description(b"STATE:1,WAIT,,,", "WAIT")]
#[case::truncated(b"STATE:1,AUTH", "AUTH")]
fn other_states_render_description(#[case] raw: &[u8], #[case] expected: &str) {
    assert_eq!(state(raw).to_string(), expected);
}

#[rstest]
fn short_state_body_reads_missing_fields_as_empty() {
    let event = state(b"STATE:");
    assert_eq!(event.raw_timestamp(), "");
    assert_eq!(event.new_state(), "");
    assert_eq!(event.local_tunnel_addr(), "");
    assert_eq!(event.remote_addr(), "");
}

#[rstest]
fn byte_count_has_no_client() {
    let event = byte_count(b"BYTECOUNT:100,200");
    assert_eq!(event.client_id(), None);
    assert_eq!(event.bytes_in(), 100);
    assert_eq!(event.bytes_out(), 200);
    assert_eq!(event.to_string(), "100 in, 200 out");
}

#[rstest]
fn client_byte_count_carries_client_id() {
    let event = byte_count(b"BYTECOUNT_CLI:7,100,200");
    assert_eq!(event.client_id(), Some("7"));
    assert_eq!(event.bytes_in(), 100);
    assert_eq!(event.bytes_out(), 200);
    assert_eq!(event.to_string(), "Client 7: 100 in, 200 out");
    assert_eq!(Event::ByteCount(event).keyword(), Some("BYTECOUNT_CLI"));
}

#[rstest]
#[case::missing_out(b"BYTECOUNT:100", 100, 0)]
#[case::garbage(b"BYTECOUNT:lots,-3", 0, 0)]
#[case::empty(b"BYTECOUNT:", 0, 0)]
fn unparsable_counters_read_as_zero(#[case] raw: &[u8], #[case] bytes_in: u64, #[case] bytes_out: u64) {
    let event = byte_count(raw);
    assert_eq!(event.bytes_in(), bytes_in);
    assert_eq!(event.bytes_out(), bytes_out);
}

#[rstest]
fn echo_splits_on_first_separator_only() {
    let event = upgrade(b"ECHO:42,hello,world");
    let Event::Echo(echo) = &event else {
        panic!("expected an echo event, got {event:?}");
    };
    assert_eq!(echo.raw_timestamp(), "42");
    assert_eq!(echo.message(), "hello,world");
    assert_eq!(event.to_string(), "ECHO: hello,world");
}

#[rstest]
fn echo_without_separator_is_empty() {
    let Event::Echo(echo) = upgrade(b"ECHO:no-timestamp") else {
        panic!("expected an echo event");
    };
    assert_eq!(echo.raw_timestamp(), "");
    assert_eq!(echo.message(), "");
    assert_eq!(echo.body(), "no-timestamp");
}

#[rstest]
#[case::hold(b"HOLD:Waiting for hold release:0", "Waiting for hold release:0")]
#[case::password(b"PASSWORD:Need 'Auth' username/password", "PASSWORD: Need 'Auth' username/password")]
#[case::fatal(b"FATAL:cannot open TUN device", "FATAL: cannot open TUN device")]
fn opaque_events_render_fixed_templates(#[case] raw: &[u8], #[case] expected: &str) {
    assert_eq!(upgrade(raw).to_string(), expected);
}

#[rstest]
fn keyword_splits_at_first_colon() {
    let Event::Hold(hold) = upgrade(b"HOLD:a:b:c") else {
        panic!("expected a hold event");
    };
    assert_eq!(hold.body(), "a:b:c");
}

#[rstest]
fn accessors_are_idempotent() {
    let event = state(b"STATE:1,CONNECTED,SUCCESS,10.8.0.1,203.0.113.5");
    let first = (
        event.raw_timestamp().to_owned(),
        event.new_state().to_owned(),
        event.local_tunnel_addr().to_owned(),
        event.remote_addr().to_owned(),
        event.to_string(),
    );
    let second = (
        event.raw_timestamp().to_owned(),
        event.new_state().to_owned(),
        event.local_tunnel_addr().to_owned(),
        event.remote_addr().to_owned(),
        event.to_string(),
    );
    assert_eq!(first, second);

    let counts = byte_count(b"BYTECOUNT_CLI:3,1,2");
    assert_eq!(counts.bytes_in(), counts.bytes_in());
    assert_eq!(counts.client_id(), counts.client_id());
}

#[rstest]
fn invalid_utf8_never_panics() {
    let event = upgrade(b"STATE:\xff\xfe,CONNECTED");
    assert!(matches!(event, Event::State(_)));
    let malformed = upgrade(b"\xff\xfe");
    assert_eq!(
        malformed,
        Event::Malformed(MalformedEvent::new(b"\xff\xfe"))
    );
}

#[rstest]
fn unknown_events_keep_the_received_bytes() {
    let Event::Unknown(unknown) = upgrade(b"X\xff:b\xfe") else {
        panic!("expected an unknown event");
    };
    assert_eq!(unknown.raw_keyword(), b"X\xff");
    assert_eq!(unknown.raw_body(), b"b\xfe");
    assert_eq!(unknown.keyword(), "X\u{fffd}");
    assert_eq!(unknown.body(), "b\u{fffd}");
}

#[rstest]
fn malformed_events_keep_the_received_bytes() {
    let Event::Malformed(malformed) = upgrade(b"ab\xffcd") else {
        panic!("expected a malformed event");
    };
    assert_eq!(malformed.raw(), b"ab\xffcd");
    assert_eq!(malformed.to_string(), "Malformed Event \"ab\u{fffd}cd\"");
}
