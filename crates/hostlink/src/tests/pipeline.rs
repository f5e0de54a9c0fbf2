//! End-to-end tests over loopback TCP.

use mockall::mock;
use rstest::rstest;

use hostlink_config::Config;

use super::support::{
    exchange, exchange_in_pieces, loopback_config, post, start_default_gateway, start_gateway,
};
use crate::access::{PermissionPrompt, PromptOutcome, StaticPrompt};

mock! {
    Prompt {}
    impl PermissionPrompt for Prompt {
        fn confirm(&mut self, origin: &str) -> PromptOutcome;
    }
}

const EVIL: &str = "http://evil.com";
const EXAMPLE: &str = "http://example.com";

fn example_only() -> Config {
    Config {
        cors_origin_list: vec![EXAMPLE.to_owned()],
        ..loopback_config()
    }
}

#[rstest]
fn batched_calls_reply_with_nested_envelopes() {
    let mut gateway = start_default_gateway();
    let body = r#"{"action":"multi","params":{"actions":[{"action":"version"},{"action":"version"}]},"version":6}"#;
    let reply = exchange(&mut gateway, &post(None, body));
    assert_eq!(reply.status, 200);
    assert_eq!(
        reply.body,
        r#"{"result":[{"result":6,"error":null},{"result":6,"error":null}],"error":null}"#
    );
    assert_eq!(reply.header("Content-Type"), Some("text/json"));
    assert_eq!(reply.header("Content-Length"), Some(reply.body.len().to_string().as_str()));
}

#[rstest]
#[case(r#"{"action":"version","version":4}"#, "6")]
#[case(r#"{"action":"version"}"#, "6")]
#[case(r#"{"action":"version","version":6}"#, r#"{"result":6,"error":null}"#)]
#[case(r#"{"action":"nope","version":4}"#, "null")]
#[case(r#"{"action":"nope","version":6}"#, r#"{"result":null,"error":"unsupported action"}"#)]
fn envelope_shape_follows_version(#[case] body: &str, #[case] expected: &str) {
    let mut gateway = start_default_gateway();
    let reply = exchange(&mut gateway, &post(Some("http://localhost"), body));
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, expected);
}

#[rstest]
#[case(r#"{"action":"findCardsLegacy","version":4,"params":{"query":"deck:x"}}"#, "[1,2,3]")]
#[case(r#"{"action":"findCards","version":6,"params":{"query":"deck:x"}}"#, r#"{"result":[1,2,3],"error":null}"#)]
#[case(r#"{"action":"findCards","version":4,"params":{"query":"deck:x"}}"#, "null")]
#[case(r#"{"action":"findCards","version":6,"params":{"query":""}}"#, r#"{"result":null,"error":"query must not be empty"}"#)]
fn legacy_aliases_resolve_by_version(#[case] body: &str, #[case] expected: &str) {
    let mut gateway = start_default_gateway();
    let reply = exchange(&mut gateway, &post(None, body));
    assert_eq!(reply.body, expected);
}

#[rstest]
fn untrusted_origin_is_forbidden_without_payload() {
    let mut gateway = start_gateway(example_only(), Box::new(StaticPrompt(PromptOutcome::Deny)));
    let reply = exchange(&mut gateway, &post(Some(EVIL), r#"{"action":"deckNames"}"#));
    assert_eq!(reply.status, 403);
    assert!(reply.body.is_empty());
    assert_eq!(reply.header("Access-Control-Allow-Origin"), Some("http://localhost"));
    assert_eq!(reply.header("Access-Control-Allow-Headers"), Some("*"));
}

#[rstest]
fn listed_origin_is_served_and_echoed() {
    let mut gateway = start_gateway(example_only(), Box::new(StaticPrompt(PromptOutcome::Deny)));
    let reply = exchange(
        &mut gateway,
        &post(Some(EXAMPLE), r#"{"action":"deckNames","version":6}"#),
    );
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("Access-Control-Allow-Origin"), Some(EXAMPLE));
    assert_eq!(reply.body, r#"{"result":["Default","Japanese"],"error":null}"#);
}

#[rstest]
fn empty_body_returns_banner() {
    let mut gateway = start_default_gateway();
    let reply = exchange(&mut gateway, b"GET / HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, "hostlink v.6");
    assert_eq!(reply.header("Content-Type"), Some("text/plain"));
}

#[rstest]
fn preflight_grants_private_network_to_trusted_origins() {
    let mut gateway = start_gateway(example_only(), Box::new(StaticPrompt(PromptOutcome::Deny)));
    let frame = |origin: &str| {
        format!(
            "OPTIONS / HTTP/1.1\r\nOrigin: {origin}\r\nAccess-Control-Request-Private-Network: true\r\n\r\n"
        )
    };

    let trusted = exchange(&mut gateway, frame(EXAMPLE).as_bytes());
    assert_eq!(trusted.status, 200);
    assert!(trusted.body.is_empty());
    assert_eq!(trusted.header("Access-Control-Allow-Origin"), Some(EXAMPLE));
    assert_eq!(trusted.header("Access-Control-Allow-Private-Network"), Some("true"));

    let untrusted = exchange(&mut gateway, frame(EVIL).as_bytes());
    assert_eq!(untrusted.status, 200);
    assert_eq!(untrusted.header("Access-Control-Allow-Origin"), Some("http://localhost"));
    assert_eq!(untrusted.header("Access-Control-Allow-Private-Network"), None);
}

#[rstest]
fn malformed_json_is_reported_to_trusted_callers() {
    let mut gateway = start_default_gateway();
    let reply = exchange(&mut gateway, &post(None, "{\"action\":"));
    assert_eq!(reply.status, 200);
    let value: serde_json::Value = serde_json::from_str(&reply.body).expect("json reply");
    assert!(value["result"].is_null());
    assert!(value["error"].as_str().is_some_and(|error| !error.is_empty()));
}

#[rstest]
fn malformed_json_from_untrusted_origin_is_forbidden() {
    let mut gateway = start_gateway(example_only(), Box::new(StaticPrompt(PromptOutcome::Deny)));
    let reply = exchange(&mut gateway, &post(Some(EVIL), "not json"));
    assert_eq!(reply.status, 403);
}

#[rstest]
#[case(None, 400)]
#[case(Some(EVIL), 403)]
fn broken_frames_follow_origin_trust(#[case] origin: Option<&str>, #[case] status: u16) {
    let mut gateway = start_gateway(example_only(), Box::new(StaticPrompt(PromptOutcome::Deny)));
    let origin_line = origin.map(|origin| format!("Origin: {origin}\r\n")).unwrap_or_default();
    let frame = format!("POST / HTTP/1.1\r\n{origin_line}Content-Length: twelve\r\n\r\n");
    let reply = exchange(&mut gateway, frame.as_bytes());
    assert_eq!(reply.status, status);
    if status == 400 {
        assert_eq!(
            reply.body,
            r#"{"result":null,"error":"invalid content length: twelve"}"#
        );
    }
}

#[rstest]
fn oversized_declaration_is_refused_before_the_body() {
    let config = Config {
        max_request_bytes: 1024,
        ..loopback_config()
    };
    let mut gateway = start_gateway(config, Box::new(StaticPrompt(PromptOutcome::Deny)));
    let head = "POST / HTTP/1.1\r\nContent-Length: 1000000\r\n\r\n";
    let reply = exchange(&mut gateway, head.as_bytes());
    assert_eq!(reply.status, 400);
    let expected = format!(
        r#"{{"result":null,"error":"request of {} bytes exceeds the 1024 byte limit"}}"#,
        head.len() + 1_000_000
    );
    assert_eq!(reply.body, expected);
}

#[rstest]
#[case(r#"{"action":"version","version":6}"#, r#"{"result":null,"error":"valid api key must be provided"}"#)]
#[case(r#"{"action":"version","version":6,"key":"wrong"}"#, r#"{"result":null,"error":"valid api key must be provided"}"#)]
#[case(r#"{"action":"version","version":6,"key":"s3cret"}"#, r#"{"result":6,"error":null}"#)]
fn shared_secret_is_enforced(#[case] body: &str, #[case] expected: &str) {
    let config = Config {
        api_key: Some("s3cret".to_owned()),
        ..loopback_config()
    };
    let mut gateway = start_gateway(config, Box::new(StaticPrompt(PromptOutcome::Deny)));
    let reply = exchange(&mut gateway, &post(None, body));
    assert_eq!(reply.body, expected);
}

#[rstest]
fn ignored_origin_is_denied_without_prompting() {
    let mut prompt = MockPrompt::new();
    prompt.expect_confirm().never();
    let config = Config {
        ignore_origin_list: vec![EVIL.to_owned()],
        ..example_only()
    };
    let mut gateway = start_gateway(config, Box::new(prompt));

    let reply = exchange(
        &mut gateway,
        &post(Some(EVIL), r#"{"action":"requestPermission","version":6}"#),
    );
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, r#"{"result":{"permission":"denied"},"error":null}"#);
    assert_eq!(reply.header("Access-Control-Allow-Origin"), Some(EVIL));
}

#[rstest]
fn granted_origin_joins_the_allow_list() {
    let mut prompt = MockPrompt::new();
    prompt
        .expect_confirm()
        .times(1)
        .return_const(PromptOutcome::Allow);
    let mut gateway = start_gateway(example_only(), Box::new(prompt));

    let before = exchange(&mut gateway, &post(Some(EVIL), r#"{"action":"deckNames"}"#));
    assert_eq!(before.status, 403);

    let grant = exchange(
        &mut gateway,
        &post(Some(EVIL), r#"{"action":"requestPermission","version":6}"#),
    );
    assert_eq!(
        grant.body,
        r#"{"result":{"permission":"granted","requireApikey":false,"version":6},"error":null}"#
    );
    assert!(gateway.handler().dispatcher().store().is_allowed(EVIL));

    let after = exchange(&mut gateway, &post(Some(EVIL), r#"{"action":"deckNames","version":6}"#));
    assert_eq!(after.status, 200);
    assert_eq!(after.header("Access-Control-Allow-Origin"), Some(EVIL));
    assert_eq!(after.body, r#"{"result":["Default","Japanese"],"error":null}"#);
}

#[rstest]
#[case(2)]
#[case(7)]
#[case(64)]
fn fragmented_requests_are_reassembled_across_ticks(#[case] pieces: usize) {
    let mut gateway = start_default_gateway();
    let body = r#"{"action":"version","version":6}"#;
    let reply = exchange_in_pieces(&mut gateway, &post(None, body), pieces);
    assert_eq!(reply.body, r#"{"result":6,"error":null}"#);
}

#[rstest]
fn stalled_client_does_not_block_others() {
    let mut gateway = start_default_gateway();
    let stalled = std::net::TcpStream::connect(gateway.local_addr()).expect("connect stalled");
    let reply = exchange(&mut gateway, &post(None, r#"{"action":"version","version":6}"#));
    assert_eq!(reply.body, r#"{"result":6,"error":null}"#);
    assert_eq!(gateway.open_connections(), 1);
    drop(stalled);
}

#[rstest]
fn shutdown_closes_listener() {
    let mut gateway = start_default_gateway();
    let _client = std::net::TcpStream::connect(gateway.local_addr()).expect("connect client");
    gateway.advance();
    gateway.shutdown();
    assert!(!gateway.is_listening());
    assert_eq!(gateway.open_connections(), 0);
}
