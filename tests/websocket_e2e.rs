//! WebSocket adapter E2E suite.
//!
//! Test Coverage:
//! - Handshake: RFC 6455 test vector, header parsing, 426 rejection
//! - Session: upgrade followed by pipelined frames, plain passthrough
//! - Decoder: fragmentation, control frames, resumption from packed state
//! - Multiplexer: markup splitting, header length encodings, truncation
//! - Markup producers feeding the multiplexer

#![allow(missing_docs)]

#[macro_use]
mod common;

use bytes::BytesMut;
use common::*;
use std::sync::Arc;
use wsbridge::markup::{markup_binary, markup_text, markup_websocket, MarkupError, TAG_END, TAG_START};
use wsbridge::websocket::{
    compute_accept_key, put_header, ConnectionState, DecodePhase, DecodeState, FrameDecoder,
    HandshakeStep, Multiplexer, Negotiator, Opcode, Permissive, ProtocolMode, REJECT_RESPONSE,
};
use wsbridge::{to_websocket_frame, Channel, ErrorKind, WsConfig, WsSession};

const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
const ACCEPT: &str = "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=";
const MASK: [u8; 4] = [0xA1, 0x00, 0x5C, 0xFF];

fn init_test(test_name: &str) {
    init_test_logging();
    test_phase!(test_name);
}

// ============================================================================
// HANDSHAKE
// ============================================================================

#[test]
fn e2e_ws_001_accept_token_vector() {
    init_test("e2e_ws_001_accept_token_vector");
    let accept = compute_accept_key(KEY);
    assert_with_log!(accept == ACCEPT, "accept token", ACCEPT, accept);
    test_complete!("e2e_ws_001_accept_token_vector");
}

#[test]
fn e2e_ws_002_handshake_switches_to_framed() {
    init_test("e2e_ws_002_handshake_switches_to_framed");
    let negotiator = Negotiator::new();
    let mut conn = ConnectionState::new();

    test_section!("request line");
    negotiator
        .begin(&mut conn, b"GET /wsclient HTTP/1.1")
        .expect("begin");
    assert_eq!(conn.mode(), ProtocolMode::AwaitingUpgrade);

    test_section!("headers");
    for line in [
        &b"Host: localhost:4201\r"[..],
        b"sec-websocket-key:   dGhlIHNhbXBsZSBub25jZQ==  ",
        b"Sec-WebSocket-Version: 13",
    ] {
        let step = negotiator.consume_header_line(&mut conn, line).expect("header");
        assert_eq!(step, HandshakeStep::Continue);
    }

    test_section!("blank line");
    let step = negotiator.consume_header_line(&mut conn, b"\r").expect("finish");
    let HandshakeStep::Accepted { response } = step else {
        panic!("expected 101, got {step:?}");
    };
    let expected = format!(
        "HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Accept: {ACCEPT}\r\n\r\n"
    );
    assert_eq!(response, expected.as_bytes());
    assert!(conn.is_framed());
    assert!(conn.handshake_key().is_none());
    assert_eq!(conn.decode_state().phase(), DecodePhase::Opcode);

    test_complete!("e2e_ws_002_handshake_switches_to_framed");
}

#[test]
fn e2e_ws_003_bad_key_rejected() {
    init_test("e2e_ws_003_bad_key_rejected");
    let negotiator = Negotiator::new();
    let mut conn = ConnectionState::new();
    negotiator.begin(&mut conn, b"GET /wsclient HTTP/1.1").expect("begin");
    negotiator
        .consume_header_line(&mut conn, b"Sec-WebSocket-Key: short")
        .expect("header");
    let step = negotiator.consume_header_line(&mut conn, b"").expect("finish");
    assert_eq!(step, HandshakeStep::Rejected { response: REJECT_RESPONSE });
    assert_eq!(conn.mode(), ProtocolMode::Rejected);
    test_complete!("e2e_ws_003_bad_key_rejected");
}

// ============================================================================
// SESSION
// ============================================================================

#[test]
fn e2e_ws_004_session_round_trip() {
    init_test("e2e_ws_004_session_round_trip");
    let mut session = WsSession::new(&WsConfig::default()).expect("session");

    test_section!("upgrade with pipelined frames");
    let mut data = format!("GET /wsclient HTTP/1.1\r\nSec-WebSocket-Key: {KEY}\r\n\r\n").into_bytes();
    data.extend(client_text(b't', b"connect guest", MASK));
    data.extend(client_text(b'j', b"{\"ignored\":true}", MASK));
    let received = session.receive(&data).expect("receive");
    assert_eq!(&received.input[..], b"connect guest");
    assert_eq!(received.messages_completed, 1);
    assert!(session.take_outbound().starts_with(b"HTTP/1.1 101 Switching Protocols\r\n"));

    test_section!("frames split mid-header");
    let frame = client_text(b't', b"WHO", MASK);
    let first = session.receive(&frame[..3]).expect("part 1");
    assert!(first.input.is_empty());
    let second = session.receive(&frame[3..]).expect("part 2");
    assert_eq!(&second.input[..], b"WHO");

    test_section!("auto-multiplexed output");
    session.send_output(b"Hi\x02wj{}\x03!", Channel::AUTO);
    let frames = parse_server_frames(&session.take_outbound());
    assert_eq!(
        frames,
        vec![
            (0x1, b"tHi".to_vec()),
            (0x1, b"j{}".to_vec()),
            (0x1, b"t!".to_vec()),
        ]
    );

    test_complete!("e2e_ws_004_session_round_trip");
}

#[test]
fn e2e_ws_005_strict_session_rejects_unknown_path() {
    init_test("e2e_ws_005_strict_session_rejects_unknown_path");
    let mut session = WsSession::new(&WsConfig::new().strict(true)).expect("session");
    let received = session
        .receive(b"GET /wsclient HTTP/1.1 \r\n")
        .expect("receive");
    assert_eq!(&received.input[..], b"GET /wsclient HTTP/1.1 \n");
    assert_eq!(session.mode(), ProtocolMode::Plain);

    let mut permissive = WsSession::new(&WsConfig::default()).expect("session");
    permissive
        .receive(b"GET /wsclient HTTP/1.1 \r\n")
        .expect("receive");
    assert_eq!(permissive.mode(), ProtocolMode::AwaitingUpgrade);
    test_complete!("e2e_ws_005_strict_session_rejects_unknown_path");
}

#[test]
fn e2e_ws_006_strict_session_closes_on_reserved_opcode() {
    init_test("e2e_ws_006_strict_session_closes_on_reserved_opcode");
    let mut session = WsSession::new(&WsConfig::new().strict(true)).expect("session");
    session
        .receive(format!("GET /wsclient HTTP/1.1\r\nSec-WebSocket-Key: {KEY}\r\n\r\n").as_bytes())
        .expect("upgrade");
    let err = session
        .receive(&client_frame(0x83, b"x", MASK))
        .expect_err("reserved opcode");
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(err.closes_connection());
    assert!(session.is_closed());
    test_complete!("e2e_ws_006_strict_session_closes_on_reserved_opcode");
}

// ============================================================================
// DECODER
// ============================================================================

#[test]
fn e2e_ws_007_fragmented_message_across_persisted_state() {
    init_test("e2e_ws_007_fragmented_message_across_persisted_state");
    let mut bytes = client_frame(0x01, b"tHello, ", MASK);
    bytes.extend(client_frame(0x8A, b"", MASK));
    bytes.extend(client_frame(0x80, b"world", [1, 2, 3, 4]));

    let mut out = BytesMut::new();
    let mut state = DecodeState::new();
    let mut completed = 0;
    for chunk in bytes.chunks(5) {
        // Park the state between reads the way an idle connection would.
        let mut decoder = FrameDecoder::from_state(state, Arc::new(Permissive));
        completed += decoder.feed(chunk, &mut out).expect("decode").messages_completed;
        state = DecodeState::from_bytes(&decoder.into_state().to_bytes()).expect("restore");
    }
    assert_eq!(&out[..], b"Hello, world");
    assert_eq!(completed, 1);
    assert!(state.is_idle());
    test_complete!("e2e_ws_007_fragmented_message_across_persisted_state");
}

// ============================================================================
// MULTIPLEXER
// ============================================================================

#[test]
fn e2e_ws_008_header_length_encodings() {
    init_test("e2e_ws_008_header_length_encodings");
    for (len, header) in [(0usize, 2usize), (125, 2), (126, 4), (65_535, 4), (65_536, 10)] {
        let mut dst = BytesMut::new();
        put_header(&mut dst, Opcode::Binary, len);
        assert_with_log!(dst.len() == header, "header size", header, dst.len());
        assert_eq!(dst[0], 0x82);
        match header {
            2 => assert_eq!(usize::from(dst[1]), len),
            4 => {
                assert_eq!(dst[1], 126);
                assert_eq!(usize::from(u16::from_be_bytes([dst[2], dst[3]])), len);
            }
            _ => {
                assert_eq!(dst[1], 127);
                assert_eq!(&dst[2..10], &(len as u64).to_be_bytes());
            }
        }
    }
    test_complete!("e2e_ws_008_header_length_encodings");
}

#[test]
fn e2e_ws_009_auto_multiplex_scenario() {
    init_test("e2e_ws_009_auto_multiplex_scenario");
    let mut input = b"A".to_vec();
    let mut tagged = BytesMut::new();
    markup_text(&mut tagged, 64, b"B", None, Channel::Json).expect("markup");
    input.extend_from_slice(&tagged);
    input.push(b'C');

    let frames = parse_server_frames(&to_websocket_frame(&input, Channel::AUTO));
    assert_eq!(
        frames,
        vec![
            (0x1, b"tA".to_vec()),
            (0x1, b"jB".to_vec()),
            (0x1, b"tC".to_vec()),
        ]
    );
    test_complete!("e2e_ws_009_auto_multiplex_scenario");
}

#[test]
fn e2e_ws_010_alt_text_hidden_from_websocket_clients() {
    init_test("e2e_ws_010_alt_text_hidden_from_websocket_clients");
    let mut out = BytesMut::new();
    markup_websocket(&mut out, 128, b"<b>hi</b>", Some(b"hi"), Channel::Html).expect("markup");
    markup_binary(&mut out, 128, &[0x00, TAG_START, TAG_END, 0xFF], None).expect("binary");
    out.extend_from_slice(b"done");

    let frames = parse_server_frames(&to_websocket_frame(&out, Channel::AUTO));
    assert_eq!(
        frames,
        vec![
            (0x1, b"h<b>hi</b>".to_vec()),
            (0x2, vec![0x00, TAG_START, TAG_END, 0xFF]),
            (0x1, b"tdone".to_vec()),
        ]
    );
    test_complete!("e2e_ws_010_alt_text_hidden_from_websocket_clients");
}

#[test]
fn e2e_ws_011_markup_rejections() {
    init_test("e2e_ws_011_markup_rejections");
    let mut out = BytesMut::new();
    assert_eq!(
        markup_text(&mut out, 64, b"bad\x03", None, Channel::Text),
        Err(MarkupError::NestedTag)
    );
    let err = markup_websocket(&mut out, 5, b"toolong", None, Channel::Json).unwrap_err();
    assert!(matches!(err, MarkupError::BufferFull { .. }));
    assert!(out.is_empty());
    test_complete!("e2e_ws_011_markup_rejections");
}

#[test]
fn e2e_ws_012_output_bounded_by_capacity() {
    init_test("e2e_ws_012_output_bounded_by_capacity");
    let mux = Multiplexer::new().output_capacity(64);
    let mut input = Vec::new();
    for _ in 0..10 {
        input.extend_from_slice(b"\x02wjxxxxxxxxxxxxxxxxxxxx\x03");
    }
    let out = mux.emit_auto(&input);
    assert!(out.len() <= 64);
    let frames = parse_server_frames(&out);
    // Two full frames of 23 bytes, then one cut to 64 - 46 - 11 = 7 bytes.
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[2].1.len(), 8);
    test_complete!("e2e_ws_012_output_bounded_by_capacity");
}
