//! Tests for the incremental stream decoder.

use claude_bridge::cli::{DecodedEvent, StreamDecoder, StreamId};
use serde_json::json;

const TRANSCRIPT: &str = concat!(
    r#"{"type":"system","subtype":"init","session_id":"s-1"}"#,
    "\n",
    r#"{"type":"assistant","message":{"content":[{"type":"text","text":"héllo → wörld"}]}}"#,
    "\n",
    "\n",
    "Warning: not json\n",
    r#"{"type":"result","session_id":"s-1","total_cost_usd":0.01}"#,
    "\n",
);

fn decode_in_chunks(bytes: &[u8], split: usize) -> Vec<DecodedEvent> {
    let mut decoder = StreamDecoder::new();
    let (head, tail) = bytes.split_at(split);
    let mut events = decoder.feed(StreamId::Stdout, head);
    events.extend(decoder.feed(StreamId::Stdout, tail));
    events.extend(decoder.flush(StreamId::Stdout));
    events
}

#[test]
fn decoding_is_independent_of_chunk_boundaries() {
    let bytes = TRANSCRIPT.as_bytes();
    let whole = decode_in_chunks(bytes, bytes.len());
    assert_eq!(whole.len(), 4);

    for split in 0..=bytes.len() {
        assert_eq!(decode_in_chunks(bytes, split), whole, "split at {split}");
    }
}

#[test]
fn byte_at_a_time_matches_whole() {
    let bytes = TRANSCRIPT.as_bytes();
    let mut decoder = StreamDecoder::new();
    let mut events = Vec::new();
    for byte in bytes {
        events.extend(decoder.feed(StreamId::Stdout, std::slice::from_ref(byte)));
    }
    events.extend(decoder.flush(StreamId::Stdout));
    assert_eq!(events, decode_in_chunks(bytes, 0));
}

#[test]
fn malformed_line_becomes_text_and_next_line_still_decodes() {
    let mut decoder = StreamDecoder::new();
    let events = decoder.feed(StreamId::Stdout, b"{\"type\": broken\n{\"type\":\"ok\"}\n");
    assert_eq!(
        events,
        vec![
            DecodedEvent::Text("{\"type\": broken".to_string()),
            DecodedEvent::Json(json!({"type": "ok"})),
        ]
    );
}

#[test]
fn blank_lines_are_dropped() {
    let mut decoder = StreamDecoder::new();
    assert!(decoder.feed(StreamId::Stdout, b"\n   \n\t\n").is_empty());
    assert!(decoder.pending(StreamId::Stdout).is_empty());
}

#[test]
fn trailing_partial_line_is_emitted_once_by_flush() {
    let mut decoder = StreamDecoder::new();
    assert!(decoder
        .feed(StreamId::Stdout, br#"{"type":"result","session_id":"x"}"#)
        .is_empty());

    let flushed = decoder.flush(StreamId::Stdout);
    assert_eq!(
        flushed,
        Some(DecodedEvent::Json(
            json!({"type": "result", "session_id": "x"})
        ))
    );
    assert_eq!(decoder.flush(StreamId::Stdout), None);
}

#[test]
fn flush_of_blank_remainder_is_none() {
    let mut decoder = StreamDecoder::new();
    decoder.feed(StreamId::Stderr, b"line\n   ");
    assert_eq!(decoder.flush(StreamId::Stderr), None);
    assert!(decoder.pending(StreamId::Stderr).is_empty());
}

#[test]
fn stdout_and_stderr_do_not_mix() {
    let mut decoder = StreamDecoder::new();
    assert!(decoder.feed(StreamId::Stdout, b"{\"a\":").is_empty());
    assert!(decoder.feed(StreamId::Stderr, b"err ").is_empty());
    assert_eq!(
        decoder.feed(StreamId::Stdout, b"1}\n"),
        vec![DecodedEvent::Json(json!({"a": 1}))]
    );
    assert_eq!(
        decoder.feed(StreamId::Stderr, b"text\n"),
        vec![DecodedEvent::Text("err text".to_string())]
    );
}

#[test]
fn as_json_only_for_json_lines() {
    assert!(DecodedEvent::from_line("{}").as_json().is_some());
    assert!(DecodedEvent::from_line("plain").as_json().is_none());
}

#[test]
fn object_split_across_three_chunks() {
    let mut decoder = StreamDecoder::new();
    let mut events = decoder.feed(StreamId::Stdout, br#"{"a":"#);
    events.extend(decoder.feed(StreamId::Stdout, b"1}\n{\"b\":2"));
    events.extend(decoder.feed(StreamId::Stdout, b"}\n"));
    assert_eq!(
        events,
        vec![
            DecodedEvent::Json(json!({"a": 1})),
            DecodedEvent::Json(json!({"b": 2})),
        ]
    );
}

#[test]
fn warning_line_keeps_exact_content() {
    let mut decoder = StreamDecoder::new();
    let events = decoder.feed(StreamId::Stderr, b"Warning: deprecated flag\n");
    assert_eq!(
        events,
        vec![DecodedEvent::Text("Warning: deprecated flag".to_string())]
    );
}
