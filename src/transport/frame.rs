//! Server-sent events framing
//!
//! Each event is written as an optional `event:` line, one `data:` line per
//! body line, and a blank-line terminator. Comment lines (starting with `:`)
//! carry keep-alives and are ignored by conforming clients.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::event::Event;

/// Encode an event as one SSE frame
pub fn encode_event(event: &Event) -> Bytes {
    let data = event.data();
    let mut buf = BytesMut::with_capacity(data.len() + 16);

    if let Some(event_type) = event.event_type() {
        buf.put_slice(b"event: ");
        put_single_line(&mut buf, event_type.as_bytes());
        buf.put_u8(b'\n');
    }

    for line in data.split(|&b| b == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        buf.put_slice(b"data: ");
        buf.put_slice(line);
        buf.put_u8(b'\n');
    }

    buf.put_u8(b'\n');
    buf.freeze()
}

/// Encode a comment frame
pub fn encode_comment(text: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(text.len() + 4);
    buf.put_slice(b": ");
    put_single_line(&mut buf, text.as_bytes());
    buf.put_slice(b"\n\n");
    buf.freeze()
}

/// First bytes written on a new stream
///
/// Flushes the response headers to the client right away and, if set, tells
/// it how long to wait before reconnecting.
pub fn encode_preamble(retry: Option<Duration>) -> Bytes {
    let mut buf = BytesMut::with_capacity(32);
    if let Some(retry) = retry {
        buf.put_slice(format!("retry: {}\n", retry.as_millis()).as_bytes());
    }
    buf.put_slice(b": connected\n\n");
    buf.freeze()
}

// Field values must not contain line breaks
fn put_single_line(buf: &mut BytesMut, value: &[u8]) {
    for &b in value {
        if b != b'\n' && b != b'\r' {
            buf.put_u8(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untyped_event() {
        let frame = encode_event(&Event::new("news", "hello"));
        assert_eq!(frame.as_ref(), b"data: hello\n\n");
    }

    #[test]
    fn test_typed_event() {
        let frame = encode_event(&Event::new("news", "hello").with_type("headline"));
        assert_eq!(frame.as_ref(), b"event: headline\ndata: hello\n\n");
    }

    #[test]
    fn test_multiline_body() {
        let frame = encode_event(&Event::new("news", "one\r\ntwo\nthree"));
        assert_eq!(frame.as_ref(), b"data: one\ndata: two\ndata: three\n\n");
    }

    #[test]
    fn test_empty_body() {
        let frame = encode_event(&Event::new("news", ""));
        assert_eq!(frame.as_ref(), b"data: \n\n");
    }

    #[test]
    fn test_event_type_line_breaks_stripped() {
        let frame = encode_event(&Event::new("news", "x").with_type("a\nb"));
        assert_eq!(frame.as_ref(), b"event: ab\ndata: x\n\n");
    }

    #[test]
    fn test_comment() {
        assert_eq!(encode_comment("ping").as_ref(), b": ping\n\n");
    }

    #[test]
    fn test_preamble() {
        assert_eq!(encode_preamble(None).as_ref(), b": connected\n\n");
        assert_eq!(
            encode_preamble(Some(Duration::from_secs(3))).as_ref(),
            b"retry: 3000\n: connected\n\n"
        );
    }
}
