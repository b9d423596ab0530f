//! Assembly of the bytes sent after `DATA`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::{Encoding, Message};
use crate::error::{Category, Origin, Result};

/// Base64 output line length (RFC 2045).
const BASE64_LINE: usize = 76;

/// Builds the message content for one rendering of the parts.
///
/// Library headers (`Date:`, `x-virtual-mta:`, `x-job:`) come first and join
/// the caller's header block. With [`Encoding::Base64`] the caller's body,
/// everything after the first empty line, is base64-encoded.
pub(crate) fn compose(message: &Message, rendered: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(rendered.len() + 256);

    for (name, value) in message.headers() {
        push_header(&mut out, name, value);
    }
    if let Some(vmta) = message.vmta() {
        push_header(&mut out, "x-virtual-mta", vmta);
    }
    if let Some(job_id) = message.job_id() {
        push_header(&mut out, "x-job", job_id);
    }

    if message.encoding() == Some(Encoding::Base64) {
        let (headers, body) = split_header_block(rendered);
        out.extend_from_slice(headers);
        push_header(&mut out, "Content-Transfer-Encoding", "base64");
        out.extend_from_slice(b"\r\n");

        let encoded = STANDARD.encode(body);
        for line in encoded.as_bytes().chunks(BASE64_LINE) {
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    } else {
        out.extend_from_slice(rendered);
    }

    if message.encoding() == Some(Encoding::SevenBit) && !out.is_ascii() {
        return Err(Origin::Message.error(
            Category::IllegalArgument,
            "message contains 8-bit data but the encoding is 7bit",
        ));
    }

    Ok(out)
}

fn push_header(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// Splits rendered data at the first empty line.
///
/// The header half keeps its final line ending. Data without an empty line
/// is all body.
fn split_header_block(data: &[u8]) -> (&[u8], &[u8]) {
    if let Some(rest) = data.strip_prefix(b"\r\n") {
        return (&data[..0], rest);
    }
    if let Some(rest) = data.strip_prefix(b"\n") {
        return (&data[..0], rest);
    }

    let crlf = find(data, b"\r\n\r\n").map(|pos| (pos + 2, pos + 4));
    let lf = find(data, b"\n\n").map(|pos| (pos + 1, pos + 2));

    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match split {
        Some((header_end, body_start)) => (&data[..header_end], &data[body_start..]),
        None => (&data[..0], data),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn message() -> Message {
        Message::new("a@b.com").unwrap()
    }

    #[test]
    fn plain_body_is_passed_through() {
        let msg = message();
        let out = compose(&msg, b"Subject: hi\r\n\r\nbody\r\n").unwrap();
        assert_eq!(out, b"Subject: hi\r\n\r\nbody\r\n");
    }

    #[test]
    fn routing_headers_are_prepended() {
        let mut msg = message();
        msg.set_vmta("pool-1").unwrap();
        msg.set_job_id("job-42").unwrap();
        let out = compose(&msg, b"Subject: hi\r\n\r\nbody").unwrap();
        assert_eq!(
            out,
            b"x-virtual-mta: pool-1\r\nx-job: job-42\r\nSubject: hi\r\n\r\nbody"
        );
    }

    #[test]
    fn base64_encodes_only_the_body() {
        let mut msg = message();
        msg.set_encoding(Some(Encoding::Base64)).unwrap();
        let out = compose(&msg, b"Subject: hi\r\n\r\nhello").unwrap();
        assert_eq!(
            out,
            b"Subject: hi\r\nContent-Transfer-Encoding: base64\r\n\r\naGVsbG8=\r\n"
        );
    }

    #[test]
    fn base64_without_header_block() {
        let mut msg = message();
        msg.set_encoding(Some(Encoding::Base64)).unwrap();
        let out = compose(&msg, b"hi").unwrap();
        assert_eq!(out, b"Content-Transfer-Encoding: base64\r\n\r\naGk=\r\n");
    }

    #[test]
    fn base64_wraps_long_lines() {
        let mut msg = message();
        msg.set_encoding(Some(Encoding::Base64)).unwrap();
        let body = vec![b'x'; 120];
        let out = compose(&msg, &body).unwrap();
        let text = String::from_utf8(out).unwrap();
        let encoded: Vec<&str> = text.split("\r\n").skip(2).filter(|l| !l.is_empty()).collect();
        assert_eq!(encoded.len(), 3);
        assert!(encoded.iter().all(|line| line.len() <= BASE64_LINE));
    }

    #[test]
    fn seven_bit_rejects_high_bytes() {
        let mut msg = message();
        msg.set_encoding(Some(Encoding::SevenBit)).unwrap();
        let err = compose(&msg, "Subject: x\r\n\r\nh\u{e9}".as_bytes()).unwrap_err();
        assert!(err.is_message());
        assert_eq!(err.category(), Category::IllegalArgument);
    }

    #[test]
    fn split_prefers_earliest_blank_line() {
        assert_eq!(
            split_header_block(b"A: 1\n\nB\r\n\r\nC"),
            (&b"A: 1\n"[..], &b"B\r\n\r\nC"[..])
        );
        assert_eq!(
            split_header_block(b"A: 1\r\n\r\nB"),
            (&b"A: 1\r\n"[..], &b"B"[..])
        );
        assert_eq!(split_header_block(b"\r\nbody"), (&b""[..], &b"body"[..]));
    }
}
