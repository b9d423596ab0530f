//! Acceptor reply parser.

use crate::error::{Category, Origin, Result};
use crate::types::{Reply, ReplyCode};

/// Parses a reply from response lines.
///
/// Replies can be single-line or multi-line:
/// - Single: `250 OK\r\n`
/// - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
///
/// # Errors
///
/// Returns an I/O-category connection error if the reply is malformed; the
/// session cannot be trusted after that.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(malformed("empty reply"));
    };

    let code = first
        .get(0..3)
        .filter(|code| code.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| malformed(&format!("invalid reply code in {first:?}")))?;

    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        if !line.starts_with(&first[0..3]) {
            return Err(malformed(&format!("mixed reply codes: {line:?}")));
        }
        match line.len() {
            3 => message.push(String::new()),
            _ => match line.get(4..) {
                Some(text) => message.push(text.to_string()),
                None => return Err(malformed(&format!("malformed reply line: {line:?}"))),
            },
        }
    }

    Ok(Reply::new(ReplyCode::new(code), message))
}

/// Checks if a line is the last line of a multi-line reply.
///
/// Continuation lines use `-` after the code, the last line uses ` ` or
/// nothing at all.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.len() == 3 || (line.len() >= 4 && line.as_bytes()[3] == b' ')
}

fn malformed(detail: &str) -> crate::Error {
    Origin::Connection.error(Category::Io, format!("malformed reply: {detail}"))
}
