//! Mail-merge placeholder substitution.
//!
//! Placeholders look like `{{name}}`. Substitution is permissive: a
//! placeholder with no matching variable, a name that is not UTF-8, or an
//! unterminated `{{` is copied through unchanged.

use std::collections::HashMap;

const OPEN: &[u8] = b"{{";
const CLOSE: &[u8] = b"}}";

/// Appends `template` to `out` with every resolvable placeholder replaced.
pub fn render_into(template: &[u8], variables: &HashMap<String, String>, out: &mut Vec<u8>) {
    let mut rest = template;

    while let Some(start) = find(rest, OPEN) {
        out.extend_from_slice(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        let Some(end) = find(after_open, CLOSE) else {
            out.extend_from_slice(&rest[start..]);
            return;
        };

        let placeholder = &rest[start..start + OPEN.len() + end + CLOSE.len()];
        let value = std::str::from_utf8(&after_open[..end])
            .ok()
            .and_then(|name| variables.get(name.trim()));

        match value {
            Some(value) => out.extend_from_slice(value.as_bytes()),
            None => out.extend_from_slice(placeholder),
        }

        rest = &after_open[end + CLOSE.len()..];
    }

    out.extend_from_slice(rest);
}

/// Renders `template` into a new buffer.
#[must_use]
pub fn render(template: &[u8], variables: &HashMap<String, String>) -> Vec<u8> {
    let mut out = Vec::with_capacity(template.len());
    render_into(template, variables, &mut out);
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
