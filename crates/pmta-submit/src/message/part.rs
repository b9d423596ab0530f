//! Body parts and their data segments.

use std::collections::HashMap;

use super::merge;

/// A run of bytes appended to a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Sent verbatim to every recipient.
    Data(Vec<u8>),
    /// Contains `{{name}}` placeholders resolved per recipient.
    Merge(Vec<u8>),
}

impl Segment {
    /// Returns the raw bytes of the segment.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Data(bytes) | Self::Merge(bytes) => bytes,
        }
    }

    /// Returns true for merge segments.
    #[must_use]
    pub const fn is_merge(&self) -> bool {
        matches!(self, Self::Merge(_))
    }
}

/// One numbered body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    number: u32,
    segments: Vec<Segment>,
}

impl Part {
    pub(crate) const fn new(number: u32) -> Self {
        Self {
            number,
            segments: Vec::new(),
        }
    }

    /// Returns the part index given to `begin_part`.
    #[must_use]
    pub const fn number(&self) -> u32 {
        self.number
    }

    /// Returns the appended segments in order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the accumulated length in bytes, before merge substitution.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.bytes().len()).sum()
    }

    /// Returns true if no data was appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if any segment carries merge placeholders.
    #[must_use]
    pub fn has_merge_data(&self) -> bool {
        self.segments.iter().any(Segment::is_merge)
    }

    pub(crate) fn push(&mut self, segment: Segment) {
        // Consecutive segments of the same kind are coalesced.
        let coalesced = match (self.segments.last_mut(), &segment) {
            (Some(Segment::Data(last)), Segment::Data(bytes))
            | (Some(Segment::Merge(last)), Segment::Merge(bytes)) => {
                last.extend_from_slice(bytes);
                true
            }
            _ => false,
        };
        if !coalesced {
            self.segments.push(segment);
        }
    }

    /// Appends the part, rendered against `variables`, to `out`.
    pub fn render_into(&self, variables: &HashMap<String, String>, out: &mut Vec<u8>) {
        for segment in &self.segments {
            match segment {
                Segment::Data(bytes) => out.extend_from_slice(bytes),
                Segment::Merge(bytes) => merge::render_into(bytes, variables, out),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn push_coalesces_same_kind() {
        let mut part = Part::new(1);
        part.push(Segment::Data(b"a".to_vec()));
        part.push(Segment::Data(b"b".to_vec()));
        part.push(Segment::Merge(b"{{x}}".to_vec()));
        part.push(Segment::Data(b"c".to_vec()));

        assert_eq!(
            part.segments(),
            &[
                Segment::Data(b"ab".to_vec()),
                Segment::Merge(b"{{x}}".to_vec()),
                Segment::Data(b"c".to_vec()),
            ]
        );
        assert_eq!(part.len(), 8);
        assert!(part.has_merge_data());
    }

    #[test]
    fn data_segments_are_not_substituted() {
        let mut part = Part::new(0);
        part.push(Segment::Data(b"{{name}} ".to_vec()));
        part.push(Segment::Merge(b"{{name}}".to_vec()));

        let vars = HashMap::from([("name".to_string(), "Ann".to_string())]);
        let mut out = Vec::new();
        part.render_into(&vars, &mut out);
        assert_eq!(out, b"{{name}} Ann");
    }
}
