//! Parsing of the client `Range` header into raw byte intervals.
//!
//! ```text
//! Range = "bytes" "=" byte-range-spec *( "," byte-range-spec )
//! byte-range-spec = first-byte-pos "-" [ last-byte-pos ] / "-" suffix-length
//! ```
//!
//! Nothing here knows the resource length: intervals are kept exactly as the
//! client wrote them and in the order given. Resolution against the length
//! happens in [`crate::satisfy`].

use tracing::warn;

use crate::error::RangeError;

const BYTES_UNIT: &str = "bytes";

/// One interval of a `Range` header, in the client's raw form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteInterval {
    /// `first-last`, both inclusive. `first > last` is kept and dropped later.
    Bounded { start: u64, end: u64 },
    /// `first-`, through the end of the resource.
    OpenEnded { start: u64 },
    /// `-len`, the final `len` bytes of the resource.
    Suffix { len: u64 },
}

/// Non-empty, ordered list of intervals from one `Range` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeSpec(Vec<ByteInterval>);

impl RangeSpec {
    pub fn intervals(&self) -> &[ByteInterval] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false, a parsed spec has at least one interval.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::str::FromStr for RangeSpec {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_range_header(s)
    }
}

/// Parses a raw `Range` header value.
///
/// Fails with [`RangeError::MalformedRange`] for a missing or unknown unit,
/// any element that is not one of the three interval forms, or a header with
/// no intervals at all. A header that mixes valid and invalid elements, such
/// as `bytes=0-4,oops`, is rejected as a whole rather than served from its
/// valid part.
pub fn parse_range_header(header: &str) -> Result<RangeSpec, RangeError> {
    let malformed = || {
        warn!(header, "malformed range header");
        RangeError::MalformedRange(header.to_string())
    };

    let (unit, set) = header.split_once('=').ok_or_else(malformed)?;
    if !unit.trim().eq_ignore_ascii_case(BYTES_UNIT) {
        return Err(malformed());
    }

    let mut intervals = Vec::new();
    for element in set.split(',') {
        let element = element.trim();
        // the list rule permits empty elements
        if element.is_empty() {
            continue;
        }
        intervals.push(parse_interval(element).ok_or_else(malformed)?);
    }

    if intervals.is_empty() {
        return Err(malformed());
    }
    Ok(RangeSpec(intervals))
}

fn parse_interval(element: &str) -> Option<ByteInterval> {
    let (first, last) = element.split_once('-')?;
    let (first, last) = (first.trim(), last.trim());

    match (first.is_empty(), last.is_empty()) {
        (true, true) => None,
        (true, false) => Some(ByteInterval::Suffix { len: parse_pos(last)? }),
        (false, true) => Some(ByteInterval::OpenEnded { start: parse_pos(first)? }),
        (false, false) => Some(ByteInterval::Bounded {
            start: parse_pos(first)?,
            end: parse_pos(last)?,
        }),
    }
}

// `u64::from_str` also accepts a leading '+', which the grammar does not.
fn parse_pos(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
