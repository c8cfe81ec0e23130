//! Resolution of raw intervals against the resource length.

use std::fmt;

use tracing::debug;

use crate::range::{ByteInterval, RangeSpec};

/// A resolved byte range, both ends inclusive, lying inside the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Create a byte range with inclusive start and end.
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        ByteRange { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Never true: a resolved range covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `Content-Range` value for this range of a resource of `total` bytes.
    pub fn content_range(&self, total: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Outcome of checking a request's intervals against the resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Satisfiability {
    /// No range was requested, serve the whole resource.
    NoRange,
    /// At least one interval survived, in request order.
    Satisfiable(Vec<ByteRange>),
    /// Every interval fell outside the resource.
    Unsatisfiable,
}

/// Resolves every interval of `spec` against a resource of `length` bytes.
///
/// Intervals that cannot be satisfied individually are dropped; the request
/// only becomes unsatisfiable once none remain.
pub fn satisfy(spec: Option<&RangeSpec>, length: u64) -> Satisfiability {
    let Some(spec) = spec else {
        return Satisfiability::NoRange;
    };

    let ranges: Vec<ByteRange> = spec
        .intervals()
        .iter()
        .filter_map(|interval| {
            let resolved = resolve(*interval, length);
            if resolved.is_none() {
                debug!(?interval, length, "dropping unsatisfiable interval");
            }
            resolved
        })
        .collect();

    if ranges.is_empty() {
        Satisfiability::Unsatisfiable
    } else {
        Satisfiability::Satisfiable(ranges)
    }
}

/// Resolves a single interval, `None` when it has no byte inside the resource.
pub fn resolve(interval: ByteInterval, length: u64) -> Option<ByteRange> {
    let last = length.checked_sub(1)?;
    match interval {
        ByteInterval::Bounded { start, end } if start <= end && start <= last => {
            Some(ByteRange::new(start, end.min(last)))
        }
        ByteInterval::OpenEnded { start } if start <= last => Some(ByteRange::new(start, last)),
        ByteInterval::Suffix { len } if len > 0 => {
            Some(ByteRange::new(length.saturating_sub(len), last))
        }
        _ => None,
    }
}
