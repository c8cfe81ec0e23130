//! `multipart/byteranges` framing.
//!
//! Each part is written as
//!
//! ```text
//! --<boundary>\r\n
//! Content-Type: <media type>\r\n
//! Content-Range: bytes <start>-<end>/<total>\r\n
//! \r\n
//! <bytes start..=end>\r\n
//! ```
//!
//! followed, after the last part, by `--<boundary>--\r\n`. The framing is a
//! pure function of the ranges, the media type and the boundary, so the total
//! length is known without reading the resource.

use std::fmt;

use mime_guess::Mime;
use uuid::Uuid;

use crate::error::InvalidBoundary;
use crate::satisfy::ByteRange;

const MAX_BOUNDARY_LEN: usize = 70;
const CRLF: &str = "\r\n";

/// A validated boundary token, safe to use unquoted in `Content-Type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary(String);

impl Boundary {
    pub fn new(token: impl Into<String>) -> Result<Self, InvalidBoundary> {
        let token = token.into();
        let valid = !token.is_empty()
            && token.len() <= MAX_BOUNDARY_LEN
            && token.bytes().all(is_boundary_char);
        if valid {
            Ok(Boundary(token))
        } else {
            Err(InvalidBoundary(token))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `multipart/byteranges; boundary=<token>`
    pub fn content_type(&self) -> Result<Mime, InvalidBoundary> {
        format!("multipart/byteranges; boundary={}", self.0)
            .parse()
            .map_err(|_| InvalidBoundary(self.0.clone()))
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// RFC 2046 bchars, minus the ones that would force quoting of the parameter.
fn is_boundary_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'\'' | b'+' | b'_' | b'-' | b'.')
}

/// Source of boundary tokens for multipart responses.
///
/// Implemented for closures, so tests can pin the token:
///
/// ```
/// # use range_response::BoundaryGenerator;
/// let fixed = || "fixed-boundary".to_string();
/// assert_eq!("fixed-boundary", fixed.generate());
/// ```
pub trait BoundaryGenerator: Send + Sync {
    fn generate(&self) -> String;
}

impl<F> BoundaryGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn generate(&self) -> String {
        self()
    }
}

/// Random boundaries from UUID v4, e.g. `byteranges-9f0c...`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidBoundary;

impl BoundaryGenerator for UuidBoundary {
    fn generate(&self) -> String {
        format!("byteranges-{}", Uuid::new_v4().simple())
    }
}

/// Precomputed framing of a multipart body.
#[derive(Debug, Clone)]
pub struct MultipartLayout {
    boundary: Boundary,
    media_type: Mime,
    total: u64,
    ranges: Vec<ByteRange>,
}

impl MultipartLayout {
    pub fn new(boundary: Boundary, media_type: Mime, total: u64, ranges: Vec<ByteRange>) -> Self {
        MultipartLayout { boundary, media_type, total, ranges }
    }

    pub fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    /// Delimiter line and part headers preceding the bytes of `range`.
    pub fn part_head(&self, range: &ByteRange) -> String {
        format!(
            "--{boundary}{CRLF}Content-Type: {media}{CRLF}Content-Range: {content_range}{CRLF}{CRLF}",
            boundary = self.boundary,
            media = self.media_type,
            content_range = range.content_range(self.total),
        )
    }

    /// Line break closing the bytes of a part.
    pub fn part_tail(&self) -> &'static str {
        CRLF
    }

    /// Closing delimiter after the last part.
    pub fn close_delimiter(&self) -> String {
        format!("--{}--{CRLF}", self.boundary)
    }

    /// Exact number of bytes in the framed body.
    pub fn content_length(&self) -> u64 {
        let parts: u64 = self
            .ranges
            .iter()
            .map(|range| {
                self.part_head(range).len() as u64 + range.len() + self.part_tail().len() as u64
            })
            .sum();
        parts + self.close_delimiter().len() as u64
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use mime_guess::mime;

    use super::*;

    fn layout(ranges: Vec<ByteRange>) -> MultipartLayout {
        let boundary = Boundary::new("THIS_STRING_SEPARATES").unwrap();
        MultipartLayout::new(boundary, mime::APPLICATION_PDF, 8000, ranges)
    }

    #[test]
    fn test_boundary_validation() {
        assert!(Boundary::new("abc-DEF_123.x+'y").is_ok());
        assert_matches!(Boundary::new(""), Err(InvalidBoundary(_)));
        assert_matches!(Boundary::new("has space"), Err(InvalidBoundary(_)));
        assert_matches!(Boundary::new("semi;colon"), Err(InvalidBoundary(_)));
        assert_matches!(Boundary::new("x".repeat(71)), Err(InvalidBoundary(_)));
        assert!(Boundary::new("x".repeat(70)).is_ok());
    }

    #[test]
    fn test_content_type() {
        let boundary = Boundary::new("THIS_STRING_SEPARATES").unwrap();
        let mime = boundary.content_type().unwrap();
        assert_eq!("multipart/byteranges; boundary=THIS_STRING_SEPARATES", mime.to_string());
        assert_eq!(Some("THIS_STRING_SEPARATES"), mime.get_param("boundary").map(|b| b.as_str()));
    }

    #[test]
    fn test_uuid_boundaries_are_valid_and_unique() {
        let a = UuidBoundary.generate();
        let b = UuidBoundary.generate();
        assert_ne!(a, b);
        assert!(Boundary::new(a).is_ok());
    }

    #[test]
    fn test_part_framing() {
        let layout = layout(vec![ByteRange::new(500, 999)]);
        assert_eq!(
            "--THIS_STRING_SEPARATES\r\n\
             Content-Type: application/pdf\r\n\
             Content-Range: bytes 500-999/8000\r\n\r\n",
            layout.part_head(&layout.ranges()[0]),
        );
        assert_eq!("--THIS_STRING_SEPARATES--\r\n", layout.close_delimiter());
    }

    #[test]
    fn test_content_length_counts_framing() {
        let ranges = vec![ByteRange::new(500, 999), ByteRange::new(7000, 7999)];
        let layout = layout(ranges.clone());

        let mut expected = String::new();
        for range in &ranges {
            expected += &layout.part_head(range);
            expected += &"x".repeat(range.len() as usize);
            expected += "\r\n";
        }
        expected += &layout.close_delimiter();

        assert_eq!(expected.len() as u64, layout.content_length());
    }
}
