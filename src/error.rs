//! Error outcomes of a range request.

use std::io;

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::headers::{AcceptRanges, ContentRange, HeaderMapExt};
use thiserror::Error;

/// Terminal, non-success outcome of [`Ranged::try_respond`](crate::Ranged::try_respond).
///
/// Every variant is reported before any body byte is produced. Implements
/// [`IntoResponse`].
#[derive(Debug, Error)]
pub enum RangeError {
    /// The `Range` header is present but syntactically invalid.
    #[error("malformed range header: {0:?}")]
    MalformedRange(String),

    /// The header parsed, but no requested interval overlaps the resource.
    #[error("range not satisfiable for resource of {length} bytes")]
    Unsatisfiable { length: u64 },

    /// The resource could not be used to answer the request at all.
    #[error("resource unavailable: {0}")]
    Resource(#[from] ResourceError),

    /// The configured boundary generator produced an unusable token.
    #[error(transparent)]
    InvalidBoundary(#[from] InvalidBoundary),
}

/// Failure to obtain a usable resource.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("no resource supplied")]
    Missing,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A multipart boundary token that is empty, too long, or contains
/// characters outside `[A-Za-z0-9'+_.-]`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid multipart boundary {0:?}")]
pub struct InvalidBoundary(pub String);

impl From<io::Error> for RangeError {
    fn from(err: io::Error) -> Self {
        RangeError::Resource(ResourceError::Io(err))
    }
}

impl RangeError {
    pub fn status(&self) -> StatusCode {
        match self {
            RangeError::MalformedRange(_) => StatusCode::BAD_REQUEST,
            RangeError::Unsatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            RangeError::Resource(_) => StatusCode::BAD_REQUEST,
            RangeError::InvalidBoundary(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Response headers for this outcome. Always advertises byte ranges; a
    /// 416 also reports the true resource length.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.typed_insert(AcceptRanges::bytes());
        if let RangeError::Unsatisfiable { length } = self {
            headers.typed_insert(ContentRange::unsatisfied_bytes(*length));
        }
        headers
    }
}

impl IntoResponse for RangeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let headers = self.headers();
        match self {
            RangeError::Unsatisfiable { .. } => (status, headers, ()).into_response(),
            // Boundary failures are server bugs; keep the detail out of the body.
            RangeError::InvalidBoundary(_) => (status, headers, ()).into_response(),
            other => (status, headers, other.to_string()).into_response(),
        }
    }
}
