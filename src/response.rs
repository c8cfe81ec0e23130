//! Response shapes and their status lines and headers.

use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::headers::{AcceptRanges, ContentLength, ContentRange, ContentType, HeaderMapExt};
use mime_guess::Mime;
use tracing::debug;

use crate::RangeBody;
use crate::error::RangeError;
use crate::multipart::{Boundary, BoundaryGenerator, MultipartLayout};
use crate::satisfy::Satisfiability;
use crate::stream::{MultipartStream, RangedStream};

#[derive(Debug)]
/// Data type containing computed headers and body for a range response. Implements [`IntoResponse`].
pub enum RangedResponse<B> {
    /// Full content response, no range requested.
    Full {
        content_length: ContentLength,
        stream: RangedStream<B>,
        content_type: Mime,
    },
    /// One satisfiable range.
    Single {
        content_range: ContentRange,
        content_length: ContentLength,
        stream: RangedStream<B>,
        content_type: Mime,
    },
    /// Two or more satisfiable ranges as `multipart/byteranges`.
    /// `content_type` carries the boundary parameter.
    Multiple {
        content_length: ContentLength,
        stream: MultipartStream<B>,
        content_type: Mime,
    },
}

impl<B: RangeBody + Send + 'static> RangedResponse<B> {
    pub fn status(&self) -> StatusCode {
        match self {
            RangedResponse::Full { .. } => StatusCode::OK,
            RangedResponse::Single { .. } | RangedResponse::Multiple { .. } => StatusCode::PARTIAL_CONTENT,
        }
    }

    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.typed_insert(AcceptRanges::bytes());
        match self {
            RangedResponse::Full { content_length, content_type, .. } => {
                headers.typed_insert(ContentLength(content_length.0));
                headers.typed_insert(ContentType::from(content_type.clone()));
            }
            RangedResponse::Single { content_range, content_length, content_type, .. } => {
                headers.typed_insert(content_range.clone());
                headers.typed_insert(ContentLength(content_length.0));
                headers.typed_insert(ContentType::from(content_type.clone()));
            }
            RangedResponse::Multiple { content_length, content_type, .. } => {
                headers.typed_insert(ContentLength(content_length.0));
                headers.typed_insert(ContentType::from(content_type.clone()));
            }
        }
        headers
    }

    /// Splits the response into status, headers and a lazily read body.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, axum::body::Body) {
        let status = self.status();
        let headers = self.headers();
        let body = match self {
            RangedResponse::Full { stream, .. } | RangedResponse::Single { stream, .. } => {
                axum::body::Body::new(stream)
            }
            RangedResponse::Multiple { stream, .. } => axum::body::Body::new(stream),
        };
        (status, headers, body)
    }
}

impl<B: RangeBody + Send + 'static> IntoResponse for RangedResponse<B> {
    fn into_response(self) -> Response {
        self.into_parts().into_response()
    }
}

/// Picks the response shape for a resolved request. The body is moved into
/// the returned stream, or dropped when the request cannot be served.
pub(crate) fn select<B: RangeBody + Send + 'static>(
    satisfiability: Satisfiability,
    body: B,
    media_type: Mime,
    boundary: &dyn BoundaryGenerator,
) -> Result<RangedResponse<B>, RangeError> {
    let total_bytes = body.byte_size();

    match satisfiability {
        Satisfiability::NoRange => {
            debug!(total_bytes, "no range requested, serving full body");
            Ok(RangedResponse::Full {
                content_length: ContentLength(total_bytes),
                stream: RangedStream::new(body, 0, total_bytes),
                content_type: media_type,
            })
        }
        Satisfiability::Unsatisfiable => {
            debug!(total_bytes, "no requested range is satisfiable");
            Err(RangeError::Unsatisfiable { length: total_bytes })
        }
        Satisfiability::Satisfiable(ranges) if ranges.len() == 1 => {
            let range = ranges[0];
            debug!(total_bytes, %range, "serving single range");
            let content_range = ContentRange::bytes(range.start..=range.end, total_bytes)
                .map_err(|_| RangeError::Unsatisfiable { length: total_bytes })?;
            Ok(RangedResponse::Single {
                content_range,
                content_length: ContentLength(range.len()),
                stream: RangedStream::range(body, range),
                content_type: media_type,
            })
        }
        Satisfiability::Satisfiable(ranges) => {
            let boundary = Boundary::new(boundary.generate())?;
            let content_type = boundary.content_type()?;
            debug!(total_bytes, parts = ranges.len(), %boundary, "serving multipart ranges");
            let layout = MultipartLayout::new(boundary, media_type, total_bytes, ranges);
            let stream = MultipartStream::new(body, layout);
            Ok(RangedResponse::Multiple {
                content_length: ContentLength(stream.content_length()),
                stream,
                content_type,
            })
        }
    }
}
