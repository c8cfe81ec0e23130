//! # range-response
//!
//! HTTP byte-range responses (RFC 7233) for any seekable resource, with an
//! adapter for [`axum`][1].
//!
//! Fully generic, supports any body implementing the [`RangeBody`] trait.
//! Any type implementing both [`AsyncRead`] and [`AsyncSeekStart`] can be
//! used through the [`KnownSize`] adapter struct, and files get
//! [`KnownSize::open`].
//!
//! A request is answered in one of these shapes:
//!
//! | Request | Response |
//! |---|---|
//! | no `Range` header | `200`, whole resource |
//! | one satisfiable range | `206`, `Content-Range: bytes a-b/len` |
//! | several satisfiable ranges | `206`, `multipart/byteranges` |
//! | no satisfiable range | `416`, `Content-Range: bytes */len` |
//! | malformed `Range`, or no usable resource | `400` |
//!
//! Every response carries `Accept-Ranges: bytes`. Bodies are lazy: bytes are
//! read from the resource only as the transport polls for them, and the
//! resource handle is dropped with the body.
//!
//! ```
//! use axum::Router;
//! use axum::http::HeaderMap;
//! use axum::routing::get;
//!
//! use range_response::{guess_media_type, KnownSize, Ranged};
//!
//! async fn clip(headers: HeaderMap) -> Ranged<KnownSize<tokio::fs::File>> {
//!     let path = "media/clip.mp4";
//!     let body = KnownSize::open(path).await;
//!     Ranged::from_headers(&headers, body.map_err(Into::into), guess_media_type(path))
//! }
//!
//! let _app: Router = Router::new().route("/clip.mp4", get(clip));
//! ```
//!
//! [`AsyncSeekStart`] is a trait defined by this crate which only allows
//! seeking from the start of a file. It is automatically implemented for any
//! type implementing [`AsyncSeek`].
//!
//! [1]: https://docs.rs/axum

mod error;
mod file;
mod multipart;
mod range;
mod response;
mod satisfy;
mod stream;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use mime_guess::Mime;
use tokio::io::{AsyncRead, AsyncSeek};
use tracing::warn;

pub use mime_guess::mime;

pub use error::{InvalidBoundary, RangeError, ResourceError};
pub use file::{guess_media_type, KnownSize};
pub use multipart::{Boundary, BoundaryGenerator, MultipartLayout, UuidBoundary};
pub use range::{parse_range_header, ByteInterval, RangeSpec};
pub use response::RangedResponse;
pub use satisfy::{resolve, satisfy, ByteRange, Satisfiability};
pub use stream::{MultipartStream, RangedStream};

/// [`AsyncSeek`] narrowed to only allow seeking from start.
pub trait AsyncSeekStart {
    /// Same semantics as [`AsyncSeek::start_seek`], always passing position as the `SeekFrom::Start` variant.
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()>;

    /// Same semantics as [`AsyncSeek::poll_complete`], returning `()` instead of the new stream position.
    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

impl<T: AsyncSeek> AsyncSeekStart for T {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        AsyncSeek::start_seek(self, io::SeekFrom::Start(position))
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncSeek::poll_complete(self, cx).map_ok(|_| ())
    }
}

/// An [`AsyncRead`] and [`AsyncSeekStart`] with a fixed known byte size.
pub trait RangeBody: AsyncRead + AsyncSeekStart {
    /// The total size of the underlying resource.
    ///
    /// This should not change for the lifetime of the object once queried.
    /// Reads past a size that shrank fail with `UnexpectedEof`.
    fn byte_size(&self) -> u64;
}

/// The main responder type. Implements [`IntoResponse`].
pub struct Ranged<B: RangeBody + Send + 'static> {
    range: Option<HeaderValue>,
    body: Result<B, ResourceError>,
    media_type: Mime,
    boundary: Box<dyn BoundaryGenerator>,
    max_ranges: Option<usize>,
}

impl<B: RangeBody + Send + 'static> Ranged<B> {
    /// Construct a ranged response over any type implementing [`RangeBody`]
    /// and the raw value of an optional `Range` header.
    pub fn new(range: Option<HeaderValue>, body: B, media_type: Mime) -> Self {
        Self::with_resource(range, Ok(body), media_type)
    }

    /// Like [`Ranged::new`], for a resource that may be missing or may have
    /// failed to open. An `Err` is answered with `400 Bad Request`.
    pub fn with_resource(range: Option<HeaderValue>, body: Result<B, ResourceError>, media_type: Mime) -> Self {
        Ranged {
            range,
            body,
            media_type,
            boundary: Box::new(UuidBoundary),
            max_ranges: None,
        }
    }

    /// Takes the `Range` header from the request's header map.
    pub fn from_headers(headers: &HeaderMap, body: Result<B, ResourceError>, media_type: Mime) -> Self {
        Self::with_resource(headers.get(header::RANGE).cloned(), body, media_type)
    }

    /// Replaces the random multipart boundary source.
    pub fn boundary_generator(mut self, generator: impl BoundaryGenerator + 'static) -> Self {
        self.boundary = Box::new(generator);
        self
    }

    /// Ignores `Range` headers naming more than `max` intervals and serves
    /// the whole resource instead.
    pub fn max_ranges(mut self, max: usize) -> Self {
        self.max_ranges = Some(max);
        self
    }

    /// Responds to the request, returning headers and body as
    /// [`RangedResponse`], or the [`RangeError`] explaining why the request
    /// cannot be served.
    pub fn try_respond(self) -> Result<RangedResponse<B>, RangeError> {
        let body = self.body?;

        let spec = match &self.range {
            None => None,
            Some(value) => {
                let header = value.to_str().map_err(|_| {
                    warn!(?value, "range header is not visible ascii");
                    RangeError::MalformedRange(String::from_utf8_lossy(value.as_bytes()).into_owned())
                })?;
                Some(parse_range_header(header)?)
            }
        };

        let spec = match (spec, self.max_ranges) {
            (Some(spec), Some(max)) if spec.len() > max => {
                warn!(requested = spec.len(), max, "too many ranges requested, ignoring range header");
                None
            }
            (spec, _) => spec,
        };

        let satisfiability = satisfy(spec.as_ref(), body.byte_size());
        response::select(satisfiability, body, self.media_type, self.boundary.as_ref())
    }
}

impl<B: RangeBody + Send + 'static> IntoResponse for Ranged<B> {
    fn into_response(self) -> Response {
        self.try_respond().into_response()
    }
}
