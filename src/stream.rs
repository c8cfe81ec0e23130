use std::{io, mem};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::Stream;
use http_body::{Body, Frame, SizeHint};
use pin_project::pin_project;
use tokio::io::ReadBuf;
use tracing::trace;

use crate::RangeBody;
use crate::multipart::MultipartLayout;
use crate::satisfy::ByteRange;

const IO_BUFFER_SIZE: usize = 64 * 1024;

/// Progress through one contiguous span of the resource.
#[derive(Debug)]
enum ReadState {
    Seek { start: u64, remaining: u64 },
    Seeking { remaining: u64 },
    Reading { buffer: BytesMut, remaining: u64 },
    Done,
}

impl ReadState {
    fn new(start: u64, length: u64) -> Self {
        if length == 0 {
            ReadState::Done
        } else {
            ReadState::Seek { start, remaining: length }
        }
    }
}

/// Drives `state` one step, yielding the next chunk of the span or `None`
/// once all of it has been read. A resource that ends early is an error.
fn poll_span<B: RangeBody>(
    mut body: Pin<&mut B>,
    state: &mut ReadState,
    cx: &mut Context<'_>,
) -> Poll<Option<io::Result<Bytes>>> {
    if let ReadState::Seek { start, remaining } = *state {
        if let Err(e) = body.as_mut().start_seek(start) {
            *state = ReadState::Done;
            return Poll::Ready(Some(Err(e)));
        }
        *state = ReadState::Seeking { remaining };
    }

    if let ReadState::Seeking { remaining } = *state {
        match body.as_mut().poll_complete(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Err(e)) => {
                *state = ReadState::Done;
                return Poll::Ready(Some(Err(e)));
            }
            Poll::Ready(Ok(())) => {
                let buffer = allocate_buffer(remaining);
                *state = ReadState::Reading { buffer, remaining };
            }
        }
    }

    let ReadState::Reading { buffer, remaining } = state else {
        return Poll::Ready(None);
    };

    let uninit = buffer.spare_capacity_mut();

    // read no more than the buffer holds and no more than the span has left
    let nbytes = std::cmp::min(uninit.len(), usize::try_from(*remaining).unwrap_or(usize::MAX));

    let mut read_buf = ReadBuf::uninit(&mut uninit[..nbytes]);

    match body.as_mut().poll_read(cx, &mut read_buf) {
        Poll::Pending => Poll::Pending,
        Poll::Ready(Err(e)) => {
            *state = ReadState::Done;
            Poll::Ready(Some(Err(e)))
        }
        Poll::Ready(Ok(())) => match read_buf.filled().len() {
            0 => {
                let missing = *remaining;
                *state = ReadState::Done;
                Poll::Ready(Some(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("resource ended {missing} bytes before the end of the requested range"),
                ))))
            }
            n => {
                // SAFETY: poll_read has initialised `n` more bytes of the
                // spare capacity. `buffer.len()` is always 0 here.
                unsafe { buffer.set_len(buffer.len() + n) };

                // n <= remaining because of the min above
                *remaining -= n as u64;
                trace!(read = n, remaining = *remaining, "read chunk");

                let chunk = if *remaining == 0 {
                    let chunk = mem::take(buffer);
                    *state = ReadState::Done;
                    chunk
                } else {
                    let next = allocate_buffer(*remaining);
                    mem::replace(buffer, next)
                };
                Poll::Ready(Some(Ok(chunk.freeze())))
            }
        },
    }
}

fn allocate_buffer(remaining: u64) -> BytesMut {
    let len = usize::try_from(remaining).map_or(IO_BUFFER_SIZE, |r| r.min(IO_BUFFER_SIZE));
    BytesMut::with_capacity(len)
}

/// Body of a full or single-range response: one span of the resource.
/// Implements [`Stream`] and [`Body`]; the response headers come from
/// [`RangedResponse`](crate::RangedResponse).
///
/// The resource is owned by the stream and dropped with it, so a body that
/// is abandoned mid-transfer releases its handle immediately.
#[pin_project]
pub struct RangedStream<B> {
    state: ReadState,
    length: u64,
    #[pin]
    body: B,
}

impl<B> std::fmt::Debug for RangedStream<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangedStream")
            .field("state", &self.state)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

impl<B: RangeBody + Send + 'static> RangedStream<B> {
    pub(crate) fn new(body: B, start: u64, length: u64) -> Self {
        RangedStream {
            state: ReadState::new(start, length),
            length,
            body,
        }
    }

    pub(crate) fn range(body: B, range: ByteRange) -> Self {
        Self::new(body, range.start, range.len())
    }
}

impl<B: RangeBody> Body for RangedStream<B> {
    type Data = Bytes;
    type Error = io::Error;

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.length)
    }

    fn is_end_stream(&self) -> bool {
        matches!(self.state, ReadState::Done)
    }

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>)
        -> Poll<Option<io::Result<Frame<Bytes>>>>
    {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl<B: RangeBody> Stream for RangedStream<B> {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<io::Result<Bytes>>> {
        let this = self.project();
        poll_span(this.body, this.state, cx)
    }
}

/// Multipart response body stream for multiple byte ranges.
/// Implements [`Stream`] and [`Body`]; the response headers come from
/// [`RangedResponse`](crate::RangedResponse).
#[pin_project]
pub struct MultipartStream<B> {
    state: MultipartState,
    layout: MultipartLayout,
    current_range_index: usize,
    content_length: u64,
    #[pin]
    body: B,
}

#[derive(Debug)]
enum MultipartState {
    PartHead,
    PartBody(ReadState),
    PartTail,
    CloseDelimiter,
    Finished,
}

impl<B> std::fmt::Debug for MultipartStream<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartStream")
            .field("state", &self.state)
            .field("layout", &self.layout)
            .field("current_range_index", &self.current_range_index)
            .finish_non_exhaustive()
    }
}

impl<B: RangeBody + Send + 'static> MultipartStream<B> {
    pub(crate) fn new(body: B, layout: MultipartLayout) -> Self {
        let content_length = layout.content_length();
        MultipartStream {
            state: MultipartState::PartHead,
            layout,
            current_range_index: 0,
            content_length,
            body,
        }
    }

    pub fn boundary(&self) -> &str {
        self.layout.boundary().as_str()
    }

    /// Exact number of bytes this stream yields.
    pub fn content_length(&self) -> u64 {
        self.content_length
    }
}

impl<B: RangeBody> Body for MultipartStream<B> {
    type Data = Bytes;
    type Error = io::Error;

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.content_length)
    }

    fn is_end_stream(&self) -> bool {
        matches!(self.state, MultipartState::Finished)
    }

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>)
        -> Poll<Option<io::Result<Frame<Bytes>>>>
    {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl<B: RangeBody> Stream for MultipartStream<B> {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<io::Result<Bytes>>> {
        let mut this = self.project();

        loop {
            match this.state {
                MultipartState::PartHead => {
                    let Some(range) = this.layout.ranges().get(*this.current_range_index) else {
                        *this.state = MultipartState::CloseDelimiter;
                        continue;
                    };
                    let head = this.layout.part_head(range);
                    *this.state = MultipartState::PartBody(ReadState::new(range.start, range.len()));
                    return Poll::Ready(Some(Ok(Bytes::from(head))));
                }

                MultipartState::PartBody(read) => {
                    match poll_span(this.body.as_mut(), read, cx) {
                        Poll::Ready(None) => *this.state = MultipartState::PartTail,
                        Poll::Ready(Some(Err(e))) => {
                            *this.state = MultipartState::Finished;
                            return Poll::Ready(Some(Err(e)));
                        }
                        other => return other,
                    }
                }

                MultipartState::PartTail => {
                    *this.current_range_index += 1;
                    *this.state = MultipartState::PartHead;
                    return Poll::Ready(Some(Ok(Bytes::from_static(this.layout.part_tail().as_bytes()))));
                }

                MultipartState::CloseDelimiter => {
                    *this.state = MultipartState::Finished;
                    return Poll::Ready(Some(Ok(Bytes::from(this.layout.close_delimiter()))));
                }

                MultipartState::Finished => return Poll::Ready(None),
            }
        }
    }
}
