//! Streaming assembly of the multipart payload.
//!
//! This module implements the consumer-driven side of the crate: a finalized
//! form turns into a [`FormBody`] that produces the payload bytes on demand,
//! without ever holding more than a small transfer buffer of file content in
//! memory.
//!
//! # Architecture
//!
//! [`FormBody`] is an explicit state machine behind `http_body::Body`. Each
//! `poll_frame` call serves bytes from the current logical segment and
//! advances the machine when a segment is exhausted:
//!
//! - `FileHeader`: the pre-rendered part header of the current file
//! - `Opening`: the in-flight open of the current file
//! - `FileContent`: sequential reads of the current file's content
//! - `Separator`: a `\r\n` owed between a finished file and the next segment
//! - `Trailer`: the buffered scalar-field block plus the closing marker
//! - `Done`: end of stream
//!
//! Transitions are strictly forward; exactly one file is current at a time
//! and its handle is dropped the moment its content is exhausted, so at most
//! one file handle is ever open. Dropping the body mid-stream drops the
//! in-progress handle with it.
//!
//! # The separator decision
//!
//! Parts other than the first are preceded by `\r\n`. Rather than framing
//! every part, finishing a file poses one question: is a separator owed? It
//! is when another file follows, or when the trailer holds more than the
//! bare closing marker — the marker carries its own leading `\r\n`, so a
//! trailer longer than `boundary length + 8` means real field parts precede
//! it. Reproducing this rule exactly is what keeps the output byte-identical
//! to a reference in-memory encode.
//!
//! # Errors
//!
//! A file that disappears or becomes unreadable between registration and
//! consumption surfaces as a [`StreamError`] from the failing poll, after
//! which the stream is over. No partial byte is dropped or duplicated: every
//! byte handed out before the error is part of the payload prefix.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::mem;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::FutureExt;
use futures::future::BoxFuture;
use http_body::{Body, Frame, SizeHint};
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};
use tracing::error;

use crate::form::FileEntry;
use crate::protocol::StreamError;

/// Size of the transfer buffer for file content reads.
const READ_BUF_SIZE: usize = 8 * 1024;

/// The two-byte separator owed between a finished part and the next one.
const SEPARATOR: &[u8] = b"\r\n";

/// The streaming multipart payload.
///
/// Implements `http_body::Body`; the consumer's polls drive all progress.
/// The stream is finite, single-pass and not restartable, and its
/// `size_hint` is exact at every point — it starts at the advertised
/// content length and shrinks with every emitted frame.
pub struct FormBody {
    entries: VecDeque<FileEntry>,
    trailer: Bytes,
    closing_len: usize,
    remaining: u64,
    state: State,
}

enum State {
    /// Emit the pre-rendered header of the current file
    FileHeader { header: Bytes, path: PathBuf },

    /// The current file's open is in flight
    Opening { opening: BoxFuture<'static, io::Result<File>>, path: PathBuf },

    /// Stream the current file's content
    FileContent { file: File, path: PathBuf },

    /// A `\r\n` is owed before the next segment
    Separator,

    /// Emit the buffered field block and closing marker
    Trailer,

    /// End of stream
    Done,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::FileHeader { .. } => "FileHeader",
            State::Opening { .. } => "Opening",
            State::FileContent { .. } => "FileContent",
            State::Separator => "Separator",
            State::Trailer => "Trailer",
            State::Done => "Done",
        }
    }
}

impl FormBody {
    pub(crate) fn new(entries: VecDeque<FileEntry>, trailer: Bytes, closing_len: usize, content_length: u64) -> Self {
        let mut body = Self { entries, trailer, closing_len, remaining: content_length, state: State::Done };
        body.state = body.next_segment();
        body
    }

    /// Picks the next segment: the next file's header, or the trailer once
    /// every file has been streamed.
    fn next_segment(&mut self) -> State {
        match self.entries.pop_front() {
            Some(entry) => State::FileHeader { header: entry.header, path: entry.path },
            None => State::Trailer,
        }
    }

    /// Decides whether a separator is owed after a finished file: owed when
    /// another file follows, or when the trailer holds more than the bare
    /// closing marker (i.e. rendered field parts precede it).
    fn after_file(&mut self) -> State {
        if !self.entries.is_empty() || self.trailer.len() > self.closing_len {
            State::Separator
        } else {
            State::Trailer
        }
    }
}

impl Body for FormBody {
    type Data = Bytes;
    type Error = StreamError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        loop {
            match mem::replace(&mut this.state, State::Done) {
                State::FileHeader { header, path } => {
                    this.state = State::Opening { opening: File::open(path.clone()).boxed(), path };
                    this.remaining -= header.len() as u64;
                    return Poll::Ready(Some(Ok(Frame::data(header))));
                }

                State::Opening { mut opening, path } => match opening.poll_unpin(cx) {
                    Poll::Ready(Ok(file)) => {
                        this.state = State::FileContent { file, path };
                    }
                    Poll::Ready(Err(e)) => {
                        error!(path = %path.display(), cause = %e, "failed to open file for streaming");
                        return Poll::Ready(Some(Err(StreamError::read(path, e))));
                    }
                    Poll::Pending => {
                        this.state = State::Opening { opening, path };
                        return Poll::Pending;
                    }
                },

                State::FileContent { mut file, path } => {
                    let mut chunk = BytesMut::zeroed(READ_BUF_SIZE);
                    let mut buf = ReadBuf::new(&mut chunk);
                    match Pin::new(&mut file).poll_read(cx, &mut buf) {
                        Poll::Ready(Ok(())) => {
                            let filled = buf.filled().len();
                            if filled == 0 {
                                // content exhausted, the handle closes here
                                drop(file);
                                this.state = this.after_file();
                                continue;
                            }
                            chunk.truncate(filled);
                            // the file may have grown since registration; never wrap the counter
                            this.remaining = this.remaining.saturating_sub(filled as u64);
                            this.state = State::FileContent { file, path };
                            return Poll::Ready(Some(Ok(Frame::data(chunk.freeze()))));
                        }
                        Poll::Ready(Err(e)) => {
                            error!(path = %path.display(), cause = %e, "failed to read file while streaming");
                            return Poll::Ready(Some(Err(StreamError::read(path, e))));
                        }
                        Poll::Pending => {
                            this.state = State::FileContent { file, path };
                            return Poll::Pending;
                        }
                    }
                }

                State::Separator => {
                    this.state = this.next_segment();
                    this.remaining -= SEPARATOR.len() as u64;
                    return Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(SEPARATOR)))));
                }

                State::Trailer => {
                    let trailer = mem::take(&mut this.trailer);
                    this.remaining -= trailer.len() as u64;
                    return Poll::Ready(Some(Ok(Frame::data(trailer))));
                }

                State::Done => return Poll::Ready(None),
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        matches!(self.state, State::Done)
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining)
    }
}

impl fmt::Debug for FormBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormBody")
            .field("state", &self.state.name())
            .field("pending_files", &self.entries.len())
            .field("remaining", &self.remaining)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn entry(path: impl Into<PathBuf>, header: &'static [u8], file_size: u64) -> FileEntry {
        FileEntry { path: path.into(), header: Bytes::from_static(header), file_size }
    }

    #[tokio::test]
    async fn trailer_only_body_emits_trailer_once() {
        let trailer = Bytes::from_static(b"\r\n--AaB03x--\r\n");
        let len = trailer.len() as u64;
        let mut body = FormBody::new(VecDeque::new(), trailer.clone(), trailer.len(), len);

        assert_eq!(body.size_hint().exact(), Some(len));
        assert!(!body.is_end_stream());

        let frame = body.frame().await.expect("one frame").expect("no error");
        assert_eq!(frame.into_data().expect("data frame"), trailer);

        assert_eq!(body.size_hint().exact(), Some(0));
        assert!(body.is_end_stream());
        assert!(body.frame().await.is_none());
    }

    #[tokio::test]
    async fn vanished_file_surfaces_read_error_after_header() {
        let entries = VecDeque::from([entry("/definitely/not/here", b"HDR", 5)]);
        let trailer = Bytes::from_static(b"\r\n--AaB03x--\r\n");
        let len = (3 + 5 + trailer.len()) as u64;
        let mut body = FormBody::new(entries, trailer.clone(), trailer.len(), len);

        let frame = body.frame().await.expect("header frame").expect("header is fine");
        assert_eq!(frame.into_data().expect("data frame"), Bytes::from_static(b"HDR"));

        let err = body.frame().await.expect("error frame").expect_err("open must fail");
        let StreamError::Read { path, source } = err;
        assert_eq!(path, PathBuf::from("/definitely/not/here"));
        assert_eq!(source.kind(), io::ErrorKind::NotFound);

        assert!(body.frame().await.is_none());
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn file_content_is_streamed_between_header_and_trailer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("payload.bin");
        std::fs::write(&path, b"some content").expect("write fixture");

        let entries = VecDeque::from([entry(path.clone(), b"HDR", 12)]);
        let trailer = Bytes::from_static(b"\r\n--AaB03x--\r\n");
        let len = (3 + 12 + trailer.len()) as u64;
        let body = FormBody::new(entries, trailer, 14, len);

        let drained = body.collect().await.expect("drain").to_bytes();
        assert_eq!(&drained[..], &b"HDRsome content\r\n--AaB03x--\r\n"[..]);
        assert_eq!(drained.len() as u64, len);
    }

    #[test]
    fn debug_does_not_touch_the_stream() {
        let body = FormBody::new(VecDeque::new(), Bytes::from_static(b"\r\n--b--\r\n"), 9, 9);
        let rendered = format!("{body:?}");
        assert!(rendered.contains("Trailer"));
        assert!(rendered.contains("remaining: 9"));
    }
}
