//! Part header encoder for multipart/form-data payloads.
//!
//! Renders the framing of individual parts: the boundary delimiter line, the
//! `Content-Disposition` header and, for file parts, the content type line.
//! The encoder is stateful over one destination buffer — the first part it
//! encodes is framed `--boundary\r\n`, every later one `\r\n--boundary\r\n`.
//! File content itself never passes through here; a file part is header-only
//! and its content is spliced in by the streaming body.

use std::borrow::Cow;
use std::io;
use std::io::Write;

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use crate::ensure;
use crate::protocol::FormError;

/// Fixed framing around the boundary token in the closing marker, i.e. the
/// `\r\n--` prefix and `--\r\n` suffix of `\r\n--boundary--\r\n`.
const CLOSING_FRAME_LEN: usize = 8;

/// A single logical part of a multipart/form-data payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part<'a> {
    /// A scalar field whose value is already fully in memory
    Field { name: &'a str, value: &'a str },

    /// A file attachment; only the header is rendered, content is streamed
    File { name: &'a str, filename: &'a str },
}

impl<'a> Part<'a> {
    /// A scalar form field.
    pub fn field(name: &'a str, value: &'a str) -> Self {
        Self::Field { name, value }
    }

    /// A file attachment part with the given form name and file name.
    pub fn file(name: &'a str, filename: &'a str) -> Self {
        Self::File { name, filename }
    }
}

/// Encoder for multipart parts implementing the [`Encoder`] trait.
///
/// All encoders sharing a boundary produce interchangeable bytes; the only
/// state is how many parts have been written to the destination, which
/// decides the delimiter framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartEncoder {
    boundary: String,
    parts: usize,
}

impl MultipartEncoder {
    pub fn new(boundary: impl Into<String>) -> Self {
        Self { boundary: boundary.into(), parts: 0 }
    }

    /// Appends the closing `\r\n--boundary--\r\n` marker.
    ///
    /// The leading `\r\n` belongs to the marker itself, matching reference
    /// multipart encoders, so no separator is owed before it.
    pub fn finish(&self, dst: &mut BytesMut) {
        dst.reserve(self.closing_len());
        dst.put_slice(b"\r\n--");
        dst.put_slice(self.boundary.as_bytes());
        dst.put_slice(b"--\r\n");
    }

    /// Exact byte length of the closing marker rendered by [`finish`].
    ///
    /// [`finish`]: MultipartEncoder::finish
    pub fn closing_len(&self) -> usize {
        self.boundary.len() + CLOSING_FRAME_LEN
    }

    fn put_delimiter(&self, dst: &mut BytesMut) {
        if self.parts == 0 {
            dst.put_slice(b"--");
        } else {
            dst.put_slice(b"\r\n--");
        }
        dst.put_slice(self.boundary.as_bytes());
        dst.put_slice(b"\r\n");
    }
}

impl Encoder<Part<'_>> for MultipartEncoder {
    type Error = FormError;

    fn encode(&mut self, item: Part<'_>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Part::Field { name, value } => {
                check_part_name(name)?;

                dst.reserve(self.boundary.len() + name.len() + value.len() + 64);
                self.put_delimiter(dst);
                write!(
                    FastWrite(dst),
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    escape_quotes(name)
                )?;
                dst.put_slice(value.as_bytes());
            }

            Part::File { name, filename } => {
                check_part_name(name)?;
                check_part_name(filename)?;

                dst.reserve(self.boundary.len() + name.len() + filename.len() + 96);
                self.put_delimiter(dst);
                write!(
                    FastWrite(dst),
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    escape_quotes(name),
                    escape_quotes(filename)
                )?;
            }
        }

        self.parts += 1;
        Ok(())
    }
}

/// Part names land inside a quoted header parameter; CR and LF would break
/// out of the header line.
fn check_part_name(name: &str) -> Result<(), FormError> {
    ensure!(
        !name.contains(['\r', '\n']),
        FormError::invalid_part_name("part names must not contain CR or LF")
    );
    Ok(())
}

fn escape_quotes(value: &str) -> Cow<'_, str> {
    if value.contains(['\\', '"']) {
        Cow::Owned(value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        Cow::Borrowed(value)
    }
}

/// Fast writer implementation for writing to BytesMut.
///
/// This is an optimization to avoid unnecessary bounds checking when writing
/// to the bytes buffer, since we've already reserved enough space.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
