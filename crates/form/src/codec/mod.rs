//! Multipart wire format primitives
//!
//! This module owns the byte-level layout of a multipart/form-data payload:
//! boundary tokens, part headers and the closing marker. Everything that
//! decides what the payload looks like on the wire lives here; the builder
//! and the streaming body only arrange in which order the rendered pieces
//! are emitted.
//!
//! # Components
//!
//! - [`boundary`]: Token generation, validation and the `Content-Type`
//!   header value advertising a boundary
//! - [`MultipartEncoder`]: Encodes [`Part`]s into a `BytesMut`, tracking
//!   whether the delimiter needs the leading `\r\n` of a non-first part,
//!   and renders the closing `--boundary--` marker
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_form::codec::{MultipartEncoder, Part};
//! use tokio_util::codec::Encoder;
//!
//! let mut encoder = MultipartEncoder::new("AaB03x");
//! let mut dst = BytesMut::new();
//!
//! encoder.encode(Part::field("version", "2.1.0"), &mut dst).unwrap();
//! encoder.finish(&mut dst);
//!
//! assert!(dst.starts_with(b"--AaB03x\r\n"));
//! assert!(dst.ends_with(b"\r\n--AaB03x--\r\n"));
//! ```

pub mod boundary;
mod part_encoder;

pub use part_encoder::MultipartEncoder;
pub use part_encoder::Part;
