//! A streaming multipart/form-data composer
//!
//! This crate builds a multipart/form-data payload incrementally from named
//! scalar fields and named file attachments, producing a single sequential
//! byte stream plus an exact upfront content-length, without ever loading a
//! file's content into memory.
//!
//! # Features
//!
//! - Exact content-length known before a single payload byte is produced
//! - Lazy, single-pass streaming of file contents (at most one open handle)
//! - Byte-identical output to a full in-memory multipart encode
//! - Eager validation of attachments, so errors surface at registration time
//! - Standard `http_body::Body` interface for the produced stream
//! - Clean error handling
//!
//!
//! # Example
//!
//! ```no_run
//! use http_body_util::BodyExt;
//! use micro_form::form::Form;
//! use tracing::{info, Level};
//! use tracing_subscriber::FmtSubscriber;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Initialize logging
//!     let subscriber = FmtSubscriber::builder()
//!         .with_max_level(Level::INFO)
//!         .finish();
//!     tracing::subscriber::set_global_default(subscriber)
//!         .expect("setting default subscriber failed");
//!
//!     let mut form = Form::new();
//!     form.add_field("product[version]", "2.1.0").unwrap();
//!     form.add_file("product[file]", "./release.tgz").await.unwrap();
//!
//!     let submission = form.finalize();
//!     info!(
//!         content_length = submission.content_length(),
//!         content_type = submission.content_type(),
//!         "payload ready"
//!     );
//!
//!     // An HTTP client would send `submission` as a request body; here we
//!     // just drain it and check the advertised length was exact.
//!     let content_length = submission.content_length();
//!     let body = submission.into_body();
//!     let payload = body.collect().await.unwrap().to_bytes();
//!     assert_eq!(payload.len() as u64, content_length);
//! }
//! ```
//!
//!
//! # Architecture
//!
//! The crate is organized into three modules:
//!
//! - [`codec`]: The multipart wire primitives — boundary tokens, part header
//!   encoding and the closing marker
//! - [`form`]: The [`form::Form`] builder that accumulates fields and files
//!   and settles the length bookkeeping
//! - [`protocol`]: Core types — the finalized
//!   [`protocol::ContentSubmission`], the streaming
//!   [`protocol::body::FormBody`] and the error types
//!
//!
//! # Payload layout
//!
//! Files come first, in registration order, each as a pre-rendered part
//! header followed by the lazily-read file content. Scalar fields follow, in
//! call order, rendered eagerly into one buffered block since their values
//! are already in memory. The closing boundary marker ends the payload. This
//! eager/lazy asymmetry is what makes the exact content-length computable
//! without touching file contents.
//!
//! Every part after the first is preceded by a `\r\n` separator. Instead of
//! per-part framing, the streaming side settles this with a single "is a
//! separator owed" decision whenever a file finishes — see
//! [`protocol::body`] for the state machine.

pub mod codec;
pub mod form;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
