//! Core payload types and error handling.
//!
//! This module provides the building blocks shared by the form builder and
//! the streaming side of the crate.
//!
//! # Architecture
//!
//! - **Finalized payload** ([`submission`]): [`ContentSubmission`] bundles
//!   the streaming body with the exact content length and the content type
//!   header value
//!
//! - **Body streaming** ([`body`]): [`body::FormBody`] is the pull-based
//!   stream assembler — a state machine that interleaves pre-rendered
//!   headers, lazily-opened file contents and boundary separators into one
//!   byte sequence, driven entirely by the consumer's polls
//!
//! - **Error Handling** ([`error`]): [`FormError`] for registration and
//!   validation failures, [`StreamError`] for failures while the payload is
//!   being produced
//!
//! The split mirrors the two phases of a submission's life: everything in
//! [`FormError`] happens before `finalize` and leaves the builder usable,
//! everything in [`StreamError`] happens afterwards and ends the stream.

mod error;
pub use error::FormError;
pub use error::StreamError;

mod submission;
pub use submission::ContentSubmission;

pub mod body;
