//! The multipart form builder.
//!
//! A [`Form`] is created once per outgoing request, mutated by any number of
//! [`add_field`](Form::add_field) / [`add_file`](Form::add_file) calls, and
//! consumed exactly once by [`finalize`](Form::finalize). Scalar fields are
//! rendered eagerly into one in-memory block — their values are already in
//! memory, so rendering them up front is free and makes their length known.
//! Files are only probed: the part header is rendered from the path's base
//! name and the size is taken from the file metadata, but no content byte is
//! read until the finalized payload streams.
//!
//! That asymmetry is the whole point of the builder: when `finalize` runs,
//! every length involved — rendered fields, rendered file headers, probed
//! file sizes, separators and the closing marker — is already known, so the
//! exact content length is settled before a single payload byte exists.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio_util::codec::Encoder;
use tracing::debug;

use crate::codec::{self, MultipartEncoder, Part};
use crate::ensure;
use crate::protocol::body::FormBody;
use crate::protocol::{ContentSubmission, FormError};

/// Builder for a streaming multipart/form-data payload.
///
/// In the produced payload all files come first, in registration order,
/// followed by all scalar fields in call order, then the closing marker.
#[derive(Debug)]
pub struct Form {
    boundary: String,
    content_type: String,
    field_encoder: MultipartEncoder,
    fields: BytesMut,
    entries: VecDeque<FileEntry>,
    total_length: u64,
}

/// One file attachment registered on a [`Form`].
///
/// The header is rendered eagerly at registration time; the file itself is
/// re-opened lazily by the streaming body.
#[derive(Debug)]
pub(crate) struct FileEntry {
    pub(crate) path: PathBuf,
    pub(crate) header: Bytes,
    pub(crate) file_size: u64,
}

impl Form {
    /// Creates a form with a freshly generated random boundary.
    pub fn new() -> Self {
        Self::from_boundary(codec::boundary::generate())
    }

    /// Creates a form using a caller-supplied boundary token.
    ///
    /// This is the injection point for deterministic boundaries in tests;
    /// everything else should prefer [`Form::new`].
    pub fn with_boundary(boundary: &str) -> Result<Self, FormError> {
        codec::boundary::validate(boundary)?;
        Ok(Self::from_boundary(boundary.to_string()))
    }

    fn from_boundary(boundary: String) -> Self {
        let content_type = codec::boundary::content_type(&boundary);
        let field_encoder = MultipartEncoder::new(boundary.clone());
        Self {
            boundary,
            content_type,
            field_encoder,
            fields: BytesMut::new(),
            entries: VecDeque::new(),
            total_length: 0,
        }
    }

    /// The boundary token separating the parts of this form.
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Renders a scalar field into the in-memory field block.
    ///
    /// The whole part is rendered and counted towards the total length right
    /// away. Rendered fields appear in the payload after every file, in call
    /// order.
    pub fn add_field(&mut self, name: &str, value: &str) -> Result<(), FormError> {
        let before = self.fields.len();
        self.field_encoder.encode(Part::field(name, value), &mut self.fields)?;

        let rendered = self.fields.len() - before;
        self.total_length += rendered as u64;
        debug!(name, rendered, "field registered");
        Ok(())
    }

    /// Registers a file attachment under `name`, using the path's base name
    /// as the part's file name.
    ///
    /// The file is probed eagerly — opened and stat'ed, rejecting empty
    /// files — so the caller gets an immediate error instead of a failure
    /// mid-stream; the probe handle is closed before returning. Content is
    /// read only while the finalized payload streams. On error nothing is
    /// registered and the form stays usable, so the caller may retry with a
    /// corrected path.
    pub async fn add_file(&mut self, name: &str, path: impl AsRef<Path>) -> Result<(), FormError> {
        let path = path.as_ref();
        let file_size = verify_file(path).await?;

        let filename = path.file_name().unwrap_or_default().to_string_lossy();
        let mut encoder = MultipartEncoder::new(self.boundary.clone());
        let mut header = BytesMut::new();
        encoder.encode(Part::file(name, &filename), &mut header)?;

        let entry = FileEntry { path: path.to_path_buf(), header: header.freeze(), file_size };
        self.total_length += entry.header.len() as u64 + entry.file_size;
        debug!(name, path = %entry.path.display(), size = entry.file_size, "file registered");
        self.entries.push_back(entry);
        Ok(())
    }

    /// Seals the form and produces the transmittable payload.
    ///
    /// Appends the closing marker to the field block and settles the length
    /// bookkeeping: the marker's own bytes, one two-byte separator between
    /// each pair of files, and one more when rendered fields follow the last
    /// file. Consuming `self` makes a second finalize, or any mutation after
    /// it, a compile-time error.
    pub fn finalize(mut self) -> ContentSubmission {
        self.field_encoder.finish(&mut self.fields);

        let closing_len = self.field_encoder.closing_len();
        self.total_length += closing_len as u64;

        if !self.entries.is_empty() {
            self.total_length += 2 * (self.entries.len() as u64 - 1);
            // a field block longer than the bare closing marker means real
            // trailing fields, which owe a separator after the last file
            if self.fields.len() > closing_len {
                self.total_length += 2;
            }
        }

        debug!(files = self.entries.len(), content_length = self.total_length, "form finalized");

        let body = FormBody::new(self.entries, self.fields.freeze(), closing_len, self.total_length);
        ContentSubmission::new(body, self.content_type, self.total_length)
    }
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

/// Probes a file the way the payload will later consume it: open, stat,
/// reject empty files. The handle is dropped before returning.
async fn verify_file(path: &Path) -> Result<u64, FormError> {
    let file = File::open(path).await.map_err(|e| FormError::unreadable(path, e))?;
    let metadata = file.metadata().await.map_err(|e| FormError::unreadable(path, e))?;
    ensure!(metadata.len() > 0, FormError::empty_file(path));
    Ok(metadata.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::io;
    use tempfile::TempDir;

    use crate::protocol::StreamError;

    const BOUNDARY: &str = "AaB03x";

    fn fixture(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).expect("write fixture file");
        path
    }

    fn field_part(first: bool, name: &str, value: &str) -> String {
        let delimiter = if first { format!("--{BOUNDARY}\r\n") } else { format!("\r\n--{BOUNDARY}\r\n") };
        format!("{delimiter}Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
    }

    fn file_header(name: &str, filename: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
    }

    fn closing() -> String {
        format!("\r\n--{BOUNDARY}--\r\n")
    }

    async fn drain(submission: ContentSubmission) -> (String, u64) {
        let content_length = submission.content_length();
        let payload = submission.into_body().collect().await.expect("drain payload").to_bytes();
        assert_eq!(payload.len() as u64, content_length, "drained bytes must match the advertised length");
        (String::from_utf8(payload.to_vec()).expect("utf8 payload"), content_length)
    }

    #[tokio::test]
    async fn fields_only_render_in_call_order() {
        let mut form = Form::with_boundary(BOUNDARY).expect("valid boundary");
        form.add_field("key1", "value1").expect("add key1");
        form.add_field("key2", "value2").expect("add key2");
        form.add_field("key3", "value3").expect("add key3");

        let (payload, _) = drain(form.finalize()).await;

        let expected = format!(
            "{}{}{}{}",
            field_part(true, "key1", "value1"),
            field_part(false, "key2", "value2"),
            field_part(false, "key3", "value3"),
            closing()
        );
        assert_eq!(payload, expected);
    }

    #[tokio::test]
    async fn files_only_are_separated_pairwise() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = fixture(&dir, "a.txt", "some content");
        let second = fixture(&dir, "b.txt", "some more content");

        let mut form = Form::with_boundary(BOUNDARY).expect("valid boundary");
        form.add_file("something[file1]", &first).await.expect("add first file");
        form.add_file("something[file2]", &second).await.expect("add second file");

        let (payload, _) = drain(form.finalize()).await;

        let expected = format!(
            "{}some content\r\n{}some more content{}",
            file_header("something[file1]", "a.txt"),
            file_header("something[file2]", "b.txt"),
            closing()
        );
        assert_eq!(payload, expected);

        // the scenario from the reference test suite: substrings in order
        let positions = [
            payload.find("name=\"something[file1]\"").expect("first file name"),
            payload.find("some content").expect("first file content"),
            payload.find("name=\"something[file2]\"").expect("second file name"),
            payload.find("some more content").expect("second file content"),
        ];
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn one_separator_between_last_file_and_first_field() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = fixture(&dir, "upload.bin", "file body");

        let mut form = Form::with_boundary(BOUNDARY).expect("valid boundary");
        form.add_field("version", "2.1.0").expect("add field");
        form.add_file("upload", &path).await.expect("add file");

        let (payload, _) = drain(form.finalize()).await;

        // the file precedes the field in the payload regardless of call order
        let expected = format!(
            "{}file body\r\n{}{}",
            file_header("upload", "upload.bin"),
            field_part(true, "version", "2.1.0"),
            closing()
        );
        assert_eq!(payload, expected);
    }

    #[tokio::test]
    async fn no_parts_yield_the_bare_closing_marker() {
        let form = Form::with_boundary(BOUNDARY).expect("valid boundary");
        let (payload, content_length) = drain(form.finalize()).await;

        assert_eq!(payload, closing());
        assert_eq!(content_length, (BOUNDARY.len() + 8) as u64);
    }

    #[tokio::test]
    async fn empty_file_is_rejected_without_registering() {
        let dir = tempfile::tempdir().expect("tempdir");
        let empty = fixture(&dir, "empty.txt", "");

        let mut form = Form::with_boundary(BOUNDARY).expect("valid boundary");
        let err = form.add_file("foo", &empty).await.expect_err("empty file must be rejected");

        assert!(matches!(err, FormError::EmptyFile { .. }));
        assert!(err.to_string().contains("file provided has no content"));

        // no entry was added: the payload is the bare closing marker
        let (payload, _) = drain(form.finalize()).await;
        assert_eq!(payload, closing());
    }

    #[tokio::test]
    async fn missing_file_is_rejected_and_form_stays_usable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = fixture(&dir, "good.txt", "real content");

        let mut form = Form::with_boundary(BOUNDARY).expect("valid boundary");
        let err = form.add_file("foo", "/file/does/not/exist").await.expect_err("missing file");

        match err {
            FormError::FileUnreadable { source, .. } => assert_eq!(source.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected error: {other:?}"),
        }

        form.add_file("foo", &good).await.expect("retry with corrected path");
        let (payload, _) = drain(form.finalize()).await;
        assert_eq!(payload, format!("{}real content{}", file_header("foo", "good.txt"), closing()));
    }

    #[tokio::test]
    async fn invalid_field_name_leaves_length_untouched() {
        let mut form = Form::with_boundary(BOUNDARY).expect("valid boundary");
        let err = form.add_field("bad\r\nname", "value").expect_err("CRLF in name");
        assert!(matches!(err, FormError::InvalidPartName { .. }));

        let (payload, _) = drain(form.finalize()).await;
        assert_eq!(payload, closing());
    }

    #[tokio::test]
    async fn mixed_form_reports_exact_length() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = fixture(&dir, "one.txt", "some content");
        let second = fixture(&dir, "two.txt", "some more content");

        let mut form = Form::with_boundary(BOUNDARY).expect("valid boundary");
        form.add_file("f1", &first).await.expect("add first file");
        form.add_file("f2", &second).await.expect("add second file");
        form.add_field("key1", "value1").expect("add key1");
        form.add_field("key2", "value2").expect("add key2");

        let submission = form.finalize();
        assert_eq!(submission.content_type(), format!("multipart/form-data; boundary={BOUNDARY}"));

        // drain() asserts the advertised length is exact
        let (payload, _) = drain(submission).await;
        assert!(payload.ends_with(&closing()));
    }

    #[tokio::test]
    async fn file_vanishing_before_streaming_errors_the_body() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = fixture(&dir, "volatile.txt", "here today");

        let mut form = Form::with_boundary(BOUNDARY).expect("valid boundary");
        form.add_file("volatile", &path).await.expect("add file");

        let submission = form.finalize();
        std::fs::remove_file(&path).expect("remove fixture");

        let err = submission.into_body().collect().await.expect_err("streaming must fail");
        let StreamError::Read { source, .. } = err;
        assert_eq!(source.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn random_boundary_reaches_the_content_type() {
        let form = Form::new();
        let boundary = form.boundary().to_string();
        assert_eq!(boundary.len(), 60);

        let submission = form.finalize();
        assert_eq!(submission.content_type(), format!("multipart/form-data; boundary={boundary}"));
    }

    #[test]
    fn invalid_boundary_is_rejected() {
        assert!(matches!(Form::with_boundary("bad{boundary}"), Err(FormError::InvalidBoundary { .. })));
    }
}
