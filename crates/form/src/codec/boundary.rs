//! Boundary token handling.
//!
//! A boundary delimits the parts of a multipart body and must never appear
//! inside any part's content. Generated tokens are 60 hex characters drawn
//! from 30 random bytes, so a collision with payload content is not a
//! practical concern.

use std::fmt::Write;

use rand::RngCore;

use crate::ensure;
use crate::protocol::FormError;

/// Maximum boundary length permitted by RFC 2046.
const MAX_BOUNDARY_LEN: usize = 70;

/// Characters that force the boundary parameter to be quoted in the
/// `Content-Type` header value.
const TSPECIALS: &str = "()<>@,;:\\\"/[]?= ";

/// Generates a fresh random boundary token.
pub fn generate() -> String {
    let mut raw = [0u8; 30];
    rand::rng().fill_bytes(&mut raw);

    let mut token = String::with_capacity(raw.len() * 2);
    for byte in raw {
        // writing into a String cannot fail
        let _ = write!(token, "{byte:02x}");
    }
    token
}

/// Validates a caller-supplied boundary token.
///
/// RFC 2046 limits boundaries to 70 characters from a restricted set, with
/// no trailing space.
pub fn validate(boundary: &str) -> Result<(), FormError> {
    ensure!(!boundary.is_empty(), FormError::invalid_boundary("boundary must not be empty"));
    ensure!(
        boundary.len() <= MAX_BOUNDARY_LEN,
        FormError::invalid_boundary(format!("boundary exceeds {MAX_BOUNDARY_LEN} characters"))
    );
    ensure!(!boundary.ends_with(' '), FormError::invalid_boundary("boundary must not end with a space"));

    for ch in boundary.chars() {
        let allowed = ch.is_ascii_alphanumeric()
            || matches!(ch, '\'' | '(' | ')' | '+' | '_' | ',' | '-' | '.' | '/' | ':' | '=' | '?' | ' ');
        ensure!(allowed, FormError::invalid_boundary(format!("invalid character {ch:?} in boundary")));
    }

    Ok(())
}

/// Renders the `Content-Type` header value advertising `boundary`.
pub fn content_type(boundary: &str) -> String {
    if boundary.chars().any(|ch| TSPECIALS.contains(ch)) {
        format!("{}; boundary=\"{boundary}\"", mime::MULTIPART_FORM_DATA)
    } else {
        format!("{}; boundary={boundary}", mime::MULTIPART_FORM_DATA)
    }
}
