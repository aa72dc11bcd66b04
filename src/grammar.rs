// Copyright 2016-2020 mime-multipart Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Boundary grammar (RFC 2046 §5.1.1) and the delimiters derived from it.

use crate::error::Error;
use textnonce::TextNonce;

/// `bcharsnospace = DIGIT / ALPHA / "'" / "(" / ")" / "+" / "_" / "," /
/// "-" / "." / "/" / ":" / "=" / "?"`. Interior SPACE is also permitted;
/// see `is_valid_boundary`.
fn is_bchar(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(
            b,
            b'\'' | b'(' | b')' | b'+' | b'_' | b',' | b'-' | b'.' | b'/' | b':' | b'=' | b'?'
        )
}

/// Validates a boundary string against the `bcharsnospace` grammar with
/// interior SPACE permitted. The final octet must be a
/// `bcharsnospace` (a trailing space is rejected). Does not enforce the
/// 70-octet length cap — real-world boundaries routinely exceed it.
pub fn is_valid_boundary(s: &str) -> Result<(), Error> {
    let bytes = s.as_bytes();
    if bytes.is_empty() {
        return Err(Error::InvalidBoundary {
            position: 0,
            byte: 0,
        });
    }
    for (i, &b) in bytes.iter().enumerate() {
        let last = i == bytes.len() - 1;
        let ok = is_bchar(b) || (b == b' ' && !last);
        if !ok {
            return Err(Error::InvalidBoundary { position: i, byte: b });
        }
    }
    Ok(())
}

/// A validated boundary with its derived delimiters cached.
#[derive(Clone, Debug)]
pub struct Boundary {
    raw: String,
    dash_boundary: Vec<u8>,
    delimiter_cr: Vec<u8>,
}

impl Boundary {
    pub fn new(raw: &str) -> Result<Boundary, Error> {
        is_valid_boundary(raw)?;
        let mut dash_boundary = Vec::with_capacity(raw.len() + 2);
        dash_boundary.extend_from_slice(b"--");
        dash_boundary.extend_from_slice(raw.as_bytes());

        let mut delimiter_cr = Vec::with_capacity(dash_boundary.len() + 2);
        delimiter_cr.extend_from_slice(b"\r\n");
        delimiter_cr.extend_from_slice(&dash_boundary);

        Ok(Boundary {
            raw: raw.to_owned(),
            dash_boundary,
            delimiter_cr,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// `"--" + boundary`.
    pub fn dash_boundary(&self) -> &[u8] {
        &self.dash_boundary
    }

    /// `"\r\n" + dash_boundary`. The CR may also be absent on the wire
    /// (bare LF); the body scanner accounts for that separately.
    pub fn delimiter_cr(&self) -> &[u8] {
        &self.delimiter_cr
    }

    /// `"--"`, appended immediately after `dash_boundary` for the
    /// terminal (close) delimiter.
    pub fn close_suffix(&self) -> &[u8] {
        b"--"
    }
}

/// Generates a boundary statistically unlikely to be found within the
/// content of the parts, drawn entirely from `bcharsnospace`.
///
/// Not required by the encoder (callers always supply their own
/// boundary), but a convenience carried over from this crate's ancestor.
pub fn generate_boundary() -> String {
    TextNonce::sized_urlsafe(56)
        .unwrap()
        .into_string()
        .chars()
        .map(|ch| match ch {
            '_' => '-',
            '-' => '-',
            c if c.is_ascii_alphanumeric() => c,
            _ => '-',
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_boundaries() {
        assert!(is_valid_boundary("----WebKitFormBoundary7MA4YWxkTrZu0gW").is_ok());
        assert!(is_valid_boundary("AaB03x").is_ok());
        assert!(is_valid_boundary("a b c").is_ok());
    }

    #[test]
    fn rejects_illegal_octet() {
        let err = is_valid_boundary("foo#bar").unwrap_err();
        match err {
            Error::InvalidBoundary { position, byte } => {
                assert_eq!(position, 3);
                assert_eq!(byte, b'#');
            }
            _ => panic!("wrong error variant"),
        }
    }

    #[test]
    fn rejects_trailing_space() {
        assert!(is_valid_boundary("AaB03x ").is_err());
    }

    #[test]
    fn rejects_empty() {
        assert!(is_valid_boundary("").is_err());
    }

    #[test]
    fn derived_delimiters() {
        let b = Boundary::new("B").unwrap();
        assert_eq!(b.dash_boundary(), b"--B");
        assert_eq!(b.delimiter_cr(), b"\r\n--B");
        assert_eq!(b.close_suffix(), b"--");
    }

    #[test]
    fn generated_boundary_is_valid() {
        let b = generate_boundary();
        assert!(is_valid_boundary(&b).is_ok());
    }
}
