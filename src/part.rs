// Copyright 2016-2020 mime-multipart Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The decoded and to-be-encoded part/form data model.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use http::header::HeaderMap;
use mime::Mime;

/// Removes its path on drop unless `disarm`ed.
#[derive(Debug)]
pub struct TempFileGuard {
    path: Option<PathBuf>,
}

impl TempFileGuard {
    pub fn new(path: PathBuf) -> TempFileGuard {
        TempFileGuard { path: Some(path) }
    }

    /// Detaches the guard: the file will not be removed when this value
    /// (or whatever embeds it) is dropped. Callers that move the temp
    /// file to a permanent location must call this first.
    pub fn disarm(&mut self) {
        self.path = None;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// A file-bearing decoded part: an open handle positioned at offset 0,
/// the path it lives at, and the lifetime guard that removes it on drop.
#[derive(Debug)]
pub struct FilePart {
    pub file: File,
    pub pathname: PathBuf,
    pub(crate) guard: TempFileGuard,
}

impl FilePart {
    pub(crate) fn new(file: File, pathname: PathBuf, guard: TempFileGuard) -> FilePart {
        FilePart {
            file,
            pathname,
            guard,
        }
    }

    /// Disarms this part's temp-file guard: the caller takes over
    /// responsibility for removing the file.
    pub fn do_not_delete_on_drop(&mut self) {
        self.guard.disarm();
    }
}

/// Exactly one of an in-memory string or a file-backed payload.
#[derive(Debug)]
pub enum PartBody {
    Data(String),
    File(FilePart),
}

/// A single decoded multipart part.
#[derive(Debug)]
pub struct Part {
    pub name: String,
    pub filename: Option<String>,
    pub header: HeaderMap,
    pub body: PartBody,
}

impl Part {
    /// The `Content-Type` specified in the header, if any and if it
    /// parses as a `Mime`.
    pub fn content_type(&self) -> Option<Mime> {
        self.header
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Mime::from_str(v).ok())
    }

    /// Convenience accessor: `Some(data)` for in-memory parts, `None` for
    /// file-bearing parts.
    pub fn data(&self) -> Option<&str> {
        match &self.body {
            PartBody::Data(s) => Some(s),
            PartBody::File(_) => None,
        }
    }

    /// Convenience accessor: `Some(file_part)` for file-bearing parts.
    pub fn file(&self) -> Option<&FilePart> {
        match &self.body {
            PartBody::File(f) => Some(f),
            PartBody::Data(_) => None,
        }
    }
}

/// A decoded form: name → ordered sequence of parts sharing that name.
/// Insertion order within a name's sequence reflects wire order; the
/// top-level map order is unspecified.
pub type Form = HashMap<String, Vec<Part>>;

/// The dynamic scalar value an encoder entry may carry directly.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    /// The textual representation written to the wire. Booleans render
    /// as `"true"`/`"false"`.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::String(s) => s.clone(),
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => if *b { "true" } else { "false" }.to_owned(),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Scalar {
        Scalar::String(s.to_owned())
    }
}
impl From<String> for Scalar {
    fn from(s: String) -> Scalar {
        Scalar::String(s)
    }
}
impl From<i64> for Scalar {
    fn from(n: i64) -> Scalar {
        Scalar::Int(n)
    }
}
impl From<f64> for Scalar {
    fn from(n: f64) -> Scalar {
        Scalar::Float(n)
    }
}
impl From<bool> for Scalar {
    fn from(b: bool) -> Scalar {
        Scalar::Bool(b)
    }
}

/// A record-shaped entry for the encoder: optional headers and a body
/// selector resolved by priority (open handle, then path, then data).
#[derive(Debug, Default)]
pub struct EncodePart {
    pub header: Option<HeaderMap>,
    pub filename: Option<String>,
    /// Priority 1: an already-open file handle to stream from.
    pub file: Option<File>,
    /// Priority 2 (only consulted when `file` is `None`): a path the
    /// encoder opens and closes itself.
    pub pathname: Option<PathBuf>,
    /// Priority 4 (only consulted when `filename` is `None`): an
    /// in-memory scalar value.
    pub data: Option<Scalar>,
}

impl EncodePart {
    pub fn data(name: impl Into<Scalar>) -> EncodePart {
        EncodePart {
            data: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn file(filename: impl Into<String>, file: File) -> EncodePart {
        EncodePart {
            filename: Some(filename.into()),
            file: Some(file),
            ..Default::default()
        }
    }

    pub fn path(filename: impl Into<String>, pathname: impl AsRef<Path>) -> EncodePart {
        EncodePart {
            filename: Some(filename.into()),
            pathname: Some(pathname.as_ref().to_owned()),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, header: HeaderMap) -> EncodePart {
        self.header = Some(header);
        self
    }
}

/// A union per entry in a form's value sequence: a bare scalar, or a
/// record with an explicit body selector.
#[derive(Debug)]
pub enum EncodeValue {
    Scalar(Scalar),
    Part(EncodePart),
}

impl From<Scalar> for EncodeValue {
    fn from(v: Scalar) -> EncodeValue {
        EncodeValue::Scalar(v)
    }
}
impl From<&str> for EncodeValue {
    fn from(v: &str) -> EncodeValue {
        EncodeValue::Scalar(Scalar::from(v))
    }
}
impl From<String> for EncodeValue {
    fn from(v: String) -> EncodeValue {
        EncodeValue::Scalar(Scalar::from(v))
    }
}
impl From<bool> for EncodeValue {
    fn from(v: bool) -> EncodeValue {
        EncodeValue::Scalar(Scalar::from(v))
    }
}
impl From<EncodePart> for EncodeValue {
    fn from(v: EncodePart) -> EncodeValue {
        EncodeValue::Part(v)
    }
}

/// A form to be encoded: name → ordered sequence of entries.
pub type EncodeForm = HashMap<String, Vec<EncodeValue>>;
