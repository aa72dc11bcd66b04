// Copyright 2016-2020 mime-multipart Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::io;
use std::path::PathBuf;

use http::header::ToStrError;

/// An error type for the `form-multipart` crate.
///
/// Variants fall into three informal buckets: programmer errors raised
/// synchronously at the API boundary before any I/O, encode-time errors,
/// and decode-time errors. They are kept in a single flat enum, matching
/// how this crate's ancestor represents its errors.
pub enum Error {
    /// A boundary octet outside `bcharsnospace ∪ {SPACE}` was supplied to
    /// the encoder or decoder.
    InvalidBoundary { position: usize, byte: u8 },
    /// `chunksize` was zero.
    InvalidChunksize,

    /// `pathname` could not be opened for streaming.
    FileOpenFailed {
        path: PathBuf,
        name: String,
        cause: io::Error,
    },
    /// The sink returned an error from `write` or `write_file`.
    WriterFailure(io::Error),

    /// The source reached EOF before a terminator was located.
    InsufficientData,
    /// A header line failed the relaxed `HEADER` grammar.
    InvalidHeader { line: String },
    /// `Content-Disposition` lacked a `name` parameter.
    MissingName,
    /// The close-delimiter was seen before any body part.
    PrematureClose,
    /// A part body exceeded `maxsize`.
    BodyTooLarge,
    /// The source reader returned an error.
    ReaderFailure(io::Error),
    /// Temp file creation, writing, or rewinding failed.
    TempFileFailure(io::Error),

    /// A header value could not be converted to a `HeaderValue`.
    InvalidHeaderNameOrValue,
    /// A `content-type` header value could not be converted to `&str`.
    ToStr(ToStrError),
    /// Uncategorized I/O error.
    Io(io::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<ToStrError> for Error {
    fn from(err: ToStrError) -> Error {
        Error::ToStr(err)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidBoundary { position, byte } => write!(
                f,
                "invalid boundary: byte {:#04x} at position {} is not a legal bchar",
                byte, position
            ),
            Error::InvalidChunksize => "chunksize must be a positive integer".fmt(f),
            Error::FileOpenFailed { path, name, cause } => {
                write!(f, "could not open {:?} for part {:?}: {}", path, name, cause)
            }
            Error::WriterFailure(e) => write!(f, "writer failure: {}", e),
            Error::InsufficientData => "source exhausted before a terminator was found".fmt(f),
            Error::InvalidHeader { line } => write!(f, "invalid header line: {:?}", line),
            Error::MissingName => "Content-Disposition lacked a name parameter".fmt(f),
            Error::PrematureClose => "close-delimiter seen before any body part".fmt(f),
            Error::BodyTooLarge => "part body exceeded maxsize".fmt(f),
            Error::ReaderFailure(e) => write!(f, "reader failure: {}", e),
            Error::TempFileFailure(e) => write!(f, "temp file failure: {}", e),
            Error::InvalidHeaderNameOrValue => "could not parse header name or value".fmt(f),
            Error::ToStr(e) => write!(f, "header value not ASCII: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)?;
        if let Some(source) = self.source() {
            write!(f, ": {:?}", source)?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::WriterFailure(e) => Some(e),
            Error::ReaderFailure(e) => Some(e),
            Error::TempFileFailure(e) => Some(e),
            Error::FileOpenFailed { cause, .. } => Some(cause),
            Error::ToStr(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}
