// Copyright 2016-2020 mime-multipart Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The encoder state machine: iterates a form's parts and writes them to
//! an abstract sink.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::decode::DEFAULT_CHUNKSIZE;
use crate::error::Error;
use crate::grammar::Boundary;
use crate::part::{EncodeForm, EncodeValue};

/// Encoder configuration.
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    /// Size, in bytes, of the pieces a file-backed part is streamed in.
    pub chunksize: usize,
}

impl Default for EncodeOptions {
    fn default() -> EncodeOptions {
        EncodeOptions {
            chunksize: DEFAULT_CHUNKSIZE,
        }
    }
}

/// The push sink the encoder writes to: a required `write`, and a
/// `write_file` that defaults to a seek-and-copy loop in `chunksize`
/// pieces. A sink wanting sendfile-like behavior overrides `write_file`.
pub trait Sink {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;

    fn write_file(
        &mut self,
        file: &mut File,
        length: u64,
        offset: u64,
        chunksize: usize,
    ) -> io::Result<u64> {
        file.seek(SeekFrom::Start(offset))?;
        let mut remaining = length;
        let mut chunk = vec![0u8; chunksize.max(1)];
        let mut total = 0u64;
        while remaining > 0 {
            let want = remaining.min(chunk.len() as u64) as usize;
            let n = file.read(&mut chunk[..want])?;
            if n == 0 {
                break;
            }
            self.write(&chunk[..n])?;
            total += n as u64;
            remaining -= n as u64;
        }
        Ok(total)
    }
}

impl<W: Write> Sink for W {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.write_all(bytes)?;
        Ok(bytes.len())
    }
}

fn w<W: Sink + ?Sized>(writer: &mut W, bytes: &[u8]) -> Result<u64, Error> {
    writer
        .write(bytes)
        .map(|n| n as u64)
        .map_err(Error::WriterFailure)
}

/// What a resolved entry will stream as its body, per the entry's
/// priority: an open handle first, then a path, then in-memory data.
enum Resolved<'a> {
    Data(String),
    FileHandle(String, &'a mut File),
    FilePath(String, PathBuf),
}

fn resolve(value: &mut EncodeValue) -> Option<Resolved<'_>> {
    match value {
        EncodeValue::Scalar(s) => Some(Resolved::Data(s.to_text())),
        EncodeValue::Part(ep) => {
            if let Some(filename) = ep.filename.clone() {
                if let Some(file) = ep.file.as_mut() {
                    Some(Resolved::FileHandle(filename, file))
                } else if let Some(path) = ep.pathname.clone() {
                    Some(Resolved::FilePath(filename, path))
                } else {
                    None
                }
            } else {
                ep.data.as_ref().map(|s| Resolved::Data(s.to_text()))
            }
        }
    }
}

fn write_content_disposition_file<W: Sink + ?Sized>(
    writer: &mut W,
    name: &str,
    filename: &str,
) -> Result<u64, Error> {
    let mut count = 0;
    count += w(writer, b"Content-Disposition: form-data; name=\"")?;
    count += w(writer, name.as_bytes())?;
    count += w(writer, b"\"; filename=\"")?;
    count += w(writer, filename.as_bytes())?;
    count += w(writer, b"\"\r\n\r\n")?;
    Ok(count)
}

fn encode_entry<W: Sink + ?Sized>(
    writer: &mut W,
    boundary: &Boundary,
    name: &str,
    value: &mut EncodeValue,
    chunksize: usize,
) -> Result<u64, Error> {
    let header = match value {
        EncodeValue::Part(ep) => ep.header.clone(),
        EncodeValue::Scalar(_) => None,
    };

    let resolved = match resolve(value) {
        Some(r) => r,
        None => {
            log::warn!(
                "form-multipart: skipping part {:?}: filename is set but neither \
                 file nor pathname was provided",
                name
            );
            return Ok(0);
        }
    };

    let mut count = 0u64;
    count += w(writer, boundary.dash_boundary())?;
    count += w(writer, b"\r\n")?;

    if let Some(header) = &header {
        for (hname, hvalue) in header.iter() {
            count += w(writer, hname.as_str().as_bytes())?;
            count += w(writer, b": ")?;
            count += w(writer, hvalue.as_bytes())?;
            count += w(writer, b"\r\n")?;
        }
    }

    match resolved {
        Resolved::Data(text) => {
            count += w(writer, b"Content-Disposition: form-data; name=\"")?;
            count += w(writer, name.as_bytes())?;
            count += w(writer, b"\"\r\n\r\n")?;
            count += w(writer, text.as_bytes())?;
        }
        Resolved::FileHandle(filename, file) => {
            count += write_content_disposition_file(writer, name, &filename)?;
            let length = file.metadata().map_err(Error::Io)?.len();
            count += writer
                .write_file(file, length, 0, chunksize)
                .map_err(Error::WriterFailure)?;
        }
        Resolved::FilePath(filename, path) => {
            count += write_content_disposition_file(writer, name, &filename)?;
            let mut file = File::open(&path).map_err(|e| Error::FileOpenFailed {
                path: path.clone(),
                name: name.to_owned(),
                cause: e,
            })?;
            let length = file.metadata().map_err(Error::Io)?.len();
            count += writer
                .write_file(&mut file, length, 0, chunksize)
                .map_err(Error::WriterFailure)?;
        }
    }

    count += w(writer, b"\r\n")?;
    Ok(count)
}

/// Encodes `form` to `writer` using `boundary`, as a multipart/form-data
/// byte stream. Returns the number of bytes written.
///
/// Iterates `form` in unspecified order; within a name's entry sequence,
/// order is preserved.
pub fn encode<W: Sink + ?Sized>(
    writer: &mut W,
    form: &mut EncodeForm,
    boundary: &Boundary,
    options: &EncodeOptions,
) -> Result<u64, Error> {
    if options.chunksize == 0 {
        return Err(Error::InvalidChunksize);
    }

    let mut count = 0u64;
    for (name, values) in form.iter_mut() {
        for value in values.iter_mut() {
            count += encode_entry(writer, boundary, name, value, options.chunksize)?;
        }
    }
    count += w(writer, boundary.dash_boundary())?;
    count += w(writer, boundary.close_suffix())?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::{EncodePart, Scalar};
    use std::collections::HashMap;
    use std::io::Write as _;

    #[test]
    fn basic_form_encodes_to_expected_bytes() {
        let _ = ::env_logger::try_init();
        let boundary = Boundary::new("B").unwrap();
        let mut form: EncodeForm = HashMap::new();
        form.insert(
            "foo".to_owned(),
            vec![
                EncodeValue::Scalar(Scalar::from("bar")),
                EncodeValue::Scalar(Scalar::from(true)),
            ],
        );

        let mut out: Vec<u8> = Vec::new();
        encode(&mut out, &mut form, &boundary, &EncodeOptions::default()).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "--B\r\nContent-Disposition: form-data; name=\"foo\"\r\n\r\nbar\r\n\
             --B\r\nContent-Disposition: form-data; name=\"foo\"\r\n\r\ntrue\r\n--B--"
        );
    }

    #[test]
    fn boundary_appears_once_per_part_and_once_at_close() {
        let _ = ::env_logger::try_init();
        let boundary = Boundary::new("Bnd").unwrap();
        let mut form: EncodeForm = HashMap::new();
        form.insert(
            "a".to_owned(),
            vec![EncodeValue::Scalar(Scalar::from("1"))],
        );
        form.insert(
            "b".to_owned(),
            vec![EncodeValue::Scalar(Scalar::from("2"))],
        );

        let mut out: Vec<u8> = Vec::new();
        encode(&mut out, &mut form, &boundary, &EncodeOptions::default()).unwrap();
        let s = String::from_utf8(out).unwrap();

        assert_eq!(s.matches("--Bnd\r\n").count(), 2);
        assert_eq!(s.matches("--Bnd--").count(), 1);
    }

    #[test]
    fn file_part_streams_from_pathname() {
        let _ = ::env_logger::try_init();
        let boundary = Boundary::new("B").unwrap();
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"HELLO").unwrap();

        let mut form: EncodeForm = HashMap::new();
        form.insert(
            "f".to_owned(),
            vec![EncodeValue::Part(EncodePart::path(
                "a.txt",
                tmp.path(),
            ))],
        );

        let mut out: Vec<u8> = Vec::new();
        encode(&mut out, &mut form, &boundary, &EncodeOptions::default()).unwrap();
        let s = String::from_utf8(out).unwrap();

        assert!(s.contains("filename=\"a.txt\""));
        assert!(s.contains("HELLO"));
    }

    #[test]
    fn file_part_without_file_or_pathname_is_skipped() {
        let _ = ::env_logger::try_init();
        let boundary = Boundary::new("B").unwrap();
        let mut form: EncodeForm = HashMap::new();
        form.insert(
            "f".to_owned(),
            vec![EncodeValue::Part(EncodePart {
                filename: Some("a.txt".to_owned()),
                ..Default::default()
            })],
        );

        let mut out: Vec<u8> = Vec::new();
        encode(&mut out, &mut form, &boundary, &EncodeOptions::default()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "--B--");
    }

    #[test]
    fn zero_chunksize_is_rejected() {
        let _ = ::env_logger::try_init();
        let boundary = Boundary::new("B").unwrap();
        let mut form: EncodeForm = HashMap::new();
        let mut out: Vec<u8> = Vec::new();
        let options = EncodeOptions { chunksize: 0 };
        assert!(matches!(
            encode(&mut out, &mut form, &boundary, &options),
            Err(Error::InvalidChunksize)
        ));
    }
}
