// Copyright 2016-2020 mime-multipart Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The decoder top-level state machine: preamble discard, the
//! header/body loop, epilogue discard, and temp-file lifecycle.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::buffer::{ChunkedBuffer, Source};
use crate::error::Error;
use crate::grammar::Boundary;
use crate::header::{content_disposition_name_and_filename, parse_headers, read_raw_line};
use crate::part::{FilePart, Form, Part, PartBody, TempFileGuard};
use crate::scan::scan_body;

/// Default chunk size: the number of bytes requested per pull from the
/// source reader.
pub const DEFAULT_CHUNKSIZE: usize = 4096;

/// Default temp-file template. The suffix `_XXXXXX` (six random
/// filesystem-safe bytes) is always appended to whatever template the
/// caller supplies, including this default.
pub const DEFAULT_FILETMPL: &str = "/tmp/form_multipart";

/// Decoder configuration.
#[derive(Clone, Debug)]
pub struct DecodeOptions {
    pub filetmpl: String,
    pub maxsize: Option<u64>,
    pub chunksize: usize,
}

impl Default for DecodeOptions {
    fn default() -> DecodeOptions {
        DecodeOptions {
            filetmpl: DEFAULT_FILETMPL.to_owned(),
            maxsize: None,
            chunksize: DEFAULT_CHUNKSIZE,
        }
    }
}

fn create_temp_file(filetmpl: &str) -> Result<(File, PathBuf), Error> {
    let path = Path::new(filetmpl);
    let (dir, prefix) = match (path.parent(), path.file_name()) {
        (Some(dir), Some(name)) if !dir.as_os_str().is_empty() => {
            (dir.to_owned(), name.to_string_lossy().into_owned())
        }
        _ => (std::env::temp_dir(), filetmpl.to_owned()),
    };
    let prefix = format!("{}_", prefix);

    let named = tempfile::Builder::new()
        .prefix(&prefix)
        .rand_bytes(6)
        .tempfile_in(&dir)
        .map_err(Error::TempFileFailure)?;
    named.keep().map_err(|e| Error::TempFileFailure(e.error))
}

/// Reads lines until one equals exactly `dash_boundary`. A close-delimiter
/// line seen before any dash-boundary is a fatal `PrematureClose`. Any
/// other line is silently dropped.
fn discard_preamble<S: Source + ?Sized>(
    buf: &mut ChunkedBuffer,
    source: &mut S,
    boundary: &Boundary,
) -> Result<(), Error> {
    let dash = boundary.dash_boundary();
    let mut close = dash.to_vec();
    close.extend_from_slice(boundary.close_suffix());

    loop {
        let line = read_raw_line(buf, source)?;
        if line == dash {
            return Ok(());
        }
        if line == close {
            return Err(Error::PrematureClose);
        }
    }
}

/// Reads and discards all remaining bytes from the source until EOF.
fn discard_epilogue<S: Source + ?Sized>(
    buf: &mut ChunkedBuffer,
    source: &mut S,
) -> Result<(), Error> {
    buf.consume(buf.len());
    while buf.try_read_chunk(source)? {
        buf.consume(buf.len());
    }
    Ok(())
}

fn decode_one_part<S: Source + ?Sized>(
    buf: &mut ChunkedBuffer,
    source: &mut S,
    boundary: &Boundary,
    options: &DecodeOptions,
    form: &mut Form,
) -> Result<bool, Error> {
    let headers = parse_headers(buf, source)?;
    let (name, filename) = content_disposition_name_and_filename(&headers)?;
    let name = name.ok_or(Error::MissingName)?;

    let more = if let Some(filename) = filename {
        let (mut file, pathname) = create_temp_file(&options.filetmpl)?;
        let guard = TempFileGuard::new(pathname.clone());
        let more = scan_body(buf, source, boundary, options.maxsize, &mut file)?;
        file.seek(SeekFrom::Start(0))
            .map_err(Error::TempFileFailure)?;
        let part = Part {
            name: name.clone(),
            filename: Some(filename),
            header: headers,
            body: PartBody::File(FilePart::new(file, pathname, guard)),
        };
        form.entry(name).or_default().push(part);
        more
    } else {
        let mut data: Vec<u8> = Vec::new();
        let more = scan_body(buf, source, boundary, options.maxsize, &mut data)?;
        let text = String::from_utf8_lossy(&data).into_owned();
        let part = Part {
            name: name.clone(),
            filename: None,
            header: headers,
            body: PartBody::Data(text),
        };
        form.entry(name).or_default().push(part);
        more
    };

    Ok(more)
}

/// Walks every already-captured part, closing its file handle and
/// removing its temp file. Called on any decode failure after the driver
/// begins; every file-bearing `Part` owns a `TempFileGuard` that performs
/// the actual removal on drop.
pub fn discard_form(form: &mut Form) {
    form.clear();
}

/// Decodes a multipart/form-data byte stream from `reader` into a `Form`,
/// spilling file-bearing parts to temp files.
///
/// On any failure, every temp file created during this call is removed
/// and every open handle is closed before the error is returned.
pub fn decode<S: Source + ?Sized>(
    reader: &mut S,
    boundary: &Boundary,
    options: &DecodeOptions,
) -> Result<Form, Error> {
    let mut buf = ChunkedBuffer::new(options.chunksize)?;
    let mut form: Form = HashMap::new();

    let result = (|| -> Result<(), Error> {
        discard_preamble(&mut buf, reader, boundary)?;
        loop {
            let more = decode_one_part(&mut buf, reader, boundary, options, &mut form)?;
            if !more {
                break;
            }
        }
        discard_epilogue(&mut buf, reader)?;
        Ok(())
    })();

    match result {
        Ok(()) => Ok(form),
        Err(e) => {
            discard_form(&mut form);
            Err(e)
        }
    }
}
