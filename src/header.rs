// Copyright 2016-2020 mime-multipart Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Header-block parsing and `Content-Disposition` parameter extraction.

use std::collections::HashMap;
use std::str::FromStr;

use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::buffer::{ChunkedBuffer, Source};
use crate::error::Error;

const WSP: [u8; 2] = [b' ', b'\t'];

fn trim_trailing_wsp(mut line: &[u8]) -> &[u8] {
    while let Some((&last, rest)) = line.split_last() {
        if WSP.contains(&last) {
            line = rest;
        } else {
            break;
        }
    }
    line
}

/// Reads one line from the buffer, refilling from `source` as needed.
/// Accepts a bare LF or a CRLF terminator. Returns the line content with
/// the terminator stripped, but trailing transport whitespace (spaces,
/// tabs) still attached — callers trim that per the grammar position they
/// need it trimmed at.
pub(crate) fn read_raw_line<S: Source + ?Sized>(
    buf: &mut ChunkedBuffer,
    source: &mut S,
) -> Result<Vec<u8>, Error> {
    loop {
        if let Some(pos) = buf.unconsumed().iter().position(|&b| b == b'\n') {
            let line_with_cr = &buf.unconsumed()[..pos];
            let line = match line_with_cr.split_last() {
                Some((b'\r', rest)) => rest.to_vec(),
                _ => line_with_cr.to_vec(),
            };
            buf.consume(pos + 1);
            return Ok(line);
        }
        buf.read_chunk(source)?;
    }
}

/// Consumes bytes up to and including the first blank line, returning the
/// accumulated headers. A line failing the relaxed `HEADER` grammar is a
/// fatal `InvalidHeader` error carrying the offending line.
///
/// Continuation lines (RFC 822 folding) are not recognized: a line
/// starting with whitespace is treated as an ordinary (and likely
/// malformed) header line, matching this crate's ancestor.
pub fn parse_headers<S: Source + ?Sized>(
    buf: &mut ChunkedBuffer,
    source: &mut S,
) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();
    loop {
        let raw = read_raw_line(buf, source)?;
        let line = trim_trailing_wsp(&raw);
        if line.is_empty() {
            return Ok(headers);
        }

        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or_else(|| Error::InvalidHeader {
                line: String::from_utf8_lossy(&raw).into_owned(),
            })?;
        let name_bytes = trim_trailing_wsp(&line[..colon]);
        if name_bytes.is_empty() {
            return Err(Error::InvalidHeader {
                line: String::from_utf8_lossy(&raw).into_owned(),
            });
        }
        let mut value_start = colon + 1;
        while value_start < line.len() && WSP.contains(&line[value_start]) {
            value_start += 1;
        }
        let value_bytes = &line[value_start..];

        let name = HeaderName::from_str(&String::from_utf8_lossy(name_bytes))
            .map_err(|_| Error::InvalidHeaderNameOrValue)?;
        let value =
            HeaderValue::from_bytes(value_bytes).map_err(|_| Error::InvalidHeaderNameOrValue)?;
        headers.append(name, value);
    }
}

/// Splits a `Content-Disposition` value into its `key=value` parameters,
/// tolerating unquoted values, expressed as an explicit segment split
/// rather than a regex. Keys are lowercased; values have one layer of
/// surrounding double quotes stripped if present.
pub fn parse_disposition_params(value: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for segment in value.split(';').skip(1) {
        let segment = segment.trim();
        let Some(eq) = segment.find('=') else {
            continue;
        };
        let key = segment[..eq].trim().to_ascii_lowercase();
        if key.is_empty() {
            continue;
        }
        let mut val = segment[eq + 1..].trim();
        if val.len() >= 2 && val.starts_with('"') && val.ends_with('"') {
            val = &val[1..val.len() - 1];
        }
        params.insert(key, val.to_owned());
    }
    params
}

/// Extracts `name` and `filename` from a part's `Content-Disposition`
/// header, if present. `filename*` always wins over `filename` when both
/// are present (see DESIGN.md).
pub fn content_disposition_name_and_filename(
    headers: &HeaderMap,
) -> Result<(Option<String>, Option<String>), Error> {
    let Some(cd) = headers.get("content-disposition") else {
        return Ok((None, None));
    };
    let value = cd.to_str()?;
    let params = parse_disposition_params(value);
    let name = params.get("name").cloned();
    let filename = params
        .get("filename*")
        .or_else(|| params.get("filename"))
        .cloned();
    Ok((name, filename))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(input: &[u8]) -> HeaderMap {
        let mut src = Cursor::new(input.to_vec());
        let mut buf = ChunkedBuffer::new(4096).unwrap();
        parse_headers(&mut buf, &mut src).unwrap()
    }

    #[test]
    fn parses_simple_headers() {
        let headers = parse(b"Content-Type: text/plain\r\nX-Foo: bar\r\n\r\n");
        assert_eq!(headers.get("content-type").unwrap(), "text/plain");
        assert_eq!(headers.get("x-foo").unwrap(), "bar");
    }

    #[test]
    fn accepts_bare_lf() {
        let headers = parse(b"Content-Type: text/plain\nX-Foo: bar\n\n");
        assert_eq!(headers.get("content-type").unwrap(), "text/plain");
        assert_eq!(headers.get("x-foo").unwrap(), "bar");
    }

    #[test]
    fn trims_trailing_whitespace_before_terminator() {
        let headers = parse(b"X-Foo: bar   \r\n\r\n");
        assert_eq!(headers.get("x-foo").unwrap(), "bar");
    }

    #[test]
    fn repeated_header_name_appends() {
        let headers = parse(b"X-Foo: a\r\nX-Foo: b\r\n\r\n");
        let values: Vec<_> = headers.get_all("x-foo").iter().collect();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn missing_colon_is_invalid_header() {
        let mut src = Cursor::new(b"not a header\r\n\r\n".to_vec());
        let mut buf = ChunkedBuffer::new(4096).unwrap();
        let err = parse_headers(&mut buf, &mut src).unwrap_err();
        match err {
            Error::InvalidHeader { line } => assert_eq!(line, "not a header"),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn disposition_name_and_filename() {
        let mut headers = HeaderMap::new();
        headers.append(
            "content-disposition",
            HeaderValue::from_static("form-data; name=\"f\"; filename=\"a.txt\""),
        );
        let (name, filename) = content_disposition_name_and_filename(&headers).unwrap();
        assert_eq!(name.as_deref(), Some("f"));
        assert_eq!(filename.as_deref(), Some("a.txt"));
    }

    #[test]
    fn filename_star_overrides_filename() {
        let mut headers = HeaderMap::new();
        headers.append(
            "content-disposition",
            HeaderValue::from_static(
                "form-data; name=\"f\"; filename=\"plain.txt\"; filename*=\"encoded.txt\"",
            ),
        );
        let (_, filename) = content_disposition_name_and_filename(&headers).unwrap();
        assert_eq!(filename.as_deref(), Some("encoded.txt"));
    }

    #[test]
    fn missing_disposition_yields_none() {
        let headers = HeaderMap::new();
        let (name, filename) = content_disposition_name_and_filename(&headers).unwrap();
        assert!(name.is_none());
        assert!(filename.is_none());
    }
}
