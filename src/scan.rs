// Copyright 2016-2020 mime-multipart Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The delimiter-aware body scanner: streams a part body to a sink,
//! stopping at the byte preceding the next `CRLF dash-boundary` (the CR
//! may be absent), and enforcing `maxsize` along the way.

use std::fs::File;
use std::io::Write as _;

use crate::buffer::{ChunkedBuffer, Source};
use crate::error::Error;
use crate::grammar::Boundary;

/// Where scanned body bytes go: a `Vec<u8>` for in-memory parts, or a
/// temp `File` for file-bearing parts.
pub trait BodySink {
    fn write(&mut self, data: &[u8]) -> Result<(), Error>;
}

impl BodySink for Vec<u8> {
    fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        self.extend_from_slice(data);
        Ok(())
    }
}

impl BodySink for File {
    fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        self.write_all(data).map_err(Error::TempFileFailure)
    }
}

/// Streams bytes from `buf`/`source` into `sink` until the next delimiter
/// line is found. Returns `Ok(true)` if another part follows (the
/// dash-boundary was not immediately followed by `--`), `Ok(false)` if
/// this was the close-delimiter.
pub fn scan_body<S, Sk>(
    buf: &mut ChunkedBuffer,
    source: &mut S,
    boundary: &Boundary,
    maxsize: Option<u64>,
    sink: &mut Sk,
) -> Result<bool, Error>
where
    S: Source + ?Sized,
    Sk: BodySink,
{
    let dash_boundary = boundary.dash_boundary().to_vec();
    let mut written: u64 = 0;
    let mut search_from: usize = 0;

    loop {
        let decision = {
            let view = buf.unconsumed();
            let from = search_from.min(view.len());
            match view[from..].iter().position(|&b| b == b'\n') {
                None => {
                    search_from = view.len();
                    None
                }
                Some(rel) => {
                    let lf_pos = from + rel;
                    let need = lf_pos + 1 + dash_boundary.len() + 2;
                    if view.len() < need {
                        search_from = lf_pos;
                        None
                    } else {
                        let after = &view[lf_pos + 1..lf_pos + 1 + dash_boundary.len()];
                        Some((lf_pos, after == dash_boundary.as_slice()))
                    }
                }
            }
        };

        let (lf_pos, is_boundary) = match decision {
            Some(pair) => pair,
            None => {
                refill_or_fail(buf, source, maxsize)?;
                continue;
            }
        };

        if !is_boundary {
            write_segment(buf, sink, &mut written, maxsize, lf_pos + 1)?;
            search_from = 0;
            continue;
        }

        let cr_present = lf_pos > 0 && buf.unconsumed()[lf_pos - 1] == b'\r';
        let data_end = if cr_present { lf_pos - 1 } else { lf_pos };
        write_segment(buf, sink, &mut written, maxsize, data_end)?;

        let terminator_len = (lf_pos + 1) - data_end; // 1 (LF) or 2 (CRLF)
        buf.consume(terminator_len + dash_boundary.len());

        return finish_delimiter(buf, source, maxsize);
    }
}

fn write_segment<Sk: BodySink>(
    buf: &mut ChunkedBuffer,
    sink: &mut Sk,
    written: &mut u64,
    maxsize: Option<u64>,
    emit_len: usize,
) -> Result<(), Error> {
    if emit_len > 0 {
        *written += emit_len as u64;
        if let Some(max) = maxsize {
            if *written > max {
                return Err(Error::BodyTooLarge);
            }
        }
        sink.write(&buf.unconsumed()[..emit_len])?;
    }
    buf.consume(emit_len);
    Ok(())
}

fn refill_or_fail<S: Source + ?Sized>(
    buf: &mut ChunkedBuffer,
    source: &mut S,
    maxsize: Option<u64>,
) -> Result<(), Error> {
    if let Some(max) = maxsize {
        if buf.len() as u64 >= max {
            return Err(Error::BodyTooLarge);
        }
    }
    buf.read_chunk(source)
}

/// Past the dash-boundary: either `--` (close) or optional transport
/// padding (`*LWSP`) then a line terminator (continuation).
fn finish_delimiter<S: Source + ?Sized>(
    buf: &mut ChunkedBuffer,
    source: &mut S,
    maxsize: Option<u64>,
) -> Result<bool, Error> {
    loop {
        if buf.len() < 2 {
            refill_or_fail(buf, source, maxsize)?;
            continue;
        }
        if &buf.unconsumed()[..2] == b"--" {
            buf.consume(2);
            return Ok(false);
        }

        let mut i = 0;
        {
            let view = buf.unconsumed();
            while i < view.len() && (view[i] == b' ' || view[i] == b'\t') {
                i += 1;
            }
        }

        let view_len = buf.len();
        if i >= view_len {
            refill_or_fail(buf, source, maxsize)?;
            continue;
        }
        let at_i = buf.unconsumed()[i];
        if at_i == b'\r' {
            if i + 1 >= view_len {
                refill_or_fail(buf, source, maxsize)?;
                continue;
            }
            let consume_len = if buf.unconsumed()[i + 1] == b'\n' { i + 2 } else { i + 1 };
            buf.consume(consume_len);
            return Ok(true);
        } else if at_i == b'\n' {
            buf.consume(i + 1);
            return Ok(true);
        } else {
            // Padding without a recognizable terminator; leave it for the
            // next header parse to reject rather than looping forever.
            return Ok(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn boundary(s: &str) -> Boundary {
        Boundary::new(s).unwrap()
    }

    fn run(input: &[u8], b: &Boundary, maxsize: Option<u64>, step: usize) -> (Vec<u8>, bool) {
        let mut src = Cursor::new(input.to_vec());
        let mut buf = ChunkedBuffer::new(step).unwrap();
        let mut out = Vec::new();
        let more = scan_body(&mut buf, &mut src, b, maxsize, &mut out).unwrap();
        (out, more)
    }

    #[test]
    fn stops_before_continuation_delimiter() {
        let b = boundary("B");
        let (data, more) = run(b"HELLO\r\n--B\r\nmore", &b, None, 4096);
        assert_eq!(data, b"HELLO");
        assert!(more);
    }

    #[test]
    fn stops_before_close_delimiter() {
        let b = boundary("B");
        let (data, more) = run(b"HELLO\r\n--B--", &b, None, 4096);
        assert_eq!(data, b"HELLO");
        assert!(!more);
    }

    #[test]
    fn empty_body() {
        let b = boundary("B");
        let (data, more) = run(b"\r\n--B--", &b, None, 4096);
        assert_eq!(data, b"");
        assert!(!more);
    }

    #[test]
    fn bare_lf_delimiter() {
        let b = boundary("B");
        let (data, more) = run(b"HELLO\n--B--", &b, None, 4096);
        assert_eq!(data, b"HELLO");
        assert!(!more);
    }

    #[test]
    fn byte_at_a_time_matches_one_shot() {
        let b = boundary("B");
        let input: &[u8] = b"line one\r\nline two\r\n--B--";
        let (whole, _) = run(input, &b, None, 4096);
        let (chunked, _) = run(input, &b, None, 1);
        assert_eq!(whole, chunked);
    }

    #[test]
    fn transport_padding_after_boundary_is_skipped() {
        let b = boundary("B");
        let (data, more) = run(b"HELLO\r\n--B  \r\nmore", &b, None, 4096);
        assert_eq!(data, b"HELLO");
        assert!(more);
    }

    #[test]
    fn maxsize_trips_body_too_large() {
        let b = boundary("B");
        let mut src = Cursor::new(b"XYZXYZXYZ\r\n--B--".to_vec());
        let mut buf = ChunkedBuffer::new(4096).unwrap();
        let mut out = Vec::new();
        let err = scan_body(&mut buf, &mut src, &b, Some(4), &mut out).unwrap_err();
        assert!(matches!(err, Error::BodyTooLarge));
    }

    #[test]
    fn literal_boundary_text_inside_body_without_delimiter_prefix_is_kept() {
        let b = boundary("B");
        let (data, more) = run(b"not--Ba-boundary\r\n--B--", &b, None, 4096);
        assert_eq!(data, b"not--Ba-boundary");
        assert!(!more);
    }
}
