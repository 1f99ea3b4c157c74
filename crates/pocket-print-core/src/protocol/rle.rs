//! Run-length encoding used by compressed Fill packets.
//!
//! A header byte with the high bit set is a run: `(header & 0x7F) + 2`
//! copies of the next byte. Otherwise it is a literal span of `header + 1`
//! bytes that follow verbatim.

use crate::{Error, Result};

/// Longest run a single header can describe.
pub const MAX_RUN: usize = 0x7F + 2;

/// Longest literal span a single header can describe.
pub const MAX_SPAN: usize = 0x7F + 1;

/// Expands `payload` onto the end of `out`.
///
/// A run or span that overruns the payload is truncated at the payload
/// boundary: everything decodable is still appended, then
/// [`Error::MalformedRle`] reports where the damaged header started.
pub fn decompress_into(payload: &[u8], out: &mut Vec<u8>) -> Result<()> {
    let mut pos = 0;
    while pos < payload.len() {
        let start = pos;
        let header = payload[pos];
        pos += 1;

        if header & 0x80 != 0 {
            let length = (header & 0x7F) as usize + 2;
            let Some(&value) = payload.get(pos) else {
                return Err(Error::MalformedRle { offset: start });
            };
            pos += 1;
            out.resize(out.len() + length, value);
        } else {
            let length = header as usize + 1;
            let end = pos + length;
            if end > payload.len() {
                out.extend_from_slice(&payload[pos..]);
                return Err(Error::MalformedRle { offset: start });
            }
            out.extend_from_slice(&payload[pos..end]);
            pos = end;
        }
    }
    Ok(())
}

/// Expands `payload`, keeping whatever decodes before a malformed tail.
pub fn decompress(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() * 2);
    let _ = decompress_into(payload, &mut out);
    out
}

/// Encodes `data` in the same format, preferring runs of two or more.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / MAX_SPAN + 1);
    let mut literal_start = 0;
    let mut i = 0;

    while i < data.len() {
        let value = data[i];
        let mut run = 1;
        while i + run < data.len() && data[i + run] == value && run < MAX_RUN {
            run += 1;
        }

        if run >= 2 {
            flush_literals(&mut out, &data[literal_start..i]);
            out.push(0x80 | (run - 2) as u8);
            out.push(value);
            i += run;
            literal_start = i;
        } else {
            i += 1;
        }
    }
    flush_literals(&mut out, &data[literal_start..]);

    out
}

fn flush_literals(out: &mut Vec<u8>, literals: &[u8]) {
    for chunk in literals.chunks(MAX_SPAN) {
        out.push((chunk.len() - 1) as u8);
        out.extend_from_slice(chunk);
    }
}
