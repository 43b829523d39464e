//! Decoder for RESP, the wire protocol spoken by Redis clients.
//!
//! Captured write buffers hold a bounded prefix of what the client sent, and
//! in pipelining mode several commands back to back. The number of segments
//! (bulk strings) across the whole pipeline is captured separately, so the
//! decoder first walks complete commands until that count is met and only then
//! decodes the delimited bytes into readable text.

use autotrace_core::model::event::c_bytes;

use crate::error::DecodeError;

/// Upper bound on decoded top-level values. A 256 byte capture cannot hold
/// more than this many well-formed commands.
pub const MAX_VALUES: usize = 32;

/// Decodes the commands in `msg`.
///
/// With `segments == 0` only the first complete command is decoded. Otherwise
/// commands are taken from the front until their segment counts add up to
/// `segments`; a buffer cut off inside a command that starts a new array
/// yields the commands before it.
pub fn parse_resp(segments: i32, msg: &[u8]) -> Result<Vec<String>, DecodeError> {
    let data = c_bytes(msg);
    let delimited = delimit_pipeline(segments, data)?;
    decode_values(delimited)
}

/// Decodes every top-level value in `data`: arrays of bulk strings are joined
/// with spaces, simple strings, errors and integers are returned verbatim.
/// Decoding stops at the first byte that does not start a RESP value.
pub fn decode_values(data: &[u8]) -> Result<Vec<String>, DecodeError> {
    let mut reader = Reader::new(data);
    let mut values = Vec::new();
    while values.len() < MAX_VALUES {
        match reader.next_value()? {
            Some(value) if value.is_empty() => continue,
            Some(value) => values.push(value),
            None => break,
        }
    }
    Ok(values)
}

fn delimit_pipeline(segments: i32, input: &[u8]) -> Result<&[u8], DecodeError> {
    if segments < 0 {
        return Err(DecodeError::Count(format!(
            "segment count must not be negative, got {segments}"
        )));
    }
    if segments == 0 {
        let (len, _) = next_command(input)?;
        return Ok(&input[..len]);
    }

    let expected = segments as usize;
    let mut parsed = 0usize;
    let mut end = 0usize;
    loop {
        if parsed == expected {
            break;
        }
        if parsed > expected {
            return Err(DecodeError::Count(format!(
                "parsed segments ({parsed}) exceed expected total ({expected})"
            )));
        }

        let rest = &input[end..];
        match next_command(rest) {
            Ok((len, segs)) => {
                end += len;
                parsed += segs;
            }
            Err(err) if err.is_truncation() && rest.first() == Some(&b'*') => break,
            Err(err) => return Err(err),
        }

        if input[end..].trim_ascii().is_empty() && parsed < expected {
            return Err(DecodeError::Count(format!(
                "no more data but expected segments not reached: need {expected}, got {parsed}"
            )));
        }
    }
    Ok(&input[..end])
}

/// Byte length and segment count of the array command at the front of
/// `input`.
fn next_command(input: &[u8]) -> Result<(usize, usize), DecodeError> {
    if input.first() != Some(&b'*') {
        return Err(DecodeError::Malformed(
            "not a RESP array: missing '*'".to_string(),
        ));
    }

    let header_end = find_crlf(input, 1)
        .ok_or_else(|| DecodeError::Incomplete("missing CRLF after array header".to_string()))?;
    let count = parse_int(&input[1..header_end], "array count")?;
    let count = usize::try_from(count).unwrap_or(0);

    let mut pos = header_end + 2;
    for i in 0..count {
        match input.get(pos) {
            None => {
                return Err(DecodeError::Incomplete(format!(
                    "input ends before bulk string {i}"
                )));
            }
            Some(b'$') => {}
            Some(_) => {
                return Err(DecodeError::Malformed(format!(
                    "invalid bulk string (missing '$') at index {i}"
                )));
            }
        }

        let line_end = find_crlf(input, pos).ok_or_else(|| {
            DecodeError::Incomplete("missing CRLF in bulk length line".to_string())
        })?;
        let len = parse_int(&input[pos + 1..line_end], "bulk length")?;
        pos = line_end + 2;

        // Null bulk string: no payload follows.
        let Ok(len) = usize::try_from(len) else {
            continue;
        };

        if pos + len + 2 > input.len() {
            return Err(DecodeError::Incomplete(
                "not enough data for bulk string content".to_string(),
            ));
        }
        pos += len;
        if &input[pos..pos + 2] != b"\r\n" {
            return Err(DecodeError::Malformed(
                "missing CRLF after bulk string data".to_string(),
            ));
        }
        pos += 2;
    }

    Ok((pos, count))
}

fn find_crlf(input: &[u8], from: usize) -> Option<usize> {
    input
        .get(from..)?
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|i| i + from)
}

fn parse_int(raw: &[u8], what: &str) -> Result<i64, DecodeError> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| {
            DecodeError::Malformed(format!(
                "invalid {what}: {:?}",
                String::from_utf8_lossy(raw)
            ))
        })
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn next_value(&mut self) -> Result<Option<String>, DecodeError> {
        let Some(&kind) = self.data.get(self.pos) else {
            return Ok(None);
        };

        let value = match kind {
            b'*' => {
                self.pos += 1;
                let count = self.read_int()?;
                let count = usize::try_from(count).unwrap_or(0);
                let mut parts = Vec::with_capacity(count.min(MAX_VALUES));
                for _ in 0..count {
                    match self.read_byte()? {
                        b'$' => parts.push(self.read_bulk()?),
                        other => {
                            return Err(DecodeError::Malformed(format!(
                                "expected '$' but got {:?}",
                                other as char
                            )));
                        }
                    }
                }
                parts.join(" ")
            }
            b'$' => {
                self.pos += 1;
                self.read_bulk()?
            }
            b'+' | b'-' | b':' => {
                self.pos += 1;
                self.read_line()?
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn read_byte(&mut self) -> Result<u8, DecodeError> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| DecodeError::Incomplete("unexpected end of data".to_string()))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_line(&mut self) -> Result<String, DecodeError> {
        let start = self.pos;
        loop {
            match self.read_byte()? {
                b'\r' => {
                    let end = self.pos - 1;
                    return match self.read_byte()? {
                        b'\n' => Ok(String::from_utf8_lossy(&self.data[start..end]).into_owned()),
                        other => Err(DecodeError::Malformed(format!(
                            "expected LF after CR, got {:?}",
                            other as char
                        ))),
                    };
                }
                _ => continue,
            }
        }
    }

    fn read_int(&mut self) -> Result<i64, DecodeError> {
        let line = self.read_line()?;
        line.parse::<i64>()
            .map_err(|e| DecodeError::Malformed(format!("invalid integer {line:?}: {e}")))
    }

    fn read_bulk(&mut self) -> Result<String, DecodeError> {
        let len = self.read_int()?;
        let Ok(len) = usize::try_from(len) else {
            return Ok(String::new());
        };

        let end = self.pos + len;
        let Some(payload) = self.data.get(self.pos..end) else {
            return Err(DecodeError::Incomplete("not enough bulk data".to_string()));
        };
        let value = String::from_utf8_lossy(payload).into_owned();
        self.pos = end;

        for expected in [b'\r', b'\n'] {
            let got = self.read_byte()?;
            if got != expected {
                return Err(DecodeError::Malformed(format!(
                    "expected {:?} after bulk data, got {:?}",
                    expected as char, got as char
                )));
            }
        }
        Ok(value)
    }
}
