use anyhow::{Result, anyhow, bail};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

/// One RESP2 value.
///
/// `Inline` holds bytes a peer sent outside RESP framing (inline commands
/// during negotiation). They re-serialize byte-identical and are forwarded
/// without classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Simple(Bytes),
    Error(Bytes),
    Integer(i64),
    Bulk(Option<Bytes>),
    Array(Option<Vec<Value>>),
    Inline(Bytes),
}

fn is_sigil(b: u8) -> bool {
    matches!(b, b'+' | b'-' | b':' | b'$' | b'*')
}

/// Take one line starting at `from`. Lines end at the first `\n`; a single
/// trailing `\r` is dropped so lenient `\n`-only peers still frame.
///
/// Returns the line content and the index just past the terminator.
fn take_line(input: &[u8], from: usize) -> Option<(&[u8], usize)> {
    let nl = input[from..].iter().position(|&b| b == b'\n')? + from;
    let mut line = &input[from..nl];
    if let [head @ .., b'\r'] = line {
        line = head;
    }
    Some((line, nl + 1))
}

fn parse_len(line: &[u8]) -> Result<i64> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| anyhow!("invalid length: {:?}", String::from_utf8_lossy(line)))
}

/// Parse exactly one value from the front of `input`.
///
/// Returns `Ok(None)` when more bytes are needed; `Err` on a framing
/// violation, which loses stream position and is fatal to the connection.
fn parse_value(input: &[u8], eof: bool) -> Result<Option<(Value, usize)>> {
    let Some(&first) = input.first() else {
        return Ok(None);
    };

    match first {
        b'+' => {
            let Some((line, next)) = take_line(input, 1) else {
                return Ok(None);
            };
            Ok(Some((Value::Simple(Bytes::copy_from_slice(line)), next)))
        }
        b'-' => {
            let Some((line, next)) = take_line(input, 1) else {
                return Ok(None);
            };
            Ok(Some((Value::Error(Bytes::copy_from_slice(line)), next)))
        }
        b':' => {
            let Some((line, next)) = take_line(input, 1) else {
                return Ok(None);
            };
            Ok(Some((Value::Integer(parse_len(line)?), next)))
        }
        b'$' => {
            let Some((line, body)) = take_line(input, 1) else {
                return Ok(None);
            };
            let len = parse_len(line)?;
            if len == -1 {
                return Ok(Some((Value::Bulk(None), body)));
            }
            if len < -1 {
                bail!("negative bulk string length {len}");
            }
            let len = len as usize;
            // Body plus at least one terminator byte.
            if input.len() < body + len + 1 {
                return Ok(None);
            }
            let payload = Bytes::copy_from_slice(&input[body..body + len]);
            match input[body + len] {
                b'\n' => Ok(Some((Value::Bulk(Some(payload)), body + len + 1))),
                b'\r' => {
                    if input.len() < body + len + 2 {
                        return Ok(None);
                    }
                    if input[body + len + 1] != b'\n' {
                        bail!("bulk string body not terminated by line ending");
                    }
                    Ok(Some((Value::Bulk(Some(payload)), body + len + 2)))
                }
                _ => bail!("bulk string body not terminated by line ending"),
            }
        }
        b'*' => {
            let Some((line, mut pos)) = take_line(input, 1) else {
                return Ok(None);
            };
            let count = parse_len(line)?;
            if count == -1 {
                return Ok(Some((Value::Array(None), pos)));
            }
            if count < -1 {
                bail!("negative array count {count}");
            }
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let Some((item, used)) = parse_value(&input[pos..], eof)? else {
                    return Ok(None);
                };
                items.push(item);
                pos += used;
            }
            Ok(Some((Value::Array(Some(items)), pos)))
        }
        _ => parse_inline(input, eof),
    }
}

/// Unknown-prefix escape: collect whole lines until a line boundary is
/// followed by a RESP sigil, or until EOF. The collected bytes pass through
/// untouched so inline handshake commands are not lost.
fn parse_inline(input: &[u8], eof: bool) -> Result<Option<(Value, usize)>> {
    let mut pos = 0;
    while let Some(nl) = input[pos..].iter().position(|&b| b == b'\n') {
        let after = pos + nl + 1;
        if after == input.len() {
            // Buffer ends exactly on the boundary; need one more byte to peek.
            break;
        }
        if is_sigil(input[after]) {
            let head = Bytes::copy_from_slice(&input[..after]);
            return Ok(Some((Value::Inline(head), after)));
        }
        pos = after;
    }
    if eof {
        let all = Bytes::copy_from_slice(input);
        return Ok(Some((Value::Inline(all), input.len())));
    }
    Ok(None)
}

/// Try to decode one value from the front of `buf`, consuming it.
///
/// Returns the value together with the raw bytes it was framed from.
/// `Ok(None)` means the buffer holds an incomplete value.
pub fn decode(buf: &mut BytesMut, eof: bool) -> Result<Option<(Value, Bytes)>> {
    if buf.is_empty() {
        return Ok(None);
    }
    match parse_value(&buf[..], eof)? {
        Some((value, used)) => {
            let raw = buf.split_to(used).freeze();
            Ok(Some((value, raw)))
        }
        None => Ok(None),
    }
}

/// Canonical serialization: always `\r\n`, minimal length headers.
pub fn encode_value(value: &Value) -> BytesMut {
    let mut out = BytesMut::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut BytesMut, value: &Value) {
    match value {
        Value::Simple(s) => {
            out.extend_from_slice(b"+");
            out.extend_from_slice(s);
            out.extend_from_slice(b"\r\n");
        }
        Value::Error(e) => {
            out.extend_from_slice(b"-");
            out.extend_from_slice(e);
            out.extend_from_slice(b"\r\n");
        }
        Value::Integer(i) => {
            out.extend_from_slice(format!(":{i}\r\n").as_bytes());
        }
        Value::Bulk(None) => out.extend_from_slice(b"$-1\r\n"),
        Value::Bulk(Some(b)) => {
            out.extend_from_slice(format!("${}\r\n", b.len()).as_bytes());
            out.extend_from_slice(b);
            out.extend_from_slice(b"\r\n");
        }
        Value::Array(None) => out.extend_from_slice(b"*-1\r\n"),
        Value::Array(Some(items)) => {
            out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
            for item in items {
                write_value(out, item);
            }
        }
        Value::Inline(raw) => out.extend_from_slice(raw),
    }
}

/// Encode a Redis request as an Array of Bulk Strings.
pub fn encode_command_str(parts: &[&str]) -> BytesMut {
    let items = parts
        .iter()
        .map(|s| Value::Bulk(Some(Bytes::copy_from_slice(s.as_bytes()))))
        .collect();
    encode_value(&Value::Array(Some(items)))
}

/// Streaming reader side of a RESP connection.
///
/// Partial reads never lose bytes: undecoded input stays in the buffer until
/// the next `read_value` call completes the frame.
#[derive(Debug)]
pub struct RespReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> RespReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(8 * 1024),
        }
    }

    /// Rebuild a reader around a different transport, carrying over bytes
    /// already buffered (used when a stream is split after a handshake).
    pub fn from_parts(inner: R, buf: BytesMut) -> Self {
        Self { inner, buf }
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_parts(self) -> (R, BytesMut) {
        (self.inner, self.buf)
    }

    /// Read exactly one RESP value from the stream.
    ///
    /// Returns `Ok(None)` on clean EOF. EOF with buffered inline bytes
    /// flushes them as a final `Inline` value; a truncated sigil value at
    /// EOF is dropped with the connection.
    pub async fn read_value(&mut self) -> Result<Option<(Value, Bytes)>> {
        loop {
            if let Some(hit) = decode(&mut self.buf, false)? {
                return Ok(Some(hit));
            }
            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return decode(&mut self.buf, true);
            }
        }
    }
}
