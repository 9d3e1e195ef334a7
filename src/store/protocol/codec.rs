use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::errors::ParseError;
use super::frame::{
    RespCommand, RespValue, CRLF, PREFIX_ARRAY, PREFIX_BULK, PREFIX_ERROR, PREFIX_INTEGER,
    PREFIX_SIMPLE,
};

/// Upper bound for a single bulk string (same limit as the server side)
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct RespCodec;

impl RespCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for RespCodec {
    type Item = RespValue;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match parse_frame(src)? {
            Some((value, consumed)) => {
                src.advance(consumed);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<RespCommand> for RespCodec {
    type Error = ParseError;

    fn encode(&mut self, item: RespCommand, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.put_u8(PREFIX_ARRAY);
        dst.put_slice(item.args.len().to_string().as_bytes());
        dst.put_slice(CRLF);
        for arg in item.args {
            dst.put_u8(PREFIX_BULK);
            dst.put_slice(arg.len().to_string().as_bytes());
            dst.put_slice(CRLF);
            dst.put_slice(&arg);
            dst.put_slice(CRLF);
        }
        Ok(())
    }
}

// ========================================
// PARSING HELPERS
// ========================================

/// Parse one complete frame from the head of `buf`.
/// Returns the value and the number of bytes it spans, or None if more bytes are needed.
fn parse_frame(buf: &[u8]) -> Result<Option<(RespValue, usize)>, ParseError> {
    if buf.is_empty() {
        return Ok(None);
    }

    let line_end = match find_crlf(&buf[1..]) {
        Some(pos) => pos + 1,
        None => return Ok(None),
    };
    let line = &buf[1..line_end];
    let after_line = line_end + CRLF.len();

    match buf[0] {
        PREFIX_SIMPLE => {
            let text = String::from_utf8_lossy(line).to_string();
            Ok(Some((RespValue::Simple(text), after_line)))
        }
        PREFIX_ERROR => {
            let text = String::from_utf8_lossy(line).to_string();
            Ok(Some((RespValue::Error(text), after_line)))
        }
        PREFIX_INTEGER => {
            let n = parse_int(line)?;
            Ok(Some((RespValue::Integer(n), after_line)))
        }
        PREFIX_BULK => {
            let len = parse_int(line)?;
            if len < 0 {
                return Ok(Some((RespValue::Null, after_line)));
            }
            if len > MAX_BULK_LEN {
                return Err(ParseError::Invalid(format!("Bulk string too large: {} bytes", len)));
            }
            let len = len as usize;
            let total = after_line + len + CRLF.len();
            if buf.len() < total {
                return Ok(None);
            }
            if &buf[after_line + len..total] != CRLF {
                return Err(ParseError::Invalid("Bulk string not terminated by CRLF".to_string()));
            }
            let data = Bytes::copy_from_slice(&buf[after_line..after_line + len]);
            Ok(Some((RespValue::Bulk(data), total)))
        }
        PREFIX_ARRAY => {
            let count = parse_int(line)?;
            if count < 0 {
                return Ok(Some((RespValue::Null, after_line)));
            }
            let mut items = Vec::with_capacity(count.min(1024) as usize);
            let mut pos = after_line;
            for _ in 0..count {
                match parse_frame(&buf[pos..])? {
                    Some((item, used)) => {
                        items.push(item);
                        pos += used;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((RespValue::Array(items), pos)))
        }
        other => Err(ParseError::Invalid(format!("Unknown type prefix: 0x{:02x}", other))),
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == CRLF)
}

fn parse_int(line: &[u8]) -> Result<i64, ParseError> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError::Invalid(format!("Invalid integer: {:?}", String::from_utf8_lossy(line))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Option<RespValue> {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::from(input);
        codec.decode(&mut buf).expect("decode should succeed")
    }

    #[test]
    fn encode_command_as_bulk_array() {
        let mut codec = RespCodec::new();
        let mut encoded = BytesMut::new();

        codec
            .encode(RespCommand::new(["MEMORY", "USAGE", "bull:q:1"]), &mut encoded)
            .expect("encode should succeed");

        assert_eq!(
            &encoded[..],
            b"*3\r\n$6\r\nMEMORY\r\n$5\r\nUSAGE\r\n$8\r\nbull:q:1\r\n"
        );
    }

    #[test]
    fn decode_scalar_replies() {
        assert_eq!(decode_all(b"+OK\r\n"), Some(RespValue::Simple("OK".into())));
        assert_eq!(
            decode_all(b"-ERR unknown command\r\n"),
            Some(RespValue::Error("ERR unknown command".into()))
        );
        assert_eq!(decode_all(b":42\r\n"), Some(RespValue::Integer(42)));
        assert_eq!(decode_all(b"$-1\r\n"), Some(RespValue::Null));
        assert_eq!(
            decode_all(b"$5\r\nhello\r\n"),
            Some(RespValue::Bulk(Bytes::from_static(b"hello")))
        );
    }

    #[test]
    fn decode_nested_scan_reply() {
        let value = decode_all(b"*2\r\n$1\r\n0\r\n*2\r\n$5\r\nbull:\r\n$3\r\nabc\r\n").unwrap();
        let items = value.into_array().unwrap();
        assert_eq!(items[0].as_text().as_deref(), Some("0"));
        let keys = items[1].clone().into_array().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1].as_text().as_deref(), Some("abc"));
    }

    #[test]
    fn decode_returns_none_for_incomplete_bulk() {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::from(&b"$10\r\nhel"[..]);

        let parsed = codec.decode(&mut buf).expect("decode should succeed");

        assert!(parsed.is_none());
        assert_eq!(buf.len(), 8, "incomplete input must not be consumed");
    }

    #[test]
    fn decode_returns_none_for_incomplete_array() {
        assert!(decode_all(b"*2\r\n:1\r\n").is_none());
    }

    #[test]
    fn decode_consumes_exactly_one_frame() {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::from(&b":1\r\n:2\r\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(RespValue::Integer(1)));
        assert_eq!(codec.decode(&mut buf).unwrap(), Some(RespValue::Integer(2)));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_rejects_unknown_prefix() {
        let mut codec = RespCodec::new();
        let mut buf = BytesMut::from(&b"?what\r\n"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }
}
