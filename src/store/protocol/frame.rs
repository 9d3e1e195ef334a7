//! RESP2 Frame Types
//!
//! Reply prefixes (first byte of every frame):
//! `+` Simple String, `-` Error, `:` Integer, `$` Bulk String, `*` Array
//!
//! Commands always travel as an Array of Bulk Strings:
//! `*<argc>\r\n` followed by `$<len>\r\n<bytes>\r\n` per argument.
//! A Bulk String or Array with length -1 is the null reply.

use bytes::Bytes;

// ========================================
// TYPE PREFIXES
// ========================================
pub const PREFIX_SIMPLE: u8 = b'+';
pub const PREFIX_ERROR: u8 = b'-';
pub const PREFIX_INTEGER: u8 = b':';
pub const PREFIX_BULK: u8 = b'$';
pub const PREFIX_ARRAY: u8 = b'*';

pub const CRLF: &[u8] = b"\r\n";

// ========================================
// OUTBOUND
// ========================================

/// A command to send: encoded by RespCodec as an array of bulk strings
#[derive(Debug, Clone, PartialEq)]
pub struct RespCommand {
    pub args: Vec<Bytes>,
}

impl RespCommand {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        Self {
            args: args
                .into_iter()
                .map(|a| Bytes::copy_from_slice(a.as_ref()))
                .collect(),
        }
    }

    /// Command name for logs (first argument, uppercased)
    pub fn name(&self) -> String {
        self.args
            .first()
            .map(|a| String::from_utf8_lossy(a).to_uppercase())
            .unwrap_or_default()
    }
}

// ========================================
// INBOUND
// ========================================

/// A decoded reply
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Array(Vec<RespValue>),
    Null,
}

impl RespValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(n) => Some(*n),
            RespValue::Bulk(b) => std::str::from_utf8(b).ok()?.parse().ok(),
            RespValue::Simple(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Text form of a scalar reply. Binary bulk strings are rendered as `0x<hex>`.
    pub fn as_text(&self) -> Option<String> {
        match self {
            RespValue::Simple(s) => Some(s.clone()),
            RespValue::Integer(n) => Some(n.to_string()),
            RespValue::Bulk(b) => Some(bytes_to_text(b)),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Vec<RespValue>> {
        match self {
            RespValue::Array(items) => Some(items),
            RespValue::Null => Some(Vec::new()),
            _ => None,
        }
    }
}

pub fn bytes_to_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => format!("0x{}", hex::encode(bytes)),
    }
}
