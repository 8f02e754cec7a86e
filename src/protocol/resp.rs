//! The RESP wire format: five one-byte type markers, CRLF-terminated,
//! plus an inline-command compatibility path (spec §4.1).

use bytes::Bytes;

/// Guards against a hostile or corrupt peer asking us to allocate
/// something absurd before we have even validated the frame; unrelated
/// to the configured per-value size cap (spec §3), which is enforced by
/// command handlers once a value is actually being stored.
const MAX_MULTIBULK_LEN: i64 = 1024 * 1024;
const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;
const MAX_INLINE_LEN: usize = 64 * 1024;

/// The result of attempting to parse one command frame from the front
/// of a connection's receive buffer.
pub enum Parsed {
    /// A full command was parsed; `consumed` bytes should be dropped
    /// from the front of the buffer.
    Command { argv: Vec<Bytes>, consumed: usize },
    /// Not enough bytes yet; the caller should retain the buffer and
    /// wait for more from the socket.
    Incomplete,
    /// The buffer can never be completed into a valid frame. `consumed`
    /// tells the caller how much to discard (0 means "give up, close the
    /// connection" — the safer default per spec §4.1).
    Malformed { reason: String, consumed: usize },
}

/// Attempts to parse exactly one command frame from the front of `buf`.
///
/// Supports both the standard RESP multibulk array-of-bulk-strings
/// framing and the legacy whitespace-delimited inline form used by
/// humans typing directly into a socket (and by the smoke tests, per
/// REDESIGN FLAGS).
pub fn try_parse_one(buf: &[u8]) -> Parsed {
    if buf.is_empty() {
        return Parsed::Incomplete;
    }
    if buf[0] == b'*' {
        parse_multibulk(buf)
    } else {
        parse_inline(buf)
    }
}

fn find_crlf(buf: &[u8], from: usize) -> Option<usize> {
    let mut i = from;
    while i + 1 < buf.len() {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn parse_multibulk(buf: &[u8]) -> Parsed {
    let Some(line_end) = find_crlf(buf, 0) else {
        if buf.len() > MAX_INLINE_LEN {
            return Parsed::Malformed {
                reason: "too big mbulk count string".into(),
                consumed: 0,
            };
        }
        return Parsed::Incomplete;
    };
    let count_str = match std::str::from_utf8(&buf[1..line_end]) {
        Ok(s) => s,
        Err(_) => {
            return Parsed::Malformed {
                reason: "invalid multibulk length".into(),
                consumed: 0,
            }
        }
    };
    let count: i64 = match count_str.parse() {
        Ok(n) => n,
        Err(_) => {
            return Parsed::Malformed {
                reason: "invalid multibulk length".into(),
                consumed: 0,
            }
        }
    };
    let mut pos = line_end + 2;
    if count <= 0 || count > MAX_MULTIBULK_LEN {
        // `*0\r\n` and `*-1\r\n` never occur as a client command; treat
        // as a no-op-but-consume so the connection does not wedge.
        return Parsed::Malformed {
            reason: "invalid multibulk length".into(),
            consumed: pos,
        };
    }

    let mut argv = Vec::with_capacity(count as usize);
    for _ in 0..count {
        if pos >= buf.len() {
            return Parsed::Incomplete;
        }
        if buf[pos] != b'$' {
            return Parsed::Malformed {
                reason: format!(
                    "expected '$', got '{}'",
                    buf[pos] as char
                ),
                consumed: 0,
            };
        }
        let Some(len_line_end) = find_crlf(buf, pos) else {
            return Parsed::Incomplete;
        };
        let len_str = match std::str::from_utf8(&buf[pos + 1..len_line_end]) {
            Ok(s) => s,
            Err(_) => {
                return Parsed::Malformed {
                    reason: "invalid bulk length".into(),
                    consumed: 0,
                }
            }
        };
        let blen: i64 = match len_str.parse() {
            Ok(n) => n,
            Err(_) => {
                return Parsed::Malformed {
                    reason: "invalid bulk length".into(),
                    consumed: 0,
                }
            }
        };
        if blen < 0 || blen > MAX_BULK_LEN {
            return Parsed::Malformed {
                reason: "invalid bulk length".into(),
                consumed: 0,
            };
        }
        let data_start = len_line_end + 2;
        let data_end = data_start + blen as usize;
        if data_end + 2 > buf.len() {
            return Parsed::Incomplete;
        }
        if &buf[data_end..data_end + 2] != b"\r\n" {
            return Parsed::Malformed {
                reason: "expected CRLF after bulk data".into(),
                consumed: 0,
            };
        }
        argv.push(Bytes::copy_from_slice(&buf[data_start..data_end]));
        pos = data_end + 2;
    }

    Parsed::Command {
        argv,
        consumed: pos,
    }
}

/// The compatibility path: a single line, CRLF- or bare-LF-terminated,
/// split on runs of whitespace. No quoting support — real inline input
/// is a human typing `PING` or `SET foo bar`, not a general shell.
fn parse_inline(buf: &[u8]) -> Parsed {
    let nl = buf.iter().position(|&b| b == b'\n');
    let Some(nl) = nl else {
        if buf.len() > MAX_INLINE_LEN {
            return Parsed::Malformed {
                reason: "too big inline request".into(),
                consumed: 0,
            };
        }
        return Parsed::Incomplete;
    };
    let line_end = if nl > 0 && buf[nl - 1] == b'\r' {
        nl - 1
    } else {
        nl
    };
    let line = &buf[..line_end];
    let argv: Vec<Bytes> = line
        .split(|&b| b == b' ' || b == b'\t')
        .filter(|s| !s.is_empty())
        .map(Bytes::copy_from_slice)
        .collect();
    let consumed = nl + 1;
    if argv.is_empty() {
        // Blank inline ping: consume and let the caller loop again.
        return Parsed::Malformed {
            reason: "empty inline request".into(),
            consumed,
        };
    }
    Parsed::Command { argv, consumed }
}

/// A reply tree the encoder can serialize. Mirrors the five RESP
/// markers plus the two null forms and a variant for replies that are
/// already serialized bytes (queued-transaction results, per spec
/// §4.1's "array reply whose elements are pre-serialized").
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Simple(String),
    Error { prefix: String, message: String },
    Integer(i64),
    Bulk(Bytes),
    NullBulk,
    Array(Vec<Reply>),
    NullArray,
    Raw(Vec<u8>),
}

impl Reply {
    pub fn ok() -> Reply {
        Reply::Simple("OK".to_string())
    }

    pub fn error(prefix: &str, message: impl Into<String>) -> Reply {
        Reply::Error {
            prefix: prefix.to_string(),
            message: message.into(),
        }
    }

    pub fn bulk(data: impl Into<Bytes>) -> Reply {
        Reply::Bulk(data.into())
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Reply::Simple(s) => encode_simple(s),
            Reply::Error { prefix, message } => encode_error(prefix, message),
            Reply::Integer(i) => encode_integer(*i),
            Reply::Bulk(b) => encode_bulk(b),
            Reply::NullBulk => b"$-1\r\n".to_vec(),
            Reply::NullArray => b"*-1\r\n".to_vec(),
            Reply::Array(items) => encode_array(items),
            Reply::Raw(bytes) => bytes.clone(),
        }
    }
}

/// Simple strings can't contain CR/LF; replace with spaces rather than
/// corrupt framing (spec §4.1).
pub fn encode_simple(s: &str) -> Vec<u8> {
    let sanitized: String = s.chars().map(|c| if c == '\r' || c == '\n' { ' ' } else { c }).collect();
    format!("+{sanitized}\r\n").into_bytes()
}

pub fn encode_error(prefix: &str, message: &str) -> Vec<u8> {
    let sanitized: String = message
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    if sanitized.starts_with(prefix) {
        format!("-{sanitized}\r\n").into_bytes()
    } else {
        format!("-{prefix} {sanitized}\r\n").into_bytes()
    }
}

pub fn encode_integer(i: i64) -> Vec<u8> {
    format!(":{i}\r\n").into_bytes()
}

pub fn encode_bulk(data: &[u8]) -> Vec<u8> {
    let mut out = format!("${}\r\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    out
}

pub fn encode_array(items: &[Reply]) -> Vec<u8> {
    let mut out = format!("*{}\r\n", items.len()).into_bytes();
    for item in items {
        out.extend_from_slice(&item.encode());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_multibulk_command() {
        let buf = b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n";
        match try_parse_one(buf) {
            Parsed::Command { argv, consumed } => {
                assert_eq!(argv, vec![Bytes::from_static(b"GET"), Bytes::from_static(b"foo")]);
                assert_eq!(consumed, buf.len());
            }
            _ => panic!("expected a complete command"),
        }
    }

    #[test]
    fn incomplete_multibulk_waits_for_more_bytes() {
        let buf = b"*2\r\n$3\r\nGET\r\n$3\r\nfo";
        assert!(matches!(try_parse_one(buf), Parsed::Incomplete));
    }

    #[test]
    fn binary_safe_bulk_strings_preserve_embedded_nul() {
        let mut buf = b"*1\r\n$3\r\n".to_vec();
        buf.extend_from_slice(&[0u8, b'a', 0u8]);
        buf.extend_from_slice(b"\r\n");
        match try_parse_one(&buf) {
            Parsed::Command { argv, .. } => assert_eq!(argv[0].as_ref(), &[0u8, b'a', 0u8]),
            _ => panic!("expected command"),
        }
    }

    #[test]
    fn inline_command_is_whitespace_split() {
        let buf = b"SET foo bar\r\n";
        match try_parse_one(buf) {
            Parsed::Command { argv, consumed } => {
                assert_eq!(
                    argv,
                    vec![Bytes::from_static(b"SET"), Bytes::from_static(b"foo"), Bytes::from_static(b"bar")]
                );
                assert_eq!(consumed, buf.len());
            }
            _ => panic!("expected a complete inline command"),
        }
    }

    #[test]
    fn inline_command_accepts_bare_lf() {
        let buf = b"PING\n";
        assert!(matches!(try_parse_one(buf), Parsed::Command { .. }));
    }

    #[test]
    fn malformed_multibulk_reports_reason() {
        let buf = b"*2\r\n#3\r\nGET\r\n";
        match try_parse_one(buf) {
            Parsed::Malformed { .. } => {}
            _ => panic!("expected malformed"),
        }
    }

    #[test]
    fn encode_array_concatenates_pre_serialized_raw_elements() {
        let items = vec![Reply::Raw(b"+OK\r\n".to_vec()), Reply::Raw(b"+OK\r\n".to_vec())];
        assert_eq!(encode_array(&items), b"*2\r\n+OK\r\n+OK\r\n".to_vec());
    }

    #[test]
    fn simple_string_strips_crlf() {
        assert_eq!(encode_simple("a\r\nb"), b"+a  b\r\n".to_vec());
    }

    #[test]
    fn null_forms_match_protocol() {
        assert_eq!(Reply::NullBulk.encode(), b"$-1\r\n".to_vec());
        assert_eq!(Reply::NullArray.encode(), b"*-1\r\n".to_vec());
    }
}
