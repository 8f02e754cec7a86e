//! RESP framing: parse incoming command arrays, encode outgoing replies.
//!
//! Grounded on the teacher's AOF/RDB line-oriented reader (which already
//! speaks `*N\r\n` / `$len\r\n` framing when replaying the append log)
//! generalized into a standalone, reusable codec per spec §4.1.

mod resp;

pub use resp::{encode_bulk, encode_error, try_parse_one, Parsed, Reply};
