//! Wire-facing error taxonomy.
//!
//! Every error a command handler can raise renders to exactly one RESP
//! error reply via [`RedisError::to_reply`]; callers never hand-format
//! `-ERR ...` strings themselves.

use thiserror::Error;

/// Error kinds a command handler, the codec, or the persistence
/// coordinator can raise. Each maps to one of the error kinds in
/// spec §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RedisError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("wrong number of arguments for '{0}'")]
    WrongArity(String),

    #[error("Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("value is not an integer or out of range")]
    NotAnInteger,

    #[error("value is not a valid float")]
    NotAFloat,

    #[error("index out of range")]
    OutOfRange,

    #[error("syntax error")]
    SyntaxError,

    #[error("source and destination objects are the same")]
    SameObject,

    #[error("no such key")]
    NoSuchKey,

    #[error("EXEC without MULTI")]
    ExecWithoutMulti,

    #[error("DISCARD without MULTI")]
    DiscardWithoutMulti,

    #[error("MULTI calls can not be nested")]
    NestedMulti,

    #[error("WATCH inside MULTI is not allowed")]
    WatchInsideMulti,

    #[error("{0}")]
    Protocol(String),

    #[error("{0}")]
    Persistence(String),

    #[error("{0}")]
    Other(String),
}

impl RedisError {
    /// The conventional RESP error-type prefix (see spec §4.1).
    pub fn prefix(&self) -> &'static str {
        match self {
            RedisError::WrongType => "WRONGTYPE",
            RedisError::ExecWithoutMulti
            | RedisError::DiscardWithoutMulti
            | RedisError::NestedMulti
            | RedisError::WatchInsideMulti => "ERR",
            _ => "ERR",
        }
    }

    /// Render as a complete RESP error reply, e.g. `-ERR syntax error\r\n`.
    pub fn to_reply(&self) -> Vec<u8> {
        crate::protocol::encode_error(self.prefix(), &self.to_string())
    }
}

pub type RedisResult<T> = Result<T, RedisError>;
