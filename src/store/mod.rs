//! The typed keyspace (spec §3) and its expiration index (spec §4.4).

mod keyspace;

pub use keyspace::Keyspace;
