//! Attribute Protocol values the discovery engine needs to speak about.
//!
//! The engine never builds or parses ATT PDUs itself; the transport does. What
//! lives here are the opcodes it records when deferring a request and the error
//! codes it interprets from error responses.

pub mod constants;
pub mod error;

pub use self::constants::*;
pub use self::error::AttErrorCode;
