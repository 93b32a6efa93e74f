//! Parse error types.

use crate::message::Message;
use thiserror::Error;

/// Errors produced while parsing an IRC line.
///
/// `Malformed` carries whatever was assembled before the parser gave
/// up, so diagnostics can show the recognized source/command even when
/// the rest of the line is garbage.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// The input was empty or whitespace only.
    #[error("empty line")]
    Empty,

    /// The line did not match the IRC grammar.
    #[error("malformed message at byte {position}: {detail}")]
    Malformed {
        /// Byte offset where parsing failed.
        position: usize,
        /// Human-readable failure description.
        detail: String,
        /// Whatever was successfully parsed before the failure.
        partial: Box<Message>,
    },
}

impl ProtoError {
    /// The partially parsed message, if any part of the line was recognized.
    pub fn partial(&self) -> Option<&Message> {
        match self {
            ProtoError::Empty => None,
            ProtoError::Malformed { partial, .. } => Some(partial),
        }
    }
}
