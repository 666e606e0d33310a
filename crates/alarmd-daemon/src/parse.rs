//! Producer-boundary command parsing.
//!
//! Two line forms are accepted:
//!
//! ```text
//! <seconds> Message(<id>) <text up to 127 bytes>
//! Cancel: Message(<id>)
//! ```
//!
//! Blank lines are ignored. Anything else is a [`ParseError`], reported to
//! the operator and discarded before it can reach the registry.

use alarmd_core::{AlarmRequest, RequestError};
use thiserror::Error;

/// Errors from command parsing. All are non-fatal: the line is discarded.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// The line matched neither command form.
    #[error("unrecognized command: {line:?}")]
    Malformed {
        /// The offending line (trimmed).
        line: String,
    },

    /// The seconds field was not a non-negative integer.
    #[error("invalid seconds value: {token:?}")]
    InvalidSeconds {
        /// The offending token.
        token: String,
    },

    /// The id inside `Message(...)` was not an integer.
    #[error("invalid message id: {token:?}")]
    InvalidId {
        /// The offending token.
        token: String,
    },

    /// The request failed validation (e.g. message too long).
    #[error(transparent)]
    Request(#[from] RequestError),
}

/// Parses one input line into a request.
///
/// Returns `Ok(None)` for blank lines (skipped, matching the interactive
/// console behavior).
///
/// # Errors
///
/// Returns a [`ParseError`] describing why the line was rejected.
pub fn parse_line(line: &str) -> Result<Option<AlarmRequest>, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if let Some(rest) = line.strip_prefix("Cancel:") {
        let id = parse_message_ref(rest.trim())?;
        return Ok(Some(AlarmRequest::cancel(id)));
    }

    let (seconds_token, rest) = line
        .split_once(char::is_whitespace)
        .ok_or_else(|| ParseError::Malformed {
            line: line.to_string(),
        })?;
    let seconds: u64 = seconds_token
        .parse()
        .map_err(|_| ParseError::InvalidSeconds {
            token: seconds_token.to_string(),
        })?;

    let rest = rest.trim_start();
    let (message_ref, text) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| ParseError::Malformed {
            line: line.to_string(),
        })?;
    let id = parse_message_ref(message_ref)?;

    let text = text.trim_start();
    if text.is_empty() {
        return Err(ParseError::Malformed {
            line: line.to_string(),
        });
    }

    Ok(Some(AlarmRequest::register(id, seconds, text)?))
}

/// Parses a `Message(<id>)` token.
fn parse_message_ref(token: &str) -> Result<u32, ParseError> {
    let inner = token
        .strip_prefix("Message(")
        .and_then(|t| t.strip_suffix(')'))
        .ok_or_else(|| ParseError::Malformed {
            line: token.to_string(),
        })?;
    inner.parse().map_err(|_| ParseError::InvalidId {
        token: inner.to_string(),
    })
}
