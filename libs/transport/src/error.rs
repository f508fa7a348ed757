//! Transport errors and typed console error codes.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Console error codes this engine recognizes.
///
/// The console prefixes failures with a stable `HSC...` code. Only the codes
/// the error classifier acts on are enumerated; everything else stays
/// unrecognized and classifies as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleErrorCode {
    /// Partition lookup failed (HSCL8012).
    PartitionNotFound,

    /// The user lacks the authority for the requested task (HSCL350B).
    InsufficientAuthority,
}

impl ConsoleErrorCode {
    /// The literal code string as the console prints it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PartitionNotFound => "HSCL8012",
            Self::InsufficientAuthority => "HSCL350B",
        }
    }

    /// Extract a recognized code from raw console output.
    pub fn parse(message: &str) -> Option<Self> {
        static CODE: OnceLock<Regex> = OnceLock::new();
        let re = CODE.get_or_init(|| Regex::new(r"HSC[A-Z][0-9A-F]{3,5}").unwrap());

        for found in re.find_iter(message) {
            match found.as_str() {
                "HSCL8012" => return Some(Self::PartitionNotFound),
                "HSCL350B" => return Some(Self::InsufficientAuthority),
                _ => continue,
            }
        }
        None
    }
}

impl std::fmt::Display for ConsoleErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by either console interface.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A console command exited non-zero or printed an error.
    #[error("{message}")]
    Command {
        code: Option<ConsoleErrorCode>,
        message: String,
    },

    /// The command session itself could not be opened or driven.
    #[error("session error: {0}")]
    Session(String),

    /// HTTP-level failure talking to the REST interface.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The REST interface returned a non-success status.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The console returned output this client cannot decode.
    #[error("malformed console response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Build a command error, parsing the console code out of the message.
    pub fn command(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Command {
            code: ConsoleErrorCode::parse(&message),
            message,
        }
    }

    /// The recognized console code, if any.
    pub fn code(&self) -> Option<ConsoleErrorCode> {
        match self {
            Self::Command { code, .. } => *code,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partition_not_found_code() {
        let msg = "HSCL8012 The partition named vios1 was not found.";
        assert_eq!(
            ConsoleErrorCode::parse(msg),
            Some(ConsoleErrorCode::PartitionNotFound)
        );
    }

    #[test]
    fn parses_authority_code_mid_message() {
        let msg = "error: HSCL350B The user does not have the authority to perform the requested task.";
        assert_eq!(
            ConsoleErrorCode::parse(msg),
            Some(ConsoleErrorCode::InsufficientAuthority)
        );
    }

    #[test]
    fn unknown_codes_stay_unrecognized() {
        assert_eq!(ConsoleErrorCode::parse("HSCL1234 something else"), None);
        assert_eq!(ConsoleErrorCode::parse("no code at all"), None);
    }

    #[test]
    fn command_error_carries_code() {
        let err = TransportError::command("HSCL350B not authorized");
        assert_eq!(err.code(), Some(ConsoleErrorCode::InsufficientAuthority));

        let err = TransportError::command("plain failure");
        assert_eq!(err.code(), None);
    }
}
