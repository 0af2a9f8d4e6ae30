//! Error types for the client.
//!
//! Every fallible operation in the crate surfaces one [`Error`]. The variants
//! mirror the failure classes the transport and signer distinguish: client
//! rejections (`4xx`) are final, server failures (`5xx`) and transport errors
//! are retryable, and everything else is a local precondition or encoding
//! problem that never reaches the network.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Requested symbol is not present in the metadata universe.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Close-position inference ran against an account with no open position.
    #[error("no position to close for {0}")]
    NoPosition(String),

    /// A size, price, trigger price, or amount is not a valid decimal.
    #[error("invalid {what}: {value}")]
    BadNumber {
        /// Which field failed to parse.
        what: &'static str,
        /// The offending input.
        value: String,
    },

    /// An address is malformed or has the wrong length.
    #[error("malformed address: {0}")]
    BadAddress(String),

    /// A position size reported by the server could not be parsed.
    #[error("unparseable position size: {0}")]
    BadPosition(String),

    /// The action could not be serialized for signing.
    #[error("action encoding failed: {0}")]
    Encode(String),

    /// Builder fee failed shape or range validation.
    #[error("invalid builder fee: {0}")]
    BadBuilderFee(String),

    /// ECDSA signing failed.
    #[error("signing failed: {0}")]
    Sign(String),

    /// A request precondition was violated before anything was sent.
    #[error("bad request: {0}")]
    Request(String),

    /// The server rejected the request with a 4xx status. Never retried.
    #[error("HTTP {status}: {body}")]
    ClientStatus {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The server failed with a 5xx status. Retried when a policy is set.
    #[error("HTTP {status}: {body}")]
    ServerStatus {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Transport, timeout, or response-decoding failure. Retried when a
    /// policy is set.
    #[error("transport error: {0}")]
    Io(String),
}

impl Error {
    /// Whether the transport retry loop may attempt this request again.
    ///
    /// Only transient failures qualify: server-side 5xx statuses and
    /// transport-level errors. A 4xx means the request itself is wrong and
    /// resending it cannot help.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ServerStatus { .. } | Error::Io(_))
    }

    /// Returns the HTTP status code for status-classified errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ClientStatus { status, .. } | Error::ServerStatus { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    pub(crate) fn bad_number(what: &'static str, value: impl Into<String>) -> Self {
        Error::BadNumber {
            what,
            value: value.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<alloy::signers::Error> for Error {
    fn from(err: alloy::signers::Error) -> Self {
        Error::Sign(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        let client = Error::ClientStatus {
            status: 422,
            body: "rejected".into(),
        };
        assert!(!client.is_retryable());
        assert_eq!(client.status(), Some(422));

        let server = Error::ServerStatus {
            status: 503,
            body: "unavailable".into(),
        };
        assert!(server.is_retryable());

        assert!(Error::Io("connection reset".into()).is_retryable());
        assert!(!Error::UnknownSymbol("XYZ".into()).is_retryable());
        assert!(!Error::Encode("bad value".into()).is_retryable());
    }
}
