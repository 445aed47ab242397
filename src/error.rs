use std::time::Duration;
use thiserror::Error;

/// The maximum size of a request line in bytes, including the trailing CRLF.
pub const MAX_REQUEST_SIZE: usize = 1024;

/// An error that can end a Gemini transaction.
///
/// Normalization and encoding errors are raised before any network I/O happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeminiError {
    /// The address used a scheme other than `gemini`.
    #[error("unsupported scheme: {0}")]
    SchemeInvalid(String),
    /// The address could not be parsed into a URL.
    #[error("invalid URL: {0}")]
    URLInvalid(String),
    /// The request could not be encoded as a single line.
    #[error("invalid request")]
    RequestInvalid,
    /// The encoded request is longer than [`MAX_REQUEST_SIZE`] bytes.
    #[error("request is too large: {0} bytes (maximum is {max})", max = MAX_REQUEST_SIZE)]
    RequestTooLarge(usize),
    /// The connection failed before a response could be read.
    #[error("transport failure: {0}")]
    TransportFailure(#[from] TransportError),
}

/// The cause of a failed connection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The host address could not be resolved.
    #[error("failed to resolve {0}")]
    Resolve(String),
    /// The TCP connection could not be established.
    #[error("failed to connect: {0}")]
    Connect(String),
    /// The host is not usable as a TLS server name.
    #[error("invalid server name: {0}")]
    InvalidServerName(String),
    /// The TLS handshake failed.
    #[error("TLS handshake failed: {0}")]
    Handshake(String),
    /// The request could not be written.
    #[error("failed to send request: {0}")]
    Send(String),
    /// The response could not be read.
    #[error("failed to read response: {0}")]
    Receive(String),
    /// The response was not valid UTF-8.
    #[error("response is not valid UTF-8: {0}")]
    Decode(String),
    /// The response exceeded the configured size limit.
    #[error("response exceeds {0} bytes")]
    ResponseTooLarge(usize),
    /// The transaction did not finish in time.
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    /// I/O was attempted on a connection that is not ready.
    #[error("connection is not ready")]
    NotReady,
}
