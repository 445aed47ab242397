//! # gemtx
//!
//! gemtx runs Gemini transactions: it turns a typed address into a request, sends it over
//! TLS, and decodes the single response that comes back.
//!
//! It follows the client side of the protocol described at [gemini://geminiprotocol.net/docs/protocol-specification.gmi](gemini://geminiprotocol.net/docs/protocol-specification.gmi).
//! Rendering, redirects and client certificates are left to the caller.

#![warn(missing_docs)]
#![warn(unused_imports)]

mod client;
mod config;
mod error;
pub mod transaction;
mod url;

pub use client::{
    Client,
    ClientError,
    TlsTransport,
    TofuError,
    TofuResult,
    TofuStore,
    connection::{Connection, ConnectionEvent, ConnectionState, Connector, InvalidTransition, WaitReason},
    request::Request,
    response::{MimeType, ResponsePage},
    status::{StatusCategory, StatusCode},
};
pub use config::{CertificatePolicy, ClientConfig, DEFAULT_MAX_RESPONSE_SIZE, DEFAULT_TIMEOUT};
pub use error::{GeminiError, MAX_REQUEST_SIZE, TransportError};
pub use transaction::{Completion, Dispatcher, PageSlot, SlotUpdate, TransactionId};
pub use crate::url::{DEFAULT_PORT, RequestURL, SCHEME, URLBuilder, normalize};
