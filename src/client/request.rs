use crate::error::{GeminiError, MAX_REQUEST_SIZE};
use crate::url::RequestURL;

/// A request for a given URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request(pub RequestURL);

impl Request {
    /// The request line, without the trailing CRLF.
    ///
    /// Only the scheme, host and path are sent. The port and any query on the URL are left out.
    pub fn line(&self) -> String {
        format!("{}://{}{}", self.0.scheme(), self.0.host(), self.0.path())
    }

    /// Encode the request as it is sent on the wire.
    pub fn encode(&self) -> Result<Vec<u8>, GeminiError> {
        let line = self.line();
        if line.contains(['\r', '\n']) {
            return Err(GeminiError::RequestInvalid);
        }

        let mut bytes = line.into_bytes();
        bytes.extend_from_slice(b"\r\n");

        if bytes.len() > MAX_REQUEST_SIZE {
            return Err(GeminiError::RequestTooLarge(bytes.len()));
        }

        Ok(bytes)
    }
}
