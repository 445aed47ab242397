use std::path::PathBuf;
use std::time::Duration;

/// How long a whole transaction may take, from name resolution to the last byte.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// The largest response body the client will buffer.
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

/// How server certificates are checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CertificatePolicy {
    /// Pin the first certificate seen for each host. Most Gemini servers use self-signed certificates.
    #[default]
    Tofu,
    /// Require a certificate chain to a well-known root authority.
    WebPki,
}

/// Settings for a [`crate::Client`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Deadline for a single transaction.
    pub timeout: Duration,
    /// Responses longer than this fail with [`crate::TransportError::ResponseTooLarge`].
    pub max_response_size: usize,
    /// How server certificates are checked.
    pub certificate_policy: CertificatePolicy,
    /// Where pinned certificates are kept. `None` keeps them in memory only.
    pub known_hosts: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            certificate_policy: CertificatePolicy::default(),
            known_hosts: None,
        }
    }
}
