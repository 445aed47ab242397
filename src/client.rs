pub mod connection;
pub mod request;
pub mod response;
pub mod status;
mod tofu;

#[cfg(test)]
pub(crate) mod testing;

use crate::config::{CertificatePolicy, ClientConfig};
use crate::error::{GeminiError, TransportError};
use crate::url::normalize;
use connection::{Connection, ConnectionState, Connector};
use log::{debug, info, warn};
use request::Request;
use response::ResponsePage;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::ServerName;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tofu::TofuVerifier;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_rustls::{TlsConnector, client::TlsStream};

pub use tofu::{TofuError, TofuResult, TofuStore};

/// An error that can occur while setting up a client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The known hosts file could not be loaded.
    #[error(transparent)]
    KnownHosts(#[from] TofuError),
    /// The TLS configuration could not be built.
    #[error("TLS configuration error: {0}")]
    Tls(#[from] rustls::Error),
}

#[derive(Debug, PartialEq)]
enum TlsProtocolVersion {
    Tls1_3,
    Tls1_2,
    Unknown,
}

fn tls_protocol_version(version: Option<rustls::ProtocolVersion>) -> TlsProtocolVersion {
    match version {
        Some(rustls::ProtocolVersion::TLSv1_3) => TlsProtocolVersion::Tls1_3,
        Some(rustls::ProtocolVersion::TLSv1_2) => TlsProtocolVersion::Tls1_2,
        _ => TlsProtocolVersion::Unknown,
    }
}

/// Write hosts learned during a handshake to the known hosts file, off the async workers.
async fn save_known_hosts(store: Arc<RwLock<TofuStore>>) {
    match tokio::task::spawn_blocking(move || tofu::persist(&store)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Failed to save known hosts: {e}"),
        Err(e) => warn!("Failed to save known hosts: {e}"),
    }
}

/// Connects to Gemini servers over TCP and TLS.
pub struct TlsTransport {
    connector: TlsConnector,
    // set when certificates are pinned
    known_hosts: Option<Arc<RwLock<TofuStore>>>,
}

impl TlsTransport {
    fn new(policy: CertificatePolicy, store: Arc<RwLock<TofuStore>>) -> Result<Self, ClientError> {
        let provider = CryptoProvider::get_default()
            .cloned()
            .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()));

        let builder = rustls::ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?;

        let (config, known_hosts) = match policy {
            CertificatePolicy::Tofu => {
                let verifier = Arc::new(TofuVerifier::new(store.clone(), provider));
                let config = builder
                    .dangerous()
                    .with_custom_certificate_verifier(verifier)
                    .with_no_client_auth();
                (config, Some(store))
            }
            CertificatePolicy::WebPki => {
                let roots = rustls::RootCertStore { roots: webpki_roots::TLS_SERVER_ROOTS.to_vec() };
                (builder.with_root_certificates(roots).with_no_client_auth(), None)
            }
        };

        Ok(Self { connector: TlsConnector::from(Arc::new(config)), known_hosts })
    }
}

/// Host names in URLs wrap IPv6 literals in brackets, sockets and SNI do not.
fn bare_host(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|host| host.strip_suffix(']'))
        .unwrap_or(host)
}

impl Connector for TlsTransport {
    type Stream = TlsStream<TcpStream>;

    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>, TransportError> {
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((bare_host(host), port))
            .await
            .map_err(|e| TransportError::Resolve(format!("{host}: {e}")))?
            .collect();

        if addrs.is_empty() {
            return Err(TransportError::Resolve(host.to_string()));
        }

        Ok(addrs)
    }

    async fn connect(&self, host: &str, addrs: Vec<SocketAddr>) -> Result<Self::Stream, TransportError> {
        let tcp_stream = TcpStream::connect(&addrs[..])
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        // server name indication
        let domain = ServerName::try_from(bare_host(host).to_string())
            .map_err(|e| TransportError::InvalidServerName(e.to_string()))?;

        let tls_stream = self.connector.connect(domain, tcp_stream)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        let protocol_version = tls_protocol_version(tls_stream.get_ref().1.protocol_version());
        debug!("Connected to {host} using {protocol_version:?}");

        // the verifier only learns in memory
        if let Some(store) = &self.known_hosts {
            save_known_hosts(store.clone()).await;
        }

        Ok(tls_stream)
    }
}

/// A client for the Gemini protocol.
///
/// A client holds no connections. Every call to [`Client::fetch`] runs one complete
/// transaction, so a single client can be shared between tasks.
pub struct Client<C = TlsTransport> {
    connector: C,
    config: ClientConfig,
    known_hosts: Arc<RwLock<TofuStore>>,
}

impl Client<TlsTransport> {
    /// Create a client with the default configuration and an in-memory TOFU store.
    pub fn new() -> Result<Self, ClientError> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client, loading the known hosts file if the configuration names one.
    pub fn with_config(config: ClientConfig) -> Result<Self, ClientError> {
        let store = match &config.known_hosts {
            Some(path) => TofuStore::open(path)?,
            None => TofuStore::in_memory(),
        };
        let known_hosts = Arc::new(RwLock::new(store));
        let connector = TlsTransport::new(config.certificate_policy, known_hosts.clone())?;

        Ok(Self { connector, config, known_hosts })
    }
}

impl<C: Connector> Client<C> {
    /// Create a client that opens its streams through `connector`.
    pub fn with_connector(connector: C, config: ClientConfig) -> Self {
        Self { connector, config, known_hosts: Arc::new(RwLock::new(TofuStore::in_memory())) }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The SHA-256 fingerprint pinned for a host, if one has been seen.
    pub fn pinned_fingerprint(&self, host: &str) -> Option<String> {
        let store = self.known_hosts.read().ok()?;
        store.fingerprint(host).map(str::to_string)
    }

    /// Run one transaction for a user-typed address.
    pub async fn fetch(&self, address: &str) -> Result<ResponsePage, GeminiError> {
        let (states, _) = watch::channel(ConnectionState::Setup);
        self.fetch_observed(address, &states).await
    }

    /// Run one transaction, publishing each connection state on `states`.
    ///
    /// The last state published is always terminal once this returns, unless the address
    /// was rejected before a connection was attempted.
    pub async fn fetch_observed(&self, address: &str, states: &watch::Sender<ConnectionState>) -> Result<ResponsePage, GeminiError> {
        let url = normalize(address)?;
        let request = Request(url);
        let bytes = request.encode()?;
        info!("Requesting {}", request.line());

        let host = request.0.host();
        let port = request.0.port();
        let limit = self.config.max_response_size;

        let exchange = async {
            let connection = Connection::open(&self.connector, host, port, states).await?;
            connection.exchange(&bytes, limit).await
        };

        let text = match tokio::time::timeout(self.config.timeout, exchange).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!("Transaction for {} failed: {e}", request.line());
                return Err(e.into());
            }
            Err(_) => {
                let cause = TransportError::TimedOut(self.config.timeout);
                warn!("Transaction for {} failed: {cause}", request.line());
                states.send_replace(ConnectionState::Failed(cause.clone()));
                return Err(cause.into());
            }
        };

        let page = ResponsePage::parse(&text);
        info!("Received {:?} {:?} for {}", page.raw_status, page.status_meta, request.line());

        Ok(page)
    }
}
