//! An in-memory `Connector` that plays a Gemini server over `tokio::io::duplex`.

use super::connection::Connector;
use crate::error::TransportError;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

const NOT_FOUND: &str = "51 Not found\r\n";

#[derive(Default)]
pub struct MockConnector {
    responses: HashMap<String, (Vec<u8>, Duration)>,
    refused: HashSet<String>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `request` with `response`.
    pub fn respond(self, request: &str, response: &str) -> Self {
        self.respond_after(request, response, Duration::ZERO)
    }

    /// Answer `request` with `response` once `delay` has passed.
    pub fn respond_after(mut self, request: &str, response: &str, delay: Duration) -> Self {
        self.responses.insert(request.to_string(), (response.as_bytes().to_vec(), delay));
        self
    }

    /// Answer `request` with raw bytes.
    pub fn respond_bytes(mut self, request: &str, response: &[u8]) -> Self {
        self.responses.insert(request.to_string(), (response.to_vec(), Duration::ZERO));
        self
    }

    /// Refuse TCP connections to `host`.
    pub fn refuse(mut self, host: &str) -> Self {
        self.refused.insert(host.to_string());
        self
    }
}

impl Connector for MockConnector {
    type Stream = DuplexStream;

    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<SocketAddr>, TransportError> {
        if host.ends_with(".invalid") {
            return Err(TransportError::Resolve(host.to_string()));
        }

        Ok(vec![SocketAddr::from(([127, 0, 0, 1], port))])
    }

    async fn connect(&self, host: &str, _addrs: Vec<SocketAddr>) -> Result<DuplexStream, TransportError> {
        if self.refused.contains(host) {
            return Err(TransportError::Connect("connection refused".to_string()));
        }

        let (client, server) = tokio::io::duplex(64 * 1024);
        let responses = self.responses.clone();

        tokio::spawn(async move {
            let mut server = BufReader::new(server);
            let mut line = String::new();
            if server.read_line(&mut line).await.is_err() {
                return;
            }

            let (response, delay) = responses
                .get(&line)
                .cloned()
                .unwrap_or_else(|| (NOT_FOUND.as_bytes().to_vec(), Duration::ZERO));

            tokio::time::sleep(delay).await;
            let _ = server.get_mut().write_all(&response).await;
        });

        Ok(client)
    }
}
