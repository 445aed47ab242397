use crate::error::TransportError;
use log::debug;
use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;

/// Why a connection is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// The host name is being resolved.
    ResolvingHost,
}

/// The lifecycle of a connection.
///
/// `Setup → Preparing → (Waiting ⇄ Preparing) → Ready`, ending in `Cancelled` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing has happened yet.
    Setup,
    /// Connecting and handshaking.
    Preparing,
    /// Blocked on something outside the connection.
    Waiting(WaitReason),
    /// The handshake is done, the request may be sent.
    Ready,
    /// The connection failed.
    Failed(TransportError),
    /// The connection was closed.
    Cancelled,
}

/// Something that moves a connection to its next state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Start connecting.
    Start,
    /// Block on something.
    Wait(WaitReason),
    /// Stop waiting.
    Resume,
    /// The handshake finished.
    Established,
    /// Something went wrong.
    Fail(TransportError),
    /// Close the connection.
    Cancel,
}

/// An event that makes no sense in the current state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot apply {event:?} to a connection in state {state:?}")]
pub struct InvalidTransition {
    /// The state the connection was in.
    pub state: ConnectionState,
    /// The event that was rejected.
    pub event: ConnectionEvent,
}

impl ConnectionState {
    /// Whether no further events are accepted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Cancelled)
    }

    /// Apply an event, returning the next state.
    pub fn transition(self, event: ConnectionEvent) -> Result<Self, InvalidTransition> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        match (self, event) {
            (S::Setup, E::Start) => Ok(S::Preparing),
            (S::Preparing | S::Waiting(_), E::Wait(reason)) => Ok(S::Waiting(reason)),
            (S::Waiting(_), E::Resume) => Ok(S::Preparing),
            (S::Preparing, E::Established) => Ok(S::Ready),
            (state, E::Fail(cause)) if !state.is_terminal() => Ok(S::Failed(cause)),
            (state, E::Cancel) if !state.is_terminal() => Ok(S::Cancelled),
            (state, event) => Err(InvalidTransition { state, event }),
        }
    }
}

/// Opens byte streams to hosts.
pub trait Connector: Send + Sync + 'static {
    /// The stream a successful connection yields.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Resolve a host to socket addresses.
    fn resolve(&self, host: &str, port: u16) -> impl Future<Output = Result<Vec<SocketAddr>, TransportError>> + Send;

    /// Connect to one of the resolved addresses and finish any handshake.
    fn connect(&self, host: &str, addrs: Vec<SocketAddr>) -> impl Future<Output = Result<Self::Stream, TransportError>> + Send;
}

/// A single-use connection that reports every state change on a watch channel.
pub struct Connection<'a, S> {
    state: ConnectionState,
    states: &'a watch::Sender<ConnectionState>,
    stream: Option<S>,
}

impl<'a, S: AsyncRead + AsyncWrite + Unpin> Connection<'a, S> {
    fn apply(&mut self, event: ConnectionEvent) -> Result<(), TransportError> {
        let next = self.state.clone().transition(event).map_err(|e| {
            debug!("{e}");
            TransportError::NotReady
        })?;
        debug!("Connection {:?} -> {:?}", self.state, next);

        self.state = next.clone();
        self.states.send_replace(next);

        Ok(())
    }

    /// Fail the connection and release the stream.
    fn fail(&mut self, cause: TransportError) -> TransportError {
        self.stream = None;
        if !self.state.is_terminal() {
            let _ = self.apply(ConnectionEvent::Fail(cause.clone()));
        }

        cause
    }

    /// Resolve and connect to a host, leaving the connection `Ready`.
    pub async fn open<C>(connector: &C, host: &str, port: u16, states: &'a watch::Sender<ConnectionState>) -> Result<Self, TransportError>
    where
        C: Connector<Stream = S>,
    {
        let mut connection = Self { state: ConnectionState::Setup, states, stream: None };
        states.send_replace(ConnectionState::Setup);

        connection.apply(ConnectionEvent::Start)?;
        connection.apply(ConnectionEvent::Wait(WaitReason::ResolvingHost))?;

        let addrs = match connector.resolve(host, port).await {
            Ok(addrs) => addrs,
            Err(e) => return Err(connection.fail(e)),
        };

        connection.apply(ConnectionEvent::Resume)?;

        match connector.connect(host, addrs).await {
            Ok(stream) => connection.stream = Some(stream),
            Err(e) => return Err(connection.fail(e)),
        }

        connection.apply(ConnectionEvent::Established)?;

        Ok(connection)
    }

    /// The current state.
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Send the request, read the whole response as UTF-8 and close the connection.
    ///
    /// Reads stop with [`TransportError::ResponseTooLarge`] once `limit` bytes are exceeded.
    /// A response that is not UTF-8 fails the connection with [`TransportError::Decode`].
    pub async fn exchange(mut self, request: &[u8], limit: usize) -> Result<String, TransportError> {
        if self.state != ConnectionState::Ready {
            return Err(TransportError::NotReady);
        }
        let Some(mut stream) = self.stream.take() else {
            return Err(self.fail(TransportError::NotReady));
        };

        let sent = async {
            stream.write_all(request).await?;
            stream.flush().await
        }.await;
        if let Err(e) = sent {
            return Err(self.fail(TransportError::Send(e.to_string())));
        }

        let mut buffer = Vec::new();
        let read = (&mut stream).take((limit as u64).saturating_add(1)).read_to_end(&mut buffer).await;

        match read {
            Ok(_) => {}
            // servers often close without a TLS close_notify once the response is sent
            Err(e) if e.kind() == ErrorKind::UnexpectedEof && !buffer.is_empty() => {
                debug!("Peer closed without close_notify after {} bytes", buffer.len());
            }
            Err(e) => return Err(self.fail(TransportError::Receive(e.to_string()))),
        }

        if buffer.len() > limit {
            return Err(self.fail(TransportError::ResponseTooLarge(limit)));
        }

        let response = match String::from_utf8(buffer) {
            Ok(response) => response,
            Err(e) => return Err(self.fail(TransportError::Decode(e.to_string()))),
        };

        if let Err(e) = stream.shutdown().await {
            debug!("Ignoring error while closing the connection: {e}");
        }
        drop(stream);
        self.apply(ConnectionEvent::Cancel)?;

        Ok(response)
    }
}

impl<S> Drop for Connection<'_, S> {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            self.stream = None;
            self.state = ConnectionState::Cancelled;
            self.states.send_replace(ConnectionState::Cancelled);
        }
    }
}
