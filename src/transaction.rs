//! Running transactions off the caller's task and keeping the newest page.
//!
//! A [`Dispatcher`] spawns one tokio task per address and numbers it with a
//! [`TransactionId`]. Every task delivers exactly one [`Completion`] on the channel handed out
//! by [`Dispatcher::new`]. Completions may arrive in any order, so a consumer that shows a
//! single page keeps it in a [`PageSlot`], which drops anything older than what it holds.

use crate::client::connection::Connector;
use crate::client::response::ResponsePage;
use crate::client::{Client, TlsTransport};
use crate::error::GeminiError;
use log::{debug, warn};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Identifies a transaction. Later transactions have larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The outcome of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Which transaction this is.
    pub id: TransactionId,
    /// The address as the user typed it.
    pub address: String,
    /// The decoded page, or why there is none.
    pub outcome: Result<ResponsePage, GeminiError>,
}

/// Spawns transactions and reports their completions.
pub struct Dispatcher<C = TlsTransport> {
    client: Arc<Client<C>>,
    next_id: AtomicU64,
    completions: mpsc::UnboundedSender<Completion>,
}

impl<C: Connector> Dispatcher<C> {
    /// Create a dispatcher and the receiving end of its completion channel.
    pub fn new(client: Arc<Client<C>>) -> (Self, mpsc::UnboundedReceiver<Completion>) {
        let (completions, receiver) = mpsc::unbounded_channel();
        let dispatcher = Self { client, next_id: AtomicU64::new(1), completions };

        (dispatcher, receiver)
    }

    /// Start a transaction for `address` on a new task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, address: impl Into<String>) -> TransactionId {
        let id = TransactionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let address = address.into();
        let client = self.client.clone();
        let completions = self.completions.clone();
        debug!("Dispatching transaction {id} for {address}");

        tokio::spawn(async move {
            let outcome = client.fetch(&address).await;
            if completions.send(Completion { id, address, outcome }).is_err() {
                debug!("Nobody is listening for transaction {id}");
            }
        });

        id
    }
}

/// What a [`PageSlot`] did with a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotUpdate {
    /// The completion carried a page, which is now current.
    Replaced,
    /// The completion carried an error, which is now the last error.
    Failed(GeminiError),
    /// A newer transaction already completed, so this one was dropped.
    Stale,
}

/// The single current page a consumer shows.
#[derive(Debug, Default)]
pub struct PageSlot {
    latest: Option<TransactionId>,
    page: Option<ResponsePage>,
    error: Option<GeminiError>,
}

impl PageSlot {
    /// An empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a completion, unless a newer one has already been taken.
    pub fn accept(&mut self, completion: Completion) -> SlotUpdate {
        if self.latest.is_some_and(|latest| completion.id <= latest) {
            warn!("Dropping stale completion {} for {}", completion.id, completion.address);
            return SlotUpdate::Stale;
        }
        self.latest = Some(completion.id);

        match completion.outcome {
            Ok(page) => {
                self.page = Some(page);
                self.error = None;
                SlotUpdate::Replaced
            }
            Err(e) => {
                self.error = Some(e.clone());
                SlotUpdate::Failed(e)
            }
        }
    }

    /// The current page.
    pub fn page(&self) -> Option<&ResponsePage> {
        self.page.as_ref()
    }

    /// The error from the newest transaction, if it failed.
    pub fn error(&self) -> Option<&GeminiError> {
        self.error.as_ref()
    }

    /// The id of the newest completion taken.
    pub fn latest(&self) -> Option<TransactionId> {
        self.latest
    }
}
