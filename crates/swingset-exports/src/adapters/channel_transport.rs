//! # Channel Transport
//!
//! Bridge to the execution engine over a Tokio channel.
//!
//! Each request is encoded as a JSON envelope and handed to the task owning
//! the engine connection together with a oneshot reply channel. The bridge
//! task answers with the engine's raw response or its error message.
//!
//! Flow:
//! 1. Caller encodes the action and registers a oneshot receiver
//! 2. The request is queued on the bounded mpsc channel
//! 3. The bridge task forwards it to the engine and calls `respond()`
//! 4. Caller awaits the receiver

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::domain::{SwingStoreExportError, TransportError};
use crate::ipc::SwingStoreExportAction;
use crate::ports::SwingStoreTransport;

/// A request waiting for the engine's answer.
#[derive(Debug)]
pub struct BridgeRequest {
    /// Encoded action envelope.
    pub message: String,
    /// Whether the request must be refused once the controller is inited.
    pub must_not_be_inited: bool,
    reply: oneshot::Sender<Result<String, String>>,
}

impl BridgeRequest {
    /// Decode the carried envelope.
    pub fn action(&self) -> Result<SwingStoreExportAction, SwingStoreExportError> {
        SwingStoreExportAction::decode(&self.message)
    }

    /// Answer the request. A caller that gave up is ignored.
    pub fn respond(self, result: Result<String, String>) {
        if self.reply.send(result).is_err() {
            debug!("swing-store bridge caller dropped before response");
        }
    }
}

/// [`SwingStoreTransport`] over an mpsc channel to the bridge task.
#[derive(Debug)]
pub struct ChannelTransport {
    sender: mpsc::Sender<BridgeRequest>,
    inited: AtomicBool,
}

impl ChannelTransport {
    /// Create the transport and the receiving end for the bridge task.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<BridgeRequest>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (
            Self {
                sender,
                inited: AtomicBool::new(false),
            },
            receiver,
        )
    }

    /// Record that the engine controller has been initialized.
    pub fn mark_inited(&self) {
        self.inited.store(true, Ordering::SeqCst);
    }

    /// Whether the engine controller has been initialized.
    pub fn is_inited(&self) -> bool {
        self.inited.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SwingStoreTransport for ChannelTransport {
    async fn blocking_send(
        &self,
        action: &SwingStoreExportAction,
        must_not_be_inited: bool,
    ) -> Result<String, TransportError> {
        if must_not_be_inited && self.is_inited() {
            warn!(request = %action.request, "refusing exclusive request after controller init");
            return Err(TransportError::AlreadyInitialized);
        }

        let message = action
            .encode()
            .map_err(|e| TransportError::Failed(e.to_string()))?;
        let (reply, response) = oneshot::channel();
        self.sender
            .send(BridgeRequest {
                message,
                must_not_be_inited,
                reply,
            })
            .await
            .map_err(|_| TransportError::Disconnected)?;

        match response.await {
            Ok(Ok(out)) => Ok(out),
            Ok(Err(message)) => Err(TransportError::Failed(message)),
            Err(_) => Err(TransportError::Disconnected),
        }
    }
}
