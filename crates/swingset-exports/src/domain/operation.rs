//! # Operation State Machine
//!
//! Lifecycle of one export operation:
//!
//! ```text
//! Idle → Initiating ─┬→ Started ─┬→ Retrieving ─┬→ Retrieved ──────┬→ Done
//!                    │           │              └→ DiscardPending ─┤
//!                    │           └──────────────→ DiscardPending ─┤
//!                    └→ InitiateFailed ────────────────────────────┘
//! ```
//!
//! The phase is written by the export worker task and by the retrieve
//! handle it lends to the event handler; the main context never touches it.

use parking_lot::Mutex;
use std::fmt;
use tracing::warn;

use super::errors::{OperationKind, SwingStoreExportError};

/// Phase of an export operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationPhase {
    /// Record created, worker not yet running.
    Idle,
    /// `initiate` request in flight.
    Initiating,
    /// The engine accepted the export; the handler may retrieve it.
    Started,
    /// The `initiate` request failed.
    InitiateFailed,
    /// `retrieve` request in flight.
    Retrieving,
    /// The engine handed the export over; the node owns the directory.
    Retrieved,
    /// The engine still owns the export and must be told to discard it.
    DiscardPending,
    /// Terminal.
    Done,
}

impl OperationPhase {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: OperationPhase) -> bool {
        use OperationPhase::*;
        matches!(
            (self, next),
            (Idle, Initiating)
                | (Initiating, Started)
                | (Initiating, InitiateFailed)
                | (InitiateFailed, Done)
                | (Started, Retrieving)
                | (Started, DiscardPending)
                | (Retrieving, Retrieved)
                | (Retrieving, DiscardPending)
                | (Retrieved, Done)
                | (DiscardPending, Done)
        )
    }

    /// Whether the phase is terminal.
    pub fn is_terminal(self) -> bool {
        self == OperationPhase::Done
    }
}

impl fmt::Display for OperationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationPhase::Idle => "idle",
            OperationPhase::Initiating => "initiating",
            OperationPhase::Started => "started",
            OperationPhase::InitiateFailed => "initiate-failed",
            OperationPhase::Retrieving => "retrieving",
            OperationPhase::Retrieved => "retrieved",
            OperationPhase::DiscardPending => "discard-pending",
            OperationPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// State of one in-flight export, shared between the worker task and the
/// retrieve handle.
#[derive(Debug)]
pub struct OperationState {
    kind: OperationKind,
    block_height: u64,
    phase: Mutex<OperationPhase>,
    /// Retrieve failure the handler may have swallowed.
    retrieve_error: Mutex<Option<SwingStoreExportError>>,
}

impl OperationState {
    /// New export record for `block_height` (0 = latest).
    pub fn export(block_height: u64) -> Self {
        Self {
            kind: OperationKind::Export,
            block_height,
            phase: Mutex::new(OperationPhase::Idle),
            retrieve_error: Mutex::new(None),
        }
    }

    /// Operation kind.
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Requested block height.
    pub fn block_height(&self) -> u64 {
        self.block_height
    }

    /// Current phase.
    pub fn phase(&self) -> OperationPhase {
        *self.phase.lock()
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn transition(&self, next: OperationPhase) -> Result<(), SwingStoreExportError> {
        let mut phase = self.phase.lock();
        if !phase.can_transition_to(next) {
            return Err(SwingStoreExportError::Protocol(format!(
                "illegal export phase transition {} -> {}",
                *phase, next
            )));
        }
        *phase = next;
        Ok(())
    }

    /// Claim the export for retrieval.
    ///
    /// Only succeeds from `Started`: the handle is used at most once, and a
    /// handle used after the worker scheduled the discard is rejected.
    pub fn begin_retrieve(&self) -> Result<(), SwingStoreExportError> {
        let mut phase = self.phase.lock();
        if *phase != OperationPhase::Started {
            return Err(SwingStoreExportError::OperationNotActive);
        }
        *phase = OperationPhase::Retrieving;
        Ok(())
    }

    /// Decide, once the handler has returned, whether the engine must be told
    /// to discard the export. Invalidates any outstanding retrieve handle.
    pub fn schedule_discard(&self) -> bool {
        let mut phase = self.phase.lock();
        match *phase {
            OperationPhase::Retrieved => false,
            OperationPhase::Started | OperationPhase::Retrieving => {
                *phase = OperationPhase::DiscardPending;
                true
            }
            OperationPhase::DiscardPending => true,
            other => {
                warn!(phase = %other, "discard check in unexpected export phase");
                false
            }
        }
    }

    /// Mark the operation finished.
    pub fn finish(&self) {
        if let Err(err) = self.transition(OperationPhase::Done) {
            warn!(err = %err, "export operation finished from unexpected phase");
            *self.phase.lock() = OperationPhase::Done;
        }
    }

    /// Whether the engine handed the export over.
    pub fn is_retrieved(&self) -> bool {
        self.phase() == OperationPhase::Retrieved
    }

    /// Remember a retrieve failure so it survives a handler that ignores it.
    pub fn record_retrieve_error(&self, err: SwingStoreExportError) {
        *self.retrieve_error.lock() = Some(err);
    }

    /// Take the recorded retrieve failure, if any.
    pub fn take_retrieve_error(&self) -> Option<SwingStoreExportError> {
        self.retrieve_error.lock().take()
    }
}
