//! Out-of-band approval for confirmation-required policies.
//!
//! When the security policy returns `RequireConfirmation`, the engine asks
//! a [`ConfirmationGate`] for approval and blocks until it answers or the
//! confirmation timeout elapses. No other command is processed while an
//! approval is pending, which keeps risky actions strictly serialized.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use outpost_types::{Command, CommandId};

/// The approval seam. Implementations range from "always deny" to an
/// interactive operator prompt wired through a channel.
#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    /// Ask whether the command may execute. `operation` is the realized
    /// operation string shown to the approver.
    async fn confirm(&self, command: &Command, operation: &str) -> bool;
}

/// Denies everything. Used when no approver is configured.
pub struct DenyAllGate;

#[async_trait]
impl ConfirmationGate for DenyAllGate {
    async fn confirm(&self, _command: &Command, _operation: &str) -> bool {
        false
    }
}

/// A pending approval request delivered to whoever holds the receiver.
#[derive(Debug)]
pub struct ConfirmationRequest {
    /// Id of the command awaiting approval.
    pub command_id: CommandId,
    /// The action identifier.
    pub action: String,
    /// The realized operation string the approver is deciding about.
    pub operation: String,
    /// Send `true` to approve, `false` to deny. Dropping the sender denies.
    pub reply: oneshot::Sender<bool>,
}

/// Gate that forwards approval requests over a channel.
///
/// The receiving side (an operator UI, a test) answers through the
/// request's `reply` sender. If the receiver is gone or drops the reply,
/// the request is denied.
pub struct ChannelGate {
    tx: mpsc::Sender<ConfirmationRequest>,
}

impl ChannelGate {
    /// Create a gate and the receiver its requests arrive on.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ConfirmationRequest>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ConfirmationGate for ChannelGate {
    async fn confirm(&self, command: &Command, operation: &str) -> bool {
        let (reply_tx, reply_rx) = oneshot::channel();
        let request = ConfirmationRequest {
            command_id: command.id.clone(),
            action: command.action.clone(),
            operation: operation.to_string(),
            reply: reply_tx,
        };

        if self.tx.send(request).await.is_err() {
            tracing::warn!(command = %command.id, "confirmation receiver gone, denying");
            return false;
        }

        reply_rx.await.unwrap_or(false)
    }
}
