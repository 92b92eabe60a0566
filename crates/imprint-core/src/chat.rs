//! Append-only chat log.
//!
//! User messages are accepted only while the session gate is open. Each
//! accepted message schedules its own reply task, which waits the response
//! delay and then appends exactly one assistant message. Sends are never
//! coalesced; with a fixed delay, replies land in the order they were sent.

use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::models::{ChatMessage, MessageId, Role};
use crate::progress::SessionGate;
use crate::responder::Responder;

/// Why a user message was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejection {
    EmptyInput,
    GateClosed,
}

#[derive(Debug)]
pub enum SendOutcome {
    Accepted(PendingReply),
    Rejected(SendRejection),
}

impl SendOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SendOutcome::Accepted(_))
    }
}

/// The user message that was appended and the reply scheduled for it.
#[derive(Debug)]
pub struct PendingReply {
    pub user_message: MessageId,
    reply: JoinHandle<MessageId>,
}

impl PendingReply {
    /// Wait for the assistant reply and return its message id.
    pub async fn wait(self) -> Option<MessageId> {
        self.reply.await.ok()
    }
}

#[derive(Clone)]
pub struct ChatLog {
    inner: Arc<Inner>,
}

struct Inner {
    messages: RwLock<Vec<ChatMessage>>,
    pending_replies: AtomicUsize,
    gate: SessionGate,
    responder: Arc<dyn Responder>,
    response_delay: Duration,
}

impl ChatLog {
    pub const DEFAULT_RESPONSE_DELAY: Duration = Duration::from_millis(1500);

    pub fn new(gate: SessionGate, responder: Arc<dyn Responder>, response_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                messages: RwLock::new(Vec::new()),
                pending_replies: AtomicUsize::new(0),
                gate,
                responder,
                response_delay,
            }),
        }
    }

    pub fn from_config(
        config: &SessionConfig,
        gate: SessionGate,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self::new(gate, responder, config.response_delay())
    }

    pub fn gate(&self) -> &SessionGate {
        &self.inner.gate
    }

    /// Append a user message and schedule the assistant reply.
    ///
    /// Blank text and sends while the gate is closed are rejected without
    /// touching the log.
    pub async fn append_user(&self, text: impl Into<String>) -> SendOutcome {
        let text = text.into();
        if text.trim().is_empty() {
            tracing::debug!("Ignoring empty chat message");
            return SendOutcome::Rejected(SendRejection::EmptyInput);
        }
        if !self.inner.gate.is_open() {
            tracing::debug!("Ignoring chat message: session not ready");
            return SendOutcome::Rejected(SendRejection::GateClosed);
        }

        let user_message = self.append(Role::User, text.clone()).await;
        self.inner.pending_replies.fetch_add(1, Ordering::SeqCst);

        let log = self.clone();
        let reply = tokio::spawn(async move {
            tokio::time::sleep(log.inner.response_delay).await;
            let content = log.inner.responder.respond(&text);
            let id = log.append(Role::Assistant, content).await;
            log.inner.pending_replies.fetch_sub(1, Ordering::SeqCst);
            id
        });

        SendOutcome::Accepted(PendingReply {
            user_message,
            reply,
        })
    }

    /// Append a system notification. Not subject to the gate.
    pub async fn append_system(&self, text: impl Into<String>) -> MessageId {
        self.append(Role::System, text.into()).await
    }

    async fn append(&self, role: Role, content: String) -> MessageId {
        let mut messages = self.inner.messages.write().await;
        let id = messages.len() as MessageId + 1;
        messages.push(ChatMessage {
            id,
            role,
            content,
            created_at: Utc::now(),
        });
        tracing::debug!(message_id = id, ?role, "Chat message appended");
        id
    }

    /// True while at least one assistant reply is still pending.
    pub fn is_typing(&self) -> bool {
        self.inner.pending_replies.load(Ordering::SeqCst) > 0
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.inner.messages.read().await.clone()
    }

    pub async fn message(&self, id: MessageId) -> Option<ChatMessage> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.inner.messages.read().await.get(index).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.messages.read().await.is_empty()
    }
}
