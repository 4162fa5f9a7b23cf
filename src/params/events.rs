//! Sources of operator replies for the parameter conversation.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::Prompt;

/// Failure talking to the operator.
#[derive(Debug, Error)]
pub enum EventSourceError {
    /// Nobody is listening for prompts any more.
    #[error("event source closed")]
    Closed,

    /// Terminal or transport IO failure.
    #[error("event source IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Two-way channel to the operator.
///
/// `next_reply` must be cancel-safe: the collector wraps it in a timeout.
#[async_trait]
pub trait EventSource: Send {
    /// Shows a prompt.
    async fn present(&mut self, prompt: &Prompt) -> Result<(), EventSourceError>;

    /// Waits for the next reply; `None` once no more replies can arrive.
    async fn next_reply(&mut self) -> Option<String>;

    /// Shows an informational message.
    async fn notify(&mut self, text: &str) -> Result<(), EventSourceError>;
}

/// Something the pipeline sent to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorEvent {
    /// A parameter question.
    Prompt(Prompt),
    /// A status message.
    Notice(String),
}

/// [`EventSource`] backed by tokio channels, for embedding in a bot or tests.
#[derive(Debug)]
pub struct ChannelEventSource {
    outgoing: mpsc::UnboundedSender<OperatorEvent>,
    replies: mpsc::Receiver<String>,
}

/// The operator's end of a [`ChannelEventSource`].
#[derive(Debug)]
pub struct OperatorHandle {
    /// Prompts and notices from the pipeline.
    pub events: mpsc::UnboundedReceiver<OperatorEvent>,
    /// Replies to the pipeline.
    pub replies: mpsc::Sender<String>,
}

impl ChannelEventSource {
    /// Creates a connected source/handle pair buffering up to `capacity` replies.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, OperatorHandle) {
        let (outgoing, events) = mpsc::unbounded_channel();
        let (replies_tx, replies) = mpsc::channel(capacity.max(1));
        (
            Self { outgoing, replies },
            OperatorHandle {
                events,
                replies: replies_tx,
            },
        )
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn present(&mut self, prompt: &Prompt) -> Result<(), EventSourceError> {
        self.outgoing
            .send(OperatorEvent::Prompt(prompt.clone()))
            .map_err(|_| EventSourceError::Closed)
    }

    async fn next_reply(&mut self) -> Option<String> {
        self.replies.recv().await
    }

    async fn notify(&mut self, text: &str) -> Result<(), EventSourceError> {
        self.outgoing
            .send(OperatorEvent::Notice(text.to_string()))
            .map_err(|_| EventSourceError::Closed)
    }
}
