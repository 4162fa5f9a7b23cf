//! Terminal event source: prompts on stderr, replies from stdin.

use std::io::BufRead;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::debug;
use uploader_core::params::{EventSource, EventSourceError, Prompt};

/// Replies buffered between the reader thread and the pipeline.
const REPLY_BUFFER: usize = 16;

/// Asks the operator on the terminal.
pub(crate) struct ConsoleEventSource {
    replies: Option<mpsc::Receiver<String>>,
}

impl ConsoleEventSource {
    /// Reads replies from stdin.
    pub(crate) fn interactive() -> Self {
        Self::from_reader(std::io::BufReader::new(std::io::stdin()))
    }

    /// Reads replies line by line from `reader`.
    pub(crate) fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        Self {
            replies: Some(spawn_line_reader(reader)),
        }
    }

    /// Never yields a reply, so every step takes its default at once.
    pub(crate) fn closed() -> Self {
        Self { replies: None }
    }
}

/// Feeds lines from `reader` into a channel from a plain OS thread.
///
/// The thread is detached: a read left pending by a timed-out prompt must
/// not hold up runtime shutdown. It stops at end of input or once the
/// receiver is gone.
fn spawn_line_reader<R: BufRead + Send + 'static>(reader: R) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(REPLY_BUFFER);
    let spawned = std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        debug!(error = %e, "could not start stdin reader, replies disabled");
    }
    rx
}

async fn write_stderr(text: &str) -> Result<(), EventSourceError> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(text.as_bytes()).await?;
    stderr.write_all(b"\n").await?;
    stderr.flush().await?;
    Ok(())
}

#[async_trait]
impl EventSource for ConsoleEventSource {
    async fn present(&mut self, prompt: &Prompt) -> Result<(), EventSourceError> {
        if self.replies.is_none() {
            return Ok(());
        }
        write_stderr(&prompt.text).await
    }

    async fn next_reply(&mut self) -> Option<String> {
        let replies = self.replies.as_mut()?;
        // Receiver::recv is cancel-safe, so a timed-out wait loses nothing.
        let reply = replies.recv().await;
        if reply.is_none() {
            self.replies = None;
        }
        reply
    }

    async fn notify(&mut self, text: &str) -> Result<(), EventSourceError> {
        write_stderr(text).await
    }
}
