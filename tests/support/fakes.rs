//! In-memory collaborators for pipeline tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use uploader_core::destination::{
    Destination, DestinationId, MessageId, MessageRef, PlatformError, ThreadId, UploadRequest,
};
use uploader_core::download::{AssetDownloader, DownloadError};
use uploader_core::index::{IndexSink, PersistError, TopicIndex};
use uploader_core::params::{EventSource, EventSourceError, Prompt};

/// Everything a [`FakeDestination`] was asked to post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Posted {
    Thread {
        destination: DestinationId,
        title: String,
    },
    Upload(UploadRequest),
    Notice {
        destination: DestinationId,
        text: String,
        thread: Option<ThreadId>,
    },
}

/// Scripted answer to one upload call.
#[derive(Debug, Clone)]
pub enum UploadScript {
    Message,
    NoMessage,
    RateLimited(Duration),
    Fail(String),
    Denied,
}

#[derive(Debug, Default)]
struct DestinationState {
    posted: Vec<Posted>,
    thread_attempts: Vec<String>,
    next_id: i64,
    uploads: VecDeque<UploadScript>,
}

/// Scriptable [`Destination`].
#[derive(Debug, Default)]
pub struct FakeDestination {
    pub threaded: HashSet<DestinationId>,
    pub handles: HashMap<String, DestinationId>,
    pub public_handles: HashMap<DestinationId, String>,
    pub read_only: HashSet<DestinationId>,
    pub failing_thread_titles: HashSet<String>,
    state: Mutex<DestinationState>,
}

impl FakeDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn threaded(mut self, destination: DestinationId) -> Self {
        self.threaded.insert(destination);
        self
    }

    pub fn with_handle(mut self, handle: &str, destination: DestinationId) -> Self {
        self.handles.insert(handle.to_string(), destination);
        self.public_handles.insert(destination, handle.to_string());
        self
    }

    pub fn read_only(mut self, destination: DestinationId) -> Self {
        self.read_only.insert(destination);
        self
    }

    pub fn failing_thread(mut self, title: &str) -> Self {
        self.failing_thread_titles.insert(title.to_string());
        self
    }

    /// Queues upload answers; once drained every upload succeeds.
    pub fn script_uploads(&self, scripts: impl IntoIterator<Item = UploadScript>) {
        self.state.lock().unwrap().uploads.extend(scripts);
    }

    pub fn posted(&self) -> Vec<Posted> {
        self.state.lock().unwrap().posted.clone()
    }

    pub fn thread_attempts(&self) -> Vec<String> {
        self.state.lock().unwrap().thread_attempts.clone()
    }

    pub fn uploads(&self) -> Vec<UploadRequest> {
        self.posted()
            .into_iter()
            .filter_map(|p| match p {
                Posted::Upload(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<(DestinationId, String, Option<ThreadId>)> {
        self.posted()
            .into_iter()
            .filter_map(|p| match p {
                Posted::Notice {
                    destination,
                    text,
                    thread,
                } => Some((destination, text, thread)),
                _ => None,
            })
            .collect()
    }

    fn next_message(&self, state: &mut DestinationState, destination: DestinationId) -> MessageRef {
        state.next_id += 1;
        MessageRef::new(destination, MessageId(state.next_id))
    }
}

#[async_trait]
impl Destination for FakeDestination {
    async fn resolve_handle(&self, handle: &str) -> Result<DestinationId, PlatformError> {
        self.handles
            .get(handle)
            .copied()
            .ok_or_else(|| PlatformError::not_found(format!("handle @{handle}")))
    }

    async fn is_threaded(&self, destination: DestinationId) -> Result<bool, PlatformError> {
        Ok(self.threaded.contains(&destination))
    }

    async fn public_handle(
        &self,
        destination: DestinationId,
    ) -> Result<Option<String>, PlatformError> {
        Ok(self.public_handles.get(&destination).cloned())
    }

    async fn can_post(&self, destination: DestinationId) -> Result<bool, PlatformError> {
        Ok(!self.read_only.contains(&destination))
    }

    async fn create_sub_thread(
        &self,
        destination: DestinationId,
        title: &str,
    ) -> Result<ThreadId, PlatformError> {
        let mut state = self.state.lock().unwrap();
        state.thread_attempts.push(title.to_string());
        if self.failing_thread_titles.contains(title) {
            return Err(PlatformError::transport("thread creation refused"));
        }
        let message = self.next_message(&mut state, destination);
        state.posted.push(Posted::Thread {
            destination,
            title: title.to_string(),
        });
        Ok(ThreadId(message.message_id.0))
    }

    async fn upload(&self, request: &UploadRequest) -> Result<Option<MessageRef>, PlatformError> {
        let mut state = self.state.lock().unwrap();
        match state.uploads.pop_front().unwrap_or(UploadScript::Message) {
            UploadScript::Message => {
                let message = self.next_message(&mut state, request.destination);
                state.posted.push(Posted::Upload(request.clone()));
                Ok(Some(message))
            }
            UploadScript::NoMessage => {
                state.posted.push(Posted::Upload(request.clone()));
                Ok(None)
            }
            UploadScript::RateLimited(wait) => Err(PlatformError::rate_limited(wait)),
            UploadScript::Fail(reason) => Err(PlatformError::transport(reason)),
            UploadScript::Denied => Err(PlatformError::permission_denied(request.destination)),
        }
    }

    async fn send_notice(
        &self,
        destination: DestinationId,
        text: &str,
        thread: Option<ThreadId>,
    ) -> Result<MessageRef, PlatformError> {
        let mut state = self.state.lock().unwrap();
        let message = self.next_message(&mut state, destination);
        state.posted.push(Posted::Notice {
            destination,
            text: text.to_string(),
            thread,
        });
        Ok(message)
    }
}

/// Scripted answer to one download call.
#[derive(Debug, Clone)]
pub enum DownloadScript {
    Ok,
    RateLimited(Duration),
    NotFound,
}

/// [`AssetDownloader`] that writes small files into a directory.
#[derive(Debug)]
pub struct FakeDownloader {
    dir: PathBuf,
    scripts: Mutex<HashMap<String, VecDeque<DownloadScript>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl FakeDownloader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queues answers for `url`; once drained the download succeeds.
    pub fn script(&self, url: &str, scripts: impl IntoIterator<Item = DownloadScript>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .extend(scripts);
    }

    /// `(url, base_name)` of every call, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetDownloader for FakeDownloader {
    async fn download(&self, url: &str, base_name: &str) -> Result<PathBuf, DownloadError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), base_name.to_string()));
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
            .unwrap_or(DownloadScript::Ok);

        match script {
            DownloadScript::Ok => {
                let path = self.dir.join(format!("{base_name}.bin"));
                std::fs::write(&path, url.as_bytes())
                    .map_err(|e| DownloadError::io(path.clone(), e))?;
                Ok(path)
            }
            DownloadScript::RateLimited(wait) => Err(DownloadError::rate_limited(url, wait)),
            DownloadScript::NotFound => Err(DownloadError::http_status(url, 404)),
        }
    }
}

/// [`IndexSink`] keeping every persisted snapshot in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub fail: bool,
    writes: Mutex<Vec<(String, TopicIndex)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn writes(&self) -> Vec<(String, TopicIndex)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn latest(&self, batch_name: &str) -> Option<TopicIndex> {
        self.writes()
            .into_iter()
            .rev()
            .find(|(name, _)| name == batch_name)
            .map(|(_, index)| index)
    }
}

#[async_trait]
impl IndexSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn persist(&self, batch_name: &str, index: &TopicIndex) -> Result<(), PersistError> {
        if self.fail {
            return Err(PersistError::io(
                PathBuf::from("memory"),
                std::io::Error::other("sink offline"),
            ));
        }
        self.writes
            .lock()
            .unwrap()
            .push((batch_name.to_string(), index.clone()));
        Ok(())
    }
}

/// One scripted operator reply.
#[derive(Debug, Clone)]
pub enum Answer {
    Text(String),
    /// Never answers, so the prompt times out.
    Silence,
}

/// [`EventSource`] replaying scripted answers; silent once drained.
#[derive(Debug, Default)]
pub struct ScriptedEvents {
    answers: VecDeque<Answer>,
    closed: bool,
    pub prompts: Vec<Prompt>,
    pub notices: Vec<String>,
}

impl ScriptedEvents {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn closed() -> Self {
        Self {
            closed: true,
            ..Self::default()
        }
    }

    pub fn answering(answers: &[&str]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|a| Answer::Text((*a).to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_answers(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl EventSource for ScriptedEvents {
    async fn present(&mut self, prompt: &Prompt) -> Result<(), EventSourceError> {
        self.prompts.push(prompt.clone());
        Ok(())
    }

    async fn next_reply(&mut self) -> Option<String> {
        if self.closed {
            return None;
        }
        match self.answers.pop_front() {
            Some(Answer::Text(text)) => Some(text),
            Some(Answer::Silence) | None => std::future::pending().await,
        }
    }

    async fn notify(&mut self, text: &str) -> Result<(), EventSourceError> {
        self.notices.push(text.to_string());
        Ok(())
    }
}
