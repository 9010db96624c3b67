use crate::error::{AgentError, Result};
use crate::openai::RawEvent;
use crate::traits::{RawEventStream, Transport, TransportRequest};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Scripted outcome of one `send`
#[derive(Debug)]
pub enum MockReply {
    /// Replay these events, then end the stream
    Events(Vec<RawEvent>),
    /// Replay these events, then fail mid-stream
    EventsThenError(Vec<RawEvent>, AgentError),
    /// Reject the request outright
    Fail(AgentError),
}

impl MockReply {
    /// A plain text answer: one delta, a boundary and a completion without
    /// usage.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Events(vec![
            RawEvent::text_delta(text),
            RawEvent::text_done(""),
            RawEvent::completed(None),
        ])
    }
}

impl From<Vec<RawEvent>> for MockReply {
    fn from(events: Vec<RawEvent>) -> Self {
        Self::Events(events)
    }
}

type ReplyFn = dyn Fn(&TransportRequest) -> MockReply + Send + Sync;

enum Script {
    Queue(VecDeque<MockReply>),
    Function(Arc<ReplyFn>),
}

struct MockState {
    script: Script,
    requests: Vec<TransportRequest>,
    connect_calls: usize,
    close_calls: usize,
    release_calls: usize,
    connect_error: Option<AgentError>,
}

/// Deterministic in-memory transport.
///
/// Clones share state, so a test can hand one clone to a client and keep
/// another to inspect what was sent.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Replay one scripted reply per `send`, in order. Sending past the end
    /// of the script fails with a transport error.
    pub fn new<I, R>(replies: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<MockReply>,
    {
        let queue = replies.into_iter().map(Into::into).collect();
        Self::with_script(Script::Queue(queue))
    }

    /// Compute each reply from the request
    pub fn from_fn<F>(reply: F) -> Self
    where
        F: Fn(&TransportRequest) -> MockReply + Send + Sync + 'static,
    {
        Self::with_script(Script::Function(Arc::new(reply)))
    }

    fn with_script(script: Script) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                script,
                requests: Vec::new(),
                connect_calls: 0,
                close_calls: 0,
                release_calls: 0,
                connect_error: None,
            })),
        }
    }

    /// Make the next `connect` fail. Applies to every clone.
    pub fn fail_connect(self, error: AgentError) -> Self {
        self.lock().connect_error = Some(error);
        self
    }

    // The lock is never held across an await. A panicking test thread
    // must not hide the recorded calls from the assertions that follow.
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.lock().requests.clone()
    }

    pub fn last_request(&self) -> Option<TransportRequest> {
        self.lock().requests.last().cloned()
    }

    pub fn connect_count(&self) -> usize {
        self.lock().connect_calls
    }

    /// Orderly `close` calls
    pub fn close_count(&self) -> usize {
        self.lock().close_calls
    }

    /// Resource releases, whether from `close` or from a dropped client
    pub fn release_count(&self) -> usize {
        self.lock().release_calls
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.connect_calls += 1;
        match state.connect_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn send(&self, request: TransportRequest) -> Result<RawEventStream> {
        let reply = {
            let mut state = self.lock();
            state.requests.push(request.clone());
            match &mut state.script {
                Script::Queue(queue) => queue.pop_front().ok_or_else(|| {
                    AgentError::Transport("mock transport script exhausted".to_string())
                })?,
                Script::Function(reply) => (**reply)(&request),
            }
        };

        match reply {
            MockReply::Events(events) => {
                Ok(Box::pin(futures::stream::iter(events.into_iter().map(Ok))))
            }
            MockReply::EventsThenError(events, error) => Ok(Box::pin(futures::stream::iter(
                events
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(error))),
            ))),
            MockReply::Fail(error) => Err(error),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.lock().close_calls += 1;
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        self.lock().release_calls += 1;
    }
}
