//! Mock implementations of the broker transport and the engine collaborators
//!
//! These doubles keep everything in memory so the dispatch engine can be
//! exercised without a running broker.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aurora_foundation::{
    BrokerChannel, BrokerSession, BrokerTransport, CorrelationId, DestinationDirectory,
    DispatchError, DispatchResult, GroupKey, InboundReply, OutboundMessage, ReplyQueueRegistry,
    ResponseHandler, TimeoutHandler, WireCodec,
};

/// Scripted failure for the next publish on any channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishFailure {
    /// The channel dies; the publish reports `ChannelUnavailable`
    ChannelUnavailable,
    /// The broker rejects the publish for another reason
    Unexpected,
}

#[derive(Default)]
struct MockBrokerState {
    connect_attempts: AtomicUsize,
    failing_connects: AtomicUsize,
    sessions: Mutex<Vec<Arc<MockSession>>>,
    published: Mutex<Vec<OutboundMessage>>,
    publish_attempts: AtomicUsize,
    publish_failures: Mutex<VecDeque<PublishFailure>>,
    publish_delay: Mutex<Option<Duration>>,
    in_publish: AtomicBool,
    overlapping_publishes: AtomicUsize,
    queue_counter: AtomicUsize,
}

/// Mock implementation of BrokerTransport for testing
#[derive(Clone, Default)]
pub struct MockBrokerTransport {
    state: Arc<MockBrokerState>,
}

impl MockBrokerTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` connection attempts fail
    pub fn fail_next_connects(&self, count: usize) {
        self.state.failing_connects.store(count, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn session_count(&self) -> usize {
        self.state.sessions.lock().unwrap().len()
    }

    pub fn latest_session(&self) -> Option<Arc<MockSession>> {
        self.state.sessions.lock().unwrap().last().cloned()
    }

    pub fn published(&self) -> Vec<OutboundMessage> {
        self.state.published.lock().unwrap().clone()
    }

    pub fn published_to(&self, destination: &str) -> Vec<OutboundMessage> {
        self.published()
            .into_iter()
            .filter(|message| message.routing_key == destination)
            .collect()
    }

    pub fn publish_attempts(&self) -> usize {
        self.state.publish_attempts.load(Ordering::SeqCst)
    }

    pub fn fail_next_publish(&self, failure: PublishFailure) {
        self.state
            .publish_failures
            .lock()
            .unwrap()
            .push_back(failure);
    }

    /// Every publish sleeps for `delay` while marked in flight
    pub fn set_publish_delay(&self, delay: Duration) {
        *self.state.publish_delay.lock().unwrap() = Some(delay);
    }

    /// Number of publishes that started while another was still in flight
    pub fn overlapping_publishes(&self) -> usize {
        self.state.overlapping_publishes.load(Ordering::SeqCst)
    }

    /// Close the channel of the latest session, leaving the connection up
    pub fn kill_channel(&self) {
        if let Some(session) = self.latest_session() {
            session.kill_channel();
        }
    }

    /// Drop the latest connection as if the broker went away
    pub fn kill_connection(&self) {
        if let Some(session) = self.latest_session() {
            session.kill();
        }
    }

    /// Deliver a reply to the consumer registered on the latest channel.
    /// Returns false when no consumer is registered.
    pub async fn deliver_reply(&self, correlation_id: Option<&str>, body: &[u8]) -> bool {
        let handler = self
            .latest_session()
            .and_then(|session| session.channel())
            .and_then(|channel| channel.consumer());

        match handler {
            Some(handler) => {
                handler
                    .on_response(WireCodec::decode_reply(correlation_id, body))
                    .await;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl BrokerTransport for MockBrokerTransport {
    async fn connect(&self, _url: &str) -> DispatchResult<Arc<dyn BrokerSession>> {
        self.state.connect_attempts.fetch_add(1, Ordering::SeqCst);

        let failing = self.state.failing_connects.load(Ordering::SeqCst);
        if failing > 0 {
            self.state
                .failing_connects
                .store(failing - 1, Ordering::SeqCst);
            return Err(DispatchError::connection_error("connection refused"));
        }

        let session = Arc::new(MockSession::new(Arc::clone(&self.state)));
        self.state
            .sessions
            .lock()
            .unwrap()
            .push(Arc::clone(&session));
        Ok(session)
    }
}

/// Mock broker connection
pub struct MockSession {
    state: Arc<MockBrokerState>,
    open: AtomicBool,
    closed: AtomicBool,
    channel: Mutex<Option<Arc<MockChannel>>>,
}

impl MockSession {
    fn new(state: Arc<MockBrokerState>) -> Self {
        Self {
            state,
            open: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            channel: Mutex::new(None),
        }
    }

    pub fn channel(&self) -> Option<Arc<MockChannel>> {
        self.channel.lock().unwrap().clone()
    }

    pub fn kill_channel(&self) {
        if let Some(channel) = self.channel() {
            channel.open.store(false, Ordering::SeqCst);
        }
    }

    pub fn kill(&self) {
        self.open.store(false, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        self.kill_channel();
    }
}

#[async_trait]
impl BrokerSession for MockSession {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn open_channel(&self) -> DispatchResult<Arc<dyn BrokerChannel>> {
        if !self.is_open() {
            return Err(DispatchError::connection_error("connection is not open"));
        }
        let channel = Arc::new(MockChannel::new(Arc::clone(&self.state)));
        *self.channel.lock().unwrap() = Some(Arc::clone(&channel));
        Ok(channel)
    }

    async fn close(&self) -> DispatchResult<()> {
        self.kill();
        Ok(())
    }
}

/// Mock broker channel
pub struct MockChannel {
    state: Arc<MockBrokerState>,
    open: AtomicBool,
    consumer: Mutex<Option<Arc<dyn ResponseHandler>>>,
    reply_queue: Mutex<Option<String>>,
}

impl MockChannel {
    fn new(state: Arc<MockBrokerState>) -> Self {
        Self {
            state,
            open: AtomicBool::new(true),
            consumer: Mutex::new(None),
            reply_queue: Mutex::new(None),
        }
    }

    pub fn consumer(&self) -> Option<Arc<dyn ResponseHandler>> {
        self.consumer.lock().unwrap().clone()
    }

    pub fn reply_queue(&self) -> Option<String> {
        self.reply_queue.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrokerChannel for MockChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn declare_reply_queue(&self) -> DispatchResult<String> {
        let n = self.state.queue_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let name = format!("amq.gen-reply-{n}");
        *self.reply_queue.lock().unwrap() = Some(name.clone());
        Ok(name)
    }

    async fn consume_replies(
        &self,
        _queue: &str,
        handler: Arc<dyn ResponseHandler>,
    ) -> DispatchResult<()> {
        *self.consumer.lock().unwrap() = Some(handler);
        Ok(())
    }

    async fn publish(&self, message: &OutboundMessage) -> DispatchResult<()> {
        self.state.publish_attempts.fetch_add(1, Ordering::SeqCst);

        if !self.is_open() {
            return Err(DispatchError::channel_unavailable("channel is closed"));
        }

        if self.state.in_publish.swap(true, Ordering::SeqCst) {
            self.state
                .overlapping_publishes
                .fetch_add(1, Ordering::SeqCst);
        }

        let delay = *self.state.publish_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failure = self.state.publish_failures.lock().unwrap().pop_front();
        let result = match failure {
            Some(PublishFailure::ChannelUnavailable) => {
                self.open.store(false, Ordering::SeqCst);
                Err(DispatchError::channel_unavailable("channel closed during publish"))
            }
            Some(PublishFailure::Unexpected) => {
                Err(DispatchError::Internal("broker rejected message".to_string()))
            }
            None => {
                self.state.published.lock().unwrap().push(message.clone());
                Ok(())
            }
        };

        self.state.in_publish.store(false, Ordering::SeqCst);
        result
    }
}

/// A timeout callback invocation
#[derive(Debug, Clone, PartialEq)]
pub struct TimeoutRecord {
    pub group_key: GroupKey,
    pub destination: String,
    pub correlation_id: CorrelationId,
}

/// Mock implementation of TimeoutHandler that records every call
#[derive(Debug, Clone, Default)]
pub struct RecordingTimeoutHandler {
    fired: Arc<Mutex<Vec<TimeoutRecord>>>,
}

impl RecordingTimeoutHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fired(&self) -> Vec<TimeoutRecord> {
        self.fired.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.fired.lock().unwrap().len()
    }
}

#[async_trait]
impl TimeoutHandler for RecordingTimeoutHandler {
    async fn on_request_timeout(
        &self,
        group_key: &GroupKey,
        destination: &str,
        correlation_id: &CorrelationId,
    ) {
        self.fired.lock().unwrap().push(TimeoutRecord {
            group_key: group_key.clone(),
            destination: destination.to_string(),
            correlation_id: correlation_id.clone(),
        });
    }
}

/// Mock implementation of ResponseHandler that records every reply
#[derive(Debug, Clone, Default)]
pub struct RecordingResponseHandler {
    replies: Arc<Mutex<Vec<InboundReply>>>,
}

impl RecordingResponseHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replies(&self) -> Vec<InboundReply> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResponseHandler for RecordingResponseHandler {
    async fn on_response(&self, reply: InboundReply) {
        self.replies.lock().unwrap().push(reply);
    }
}

/// In-memory ReplyQueueRegistry
#[derive(Debug, Clone, Default)]
pub struct MemoryReplyQueueRegistry {
    names: Arc<Mutex<Vec<String>>>,
}

impl MemoryReplyQueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<String> {
        self.names.lock().unwrap().clone()
    }

    pub fn latest(&self) -> Option<String> {
        self.names.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ReplyQueueRegistry for MemoryReplyQueueRegistry {
    async fn publish_reply_queue_name(&self, name: &str) -> DispatchResult<()> {
        self.names.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

/// Fixed DestinationDirectory
#[derive(Debug, Clone, Default)]
pub struct MockDestinationDirectory {
    destinations: Vec<String>,
    unavailable: bool,
}

impl MockDestinationDirectory {
    pub fn new(destinations: &[&str]) -> Self {
        Self {
            destinations: destinations.iter().map(|d| d.to_string()).collect(),
            unavailable: false,
        }
    }

    /// A directory whose lookup always fails
    pub fn unavailable() -> Self {
        Self {
            destinations: Vec::new(),
            unavailable: true,
        }
    }
}

#[async_trait]
impl DestinationDirectory for MockDestinationDirectory {
    async fn list_known_destinations(&self) -> DispatchResult<Vec<String>> {
        if self.unavailable {
            return Err(DispatchError::Internal(
                "destination directory unavailable".to_string(),
            ));
        }
        Ok(self.destinations.clone())
    }
}
