#![allow(dead_code)]

use std::sync::Arc;

use aurora_config::AppConfig;
use aurora_dispatcher::{Dispatcher, DispatcherCollaborators};
use aurora_testing_utils::{
    MemoryReplyQueueRegistry, MockBrokerTransport, MockDestinationDirectory,
    RecordingResponseHandler, RecordingTimeoutHandler, TestConfigBuilder,
};

/// A dispatcher wired to in-memory collaborators
pub struct Harness {
    pub dispatcher: Arc<Dispatcher>,
    pub transport: MockBrokerTransport,
    pub timeouts: RecordingTimeoutHandler,
    pub replies: RecordingResponseHandler,
    pub registry: MemoryReplyQueueRegistry,
}

impl Harness {
    pub fn new(config: AppConfig) -> Self {
        let transport = MockBrokerTransport::new();
        let timeouts = RecordingTimeoutHandler::new();
        let replies = RecordingResponseHandler::new();
        let registry = MemoryReplyQueueRegistry::new();
        let destinations: Vec<&str> = config
            .directory
            .known_destinations
            .iter()
            .map(String::as_str)
            .collect();

        let dispatcher = Dispatcher::new(
            &config,
            DispatcherCollaborators {
                transport: Arc::new(transport.clone()),
                directory: Arc::new(MockDestinationDirectory::new(&destinations)),
                registry: Arc::new(registry.clone()),
                timeout_handler: Arc::new(timeouts.clone()),
                response_handler: Some(Arc::new(replies.clone())),
            },
        );

        Self {
            dispatcher: Arc::new(dispatcher),
            transport,
            timeouts,
            replies,
            registry,
        }
    }

    pub fn with_destinations(destinations: &[&str]) -> Self {
        Self::new(
            TestConfigBuilder::new()
                .with_destinations(destinations)
                .build(),
        )
    }
}
