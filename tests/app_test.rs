use std::sync::Arc;
use std::time::Duration;

use aurora::app::{AppMode, Application, SendRequest};
use aurora::shutdown::ShutdownManager;
use aurora_config::AppConfig;
use aurora_dispatcher::{ConnectionState, DispatcherCollaborators};
use aurora_foundation::Command;
use aurora_testing_utils::{
    MemoryReplyQueueRegistry, MockBrokerTransport, MockDestinationDirectory,
    RecordingResponseHandler, RecordingTimeoutHandler, TestConfigBuilder, TestEnv,
};
use tokio::time::timeout;

struct TestApp {
    app: Arc<Application>,
    transport: MockBrokerTransport,
    timeouts: RecordingTimeoutHandler,
    replies: RecordingResponseHandler,
}

fn build_app(config: AppConfig, destinations: &[&str]) -> TestApp {
    let transport = MockBrokerTransport::new();
    let timeouts = RecordingTimeoutHandler::new();
    let replies = RecordingResponseHandler::new();

    let app = Application::with_collaborators(
        &config,
        DispatcherCollaborators {
            transport: Arc::new(transport.clone()),
            directory: Arc::new(MockDestinationDirectory::new(destinations)),
            registry: Arc::new(MemoryReplyQueueRegistry::new()),
            timeout_handler: Arc::new(timeouts.clone()),
            response_handler: Some(Arc::new(replies.clone())),
        },
    );

    TestApp {
        app: Arc::new(app),
        transport,
        timeouts,
        replies,
    }
}

fn send_mode(destination: &str, request_id: &str) -> AppMode {
    AppMode::Send(SendRequest {
        command: Command::named("refresh").with_field("force", true),
        destination: destination.to_string(),
        request_id: Some(request_id.to_string()),
    })
}

#[tokio::test]
async fn test_serve_mode_runs_until_shutdown() {
    let test = build_app(
        TestConfigBuilder::new().with_destinations(&["ap1", "ap2"]).build(),
        &["ap1", "ap2"],
    );
    let shutdown = ShutdownManager::new();

    let handle = {
        let app = Arc::clone(&test.app);
        let rx = shutdown.subscribe();
        tokio::spawn(async move { app.run(AppMode::Serve, rx).await })
    };

    let dispatcher = Arc::clone(test.app.dispatcher());
    assert!(
        TestEnv::wait_for(
            move || {
                let dispatcher = Arc::clone(&dispatcher);
                async move { dispatcher.tracker().len().await == 2 }
            },
            Duration::from_secs(5)
        )
        .await
    );
    assert_eq!(test.transport.published().len(), 2);

    shutdown.shutdown();
    let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(result.is_ok());

    assert!(test.app.dispatcher().tracker().is_empty().await);
    assert_eq!(test.app.dispatcher().state(), ConnectionState::Closed);
    assert_eq!(test.timeouts.count(), 0);
}

#[tokio::test]
async fn test_send_mode_finishes_when_reply_arrives() {
    let test = build_app(TestConfigBuilder::new().build(), &[]);
    let shutdown = ShutdownManager::new();

    let handle = {
        let app = Arc::clone(&test.app);
        let rx = shutdown.subscribe();
        tokio::spawn(async move { app.run(send_mode("ap1", "req1"), rx).await })
    };

    let transport = test.transport.clone();
    assert!(
        TestEnv::wait_for(
            move || {
                let transport = transport.clone();
                async move { transport.published_to("ap1").len() == 1 }
            },
            Duration::from_secs(5)
        )
        .await
    );

    assert!(
        test.transport
            .deliver_reply(Some("ap1-req1"), br#"{"successful": true}"#)
            .await
    );

    let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert_eq!(test.replies.replies().len(), 1);
    assert_eq!(test.timeouts.count(), 0);
    assert_eq!(test.app.dispatcher().state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_send_mode_finishes_after_timeout() {
    let test = build_app(
        TestConfigBuilder::new().with_request_timeout_seconds(1).build(),
        &[],
    );
    let shutdown = ShutdownManager::new();

    let result = timeout(
        Duration::from_secs(5),
        test.app.run(send_mode("ap3", "slow"), shutdown.subscribe()),
    )
    .await
    .unwrap();

    assert!(result.is_ok());
    let fired = test.timeouts.fired();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].destination, "ap3");
    assert_eq!(fired[0].correlation_id.as_str(), "ap3-slow");
}

#[tokio::test]
async fn test_shutdown_before_connect_completes() {
    let test = build_app(TestConfigBuilder::new().build(), &[]);
    test.transport.fail_next_connects(usize::MAX);
    let shutdown = ShutdownManager::new();
    shutdown.shutdown();

    let result = timeout(
        Duration::from_secs(5),
        test.app.run(AppMode::Serve, shutdown.subscribe()),
    )
    .await
    .unwrap();

    assert!(result.is_ok());
    assert!(test.transport.published().is_empty());
}
