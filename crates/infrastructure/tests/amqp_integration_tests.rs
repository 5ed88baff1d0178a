//! RabbitMQ transport tests. They start a broker container and need a
//! local Docker daemon; run with `cargo test -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use aurora_dispatcher::{Dispatcher, DispatcherCollaborators, OpenKind};
use aurora_foundation::{BrokerTransport, Command, CorrelationId, WireCodec};
use aurora_infrastructure::{AmqpTransport, StaticDestinationDirectory};
use aurora_testing_utils::{
    BrokerTestContainer, MemoryReplyQueueRegistry, RecordingResponseHandler,
    RecordingTimeoutHandler, TestConfigBuilder, TestEnv,
};

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_reply_queue_round_trip() {
    let broker = BrokerTestContainer::new().await.unwrap();
    let transport = AmqpTransport::new();

    let session = transport.connect(&broker.amqp_url).await.unwrap();
    assert!(session.is_open());

    let channel = session.open_channel().await.unwrap();
    let reply_queue = channel.declare_reply_queue().await.unwrap();
    assert!(reply_queue.starts_with("amq.gen-"));

    let handler = RecordingResponseHandler::new();
    channel
        .consume_replies(&reply_queue, Arc::new(handler.clone()))
        .await
        .unwrap();

    // publish straight to the reply queue so the consumer sees it
    let correlation_id = CorrelationId::new("ap1", Some("req1"));
    let message = WireCodec::encode(
        &Command::named("ack").with_field("successful", true),
        &reply_queue,
        &reply_queue,
        &correlation_id,
    )
    .unwrap();
    channel.publish(&message).await.unwrap();

    let received = handler.clone();
    assert!(
        TestEnv::wait_for(
            move || {
                let received = received.clone();
                async move { !received.replies().is_empty() }
            },
            Duration::from_secs(10)
        )
        .await
    );
    let reply = &handler.replies()[0];
    assert_eq!(reply.correlation_id.as_ref(), Some(&correlation_id));
    assert_eq!(reply.body["successful"], true);

    session.close().await.unwrap();
    assert!(session.is_closed());
    assert!(!channel.is_open());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_dispatcher_over_rabbitmq() {
    let broker = BrokerTestContainer::new().await.unwrap();
    let config = TestConfigBuilder::new()
        .with_broker_url(&broker.amqp_url)
        .with_destinations(&["ap1", "ap2"])
        .build();
    let registry = MemoryReplyQueueRegistry::new();

    let dispatcher = Dispatcher::new(
        &config,
        DispatcherCollaborators {
            transport: Arc::new(AmqpTransport::new()),
            directory: Arc::new(StaticDestinationDirectory::from_config(&config.directory)),
            registry: Arc::new(registry.clone()),
            timeout_handler: Arc::new(RecordingTimeoutHandler::new()),
            response_handler: None,
        },
    );

    assert_eq!(dispatcher.start().await.unwrap(), OpenKind::Initial);
    assert_eq!(dispatcher.tracker().len().await, 2);
    assert!(registry.latest().is_some());

    let outcome = dispatcher
        .dispatch(&Command::named("ping"), "ap1", Some("it"))
        .await
        .unwrap();
    assert!(outcome.is_tracked());
    assert_eq!(outcome.correlation_id().as_str(), "ap1-it");

    dispatcher.stop().await.unwrap();
    assert!(dispatcher.tracker().is_empty().await);
}
