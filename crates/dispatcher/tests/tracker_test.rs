#[cfg(test)]
mod tracker_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use aurora_dispatcher::RequestTracker;
    use aurora_foundation::{CorrelationId, GroupKey};
    use aurora_testing_utils::{RecordingTimeoutHandler, TestAssertions, TimeoutRecord};

    async fn track(
        tracker: &RequestTracker,
        handler: &RecordingTimeoutHandler,
        id: &str,
        destination: &str,
        group_key: GroupKey,
        deadline: Duration,
    ) {
        tracker
            .track(
                CorrelationId::from_raw(id),
                destination,
                group_key,
                Arc::new(handler.clone()),
                deadline,
            )
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fires_once_with_request_details() {
        let tracker = RequestTracker::new();
        let handler = RecordingTimeoutHandler::new();
        let id = CorrelationId::new("ap1", Some("req7"));

        let handle = tracker
            .track(
                id.clone(),
                "ap1",
                GroupKey::Slice("s1".to_string()),
                Arc::new(handler.clone()),
                Duration::from_secs(5),
            )
            .await;

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(handler.count(), 0);
        assert!(tracker.lookup(&id).await.is_some());

        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(
            handler.fired(),
            vec![TimeoutRecord {
                group_key: GroupKey::Slice("s1".to_string()),
                destination: "ap1".to_string(),
                correlation_id: id.clone(),
            }]
        );
        assert!(tracker.lookup(&id).await.is_none());
        assert!(handle.is_finished());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(handler.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_request_never_fires() {
        let tracker = RequestTracker::new();
        let handler = RecordingTimeoutHandler::new();
        track(
            &tracker,
            &handler,
            "ap1-req1",
            "ap1",
            GroupKey::Syn,
            Duration::from_secs(5),
        )
        .await;

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(tracker.cancel_one(&CorrelationId::from_raw("ap1-req1")).await);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handler.count(), 0);
        assert!(tracker.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_for_only_matches_destination_prefix() {
        let tracker = RequestTracker::new();
        let handler = RecordingTimeoutHandler::new();
        for (id, destination) in [
            ("ap1-a", "ap1"),
            ("ap1-b", "ap1"),
            ("ap10-c", "ap10"),
            ("ap2-d", "ap2"),
        ] {
            track(
                &tracker,
                &handler,
                id,
                destination,
                GroupKey::Untagged,
                Duration::from_secs(5),
            )
            .await;
        }

        assert_eq!(tracker.cancel_all_for("ap1").await, 2);
        assert_eq!(tracker.len().await, 2);
        assert!(tracker.in_flight_for("ap1").await.is_empty());
        assert_eq!(tracker.in_flight_for("ap10").await.len(), 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        let fired: Vec<String> = handler
            .fired()
            .into_iter()
            .map(|record| record.correlation_id.to_string())
            .collect();
        TestAssertions::assert_contains_exactly(
            &fired,
            &["ap10-c".to_string(), "ap2-d".to_string()],
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_generated_id_is_found_by_its_destination() {
        let tracker = RequestTracker::new();
        let handler = RecordingTimeoutHandler::new();
        let id = CorrelationId::generate("ap-7");
        tracker
            .track(
                id.clone(),
                "ap-7",
                GroupKey::Syn,
                Arc::new(handler.clone()),
                Duration::from_secs(5),
            )
            .await;

        assert_eq!(tracker.cancel_all_for("ap-7").await, 1);
        assert!(tracker.lookup(&id).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let tracker = RequestTracker::new();
        let handler = RecordingTimeoutHandler::new();
        for id in ["ap1-1", "ap2-2", "ap3-3"] {
            let destination = id.split('-').next().unwrap();
            track(
                &tracker,
                &handler,
                id,
                destination,
                GroupKey::Syn,
                Duration::from_secs(5),
            )
            .await;
        }

        assert_eq!(tracker.cancel_all().await, 3);
        assert!(tracker.is_empty().await);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handler.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_request_fires_once_with_new_details() {
        let tracker = RequestTracker::new();
        let handler = RecordingTimeoutHandler::new();
        track(
            &tracker,
            &handler,
            "ap1-dup",
            "ap1",
            GroupKey::Slice("old".to_string()),
            Duration::from_secs(5),
        )
        .await;
        track(
            &tracker,
            &handler,
            "ap1-dup",
            "ap1",
            GroupKey::Slice("new".to_string()),
            Duration::from_secs(8),
        )
        .await;

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(handler.count(), 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        let fired = handler.fired();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].group_key, GroupKey::Slice("new".to_string()));
    }
}
