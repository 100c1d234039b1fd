
    use super::*;
    use crate::http::handlers::PromptInput;
    use autopromptr_batch::{BatchStatus, Prompt, Target};
    use autopromptr_governor::BreakerStatus;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn governor_config() -> GovernorConfig {
        GovernorConfig {
            jitter_max_ms: 0,
            ..GovernorConfig::default()
        }
    }

    fn client_for(server: &MockServer) -> BatchClient {
        let config = ClientConfig {
            base_url: server.uri(),
            ..ClientConfig::default()
        };
        BatchClient::new(&config, &governor_config()).unwrap()
    }

    fn sample_batch(id: &str) -> BatchState {
        BatchState::new(
            id,
            vec![Prompt::new("p1", "first")],
            Target::new("https://lovable.dev/projects/x", "lovable"),
        )
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ClientConfig {
            base_url: "not a url".to_string(),
            ..ClientConfig::default()
        };
        let err = BatchClient::new(&config, &governor_config()).err().unwrap();
        assert!(matches!(err, ClientError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_queue_posts_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/queue"))
            .and(body_json(json!({
                "batchId": "b1",
                "prompts": [{"text": "build a page"}],
                "targetUrl": "https://lovable.dev",
                "platform": "lovable"
            })))
            .respond_with(
                ResponseTemplate::new(202)
                    .set_body_json(json!({"batchId": "b1", "status": "pending"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let request = QueueRequest {
            batch_id: Some("b1".to_string()),
            prompts: vec![PromptInput {
                id: None,
                text: "build a page".to_string(),
            }],
            target_url: "https://lovable.dev".to_string(),
            platform: "lovable".to_string(),
        };
        let ack = client_for(&server).queue(&request).await.unwrap();
        assert_eq!(ack.batch_id, "b1");
        assert_eq!(ack.status, BatchStatus::Pending);
    }

    #[tokio::test]
    async fn test_status_decodes_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status/b1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_batch("b1")))
            .mount(&server)
            .await;

        let batch = client_for(&server).status("b1").await.unwrap();
        assert_eq!(batch.id, "b1");
        assert_eq!(batch.total_prompts, 1);
    }

    #[tokio::test]
    async fn test_status_not_found_does_not_trip_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": "Batch not found: missing",
                "kind": "not_found"
            })))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_for(&server);
        for _ in 0..3 {
            match client.status("missing").await.unwrap_err() {
                ClientError::Api { status, kind, .. } => {
                    assert_eq!(status, 404);
                    assert_eq!(kind, "not_found");
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!(client.governor_snapshot().status, BreakerStatus::Healthy);
    }

    #[tokio::test]
    async fn test_server_errors_open_shared_breaker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/active"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        for _ in 0..2 {
            match client.active().await.unwrap_err() {
                ClientError::Transport { kind, message } => {
                    assert_eq!(kind, FailureKind::Server);
                    assert!(message.contains("503"));
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }

        let snapshot = client.governor_snapshot();
        assert!(snapshot.is_open);
        assert_eq!(snapshot.error_kind, Some(FailureKind::Server));

        let err = client.health().await.unwrap_err();
        assert!(matches!(err, ClientError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_concurrent_status_reads_share_one_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status/b1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(sample_batch("b1"))
                    .set_delay(Duration::from_millis(200)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let (a, b, c) = tokio::join!(
            client.status("b1"),
            client.status("b1"),
            client.status("b1"),
        );
        assert_eq!(a.unwrap().id, "b1");
        assert_eq!(b.unwrap().id, "b1");
        assert_eq!(c.unwrap().id, "b1");
    }

    #[tokio::test]
    async fn test_stop_conflict_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stop"))
            .and(body_json(json!({"batchId": "b1"})))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": "Cannot stop batch b1 while it is completed",
                "kind": "invalid_transition"
            })))
            .mount(&server)
            .await;

        match client_for(&server).stop("b1").await.unwrap_err() {
            ClientError::Api {
                status,
                kind,
                message,
            } => {
                assert_eq!(status, 409);
                assert_eq!(kind, "invalid_transition");
                assert!(message.contains("completed"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rewind_and_resume() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rewind"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"batchId": "b1", "status": "pending"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/resume"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"batchId": "b1", "status": "processing"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.rewind("b1").await.unwrap().status, BatchStatus::Pending);
        assert_eq!(client.resume("b1").await.unwrap().status, BatchStatus::Processing);
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "healthy",
                "timestamp": "2024-01-01T00:00:00Z",
                "activeBatches": 2
            })))
            .mount(&server)
            .await;

        let health = client_for(&server).health().await.unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.active_batches, 2);
    }

    #[tokio::test]
    async fn test_invalid_json_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/active"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.active().await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
        assert_eq!(client.governor_snapshot().failure_count, 0);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_failure() {
        let config = ClientConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..ClientConfig::default()
        };
        let client = BatchClient::new(&config, &governor_config()).unwrap();

        match client.health().await.unwrap_err() {
            ClientError::Transport { kind, .. } => assert_eq!(kind, FailureKind::Network),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(client.governor_snapshot().failure_count, 1);
    }
