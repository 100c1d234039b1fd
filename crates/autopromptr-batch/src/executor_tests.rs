
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prompt() -> Prompt {
        Prompt::new("p1", "Add a dark mode toggle")
    }

    fn target() -> Target {
        Target::new("https://lovable.dev/projects/abc", "lovable")
    }

    fn executor_for(server: &MockServer) -> HttpExecutor {
        let config = ExecutorConfig {
            automation_url: server.uri(),
            timeout_secs: 5,
            ..ExecutorConfig::default()
        };
        HttpExecutor::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_simulated_executor_payload() {
        let payload = SimulatedExecutor::new()
            .execute_prompt(&prompt(), &target())
            .await
            .unwrap();
        assert_eq!(payload["success"], true);
        assert_eq!(payload["promptId"], "p1");
        assert_eq!(payload["platform"], "lovable");
        assert!(payload["executedAt"].is_string());
    }

    #[tokio::test]
    async fn test_http_executor_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/automate"))
            .and(body_partial_json(serde_json::json!({
                "targetUrl": "https://lovable.dev/projects/abc",
                "promptText": "Add a dark mode toggle",
                "waitForIdle": true,
                "maxRetries": 3,
                "timeout": 5000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "message": "Prompt submitted successfully"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let payload = executor_for(&server)
            .execute_prompt(&prompt(), &target())
            .await
            .unwrap();
        assert_eq!(payload["message"], "Prompt submitted successfully");
    }

    #[tokio::test]
    async fn test_http_executor_reported_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/automate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "error": "Could not find text input"
            })))
            .mount(&server)
            .await;

        let err = executor_for(&server)
            .execute_prompt(&prompt(), &target())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Failed(ref m) if m == "Could not find text input"));
    }

    #[tokio::test]
    async fn test_http_executor_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/automate"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "success": false,
                "error": "Navigation timeout"
            })))
            .mount(&server)
            .await;

        let err = executor_for(&server)
            .execute_prompt(&prompt(), &target())
            .await
            .unwrap_err();
        match err {
            ExecutorError::Http { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "Navigation timeout");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_http_executor_invalid_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = executor_for(&server)
            .execute_prompt(&prompt(), &target())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_http_executor_unreachable() {
        let config = ExecutorConfig {
            automation_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 2,
            ..ExecutorConfig::default()
        };
        let err = HttpExecutor::new(&config)
            .unwrap()
            .execute_prompt(&prompt(), &target())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutorError::Network(_) | ExecutorError::Timeout(_)));
    }
