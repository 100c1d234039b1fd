
    use super::*;
    use serde_json::json;

    fn sample(n: usize) -> BatchState {
        let prompts = (0..n)
            .map(|i| Prompt::new(format!("p{}", i), format!("prompt {}", i)))
            .collect();
        BatchState::new("batch-1", prompts, Target::new("https://lovable.dev/p/1", "lovable"))
    }

    #[test]
    fn test_new_batch_is_pending() {
        let batch = sample(3);
        assert_eq!(batch.status, BatchStatus::Pending);
        assert_eq!(batch.total_prompts, 3);
        assert_eq!(batch.results.len(), 3);
        assert_eq!(batch.current_index, 0);
        assert!(batch.started_at.is_none());
        assert!(batch.results.iter().all(|r| r.status == PromptStatus::Pending));
        assert_eq!(batch.results[2].prompt_id, "p2");
    }

    #[test]
    fn test_serialized_shape() {
        let mut batch = sample(1);
        batch.begin();
        let value = serde_json::to_value(&batch).unwrap();

        assert_eq!(value["status"], "processing");
        assert_eq!(value["currentIndex"], 0);
        assert_eq!(value["totalPrompts"], 1);
        assert_eq!(value["results"][0]["promptId"], "p0");
        assert_eq!(value["results"][0]["status"], "pending");
        assert!(value["startedAt"].is_string());
        assert!(value.get("completedAt").is_none());
        assert_eq!(value["target"]["platform"], "lovable");
    }

    #[test]
    fn test_begin_keeps_first_started_at() {
        let mut batch = sample(2);
        batch.begin();
        let first = batch.started_at;
        batch.status = BatchStatus::Pending;
        batch.begin();
        assert_eq!(batch.started_at, first);
    }

    #[test]
    fn test_prompt_lifecycle_advances_index() {
        let mut batch = sample(2);
        batch.begin();

        let index = batch.seek_next().unwrap();
        assert_eq!(index, 0);
        batch.start_prompt(index);
        assert_eq!(batch.results[0].status, PromptStatus::Processing);
        assert!(batch.results[0].started_at.is_some());
        assert_eq!(batch.processing_count(), 1);

        batch.complete_prompt(index, json!({"success": true}), 1);
        assert_eq!(batch.current_index, 1);
        assert_eq!(batch.results[0].status, PromptStatus::Completed);
        assert_eq!(batch.results[0].result, Some(json!({"success": true})));
        assert_eq!(batch.processing_count(), 0);

        let index = batch.seek_next().unwrap();
        batch.start_prompt(index);
        batch.fail_prompt(index, "Execution failed: boom", 2);
        assert_eq!(batch.current_index, 2);
        assert_eq!(batch.results[1].error.as_deref(), Some("Execution failed: boom"));
        assert_eq!(batch.results[1].attempts, 2);
        assert_eq!(batch.errors, vec!["Execution failed: boom".to_string()]);
        assert_eq!(batch.seek_next(), None);
        assert_eq!(batch.finished_count(), 2);
    }

    #[test]
    fn test_seek_next_skips_terminal_results() {
        let mut batch = sample(3);
        batch.results[0].status = PromptStatus::Completed;
        batch.results[1].status = PromptStatus::Failed;
        assert_eq!(batch.seek_next(), Some(2));
        assert_eq!(batch.current_index, 2);
    }

    #[test]
    fn test_empty_batch_has_nothing_to_run() {
        let mut batch = sample(0);
        assert_eq!(batch.seek_next(), None);
        batch.begin();
        batch.finish();
        assert_eq!(batch.status, BatchStatus::Completed);
        assert!(batch.completed_at.is_some());
    }

    #[test]
    fn test_recover_interrupted_resets_processing() {
        let mut batch = sample(3);
        batch.begin();
        batch.start_prompt(0);
        batch.complete_prompt(0, json!({}), 1);
        batch.start_prompt(1);

        assert_eq!(batch.recover_interrupted(), 1);
        assert_eq!(batch.results[1].status, PromptStatus::Pending);
        assert!(batch.results[1].started_at.is_none());
        assert_eq!(batch.results[0].status, PromptStatus::Completed);
        assert_eq!(batch.seek_next(), Some(1));
    }

    #[test]
    fn test_stop_active_batch() {
        let mut batch = sample(2);
        batch.begin();
        batch.stop().unwrap();
        assert_eq!(batch.status, BatchStatus::Stopped);
        assert!(batch.completed_at.is_some());
    }

    #[test]
    fn test_stop_terminal_batch_rejected() {
        let mut batch = sample(1);
        batch.finish();
        let err = batch.stop().unwrap_err();
        assert!(matches!(
            err,
            BatchError::InvalidTransition { from: BatchStatus::Completed, action: "stop", .. }
        ));
    }

    #[test]
    fn test_finish_keeps_stopped() {
        let mut batch = sample(1);
        batch.begin();
        batch.stop().unwrap();
        let stopped_at = batch.completed_at;
        batch.finish();
        assert_eq!(batch.status, BatchStatus::Stopped);
        assert_eq!(batch.completed_at, stopped_at);
    }

    #[test]
    fn test_mark_failed_records_error() {
        let mut batch = sample(1);
        batch.begin();
        batch.mark_failed("Persistence error: disk full");
        assert_eq!(batch.status, BatchStatus::Failed);
        assert_eq!(batch.errors.len(), 1);
    }

    #[test]
    fn test_mark_failed_keeps_stopped_status() {
        let mut batch = sample(2);
        batch.begin();
        batch.stop().unwrap();
        let stopped_at = batch.completed_at;

        batch.mark_failed("Persistence error: disk full");
        assert_eq!(batch.status, BatchStatus::Stopped);
        assert_eq!(batch.completed_at, stopped_at);
        assert_eq!(batch.errors, vec!["Persistence error: disk full"]);
    }

    #[test]
    fn test_rewind_resets_everything() {
        let mut batch = sample(2);
        batch.begin();
        batch.start_prompt(0);
        batch.fail_prompt(0, "boom", 1);
        batch.stop().unwrap();

        batch.rewind().unwrap();
        assert_eq!(batch.status, BatchStatus::Pending);
        assert_eq!(batch.current_index, 0);
        assert!(batch.errors.is_empty());
        assert!(batch.started_at.is_none());
        assert!(batch.completed_at.is_none());
        assert!(batch.results.iter().all(|r| r.status == PromptStatus::Pending));
    }

    #[test]
    fn test_rewind_active_batch_rejected() {
        let mut batch = sample(2);
        batch.begin();
        assert!(matches!(
            batch.rewind(),
            Err(BatchError::InvalidTransition { action: "rewind", .. })
        ));
    }

    #[test]
    fn test_deserialize_without_optional_fields() {
        let raw = json!({
            "id": "b",
            "status": "stopped",
            "currentIndex": 1,
            "totalPrompts": 1,
            "results": [{"promptId": "p0", "status": "completed"}],
            "prompts": [{"id": "p0", "text": "hi"}],
            "target": {"url": "https://x", "platform": "bolt"},
            "createdAt": "2025-01-01T00:00:00Z",
            "updatedAt": "2025-01-01T00:00:00Z"
        });
        let batch: BatchState = serde_json::from_value(raw).unwrap();
        assert_eq!(batch.status, BatchStatus::Stopped);
        assert_eq!(batch.results[0].attempts, 0);
        assert!(batch.errors.is_empty());
    }
