
    use super::*;
    use crate::batch::{BatchStatus, Prompt, Target};
    use tempfile::TempDir;

    fn batch(id: &str) -> BatchState {
        BatchState::new(
            id,
            vec![Prompt::new("p0", "build a landing page")],
            Target::new("https://lovable.dev/projects/42", "lovable"),
        )
    }

    #[tokio::test]
    async fn test_sqlite_store_upsert() {
        let store = SqliteBatchStore::in_memory().await.unwrap();
        let mut state = batch("b1");
        store.save(&state).await.unwrap();

        state.begin();
        state.start_prompt(0);
        state.complete_prompt(0, serde_json::json!({"success": true}), 1);
        state.finish();
        store.save(&state).await.unwrap();

        let loaded = store.load("b1").await.unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_store_load_missing() {
        let store = SqliteBatchStore::in_memory().await.unwrap();
        assert!(store.load("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_store_list_active_filters_status() {
        let store = SqliteBatchStore::in_memory().await.unwrap();

        let pending = batch("pending");
        let mut processing = batch("processing");
        processing.begin();
        let mut stopped = batch("stopped");
        stopped.stop().unwrap();
        let mut failed = batch("failed");
        failed.mark_failed("disk full");

        for b in [&pending, &processing, &stopped, &failed] {
            store.save(b).await.unwrap();
        }

        let active = store.list_active().await.unwrap();
        let ids: Vec<_> = active.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(active.len(), 2);
        assert!(ids.contains(&"pending"));
        assert!(ids.contains(&"processing"));
        assert!(active.iter().all(|b| b.status.is_active()));
        assert_eq!(store.list().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_sqlite_store_delete() {
        let store = SqliteBatchStore::in_memory().await.unwrap();
        store.save(&batch("b1")).await.unwrap();
        store.delete("b1").await.unwrap();
        assert!(store.load("b1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("batches.db");
        {
            let store = SqliteBatchStore::open(&path).await.unwrap();
            let mut state = batch("b1");
            state.stop().unwrap();
            store.save(&state).await.unwrap();
        }

        let store = SqliteBatchStore::open(&path).await.unwrap();
        let loaded = store.load("b1").await.unwrap().unwrap();
        assert_eq!(loaded.status, BatchStatus::Stopped);
    }
