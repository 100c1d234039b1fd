//! Client commands against a running control surface.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use serde::Serialize;
use tracing::{debug, warn};

use autopromptr_api::{BatchAck, BatchClient, ClientError, PromptInput, QueueRequest};
use autopromptr_batch::{BatchState, PromptStatus};
use autopromptr_config::Config;

use crate::cli::ClientCommand;

/// Run a client command against `config.client.base_url`.
pub(crate) async fn run(config: &Config, command: ClientCommand) -> anyhow::Result<()> {
    let client = BatchClient::new(&config.client, &config.governor)?;
    let poll_interval = config.client.poll_interval();

    match command {
        ClientCommand::Queue {
            batch_id,
            target_url,
            platform,
            prompts,
            prompts_file,
            watch: follow,
        } => {
            let texts = collect_prompts(prompts, prompts_file.as_deref())?;
            let request = QueueRequest {
                batch_id,
                prompts: texts
                    .into_iter()
                    .map(|text| PromptInput { id: None, text })
                    .collect(),
                target_url,
                platform,
            };
            let ack = client.queue(&request).await?;
            println!("Queued batch {} ({})", ack.batch_id, ack.status);
            if follow {
                watch(&client, &ack.batch_id, poll_interval).await?;
            }
            Ok(())
        }
        ClientCommand::Status { batch_id } => print_json(&client.status(&batch_id).await?),
        ClientCommand::Stop { batch_id } => print_ack(client.stop(&batch_id).await?),
        ClientCommand::Active => active(&client).await,
        ClientCommand::Rewind { batch_id } => print_ack(client.rewind(&batch_id).await?),
        ClientCommand::Resume { batch_id } => print_ack(client.resume(&batch_id).await?),
        ClientCommand::Watch { batch_id } => watch(&client, &batch_id, poll_interval).await,
        ClientCommand::Health => print_json(&client.health().await?),
    }
}

fn collect_prompts(mut prompts: Vec<String>, file: Option<&Path>) -> anyhow::Result<Vec<String>> {
    if let Some(path) = file {
        prompts.extend(read_prompts_file(path)?);
    }
    if prompts.is_empty() {
        bail!("No prompts given; use --prompt or --prompts-file");
    }
    Ok(prompts)
}

fn print_ack(ack: BatchAck) -> anyhow::Result<()> {
    println!("Batch {} is {}", ack.batch_id, ack.status);
    Ok(())
}

async fn active(client: &BatchClient) -> anyhow::Result<()> {
    let batches = client.active().await?;
    if batches.is_empty() {
        println!("No active batches");
    }
    for batch in &batches {
        println!("{}", progress_line(batch));
    }
    Ok(())
}

/// Poll a batch until it leaves pending/processing.
///
/// Transport failures and breaker rejections are reported and polling
/// continues; error answers from the server end the watch. While the breaker
/// rejects reads, polling waits out its retry hint.
async fn watch(
    client: &BatchClient,
    batch_id: &str,
    poll_interval: Duration,
) -> anyhow::Result<()> {
    let mut last_line = String::new();
    loop {
        let mut retry_in = None;
        match client.status(batch_id).await {
            Ok(batch) => {
                let line = progress_line(&batch);
                if line != last_line {
                    println!("{}", line);
                    last_line = line;
                }
                if !batch.status.is_active() {
                    for error in &batch.errors {
                        println!("  error: {}", error);
                    }
                    return Ok(());
                }
            }
            Err(ClientError::Rejected(denial)) => {
                warn!("Status polling paused: {}", denial);
                debug!("Breaker state: {:?}", client.governor_snapshot());
                retry_in = Some(denial.retry_in);
            }
            Err(ClientError::Transport { kind, message }) => {
                warn!("Status poll failed ({}): {}", kind, message);
            }
            Err(e) => return Err(e.into()),
        }
        tokio::time::sleep(next_poll_delay(poll_interval, retry_in)).await;
    }
}

fn next_poll_delay(poll_interval: Duration, retry_in: Option<Duration>) -> Duration {
    retry_in.map_or(poll_interval, |retry_in| poll_interval.max(retry_in))
}

/// One-line progress summary, e.g. `b1 processing 3/10 (1 failed)`.
fn progress_line(batch: &BatchState) -> String {
    let failed = batch
        .results
        .iter()
        .filter(|r| r.status == PromptStatus::Failed)
        .count();
    let mut line = format!(
        "{} {} {}/{}",
        batch.id,
        batch.status,
        batch.finished_count(),
        batch.total_prompts
    );
    if failed > 0 {
        line.push_str(&format!(" ({} failed)", failed));
    }
    line
}

fn read_prompts_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read prompts file {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopromptr_batch::{Prompt, Target};
    use std::io::Write;

    fn batch(n: usize) -> BatchState {
        let prompts = (1..=n)
            .map(|i| Prompt::new(format!("p{}", i), format!("prompt {}", i)))
            .collect();
        BatchState::new("b1", prompts, Target::new("https://lovable.dev", "lovable"))
    }

    #[test]
    fn test_progress_line() {
        let mut state = batch(3);
        assert_eq!(progress_line(&state), "b1 pending 0/3");

        state.begin();
        state.start_prompt(0);
        state.complete_prompt(0, serde_json::json!({"success": true}), 1);
        state.start_prompt(1);
        state.fail_prompt(1, "boom", 1);
        assert_eq!(progress_line(&state), "b1 processing 2/3 (1 failed)");
    }

    #[test]
    fn test_next_poll_delay_honours_breaker_retry_hint() {
        let poll = Duration::from_secs(2);
        assert_eq!(next_poll_delay(poll, None), poll);
        assert_eq!(
            next_poll_delay(poll, Some(Duration::from_secs(3600))),
            Duration::from_secs(3600)
        );
        assert_eq!(next_poll_delay(poll, Some(Duration::from_millis(500))), poll);
    }

    #[test]
    fn test_read_prompts_file_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "first prompt").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  second prompt  ").unwrap();

        let prompts = read_prompts_file(file.path()).unwrap();
        assert_eq!(prompts, vec!["first prompt", "second prompt"]);
    }

    #[test]
    fn test_collect_prompts() {
        let prompts = collect_prompts(vec!["a".to_string()], None).unwrap();
        assert_eq!(prompts, vec!["a"]);

        let err = collect_prompts(Vec::new(), None).unwrap_err();
        assert!(err.to_string().contains("No prompts"));
    }

    #[test]
    fn test_read_missing_prompts_file() {
        let err = read_prompts_file(Path::new("/nonexistent/prompts.txt")).unwrap_err();
        assert!(err.to_string().contains("prompts.txt"));
    }
}
