use anyhow::{Context, Result};
use interview_core::evaluation::AnsweredQuestion;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

/// Consumes answered questions until every sender is gone, logging each one and
/// appending it as a JSON line to `log_path` when given. Returns how many were seen.
pub async fn drain_evaluations(
    mut rx: mpsc::Receiver<AnsweredQuestion>,
    log_path: Option<PathBuf>,
) -> Result<usize> {
    let mut file = match &log_path {
        Some(path) => Some(
            tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .with_context(|| format!("Failed to open evaluation log: {}", path.display()))?,
        ),
        None => None,
    };

    let mut count = 0;
    while let Some(answered) = rx.recv().await {
        count += 1;
        tracing::info!(
            candidate_id = %answered.candidate_id,
            topic = %answered.topic,
            "Answer received for evaluation"
        );
        if let Some(file) = file.as_mut() {
            let mut line = serde_json::to_vec(&answered)?;
            line.push(b'\n');
            file.write_all(&line).await?;
            file.flush().await?;
        }
    }
    Ok(count)
}
