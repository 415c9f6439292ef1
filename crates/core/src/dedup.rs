use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const DEFAULT_RECORD_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Questions already put to a candidate, per topic.
///
/// The store never checks for duplicates itself; callers decide what counts as
/// a repeat before appending.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DedupStore: Send + Sync {
    async fn append(&self, candidate_id: &str, topic: &str, question: &str) -> Result<()>;

    async fn list(&self, candidate_id: &str, topic: &str) -> Result<Vec<String>>;
}

pub fn record_key(candidate_id: &str, topic: &str) -> String {
    format!("asked_questions:{candidate_id}:{topic}")
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct AskedRecord {
    questions: Vec<String>,
    /// Unix seconds; the whole record expires at once.
    expires_at: u64,
}

/// Key -> record map shared by both store implementations.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
struct RecordBook {
    records: HashMap<String, AskedRecord>,
}

impl RecordBook {
    fn list(&self, key: &str, now: u64) -> Vec<String> {
        match self.records.get(key) {
            Some(record) if record.expires_at > now => record.questions.clone(),
            _ => Vec::new(),
        }
    }

    fn append(&mut self, key: &str, question: &str, now: u64, ttl: Duration) {
        let fresh = || AskedRecord {
            questions: Vec::new(),
            expires_at: now.saturating_add(ttl.as_secs()),
        };
        let record = self.records.entry(key.to_string()).or_insert_with(fresh);
        if record.expires_at <= now {
            *record = fresh();
        }
        record.questions.push(question.to_string());
    }

    fn purge_expired(&mut self, now: u64) {
        self.records.retain(|_, r| r.expires_at > now);
    }
}

/// Process-local dedup store.
pub struct InMemoryDedupStore {
    ttl: Duration,
    book: Mutex<RecordBook>,
}

impl Default for InMemoryDedupStore {
    fn default() -> Self {
        Self::new(DEFAULT_RECORD_TTL)
    }
}

impl InMemoryDedupStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            book: Mutex::new(RecordBook::default()),
        }
    }
}

#[async_trait]
impl DedupStore for InMemoryDedupStore {
    async fn append(&self, candidate_id: &str, topic: &str, question: &str) -> Result<()> {
        let mut book = self.book.lock().unwrap_or_else(|e| e.into_inner());
        book.append(&record_key(candidate_id, topic), question, unix_now(), self.ttl);
        Ok(())
    }

    async fn list(&self, candidate_id: &str, topic: &str) -> Result<Vec<String>> {
        let book = self.book.lock().unwrap_or_else(|e| e.into_inner());
        Ok(book.list(&record_key(candidate_id, topic), unix_now()))
    }
}

/// Dedup store persisted as a JSON file, so asked questions survive restarts.
pub struct JsonFileDedupStore {
    path: PathBuf,
    ttl: Duration,
    book: tokio::sync::Mutex<RecordBook>,
}

impl JsonFileDedupStore {
    pub async fn open(path: impl AsRef<Path>, ttl: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut book = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str::<RecordBook>(&text)
                .with_context(|| format!("Failed to parse dedup file: {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => RecordBook::default(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read dedup file: {}", path.display()));
            }
        };
        book.purge_expired(unix_now());
        tracing::debug!(
            path = %path.display(),
            records = book.records.len(),
            "Opened dedup store"
        );

        Ok(Self {
            path,
            ttl,
            book: tokio::sync::Mutex::new(book),
        })
    }

    async fn persist(&self, book: &RecordBook) -> Result<()> {
        let json = serde_json::to_vec_pretty(book)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write dedup file: {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace dedup file: {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl DedupStore for JsonFileDedupStore {
    async fn append(&self, candidate_id: &str, topic: &str, question: &str) -> Result<()> {
        let mut book = self.book.lock().await;
        let mut updated = book.clone();
        updated.append(&record_key(candidate_id, topic), question, unix_now(), self.ttl);
        // swap in only after the file is written
        self.persist(&updated).await?;
        *book = updated;
        Ok(())
    }

    async fn list(&self, candidate_id: &str, topic: &str) -> Result<Vec<String>> {
        let book = self.book.lock().await;
        Ok(book.list(&record_key(candidate_id, topic), unix_now()))
    }
}
