use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A question together with the answer the candidate gave to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    pub question: String,
    pub answer: String,
    pub topic: String,
    pub candidate_id: String,
}

/// Receives answered questions for scoring. Scoring itself happens elsewhere.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EvaluationSink: Send + Sync {
    async fn record(&self, answered: AnsweredQuestion) -> Result<()>;
}

/// Hands records to whatever task owns the receiving end.
pub struct ChannelEvaluationSink {
    tx: mpsc::Sender<AnsweredQuestion>,
}

impl ChannelEvaluationSink {
    pub fn new(tx: mpsc::Sender<AnsweredQuestion>) -> Self {
        Self { tx }
    }

    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<AnsweredQuestion>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl EvaluationSink for ChannelEvaluationSink {
    async fn record(&self, answered: AnsweredQuestion) -> Result<()> {
        self.tx
            .send(answered)
            .await
            .map_err(|_| anyhow::anyhow!("evaluation receiver has been dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answered() -> AnsweredQuestion {
        AnsweredQuestion {
            question: "What is a HashMap?".into(),
            answer: "A hash table".into(),
            topic: "Collections".into(),
            candidate_id: "alice".into(),
        }
    }

    #[tokio::test]
    async fn channel_sink_forwards_records() {
        let (sink, mut rx) = ChannelEvaluationSink::channel(4);
        sink.record(answered()).await.unwrap();

        assert_eq!(rx.recv().await, Some(answered()));
    }

    #[tokio::test]
    async fn channel_sink_errors_once_receiver_is_gone() {
        let (sink, rx) = ChannelEvaluationSink::channel(1);
        drop(rx);

        assert!(sink.record(answered()).await.is_err());
    }
}
