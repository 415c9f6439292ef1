use crate::openai::OpenAiClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1024;

/// Prior-performance context for a topic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopicContext {
    pub summary: String,
    pub weak_areas: Vec<String>,
}

impl TopicContext {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.weak_areas.is_empty()
    }
}

/// Looks up what is already known about the candidate's performance on a topic.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    async fn retrieve_context(&self, topic: &str) -> Result<TopicContext>;
}

/// Used when no vector index is configured.
pub struct NoContextRetriever;

#[async_trait]
impl ContextRetriever for NoContextRetriever {
    async fn retrieve_context(&self, _topic: &str) -> Result<TopicContext> {
        Ok(TopicContext::default())
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    #[serde(default)]
    metadata: Option<SummaryMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct SummaryMetadata {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    weak_areas: Vec<String>,
}

/// Similarity lookup over stored evaluation summaries in a Pinecone index.
pub struct PineconeRetriever {
    client: Client,
    openai: OpenAiClient,
    api_key: SecretString,
    index_host: String,
    dimension: usize,
}

impl PineconeRetriever {
    pub fn new(openai: OpenAiClient, api_key: SecretString, index_host: &str) -> Self {
        let host = index_host.trim_end_matches('/');
        let index_host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };
        Self {
            client: Client::new(),
            openai,
            api_key,
            index_host,
            dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }
}

/// Truncates or zero-pads an embedding to the index dimension.
pub fn fit_dimension(mut vector: Vec<f32>, dimension: usize) -> Vec<f32> {
    vector.resize(dimension, 0.0);
    vector
}

#[async_trait]
impl ContextRetriever for PineconeRetriever {
    async fn retrieve_context(&self, topic: &str) -> Result<TopicContext> {
        let vector = fit_dimension(self.openai.embed(topic).await?, self.dimension);

        let body = serde_json::json!({
            "vector": vector,
            "topK": 1,
            "includeMetadata": true,
            "filter": { "type": { "$eq": "summary" } },
        });

        let resp = self
            .client
            .post(format!("{}/query", self.index_host))
            .header("Api-Key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("Pinecone query failed")?
            .error_for_status()?
            .json::<QueryResponse>()
            .await
            .context("Pinecone query response was not valid JSON")?;

        let metadata = resp
            .matches
            .into_iter()
            .next()
            .and_then(|m| m.metadata)
            .unwrap_or_default();
        Ok(TopicContext {
            summary: metadata.summary,
            weak_areas: metadata.weak_areas,
        })
    }
}
