use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Reasons a topic structure is rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StructureError {
    #[error("topic structure must be a JSON object of domains")]
    NotAnObject,
    #[error("topic structure has no domains")]
    NoDomains,
    #[error("domain '{0}' must map to an object of topics")]
    DomainNotAnObject(String),
    #[error("domain '{0}' has no topics")]
    EmptyDomain(String),
    #[error("topic '{topic}' in domain '{domain}' must map to a list of pattern strings")]
    NotAPatternList { domain: String, topic: String },
    #[error("topic '{topic}' in domain '{domain}' has no patterns")]
    EmptyTopic { domain: String, topic: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Topic {
    pub name: String,
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    pub name: String,
    pub topics: Vec<Topic>,
}

/// Ordered domain -> topic -> pattern mapping for one candidate.
///
/// The only way to build one is through [`TopicStructure::from_value`], so every
/// instance is non-empty at each level. It is never mutated after loading.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicStructure {
    domains: Vec<Domain>,
}

impl TopicStructure {
    /// Builds a structure from a JSON object, keeping key order.
    pub fn from_value(value: &Value) -> Result<Self, StructureError> {
        let domains_obj = value.as_object().ok_or(StructureError::NotAnObject)?;
        if domains_obj.is_empty() {
            return Err(StructureError::NoDomains);
        }

        let mut domains = Vec::with_capacity(domains_obj.len());
        for (domain_name, topics_value) in domains_obj {
            let topics_obj = topics_value
                .as_object()
                .ok_or_else(|| StructureError::DomainNotAnObject(domain_name.clone()))?;
            if topics_obj.is_empty() {
                return Err(StructureError::EmptyDomain(domain_name.clone()));
            }

            let mut topics = Vec::with_capacity(topics_obj.len());
            for (topic_name, patterns_value) in topics_obj {
                let not_a_list = || StructureError::NotAPatternList {
                    domain: domain_name.clone(),
                    topic: topic_name.clone(),
                };
                let patterns = patterns_value
                    .as_array()
                    .ok_or_else(not_a_list)?
                    .iter()
                    .map(|p| {
                        p.as_str()
                            .map(str::trim)
                            .filter(|p| !p.is_empty())
                            .map(str::to_string)
                            .ok_or_else(not_a_list)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if patterns.is_empty() {
                    return Err(StructureError::EmptyTopic {
                        domain: domain_name.clone(),
                        topic: topic_name.clone(),
                    });
                }
                topics.push(Topic {
                    name: topic_name.clone(),
                    patterns,
                });
            }

            domains.push(Domain {
                name: domain_name.clone(),
                topics,
            });
        }

        Ok(Self { domains })
    }

    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    pub fn domain(&self, index: usize) -> Option<&Domain> {
        self.domains.get(index)
    }
}

impl<'de> Deserialize<'de> for TopicStructure {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

/// Everything the engine needs to know about a candidate before the first question.
///
/// Deserializes from the payload written by the resume extraction step:
/// `{"question": {...}, "role": "...", "experience": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateProfile {
    #[serde(rename = "question")]
    pub structure: Arc<TopicStructure>,
    #[serde(default)]
    pub role: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub experience: String,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "experience must be a string or number, got {other}"
        ))),
    }
}

/// Resolves the profile of a candidate. `Ok(None)` means no structure was ever stored.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait StructureProvider: Send + Sync {
    async fn load_profile(&self, candidate_id: &str) -> Result<Option<CandidateProfile>>;
}

/// Structure provider backed by a process-local map.
#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, CandidateProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, candidate_id: impl Into<String>, profile: CandidateProfile) {
        let mut profiles = self.profiles.write().unwrap_or_else(|e| e.into_inner());
        profiles.insert(candidate_id.into(), profile);
    }
}

#[async_trait]
impl StructureProvider for InMemoryProfileStore {
    async fn load_profile(&self, candidate_id: &str) -> Result<Option<CandidateProfile>> {
        let profiles = self.profiles.read().unwrap_or_else(|e| e.into_inner());
        Ok(profiles.get(candidate_id).cloned())
    }
}
