//! Builds the core engine and chat from configuration.

use crate::config::Config;
use crate::prompt_loader::PromptOverrides;
use interview_core::InterviewStep;
use interview_core::chat::{InterviewChat, OpenAiChatModel};
use interview_core::dedup::DedupStore;
use interview_core::engine::{Collaborators, EngineError, InterviewEngine};
use interview_core::evaluation::EvaluationSink;
use interview_core::generator::OpenAiQuestionGenerator;
use interview_core::openai::OpenAiClient;
use interview_core::retrieval::{ContextRetriever, NoContextRetriever, PineconeRetriever};
use interview_core::session_memory::{
    DEFAULT_PRIMING_PROMPT, DEFAULT_PRIMING_REPLY, SessionMemory, SessionMemoryConfig, Turn,
};
use interview_core::topic::StructureProvider;
use std::sync::Arc;
use std::time::Duration;

/// Consecutive generation failures tolerated before the interview gives up.
pub const GENERATION_RETRIES: u32 = 3;

pub fn openai_client(config: &Config) -> OpenAiClient {
    OpenAiClient::new(
        config.openai_api_key.clone(),
        config.chat_model.clone(),
        config.embedding_model.clone(),
    )
    .with_base_url(config.openai_base_url.clone())
}

pub fn context_retriever(config: &Config, client: &OpenAiClient) -> Arc<dyn ContextRetriever> {
    match &config.pinecone {
        Some(pinecone) => {
            tracing::info!(host = %pinecone.index_host, "Using Pinecone for topic context");
            Arc::new(
                PineconeRetriever::new(client.clone(), pinecone.api_key.clone(), &pinecone.index_host)
                    .with_dimension(config.embedding_dimension),
            )
        }
        None => {
            tracing::info!("PINECONE_* not set, questions are generated without prior context");
            Arc::new(NoContextRetriever)
        }
    }
}

pub fn build_engine(
    config: &Config,
    prompts: &PromptOverrides,
    profiles: Arc<dyn StructureProvider>,
    dedup: Arc<dyn DedupStore>,
    evaluator: Arc<dyn EvaluationSink>,
) -> InterviewEngine {
    let client = openai_client(config);
    let mut generator = OpenAiQuestionGenerator::new(client.clone());
    if let Some(system) = &prompts.interviewer_system {
        generator = generator.with_system_prompt(system.clone());
    }

    InterviewEngine::new(
        Collaborators {
            profiles,
            retriever: context_retriever(config, &client),
            generator: Arc::new(generator),
            dedup,
            evaluator,
        },
        config.engine.clone(),
    )
}

/// Asks the engine for the next step, retrying generation failures with the
/// same answer. Generation failures leave the candidate's state untouched, so a
/// retry continues where the interview left off. Every other error is returned.
pub async fn next_step_with_retry(
    engine: &InterviewEngine,
    candidate_id: &str,
    answer: &str,
) -> Result<InterviewStep, EngineError> {
    let mut failures = 0;
    loop {
        match engine.next_question(candidate_id, answer).await {
            Err(EngineError::Generation(e)) if failures < GENERATION_RETRIES => {
                failures += 1;
                tracing::warn!(candidate_id, failures, "Question generation failed, retrying: {e}");
                tokio::time::sleep(Duration::from_secs(u64::from(failures))).await;
            }
            result => return result,
        }
    }
}

pub fn session_memory(config: &Config, prompts: &PromptOverrides) -> SessionMemory {
    let priming = prompts
        .chat_priming
        .clone()
        .unwrap_or_else(|| DEFAULT_PRIMING_PROMPT.to_string());
    SessionMemory::new(SessionMemoryConfig {
        idle_ttl: config.session_idle_ttl,
        max_turns: config.session_max_turns,
        priming: vec![Turn::user(priming), Turn::assistant(DEFAULT_PRIMING_REPLY)],
    })
}

pub fn build_chat(config: &Config, prompts: &PromptOverrides) -> InterviewChat {
    InterviewChat::new(
        Arc::new(session_memory(config, prompts)),
        Arc::new(OpenAiChatModel::new(openai_client(config))),
        config.engine.call_timeout,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use interview_core::dedup::InMemoryDedupStore;
    use interview_core::engine::EngineSettings;
    use interview_core::evaluation::ChannelEvaluationSink;
    use interview_core::generator::{QuestionGenerator, QuestionPrompt};
    use interview_core::topic::InMemoryProfileStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls, then answers.
    struct FlakyGenerator {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl QuestionGenerator for FlakyGenerator {
        async fn generate(&self, prompt: &QuestionPrompt) -> anyhow::Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                anyhow::bail!("502 Bad Gateway");
            }
            Ok(format!("Explain {} in {}", prompt.pattern, prompt.topic))
        }
    }

    fn engine_with(generator: Arc<FlakyGenerator>) -> InterviewEngine {
        let profiles = InMemoryProfileStore::new();
        profiles.insert(
            "alice",
            serde_json::from_value(serde_json::json!({
                "question": {"Java": {"OOP": ["definition", "scenario"]}}
            }))
            .unwrap(),
        );
        let (evaluator, _rx) = ChannelEvaluationSink::channel(8);
        InterviewEngine::new(
            Collaborators {
                profiles: Arc::new(profiles),
                retriever: Arc::new(NoContextRetriever),
                generator,
                dedup: Arc::new(InMemoryDedupStore::default()),
                evaluator: Arc::new(evaluator),
            },
            EngineSettings::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn transient_generation_failures_are_retried() {
        let generator = Arc::new(FlakyGenerator {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let engine = engine_with(generator.clone());

        let step = next_step_with_retry(&engine, "alice", "").await.unwrap();

        match step {
            InterviewStep::Question(q) => assert_eq!(q.pattern, "definition"),
            InterviewStep::Completed => panic!("Expected a question"),
        }
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_generation_failure_is_returned_with_progress_kept() {
        let generator = Arc::new(FlakyGenerator {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let engine = engine_with(generator.clone());

        let err = next_step_with_retry(&engine, "alice", "").await.unwrap_err();

        assert!(matches!(err, EngineError::Generation(ref msg) if msg.contains("502")));
        assert_eq!(generator.calls.load(Ordering::SeqCst), GENERATION_RETRIES + 1);
        let progress = engine.progress("alice").await.unwrap();
        assert_eq!(progress.questions_asked_in_topic, 0);
    }

    #[tokio::test]
    async fn missing_structure_is_not_retried() {
        let generator = Arc::new(FlakyGenerator {
            failures: 0,
            calls: AtomicU32::new(0),
        });
        let engine = engine_with(generator.clone());

        let err = next_step_with_retry(&engine, "mallory", "").await.unwrap_err();

        assert_eq!(err, EngineError::MissingStructure("mallory".into()));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "OPENAI_API_KEY" => Some("sk-test".to_string()),
            "SESSION_MAX_TURNS" => Some("6".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn chat_priming_override_seeds_new_sessions() {
        let prompts = PromptOverrides {
            chat_priming: Some("Interview me for a Rust role.".into()),
            ..Default::default()
        };
        let memory = session_memory(&config(), &prompts);

        let turns = memory.get_or_create("s1");
        assert_eq!(turns[0], Turn::user("Interview me for a Rust role."));
        assert_eq!(turns[1], Turn::assistant(DEFAULT_PRIMING_REPLY));
    }

    #[test]
    fn default_priming_is_used_without_override() {
        let memory = session_memory(&config(), &PromptOverrides::default());
        assert_eq!(memory.get_or_create("s1")[0], Turn::user(DEFAULT_PRIMING_PROMPT));
    }
}
