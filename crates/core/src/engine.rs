use crate::{
    InterviewStep, QuestionPayload,
    cursor::ProgressionCursor,
    dedup::DedupStore,
    evaluation::{AnsweredQuestion, EvaluationSink},
    generator::{QuestionGenerator, QuestionPrompt},
    retrieval::{ContextRetriever, TopicContext},
    topic::{CandidateProfile, StructureProvider},
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("no topic structure found for candidate '{0}'")]
    MissingStructure(String),
    #[error("failed to look up candidate profile: {0}")]
    ProfileLookup(String),
    #[error("question generation failed: {0}")]
    Generation(String),
    #[error("dedup store failed: {0}")]
    DedupStore(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub max_questions_per_topic: usize,
    /// Total generation attempts per question, including the first.
    pub max_generation_attempts: usize,
    /// Upper bound on every call to an external collaborator.
    pub call_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_questions_per_topic: 2,
            max_generation_attempts: 3,
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// The external services the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub profiles: Arc<dyn StructureProvider>,
    pub retriever: Arc<dyn ContextRetriever>,
    pub generator: Arc<dyn QuestionGenerator>,
    pub dedup: Arc<dyn DedupStore>,
    pub evaluator: Arc<dyn EvaluationSink>,
}

/// Read-only view of a candidate's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub domain: Option<String>,
    pub topic: Option<String>,
    pub pattern: Option<String>,
    pub questions_asked_in_topic: usize,
    pub completed: bool,
}

#[derive(Debug, Clone)]
struct PendingQuestion {
    question: String,
    topic: String,
}

struct CandidateState {
    profile: CandidateProfile,
    cursor: ProgressionCursor,
    /// Last emitted question, waiting for the answer that arrives with the next call.
    pending: Option<PendingQuestion>,
}

type SharedCandidate = Arc<tokio::sync::Mutex<CandidateState>>;

/// Walks each candidate through their topic structure one question at a time.
///
/// State lives only in this process. Dropping the engine (or restarting) starts
/// every interview over from the first topic; the dedup store still remembers
/// which questions were asked.
pub struct InterviewEngine {
    collaborators: Collaborators,
    settings: EngineSettings,
    candidates: Mutex<HashMap<String, SharedCandidate>>,
}

impl InterviewEngine {
    pub fn new(collaborators: Collaborators, settings: EngineSettings) -> Self {
        Self {
            collaborators,
            settings,
            candidates: Mutex::new(HashMap::new()),
        }
    }

    /// Produces the next question for `candidate_id`, treating `previous_answer`
    /// as the answer to the question returned by the previous call.
    pub async fn next_question(
        &self,
        candidate_id: &str,
        previous_answer: &str,
    ) -> Result<InterviewStep, EngineError> {
        let shared = self.candidate_state(candidate_id).await?;
        let mut guard = shared.lock().await;
        let CandidateState {
            profile,
            cursor,
            pending,
        } = &mut *guard;

        let Some(position) = cursor.position(&profile.structure) else {
            debug!(candidate_id, "Interview already completed");
            return Ok(InterviewStep::Completed);
        };
        let domain = position.domain.to_string();
        let topic = position.topic.to_string();
        let pattern = position.pattern.to_string();

        let context = self.topic_context(candidate_id, &topic).await;
        let answer = previous_answer.trim();
        let prompt = QuestionPrompt {
            role: profile.role.clone(),
            experience: profile.experience.clone(),
            domain: domain.clone(),
            topic: topic.clone(),
            pattern: pattern.clone(),
            summary: context.summary,
            weak_areas: context.weak_areas,
            previous_answer: (!answer.is_empty()).then(|| answer.to_string()),
        };

        let asked = self
            .bounded("dedup lookup", self.collaborators.dedup.list(candidate_id, &topic))
            .await
            .map_err(|e| EngineError::DedupStore(format!("{e:#}")))?;
        let question = self.generate_unique(candidate_id, &prompt, &asked).await?;
        self.bounded(
            "dedup append",
            self.collaborators.dedup.append(candidate_id, &topic, &question),
        )
        .await
        .map_err(|e| EngineError::DedupStore(format!("{e:#}")))?;

        if let Some(previous) = pending.take() {
            if !answer.is_empty() {
                self.forward_for_evaluation(candidate_id, previous, answer)
                    .await;
            }
        }

        cursor.record_question(&profile.structure, self.settings.max_questions_per_topic);
        if cursor.is_terminal() {
            info!(candidate_id, "All domains covered, interview complete");
        }
        *pending = Some(PendingQuestion {
            question: question.clone(),
            topic: topic.clone(),
        });

        info!(candidate_id, %domain, %topic, %pattern, "Emitting question");
        Ok(InterviewStep::Question(QuestionPayload {
            domain,
            topic,
            pattern,
            question,
        }))
    }

    /// Sends the answer to the last emitted question for evaluation without
    /// asking anything new. Returns whether a record was forwarded.
    pub async fn submit_final_answer(
        &self,
        candidate_id: &str,
        answer: &str,
    ) -> Result<bool, EngineError> {
        let answer = answer.trim();
        let Some(shared) = self.existing_state(candidate_id) else {
            return Ok(false);
        };
        if answer.is_empty() {
            return Ok(false);
        }
        let mut state = shared.lock().await;
        match state.pending.take() {
            Some(previous) => {
                self.forward_for_evaluation(candidate_id, previous, answer)
                    .await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn progress(&self, candidate_id: &str) -> Option<Progress> {
        let shared = self.existing_state(candidate_id)?;
        let state = shared.lock().await;
        let position = state.cursor.position(&state.profile.structure);
        Some(Progress {
            domain: position.as_ref().map(|p| p.domain.to_string()),
            topic: position.as_ref().map(|p| p.topic.to_string()),
            pattern: position.as_ref().map(|p| p.pattern.to_string()),
            questions_asked_in_topic: state.cursor.questions_asked_in_topic(),
            completed: state.cursor.is_terminal(),
        })
    }

    /// Drops a candidate's in-process state. The next call starts over.
    pub fn forget(&self, candidate_id: &str) -> bool {
        self.lock_candidates().remove(candidate_id).is_some()
    }

    fn lock_candidates(&self) -> MutexGuard<'_, HashMap<String, SharedCandidate>> {
        self.candidates.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn existing_state(&self, candidate_id: &str) -> Option<SharedCandidate> {
        self.lock_candidates().get(candidate_id).cloned()
    }

    async fn candidate_state(&self, candidate_id: &str) -> Result<SharedCandidate, EngineError> {
        if let Some(state) = self.existing_state(candidate_id) {
            return Ok(state);
        }

        let profile = self
            .bounded(
                "profile lookup",
                self.collaborators.profiles.load_profile(candidate_id),
            )
            .await
            .map_err(|e| EngineError::ProfileLookup(format!("{e:#}")))?
            .ok_or_else(|| EngineError::MissingStructure(candidate_id.to_string()))?;

        // A concurrent request may have won the race while we were loading;
        // its state is kept and ours is discarded.
        let mut candidates = self.lock_candidates();
        let state = candidates
            .entry(candidate_id.to_string())
            .or_insert_with(|| {
                info!(
                    candidate_id,
                    domains = profile.structure.domains().len(),
                    "Starting interview"
                );
                Arc::new(tokio::sync::Mutex::new(CandidateState {
                    profile,
                    cursor: ProgressionCursor::new(),
                    pending: None,
                }))
            })
            .clone();
        Ok(state)
    }

    async fn topic_context(&self, candidate_id: &str, topic: &str) -> TopicContext {
        match self
            .bounded(
                "context retrieval",
                self.collaborators.retriever.retrieve_context(topic),
            )
            .await
        {
            Ok(context) => context,
            Err(e) => {
                warn!(candidate_id, topic, "Context retrieval failed, continuing without it: {e:#}");
                TopicContext::default()
            }
        }
    }

    /// Regenerates while the question is already on record, up to the attempt
    /// limit. The last attempt is accepted even if it is a repeat.
    async fn generate_unique(
        &self,
        candidate_id: &str,
        prompt: &QuestionPrompt,
        asked: &[String],
    ) -> Result<String, EngineError> {
        let max_attempts = self.settings.max_generation_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let question = self
                .bounded(
                    "question generation",
                    self.collaborators.generator.generate(prompt),
                )
                .await
                .map_err(|e| EngineError::Generation(format!("{e:#}")))?;

            if !asked.contains(&question) {
                return Ok(question);
            }
            if attempt >= max_attempts {
                debug!(
                    candidate_id,
                    topic = %prompt.topic,
                    attempt,
                    "Still a repeated question after the last attempt, accepting it"
                );
                return Ok(question);
            }
            debug!(candidate_id, topic = %prompt.topic, attempt, "Repeated question, regenerating");
        }
    }

    async fn forward_for_evaluation(
        &self,
        candidate_id: &str,
        previous: PendingQuestion,
        answer: &str,
    ) {
        let answered = AnsweredQuestion {
            question: previous.question,
            answer: answer.to_string(),
            topic: previous.topic,
            candidate_id: candidate_id.to_string(),
        };
        if let Err(e) = self
            .bounded("evaluation", self.collaborators.evaluator.record(answered))
            .await
        {
            warn!(candidate_id, "Failed to forward answer for evaluation: {e:#}");
        }
    }

    async fn bounded<T>(
        &self,
        what: &str,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        match tokio::time::timeout(self.settings.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "{what} timed out after {:?}",
                self.settings.call_timeout
            )),
        }
    }
}
