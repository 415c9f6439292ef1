pub mod chat;
pub mod cursor;
pub mod dedup;
pub mod engine;
pub mod evaluation;
pub mod generator;
pub mod openai;
pub mod retrieval;
pub mod session_memory;
pub mod topic;

use serde::Serialize;

/// A generated question and where in the topic structure it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionPayload {
    pub domain: String,
    pub topic: String,
    pub pattern: String,
    pub question: String,
}

/// What a call to [`engine::InterviewEngine::next_question`] produces.
///
/// Serializes as `{"status": "question", ...payload}` or `{"status": "completed"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InterviewStep {
    /// The next question to put to the candidate.
    Question(QuestionPayload),
    /// Every domain has been covered; nothing more will be asked.
    Completed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn interview_step_wire_format() {
        let step = InterviewStep::Question(QuestionPayload {
            domain: "Java".into(),
            topic: "OOP".into(),
            pattern: "definition".into(),
            question: "What is encapsulation?".into(),
        });
        assert_eq!(
            serde_json::to_value(&step).unwrap(),
            json!({
                "status": "question",
                "domain": "Java",
                "topic": "OOP",
                "pattern": "definition",
                "question": "What is encapsulation?"
            })
        );
        assert_eq!(
            serde_json::to_value(InterviewStep::Completed).unwrap(),
            json!({"status": "completed"})
        );
    }
}
