use crate::openai::{ChatMessage, OpenAiClient};
use anyhow::Result;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

pub const DEFAULT_INTERVIEWER_SYSTEM_PROMPT: &str = "You are a strict interviewer.";

/// Everything the text generator gets to shape one question.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuestionPrompt {
    pub role: String,
    pub experience: String,
    pub domain: String,
    pub topic: String,
    pub pattern: String,
    pub summary: String,
    pub weak_areas: Vec<String>,
    /// Set only when the candidate actually said something.
    pub previous_answer: Option<String>,
}

impl QuestionPrompt {
    pub fn render(&self) -> String {
        let mut prompt = format!(
            "You are an expert interviewer.\n\
             Generate ONE {pattern} question for a {experience} {role} candidate.\n\
             Topic: {topic} ({domain})\n",
            pattern = self.pattern,
            experience = self.experience,
            role = self.role,
            topic = self.topic,
            domain = self.domain,
        );

        if !self.summary.is_empty() || !self.weak_areas.is_empty() {
            let weak = if self.weak_areas.is_empty() {
                "None".to_string()
            } else {
                self.weak_areas.join(", ")
            };
            prompt.push_str(&format!(
                "\nCandidate performance summary:\n\"{}\"\nWeak skills to probe deeper: {weak}\n",
                self.summary
            ));
        }

        if let Some(answer) = &self.previous_answer {
            prompt.push_str(&format!(
                "\nThe question should follow up on the previous answer: \"{answer}\".\n"
            ));
        }

        prompt.push_str("\nReturn only the question.");
        prompt
    }
}

/// Produces one interview question for a prompt.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(&self, prompt: &QuestionPrompt) -> Result<String>;
}

pub struct OpenAiQuestionGenerator {
    client: OpenAiClient,
    system_prompt: String,
}

impl OpenAiQuestionGenerator {
    pub fn new(client: OpenAiClient) -> Self {
        Self {
            client,
            system_prompt: DEFAULT_INTERVIEWER_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }
}

#[async_trait]
impl QuestionGenerator for OpenAiQuestionGenerator {
    async fn generate(&self, prompt: &QuestionPrompt) -> Result<String> {
        let messages = [
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(prompt.render()),
        ];
        let question = self.client.chat(&messages, 0.7).await?;
        if question.is_empty() {
            anyhow::bail!("LLM returned an empty question");
        }
        Ok(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use std::env;

    fn prompt() -> QuestionPrompt {
        QuestionPrompt {
            role: "Backend Developer".into(),
            experience: "3 years".into(),
            domain: "Java".into(),
            topic: "Collections".into(),
            pattern: "scenario".into(),
            ..Default::default()
        }
    }

    #[test]
    fn render_without_context_or_answer() {
        let text = prompt().render();
        assert!(text.contains("Generate ONE scenario question for a 3 years Backend Developer"));
        assert!(text.contains("Topic: Collections (Java)"));
        assert!(!text.contains("performance summary"));
        assert!(!text.contains("follow up"));
    }

    #[test]
    fn render_includes_context_and_follow_up() {
        let mut p = prompt();
        p.summary = "Knows lists, shaky on maps".into();
        p.previous_answer = Some("I would use a HashMap".into());
        let text = p.render();

        assert!(text.contains("\"Knows lists, shaky on maps\""));
        assert!(text.contains("Weak skills to probe deeper: None"));
        assert!(text.contains("previous answer: \"I would use a HashMap\""));

        p.weak_areas = vec!["hashing".into(), "concurrency".into()];
        assert!(p.render().contains("Weak skills to probe deeper: hashing, concurrency"));
    }

    // Live call against the OpenAI API. Run with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn test_generate_question_live() {
        dotenvy::dotenv_override().ok();
        let api_key = env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY not set");
        let client = OpenAiClient::new(
            SecretString::from(api_key),
            "gpt-4o-mini".into(),
            "text-embedding-3-small".into(),
        );
        let generator = OpenAiQuestionGenerator::new(client);

        let question = generator.generate(&prompt()).await.unwrap();
        println!("Generated: {question}");
        assert!(!question.is_empty());
    }
}
