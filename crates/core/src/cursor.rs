use crate::topic::TopicStructure;

/// Where the interview currently stands for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressionCursor {
    /// Index into the structure's domains; `None` once every domain is exhausted.
    domain_index: Option<usize>,
    topic_index: usize,
    pattern_index: usize,
    questions_asked_in_topic: usize,
}

/// The (domain, topic, pattern) triple the next question is generated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position<'a> {
    pub domain: &'a str,
    pub topic: &'a str,
    pub pattern: &'a str,
}

impl Default for ProgressionCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressionCursor {
    pub fn new() -> Self {
        Self {
            domain_index: Some(0),
            topic_index: 0,
            pattern_index: 0,
            questions_asked_in_topic: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.domain_index.is_none()
    }

    pub fn questions_asked_in_topic(&self) -> usize {
        self.questions_asked_in_topic
    }

    pub fn position<'a>(&self, structure: &'a TopicStructure) -> Option<Position<'a>> {
        let domain = structure.domain(self.domain_index?)?;
        let topic = domain.topics.get(self.topic_index)?;
        // patterns cycle rather than run out
        let pattern = &topic.patterns[self.pattern_index % topic.patterns.len()];
        Some(Position {
            domain: &domain.name,
            topic: &topic.name,
            pattern,
        })
    }

    /// Accounts for one emitted question and moves to the next topic once the
    /// per-topic cap is reached.
    pub fn record_question(&mut self, structure: &TopicStructure, max_questions_per_topic: usize) {
        if self.is_terminal() {
            return;
        }
        self.questions_asked_in_topic += 1;
        self.pattern_index += 1;
        if self.questions_asked_in_topic >= max_questions_per_topic.max(1) {
            self.advance_topic(structure);
        }
    }

    /// Depth-first step: next topic in the domain, else first topic of the next
    /// domain, else terminal.
    pub fn advance_topic(&mut self, structure: &TopicStructure) {
        let Some(domain_index) = self.domain_index else {
            return;
        };
        self.topic_index += 1;
        self.pattern_index = 0;
        self.questions_asked_in_topic = 0;

        let topic_count = structure
            .domain(domain_index)
            .map_or(0, |d| d.topics.len());
        if self.topic_index >= topic_count {
            self.topic_index = 0;
            let next = domain_index + 1;
            self.domain_index = (next < structure.domains().len()).then_some(next);
        }
    }
}
