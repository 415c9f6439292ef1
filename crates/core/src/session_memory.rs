use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(1800);
pub const DEFAULT_MAX_TURNS: usize = 20;

pub const DEFAULT_PRIMING_PROMPT: &str = "You are a mock interviewer.
Conduct a technical interview for the candidate.
Start with:
1. Tell me about yourself
2. Project explanation
3. Roles & responsibilities
Then ask technical, scenario and follow-up questions. Total 25-30 questions.";

pub const DEFAULT_PRIMING_REPLY: &str = "Understood. Let's begin the interview.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionMemoryConfig {
    pub idle_ttl: Duration,
    pub max_turns: usize,
    /// Seeded into every new session.
    pub priming: Vec<Turn>,
}

impl Default for SessionMemoryConfig {
    fn default() -> Self {
        Self {
            idle_ttl: DEFAULT_IDLE_TTL,
            max_turns: DEFAULT_MAX_TURNS,
            priming: vec![
                Turn::user(DEFAULT_PRIMING_PROMPT),
                Turn::assistant(DEFAULT_PRIMING_REPLY),
            ],
        }
    }
}

#[derive(Debug)]
struct SessionEntry {
    turns: VecDeque<Turn>,
    last_touched: Instant,
}

/// Conversation history per chat session, bounded in length and in idle time.
///
/// Both bounds are applied lazily: idle sessions are swept and histories are
/// trimmed only when [`SessionMemory::get_or_create`] runs, so a stale session
/// can linger until the next access to any session.
pub struct SessionMemory {
    config: SessionMemoryConfig,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl Default for SessionMemory {
    fn default() -> Self {
        Self::new(SessionMemoryConfig::default())
    }
}

impl SessionMemory {
    pub fn new(config: SessionMemoryConfig) -> Self {
        Self {
            config,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_create(&self, session_id: &str) -> Vec<Turn> {
        self.get_or_create_at(session_id, Instant::now())
    }

    pub fn append_turn(&self, session_id: &str, role: Role, text: impl Into<String>) {
        self.append_turn_at(session_id, Turn { role, text: text.into() }, Instant::now());
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn new_entry(&self, now: Instant) -> SessionEntry {
        SessionEntry {
            turns: self.config.priming.iter().cloned().collect(),
            last_touched: now,
        }
    }

    // Sweep, lookup and creation share one lock acquisition.
    fn get_or_create_at(&self, session_id: &str, now: Instant) -> Vec<Turn> {
        let mut sessions = self.lock();

        let before = sessions.len();
        let ttl = self.config.idle_ttl;
        sessions.retain(|_, entry| now.saturating_duration_since(entry.last_touched) <= ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted idle chat sessions");
        }

        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| self.new_entry(now));
        entry.last_touched = now;

        let max = self.config.max_turns;
        if entry.turns.len() > max {
            let excess = entry.turns.len() - max;
            entry.turns.drain(..excess);
        }
        entry.turns.iter().cloned().collect()
    }

    fn append_turn_at(&self, session_id: &str, turn: Turn, now: Instant) {
        let mut sessions = self.lock();
        let entry = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| self.new_entry(now));
        entry.last_touched = now;
        entry.turns.push_back(turn);
    }
}
