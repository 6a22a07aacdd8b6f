//! Conversation history for a tutoring session.
//!
//! The log doubles as the display transcript and as the rolling context
//! window fed into explanation requests. Turns are append-only and never
//! mutated after creation; the orchestrator is the sole writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Agent,
}

// Implement Display for easy conversion to a string, used when formatting
// the context window.
impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Agent => write!(f, "agent"),
        }
    }
}

/// Which specialized generation behavior produced an agent turn.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Planner,
    Explainer,
    Examiner,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentKind::Planner => write!(f, "planner"),
            AgentKind::Explainer => write!(f, "explainer"),
            AgentKind::Examiner => write!(f, "examiner"),
        }
    }
}

/// A title/URI pair indicating a source used to support an explanation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Citation {
    pub title: String,
    pub uri: String,
}

/// A single turn in the conversation. Immutable once created.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub role: TurnRole,
    pub content: String,
    /// Set on agent turns to indicate which capability produced them.
    pub agent: Option<AgentKind>,
    /// Grounding citations; empty for user turns and ungrounded responses.
    pub citations: Vec<Citation>,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: TurnRole::User,
            content: content.into(),
            agent: None,
            citations: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn agent(content: impl Into<String>, agent: AgentKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: TurnRole::Agent,
            content: content.into(),
            agent: Some(agent),
            citations: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = citations;
        self
    }
}

/// Append-only, causally ordered sequence of conversation turns.
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    turns: Vec<ConversationTurn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// The most recent turn with role `agent`, if any.
    pub fn last_agent_turn(&self) -> Option<&ConversationTurn> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == TurnRole::Agent)
    }

    /// The last `n` turns in original order; fewer if the log is shorter.
    pub fn recent_window(&self, n: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_only_grows() {
        let mut log = ConversationLog::new();
        assert!(log.is_empty());
        log.append(ConversationTurn::user("hello"));
        log.append(ConversationTurn::agent("hi there", AgentKind::Explainer));
        assert_eq!(log.len(), 2);
        assert_eq!(log.turns()[0].content, "hello");
        assert_eq!(log.turns()[1].content, "hi there");
    }

    #[test]
    fn test_last_agent_turn_skips_user_turns() {
        let mut log = ConversationLog::new();
        assert!(log.last_agent_turn().is_none());

        log.append(ConversationTurn::agent("first", AgentKind::Planner));
        log.append(ConversationTurn::agent("second", AgentKind::Explainer));
        log.append(ConversationTurn::user("a question"));

        let last = log.last_agent_turn().unwrap();
        assert_eq!(last.content, "second");
        assert_eq!(last.agent, Some(AgentKind::Explainer));
    }

    #[test]
    fn test_recent_window_clamps_to_log_length() {
        let mut log = ConversationLog::new();
        log.append(ConversationTurn::user("one"));
        log.append(ConversationTurn::user("two"));

        assert_eq!(log.recent_window(5).len(), 2);

        log.append(ConversationTurn::user("three"));
        log.append(ConversationTurn::user("four"));
        let window = log.recent_window(3);
        assert_eq!(window.len(), 3);
        // Original order, oldest first.
        assert_eq!(window[0].content, "two");
        assert_eq!(window[2].content, "four");
    }

    #[test]
    fn test_turn_role_display() {
        assert_eq!(format!("{}", TurnRole::User), "user");
        assert_eq!(format!("{}", TurnRole::Agent), "agent");
    }

    #[test]
    fn test_agent_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&AgentKind::Planner).unwrap(),
            "\"planner\""
        );
        let kind: AgentKind = serde_json::from_str("\"examiner\"").unwrap();
        assert_eq!(kind, AgentKind::Examiner);
    }

    #[test]
    fn test_citations_attach_to_agent_turns() {
        let turn = ConversationTurn::agent("grounded", AgentKind::Explainer).with_citations(vec![
            Citation {
                title: "Quanta Magazine".to_string(),
                uri: "https://example.com/article".to_string(),
            },
        ]);
        assert_eq!(turn.citations.len(), 1);
        assert_eq!(turn.citations[0].title, "Quanta Magazine");
    }
}
