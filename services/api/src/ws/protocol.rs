//! Defines the WebSocket message protocol between the browser client and the API server.

use mentor_core::{
    conversation::ConversationTurn,
    curriculum::LearningNode,
    orchestrator::AgentBusyState,
    quiz::QuizQuestion,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A free-text message from the user: first message plans the
    /// curriculum, later ones ask for explanations.
    UserMessage { text: String },
    /// Focuses a curriculum node and asks for an explanation of it.
    SelectNode { node_id: Uuid },
    /// Requests a quiz on the focused node.
    RequestQuiz,
    /// Selects an answer option for the current quiz question.
    QuizSelect { option_index: usize },
    /// Submits the pending selection for grading.
    QuizSubmit,
    /// Advances to the next question (or to the results).
    QuizNext,
    /// Closes the quiz, discarding the session.
    QuizClose,
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A new conversation turn (user echoes included, so the client can
    /// render the transcript from this stream alone).
    Turn { turn: ConversationTurn },
    /// Full ordered snapshot of the curriculum.
    Curriculum { nodes: Vec<LearningNode> },
    /// The transient busy state of the generation pipeline.
    AgentStatus { state: AgentBusyState },
    /// A quiz session has started over these questions.
    QuizStarted { questions: Vec<QuizQuestion> },
    /// Grading outcome for a submitted answer.
    QuizAnswer {
        correct: bool,
        correct_option_index: usize,
        explanation: String,
    },
    /// Advanced to the question at `index`.
    QuizProgress { index: usize, total: usize },
    /// The quiz is finished. `percent` is derived here, at the presentation
    /// boundary, and nowhere else.
    QuizCompleted {
        score: usize,
        total: usize,
        percent: f32,
    },
    /// Reports a recoverable error to the client.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentor_core::conversation::{AgentKind, ConversationTurn};

    #[test]
    fn test_client_message_deserialization() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "user_message", "text": "Quantum Physics"}"#)
                .unwrap();
        assert!(matches!(msg, ClientMessage::UserMessage { text } if text == "Quantum Physics"));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "quiz_select", "option_index": 2}"#).unwrap();
        assert!(matches!(msg, ClientMessage::QuizSelect { option_index: 2 }));

        let msg: ClientMessage = serde_json::from_str(r#"{"type": "request_quiz"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::RequestQuiz));
    }

    #[test]
    fn test_client_message_unknown_type_rejected() {
        let result: Result<ClientMessage, _> =
            serde_json::from_str(r#"{"type": "set_voice_enabled", "enabled": true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_server_message_tags() {
        let msg = ServerMessage::QuizCompleted {
            score: 2,
            total: 3,
            percent: 66.666664,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"quiz_completed\""));
        assert!(json.contains("\"score\":2"));
        assert!(json.contains("\"total\":3"));
    }

    #[test]
    fn test_turn_message_serialization() {
        let turn = ConversationTurn::agent("An explanation.", AgentKind::Explainer);
        let json = serde_json::to_string(&ServerMessage::Turn { turn }).unwrap();
        assert!(json.contains("\"type\":\"turn\""));
        assert!(json.contains("\"role\":\"agent\""));
        assert!(json.contains("\"agent\":\"explainer\""));
    }
}
