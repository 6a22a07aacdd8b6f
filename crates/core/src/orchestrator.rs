//! Session orchestration.
//!
//! The routing brain of a tutoring session: given a user input event or a
//! node-selection event, decides which generation capability to invoke,
//! assembles the request context, and applies the result to the curriculum
//! store, the conversation log and the transient busy state. Generation
//! failures are converted into visible turns (plan/explain) or logged no-ops
//! (quiz); they never corrupt log ordering and never escape to the caller.

use crate::conversation::{AgentKind, ConversationLog, ConversationTurn};
use crate::curriculum::{CurriculumStore, LearningNode, NodeStatus};
use crate::generation::GenerationService;
use crate::quiz::{QuizError, QuizSession, QuizState};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// How many of the most recent turns form the explanation context window.
pub const CONTEXT_TURNS: usize = 3;
/// Sub-topic sentinel used when no curriculum node is focused.
pub const GENERAL_INQUIRY: &str = "General Inquiry";

const PLAN_FAILURE_MESSAGE: &str =
    "I encountered an error generating the curriculum. Please check your API key and try again.";
const EXPLAIN_APOLOGY_MESSAGE: &str =
    "I apologize, I couldn't generate an explanation at this moment.";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// A generation is already in flight. At most one may be open at a
    /// time; concurrent generations could race to append turns out of order
    /// or double-count quiz completion.
    #[error("a generation is already in flight")]
    Busy,
    #[error(transparent)]
    Quiz(#[from] QuizError),
}

/// Transient, process-local flag describing the generation in flight.
/// Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AgentBusyState {
    pub busy: bool,
    pub agent: Option<AgentKind>,
    pub status: String,
}

impl AgentBusyState {
    fn idle() -> Self {
        Self {
            busy: false,
            agent: None,
            status: String::new(),
        }
    }

    fn engaged(agent: AgentKind, status: &str) -> Self {
        Self {
            busy: true,
            agent: Some(agent),
            status: status.to_string(),
        }
    }
}

impl Default for AgentBusyState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Orchestrates one tutoring session.
///
/// Single-threaded and event-driven: operations suspend only at the
/// generation service boundary, and the busy flag makes "at most one open
/// generation" a property of the core rather than of any particular front
/// end — calls made while busy are rejected with
/// [`OrchestratorError::Busy`].
pub struct SessionOrchestrator {
    curriculum: CurriculumStore,
    log: ConversationLog,
    quiz: Option<QuizSession>,
    focused: Option<Uuid>,
    busy: AgentBusyState,
    generation: Arc<dyn GenerationService>,
    /// Optional channel for broadcasting busy-state changes to a front end.
    busy_tx: Option<mpsc::Sender<AgentBusyState>>,
}

impl SessionOrchestrator {
    pub fn new(
        generation: Arc<dyn GenerationService>,
        busy_tx: Option<mpsc::Sender<AgentBusyState>>,
    ) -> Self {
        Self {
            curriculum: CurriculumStore::new(),
            log: ConversationLog::new(),
            quiz: None,
            focused: None,
            busy: AgentBusyState::idle(),
            generation,
            busy_tx,
        }
    }

    pub fn curriculum(&self) -> &CurriculumStore {
        &self.curriculum
    }

    pub fn conversation(&self) -> &ConversationLog {
        &self.log
    }

    pub fn busy_state(&self) -> &AgentBusyState {
        &self.busy
    }

    pub fn focused_node(&self) -> Option<&LearningNode> {
        self.focused.and_then(|id| self.curriculum.get(id))
    }

    pub fn quiz(&self) -> Option<&QuizSession> {
        self.quiz.as_ref()
    }

    /// Handles a free-text user input: appends the user turn, then plans a
    /// curriculum if none exists yet, otherwise requests an explanation.
    pub async fn submit_user_text(&mut self, text: &str) -> Result<(), OrchestratorError> {
        self.ensure_idle()?;
        self.log.append(ConversationTurn::user(text));

        if self.curriculum.is_empty() {
            self.plan_flow(text).await;
        } else {
            let sub_topic = self
                .focused_node()
                .map(|n| n.title.clone())
                .unwrap_or_else(|| GENERAL_INQUIRY.to_string());
            self.explain_flow(text, &sub_topic).await;
        }
        Ok(())
    }

    /// Focuses a curriculum node and requests an explanation of it.
    /// Unknown ids are a logged no-op.
    pub async fn select_node(&mut self, node_id: Uuid) -> Result<(), OrchestratorError> {
        self.ensure_idle()?;
        let Some(node) = self.curriculum.get(node_id) else {
            warn!(%node_id, "node selection for unknown id ignored");
            return Ok(());
        };
        let title = node.title.clone();

        self.focused = Some(node_id);
        self.log
            .append(ConversationTurn::user(format!("Tell me about module: {title}")));
        self.explain_flow(&title, &title).await;
        Ok(())
    }

    /// Generates a quiz for the focused node from the most recent agent
    /// turn (falling back to the node's description), and marks the node
    /// completed on success. Returns whether a quiz session was started so
    /// the caller knows to open its quiz surface. With no focused node this
    /// is a logged no-op; on generation failure nothing changes and the
    /// user stays where they were.
    pub async fn request_quiz(&mut self) -> Result<bool, OrchestratorError> {
        self.ensure_idle()?;
        let Some(node) = self.focused_node() else {
            warn!("quiz requested with no focused node");
            return Ok(false);
        };
        let node_id = node.id;
        let source = self
            .log
            .last_agent_turn()
            .map(|t| t.content.clone())
            .unwrap_or_else(|| node.description.clone());

        self.engage(AgentKind::Examiner, "The examiner is crafting questions...")
            .await;
        let mut started = false;
        match self.generation.generate_quiz(&source).await {
            Ok(questions) => match QuizSession::new(questions) {
                Ok(session) => {
                    info!(total = session.total(), "quiz session started");
                    self.quiz = Some(session);
                    self.curriculum.mark_completed(node_id);
                    started = true;
                }
                Err(e) => error!(error = %e, "examiner returned an unusable quiz"),
            },
            Err(e) => error!(error = %e, "quiz generation failed"),
        }
        self.release().await;
        Ok(started)
    }

    // --- Quiz pass-throughs for the presentation layer ---

    pub fn quiz_select(&mut self, option_index: usize) -> Result<(), OrchestratorError> {
        self.active_quiz()?.select(option_index)?;
        Ok(())
    }

    pub fn quiz_submit(&mut self) -> Result<bool, OrchestratorError> {
        Ok(self.active_quiz()?.submit()?)
    }

    pub fn quiz_next(&mut self) -> Result<QuizState, OrchestratorError> {
        Ok(self.active_quiz()?.next()?)
    }

    /// Closes the quiz, discarding its question list. The machine is
    /// destroyed; a new quiz requires a new generation.
    pub fn close_quiz(&mut self) {
        self.quiz = None;
    }

    fn active_quiz(&mut self) -> Result<&mut QuizSession, OrchestratorError> {
        self.quiz
            .as_mut()
            .ok_or(OrchestratorError::Quiz(QuizError::InvalidState))
    }

    // --- Generation flows ---

    async fn plan_flow(&mut self, topic: &str) {
        self.engage(
            AgentKind::Planner,
            "The planner is designing your curriculum...",
        )
        .await;
        match self.generation.plan_curriculum(topic).await {
            Ok(modules) => {
                let nodes = modules
                    .into_iter()
                    .enumerate()
                    .map(|(i, m)| {
                        let status = if i == 0 {
                            NodeStatus::Active
                        } else {
                            NodeStatus::Pending
                        };
                        LearningNode::new(m.title, m.description, m.estimated_time, status)
                    })
                    .collect();
                self.curriculum.replace_all(nodes);
                info!(modules = self.curriculum.len(), "curriculum planned");
                self.log.append(ConversationTurn::agent(
                    format!(
                        "I've created a structured learning path for \"{topic}\". \
                         Select the first module to begin!"
                    ),
                    AgentKind::Planner,
                ));
            }
            Err(e) => {
                error!(error = %e, "curriculum planning failed");
                self.log.append(ConversationTurn::agent(
                    PLAN_FAILURE_MESSAGE,
                    AgentKind::Planner,
                ));
            }
        }
        self.release().await;
    }

    async fn explain_flow(&mut self, query: &str, sub_topic: &str) {
        // Defensive fallback: if the curriculum is still empty (e.g. the
        // first plan failed), the query itself stands in for the main topic.
        let topic = self
            .curriculum
            .main_topic()
            .unwrap_or(query)
            .to_string();
        let context = self.context_window();

        self.engage(AgentKind::Explainer, "The explainer is researching...")
            .await;
        match self.generation.explain(&topic, sub_topic, &context).await {
            Ok(explanation) => {
                self.log.append(
                    ConversationTurn::agent(explanation.text, AgentKind::Explainer)
                        .with_citations(explanation.citations),
                );
            }
            Err(e) => {
                error!(error = %e, "explanation failed");
                self.log.append(ConversationTurn::agent(
                    EXPLAIN_APOLOGY_MESSAGE,
                    AgentKind::Explainer,
                ));
            }
        }
        self.release().await;
    }

    /// Deterministic context assembly: the last [`CONTEXT_TURNS`] turns,
    /// oldest first, one `role: content` line per turn. Includes the turn
    /// just appended by the current operation.
    fn context_window(&self) -> String {
        self.log
            .recent_window(CONTEXT_TURNS)
            .iter()
            .map(|t| format!("{}: {}", t.role, t.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // --- Busy-state discipline ---

    fn ensure_idle(&self) -> Result<(), OrchestratorError> {
        if self.busy.busy {
            warn!("orchestration call rejected: generation already in flight");
            return Err(OrchestratorError::Busy);
        }
        Ok(())
    }

    async fn engage(&mut self, agent: AgentKind, status: &str) {
        self.busy = AgentBusyState::engaged(agent, status);
        self.broadcast_busy().await;
    }

    /// Clears the busy state. Every generation flow calls this on all exit
    /// paths, success and caught failure alike.
    async fn release(&mut self) {
        self.busy = AgentBusyState::idle();
        self.broadcast_busy().await;
    }

    async fn broadcast_busy(&self) {
        if let Some(tx) = &self.busy_tx {
            if tx.send(self.busy.clone()).await.is_err() {
                warn!("failed to broadcast busy state: receiver dropped");
            }
        }
    }
}
