//! Generation service boundary.
//!
//! The three capability endpoints the core calls out to: plan a curriculum,
//! explain a subtopic with optional grounding citations, generate a quiz
//! from source text. The trait is the sole system boundary; model choice,
//! prompt text and response-schema enforcement live behind it.

use crate::conversation::Citation;
use crate::quiz::{OPTIONS_PER_QUESTION, QuizQuestion};
use anyhow::Error as AnyError;
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

/// Conversation context passed to the explainer is clipped to this many
/// characters for request sizing.
pub const CONTEXT_WINDOW_CLIP: usize = 500;
/// Source text passed to the examiner is clipped to this many characters.
pub const QUIZ_SOURCE_CLIP: usize = 3000;

/// Any failure from the generation service. The orchestrator does not
/// distinguish subtypes; all of them trigger the same soft-failure handling.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(#[from] AnyError),
    #[error("generation service returned a malformed response: {0}")]
    Malformed(String),
}

/// One module of a planned curriculum, before it becomes a `LearningNode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedModule {
    pub title: String,
    pub description: String,
    pub estimated_time: String,
}

/// An explanation with optional grounding citations.
#[derive(Debug, Clone)]
pub struct Explanation {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Defines the contract for the external generation collaborator.
///
/// All three capabilities are asynchronous and may fail with a generic
/// [`GenerationError`]; empty or malformed results count as failures, so a
/// successful plan has at least one module and a successful quiz has at
/// least one well-formed question.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Breaks a free-text topic into an ordered list of learnable modules.
    async fn plan_curriculum(&self, topic: &str) -> Result<Vec<PlannedModule>, GenerationError>;

    /// Explains `sub_topic` within the broader context of `topic`, given a
    /// bounded conversation context window.
    async fn explain(
        &self,
        topic: &str,
        sub_topic: &str,
        context_window: &str,
    ) -> Result<Explanation, GenerationError>;

    /// Generates multiple-choice questions based strictly on `source_text`.
    async fn generate_quiz(&self, source_text: &str) -> Result<Vec<QuizQuestion>, GenerationError>;
}

// --- LLM-backed implementation ---

const PLANNER_SYSTEM: &str = "You are a helpful and precise educational planner.";
const EXPLAINER_SYSTEM: &str =
    "You are an enthusiastic STEM professor. You love connecting theory to the real world.";
const EXAMINER_SYSTEM: &str =
    "You are a rigorous examiner who writes fair, understanding-focused quiz questions.";

const PLANNER_TEMPERATURE: f32 = 0.4;
const EXPLAINER_TEMPERATURE: f32 = 0.7;
const EXAMINER_TEMPERATURE: f32 = 0.3;

/// An implementation of [`GenerationService`] for any OpenAI-compatible API
/// (OpenAI proper, or Gemini's compatibility endpoint).
pub struct LlmGenerationService {
    client: Client<OpenAIConfig>,
    model: String,
}

impl LlmGenerationService {
    /// Creates a new service over an OpenAI-compatible endpoint.
    ///
    /// # Arguments
    ///
    /// * `config` - API configuration including key and base URL.
    /// * `model` - Model identifier for chat completions (e.g. "gemini-2.5-flash").
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }

    /// Makes a single JSON-mode chat completion call and returns the raw
    /// response content.
    async fn complete_json(
        &self,
        system: &str,
        user: String,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(temperature)
            .response_format(ResponseFormat::JsonObject)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| GenerationError::Request(e.into()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user)
                    .build()
                    .map_err(|e| GenerationError::Request(e.into()))?
                    .into(),
            ])
            .build()
            .map_err(|e| GenerationError::Request(e.into()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| GenerationError::Request(e.into()))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| GenerationError::Malformed("completion had no content".to_string()))
    }
}

#[async_trait]
impl GenerationService for LlmGenerationService {
    async fn plan_curriculum(&self, topic: &str) -> Result<Vec<PlannedModule>, GenerationError> {
        debug!(%topic, "requesting curriculum plan");
        let prompt = format!(
            "You are an expert curriculum architect designed to help students learn STEM topics. \
             Create a structured learning path for the topic: \"{topic}\". \
             Break it down into 4-6 logical, sequential sub-modules suitable for a beginner to \
             intermediate learner. \
             Respond with a JSON object of the form \
             {{\"modules\": [{{\"title\": \"concise title of the sub-topic\", \
             \"description\": \"brief description of what will be learned\", \
             \"estimatedTime\": \"estimated time to read/learn, e.g. '5 mins'\"}}]}}."
        );
        let raw = self
            .complete_json(PLANNER_SYSTEM, prompt, PLANNER_TEMPERATURE)
            .await?;
        parse_plan(&raw)
    }

    async fn explain(
        &self,
        topic: &str,
        sub_topic: &str,
        context_window: &str,
    ) -> Result<Explanation, GenerationError> {
        debug!(%topic, %sub_topic, "requesting explanation");
        let prompt = format!(
            "Explain the concept of \"{sub_topic}\" within the broader context of \"{topic}\".\n\n\
             Guidelines:\n\
             1. Start with a clear, simple definition.\n\
             2. Provide a real-world application or recent scientific development related to this.\n\
             3. Use analogies where possible.\n\
             4. Keep it engaging and educational.\n\n\
             Previous conversation context: {context}...\n\n\
             Respond with a JSON object of the form \
             {{\"text\": \"the explanation\", \
             \"citations\": [{{\"title\": \"source title\", \"uri\": \"source url\"}}]}} \
             where citations list any sources you drew on (the list may be empty).",
            context = clip(context_window, CONTEXT_WINDOW_CLIP),
        );
        let raw = self
            .complete_json(EXPLAINER_SYSTEM, prompt, EXPLAINER_TEMPERATURE)
            .await?;
        Ok(parse_explanation(&raw))
    }

    async fn generate_quiz(&self, source_text: &str) -> Result<Vec<QuizQuestion>, GenerationError> {
        debug!(source_len = source_text.len(), "requesting quiz");
        let prompt = format!(
            "Generate 3 multiple-choice quiz questions based strictly on the following content:\n\n\
             \"{source}\"\n\n\
             The questions should test understanding, not just recall. \
             Respond with a JSON object of the form \
             {{\"questions\": [{{\"question\": \"...\", \
             \"options\": [\"exactly 4 possible answers\"], \
             \"correctOptionIndex\": 0, \
             \"explanation\": \"why the correct answer is correct\"}}]}}.",
            source = clip(source_text, QUIZ_SOURCE_CLIP),
        );
        let raw = self
            .complete_json(EXAMINER_SYSTEM, prompt, EXAMINER_TEMPERATURE)
            .await?;
        parse_quiz(&raw)
    }
}

// --- Response parsing and validation ---

#[derive(Deserialize)]
struct PlanResponse {
    modules: Vec<PlannedModuleWire>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlannedModuleWire {
    title: String,
    description: String,
    estimated_time: String,
}

#[derive(Deserialize)]
struct ExplainResponse {
    text: String,
    #[serde(default)]
    citations: Vec<Citation>,
}

#[derive(Deserialize)]
struct QuizResponse {
    questions: Vec<QuizQuestionWire>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizQuestionWire {
    question: String,
    options: Vec<String>,
    correct_option_index: usize,
    explanation: String,
}

fn parse_plan(raw: &str) -> Result<Vec<PlannedModule>, GenerationError> {
    let response: PlanResponse = serde_json::from_str(raw)
        .map_err(|e| GenerationError::Malformed(format!("plan was not valid JSON: {e}")))?;
    if response.modules.is_empty() {
        return Err(GenerationError::Malformed(
            "planner returned no modules".to_string(),
        ));
    }
    Ok(response
        .modules
        .into_iter()
        .map(|m| PlannedModule {
            title: m.title,
            description: m.description,
            estimated_time: m.estimated_time,
        })
        .collect())
}

/// Explanations tolerate non-JSON output: a plain-text completion is taken
/// verbatim with no citations rather than being treated as a failure.
fn parse_explanation(raw: &str) -> Explanation {
    match serde_json::from_str::<ExplainResponse>(raw) {
        Ok(response) => Explanation {
            text: response.text,
            citations: response.citations,
        },
        Err(_) => Explanation {
            text: raw.to_string(),
            citations: Vec::new(),
        },
    }
}

fn parse_quiz(raw: &str) -> Result<Vec<QuizQuestion>, GenerationError> {
    let response: QuizResponse = serde_json::from_str(raw)
        .map_err(|e| GenerationError::Malformed(format!("quiz was not valid JSON: {e}")))?;
    if response.questions.is_empty() {
        return Err(GenerationError::Malformed(
            "examiner returned no questions".to_string(),
        ));
    }
    response
        .questions
        .into_iter()
        .map(|q| {
            if q.options.len() != OPTIONS_PER_QUESTION {
                return Err(GenerationError::Malformed(format!(
                    "question has {} options, expected {}",
                    q.options.len(),
                    OPTIONS_PER_QUESTION
                )));
            }
            if q.correct_option_index >= OPTIONS_PER_QUESTION {
                return Err(GenerationError::Malformed(format!(
                    "correct option index {} is out of range",
                    q.correct_option_index
                )));
            }
            Ok(QuizQuestion {
                id: Uuid::new_v4(),
                question: q.question,
                options: q.options,
                correct_option_index: q.correct_option_index,
                explanation: q.explanation,
            })
        })
        .collect()
}

/// Clips `text` to at most `max` characters, respecting UTF-8 boundaries.
fn clip(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_valid() {
        let raw = r#"{"modules": [
            {"title": "Wave-Particle Duality", "description": "Light as wave and particle", "estimatedTime": "10 mins"},
            {"title": "The Uncertainty Principle", "description": "Limits of simultaneous measurement", "estimatedTime": "5 mins"}
        ]}"#;
        let modules = parse_plan(raw).unwrap();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].title, "Wave-Particle Duality");
        assert_eq!(modules[1].estimated_time, "5 mins");
    }

    #[test]
    fn test_parse_plan_empty_is_failure() {
        let err = parse_plan(r#"{"modules": []}"#).unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)));
    }

    #[test]
    fn test_parse_plan_bad_json_is_failure() {
        let err = parse_plan("here are some modules!").unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)));
    }

    #[test]
    fn test_parse_explanation_with_citations() {
        let raw = r#"{"text": "Entanglement links particle states.",
                      "citations": [{"title": "Nature", "uri": "https://example.com"}]}"#;
        let explanation = parse_explanation(raw);
        assert_eq!(explanation.text, "Entanglement links particle states.");
        assert_eq!(explanation.citations.len(), 1);
    }

    #[test]
    fn test_parse_explanation_plain_text_fallback() {
        let explanation = parse_explanation("Just a plain answer.");
        assert_eq!(explanation.text, "Just a plain answer.");
        assert!(explanation.citations.is_empty());
    }

    #[test]
    fn test_parse_quiz_valid() {
        let raw = r#"{"questions": [{
            "question": "What is superposition?",
            "options": ["A", "B", "C", "D"],
            "correctOptionIndex": 2,
            "explanation": "Because C."
        }]}"#;
        let questions = parse_quiz(raw).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].correct_option_index, 2);
        assert_eq!(questions[0].options.len(), OPTIONS_PER_QUESTION);
    }

    #[test]
    fn test_parse_quiz_wrong_option_count() {
        let raw = r#"{"questions": [{
            "question": "Q", "options": ["A", "B"],
            "correctOptionIndex": 0, "explanation": "E"
        }]}"#;
        assert!(matches!(
            parse_quiz(raw).unwrap_err(),
            GenerationError::Malformed(_)
        ));
    }

    #[test]
    fn test_parse_quiz_index_out_of_range() {
        let raw = r#"{"questions": [{
            "question": "Q", "options": ["A", "B", "C", "D"],
            "correctOptionIndex": 4, "explanation": "E"
        }]}"#;
        assert!(matches!(
            parse_quiz(raw).unwrap_err(),
            GenerationError::Malformed(_)
        ));
    }

    #[test]
    fn test_parse_quiz_empty_is_failure() {
        assert!(matches!(
            parse_quiz(r#"{"questions": []}"#).unwrap_err(),
            GenerationError::Malformed(_)
        ));
    }

    #[test]
    fn test_clip_short_text_untouched() {
        assert_eq!(clip("short", 500), "short");
    }

    #[test]
    fn test_clip_counts_chars_not_bytes() {
        let text = "é".repeat(10);
        let clipped = clip(&text, 4);
        assert_eq!(clipped.chars().count(), 4);
        assert_eq!(clipped, "éééé");
    }

    #[test]
    fn test_clip_exact_boundary() {
        let text = "abcd";
        assert_eq!(clip(text, 4), "abcd");
        assert_eq!(clip(text, 3), "abc");
    }
}
