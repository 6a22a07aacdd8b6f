//! Quiz session state machine.
//!
//! A pure state machine over a fixed list of multiple-choice questions:
//! answer selection, correctness scoring, and progression to a results
//! summary. The machine knows nothing about curricula or generation; the
//! orchestrator wires quiz completion back into the curriculum store.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every question carries exactly this many options.
pub const OPTIONS_PER_QUESTION: usize = 4;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("a quiz session needs at least one question")]
    EmptyQuiz,
    #[error("option index {0} is out of range")]
    OptionOutOfRange(usize),
    #[error("operation is not valid in the current quiz state")]
    InvalidState,
}

/// A single multiple-choice question. Immutable once generated.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub question: String,
    /// Exactly [`OPTIONS_PER_QUESTION`] answer options, validated at the
    /// generation boundary.
    pub options: Vec<String>,
    pub correct_option_index: usize,
    pub explanation: String,
}

/// Observable state of a quiz session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizState {
    InProgress { index: usize, answered: bool },
    Completed { score: usize, total: usize },
}

/// A replayable quiz run over a fixed question list.
///
/// The question set is frozen at construction; no reshuffling, no addition.
/// `reset` returns the machine to its initial state over the same questions.
#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<QuizQuestion>,
    index: usize,
    selection: Option<usize>,
    answered: bool,
    score: usize,
    completed: bool,
}

impl QuizSession {
    /// Creates a session over a non-empty question list. An empty list is
    /// rejected rather than producing a degenerate zero-question session.
    pub fn new(questions: Vec<QuizQuestion>) -> Result<Self, QuizError> {
        if questions.is_empty() {
            return Err(QuizError::EmptyQuiz);
        }
        Ok(Self {
            questions,
            index: 0,
            selection: None,
            answered: false,
            score: 0,
            completed: false,
        })
    }

    pub fn state(&self) -> QuizState {
        if self.completed {
            QuizState::Completed {
                score: self.score,
                total: self.questions.len(),
            }
        } else {
            QuizState::InProgress {
                index: self.index,
                answered: self.answered,
            }
        }
    }

    /// The question currently presented, or `None` after completion.
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        if self.completed {
            None
        } else {
            self.questions.get(self.index)
        }
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn selection(&self) -> Option<usize> {
        self.selection
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    /// Records a pending selection for the current question. Re-selecting
    /// before submit replaces the previous choice. Once the question has
    /// been answered the call is ignored (duplicate UI events are
    /// tolerated, not an error).
    pub fn select(&mut self, option_index: usize) -> Result<(), QuizError> {
        if self.completed {
            return Err(QuizError::InvalidState);
        }
        if option_index >= OPTIONS_PER_QUESTION {
            return Err(QuizError::OptionOutOfRange(option_index));
        }
        if !self.answered {
            self.selection = Some(option_index);
        }
        Ok(())
    }

    /// Scores the pending selection against the current question and
    /// freezes it. Returns whether the selection was correct.
    ///
    /// Calling `submit` with no pending selection, or after the question has
    /// already been answered, is rejected with `QuizError::InvalidState`
    /// (explicit rejection, never a silent no-op).
    pub fn submit(&mut self) -> Result<bool, QuizError> {
        if self.completed || self.answered {
            return Err(QuizError::InvalidState);
        }
        let selection = self.selection.ok_or(QuizError::InvalidState)?;
        let correct = selection == self.questions[self.index].correct_option_index;
        if correct {
            self.score += 1;
        }
        self.answered = true;
        Ok(correct)
    }

    /// Advances past an answered question. On the last question this
    /// transitions to `Completed`; afterwards further `next` calls are
    /// rejected with `QuizError::InvalidState`.
    pub fn next(&mut self) -> Result<QuizState, QuizError> {
        if self.completed || !self.answered {
            return Err(QuizError::InvalidState);
        }
        if self.index + 1 == self.questions.len() {
            self.completed = true;
        } else {
            self.index += 1;
            self.selection = None;
            self.answered = false;
        }
        Ok(self.state())
    }

    /// Returns to the initial state over the same question list, from any
    /// state. The caller decides whether to discard the session entirely.
    pub fn reset(&mut self) {
        self.index = 0;
        self.selection = None;
        self.answered = false;
        self.score = 0;
        self.completed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: usize) -> QuizQuestion {
        QuizQuestion {
            id: Uuid::new_v4(),
            question: "Which option is correct?".to_string(),
            options: vec![
                "Option A".to_string(),
                "Option B".to_string(),
                "Option C".to_string(),
                "Option D".to_string(),
            ],
            correct_option_index: correct,
            explanation: "Because it is.".to_string(),
        }
    }

    fn session(corrects: &[usize]) -> QuizSession {
        QuizSession::new(corrects.iter().map(|&c| question(c)).collect()).unwrap()
    }

    #[test]
    fn test_empty_question_list_rejected() {
        assert_eq!(QuizSession::new(vec![]).unwrap_err(), QuizError::EmptyQuiz);
    }

    #[test]
    fn test_initial_state() {
        let quiz = session(&[0, 1]);
        assert_eq!(
            quiz.state(),
            QuizState::InProgress {
                index: 0,
                answered: false
            }
        );
        assert_eq!(quiz.selection(), None);
        assert_eq!(quiz.score(), 0);
    }

    #[test]
    fn test_reselection_before_submit_wins() {
        let mut quiz = session(&[2]);
        quiz.select(0).unwrap();
        quiz.select(2).unwrap();
        assert!(quiz.submit().unwrap());
        assert_eq!(quiz.score(), 1);
    }

    #[test]
    fn test_select_after_answer_is_ignored() {
        let mut quiz = session(&[1]);
        quiz.select(1).unwrap();
        quiz.submit().unwrap();
        quiz.select(3).unwrap();
        assert_eq!(quiz.selection(), Some(1));
    }

    #[test]
    fn test_select_out_of_range() {
        let mut quiz = session(&[0]);
        assert_eq!(
            quiz.select(4).unwrap_err(),
            QuizError::OptionOutOfRange(4)
        );
    }

    #[test]
    fn test_submit_without_selection_rejected() {
        let mut quiz = session(&[0]);
        assert_eq!(quiz.submit().unwrap_err(), QuizError::InvalidState);
    }

    #[test]
    fn test_double_submit_rejected_and_score_frozen() {
        let mut quiz = session(&[0]);
        quiz.select(0).unwrap();
        assert!(quiz.submit().unwrap());
        assert_eq!(quiz.submit().unwrap_err(), QuizError::InvalidState);
        assert_eq!(quiz.score(), 1);
    }

    #[test]
    fn test_next_requires_answer() {
        let mut quiz = session(&[0, 1]);
        assert_eq!(quiz.next().unwrap_err(), QuizError::InvalidState);
        quiz.select(0).unwrap();
        assert_eq!(quiz.next().unwrap_err(), QuizError::InvalidState);
    }

    #[test]
    fn test_next_advances_and_clears() {
        let mut quiz = session(&[0, 1]);
        quiz.select(0).unwrap();
        quiz.submit().unwrap();
        let state = quiz.next().unwrap();
        assert_eq!(
            state,
            QuizState::InProgress {
                index: 1,
                answered: false
            }
        );
        assert_eq!(quiz.selection(), None);
    }

    #[test]
    fn test_completion_on_last_question() {
        let mut quiz = session(&[0, 3, 2]);

        quiz.select(0).unwrap(); // correct
        quiz.submit().unwrap();
        quiz.next().unwrap();

        quiz.select(1).unwrap(); // wrong
        quiz.submit().unwrap();
        quiz.next().unwrap();

        quiz.select(2).unwrap(); // correct
        quiz.submit().unwrap();
        let state = quiz.next().unwrap();

        assert_eq!(state, QuizState::Completed { score: 2, total: 3 });
        assert!(quiz.current_question().is_none());
    }

    #[test]
    fn test_next_after_completion_rejected() {
        let mut quiz = session(&[0]);
        quiz.select(0).unwrap();
        quiz.submit().unwrap();
        quiz.next().unwrap();
        assert_eq!(quiz.next().unwrap_err(), QuizError::InvalidState);
    }

    #[test]
    fn test_score_never_exceeds_questions_answered() {
        let mut quiz = session(&[0, 0, 0, 0]);
        let mut answered = 0;
        for pick in [0usize, 1, 0, 2] {
            quiz.select(pick).unwrap();
            let before = quiz.score();
            quiz.submit().unwrap();
            answered += 1;
            assert!(quiz.score() >= before);
            assert!(quiz.score() <= answered);
            quiz.next().unwrap();
        }
        assert_eq!(quiz.state(), QuizState::Completed { score: 2, total: 4 });
    }

    #[test]
    fn test_reset_returns_to_initial_state() {
        let mut quiz = session(&[0, 1]);
        quiz.select(0).unwrap();
        quiz.submit().unwrap();
        quiz.next().unwrap();

        quiz.reset();
        assert_eq!(
            quiz.state(),
            QuizState::InProgress {
                index: 0,
                answered: false
            }
        );
        assert_eq!(quiz.score(), 0);
        assert_eq!(quiz.total(), 2);
    }
}
