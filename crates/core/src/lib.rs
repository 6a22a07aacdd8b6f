//! mentor-core: orchestration core for the mentor tutoring assistant.
//!
//! The core turns a free-text topic into a generated curriculum, produces
//! on-demand explanations of curriculum items, and runs auto-graded
//! multiple-choice quizzes derived from the most recent explanation. All
//! model access goes through the [`generation::GenerationService`] trait;
//! the core itself never touches the network.

pub mod conversation;
pub mod curriculum;
pub mod generation;
pub mod orchestrator;
pub mod quiz;
