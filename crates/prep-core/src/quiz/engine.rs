//! Quiz attempt state machine: `Answering` → `Submitted`.
//!
//! One engine per rendered practice set. Selections mutate only while
//! answering; the score is computed once at submission and then frozen.
//! `reset` is the only way back.

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::{PracticeSet, Question};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub correct: usize,
    pub incorrect: usize,
    pub total: usize,
}

impl Score {
    /// `round(correct / total × 100)`, or 0 for an empty set.
    pub fn percentage(&self) -> usize {
        if self.total == 0 {
            return 0;
        }
        (self.correct * 200 + self.total) / (self.total * 2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    Answering,
    Submitted(Score),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizError {
    AlreadySubmitted,
    UnknownQuestion(String),
    UnknownOption { question: String, option: String },
    NothingAnswered,
    NotSubmitted,
}

impl fmt::Display for QuizError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizError::AlreadySubmitted => {
                write!(f, "Answers are already submitted; reset to try again")
            }
            QuizError::UnknownQuestion(id) => write!(f, "No question {id}"),
            QuizError::UnknownOption { question, option } => {
                write!(f, "Question {question} has no option {option}")
            }
            QuizError::NothingAnswered => {
                write!(f, "Answer at least one question before submitting")
            }
            QuizError::NotSubmitted => write!(f, "Explanations unlock after submitting"),
        }
    }
}

impl std::error::Error for QuizError {}

#[derive(Debug, Clone)]
pub struct QuizEngine {
    set: PracticeSet,
    answers: HashMap<String, String>,
    phase: QuizPhase,
    revealed: HashSet<String>,
}

impl QuizEngine {
    pub fn new(set: PracticeSet) -> Self {
        Self {
            set,
            answers: HashMap::new(),
            phase: QuizPhase::Answering,
            revealed: HashSet::new(),
        }
    }

    pub fn set(&self) -> &PracticeSet {
        &self.set
    }

    pub fn phase(&self) -> QuizPhase {
        self.phase
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.phase, QuizPhase::Submitted(_))
    }

    /// Records `option_id` as the answer to `question_id`, replacing any
    /// earlier choice.
    pub fn select(&mut self, question_id: &str, option_id: &str) -> Result<(), QuizError> {
        if self.is_submitted() {
            return Err(QuizError::AlreadySubmitted);
        }
        let question = self.lookup(question_id)?;
        if question.option(option_id).is_none() {
            return Err(QuizError::UnknownOption {
                question: question_id.to_string(),
                option: option_id.to_string(),
            });
        }
        self.answers
            .insert(question_id.to_string(), option_id.to_string());
        Ok(())
    }

    /// Selects by position (zero-based question and option index) and
    /// returns the option id that was recorded.
    pub fn select_option_at(
        &mut self,
        question_index: usize,
        option_index: usize,
    ) -> Result<String, QuizError> {
        let question = self
            .set
            .questions
            .get(question_index)
            .ok_or_else(|| QuizError::UnknownQuestion((question_index + 1).to_string()))?;
        let option = question
            .options
            .get(option_index)
            .ok_or_else(|| QuizError::UnknownOption {
                question: question.id.clone(),
                option: super::option_letter(option_index),
            })?;
        let (question_id, option_id) = (question.id.clone(), option.id.clone());
        self.select(&question_id, &option_id)?;
        Ok(option_id)
    }

    pub fn answer(&self, question_id: &str) -> Option<&str> {
        self.answers.get(question_id).map(String::as_str)
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    /// Scores the attempt. Unanswered questions count as incorrect.
    pub fn submit(&mut self) -> Result<Score, QuizError> {
        if self.is_submitted() {
            return Err(QuizError::AlreadySubmitted);
        }
        if self.answers.is_empty() {
            return Err(QuizError::NothingAnswered);
        }

        let total = self.set.questions.len();
        let correct = self
            .set
            .questions
            .iter()
            .filter(|q| self.answer(&q.id).is_some_and(|a| q.is_correct(a)))
            .count();
        let score = Score {
            correct,
            incorrect: total - correct,
            total,
        };

        tracing::debug!(correct, total, "quiz submitted");
        self.phase = QuizPhase::Submitted(score);
        Ok(score)
    }

    pub fn score(&self) -> Option<Score> {
        match self.phase {
            QuizPhase::Submitted(score) => Some(score),
            QuizPhase::Answering => None,
        }
    }

    /// Whether the recorded answer is correct. `None` until submitted.
    pub fn verdict(&self, question_id: &str) -> Option<bool> {
        if !self.is_submitted() {
            return None;
        }
        let question = self.set.question(question_id)?;
        Some(
            self.answer(question_id)
                .is_some_and(|a| question.is_correct(a)),
        )
    }

    /// Flips explanation visibility for one question; returns the new state.
    pub fn toggle_explanation(&mut self, question_id: &str) -> Result<bool, QuizError> {
        if !self.is_submitted() {
            return Err(QuizError::NotSubmitted);
        }
        self.lookup(question_id)?;
        if self.revealed.remove(question_id) {
            Ok(false)
        } else {
            self.revealed.insert(question_id.to_string());
            Ok(true)
        }
    }

    pub fn explanation_visible(&self, question_id: &str) -> bool {
        self.revealed.contains(question_id)
    }

    /// Back to an empty `Answering` attempt.
    pub fn reset(&mut self) {
        self.answers.clear();
        self.revealed.clear();
        self.phase = QuizPhase::Answering;
    }

    fn lookup(&self, question_id: &str) -> Result<&Question, QuizError> {
        self.set
            .question(question_id)
            .ok_or_else(|| QuizError::UnknownQuestion(question_id.to_string()))
    }
}
