//! Quiz authoring
//!
//! All edits go through [`QuizEditor`] so that correct answers always point at
//! existing option texts and match the question kind's cardinality.

use crate::types::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("Question {0} does not exist")]
    NoSuchQuestion(usize),
    #[error("Question {question} has no option {option}")]
    NoSuchOption { question: usize, option: usize },
    #[error("\"{0}\" is not one of the question's options")]
    UnknownOption(String),
    #[error("Another option already reads \"{0}\"")]
    DuplicateOption(String),
    #[error("Two-answer questions allow at most two correct options")]
    TooManyAnswers,
    #[error("Quiz has no questions")]
    EmptyQuiz,
    #[error("Question {question} is not playable: {reason}")]
    NotPlayable { question: usize, reason: String },
}

pub struct QuizEditor {
    quiz: Quiz,
}

impl QuizEditor {
    pub fn new(quiz: Quiz) -> Self {
        Self { quiz }
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn quiz_mut(&mut self) -> &mut Quiz {
        &mut self.quiz
    }

    pub fn into_quiz(self) -> Quiz {
        self.quiz
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.quiz.title = title.into();
    }

    /// Append a blank single-choice question and return its index
    pub fn add_question(&mut self) -> usize {
        self.quiz.questions.push(Question::single(""));
        self.quiz.questions.len() - 1
    }

    pub fn delete_question(&mut self, index: usize) -> Result<Question, EditError> {
        self.question(index)?;
        Ok(self.quiz.questions.remove(index))
    }

    pub fn set_prompt(&mut self, index: usize, prompt: impl Into<String>) -> Result<(), EditError> {
        self.question_mut(index)?.prompt = prompt.into();
        Ok(())
    }

    pub fn set_time_limit(&mut self, index: usize, seconds: u32) -> Result<(), EditError> {
        self.question_mut(index)?.time_limit = seconds;
        Ok(())
    }

    pub fn set_points(&mut self, index: usize, points: u32) -> Result<(), EditError> {
        self.question_mut(index)?.points = points;
        Ok(())
    }

    /// Rename an option. Correct answers that referenced the old text follow the rename.
    pub fn edit_option(
        &mut self,
        index: usize,
        option: usize,
        text: impl Into<String>,
    ) -> Result<(), EditError> {
        let question = self.question_mut(index)?;
        let text = text.into();
        let taken = question
            .options
            .iter()
            .enumerate()
            .any(|(i, o)| i != option && *o == text);
        if taken {
            return Err(EditError::DuplicateOption(text));
        }

        let slot = question
            .options
            .get_mut(option)
            .ok_or(EditError::NoSuchOption {
                question: index,
                option,
            })?;

        let old = std::mem::replace(slot, text.clone());

        match &mut question.answer {
            CorrectAnswer::One(answer) => {
                if *answer == old {
                    *answer = text;
                }
            }
            CorrectAnswer::Many(answers) => {
                for answer in answers.iter_mut().filter(|a| **a == old) {
                    *answer = text.clone();
                }
            }
        }
        Ok(())
    }

    /// Switch a question's kind, resetting options and answer to fit it
    pub fn change_kind(&mut self, index: usize, kind: QuestionKind) -> Result<(), EditError> {
        let question = self.question_mut(index)?;
        question.kind = kind;

        match kind {
            QuestionKind::TrueFalse => {
                question.options = vec![TRUE_LABEL.to_string(), FALSE_LABEL.to_string()];
                question.answer = CorrectAnswer::One(TRUE_LABEL.to_string());
            }
            QuestionKind::Single => {
                if question.options.len() != MAX_OPTIONS {
                    question.options = default_option_labels();
                }
                question.answer = CorrectAnswer::One(question.options[0].clone());
            }
            QuestionKind::Multi => {
                if question.options.len() != MAX_OPTIONS {
                    question.options = default_option_labels();
                }
                question.answer = CorrectAnswer::Many(question.options[..2].to_vec());
            }
        }

        tracing::debug!("Question {} changed to {:?}", index, kind);
        Ok(())
    }

    /// Mark or unmark an option as correct.
    ///
    /// Single and true/false questions simply switch their answer. Two-answer
    /// questions toggle, refusing to drop the last answer or to exceed two.
    pub fn toggle_correct(&mut self, index: usize, option: &str) -> Result<(), EditError> {
        let question = self.question_mut(index)?;
        if !question.options.iter().any(|o| o == option) {
            return Err(EditError::UnknownOption(option.to_string()));
        }

        if question.kind != QuestionKind::Multi {
            question.answer = CorrectAnswer::One(option.to_string());
            return Ok(());
        }

        let mut answers = match &question.answer {
            CorrectAnswer::One(answer) => vec![answer.clone()],
            CorrectAnswer::Many(answers) => answers.clone(),
        };

        if answers.iter().any(|a| a == option) {
            if answers.len() > 1 {
                answers.retain(|a| a != option);
            }
        } else if answers.len() < QuestionKind::Multi.answer_count() {
            answers.push(option.to_string());
        } else {
            return Err(EditError::TooManyAnswers);
        }

        question.answer = CorrectAnswer::Many(answers);
        Ok(())
    }

    /// Check the quiz can be hosted as-is
    pub fn validate_for_play(&self) -> Result<(), EditError> {
        validate_for_play(&self.quiz)
    }

    fn question(&self, index: usize) -> Result<&Question, EditError> {
        self.quiz
            .questions
            .get(index)
            .ok_or(EditError::NoSuchQuestion(index))
    }

    fn question_mut(&mut self, index: usize) -> Result<&mut Question, EditError> {
        self.quiz
            .questions
            .get_mut(index)
            .ok_or(EditError::NoSuchQuestion(index))
    }
}

/// Check a quiz can be hosted: at least one question, and every answer consistent with its kind
pub fn validate_for_play(quiz: &Quiz) -> Result<(), EditError> {
    if quiz.questions.is_empty() {
        return Err(EditError::EmptyQuiz);
    }

    for (index, question) in quiz.questions.iter().enumerate() {
        let fail = |reason: &str| EditError::NotPlayable {
            question: index,
            reason: reason.to_string(),
        };

        if question.options.len() < 2 || question.options.len() > MAX_OPTIONS {
            return Err(fail("needs between two and four options"));
        }
        let distinct_options = question
            .options
            .iter()
            .enumerate()
            .all(|(i, o)| !question.options[..i].contains(o));
        if !distinct_options {
            return Err(fail("two options share the same text"));
        }
        if question.kind == QuestionKind::TrueFalse
            && (question.options[0] != TRUE_LABEL || question.options[1] != FALSE_LABEL)
        {
            return Err(fail("true/false options were modified"));
        }

        let shape_ok = matches!(
            (question.kind, &question.answer),
            (QuestionKind::Multi, CorrectAnswer::Many(_))
                | (QuestionKind::Single | QuestionKind::TrueFalse, CorrectAnswer::One(_))
        );
        if !shape_ok || question.answer.len() != question.kind.answer_count() {
            return Err(fail("wrong number of correct answers"));
        }
        let answers = question.answer.values();
        if answers.iter().any(|a| !question.options.iter().any(|o| o == a)) {
            return Err(fail("correct answer is not among the options"));
        }
        if answers
            .iter()
            .enumerate()
            .any(|(i, a)| answers[..i].contains(a))
        {
            return Err(fail("the same option is marked correct twice"));
        }
    }
    Ok(())
}
