// Completion contract: what each activity variant does with a learner's submission.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::activity::{Activity, ActivityKind, OpenEndedResponse, SurveyResponse};
use crate::error::DomainError;
use crate::identity::Username;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityStatus {
    #[default]
    Pending,
    Submitted,
    Completed,
    Failed,
}

impl ActivityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityStatus::Pending => "PENDING",
            ActivityStatus::Submitted => "SUBMITTED",
            ActivityStatus::Completed => "COMPLETED",
            ActivityStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ActivityStatus::Completed | ActivityStatus::Failed)
    }

    /// Completed or waiting for a grade: the learner has nothing left to do.
    pub fn is_done_by_learner(self) -> bool {
        matches!(self, ActivityStatus::Completed | ActivityStatus::Submitted)
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown activity status '{0}'")]
pub struct UnknownStatus(String);

impl FromStr for ActivityStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ActivityStatus::Pending),
            "submitted" => Ok(ActivityStatus::Submitted),
            "completed" => Ok(ActivityStatus::Completed),
            "failed" => Ok(ActivityStatus::Failed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// What a learner hands in for an activity.
#[derive(Debug, Clone)]
pub enum Submission {
    Acknowledge,
    HandIn(String),
    QuizAnswers(Vec<usize>),
    SurveyAnswers(Vec<String>),
    ExamAnswers(Vec<String>),
}

impl Submission {
    fn name(&self) -> &'static str {
        match self {
            Submission::Acknowledge => "acknowledgement",
            Submission::HandIn(_) => "hand-in",
            Submission::QuizAnswers(_) => "quiz answers",
            Submission::SurveyAnswers(_) => "survey answers",
            Submission::ExamAnswers(_) => "exam answers",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Survey(SurveyResponse),
    Exam(OpenEndedResponse),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: ActivityStatus,
    /// Set for quizzes only.
    pub score: Option<f64>,
    /// Set for surveys and open-ended exams; the caller stores it.
    pub response: Option<Response>,
}

impl Outcome {
    fn status(status: ActivityStatus) -> Self {
        Self {
            status,
            score: None,
            response: None,
        }
    }
}

impl Activity {
    /// Evaluates `submission` against this activity without touching any
    /// progress record.
    pub fn complete(&self, student: &Username, submission: Submission) -> Result<Outcome, DomainError> {
        match (self.kind(), submission) {
            (ActivityKind::ResourceReview { .. }, Submission::Acknowledge) => {
                Ok(Outcome::status(ActivityStatus::Completed))
            }
            (ActivityKind::Assignment { .. }, Submission::HandIn(_)) => {
                Ok(Outcome::status(ActivityStatus::Submitted))
            }
            (ActivityKind::Quiz(quiz), Submission::QuizAnswers(selected)) => {
                if quiz.questions().is_empty() {
                    return Ok(Outcome {
                        status: ActivityStatus::Completed,
                        score: Some(0.0),
                        response: None,
                    });
                }
                let score = quiz.score(&selected)?;
                let status = if quiz.passes(score) {
                    ActivityStatus::Completed
                } else {
                    ActivityStatus::Failed
                };
                Ok(Outcome {
                    status,
                    score: Some(score),
                    response: None,
                })
            }
            (ActivityKind::Survey(survey), Submission::SurveyAnswers(answers)) => {
                check_count(survey.questions().len(), answers.len())?;
                Ok(Outcome {
                    status: ActivityStatus::Completed,
                    score: None,
                    response: Some(Response::Survey(SurveyResponse {
                        student: student.clone(),
                        answers,
                    })),
                })
            }
            (ActivityKind::OpenEndedExam(exam), Submission::ExamAnswers(answers)) => {
                check_count(exam.questions().len(), answers.len())?;
                let answers = exam.questions().iter().cloned().zip(answers).collect();
                Ok(Outcome {
                    status: ActivityStatus::Submitted,
                    score: None,
                    response: Some(Response::Exam(OpenEndedResponse {
                        student: student.clone(),
                        answers,
                    })),
                })
            }
            (_, other) => Err(DomainError::SubmissionMismatch {
                expected: self.activity_type(),
                got: other.name(),
            }),
        }
    }
}

fn check_count(expected: usize, got: usize) -> Result<(), DomainError> {
    if expected != got {
        return Err(DomainError::AnswerCount { expected, got });
    }
    Ok(())
}
