use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::DomainError;
use crate::identity::{ActivityKey, Username};

pub const OPTIONS_PER_QUESTION: usize = 4;

/// Stable tag of an activity variant.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    ResourceReview,
    Assignment,
    Quiz,
    Survey,
    OpenEndedExam,
}

impl ActivityType {
    pub fn label(self) -> &'static str {
        match self {
            ActivityType::ResourceReview => "Resource Review",
            ActivityType::Assignment => "Assignment",
            ActivityType::Quiz => "Quiz",
            ActivityType::Survey => "Survey",
            ActivityType::OpenEndedExam => "Open-Ended Exam",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fields shared by every variant, as supplied by the author.
#[derive(Debug, Clone)]
pub struct ActivityDetails {
    pub title: String,
    pub description: String,
    pub objective: String,
    pub difficulty_level: i32,
    pub expected_duration: u32,
    pub is_mandatory: bool,
}

impl ActivityDetails {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        objective: impl Into<String>,
        difficulty_level: i32,
        expected_duration: u32,
        is_mandatory: bool,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            objective: objective.into(),
            difficulty_level,
            expected_duration,
            is_mandatory,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Question {
    pub text: String,
    pub options: [String; OPTIONS_PER_QUESTION],
    pub correct_option: usize,
    pub explanation: String,
}

impl Question {
    pub fn new(
        text: impl Into<String>,
        options: [String; OPTIONS_PER_QUESTION],
        correct_option: usize,
        explanation: impl Into<String>,
    ) -> Result<Self, DomainError> {
        if correct_option >= OPTIONS_PER_QUESTION {
            return Err(DomainError::InvalidOption(correct_option));
        }
        Ok(Self {
            text: text.into(),
            options,
            correct_option,
            explanation: explanation.into(),
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Quiz {
    questions: Vec<Question>,
    passing_score: f64,
}

impl Quiz {
    pub fn new(questions: Vec<Question>, passing_score: f64) -> Result<Self, DomainError> {
        let quiz = Self {
            questions,
            passing_score,
        };
        quiz.check()?;
        Ok(quiz)
    }

    fn check(&self) -> Result<(), DomainError> {
        if self.questions.is_empty() {
            return Err(DomainError::EmptyQuiz);
        }
        if !(0.0..=100.0).contains(&self.passing_score) {
            return Err(DomainError::InvalidPassingScore(self.passing_score));
        }
        match self
            .questions
            .iter()
            .find(|q| q.correct_option >= OPTIONS_PER_QUESTION)
        {
            Some(q) => Err(DomainError::InvalidOption(q.correct_option)),
            None => Ok(()),
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn passing_score(&self) -> f64 {
        self.passing_score
    }

    /// Percentage of `selected` options matching the correct index, position by
    /// position. A quiz without questions scores 0.
    pub fn score(&self, selected: &[usize]) -> Result<f64, DomainError> {
        if selected.len() != self.questions.len() {
            return Err(DomainError::AnswerCount {
                expected: self.questions.len(),
                got: selected.len(),
            });
        }
        if self.questions.is_empty() {
            return Ok(0.0);
        }
        let correct = self
            .questions
            .iter()
            .zip(selected)
            .filter(|(q, choice)| q.correct_option == **choice)
            .count();
        Ok(correct as f64 / self.questions.len() as f64 * 100.0)
    }

    pub fn passes(&self, score: f64) -> bool {
        score >= self.passing_score
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SurveyResponse {
    pub student: Username,
    pub answers: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Survey {
    questions: Vec<String>,
    #[serde(default)]
    responses: Vec<SurveyResponse>,
}

impl Survey {
    pub fn new(questions: Vec<String>) -> Self {
        Self {
            questions,
            responses: Vec::new(),
        }
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn responses(&self) -> &[SurveyResponse] {
        &self.responses
    }

    pub fn add_response(&mut self, response: SurveyResponse) {
        self.responses.push(response);
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OpenEndedResponse {
    pub student: Username,
    /// question text -> answer
    pub answers: HashMap<String, String>,
}

impl OpenEndedResponse {
    pub fn answer_to(&self, question: &str) -> Option<&str> {
        self.answers.get(question).map(String::as_str)
    }
}

/// Question texts are unique; they key every [`OpenEndedResponse`].
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct OpenEndedExam {
    questions: Vec<String>,
    #[serde(default)]
    responses: Vec<OpenEndedResponse>,
}

impl OpenEndedExam {
    pub fn new(questions: Vec<String>) -> Result<Self, DomainError> {
        let exam = Self {
            questions,
            responses: Vec::new(),
        };
        exam.check()?;
        Ok(exam)
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn add_question(&mut self, text: impl Into<String>) -> Result<(), DomainError> {
        let text = text.into();
        if self.questions.contains(&text) {
            return Err(DomainError::DuplicateQuestion(text));
        }
        self.questions.push(text);
        Ok(())
    }

    fn check(&self) -> Result<(), DomainError> {
        let mut seen = HashSet::new();
        match self.questions.iter().find(|q| !seen.insert(*q)) {
            Some(dup) => Err(DomainError::DuplicateQuestion(dup.clone())),
            None => Ok(()),
        }
    }

    pub fn responses(&self) -> &[OpenEndedResponse] {
        &self.responses
    }

    pub fn add_response(&mut self, response: OpenEndedResponse) {
        self.responses.push(response);
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityKind {
    ResourceReview { resource_link: String },
    Assignment { submission_instructions: String },
    Quiz(Quiz),
    Survey(Survey),
    OpenEndedExam(OpenEndedExam),
}

impl ActivityKind {
    pub fn resource_review(link: impl Into<String>) -> Self {
        ActivityKind::ResourceReview {
            resource_link: link.into(),
        }
    }

    pub fn assignment(instructions: impl Into<String>) -> Self {
        ActivityKind::Assignment {
            submission_instructions: instructions.into(),
        }
    }

    fn check(&self) -> Result<(), DomainError> {
        match self {
            ActivityKind::Quiz(quiz) => quiz.check(),
            ActivityKind::OpenEndedExam(exam) => exam.check(),
            ActivityKind::ResourceReview { .. } | ActivityKind::Assignment { .. } | ActivityKind::Survey(_) => {
                Ok(())
            }
        }
    }

    pub fn activity_type(&self) -> ActivityType {
        match self {
            ActivityKind::ResourceReview { .. } => ActivityType::ResourceReview,
            ActivityKind::Assignment { .. } => ActivityType::Assignment,
            ActivityKind::Quiz(_) => ActivityType::Quiz,
            ActivityKind::Survey(_) => ActivityType::Survey,
            ActivityKind::OpenEndedExam(_) => ActivityType::OpenEndedExam,
        }
    }
}

/// One unit of learner work.
///
/// Equality and hashing look only at (title, description); see
/// [`crate::identity`]. Deserialization runs the same checks as
/// [`Activity::new`].
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(try_from = "RawActivity")]
pub struct Activity {
    title: String,
    description: String,
    objective: String,
    difficulty_level: u8,
    expected_duration: u32,
    is_mandatory: bool,
    #[serde(default)]
    deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    prerequisites: Vec<ActivityKey>,
    kind: ActivityKind,
}

impl Activity {
    pub fn new(details: ActivityDetails, kind: ActivityKind) -> Result<Self, DomainError> {
        let difficulty_level = difficulty(details.difficulty_level)?;
        if details.expected_duration == 0 {
            return Err(DomainError::InvalidDuration);
        }
        // Quiz and exam bodies can arrive through deserialization
        kind.check()?;
        Ok(Self {
            title: details.title,
            description: details.description,
            objective: details.objective,
            difficulty_level,
            expected_duration: details.expected_duration,
            is_mandatory: details.is_mandatory,
            deadline: None,
            prerequisites: Vec::new(),
            kind,
        })
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_prerequisites(mut self, prerequisites: Vec<ActivityKey>) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    pub fn key(&self) -> ActivityKey {
        ActivityKey::new(self.title.clone(), self.description.clone())
    }

    pub fn has_key(&self, key: &ActivityKey) -> bool {
        self.title == key.title && self.description == key.description
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn difficulty_level(&self) -> u8 {
        self.difficulty_level
    }

    pub fn expected_duration(&self) -> u32 {
        self.expected_duration
    }

    pub fn is_mandatory(&self) -> bool {
        self.is_mandatory
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn prerequisites(&self) -> &[ActivityKey] {
        &self.prerequisites
    }

    pub fn kind(&self) -> &ActivityKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut ActivityKind {
        &mut self.kind
    }

    pub fn activity_type(&self) -> ActivityType {
        self.kind.activity_type()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|d| now > d)
    }
}

#[derive(Deserialize)]
struct RawActivity {
    title: String,
    description: String,
    objective: String,
    difficulty_level: i32,
    expected_duration: u32,
    is_mandatory: bool,
    #[serde(default)]
    deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    prerequisites: Vec<ActivityKey>,
    kind: ActivityKind,
}

impl TryFrom<RawActivity> for Activity {
    type Error = DomainError;

    fn try_from(raw: RawActivity) -> Result<Self, Self::Error> {
        let details = ActivityDetails::new(
            raw.title,
            raw.description,
            raw.objective,
            raw.difficulty_level,
            raw.expected_duration,
            raw.is_mandatory,
        );
        let mut activity = Activity::new(details, raw.kind)?.with_prerequisites(raw.prerequisites);
        activity.deadline = raw.deadline;
        Ok(activity)
    }
}

impl PartialEq for Activity {
    fn eq(&self, other: &Self) -> bool {
        self.title == other.title && self.description == other.description
    }
}

impl Eq for Activity {}

impl Hash for Activity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.title.hash(state);
        self.description.hash(state);
    }
}

/// Validates a 1..=5 difficulty level.
pub(crate) fn difficulty(level: i32) -> Result<u8, DomainError> {
    match u8::try_from(level) {
        Ok(l @ 1..=5) => Ok(l),
        _ => Err(DomainError::InvalidDifficulty(level)),
    }
}
