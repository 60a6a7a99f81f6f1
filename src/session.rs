//! Orchestration over the three collections.
//!
//! A [`Session`] is handed out by [`Workspace::login`] and passed to every
//! operation that acts on behalf of a user. Every successful mutation is
//! followed immediately by a save of the collection(s) it touched. Saves are
//! not transactional: a failure between two saves leaves the files out of
//! step with each other.
//!
//! The workspace assumes a single writer. Check-then-insert sequences
//! (username registration, enrollment, survey and exam responses) are two
//! separate steps and are only safe because nothing else mutates the
//! collections in between.

use thiserror::Error;

use crate::activity::{Activity, ActivityKind, ActivityType, OpenEndedResponse, SurveyResponse};
use crate::db::{Collection, Store, StoreError};
use crate::error::DomainError;
use crate::identity::{ActivityKey, EntityKey, PathKey, Username};
use crate::learning_path::LearningPath;
use crate::models::{Role, User};
use crate::progress::Progress;
use crate::runtime::{ActivityStatus, Outcome, Response, Submission};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("{0} may not {1}")]
    Forbidden(Username, &'static str),
    #[error("{0} has already been answered")]
    AlreadyResponded(EntityKey),
    #[error("{0} is already {1}")]
    AlreadyDone(EntityKey, ActivityStatus),
    #[error("{0} is not awaiting a grade")]
    NotGradable(EntityKey),
}

/// Who is acting. Only [`Workspace::login`] creates one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    username: Username,
    role: Role,
}

impl Session {
    pub fn username(&self) -> &Username {
        &self.username
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    pub learning_path: PathKey,
    pub percentage: f64,
    pub complete: bool,
}

pub struct Workspace {
    store: Store,
    users: Vec<User>,
    learning_paths: Vec<LearningPath>,
    progresses: Vec<Progress>,
}

impl Workspace {
    pub async fn open(store: Store) -> Result<Self, StoreError> {
        let users = store.load(Collection::Users).await?;
        let learning_paths = store.load(Collection::LearningPaths).await?;
        let progresses = store.load(Collection::Progresses).await?;
        let ws = Self {
            store,
            users,
            learning_paths,
            progresses,
        };
        tracing::info!(
            users = ws.users.len(),
            learning_paths = ws.learning_paths.len(),
            progresses = ws.progresses.len(),
            "workspace loaded"
        );
        Ok(ws)
    }

    // --- accounts ---

    pub async fn register(
        &mut self,
        username: &str,
        password: &str,
        confirm: &str,
        name: &str,
        role: Role,
    ) -> Result<(), SessionError> {
        let username = Username::new(username);
        if self.user(&username).is_some() {
            return Err(DomainError::Conflict(EntityKey::User(username)).into());
        }
        if password != confirm {
            return Err(SessionError::PasswordMismatch);
        }
        tracing::info!(user = %username, %role, "registered");
        self.users.push(User::new(username, password, name, role));
        self.persist(Collection::Users).await
    }

    pub fn login(&self, username: &str, password: &str) -> Result<Session, SessionError> {
        let user = self
            .user(&Username::new(username))
            .filter(|u| u.authenticate(password))
            .ok_or_else(|| {
                tracing::warn!(user = %username, "login rejected");
                SessionError::InvalidCredentials
            })?;
        Ok(Session {
            username: user.username.clone(),
            role: user.role,
        })
    }

    // --- authoring ---

    pub async fn create_learning_path(
        &mut self,
        session: &Session,
        title: &str,
        description: &str,
        objectives: &str,
        difficulty_level: i32,
    ) -> Result<PathKey, SessionError> {
        require(session, Role::Teacher, "create learning paths")?;
        let key = PathKey::new(title);
        if self.learning_path(&key).is_some() {
            return Err(DomainError::Conflict(EntityKey::LearningPath(key)).into());
        }
        let lp = LearningPath::new(title, description, objectives, difficulty_level, session.username.clone())?;
        tracing::info!(path = %key, creator = %session.username, "learning path created");
        self.learning_paths.push(lp);
        self.persist(Collection::LearningPaths).await?;
        Ok(key)
    }

    pub async fn add_activity(
        &mut self,
        session: &Session,
        path: &PathKey,
        activity: Activity,
    ) -> Result<(), SessionError> {
        let li = self.owned_path_index(session, path, "edit this learning path")?;
        let key = activity.key();
        self.learning_paths[li].add_activity(activity).inspect_err(|e| {
            tracing::debug!(path = %path, error = %e, "activity not added");
        })?;
        tracing::info!(path = %path, activity = %key, version = %self.learning_paths[li].version(), "activity added");
        self.persist(Collection::LearningPaths).await
    }

    pub async fn remove_activity(
        &mut self,
        session: &Session,
        path: &PathKey,
        activity: &ActivityKey,
    ) -> Result<Activity, SessionError> {
        let li = self.owned_path_index(session, path, "edit this learning path")?;
        let removed = self.learning_paths[li].remove_activity(activity).inspect_err(|e| {
            tracing::debug!(path = %path, error = %e, "activity not removed");
        })?;
        tracing::info!(path = %path, %activity, version = %self.learning_paths[li].version(), "activity removed");
        self.persist(Collection::LearningPaths).await?;
        Ok(removed)
    }

    /// Teacher verdict on a submitted assignment or open-ended exam.
    pub async fn grade_submission(
        &mut self,
        session: &Session,
        student: &Username,
        path: &PathKey,
        activity: &ActivityKey,
        passed: bool,
    ) -> Result<ActivityStatus, SessionError> {
        let li = self.owned_path_index(session, path, "grade this learning path")?;
        let pi = self.progress_index(student, path)?;
        let lp = &self.learning_paths[li];
        let act = lp
            .activity(activity)
            .ok_or_else(|| DomainError::NotFound(EntityKey::Activity(activity.clone())))?;
        let progress = &mut self.progresses[pi];
        let gradable = matches!(act.activity_type(), ActivityType::Assignment | ActivityType::OpenEndedExam);
        if !gradable || progress.status_of(activity) != ActivityStatus::Submitted {
            return Err(SessionError::NotGradable(EntityKey::Activity(activity.clone())));
        }
        let status = if passed {
            ActivityStatus::Completed
        } else {
            ActivityStatus::Failed
        };
        progress.update_activity_status(lp, activity, status)?;
        tracing::info!(%student, path = %path, %activity, %status, "submission graded");
        self.persist(Collection::Progresses).await?;
        Ok(status)
    }

    // --- learning ---

    pub async fn enroll(&mut self, session: &Session, path: &PathKey) -> Result<(), SessionError> {
        require(session, Role::Student, "enroll")?;
        let li = self.path_index(path)?;
        if self.progress_index(&session.username, path).is_ok() {
            return Err(DomainError::Conflict(EntityKey::Progress(session.username.clone(), path.clone())).into());
        }
        let progress = Progress::new(session.username.clone(), &self.learning_paths[li]);
        tracing::info!(student = %session.username, path = %path, "enrolled");
        self.progresses.push(progress);
        self.persist(Collection::Progresses).await
    }

    /// Runs the activity's completion contract for the session's student and
    /// records the result.
    pub async fn perform_activity(
        &mut self,
        session: &Session,
        path: &PathKey,
        activity: &ActivityKey,
        submission: Submission,
    ) -> Result<Outcome, SessionError> {
        require(session, Role::Student, "perform activities")?;
        let li = self.path_index(path)?;
        let pi = self.progress_index(&session.username, path)?;
        let lp = &mut self.learning_paths[li];
        let progress = &mut self.progresses[pi];

        let act = lp
            .activity(activity)
            .ok_or_else(|| DomainError::NotFound(EntityKey::Activity(activity.clone())))?;
        let current = progress.status_of(activity);
        if current.is_done_by_learner() {
            return Err(SessionError::AlreadyDone(EntityKey::Activity(activity.clone()), current));
        }
        let answered = match act.kind() {
            ActivityKind::Survey(_) => progress.survey_response(activity).is_some(),
            ActivityKind::OpenEndedExam(_) => progress.exam_response(activity).is_some(),
            _ => false,
        };
        if answered {
            return Err(SessionError::AlreadyResponded(EntityKey::Activity(activity.clone())));
        }

        let outcome = act.complete(&session.username, submission)?;
        let touched_path = match &outcome.response {
            Some(Response::Survey(r)) => {
                lp.record_survey_response(activity, r.clone())?;
                progress.add_survey_response(activity.clone(), r.clone());
                true
            }
            Some(Response::Exam(r)) => {
                lp.record_exam_response(activity, r.clone())?;
                progress.add_exam_response(activity.clone(), r.clone());
                true
            }
            None => false,
        };
        progress.update_activity_status(lp, activity, outcome.status)?;
        tracing::info!(
            student = %session.username,
            path = %path,
            %activity,
            status = %outcome.status,
            score = ?outcome.score,
            "activity performed"
        );
        if progress.is_complete() {
            tracing::info!(student = %session.username, path = %path, "learning path completed");
        }

        self.persist(Collection::Progresses).await?;
        if touched_path {
            self.persist(Collection::LearningPaths).await?;
        }
        Ok(outcome)
    }

    pub async fn rate(&mut self, session: &Session, path: &PathKey, rating: f64) -> Result<f64, SessionError> {
        let li = self.enrolled_path_index(session, path, "rate this learning path")?;
        let blended = self.learning_paths[li].update_rating(rating).inspect_err(|e| {
            tracing::debug!(path = %path, error = %e, "rating rejected");
        })?;
        tracing::info!(path = %path, rating, blended, "rated");
        self.persist(Collection::LearningPaths).await?;
        Ok(blended)
    }

    pub async fn add_feedback(&mut self, session: &Session, path: &PathKey, text: &str) -> Result<(), SessionError> {
        let li = self.enrolled_path_index(session, path, "leave feedback here")?;
        self.learning_paths[li].add_feedback(text).inspect_err(|e| {
            tracing::debug!(path = %path, error = %e, "feedback rejected");
        })?;
        tracing::info!(path = %path, version = %self.learning_paths[li].version(), "feedback added");
        self.persist(Collection::LearningPaths).await
    }

    // --- queries ---

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn user(&self, username: &Username) -> Option<&User> {
        self.users.iter().find(|u| &u.username == username)
    }

    pub fn learning_paths(&self) -> &[LearningPath] {
        &self.learning_paths
    }

    pub fn learning_path(&self, key: &PathKey) -> Option<&LearningPath> {
        self.learning_paths.iter().find(|lp| &lp.key() == key)
    }

    pub fn progresses(&self) -> &[Progress] {
        &self.progresses
    }

    pub fn progress(&self, student: &Username, path: &PathKey) -> Option<&Progress> {
        self.progresses.iter().find(|p| p.belongs_to(student, path))
    }

    /// Paths the session's user is not yet enrolled in.
    pub fn available_paths(&self, session: &Session) -> Vec<&LearningPath> {
        self.learning_paths
            .iter()
            .filter(|lp| self.progress(&session.username, &lp.key()).is_none())
            .collect()
    }

    pub fn my_progress(&self, session: &Session) -> Result<Vec<ProgressSummary>, SessionError> {
        self.progresses
            .iter()
            .filter(|p| p.student() == &session.username)
            .map(|p| -> Result<ProgressSummary, SessionError> {
                let lp = self
                    .learning_path(p.learning_path())
                    .ok_or_else(|| DomainError::NotFound(EntityKey::LearningPath(p.learning_path().clone())))?;
                Ok(ProgressSummary {
                    learning_path: lp.key(),
                    percentage: p.calculate_completion_percentage(lp)?,
                    complete: p.is_complete(),
                })
            })
            .collect()
    }

    /// Students with a progress record for `path`, resolved by username.
    pub fn enrolled_students(&self, path: &PathKey) -> Vec<&User> {
        self.progresses
            .iter()
            .filter(|p| p.learning_path() == path)
            .filter_map(|p| self.user(p.student()))
            .collect()
    }

    pub fn survey_responses(&self, path: &PathKey, activity: &ActivityKey) -> Result<&[SurveyResponse], SessionError> {
        match self.activity(path, activity)?.kind() {
            ActivityKind::Survey(s) => Ok(s.responses()),
            other => Err(mismatch(other, "survey answers")),
        }
    }

    pub fn exam_responses(&self, path: &PathKey, activity: &ActivityKey) -> Result<&[OpenEndedResponse], SessionError> {
        match self.activity(path, activity)?.kind() {
            ActivityKind::OpenEndedExam(e) => Ok(e.responses()),
            other => Err(mismatch(other, "exam answers")),
        }
    }

    // --- helpers ---

    fn activity(&self, path: &PathKey, activity: &ActivityKey) -> Result<&Activity, DomainError> {
        let li = self.path_index(path)?;
        self.learning_paths[li]
            .activity(activity)
            .ok_or_else(|| DomainError::NotFound(EntityKey::Activity(activity.clone())))
    }

    fn path_index(&self, path: &PathKey) -> Result<usize, DomainError> {
        self.learning_paths
            .iter()
            .position(|lp| &lp.key() == path)
            .ok_or_else(|| DomainError::NotFound(EntityKey::LearningPath(path.clone())))
    }

    fn progress_index(&self, student: &Username, path: &PathKey) -> Result<usize, DomainError> {
        self.progresses
            .iter()
            .position(|p| p.belongs_to(student, path))
            .ok_or_else(|| DomainError::NotFound(EntityKey::Progress(student.clone(), path.clone())))
    }

    fn owned_path_index(&self, session: &Session, path: &PathKey, action: &'static str) -> Result<usize, SessionError> {
        require(session, Role::Teacher, action)?;
        let li = self.path_index(path)?;
        if self.learning_paths[li].creator() != &session.username {
            return Err(SessionError::Forbidden(session.username.clone(), action));
        }
        Ok(li)
    }

    fn enrolled_path_index(&self, session: &Session, path: &PathKey, action: &'static str) -> Result<usize, SessionError> {
        require(session, Role::Student, action)?;
        let li = self.path_index(path)?;
        if self.progress(&session.username, path).is_none() {
            return Err(SessionError::Forbidden(session.username.clone(), action));
        }
        Ok(li)
    }

    async fn persist(&self, collection: Collection) -> Result<(), SessionError> {
        let res = match collection {
            Collection::Users => self.store.save(collection, &self.users).await,
            Collection::LearningPaths => self.store.save(collection, &self.learning_paths).await,
            Collection::Progresses => self.store.save(collection, &self.progresses).await,
        };
        res.inspect_err(|e| tracing::error!(error = %e, %collection, "save failed"))?;
        Ok(())
    }
}

fn require(session: &Session, role: Role, action: &'static str) -> Result<(), SessionError> {
    if session.role != role {
        return Err(SessionError::Forbidden(session.username.clone(), action));
    }
    Ok(())
}

fn mismatch(kind: &ActivityKind, got: &'static str) -> SessionError {
    DomainError::SubmissionMismatch {
        expected: kind.activity_type(),
        got,
    }
    .into()
}
