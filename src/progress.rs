use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::collections::HashMap;

use crate::activity::{OpenEndedResponse, SurveyResponse};
use crate::error::DomainError;
use crate::identity::{ActivityKey, EntityKey, PathKey, Username};
use crate::learning_path::LearningPath;
use crate::runtime::ActivityStatus;

/// One student's record for one learning path.
///
/// The path is referenced by key only. Operations that need the path's
/// activities take it as an argument and check that the keys agree, so a
/// progress record loaded from one snapshot can be evaluated against a path
/// loaded from another.
///
/// Statuses are seeded for the activities present at enrollment. Activities
/// added later have no entry and read as `Pending`.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Progress {
    student: Username,
    learning_path: PathKey,
    start_date: DateTime<Utc>,
    #[serde(default)]
    completion_date: Option<DateTime<Utc>>,
    #[serde_as(as = "Vec<(_, _)>")]
    statuses: HashMap<ActivityKey, ActivityStatus>,
    #[serde_as(as = "Vec<(_, _)>")]
    #[serde(default)]
    survey_responses: HashMap<ActivityKey, SurveyResponse>,
    #[serde_as(as = "Vec<(_, _)>")]
    #[serde(default)]
    exam_responses: HashMap<ActivityKey, OpenEndedResponse>,
}

impl Progress {
    pub fn new(student: Username, path: &LearningPath) -> Self {
        let statuses = path
            .activities()
            .iter()
            .map(|a| (a.key(), ActivityStatus::Pending))
            .collect();
        Self {
            student,
            learning_path: path.key(),
            start_date: Utc::now(),
            completion_date: None,
            statuses,
            survey_responses: HashMap::new(),
            exam_responses: HashMap::new(),
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::Progress(self.student.clone(), self.learning_path.clone())
    }

    pub fn student(&self) -> &Username {
        &self.student
    }

    pub fn learning_path(&self) -> &PathKey {
        &self.learning_path
    }

    pub fn belongs_to(&self, student: &Username, path: &PathKey) -> bool {
        &self.student == student && &self.learning_path == path
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn completion_date(&self) -> Option<DateTime<Utc>> {
        self.completion_date
    }

    pub fn is_complete(&self) -> bool {
        self.completion_date.is_some()
    }

    pub fn statuses(&self) -> &HashMap<ActivityKey, ActivityStatus> {
        &self.statuses
    }

    pub fn status_of(&self, activity: &ActivityKey) -> ActivityStatus {
        self.statuses.get(activity).copied().unwrap_or_default()
    }

    pub fn is_tracked(&self, activity: &ActivityKey) -> bool {
        self.statuses.contains_key(activity)
    }

    /// Overwrites the stored status. A terminal status re-checks whether every
    /// mandatory activity is completed and, the first time that holds, stamps
    /// the completion date. The stamp is never moved or cleared afterwards.
    pub fn update_activity_status(
        &mut self,
        path: &LearningPath,
        activity: &ActivityKey,
        status: ActivityStatus,
    ) -> Result<(), DomainError> {
        self.check_path(path)?;
        self.statuses.insert(activity.clone(), status);
        if status.is_terminal() && self.completion_date.is_none() && self.all_mandatory_completed(path) {
            self.completion_date = Some(Utc::now());
        }
        Ok(())
    }

    /// Percentage of the path's mandatory activities that are completed.
    /// A path without mandatory activities counts as fully complete.
    pub fn calculate_completion_percentage(&self, path: &LearningPath) -> Result<f64, DomainError> {
        self.check_path(path)?;
        let mut total = 0usize;
        let mut completed = 0usize;
        for a in path.mandatory_activities() {
            total += 1;
            if self.status_of(&a.key()) == ActivityStatus::Completed {
                completed += 1;
            }
        }
        if total == 0 {
            return Ok(100.0);
        }
        Ok(completed as f64 / total as f64 * 100.0)
    }

    pub fn survey_response(&self, survey: &ActivityKey) -> Option<&SurveyResponse> {
        self.survey_responses.get(survey)
    }

    pub fn exam_response(&self, exam: &ActivityKey) -> Option<&OpenEndedResponse> {
        self.exam_responses.get(exam)
    }

    /// Stores the response, replacing any earlier one. Callers that want a
    /// single submission must check [`Progress::survey_response`] first.
    pub fn add_survey_response(&mut self, survey: ActivityKey, response: SurveyResponse) {
        self.survey_responses.insert(survey, response);
    }

    /// See [`Progress::add_survey_response`].
    pub fn add_exam_response(&mut self, exam: ActivityKey, response: OpenEndedResponse) {
        self.exam_responses.insert(exam, response);
    }

    fn all_mandatory_completed(&self, path: &LearningPath) -> bool {
        path.mandatory_activities()
            .all(|a| self.status_of(&a.key()) == ActivityStatus::Completed)
    }

    fn check_path(&self, path: &LearningPath) -> Result<(), DomainError> {
        let got = path.key();
        if got != self.learning_path {
            return Err(DomainError::PathMismatch {
                expected: self.learning_path.clone(),
                got,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::tests::review;
    use crate::activity::Activity;

    fn path_with(activities: Vec<Activity>) -> LearningPath {
        let mut lp = LearningPath::new("Rust", "systems", "ownership", 2, "prof".into()).unwrap();
        for a in activities {
            lp.add_activity(a).unwrap();
        }
        lp
    }

    #[test]
    fn seeds_pending_for_existing_activities() {
        let lp = path_with(vec![review("a", 10, true), review("b", 10, false)]);
        let p = Progress::new("ana".into(), &lp);
        assert_eq!(p.statuses().len(), 2);
        assert!(p.statuses().values().all(|s| *s == ActivityStatus::Pending));
        assert_eq!(p.learning_path(), &PathKey::new("rust"));
    }

    #[test]
    fn later_activities_read_as_pending_but_are_untracked() {
        let mut lp = path_with(vec![review("a", 10, true)]);
        let p = Progress::new("ana".into(), &lp);
        let late = review("late", 5, true);
        lp.add_activity(late.clone()).unwrap();
        assert!(!p.is_tracked(&late.key()));
        assert_eq!(p.status_of(&late.key()), ActivityStatus::Pending);
        assert_eq!(p.calculate_completion_percentage(&lp).unwrap(), 0.0);
    }

    #[test]
    fn no_mandatory_activities_is_full_completion() {
        let lp = path_with(vec![review("opt", 10, false)]);
        let p = Progress::new("ana".into(), &lp);
        assert_eq!(p.calculate_completion_percentage(&lp).unwrap(), 100.0);
        let empty = path_with(vec![]);
        let p = Progress::new("ana".into(), &empty);
        assert_eq!(p.calculate_completion_percentage(&empty).unwrap(), 100.0);
    }

    #[test]
    fn half_of_mandatory_completed() {
        let a = review("a", 10, true);
        let lp = path_with(vec![a.clone(), review("b", 10, true), review("c", 10, false)]);
        let mut p = Progress::new("ana".into(), &lp);
        p.update_activity_status(&lp, &a.key(), ActivityStatus::Completed).unwrap();
        assert_eq!(p.calculate_completion_percentage(&lp).unwrap(), 50.0);
        assert!(!p.is_complete());
    }

    #[test]
    fn completion_date_is_set_once() {
        let a = review("a", 10, true);
        let b = review("b", 10, true);
        let lp = path_with(vec![a.clone(), b.clone()]);
        let mut p = Progress::new("ana".into(), &lp);

        p.update_activity_status(&lp, &a.key(), ActivityStatus::Completed).unwrap();
        assert_eq!(p.completion_date(), None);
        p.update_activity_status(&lp, &b.key(), ActivityStatus::Completed).unwrap();
        let first = p.completion_date().expect("completion date set");

        // regressing and completing again never moves the stamp
        p.update_activity_status(&lp, &b.key(), ActivityStatus::Failed).unwrap();
        assert_eq!(p.completion_date(), Some(first));
        p.update_activity_status(&lp, &b.key(), ActivityStatus::Completed).unwrap();
        assert_eq!(p.completion_date(), Some(first));
    }

    #[test]
    fn non_terminal_status_does_not_complete() {
        let a = review("a", 10, true);
        let lp = path_with(vec![a.clone()]);
        let mut p = Progress::new("ana".into(), &lp);
        p.update_activity_status(&lp, &a.key(), ActivityStatus::Submitted).unwrap();
        assert!(!p.is_complete());
    }

    #[test]
    fn rejects_foreign_path() {
        let lp = path_with(vec![]);
        let other = LearningPath::new("Go", "d", "o", 1, "prof".into()).unwrap();
        let mut p = Progress::new("ana".into(), &lp);
        let err = p
            .update_activity_status(&other, &ActivityKey::new("x", "y"), ActivityStatus::Completed)
            .unwrap_err();
        assert!(matches!(err, DomainError::PathMismatch { .. }));
        assert!(p.statuses().is_empty());
    }

    #[test]
    fn lookups_survive_independent_reload() {
        let a = review("a", 10, true);
        let lp = path_with(vec![a.clone(), review("b", 10, true)]);
        let mut p = Progress::new("ana".into(), &lp);
        p.update_activity_status(&lp, &a.key(), ActivityStatus::Completed).unwrap();

        let lp2: LearningPath = serde_json::from_str(&serde_json::to_string(&lp).unwrap()).unwrap();
        let p2: Progress = serde_json::from_str(&serde_json::to_string(&p).unwrap()).unwrap();

        assert_eq!(p2.status_of(&lp2.activities()[0].key()), ActivityStatus::Completed);
        assert_eq!(p2.calculate_completion_percentage(&lp2).unwrap(), 50.0);
    }

    #[test]
    fn responses_overwrite_without_checking() {
        let lp = path_with(vec![]);
        let mut p = Progress::new("ana".into(), &lp);
        let key = ActivityKey::new("survey", "d");
        for answer in ["first", "second"] {
            p.add_survey_response(
                key.clone(),
                SurveyResponse {
                    student: "ana".into(),
                    answers: vec![answer.into()],
                },
            );
        }
        assert_eq!(p.survey_response(&key).unwrap().answers, ["second".to_string()]);
        assert!(p.exam_response(&key).is_none());
    }
}
