use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::activity::{difficulty, Activity, ActivityKind, ActivityType, OpenEndedResponse, SurveyResponse};
use crate::error::DomainError;
use crate::identity::{ActivityKey, EntityKey, PathKey, Username};

/// "major.minor". Every mutation bumps minor; major only moves by hand.
/// Minor saturates at `u64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u64,
}

impl Version {
    pub const INITIAL: Version = Version { major: 1, minor: 0 };

    pub fn next_minor(self) -> Self {
        Self {
            major: self.major,
            minor: self.minor.saturating_add(1),
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed version '{0}', expected major.minor")]
pub struct BadVersion(String);

impl FromStr for Version {
    type Err = BadVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || BadVersion(s.to_string());
        let (major, minor) = s.split_once('.').ok_or_else(bad)?;
        Ok(Self {
            major: major.parse().map_err(|_| bad())?,
            minor: minor.parse().map_err(|_| bad())?,
        })
    }
}

/// Deserialization re-checks difficulty, rating and activity uniqueness.
#[serde_as]
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(try_from = "RawLearningPath")]
pub struct LearningPath {
    title: String,
    description: String,
    objectives: String,
    difficulty_level: u8,
    rating: f64,
    creation_date: DateTime<Utc>,
    modification_date: DateTime<Utc>,
    #[serde_as(as = "DisplayFromStr")]
    version: Version,
    creator: Username,
    activities: Vec<Activity>,
    #[serde(default)]
    feedback: Vec<String>,
}

impl LearningPath {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        objectives: impl Into<String>,
        difficulty_level: i32,
        creator: Username,
    ) -> Result<Self, DomainError> {
        let difficulty_level = difficulty(difficulty_level)?;
        let now = Utc::now();
        Ok(Self {
            title: title.into(),
            description: description.into(),
            objectives: objectives.into(),
            difficulty_level,
            rating: 0.0,
            creation_date: now,
            modification_date: now,
            version: Version::INITIAL,
            creator,
            activities: Vec::new(),
            feedback: Vec::new(),
        })
    }

    pub fn key(&self) -> PathKey {
        PathKey::new(self.title.clone())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn objectives(&self) -> &str {
        &self.objectives
    }

    pub fn difficulty_level(&self) -> u8 {
        self.difficulty_level
    }

    pub fn rating(&self) -> f64 {
        self.rating
    }

    pub fn creation_date(&self) -> DateTime<Utc> {
        self.creation_date
    }

    pub fn modification_date(&self) -> DateTime<Utc> {
        self.modification_date
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn creator(&self) -> &Username {
        &self.creator
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn feedback(&self) -> &[String] {
        &self.feedback
    }

    /// Total expected minutes, always derived from the current activities.
    pub fn duration(&self) -> u32 {
        self.recalculate_duration()
    }

    pub fn recalculate_duration(&self) -> u32 {
        self.activities.iter().map(Activity::expected_duration).sum()
    }

    pub fn activity(&self, key: &ActivityKey) -> Option<&Activity> {
        self.activities.iter().find(|a| a.has_key(key))
    }

    pub fn mandatory_activities(&self) -> impl Iterator<Item = &Activity> {
        self.activities.iter().filter(|a| a.is_mandatory())
    }

    pub fn activities_of_type(&self, tag: ActivityType) -> impl Iterator<Item = &Activity> {
        self.activities.iter().filter(move |a| a.activity_type() == tag)
    }

    pub fn add_activity(&mut self, activity: Activity) -> Result<(), DomainError> {
        if self.activities.contains(&activity) {
            return Err(DomainError::Conflict(EntityKey::Activity(activity.key())));
        }
        self.activities.push(activity);
        self.touch();
        Ok(())
    }

    pub fn remove_activity(&mut self, key: &ActivityKey) -> Result<Activity, DomainError> {
        let idx = self
            .activities
            .iter()
            .position(|a| a.has_key(key))
            .ok_or_else(|| DomainError::NotFound(EntityKey::Activity(key.clone())))?;
        let removed = self.activities.remove(idx);
        self.touch();
        Ok(removed)
    }

    /// Blends `new_rating` in at 50% weight: `(rating + new) / 2`. This is
    /// not a running mean; every sample counts as much as all earlier ones
    /// combined.
    pub fn update_rating(&mut self, new_rating: f64) -> Result<f64, DomainError> {
        if !(0.0..=5.0).contains(&new_rating) {
            return Err(DomainError::RatingOutOfRange(new_rating));
        }
        self.rating = (self.rating + new_rating) / 2.0;
        Ok(self.rating)
    }

    pub fn add_feedback(&mut self, text: &str) -> Result<(), DomainError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::BlankFeedback);
        }
        self.feedback.push(text.to_string());
        self.touch();
        Ok(())
    }

    /// Appends a response to a member survey. Responses are not structural
    /// edits, so version and modification date stay put.
    pub fn record_survey_response(
        &mut self,
        key: &ActivityKey,
        response: SurveyResponse,
    ) -> Result<(), DomainError> {
        match self.activity_kind_mut(key)? {
            ActivityKind::Survey(survey) => {
                survey.add_response(response);
                Ok(())
            }
            other => Err(DomainError::SubmissionMismatch {
                expected: other.activity_type(),
                got: "survey answers",
            }),
        }
    }

    pub fn record_exam_response(
        &mut self,
        key: &ActivityKey,
        response: OpenEndedResponse,
    ) -> Result<(), DomainError> {
        match self.activity_kind_mut(key)? {
            ActivityKind::OpenEndedExam(exam) => {
                exam.add_response(response);
                Ok(())
            }
            other => Err(DomainError::SubmissionMismatch {
                expected: other.activity_type(),
                got: "exam answers",
            }),
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{title} by {creator}: {desc} | objectives: {obj} | difficulty {diff} | {dur} min | \
             rating {rating:.2}/5.0 | v{version} | created {created} | modified {modified} | \
             {n} activities | {fb} feedback",
            title = self.title,
            creator = self.creator,
            desc = self.description,
            obj = self.objectives,
            diff = self.difficulty_level,
            dur = self.duration(),
            rating = self.rating,
            version = self.version,
            created = self.creation_date.format("%Y-%m-%d %H:%M"),
            modified = self.modification_date.format("%Y-%m-%d %H:%M"),
            n = self.activities.len(),
            fb = self.feedback.len(),
        )
    }

    fn activity_kind_mut(&mut self, key: &ActivityKey) -> Result<&mut ActivityKind, DomainError> {
        self.activities
            .iter_mut()
            .find(|a| a.has_key(key))
            .map(Activity::kind_mut)
            .ok_or_else(|| DomainError::NotFound(EntityKey::Activity(key.clone())))
    }

    fn touch(&mut self) {
        self.modification_date = Utc::now();
        self.version = self.version.next_minor();
    }
}

#[serde_as]
#[derive(Deserialize)]
struct RawLearningPath {
    title: String,
    description: String,
    objectives: String,
    difficulty_level: i32,
    rating: f64,
    creation_date: DateTime<Utc>,
    modification_date: DateTime<Utc>,
    #[serde_as(as = "DisplayFromStr")]
    version: Version,
    creator: Username,
    activities: Vec<Activity>,
    #[serde(default)]
    feedback: Vec<String>,
}

impl TryFrom<RawLearningPath> for LearningPath {
    type Error = DomainError;

    fn try_from(raw: RawLearningPath) -> Result<Self, Self::Error> {
        let difficulty_level = difficulty(raw.difficulty_level)?;
        if !(0.0..=5.0).contains(&raw.rating) {
            return Err(DomainError::RatingOutOfRange(raw.rating));
        }
        for (i, a) in raw.activities.iter().enumerate() {
            if raw.activities[..i].contains(a) {
                return Err(DomainError::Conflict(EntityKey::Activity(a.key())));
            }
        }
        Ok(Self {
            title: raw.title,
            description: raw.description,
            objectives: raw.objectives,
            difficulty_level,
            rating: raw.rating,
            creation_date: raw.creation_date,
            modification_date: raw.modification_date,
            version: raw.version,
            creator: raw.creator,
            activities: raw.activities,
            feedback: raw.feedback,
        })
    }
}

impl PartialEq for LearningPath {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for LearningPath {}

impl Hash for LearningPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::tests::review;
    use crate::activity::{ActivityDetails, Survey};

    fn path() -> LearningPath {
        LearningPath::new("Rust", "systems", "ownership", 3, "prof".into()).unwrap()
    }

    #[test]
    fn difficulty_bounds() {
        for level in [0, 6, -1] {
            assert_eq!(
                LearningPath::new("t", "d", "o", level, "prof".into()).unwrap_err(),
                DomainError::InvalidDifficulty(level)
            );
        }
        for level in [1, 5] {
            let lp = LearningPath::new("t", "d", "o", level, "prof".into()).unwrap();
            assert_eq!(i32::from(lp.difficulty_level()), level);
        }
    }

    #[test]
    fn starts_at_version_one() {
        let lp = path();
        assert_eq!(lp.version().to_string(), "1.0");
        assert_eq!(lp.duration(), 0);
        assert_eq!(lp.rating(), 0.0);
        assert_eq!(lp.creation_date(), lp.modification_date());
    }

    #[test]
    fn add_then_remove_restores_duration_and_bumps_version() {
        let mut lp = path();
        lp.add_activity(review("base", 15, true)).unwrap();
        let (dur, count, v0) = (lp.duration(), lp.activities().len(), lp.version());

        let extra = review("extra", 40, false);
        lp.add_activity(extra.clone()).unwrap();
        let v1 = lp.version();
        assert_eq!(lp.duration(), 55);

        lp.remove_activity(&extra.key()).unwrap();
        let v2 = lp.version();

        assert_eq!(lp.duration(), dur);
        assert_eq!(lp.activities().len(), count);
        assert!(v0 < v1 && v1 < v2);
        assert_eq!(v2.to_string(), "1.3");
    }

    #[test]
    fn duplicate_add_and_missing_remove_are_rejected_without_mutation() {
        let mut lp = path();
        lp.add_activity(review("a", 10, true)).unwrap();
        let before = (lp.version(), lp.modification_date(), lp.duration());

        let err = lp.add_activity(review("a", 99, false)).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(EntityKey::Activity(_))));
        let err = lp
            .remove_activity(&ActivityKey::new("ghost", "read it"))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(EntityKey::Activity(_))));

        assert_eq!((lp.version(), lp.modification_date(), lp.duration()), before);
    }

    #[test]
    fn rating_uses_half_weight_blend() {
        let mut lp = path();
        assert_eq!(lp.update_rating(4.0).unwrap(), 2.0);
        assert_eq!(lp.update_rating(2.0).unwrap(), 2.0);
        assert_eq!(
            lp.update_rating(5.5).unwrap_err(),
            DomainError::RatingOutOfRange(5.5)
        );
        assert!(lp.update_rating(-0.1).is_err());
        assert!(lp.update_rating(f64::NAN).is_err());
        assert_eq!(lp.rating(), 2.0);
        // ratings never bump the version
        assert_eq!(lp.version(), Version::INITIAL);
    }

    #[test]
    fn feedback_is_trimmed_and_blank_is_ignored() {
        let mut lp = path();
        assert_eq!(lp.add_feedback("   ").unwrap_err(), DomainError::BlankFeedback);
        assert_eq!(lp.version().to_string(), "1.0");
        lp.add_feedback("  loved it \n").unwrap();
        assert_eq!(lp.feedback(), ["loved it".to_string()]);
        assert_eq!(lp.version().to_string(), "1.1");
    }

    #[test]
    fn version_parse_and_saturation() {
        assert_eq!("2.17".parse::<Version>().unwrap(), Version { major: 2, minor: 17 });
        assert!("2".parse::<Version>().is_err());
        assert!("a.b".parse::<Version>().is_err());
        let top = Version {
            major: 1,
            minor: u64::MAX,
        };
        assert_eq!(top.next_minor(), top);
        assert_eq!(
            "1.99".parse::<Version>().unwrap().next_minor().to_string(),
            "1.100"
        );
    }

    #[test]
    fn equality_is_case_insensitive_title() {
        let a = path();
        let b = LearningPath::new("RUST", "other", "other", 1, "someone".into()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn survey_responses_do_not_bump_version() {
        let mut lp = path();
        let survey = Activity::new(
            ActivityDetails::new("feedback", "end of unit", "reflect", 1, 5, false),
            ActivityKind::Survey(Survey::new(vec!["Rate the pace".into()])),
        )
        .unwrap();
        let key = survey.key();
        lp.add_activity(survey).unwrap();
        let v = lp.version();
        lp.record_survey_response(
            &key,
            SurveyResponse {
                student: "ana".into(),
                answers: vec!["fine".into()],
            },
        )
        .unwrap();
        assert_eq!(lp.version(), v);
        let ActivityKind::Survey(s) = lp.activity(&key).unwrap().kind() else {
            panic!("not a survey");
        };
        assert_eq!(s.responses().len(), 1);

        let err = lp
            .record_exam_response(
                &key,
                OpenEndedResponse {
                    student: "ana".into(),
                    answers: Default::default(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::SubmissionMismatch { .. }));
    }

    #[test]
    fn filters_activities_by_type() {
        let mut lp = path();
        lp.add_activity(review("a", 10, true)).unwrap();
        let survey = Activity::new(
            ActivityDetails::new("pulse", "weekly", "reflect", 1, 5, false),
            ActivityKind::Survey(Survey::new(vec!["Pace?".into()])),
        )
        .unwrap();
        lp.add_activity(survey).unwrap();
        lp.add_activity(review("b", 10, false)).unwrap();

        let reviews: Vec<&str> = lp
            .activities_of_type(ActivityType::ResourceReview)
            .map(Activity::title)
            .collect();
        assert_eq!(reviews, ["a", "b"]);
        assert_eq!(lp.activities_of_type(ActivityType::Survey).count(), 1);
        assert_eq!(lp.activities_of_type(ActivityType::Quiz).count(), 0);
    }

    #[test]
    fn decoding_rejects_out_of_range_fields() {
        let mut lp = path();
        lp.add_activity(review("a", 10, true)).unwrap();
        let json = serde_json::to_value(&lp).unwrap();

        let mut bad = json.clone();
        bad["difficulty_level"] = 9.into();
        let err = serde_json::from_value::<LearningPath>(bad).unwrap_err();
        assert!(err.to_string().contains("difficulty level"));

        let mut bad = json.clone();
        bad["rating"] = serde_json::json!(7.5);
        assert!(serde_json::from_value::<LearningPath>(bad).is_err());

        let mut bad = json.clone();
        let dup = bad["activities"][0].clone();
        bad["activities"].as_array_mut().unwrap().push(dup);
        let err = serde_json::from_value::<LearningPath>(bad).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        let back: LearningPath = serde_json::from_value(json).unwrap();
        assert_eq!(back.difficulty_level(), 3);
    }

    #[test]
    fn version_serializes_as_string() {
        let mut lp = path();
        lp.add_feedback("ok").unwrap();
        let json = serde_json::to_value(&lp).unwrap();
        assert_eq!(json["version"], "1.1");
        let back: LearningPath = serde_json::from_value(json).unwrap();
        assert_eq!(back.version(), lp.version());
    }
}
