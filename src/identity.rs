//! Natural keys.
//!
//! Users, learning paths and progress records are persisted as independent
//! snapshots. Nothing is shared between the files, so every cross-reference is
//! stored as the business key of its target and resolved again after a reload.
//! Two values with the same key are the same entity; instance identity means
//! nothing here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Username {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Learning path title. Compares and hashes case-insensitively but keeps the
/// spelling it was created with.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(transparent)]
pub struct PathKey(String);

impl PathKey {
    pub fn new(title: impl Into<String>) -> Self {
        Self(title.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn folded(&self) -> String {
        self.0.to_lowercase()
    }
}

impl PartialEq for PathKey {
    fn eq(&self, other: &Self) -> bool {
        self.folded() == other.folded()
    }
}

impl Eq for PathKey {}

impl Hash for PathKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded().hash(state);
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PathKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// (title, description): every other activity field is ignored for identity.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivityKey {
    pub title: String,
    pub description: String,
}

impl ActivityKey {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for ActivityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.description)
    }
}

/// (kind, key fields) of any entity that can be referenced across collections.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    User(Username),
    LearningPath(PathKey),
    Activity(ActivityKey),
    Progress(Username, PathKey),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::User(u) => write!(f, "user '{u}'"),
            EntityKey::LearningPath(p) => write!(f, "learning path '{p}'"),
            EntityKey::Activity(a) => write!(f, "activity '{a}'"),
            EntityKey::Progress(u, p) => write!(f, "progress of '{u}' in '{p}'"),
        }
    }
}
