use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::identity::Username;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        })
    }
}

/// Registered account. Identity is the username alone.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub username: Username,
    // plain text; authentication is a straight comparison
    password: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        username: Username,
        password: impl Into<String>,
        name: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            username,
            password: password.into(),
            name: name.into(),
            role,
            created_at: Utc::now(),
        }
    }

    pub fn authenticate(&self, password: &str) -> bool {
        self.password == password
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.username.hash(state);
    }
}
