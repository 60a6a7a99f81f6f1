pub mod activity;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod learning_path;
pub mod models;
pub mod progress;
pub mod runtime;
pub mod session;

pub use activity::{Activity, ActivityDetails, ActivityKind, ActivityType};
pub use db::{Collection, Store, StoreError};
pub use error::DomainError;
pub use identity::{ActivityKey, EntityKey, PathKey, Username};
pub use learning_path::{LearningPath, Version};
pub use models::{Role, User};
pub use progress::Progress;
pub use runtime::{ActivityStatus, Outcome, Submission};
pub use session::{Session, SessionError, Workspace};
