use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

/// The three independently persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    LearningPaths,
    Progresses,
}

impl Collection {
    pub fn file_name(self) -> &'static str {
        match self {
            Collection::Users => "users.json",
            Collection::LearningPaths => "learning_paths.json",
            Collection::Progresses => "progresses.json",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Collection::Users => "users",
            Collection::LearningPaths => "learning paths",
            Collection::Progresses => "progresses",
        })
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to decode {collection}: {source}")]
    Decode {
        collection: Collection,
        source: serde_json::Error,
    },
    #[error("failed to encode {collection}: {source}")]
    Encode {
        collection: Collection,
        source: serde_json::Error,
    },
}

/// JSON snapshots of whole collections, one file each under `dir`.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(io_err(&dir))?;
        tracing::debug!(dir = %dir.display(), "store opened");
        Ok(Self { dir })
    }

    pub fn path_of(&self, collection: Collection) -> PathBuf {
        self.dir.join(collection.file_name())
    }

    /// Loads a collection in stored order. A missing file is an empty
    /// collection.
    pub async fn load<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>, StoreError> {
        let path = self.path_of(collection);
        let bytes = match fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(%collection, "no snapshot yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(io_err(&path)(e)),
        };
        let items: Vec<T> = serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Decode { collection, source })?;
        tracing::debug!(%collection, count = items.len(), "loaded");
        Ok(items)
    }

    /// Replaces the whole collection. Writes a temp file and renames it over
    /// the target so one file is never left half-written; nothing ties the
    /// three files together.
    pub async fn save<T: Serialize>(&self, collection: Collection, items: &[T]) -> Result<(), StoreError> {
        let path = self.path_of(collection);
        let json = serde_json::to_vec_pretty(items)
            .map_err(|source| StoreError::Encode { collection, source })?;
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", collection.file_name(), Uuid::new_v4()));
        let written = match fs::write(&tmp, &json).await {
            Ok(()) => fs::rename(&tmp, &path).await.map_err(io_err(&path)),
            Err(e) => Err(io_err(&tmp)(e)),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }
        tracing::debug!(%collection, count = items.len(), "saved");
        Ok(())
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::tests::review;
    use crate::learning_path::LearningPath;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_collection_loads_empty() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("data")).await.unwrap();
        let users: Vec<crate::models::User> = store.load(Collection::Users).await.unwrap();
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn learning_paths_round_trip_in_order() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();

        let mut paths = Vec::new();
        for (i, title) in ["Rust", "Go", "Zig"].iter().enumerate() {
            let mut lp = LearningPath::new(*title, "d", "o", 2, "prof".into()).unwrap();
            lp.add_activity(review(&format!("read {i}"), 10 + i as u32, true)).unwrap();
            paths.push(lp);
        }
        store.save(Collection::LearningPaths, &paths).await.unwrap();

        let loaded: Vec<LearningPath> = store.load(Collection::LearningPaths).await.unwrap();
        assert_eq!(loaded.len(), paths.len());
        for (a, b) in loaded.iter().zip(&paths) {
            assert_eq!(a, b);
            assert_eq!(a.version(), b.version());
            assert_eq!(a.duration(), b.duration());
            assert_eq!(a.activities(), b.activities());
        }
    }

    #[tokio::test]
    async fn save_replaces_previous_snapshot_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();
        store.save(Collection::Progresses, &[1u32, 2, 3]).await.unwrap();
        store.save(Collection::Progresses, &[4u32]).await.unwrap();
        let loaded: Vec<u32> = store.load(Collection::Progresses).await.unwrap();
        assert_eq!(loaded, vec![4]);

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["progresses.json".to_string()]);
    }

    #[tokio::test]
    async fn failed_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("data")).await.unwrap();
        std::fs::remove_dir(dir.path().join("data")).unwrap();

        let err = store.save(Collection::Users, &[1u32]).await.unwrap_err();
        let StoreError::Io { path, .. } = err else {
            panic!("expected an io error");
        };
        assert!(path.file_name().unwrap().to_string_lossy().starts_with(".users.json."));

        // the target is now a directory, so the rename fails after the write
        std::fs::create_dir_all(store.path_of(Collection::Users)).unwrap();
        assert!(store.save(Collection::Users, &[1u32]).await.is_err());
        let names: Vec<String> = std::fs::read_dir(dir.path().join("data"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["users.json".to_string()]);
    }

    #[tokio::test]
    async fn out_of_range_record_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();
        let mut lp = LearningPath::new("Rust", "d", "o", 2, "prof".into()).unwrap();
        lp.add_activity(review("read", 10, true)).unwrap();
        let mut json = serde_json::to_value(vec![lp]).unwrap();

        json[0]["activities"][0]["difficulty_level"] = 9.into();
        std::fs::write(store.path_of(Collection::LearningPaths), json.to_string()).unwrap();
        let err = store
            .load::<LearningPath>(Collection::LearningPaths)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Decode { collection: Collection::LearningPaths, .. }));

        json[0]["activities"][0]["difficulty_level"] = 1.into();
        json[0]["difficulty_level"] = 0.into();
        std::fs::write(store.path_of(Collection::LearningPaths), json.to_string()).unwrap();
        let err = store
            .load::<LearningPath>(Collection::LearningPaths)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("difficulty level must be between 1 and 5"));
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).await.unwrap();
        std::fs::write(store.path_of(Collection::Users), b"{not json").unwrap();
        let err = store.load::<crate::models::User>(Collection::Users).await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { collection: Collection::Users, .. }));
    }
}
