use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use tokio::fs;
use tracing::debug;

use super::{BoardPositions, PositionStore};

const POSITIONS_FILE_SUFFIX: &str = "-positions.json";

/// Stores one JSON document per environment under a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePositionStore {
    dir: PathBuf,
}

impl FilePositionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn positions_path(&self, environment: &str) -> Result<PathBuf> {
        validate_environment(environment)?;
        Ok(self
            .dir
            .join(format!("{environment}{POSITIONS_FILE_SUFFIX}")))
    }
}

impl PositionStore for FilePositionStore {
    async fn load(&self, environment: &str) -> Result<BoardPositions> {
        let path = self.positions_path(environment)?;
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no saved positions; returning empty set");
                return Ok(BoardPositions::empty(environment));
            }
            Err(error) => {
                return Err(error)
                    .with_context(|| format!("failed to read `{}`", path.display()));
            }
        };

        let mut positions: BoardPositions = serde_json::from_str(&raw)
            .with_context(|| format!("invalid positions JSON in `{}`", path.display()))?;
        if positions.environment.is_empty() {
            positions.environment = environment.to_owned();
        }
        Ok(positions)
    }

    async fn save(&self, positions: &BoardPositions) -> Result<()> {
        let path = self.positions_path(&positions.environment)?;
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create `{}`", self.dir.display()))?;

        let encoded =
            serde_json::to_string_pretty(positions).context("failed to encode board positions")?;
        fs::write(&path, encoded)
            .await
            .with_context(|| format!("failed to write `{}`", path.display()))?;

        debug!(
            path = %path.display(),
            positions = positions.positions.len(),
            edge_handles = positions.edge_handles.len(),
            "saved board positions"
        );
        Ok(())
    }
}

pub fn validate_environment(environment: &str) -> Result<()> {
    ensure!(!environment.trim().is_empty(), "environment is required");
    ensure!(
        !environment.contains(['/', '\\']) && !environment.contains(".."),
        "invalid environment name `{environment}`"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::graph::{Handle, Position};
    use crate::persistence::{BoardPositions, EdgeHandleOverride, NodePosition, PositionStore};
    use crate::test_support::{remove_dir_if_exists, temp_path};

    use super::{FilePositionStore, validate_environment};

    #[test]
    fn environment_names_cannot_escape_the_store_dir() {
        assert!(validate_environment("dev").is_ok());
        assert!(validate_environment("staging-eu").is_ok());
        assert!(validate_environment("").is_err());
        assert!(validate_environment("   ").is_err());
        assert!(validate_environment("../prod").is_err());
        assert!(validate_environment("a/b").is_err());
        assert!(validate_environment("a\\b").is_err());
    }

    #[test]
    fn positions_path_uses_environment_file_name() {
        let store = FilePositionStore::new(".positions");
        let path = store.positions_path("dev").expect("path should resolve");
        assert!(path.ends_with("dev-positions.json"));
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty_positions() {
        let root = temp_path("store-missing");
        let store = FilePositionStore::new(&root);

        let loaded = store.load("dev").await.expect("missing file should load");
        assert_eq!(loaded, BoardPositions::empty("dev"));
        assert!(!root.exists(), "loading must not create the store dir");
    }

    #[tokio::test]
    async fn saved_positions_load_back() {
        let root = temp_path("store-roundtrip");
        let store = FilePositionStore::new(&root);
        let positions = BoardPositions {
            environment: "dev".to_owned(),
            positions: vec![NodePosition::new("service-worker", Position::new(500.0, 500.0))],
            edge_handles: vec![EdgeHandleOverride {
                edge_id: "edge-ecr-service-worker".to_owned(),
                source_handle: Some(Handle::Bottom),
                target_handle: None,
            }],
        };

        store.save(&positions).await.expect("save should succeed");
        let raw = fs::read_to_string(root.join("dev-positions.json")).expect("file should exist");
        assert!(raw.contains("\"nodeId\": \"service-worker\""), "{raw}");

        let loaded = store.load("dev").await.expect("load should succeed");
        assert_eq!(loaded, positions);

        remove_dir_if_exists(&root);
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let root = temp_path("store-corrupt");
        fs::create_dir_all(&root).expect("root should be created");
        fs::write(root.join("dev-positions.json"), "{not json").expect("file should be written");

        let store = FilePositionStore::new(&root);
        let error = store.load("dev").await.expect_err("corrupt file should fail");
        assert!(format!("{error:#}").contains("invalid positions JSON"));

        remove_dir_if_exists(&root);
    }
}
