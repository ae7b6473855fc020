//! Scene artifacts
//!
//! The raw generation response for a moment is archived outside the graph at
//! `{data_dir}/scenes/{path segments}/scene.json`.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

const SCENES_DIR: &str = "scenes";
const SCENE_FILE: &str = "scene.json";

#[derive(Debug, Clone)]
pub struct SceneStore {
    root: PathBuf,
}

impl SceneStore {
    /// Store rooted at `{data_dir}/scenes`
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            root: data_dir.as_ref().join(SCENES_DIR),
        }
    }

    /// File holding the scene for `path`
    ///
    /// Empty, `.` and `..` segments are dropped so a path cannot escape the
    /// scenes directory.
    pub fn scene_file(&self, path: &str) -> PathBuf {
        let mut file = self.root.clone();
        for segment in path
            .split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        {
            file.push(segment);
        }
        file.push(SCENE_FILE);
        file
    }

    pub async fn save(&self, path: &str, scene: &Value) -> Result<PathBuf> {
        let file = self.scene_file(path);
        if let Some(dir) = file.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create scene directory {}", dir.display()))?;
        }

        let body = serde_json::to_string_pretty(scene).context("Failed to serialize scene")?;
        tokio::fs::write(&file, body)
            .await
            .with_context(|| format!("Failed to write scene {}", file.display()))?;

        tracing::info!("Scene saved to {}", file.display());
        Ok(file)
    }

    /// Load the scene for `path`, `None` when none was saved
    pub async fn load(&self, path: &str) -> Result<Option<Value>> {
        let file = self.scene_file(path);
        if !tokio::fs::try_exists(&file).await.unwrap_or(false) {
            return Ok(None);
        }

        let body = tokio::fs::read_to_string(&file)
            .await
            .with_context(|| format!("Failed to read scene {}", file.display()))?;
        let scene = serde_json::from_str(&body)
            .with_context(|| format!("Failed to parse scene {}", file.display()))?;
        Ok(Some(scene))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = SceneStore::new(temp_dir.path());
        let path = "/-480/august/20/0600/greece/central-greece/thermopylae/battle-of-thermopylae";

        let file = store.save(path, &json!({"name": "Battle of Thermopylae"})).await?;
        assert!(file.ends_with(
            "scenes/-480/august/20/0600/greece/central-greece/thermopylae/battle-of-thermopylae/scene.json"
        ));

        let loaded = store.load(path).await?;
        assert_eq!(loaded, Some(json!({"name": "Battle of Thermopylae"})));
        assert_eq!(store.load("/1969/july").await?, None);
        Ok(())
    }

    #[test]
    fn test_scene_file_stays_inside_root() {
        let store = SceneStore::new("/data");
        assert_eq!(
            store.scene_file("/../../etc/passwd"),
            PathBuf::from("/data/scenes/etc/passwd/scene.json")
        );
    }
}
