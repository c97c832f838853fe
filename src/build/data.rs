//! Data stage: global template data from JSON and YAML files.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::builder::BuildError;

/// Read every `*.json`, `*.yaml` and `*.yml` file directly inside each dir
/// into a map keyed by file stem. Later dirs override earlier ones.
pub fn gather_data(dirs: &[PathBuf]) -> Result<Map<String, Value>, BuildError> {
    let mut data = Map::new();
    for dir in dirs {
        if !dir.is_dir() {
            tracing::warn!(path = %dir.display(), "data directory not found, skipping");
            continue;
        }
        for path in data_files(dir)? {
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let value = read_data_file(&path)?;
            tracing::debug!(path = %path.display(), key = %stem, "loaded data file");
            data.insert(stem, value);
        }
    }
    Ok(data)
}

/// Data files in `dir`, sorted by name.
fn data_files(dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let io_error = |source| BuildError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        let is_data = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("json" | "yaml" | "yml")
        );
        if is_data && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_data_file(path: &Path) -> Result<Value, BuildError> {
    let text = std::fs::read_to_string(path).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&text).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(&text).map_err(|e| e.to_string())
    };
    parsed.map_err(|message| BuildError::Data {
        path: path.to_path_buf(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_gather_data_by_stem() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("versions.json"), r#"{"latest": "2.1"}"#).unwrap();
        std::fs::write(dir.path().join("team.yaml"), "lead: Sam\nsize: 4\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let data = gather_data(&[dir.path().to_path_buf()]).unwrap();

        assert_eq!(data.len(), 2);
        assert_eq!(data["versions"], json!({ "latest": "2.1" }));
        assert_eq!(data["team"], json!({ "lead": "Sam", "size": 4 }));
    }

    #[test]
    fn test_later_dirs_override() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        std::fs::write(first.path().join("site.yml"), "name: one").unwrap();
        std::fs::write(second.path().join("site.json"), r#"{"name": "two"}"#).unwrap();

        let data = gather_data(&[first.path().to_path_buf(), second.path().to_path_buf()]).unwrap();

        assert_eq!(data["site"], json!({ "name": "two" }));
    }

    #[test]
    fn test_missing_dir_is_skipped() {
        let dir = TempDir::new().unwrap();
        let data = gather_data(&[dir.path().join("absent")]).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_malformed_file_names_path() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ nope").unwrap();

        let err = gather_data(&[dir.path().to_path_buf()]).unwrap_err();

        assert!(matches!(err, BuildError::Data { .. }));
        assert!(err.to_string().contains("broken.json"));
    }
}
