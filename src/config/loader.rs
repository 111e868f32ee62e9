//! Single-run config file loader and serialization (§6).
//!
//! Accepts `.json` with the teacher's strict-extension convention; `.yaml`/
//! `.yml` is accepted too since batch overlays commonly come as YAML, falling
//! back to JSON for any other/unknown extension.

use crate::error::ConfigError;
use crate::models::RunConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// `~/.config/tn-bench/config.json`
pub fn get_global_config_path() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or_else(|| ConfigError::BatchParse {
        path: "~".to_string(),
        reason: "cannot determine home directory".to_string(),
    })?;
    Ok(home.join(".config/tn-bench").join("config.json"))
}

pub fn ensure_config_dir_exists() -> Result<(), ConfigError> {
    let home = dirs::home_dir().ok_or_else(|| ConfigError::BatchParse {
        path: "~".to_string(),
        reason: "cannot determine home directory".to_string(),
    })?;
    fs::create_dir_all(home.join(".config/tn-bench"))?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Yaml,
}

fn detect_format(path: &Path) -> ConfigFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => ConfigFormat::Yaml,
        _ => ConfigFormat::Json,
    }
}

/// Load a `RunConfig` from a file, dispatching on extension (JSON by default,
/// YAML for `.yaml`/`.yml`).
pub fn load_config_from_file(path: &Path) -> Result<RunConfig, ConfigError> {
    validate_config_path(path)?;

    let content = fs::read_to_string(path).map_err(std::io::Error::from)?;

    match detect_format(path) {
        ConfigFormat::Yaml => serde_yaml::from_str(&content).map_err(|e| ConfigError::BatchParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        }),
        ConfigFormat::Json => serde_json::from_str(&content).map_err(|e| ConfigError::BatchParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}

pub fn save_config_to_file(config: &RunConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = match detect_format(path) {
        ConfigFormat::Yaml => serde_yaml::to_string(config).map_err(|e| ConfigError::BatchParse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?,
        ConfigFormat::Json => serde_json::to_string_pretty(config).map_err(|e| {
            ConfigError::BatchParse {
                path: path.display().to_string(),
                reason: e.to_string(),
            }
        })?,
    };

    fs::write(path, content)?;
    Ok(())
}

/// Validate the config path has a recognised extension (`.json`, `.yaml`, `.yml`).
pub fn validate_config_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::UnknownPool(
            "configuration path cannot be empty".to_string(),
        ));
    }

    match path.extension().and_then(|e| e.to_str()) {
        Some("json") | Some("yaml") | Some("yml") => Ok(()),
        Some(ext) => Err(ConfigError::BatchParse {
            path: path.display().to_string(),
            reason: format!("unsupported config extension: .{ext}"),
        }),
        None => Err(ConfigError::BatchParse {
            path: path.display().to_string(),
            reason: "config file must have a .json, .yaml, or .yml extension".to_string(),
        }),
    }
}

/// List config files (`.json`/`.yaml`/`.yml`) under a directory, recursively.
pub fn list_config_files(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    if !dir.is_dir() {
        return Err(ConfigError::BatchParse {
            path: dir.display().to_string(),
            reason: "not a directory".to_string(),
        });
    }

    let mut files = Vec::new();
    fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                walk(&path, files)?;
            } else if matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("json") | Some("yaml") | Some("yml")
            ) {
                files.push(path);
            }
        }
        Ok(())
    }
    walk(dir, &mut files)?;
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trips_json_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.json");

        let mut cfg = RunConfig::default();
        cfg.selected_pools = vec!["tank".to_string()];
        cfg.zfs_iterations = 5;

        save_config_to_file(&cfg, &path).unwrap();
        let loaded = load_config_from_file(&path).unwrap();
        assert_eq!(loaded.selected_pools, vec!["tank".to_string()]);
        assert_eq!(loaded.zfs_iterations, 5);
    }

    #[test]
    fn round_trips_yaml_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.yaml");

        let cfg = RunConfig::default();
        save_config_to_file(&cfg, &path).unwrap();
        let loaded = load_config_from_file(&path).unwrap();
        assert_eq!(loaded.zfs_iterations, cfg.zfs_iterations);
    }

    #[test]
    fn rejects_unknown_extension() {
        assert!(validate_config_path(Path::new("config.txt")).is_err());
    }

    #[test]
    fn rejects_empty_path() {
        assert!(validate_config_path(Path::new("")).is_err());
    }

    #[test]
    fn list_config_files_finds_nested() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        save_config_to_file(&RunConfig::default(), &base.join("a.json")).unwrap();
        fs::create_dir_all(base.join("sub")).unwrap();
        save_config_to_file(&RunConfig::default(), &base.join("sub/b.yaml")).unwrap();
        fs::write(base.join("ignored.txt"), "x").unwrap();

        let files = list_config_files(base).unwrap();
        assert_eq!(files.len(), 2);
    }
}
