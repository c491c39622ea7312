//! Centralized directory structure management for SkillSwap
//!
//! Directory layout:
//! ```text
//! skillswap_data/
//! └── profile_images/   # Copies of picked profile pictures
//! ```
//!
//! The persistent config file lives outside the data root, at
//! `<config_dir>/skillswap/config.json`.

use anyhow::Context;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

pub const ROOT_ENV: &str = "SKILLSWAP_ROOT";
const DEFAULT_ROOT: &str = "skillswap_data";
const DEFAULT_IMAGE_EXT: &str = "jpg";

/// Get the global configuration path
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("skillswap").join("config.json"))
}

/// Read the persistent config file as raw JSON. Missing or unreadable files
/// yield `None`; callers pick out the keys they own.
pub fn read_config_file() -> Option<Value> {
    read_config_at(&config_path()?)
}

pub fn read_config_at(path: &Path) -> Option<Value> {
    if !path.exists() {
        return None;
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<Value>(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to parse config file at {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            warn!("Failed to read config file at {:?}: {}", path, e);
            None
        }
    }
}

/// Load the persistent root from config file
pub fn load_persistent_root() -> Option<PathBuf> {
    root_from_config(&read_config_file()?)
}

fn root_from_config(config: &Value) -> Option<PathBuf> {
    config.get("root")?.as_str().map(PathBuf::from)
}

/// Save a path as the persistent root, keeping any other keys in the file.
pub fn save_persistent_root(root: &Path) -> anyhow::Result<()> {
    let path = config_path().ok_or_else(|| anyhow::anyhow!("Could not determine config dir"))?;
    save_root_at(&path, root)
}

fn save_root_at(path: &Path, root: &Path) -> anyhow::Result<()> {
    let mut config = match read_config_at(path) {
        Some(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    config.insert(
        "root".to_string(),
        Value::String(root.to_string_lossy().into_owned()),
    );

    ensure_parent(path)?;
    fs::write(path, serde_json::to_string_pretty(&Value::Object(config))?)?;
    Ok(())
}

/// Resolution order: environment, persistent config, platform data dir, cwd.
pub fn resolve_root(
    env_value: Option<String>,
    persisted: Option<PathBuf>,
    data_dir: Option<PathBuf>,
) -> PathBuf {
    if let Some(val) = env_value.filter(|v| !v.trim().is_empty()) {
        return PathBuf::from(val);
    }
    if let Some(root) = persisted {
        return root;
    }
    if let Some(dir) = data_dir {
        return dir.join("skillswap");
    }
    PathBuf::from(DEFAULT_ROOT)
}

/// Get the SKILLSWAP_ROOT directory from environment, persistent config, or default
pub fn skillswap_root() -> PathBuf {
    resolve_root(
        std::env::var(ROOT_ENV).ok(),
        load_persistent_root(),
        dirs::data_dir(),
    )
}

/// Set the SKILLSWAP_ROOT directory at runtime
pub fn set_skillswap_root(path: &Path) {
    info!("Setting {} to: {:?}", ROOT_ENV, path);
    std::env::set_var(ROOT_ENV, path);
}

/// Relocated profile pictures
pub fn profile_images_dir() -> PathBuf {
    skillswap_root().join("profile_images")
}

/// Ensure a single directory exists
pub fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
        info!("Created directory: {:?}", path);
    }
    Ok(())
}

/// Ensure a file's parent directory exists
pub fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    Ok(())
}

/// Initialize the complete directory structure
/// Call this once at startup before any other operations
pub fn init_structure() -> anyhow::Result<PathBuf> {
    let root = skillswap_root();

    ensure_dir(&root)?;
    ensure_dir(&profile_images_dir())?;

    let canonical = fs::canonicalize(&root).unwrap_or_else(|_| root.clone());

    info!("SkillSwap directory structure initialized at: {:?}", canonical);

    Ok(canonical)
}

/// Copy a picked image into the profile image directory under a generated
/// name. The source is left in place. Returns the new location, which is
/// what the profile stores.
pub fn import_profile_image(src: &Path) -> anyhow::Result<PathBuf> {
    import_profile_image_into(src, &profile_images_dir())
}

pub fn import_profile_image_into(src: &Path, dir: &Path) -> anyhow::Result<PathBuf> {
    if !src.is_file() {
        anyhow::bail!("Image not found: {:?}", src);
    }
    ensure_dir(dir)?;

    let ext = src
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or(DEFAULT_IMAGE_EXT);
    let dest = unique_destination(dir, ext);

    fs::copy(src, &dest).with_context(|| format!("copying {:?} to {:?}", src, dest))?;

    info!("Profile image stored at {:?}", dest);
    Ok(dest)
}

/// Remove an imported image that ended up unused.
pub fn discard_profile_image(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("Could not remove unused image {:?}: {}", path, e);
    }
}

fn unique_destination(dir: &Path, ext: &str) -> PathBuf {
    let mut millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    loop {
        let candidate = dir.join(format!("profile_{}.{}", millis, ext));
        if !candidate.exists() {
            return candidate;
        }
        millis += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_resolution_order() {
        let persisted = Some(PathBuf::from("/persisted"));
        let data = Some(PathBuf::from("/data"));

        assert_eq!(
            resolve_root(Some("/env".into()), persisted.clone(), data.clone()),
            PathBuf::from("/env")
        );
        assert_eq!(
            resolve_root(Some("  ".into()), persisted.clone(), data.clone()),
            PathBuf::from("/persisted")
        );
        assert_eq!(
            resolve_root(None, None, data),
            PathBuf::from("/data").join("skillswap")
        );
        assert_eq!(resolve_root(None, None, None), PathBuf::from(DEFAULT_ROOT));
    }

    #[test]
    fn test_import_copies_file_with_generated_name() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("picked.png");
        fs::write(&src, b"img").unwrap();
        let dir = tmp.path().join("profile_images");

        let dest = import_profile_image_into(&src, &dir).unwrap();

        assert_eq!(fs::read(&src).unwrap(), b"img");
        assert_eq!(fs::read(&dest).unwrap(), b"img");
        assert_eq!(dest.parent().unwrap(), dir.as_path());
        let name = dest.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("profile_"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn test_import_defaults_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("picked");
        fs::write(&src, b"img").unwrap();

        let dest = import_profile_image_into(&src, tmp.path()).unwrap();
        assert_eq!(dest.extension().unwrap(), "jpg");
    }

    #[test]
    fn test_import_twice_does_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("out");
        let a = tmp.path().join("a.jpg");
        let b = tmp.path().join("b.jpg");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();

        let first = import_profile_image_into(&a, &dir).unwrap();
        let second = import_profile_image_into(&b, &dir).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_import_missing_source_fails() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(import_profile_image_into(&tmp.path().join("nope.jpg"), tmp.path()).is_err());
    }

    #[test]
    fn test_discard_removes_only_the_copy() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("picked.jpg");
        fs::write(&src, b"img").unwrap();

        let dest = import_profile_image_into(&src, &tmp.path().join("out")).unwrap();
        discard_profile_image(&dest);

        assert!(!dest.exists());
        assert!(src.exists());
    }

    #[test]
    fn test_save_root_keeps_other_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("skillswap").join("config.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"database_url": "http://db.test"}"#).unwrap();

        save_root_at(&path, Path::new("/srv/skillswap")).unwrap();

        let config = read_config_at(&path).unwrap();
        assert_eq!(config["database_url"], "http://db.test");
        assert_eq!(
            root_from_config(&config),
            Some(PathBuf::from("/srv/skillswap"))
        );
    }

    #[test]
    fn test_unparsable_config_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(read_config_at(&path).is_none());
    }
}
