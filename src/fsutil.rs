//! Filesystem helpers shared by the stores and runners.
use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current epoch time in milliseconds for artifact timestamps.
pub fn now_epoch_ms() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("compute timestamp")?
        .as_millis())
}

pub fn modified_epoch_ms(path: &Path) -> Result<u128> {
    let modified = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .with_context(|| format!("stat {}", path.display()))?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .context("compute modification time")?
        .as_millis())
}

pub fn collect_files_recursive(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !root.exists() {
        return Ok(files);
    }
    for entry in fs::read_dir(root).with_context(|| format!("read {}", root.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            files.extend(collect_files_recursive(&path)?);
        } else if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Copy `source` into `dest`, skipping any path whose component matches `exclude`.
///
/// Returns the number of files copied.
pub fn copy_dir_recursive(source: &Path, dest: &Path, exclude: &[&str]) -> Result<usize> {
    if !source.is_dir() {
        return Err(anyhow!("copy source {} is not a directory", source.display()));
    }
    fs::create_dir_all(dest).with_context(|| format!("create {}", dest.display()))?;
    let mut copied = 0;
    for file in collect_files_recursive(source)? {
        let rel = file
            .strip_prefix(source)
            .context("strip copy source prefix")?;
        let excluded = rel.components().any(|component| {
            exclude
                .iter()
                .any(|name| component.as_os_str() == std::ffi::OsStr::new(name))
        });
        if excluded {
            continue;
        }
        let target = dest.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::copy(&file, &target)
            .with_context(|| format!("copy {} to {}", file.display(), target.display()))?;
        copied += 1;
    }
    Ok(copied)
}

/// Remove a directory tree if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    fs::remove_dir_all(path).with_context(|| format!("remove {}", path.display()))?;
    Ok(true)
}

/// Remove a directory only when nothing is left inside it.
pub fn remove_dir_if_empty(path: &Path) -> Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    let mut entries = fs::read_dir(path).with_context(|| format!("read {}", path.display()))?;
    if entries.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(path).with_context(|| format!("remove {}", path.display()))?;
    Ok(true)
}

/// Sorted names of the immediate subdirectories of `root`.
pub fn subdirectory_names(root: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    if !root.is_dir() {
        return Ok(names);
    }
    for entry in fs::read_dir(root).with_context(|| format!("read {}", root.display()))? {
        let entry = entry?;
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry
            .file_name()
            .into_string()
            .map_err(|raw| anyhow!("directory name {raw:?} is not valid UTF-8"))?;
        names.push(name);
    }
    names.sort();
    Ok(names)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(value).context("serialize JSON")?;
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
}

/// Hex blake3 digest of a file's bytes, or `None` when the file is absent.
pub fn file_digest(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(Some(blake3::hash(&bytes).to_hex().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_skips_excluded_components() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let source = temp.path().join("src");
        fs::create_dir_all(source.join("simulations").join("run1")).expect("mkdir");
        fs::create_dir_all(source.join("maps")).expect("mkdir");
        fs::write(source.join("simulations").join("run1").join("big.nc"), b"x").expect("write");
        fs::write(source.join("maps").join("depth.tif"), b"y").expect("write");
        fs::write(source.join("floodmap.json"), b"{}").expect("write");

        let dest = temp.path().join("dest");
        let copied = copy_dir_recursive(&source, &dest, &["simulations"]).expect("copy");

        assert_eq!(copied, 2);
        assert!(dest.join("maps").join("depth.tif").is_file());
        assert!(dest.join("floodmap.json").is_file());
        assert!(!dest.join("simulations").exists());
    }

    #[test]
    fn remove_dir_if_empty_keeps_populated_dirs() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let full = temp.path().join("full");
        fs::create_dir_all(&full).expect("mkdir");
        fs::write(full.join("keep.txt"), b"x").expect("write");
        let empty = temp.path().join("empty");
        fs::create_dir_all(&empty).expect("mkdir");

        assert!(!remove_dir_if_empty(&full).expect("check full"));
        assert!(remove_dir_if_empty(&empty).expect("remove empty"));
        assert!(full.is_dir());
        assert!(!empty.exists());
    }
}
