//! File-backed CRUD for one object kind.
//!
//! Definitions live at `input/<kind>/<name>/<name>.toml`; any other file in the
//! object directory is an auxiliary file (geometry, timeseries) that travels
//! with the object on copy and delete.
use crate::error::CatalogError;
use crate::fsutil;
use crate::objects::{DomainObject, ObjectKind};
use crate::paths::DatabasePaths;
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::marker::PhantomData;
use std::path::PathBuf;

/// Listing entry for one stored object.
#[derive(Debug, Clone)]
pub struct ObjectInfo<T> {
    pub name: String,
    pub description: String,
    pub last_modified_epoch_ms: u128,
    pub path: PathBuf,
    pub object: T,
}

#[derive(Debug, Clone)]
pub struct ObjectStore<T: DomainObject> {
    paths: DatabasePaths,
    standard: BTreeSet<String>,
    _kind: PhantomData<T>,
}

impl<T: DomainObject> ObjectStore<T> {
    pub fn new<I>(paths: DatabasePaths, standard: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            paths,
            standard: standard.into_iter().collect(),
            _kind: PhantomData,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        T::KIND
    }

    pub fn paths(&self) -> &DatabasePaths {
        &self.paths
    }

    /// Whether site configuration protects `name` from edit and delete.
    pub fn is_standard(&self, name: &str) -> bool {
        self.standard.contains(name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.paths.definition_path(T::KIND, name).is_file()
    }

    pub fn get(&self, name: &str) -> Result<T> {
        load_definition(&self.paths, name)
    }

    /// Names of every object directory of this kind.
    pub fn names(&self) -> Result<Vec<String>> {
        fsutil::subdirectory_names(&self.paths.kind_dir(T::KIND))
    }

    /// Load every definition with its listing metadata.
    ///
    /// A directory without its definition file means the catalog is corrupt,
    /// so it fails the whole listing instead of being skipped.
    pub fn list(&self) -> Result<Vec<ObjectInfo<T>>> {
        let mut infos = Vec::new();
        for name in self.names()? {
            let path = require_definition_file::<T>(&self.paths, &name)?;
            let object = load_definition::<T>(&self.paths, &name)?;
            infos.push(ObjectInfo {
                name,
                description: object.description().to_string(),
                last_modified_epoch_ms: fsutil::modified_epoch_ms(&path)?,
                path,
                object,
            });
        }
        Ok(infos)
    }

    /// Persist a definition.
    ///
    /// Overwriting goes through `delete(definition_only = true)`, so protected
    /// objects stay protected and the stale output is removed.
    pub fn save(&self, object: &T, overwrite: bool) -> Result<()> {
        let name = object.name();
        object.validate()?;
        object.validate_references(&self.paths)?;
        if self.exists(name) {
            if !overwrite {
                return Err(CatalogError::AlreadyExists {
                    kind: T::KIND,
                    name: name.to_string(),
                }
                .into());
            }
            self.delete(name, true)?;
        }
        self.write_definition(object)?;
        tracing::info!(kind = %T::KIND, name, overwrite, "saved definition");
        Ok(())
    }

    /// Rewrite an existing definition in place without the in-use check.
    ///
    /// For objects a higher-level object derives and owns; the caller clears
    /// whatever output was computed from the old definition.
    pub fn replace_derived(&self, object: &T) -> Result<()> {
        let name = object.name();
        object.validate()?;
        object.validate_references(&self.paths)?;
        if !self.exists(name) {
            return Err(CatalogError::not_found(T::KIND, name).into());
        }
        if self.is_standard(name) {
            return Err(CatalogError::InUse {
                kind: T::KIND,
                name: name.to_string(),
                reason: "it is a standard object of this site".to_string(),
                used_by: Vec::new(),
            }
            .into());
        }
        self.write_definition(object)?;
        self.clear_output(name)?;
        tracing::info!(kind = %T::KIND, name, "replaced derived definition");
        Ok(())
    }

    fn write_definition(&self, object: &T) -> Result<()> {
        let name = object.name();
        let object_dir = self.paths.object_dir(T::KIND, name);
        fs::create_dir_all(&object_dir)
            .with_context(|| format!("create {}", object_dir.display()))?;
        let path = self.paths.definition_path(T::KIND, name);
        let text = toml::to_string_pretty(object)
            .with_context(|| format!("serialize {} '{name}'", T::KIND))?;
        fs::write(&path, text.as_bytes()).with_context(|| format!("write {}", path.display()))
    }

    /// Replace an existing definition; its computed output becomes stale.
    pub fn edit(&self, object: &T) -> Result<()> {
        let name = object.name();
        if !self.exists(name) {
            return Err(CatalogError::not_found(T::KIND, name).into());
        }
        self.save(object, true)?;
        self.clear_output(name)?;
        Ok(())
    }

    /// Remove a definition and any output computed from it.
    ///
    /// With `definition_only` the auxiliary files stay and the object directory
    /// is removed only once empty.
    pub fn delete(&self, name: &str, definition_only: bool) -> Result<()> {
        if !self.exists(name) {
            return Err(CatalogError::not_found(T::KIND, name).into());
        }
        if self.is_standard(name) {
            return Err(CatalogError::InUse {
                kind: T::KIND,
                name: name.to_string(),
                reason: "it is a standard object of this site".to_string(),
                used_by: Vec::new(),
            }
            .into());
        }
        let used_by = self.check_higher_level_usage(name)?;
        if !used_by.is_empty() {
            return Err(CatalogError::InUse {
                kind: T::KIND,
                name: name.to_string(),
                reason: format!("it is used by {}", used_by.join(", ")),
                used_by,
            }
            .into());
        }

        let object_dir = self.paths.object_dir(T::KIND, name);
        if definition_only {
            let path = self.paths.definition_path(T::KIND, name);
            fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
            fsutil::remove_dir_if_empty(&object_dir)?;
        } else {
            fsutil::remove_dir_all_if_exists(&object_dir)?;
        }
        self.clear_output(name)?;
        tracing::info!(kind = %T::KIND, name, definition_only, "deleted definition");
        Ok(())
    }

    /// Save a renamed copy of `old_name` and duplicate its auxiliary files.
    pub fn copy(&self, old_name: &str, new_name: &str, new_description: &str) -> Result<T> {
        let mut object = self.get(old_name)?;
        object.set_name(new_name.to_string());
        object.set_description(new_description.to_string());
        self.save(&object, false)?;

        let old_dir = self.paths.object_dir(T::KIND, old_name);
        let old_definition = self.paths.definition_path(T::KIND, old_name);
        let new_dir = self.paths.object_dir(T::KIND, new_name);
        let mut copied = 0;
        for file in fsutil::collect_files_recursive(&old_dir)? {
            if file == old_definition {
                continue;
            }
            let rel = file
                .strip_prefix(&old_dir)
                .context("strip object directory prefix")?;
            let target = new_dir.join(rel);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::copy(&file, &target)
                .with_context(|| format!("copy {} to {}", file.display(), target.display()))?;
            copied += 1;
        }
        tracing::info!(
            kind = %T::KIND,
            from = old_name,
            to = new_name,
            aux_files = copied,
            "copied definition"
        );
        Ok(object)
    }

    /// Names of higher-level objects that reference `name`.
    pub fn check_higher_level_usage(&self, name: &str) -> Result<Vec<String>> {
        let mut users = T::higher_level_usage(&self.paths, name)?;
        users.sort();
        users.dedup();
        Ok(users)
    }

    /// Remove the output computed from `name`, if its kind has any.
    pub fn clear_output(&self, name: &str) -> Result<()> {
        if let Some(output_dir) = self.paths.object_output_dir(T::KIND, name) {
            if fsutil::remove_dir_all_if_exists(&output_dir)? {
                tracing::info!(
                    kind = %T::KIND,
                    name,
                    path = %output_dir.display(),
                    "removed stale output"
                );
            }
        }
        Ok(())
    }
}

/// Load one definition by name without constructing a store.
pub fn load_definition<T: DomainObject>(paths: &DatabasePaths, name: &str) -> Result<T> {
    let path = paths.definition_path(T::KIND, name);
    if !path.is_file() {
        return Err(CatalogError::not_found(T::KIND, name).into());
    }
    let text = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let object: T = toml::from_str(&text).with_context(|| format!("parse {}", path.display()))?;
    if object.name() != name {
        return Err(CatalogError::validation(
            T::KIND,
            name,
            format!(
                "definition {} declares name '{}'",
                path.display(),
                object.name()
            ),
        )
        .into());
    }
    // Definitions are hand-editable, so a file is checked like a fresh save.
    object
        .validate()
        .with_context(|| format!("load {}", path.display()))?;
    Ok(object)
}

/// Load every definition of a kind; fails on any directory missing its file.
pub fn read_all<T: DomainObject>(paths: &DatabasePaths) -> Result<Vec<T>> {
    let mut objects = Vec::new();
    for name in fsutil::subdirectory_names(&paths.kind_dir(T::KIND))? {
        require_definition_file::<T>(paths, &name)?;
        objects.push(load_definition::<T>(paths, &name)?);
    }
    Ok(objects)
}

fn require_definition_file<T: DomainObject>(paths: &DatabasePaths, name: &str) -> Result<PathBuf> {
    let path = paths.definition_path(T::KIND, name);
    if !path.is_file() {
        return Err(anyhow!(
            "corrupt catalog: {} directory '{name}' has no definition file {}",
            T::KIND,
            path.display()
        ));
    }
    Ok(path)
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
