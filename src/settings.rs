//! User settings: where the database lives and how simulators are launched.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub database_root: PathBuf,
    pub database_name: String,
    /// Remove orphaned and unfinished output when a catalog opens.
    #[serde(default)]
    pub delete_crashed_runs: bool,
    #[serde(default)]
    pub execution: ExecutionMode,
    #[serde(default = "default_hazard_command")]
    pub hazard: SimulatorCommand,
    #[serde(default = "default_impact_command")]
    pub impact: SimulatorCommand,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Native,
    Container,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Native => "native",
            ExecutionMode::Container => "container",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one simulator is started.
///
/// `binary` is used for native execution, `image` for container execution;
/// `args` is a shell-style argument string appended in both cases.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SimulatorCommand {
    pub binary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub args: String,
}

impl SimulatorCommand {
    pub fn split_args(&self) -> Result<Vec<String>> {
        shell_words::split(&self.args)
            .with_context(|| format!("parse simulator arguments: {}", self.args))
    }
}

fn default_hazard_command() -> SimulatorCommand {
    SimulatorCommand {
        binary: "sfincs".to_string(),
        image: Some("deltares/sfincs-cpu:latest".to_string()),
        args: String::new(),
    }
}

fn default_impact_command() -> SimulatorCommand {
    SimulatorCommand {
        binary: "fiat".to_string(),
        image: Some("deltares/fiat:latest".to_string()),
        args: String::new(),
    }
}

/// Command-line values that take precedence over the settings file.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub database_root: Option<PathBuf>,
    pub database_name: Option<String>,
    pub delete_crashed_runs: bool,
}

impl Settings {
    pub fn new(database_root: &Path, database_name: &str) -> Self {
        Self {
            database_root: database_root.to_path_buf(),
            database_name: database_name.to_string(),
            delete_crashed_runs: false,
            execution: ExecutionMode::default(),
            hazard: default_hazard_command(),
            impact: default_impact_command(),
        }
    }

    pub fn load(path: &Path) -> Result<Settings> {
        let text =
            fs::read_to_string(path).with_context(|| format!("read settings {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parse settings {}", path.display()))
    }

    /// Load settings from an explicit file, the default location, or the
    /// overrides alone, in that order, then apply the overrides.
    pub fn resolve(explicit: Option<&Path>, overrides: &SettingsOverrides) -> Result<Settings> {
        let from_file = match explicit {
            Some(path) => Some(Settings::load(path)?),
            None => match default_settings_path() {
                Some(path) if path.is_file() => Some(Settings::load(&path)?),
                _ => None,
            },
        };
        let mut settings = match (from_file, &overrides.database_root, &overrides.database_name) {
            (Some(settings), _, _) => settings,
            (None, Some(root), Some(name)) => Settings::new(root, name),
            (None, _, _) => {
                return Err(anyhow!(
                    "no settings file found; pass --settings or both --root and --name"
                ))
            }
        };
        if let Some(root) = &overrides.database_root {
            settings.database_root = root.clone();
        }
        if let Some(name) = &overrides.database_name {
            settings.database_name = name.clone();
        }
        if overrides.delete_crashed_runs {
            settings.delete_crashed_runs = true;
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_name.trim().is_empty() {
            return Err(anyhow!("database_name must be non-empty"));
        }
        for (label, command) in [("hazard", &self.hazard), ("impact", &self.impact)] {
            command.split_args()?;
            match self.execution {
                ExecutionMode::Native if command.binary.trim().is_empty() => {
                    return Err(anyhow!("{label}.binary is required for native execution"));
                }
                ExecutionMode::Container if command.image.is_none() => {
                    return Err(anyhow!("{label}.image is required for container execution"));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// `<config_dir>/floodcat/settings.toml`, falling back to the home directory.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join("floodcat").join("settings.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_file_values() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("settings.toml");
        fs::write(
            &path,
            r#"
database_root = "/srv/floodcat"
database_name = "charleston"
execution = "container"

[hazard]
binary = "sfincs"
image = "sfincs:2.1"
args = "--threads 4"
"#,
        )
        .expect("write settings");

        let overrides = SettingsOverrides {
            database_name: Some("tampa".to_string()),
            delete_crashed_runs: true,
            ..SettingsOverrides::default()
        };
        let settings = Settings::resolve(Some(&path), &overrides).expect("resolve settings");
        assert_eq!(settings.database_root, PathBuf::from("/srv/floodcat"));
        assert_eq!(settings.database_name, "tampa");
        assert!(settings.delete_crashed_runs);
        assert_eq!(settings.execution, ExecutionMode::Container);
        assert_eq!(
            settings.hazard.split_args().expect("split args"),
            vec!["--threads", "4"]
        );
        assert_eq!(settings.impact, default_impact_command());
    }

    #[test]
    fn root_and_name_suffice_without_a_file() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let overrides = SettingsOverrides {
            database_root: Some(temp.path().to_path_buf()),
            database_name: Some("site".to_string()),
            delete_crashed_runs: false,
        };
        let missing = temp.path().join("absent.toml");
        assert!(Settings::resolve(Some(&missing), &overrides).is_err());

        let settings = Settings::new(temp.path(), "site");
        settings.validate().expect("default settings are valid");
        assert_eq!(settings.execution, ExecutionMode::Native);
    }
}
