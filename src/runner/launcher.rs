//! Starting simulator processes.
//!
//! The orchestrator only needs "run in this directory and report how it went";
//! `SimulatorLauncher` is that seam, so tests can substitute a fake simulator.
use crate::settings::{ExecutionMode, Settings, SimulatorCommand};
use anyhow::{anyhow, Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Simulator {
    Hazard,
    Impact,
}

impl Simulator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Simulator::Hazard => "hazard",
            Simulator::Impact => "impact",
        }
    }

    /// Return the log file name written next to the simulator inputs.
    pub fn log_file_name(&self) -> String {
        format!("{}.log", self.as_str())
    }
}

impl fmt::Display for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Captured result of one simulator process.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub success: bool,
    pub status: String,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

pub trait SimulatorLauncher {
    /// Run `simulator` with `work_dir` as its working directory, blocking
    /// until it exits.
    fn launch(&self, simulator: Simulator, work_dir: &Path) -> Result<ProcessOutput>;
}

/// Launches simulators as native binaries or containers per the settings.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    execution: ExecutionMode,
    hazard: SimulatorCommand,
    impact: SimulatorCommand,
}

impl CommandLauncher {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            execution: settings.execution,
            hazard: settings.hazard.clone(),
            impact: settings.impact.clone(),
        }
    }

    fn command_for(&self, simulator: Simulator) -> &SimulatorCommand {
        match simulator {
            Simulator::Hazard => &self.hazard,
            Simulator::Impact => &self.impact,
        }
    }

    fn build_command(&self, simulator: Simulator, work_dir: &Path) -> Result<Command> {
        let configured = self.command_for(simulator);
        let args = configured.split_args()?;
        let command = match self.execution {
            ExecutionMode::Native => {
                let program = resolve_binary(&configured.binary)?;
                let mut command = Command::new(program);
                command.args(&args).current_dir(work_dir);
                command
            }
            ExecutionMode::Container => {
                let image = configured
                    .image
                    .as_deref()
                    .ok_or_else(|| anyhow!("no container image configured for {simulator}"))?;
                let work_dir = work_dir
                    .canonicalize()
                    .with_context(|| format!("resolve {}", work_dir.display()))?;
                let mut command = Command::new(resolve_binary("docker")?);
                command
                    .arg("run")
                    .arg("--rm")
                    .arg("-v")
                    .arg(format!("{}:/data", work_dir.display()))
                    .arg("-w")
                    .arg("/data")
                    .arg(image)
                    .args(&args);
                command
            }
        };
        Ok(command)
    }
}

impl SimulatorLauncher for CommandLauncher {
    fn launch(&self, simulator: Simulator, work_dir: &Path) -> Result<ProcessOutput> {
        let mut command = self.build_command(simulator, work_dir)?;
        tracing::debug!(simulator = %simulator, command = ?command, "spawn simulator");
        let output = command
            .output()
            .with_context(|| format!("spawn {simulator} simulator"))?;
        Ok(ProcessOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Paths containing a separator are used as given; bare names go through `PATH`.
fn resolve_binary(binary: &str) -> Result<PathBuf> {
    if binary.contains(std::path::MAIN_SEPARATOR) {
        return Ok(PathBuf::from(binary));
    }
    which::which(binary).with_context(|| format!("locate simulator binary {binary:?} on PATH"))
}
