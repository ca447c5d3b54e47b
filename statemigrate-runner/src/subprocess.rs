//! External tool invocation.
//!
//! Working directory and extra environment are passed per invocation; the
//! process-wide cwd and environment are never modified.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use crate::error::{io_err, MigrationError};

/// One external command.
#[derive(Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: PathBuf,
    /// Added on top of the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, current_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: current_dir.into(),
            env: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// `program arg1 arg2`, for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// Env values are secrets; only their names are printed.
impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("current_dir", &self.current_dir)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Runs an [`Invocation`] to completion and returns its stdout.
///
/// Implementations fail with [`MigrationError::Subprocess`] on a non-zero
/// exit, carrying the captured output.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<String, MigrationError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, invocation: &Invocation) -> Result<String, MigrationError> {
        (**self).run(invocation)
    }
}

/// Spawns real processes with `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<String, MigrationError> {
        tracing::info!(
            command = %invocation.command_line(),
            dir = %invocation.current_dir.display(),
            "running"
        );
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.current_dir)
            .envs(&invocation.env)
            .output()
            .map_err(|e| io_err(&invocation.program, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MigrationError::Subprocess {
                program: invocation.program.clone(),
                args: invocation.args.clone(),
                status: output.status.to_string(),
                output: format!("{}{}", stderr, stdout).trim_end().to_string(),
            });
        }

        tracing::debug!(command = %invocation.command_line(), output = %stdout.trim_end(), "command finished");
        Ok(stdout)
    }
}
