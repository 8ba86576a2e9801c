// PCES-SWEEP: Parameter Sweeps over External Network Simulations with Box-Plot Summaries
// Copyright (C) 2024-2025 Roland Schmid <roschmi@ethz.ch> and Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//! Invocation of the external model builder and simulator for a single variant.
//!
//! The builder reads its flags from one shared input file in its working directory, so two
//! variants must never run against the same directories at the same time. Use
//! [`ExternalRunner::isolated`] to obtain a runner that works on a private copy.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    process::{Command, Output},
};

use thiserror::Error;

use super::TranslatedParameters;

/// Number of trailing stderr lines kept in error messages.
const STDERR_TAIL: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Compile,
    Build,
    Simulation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Compile => write!(f, "compile"),
            Stage::Build => write!(f, "build"),
            Stage::Simulation => write!(f, "simulation"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Cannot read base arguments {0:?}: {1}")]
    BaseArgs(PathBuf, #[source] io::Error),
    #[error("Cannot read pass-through arguments {0:?}: {1}")]
    Passthru(PathBuf, #[source] io::Error),
    #[error("Cannot write builder input {0:?}: {1}")]
    WriteInput(PathBuf, #[source] io::Error),
    #[error("Cannot start the {stage} step {program:?}: {source}")]
    Spawn {
        stage: Stage,
        program: PathBuf,
        source: io::Error,
    },
    #[error("Compiling {exe} failed: {reason}")]
    Compile { exe: String, reason: String },
    #[error("Builder exited with {status}: {stderr}")]
    Build { status: String, stderr: String },
    #[error("Builder did not produce {0:?}")]
    MissingArtifact(PathBuf),
    #[error("Simulator exited with {status}: {stderr}")]
    Simulation { status: String, stderr: String },
    #[error("Cannot isolate the working directories in {0:?}: {1}")]
    Isolation(PathBuf, #[source] io::Error),
}

impl RunError {
    /// The step of the pipeline that failed.
    pub fn stage(&self) -> Stage {
        match self {
            RunError::Spawn { stage, .. } => *stage,
            RunError::Compile { .. } => Stage::Compile,
            RunError::Simulation { .. } => Stage::Simulation,
            RunError::BaseArgs(..)
            | RunError::Passthru(..)
            | RunError::WriteInput(..)
            | RunError::Build { .. }
            | RunError::MissingArtifact(_)
            | RunError::Isolation(..) => Stage::Build,
        }
    }
}

/// Runs one variant given its builder flags and returns the simulator's standard output.
pub trait Invoke {
    fn invoke(&mut self, params: &TranslatedParameters) -> Result<String, RunError>;
}

/// An external executable living in its own working directory, called as `<exe> -is <input>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tool {
    pub dir: PathBuf,
    pub exe: String,
    pub input: String,
    /// Command (run inside `dir`) that produces `exe` if it does not exist yet.
    pub compile: Vec<String>,
}

impl Tool {
    pub fn new(dir: impl Into<PathBuf>, exe: &str, input: &str, compile: &str) -> Self {
        Self {
            dir: dir.into(),
            exe: exe.to_string(),
            input: input.to_string(),
            compile: compile.split_whitespace().map(String::from).collect(),
        }
    }

    pub fn program(&self) -> PathBuf {
        self.dir.join(&self.exe)
    }

    pub fn input_path(&self) -> PathBuf {
        self.dir.join(&self.input)
    }

    pub fn is_compiled(&self) -> bool {
        self.program().is_file()
    }

    fn compile(&self) -> Result<(), RunError> {
        let Some((cmd, args)) = self.compile.split_first() else {
            return Err(RunError::Compile {
                exe: self.exe.clone(),
                reason: "no compile command configured".to_string(),
            });
        };
        log::info!("Compiling {:?} with `{}`", self.program(), self.compile.join(" "));
        let output = Command::new(cmd)
            .args(args)
            .current_dir(&self.dir)
            .output()
            .map_err(|source| RunError::Spawn {
                stage: Stage::Compile,
                program: PathBuf::from(cmd),
                source,
            })?;
        if !output.status.success() {
            return Err(RunError::Compile {
                exe: self.exe.clone(),
                reason: format!("{}: {}", output.status, stderr_tail(&output)),
            });
        }
        if !self.is_compiled() {
            return Err(RunError::Compile {
                exe: self.exe.clone(),
                reason: format!("{:?} still missing after compiling", self.program()),
            });
        }
        Ok(())
    }

    fn run(&self, stage: Stage) -> Result<Output, RunError> {
        let spawn_err = |source| RunError::Spawn {
            stage,
            program: self.program(),
            source,
        };
        // relative programs are resolved differently across platforms once `current_dir` is set
        let program = fs::canonicalize(self.program()).map_err(spawn_err)?;
        log::debug!("Running `{} -is {}` in {:?}", self.exe, self.input, self.dir);
        Command::new(program)
            .args(["-is", &self.input])
            .current_dir(&self.dir)
            .output()
            .map_err(spawn_err)
    }
}

/// Where the external tools live and how they are called.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerConfig {
    pub builder: Tool,
    pub simulator: Tool,
    /// Default builder arguments, relative to the builder directory.
    pub base_args: String,
    /// Extra arguments appended verbatim to every builder input.
    pub passthru: Option<PathBuf>,
    /// Files (relative to the builder directory) that a successful build must produce.
    pub artifacts: Vec<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            builder: Tool::new("./bld-dir", "bld", "args-bld", "go build bld.go"),
            simulator: Tool::new("./sim-dir", "sim", "args-sim", "go build sim.go"),
            base_args: "args-bld-base".to_string(),
            passthru: None,
            artifacts: Vec::new(),
        }
    }
}

/// Calls the external builder and simulator as blocking child processes.
#[derive(Clone, Debug)]
pub struct ExternalRunner {
    config: RunnerConfig,
    compiled: bool,
}

impl ExternalRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            compiled: false,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Compile the builder and simulator if their executables are missing. Once successful,
    /// later calls return immediately.
    pub fn ensure_compiled(&mut self) -> Result<(), RunError> {
        if self.compiled {
            return Ok(());
        }
        for tool in [&self.config.builder, &self.config.simulator] {
            if !tool.is_compiled() {
                tool.compile()?;
            }
        }
        self.compiled = true;
        Ok(())
    }

    /// Compose the builder input: base arguments, pass-through arguments, then one `-key value`
    /// line per translated parameter.
    pub fn builder_input(&self, params: &TranslatedParameters) -> Result<String, RunError> {
        let base_path = self.config.builder.dir.join(&self.config.base_args);
        let mut input =
            fs::read_to_string(&base_path).map_err(|e| RunError::BaseArgs(base_path, e))?;
        terminate_line(&mut input);
        if let Some(passthru) = &self.config.passthru {
            let extra =
                fs::read_to_string(passthru).map_err(|e| RunError::Passthru(passthru.clone(), e))?;
            input.push_str(&extra);
            terminate_line(&mut input);
        }
        input.push_str(&params.to_args());
        Ok(input)
    }

    /// Overwrite the shared builder input file.
    pub fn write_builder_input(&self, params: &TranslatedParameters) -> Result<PathBuf, RunError> {
        let path = self.config.builder.input_path();
        let input = self.builder_input(params)?;
        fs::write(&path, input).map_err(|e| RunError::WriteInput(path.clone(), e))?;
        log::debug!("Wrote builder input {path:?}");
        Ok(path)
    }

    fn build(&self) -> Result<(), RunError> {
        let output = self.config.builder.run(Stage::Build)?;
        log::trace!("builder stdout:\n{}", String::from_utf8_lossy(&output.stdout));
        if !output.status.success() {
            return Err(RunError::Build {
                status: output.status.to_string(),
                stderr: stderr_tail(&output),
            });
        }
        for artifact in &self.config.artifacts {
            let path = self.config.builder.dir.join(artifact);
            if !path.exists() {
                return Err(RunError::MissingArtifact(path));
            }
        }
        Ok(())
    }

    fn simulate(&self) -> Result<String, RunError> {
        let output = self.config.simulator.run(Stage::Simulation)?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        log::trace!("simulator stdout:\n{stdout}");
        if !output.status.success() {
            return Err(RunError::Simulation {
                status: output.status.to_string(),
                stderr: stderr_tail(&output),
            });
        }
        Ok(stdout)
    }

    /// Copy the builder and simulator directories below `root` and return a runner working on
    /// the copies. Both directories keep their names, such that relative references between them
    /// stay valid.
    pub fn isolated(&self, root: &Path) -> Result<Self, RunError> {
        let err = |e| RunError::Isolation(root.to_path_buf(), e);
        let builder_name = dir_name(&self.config.builder.dir).map_err(err)?;
        let simulator_name = dir_name(&self.config.simulator.dir).map_err(err)?;
        let shared = fs::canonicalize(&self.config.builder.dir).map_err(err)?
            == fs::canonicalize(&self.config.simulator.dir).map_err(err)?;
        if !shared && builder_name == simulator_name {
            return Err(err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "builder and simulator directories have the same name",
            )));
        }

        copy_dir(&self.config.builder.dir, &root.join(&builder_name)).map_err(err)?;
        if !shared {
            copy_dir(&self.config.simulator.dir, &root.join(&simulator_name)).map_err(err)?;
        }

        let mut config = self.config.clone();
        config.builder.dir = root.join(builder_name);
        config.simulator.dir = root.join(simulator_name);
        Ok(Self {
            config,
            compiled: self.compiled,
        })
    }
}

impl Invoke for ExternalRunner {
    fn invoke(&mut self, params: &TranslatedParameters) -> Result<String, RunError> {
        self.ensure_compiled()?;
        self.write_builder_input(params)?;
        self.build()?;
        self.simulate()
    }
}

fn terminate_line(s: &mut String) {
    if !s.is_empty() && !s.ends_with('\n') {
        s.push('\n');
    }
}

fn stderr_tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let lines: Vec<&str> = stderr.lines().collect();
    lines[lines.len().saturating_sub(STDERR_TAIL)..]
        .join("\n")
        .trim()
        .to_string()
}

fn dir_name(dir: &Path) -> io::Result<PathBuf> {
    fs::canonicalize(dir)?
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("{dir:?} has no name")))
}

fn copy_dir(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
