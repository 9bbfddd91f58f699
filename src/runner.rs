// src/runner.rs
//! External commands. Every collaborator step is a `StepCommand` run through
//! a `Runner`; the orchestrator composes them with `?`, so the first failing
//! step ends the run.

use std::{
    env,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    sync::mpsc::{self, Sender},
    thread,
};

use crate::error::PipelineError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepCommand {
    /// Pipeline step this command belongs to, used in error messages.
    pub label: String,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl StepCommand {
    pub fn new(label: &str, program: &str, args: Vec<String>) -> Self {
        Self { label: s!(label), program: s!(program), args, cwd: None, env: Vec::new() }
    }

    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn with_env(mut self, vars: Vec<(String, String)>) -> Self {
        self.env.extend(vars);
        self
    }

    /// `program arg arg …` for logs and messages.
    pub fn argv(&self) -> String {
        let mut out = self.program.clone();
        for a in &self.args {
            out.push(' ');
            out.push_str(a);
        }
        out
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        cmd
    }

    fn failed(&self, detail: impl Into<String>) -> PipelineError {
        PipelineError::step(&self.label, format!("`{}`: {}", self.argv(), detail.into()))
    }

    fn check(&self, status: ExitStatus) -> Result<(), PipelineError> {
        if status.success() {
            Ok(())
        } else {
            Err(self.failed(format!("exited with {status}")))
        }
    }
}

/// How the pipeline touches the outside world. `SystemRunner` spawns real
/// processes; tests script one.
pub trait Runner: Sync {
    /// Run to completion with inherited stdio. Non-zero exit is a failure.
    fn status(&self, cmd: &StepCommand) -> Result<(), PipelineError>;

    /// Run to completion and return stdout.
    fn output(&self, cmd: &StepCommand) -> Result<String, PipelineError>;

    /// Run to completion, sending each stdout line to `lines` as it arrives.
    fn stream(&self, cmd: &StepCommand, lines: Sender<String>) -> Result<(), PipelineError>;

    /// True iff `cmd` runs and exits zero. Output is discarded.
    fn probe(&self, cmd: &StepCommand) -> bool;

    /// Resolve `program` against `PATH`.
    fn which(&self, program: &str) -> Option<PathBuf>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn status(&self, cmd: &StepCommand) -> Result<(), PipelineError> {
        logd!("run: {}", cmd.argv());
        let status = cmd.to_command().status().map_err(|e| cmd.failed(e.to_string()))?;
        cmd.check(status)
    }

    fn output(&self, cmd: &StepCommand) -> Result<String, PipelineError> {
        logd!("run (capture stdout): {}", cmd.argv());
        let out = cmd
            .to_command()
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| cmd.failed(e.to_string()))?;
        cmd.check(out.status)?;
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }

    fn stream(&self, cmd: &StepCommand, lines: Sender<String>) -> Result<(), PipelineError> {
        logd!("run (stream stdout): {}", cmd.argv());
        let mut child = cmd
            .to_command()
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| cmd.failed(e.to_string()))?;

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                match line {
                    // Receiver gone means nobody is watching; keep draining.
                    Ok(line) => {
                        let _ = lines.send(line);
                    }
                    Err(e) => {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(cmd.failed(format!("reading output: {e}")));
                    }
                }
            }
        }
        let status = child.wait().map_err(|e| cmd.failed(e.to_string()))?;
        cmd.check(status)
    }

    fn probe(&self, cmd: &StepCommand) -> bool {
        logd!("probe: {}", cmd.argv());
        cmd.to_command()
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        let direct = Path::new(program);
        if direct.components().count() > 1 {
            return is_executable(direct).then(|| direct.to_path_buf());
        }
        let path = env::var_os("PATH")?;
        env::split_paths(&path)
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable(candidate))
    }
}

/// Run `cmd` through `runner.stream` on a helper thread and hand each line
/// to `on_line` on the calling thread, strictly in arrival order.
pub fn stream_lines(
    runner: &dyn Runner,
    cmd: &StepCommand,
    mut on_line: impl FnMut(String),
) -> Result<(), PipelineError> {
    let (tx, rx) = mpsc::channel::<String>();
    thread::scope(|scope| {
        let producer = scope.spawn(move || runner.stream(cmd, tx));
        for line in rx {
            on_line(line);
        }
        producer
            .join()
            .unwrap_or_else(|_| Err(cmd.failed("output reader panicked")))
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file() || path.with_extension("cmd").is_file()
}
