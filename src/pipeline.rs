// src/pipeline.rs
//! Run orchestration: a linear state machine over the collaborator steps.
//!
//! ```text
//! INIT → STRATEGY_SELECT → CAPTURE → EXTRACT → VALIDATE → MERGE → REPORT → PUBLISH → DONE
//! ```
//!
//! Any step error moves the run to `Failed` and is returned as is. In agent
//! mode the executor owns capture through publish; only `Validate` runs here
//! afterwards.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::agent::{self, AgentOutcome};
use crate::capture::{self, Strategy};
use crate::config::consts::*;
use crate::config::options::{Mode, PublishScope, RunOptions};
use crate::error::PipelineError;
use crate::freshness;
use crate::progress::Progress;
use crate::runner::{Runner, StepCommand};
use crate::{file, store};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Init,
    StrategySelect,
    Capture,
    Extract,
    Validate,
    Merge,
    Report,
    Publish,
    Done,
    Failed,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::StrategySelect => "strategy-select",
            Stage::Capture => "capture",
            Stage::Extract => "extract",
            Stage::Validate => "validate",
            Stage::Merge => "merge",
            Stage::Report => "report",
            Stage::Publish => "publish",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Who produced the artifacts of a successful run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Executor {
    Capture(Strategy),
    Agent,
}

impl fmt::Display for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Executor::Capture(s) => f.write_str(s.name()),
            Executor::Agent => f.write_str("agent"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub executor: Executor,
    pub fetched_at: String,
    /// Post count as extracted, before dedupe.
    pub posts_extracted: usize,
    pub posts_kept: usize,
    pub posts_pinned: usize,
    pub outline_lines: Option<usize>,
    pub artifacts: Vec<PathBuf>,
}

impl RunSummary {
    pub fn duplicates_dropped(&self) -> usize {
        self.posts_extracted.saturating_sub(self.posts_kept)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "executor:   {}", self.executor)?;
        writeln!(f, "fetched_at: {}", self.fetched_at)?;
        writeln!(
            f,
            "posts:      {} kept ({} duplicates dropped, {} pinned)",
            self.posts_kept,
            self.duplicates_dropped(),
            self.posts_pinned
        )?;
        if let Some(n) = self.outline_lines {
            writeln!(f, "outline:    {n} lines")?;
        }
        for p in &self.artifacts {
            writeln!(f, "wrote       {}", p.display())?;
        }
        Ok(())
    }
}

pub type Clock = fn() -> DateTime<Utc>;

pub struct Pipeline<'a> {
    opts: &'a RunOptions,
    runner: &'a dyn Runner,
    clock: Clock,
    stage: Stage,
}

impl<'a> Pipeline<'a> {
    pub fn new(opts: &'a RunOptions, runner: &'a dyn Runner) -> Self {
        Self { opts, runner, clock: Utc::now, stage: Stage::Init }
    }

    /// Replace the wall clock used by the freshness gate.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// One full run. On error the run ends in `Failed` and the error that
    /// caused it is returned unchanged.
    pub fn run(&mut self, progress: &mut dyn Progress) -> Result<RunSummary, PipelineError> {
        let result = self.run_stages(progress);
        self.conclude(&result, progress);
        result
    }

    /// Strategy select + capture only.
    pub fn capture_only(
        &mut self,
        progress: &mut dyn Progress,
    ) -> Result<capture::Capture, PipelineError> {
        let result = {
            self.enter(Stage::Init, progress);
            self.capture(progress)
        };
        self.conclude(&result, progress);
        result
    }

    /// Report + publish on an existing envelope.
    pub fn publish_only(&mut self, progress: &mut dyn Progress) -> Result<(), PipelineError> {
        let result = {
            self.enter(Stage::Init, progress);
            self.report_and_publish(progress)
        };
        self.conclude(&result, progress);
        result
    }

    fn run_stages(&mut self, progress: &mut dyn Progress) -> Result<RunSummary, PipelineError> {
        self.enter(Stage::Init, progress);
        let posts = self.opts.paths.posts_json();
        let previous = store::read_fetched_at(&posts);
        match &previous {
            Some(ts) => logd!("previous fetched_at: {ts}"),
            None => logd!("no previous envelope at {}", posts.display()),
        }

        if let Mode::Agent { forced } = self.opts.mode {
            match agent::run(self.runner, self.opts, forced, progress)? {
                AgentOutcome::Completed => return self.finish_agent(previous.as_deref(), progress),
                AgentOutcome::Unavailable => {
                    logw!(
                        "agent executor `{}` not found; running the deterministic pipeline",
                        self.opts.tools.agent
                    );
                    progress.log("agent executor not found; falling back to deterministic run");
                }
            }
        }

        let captured = self.capture(progress)?;

        self.enter(Stage::Extract, progress);
        self.runner.status(&extract_cmd(self.opts))?;

        let fetched_at = self.validate(previous.as_deref(), progress)?;

        self.enter(Stage::Merge, progress);
        let merged = store::dedupe_file(&posts, &posts)?;
        logf!("merged {} posts into {}", merged.read, merged.kept);

        self.report_and_publish(progress)?;

        Ok(RunSummary {
            executor: Executor::Capture(captured.strategy),
            fetched_at,
            posts_extracted: merged.read,
            posts_kept: merged.kept,
            posts_pinned: merged.pinned,
            outline_lines: Some(captured.line_count()),
            artifacts: self.artifacts(),
        })
    }

    fn capture(&mut self, progress: &mut dyn Progress) -> Result<capture::Capture, PipelineError> {
        self.enter(Stage::StrategySelect, progress);
        let strategy = capture::select(self.runner, self.opts)?;
        logf!("capture strategy: {}", strategy.name());
        progress.log(&format!("using {}", strategy.name()));

        self.enter(Stage::Capture, progress);
        capture::capture(strategy, self.runner, self.opts, progress)
    }

    fn validate(
        &mut self,
        previous: Option<&str>,
        progress: &mut dyn Progress,
    ) -> Result<String, PipelineError> {
        self.enter(Stage::Validate, progress);
        let posts = self.opts.paths.posts_json();
        let new = store::read_fetched_at(&posts);
        freshness::check(previous, new.as_deref(), (self.clock)())
            .map_err(|e| PipelineError::from_freshness(e, &posts))?;
        let fetched_at = new.unwrap_or_default();
        logf!("fetched_at {fetched_at} is fresh");
        Ok(fetched_at)
    }

    fn report_and_publish(&mut self, progress: &mut dyn Progress) -> Result<(), PipelineError> {
        self.enter(Stage::Report, progress);
        self.runner.status(&report_cmd(self.opts))?;

        let steps = publish_cmds(self.opts);
        if steps.is_empty() {
            logf!("publish skipped");
            return Ok(());
        }
        self.enter(Stage::Publish, progress);
        for cmd in &steps {
            progress.log(&cmd.argv());
            self.runner.status(cmd)?;
        }
        Ok(())
    }

    fn finish_agent(
        &mut self,
        previous: Option<&str>,
        progress: &mut dyn Progress,
    ) -> Result<RunSummary, PipelineError> {
        let fetched_at = self.validate(previous, progress)?;
        let envelope = store::load_envelope(&self.opts.paths.posts_json())?;
        let n = envelope.posts().len();
        Ok(RunSummary {
            executor: Executor::Agent,
            fetched_at,
            posts_extracted: n,
            posts_kept: n,
            posts_pinned: envelope.pinned_count(),
            outline_lines: None,
            artifacts: self.artifacts(),
        })
    }

    /// Artifacts of this run that actually exist on disk.
    fn artifacts(&self) -> Vec<PathBuf> {
        let p = &self.opts.paths;
        let mut out = vec![p.snapshot_json(), p.snapshot_txt(), p.posts_json(), p.report_md()];
        if self.opts.publish != PublishScope::Skip {
            out.push(p.work_dir.join(WEB_DIR).join("public").join(POSTS_JSON));
        }
        out.retain(|path| file::is_non_empty_file(path));
        out
    }

    fn enter(&mut self, stage: Stage, progress: &mut dyn Progress) {
        logf!("stage {} → {}", self.stage, stage);
        self.stage = stage;
        progress.stage(stage);
    }

    fn conclude<T>(&mut self, result: &Result<T, PipelineError>, progress: &mut dyn Progress) {
        match result {
            Ok(_) => {
                self.stage = Stage::Done;
                progress.stage(Stage::Done);
                progress.finish(true);
            }
            Err(e) => {
                loge!("{} failed: {e}", self.stage);
                self.stage = Stage::Failed;
                progress.stage(Stage::Failed);
                progress.finish(false);
            }
        }
    }
}

// Collaborator commands. All run with the work dir as cwd and bare file names.

pub fn extract_cmd(opts: &RunOptions) -> StepCommand {
    cmd!(
        "extract",
        &opts.tools.node,
        &opts.tools.extract_script,
        SNAPSHOT_JSON,
        SNAPSHOT_TXT,
        POSTS_JSON,
        "--uid", &opts.target.uid,
        "--source-url", &opts.target.source_url,
    )
    .in_dir(opts.paths.dir())
}

pub fn report_cmd(opts: &RunOptions) -> StepCommand {
    cmd!(
        "report",
        &opts.tools.python,
        &opts.tools.report_script,
        "--in-json", POSTS_JSON,
        "--out-md", REPORT_MD,
    )
    .in_dir(opts.paths.dir())
}

/// Publish steps for the configured scope, in order. Empty when skipped.
pub fn publish_cmds(opts: &RunOptions) -> Vec<StepCommand> {
    let dir = opts.paths.dir();
    let npm = &opts.tools.npm;
    let sync = cmd!("publish", &opts.tools.node, &opts.tools.sync_script).in_dir(dir);
    match opts.publish {
        PublishScope::Skip => Vec::new(),
        PublishScope::SyncOnly => vec![sync],
        PublishScope::Full => vec![
            sync,
            cmd!("publish", npm, "--prefix", WEB_DIR, "install", "--no-fund", "--no-audit").in_dir(dir),
            cmd!("publish", npm, "--prefix", WEB_DIR, "run", "build").in_dir(dir),
        ],
    }
}
