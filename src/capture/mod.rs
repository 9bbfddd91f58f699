// src/capture/mod.rs
//! Capture strategies. Selection happens once per run, in fixed priority:
//! the `agent-browser` CLI if it is on PATH, else Python Playwright if it
//! imports, else the run fails with both install paths spelled out.
//! Whichever is chosen is used for the whole run.

mod agent_browser;
mod playwright;

use crate::config::consts::{PRIMARY_TOOL, SECONDARY_MODULE};
use crate::config::options::RunOptions;
use crate::error::PipelineError;
use crate::progress::Progress;
use crate::runner::{Runner, StepCommand};
use crate::store;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Interactive `agent-browser` session driven step by step.
    AgentBrowser,
    /// Python Playwright driver; the tree is serialized on our side.
    Playwright,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::AgentBrowser => "agent-browser",
            Strategy::Playwright => "playwright",
        }
    }
}

/// Outcome of a capture: what ran and the outline the extractor will read.
#[derive(Clone, Debug, PartialEq)]
pub struct Capture {
    pub strategy: Strategy,
    pub outline: String,
}

impl Capture {
    pub fn line_count(&self) -> usize {
        self.outline.lines().count()
    }
}

pub fn playwright_probe(opts: &RunOptions) -> StepCommand {
    cmd!("strategy-select", &opts.tools.python, "-c", join!("import ", SECONDARY_MODULE))
}

pub fn select(runner: &dyn Runner, opts: &RunOptions) -> Result<Strategy, PipelineError> {
    if let Some(path) = runner.which(PRIMARY_TOOL) {
        logd!("{PRIMARY_TOOL} found at {}", path.display());
        return Ok(Strategy::AgentBrowser);
    }
    if runner.probe(&playwright_probe(opts)) {
        return Ok(Strategy::Playwright);
    }
    Err(PipelineError::MissingDependency { remediation: remediation(opts) })
}

pub fn remediation(opts: &RunOptions) -> String {
    format!(
        "Neither `{PRIMARY_TOOL}` is on PATH nor can `{py}` import `{SECONDARY_MODULE}`. Install one of:\n  \
         1) agent-browser: npm i -g agent-browser && agent-browser install\n  \
         2) Python Playwright: {py} -m pip install playwright && {py} -m playwright install chromium",
        py = opts.tools.python,
    )
}

/// Run the chosen strategy and persist the snapshot json + txt mirror.
pub fn capture(
    strategy: Strategy,
    runner: &dyn Runner,
    opts: &RunOptions,
    progress: &mut dyn Progress,
) -> Result<Capture, PipelineError> {
    let (envelope, raw) = match strategy {
        Strategy::AgentBrowser => agent_browser::capture(runner, opts, progress)?,
        Strategy::Playwright => playwright::capture(runner, opts, progress)?,
    };
    let outline = envelope.outline()?;
    store::save_capture(
        &opts.paths.snapshot_json(),
        &opts.paths.snapshot_txt(),
        &envelope,
        raw.as_deref(),
        &outline,
    )?;
    let capture = Capture { strategy, outline };
    logf!("captured {} outline lines via {}", capture.line_count(), strategy.name());
    Ok(capture)
}
