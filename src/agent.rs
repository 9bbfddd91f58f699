// src/agent.rs
//! Autonomous orchestration: hand the whole step sequence to an external
//! agent executor and watch its progress stream.
//!
//! The executor prints one JSON message per line. Assistant text blocks are
//! forwarded to the `Progress` observer in arrival order; nothing in the
//! stream steers the pipeline. Whatever the agent leaves on disk still goes
//! through the freshness gate afterwards.

use serde_json::Value;

use crate::config::consts::*;
use crate::config::options::RunOptions;
use crate::error::PipelineError;
use crate::progress::Progress;
use crate::runner::{self, Runner, StepCommand};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentOutcome {
    /// Executor ran and exited zero.
    Completed,
    /// Executor not installed and the mode was not forced.
    Unavailable,
}

const SYSTEM_PROMPT: &str = "You are an automation agent running in CI. Goal: refresh \
idol_weibo_posts.json and build the static site files. Prefer agent-browser for page capture \
when the command exists; otherwise use the Playwright path. Follow the steps exactly, do not \
edit code, and do not write extra output files.";

/// Task description handed to the executor.
pub fn prompt(opts: &RunOptions) -> String {
    let uid = &opts.target.uid;
    let url = &opts.target.source_url;
    let n = opts.capture.scrolls;
    let px = opts.capture.scroll_px;
    let session = &opts.capture.session;
    let depth = opts.capture.depth;
    let t = &opts.tools;
    format!(
        "Run the profile feed → JSON → report → static site pipeline once, from the repository root.\n\
         Regenerate every artifact even if it already exists; never skip a step because a file is present.\n\
         \n\
         Steps:\n\
         1) Capture {url}, scrolling to load more ({n} scrolls), producing {SNAPSHOT_JSON} and {SNAPSHOT_TXT}.\n\
         2) Extract: {node} {extract} {SNAPSHOT_JSON} {SNAPSHOT_TXT} {POSTS_JSON} --uid {uid} --source-url {url}\n\
         3) Deduplicate: feed_capture combine --in-json {POSTS_JSON} --out-json {POSTS_JSON}\n\
         4) Report: {py} {report} --in-json {POSTS_JSON} --out-md {REPORT_MD}\n\
         5) Sync: {node} {sync}\n\
         6) Build: {npm} --prefix {WEB_DIR} install --no-fund --no-audit && {npm} --prefix {WEB_DIR} run build\n\
         \n\
         Capture (pick one, prefer A):\n\
         A) If `command -v {PRIMARY_TOOL}` succeeds:\n\
            - {PRIMARY_TOOL} --session {session} open {url}\n\
            - repeat {n} times: {PRIMARY_TOOL} --session {session} scroll down {px}, then {PRIMARY_TOOL} --session {session} wait --load networkidle\n\
            - {PRIMARY_TOOL} --session {session} snapshot -d {depth} --json > {SNAPSHOT_JSON}\n\
            - {PRIMARY_TOOL} --session {session} close\n\
         B) Otherwise: feed_capture capture --uid {uid} --scrolls {n}\n\
         \n\
         Constraints:\n\
         - Use only the Bash tool to run commands.\n\
         - Before capturing, record the current fetched_at of {POSTS_JSON} (if any).\n\
         - Afterwards, verify fetched_at in {POSTS_JSON} differs from the recorded value.\n\
         - Check that {WEB_DIR}/public/{POSTS_JSON} exists and is non-empty and print its first 20 lines.\n\
         - Check that {WEB_DIR}/dist/index.html exists.",
        node = t.node,
        py = t.python,
        npm = t.npm,
        extract = t.extract_script,
        report = t.report_script,
        sync = t.sync_script,
    )
}

pub fn command(opts: &RunOptions) -> StepCommand {
    cmd!(
        "agent",
        &opts.tools.agent,
        "-p", prompt(opts),
        "--output-format", "stream-json",
        "--verbose",
        "--model", AGENT_MODEL,
        "--max-turns", AGENT_MAX_TURNS,
        "--permission-mode", "bypassPermissions",
        "--allowedTools", AGENT_ALLOWED_TOOLS,
        "--append-system-prompt", SYSTEM_PROMPT,
    )
    .in_dir(opts.paths.dir())
    .with_env(opts.env.agent_env())
}

/// Human-readable text carried by one stream line. JSON messages yield
/// their assistant text blocks (possibly none); other lines pass through.
pub fn message_texts(line: &str) -> Vec<String> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }
    let Ok(msg) = serde_json::from_str::<Value>(line) else {
        return vec![s!(line)];
    };
    if msg.get("type").and_then(Value::as_str) != Some("assistant") {
        return Vec::new();
    }
    msg.pointer("/message/content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .map(|t| s!(t))
                .collect()
        })
        .unwrap_or_default()
}

pub fn run(
    runner: &dyn Runner,
    opts: &RunOptions,
    forced: bool,
    progress: &mut dyn Progress,
) -> Result<AgentOutcome, PipelineError> {
    if runner.which(&opts.tools.agent).is_none() {
        if forced {
            return Err(PipelineError::MissingDependency {
                remediation: format!(
                    "agent executor `{}` is not on PATH. Install it, or drop --force-agent to use the deterministic pipeline.",
                    opts.tools.agent
                ),
            });
        }
        return Ok(AgentOutcome::Unavailable);
    }

    logf!("delegating run to agent executor `{}`", opts.tools.agent);
    runner::stream_lines(runner, &command(opts), |line| {
        for text in message_texts(&line) {
            progress.agent_message(&text);
        }
    })?;
    Ok(AgentOutcome::Completed)
}
