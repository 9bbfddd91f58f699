// src/capture/playwright.rs
use serde::Deserialize;

use crate::config::consts::{LOCALE, NAV_TIMEOUT_MS, USER_AGENT, VIEWPORT};
use crate::config::options::RunOptions;
use crate::error::PipelineError;
use crate::progress::Progress;
use crate::runner::{self, Runner, StepCommand};
use crate::snapshot::{outline, AccessibilityNode, SnapshotEnvelope};

const DRIVER: &str = include_str!("playwright_driver.py");

#[derive(Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
enum DriverEvent {
    Scrolled { done: u32, total: u32 },
    Snapshot { tree: serde_json::Value },
}

fn driver_cmd(opts: &RunOptions) -> StepCommand {
    let c = &opts.capture;
    let mut cmd = cmd!(
        "capture",
        &opts.tools.python,
        "-c", DRIVER,
        "--url", &opts.target.source_url,
        "--scrolls", c.scrolls,
        "--scroll-px", c.scroll_px,
        "--wait-ms", c.wait_ms,
        "--nav-timeout-ms", NAV_TIMEOUT_MS,
        "--user-agent", USER_AGENT,
        "--locale", LOCALE,
        "--width", VIEWPORT.0,
        "--height", VIEWPORT.1,
    );
    if c.headed {
        cmd.args.push(s!("--headed"));
    }
    cmd.in_dir(opts.paths.dir())
}

/// Drive the page through the Python driver and serialize its tree here.
pub(super) fn capture(
    runner: &dyn Runner,
    opts: &RunOptions,
    progress: &mut dyn Progress,
) -> Result<(SnapshotEnvelope, Option<String>), PipelineError> {
    let cmd = driver_cmd(opts);
    let mut tree: Option<serde_json::Value> = None;

    runner::stream_lines(runner, &cmd, |line| {
        match serde_json::from_str::<DriverEvent>(&line) {
            Ok(DriverEvent::Scrolled { done, total }) => progress.scrolled(done, total),
            Ok(DriverEvent::Snapshot { tree: t }) => tree = Some(t),
            Err(_) => logd!("playwright: {line}"),
        }
    })?;

    let tree = tree.ok_or_else(|| PipelineError::MalformedTree(s!("driver exited without a snapshot")))?;
    let node = AccessibilityNode::from_value(&tree)?;
    let text = outline::to_text(&node);
    Ok((SnapshotEnvelope::from_outline(&text), None))
}
