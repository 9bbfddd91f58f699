// src/capture/agent_browser.rs
use crate::config::consts::PRIMARY_TOOL;
use crate::config::options::RunOptions;
use crate::error::PipelineError;
use crate::progress::Progress;
use crate::runner::{Runner, StepCommand};
use crate::snapshot::SnapshotEnvelope;

fn session_cmd(opts: &RunOptions, args: &[String]) -> StepCommand {
    let mut full = vec![s!("--session"), opts.capture.session.clone()];
    full.extend_from_slice(args);
    StepCommand::new("capture", PRIMARY_TOOL, full).in_dir(opts.paths.dir())
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| s!(*p)).collect()
}

/// open → n × (scroll, wait for network idle) → snapshot → close.
/// The session is closed whatever happens before it; the first error wins.
pub(super) fn capture(
    runner: &dyn Runner,
    opts: &RunOptions,
    progress: &mut dyn Progress,
) -> Result<(SnapshotEnvelope, Option<String>), PipelineError> {
    let exported = browse(runner, opts, progress);
    let closed = runner.status(&session_cmd(opts, &args(&["close"])));

    let raw = exported?;
    closed?;
    let envelope = SnapshotEnvelope::parse(&raw)?;
    Ok((envelope, Some(raw)))
}

/// Everything up to and including the snapshot export. Returns its stdout.
fn browse(
    runner: &dyn Runner,
    opts: &RunOptions,
    progress: &mut dyn Progress,
) -> Result<String, PipelineError> {
    let c = &opts.capture;
    runner.status(&session_cmd(opts, &args(&["open", opts.target.source_url.as_str()])))?;

    let px = c.scroll_px.to_string();
    for i in 1..=c.scrolls {
        runner.status(&session_cmd(opts, &args(&["scroll", "down", px.as_str()])))?;
        runner.status(&session_cmd(opts, &args(&["wait", "--load", "networkidle"])))?;
        progress.scrolled(i, c.scrolls);
    }

    let depth = c.depth.to_string();
    runner.output(&session_cmd(opts, &args(&["snapshot", "-d", depth.as_str(), "--json"])))
}
