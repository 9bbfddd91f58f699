// tests/pipeline.rs
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc::Sender;

use chrono::Utc;
use serde_json::{json, Value};

use feed_capture::capture::Strategy;
use feed_capture::config::consts::{POSTS_JSON, SNAPSHOT_JSON, SNAPSHOT_TXT};
use feed_capture::config::options::{Mode, Paths, PublishScope, RunOptions};
use feed_capture::error::PipelineError;
use feed_capture::pipeline::{Executor, Pipeline, Stage};
use feed_capture::progress::RecordingProgress;
use feed_capture::runner::{Runner, StepCommand};

type Effect = Box<dyn Fn(&StepCommand) -> Result<(), PipelineError> + Send + Sync>;

/// Scripted stand-in for the outside world. Every call is recorded as
/// `label: argv`; `effect` runs before each command "completes".
struct FakeRunner {
    on_path: Vec<&'static str>,
    playwright_importable: bool,
    snapshot_stdout: String,
    driver_lines: Vec<String>,
    agent_lines: Vec<String>,
    effect: Effect,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self {
            on_path: Vec::new(),
            playwright_importable: false,
            snapshot_stdout: String::new(),
            driver_lines: Vec::new(),
            agent_lines: Vec::new(),
            effect: Box::new(|_| Ok(())),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeRunner {
    fn record(&self, cmd: &StepCommand) {
        // The Playwright driver script is long; keep only the program.
        let line = if cmd.args.first().map(String::as_str) == Some("-c") && cmd.label == "capture" {
            format!("{}: {} <driver>", cmd.label, cmd.program)
        } else {
            format!("{}: {}", cmd.label, cmd.argv())
        };
        self.calls.lock().unwrap().push(line);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_for(&self, label: &str) -> Vec<String> {
        let prefix = format!("{label}: ");
        self.calls().into_iter().filter(|c| c.starts_with(&prefix)).collect()
    }
}

impl Runner for FakeRunner {
    fn status(&self, cmd: &StepCommand) -> Result<(), PipelineError> {
        self.record(cmd);
        (self.effect)(cmd)
    }

    fn output(&self, cmd: &StepCommand) -> Result<String, PipelineError> {
        self.record(cmd);
        (self.effect)(cmd)?;
        Ok(self.snapshot_stdout.clone())
    }

    fn stream(&self, cmd: &StepCommand, lines: Sender<String>) -> Result<(), PipelineError> {
        self.record(cmd);
        (self.effect)(cmd)?;
        let script = if cmd.label == "agent" { &self.agent_lines } else { &self.driver_lines };
        for line in script {
            let _ = lines.send(line.clone());
        }
        Ok(())
    }

    fn probe(&self, cmd: &StepCommand) -> bool {
        self.record(cmd);
        self.playwright_importable
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        self.on_path
            .contains(&program)
            .then(|| PathBuf::from("/usr/local/bin").join(program))
    }
}

fn options(dir: &Path) -> RunOptions {
    RunOptions { paths: Paths::new(dir), ..Default::default() }
}

fn feed_tree() -> Value {
    json!({"role": "WebArea", "name": "profile", "children": [
        {"role": "heading", "name": "idol", "level": 1},
        {"role": "link", "name": "全文",
         "properties": [{"name": "url", "value": "https://m.weibo.cn/status/1"}]}
    ]})
}

const FEED_OUTLINE: &str = "- document:\n  - heading \"idol\" [level=1]\n  - link \"全文\":\n    - /url: https://m.weibo.cn/status/1";

fn write_envelope(dir: &Path, fetched_at: &str, posts: Value) {
    let env = json!({
        "idol": {"uid": "7449968177"},
        "fetched_at": fetched_at,
        "source_url": "https://m.weibo.cn/u/7449968177",
        "note": null,
        "posts": posts,
    });
    std::fs::write(dir.join(POSTS_JSON), env.to_string()).unwrap();
}

fn three_posts_one_duplicate() -> Value {
    json!([
        {"status_id": "1", "created_at_raw": "12-31", "text": "first", "emojis": ["心"]},
        {"status_id": "2", "created_at_raw": "12-30", "text": "second"},
        {"status_id": "1", "created_at_raw": "12-31", "text": "first", "is_pinned": true},
    ])
}

/// Extraction that writes a fresh envelope into the step's working dir.
fn fresh_extract() -> Effect {
    Box::new(|cmd| {
        if cmd.label == "extract" {
            let dir = cmd.cwd.clone().unwrap();
            write_envelope(&dir, &Utc::now().to_rfc3339(), three_posts_one_duplicate());
        }
        Ok(())
    })
}

fn agent_browser_runner(effect: Effect) -> FakeRunner {
    FakeRunner {
        on_path: vec!["agent-browser"],
        snapshot_stdout: json!({"success": true, "data": {"snapshot": feed_tree(), "refs": {}}}).to_string(),
        effect,
        ..Default::default()
    }
}

#[test]
fn no_capture_tool_fails_before_touching_anything() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path());
    let runner = FakeRunner::default();
    let mut progress = RecordingProgress::default();

    let err = Pipeline::new(&opts, &runner).run(&mut progress).unwrap_err();

    let msg = err.to_string();
    assert!(matches!(err, PipelineError::MissingDependency { .. }));
    assert!(msg.contains("npm i -g agent-browser && agent-browser install"));
    assert!(msg.contains("python3 -m pip install playwright && python3 -m playwright install chromium"));
    assert_eq!(runner.calls(), vec!["strategy-select: python3 -c import playwright"]);
    assert!(!dir.path().join(POSTS_JSON).exists());
    assert!(!dir.path().join(SNAPSHOT_JSON).exists());
    assert_eq!(progress.stages, vec![Stage::Init, Stage::StrategySelect, Stage::Failed]);
    assert_eq!(progress.finished, Some(false));
}

#[test]
fn agent_browser_happy_path_runs_every_step_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = options(dir.path());
    opts.capture.scrolls = 2;
    let runner = agent_browser_runner(fresh_extract());
    let mut progress = RecordingProgress::default();

    let summary = Pipeline::new(&opts, &runner).run(&mut progress).unwrap();

    assert_eq!(summary.executor, Executor::Capture(Strategy::AgentBrowser));
    assert_eq!((summary.posts_extracted, summary.posts_kept), (3, 2));
    assert_eq!(summary.posts_pinned, 0);
    assert_eq!(summary.outline_lines, Some(4));
    assert!(summary.artifacts.contains(&dir.path().join(POSTS_JSON)));
    assert!(!summary.artifacts.contains(&dir.path().join("report.md")));
    assert_eq!(
        runner.calls(),
        vec![
            "capture: agent-browser --session weibo open https://m.weibo.cn/u/7449968177",
            "capture: agent-browser --session weibo scroll down 2500",
            "capture: agent-browser --session weibo wait --load networkidle",
            "capture: agent-browser --session weibo scroll down 2500",
            "capture: agent-browser --session weibo wait --load networkidle",
            "capture: agent-browser --session weibo snapshot -d 12 --json",
            "capture: agent-browser --session weibo close",
            "extract: node weibo_collect.mjs weibo_snapshot.json weibo_snapshot.txt idol_weibo_posts.json --uid 7449968177 --source-url https://m.weibo.cn/u/7449968177",
            "report: python3 pipeline/generate_apple_style_report.py --in-json idol_weibo_posts.json --out-md report.md",
            "publish: node web/scripts/sync-data.mjs",
            "publish: npm --prefix web install --no-fund --no-audit",
            "publish: npm --prefix web run build",
        ]
    );
    assert_eq!(
        progress.stages,
        vec![
            Stage::Init,
            Stage::StrategySelect,
            Stage::Capture,
            Stage::Extract,
            Stage::Validate,
            Stage::Merge,
            Stage::Report,
            Stage::Publish,
            Stage::Done,
        ]
    );
    assert_eq!(progress.scrolls, vec![(1, 2), (2, 2)]);
    assert_eq!(progress.finished, Some(true));

    let txt = std::fs::read_to_string(dir.path().join(SNAPSHOT_TXT)).unwrap();
    assert_eq!(txt, FEED_OUTLINE);

    let merged = std::fs::read_to_string(dir.path().join(POSTS_JSON)).unwrap();
    assert!(merged.ends_with("}\n"));
    let merged: Value = serde_json::from_str(&merged).unwrap();
    let posts = merged["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert!(posts[0].get("is_pinned").is_none());
    assert_eq!(posts[0]["emojis"], json!(["心"]));
    assert_eq!(merged["note"], Value::Null);
}

#[test]
fn playwright_fallback_serializes_driver_tree() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = options(dir.path());
    opts.publish = PublishScope::Skip;
    let runner = FakeRunner {
        playwright_importable: true,
        driver_lines: vec![
            json!({"event": "scrolled", "done": 1, "total": 6}).to_string(),
            s("driver: navigating"),
            json!({"event": "scrolled", "done": 2, "total": 6}).to_string(),
            json!({"event": "snapshot", "tree": feed_tree()}).to_string(),
        ],
        effect: fresh_extract(),
        ..Default::default()
    };
    let mut progress = RecordingProgress::default();

    let summary = Pipeline::new(&opts, &runner).run(&mut progress).unwrap();

    assert_eq!(summary.executor, Executor::Capture(Strategy::Playwright));
    assert_eq!(progress.scrolls, vec![(1, 6), (2, 6)]);
    assert_eq!(
        std::fs::read_to_string(dir.path().join(SNAPSHOT_TXT)).unwrap(),
        FEED_OUTLINE
    );
    let env: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join(SNAPSHOT_JSON)).unwrap()).unwrap();
    assert_eq!(env["success"], true);
    assert_eq!(env["data"]["snapshot"], FEED_OUTLINE);
    assert!(runner.calls_for("publish").is_empty());
    assert!(!progress.stages.contains(&Stage::Publish));
}

#[test]
fn unchanged_fetched_at_stops_before_merge_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path());
    let ts = Utc::now().to_rfc3339();
    write_envelope(dir.path(), &ts, three_posts_one_duplicate());
    // Extraction "succeeds" but leaves the old envelope in place.
    let runner = agent_browser_runner(Box::new(|_| Ok(())));
    let mut progress = RecordingProgress::default();

    let err = Pipeline::new(&opts, &runner).run(&mut progress).unwrap_err();

    match err {
        PipelineError::StaleReuse { fetched_at, .. } => assert_eq!(fetched_at, ts),
        other => panic!("unexpected {other:?}"),
    }
    assert!(runner.calls_for("report").is_empty());
    assert_eq!(progress.stages.last(), Some(&Stage::Failed));
    // Not merged: the duplicate is still on disk.
    let on_disk: Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join(POSTS_JSON)).unwrap()).unwrap();
    assert_eq!(on_disk["posts"].as_array().unwrap().len(), 3);
}

#[test]
fn old_fetched_at_exceeds_freshness_window() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path());
    let runner = agent_browser_runner(Box::new(|cmd| {
        if cmd.label == "extract" {
            write_envelope(cmd.cwd.as_deref().unwrap(), "2024-01-01T00:00:00.000Z", json!([]));
        }
        Ok(())
    }));
    let mut progress = RecordingProgress::default();

    let err = Pipeline::new(&opts, &runner)
        .with_clock(|| "2024-01-01T07:00:00Z".parse().unwrap())
        .run(&mut progress)
        .unwrap_err();

    match err {
        PipelineError::FreshnessWindowExceeded { age_secs, window_secs, .. } => {
            assert_eq!(age_secs, 7 * 3600);
            assert_eq!(window_secs, 6 * 3600);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn missing_fetched_at_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path());
    let runner = agent_browser_runner(Box::new(|cmd| {
        if cmd.label == "extract" {
            std::fs::write(cmd.cwd.as_deref().unwrap().join(POSTS_JSON), r#"{"posts":[]}"#).unwrap();
        }
        Ok(())
    }));

    let err = Pipeline::new(&opts, &runner)
        .run(&mut RecordingProgress::default())
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingTimestamp { .. }));
}

#[test]
fn malformed_snapshot_fails_capture_but_closes_session() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path());
    let runner = FakeRunner {
        on_path: vec!["agent-browser"],
        snapshot_stdout: json!({"success": true, "data": {"snapshot": 42}}).to_string(),
        ..Default::default()
    };
    let mut progress = RecordingProgress::default();

    let err = Pipeline::new(&opts, &runner).run(&mut progress).unwrap_err();

    assert!(matches!(err, PipelineError::MalformedTree(_)));
    assert!(runner.calls().iter().any(|c| c.ends_with("close")));
    assert!(runner.calls_for("extract").is_empty());
    assert!(!dir.path().join(SNAPSHOT_TXT).exists());
}

#[test]
fn scroll_failure_still_closes_session() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path());
    let runner = agent_browser_runner(Box::new(|cmd| {
        if cmd.args.iter().any(|a| a == "scroll") {
            return Err(PipelineError::step("capture", "scroll refused"));
        }
        Ok(())
    }));
    let mut progress = RecordingProgress::default();

    let err = Pipeline::new(&opts, &runner).run(&mut progress).unwrap_err();

    assert_eq!(err.to_string(), "Step `capture` failed: scroll refused");
    assert_eq!(
        runner.calls(),
        vec![
            "capture: agent-browser --session weibo open https://m.weibo.cn/u/7449968177",
            "capture: agent-browser --session weibo scroll down 2500",
            "capture: agent-browser --session weibo close",
        ]
    );
    assert!(progress.scrolls.is_empty());
    assert!(!dir.path().join(SNAPSHOT_JSON).exists());
}

#[test]
fn failing_step_names_itself() {
    let dir = tempfile::tempdir().unwrap();
    let opts = options(dir.path());
    let runner = agent_browser_runner(Box::new(|cmd| {
        if cmd.label == "extract" {
            return Err(PipelineError::step("extract", "exited with exit status: 1"));
        }
        Ok(())
    }));

    let err = Pipeline::new(&opts, &runner)
        .run(&mut RecordingProgress::default())
        .unwrap_err();
    assert_eq!(err.to_string(), "Step `extract` failed: exited with exit status: 1");
}

fn assistant(text: &str) -> String {
    json!({"type": "assistant", "message": {"content": [{"type": "text", "text": text}]}}).to_string()
}

#[test]
fn agent_mode_streams_messages_in_order_then_validates() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = options(dir.path());
    opts.mode = Mode::Agent { forced: false };
    let runner = FakeRunner {
        on_path: vec!["claude"],
        agent_lines: vec![
            json!({"type": "system", "subtype": "init"}).to_string(),
            assistant("capturing"),
            s("not json"),
            assistant("extracting"),
            json!({"type": "result", "result": "ok"}).to_string(),
        ],
        effect: Box::new(|cmd| {
            if cmd.label == "agent" {
                write_envelope(cmd.cwd.as_deref().unwrap(), &Utc::now().to_rfc3339(), json!([{"status_id": "1"}]));
            }
            Ok(())
        }),
        ..Default::default()
    };
    let mut progress = RecordingProgress::default();

    let summary = Pipeline::new(&opts, &runner).run(&mut progress).unwrap();

    assert_eq!(summary.executor, Executor::Agent);
    assert_eq!(summary.posts_kept, 1);
    assert_eq!(progress.agent_messages, vec!["capturing", "not json", "extracting"]);
    assert_eq!(runner.calls().len(), 1);
    assert!(runner.calls()[0].starts_with("agent: claude -p "));
    assert_eq!(progress.stages, vec![Stage::Init, Stage::Validate, Stage::Done]);
}

#[test]
fn agent_mode_output_still_goes_through_the_gate() {
    let dir = tempfile::tempdir().unwrap();
    let ts = Utc::now().to_rfc3339();
    write_envelope(dir.path(), &ts, json!([]));
    let mut opts = options(dir.path());
    opts.mode = Mode::Agent { forced: true };
    let runner = FakeRunner { on_path: vec!["claude"], ..Default::default() };

    let err = Pipeline::new(&opts, &runner)
        .run(&mut RecordingProgress::default())
        .unwrap_err();
    assert!(matches!(err, PipelineError::StaleReuse { .. }));
}

#[test]
fn missing_agent_falls_back_unless_forced() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = options(dir.path());
    opts.mode = Mode::Agent { forced: false };
    opts.publish = PublishScope::Skip;
    let runner = agent_browser_runner(fresh_extract());
    let mut progress = RecordingProgress::default();

    let summary = Pipeline::new(&opts, &runner).run(&mut progress).unwrap();
    assert_eq!(summary.executor, Executor::Capture(Strategy::AgentBrowser));
    assert!(runner.calls_for("agent").is_empty());
    assert!(progress.logs.iter().any(|l| l.contains("falling back")));

    opts.mode = Mode::Agent { forced: true };
    let runner = agent_browser_runner(fresh_extract());
    let err = Pipeline::new(&opts, &runner)
        .run(&mut RecordingProgress::default())
        .unwrap_err();
    assert!(matches!(err, PipelineError::MissingDependency { .. }));
    assert!(err.to_string().contains("claude"));
    assert!(runner.calls().is_empty());
}

#[test]
fn capture_only_and_publish_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = options(dir.path());
    opts.capture.scrolls = 0;
    let runner = agent_browser_runner(Box::new(|_| Ok(())));

    let captured = Pipeline::new(&opts, &runner)
        .capture_only(&mut RecordingProgress::default())
        .unwrap();
    assert_eq!(captured.outline, FEED_OUTLINE);
    assert!(dir.path().join(SNAPSHOT_JSON).exists());
    assert!(runner.calls_for("extract").is_empty());

    opts.publish = PublishScope::SyncOnly;
    let runner = FakeRunner::default();
    let mut progress = RecordingProgress::default();
    Pipeline::new(&opts, &runner).publish_only(&mut progress).unwrap();
    assert_eq!(
        runner.calls(),
        vec![
            "report: python3 pipeline/generate_apple_style_report.py --in-json idol_weibo_posts.json --out-md report.md",
            "publish: node web/scripts/sync-data.mjs",
        ]
    );
    assert_eq!(progress.stages, vec![Stage::Init, Stage::Report, Stage::Publish, Stage::Done]);
}

fn s(v: &str) -> String {
    v.to_string()
}
