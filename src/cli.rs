// src/cli.rs
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use crate::config::consts::*;
use crate::config::options::{
    CaptureOptions, EnvSignals, Mode, Paths, PublishScope, RunOptions, Target, Tools,
};
use crate::error::PipelineError;
use crate::freshness::FreshnessError;
use crate::pipeline::{Pipeline, Stage};
use crate::progress::Progress;
use crate::runner::SystemRunner;
use crate::snapshot::{self, AccessibilityNode};
use crate::{file, freshness, store};

/// Capture a profile feed, extract posts, and publish the report site.
#[derive(Parser, Debug)]
#[command(name = "feed_capture", version, args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Append log lines to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,

    /// Arguments for the default `run` command
    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Full pipeline: capture, extract, validate, merge, report, publish
    Run(RunArgs),

    /// Select a capture strategy and write the snapshot json + txt only
    Capture {
        #[command(flatten)]
        target: TargetArgs,
        #[command(flatten)]
        tools: ToolArgs,
    },

    /// Print the outline of a raw accessibility tree JSON file
    Outline {
        input: PathBuf,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Drop duplicate posts from a dataset file
    Combine {
        #[arg(long, default_value = POSTS_JSON)]
        in_json: PathBuf,
        #[arg(long, default_value = POSTS_JSON)]
        out_json: PathBuf,
    },

    /// Render the report and publish the site from an existing dataset
    Publish {
        #[command(flatten)]
        tools: ToolArgs,
        /// Sync data only, skip the site build
        #[arg(long)]
        sync_only: bool,
    },

    /// Check a fetched_at pair against the freshness rules, using the current time
    Check {
        #[arg(long)]
        previous: Option<String>,
        #[arg(long)]
        new: Option<String>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    target: TargetArgs,

    #[command(flatten)]
    tools: ToolArgs,

    /// Delegate the run to the agent executor even without credentials
    #[arg(long)]
    force_agent: bool,

    /// Stop after the report
    #[arg(long, conflicts_with = "sync_only")]
    skip_publish: bool,

    /// Sync data but skip the site build
    #[arg(long)]
    sync_only: bool,
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Profile uid
    #[arg(long, env = "WEIBO_UID", default_value = DEFAULT_UID)]
    uid: String,

    /// Profile URL; defaults to the mobile profile page of --uid
    #[arg(long, env = "WEIBO_SOURCE_URL")]
    source_url: Option<String>,

    /// Scroll+wait cycles after the page opens
    #[arg(long, default_value_t = DEFAULT_SCROLLS)]
    scrolls: u32,

    /// Show the browser window (Playwright strategy)
    #[arg(long)]
    headed: bool,
}

#[derive(Args, Debug)]
struct ToolArgs {
    /// Directory holding every artifact; all steps run here
    #[arg(long, default_value = ".")]
    work_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_PYTHON)]
    python: String,
    #[arg(long, default_value = DEFAULT_NODE)]
    node: String,
    #[arg(long, default_value = DEFAULT_NPM)]
    npm: String,
    #[arg(long, default_value = DEFAULT_AGENT_CMD)]
    agent_cmd: String,

    #[arg(long, default_value = EXTRACT_SCRIPT)]
    extract_script: String,
    #[arg(long, default_value = REPORT_SCRIPT)]
    report_script: String,
    #[arg(long, default_value = SYNC_SCRIPT)]
    sync_script: String,
}

impl TargetArgs {
    fn apply(self, opts: &mut RunOptions) {
        opts.target = Target::new(&self.uid).with_source_url(self.source_url);
        opts.capture = CaptureOptions { scrolls: self.scrolls, headed: self.headed, ..Default::default() };
    }
}

impl ToolArgs {
    fn apply(self, opts: &mut RunOptions) {
        opts.paths = Paths::new(self.work_dir);
        opts.tools = Tools {
            python: self.python,
            node: self.node,
            npm: self.npm,
            agent: self.agent_cmd,
            extract_script: self.extract_script,
            report_script: self.report_script,
            sync_script: self.sync_script,
        };
    }
}

impl RunArgs {
    fn into_options(self, env: EnvSignals) -> RunOptions {
        let mut opts = RunOptions { mode: Mode::resolve(self.force_agent, &env), env, ..Default::default() };
        opts.publish = if self.skip_publish {
            PublishScope::Skip
        } else if self.sync_only {
            PublishScope::SyncOnly
        } else {
            PublishScope::Full
        };
        self.target.apply(&mut opts);
        self.tools.apply(&mut opts);
        opts
    }
}

/// Status lines on stderr; stdout stays free for command output.
#[derive(Default)]
struct ConsoleProgress;

impl Progress for ConsoleProgress {
    fn stage(&mut self, stage: Stage) {
        if !stage.is_terminal() {
            eprintln!("==> {stage}");
        }
    }
    fn log(&mut self, msg: &str) {
        eprintln!("    {msg}");
    }
    fn scrolled(&mut self, done: u32, total: u32) {
        eprintln!("    scroll {done}/{total}");
    }
    fn agent_message(&mut self, text: &str) {
        eprintln!("[agent] {text}");
    }
    fn finish(&mut self, ok: bool) {
        eprintln!("{}", if ok { "OK" } else { "FAILED" });
    }
}

pub fn run() -> color_eyre::Result<()> {
    let cli = Cli::parse();
    crate::logging::init(cli.verbose, cli.log_file.as_deref())
        .map_err(|e| PipelineError::io(cli.log_file.clone().unwrap_or_default(), e))?;

    let env = EnvSignals::from_process();
    let runner = SystemRunner;
    let mut progress = ConsoleProgress;

    match cli.command.unwrap_or(Command::Run(cli.run)) {
        Command::Run(args) => {
            let opts = args.into_options(env);
            logd!("options: {opts:?}");
            let summary = Pipeline::new(&opts, &runner).run(&mut progress)?;
            print!("{summary}");
        }

        Command::Capture { target, tools } => {
            let mut opts = RunOptions { env, ..Default::default() };
            target.apply(&mut opts);
            tools.apply(&mut opts);
            let captured = Pipeline::new(&opts, &runner).capture_only(&mut progress)?;
            println!(
                "{} lines via {} → {}",
                captured.line_count(),
                captured.strategy.name(),
                opts.paths.snapshot_txt().display()
            );
        }

        Command::Outline { input, out } => {
            let text = file::read_text(&input)?;
            let value = serde_json::from_str(&text).map_err(|e| PipelineError::json(&input, e))?;
            let outline = snapshot::to_text(&AccessibilityNode::from_value(&value)?);
            match out {
                Some(path) => file::write_text(&path, &outline)?,
                None => println!("{outline}"),
            }
        }

        Command::Combine { in_json, out_json } => {
            let merged = store::dedupe_file(&in_json, &out_json)?;
            println!("{} posts kept of {} → {}", merged.kept, merged.read, out_json.display());
        }

        Command::Publish { tools, sync_only } => {
            let mut opts = RunOptions {
                env,
                publish: if sync_only { PublishScope::SyncOnly } else { PublishScope::Full },
                ..Default::default()
            };
            tools.apply(&mut opts);
            Pipeline::new(&opts, &runner).publish_only(&mut progress)?;
        }

        Command::Check { previous, new } => {
            check_pair(previous.as_deref(), new.as_deref(), Utc::now())?;
            println!("fresh");
        }
    }
    Ok(())
}

/// The gate on a bare timestamp pair; no envelope file is involved.
fn check_pair(
    previous: Option<&str>,
    new: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), FreshnessError> {
    freshness::check(previous, new, now)
}
