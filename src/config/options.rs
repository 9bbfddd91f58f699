// src/config/options.rs
//! Run configuration, resolved once at startup and threaded through the
//! pipeline. Nothing past this point reads process environment.

use std::path::{Path, PathBuf};

use super::consts::*;

/// Credential/endpoint variables that pick the orchestration mode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvSignals {
    pub api_key: Option<String>,
    pub auth_token: Option<String>,
    pub base_url: Option<String>,
}

impl EnvSignals {
    pub fn from_process() -> Self {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.trim().is_empty())
        }
        Self {
            api_key: var(ENV_API_KEY),
            auth_token: var(ENV_AUTH_TOKEN),
            base_url: var(ENV_BASE_URL),
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some() || self.auth_token.is_some()
    }

    /// Variables the agent child process needs on top of the inherited
    /// environment. A lone auth token is exposed as the API key.
    pub fn agent_env(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if self.api_key.is_none() {
            if let Some(token) = &self.auth_token {
                out.push((s!(ENV_API_KEY), token.clone()));
            }
        }
        if let Some(url) = &self.base_url {
            out.push((s!(ENV_BASE_URL), url.clone()));
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Fixed step sequence driven by this binary.
    Deterministic,
    /// Steps delegated to an external agent executor. `forced` runs never
    /// fall back to `Deterministic`.
    Agent { forced: bool },
}

impl Mode {
    pub fn resolve(force_agent: bool, env: &EnvSignals) -> Self {
        if force_agent {
            Mode::Agent { forced: true }
        } else if env.has_credentials() {
            Mode::Agent { forced: false }
        } else {
            Mode::Deterministic
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub uid: String,
    pub source_url: String,
}

impl Target {
    pub fn new(uid: &str) -> Self {
        Self { uid: s!(uid), source_url: join!(PROFILE_URL_PREFIX, uid) }
    }

    pub fn with_source_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.source_url = url;
        }
        self
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::new(DEFAULT_UID)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureOptions {
    pub scrolls: u32,
    pub scroll_px: u32,
    pub wait_ms: u64,
    pub depth: u32,
    pub session: String,
    pub headed: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            scrolls: DEFAULT_SCROLLS,
            scroll_px: SCROLL_PX,
            wait_ms: WAIT_MS,
            depth: SNAPSHOT_DEPTH,
            session: s!(SESSION_NAME),
            headed: false,
        }
    }
}

/// Where artifacts live. Commands run with `work_dir` as their cwd and get
/// the bare file names; Rust-side I/O uses the joined paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Paths {
    pub work_dir: PathBuf,
}

impl Paths {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self { work_dir: work_dir.into() }
    }

    pub fn snapshot_json(&self) -> PathBuf { self.work_dir.join(SNAPSHOT_JSON) }
    pub fn snapshot_txt(&self) -> PathBuf { self.work_dir.join(SNAPSHOT_TXT) }
    pub fn posts_json(&self) -> PathBuf { self.work_dir.join(POSTS_JSON) }
    pub fn report_md(&self) -> PathBuf { self.work_dir.join(REPORT_MD) }

    pub fn dir(&self) -> &Path {
        &self.work_dir
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Programs and scripts for the external collaborators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tools {
    pub python: String,
    pub node: String,
    pub npm: String,
    pub agent: String,
    pub extract_script: String,
    pub report_script: String,
    pub sync_script: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            python: s!(DEFAULT_PYTHON),
            node: s!(DEFAULT_NODE),
            npm: s!(DEFAULT_NPM),
            agent: s!(DEFAULT_AGENT_CMD),
            extract_script: s!(EXTRACT_SCRIPT),
            report_script: s!(REPORT_SCRIPT),
            sync_script: s!(SYNC_SCRIPT),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PublishScope {
    /// Report, sync, npm install, npm build.
    #[default]
    Full,
    /// Report and sync; no site build.
    SyncOnly,
    /// Stop after the report.
    Skip,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOptions {
    pub target: Target,
    pub capture: CaptureOptions,
    pub mode: Mode,
    pub paths: Paths,
    pub tools: Tools,
    pub publish: PublishScope,
    pub env: EnvSignals,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            target: Target::default(),
            capture: CaptureOptions::default(),
            mode: Mode::Deterministic,
            paths: Paths::default(),
            tools: Tools::default(),
            publish: PublishScope::Full,
            env: EnvSignals::default(),
        }
    }
}
