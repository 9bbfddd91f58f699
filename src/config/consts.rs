// src/config/consts.rs

// Target
pub const DEFAULT_UID: &str = "7449968177";
pub const PROFILE_URL_PREFIX: &str = "https://m.weibo.cn/u/";

// Capture
pub const DEFAULT_SCROLLS: u32 = 6;
pub const SCROLL_PX: u32 = 2500;
pub const WAIT_MS: u64 = 1200;
pub const NAV_TIMEOUT_MS: u64 = 90_000;
pub const SNAPSHOT_DEPTH: u32 = 12;
pub const SESSION_NAME: &str = "weibo";
pub const PRIMARY_TOOL: &str = "agent-browser";
pub const SECONDARY_MODULE: &str = "playwright";
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";
pub const LOCALE: &str = "zh-CN";
pub const VIEWPORT: (u32, u32) = (390, 844);

// Outline
pub const SYNTHETIC_ROOT_ROLE: &str = "document";
pub const FALLBACK_ROLE: &str = "node";
pub const INDENT_WIDTH: usize = 2;

// Validation
pub const FRESHNESS_WINDOW_SECS: i64 = 6 * 3600;
pub const FINGERPRINT_TEXT_CHARS: usize = 80;
pub const FINGERPRINT_SEP: char = '|';

// Artifacts (relative to the working dir)
pub const SNAPSHOT_JSON: &str = "weibo_snapshot.json";
pub const SNAPSHOT_TXT: &str = "weibo_snapshot.txt";
pub const POSTS_JSON: &str = "idol_weibo_posts.json";
pub const REPORT_MD: &str = "report.md";
pub const WEB_DIR: &str = "web";

// External collaborators
pub const EXTRACT_SCRIPT: &str = "weibo_collect.mjs";
pub const REPORT_SCRIPT: &str = "pipeline/generate_apple_style_report.py";
pub const SYNC_SCRIPT: &str = "web/scripts/sync-data.mjs";
pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_NODE: &str = "node";
pub const DEFAULT_NPM: &str = "npm";

// Autonomous orchestration
pub const DEFAULT_AGENT_CMD: &str = "claude";
pub const AGENT_MODEL: &str = "sonnet";
pub const AGENT_MAX_TURNS: u32 = 40;
pub const AGENT_ALLOWED_TOOLS: &str = "Bash,Read,Write,Glob,Skill";
pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_AUTH_TOKEN: &str = "ANTHROPIC_AUTH_TOKEN";
pub const ENV_BASE_URL: &str = "ANTHROPIC_BASE_URL";
