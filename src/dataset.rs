// src/dataset.rs
//
// Dataset envelope written by the extraction step, and post deduplication.
//
// The envelope stays a JSON object end to end. MERGE replaces the `posts`
// array and nothing else, so fields this crate never reads (emojis, author,
// numeric stats, idol counters, …) and their exact types survive the
// rewrite. `PostRecord` is a lenient typed view over one post.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::consts::{FINGERPRINT_SEP, FINGERPRINT_TEXT_CHARS};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetEnvelope {
    pub fields: Map<String, Value>,
}

impl DatasetEnvelope {
    pub fn fetched_at(&self) -> Option<String> {
        Some(loose_string(self.fields.get("fetched_at")?)).filter(|s| !s.is_empty())
    }

    /// Raw posts; anything but an array reads as empty.
    pub fn posts(&self) -> &[Value] {
        match self.fields.get("posts") {
            Some(Value::Array(items)) => items,
            _ => &[],
        }
    }

    pub fn records(&self) -> Vec<PostRecord> {
        self.posts().iter().map(PostRecord::from_value).collect()
    }

    pub fn pinned_count(&self) -> usize {
        self.records().iter().filter(|p| p.is_pinned).count()
    }

    /// Replace `posts` with its deduplicated form. Returns how many were dropped.
    pub fn dedupe_posts(&mut self) -> usize {
        let posts = match self.fields.remove("posts") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        let before = posts.len();
        let kept = dedupe(posts);
        let dropped = before - kept.len();
        self.fields.insert(s!("posts"), Value::Array(kept));
        dropped
    }
}

/// Lenient view of one post. Wrong-typed fields read as absent/empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PostRecord {
    pub status_id: Option<String>,
    pub created_at_raw: Option<String>,
    pub text: Option<String>,
    pub source_raw: Option<String>,
    pub is_pinned: bool,
    pub media: Vec<Media>,
    pub stats: Stats,
    pub status_url: Option<String>,
    pub links: Vec<Link>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Media {
    pub kind: String,
}

/// Display strings as scraped ("1.2万"), not counts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stats {
    pub likes_raw: Option<String>,
    pub comments_raw: Option<String>,
    pub reposts_raw: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Link {
    pub url: Option<String>,
}

impl PostRecord {
    pub fn from_value(post: &Value) -> Self {
        let field = |key: &str| text_field(post.get(key));
        let stats = post.get("stats");
        Self {
            status_id: field("status_id"),
            created_at_raw: field("created_at_raw"),
            text: field("text"),
            source_raw: field("source_raw"),
            is_pinned: post.get("is_pinned").is_some_and(truthy),
            media: objects(post, "media")
                .into_iter()
                .map(|m| Media { kind: text_field(m.get("type")).unwrap_or_default() })
                .collect(),
            stats: Stats {
                likes_raw: text_field(stats.and_then(|s| s.get("likes_raw"))),
                comments_raw: text_field(stats.and_then(|s| s.get("comments_raw"))),
                reposts_raw: text_field(stats.and_then(|s| s.get("reposts_raw"))),
            },
            status_url: field("status_url"),
            links: objects(post, "links")
                .into_iter()
                .map(|l| Link { url: text_field(l.get("url")) })
                .collect(),
        }
    }
}

fn objects<'a>(post: &'a Value, key: &str) -> Vec<&'a Map<String, Value>> {
    match post.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    }
}

/// Something with a dedupe key.
pub trait Fingerprint {
    fn fingerprint(&self) -> String;
}

impl Fingerprint for PostRecord {
    fn fingerprint(&self) -> String {
        key(
            self.status_id.as_deref().unwrap_or(""),
            self.created_at_raw.as_deref().unwrap_or(""),
            self.text.as_deref().unwrap_or(""),
        )
    }
}

/// Raw posts coerce each part the way the extraction side does: falsy
/// values are empty, everything else is stringified.
impl Fingerprint for Value {
    fn fingerprint(&self) -> String {
        let part = |k: &str| text_field(self.get(k)).unwrap_or_default();
        key(&part("status_id"), &part("created_at_raw"), &part("text"))
    }
}

/// `status_id|created_at_raw|<first 80 chars of text>`.
///
/// Lossy on purpose: distinct posts sharing all three parts collapse
/// into one. Downstream consumers expect exactly this key.
fn key(status_id: &str, created_at_raw: &str, text: &str) -> String {
    let mut key = s!(status_id);
    key.push(FINGERPRINT_SEP);
    key.push_str(created_at_raw);
    key.push(FINGERPRINT_SEP);
    key.extend(text.chars().take(FINGERPRINT_TEXT_CHARS));
    key
}

/// Keep the first post per fingerprint, in original order.
pub fn dedupe<P: Fingerprint>(posts: Vec<P>) -> Vec<P> {
    let mut seen: HashSet<String> = HashSet::with_capacity(posts.len());
    posts
        .into_iter()
        .filter(|p| seen.insert(p.fingerprint()))
        .collect()
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Stringified value, or `None` when it is falsy.
fn text_field(v: Option<&Value>) -> Option<String> {
    v.filter(|v| truthy(v)).map(loose_string)
}

fn loose_string(v: &Value) -> String {
    match v {
        Value::Null => s!(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => s!("True"),
        Value::Bool(false) => s!("False"),
        other => other.to_string(),
    }
}
