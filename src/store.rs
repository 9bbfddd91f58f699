// src/store.rs
//! On-disk artifacts of a run: the dataset envelope and the capture pair
//! (snapshot json + raw-text mirror). One run at a time; no locking.

use std::path::Path;

use crate::dataset::DatasetEnvelope;
use crate::error::PipelineError;
use crate::file::{read_text, write_json_compact, write_json_pretty, write_text};
use crate::snapshot::SnapshotEnvelope;

/// `fetched_at` of whatever envelope is at `path`, if any.
/// Missing file, bad JSON and empty values all read as `None`.
pub fn read_fetched_at(path: &Path) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str::<DatasetEnvelope>(&text).ok()?.fetched_at()
}

pub fn load_envelope(path: &Path) -> Result<DatasetEnvelope, PipelineError> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|e| PipelineError::json(path, e))
}

pub fn save_envelope(path: &Path, envelope: &DatasetEnvelope) -> Result<(), PipelineError> {
    write_json_pretty(path, envelope)
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeCounts {
    pub read: usize,
    pub kept: usize,
    pub pinned: usize,
}

/// Load `input`, drop duplicate posts, write the result to `output` (which
/// may be the same file).
pub fn dedupe_file(input: &Path, output: &Path) -> Result<MergeCounts, PipelineError> {
    let mut envelope = load_envelope(input)?;
    let read = envelope.posts().len();
    let dropped = envelope.dedupe_posts();
    if dropped > 0 {
        logd!("dropped {dropped} duplicate posts from {}", input.display());
    }
    save_envelope(output, &envelope)?;
    Ok(MergeCounts { read, kept: envelope.posts().len(), pinned: envelope.pinned_count() })
}

/// Persist a capture. `raw_json` is the capture tool's own output when it
/// produced one; otherwise the envelope is serialized here.
pub fn save_capture(
    json_path: &Path,
    txt_path: &Path,
    envelope: &SnapshotEnvelope,
    raw_json: Option<&str>,
    outline: &str,
) -> Result<(), PipelineError> {
    match raw_json {
        Some(raw) => write_text(json_path, raw)?,
        None => write_json_compact(json_path, envelope)?,
    }
    write_text(txt_path, outline)
}
