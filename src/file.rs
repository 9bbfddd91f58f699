// src/file.rs

use std::{
    fs,
    io::Write,
    path::Path,
};

use serde::Serialize;

use crate::error::PipelineError;

pub fn ensure_directory(dir: &Path) -> Result<(), PipelineError> {
    if dir.exists() && !dir.is_dir() {
        return Err(PipelineError::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::AlreadyExists, "path exists but is not a directory"),
        ));
    }
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_directory(parent)?;
        }
    }
    Ok(())
}

/// Create/truncate `path` with `contents`, making parent dirs as needed.
pub fn write_text(path: &Path, contents: &str) -> Result<(), PipelineError> {
    ensure_parent(path)?;
    fs::write(path, contents).map_err(|e| PipelineError::io(path, e))
}

/// Compact JSON, as the capture tools write it.
pub fn write_json_compact<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let text = serde_json::to_string(value).map_err(|e| PipelineError::json(path, e))?;
    write_text(path, &text)
}

/// 2-space indented JSON with a trailing newline. Non-ASCII is written as-is.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    let mut buf = serde_json::to_vec_pretty(value).map_err(|e| PipelineError::json(path, e))?;
    buf.push(b'\n');
    ensure_parent(path)?;
    let mut file = fs::File::create(path).map_err(|e| PipelineError::io(path, e))?;
    file.write_all(&buf).map_err(|e| PipelineError::io(path, e))?;
    file.flush().map_err(|e| PipelineError::io(path, e))
}

pub fn read_text(path: &Path) -> Result<String, PipelineError> {
    fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))
}

pub fn is_non_empty_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}
