//! Exploration tool surface: the two read-only operations exposed to the
//! participant.
//!
//! Both operations are pure reads against a fixture directory. Ground-truth
//! paths and dotfiles are excluded from listings and reads regardless of the
//! requested path; containment is checked lexically before touching the
//! filesystem, so traversal attempts never reach a real path outside the
//! case root.

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Directory name holding reference material the participant must never see.
pub const GROUND_TRUTH_DIR: &str = "ground_truth";

/// Tool-surface failure, surfaced to the participant as a tool-result error.
/// Never fatal to the run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolError {
    /// The path does not exist or is the wrong kind of entry.
    NotFound,
    /// The file exists but cannot be returned as text (binary or too large).
    NotReadable,
    /// The path escapes the case root or touches withheld material.
    Denied,
}

impl ToolError {
    /// Human-readable message embedded in the tool reply.
    pub fn message(&self, path: &str) -> String {
        match self {
            ToolError::NotFound => format!("Path does not exist: {path}"),
            ToolError::NotReadable => format!("File is not readable as text: {path}"),
            ToolError::Denied => format!("Access denied: {path}"),
        }
    }
}

/// List entries at `path` relative to the case root.
///
/// Returns sorted entry names; directories carry a trailing `/`. Hidden
/// entries and the ground-truth directory are omitted.
pub fn list_directory(case_root: &Path, path: &str) -> Result<Vec<String>, ToolError> {
    let target = resolve(case_root, path)?;
    if !target.is_dir() {
        return Err(ToolError::NotFound);
    }
    let entries = fs::read_dir(&target).map_err(|_| ToolError::NotFound)?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|_| ToolError::NotFound)?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || name == GROUND_TRUTH_DIR {
            continue;
        }
        if entry.path().is_dir() {
            names.push(format!("{name}/"));
        } else {
            names.push(name);
        }
    }
    names.sort();
    debug!(path, entries = names.len(), "listed directory");
    Ok(names)
}

/// Read a file at `path` relative to the case root as UTF-8 text.
///
/// Files larger than `max_bytes` or with non-UTF-8 content fail `NotReadable`.
pub fn read_file(case_root: &Path, path: &str, max_bytes: usize) -> Result<String, ToolError> {
    let target = resolve(case_root, path)?;
    if !target.is_file() {
        return Err(ToolError::NotFound);
    }
    let bytes = fs::read(&target).map_err(|_| ToolError::NotFound)?;
    if bytes.len() > max_bytes {
        return Err(ToolError::NotReadable);
    }
    let content = String::from_utf8(bytes).map_err(|_| ToolError::NotReadable)?;
    debug!(path, bytes = content.len(), "read file");
    Ok(content)
}

/// Lexically resolve `path` against the case root.
///
/// Rejects absolute paths, parent traversal, hidden components, and anything
/// under the ground-truth directory. No filesystem access happens here.
fn resolve(case_root: &Path, path: &str) -> Result<PathBuf, ToolError> {
    let requested = Path::new(path);
    let mut resolved = case_root.to_path_buf();
    for component in requested.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(name) => {
                let name_str = name.to_string_lossy();
                if name_str.starts_with('.') || name_str == GROUND_TRUTH_DIR {
                    return Err(ToolError::Denied);
                }
                resolved.push(name);
            }
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ToolError::Denied);
            }
        }
    }
    Ok(resolved)
}
