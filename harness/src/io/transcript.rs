//! Transcript persistence for completed episodes.
//!
//! One JSON record per turn, written as JSONL under the run's results
//! directory. Transcripts are product artifacts, always written regardless of
//! `RUST_LOG`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::state::TurnRecord;

/// Write an episode transcript as JSONL.
pub fn write_transcript(path: &Path, records: &[TurnRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create transcript dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    for record in records {
        let line = serde_json::to_string(record).context("serialize turn record")?;
        buf.push_str(&line);
        buf.push('\n');
    }
    fs::write(path, buf).with_context(|| format!("write transcript {}", path.display()))?;
    Ok(())
}

/// Read a transcript back. Used by reporting and tests.
pub fn read_transcript(path: &Path) -> Result<Vec<TurnRecord>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read transcript {}", path.display()))?;
    let mut records = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: TurnRecord = serde_json::from_str(line)
            .with_context(|| format!("parse transcript line {}", index + 1))?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::Action;
    use tempfile::tempdir;

    #[test]
    fn transcript_round_trips() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("runs").join("transcript.jsonl");
        let records = vec![
            TurnRecord {
                step: 1,
                action: Some(Action::ListDirectory {
                    path: ".".to_string(),
                }),
                reply: Some(serde_json::json!({"result": ["main.py"]})),
                error: None,
            },
            TurnRecord {
                step: 2,
                action: None,
                reply: None,
                error: Some("parse action json".to_string()),
            },
        ];

        write_transcript(&path, &records).expect("write");
        let loaded = read_transcript(&path).expect("read");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].step, 1);
        assert_eq!(loaded[1].error.as_deref(), Some("parse action json"));
    }
}
