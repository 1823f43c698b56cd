//! Benchmark configuration stored as TOML.
//!
//! This file is intended to be edited by humans and must remain stable and
//! automatable. Missing fields default to sensible values.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Benchmark configuration (TOML).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BenchConfig {
    /// Maximum participant turns before the episode fails with a step limit.
    pub max_steps: u32,

    /// Directory holding test-case fixtures.
    pub fixtures_dir: PathBuf,

    /// Directory receiving per-run artifacts.
    pub results_dir: PathBuf,

    /// Reject `read_file` results beyond this many bytes.
    pub read_limit_bytes: usize,

    pub participant: ParticipantConfig,
    pub judge: JudgeConfig,
}

/// External participant command settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ParticipantConfig {
    /// Command invoked once per turn; reads the conversation on stdin and
    /// writes one action JSON on stdout. Empty means no external participant
    /// is configured.
    pub command: Vec<String>,
    /// Maximum time per turn before the episode fails.
    pub timeout_secs: u64,
    /// Truncate participant output beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// External judge command settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JudgeConfig {
    /// Command invoked once per judged sub-criterion; reads the judging
    /// prompt on stdin and writes `{"score": <number>}` on stdout. Empty
    /// means the built-in deterministic judge is used.
    pub command: Vec<String>,
    /// Request-level timeout; a timeout degrades the sub-score to 0.
    pub timeout_secs: u64,
    /// Truncate judge output beyond this many bytes.
    pub output_limit_bytes: usize,
    /// Sampling temperature forwarded to the judge command.
    pub temperature: f64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            max_steps: 15,
            fixtures_dir: PathBuf::from("fixtures"),
            results_dir: PathBuf::from("results"),
            read_limit_bytes: 64 * 1024,
            participant: ParticipantConfig::default(),
            judge: JudgeConfig::default(),
        }
    }
}

impl Default for ParticipantConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 120,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 60,
            output_limit_bytes: 50_000,
            temperature: 0.3,
        }
    }
}

impl BenchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(anyhow!("max_steps must be > 0"));
        }
        if self.read_limit_bytes == 0 {
            return Err(anyhow!("read_limit_bytes must be > 0"));
        }
        validate_command("participant.command", &self.participant.command)?;
        validate_command("judge.command", &self.judge.command)?;
        if self.participant.timeout_secs == 0 {
            return Err(anyhow!("participant.timeout_secs must be > 0"));
        }
        if self.judge.timeout_secs == 0 {
            return Err(anyhow!("judge.timeout_secs must be > 0"));
        }
        if self.participant.output_limit_bytes == 0 {
            return Err(anyhow!("participant.output_limit_bytes must be > 0"));
        }
        if self.judge.output_limit_bytes == 0 {
            return Err(anyhow!("judge.output_limit_bytes must be > 0"));
        }
        if !(0.0..=2.0).contains(&self.judge.temperature) {
            return Err(anyhow!("judge.temperature must be within [0, 2]"));
        }
        Ok(())
    }
}

// Empty commands are allowed (scripted participant, built-in judge); a
// configured command must still have a usable program name.
fn validate_command(label: &str, command: &[String]) -> Result<()> {
    if let Some(first) = command.first()
        && first.trim().is_empty()
    {
        return Err(anyhow!("{label} must start with a non-empty program"));
    }
    Ok(())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `BenchConfig::default()`.
pub fn load_config(path: &Path) -> Result<BenchConfig> {
    if !path.exists() {
        let cfg = BenchConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BenchConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &BenchConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, BenchConfig::default());
        assert_eq!(cfg.max_steps, 15);
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("bench.toml");
        let mut cfg = BenchConfig::default();
        cfg.participant.command = vec!["codex".to_string(), "exec".to_string()];
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn rejects_zero_step_limit() {
        let cfg = BenchConfig {
            max_steps: 0,
            ..BenchConfig::default()
        };
        let _err = cfg.validate().expect_err("invalid");
    }

    #[test]
    fn rejects_blank_command_program() {
        let mut cfg = BenchConfig::default();
        cfg.judge.command = vec!["  ".to_string()];
        let _err = cfg.validate().expect_err("invalid");
    }
}
