//! Fixture store: loading and discovery of test-case directories.
//!
//! Each fixture is a directory holding the project's source files,
//! `metadata.json`, and a `ground_truth/` directory with the reference
//! README and facts record. Fixtures are read-only input; any load or
//! validation failure here is fatal to the run before any case executes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::Draft;
use serde::Deserialize;
use serde_json::Value;

const METADATA_SCHEMA: &str = include_str!("../../schemas/metadata.schema.json");
const FACTS_SCHEMA: &str = include_str!("../../schemas/facts.schema.json");

/// A loaded test case. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct TestCase {
    /// Unique identifier (the fixture directory name, slug format).
    pub id: String,
    /// Absolute or workspace-relative path to the fixture directory.
    pub root: PathBuf,
    pub metadata: ProjectMetadata,
    pub ground_truth: GroundTruth,
}

/// Project metadata from `metadata.json`, shown to the participant.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProjectMetadata {
    pub name: String,
    pub description: String,
    pub language: String,
    pub domain: String,
    #[serde(default)]
    pub files: Vec<String>,
}

/// Reference material withheld from the participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundTruth {
    pub readme: String,
    pub facts: Facts,
}

/// The authoritative facts record for factual-accuracy judging.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Facts {
    pub main_purpose: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub run_command: String,
    #[serde(default)]
    pub key_features: Vec<String>,
    #[serde(default)]
    pub must_mention: Vec<String>,
    pub main_file: String,
}

/// Load and validate a test case from a fixture directory.
pub fn load_case(dir: &Path) -> Result<TestCase> {
    let id = dir
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("fixture dir has no usable name: {}", dir.display()))?
        .to_string();
    validate_case_id(&id)?;
    if !dir.is_dir() {
        bail!("fixture {} is not a directory", dir.display());
    }

    let metadata_path = dir.join("metadata.json");
    let metadata_raw = fs::read_to_string(&metadata_path)
        .with_context(|| format!("read {}", metadata_path.display()))?;
    validate_schema(&metadata_raw, METADATA_SCHEMA)
        .with_context(|| format!("validate {}", metadata_path.display()))?;
    let metadata: ProjectMetadata = serde_json::from_str(&metadata_raw)
        .with_context(|| format!("parse {}", metadata_path.display()))?;

    let readme_path = dir.join("ground_truth").join("README.md");
    let readme = fs::read_to_string(&readme_path)
        .with_context(|| format!("read {}", readme_path.display()))?;

    let facts_path = dir.join("ground_truth").join("facts.json");
    let facts_raw =
        fs::read_to_string(&facts_path).with_context(|| format!("read {}", facts_path.display()))?;
    validate_schema(&facts_raw, FACTS_SCHEMA)
        .with_context(|| format!("validate {}", facts_path.display()))?;
    let facts: Facts = serde_json::from_str(&facts_raw)
        .with_context(|| format!("parse {}", facts_path.display()))?;

    Ok(TestCase {
        id,
        root: dir.to_path_buf(),
        metadata,
        ground_truth: GroundTruth { readme, facts },
    })
}

/// Discover and load all fixtures from a directory.
///
/// Returns cases sorted by id. Hidden directories are skipped.
pub fn discover_cases(fixtures_dir: &Path) -> Result<Vec<TestCase>> {
    if !fixtures_dir.exists() {
        return Ok(Vec::new());
    }
    let mut cases = Vec::new();
    for entry in fs::read_dir(fixtures_dir)
        .with_context(|| format!("read fixtures dir {}", fixtures_dir.display()))?
    {
        let entry = entry.context("read fixture entry")?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        cases.push(load_case(&path)?);
    }
    cases.sort_by(|left, right| left.id.cmp(&right.id));
    Ok(cases)
}

/// Select cases by id from an already-discovered set, preserving request order.
pub fn select_cases(cases: Vec<TestCase>, ids: &[String]) -> Result<Vec<TestCase>> {
    let mut selected = Vec::with_capacity(ids.len());
    for id in ids {
        let case = cases
            .iter()
            .find(|case| &case.id == id)
            .ok_or_else(|| anyhow!("test case {id} not found"))?;
        selected.push(case.clone());
    }
    Ok(selected)
}

/// Validate JSON text against a JSON Schema (Draft 2020-12).
fn validate_schema(instance_raw: &str, schema_raw: &str) -> Result<()> {
    let instance: Value = serde_json::from_str(instance_raw).context("parse instance json")?;
    let schema: Value = serde_json::from_str(schema_raw).context("parse schema json")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile json schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(&instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

fn validate_case_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("case id must be non-empty");
    }
    if id.contains("..") {
        bail!("case id must not contain '..'");
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("case id must use [a-z0-9_-] only, got {id}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write_fixture;
    use tempfile::tempdir;

    #[test]
    fn loads_valid_fixture() {
        let temp = tempdir().expect("tempdir");
        let dir = write_fixture(temp.path(), "word_counter");

        let case = load_case(&dir).expect("case loads");
        assert_eq!(case.id, "word_counter");
        assert_eq!(case.metadata.language, "Python");
        assert!(!case.ground_truth.facts.main_purpose.is_empty());
        assert!(case.ground_truth.readme.contains('#'));
    }

    #[test]
    fn rejects_metadata_missing_required_keys() {
        let temp = tempdir().expect("tempdir");
        let dir = temp.path().join("broken_case");
        fs::create_dir_all(dir.join("ground_truth")).expect("mkdir");
        fs::write(dir.join("metadata.json"), r#"{"name": "x"}"#).expect("write metadata");

        let err = load_case(&dir).expect_err("invalid metadata");
        assert!(format!("{err:#}").contains("validate"));
    }

    #[test]
    fn rejects_invalid_case_id() {
        let temp = tempdir().expect("tempdir");
        let dir = temp.path().join("Bad Name");
        fs::create_dir_all(&dir).expect("mkdir");

        let _err = load_case(&dir).expect_err("invalid id");
    }

    #[test]
    fn discovery_sorts_by_id_and_skips_hidden() {
        let temp = tempdir().expect("tempdir");
        write_fixture(temp.path(), "zeta_case");
        write_fixture(temp.path(), "alpha_case");
        fs::create_dir_all(temp.path().join(".hidden")).expect("mkdir");

        let cases = discover_cases(temp.path()).expect("discover");
        let ids: Vec<&str> = cases.iter().map(|case| case.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha_case", "zeta_case"]);
    }

    #[test]
    fn discovery_of_missing_dir_is_empty() {
        let temp = tempdir().expect("tempdir");
        let cases = discover_cases(&temp.path().join("nope")).expect("discover");
        assert!(cases.is_empty());
    }

    #[test]
    fn select_preserves_request_order_and_rejects_unknown() {
        let temp = tempdir().expect("tempdir");
        write_fixture(temp.path(), "alpha_case");
        write_fixture(temp.path(), "zeta_case");
        let cases = discover_cases(temp.path()).expect("discover");

        let selected = select_cases(
            cases.clone(),
            &["zeta_case".to_string(), "alpha_case".to_string()],
        )
        .expect("select");
        assert_eq!(selected[0].id, "zeta_case");
        assert_eq!(selected[1].id, "alpha_case");

        let err = select_cases(cases, &["missing".to_string()]).expect_err("unknown id");
        assert!(err.to_string().contains("not found"));
    }
}
