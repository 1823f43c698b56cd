//! Shared helpers for tests. Compiled only for tests and the `test-support`
//! feature.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Result, anyhow};

use crate::io::fixture::{TestCase, load_case};
use crate::io::producer::{ActionProducer, TurnContext};

/// Producer that replays a fixed script of turns.
pub struct ScriptedProducer {
    turns: Mutex<VecDeque<String>>,
    /// Turn replayed forever once the script is exhausted.
    fallback: Option<String>,
}

impl ScriptedProducer {
    pub fn from_turns(turns: Vec<String>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            fallback: None,
        }
    }

    /// Producer that emits the same turn forever.
    pub fn repeating(turn: &str) -> Self {
        Self {
            turns: Mutex::new(VecDeque::new()),
            fallback: Some(turn.to_string()),
        }
    }
}

impl ActionProducer for ScriptedProducer {
    fn next_action(&self, _turn: &TurnContext<'_>) -> Result<String> {
        let mut turns = self
            .turns
            .lock()
            .map_err(|_| anyhow!("scripted producer poisoned"))?;
        if let Some(next) = turns.pop_front() {
            return Ok(next);
        }
        self.fallback
            .clone()
            .ok_or_else(|| anyhow!("scripted producer exhausted"))
    }
}

/// Build a `respond` action turn with an optionally complete schema.org block.
pub fn respond_action(readme: &str, complete_metadata: bool) -> String {
    let metadata = if complete_metadata {
        serde_json::json!({
            "@context": "https://schema.org",
            "@type": "SoftwareSourceCode",
            "name": "word_counter",
            "description": "Command-line word frequency counter",
            "programmingLanguage": "Python",
        })
    } else {
        serde_json::json!({ "name": "word_counter" })
    };
    serde_json::json!({
        "action": "respond",
        "readme": readme,
        "metadata": metadata,
    })
    .to_string()
}

/// Write a minimal valid fixture directory and return its path.
pub fn write_fixture(base: &Path, id: &str) -> PathBuf {
    let dir = base.join(id);
    fs::create_dir_all(dir.join("ground_truth")).expect("create fixture dirs");

    fs::write(
        dir.join("metadata.json"),
        serde_json::to_string_pretty(&serde_json::json!({
            "name": id,
            "description": "Command-line word frequency counter",
            "language": "Python",
            "domain": "text processing",
            "files": ["wordcount.py"],
        }))
        .expect("metadata json"),
    )
    .expect("write metadata");

    fs::write(
        dir.join("wordcount.py"),
        "import sys\n\n\ndef count_words(text):\n    counts = {}\n    for word in text.split():\n        counts[word] = counts.get(word, 0) + 1\n    return counts\n\n\nif __name__ == \"__main__\":\n    print(count_words(sys.stdin.read()))\n",
    )
    .expect("write source");

    fs::write(
        dir.join("ground_truth").join("README.md"),
        "# word_counter\n\nCounts word frequencies in text files.\n",
    )
    .expect("write gt readme");

    fs::write(
        dir.join("ground_truth").join("facts.json"),
        serde_json::to_string_pretty(&serde_json::json!({
            "main_purpose": "Count word frequencies in text files and print the most common words",
            "dependencies": [],
            "run_command": "python wordcount.py input.txt",
            "key_features": ["word frequency counting", "top-N report"],
            "must_mention": ["word", "count"],
            "main_file": "wordcount.py",
        }))
        .expect("facts json"),
    )
    .expect("write facts");

    dir
}

/// Load the fixture written by [`write_fixture`].
pub fn sample_case(dir: &Path) -> TestCase {
    load_case(dir).expect("sample fixture loads")
}
