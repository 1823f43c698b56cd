//! End-to-end episode flow against a real fixture directory on disk.

use harness::core::state::Termination;
use harness::episode::{EpisodeConfig, run_episode};
use harness::io::fixture::discover_cases;
use harness::io::transcript::{read_transcript, write_transcript};
use harness::test_support::{ScriptedProducer, respond_action, write_fixture};
use tempfile::tempdir;

fn episode_config() -> EpisodeConfig {
    EpisodeConfig {
        max_steps: 15,
        read_limit_bytes: 64 * 1024,
    }
}

#[test]
fn full_episode_produces_doc_and_transcript() {
    let temp = tempdir().expect("tempdir");
    write_fixture(temp.path(), "word_counter");
    let cases = discover_cases(temp.path()).expect("discover");
    assert_eq!(cases.len(), 1);

    let producer = ScriptedProducer::from_turns(vec![
        r#"{"action": "list_directory", "path": "."}"#.to_string(),
        r#"{"action": "read_file", "path": "wordcount.py"}"#.to_string(),
        respond_action(
            "# word_counter\n\nCounts word frequencies.\n\n## Usage\n\n```\npython wordcount.py input.txt\n```\n",
            true,
        ),
    ]);

    let outcome = run_episode(&producer, &cases[0], &episode_config()).expect("episode");
    assert_eq!(outcome.termination, Termination::Responded);
    let doc = outcome.doc.expect("doc present");
    assert!(doc.readme.starts_with("# word_counter"));
    assert_eq!(doc.metadata["@context"], "https://schema.org");

    let transcript_path = temp.path().join("transcript.jsonl");
    write_transcript(&transcript_path, &outcome.transcript).expect("write transcript");
    let loaded = read_transcript(&transcript_path).expect("read transcript");
    assert_eq!(loaded.len(), 3);
}

#[test]
fn ground_truth_never_leaks_through_sixteen_probes() {
    let temp = tempdir().expect("tempdir");
    write_fixture(temp.path(), "word_counter");
    let cases = discover_cases(temp.path()).expect("discover");

    // A participant that does nothing but probe the withheld directory.
    let producer =
        ScriptedProducer::repeating(r#"{"action": "read_file", "path": "ground_truth/facts.json"}"#);
    let outcome = run_episode(&producer, &cases[0], &episode_config()).expect("episode");

    assert_eq!(outcome.termination, Termination::StepLimitExceeded);
    assert_eq!(outcome.steps_taken, 15);
    for record in &outcome.transcript {
        let reply = record.reply.as_ref().expect("tool reply");
        assert!(reply["error"].is_string(), "probe must be denied");
        assert!(!reply.to_string().contains("main_purpose"));
    }
}
