//! Documentation-benchmark harness core.
//!
//! This crate implements the participant-facing half of AEO-Bench: fixture
//! repositories, the exploration tool surface, the JSON action protocol, and
//! the bounded episode loop that drives a documentation-generating agent.
//! The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (protocol parsing, episode
//!   state). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (fixture loading, file
//!   exploration, process execution, prompt rendering, transcripts).
//!
//! The [`episode`] module coordinates core logic with I/O to run one
//! participant episode to completion. Scoring lives in the `eval` crate.

pub mod core;
pub mod episode;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
