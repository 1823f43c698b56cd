//! Side-effecting operations: fixtures, exploration, processes, prompts,
//! configuration, and transcript persistence.

pub mod config;
pub mod explore;
pub mod fixture;
pub mod process;
pub mod producer;
pub mod prompt;
pub mod transcript;
