//! Helpers for running collaborator processes with timeouts and bounded output.
//!
//! Both the participant command and the judge command are external
//! collaborators invoked per request; a hung collaborator must never hang the
//! run, and unbounded output must never exhaust memory.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Captured collaborator output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    /// Bytes discarded beyond the capture limit (stdout + stderr combined).
    pub truncated_bytes: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.success()
    }
}

/// Run a command with a timeout, writing `stdin` and capturing stdout/stderr.
///
/// Output is drained concurrently while the child runs so a chatty
/// collaborator cannot deadlock on a full pipe. At most `output_limit_bytes`
/// of each stream is retained; the rest is drained and discarded.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs(), output_limit_bytes))]
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!("spawning collaborator process");
    let mut child = cmd.spawn().context("spawn command")?;

    if let Some(input) = stdin {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        // A child that ignores stdin may exit before we finish writing, closing
        // its read end; treat that broken pipe as EOF rather than a failure.
        match child_stdin.write_all(input) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Err(e) => return Err(e).context("write stdin"),
        }
        // Drop closes the pipe so the child sees EOF.
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || drain_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || drain_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?
        }
    };

    let (stdout, stdout_dropped) = join_reader(stdout_handle).context("join stdout")?;
    let (stderr, stderr_dropped) = join_reader(stderr_handle).context("join stderr")?;
    let truncated_bytes = stdout_dropped + stderr_dropped;
    if truncated_bytes > 0 {
        warn!(truncated_bytes, "collaborator output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        truncated_bytes,
        timed_out,
    })
}

/// Build a `Command` from an argv-style vector.
pub fn command_from_argv(argv: &[String]) -> Result<Command> {
    let program = argv
        .first()
        .ok_or_else(|| anyhow!("command must be non-empty"))?;
    let mut cmd = Command::new(program);
    cmd.args(&argv[1..]);
    Ok(cmd)
}

fn drain_limited(mut reader: impl Read, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut buf = [0u8; 8192];
    loop {
        let read = reader.read(&mut buf).context("read stream")?;
        if read == 0 {
            return Ok((kept, dropped));
        }
        let room = limit.saturating_sub(kept.len());
        let take = read.min(room);
        kept.extend_from_slice(&buf[..take]);
        dropped += read - take;
    }
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_stdout_and_exit_status() {
        let output = run_command_with_timeout(
            sh("printf 'hello'"),
            None,
            Duration::from_secs(5),
            1024,
        )
        .expect("run");
        assert!(output.success());
        assert_eq!(output.stdout, "hello");
    }

    #[test]
    fn feeds_stdin_to_child() {
        let output = run_command_with_timeout(
            sh("cat"),
            Some(b"echo back"),
            Duration::from_secs(5),
            1024,
        )
        .expect("run");
        assert_eq!(output.stdout, "echo back");
    }

    #[test]
    fn kills_on_timeout() {
        let output = run_command_with_timeout(
            sh("sleep 10"),
            None,
            Duration::from_millis(100),
            1024,
        )
        .expect("run");
        assert!(output.timed_out);
        assert!(!output.success());
    }

    #[test]
    fn bounds_captured_output() {
        let output = run_command_with_timeout(
            sh("printf 'abcdefgh'"),
            None,
            Duration::from_secs(5),
            4,
        )
        .expect("run");
        assert_eq!(output.stdout, "abcd");
        assert_eq!(output.truncated_bytes, 4);
    }

    #[test]
    fn argv_builder_rejects_empty() {
        let _err = command_from_argv(&[]).expect_err("empty argv");
        let cmd = command_from_argv(&["echo".to_string(), "hi".to_string()]).expect("argv");
        assert_eq!(cmd.get_program(), "echo");
    }
}
