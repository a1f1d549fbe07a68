//! Subprocess execution with a wall-clock limit
//!
//! External tools (yt-dlp in particular) can hang indefinitely on a stalled
//! network connection. Every invocation therefore runs against a deadline
//! and the child is killed once it is exceeded.

use std::io::{self, Read};
use std::process::{Child, Command, Output, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs a command to completion, capturing stdout and stderr
///
/// The deadline also covers collecting the output: a background process
/// that inherited the pipes cannot keep the call open after the child exits.
///
/// # Errors
///
/// Returns the spawn error if the program cannot be started, or an error of
/// kind [`io::ErrorKind::TimedOut`] if the deadline passes first. A timed out
/// child is killed and reaped before returning.
pub(crate) fn output_with_timeout(mut command: Command, timeout: Duration) -> io::Result<Output> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drain both pipes concurrently so a chatty child never blocks on a full pipe
    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            kill(&mut child);
            return Err(timed_out(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    };

    match (collect(&stdout, deadline), collect(&stderr, deadline)) {
        (Some(stdout), Some(stderr)) => Ok(Output {
            status,
            stdout,
            stderr,
        }),
        // Reader threads stay blocked until the last pipe holder exits
        _ => Err(timed_out(timeout)),
    }
}

fn timed_out(timeout: Duration) -> io::Error {
    io::Error::new(
        io::ErrorKind::TimedOut,
        format!("process exceeded {}s", timeout.as_secs()),
    )
}

fn spawn_reader<R>(pipe: Option<R>) -> Receiver<Vec<u8>>
where
    R: Read + Send + 'static,
{
    let (sender, receiver) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = pipe.read_to_end(&mut buffer);
            let _ = sender.send(buffer);
        });
    }
    receiver
}

/// Waits for a reader's buffer until the deadline; None if it passed first
fn collect(receiver: &Receiver<Vec<u8>>, deadline: Instant) -> Option<Vec<u8>> {
    match receiver.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(buffer) => Some(buffer),
        Err(RecvTimeoutError::Disconnected) => Some(Vec::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[test]
    fn test_captures_stdout_and_stderr() {
        let output =
            output_with_timeout(shell("echo out; echo err >&2"), Duration::from_secs(5)).unwrap();

        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "out\n");
        assert_eq!(String::from_utf8_lossy(&output.stderr), "err\n");
    }

    #[test]
    fn test_reports_exit_code() {
        let output = output_with_timeout(shell("exit 3"), Duration::from_secs(5)).unwrap();
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn test_times_out() {
        let started = Instant::now();
        let err = output_with_timeout(shell("sleep 10"), Duration::from_millis(200)).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_background_process_holding_pipes_times_out() {
        let started = Instant::now();
        let err = output_with_timeout(shell("sleep 4 & echo done"), Duration::from_millis(300))
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_missing_program() {
        let err = output_with_timeout(
            Command::new("definitely-not-a-real-program-4711"),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
